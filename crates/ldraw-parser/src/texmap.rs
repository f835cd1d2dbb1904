// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `!TEXMAP` and `!DATA` line parsing
//!
//! `0 !TEXMAP (START | NEXT) <method> x1 y1 z1 x2 y2 z2 x3 y3 z3 [a [b]] <file> [GLOSSMAP <file>]`

use crate::tokenizer::{parse_float, parse_points};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ldraw_model::{InlineTexture, LoadError, Result, TexmapId, TexmapMethod, TexmapPlacement};

/// Parse the tokens of a `0 !TEXMAP START|NEXT` line
pub fn parse_texmap(idx: TexmapId, tokens: &[&str]) -> Result<TexmapPlacement> {
    if tokens.len() < 13 {
        return Err(LoadError::texmap("Too few arguments on !TEXMAP line"));
    }
    let next_only = match tokens[2] {
        "START" => false,
        "NEXT" => true,
        _ => return Err(LoadError::texmap("Unexpected first !TEXMAP command")),
    };

    let points = parse_points::<3>(&tokens[4..13])
        .ok_or_else(|| LoadError::texmap("Malformed point on !TEXMAP line"))?;

    let angle = |i: usize| -> Result<f64> {
        tokens
            .get(i)
            .and_then(|t| parse_float(t))
            .map(f64::to_radians)
            .ok_or_else(|| LoadError::texmap("Malformed angle on !TEXMAP line"))
    };
    let (method, file_idx) = match tokens[3] {
        "PLANAR" => (TexmapMethod::Planar, 13),
        "CYLINDRICAL" if tokens.len() > 13 => (TexmapMethod::Cylindrical { a: angle(13)? }, 14),
        "SPHERICAL" if tokens.len() > 14 => (
            TexmapMethod::Spherical {
                a: angle(13)?,
                b: angle(14)?,
            },
            15,
        ),
        _ => {
            return Err(LoadError::texmap(
                "Unexpected method in !TEXMAP command or not enough parameters",
            ))
        }
    };

    let file = tokens
        .get(file_idx)
        .ok_or_else(|| LoadError::texmap("Missing texture file on !TEXMAP line"))?;
    let mut placement = TexmapPlacement::new(idx, method, points, *file);
    placement.next_only = next_only;
    if tokens.len() >= 2 && tokens[tokens.len() - 2] == "GLOSSMAP" {
        placement.glossmap = tokens.get(file_idx + 2).map(|s| s.to_string());
    }
    Ok(placement)
}

/// Mimetype of an inline texture, from its name
pub fn detect_mimetype(id: &str) -> &'static str {
    if id.ends_with("jpg") || id.ends_with("jpeg") {
        "jpeg"
    } else {
        "png"
    }
}

/// Decode the concatenated base64 content of a `!DATA` block
pub fn decode_inline_texture(id: &str, encoded: &str) -> Result<InlineTexture> {
    let data = STANDARD
        .decode(encoded)
        .map_err(|e| LoadError::format(format!("Invalid base64 in !DATA {}: {}", id, e)))?;
    Ok(InlineTexture {
        id: id.to_string(),
        mimetype: detect_mimetype(id).to_string(),
        data,
    })
}

/// Base64 content of a texture, for writing `0 !:` lines
pub fn encode_inline_texture(texture: &InlineTexture) -> String {
    STANDARD.encode(&texture.data)
}
