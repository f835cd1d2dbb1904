// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LDraw color table
//!
//! Maps integer color codes to display, edge and alpha information. Codes 16
//! and 24 are contextual (the parent's main and edge color). A negative code
//! `-(c+1)` denotes the edge variant of color `c`. Direct colors written as
//! `0x2RRGGBB` keep the literal value as their code.

use crate::{Diagnostic, LoadError, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Signed LDraw color code
pub type ColorId = i32;

/// "Use the main color of the parent"
pub const MAIN_COLOR: ColorId = 16;

/// "Use the edge color of the parent"
pub const EDGE_COLOR: ColorId = 24;

/// Edge color used when a color does not define one
pub const DEFAULT_EDGE: u32 = 0x333333;

const DIRECT_COLOR_FLAG: ColorId = 0x200_0000;

/// Built-in colors: (code, value)
const BUILTIN_COLORS: &[(ColorId, u32)] = &[
    (0, 0x000000), (1, 0x0055BF), (2, 0x237841), (3, 0x008F9B), (4, 0xC91A09), (5, 0xC870A0),
    (6, 0x583927), (7, 0x9BA19D), (8, 0x6D6E5C), (9, 0xB4D2E3), (10, 0x4B9F4A), (11, 0x55A5AF),
    (12, 0xF2705E), (13, 0xFC97AC), (14, 0xF2CD37), (15, 0xF6F6F6), (16, 0xFFFF80),
    (17, 0xC2DAB8), (18, 0xFBE696), (19, 0xE4CD9E), (20, 0xC9CAE2), (21, 0xD4D5C9),
    (22, 0x81007B), (23, 0x2032B0), (24, 0x7F7F7F), (25, 0xFE8A18), (26, 0x923978),
    (27, 0xBBE90B), (28, 0x958A73), (29, 0xE4ADC8), (30, 0xAC78BA), (31, 0xE1D5ED),
    (32, 0x635F52), (33, 0x0020A0), (34, 0x84B68D), (35, 0xD9E4A7), (36, 0xC91A09),
    (37, 0xDF6695), (38, 0xFF800D), (39, 0xC1DFF0), (40, 0x635F52), (41, 0xCFE2F7),
    (42, 0xF8F184), (43, 0xAEEFEC), (44, 0x96709F), (45, 0xE4ADC8), (46, 0xF5CD2F),
    (47, 0xFCFCFC), (52, 0xA5A5CB), (54, 0xDAB000), (57, 0xF08F1C), (60, 0x645A4C),
    (61, 0x6C96BF), (62, 0x3CB371), (63, 0xAA4D8E), (64, 0x1B2A34), (68, 0xF3CF9B),
    (69, 0xCD6298), (70, 0x582A12), (71, 0xA0A5A9), (72, 0x6C6E68), (73, 0x5A93DB),
    (74, 0x73DCA1), (75, 0x000000), (76, 0x635F61), (77, 0xFECCCF), (78, 0xF6D7B3),
    (79, 0xFFFFFF), (80, 0xA5A9B4), (81, 0x899B5F), (82, 0xDBAC34), (83, 0x575857),
    (84, 0xCC702A), (85, 0x3F3691), (86, 0x7C503A), (89, 0x4C61DB), (92, 0xD09168),
    (100, 0xFEBABD), (110, 0x4354A3), (112, 0x6874CA), (114, 0xDF6695), (115, 0xC7D23C),
    (117, 0xFFFFFF), (118, 0xB3D7D1), (120, 0xD9E4A7), (125, 0xF9BA61), (129, 0xA5A5CB),
    (132, 0x000000), (133, 0x000000), (134, 0xAE7A59), (135, 0x9CA3A8), (137, 0x7988A1),
    (142, 0xDCBC81), (148, 0x575857), (150, 0xABADAC), (151, 0xE6E3E0), (178, 0xB48455),
    (179, 0x898788), (183, 0xF2F3F2), (191, 0xF8BB3D), (212, 0x9FC3E9), (216, 0xB31004),
    (226, 0xFFF03A), (231, 0xFCB76D), (232, 0x7DBFDD), (272, 0x0A3463), (284, 0xC281A5),
    (288, 0x184632), (293, 0x6BABE4), (294, 0xBDC6AD), (297, 0xAA7F2E), (302, 0xAEE9EF),
    (308, 0x352100), (313, 0x3592C3), (320, 0x720E0F), (321, 0x078BC9), (322, 0x36AEBF),
    (323, 0xADC3C0), (326, 0x9B9A5A), (334, 0xBBA53D), (335, 0xD67572), (339, 0xC0FF00),
    (351, 0xF785B1), (366, 0xFA9C1C), (373, 0x845E84), (378, 0xA0BCAC), (379, 0x6074A1),
    (383, 0xE0E0E0), (450, 0xB67B50), (462, 0xFFA70B), (484, 0xA95500), (503, 0xE6E3DA),
];

const TRANSPARENT_COLORS: &[ColorId] = &[
    33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 52, 54, 57, 114, 117, 129, 231,
    284, 293, 294, 302, 339,
];

const EDGE_OVERRIDES: &[(ColorId, u32)] = &[
    (0, 0x595959),
    (6, 0x1E1E1E),
    (23, 0x1E1E1E),
    (70, 0x595959),
    (85, 0x1E1E1E),
    (272, 0x1E1E1E),
    (288, 0x595959),
    (308, 0x595959),
];

/// Color definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorInfo {
    pub name: String,
    /// 24 bit RGB
    pub value: u32,
    pub edge: Option<u32>,
    /// 0..=255, `None` for opaque colors
    pub alpha: Option<u8>,
    pub luminance: Option<u8>,
    pub material: Option<String>,
    pub lego_id: Option<u32>,
    pub lego_name: Option<String>,
    /// Registered from a `0x2RRGGBB` literal
    pub direct: bool,
}

impl ColorInfo {
    pub fn new(name: impl Into<String>, value: u32) -> Self {
        Self {
            name: name.into(),
            value,
            ..Default::default()
        }
    }
}

/// Result of resolving a color code
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedColor {
    pub display: u32,
    pub edge: u32,
    pub alpha: f32,
    pub is_transparent: bool,
}

impl ResolvedColor {
    pub const BLACK: ResolvedColor = ResolvedColor {
        display: 0x000000,
        edge: 0x595959,
        alpha: 1.0,
        is_transparent: false,
    };
}

/// Color code table
///
/// Constructed once per session and handed to the loader. The only mutation
/// after construction is registration of direct colors met while parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorTable {
    colors: FxHashMap<ColorId, ColorInfo>,
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ColorTable {
    /// Create a table without any colors
    pub fn empty() -> Self {
        Self {
            colors: FxHashMap::default(),
        }
    }

    /// Create the built-in LDraw color table
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for &(id, value) in BUILTIN_COLORS {
            table.colors.insert(id, ColorInfo::new(format!("Color {}", id), value));
        }
        for id in TRANSPARENT_COLORS {
            if let Some(info) = table.colors.get_mut(id) {
                info.alpha = Some(128);
            }
        }
        for &(id, edge) in EDGE_OVERRIDES {
            if let Some(info) = table.colors.get_mut(&id) {
                info.edge = Some(edge);
            }
        }
        table
    }

    /// Build a table from the content of an LDConfig.ldr file
    ///
    /// Reads `0 !COLOUR name CODE n VALUE #rrggbb EDGE #rrggbb [ALPHA a]
    /// [LUMINANCE l] [material...]` lines. A preceding `0 // LEGOID n - name`
    /// comment is attached to the next color. Other lines are ignored.
    pub fn from_ldconfig(content: &str) -> Self {
        let mut table = Self::empty();
        let mut lego: Option<(u32, String)> = None;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() <= 1 || parts[0] != "0" {
                continue;
            }

            if parts.len() >= 6 && parts[1] == "//" && parts[2] == "LEGOID" && parts[4] == "-" {
                lego = parts[3]
                    .parse()
                    .ok()
                    .map(|id| (id, parts[5..].join(" ")));
            } else if parts.len() >= 9
                && parts[1] == "!COLOUR"
                && parts[3] == "CODE"
                && parts[5] == "VALUE"
            {
                let (Ok(id), Some(value)) = (parts[4].parse::<ColorId>(), parse_hex(parts[6]))
                else {
                    log::warn!("Skipping malformed color definition: {}", line);
                    continue;
                };
                let mut info = ColorInfo::new(parts[2], value);
                info.edge = parse_hex(parts[8]);

                let mut idx = 9;
                if parts.len() > idx + 1 && parts[idx] == "ALPHA" {
                    info.alpha = parts[idx + 1].parse().ok();
                    idx += 2;
                }
                if parts.len() > idx + 1 && parts[idx] == "LUMINANCE" {
                    info.luminance = parts[idx + 1].parse().ok();
                    idx += 2;
                }
                if parts.len() > idx {
                    info.material = Some(parts[idx..].join(" "));
                }
                if let Some((lego_id, lego_name)) = lego.take() {
                    info.lego_id = Some(lego_id);
                    info.lego_name = Some(lego_name);
                }
                table.colors.insert(id, info);
            }
        }
        table
    }

    pub fn insert(&mut self, id: ColorId, info: ColorInfo) {
        self.colors.insert(id, info);
    }

    /// Look up a non-negative color code
    pub fn get(&self, id: ColorId) -> Option<&ColorInfo> {
        self.colors.get(&id)
    }

    /// Whether the code (or the base color of an edge code) is registered
    pub fn contains(&self, id: ColorId) -> bool {
        self.colors.contains_key(&base_color(id))
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// All registered codes in ascending order
    pub fn ids(&self) -> Vec<ColorId> {
        let mut ids: Vec<ColorId> = self.colors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a color code
    ///
    /// Edge codes return the edge channel of their base color with alpha
    /// fixed to 1, so edges stay visible on transparent parts.
    pub fn resolve(&self, id: ColorId) -> Result<ResolvedColor> {
        let info = self
            .colors
            .get(&base_color(id))
            .ok_or(LoadError::UnknownColor(id))?;
        let edge = info.edge.unwrap_or(DEFAULT_EDGE);

        if id < 0 {
            return Ok(ResolvedColor {
                display: edge,
                edge,
                alpha: 1.0,
                is_transparent: false,
            });
        }
        Ok(ResolvedColor {
            display: info.value,
            edge,
            alpha: info.alpha.map_or(1.0, |a| a as f32 / 256.0),
            is_transparent: info.alpha.is_some(),
        })
    }

    /// Resolve a color code, substituting black for unknown codes
    pub fn resolve_or_black(&self, id: ColorId, warnings: &mut Vec<Diagnostic>) -> ResolvedColor {
        match self.resolve(id) {
            Ok(color) => color,
            Err(err) => {
                log::warn!("{}. Black (0) will be shown instead.", err);
                warnings.push(Diagnostic::new(format!(
                    "Unknown color \"{}\". Black (0) will be shown instead.",
                    id
                )));
                ResolvedColor::BLACK
            }
        }
    }

    /// Register a direct `0x2RRGGBB` color and return its code
    pub fn register_direct(&mut self, rgb: u32) -> ColorId {
        let rgb = rgb & 0xFF_FFFF;
        let id = DIRECT_COLOR_FLAG | rgb as ColorId;
        self.colors.entry(id).or_insert_with(|| ColorInfo {
            name: format!("Direct color 0x2{:06X}", rgb),
            value: rgb,
            edge: Some(rgb),
            direct: true,
            ..Default::default()
        });
        id
    }

    /// Make sure a code read from foreign data can be resolved
    ///
    /// Unknown codes are registered as direct colors of their low 24 bits.
    pub fn ensure(&mut self, id: ColorId) {
        let base = base_color(id);
        if !self.colors.contains_key(&base) {
            let rgb = (base as u32) & 0xFF_FFFF;
            self.colors.insert(
                base,
                ColorInfo {
                    name: format!("Direct color 0x2{:06X}", rgb),
                    value: rgb,
                    edge: Some(rgb),
                    direct: true,
                    ..Default::default()
                },
            );
        }
    }

    pub fn is_transparent(&self, id: ColorId) -> bool {
        id >= 0 && self.colors.get(&id).is_some_and(|c| c.alpha.is_some())
    }
}

/// Edge variant of a color code. Applying it twice gives back the original.
pub fn edge_color_of(id: ColorId) -> ColorId {
    // Bitwise not is -id - 1 without overflow at i32::MIN
    !id
}

/// Base color of a code (identity for non-negative codes)
pub fn base_color(id: ColorId) -> ColorId {
    if id < 0 {
        edge_color_of(id)
    } else {
        id
    }
}

/// Colors whose edges are drawn in white for contrast
pub fn is_black(id: ColorId) -> bool {
    matches!(id, 0 | 32 | 64 | 83 | 256)
}

pub fn is_direct_color(id: ColorId) -> bool {
    id >= DIRECT_COLOR_FLAG && id <= (DIRECT_COLOR_FLAG | 0xFF_FFFF)
}

/// Textual form of a color code as written in LDraw files
pub fn color_to_ldr(id: ColorId) -> String {
    if is_direct_color(id) {
        format!("0x2{:06X}", id & 0xFF_FFFF)
    } else {
        id.to_string()
    }
}

/// Split a 24 bit color into normalized RGB components
pub fn rgb_components(value: u32) -> [f32; 3] {
    [
        ((value >> 16) & 0xFF) as f32 / 255.0,
        ((value >> 8) & 0xFF) as f32 / 255.0,
        (value & 0xFF) as f32 / 255.0,
    ]
}

/// `#rrggbb` form of a 24 bit color
pub fn to_hex(value: u32) -> String {
    format!("#{:06x}", value & 0xFF_FFFF)
}

fn parse_hex(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('#').unwrap_or(token);
    u32::from_str_radix(digits, 16).ok()
}
