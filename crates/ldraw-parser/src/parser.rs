// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LDraw document parser
//!
//! Interprets a document one line at a time, keeping the BFC state
//! (`CERTIFY`, winding, `INVERTNEXT`, `CLIP`), the texture mapping state and
//! the header state of the part type being read. A document may hold several
//! part types separated by `0 FILE` lines.

use crate::scanner::LineScanner;
use crate::texmap::{decode_inline_texture, parse_texmap};
use crate::tokenizer::{
    normalize_id, parse_color, parse_floats, parse_int, parse_line_type, parse_points, tokenize,
    ColorToken,
};
use ldraw_model::{
    ColorId, ColorTable, ConditionalLine, Diagnostic, InlineTexture, Inlined, Line, Mat3,
    PartType, Quad, RotationType, Step, StepRotation, SubModelPlacement, TexmapId,
    TexmapPlacement, Triangle, Vec3, EDGE_COLOR, MAIN_COLOR,
};
use rustc_hash::FxHashSet;

/// Header commands that are kept as header lines without a warning
const KNOWN_HEADER_COMMANDS: [&str; 8] = [
    "!THEME",
    "!HELP",
    "!KEYWORDS",
    "!HISTORY",
    "!LPUB",
    "!LDCAD",
    "!LEOCAD",
    "!CATEGORY",
];

/// Result of parsing one document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// Part types in order of appearance
    pub part_types: Vec<PartType>,
    /// Main model after parsing, see [`LineParser::with_main_model`]
    pub main_model: Option<String>,
    /// Inline textures from `!DATA` blocks
    pub textures: Vec<InlineTexture>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

impl ParsedDocument {
    /// IDs of all part types placed by the parsed part types, without
    /// duplicates, in order of first reference
    pub fn referenced_ids(&self, texmaps: &[TexmapPlacement]) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut ret = Vec::new();
        let steps = self
            .part_types
            .iter()
            .flat_map(|pt| pt.steps.iter())
            .chain(texmaps.iter().map(|t| &t.fallback));
        for step in steps {
            for sm in &step.sub_models {
                if seen.insert(sm.id.as_str()) {
                    ret.push(sm.id.clone());
                }
            }
        }
        ret
    }
}

/// Parser for LDraw documents
///
/// Direct colors are registered in the color table and texture placements
/// are appended to the shared placement list, so both outlive the parse.
pub struct LineParser<'a> {
    colors: &'a mut ColorTable,
    texmaps: &'a mut Vec<TexmapPlacement>,
    main_model: Option<String>,
}

impl<'a> LineParser<'a> {
    pub fn new(colors: &'a mut ColorTable, texmaps: &'a mut Vec<TexmapPlacement>) -> Self {
        Self {
            colors,
            texmaps,
            main_model: None,
        }
    }

    /// Main model known before this document is parsed
    ///
    /// The first `0 FILE` of a document only becomes the main model when no
    /// main model is known yet.
    pub fn with_main_model(mut self, main_model: Option<String>) -> Self {
        self.main_model = main_model;
        self
    }

    /// Parse a document
    ///
    /// # Arguments
    /// * `content` - Document text
    /// * `default_id` - ID of a part type that has no `0 FILE` line
    pub fn parse(mut self, content: &str, default_id: &str) -> ParsedDocument {
        let lines: Vec<(usize, &str)> = LineScanner::new(content).collect();
        let mut state = DocumentState::new(default_id, self.main_model.take());

        let mut i = 0;
        while i < lines.len() {
            i = self.parse_line(&mut state, &lines, i) + 1;
        }
        state.finish()
    }

    /// Handle the line at `i`, returning the index of the last line consumed
    fn parse_line(&mut self, state: &mut DocumentState, lines: &[(usize, &str)], i: usize) -> usize {
        let (line_no, line) = lines[i];
        let mut tokens = tokenize(line);
        if tokens.len() <= 1 {
            return i;
        }

        let mut line_type = parse_line_type(tokens[0]);
        if line_type == Some(0) && tokens.len() > 2 && state.texmap.is_some() && tokens[1] == "!:" {
            tokens.drain(..2);
            line_type = parse_line_type(tokens[0]);
            if tokens.len() <= 1 {
                return i;
            }
        }
        let is = |command: &str| tokens.len() >= 3 && tokens[1] == command;

        if state.in_no_file {
            if is("FILE") || is("!DATA") {
                state.in_no_file = false;
            } else {
                return i;
            }
        }

        let mut color: ColorId = 0;
        if line_type != Some(0) {
            color = self.read_color(state, tokens[1], line_no);
        }

        if let Some(idx) = state.texmap {
            if self.texmaps[idx].used {
                state.texmap = None;
                state.in_texmap_fallback = false;
            }
        }

        if state.part.model_description.is_none() {
            if let Some(desc) = state.model_description.take() {
                if desc.starts_with("~Unknown part ") {
                    let message = format!("Unknown part \"{}\". It will be shown as a box.", state.part.id);
                    state.error(line_no, message);
                }
                state.part.model_description = Some(desc);
            }
        }

        match line_type {
            Some(0) => return self.parse_meta(state, lines, i, &tokens),
            Some(1) => self.parse_sub_model(state, &tokens, color, line_no),
            Some(kind) => self.parse_primitive(state, &tokens, kind, color, line_no),
            None => {
                state.warn(line_no, format!("Unknown command \"{}\" is ignored.", tokens[0]));
            }
        }
        i
    }

    fn read_color(&mut self, state: &mut DocumentState, token: &str, line_no: usize) -> ColorId {
        match parse_color(token) {
            Some(ColorToken::Direct(rgb)) => self.colors.register_direct(rgb),
            Some(ColorToken::Code(c)) if c == MAIN_COLOR || c == EDGE_COLOR || self.colors.contains(c) => c,
            _ => {
                state.warn(
                    line_no,
                    format!("Unknown color \"{}\". Black (0) will be shown instead.", token),
                );
                0
            }
        }
    }

    /// Target step of primitives: the open step, or the texmap fallback
    fn target_step<'s>(&'s mut self, state: &'s mut DocumentState) -> &'s mut Step {
        match state.texmap {
            Some(idx) if state.in_texmap_fallback => &mut self.texmaps[idx].fallback,
            _ => &mut state.step,
        }
    }

    /// Texmap a new primitive uses, consuming a `NEXT` placement
    fn use_texmap(&mut self, state: &DocumentState) -> Option<TexmapId> {
        match state.texmap {
            Some(idx) if !state.in_texmap_fallback => {
                self.texmaps[idx].mark_used();
                Some(idx)
            }
            _ => None,
        }
    }

    fn parse_sub_model(&mut self, state: &mut DocumentState, tokens: &[&str], color: ColorId, line_no: usize) {
        let floats = if tokens.len() >= 15 {
            parse_floats::<12>(&tokens[2..14])
        } else {
            None
        };
        let Some(f) = floats else {
            state.malformed(line_no, tokens);
            return;
        };

        let position = Vec3::new(f[0], f[1], f[2]);
        #[rustfmt::skip]
        let rotation = Mat3::new(
            f[3], f[4],  f[5],
            f[6], f[7],  f[8],
            f[9], f[10], f[11],
        );
        let id = normalize_id(&tokens[14..].join(" "));
        let cull = state.part.certified_bfc && state.local_cull;
        let mut sub_model = SubModelPlacement::new(color, position, rotation, id, cull, state.invert_next);
        sub_model.texmap = self.use_texmap(state);

        self.target_step(state).add_sub_model(sub_model);
        state.in_header = false;
        state.invert_next = false;
    }

    fn parse_primitive(
        &mut self,
        state: &mut DocumentState,
        tokens: &[&str],
        kind: u8,
        color: ColorId,
        line_no: usize,
    ) {
        let args = &tokens[2..];
        let cull = state.part.certified_bfc && state.local_cull;
        let invert = state.ccw == state.invert_next;

        let parsed = match kind {
            2 => parse_points::<2>(args).map(|[p1, p2]| {
                let mut line = Line::new(color, p1, p2);
                line.texmap = self.use_texmap(state);
                Parsed::Line(line)
            }),
            3 => parse_points::<3>(args).map(|[p1, p2, p3]| {
                let mut triangle = Triangle::new(color, p1, p2, p3, cull, invert);
                triangle.texmap = self.use_texmap(state);
                Parsed::Triangle(triangle)
            }),
            4 => parse_points::<4>(args).map(|[p1, p2, p3, p4]| {
                let mut quad = Quad::new(color, p1, p2, p3, p4, cull, invert);
                quad.texmap = self.use_texmap(state);
                Parsed::Quad(quad)
            }),
            _ => parse_points::<4>(args).map(|[p1, p2, p3, p4]| {
                let mut line = ConditionalLine::new(color, p1, p2, p3, p4);
                line.texmap = self.use_texmap(state);
                Parsed::ConditionalLine(line)
            }),
        };
        let Some(parsed) = parsed else {
            state.malformed(line_no, tokens);
            return;
        };

        let step = self.target_step(state);
        match parsed {
            Parsed::Line(l) => step.add_line(l),
            Parsed::Triangle(t) => {
                if !cull {
                    step.cull = false;
                }
                step.add_triangle(t);
            }
            Parsed::Quad(q) => {
                if !cull {
                    step.cull = false;
                }
                step.add_quad(q);
            }
            Parsed::ConditionalLine(l) => step.add_conditional_line(l),
        }
        state.in_header = false;
        state.invert_next = false;
    }

    /// Handle a type 0 line, returning the index of the last line consumed
    fn parse_meta(
        &mut self,
        state: &mut DocumentState,
        lines: &[(usize, &str)],
        i: usize,
        tokens: &[&str],
    ) -> usize {
        let (line_no, line) = lines[i];
        let is = |command: &str| tokens.len() >= 3 && tokens[1] == command;
        let rest = || tokens[2..].join(" ");
        let mut save_comment = true;

        if is("FILE") {
            state.has_file = true;
            state.handle_file_line(&rest());
            save_comment = false;
        } else if !state.has_file && is("file") {
            state.handle_file_line(&rest());
            save_comment = false;
        } else if is("Name:") {
            state.part.name = rest();
            save_comment = false;
        } else if is("Author:") {
            state.part.author = Some(rest());
            save_comment = false;
        } else if is("!LICENSE") {
            state.part.license = Some(rest());
            save_comment = false;
        } else if is("!LDRAW_ORG") {
            state.part.ldraw_org = Some(rest());
            save_comment = false;
        } else if is("!CMDLINE") {
            state.part.preferred_color = tokens[2]
                .get(2..)
                .and_then(parse_int)
                .and_then(|c| ColorId::try_from(c).ok());
            save_comment = false;
        } else if tokens[1] == "NOFILE" {
            state.in_no_file = true;
            save_comment = false;
        } else if tokens[1] == "BFC" {
            save_comment = state.handle_bfc(tokens);
        } else if tokens[1] == "STEP" {
            state.close_step(true);
            save_comment = false;
        } else if tokens[1] == "ROTSTEP" {
            state.handle_rotstep(tokens, line_no);
            save_comment = false;
        } else if tokens[1] == "!BRICKHUB_INLINED" {
            state.part.inlined = Some(if tokens.len() == 3 {
                Inlined::parse(tokens[2])
            } else {
                Inlined::Other("UNKNOWN".to_string())
            });
            save_comment = false;
        } else if tokens[1] == "!TEXMAP" {
            self.handle_texmap(state, tokens, line_no, line);
            save_comment = false;
        } else if is("!DATA") {
            return self.read_data_block(state, lines, i, tokens);
        } else if tokens[1].starts_with('!') {
            if !KNOWN_HEADER_COMMANDS.contains(&tokens[1]) {
                state.invert_next = false;
                state.warn(line_no, format!("Unknown LDraw command \"{}\" is ignored.", tokens[1]));
            }
        } else {
            state.invert_next = false;
            state.model_description = Some(tokens[1..].join(" "));
            if state.in_header {
                save_comment = false;
            }
        }

        if save_comment {
            let text = tokens[1..].join(" ");
            match state.step.sub_models.last_mut() {
                Some(sm) => sm.comment_lines.push(text),
                None => state.part.header_lines.push(text),
            }
        }
        i
    }

    fn handle_texmap(&mut self, state: &mut DocumentState, tokens: &[&str], line_no: usize, line: &str) {
        if state.texmap.is_some() {
            // Only FALLBACK or END may follow START.
            match (tokens.len(), tokens.get(2).copied()) {
                (3, Some("FALLBACK")) => state.in_texmap_fallback = true,
                (3, Some("END")) => {
                    state.in_texmap_fallback = false;
                    state.texmap = None;
                }
                _ => {
                    state.warn(
                        line_no,
                        format!(
                            "Unexpected !TEXMAP line. Expected FALLBACK or END line. Found: \"{}\".",
                            line
                        ),
                    );
                    state.in_texmap_fallback = false;
                    state.texmap = None;
                }
            }
            return;
        }

        match parse_texmap(self.texmaps.len(), tokens) {
            Ok(placement) => {
                state.texmap = Some(placement.idx);
                self.texmaps.push(placement);
            }
            Err(err) => {
                let message = match err {
                    ldraw_model::LoadError::Texmap(msg) => msg,
                    other => other.to_string(),
                };
                state.warn(line_no, format!("{}: \"{}\"", message, line));
            }
        }
    }

    /// Read a `0 !DATA` block and the `0 !:` lines that follow it
    fn read_data_block(
        &mut self,
        state: &mut DocumentState,
        lines: &[(usize, &str)],
        i: usize,
        tokens: &[&str],
    ) -> usize {
        if tokens[2] != "START" {
            state.handle_file_line(&tokens[2..].join(" "));
        }
        state.skip_part = true;

        let mut encoded = String::new();
        let mut last = i;
        for (j, &(_, data_line)) in lines.iter().enumerate().skip(i + 1) {
            let parts = tokenize(data_line);
            if parts.len() <= 1 {
                last = j;
                continue;
            }
            let is_meta = parts[0] == "0";
            if is_meta && parts.len() == 3 && parts[1] == "!DATA" && parts[2] == "END" {
                last = j;
                break;
            }
            if !(is_meta && parts[1].starts_with("!:")) {
                break;
            }
            encoded.push_str(&parts[1][2..]);
            for part in &parts[2..] {
                encoded.push_str(part);
            }
            last = j;
        }

        let id = state.part.id.clone();
        match decode_inline_texture(&id, &encoded) {
            Ok(texture) => {
                log::debug!("Read inline texture {} ({} bytes)", id, texture.data.len());
                state.textures.push(texture);
            }
            Err(err) => state.warn(lines[i].0, err.to_string()),
        }
        last
    }
}

enum Parsed {
    Line(Line),
    Triangle(Triangle),
    Quad(Quad),
    ConditionalLine(ConditionalLine),
}

/// Mutable state while parsing one document
struct DocumentState {
    default_id: String,
    main_model: Option<String>,
    part: PartType,
    step: Step,
    done: Vec<PartType>,

    ccw: bool,
    local_cull: bool,
    invert_next: bool,

    model_description: Option<String>,
    in_header: bool,
    has_file: bool,
    skip_part: bool,
    in_no_file: bool,
    closed_by_step: bool,

    texmap: Option<TexmapId>,
    in_texmap_fallback: bool,

    textures: Vec<InlineTexture>,
    warnings: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
}

impl DocumentState {
    fn new(default_id: &str, main_model: Option<String>) -> Self {
        Self {
            default_id: default_id.to_lowercase(),
            main_model,
            part: unnamed_part(),
            step: Step::new(),
            done: Vec::new(),
            ccw: true,
            local_cull: true,
            invert_next: false,
            model_description: None,
            in_header: true,
            has_file: false,
            skip_part: false,
            in_no_file: false,
            closed_by_step: false,
            texmap: None,
            in_texmap_fallback: false,
            textures: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn diagnostic(&self, line_no: usize, message: String) -> Diagnostic {
        let mut d = Diagnostic::new(message).at_line(line_no);
        if !self.part.id.is_empty() {
            d = d.in_sub_model(self.part.id.clone());
        }
        d
    }

    fn warn(&mut self, line_no: usize, message: String) {
        let d = self.diagnostic(line_no, message);
        log::warn!("{}", d);
        self.warnings.push(d);
    }

    fn error(&mut self, line_no: usize, message: String) {
        let d = self.diagnostic(line_no, message);
        log::error!("{}", d);
        self.errors.push(d);
    }

    fn malformed(&mut self, line_no: usize, tokens: &[&str]) {
        self.invert_next = false;
        self.warn(
            line_no,
            format!("Malformed line \"{}\" is ignored.", tokens.join(" ")),
        );
    }

    /// Close the open step, optionally carrying its rotation to the next one
    fn close_step(&mut self, keep_rotation: bool) {
        let rotation = self.step.rotation;
        let step = std::mem::take(&mut self.step);
        self.part.add_step(step);
        if keep_rotation {
            self.step.rotation = rotation;
        }
        self.closed_by_step = keep_rotation;
    }

    /// Move the open step into the part type before it is stored
    ///
    /// A step opened by a terminating `0 STEP` is kept even when empty.
    fn close_part(&mut self) {
        let step = std::mem::take(&mut self.step);
        if step.is_empty() && self.closed_by_step && !self.part.steps.is_empty() {
            self.part.steps.push(step);
        } else {
            self.part.add_step(step);
        }
        self.closed_by_step = false;
    }

    fn handle_file_line(&mut self, original_name: &str) {
        let name = normalize_id(original_name);
        self.local_cull = true;
        let is_empty = self.part.steps.is_empty() && self.step.is_empty();

        if is_empty && self.main_model.is_none() {
            self.part.id = name.clone();
            self.main_model = Some(name);
        } else if is_empty && self.main_model.as_deref() == Some(self.part.id.as_str()) {
            log::debug!("Main model ID change from {} to {}", self.part.id, name);
            self.part.id = name.clone();
            self.main_model = Some(name);
        } else if is_empty && self.part.id.is_empty() {
            self.part.id = name;
        } else {
            self.close_part();
            if self.part.id.is_empty() {
                log::warn!("No ID in main model. Using default ID {}", self.default_id);
                self.part.id = self.default_id.clone();
                if self.main_model.is_none() {
                    self.main_model = Some(self.default_id.clone());
                }
            }
            let done = std::mem::replace(&mut self.part, unnamed_part());
            if !self.skip_part {
                self.done.push(done);
            }
            self.skip_part = false;
            self.in_header = true;
            self.part.id = name;
        }
        self.part.name = original_name.to_string();
        self.model_description = None;
    }

    /// Returns whether the line is kept as a comment
    fn handle_bfc(&mut self, tokens: &[&str]) -> bool {
        let mut save_comment = true;
        match tokens.get(2).copied() {
            Some("CERTIFY") => {
                self.part.certified_bfc = true;
                self.ccw = true;
                save_comment = false;
            }
            Some("NOCERTIFY") => {
                self.part.certified_bfc = false;
                self.ccw = true;
                save_comment = false;
            }
            Some("INVERTNEXT") => self.invert_next = true,
            Some("CLIP") => self.local_cull = true,
            Some("NOCLIP") => self.local_cull = false,
            _ => {}
        }
        match tokens.last().copied() {
            Some("CCW") => self.ccw = true,
            Some("CW") => self.ccw = false,
            _ => {}
        }
        self.part.ccw = self.ccw;
        save_comment
    }

    fn handle_rotstep(&mut self, tokens: &[&str], line_no: usize) {
        if tokens.len() >= 5 {
            let kind = if tokens.len() == 5 {
                Some(RotationType::Rel)
            } else {
                RotationType::parse(tokens[5])
            };
            match (parse_floats::<3>(&tokens[2..5]), kind) {
                (Some([x, y, z]), Some(kind)) => {
                    self.step.rotation = Some(StepRotation::new(x, y, z, kind));
                }
                _ => self.warn(
                    line_no,
                    format!("Malformed ROTSTEP \"{}\" is ignored.", tokens.join(" ")),
                ),
            }
        } else if tokens.len() == 3 && tokens[2] == "END" {
            self.step.rotation = None;
        }
        self.close_step(true);
    }

    fn finish(mut self) -> ParsedDocument {
        self.close_part();
        if self.part.id.is_empty() {
            self.part.id = self.default_id.clone();
            if self.main_model.is_none() {
                self.main_model = Some(self.default_id.clone());
            }
        }
        if !self.skip_part {
            self.done.push(self.part);
        }
        ParsedDocument {
            part_types: self.done,
            main_model: self.main_model,
            textures: self.textures,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}

fn unnamed_part() -> PartType {
    PartType::new("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldraw_model::PartTypeMap;

    fn parse(content: &str) -> (ParsedDocument, Vec<TexmapPlacement>) {
        let mut colors = ColorTable::default();
        let mut texmaps = Vec::new();
        let doc = LineParser::new(&mut colors, &mut texmaps).parse(content, "default.ldr");
        (doc, texmaps)
    }

    #[test]
    fn test_scenario_single_file() {
        let content = "0 FILE test.ldr\r\n\
                       0 Test Model\r\n\
                       0 BFC CERTIFY CCW\r\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 sub.dat\r\n\
                       3 4 0 0 0 1 0 0 0 1 0\r\n\
                       0 STEP\r\n";
        let (doc, _) = parse(content);
        assert_eq!(doc.part_types.len(), 1);
        assert_eq!(doc.main_model.as_deref(), Some("test.ldr"));

        let pt = &doc.part_types[0];
        assert_eq!(pt.id, "test.ldr");
        assert_eq!(pt.model_description.as_deref(), Some("Test Model"));
        assert!(pt.certified_bfc);
        assert!(pt.ccw);
        assert_eq!(pt.steps.len(), 2);

        let step = &pt.steps[0];
        assert_eq!(step.sub_models.len(), 1);
        let sm = &step.sub_models[0];
        assert_eq!(sm.id, "sub.dat");
        assert_eq!(sm.color, 16);
        assert!(sm.is_identity_at_origin());
        assert_eq!(step.triangles.len(), 1);
        let t = &step.triangles[0];
        assert_eq!(t.color, 4);
        assert_eq!(t.points(), [Vec3::zeros(), Vec3::x(), Vec3::y()]);
        assert!(t.cull);
        assert!(pt.steps[1].is_empty());
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_winding() {
        let content = "0 BFC CERTIFY CCW\n\
                       0 BFC INVERTNEXT\n\
                       3 4 0 0 0 1 0 0 0 1 0\n\
                       3 4 0 0 0 1 0 0 0 1 0\n\
                       0 BFC CW\n\
                       3 4 0 0 0 1 0 0 0 1 0\n";
        let (doc, _) = parse(content);
        let triangles = &doc.part_types[0].steps[0].triangles;
        assert_eq!(triangles[0].points(), [Vec3::y(), Vec3::x(), Vec3::zeros()]);
        assert_eq!(triangles[1].points(), [Vec3::zeros(), Vec3::x(), Vec3::y()]);
        assert_eq!(triangles[2].points(), [Vec3::y(), Vec3::x(), Vec3::zeros()]);
    }

    #[test]
    fn test_uncertified_clears_cull() {
        let (doc, _) = parse("0 Part\n4 16 0 0 0 1 0 0 1 1 0 0 1 0\n");
        let step = &doc.part_types[0].steps[0];
        assert!(!step.cull);
        assert!(!step.quads[0].cull);

        let (doc, _) = parse("0 BFC CERTIFY\n0 BFC NOCLIP\n3 16 0 0 0 1 0 0 0 1 0\n");
        assert!(!doc.part_types[0].steps[0].cull);
    }

    #[test]
    fn test_multi_part_document() {
        let content = "0 FILE main.ldr\n\
                       1 4 0 0 0 1 0 0 0 1 0 0 0 1 Arm.ldr\n\
                       0 STEP\n\
                       1 1 10 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
                       0 FILE arm.ldr\n\
                       0 Name: arm.ldr\n\
                       0 Author: Someone\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 S\\3001S01.DAT\n";
        let (doc, _) = parse(content);
        let ids: Vec<&str> = doc.part_types.iter().map(|pt| pt.id.as_str()).collect();
        assert_eq!(ids, vec!["main.ldr", "arm.ldr"]);
        assert_eq!(doc.part_types[0].steps.len(), 2);
        assert_eq!(doc.part_types[1].author.as_deref(), Some("Someone"));
        assert_eq!(doc.part_types[1].steps[0].sub_models[0].id, "s/3001s01.dat");
        assert_eq!(
            doc.referenced_ids(&[]),
            vec!["arm.ldr".to_string(), "3001.dat".to_string(), "s/3001s01.dat".to_string()]
        );
    }

    #[test]
    fn test_default_id() {
        let (doc, _) = parse("0 Brick\n0 Name: 3001.dat\n3 16 0 0 0 1 0 0 0 1 0\n");
        assert_eq!(doc.part_types[0].id, "default.ldr");
        assert_eq!(doc.part_types[0].name, "3001.dat");
        assert_eq!(doc.main_model.as_deref(), Some("default.ldr"));
    }

    #[test]
    fn test_existing_main_model_is_kept() {
        let mut colors = ColorTable::default();
        let mut texmaps = Vec::new();
        let doc = LineParser::new(&mut colors, &mut texmaps)
            .with_main_model(Some("model.mpd".to_string()))
            .parse("0 FILE sub.ldr\n1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n", "sub.ldr");
        assert_eq!(doc.main_model.as_deref(), Some("model.mpd"));
        assert_eq!(doc.part_types[0].id, "sub.ldr");
    }

    #[test]
    fn test_rotstep() {
        let content = "1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
                       0 ROTSTEP 10 20 30 ABS\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
                       0 STEP\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
                       0 ROTSTEP END\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";
        let (doc, _) = parse(content);
        let rotations: Vec<Option<StepRotation>> =
            doc.part_types[0].steps.iter().map(|s| s.rotation).collect();
        let abs = Some(StepRotation::new(10.0, 20.0, 30.0, RotationType::Abs));
        assert_eq!(rotations, vec![abs, abs, None, None]);
    }

    #[test]
    fn test_unknown_color_and_direct_color() {
        let mut colors = ColorTable::default();
        let mut texmaps = Vec::new();
        let doc = LineParser::new(&mut colors, &mut texmaps).parse(
            "2 9999 0 0 0 1 1 1\n2 0x2FF8000 0 0 0 1 1 1\n",
            "x.dat",
        );
        let lines = &doc.part_types[0].steps[0].lines;
        assert_eq!(lines[0].color, 0);
        assert_eq!(doc.warnings.len(), 1);
        assert_eq!(
            doc.warnings[0].message,
            "Unknown color \"9999\". Black (0) will be shown instead."
        );
        assert_eq!(lines[1].color, 0x2000000 | 0xFF8000);
        assert!(colors.contains(lines[1].color));
    }

    #[test]
    fn test_most_negative_color_code() {
        let mut colors = ColorTable::default();
        let mut texmaps = Vec::new();
        let doc = LineParser::new(&mut colors, &mut texmaps)
            .parse("2 -2147483648 0 0 0 1 1 1
", "x.dat");
        assert_eq!(doc.part_types[0].steps[0].lines[0].color, 0);
        assert_eq!(
            doc.warnings[0].message,
            "Unknown color \"-2147483648\". Black (0) will be shown instead."
        );
    }

    #[test]
    fn test_malformed_numbers_are_skipped() {
        let (doc, _) = parse("3 4 0 0 0 1 0 x 0 1 0\n2 4 0 0 0 1 1\n2 4 0 0 0 1 1 1\n");
        let step = &doc.part_types[0].steps[0];
        assert!(step.triangles.is_empty());
        assert_eq!(step.lines.len(), 1);
        assert_eq!(doc.warnings.len(), 2);
    }

    #[test]
    fn test_header_and_comments() {
        let content = "0 Minifig\n\
                       0 Name: fig.ldr\n\
                       0 !LDRAW_ORG Unofficial_Model\n\
                       0 !LICENSE Redistributable under CC BY 4.0 : see CAreadme.txt\n\
                       0 !CMDLINE -c4\n\
                       0 !KEYWORDS space\n\
                       0 !FOO bar\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 973.dat\n\
                       0 // torso\n";
        let (doc, _) = parse(content);
        let pt = &doc.part_types[0];
        assert_eq!(pt.model_description.as_deref(), Some("Minifig"));
        assert_eq!(pt.ldraw_org.as_deref(), Some("Unofficial_Model"));
        assert_eq!(pt.preferred_color, Some(4));
        assert_eq!(pt.header_lines, vec!["!KEYWORDS space".to_string(), "!FOO bar".to_string()]);
        assert_eq!(pt.steps[0].sub_models[0].comment_lines, vec!["// torso".to_string()]);
        assert_eq!(doc.warnings.len(), 1);
    }

    #[test]
    fn test_nofile() {
        let content = "0 FILE a.ldr\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
                       0 NOFILE\n\
                       garbage here\n\
                       0 FILE b.ldr\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3002.dat\n";
        let (doc, _) = parse(content);
        assert_eq!(doc.part_types.len(), 2);
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_texmap_block() {
        let content = "0 BFC CERTIFY CCW\n\
                       0 !TEXMAP START PLANAR -20 0 10 20 0 10 -20 0 -10 logo.png\n\
                       0 !: 3 16 -20 0 10 20 0 10 -20 0 -10\n\
                       0 !TEXMAP FALLBACK\n\
                       3 16 -20 0 10 20 0 10 -20 0 -10\n\
                       0 !TEXMAP END\n\
                       0 !TEXMAP NEXT PLANAR -20 0 10 20 0 10 -20 0 -10 logo.png\n\
                       3 16 0 0 0 1 0 0 0 1 0\n\
                       3 16 0 0 0 1 0 0 0 1 0\n";
        let (doc, texmaps) = parse(content);
        assert_eq!(texmaps.len(), 2);
        assert_eq!(texmaps[0].fallback.triangles.len(), 1);
        assert!(texmaps[1].used);

        let step = &doc.part_types[0].steps[0];
        let tags: Vec<Option<TexmapId>> = step.triangles.iter().map(|t| t.texmap).collect();
        assert_eq!(tags, vec![Some(0), Some(1), None]);
        assert!(doc.warnings.is_empty());

        let map = PartTypeMap::new();
        let ldr = doc.part_types[0].to_ldr(&map, &texmaps, true);
        assert!(ldr.contains("0 !TEXMAP START PLANAR -20 0 10 20 0 10 -20 0 -10 logo.png\r\n0 !: 3 16"));
        assert!(ldr.contains("0 !TEXMAP FALLBACK\r\n3 16"));
    }

    #[test]
    fn test_unexpected_texmap_line() {
        let content = "0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 a.png\n\
                       0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 1 0 a.png\n\
                       3 16 0 0 0 1 0 0 0 1 0\n";
        let (doc, _) = parse(content);
        assert_eq!(doc.warnings.len(), 1);
        assert!(doc.part_types[0].steps[0].triangles[0].texmap.is_none());
    }

    #[test]
    fn test_inline_data() {
        let content = "0 FILE model.ldr\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n\
                       0 !DATA face.png\n\
                       0 !: iVBORw0K\n\
                       0 !: Ggo=\n\
                       0 FILE next.ldr\n\
                       1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\n";
        let (doc, _) = parse(content);
        let ids: Vec<&str> = doc.part_types.iter().map(|pt| pt.id.as_str()).collect();
        assert_eq!(ids, vec!["model.ldr", "next.ldr"]);
        assert_eq!(doc.textures.len(), 1);
        assert_eq!(doc.textures[0].id, "face.png");
        assert_eq!(doc.textures[0].data.len(), 8);
    }

    #[test]
    fn test_unknown_part_description() {
        let (doc, _) = parse("0 ~Unknown part 9999.dat\n2 24 0 0 0 1 1 1\n");
        assert_eq!(doc.errors.len(), 1);
    }
}
