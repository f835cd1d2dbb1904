// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Part types
//!
//! A part type is the content of one LDraw file (or one `0 FILE` section of
//! a multi-part document): header metadata plus an ordered list of steps.
//! Whether it is a *part* (a single piece) or a *model* (an assembly of
//! pieces) is not declared by the file but computed once the load graph has
//! closed, see [`PartType::compute_is_part`].

use crate::{
    ColorId, PartTypeLookup, RotationType, Step, StepRotation, TexmapPlacement, LINE_END,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// License string of official, redistributable LDraw parts
pub const OFFICIAL_LICENSE: &str = "Redistributable under CC BY 4.0 : see CAreadme.txt";

/// `!LDRAW_ORG` classifiers that mark a file as an official part
const OFFICIAL_CLASSIFIERS: [&str; 6] = [
    "Part",
    "Primitive",
    "Subpart",
    "8_Primitive",
    "48_Primitive",
    "Shortcut",
];

/// `!LDRAW_ORG` classifiers of primitives and sub-parts
const PRIMITIVE_CLASSIFIERS: [&str; 4] = ["Primitive", "Subpart", "8_Primitive", "48_Primitive"];

/// Where a part type came from when it was not parsed from a fetched file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inlined {
    /// Official part inlined into a document
    Official,
    /// Produced by the primitive generator
    Generated,
    /// Restored from part storage
    Storage,
    /// Any other origin marker
    Other(String),
}

impl Inlined {
    pub fn parse(s: &str) -> Self {
        match s {
            "OFFICIAL" => Inlined::Official,
            "GENERATED" => Inlined::Generated,
            "IDB" => Inlined::Storage,
            other => Inlined::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Inlined::Official => "OFFICIAL",
            Inlined::Generated => "GENERATED",
            Inlined::Storage => "IDB",
            Inlined::Other(s) => s,
        }
    }
}

/// Content of one LDraw file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartType {
    /// Lowercase key in the part type map
    pub id: String,
    /// Name as written in the file
    pub name: String,
    pub model_description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    /// `!LDRAW_ORG` classifier line, for example `Part UPDATE 2004-03`
    pub ldraw_org: Option<String>,
    /// Color from `0 !CMDLINE -cN`
    pub preferred_color: Option<ColorId>,
    /// Additional header lines without the leading `0 `
    pub header_lines: Vec<String>,
    pub steps: Vec<Step>,
    /// Rotation of the most recently added step
    pub last_rotation: Option<StepRotation>,
    /// Set when the part type only redirects to another part type
    pub replacement: Option<String>,
    pub inlined: Option<Inlined>,
    pub is_part: bool,
    pub certified_bfc: bool,
    pub ccw: bool,
    /// Steps have been split by [`PartType::clean_up`]
    pub cleaned: bool,
    /// IDs of the part types that place this one
    pub referenced_from: FxHashSet<String>,
    /// Steps were dropped after all referencing part types were built
    pub steps_released: bool,
}

impl PartType {
    pub fn new(id: impl Into<String>) -> Self {
        let name: String = id.into();
        Self {
            id: name.to_lowercase(),
            name,
            model_description: None,
            author: None,
            license: None,
            ldraw_org: None,
            preferred_color: None,
            header_lines: Vec::new(),
            steps: Vec::new(),
            last_rotation: None,
            replacement: None,
            inlined: None,
            is_part: false,
            certified_bfc: false,
            ccw: true,
            cleaned: false,
            referenced_from: FxHashSet::default(),
            steps_released: false,
        }
    }

    /// Append a step
    ///
    /// `ADD` rotations are resolved against the previous rotation here, so no
    /// stored step ever carries an `ADD` rotation. Empty steps that do not
    /// change the rotation are dropped, and an empty previous step with the
    /// same rotation is replaced by the new step.
    pub fn add_step(&mut self, mut step: Step) {
        if step.is_empty() && self.steps.is_empty() {
            return;
        }

        if let Some(rotation) = step.rotation.as_mut() {
            if rotation.kind == RotationType::Add {
                *rotation = match &self.last_rotation {
                    None => StepRotation::new(rotation.x, rotation.y, rotation.z, RotationType::Rel),
                    Some(last) => StepRotation::new(
                        rotation.x + last.x,
                        rotation.y + last.y,
                        rotation.z + last.z,
                        last.kind,
                    ),
                };
            }
        }

        let same_rotation =
            StepRotation::equals(step.rotation.as_ref(), self.last_rotation.as_ref());
        if step.is_empty() && same_rotation {
            return;
        }
        if let Some(prev) = self.steps.last_mut() {
            if prev.is_empty() && same_rotation {
                *prev = step;
                return;
            }
        }
        self.last_rotation = step.rotation;
        self.steps.push(step);
    }

    /// Drop trailing empty steps that do not change the rotation
    pub fn drop_trailing_empty_steps(&mut self) {
        while let Some(last) = self.steps.last() {
            if !last.is_empty() {
                break;
            }
            let prev_rotation = self
                .steps
                .len()
                .checked_sub(2)
                .and_then(|i| self.steps[i].rotation.as_ref());
            if !StepRotation::equals(last.rotation.as_ref(), prev_rotation) {
                break;
            }
            self.steps.pop();
        }
    }

    fn classifier(&self) -> Option<&str> {
        self.ldraw_org
            .as_deref()
            .and_then(|s| s.split_whitespace().next())
    }

    /// Official LDraw part, primitive, sub-part or shortcut
    pub fn is_official_ldraw(&self) -> bool {
        self.classifier()
            .is_some_and(|c| OFFICIAL_CLASSIFIERS.contains(&c))
    }

    /// Primitive or sub-part by its `!LDRAW_ORG` classifier
    pub fn is_primitive(&self) -> bool {
        self.classifier()
            .is_some_and(|c| PRIMITIVE_CLASSIFIERS.contains(&c))
    }

    /// Decide whether this part type is a single piece
    pub fn compute_is_part(&self, lookup: &dyn PartTypeLookup) -> bool {
        if self.steps.len() != 1 {
            return false;
        }
        let step = &self.steps[0];
        if step.has_primitives() {
            return true;
        }
        if self.is_official_ldraw() {
            return true;
        }
        for sm in &step.sub_models {
            if let Some(pt) = lookup.part_type(&sm.id) {
                if pt.is_primitive() {
                    return true;
                }
                if pt.steps.len() != 1 {
                    return false;
                }
            }
        }
        self.id.ends_with(".dat")
    }

    /// A part consisting of exactly one unmodified placement of another part
    pub fn is_replaced_part(&self) -> bool {
        if !self.is_part {
            return false;
        }
        let Some(step) = self.steps.first() else {
            return false;
        };
        !step.has_primitives()
            && step.sub_models.len() == 1
            && step.sub_models[0].is_identity_at_origin()
    }

    /// Split steps into homogeneous steps, or mark the part type as a redirect
    ///
    /// Runs once; later calls are no-ops.
    pub fn clean_up(&mut self, lookup: &dyn PartTypeLookup) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        if self.is_replaced_part() {
            self.replacement = Some(self.steps[0].sub_models[0].id.clone());
            return;
        }
        let steps = std::mem::take(&mut self.steps);
        self.steps = steps
            .into_iter()
            .flat_map(|step| step.split(lookup))
            .collect();
    }

    /// Remove every placement of `id`, then every step left empty
    ///
    /// Parts are never modified.
    pub fn purge_part(&mut self, id: &str) {
        if self.is_part {
            return;
        }
        for step in self.steps.iter_mut() {
            step.purge(id);
        }
        self.steps.retain(|step| !step.is_empty());
    }

    /// Number of parts placed by this part type
    pub fn count_parts(&self, lookup: &dyn PartTypeLookup) -> usize {
        if self.is_part {
            return 1;
        }
        self.steps.iter().map(|step| step.count_parts(lookup)).sum()
    }

    /// Whether the part type may be saved to shared part storage
    ///
    /// Only official parts under the standard license qualify.
    pub fn can_be_packed(&self) -> bool {
        matches!(self.inlined, None | Some(Inlined::Official))
            && self.is_part
            && self.license.as_deref() == Some(OFFICIAL_LICENSE)
            && self
                .ldraw_org
                .as_deref()
                .is_some_and(|org| !org.starts_with("Unofficial_"))
    }

    /// BFC state as `2 * ccw + certified`
    pub fn encode_header(&self) -> i32 {
        (if self.ccw { 2 } else { 0 }) + i32::from(self.certified_bfc)
    }

    pub fn decode_header(&mut self, encoded: i32) {
        self.certified_bfc = encoded % 2 == 1;
        self.ccw = (encoded / 2) % 2 == 1;
    }

    /// LDraw text of the part type
    ///
    /// `skip_file` omits the `0 FILE` line, as for single-file documents.
    pub fn to_ldr(
        &self,
        lookup: &dyn PartTypeLookup,
        texmaps: &[TexmapPlacement],
        skip_file: bool,
    ) -> String {
        let mut ret = String::new();
        if !skip_file {
            ret.push_str(&format!("0 FILE {}{}", self.id, LINE_END));
        }
        if let Some(desc) = &self.model_description {
            ret.push_str(&format!("0 {}{}", desc, LINE_END));
        }
        if !self.name.is_empty() {
            ret.push_str(&format!("0 Name: {}{}", self.name, LINE_END));
        }
        if let Some(author) = &self.author {
            ret.push_str(&format!("0 Author: {}{}", author, LINE_END));
        }
        if let Some(org) = &self.ldraw_org {
            ret.push_str(&format!("0 !LDRAW_ORG {}{}", org, LINE_END));
        }
        if let Some(license) = &self.license {
            ret.push_str(&format!("0 !LICENSE {}{}", license, LINE_END));
        }
        if self.is_part {
            if self.certified_bfc {
                let winding = if self.ccw { "CCW" } else { "CW" };
                ret.push_str(&format!("0 BFC CERTIFY {}{}", winding, LINE_END));
            } else {
                ret.push_str("0 BFC NOCERTIFY\r\n");
            }
        }

        if !self.header_lines.is_empty() {
            ret.push_str(LINE_END);
            let mut any_history = false;
            for line in &self.header_lines {
                if !any_history && line.starts_with("!HISTORY") {
                    ret.push_str(LINE_END);
                    any_history = true;
                }
                ret.push_str(&format!("0 {}{}", line, LINE_END));
            }
        }
        if let Some(color) = self.preferred_color {
            ret.push_str(&format!("\r\n0 !CMDLINE -c{}{}", color, LINE_END));
        }

        if !self.steps.is_empty() {
            ret.push_str(LINE_END);
            let last = self.steps.len() - 1;
            for (idx, step) in self.steps.iter().enumerate() {
                let prev = if idx == 0 {
                    None
                } else {
                    self.steps[idx - 1].rotation.as_ref()
                };
                ret.push_str(&step.to_ldr(lookup, texmaps, prev, idx == last));
            }
        }
        ret.push_str(LINE_END);
        ret
    }
}
