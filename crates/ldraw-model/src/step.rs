// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building steps
//!
//! A step holds primitives and sub-model placements. After clean-up every
//! step either places sub-assemblies of one type and color only, or is a
//! leaf step holding parts and primitives.

use crate::{
    ConditionalLine, Line, LoadError, PartTypeLookup, Primitive, Quad, Result, StepRotation,
    SubModelPlacement, TexmapId, TexmapPlacement, Triangle,
};
use crate::ColorId;
use serde::{Deserialize, Serialize};

/// One building step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub sub_models: Vec<SubModelPlacement>,
    pub lines: Vec<Line>,
    pub triangles: Vec<Triangle>,
    pub quads: Vec<Quad>,
    pub conditional_lines: Vec<ConditionalLine>,
    pub rotation: Option<StepRotation>,
    /// Cleared once any face must be drawn double-sided
    pub cull: bool,
}

impl Default for Step {
    fn default() -> Self {
        Self::new()
    }
}

impl Step {
    pub fn new() -> Self {
        Self {
            sub_models: Vec::new(),
            lines: Vec::new(),
            triangles: Vec::new(),
            quads: Vec::new(),
            conditional_lines: Vec::new(),
            rotation: None,
            cull: true,
        }
    }

    /// Empty step carrying over a rotation
    pub fn with_rotation(rotation: Option<StepRotation>) -> Self {
        Self {
            rotation,
            ..Self::new()
        }
    }

    pub fn add_sub_model(&mut self, sub_model: SubModelPlacement) {
        self.sub_models.push(sub_model);
    }

    pub fn add_line(&mut self, line: Line) {
        self.lines.push(line);
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn add_quad(&mut self, quad: Quad) {
        self.quads.push(quad);
    }

    pub fn add_conditional_line(&mut self, line: ConditionalLine) {
        self.conditional_lines.push(line);
    }

    pub fn add_primitive(&mut self, primitive: Primitive) {
        match primitive {
            Primitive::Line(l) => self.lines.push(l),
            Primitive::Triangle(t) => self.triangles.push(t),
            Primitive::Quad(q) => self.quads.push(q),
            Primitive::ConditionalLine(l) => self.conditional_lines.push(l),
        }
    }

    pub fn has_primitives(&self) -> bool {
        !self.lines.is_empty()
            || !self.conditional_lines.is_empty()
            || !self.triangles.is_empty()
            || !self.quads.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_models.is_empty() && !self.has_primitives()
    }

    pub fn primitive_count(&self) -> usize {
        self.lines.len() + self.triangles.len() + self.quads.len() + self.conditional_lines.len()
    }

    /// All primitives in file order per kind
    pub fn primitives(&self) -> Vec<Primitive> {
        let mut ret = Vec::with_capacity(self.primitive_count());
        ret.extend(self.lines.iter().cloned().map(Primitive::Line));
        ret.extend(self.triangles.iter().cloned().map(Primitive::Triangle));
        ret.extend(self.quads.iter().cloned().map(Primitive::Quad));
        ret.extend(
            self.conditional_lines
                .iter()
                .cloned()
                .map(Primitive::ConditionalLine),
        );
        ret
    }

    /// Whether the step places sub-assemblies. Only the first placement is
    /// checked since clean-up never mixes parts and sub-assemblies.
    pub fn contains_non_part_sub_models(&self, lookup: &dyn PartTypeLookup) -> bool {
        self.sub_models
            .first()
            .and_then(|sm| lookup.part_type(&sm.id))
            .is_some_and(|pt| !pt.is_part)
    }

    pub fn contains_part_sub_models(&self, lookup: &dyn PartTypeLookup) -> bool {
        self.sub_models
            .first()
            .and_then(|sm| lookup.part_type(&sm.id))
            .is_some_and(|pt| pt.is_part)
    }

    /// Number of parts placed by this step, counting into sub-assemblies
    pub fn count_parts(&self, lookup: &dyn PartTypeLookup) -> usize {
        self.sub_models
            .iter()
            .map(|sm| match lookup.part_type(&sm.id) {
                None => {
                    log::warn!("Unknown part type: {}", sm.id);
                    0
                }
                Some(pt) if pt.is_part => 1,
                Some(pt) => pt.count_parts(lookup),
            })
            .sum()
    }

    /// Copy of a placement-only step with contextual colors replaced
    pub fn clone_colored(&self, color: ColorId) -> Result<Step> {
        if self.has_primitives() {
            return Err(LoadError::other("Cannot clone step with primitives"));
        }
        Ok(Step {
            sub_models: self
                .sub_models
                .iter()
                .map(|sm| sm.clone_colored(color))
                .collect(),
            rotation: self.rotation,
            ..Step::new()
        })
    }

    /// Split the step into homogeneous steps
    ///
    /// Sub-assemblies are grouped by color and type (in order of first
    /// appearance), followed by one leaf step holding the parts and the
    /// primitives. A step without sub-assemblies is kept as it is. Unknown
    /// part types count as parts.
    pub fn split(self, lookup: &dyn PartTypeLookup) -> Vec<Step> {
        let has_assemblies = self
            .sub_models
            .iter()
            .any(|sm| lookup.part_type(&sm.id).is_some_and(|pt| !pt.is_part));
        if !has_assemblies {
            return vec![self];
        }

        let Step {
            sub_models,
            lines,
            triangles,
            quads,
            conditional_lines,
            rotation,
            cull,
        } = self;
        let mut parts = Vec::new();
        let mut groups: Vec<(String, Vec<SubModelPlacement>)> = Vec::new();

        for sm in sub_models {
            match lookup.part_type(&sm.id) {
                Some(pt) if !pt.is_part => {
                    let key = format!("{}_{}", sm.color, pt.id);
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, group)) => group.push(sm),
                        None => groups.push((key, vec![sm])),
                    }
                }
                _ => parts.push(sm),
            }
        }

        let mut ret: Vec<Step> = groups
            .into_iter()
            .map(|(_, sub_models)| Step {
                sub_models,
                rotation,
                ..Step::new()
            })
            .collect();
        let leaf = Step {
            sub_models: parts,
            lines,
            triangles,
            quads,
            conditional_lines,
            rotation,
            cull,
        };
        if !leaf.is_empty() {
            ret.push(leaf);
        }
        ret
    }

    /// Remove all placements of `id`
    pub fn purge(&mut self, id: &str) {
        self.sub_models.retain(|sm| sm.id != id);
    }

    /// IDs of texmap placements referenced by the step, without duplicates
    pub fn texmap_ids(&self) -> Vec<TexmapId> {
        let mut ret: Vec<TexmapId> = Vec::new();
        let ids = self
            .sub_models
            .iter()
            .filter_map(|sm| sm.texmap)
            .chain(self.lines.iter().filter_map(|l| l.texmap))
            .chain(self.triangles.iter().filter_map(|t| t.texmap))
            .chain(self.quads.iter().filter_map(|q| q.texmap))
            .chain(self.conditional_lines.iter().filter_map(|l| l.texmap));
        for id in ids {
            if !ret.contains(&id) {
                ret.push(id);
            }
        }
        ret
    }

    /// LDraw text of the step, terminated by `STEP` or `ROTSTEP` as needed
    ///
    /// Texture mapped lines are written first inside their `!TEXMAP` blocks.
    pub fn to_ldr(
        &self,
        lookup: &dyn PartTypeLookup,
        texmaps: &[TexmapPlacement],
        prev_rotation: Option<&StepRotation>,
        is_last_step: bool,
    ) -> String {
        let mut ret = String::new();
        let sub_model_text =
            |sm: &SubModelPlacement| sm.to_ldr(&resolved_id(lookup, &sm.id));

        for idx in self.texmap_ids() {
            let Some(texmap) = texmaps.get(idx) else {
                continue;
            };
            let mut lines: Vec<String> = Vec::new();
            lines.extend(
                self.sub_models
                    .iter()
                    .filter(|sm| sm.texmap == Some(idx))
                    .map(sub_model_text),
            );
            lines.extend(
                self.lines
                    .iter()
                    .filter(|l| l.texmap == Some(idx))
                    .map(Line::to_ldr),
            );
            lines.extend(
                self.triangles
                    .iter()
                    .filter(|t| t.texmap == Some(idx))
                    .map(Triangle::to_ldr),
            );
            lines.extend(
                self.quads
                    .iter()
                    .filter(|q| q.texmap == Some(idx))
                    .map(Quad::to_ldr),
            );
            lines.extend(
                self.conditional_lines
                    .iter()
                    .filter(|l| l.texmap == Some(idx))
                    .map(ConditionalLine::to_ldr),
            );
            ret.push_str(&texmap.to_ldr(&lines, lookup, texmaps));
        }

        for sm in self.sub_models.iter().filter(|sm| sm.texmap.is_none()) {
            ret.push_str(&sub_model_text(sm));
        }
        for line in self.lines.iter().filter(|l| l.texmap.is_none()) {
            ret.push_str(&line.to_ldr());
        }
        for t in self.triangles.iter().filter(|t| t.texmap.is_none()) {
            ret.push_str(&t.to_ldr());
        }
        for q in self.quads.iter().filter(|q| q.texmap.is_none()) {
            ret.push_str(&q.to_ldr());
        }
        for l in self.conditional_lines.iter().filter(|l| l.texmap.is_none()) {
            ret.push_str(&l.to_ldr());
        }

        match &self.rotation {
            None if prev_rotation.is_some() => ret.push_str("0 ROTSTEP END\r\n"),
            None if !is_last_step => ret.push_str("0 STEP\r\n"),
            None => {}
            Some(rotation) if StepRotation::equals(Some(rotation), prev_rotation) => {
                ret.push_str("0 STEP\r\n")
            }
            Some(rotation) => ret.push_str(&rotation.to_ldr()),
        }
        ret
    }
}

/// Name a placement is written with: the loaded part type's ID when known
fn resolved_id(lookup: &dyn PartTypeLookup, id: &str) -> String {
    lookup
        .part_type(id)
        .map(|pt| pt.id.clone())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mat3, PartType, PartTypeMap, RotationType, Vec3};

    fn map_with(parts: &[(&str, bool)]) -> PartTypeMap {
        let mut map = PartTypeMap::new();
        for (id, is_part) in parts {
            let mut pt = PartType::new(*id);
            pt.is_part = *is_part;
            map.insert(pt);
        }
        map
    }

    fn sm(color: ColorId, id: &str) -> SubModelPlacement {
        SubModelPlacement::new(color, Vec3::zeros(), Mat3::identity(), id, true, false)
    }

    #[test]
    fn test_empty_and_primitives() {
        let mut step = Step::new();
        assert!(step.is_empty());
        step.add_conditional_line(ConditionalLine::new(
            24,
            Vec3::zeros(),
            Vec3::x(),
            Vec3::y(),
            Vec3::z(),
        ));
        assert!(step.has_primitives());
        assert!(!step.is_empty());
        assert_eq!(step.primitives().len(), 1);
    }

    #[test]
    fn test_split_mixed_step() {
        let map = map_with(&[("3001.dat", true), ("arm.ldr", false), ("leg.ldr", false)]);
        let mut step = Step::new();
        step.rotation = Some(StepRotation::new(0.0, 45.0, 0.0, RotationType::Rel));
        step.add_sub_model(sm(4, "3001.dat"));
        step.add_sub_model(sm(1, "arm.ldr"));
        step.add_sub_model(sm(1, "leg.ldr"));
        step.add_sub_model(sm(1, "arm.ldr"));
        step.add_sub_model(sm(2, "arm.ldr"));
        step.add_sub_model(sm(4, "unknown.dat"));

        let steps = step.split(&map);
        let ids: Vec<Vec<(ColorId, &str)>> = steps
            .iter()
            .map(|s| s.sub_models.iter().map(|sm| (sm.color, sm.id.as_str())).collect())
            .collect();
        assert_eq!(
            ids,
            vec![
                vec![(1, "arm.ldr"), (1, "arm.ldr")],
                vec![(1, "leg.ldr")],
                vec![(2, "arm.ldr")],
                vec![(4, "3001.dat"), (4, "unknown.dat")],
            ]
        );
        assert!(steps.iter().all(|s| s.rotation == step_rotation()));
    }

    fn step_rotation() -> Option<StepRotation> {
        Some(StepRotation::new(0.0, 45.0, 0.0, RotationType::Rel))
    }

    #[test]
    fn test_split_is_stable() {
        let map = map_with(&[("3001.dat", true), ("arm.ldr", false)]);
        let mut step = Step::new();
        step.add_sub_model(sm(1, "arm.ldr"));
        step.add_sub_model(sm(4, "3001.dat"));
        let once = step.split(&map);
        let twice: Vec<Step> = once.clone().into_iter().flat_map(|s| s.split(&map)).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_split_moves_primitives_out_of_assembly_step() {
        let map = map_with(&[("3001.dat", true), ("arm.ldr", false)]);
        let mut step = Step::new();
        step.cull = false;
        step.add_sub_model(sm(1, "arm.ldr"));
        step.add_sub_model(sm(4, "3001.dat"));
        step.add_triangle(Triangle::new(4, Vec3::zeros(), Vec3::x(), Vec3::y(), true, false));
        step.add_line(Line::new(24, Vec3::zeros(), Vec3::x()));

        let steps = step.split(&map);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].sub_models.len(), 1);
        assert_eq!(steps[0].sub_models[0].id, "arm.ldr");
        assert!(!steps[0].has_primitives());
        assert_eq!(steps[1].sub_models[0].id, "3001.dat");
        assert_eq!(steps[1].triangles.len(), 1);
        assert_eq!(steps[1].lines.len(), 1);
        assert!(!steps[1].cull);
        assert!(!steps[1].contains_non_part_sub_models(&map));

        let twice: Vec<Step> = steps.clone().into_iter().flat_map(|s| s.split(&map)).collect();
        assert_eq!(steps, twice);
    }

    #[test]
    fn test_split_keeps_leaf_step() {
        let map = map_with(&[("3001.dat", true)]);
        let mut step = Step::new();
        step.add_sub_model(sm(4, "3001.dat"));
        step.add_triangle(Triangle::new(4, Vec3::zeros(), Vec3::x(), Vec3::y(), true, false));
        assert_eq!(step.clone().split(&map), vec![step]);
    }

    #[test]
    fn test_contains_sub_models() {
        let map = map_with(&[("3001.dat", true), ("arm.ldr", false)]);
        let mut parts = Step::new();
        parts.add_sub_model(sm(4, "3001.dat"));
        assert!(parts.contains_part_sub_models(&map));
        assert!(!parts.contains_non_part_sub_models(&map));

        let mut assembly = Step::new();
        assembly.add_sub_model(sm(4, "arm.ldr"));
        assert!(assembly.contains_non_part_sub_models(&map));
        assert!(!Step::new().contains_part_sub_models(&map));
    }

    #[test]
    fn test_clone_colored() {
        let mut step = Step::new();
        step.add_sub_model(sm(16, "3001.dat"));
        step.add_sub_model(sm(24, "3001.dat"));
        let colored = step.clone_colored(4).unwrap();
        assert_eq!(colored.sub_models[0].color, 4);
        assert_eq!(colored.sub_models[1].color, -5);

        step.add_line(Line::new(24, Vec3::zeros(), Vec3::x()));
        assert!(step.clone_colored(4).is_err());
    }

    #[test]
    fn test_to_ldr_terminators() {
        let map = PartTypeMap::new();
        let mut step = Step::new();
        step.add_sub_model(sm(4, "3001.dat"));
        assert!(step.to_ldr(&map, &[], None, false).ends_with("3001.dat\r\n0 STEP\r\n"));
        assert!(step.to_ldr(&map, &[], None, true).ends_with("3001.dat\r\n"));

        let prev = StepRotation::new(10.0, 0.0, 0.0, RotationType::Abs);
        assert!(step.to_ldr(&map, &[], Some(&prev), true).ends_with("0 ROTSTEP END\r\n"));

        step.rotation = Some(prev);
        assert!(step.to_ldr(&map, &[], Some(&prev), false).ends_with("0 STEP\r\n"));
        assert!(step
            .to_ldr(&map, &[], None, false)
            .ends_with("0 ROTSTEP 10 0 0 ABS\r\n"));
    }

    #[test]
    fn test_count_parts() {
        let mut map = map_with(&[("3001.dat", true)]);
        let mut sub = PartType::new("sub.ldr");
        let mut inner = Step::new();
        inner.add_sub_model(sm(4, "3001.dat"));
        inner.add_sub_model(sm(4, "3001.dat"));
        sub.steps.push(inner);
        map.insert(sub);

        let mut step = Step::new();
        step.add_sub_model(sm(1, "sub.ldr"));
        step.add_sub_model(sm(1, "3001.dat"));
        step.add_sub_model(sm(1, "missing.dat"));
        assert_eq!(step.count_parts(&map), 3);
    }
}
