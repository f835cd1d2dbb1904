// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry builder
//!
//! Builds and caches the [`LdrGeometry`] of every part type placed in a
//! model, and walks non-part sub-models down to parts so that placed parts
//! reach a [`GeometrySink`].
//!
//! Part geometries are built once per part type and shared through `Arc`.
//! Independent parts are built in parallel with rayon.

use crate::error::{Error, Result};
use crate::geometry::{replace_color, LdrGeometry};
use crate::mesh::GeometrySink;
use ldraw_model::{Diagnostic, PartType, PartTypeMap, Step, SubModelPlacement};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Nesting depth at which a reference chain is treated as a cycle
pub const MAX_DEPTH: usize = 64;

/// Builds part geometry from a loaded part type graph
pub struct GeometryBuilder<'a> {
    part_types: &'a PartTypeMap,
    /// Built geometry by part type ID
    cache: RwLock<FxHashMap<String, Arc<LdrGeometry>>>,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(part_types: &'a PartTypeMap) -> Self {
        Self {
            part_types,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn part_types(&self) -> &'a PartTypeMap {
        self.part_types
    }

    /// Part type for `id`, following replacement redirects
    pub fn resolve(&self, id: &str) -> Result<&'a PartType> {
        let mut pt = self
            .part_types
            .get(id)
            .ok_or_else(|| Error::part_not_loaded(id))?;
        for _ in 0..MAX_DEPTH {
            let Some(replacement) = pt.replacement.as_deref() else {
                return Ok(pt);
            };
            pt = match self.part_types.get(replacement) {
                Some(next) => next,
                None => {
                    log::warn!("Replacement {} of {} is not loaded", replacement, pt.id);
                    return Err(Error::part_not_loaded(replacement));
                }
            };
        }
        Err(Error::geometry(format!("Replacement chain too long at {}", id)))
    }

    // ========================================================================
    // Part geometry
    // ========================================================================

    /// Geometry of a part type in its own coordinates, built on first use
    pub fn part_geometry(&self, id: &str) -> Result<Arc<LdrGeometry>> {
        self.build(id, 0)
    }

    fn build(&self, id: &str, depth: usize) -> Result<Arc<LdrGeometry>> {
        if depth > MAX_DEPTH {
            return Err(Error::geometry(format!(
                "Reference cycle or nesting deeper than {} at {}",
                MAX_DEPTH, id
            )));
        }
        let pt = self.resolve(id)?;
        if let Some(g) = self.cached(&pt.id) {
            return Ok(g);
        }
        if pt.steps_released {
            return Err(Error::geometry(format!(
                "Steps of {} were released before its geometry was built",
                pt.id
            )));
        }

        let built = LdrGeometry::from_part_type(pt, &|sub: &str| self.build(sub, depth + 1))?;
        log::debug!(
            "Built {}: {} vertices, {} triangles",
            pt.id,
            built.vertex_count(),
            built.triangle_count()
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(pt.id.clone()).or_insert_with(|| Arc::new(built)).clone())
    }

    fn cached(&self, id: &str) -> Option<Arc<LdrGeometry>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Build the geometries of `ids` in parallel
    pub fn build_parts(&self, ids: &[String]) -> Result<()> {
        ids.par_iter().try_for_each(|id| self.part_geometry(id).map(|_| ()))
    }

    /// Build every part type flagged as a part
    pub fn build_all_parts(&self) -> Result<()> {
        let ids: Vec<String> = self
            .part_types
            .iter()
            .filter(|pt| pt.is_part && !pt.steps_released)
            .map(|pt| pt.id.clone())
            .collect();
        self.build_parts(&ids)
    }

    /// Build the part geometries a step places directly
    pub fn build_step(&self, step: &Step) -> Result<()> {
        let ids: Vec<String> = step
            .sub_models
            .iter()
            .filter(|sm| self.resolve(&sm.id).is_ok_and(|pt| pt.is_part))
            .map(|sm| sm.id.clone())
            .collect();
        self.build_parts(&ids)
    }

    /// Geometry of a whole step, sub-models flattened
    pub fn step_geometry(&self, step: &Step) -> Result<LdrGeometry> {
        LdrGeometry::from_step(step, &|id: &str| self.part_geometry(id))
    }

    pub fn is_built(&self, id: &str) -> bool {
        self.cached(id).is_some()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    // ========================================================================
    // Placement walk
    // ========================================================================

    /// Send the parts placed by `placement` to `sink`
    ///
    /// A part goes to the sink whole. Any other part type is walked step by
    /// step, composing placements on the way down. Sub-models that fail are
    /// reported to the sink and skipped.
    pub fn generate_part(&self, placement: &SubModelPlacement, sink: &mut dyn GeometrySink) -> Result<()> {
        self.generate_part_at(placement, sink, 0)
    }

    /// Send the primitives and parts of `step`, placed by `parent`, to `sink`
    pub fn generate_step(&self, step: &Step, parent: &SubModelPlacement, sink: &mut dyn GeometrySink) {
        self.generate_step_at(step, parent, sink, 0)
    }

    fn generate_part_at(
        &self,
        placement: &SubModelPlacement,
        sink: &mut dyn GeometrySink,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::geometry(format!(
                "Reference cycle or nesting deeper than {} at {}",
                MAX_DEPTH, placement.id
            )));
        }
        let pt = self.resolve(&placement.id)?;
        if pt.is_part {
            let g = self.part_geometry(&pt.id)?;
            sink.add_geometry(&pt.id, &g, placement);
            return Ok(());
        }
        for step in &pt.steps {
            self.generate_step_at(step, placement, sink, depth);
        }
        Ok(())
    }

    fn generate_step_at(
        &self,
        step: &Step,
        parent: &SubModelPlacement,
        sink: &mut dyn GeometrySink,
        depth: usize,
    ) {
        if step.has_primitives() {
            let g = LdrGeometry::from_primitives(step);
            sink.add_geometry(&parent.id, &g, parent);
        }
        for sm in &step.sub_models {
            let placed = placed_in(sm, parent);
            if let Err(e) = self.generate_part_at(&placed, sink, depth + 1) {
                sink.report_error(Diagnostic::new(e.to_string()).in_sub_model(&parent.id));
            }
        }
    }
}

/// Placement of `sm` in world space, given the placement of its parent
///
/// Contextual colors resolve against the parent's color and culling is
/// only kept if the parent culls too.
pub fn placed_in(sm: &SubModelPlacement, parent: &SubModelPlacement) -> SubModelPlacement {
    let mut placed = sm.place_at(parent);
    placed.color = replace_color(parent.color, sm.color);
    placed.cull = sm.cull && parent.cull;
    placed
}
