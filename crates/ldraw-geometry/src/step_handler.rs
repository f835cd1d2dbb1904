// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Step-by-step building instructions
//!
//! A [`StepStateMachine`] walks the steps of one part type placed one or
//! more times. Steps that place a sub-assembly own a child machine over the
//! sub-assembly's steps, so the machines form a tree mirroring the model.
//!
//! `current` ranges over `-1..=N` for `N` steps:
//!
//! - `-1` is the pre-step, nothing is shown yet
//! - `0..N` show the steps
//! - `N` is the placement step, where every placement of the part type is
//!   shown, ready to be put onto the parent
//!
//! Built geometry is cached per step and only hidden when walking back, so
//! walking forth again does not rebuild it.

use crate::bounds::{union_of, BoundingBox};
use crate::builder::{placed_in, GeometryBuilder};
use crate::camera::CameraFraming;
use crate::error::{Error, Result};
use crate::mesh::{GeometrySink, MeshCollector, RenderMode};
use ldraw_model::{
    ColorTable, Diagnostic, Mat3, PartType, StepRotation, SubModelPlacement, Vec3, MAIN_COLOR,
};

/// Steps walked by [`StepStateMachine::move_steps`] between progress reports
pub const MOVE_BATCH_SIZE: i64 = 10;

pub struct StepStateMachine<'a> {
    builder: &'a GeometryBuilder<'a>,
    colors: &'a ColorTable,
    mode: RenderMode,
    part: &'a PartType,
    /// All placements of the part type. The first one is built step by step.
    placements: Vec<SubModelPlacement>,
    is_for_main_model: bool,
    current: isize,
    mesh_collectors: Vec<Option<MeshCollector<'a>>>,
    children: Vec<Option<StepStateMachine<'a>>>,
    /// The other placements, shown at the placement step
    extras: Option<MeshCollector<'a>>,
    /// Own bounds per step, plus one for the placement step
    bounds: Vec<Option<BoundingBox>>,
    /// Union of the bounds up to and including each step
    accumulated: Vec<Option<BoundingBox>>,
    total_number_of_steps: usize,
    first_shown_index: usize,
}

impl<'a> StepStateMachine<'a> {
    /// Machine over the steps of `placements[0]`
    ///
    /// # Arguments
    /// * `builder` - Geometry builder over the loaded part types
    /// * `colors` - Color table for the mesh collectors
    /// * `mode` - How faces are colored
    /// * `placements` - Placements of one part type, all of the same color
    pub fn new(
        builder: &'a GeometryBuilder<'a>,
        colors: &'a ColorTable,
        mode: RenderMode,
        placements: Vec<SubModelPlacement>,
    ) -> Result<Self> {
        let first = placements
            .first()
            .ok_or_else(|| Error::illegal_state("No placements to build"))?;
        let part = builder.resolve(&first.id)?;

        let n = part.steps.len();
        let mut children = Vec::with_capacity(n);
        for step in &part.steps {
            let is_assembly_step = step
                .sub_models
                .first()
                .is_some_and(|sm| builder.resolve(&sm.id).is_ok_and(|pt| !pt.is_part));
            if is_assembly_step {
                let placed = step.sub_models.iter().map(|sm| placed_in(sm, first)).collect();
                children.push(Some(StepStateMachine::new(builder, colors, mode, placed)?));
            } else {
                children.push(None);
            }
        }

        let mut ret = Self {
            builder,
            colors,
            mode,
            part,
            placements,
            is_for_main_model: false,
            current: -1,
            mesh_collectors: (0..n).map(|_| None).collect(),
            children,
            extras: None,
            bounds: vec![None; n + 1],
            accumulated: vec![None; n + 1],
            total_number_of_steps: 0,
            first_shown_index: 0,
        };
        ret.recompute_step_indices(0);
        Ok(ret)
    }

    /// Machine over the main model of the builder's graph
    ///
    /// Step indices start at 1.
    pub fn for_main_model(
        builder: &'a GeometryBuilder<'a>,
        colors: &'a ColorTable,
        mode: RenderMode,
    ) -> Result<Self> {
        let main = builder.part_types().main_model()?;
        let color = main.preferred_color.unwrap_or(MAIN_COLOR);
        let placement = SubModelPlacement::at_origin(color, main.id.as_str());
        let mut ret = Self::new(builder, colors, mode, vec![placement])?;
        ret.is_for_main_model = true;
        ret.recompute_step_indices(1);
        Ok(ret)
    }

    pub fn part(&self) -> &'a PartType {
        self.part
    }

    pub fn placements(&self) -> &[SubModelPlacement] {
        &self.placements
    }

    pub fn current(&self) -> isize {
        self.current
    }

    fn step_count(&self) -> usize {
        self.part.steps.len()
    }

    /// Index of the current step, if it is a real step
    fn current_index(&self) -> Option<usize> {
        usize::try_from(self.current)
            .ok()
            .filter(|&i| i < self.step_count())
    }

    fn active_child(&self) -> Option<&StepStateMachine<'a>> {
        self.current_index().and_then(|i| self.children[i].as_ref())
    }

    // ========================================================================
    // Walking
    // ========================================================================

    /// Walk one step forward
    ///
    /// Returns false at the placement step, where the parent has to take
    /// over.
    pub fn next_step(&mut self) -> bool {
        if self.is_at_placement_step() {
            return false;
        }
        let n = self.step_count();
        let will_step = self
            .active_child()
            .map_or(true, StepStateMachine::is_at_placement_step);

        if will_step && self.current + 1 == n as isize {
            self.draw_extras();
            self.current += 1;
            return true;
        }
        if will_step {
            self.current += 1;
        }
        let cur = self.current as usize;

        if self.children[cur].is_none() {
            match self.mesh_collectors[cur].as_mut() {
                Some(mc) => mc.set_visible(true),
                None => {
                    let mut mc = MeshCollector::new(self.colors, self.mode);
                    self.builder
                        .generate_step(&self.part.steps[cur], &self.placements[0], &mut mc);
                    self.mesh_collectors[cur] = Some(mc);
                }
            }
            let own = self.mesh_collectors[cur].as_ref().and_then(|mc| mc.bounds().copied());
            self.set_current_bounds(own);
            return true;
        }

        let entering = self.children[cur]
            .as_ref()
            .is_some_and(StepStateMachine::is_at_pre_step);
        if entering {
            // Earlier steps are hidden while the sub-assembly is built
            self.set_visible_up_to(false, cur);
        }
        let finished = match self.children[cur].as_mut() {
            Some(child) => {
                child.next_step();
                child
                    .is_at_placement_step()
                    .then(|| child.accumulated[child.step_count()])
            }
            None => None,
        };
        if let Some(child_bounds) = finished {
            self.set_current_bounds(child_bounds);
            self.set_visible_up_to(true, cur);
        }
        true
    }

    /// Walk one step back
    ///
    /// Returns false at the pre-step.
    pub fn prev_step(&mut self) -> bool {
        if self.is_at_pre_step() {
            return false;
        }
        if self.is_at_placement_step() {
            if let Some(extras) = self.extras.as_mut() {
                extras.set_visible(false);
            }
            self.current -= 1;
            return true;
        }

        let cur = self.current as usize;
        let Some(child) = self.children[cur].as_ref() else {
            if let Some(mc) = self.mesh_collectors[cur].as_mut() {
                mc.set_visible(false);
            }
            self.current -= 1;
            return true;
        };

        if child.is_at_placement_step() {
            self.set_visible_up_to(false, cur);
        }
        let left = match self.children[cur].as_mut() {
            Some(child) => {
                child.prev_step();
                child.is_at_pre_step()
            }
            None => false,
        };
        if left {
            self.set_visible_up_to(true, cur);
            self.current -= 1;
        }
        true
    }

    /// Walk `n` steps, forward for positive `n`
    ///
    /// Stops early at either end of the walk. `on_batch` is called with the
    /// steps walked so far after every [`MOVE_BATCH_SIZE`] steps, so a host
    /// can redraw during long walks.
    ///
    /// # Returns
    /// The signed number of steps walked
    pub fn move_steps(&mut self, n: i64, on_batch: &mut dyn FnMut(i64)) -> i64 {
        let direction = n.signum();
        let mut walked: i64 = 0;
        while walked.unsigned_abs() < n.unsigned_abs() {
            let moved = if direction > 0 {
                self.next_step()
            } else {
                self.prev_step()
            };
            if !moved {
                break;
            }
            walked += 1;
            if walked % MOVE_BATCH_SIZE == 0 {
                on_batch(walked * direction);
            }
        }
        self.clean_up_after_walking();
        walked * direction
    }

    /// Walk to the last step of the active sub-assembly, or of the next one
    /// when already there
    pub fn fast_forward(&mut self) -> i64 {
        let mut walked = 0;
        let mut path = self.active_path();
        if self.machine_at(&path).is_some_and(StepStateMachine::is_at_last_step) {
            if !self.next_step() {
                return 0;
            }
            walked += 1;
            path = self.active_path();
        }
        while self.machine_at(&path).is_some_and(|m| !m.is_at_last_step()) {
            if !self.next_step() {
                break;
            }
            walked += 1;
        }
        self.clean_up_after_walking();
        walked
    }

    /// Walk to the first step of the active sub-assembly, or of the previous
    /// one when already there
    pub fn fast_reverse(&mut self) -> i64 {
        let mut walked = 0;
        let mut path = self.active_path();
        if self.machine_at(&path).is_some_and(StepStateMachine::is_at_first_step) {
            if !self.prev_step() {
                return 0;
            }
            walked += 1;
            path = self.active_path();
        }
        while self.machine_at(&path).is_some_and(|m| !m.is_at_first_step()) {
            if !self.prev_step() {
                break;
            }
            walked += 1;
        }
        self.clean_up_after_walking();
        -walked
    }

    /// Child indices from this machine down to the deepest active one
    fn active_path(&self) -> Vec<usize> {
        let mut path = Vec::new();
        let mut m = self;
        while let (Some(i), Some(child)) = (m.current_index(), m.active_child()) {
            path.push(i);
            m = child;
        }
        path
    }

    fn machine_at(&self, path: &[usize]) -> Option<&StepStateMachine<'a>> {
        let mut m = self;
        for &i in path {
            m = m.children.get(i)?.as_ref()?;
        }
        Some(m)
    }

    /// Mark everything before the current step as old
    pub fn clean_up_after_walking(&mut self) {
        self.update_mesh_collectors(true);
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn is_at_pre_step(&self) -> bool {
        self.current == -1
    }

    pub fn is_at_placement_step(&self) -> bool {
        self.current == self.step_count() as isize
    }

    /// At the first step, all the way down the active sub-assemblies
    pub fn is_at_first_step(&self) -> bool {
        self.current == 0
            && self
                .children
                .first()
                .and_then(Option::as_ref)
                .map_or(true, StepStateMachine::is_at_first_step)
    }

    /// At the last step, all the way down the active sub-assemblies
    pub fn is_at_last_step(&self) -> bool {
        if self.is_at_placement_step() {
            return true;
        }
        if self.current + 1 < self.step_count() as isize {
            return false;
        }
        self.active_child()
            .map_or(true, StepStateMachine::is_at_placement_step)
    }

    /// At the last step with no further placements to show
    pub fn is_at_very_last_step(&self) -> bool {
        self.is_at_last_step() && self.placements.len() == 1
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Show or hide steps `0..idx`
    pub fn set_visible_up_to(&mut self, visible: bool, idx: usize) {
        for i in 0..idx.min(self.step_count()) {
            if let Some(mc) = self.mesh_collectors[i].as_mut() {
                mc.set_visible(visible);
            }
            if let Some(child) = self.children[i].as_mut() {
                child.set_visible(visible);
            }
        }
    }

    /// Show or hide everything built by this machine
    pub fn set_visible(&mut self, visible: bool) {
        self.set_visible_up_to(visible, self.step_count());
        if let Some(extras) = self.extras.as_mut() {
            extras.set_visible(visible);
        }
    }

    /// Draw steps before the current one as `old`, the current one as new
    pub fn update_mesh_collectors(&mut self, old: bool) {
        let cur = self.current.clamp(0, self.step_count() as isize) as usize;
        for i in 0..self.step_count() {
            let draw_old = i < cur && old;
            if let Some(mc) = self.mesh_collectors[i].as_mut() {
                mc.draw(draw_old);
            }
            if let Some(child) = self.children[i].as_mut() {
                if i == cur {
                    child.update_mesh_collectors(old);
                } else {
                    child.draw_all(draw_old);
                }
            }
        }
        if let Some(extras) = self.extras.as_mut() {
            extras.draw(false);
        }
    }

    fn draw_all(&mut self, old: bool) {
        for mc in self.mesh_collectors.iter_mut().flatten() {
            mc.draw(old);
        }
        for child in self.children.iter_mut().flatten() {
            child.draw_all(old);
        }
        if let Some(extras) = self.extras.as_mut() {
            extras.draw(old);
        }
    }

    /// Visit every built mesh collector
    pub fn visit_mesh_collectors(&self, f: &mut dyn FnMut(&MeshCollector<'a>)) {
        for i in 0..self.step_count() {
            if let Some(mc) = &self.mesh_collectors[i] {
                f(mc);
            }
            if let Some(child) = &self.children[i] {
                child.visit_mesh_collectors(f);
            }
        }
        if let Some(extras) = &self.extras {
            f(extras);
        }
    }

    /// Triangles currently shown
    pub fn visible_triangle_count(&self) -> usize {
        let mut count = 0;
        self.visit_mesh_collectors(&mut |mc| {
            if mc.is_visible() {
                count += mc.triangle_count();
            }
        });
        count
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Build or show the other placements for the placement step
    fn draw_extras(&mut self) {
        let n = self.step_count();
        if self.placements.len() > 1 {
            match self.extras.as_mut() {
                Some(extras) => extras.set_visible(true),
                None => {
                    let mut mc = MeshCollector::new(self.colors, self.mode);
                    for placement in &self.placements[1..] {
                        if let Err(e) = self.builder.generate_part(placement, &mut mc) {
                            mc.report_error(Diagnostic::new(e.to_string()).in_sub_model(&placement.id));
                        }
                    }
                    self.extras = Some(mc);
                }
            }
        }
        let own = self.extras.as_ref().and_then(|mc| mc.bounds().copied());
        let prev = n.checked_sub(1).and_then(|i| self.accumulated[i]);
        self.bounds[n] = own;
        self.accumulated[n] = union_of(prev.as_ref(), own.as_ref());
    }

    /// Record the own bounds of the current step and update the accumulation
    fn set_current_bounds(&mut self, own: Option<BoundingBox>) {
        let cur = self.current as usize;
        let prev = cur.checked_sub(1).and_then(|i| self.accumulated[i]);
        if cur == 0 && own.is_none() {
            log::warn!("First step of {} is empty", self.part.id);
        }
        self.bounds[cur] = own;
        self.accumulated[cur] = union_of(prev.as_ref(), own.as_ref());
    }

    // ========================================================================
    // Step numbering
    // ========================================================================

    /// Number the steps from `first_shown_index`
    ///
    /// Every leaf step counts once, a sub-assembly counts its own steps and
    /// its placement step. The placement step of the main model is not
    /// counted.
    ///
    /// # Returns
    /// The number of steps counted
    pub fn recompute_step_indices(&mut self, first_shown_index: usize) -> usize {
        self.first_shown_index = first_shown_index;
        let mut idx = first_shown_index;
        for child in &mut self.children {
            idx += match child {
                Some(child) => child.recompute_step_indices(idx),
                None => 1,
            };
        }
        if !self.is_for_main_model {
            idx += 1;
        }
        self.total_number_of_steps = idx - first_shown_index;
        self.total_number_of_steps
    }

    pub fn total_number_of_steps(&self) -> usize {
        self.total_number_of_steps
    }

    /// Index of the shown step, counted as by [`Self::recompute_step_indices`]
    ///
    /// The pre-step is one before the first index.
    pub fn current_step_index(&self) -> usize {
        if self.is_at_pre_step() {
            return self.first_shown_index.saturating_sub(1);
        }
        if let Some(child) = self.active_child() {
            return child.current_step_index();
        }
        let mut idx = self.first_shown_index;
        let end = (self.current as usize).min(self.step_count());
        for child in &self.children[..end] {
            idx += child.as_ref().map_or(1, |c| c.total_number_of_steps);
        }
        if self.is_at_placement_step() && self.is_for_main_model {
            idx = idx.saturating_sub(1);
        }
        idx
    }

    /// How many times the shown sub-assembly is placed
    pub fn multiplier_of_current_step(&self) -> usize {
        let mut m = self;
        while let Some(child) = m.active_child() {
            if child.is_at_placement_step() {
                return child.placements.len();
            }
            m = child;
        }
        if m.is_at_placement_step() {
            return m.placements.len();
        }
        1
    }

    /// Nesting depth of the shown step, 0 for this machine's own steps
    pub fn level_of_current_step(&self) -> usize {
        let mut level = 0;
        let mut m = self;
        while let Some(child) = m.active_child() {
            if child.is_at_placement_step() {
                break;
            }
            level += 1;
            m = child;
        }
        level
    }

    /// The deepest machine whose own step is shown
    fn shown(&self) -> &StepStateMachine<'a> {
        let mut m = self;
        while let Some(child) = m.active_child() {
            if child.is_at_placement_step() {
                break;
            }
            m = child;
        }
        m
    }

    /// Rotation of the shown step
    pub fn rotation_of_current_step(&self) -> Option<StepRotation> {
        let m = self.shown();
        m.current_index().and_then(|i| m.part.steps[i].rotation)
    }

    /// Part type and step index of the shown step
    pub fn current_part_and_step_index(&self) -> (&'a PartType, isize) {
        let m = self.shown();
        (m.part, m.current)
    }

    // ========================================================================
    // Bounds and camera
    // ========================================================================

    /// Own bounds of the shown step
    pub fn bounds(&self) -> Result<Option<BoundingBox>> {
        self.bounds_from(false)
    }

    /// Bounds of everything up to and including the shown step
    pub fn accumulated_bounds(&self) -> Result<Option<BoundingBox>> {
        self.bounds_from(true)
    }

    fn bounds_from(&self, accumulated: bool) -> Result<Option<BoundingBox>> {
        if self.is_at_pre_step() {
            return Err(Error::illegal_state("No bounds before the first step"));
        }
        if let Some(child) = self.active_child() {
            if !child.is_at_placement_step() {
                if let Some(b) = child.bounds_from(accumulated)? {
                    return Ok(Some(b));
                }
            }
        }
        let cur = self.current as usize;
        Ok(if accumulated {
            self.accumulated[cur]
        } else {
            self.bounds[cur]
        })
    }

    /// Rotation and target that frame the shown step
    ///
    /// # Arguments
    /// * `default_matrix` - View rotation for steps without a rotation
    /// * `use_accumulated` - Frame everything built so far instead of the step alone
    pub fn camera_framing(&self, default_matrix: &Mat3, use_accumulated: bool) -> Result<CameraFraming> {
        if self.is_at_pre_step() || self.is_at_placement_step() {
            return Err(Error::illegal_state(format!(
                "Can't frame the camera outside the steps: {}",
                self.current
            )));
        }
        if let Some(child) = self.active_child() {
            if !child.is_at_placement_step() {
                return child.camera_framing(default_matrix, use_accumulated);
            }
        }

        let cur = self.current as usize;
        let step_rotation = match &self.part.steps[cur].rotation {
            Some(rotation) => rotation.rotation_matrix(default_matrix)?,
            None => *default_matrix,
        };
        let b = if use_accumulated {
            self.accumulated[cur]
        } else {
            self.bounds[cur]
        };
        let center = b.map(|b| b.center()).unwrap_or_else(Vec3::zeros);
        Ok(CameraFraming::frame(&center, &self.placements[0].rotation, &step_rotation))
    }
}
