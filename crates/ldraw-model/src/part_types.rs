// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The part type arena
//!
//! All part types of a load graph live in one [`PartTypeMap`] keyed by their
//! lowercase ID. Placements refer to part types by ID only, so redirects,
//! purges and replacements rewrite map entries without touching any other
//! part type. A slot is either in flight (fetch requested, content pending)
//! or loaded.

use crate::{LoadError, PartType, PartTypeLookup, Result};
use rustc_hash::{FxHashMap, FxHashSet};

/// State of one entry in the map
#[derive(Debug, Clone)]
pub enum PartSlot {
    /// Requested but not yet parsed
    InFlight,
    Loaded(Box<PartType>),
}

/// Arena of part types keyed by lowercase ID
#[derive(Debug, Clone, Default)]
pub struct PartTypeMap {
    slots: FxHashMap<String, PartSlot>,
    /// Insertion order, for deterministic iteration
    order: Vec<String>,
    main_model: Option<String>,
}

impl PartTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, id: &str) {
        if !self.slots.contains_key(id) {
            self.order.push(id.to_string());
        }
    }

    /// Insert a loaded part type, returning the one it replaces
    pub fn insert(&mut self, pt: PartType) -> Option<PartType> {
        let id = pt.id.clone();
        self.touch(&id);
        match self.slots.insert(id, PartSlot::Loaded(Box::new(pt))) {
            Some(PartSlot::Loaded(old)) => Some(*old),
            _ => None,
        }
    }

    /// Mark `id` as requested. Returns false if it is already known.
    pub fn mark_in_flight(&mut self, id: &str) -> bool {
        if self.slots.contains_key(id) {
            return false;
        }
        self.touch(id);
        self.slots.insert(id.to_string(), PartSlot::InFlight);
        true
    }

    /// Whether `id` is loaded or in flight
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        matches!(self.slots.get(id), Some(PartSlot::InFlight))
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        matches!(self.slots.get(id), Some(PartSlot::Loaded(_)))
    }

    /// Key a lookup of `id` resolves to
    ///
    /// Some editors omit the `.ldr` suffix when referencing sub-models, so
    /// `id.ldr` is tried when `id` itself is unknown.
    fn resolve_key(&self, id: &str) -> Option<String> {
        if self.slots.contains_key(id) {
            return Some(id.to_string());
        }
        if !id.ends_with(".ldr") {
            let with_suffix = format!("{}.ldr", id);
            if self.slots.contains_key(&with_suffix) {
                return Some(with_suffix);
            }
        }
        None
    }

    /// Loaded part type for `id`, with the `.ldr` fallback
    pub fn get(&self, id: &str) -> Option<&PartType> {
        let key = self.resolve_key(id)?;
        match self.slots.get(&key) {
            Some(PartSlot::Loaded(pt)) => Some(pt.as_ref()),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PartType> {
        let key = self.resolve_key(id)?;
        match self.slots.get_mut(&key) {
            Some(PartSlot::Loaded(pt)) => Some(pt.as_mut()),
            _ => None,
        }
    }

    /// Remove an entry of any state
    pub fn remove(&mut self, id: &str) -> Option<PartType> {
        let slot = self.slots.remove(id)?;
        self.order.retain(|k| k != id);
        match slot {
            PartSlot::Loaded(pt) => Some(*pt),
            PartSlot::InFlight => None,
        }
    }

    /// Move a part type out of the map, leaving its slot in flight
    ///
    /// Used to mutate one part type while reading the others. Must be
    /// followed by [`PartTypeMap::restore`].
    pub fn take(&mut self, id: &str) -> Option<PartType> {
        if !self.is_loaded(id) {
            return None;
        }
        match self.slots.insert(id.to_string(), PartSlot::InFlight) {
            Some(PartSlot::Loaded(pt)) => Some(*pt),
            _ => None,
        }
    }

    pub fn restore(&mut self, pt: PartType) {
        self.insert(pt);
    }

    /// IDs of loaded part types in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.is_loaded(id))
            .cloned()
            .collect()
    }

    /// IDs still waiting for content
    pub fn in_flight_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.is_in_flight(id))
            .cloned()
            .collect()
    }

    /// Loaded part types in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &PartType> {
        self.order.iter().filter_map(|id| match self.slots.get(id) {
            Some(PartSlot::Loaded(pt)) => Some(pt.as_ref()),
            _ => None,
        })
    }

    /// Number of loaded part types
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all in-flight sentinels
    pub fn remove_in_flight(&mut self) -> Vec<String> {
        let ids = self.in_flight_ids();
        for id in &ids {
            self.remove(id);
        }
        ids
    }

    pub fn main_model_id(&self) -> Option<&str> {
        self.main_model.as_deref()
    }

    pub fn set_main_model(&mut self, id: impl Into<String>) {
        self.main_model = Some(id.into());
    }

    /// The main model
    pub fn main_model(&self) -> Result<&PartType> {
        let id = self.main_model.as_deref().ok_or(LoadError::NoMainModel)?;
        self.get(id).ok_or_else(|| LoadError::part_not_loaded(id))
    }

    /// Run `f` on a part type taken out of the map, with the rest of the map
    /// available for lookups
    fn with_taken<F>(&mut self, id: &str, f: F)
    where
        F: FnOnce(&mut PartType, &PartTypeMap),
    {
        if let Some(mut pt) = self.take(id) {
            f(&mut pt, self);
            self.restore(pt);
        }
    }

    /// Classify every part type that has not been cleaned up yet
    ///
    /// Trailing empty steps are dropped first, since they would make a
    /// single-step part look like a model.
    pub fn compute_is_part_all(&mut self) {
        let ids: Vec<String> = self.iter().filter(|pt| !pt.cleaned).map(|pt| pt.id.clone()).collect();
        for id in &ids {
            if let Some(pt) = self.get_mut(id) {
                pt.drop_trailing_empty_steps();
            }
        }
        let mut decisions = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(pt) = self.get(id) {
                decisions.push((id.clone(), pt.compute_is_part(&*self)));
            }
        }
        for (id, is_part) in decisions {
            if let Some(pt) = self.get_mut(&id) {
                pt.is_part = is_part;
            }
        }
    }

    /// Clean up every part type and purge those left without steps
    ///
    /// Returns the purged IDs.
    pub fn clean_up_all(&mut self) -> Result<Vec<String>> {
        let ids: Vec<String> = self.iter().filter(|pt| !pt.cleaned).map(|pt| pt.id.clone()).collect();
        for id in &ids {
            self.with_taken(id, |pt, map| pt.clean_up(map));
        }

        let empty: Vec<String> = ids
            .into_iter()
            .filter(|id| id != "empty.dat" && self.get(id).is_some_and(|pt| pt.steps.is_empty()))
            .collect();
        let mut purged = Vec::new();
        let mut result = Ok(());
        for id in empty {
            match self.purge_part(&id) {
                Ok(ids) => purged.extend(ids),
                Err(err) => result = Err(err),
            }
        }
        result.map(|_| purged)
    }

    /// Remove `id` and every placement of it, recursively removing part
    /// types that become empty
    ///
    /// All removals are carried out even when the main model ends up empty,
    /// in which case [`LoadError::EmptyMainModel`] is returned.
    pub fn purge_part(&mut self, id: &str) -> Result<Vec<String>> {
        let mut purged: FxHashSet<String> = FxHashSet::default();
        let mut order = Vec::new();
        let mut to_purge = vec![id.to_string()];
        let mut emptied_main = None;

        while let Some(id) = to_purge.pop() {
            if !purged.insert(id.clone()) {
                continue;
            }
            self.remove(&id);
            if self.main_model.as_deref() == Some(id.as_str()) {
                self.main_model = None;
            }
            order.push(id.clone());

            for pt_id in self.ids() {
                let Some(pt) = self.get_mut(&pt_id) else {
                    continue;
                };
                pt.purge_part(&id);
                if pt.steps.is_empty() {
                    if self.main_model.as_deref() == Some(pt_id.as_str()) {
                        emptied_main = Some(pt_id);
                    } else if !purged.contains(&pt_id) {
                        to_purge.push(pt_id);
                    }
                }
            }
        }

        match emptied_main {
            Some(main) => {
                log::error!("The main model is empty after removal of empty parts!");
                Err(LoadError::EmptyMainModel(main))
            }
            None => Ok(order),
        }
    }

    /// Point placements of redirect part types at their replacements
    pub fn substitute_replacement_parts(&mut self) {
        let replacements: FxHashMap<String, String> = self
            .iter()
            .filter_map(|pt| pt.replacement.clone().map(|r| (pt.id.clone(), r)))
            .collect();
        if replacements.is_empty() {
            return;
        }
        for id in self.ids() {
            let Some(pt) = self.get_mut(&id) else {
                continue;
            };
            for step in pt.steps.iter_mut() {
                for sm in step.sub_models.iter_mut() {
                    if let Some(r) = replacements.get(&sm.id) {
                        sm.id = r.clone();
                    }
                }
            }
        }
    }

    /// Record, on every part, which part types place it
    pub fn set_referenced_from(&mut self) {
        let mut edges: Vec<(String, String)> = Vec::new();
        for parent in self.iter() {
            for step in &parent.steps {
                for sm in &step.sub_models {
                    if let Some(child) = self.get(&sm.id) {
                        if child.is_part {
                            edges.push((child.id.clone(), parent.id.clone()));
                        }
                    }
                }
            }
        }
        for (child, parent) in edges {
            if let Some(pt) = self.get_mut(&child) {
                pt.referenced_from.insert(parent);
            }
        }
    }

    /// Release the steps of parts whose referencing part types have all been
    /// built, returning the IDs of the released parts
    pub fn reclaim_built_parts(&mut self, is_built: &dyn Fn(&str) -> bool) -> Vec<String> {
        let ready: Vec<String> = self
            .iter()
            .filter(|pt| {
                pt.is_part
                    && !pt.steps_released
                    && !pt.referenced_from.is_empty()
                    && pt.referenced_from.iter().all(|parent| is_built(parent))
            })
            .map(|pt| pt.id.clone())
            .collect();
        for id in &ready {
            if let Some(pt) = self.get_mut(id) {
                pt.steps.clear();
                pt.steps_released = true;
            }
        }
        ready
    }
}

impl PartTypeLookup for PartTypeMap {
    fn part_type(&self, id: &str) -> Option<&PartType> {
        self.get(id)
    }
}
