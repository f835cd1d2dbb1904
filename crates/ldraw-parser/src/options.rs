// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loader configuration

use ldraw_model::{LoadError, Result};
use serde::{Deserialize, Serialize};

/// Options of a [`crate::ModelLoader`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Prefixes tried in order when fetching `.dat` files
    pub part_prefixes: Vec<String>,
    /// Collapse known multi-part assemblies into a single part
    pub build_assemblies: bool,
    /// Generate well-known primitives instead of fetching them
    pub generate_primitives: bool,
    /// Show a box for parts that could not be fetched
    pub substitute_missing_parts: bool,
    /// Release the steps of parts once every referencing part is built
    pub clean_up_primitives_and_sub_parts: bool,
    /// Key of the instructions cache entry
    pub key: Option<String>,
    /// Timestamp of the instructions cache entry, for invalidation
    pub timestamp: Option<i64>,
    /// Save loaded parts and instructions to storage on completion
    pub save_to_storage: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            part_prefixes: vec!["ldraw_parts/".to_string(), "ldraw_unofficial/".to_string()],
            build_assemblies: false,
            generate_primitives: true,
            substitute_missing_parts: true,
            clean_up_primitives_and_sub_parts: false,
            key: None,
            timestamp: None,
            save_to_storage: true,
        }
    }
}

impl LoaderOptions {
    /// Read options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LoadError::other(format!("Invalid loader options: {}", e)))
    }

    pub fn with_part_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.part_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_build_assemblies(mut self, build_assemblies: bool) -> Self {
        self.build_assemblies = build_assemblies;
        self
    }

    pub fn with_generate_primitives(mut self, generate_primitives: bool) -> Self {
        self.generate_primitives = generate_primitives;
        self
    }

    pub fn with_substitute_missing_parts(mut self, substitute: bool) -> Self {
        self.substitute_missing_parts = substitute;
        self
    }

    pub fn with_clean_up_primitives_and_sub_parts(mut self, clean_up: bool) -> Self {
        self.clean_up_primitives_and_sub_parts = clean_up;
        self
    }

    /// Use the instructions cache entry `key` saved at `timestamp`
    pub fn with_instructions_key(mut self, key: impl Into<String>, timestamp: i64) -> Self {
        self.key = Some(key.into());
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_save_to_storage(mut self, save: bool) -> Self {
        self.save_to_storage = save;
        self
    }

    /// Instructions cache key and timestamp, when both are set
    pub fn instructions_key(&self) -> Option<(&str, i64)> {
        match (&self.key, self.timestamp) {
            (Some(key), Some(timestamp)) => Some((key.as_str(), timestamp)),
            _ => None,
        }
    }

    /// Candidate locations of a file, in the order they are tried
    ///
    /// Only `.dat` files are looked up under the part prefixes. Other files
    /// are fetched by their ID.
    pub fn candidate_urls(&self, id: &str) -> Vec<String> {
        let id = id.to_lowercase();
        if !id.ends_with(".dat") {
            return vec![id];
        }
        self.part_prefixes
            .iter()
            .map(|prefix| format!("{}{}", prefix, id))
            .collect()
    }
}
