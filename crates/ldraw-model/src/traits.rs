// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core traits for loading LDraw models
//!
//! These traits define the seams between the resolved model graph and its
//! collaborators: where file content comes from and where packed parts and
//! instructions are cached.

use crate::{PartType, PartTypeMap, Result};

/// Progress callback type for loading operations
///
/// Receives the ID of the file that was just handled and the fraction of
/// requested files that have completed.
pub type ProgressCallback = Box<dyn Fn(&str, f32) + Send>;

/// Read-only lookup of part types by ID
///
/// Steps and part types only ever hold IDs of other part types and resolve
/// them through this trait.
pub trait PartTypeLookup {
    /// Get the loaded part type for an ID
    ///
    /// # Returns
    /// `None` if the part type is unknown or still being fetched
    fn part_type(&self, id: &str) -> Option<&PartType>;
}

/// Source of LDraw file content
///
/// Implementations fetch the text of a file from a location such as a
/// directory on disk or an in-memory table.
pub trait FileSource: Send + Sync {
    /// Fetch file content
    ///
    /// # Arguments
    /// * `url` - Location of the file, typically a path prefix joined with an ID
    ///
    /// # Returns
    /// The file content, or a `LoadError::Source` if it cannot be fetched
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Persistent cache for packed parts and whole instructions
///
/// The loader never assumes that storage is available; an implementation
/// that caches nothing is always substitutable.
pub trait PartStorage: Send + Sync {
    /// Retrieve previously saved parts
    ///
    /// # Arguments
    /// * `ids` - IDs of the requested parts
    ///
    /// # Returns
    /// The parts found, and the IDs that must be loaded some other way
    fn retrieve_parts(&self, ids: &[String]) -> (Vec<PartType>, Vec<String>);

    /// Save parts that qualify for storage
    ///
    /// Parts for which [`PartType::can_be_packed`] is false are ignored.
    fn save_parts(&self, parts: &[&PartType]);

    /// Retrieve a whole model graph saved under `key`
    ///
    /// # Returns
    /// `None` unless an entry for `key` exists with exactly `timestamp`
    fn retrieve_instructions(&self, key: &str, timestamp: i64) -> Option<PartTypeMap>;

    /// Save the model graph under `key`
    fn save_instructions(&self, key: &str, timestamp: i64, part_types: &PartTypeMap) -> Result<()>;
}
