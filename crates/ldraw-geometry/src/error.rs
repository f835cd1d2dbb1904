// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for geometry building, packing and step playback

use ldraw_model::LoadError;
use thiserror::Error;

/// Geometry result type
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry errors
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry building error
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// A placement refers to a part type that is not in the graph
    #[error("Part not loaded: {0}")]
    PartNotLoaded(String),

    /// Pack written by another format version
    #[error("Only support for file version 1. Found: {version}, ints: {ints}, floats: {floats}")]
    UnsupportedPackVersion { version: i32, ints: i32, floats: i32 },

    /// Pack data ended early
    #[error("Packed data truncated: {0}")]
    Truncated(String),

    /// Pack data is inconsistent
    #[error("Invalid packed data: {0}")]
    InvalidPack(String),

    /// Operation not allowed in the current step machine state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Error from the model graph
    #[error(transparent)]
    Model(#[from] LoadError),
}

impl Error {
    /// Create a geometry error
    pub fn geometry(msg: impl Into<String>) -> Self {
        Error::Geometry(msg.into())
    }

    /// Create a part not loaded error
    pub fn part_not_loaded(id: impl Into<String>) -> Self {
        Error::PartNotLoaded(id.into())
    }

    /// Create a truncated data error
    pub fn truncated(msg: impl Into<String>) -> Self {
        Error::Truncated(msg.into())
    }

    /// Create an invalid pack error
    pub fn invalid_pack(msg: impl Into<String>) -> Self {
        Error::InvalidPack(msg.into())
    }

    /// Create an illegal state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }
}
