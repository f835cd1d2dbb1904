// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for LDraw loading operations

use crate::ColorId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while loading or transforming LDraw models
#[derive(Error, Debug)]
pub enum LoadError {
    /// Invalid LDraw content
    #[error("Invalid LDraw format: {0}")]
    InvalidFormat(String),

    /// Color code not present in the color table
    #[error("Unknown color {0}")]
    UnknownColor(ColorId),

    /// Part type referenced but not loaded
    #[error("Part type {0} is not loaded")]
    PartNotLoaded(String),

    /// No main model has been registered
    #[error("No main model")]
    NoMainModel,

    /// The main model lost all of its content
    #[error("The main model {0} is empty")]
    EmptyMainModel(String),

    /// Step rotation type that cannot be turned into a matrix
    #[error("Unsupported step rotation type: {0}")]
    UnsupportedRotation(String),

    /// Malformed !TEXMAP command
    #[error("Texmap error: {0}")]
    Texmap(String),

    /// A file could not be fetched from any candidate location
    #[error("Failed to fetch {id}: {message}")]
    Source { id: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl LoadError {
    /// Create a new format error
    pub fn format(msg: impl Into<String>) -> Self {
        LoadError::InvalidFormat(msg.into())
    }

    /// Create a part-not-loaded error
    pub fn part_not_loaded(id: impl Into<String>) -> Self {
        LoadError::PartNotLoaded(id.into())
    }

    /// Create a texmap error
    pub fn texmap(msg: impl Into<String>) -> Self {
        LoadError::Texmap(msg.into())
    }

    /// Create a source error
    pub fn source(id: impl Into<String>, msg: impl Into<String>) -> Self {
        LoadError::Source {
            id: id.into(),
            message: msg.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        LoadError::Other(msg.into())
    }
}

/// A non-fatal problem reported while loading
///
/// Warnings and load failures are both delivered as diagnostics. `line` is the
/// zero-based line index within the file being parsed, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: Option<usize>,
    pub sub_model: Option<String>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            sub_model: None,
        }
    }

    /// Attach a line index
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach the ID of the part type being processed
    pub fn in_sub_model(mut self, id: impl Into<String>) -> Self {
        self.sub_model = Some(id.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(sub_model) = &self.sub_model {
            write!(f, " (in {}", sub_model)?;
            if let Some(line) = self.line {
                write!(f, ", line {}", line)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new("Unknown color").at_line(3).in_sub_model("a.ldr");
        assert_eq!(d.to_string(), "Unknown color (in a.ldr, line 3)");
        assert_eq!(Diagnostic::new("x").to_string(), "x");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LoadError::source("3001.dat", "not found").to_string(),
            "Failed to fetch 3001.dat: not found"
        );
        assert_eq!(LoadError::UnknownColor(9999).to_string(), "Unknown color 9999");
    }
}
