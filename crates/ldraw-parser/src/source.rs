// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File sources for the loader

use ldraw_model::{FileSource, LoadError, Result};
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Files read from a directory on disk
///
/// URLs are resolved relative to the root directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSource for DirectorySource {
    fn fetch(&self, url: &str) -> Result<String> {
        let path = self.root.join(url);
        let bytes = std::fs::read(&path).map_err(|e| LoadError::source(url, e.to_string()))?;
        // LDraw files predate UTF-8; decode lossily rather than fail.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Files held in memory, keyed by URL
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: FxHashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. URLs are matched case-insensitively.
    pub fn with_file(mut self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(url, content);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, content: impl Into<String>) {
        self.files.insert(url.into().to_lowercase(), content.into());
    }
}

impl FileSource for MemorySource {
    fn fetch(&self, url: &str) -> Result<String> {
        self.files
            .get(&url.to_lowercase())
            .cloned()
            .ok_or_else(|| LoadError::source(url, "Not Found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new().with_file("ldraw_parts/3001.dat", "0 Brick 2 x 4");
        assert_eq!(source.fetch("LDRAW_PARTS/3001.DAT").unwrap(), "0 Brick 2 x 4");
        assert!(matches!(
            source.fetch("ldraw_parts/3002.dat"),
            Err(LoadError::Source { .. })
        ));
    }

    #[test]
    fn test_directory_source_missing_file() {
        let source = DirectorySource::new(std::env::temp_dir().join("ldraw-lite-missing"));
        assert!(source.fetch("3001.dat").is_err());
    }
}
