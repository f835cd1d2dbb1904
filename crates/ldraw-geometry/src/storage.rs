// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Part and instructions storage
//!
//! [`MemoryStorage`] keeps two tables: packed parts keyed by their ID
//! without `.dat`, and packed whole models keyed by a caller supplied key
//! together with a timestamp. An entry is only returned for the exact
//! timestamp it was saved with. Both tables serialize to JSON, so a host can
//! persist them anywhere.
//!
//! [`NoopStorage`] caches nothing.

use crate::builder::GeometryBuilder;
use crate::packing::{pack, pack_part, shorten_id, unpack, unpack_part, PackedArrays, PackedPart};
use ldraw_model::{LoadError, PartStorage, PartType, PartTypeMap, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Storage that never has anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStorage;

impl PartStorage for NoopStorage {
    fn retrieve_parts(&self, ids: &[String]) -> (Vec<PartType>, Vec<String>) {
        (Vec::new(), ids.to_vec())
    }

    fn save_parts(&self, _parts: &[&PartType]) {}

    fn retrieve_instructions(&self, _key: &str, _timestamp: i64) -> Option<PartTypeMap> {
        None
    }

    fn save_instructions(&self, _key: &str, _timestamp: i64, _part_types: &PartTypeMap) -> Result<()> {
        Ok(())
    }
}

/// A packed model with the timestamp it was saved under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInstructions {
    pub timestamp: i64,
    pub data: PackedArrays,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Tables {
    parts: BTreeMap<String, PackedPart>,
    instructions: BTreeMap<String, StoredInstructions>,
}

/// In-memory storage
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part_count(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).parts.len()
    }

    pub fn has_part(&self, id: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .parts
            .contains_key(shorten_id(id))
    }

    pub fn has_instructions(&self, key: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .instructions
            .contains_key(key)
    }

    pub fn clear(&self) {
        *self.tables.write().unwrap_or_else(PoisonError::into_inner) = Tables::default();
    }

    /// Both tables as JSON
    pub fn to_json(&self) -> Result<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_string(&*tables).map_err(|e| LoadError::other(format!("Could not serialize storage: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tables: Tables = serde_json::from_str(json)
            .map_err(|e| LoadError::other(format!("Invalid storage JSON: {}", e)))?;
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
        })
    }
}

impl PartStorage for MemoryStorage {
    fn retrieve_parts(&self, ids: &[String]) -> (Vec<PartType>, Vec<String>) {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            let stored = id
                .ends_with(".dat")
                .then(|| tables.parts.get(shorten_id(id)))
                .flatten();
            match stored.map(unpack_part) {
                Some(Ok(pt)) => found.push(pt),
                Some(Err(err)) => {
                    log::warn!("Stored part {} is unreadable: {}", id, err);
                    missing.push(id.clone());
                }
                None => missing.push(id.clone()),
            }
        }
        (found, missing)
    }

    fn save_parts(&self, parts: &[&PartType]) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut saved = 0;
        for pt in parts.iter().filter(|pt| pt.id.ends_with(".dat")) {
            if let Some(packed) = pack_part(pt) {
                tables.parts.insert(packed.id.clone(), packed);
                saved += 1;
            }
        }
        log::debug!("Saved {} of {} parts to storage", saved, parts.len());
    }

    fn retrieve_instructions(&self, key: &str, timestamp: i64) -> Option<PartTypeMap> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let stored = tables.instructions.get(key)?;
        if stored.timestamp != timestamp {
            log::debug!(
                "Instructions {} are outdated ({} != {})",
                key,
                stored.timestamp,
                timestamp
            );
            return None;
        }
        match unpack(&stored.data) {
            Ok(map) => Some(map),
            Err(err) => {
                log::warn!("Stored instructions {} are unreadable: {}", key, err);
                None
            }
        }
    }

    fn save_instructions(&self, key: &str, timestamp: i64, part_types: &PartTypeMap) -> Result<()> {
        let builder = GeometryBuilder::new(part_types);
        let data = pack(&builder).map_err(|e| LoadError::other(e.to_string()))?;
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .instructions
            .insert(key.to_string(), StoredInstructions { timestamp, data });
        log::info!("Saved instructions {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldraw_model::Inlined;
    use ldraw_parser::{LoaderOptions, MemorySource, ModelLoader};

    const MODEL: &str = "0 Model\r\n\
                         1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
                         1 1 0 -24 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n";

    const BRICK: &str = "0 Brick 2 x 4\r\n\
                         0 Name: 3001.dat\r\n\
                         0 !LDRAW_ORG Part UPDATE 2004-03\r\n\
                         0 !LICENSE Redistributable under CC BY 4.0 : see CAreadme.txt\r\n\
                         0 BFC CERTIFY CCW\r\n\
                         3 16 0 0 0 40 0 0 0 24 0\r\n\
                         2 24 0 0 0 40 0 0\r\n";

    fn options() -> LoaderOptions {
        LoaderOptions::default().with_instructions_key("model", 42)
    }

    fn load(source: MemorySource, storage: &MemoryStorage) -> ModelLoader {
        let mut loader = ModelLoader::new(source)
            .with_options(options())
            .with_storage(Box::new(storage.clone()));
        loader.load_model("model.ldr").unwrap();
        loader
    }

    #[test]
    fn test_noop_storage() {
        let ids = vec!["3001.dat".to_string()];
        let (found, missing) = NoopStorage.retrieve_parts(&ids);
        assert!(found.is_empty());
        assert_eq!(missing, ids);
        assert!(NoopStorage.retrieve_instructions("model", 1).is_none());
    }

    #[test]
    fn test_loader_saves_parts_and_instructions() {
        let storage = MemoryStorage::new();
        let source = MemorySource::new()
            .with_file("model.ldr", MODEL)
            .with_file("ldraw_parts/3001.dat", BRICK);
        let loader = load(source, &storage);
        assert!(loader.errors().is_empty());

        assert!(storage.has_part("3001.dat"));
        assert_eq!(storage.part_count(), 1);
        assert!(storage.has_instructions("model"));

        let (found, missing) = storage.retrieve_parts(&["3001.dat".to_string(), "3002.dat".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "3001.dat");
        assert_eq!(found[0].inlined, Some(Inlined::Storage));
        assert_eq!(found[0].steps[0].triangles.len(), 1);
        assert_eq!(missing, vec!["3002.dat".to_string()]);
    }

    #[test]
    fn test_instructions_are_used_by_timestamp() {
        let storage = MemoryStorage::new();
        let source = MemorySource::new()
            .with_file("model.ldr", MODEL)
            .with_file("ldraw_parts/3001.dat", BRICK);
        load(source, &storage);

        // Nothing to fetch: everything comes from the instructions table
        let loader = load(MemorySource::new(), &storage);
        assert!(loader.is_loaded());
        let main = loader.main_model().unwrap();
        assert_eq!(main.id, "p0.ldr");
        assert_eq!(main.steps[0].triangles.len(), 2);

        assert!(storage.retrieve_instructions("model", 43).is_none());
        assert!(storage.retrieve_instructions("other", 42).is_none());
    }

    #[test]
    fn test_parts_come_from_storage() {
        let storage = MemoryStorage::new();
        let source = MemorySource::new()
            .with_file("model.ldr", MODEL)
            .with_file("ldraw_parts/3001.dat", BRICK);
        load(source, &storage);

        let mut loader = ModelLoader::new(MemorySource::new().with_file("model.ldr", MODEL))
            .with_storage(Box::new(storage.clone()));
        loader.load_model("model.ldr").unwrap();
        assert!(loader.errors().is_empty());
        let part = loader.part_types().get("3001.dat").unwrap();
        assert_eq!(part.inlined, Some(Inlined::Storage));
    }

    #[test]
    fn test_json_round_trip() {
        let storage = MemoryStorage::new();
        let source = MemorySource::new()
            .with_file("model.ldr", MODEL)
            .with_file("ldraw_parts/3001.dat", BRICK);
        load(source, &storage);

        let json = storage.to_json().unwrap();
        let restored = MemoryStorage::from_json(&json).unwrap();
        assert!(restored.has_part("3001"));
        assert!(restored.retrieve_instructions("model", 42).is_some());
        assert!(MemoryStorage::from_json("{").is_err());
    }
}
