// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loader
//!
//! Resolves a model and every file it transitively references into one
//! [`PartTypeMap`]. Fetches are queued and handled one at a time by
//! [`ModelLoader::run`]. A counter of unfinished files is increased when a
//! fetch is queued and decreased once its content has been parsed or every
//! candidate location has failed. References found while parsing are queued
//! before the counter is decreased, so the counter only reaches zero when
//! the whole graph is resolved and the load callback fires once per graph.

use crate::assemblies::AssemblyManager;
use crate::generator;
use crate::options::LoaderOptions;
use crate::parser::LineParser;
use crate::texmap::encode_inline_texture;
use crate::tokenizer::normalize_id;
use ldraw_model::{
    ColorTable, Diagnostic, FileSource, InlineTexture, LoadError, PartStorage, PartType,
    PartTypeLookup, PartTypeMap, ProgressCallback, Result, TexmapPlacement, LINE_END,
};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Receives warnings or errors as they occur
pub type DiagnosticCallback = Box<dyn Fn(&Diagnostic) + Send>;

/// Called when every file of the load graph has been handled
pub type LoadCallback = Box<dyn FnMut() + Send>;

/// Characters of base64 data per `0 !:` line
const CHARACTERS_PER_LINE: usize = 80;

/// Loader of LDraw models and their parts
pub struct ModelLoader {
    options: LoaderOptions,
    colors: ColorTable,
    part_types: PartTypeMap,
    texmaps: Vec<TexmapPlacement>,
    textures: Vec<InlineTexture>,

    source: Box<dyn FileSource>,
    storage: Option<Box<dyn PartStorage>>,
    assemblies: Option<AssemblyManager>,

    queue: VecDeque<String>,
    unloaded_files: usize,
    requested_files: usize,
    completed_files: usize,
    /// IDs parsed in the current load graph
    loaded_ids: Vec<String>,
    done: bool,

    warnings: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
    on_progress: Option<ProgressCallback>,
    on_warning: Option<DiagnosticCallback>,
    on_error: Option<DiagnosticCallback>,
    on_load: Option<LoadCallback>,
}

impl ModelLoader {
    /// Create a loader with default options and the built-in color table
    pub fn new(source: impl FileSource + 'static) -> Self {
        Self {
            options: LoaderOptions::default(),
            colors: ColorTable::default(),
            part_types: PartTypeMap::new(),
            texmaps: Vec::new(),
            textures: Vec::new(),
            source: Box::new(source),
            storage: None,
            assemblies: None,
            queue: VecDeque::new(),
            unloaded_files: 0,
            requested_files: 0,
            completed_files: 0,
            loaded_ids: Vec::new(),
            done: false,
            warnings: Vec::new(),
            errors: Vec::new(),
            on_progress: None,
            on_warning: None,
            on_error: None,
            on_load: None,
        }
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_colors(mut self, colors: ColorTable) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_storage(mut self, storage: Box<dyn PartStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn on_warning(mut self, callback: DiagnosticCallback) -> Self {
        self.on_warning = Some(callback);
        self
    }

    pub fn on_error(mut self, callback: DiagnosticCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub fn on_load(mut self, callback: LoadCallback) -> Self {
        self.on_load = Some(callback);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn colors(&self) -> &ColorTable {
        &self.colors
    }

    pub fn part_types(&self) -> &PartTypeMap {
        &self.part_types
    }

    pub fn part_types_mut(&mut self) -> &mut PartTypeMap {
        &mut self.part_types
    }

    pub fn texmaps(&self) -> &[TexmapPlacement] {
        &self.texmaps
    }

    pub fn textures(&self) -> &[InlineTexture] {
        &self.textures
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Whether the current load graph has completed
    pub fn is_loaded(&self) -> bool {
        self.done
    }

    pub fn main_model(&self) -> Result<&PartType> {
        self.part_types.main_model()
    }

    /// Get a part type, generating well-known primitives on demand
    pub fn get_part_type(&mut self, id: &str) -> Option<&PartType> {
        if !self.part_types.contains(id) && self.options.generate_primitives {
            if let Some(pt) = generator::generate(id) {
                self.part_types.insert(pt);
            }
        }
        self.part_types.get(id)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a model, from the instructions cache when possible
    ///
    /// Runs the load graph to completion.
    pub fn load_model(&mut self, id: &str) -> Result<()> {
        if self.load_instructions_from_storage() {
            return Ok(());
        }
        self.load(id);
        self.run()
    }

    /// Replace the graph by cached instructions, if the storage has them
    fn load_instructions_from_storage(&mut self) -> bool {
        let Some((key, timestamp)) = self.options.instructions_key() else {
            return false;
        };
        let Some(storage) = &self.storage else {
            return false;
        };
        let Some(part_types) = storage.retrieve_instructions(key, timestamp) else {
            return false;
        };
        log::info!("Instructions {} retrieved from storage", key);
        self.part_types = part_types;
        self.finish_loading();
        true
    }

    /// Queue the file `id` unless it is already known
    pub fn load(&mut self, id: &str) {
        let id = normalize_id(id);
        if self.options.candidate_urls(&id).is_empty() {
            return;
        }
        if self.part_types.contains(&id) {
            if self.part_types.is_loaded(&id) {
                self.report_progress(&id);
            }
            return;
        }

        self.part_types.mark_in_flight(&id);
        self.done = false;
        self.unloaded_files += 1;
        self.requested_files += 1;
        self.queue.push_back(id);
    }

    /// Load several files, trying storage and the generator before fetching
    pub fn load_multiple(&mut self, ids: Vec<String>) {
        let (found, mut missing) = match &self.storage {
            Some(storage) => storage.retrieve_parts(&ids),
            None => (Vec::new(), ids),
        };

        for pt in found {
            log::debug!("Part {} retrieved from storage", pt.id);
            for step in &pt.steps {
                for sm in &step.sub_models {
                    missing.push(sm.id.clone());
                }
            }
            self.part_types.insert(pt);
        }

        if self.options.generate_primitives {
            missing = self.generate_missing(missing);
        }
        for id in missing {
            if !self.is_known(&id) {
                self.load(&id);
            }
        }
    }

    /// Generate what can be generated, returning the IDs still to fetch
    fn generate_missing(&mut self, mut to_fetch: Vec<String>) -> Vec<String> {
        let mut improved = true;
        while improved {
            improved = false;
            let mut still_to_fetch = Vec::new();
            let mut seen = FxHashSet::default();
            for id in to_fetch {
                if !seen.insert(id.clone()) || self.is_known(&id) {
                    continue;
                }
                match generator::generate(&id) {
                    Some(pt) => {
                        for step in &pt.steps {
                            still_to_fetch.extend(step.sub_models.iter().map(|sm| sm.id.clone()));
                        }
                        self.part_types.insert(pt);
                        improved = true;
                    }
                    None => still_to_fetch.push(id),
                }
            }
            to_fetch = still_to_fetch;
        }
        to_fetch
    }

    fn is_known(&self, id: &str) -> bool {
        self.part_types.contains(id)
            || (!id.ends_with(".ldr") && self.part_types.contains(&format!("{}.ldr", id)))
    }

    /// Handle queued files until the load graph is complete
    pub fn run(&mut self) -> Result<()> {
        loop {
            while let Some(id) = self.queue.pop_front() {
                self.fetch_and_parse(&id);
            }
            if self.done || self.unloaded_files > 0 {
                return Ok(());
            }
            let result = self.complete_graph();
            if self.queue.is_empty() {
                self.finish_loading();
                return result;
            }
        }
    }

    fn fetch_and_parse(&mut self, id: &str) {
        let mut last_error = None;
        for url in self.options.candidate_urls(id) {
            match self.source.fetch(&url) {
                Ok(content) => {
                    self.parse(&content, id);
                    last_error = None;
                    break;
                }
                Err(err) => {
                    log::debug!("Could not fetch {}: {}", url, err);
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            if self.options.substitute_missing_parts {
                self.part_types.insert(generator::make_box(id));
            } else {
                self.part_types.remove(id);
            }
            let message = match err {
                LoadError::Source { message, .. } => message,
                other => other.to_string(),
            };
            self.report_error(Diagnostic::new(message).in_sub_model(id));
        }

        self.unloaded_files = self.unloaded_files.saturating_sub(1);
        self.completed_files += 1;
        self.report_progress(id);
    }

    /// Parse LDraw content into the graph and queue the files it references
    ///
    /// # Arguments
    /// * `content` - Document text
    /// * `default_id` - ID of the document when it has no `0 FILE` line
    pub fn parse(&mut self, content: &str, default_id: &str) {
        let main_model = self.part_types.main_model_id().map(str::to_string);
        let doc = LineParser::new(&mut self.colors, &mut self.texmaps)
            .with_main_model(main_model)
            .parse(content, &normalize_id(default_id));

        for warning in &doc.warnings {
            self.report_warning(warning.clone());
        }
        for error in &doc.errors {
            self.report_error(error.clone());
        }
        let referenced = doc.referenced_ids(&self.texmaps);

        if let Some(main) = &doc.main_model {
            if self.part_types.main_model_id().is_none() {
                self.part_types.set_main_model(main.clone());
            }
        }
        self.textures.extend(doc.textures);
        for pt in doc.part_types {
            self.loaded_ids.push(pt.id.clone());
            self.part_types.insert(pt);
        }

        let unknown: Vec<String> = referenced.into_iter().filter(|id| !self.is_known(id)).collect();
        if !unknown.is_empty() {
            self.load_multiple(unknown);
        }
    }

    /// Passes run once every file has been handled
    fn complete_graph(&mut self) -> Result<()> {
        for id in self.part_types.remove_in_flight() {
            log::warn!("Part type {} was never loaded", id);
        }

        self.part_types.compute_is_part_all();
        let result = self.part_types.clean_up_all();
        match &result {
            Ok(purged) if !purged.is_empty() => log::debug!("Purged empty part types {:?}", purged),
            Ok(_) => {}
            Err(err) => self.report_error(Diagnostic::new(err.to_string())),
        }

        if self.options.build_assemblies {
            self.build_assemblies();
        }
        self.part_types.substitute_replacement_parts();
        if self.options.clean_up_primitives_and_sub_parts {
            self.part_types.set_referenced_from();
        }
        result.map(|_| ())
    }

    fn build_assemblies(&mut self) {
        let manager = self.assemblies.get_or_insert_with(AssemblyManager::default);
        let mut placed = Vec::new();
        for id in self.part_types.ids() {
            if self.part_types.get(&id).map_or(true, |pt| pt.is_part) {
                continue;
            }
            let Some(mut pt) = self.part_types.take(&id) else {
                continue;
            };
            for step in pt.steps.iter_mut() {
                placed.extend(manager.handle_step(step, &mut self.part_types));
            }
            self.part_types.restore(pt);
        }

        let unknown: Vec<String> = placed.into_iter().filter(|id| !self.is_known(id)).collect();
        if !unknown.is_empty() {
            self.load_multiple(unknown);
        }
    }

    fn finish_loading(&mut self) {
        self.done = true;
        self.save_to_storage();
        log::info!(
            "Load graph complete: {} part types, {} warnings, {} errors",
            self.part_types.len(),
            self.warnings.len(),
            self.errors.len()
        );
        self.loaded_ids.clear();
        if let Some(on_load) = self.on_load.as_mut() {
            on_load();
        }
    }

    fn save_to_storage(&self) {
        if !self.options.save_to_storage {
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };
        let parts: Vec<&PartType> = self
            .loaded_ids
            .iter()
            .filter_map(|id| self.part_types.get(id))
            .filter(|pt| pt.can_be_packed())
            .collect();
        if !parts.is_empty() {
            storage.save_parts(&parts);
        }
        if let Some((key, timestamp)) = self.options.instructions_key() {
            if let Err(err) = storage.save_instructions(key, timestamp, &self.part_types) {
                log::warn!("Could not save instructions {}: {}", key, err);
            }
        }
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    fn report_progress(&self, id: &str) {
        if let Some(on_progress) = &self.on_progress {
            let fraction = if self.requested_files == 0 {
                1.0
            } else {
                self.completed_files as f32 / self.requested_files as f32
            };
            on_progress(id, fraction);
        }
    }

    fn report_warning(&mut self, warning: Diagnostic) {
        if let Some(on_warning) = &self.on_warning {
            on_warning(&warning);
        }
        self.warnings.push(warning);
    }

    fn report_error(&mut self, error: Diagnostic) {
        log::error!("{}", error);
        if let Some(on_error) = &self.on_error {
            on_error(&error);
        }
        self.errors.push(error);
    }

    // ========================================================================
    // Graph services
    // ========================================================================

    /// Remove a part type and every placement of it
    pub fn purge_part(&mut self, id: &str) -> Result<Vec<String>> {
        self.part_types.purge_part(id)
    }

    pub fn substitute_replacement_parts(&mut self) {
        self.part_types.substitute_replacement_parts();
    }

    /// Release the steps of parts whose referencing part types are built
    ///
    /// Does nothing unless the cleanup option is set.
    pub fn reclaim_built_parts(&mut self, is_built: &dyn Fn(&str) -> bool) -> Vec<String> {
        if !self.options.clean_up_primitives_and_sub_parts {
            return Vec::new();
        }
        self.part_types.reclaim_built_parts(is_built)
    }

    /// LDraw text of the whole model
    ///
    /// The main model comes first, followed by every referenced part type
    /// that is neither official nor inlined, and the inline textures used.
    pub fn to_ldr(&self) -> Result<String> {
        let main = self.part_types.main_model()?;
        let mut ret = main.to_ldr(&self.part_types, &self.texmaps, false);

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut stack = vec![main.id.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(pt) = self.part_types.part_type(&id) else {
                continue;
            };
            if !pt.is_part || !(pt.inlined.is_some() || pt.is_official_ldraw()) {
                for step in &pt.steps {
                    stack.extend(step.sub_models.iter().map(|sm| sm.id.clone()));
                }
            }
        }
        seen.remove(&main.id);

        let mut texmap_ids: Vec<usize> = main.steps.iter().flat_map(|s| s.texmap_ids()).collect();
        for pt in self.part_types.iter() {
            if seen.contains(&pt.id) && !(pt.inlined.is_some() || pt.is_official_ldraw()) {
                ret.push_str(&pt.to_ldr(&self.part_types, &self.texmaps, false));
                texmap_ids.extend(pt.steps.iter().flat_map(|s| s.texmap_ids()));
            }
        }

        let files: FxHashSet<&str> = texmap_ids
            .iter()
            .filter_map(|idx| self.texmaps.get(*idx))
            .map(|t| t.file.as_str())
            .collect();
        for texture in self.textures.iter().filter(|t| files.contains(t.id.as_str())) {
            ret.push_str(&format!("0 !DATA {}{}", texture.id, LINE_END));
            let encoded = encode_inline_texture(texture);
            // base64 output is ASCII, so byte offsets are char boundaries.
            for start in (0..encoded.len()).step_by(CHARACTERS_PER_LINE) {
                let end = (start + CHARACTERS_PER_LINE).min(encoded.len());
                ret.push_str(&format!("0 !: {}{}", &encoded[start..end], LINE_END));
            }
            ret.push_str(LINE_END);
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const MODEL: &str = "0 FILE model.mpd\r\n\
                         0 Car\r\n\
                         1 16 0 0 0 1 0 0 0 1 0 0 0 1 chassis.ldr\r\n\
                         0 STEP\r\n\
                         1 4 0 -24 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
                         0 STEP\r\n\
                         0 FILE chassis.ldr\r\n\
                         1 1 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
                         1 1 40 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n";

    const BRICK: &str = "0 Brick 2 x 4\r\n\
                         0 Name: 3001.dat\r\n\
                         0 !LDRAW_ORG Part UPDATE 2004-03\r\n\
                         0 BFC CERTIFY CCW\r\n\
                         1 16 0 0 0 1 0 0 0 1 0 0 0 1 s/3001s01.dat\r\n\
                         4 16 -40 0 -20 40 0 -20 40 0 20 -40 0 20\r\n";

    const SUB_PART: &str = "0 ~Brick 2 x 4 without Front and Back Faces\r\n\
                            0 !LDRAW_ORG Subpart\r\n\
                            1 16 0 0 0 1 0 0 0 1 0 0 0 1 4-4edge.dat\r\n";

    fn source() -> MemorySource {
        MemorySource::new()
            .with_file("model.mpd", MODEL)
            .with_file("ldraw_parts/3001.dat", BRICK)
            .with_file("ldraw_unofficial/s/3001s01.dat", SUB_PART)
    }

    fn counter() -> (Arc<AtomicUsize>, LoadCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_load_graph() {
        let (loads, on_load) = counter();
        let mut loader = ModelLoader::new(source()).on_load(on_load);
        loader.load_model("model.mpd").unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
        assert!(loader.errors().is_empty());

        let map = loader.part_types();
        assert_eq!(map.main_model_id(), Some("model.mpd"));
        let main = loader.main_model().unwrap();
        assert!(!main.is_part);
        assert_eq!(main.steps.len(), 2);
        assert!(!map.get("chassis.ldr").unwrap().is_part);
        assert!(map.get("3001.dat").unwrap().is_part);
        assert!(map.get("s/3001s01.dat").unwrap().is_part);
        assert!(map.get("4-4edge.dat").is_some());
        assert!(map.in_flight_ids().is_empty());
        assert_eq!(main.count_parts(map), 3);
    }

    struct CountingSource {
        inner: MemorySource,
        fetched: Arc<Mutex<Vec<String>>>,
    }

    impl FileSource for CountingSource {
        fn fetch(&self, url: &str) -> Result<String> {
            if let Ok(mut fetched) = self.fetched.lock() {
                fetched.push(url.to_string());
            }
            self.inner.fetch(url)
        }
    }

    #[test]
    fn test_shared_parts_complete_once() {
        let triangle = |name: &str| {
            format!(
                "0 Part {}\r\n0 !LDRAW_ORG Part\r\n3 16 0 0 0 1 0 0 0 1 0\r\n",
                name
            )
        };
        let inner = MemorySource::new()
            .with_file(
                "main.ldr",
                "0 Main\r\n\
                 1 16 0 0 0 1 0 0 0 1 0 0 0 1 a.dat\r\n\
                 1 16 0 0 0 1 0 0 0 1 0 0 0 1 b.dat\r\n\
                 1 16 0 0 0 1 0 0 0 1 0 0 0 1 c.dat\r\n\
                 1 16 9 0 0 1 0 0 0 1 0 0 0 1 a.dat\r\n",
            )
            .with_file(
                "ldraw_parts/c.dat",
                "0 Part c\r\n\
                 0 !LDRAW_ORG Part\r\n\
                 1 16 0 0 0 1 0 0 0 1 0 0 0 1 d.dat\r\n\
                 1 16 0 0 0 1 0 0 0 1 0 0 0 1 e.dat\r\n\
                 1 16 0 0 0 1 0 0 0 1 0 0 0 1 b.dat\r\n",
            )
            .with_file("ldraw_parts/a.dat", triangle("a"))
            .with_file("ldraw_parts/b.dat", triangle("b"))
            .with_file("ldraw_parts/d.dat", triangle("d"))
            .with_file("ldraw_parts/e.dat", triangle("e"));
        let fetched = Arc::new(Mutex::new(Vec::new()));
        let source = CountingSource {
            inner,
            fetched: fetched.clone(),
        };

        let (loads, on_load) = counter();
        let mut loader = ModelLoader::new(source).on_load(on_load);
        loader.load_model("main.ldr").unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
        assert!(loader.errors().is_empty());
        assert!(loader.part_types().in_flight_ids().is_empty());
        for id in ["a.dat", "b.dat", "c.dat", "d.dat", "e.dat"] {
            assert!(loader.part_types().get(id).is_some(), "{} not loaded", id);
        }
        // Shared parts are fetched once
        let fetched = fetched.lock().unwrap();
        assert_eq!(fetched.iter().filter(|u| u.ends_with("a.dat")).count(), 1);
        assert_eq!(fetched.iter().filter(|u| u.ends_with("b.dat")).count(), 1);
    }

    #[test]
    fn test_missing_part_is_shown_as_box() {
        let (loads, on_load) = counter();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_sink = errors.clone();
        let source = MemorySource::new()
            .with_file("model.ldr", "1 4 0 0 0 1 0 0 0 1 0 0 0 1 9999.dat\r\n");
        let mut loader = ModelLoader::new(source)
            .on_load(on_load)
            .on_error(Box::new(move |d| {
                if let Ok(mut errors) = errors_sink.lock() {
                    errors.push(d.sub_model.clone());
                }
            }));
        loader.load_model("model.ldr").unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(*errors.lock().unwrap(), vec![Some("9999.dat".to_string())]);
        let placeholder = loader.part_types().get("9999.dat").unwrap();
        assert!(placeholder.is_part);
        assert_eq!(placeholder.steps[0].quads.len(), 6);
    }

    #[test]
    fn test_missing_part_without_substitute() {
        let source = MemorySource::new()
            .with_file("model.ldr", "1 4 0 0 0 1 0 0 0 1 0 0 0 1 9999.dat\r\n");
        let options = LoaderOptions::default().with_substitute_missing_parts(false);
        let mut loader = ModelLoader::new(source).with_options(options);
        loader.load_model("model.ldr").unwrap();
        assert!(!loader.part_types().contains("9999.dat"));
        assert_eq!(loader.errors().len(), 1);
    }

    #[test]
    fn test_progress_reaches_one() {
        let fractions = Arc::new(Mutex::new(Vec::new()));
        let sink = fractions.clone();
        let mut loader = ModelLoader::new(source()).on_progress(Box::new(move |_, f| {
            if let Ok(mut v) = sink.lock() {
                v.push(f);
            }
        }));
        loader.load_model("model.mpd").unwrap();
        let fractions = fractions.lock().unwrap();
        assert_eq!(fractions.last().copied(), Some(1.0));
    }

    #[test]
    fn test_parse_in_memory_and_to_ldr() {
        let mut loader = ModelLoader::new(source());
        loader.parse(
            "0 FILE scene.ldr\r\n\
             0 !TEXMAP START PLANAR 0 0 0 1 0 0 0 0 1 face.png\r\n\
             0 !: 1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
             0 !TEXMAP END\r\n\
             1 16 0 0 0 1 0 0 0 1 0 0 0 1 wall.ldr\r\n\
             0 FILE wall.ldr\r\n\
             1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n\
             0 !DATA face.png\r\n\
             0 !: iVBORw0KGgo=\r\n",
            "scene.ldr",
        );
        loader.run().unwrap();
        assert_eq!(loader.textures().len(), 1);

        let ldr = loader.to_ldr().unwrap();
        assert!(ldr.starts_with("0 FILE scene.ldr\r\n"));
        assert!(ldr.contains("0 FILE wall.ldr\r\n"));
        assert!(!ldr.contains("0 FILE 3001.dat"));
        assert!(ldr.contains("0 !DATA face.png\r\n0 !: iVBORw0KGgo=\r\n"));
    }

    #[test]
    fn test_assemblies() {
        let hips = "0 Hips\r\n0 !LDRAW_ORG Part\r\n3 16 0 0 0 1 0 0 0 1 0\r\n";
        let source = MemorySource::new()
            .with_file(
                "fig.ldr",
                "1 1 0 0 0 1 0 0 0 1 0 0 0 1 3815.dat\r\n\
                 1 1 0 12 0 1 0 0 0 1 0 0 0 1 3816.dat\r\n\
                 1 1 0 12 0 1 0 0 0 1 0 0 0 1 3817.dat\r\n\
                 0 STEP\r\n\
                 1 4 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n",
            )
            .with_file("ldraw_parts/3815.dat", hips)
            .with_file("ldraw_parts/3816.dat", hips)
            .with_file("ldraw_parts/3817.dat", hips)
            .with_file("ldraw_parts/3001.dat", hips);
        let options = LoaderOptions::default().with_build_assemblies(true);
        let mut loader = ModelLoader::new(source).with_options(options);
        loader.load_model("fig.ldr").unwrap();

        let main = loader.main_model().unwrap();
        let ids: Vec<&str> = main.steps[0].sub_models.iter().map(|sm| sm.id.as_str()).collect();
        assert_eq!(ids, vec!["970c00.dat"]);
        assert!(loader.part_types().get("970c00.dat").unwrap().is_part);
    }

    #[test]
    fn test_load_is_idempotent() {
        let (loads, on_load) = counter();
        let mut loader = ModelLoader::new(source()).on_load(on_load);
        loader.load_model("model.mpd").unwrap();
        loader.load("3001.dat");
        loader.run().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_part_type_generates_primitives() {
        let mut loader = ModelLoader::new(MemorySource::new());
        assert!(loader.get_part_type("4-4disc.dat").is_some());
        assert!(loader.get_part_type("3001.dat").is_none());
    }
}
