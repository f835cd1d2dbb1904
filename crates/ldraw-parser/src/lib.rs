// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LDraw-Lite Parser - LDraw line parser and model loader
//!
//! This crate reads LDraw `.ldr`, `.mpd` and `.dat` files into the part type
//! graph defined in `ldraw-model`.
//!
//! # Features
//!
//! - **Fast line scanning** using `memchr`
//! - **Strict number parsing** using `nom` and `lexical-core`; malformed
//!   lines are skipped with a warning
//! - **BFC aware**: winding and culling follow `BFC` meta commands
//! - **Texture mapping** through `!TEXMAP` and inline `!DATA` blocks
//! - **Model loader** resolving every referenced file through a
//!   [`FileSource`](ldraw_model::FileSource), with primitive generation,
//!   placeholder boxes for missing parts and assembly detection
//!
//! # Example
//!
//! ```ignore
//! use ldraw_parser::{DirectorySource, LoaderOptions, ModelLoader};
//!
//! let mut loader = ModelLoader::new(DirectorySource::new("ldraw"))
//!     .with_options(LoaderOptions::default().with_build_assemblies(true));
//! loader.load_model("car.mpd")?;
//!
//! let main = loader.main_model()?;
//! println!("{} steps", main.steps.len());
//! ```

pub mod assemblies;
pub mod generator;
mod loader;
mod options;
mod parser;
mod scanner;
mod source;
mod texmap;
mod tokenizer;

pub use assemblies::{AssemblyDefinition, AssemblyManager, ASSEMBLIES};
pub use loader::{DiagnosticCallback, LoadCallback, ModelLoader};
pub use options::LoaderOptions;
pub use parser::{LineParser, ParsedDocument};
pub use scanner::LineScanner;
pub use source::{DirectorySource, MemorySource};
pub use texmap::{decode_inline_texture, detect_mimetype, encode_inline_texture, parse_texmap};
pub use tokenizer::{normalize_id, parse_color, parse_float, tokenize, ColorToken};

use ldraw_model::{ColorTable, TexmapPlacement};

/// Quick parse of a single document with the built-in color table
///
/// Referenced files are not loaded. Use [`ModelLoader`] to resolve them.
pub fn parse(content: &str, default_id: &str) -> ParsedDocument {
    let mut colors = ColorTable::default();
    let mut texmaps: Vec<TexmapPlacement> = Vec::new();
    LineParser::new(&mut colors, &mut texmaps).parse(content, default_id)
}
