// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LDraw-Lite Model - Value types and the resolved part type graph
//!
//! This crate provides the in-memory representation of loaded LDraw files.
//! It is shared by the parser, which builds the graph, and by the geometry
//! crate, which turns it into renderable meshes and packed blobs.
//!
//! # Architecture
//!
//! - [`ColorTable`] - Color codes to display, edge and alpha values
//! - [`Primitive`] - Lines, triangles, quads and conditional lines
//! - [`SubModelPlacement`] - A placed reference to another part type
//! - [`Step`] - One building step of primitives and placements
//! - [`PartType`] - The content of one file
//! - [`PartTypeMap`] - Arena of all part types, keyed by lowercase ID
//! - [`PartTypeLookup`], [`FileSource`], [`PartStorage`] - Collaborator seams
//!
//! # Example
//!
//! ```ignore
//! use ldraw_model::{PartTypeMap, PartTypeLookup};
//!
//! let map: PartTypeMap = load_somehow();
//! let main = map.main_model()?;
//! println!("{} parts", main.count_parts(&map));
//! ```

pub mod colors;
pub mod error;
pub mod part_type;
pub mod part_types;
pub mod placement;
pub mod primitives;
pub mod rotation;
pub mod serialize;
pub mod step;
pub mod texmap;
pub mod traits;

// Re-export all public types
pub use colors::*;
pub use error::*;
pub use part_type::*;
pub use part_types::*;
pub use placement::*;
pub use primitives::*;
pub use rotation::*;
pub use serialize::*;
pub use step::*;
pub use texmap::*;
pub use traits::*;
