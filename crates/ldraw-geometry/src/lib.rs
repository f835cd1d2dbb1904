// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # LDraw-Lite Geometry
//!
//! Turns a loaded part type graph into renderable geometry, packs it into a
//! compact binary form, and walks it step by step as building instructions.
//!
//! ## Overview
//!
//! - **Indexed geometry**: [`LdrGeometry`] keeps a sorted, deduplicated
//!   vertex pool with per-color index lists
//! - **Geometry builder**: [`GeometryBuilder`] builds part geometry once per
//!   part type, in parallel with rayon, and hands placed parts to a
//!   [`GeometrySink`]
//! - **Mesh collection**: [`MeshCollector`] buckets faces and lines into
//!   `f32`/`u32` buffers by color
//! - **Binary packing**: [`pack`]/[`unpack`] for whole models and
//!   [`pack_part`]/[`unpack_part`] for the part cache
//! - **Storage**: [`MemoryStorage`] and [`NoopStorage`] implement
//!   [`PartStorage`](ldraw_model::PartStorage)
//! - **Building instructions**: [`StepStateMachine`] walks steps and
//!   sub-assemblies and frames the camera on each step
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ldraw_geometry::{GeometryBuilder, RenderMode, StepStateMachine};
//!
//! let builder = GeometryBuilder::new(loader.part_types());
//! let mut steps = StepStateMachine::for_main_model(&builder, loader.colors(), RenderMode::Standard)?;
//!
//! while steps.next_step() {
//!     println!("Step {} of {}", steps.current_step_index(), steps.total_number_of_steps());
//! }
//! ```

pub mod bounds;
pub mod builder;
pub mod camera;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod packing;
pub mod step_handler;
pub mod storage;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Matrix4, UnitQuaternion, Vector3};

// Re-export main types
pub use bounds::{union_of, BoundingBox};
pub use builder::{placed_in, GeometryBuilder, MAX_DEPTH};
pub use camera::{axis_flip_matrix, CameraFraming};
pub use error::{Error, Result};
pub use geometry::{merge_all, replace_color, ColorMap, LdrGeometry, PartGeometryFn};
pub use mesh::{GeometrySink, LineBucket, MeshBucket, MeshCollector, RenderMode, HARLEQUIN_COLORS};
pub use packing::{
    pack, pack_part, pack_to_bytes, shorten_id, unpack, unpack_bytes, unpack_part, PackedArrays,
    PackedPart, PACK_TAG, PACK_VERSION,
};
pub use step_handler::{StepStateMachine, MOVE_BATCH_SIZE};
pub use storage::{MemoryStorage, NoopStorage, StoredInstructions};
