// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh collection
//!
//! [`GeometrySink`] is where placed part geometry leaves the model graph.
//! [`MeshCollector`] implements it by sorting faces into opaque, transparent
//! and color-16 buckets of GPU-ready `f32` positions and `u32` indices, with
//! separate buckets for lines and conditional lines and a running bounding
//! box.
//!
//! How faces are colored is decided once, by the [`RenderMode`] given to
//! [`MeshCollector::new`].

use crate::bounds::BoundingBox;
use crate::geometry::LdrGeometry;
use ldraw_model::{ColorId, ColorTable, Diagnostic, SubModelPlacement, Vec3, MAIN_COLOR};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Receiver of placed geometry
pub trait GeometrySink {
    /// Receive the unplaced geometry of part type `id` and its placement
    ///
    /// # Arguments
    /// * `id` - ID of the part type the geometry belongs to
    /// * `geometry` - Geometry in the part's own coordinates
    /// * `placement` - Color, position, rotation, culling and inversion to apply
    fn add_geometry(&mut self, id: &str, geometry: &LdrGeometry, placement: &SubModelPlacement);

    /// A placed sub-model could not be generated and was skipped
    fn report_error(&mut self, diagnostic: Diagnostic) {
        log::error!("{}", diagnostic);
    }
}

/// Face coloring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Faces in their own colors
    #[default]
    Standard,
    /// Culled front faces green, their back faces red, double-sided faces blue
    Bfc,
    /// Every placed part in a color of its own from [`HARLEQUIN_COLORS`]
    Harlequin,
}

pub const BFC_FRONT_COLOR: ColorId = 2;
pub const BFC_BACK_COLOR: ColorId = 4;
pub const BFC_DOUBLE_SIDED_COLOR: ColorId = 1;
pub const BFC_LINE_COLOR: ColorId = 0;

/// Colors cycled through in [`RenderMode::Harlequin`]
pub const HARLEQUIN_COLORS: &[ColorId] = &[
    1, 2, 4, 5, 14, 19, 22, 25, 26, 27, 28, 29, 30, 31, 70, 71, 72, 85, 191, 320, 321, 322,
];

/// Triangles of one color
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBucket {
    pub color: ColorId,
    /// Flat `[x, y, z, x, y, z, ...]`
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshBucket {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Line segments of one color
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineBucket {
    pub color: ColorId,
    /// Two points per segment
    pub positions: Vec<f32>,
    /// Two control points per segment, for conditional lines only
    pub controls: Vec<f32>,
}

impl LineBucket {
    pub fn line_count(&self) -> usize {
        self.positions.len() / 6
    }
}

/// Collects placed geometry into color buckets
#[derive(Debug)]
pub struct MeshCollector<'a> {
    colors: &'a ColorTable,
    mode: RenderMode,
    pub opaque: Vec<MeshBucket>,
    pub transparent: Vec<MeshBucket>,
    /// Faces still in the main color, to be drawn after opaque faces
    pub sixteen: Vec<MeshBucket>,
    pub lines: Vec<LineBucket>,
    pub conditional_lines: Vec<LineBucket>,
    bounds: Option<BoundingBox>,
    visible: bool,
    old: bool,
    placed_parts: usize,
    warnings: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
}

struct FaceGroup {
    color: ColorId,
    faces: Vec<[u32; 3]>,
    double_sided: bool,
}

impl<'a> MeshCollector<'a> {
    pub fn new(colors: &'a ColorTable, mode: RenderMode) -> Self {
        Self {
            colors,
            mode,
            opaque: Vec::new(),
            transparent: Vec::new(),
            sixteen: Vec::new(),
            lines: Vec::new(),
            conditional_lines: Vec::new(),
            bounds: None,
            visible: true,
            old: false,
            placed_parts: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn bounds(&self) -> Option<&BoundingBox> {
        self.bounds.as_ref()
    }

    pub fn expand_bounds_by_point(&mut self, p: &Vec3) {
        self.bounds
            .get_or_insert_with(BoundingBox::empty)
            .expand_by_point(p);
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether the content belongs to an earlier step
    pub fn is_old(&self) -> bool {
        self.old
    }

    /// Mark the content as belonging to an earlier step or not
    pub fn draw(&mut self, old: bool) {
        self.old = old;
    }

    /// Number of part placements received
    pub fn placed_parts(&self) -> usize {
        self.placed_parts
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn triangle_count(&self) -> usize {
        self.opaque
            .iter()
            .chain(&self.transparent)
            .chain(&self.sixteen)
            .map(MeshBucket::triangle_count)
            .sum()
    }

    pub fn line_count(&self) -> usize {
        self.lines.iter().map(LineBucket::line_count).sum()
    }

    pub fn conditional_line_count(&self) -> usize {
        self.conditional_lines.iter().map(LineBucket::line_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0 && self.line_count() == 0 && self.conditional_line_count() == 0
    }

    // ========================================================================
    // Color handling
    // ========================================================================

    /// Color to draw `c` with, black for codes missing from the table
    fn checked_color(&mut self, c: ColorId, id: &str) -> ColorId {
        if c == MAIN_COLOR || self.colors.resolve(c).is_ok() {
            return c;
        }
        log::warn!("Unknown color {} in {}. Black (0) will be shown instead.", c, id);
        self.warnings.push(
            Diagnostic::new(format!("Unknown color \"{}\". Black (0) will be shown instead.", c))
                .in_sub_model(id),
        );
        0
    }

    fn push_faces(&mut self, color: ColorId, vertices: &[Vec3], faces: &[[u32; 3]], both_sides: bool) {
        let target = if color == MAIN_COLOR {
            &mut self.sixteen
        } else if self.colors.is_transparent(color) {
            &mut self.transparent
        } else {
            &mut self.opaque
        };
        let bucket = bucket_mut(target, color);

        let mut remap: FxHashMap<u32, u32> = FxHashMap::default();
        let mut vertex = |bucket: &mut MeshBucket, i: u32| -> u32 {
            *remap.entry(i).or_insert_with(|| {
                let idx = bucket.vertex_count() as u32;
                let v = vertices[i as usize];
                bucket.positions.extend([v.x as f32, v.y as f32, v.z as f32]);
                idx
            })
        };
        for face in faces {
            let [a, b, c] = face.map(|i| vertex(bucket, i));
            bucket.indices.extend([a, b, c]);
            if both_sides {
                bucket.indices.extend([c, b, a]);
            }
        }
    }
}

impl GeometrySink for MeshCollector<'_> {
    fn add_geometry(&mut self, id: &str, geometry: &LdrGeometry, placement: &SubModelPlacement) {
        let placed = geometry.transformed(placement);
        let harlequin = HARLEQUIN_COLORS[self.placed_parts % HARLEQUIN_COLORS.len()];
        self.placed_parts += 1;

        if !placed.bounds.is_empty() {
            let bounds = self.bounds.get_or_insert_with(BoundingBox::empty);
            *bounds = bounds.union(&placed.bounds);
        }

        for group in face_groups(&placed) {
            match self.mode {
                RenderMode::Standard => {
                    let color = self.checked_color(group.color, id);
                    self.push_faces(color, &placed.vertices, &group.faces, group.double_sided);
                }
                // Faces of a placement that does not cull are all double-sided
                RenderMode::Bfc if group.double_sided || !placement.cull => {
                    self.push_faces(BFC_DOUBLE_SIDED_COLOR, &placed.vertices, &group.faces, true);
                }
                RenderMode::Bfc => {
                    let back: Vec<[u32; 3]> = group.faces.iter().map(|&[a, b, c]| [c, b, a]).collect();
                    self.push_faces(BFC_FRONT_COLOR, &placed.vertices, &group.faces, false);
                    self.push_faces(BFC_BACK_COLOR, &placed.vertices, &back, false);
                }
                RenderMode::Harlequin => {
                    self.push_faces(harlequin, &placed.vertices, &group.faces, group.double_sided);
                }
            }
        }

        for (&c, lines) in &placed.lines {
            let color = match self.mode {
                RenderMode::Bfc => BFC_LINE_COLOR,
                _ => self.checked_color(c, id),
            };
            let bucket = line_bucket_mut(&mut self.lines, color);
            for &[p1, p2] in lines {
                push_point(&mut bucket.positions, &placed.vertices[p1 as usize]);
                push_point(&mut bucket.positions, &placed.vertices[p2 as usize]);
            }
        }
        for (&c, lines) in &placed.conditional_lines {
            let color = match self.mode {
                RenderMode::Bfc => BFC_LINE_COLOR,
                _ => self.checked_color(c, id),
            };
            let bucket = line_bucket_mut(&mut self.conditional_lines, color);
            for &[p1, p2, p3, p4] in lines {
                push_point(&mut bucket.positions, &placed.vertices[p1 as usize]);
                push_point(&mut bucket.positions, &placed.vertices[p2 as usize]);
                push_point(&mut bucket.controls, &placed.vertices[p3 as usize]);
                push_point(&mut bucket.controls, &placed.vertices[p4 as usize]);
            }
        }
    }

    fn report_error(&mut self, diagnostic: Diagnostic) {
        log::error!("{}", diagnostic);
        self.errors.push(diagnostic);
    }
}

/// Faces per color, quads split into two triangles
fn face_groups(g: &LdrGeometry) -> Vec<FaceGroup> {
    let mut groups: Vec<FaceGroup> = Vec::new();
    let mut group = |color: ColorId, double_sided: bool| -> usize {
        match groups
            .iter()
            .position(|g| g.color == color && g.double_sided == double_sided)
        {
            Some(i) => i,
            None => {
                groups.push(FaceGroup {
                    color,
                    faces: Vec::new(),
                    double_sided,
                });
                groups.len() - 1
            }
        }
    };

    let mut indexed: Vec<(usize, Vec<[u32; 3]>)> = Vec::new();
    for (triangles, double_sided) in [(&g.triangles, false), (&g.double_sided_triangles, true)] {
        for (&c, t) in triangles {
            indexed.push((group(c, double_sided), t.clone()));
        }
    }
    for (quads, double_sided) in [(&g.quads, false), (&g.double_sided_quads, true)] {
        for (&c, q) in quads {
            let faces = q.iter().flat_map(|&[a, b, c, d]| [[a, b, d], [b, c, d]]).collect();
            indexed.push((group(c, double_sided), faces));
        }
    }
    for (i, faces) in indexed {
        groups[i].faces.extend(faces);
    }
    groups
}

fn bucket_mut(buckets: &mut Vec<MeshBucket>, color: ColorId) -> &mut MeshBucket {
    let idx = match buckets.iter().position(|b| b.color == color) {
        Some(idx) => idx,
        None => {
            buckets.push(MeshBucket {
                color,
                ..Default::default()
            });
            buckets.len() - 1
        }
    };
    &mut buckets[idx]
}

fn line_bucket_mut(buckets: &mut Vec<LineBucket>, color: ColorId) -> &mut LineBucket {
    let idx = match buckets.iter().position(|b| b.color == color) {
        Some(idx) => idx,
        None => {
            buckets.push(LineBucket {
                color,
                ..Default::default()
            });
            buckets.len() - 1
        }
    };
    &mut buckets[idx]
}

fn push_point(into: &mut Vec<f32>, p: &Vec3) {
    into.extend([p.x as f32, p.y as f32, p.z as f32]);
}
