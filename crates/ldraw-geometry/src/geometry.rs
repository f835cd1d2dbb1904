// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deduplicated, color-grouped geometry
//!
//! [`LdrGeometry`] holds one sorted pool of unique vertices and, for each
//! primitive kind, index lists grouped by color. Triangles and quads are kept
//! in two groups: culled (back faces hidden) and double-sided.
//!
//! The geometry of a part is built once from its steps. Placing it in a
//! parent transforms the vertex pool, substitutes the contextual colors 16
//! and 24 and reverses the winding of culled faces when the placement
//! mirrors or inverts them. Geometries are combined with a sorted merge of
//! their vertex pools.

use crate::bounds::BoundingBox;
use crate::error::Result;
use ldraw_model::{
    edge_color_of, ColorId, ConditionalLine, Line, PartType, Quad, Step, SubModelPlacement,
    Triangle, Vec3, EDGE_COLOR, MAIN_COLOR,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Primitives of `N` points per color, as indices into the vertex pool
///
/// Ordered by color so packing is deterministic.
pub type ColorMap<const N: usize> = BTreeMap<ColorId, Vec<[u32; N]>>;

/// Resolves the unplaced geometry of a part type by ID
pub type PartGeometryFn<'a> = dyn Fn(&str) -> Result<Arc<LdrGeometry>> + 'a;

/// Indexed geometry of a step or a part type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LdrGeometry {
    /// Unique vertices sorted by (x, y, z)
    pub vertices: Vec<Vec3>,
    pub lines: ColorMap<2>,
    pub conditional_lines: ColorMap<4>,
    pub triangles: ColorMap<3>,
    pub double_sided_triangles: ColorMap<3>,
    pub quads: ColorMap<4>,
    pub double_sided_quads: ColorMap<4>,
    /// Covers all points except the control points of conditional lines
    pub bounds: BoundingBox,
}

impl LdrGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Geometry of the primitives of a step, ignoring its placements
    pub fn from_primitives(step: &Step) -> LdrGeometry {
        let mut raw = RawGeometry::default();

        for line in &step.lines {
            raw.bounds.expand_by_point(&line.p1);
            raw.bounds.expand_by_point(&line.p2);
            push(&mut raw.points, &mut raw.geometry.lines, line.color, [line.p1, line.p2]);
        }
        for line in &step.conditional_lines {
            raw.bounds.expand_by_point(&line.p1);
            raw.bounds.expand_by_point(&line.p2);
            push(
                &mut raw.points,
                &mut raw.geometry.conditional_lines,
                line.color,
                [line.p1, line.p2, line.p3, line.p4],
            );
        }
        for t in &step.triangles {
            let points = t.points();
            for p in &points {
                raw.bounds.expand_by_point(p);
            }
            let target = if step.cull && t.cull {
                &mut raw.geometry.triangles
            } else {
                &mut raw.geometry.double_sided_triangles
            };
            push(&mut raw.points, target, t.color, points);
        }
        for q in &step.quads {
            let points = q.points();
            for p in &points {
                raw.bounds.expand_by_point(p);
            }
            let target = if step.cull && q.cull {
                &mut raw.geometry.quads
            } else {
                &mut raw.geometry.double_sided_quads
            };
            push(&mut raw.points, target, q.color, points);
        }

        raw.finish()
    }

    /// Geometry of a step: its primitives merged with its placed sub-models
    ///
    /// `part_geometry` supplies the unplaced geometry of each placed part
    /// type.
    pub fn from_step(step: &Step, part_geometry: &PartGeometryFn<'_>) -> Result<LdrGeometry> {
        let mut geometries = Vec::with_capacity(step.sub_models.len() + 1);
        if step.has_primitives() {
            geometries.push(Self::from_primitives(step));
        }
        for sm in &step.sub_models {
            let g = part_geometry(&sm.id)?;
            geometries.push(g.transformed(sm));
        }

        let mut ret = merge_all(geometries);
        if !step.cull {
            ret.make_double_sided();
        }
        Ok(ret)
    }

    /// Geometry of all steps of a part type
    pub fn from_part_type(pt: &PartType, part_geometry: &PartGeometryFn<'_>) -> Result<LdrGeometry> {
        if pt.steps.is_empty() {
            log::warn!("No steps in {}", pt.id);
            return Ok(LdrGeometry::new());
        }
        let geometries = pt
            .steps
            .iter()
            .map(|step| Self::from_step(step, part_geometry))
            .collect::<Result<Vec<_>>>()?;
        Ok(merge_all(geometries))
    }

    /// Rebuild a step of plain primitives from the indexed geometry
    ///
    /// Double-sided faces come back with `cull` cleared.
    pub fn to_step(&self) -> Step {
        let v = |i: u32| self.vertices[i as usize];
        let mut step = Step::new();
        for (&c, lines) in &self.lines {
            for &[p1, p2] in lines {
                step.add_line(Line::new(c, v(p1), v(p2)));
            }
        }
        for (&c, lines) in &self.conditional_lines {
            for &[p1, p2, p3, p4] in lines {
                step.add_conditional_line(ConditionalLine::new(c, v(p1), v(p2), v(p3), v(p4)));
            }
        }
        for (map, cull) in [(&self.triangles, true), (&self.double_sided_triangles, false)] {
            for (&c, triangles) in map {
                for &[p1, p2, p3] in triangles {
                    step.add_triangle(Triangle::new(c, v(p1), v(p2), v(p3), cull, false));
                }
            }
        }
        for (map, cull) in [(&self.quads, true), (&self.double_sided_quads, false)] {
            for (&c, quads) in map {
                for &[p1, p2, p3, p4] in quads {
                    step.add_quad(Quad::new(c, v(p1), v(p2), v(p3), v(p4), cull, false));
                }
            }
        }
        step
    }

    // ========================================================================
    // Placement and merging
    // ========================================================================

    /// Copy of this geometry placed by `placement`
    pub fn transformed(&self, placement: &SubModelPlacement) -> LdrGeometry {
        let rotation = &placement.rotation;
        let position = &placement.position;
        let raw: Vec<Vec3> = self
            .vertices
            .iter()
            .map(|v| canonical(rotation * v + position))
            .collect();
        let (vertices, index) = sort_and_burn(&raw);

        let invert = placement.invert_ccw != (rotation.determinant() < 0.0);
        let color = placement.color;

        let mut ret = LdrGeometry {
            vertices,
            lines: remap_colored(&self.lines, &index, color, false),
            conditional_lines: remap_colored(&self.conditional_lines, &index, color, false),
            triangles: remap_colored(&self.triangles, &index, color, invert),
            double_sided_triangles: remap_colored(&self.double_sided_triangles, &index, color, false),
            quads: remap_colored(&self.quads, &index, color, invert),
            double_sided_quads: remap_colored(&self.double_sided_quads, &index, color, false),
            bounds: self.bounds.transformed(rotation, position),
        };
        if !placement.cull {
            ret.make_double_sided();
        }
        ret
    }

    /// Merge two geometries, keeping the vertex pool sorted and unique
    pub fn merge(self, other: LdrGeometry) -> LdrGeometry {
        let mut vertices = Vec::with_capacity(self.vertices.len() + other.vertices.len());
        let mut index_this = Vec::with_capacity(self.vertices.len());
        let mut index_other = Vec::with_capacity(other.vertices.len());

        let (mut i, mut j) = (0, 0);
        while i < self.vertices.len() && j < other.vertices.len() {
            let a = self.vertices[i];
            let b = other.vertices[j];
            let next = vertices.len() as u32;
            match compare_vertices(&a, &b) {
                Ordering::Equal => {
                    index_this.push(next);
                    index_other.push(next);
                    vertices.push(a);
                    i += 1;
                    j += 1;
                }
                Ordering::Less => {
                    index_this.push(next);
                    vertices.push(a);
                    i += 1;
                }
                Ordering::Greater => {
                    index_other.push(next);
                    vertices.push(b);
                    j += 1;
                }
            }
        }
        for &a in &self.vertices[i..] {
            index_this.push(vertices.len() as u32);
            vertices.push(a);
        }
        for &b in &other.vertices[j..] {
            index_other.push(vertices.len() as u32);
            vertices.push(b);
        }

        let mut ret = LdrGeometry {
            vertices,
            bounds: self.bounds.union(&other.bounds),
            ..Default::default()
        };
        append(&mut ret.lines, self.lines, &index_this);
        append(&mut ret.lines, other.lines, &index_other);
        append(&mut ret.conditional_lines, self.conditional_lines, &index_this);
        append(&mut ret.conditional_lines, other.conditional_lines, &index_other);
        append(&mut ret.triangles, self.triangles, &index_this);
        append(&mut ret.triangles, other.triangles, &index_other);
        append(&mut ret.double_sided_triangles, self.double_sided_triangles, &index_this);
        append(&mut ret.double_sided_triangles, other.double_sided_triangles, &index_other);
        append(&mut ret.quads, self.quads, &index_this);
        append(&mut ret.quads, other.quads, &index_other);
        append(&mut ret.double_sided_quads, self.double_sided_quads, &index_this);
        append(&mut ret.double_sided_quads, other.double_sided_quads, &index_other);
        ret
    }

    /// Move all culled faces to the double-sided groups
    pub fn make_double_sided(&mut self) {
        for (c, triangles) in std::mem::take(&mut self.triangles) {
            self.double_sided_triangles.entry(c).or_default().extend(triangles);
        }
        for (c, quads) in std::mem::take(&mut self.quads) {
            self.double_sided_quads.entry(c).or_default().extend(quads);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn line_count(&self) -> usize {
        count(&self.lines)
    }

    pub fn conditional_line_count(&self) -> usize {
        count(&self.conditional_lines)
    }

    /// Culled and double-sided triangles
    pub fn triangle_count(&self) -> usize {
        count(&self.triangles) + count(&self.double_sided_triangles)
    }

    /// Culled and double-sided quads
    pub fn quad_count(&self) -> usize {
        count(&self.quads) + count(&self.double_sided_quads)
    }

    pub fn is_empty(&self) -> bool {
        self.line_count() == 0
            && self.conditional_line_count() == 0
            && self.triangle_count() == 0
            && self.quad_count() == 0
    }

    /// All colors used by faces
    pub fn face_colors(&self) -> Vec<ColorId> {
        let mut colors: Vec<ColorId> = self
            .triangles
            .keys()
            .chain(self.double_sided_triangles.keys())
            .chain(self.quads.keys())
            .chain(self.double_sided_quads.keys())
            .copied()
            .collect();
        colors.sort_unstable();
        colors.dedup();
        colors
    }
}

/// Merge geometries pairwise in rounds until one is left
pub fn merge_all(mut geometries: Vec<LdrGeometry>) -> LdrGeometry {
    while geometries.len() > 1 {
        let mut next = Vec::with_capacity(geometries.len() / 2 + 1);
        let mut iter = geometries.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.merge(b)),
                None => next.push(a),
            }
        }
        geometries = next;
    }
    geometries.pop().unwrap_or_default()
}

/// Color of a primitive of color `c` inside a placement of `placement_color`
pub fn replace_color(placement_color: ColorId, c: ColorId) -> ColorId {
    match placement_color {
        MAIN_COLOR => c,
        EDGE_COLOR => {
            if c == MAIN_COLOR {
                EDGE_COLOR
            } else {
                c
            }
        }
        pc if pc < 0 => {
            if c == MAIN_COLOR || c == EDGE_COLOR {
                pc
            } else {
                c
            }
        }
        pc => match c {
            MAIN_COLOR => pc,
            EDGE_COLOR => edge_color_of(pc),
            _ => c,
        },
    }
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default)]
struct RawGeometry {
    points: Vec<Vec3>,
    geometry: LdrGeometry,
    bounds: BoundingBox,
}

impl RawGeometry {
    /// Sort and deduplicate the collected points and point the primitives
    /// at the resulting pool
    fn finish(self) -> LdrGeometry {
        let (vertices, index) = sort_and_burn(&self.points);
        let mut g = self.geometry;
        remap(&mut g.lines, &index);
        remap(&mut g.conditional_lines, &index);
        remap(&mut g.triangles, &index);
        remap(&mut g.double_sided_triangles, &index);
        remap(&mut g.quads, &index);
        remap(&mut g.double_sided_quads, &index);
        g.vertices = vertices;
        g.bounds = self.bounds;
        g
    }
}

fn push<const N: usize>(
    points: &mut Vec<Vec3>,
    map: &mut ColorMap<N>,
    color: ColorId,
    pts: [Vec3; N],
) {
    let start = points.len() as u32;
    let mut idx = [0u32; N];
    for (i, p) in pts.iter().enumerate() {
        points.push(canonical(*p));
        idx[i] = start + i as u32;
    }
    map.entry(color).or_default().push(idx);
}

/// Order by x, then y, then z
fn compare_vertices(a: &Vec3, b: &Vec3) -> Ordering {
    a.x.total_cmp(&b.x)
        .then_with(|| a.y.total_cmp(&b.y))
        .then_with(|| a.z.total_cmp(&b.z))
}

/// Replace -0.0 by 0.0 so equal points sort together
fn canonical(v: Vec3) -> Vec3 {
    Vec3::new(v.x + 0.0, v.y + 0.0, v.z + 0.0)
}

/// Sorted unique points, and for each input point its index in them
fn sort_and_burn(raw: &[Vec3]) -> (Vec<Vec3>, Vec<u32>) {
    let mut order: Vec<usize> = (0..raw.len()).collect();
    order.sort_by(|&a, &b| compare_vertices(&raw[a], &raw[b]));

    let mut vertices: Vec<Vec3> = Vec::with_capacity(raw.len());
    let mut index = vec![0u32; raw.len()];
    for i in order {
        let v = raw[i];
        if vertices.last() != Some(&v) {
            vertices.push(v);
        }
        index[i] = (vertices.len() - 1) as u32;
    }
    (vertices, index)
}

fn remap<const N: usize>(map: &mut ColorMap<N>, index: &[u32]) {
    for primitives in map.values_mut() {
        for p in primitives.iter_mut() {
            for i in p.iter_mut() {
                *i = index[*i as usize];
            }
        }
    }
}

fn remap_colored<const N: usize>(
    src: &ColorMap<N>,
    index: &[u32],
    placement_color: ColorId,
    reverse: bool,
) -> ColorMap<N> {
    let mut ret: ColorMap<N> = BTreeMap::new();
    for (&c, primitives) in src {
        let target = ret.entry(replace_color(placement_color, c)).or_default();
        target.extend(primitives.iter().map(|p| {
            let mut q = p.map(|i| index[i as usize]);
            if reverse {
                q.reverse();
            }
            q
        }));
    }
    ret
}

fn append<const N: usize>(into: &mut ColorMap<N>, from: ColorMap<N>, index: &[u32]) {
    for (c, primitives) in from {
        into.entry(c)
            .or_default()
            .extend(primitives.into_iter().map(|p| p.map(|i| index[i as usize])));
    }
}

fn count<const N: usize>(map: &ColorMap<N>) -> usize {
    map.values().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ldraw_model::Mat3;

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    fn two_triangles() -> Step {
        let mut step = Step::new();
        step.add_triangle(Triangle::new(16, v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0), true, false));
        step.add_triangle(Triangle::new(4, v(1.0, 0.0, 0.0), v(1.0, 1.0, 0.0), v(0.0, 1.0, 0.0), true, false));
        step.add_line(Line::new(24, v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0)));
        step
    }

    fn no_parts(id: &str) -> Result<Arc<LdrGeometry>> {
        Err(crate::Error::part_not_loaded(id))
    }

    #[test]
    fn test_from_primitives_dedupes_vertices() {
        let g = LdrGeometry::from_primitives(&two_triangles());
        assert_eq!(g.vertex_count(), 4);
        assert_eq!(g.triangle_count(), 2);
        assert_eq!(g.line_count(), 1);
        assert!(g.vertices.windows(2).all(|w| compare_vertices(&w[0], &w[1]) == Ordering::Less));

        // Shared corner (1, 0, 0) resolves to the same index in both colors
        let t16 = g.triangles[&16][0];
        let t4 = g.triangles[&4][0];
        assert_eq!(t16[1], t4[0]);
        assert_relative_eq!(g.vertices[t16[1] as usize], v(1.0, 0.0, 0.0));
        assert_relative_eq!(g.bounds.max, v(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_uncertified_step_is_double_sided() {
        let mut step = two_triangles();
        step.cull = false;
        let g = LdrGeometry::from_primitives(&step);
        assert!(g.triangles.is_empty());
        assert_eq!(count(&g.double_sided_triangles), 2);
    }

    #[test]
    fn test_transformed_colors_and_winding() {
        let g = LdrGeometry::from_primitives(&two_triangles());

        let placed = g.transformed(&SubModelPlacement::new(
            1,
            v(10.0, 0.0, 0.0),
            Mat3::identity(),
            "x.dat",
            true,
            false,
        ));
        assert_eq!(placed.face_colors(), vec![1, 4]);
        assert_eq!(placed.lines.keys().copied().collect::<Vec<_>>(), vec![-2]);
        assert_relative_eq!(placed.bounds.min, v(10.0, 0.0, 0.0));

        // Mirrored placement reverses culled faces
        let mirror = Mat3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let mirrored = g.transformed(&SubModelPlacement::new(16, Vec3::zeros(), mirror, "x.dat", true, false));
        let [a, b, c] = mirrored.triangles[&16][0];
        let pts = [a, b, c].map(|i| mirrored.vertices[i as usize]);
        assert_relative_eq!(pts[0], v(0.0, 1.0, 0.0));
        assert_relative_eq!(pts[1], v(-1.0, 0.0, 0.0));
        assert_relative_eq!(pts[2], v(0.0, 0.0, 0.0));

        // Mirrored and inverted cancel out
        let both = g.transformed(&SubModelPlacement::new(16, Vec3::zeros(), mirror, "x.dat", true, true));
        let [a, _, _] = both.triangles[&16][0];
        assert_relative_eq!(both.vertices[a as usize], v(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_replace_color() {
        assert_eq!(replace_color(16, 16), 16);
        assert_eq!(replace_color(24, 16), 24);
        assert_eq!(replace_color(4, 16), 4);
        assert_eq!(replace_color(4, 24), -5);
        assert_eq!(replace_color(4, 7), 7);
        assert_eq!(replace_color(-5, 16), -5);
        assert_eq!(replace_color(-5, 24), -5);
    }

    #[test]
    fn test_merge_keeps_pool_sorted_and_unique() {
        let a = LdrGeometry::from_primitives(&two_triangles());
        let b = a.transformed(&SubModelPlacement::new(2, v(0.5, 0.0, 0.0), Mat3::identity(), "x.dat", true, false));
        let merged = merge_all(vec![a.clone(), b, a]);
        assert!(merged.vertices.windows(2).all(|w| compare_vertices(&w[0], &w[1]) == Ordering::Less));
        assert_eq!(merged.triangle_count(), 6);
        assert_eq!(merged.face_colors(), vec![2, 4, 16]);
        for [p1, p2, p3] in merged.triangles.values().flatten() {
            assert!((*p1 as usize) < merged.vertices.len());
            assert!((*p2 as usize) < merged.vertices.len());
            assert!((*p3 as usize) < merged.vertices.len());
        }
    }

    #[test]
    fn test_from_step_with_sub_models() {
        let part = Arc::new(LdrGeometry::from_primitives(&two_triangles()));
        let mut step = Step::new();
        step.add_sub_model(SubModelPlacement::new(1, Vec3::zeros(), Mat3::identity(), "a.dat", true, false));
        step.add_sub_model(SubModelPlacement::new(2, v(0.0, 5.0, 0.0), Mat3::identity(), "a.dat", false, false));
        let lookup = |_: &str| -> Result<Arc<LdrGeometry>> { Ok(part.clone()) };
        let g = LdrGeometry::from_step(&step, &lookup).unwrap();
        assert_eq!(g.vertex_count(), 8);
        assert_eq!(count(&g.triangles), 2);
        assert_eq!(count(&g.double_sided_triangles), 2);
        assert_relative_eq!(g.bounds.max, v(1.0, 6.0, 0.0));

        assert!(LdrGeometry::from_step(&step, &no_parts).is_err());
    }

    #[test]
    fn test_to_step_rebuilds_same_geometry() {
        let mut step = two_triangles();
        step.add_quad(Quad::new(7, v(0.0, 0.0, 1.0), v(1.0, 0.0, 1.0), v(1.0, 1.0, 1.0), v(0.0, 1.0, 1.0), false, false));
        step.add_conditional_line(ConditionalLine::new(24, v(0.0, 0.0, 0.0), v(0.0, 0.0, 1.0), v(5.0, 5.0, 5.0), v(-5.0, 5.0, 5.0)));
        let g = LdrGeometry::from_primitives(&step);
        assert_eq!(LdrGeometry::from_primitives(&g.to_step()), g);
    }
}
