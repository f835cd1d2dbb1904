// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Texture map placements (`0 !TEXMAP`)
//!
//! A placement maps a texture image onto the primitives that follow it.
//! `NEXT` placements apply to exactly one following line. `START` placements
//! apply until `0 !TEXMAP END` and may carry a fallback step that is used by
//! renderers which cannot sample the texture.

use crate::serialize::vector_to_ldr;
use crate::{PartTypeLookup, Step, TexmapId, Vec3, SubModelPlacement};
use serde::{Deserialize, Serialize};

const WRAP_EPSILON: f64 = 1e-4;

/// Projection used to compute texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TexmapMethod {
    Planar,
    /// `a`: angular extent in radians
    Cylindrical { a: f64 },
    /// `a`, `b`: angular extents in radians
    Spherical { a: f64, b: f64 },
}

impl TexmapMethod {
    pub fn name(&self) -> &'static str {
        match self {
            TexmapMethod::Planar => "PLANAR",
            TexmapMethod::Cylindrical { .. } => "CYLINDRICAL",
            TexmapMethod::Spherical { .. } => "SPHERICAL",
        }
    }

    /// Numeric tag used by the binary format: 0, 1 or 2
    pub fn tag(&self) -> i32 {
        match self {
            TexmapMethod::Planar => 0,
            TexmapMethod::Cylindrical { .. } => 1,
            TexmapMethod::Spherical { .. } => 2,
        }
    }
}

/// Texture placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TexmapPlacement {
    pub idx: TexmapId,
    pub method: TexmapMethod,
    pub points: [Vec3; 3],
    pub file: String,
    pub glossmap: Option<String>,
    pub fallback: Step,
    pub next_only: bool,
    pub used: bool,
}

impl TexmapPlacement {
    pub fn new(idx: TexmapId, method: TexmapMethod, points: [Vec3; 3], file: impl Into<String>) -> Self {
        Self {
            idx,
            method,
            points,
            file: file.into(),
            glossmap: None,
            fallback: Step::new(),
            next_only: false,
            used: false,
        }
    }

    /// Register one use. A `NEXT` placement expires after its first use.
    pub fn mark_used(&mut self) {
        if self.next_only {
            self.used = true;
        }
    }

    /// Move the reference points into the frame of a placement
    pub fn place_at(&mut self, placement: &SubModelPlacement) {
        for p in self.points.iter_mut() {
            *p = placement.rotation * *p + placement.position;
        }
    }

    /// Texture coordinates of `p`
    ///
    /// `ctx1` and `ctx2` are the other corners of the face `p` belongs to.
    /// They resolve the seam of cylindrical and spherical projections.
    pub fn uv(&self, p: &Vec3, ctx1: &Vec3, ctx2: &Vec3) -> (f64, f64) {
        match self.method {
            TexmapMethod::Planar => self.uv_planar(p),
            TexmapMethod::Cylindrical { a } => self.uv_cylindrical(a, p, ctx1, ctx2),
            TexmapMethod::Spherical { a, b } => self.uv_spherical(a, b, p, ctx1, ctx2),
        }
    }

    fn uv_planar(&self, p: &Vec3) -> (f64, f64) {
        let [p0, p1, p2] = &self.points;
        let n1 = p1 - p0;
        let d1 = -n1.dot(p0);
        let n2 = p2 - p0;
        let d2 = -n2.dot(p0);

        let u = (n1.dot(p) + d1) / n1.norm_squared();
        // Flipped since images are stored top row first.
        let v = 1.0 - (n2.dot(p) + d2) / n2.norm_squared();
        (u, v)
    }

    fn uv_cylindrical(&self, a: f64, p: &Vec3, ctx1: &Vec3, ctx2: &Vec3) -> (f64, f64) {
        let [p0, p1, p2] = &self.points;
        let axis = p1 - p0;
        let height = axis.norm();
        let n = axis / height;
        let d = -n.dot(p1);
        let m = project_to_plane(&n, p0, p2) - p0;

        let get_u = |pt: &Vec3| {
            let q = project_to_plane(&n, p0, pt);
            let p1q = p0 - q;
            let cross = p1q.cross(&m);
            let angle = (-cross.dot(&n)).atan2(-m.dot(&p1q));
            0.5 + angle / a
        };

        let mut u = get_u(p);
        if u.abs() < WRAP_EPSILON || (u - 1.0).abs() < WRAP_EPSILON {
            let (u1, u2) = (get_u(ctx1), get_u(ctx2));
            if (u2 - u).abs() > 0.75 || (u1 - u).abs() > 0.75 {
                u = 1.0 - u;
            }
        }

        let v = -(n.dot(p) + d) / height;
        (u, v)
    }

    fn uv_spherical(&self, a: f64, b: f64, p: &Vec3, ctx1: &Vec3, ctx2: &Vec3) -> (f64, f64) {
        let [p0, p1, p2] = &self.points;
        let n = p1 - p0;
        let m = p2 - p0;
        let normal = n.cross(&m).normalize();
        let d = -normal.dot(p0);

        let get_u = |pt: &Vec3| {
            let q = project_to_plane(&normal, p0, pt) - p0;
            let cross = q.cross(&n);
            0.5 + (-cross.dot(&normal)).atan2(q.dot(&n)) / a
        };

        let mut u = get_u(p);
        if u < WRAP_EPSILON {
            let (u1, u2) = (get_u(ctx1), get_u(ctx2));
            if u2 > 0.75 || u1 > 0.75 {
                u = 1.0 - u;
            }
        }

        let dist_to_center = (p0 - p).norm();
        let dist_to_plane = normal.dot(p) + d;
        let v = 0.5 + (dist_to_plane / dist_to_center).asin() / b;
        (u, v)
    }

    /// Write the placement with the already formatted `lines` it applies to
    pub fn to_ldr(&self, lines: &[String], lookup: &dyn PartTypeLookup, texmaps: &[TexmapPlacement]) -> String {
        let next_only = lines.len() == 1 && self.fallback.is_empty();

        let mut ret = format!(
            "0 !TEXMAP {} {} ",
            if next_only { "NEXT" } else { "START" },
            self.method.name()
        );
        for p in &self.points {
            ret.push_str(&vector_to_ldr(p));
            ret.push(' ');
        }
        match self.method {
            TexmapMethod::Planar => {}
            TexmapMethod::Cylindrical { a } => {
                ret.push_str(&format!("{} ", format_degrees(a)));
            }
            TexmapMethod::Spherical { a, b } => {
                ret.push_str(&format!("{} {} ", format_degrees(a), format_degrees(b)));
            }
        }
        ret.push_str(&self.file);
        if let Some(glossmap) = &self.glossmap {
            ret.push_str(" GLOSSMAP ");
            ret.push_str(glossmap);
        }
        ret.push_str("\r\n");

        for line in lines {
            ret.push_str("0 !: ");
            ret.push_str(line);
        }

        if !next_only {
            if !self.fallback.is_empty() {
                ret.push_str("0 !TEXMAP FALLBACK\r\n");
                ret.push_str(&self.fallback.to_ldr(lookup, texmaps, None, true));
            }
            ret.push_str("0 !TEXMAP END\r\n");
        }
        ret
    }
}

/// Projection of `p` onto the plane through `p0` with unit normal `n`
fn project_to_plane(n: &Vec3, p0: &Vec3, p: &Vec3) -> Vec3 {
    p - n * n.dot(&(p - p0))
}

/// Radians to degrees, rounded to 4 decimals without trailing zeros
fn format_degrees(rad: f64) -> String {
    let deg = (rad.to_degrees() * 10000.0).round() / 10000.0;
    let mut s = format!("{:.4}", deg);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Inline texture image from a `0 !DATA` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineTexture {
    pub id: String,
    /// `png` or `jpeg`
    pub mimetype: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartTypeMap;
    use approx::assert_relative_eq;

    fn planar() -> TexmapPlacement {
        TexmapPlacement::new(
            0,
            TexmapMethod::Planar,
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 20.0),
            ],
            "logo.png",
        )
    }

    #[test]
    fn test_planar_uv() {
        let t = planar();
        let o = Vec3::zeros();
        let (u, v) = t.uv(&Vec3::new(5.0, 3.0, 5.0), &o, &o);
        assert_relative_eq!(u, 0.5);
        assert_relative_eq!(v, 0.75);
    }

    #[test]
    fn test_cylindrical_uv() {
        let t = TexmapPlacement::new(
            0,
            TexmapMethod::Cylindrical { a: std::f64::consts::PI },
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, -10.0, 0.0),
                Vec3::new(0.0, 0.0, -5.0),
            ],
            "label.png",
        );
        let o = Vec3::zeros();
        // Point straight in front of the texture center, half way up.
        let (u, v) = t.uv(&Vec3::new(0.0, -5.0, -5.0), &o, &o);
        assert_relative_eq!(u, 0.5, epsilon = 1e-12);
        assert_relative_eq!(v, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_spherical_center() {
        let t = TexmapPlacement::new(
            0,
            TexmapMethod::Spherical {
                a: std::f64::consts::PI,
                b: std::f64::consts::PI,
            },
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -10.0),
                Vec3::new(10.0, 0.0, 0.0),
            ],
            "face.png",
        );
        let o = Vec3::zeros();
        let (u, v) = t.uv(&Vec3::new(0.0, 0.0, -10.0), &o, &o);
        assert_relative_eq!(u, 0.5, epsilon = 1e-12);
        assert_relative_eq!(v, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_next_only_expires() {
        let mut t = planar();
        t.mark_used();
        assert!(!t.used);
        t.next_only = true;
        t.mark_used();
        assert!(t.used);
    }

    #[test]
    fn test_place_at() {
        let mut t = planar();
        let placement = SubModelPlacement::new(
            16,
            Vec3::new(0.0, -8.0, 0.0),
            crate::Mat3::identity(),
            "x.dat",
            true,
            false,
        );
        t.place_at(&placement);
        assert_eq!(t.points[1], Vec3::new(10.0, -8.0, 0.0));
    }

    #[test]
    fn test_to_ldr() {
        let map = PartTypeMap::new();
        let mut t = planar();
        let lines = vec!["3 16 0 0 0 1 0 0 0 0 1\r\n".to_string()];
        assert_eq!(
            t.to_ldr(&lines, &map, &[]),
            "0 !TEXMAP NEXT PLANAR 0 0 0 10 0 0 0 0 20 logo.png\r\n0 !: 3 16 0 0 0 1 0 0 0 0 1\r\n"
        );

        t.method = TexmapMethod::Cylindrical { a: 45f64.to_radians() };
        t.glossmap = Some("gloss.png".to_string());
        let two = vec![lines[0].clone(), lines[0].clone()];
        let out = t.to_ldr(&two, &map, &[]);
        assert!(out.starts_with("0 !TEXMAP START CYLINDRICAL 0 0 0 10 0 0 0 0 20 45 logo.png GLOSSMAP gloss.png\r\n"));
        assert!(out.ends_with("0 !TEXMAP END\r\n"));
    }
}
