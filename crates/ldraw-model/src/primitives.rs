// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric primitives (line types 2 to 5)
//!
//! Triangles and quads fix their winding when constructed: with `invert` set
//! the points are stored reversed, so every stored face is front-facing under
//! the counter-clockwise convention.

use crate::serialize::vector_to_ldr;
use crate::{color_to_ldr, ColorId};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// 3D point or direction in LDraw units
pub type Vec3 = Vector3<f64>;

/// 3x3 rotation/scale matrix
pub type Mat3 = Matrix3<f64>;

/// Index into the loader's texmap placement list
pub type TexmapId = usize;

/// Line segment (type 2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub color: ColorId,
    pub p1: Vec3,
    pub p2: Vec3,
    pub texmap: Option<TexmapId>,
}

impl Line {
    pub fn new(color: ColorId, p1: Vec3, p2: Vec3) -> Self {
        Self {
            color,
            p1,
            p2,
            texmap: None,
        }
    }

    pub fn to_ldr(&self) -> String {
        format!(
            "2 {} {} {}\r\n",
            color_to_ldr(self.color),
            vector_to_ldr(&self.p1),
            vector_to_ldr(&self.p2)
        )
    }
}

/// Triangle (type 3)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub color: ColorId,
    pub p1: Vec3,
    pub p2: Vec3,
    pub p3: Vec3,
    pub cull: bool,
    pub texmap: Option<TexmapId>,
}

impl Triangle {
    /// Create a triangle, reversing the points when `invert` is set
    pub fn new(color: ColorId, p1: Vec3, p2: Vec3, p3: Vec3, cull: bool, invert: bool) -> Self {
        let (p1, p3) = if invert { (p3, p1) } else { (p1, p3) };
        Self {
            color,
            p1,
            p2,
            p3,
            cull,
            texmap: None,
        }
    }

    pub fn points(&self) -> [Vec3; 3] {
        [self.p1, self.p2, self.p3]
    }

    pub fn to_ldr(&self) -> String {
        format!(
            "3 {} {} {} {}\r\n",
            color_to_ldr(self.color),
            vector_to_ldr(&self.p1),
            vector_to_ldr(&self.p2),
            vector_to_ldr(&self.p3)
        )
    }
}

/// Quadrilateral (type 4)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub color: ColorId,
    pub p1: Vec3,
    pub p2: Vec3,
    pub p3: Vec3,
    pub p4: Vec3,
    pub cull: bool,
    pub texmap: Option<TexmapId>,
}

impl Quad {
    /// Create a quad, reversing the points when `invert` is set
    pub fn new(
        color: ColorId,
        p1: Vec3,
        p2: Vec3,
        p3: Vec3,
        p4: Vec3,
        cull: bool,
        invert: bool,
    ) -> Self {
        let (p1, p2, p3, p4) = if invert {
            (p4, p3, p2, p1)
        } else {
            (p1, p2, p3, p4)
        };
        Self {
            color,
            p1,
            p2,
            p3,
            p4,
            cull,
            texmap: None,
        }
    }

    pub fn points(&self) -> [Vec3; 4] {
        [self.p1, self.p2, self.p3, self.p4]
    }

    pub fn to_ldr(&self) -> String {
        format!(
            "4 {} {} {} {} {}\r\n",
            color_to_ldr(self.color),
            vector_to_ldr(&self.p1),
            vector_to_ldr(&self.p2),
            vector_to_ldr(&self.p3),
            vector_to_ldr(&self.p4)
        )
    }
}

/// Conditional line (type 5)
///
/// `p1`-`p2` is the drawn segment. `p3` and `p4` are control points: the line
/// is shown when both project to the same side of it on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalLine {
    pub color: ColorId,
    pub p1: Vec3,
    pub p2: Vec3,
    pub p3: Vec3,
    pub p4: Vec3,
    pub texmap: Option<TexmapId>,
}

impl ConditionalLine {
    pub fn new(color: ColorId, p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> Self {
        Self {
            color,
            p1,
            p2,
            p3,
            p4,
            texmap: None,
        }
    }

    pub fn to_ldr(&self) -> String {
        format!(
            "5 {} {} {} {} {}\r\n",
            color_to_ldr(self.color),
            vector_to_ldr(&self.p1),
            vector_to_ldr(&self.p2),
            vector_to_ldr(&self.p3),
            vector_to_ldr(&self.p4)
        )
    }
}

/// Any drawable primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Line(Line),
    Triangle(Triangle),
    Quad(Quad),
    ConditionalLine(ConditionalLine),
}

impl Primitive {
    pub fn color(&self) -> ColorId {
        match self {
            Primitive::Line(l) => l.color,
            Primitive::Triangle(t) => t.color,
            Primitive::Quad(q) => q.color,
            Primitive::ConditionalLine(l) => l.color,
        }
    }

    pub fn texmap(&self) -> Option<TexmapId> {
        match self {
            Primitive::Line(l) => l.texmap,
            Primitive::Triangle(t) => t.texmap,
            Primitive::Quad(q) => q.texmap,
            Primitive::ConditionalLine(l) => l.texmap,
        }
    }

    /// LDraw line type of the primitive
    pub fn line_type(&self) -> u8 {
        match self {
            Primitive::Line(_) => 2,
            Primitive::Triangle(_) => 3,
            Primitive::Quad(_) => 4,
            Primitive::ConditionalLine(_) => 5,
        }
    }

    pub fn to_ldr(&self) -> String {
        match self {
            Primitive::Line(l) => l.to_ldr(),
            Primitive::Triangle(t) => t.to_ldr(),
            Primitive::Quad(q) => q.to_ldr(),
            Primitive::ConditionalLine(l) => l.to_ldr(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    #[test]
    fn test_triangle_winding() {
        let (a, b, c) = (v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 0.0, 1.0));
        let t = Triangle::new(4, a, b, c, true, false);
        assert_eq!(t.points(), [a, b, c]);

        let t = Triangle::new(4, a, b, c, true, true);
        assert_eq!(t.points(), [c, b, a]);
    }

    #[test]
    fn test_quad_winding() {
        let (a, b, c, d) = (
            v(0.0, 0.0, 0.0),
            v(1.0, 0.0, 0.0),
            v(1.0, 0.0, 1.0),
            v(0.0, 0.0, 1.0),
        );
        assert_eq!(Quad::new(1, a, b, c, d, false, false).points(), [a, b, c, d]);
        assert_eq!(Quad::new(1, a, b, c, d, false, true).points(), [d, c, b, a]);
    }

    #[test]
    fn test_primitive_discriminant() {
        let prims = [
            Primitive::Line(Line::new(24, v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0))),
            Primitive::Triangle(Triangle::new(
                16,
                v(0.0, 0.0, 0.0),
                v(1.0, 0.0, 0.0),
                v(0.0, 1.0, 0.0),
                true,
                false,
            )),
            Primitive::ConditionalLine(ConditionalLine::new(
                24,
                v(0.0, 0.0, 0.0),
                v(1.0, 0.0, 0.0),
                v(0.0, 1.0, 0.0),
                v(0.0, -1.0, 0.0),
            )),
        ];
        let types: Vec<u8> = prims.iter().map(|p| p.line_type()).collect();
        assert_eq!(types, vec![2, 3, 5]);
        assert_eq!(prims[1].color(), 16);
        assert!(prims.iter().all(|p| p.texmap().is_none()));
    }

    #[test]
    fn test_line_to_ldr() {
        let line = Line::new(24, v(0.0, -4.0, 1.5), v(10.0, 0.0, 0.25));
        assert_eq!(line.to_ldr(), "2 24 0 -4 1.5 10 0 0.25\r\n");
    }
}
