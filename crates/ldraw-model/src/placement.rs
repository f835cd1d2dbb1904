// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sub-model placements (line type 1)

use crate::serialize::{matrix_to_ldr, vector_to_ldr};
use crate::{color_to_ldr, edge_color_of, ColorId, Mat3, TexmapId, Vec3, EDGE_COLOR, MAIN_COLOR};
use serde::{Deserialize, Serialize};

/// A placed reference to another part type
///
/// The referenced part type is identified by its lowercase ID only, so the
/// loader can replace or purge part types without invalidating placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubModelPlacement {
    pub color: ColorId,
    pub position: Vec3,
    pub rotation: Mat3,
    pub id: String,
    pub cull: bool,
    pub invert_ccw: bool,
    pub texmap: Option<TexmapId>,
    /// Comment lines that followed the placement in the source file
    pub comment_lines: Vec<String>,
}

impl SubModelPlacement {
    pub fn new(
        color: ColorId,
        position: Vec3,
        rotation: Mat3,
        id: impl Into<String>,
        cull: bool,
        invert_ccw: bool,
    ) -> Self {
        Self {
            color,
            position,
            rotation,
            id: id.into().to_lowercase(),
            cull,
            invert_ccw,
            texmap: None,
            comment_lines: Vec::new(),
        }
    }

    /// Placement of `id` at the origin with identity rotation
    pub fn at_origin(color: ColorId, id: impl Into<String>) -> Self {
        Self::new(color, Vec3::zeros(), Mat3::identity(), id, true, false)
    }

    /// Color of this placement once placed inside a parent of `parent_color`
    pub fn placed_color(&self, parent_color: ColorId) -> ColorId {
        match self.color {
            MAIN_COLOR => parent_color,
            EDGE_COLOR if parent_color == MAIN_COLOR => EDGE_COLOR,
            EDGE_COLOR => parent_color,
            c => c,
        }
    }

    /// Compose this placement with its parent's placement
    ///
    /// Winding inversion composes as XOR: a placement is inverted when
    /// exactly one of the two is.
    pub fn place_at(&self, parent: &SubModelPlacement) -> SubModelPlacement {
        SubModelPlacement {
            color: self.placed_color(parent.color),
            position: parent.rotation * self.position + parent.position,
            rotation: parent.rotation * self.rotation,
            id: self.id.clone(),
            cull: self.cull,
            invert_ccw: self.invert_ccw != parent.invert_ccw,
            texmap: self.texmap,
            comment_lines: self.comment_lines.clone(),
        }
    }

    /// Copy with contextual colors replaced: 16 by `color`, 24 by its edge
    pub fn clone_colored(&self, color: ColorId) -> SubModelPlacement {
        let mut ret = self.clone();
        ret.color = match self.color {
            MAIN_COLOR => color,
            EDGE_COLOR => edge_color_of(color),
            c => c,
        };
        ret
    }

    /// Main color 16 at the origin without rotation
    pub fn is_identity_at_origin(&self) -> bool {
        self.color == MAIN_COLOR && self.position == Vec3::zeros() && self.rotation == Mat3::identity()
    }

    /// `1 c x y z a b c d e f g h i id`, followed by any comment lines
    pub fn to_ldr(&self, id: &str) -> String {
        let mut ret = format!(
            "1 {} {} {} {}\r\n",
            color_to_ldr(self.color),
            vector_to_ldr(&self.position),
            matrix_to_ldr(&self.rotation),
            id
        );
        for line in &self.comment_lines {
            ret.push_str("0 ");
            ret.push_str(line);
            ret.push_str("\r\n");
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rot_y(deg: f64) -> Mat3 {
        let (s, c) = deg.to_radians().sin_cos();
        Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
    }

    fn placement(color: ColorId, p: (f64, f64, f64), r: Mat3) -> SubModelPlacement {
        SubModelPlacement::new(color, Vec3::new(p.0, p.1, p.2), r, "x.dat", true, false)
    }

    #[test]
    fn test_place_at_composes() {
        let parent = placement(4, (10.0, 0.0, 0.0), rot_y(90.0));
        let child = placement(16, (0.0, -8.0, 20.0), Mat3::identity());
        let placed = child.place_at(&parent);

        assert_eq!(placed.color, 4);
        assert_relative_eq!(placed.position, Vec3::new(30.0, -8.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(placed.rotation, rot_y(90.0), epsilon = 1e-12);
    }

    #[test]
    fn test_place_at_associative() {
        let a = placement(1, (5.0, -3.0, 2.0), rot_y(30.0));
        let b = placement(16, (-7.0, 11.0, 0.5), rot_y(-45.0) * Mat3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0));
        let c = placement(24, (1.0, 2.0, 3.0), rot_y(120.0));

        let left = c.place_at(&b.place_at(&a));
        let right = c.place_at(&b).place_at(&a);
        assert_relative_eq!(left.position, right.position, epsilon = 1e-9);
        assert_relative_eq!(left.rotation, right.rotation, epsilon = 1e-12);
    }

    #[test]
    fn test_place_at_inversion_is_xor() {
        let plain = placement(4, (0.0, 0.0, 0.0), Mat3::identity());
        let mut inverted = plain.clone();
        inverted.invert_ccw = true;

        assert!(!plain.place_at(&plain).invert_ccw);
        assert!(inverted.place_at(&plain).invert_ccw);
        assert!(plain.place_at(&inverted).invert_ccw);
        assert!(!inverted.place_at(&inverted).invert_ccw);
        // Associative through a chain of three
        let left = inverted.place_at(&inverted.place_at(&inverted));
        let right = inverted.place_at(&inverted).place_at(&inverted);
        assert_eq!(left.invert_ccw, right.invert_ccw);
    }

    #[test]
    fn test_placed_color() {
        let edge = placement(EDGE_COLOR, (0.0, 0.0, 0.0), Mat3::identity());
        assert_eq!(edge.placed_color(MAIN_COLOR), EDGE_COLOR);
        assert_eq!(edge.placed_color(4), 4);
        let fixed = placement(2, (0.0, 0.0, 0.0), Mat3::identity());
        assert_eq!(fixed.placed_color(4), 2);
    }

    #[test]
    fn test_clone_colored() {
        let main = placement(MAIN_COLOR, (0.0, 0.0, 0.0), Mat3::identity());
        assert_eq!(main.clone_colored(4).color, 4);
        let edge = placement(EDGE_COLOR, (0.0, 0.0, 0.0), Mat3::identity());
        assert_eq!(edge.clone_colored(4).color, -5);
    }

    #[test]
    fn test_identity_and_to_ldr() {
        let mut p = SubModelPlacement::at_origin(MAIN_COLOR, "3001.DAT");
        assert_eq!(p.id, "3001.dat");
        assert!(p.is_identity_at_origin());
        p.comment_lines.push("// hinge".to_string());
        assert_eq!(
            p.to_ldr("3001.dat"),
            "1 16 0 0 0 1 0 0 0 1 0 0 0 1 3001.dat\r\n0 // hinge\r\n"
        );
        p.position.y = -8.0;
        assert!(!p.is_identity_at_origin());
    }
}
