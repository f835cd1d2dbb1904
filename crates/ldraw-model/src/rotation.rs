// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Step rotations (`0 ROTSTEP x y z TYPE`)

use crate::serialize::convert_float;
use crate::{LoadError, Mat3, Result, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a ROTSTEP rotation combines with the default view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationType {
    /// Relative to the default view
    Rel,
    /// Absolute, relative to the standard LDraw view direction
    Abs,
    /// Added to the previous rotation
    Add,
}

impl RotationType {
    /// Parse a type keyword (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "REL" => Some(RotationType::Rel),
            "ABS" => Some(RotationType::Abs),
            "ADD" => Some(RotationType::Add),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RotationType::Rel => "REL",
            RotationType::Abs => "ABS",
            RotationType::Add => "ADD",
        }
    }
}

impl fmt::Display for RotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation directive of a step, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub kind: RotationType,
}

impl StepRotation {
    pub fn new(x: f64, y: f64, z: f64, kind: RotationType) -> Self {
        Self { x, y, z, kind }
    }

    /// `REL 0 0 0`, which is the same as no rotation
    pub fn is_default(&self) -> bool {
        self.kind == RotationType::Rel && self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Compare two optional rotations, treating `None` like `REL 0 0 0`
    pub fn equals(a: Option<&StepRotation>, b: Option<&StepRotation>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), None) | (None, Some(a)) => a.is_default(),
            (Some(a), Some(b)) => a == b,
        }
    }

    pub fn to_ldr(&self) -> String {
        format!(
            "0 ROTSTEP {} {} {} {}\r\n",
            convert_float(self.x),
            convert_float(self.y),
            convert_float(self.z),
            self.kind
        )
    }

    /// Rotation matrix for this step
    ///
    /// `REL` rotations are applied on top of `default_matrix`, `ABS` rotations
    /// on top of the standard view. `ADD` must have been normalized away when
    /// the step was added to its part type and is rejected here.
    pub fn rotation_matrix(&self, default_matrix: &Mat3) -> Result<Mat3> {
        let wx = self.x.to_radians();
        let wy = -self.y.to_radians();
        let wz = -self.z.to_radians();

        let (s1, c1) = wx.sin_cos();
        let (s2, c2) = wy.sin_cos();
        let (s3, c3) = wz.sin_cos();

        #[rustfmt::skip]
        let rotation = Mat3::new(
            c2 * c3,                 -c2 * s3,                 s2,
            c1 * s3 + s1 * s2 * c3,  c1 * c3 - s1 * s2 * s3,  -s1 * c2,
            s1 * s3 - c1 * s2 * c3,  s1 * c3 + c1 * s2 * s3,  c1 * c2,
        );

        match self.kind {
            RotationType::Rel => Ok(default_matrix * rotation),
            RotationType::Abs => Ok(abs_view_matrix() * rotation),
            RotationType::Add => Err(LoadError::UnsupportedRotation("ADD".to_string())),
        }
    }
}

/// Orientation of an observer at (-10000, -7000, -10000) looking at the origin
pub fn abs_view_matrix() -> Mat3 {
    let z = Vec3::new(10000.0, 7000.0, 10000.0).normalize();
    let x = Vec3::y().cross(&z).normalize();
    let y = z.cross(&x);
    Mat3::from_columns(&[x, y, z])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equals_treats_default_as_none() {
        let rel0 = StepRotation::new(0.0, 0.0, 0.0, RotationType::Rel);
        let abs0 = StepRotation::new(0.0, 0.0, 0.0, RotationType::Abs);
        assert!(StepRotation::equals(None, None));
        assert!(StepRotation::equals(Some(&rel0), None));
        assert!(StepRotation::equals(None, Some(&rel0)));
        assert!(!StepRotation::equals(Some(&abs0), None));
        assert!(!StepRotation::equals(Some(&abs0), Some(&rel0)));
    }

    #[test]
    fn test_rel_zero_is_default_matrix() {
        let rotation = StepRotation::new(0.0, 0.0, 0.0, RotationType::Rel);
        let default = Mat3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0);
        let m = rotation.rotation_matrix(&default).unwrap();
        assert_relative_eq!(m, default, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_about_x() {
        let rotation = StepRotation::new(90.0, 0.0, 0.0, RotationType::Rel);
        let m = rotation.rotation_matrix(&Mat3::identity()).unwrap();
        let expected = Mat3::new(1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0);
        assert_relative_eq!(m, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_add_is_rejected() {
        let rotation = StepRotation::new(10.0, 0.0, 0.0, RotationType::Add);
        assert!(matches!(
            rotation.rotation_matrix(&Mat3::identity()),
            Err(LoadError::UnsupportedRotation(_))
        ));
    }

    #[test]
    fn test_abs_view_matrix_is_rotation() {
        let m = abs_view_matrix();
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m * m.transpose(), Mat3::identity(), epsilon = 1e-12);
        // The third column points from the observer to the origin.
        let dir = Vec3::new(10000.0, 7000.0, 10000.0).normalize();
        assert_relative_eq!(m.column(2).into_owned(), dir, epsilon = 1e-12);
    }

    #[test]
    fn test_to_ldr() {
        let rotation = StepRotation::new(-30.0, 45.5, 0.0, RotationType::Abs);
        assert_eq!(rotation.to_ldr(), "0 ROTSTEP -30 45.5 0 ABS\r\n");
        assert_eq!(RotationType::parse("rel"), Some(RotationType::Rel));
        assert_eq!(RotationType::parse("END"), None);
    }
}
