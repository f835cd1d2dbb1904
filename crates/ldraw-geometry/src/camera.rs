// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Camera framing for a building step

use ldraw_model::{Mat3, Vec3};
use nalgebra::{Matrix4, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Flips Y and Z: LDraw is Y-down, the viewer is Y-up
pub fn axis_flip_matrix() -> Mat3 {
    Mat3::from_diagonal(&Vec3::new(1.0, -1.0, -1.0))
}

/// World rotation and translation that bring a step into view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFraming {
    /// Translation applied after `rotation`, moving the box center to the origin
    pub target: Vec3,
    pub rotation: Mat3,
}

impl CameraFraming {
    /// Frame `center` of a part placed with `placement_rotation`
    ///
    /// The placement rotation is undone first, then the axes are flipped and
    /// the step rotation applied.
    pub fn frame(center: &Vec3, placement_rotation: &Mat3, step_rotation: &Mat3) -> Self {
        let inverse = placement_rotation.try_inverse().unwrap_or_else(|| {
            log::warn!("Singular placement rotation, framing without it");
            Mat3::identity()
        });
        let rotation = step_rotation * axis_flip_matrix() * inverse;
        Self {
            target: -(rotation * center),
            rotation,
        }
    }

    /// Framing a fraction `t` of the way to `other`
    ///
    /// Rotations are interpolated in quaternion space so intermediate frames
    /// stay rigid.
    pub fn interpolate(&self, other: &CameraFraming, t: f64) -> CameraFraming {
        let from = UnitQuaternion::from_matrix(&self.rotation);
        let to = UnitQuaternion::from_matrix(&other.rotation);
        CameraFraming {
            target: self.target.lerp(&other.target, t),
            rotation: from.slerp(&to, t).to_rotation_matrix().into_inner(),
        }
    }

    /// Rotation followed by translation as one homogeneous matrix
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = self.rotation.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.target);
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn rot_y(degrees: f64) -> Mat3 {
        let (s, c) = degrees.to_radians().sin_cos();
        Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
    }

    #[test]
    fn test_frame_centers_the_box() {
        let center = Vec3::new(10.0, -20.0, 5.0);
        let framing = CameraFraming::frame(&center, &rot_y(90.0), &rot_y(30.0));
        // The framed center lands on the origin
        let moved = framing.rotation * center + framing.target;
        assert_relative_eq!(moved, Vec3::zeros(), epsilon = 1e-9);

        let h = framing.to_homogeneous() * Vector4::new(center.x, center.y, center.z, 1.0);
        assert_relative_eq!(h.xyz(), Vec3::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn test_frame_without_rotations_flips_axes() {
        let framing = CameraFraming::frame(&Vec3::new(0.0, 10.0, 0.0), &Mat3::identity(), &Mat3::identity());
        assert_relative_eq!(framing.rotation, axis_flip_matrix());
        assert_relative_eq!(framing.target, Vec3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn test_interpolate_is_rigid() {
        let a = CameraFraming::frame(&Vec3::zeros(), &Mat3::identity(), &rot_y(0.0));
        let b = CameraFraming {
            target: Vec3::new(10.0, 0.0, 0.0),
            ..CameraFraming::frame(&Vec3::zeros(), &Mat3::identity(), &rot_y(90.0))
        };
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.target, Vec3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(mid.rotation.determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(mid.rotation, rot_y(45.0) * axis_flip_matrix(), epsilon = 1e-9);
        assert_relative_eq!(a.interpolate(&b, 1.0).rotation, b.rotation, epsilon = 1e-9);
    }
}
