// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Number formatting for LDraw output

use crate::{Mat3, Vec3};

/// Line terminator used in generated LDraw text
pub const LINE_END: &str = "\r\n";

/// Format a float with the fewest decimals (at most 6) that read back as the
/// same value after rounding to 6 decimals.
pub fn convert_float(x: f64) -> String {
    let fixed: f64 = format!("{:.6}", x).parse().unwrap_or(x);
    if fixed == 0.0 {
        return "0".to_string(); // Also folds -0.
    }
    for decimals in 0..=6 {
        let candidate = format!("{:.*}", decimals, fixed);
        if candidate.parse::<f64>().ok() == Some(fixed) {
            return candidate;
        }
    }
    format!("{:.6}", fixed)
}

/// `x y z`
pub fn vector_to_ldr(v: &Vec3) -> String {
    format!(
        "{} {} {}",
        convert_float(v.x),
        convert_float(v.y),
        convert_float(v.z)
    )
}

/// `a b c d e f g h i` in row-major order
pub fn matrix_to_ldr(m: &Mat3) -> String {
    let mut out = Vec::with_capacity(9);
    for row in 0..3 {
        for col in 0..3 {
            out.push(convert_float(m[(row, col)]));
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_float() {
        assert_eq!(convert_float(1.0), "1");
        assert_eq!(convert_float(-4.0), "-4");
        assert_eq!(convert_float(0.5), "0.5");
        assert_eq!(convert_float(0.123456789), "0.123457");
        assert_eq!(convert_float(1.0 / 3.0), "0.333333");
        assert_eq!(convert_float(-0.0), "0");
        assert_eq!(convert_float(-0.0000001), "0");
        assert_eq!(convert_float(0.70710678), "0.707107");
    }

    #[test]
    fn test_matrix_row_major() {
        let m = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        assert_eq!(matrix_to_ldr(&m), "1 2 3 4 5 6 7 8 9");
        assert_eq!(vector_to_ldr(&Vec3::new(0.0, -24.0, 0.25)), "0 -24 0.25");
    }
}
