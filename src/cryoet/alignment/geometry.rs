//! Rotation/translation convention helpers shared by every conversion.
//!
//! IMOD stores the transform that maps the raw projection onto the aligned
//! one, while the data portal (and AreTomo) store the inverse rotation with
//! the shift expressed after rotating. Both directions use the same algebra:
//! transpose the matrix, then rotate the negated shift with the *new* matrix.

use nalgebra::{Matrix2, Vector2};

/// Plain row-major 2x2 matrix as stored in the models and on disk.
pub type RotationMatrix = [[f64; 2]; 2];

/// Counter-clockwise rotation matrix for a planar angle in degrees.
pub fn angle_to_matrix(angle_degrees: f64) -> Matrix2<f64> {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    Matrix2::new(cos, -sin, sin, cos)
}

/// Planar angle in degrees recovered from a rotation matrix.
pub fn matrix_to_angle(matrix: &Matrix2<f64>) -> f64 {
    matrix[(1, 0)].atan2(matrix[(0, 0)]).to_degrees()
}

/// Converts an IMOD `(matrix, shift)` pair into the interchange convention.
pub fn native_to_interchange(
    matrix: &Matrix2<f64>,
    shift: &Vector2<f64>,
) -> (Matrix2<f64>, Vector2<f64>) {
    let transposed = matrix.transpose();
    let shift = transposed * (-shift);
    (transposed, shift)
}

/// Converts an interchange `(matrix, shift)` pair back into the IMOD convention.
pub fn interchange_to_native(
    matrix: &Matrix2<f64>,
    shift: &Vector2<f64>,
) -> (Matrix2<f64>, Vector2<f64>) {
    let transposed = matrix.transpose();
    let shift = transposed * (-shift);
    (transposed, shift)
}

pub fn to_matrix(rows: &RotationMatrix) -> Matrix2<f64> {
    Matrix2::new(rows[0][0], rows[0][1], rows[1][0], rows[1][1])
}

pub fn from_matrix(matrix: &Matrix2<f64>) -> RotationMatrix {
    [
        [matrix[(0, 0)], matrix[(0, 1)]],
        [matrix[(1, 0)], matrix[(1, 1)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn angle_matrix_roundtrip() {
        for angle in [-179.0, -85.3, -12.6611, 0.0, 4.5, 90.0, 135.25] {
            let matrix = angle_to_matrix(angle);
            assert_abs_diff_eq!(matrix_to_angle(&matrix), angle, epsilon = 1e-9);
        }
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let matrix = angle_to_matrix(90.0);
        let rotated = matrix * Vector2::new(1.0, 0.0);
        assert_abs_diff_eq!(rotated.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rotated.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn convention_roundtrip_restores_shift() {
        let matrix = angle_to_matrix(-12.6611);
        let shift = Vector2::new(24.786, -2.677);

        let (portal_matrix, portal_shift) = native_to_interchange(&matrix, &shift);
        let (native_matrix, native_shift) = interchange_to_native(&portal_matrix, &portal_shift);

        assert_abs_diff_eq!(native_shift.x, shift.x, epsilon = 1e-4);
        assert_abs_diff_eq!(native_shift.y, shift.y, epsilon = 1e-4);
        assert_abs_diff_eq!(
            matrix_to_angle(&native_matrix),
            matrix_to_angle(&matrix),
            epsilon = 1e-9
        );
    }

    #[test]
    fn shift_is_recomputed_from_transposed_matrix() {
        let matrix = angle_to_matrix(90.0);
        let (transposed, shift) = native_to_interchange(&matrix, &Vector2::new(1.0, 0.0));
        assert_abs_diff_eq!(matrix_to_angle(&transposed), -90.0, epsilon = 1e-9);
        // transpose(R90) * (-1, 0) = (0, 1)
        assert_abs_diff_eq!(shift.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shift.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn plain_array_views_are_row_major() {
        let rows = [[1.0, 2.0], [3.0, 4.0]];
        let matrix = to_matrix(&rows);
        assert_eq!(matrix[(0, 1)], 2.0);
        assert_eq!(matrix[(1, 0)], 3.0);
        assert_eq!(from_matrix(&matrix), rows);
    }
}
