//! Small matrix helpers shared by the skeleton, importer and skinner.

use glam::{Mat3, Mat4, Vec3};

/// Determinant magnitude below which a 4x4 matrix is treated as singular.
pub const SINGULAR_DETERMINANT_EPSILON: f32 = 1e-12;

/// Default tolerance for "did this matrix change" checks.
pub const MATRIX_CHANGE_TOLERANCE: f32 = 1e-6;

/// Inverts `m`, falling back to identity when it is (near) singular.
#[inline]
#[must_use]
pub fn safe_inverse(m: &Mat4) -> Mat4 {
    let det = m.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT_EPSILON {
        log::trace!("safe_inverse: singular matrix (det = {det}), using identity");
        return Mat4::IDENTITY;
    }
    m.inverse()
}

/// Returns true if any element of `a` and `b` differs by more than `tolerance`.
#[inline]
#[must_use]
pub fn matrices_differ(a: &Mat4, b: &Mat4, tolerance: f32) -> bool {
    !a.abs_diff_eq(*b, tolerance)
}

/// Upper 3x3 block used to transform normals.
///
/// Returns the inverse-transpose when the block is well conditioned, the
/// plain block otherwise (shear-free rigs never hit the fallback).
#[inline]
#[must_use]
pub fn normal_matrix(m: &Mat4, determinant_epsilon: f32) -> Mat3 {
    let upper = Mat3::from_mat4(*m);
    let det = upper.determinant();
    if !det.is_finite() || det.abs() < determinant_epsilon {
        return upper;
    }
    upper.inverse().transpose()
}

/// Normalizes `v`, or returns unit Z for zero-length / non-finite input.
#[inline]
#[must_use]
pub fn normalize_or_z(v: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(Vec3::Z)
}
