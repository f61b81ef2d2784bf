//! Math type re-exports and scene re-basing utilities.
//!
//! Source scenes are Z-up; documents are Y-up. The conversion is applied
//! once, at the point a transform is written into the document.

// Re-export glam types
pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

/// Maximum per-cell delta for two sampled matrices to count as equal.
pub const CELL_TOLERANCE: f32 = 1e-6;

/// Compare two matrices cell by cell.
///
/// Returns `true` when no cell differs by more than `max_cell_delta`.
#[inline]
pub fn mat4_approx_eq(a: &Mat4, b: &Mat4, max_cell_delta: f32) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= max_cell_delta)
}

/// Decompose a matrix into (translation, rotation, scale).
#[inline]
pub fn decompose(m: &Mat4) -> (Vec3, Quat, Vec3) {
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    (translation, rotation, scale)
}

/// Z-up translation to Y-up: `(x, z, -y)`.
#[inline]
pub fn zup_to_yup_translation(v: Vec3) -> [f32; 3] {
    [v.x, v.z, -v.y]
}

/// Inverse of [`zup_to_yup_translation`].
#[inline]
pub fn yup_to_zup_translation(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], -v[2], v[1])
}

/// Z-up scale to Y-up: axes swap, no sign change.
#[inline]
pub fn zup_to_yup_scale(v: Vec3) -> [f32; 3] {
    [v.x, v.z, v.y]
}

/// Inverse of [`zup_to_yup_scale`].
#[inline]
pub fn yup_to_zup_scale(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[2], v[1])
}

/// Z-up rotation to Y-up, stored as `[x, y, z, w]`: `(x, z, -y, w)`.
#[inline]
pub fn zup_to_yup_rotation(q: Quat) -> [f32; 4] {
    [q.x, q.z, -q.y, q.w]
}

/// Inverse of [`zup_to_yup_rotation`].
#[inline]
pub fn yup_to_zup_rotation(q: [f32; 4]) -> Quat {
    Quat::from_xyzw(q[0], -q[2], q[1], q[3])
}

/// Z-up direction vector to Y-up (same mapping as translations).
#[inline]
pub fn zup_to_yup_vector(v: Vec3) -> [f32; 3] {
    zup_to_yup_translation(v)
}

/// Lights point down their local -Z; documents expect +Z forward.
#[inline]
pub fn light_forward(q: Quat) -> Quat {
    q * Quat::from_rotation_x(std::f32::consts::PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f32], b: &[f32]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn test_translation_round_trip() {
        let v = Vec3::new(1.5, -2.0, 3.25);
        let yup = zup_to_yup_translation(v);
        assert_eq!(yup, [1.5, 3.25, 2.0]);
        assert_eq!(yup_to_zup_translation(yup), v);
    }

    #[test]
    fn test_rotation_round_trip() {
        let q = Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.1, 0.7);
        let yup = zup_to_yup_rotation(q);
        let back = yup_to_zup_rotation(yup);
        assert!(close(&back.to_array(), &q.to_array()));
    }

    #[test]
    fn test_scale_round_trip() {
        let s = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(zup_to_yup_scale(s), [1.0, 3.0, 2.0]);
        assert_eq!(yup_to_zup_scale(zup_to_yup_scale(s)), s);
    }

    #[test]
    fn test_mat4_tolerance() {
        let a = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut cols = a.to_cols_array();
        cols[12] += 5e-7;
        let b = Mat4::from_cols_array(&cols);
        assert!(mat4_approx_eq(&a, &b, CELL_TOLERANCE));

        cols[12] += 1e-3;
        let c = Mat4::from_cols_array(&cols);
        assert!(!mat4_approx_eq(&a, &c, CELL_TOLERANCE));
    }

    #[test]
    fn test_decompose_order() {
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::IDENTITY,
            Vec3::new(4.0, 5.0, 6.0),
        );
        let (t, r, s) = decompose(&m);
        assert!(close(&t.to_array(), &[4.0, 5.0, 6.0]));
        assert!(close(&s.to_array(), &[2.0, 2.0, 2.0]));
        assert!(close(&r.to_array(), &Quat::IDENTITY.to_array()));
    }
}
