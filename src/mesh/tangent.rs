//! Per-vertex tangent generation for one UV channel

use glam::{Vec2, Vec3};

/// Compute tangents for an indexed triangle list.
///
/// Face tangents and bitangents are accumulated per vertex, then the tangent
/// is Gram-Schmidt orthogonalized against the vertex normal. `w` holds the
/// handedness (`1.0` or `-1.0`).
pub fn compute_tangents(positions: &[Vec3], normals: &[Vec3], uvs: &[Vec2], indices: &[u32]) -> Vec<[f32; 4]> {
    let count = positions.len();
    let mut tan = vec![Vec3::ZERO; count];
    let mut bitan = vec![Vec3::ZERO; count];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= count || i1 >= count || i2 >= count {
            continue;
        }

        let e1 = positions[i1] - positions[i0];
        let e2 = positions[i2] - positions[i0];
        let d1 = uvs[i1] - uvs[i0];
        let d2 = uvs[i2] - uvs[i0];

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b = (e2 * d1.x - e1 * d2.x) * r;

        for i in [i0, i1, i2] {
            tan[i] += t;
            bitan[i] += b;
        }
    }

    (0..count)
        .map(|i| {
            let n = normals[i];
            let t = (tan[i] - n * n.dot(tan[i])).normalize_or_zero();
            let t = if t == Vec3::ZERO { fallback_tangent(n) } else { t };
            let w = if n.cross(t).dot(bitan[i]) < 0.0 { -1.0 } else { 1.0 };
            [t.x, t.y, t.z, w]
        })
        .collect()
}

/// Any unit vector perpendicular to `n`.
fn fallback_tangent(n: Vec3) -> Vec3 {
    let axis = if n.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    (axis - n * n.dot(axis)).normalize_or_zero()
}
