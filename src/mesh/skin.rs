//! Vertex-group to bone binding.

use smallvec::SmallVec;

use crate::scene::{ArmatureData, MeshData};

/// Bone influences of one vertex: `(bone index, weight)`.
pub type Influences = SmallVec<[(u32, f32); 4]>;

/// Maps a mesh's vertex groups onto the bones of its deforming armature.
#[derive(Debug, Clone)]
pub struct SkinBinding {
    /// Bone index per vertex group; groups without a matching bone are `None`.
    group_to_bone: Vec<Option<u32>>,
    max_influences: usize,
}

impl SkinBinding {
    /// Returns `None` when no vertex group names a bone of `armature`.
    pub fn new(mesh: &MeshData, armature: &ArmatureData, max_influences: usize) -> Option<Self> {
        let group_to_bone: Vec<Option<u32>> = mesh
            .vertex_groups
            .iter()
            .map(|name| armature.bone_index(name).map(|i| i as u32))
            .collect();
        if mesh.weights.is_empty() || group_to_bone.iter().all(Option::is_none) {
            return None;
        }
        Some(Self {
            group_to_bone,
            max_influences: max_influences.max(1),
        })
    }

    /// Strongest influences of `vertex`, at most `max_influences`, weights
    /// normalized to sum to one. Empty if the vertex is not weighted.
    pub fn influences(&self, mesh: &MeshData, vertex: u32) -> Influences {
        let mut out: Influences = SmallVec::new();
        let Some(weights) = mesh.weights.get(vertex as usize) else {
            return out;
        };
        for w in weights {
            if w.weight.is_nan() || w.weight <= 0.0 {
                continue;
            }
            if let Some(Some(bone)) = self.group_to_bone.get(w.group as usize) {
                match out.iter_mut().find(|(b, _)| b == bone) {
                    Some(existing) => existing.1 += w.weight,
                    None => out.push((*bone, w.weight)),
                }
            }
        }

        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out.truncate(self.max_influences);

        let sum: f32 = out.iter().map(|(_, w)| w).sum();
        if sum > 0.0 {
            for (_, w) in out.iter_mut() {
                *w /= sum;
            }
        }
        out
    }
}
