//! Mesh extraction for every mesh used by an exportable object.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;

use super::ExportRun;
use crate::core::SourceKey;
use crate::mesh::{extract, MeshPart, SkinBinding};
use crate::scene::{MeshData, ObjectData, SceneObject};
use crate::util::Result;

/// Identity of the part of mesh `mesh_id` drawn with `material_index`.
pub fn part_id(mesh_id: &str, material_index: u32) -> String {
    format!("{}_{}", mesh_id, material_index)
}

impl ExportRun<'_> {
    /// Deforming armature bound to `obj`, as vertex-group mapping for `mesh`.
    fn skin_binding(&self, obj: &SceneObject, mesh: &MeshData) -> Option<SkinBinding> {
        let armature_obj = self.scene.object(obj.armature?)?;
        let ObjectData::Armature(handle) = armature_obj.data else {
            tracing::warn!("object '{}': deforming object '{}' is not an armature", obj.name, armature_obj.name);
            return None;
        };
        let armature = self.scene.armature(handle)?;
        SkinBinding::new(mesh, armature, self.config.max_bone_influences)
    }

    pub(super) fn export_geometries(&mut self) -> Result<()> {
        let users = self.exportable_objects();

        // Distinct meshes in first-use order, with the first user's skin.
        let mut order: Vec<u64> = Vec::new();
        let mut first_user: HashMap<u64, &SceneObject> = HashMap::new();
        for obj in &users {
            if let ObjectData::Mesh(handle) = obj.data {
                if !first_user.contains_key(&handle) {
                    first_user.insert(handle, *obj);
                    order.push(handle);
                }
            }
        }

        let mut work: Vec<(&MeshData, Option<SkinBinding>)> = Vec::new();
        let mut parts_of: HashMap<u64, Vec<u32>> = HashMap::new();
        for &handle in &order {
            let Some(mesh) = self.scene.mesh(handle) else {
                let id = self.registry.id_of(SourceKey::mesh(handle))?;
                self.recover::<()>(&id, Err(super::missing("mesh", handle)))?;
                continue;
            };
            if mesh.triangles.is_empty() {
                tracing::debug!("mesh '{}' has no faces", mesh.name);
                continue;
            }
            if self.registry.need_update(SourceKey::mesh(handle)) {
                let skin = first_user.get(&handle).and_then(|obj| self.skin_binding(obj, mesh));
                work.push((mesh, skin));
            } else {
                // Already exported: part ids follow from the material indices in use.
                let indices: BTreeSet<u32> = mesh.triangles.iter().map(|t| t.material_index).collect();
                parts_of.insert(handle, indices.into_iter().collect());
            }
        }

        let options = self.config.extract_options();
        let extracted: Vec<(&MeshData, Result<BTreeMap<u32, MeshPart>>)> = work
            .par_iter()
            .map(|(mesh, skin)| (*mesh, extract(mesh, skin.as_ref(), options)))
            .collect();

        for (mesh, result) in extracted {
            let mesh_id = self.registry.id_of(SourceKey::mesh(mesh.handle))?;
            let Some(parts) = self.recover(&mesh_id, result)? else {
                // Retry on the next run once the host fixes the mesh.
                self.registry.mark_dirty(SourceKey::mesh(mesh.handle));
                continue;
            };
            let mut indices = Vec::with_capacity(parts.len());
            for (material_index, part) in parts {
                let id = part_id(&mesh_id, material_index);
                self.registry.claim(&id, &mesh_id)?;
                self.builder
                    .add(part.into_mesh(id, format!("{}_{}", mesh.name, material_index)))?;
                indices.push(material_index);
            }
            tracing::debug!("mesh '{}': {} part(s)", mesh.name, indices.len());
            parts_of.insert(mesh.handle, indices);
        }

        for obj in users {
            let ObjectData::Mesh(handle) = obj.data else {
                continue;
            };
            let Some(indices) = parts_of.get(&handle) else {
                continue;
            };
            let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;
            let mesh_id = self.registry.id_of(SourceKey::mesh(handle))?;
            for &material_index in indices {
                let id = part_id(&mesh_id, material_index);
                self.relate(&id, &object_id)?;

                match obj.material_slots.get(material_index as usize) {
                    Some(Some(material)) => {
                        let material_id = self.registry.id_of(SourceKey::material(*material))?;
                        self.relate(&material_id, &id)?;
                    }
                    Some(None) => {}
                    None => tracing::debug!(
                        "object '{}': material index {} has no slot",
                        obj.name,
                        material_index
                    ),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_id() {
        assert_eq!(part_id("me3", 0), "me3_0");
        assert_eq!(part_id("me3", 12), "me3_12");
    }
}
