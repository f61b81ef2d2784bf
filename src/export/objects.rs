//! Scene nodes, their custom parameters, speakers and the gravity field.

use super::{missing, ExportRun};
use crate::core::{EntityClass, SourceKey};
use crate::document::{CustomParam, CustomParams, ForceField, Speaker, TObject, Transform};
use crate::scene::{ObjectData, SceneObject};
use crate::util::{
    decompose, light_forward, zup_to_yup_rotation, zup_to_yup_scale, zup_to_yup_translation,
    zup_to_yup_vector, Result,
};

/// Identity of the scene-wide gravity field.
pub const GRAVITY_ID: &str = "sceneGravity";

/// Host-internal property keys are not exported.
fn is_exported_property(key: &str) -> bool {
    !(key.starts_with('_') || key.starts_with("cycles"))
}

/// Parent-relative transform of `obj`, re-based to Y-up.
fn object_transform(obj: &SceneObject) -> Transform {
    let (translation, rotation, scale) = decompose(&obj.matrix_local);
    let rotation = match obj.data {
        ObjectData::Light(_) => light_forward(rotation),
        _ => rotation,
    };
    Transform {
        translation: zup_to_yup_translation(translation),
        rotation: zup_to_yup_rotation(rotation),
        scale: zup_to_yup_scale(scale),
    }
}

impl ExportRun<'_> {
    pub(super) fn export_objects(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            let key = SourceKey::object(obj.handle);
            let id = self.registry.id_of(key)?;
            if self.registry.need_update(key) {
                self.builder.add(TObject {
                    id: id.clone(),
                    name: obj.name.clone(),
                    transform: object_transform(obj),
                })?;
                self.export_custom_params(obj, &id)?;
            } else {
                tracing::debug!("object '{}' up to date", obj.name);
            }

            let Some(parent) = obj.parent else {
                continue;
            };
            match self.scene.object(parent) {
                Some(p) if self.is_exportable(p) => {
                    let parent_id = self.registry.id_of(SourceKey::object(p.handle))?;
                    self.relate(&parent_id, &id)?;
                }
                Some(p) => tracing::debug!("object '{}': parent '{}' not exported", obj.name, p.name),
                None => tracing::warn!("object '{}': parent {} not in scene", obj.name, parent),
            }
        }
        Ok(())
    }

    fn export_custom_params(&mut self, obj: &SceneObject, object_id: &str) -> Result<()> {
        let params: Vec<CustomParam> = obj
            .custom_properties
            .iter()
            .filter(|(key, _)| is_exported_property(key))
            .map(|(key, value)| CustomParam {
                name: key.clone(),
                value: value.clone(),
            })
            .collect();
        if params.is_empty() {
            return Ok(());
        }

        let id = format!("params_{}", object_id);
        self.registry.claim(&id, object_id)?;
        self.builder.add(CustomParams { id: id.clone(), params })?;
        self.relate(&id, object_id)
    }

    pub(super) fn export_speakers(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            let ObjectData::Speaker(handle) = obj.data else {
                continue;
            };
            let key = SourceKey::new(EntityClass::Speaker, handle);
            let id = self.registry.id_of(key)?;
            let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;

            if self.registry.need_update(key) {
                let Some(data) = self.scene.speaker(handle) else {
                    self.recover::<()>(&id, Err(missing("speaker", handle)))?;
                    self.registry.mark_dirty(key);
                    continue;
                };
                let rpath = match data.sound {
                    Some(sound) => self.export_sound(sound)?.unwrap_or_default(),
                    None => String::new(),
                };
                self.builder.add(Speaker {
                    id: id.clone(),
                    name: obj.name.clone(),
                    rpath,
                    volume: data.volume,
                    pitch: data.pitch,
                    distance_max: data.distance_max,
                    distance_reference: data.distance_reference,
                    attenuation: data.attenuation,
                })?;
            }
            self.relate(&id, &object_id)?;
        }
        Ok(())
    }

    /// Copy a sound file once and return its relative path.
    ///
    /// `None` when the sound cannot be located; the failure is reported.
    fn export_sound(&mut self, handle: u64) -> Result<Option<String>> {
        let key = SourceKey::new(EntityClass::Sound, handle);
        let id = self.registry.id_of(key)?;
        let located = match self.scene.sound(handle) {
            Some(sound) => self.assets.locate_sound(sound),
            None => Err(missing("sound", handle)),
        };
        let Some(located) = self.recover(&id, located)? else {
            return Ok(None);
        };

        if self.registry.need_update(key) {
            let written = self.writer.write(&id, &located);
            match self.recover(&id, written)? {
                Some(Some(path)) => {
                    tracing::debug!("sound '{}' written to {:?}", id, path);
                    self.report.assets_written += 1;
                }
                Some(None) => {}
                None => self.registry.mark_dirty(key),
            }
        }
        Ok(Some(located.rpath))
    }

    pub(super) fn export_force_fields(&mut self) -> Result<()> {
        let Some(gravity) = self.scene.gravity else {
            return Ok(());
        };
        self.registry.claim(GRAVITY_ID, "scene")?;
        self.builder.add(ForceField {
            id: GRAVITY_ID.to_string(),
            gravity: zup_to_yup_vector(gravity),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Quat, Vec3};

    #[test]
    fn test_property_filter() {
        assert!(is_exported_property("health"));
        assert!(!is_exported_property("_RNA_UI"));
        assert!(!is_exported_property("cycles_visibility"));
    }

    #[test]
    fn test_object_transform_rebased() {
        let obj = SceneObject {
            matrix_local: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            ..Default::default()
        };
        let t = object_transform(&obj);
        assert_eq!(t.translation, [1.0, 3.0, -2.0]);
        assert_eq!(t.scale, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_light_object_faces_forward() {
        let obj = SceneObject {
            data: ObjectData::Light(1),
            ..Default::default()
        };
        let t = object_transform(&obj);
        let expected = zup_to_yup_rotation(Quat::from_rotation_x(std::f32::consts::PI));
        for (a, b) in t.rotation.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
