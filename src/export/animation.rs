//! Skeletons and baked actions.

use super::{missing, ExportRun};
use crate::animation::sample_action;
use crate::core::{EntityClass, SourceKey};
use crate::document::{AnimationKf, Bone, Skeleton, Transform};
use crate::scene::{ArmatureData, ObjectData};
use crate::util::{decompose, zup_to_yup_rotation, zup_to_yup_scale, zup_to_yup_translation, Result};

impl ExportRun<'_> {
    pub(super) fn export_skeletons(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            let ObjectData::Armature(handle) = obj.data else {
                continue;
            };
            let key = SourceKey::new(EntityClass::Armature, handle);
            let id = self.registry.id_of(key)?;
            let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;

            if self.registry.need_update(key) {
                let armature = match self.scene.armature(handle) {
                    Some(a) => a.validate().map(|_| a),
                    None => Err(missing("armature", handle)),
                };
                let Some(armature) = self.recover(&id, armature)? else {
                    self.registry.mark_dirty(key);
                    continue;
                };
                self.export_skeleton(&id, armature)?;
            }
            self.relate(&object_id, &id)?;
        }
        Ok(())
    }

    fn export_skeleton(&mut self, id: &str, armature: &ArmatureData) -> Result<()> {
        let mut bone_ids = Vec::with_capacity(armature.bones.len());
        let mut bones = Vec::with_capacity(armature.bones.len());
        for (i, bone) in armature.bones.iter().enumerate() {
            let bone_id = self.registry.id_of(SourceKey::new(EntityClass::Bone, bone.handle))?;
            let (translation, rotation, scale) = decompose(&armature.rest_relative(i));
            bones.push(Bone {
                id: bone_id.clone(),
                name: bone.name.clone(),
                transform: Transform {
                    translation: zup_to_yup_translation(translation),
                    rotation: zup_to_yup_rotation(rotation),
                    scale: zup_to_yup_scale(scale),
                },
            });
            bone_ids.push(bone_id);
        }

        self.builder.add(Skeleton {
            id: id.to_string(),
            name: armature.name.clone(),
            bones,
        })?;

        for (i, bone) in armature.bones.iter().enumerate() {
            self.relate(id, &bone_ids[i])?;
            if let Some(parent) = bone.parent {
                self.relate(&bone_ids[parent], &bone_ids[i])?;
            }
        }
        tracing::debug!("skeleton '{}': {} bones", armature.name, bone_ids.len());
        Ok(())
    }

    pub(super) fn export_actions(&mut self) -> Result<()> {
        let fps = self.scene.fps.max(1.0);
        for obj in self.exportable_objects() {
            let Some(binding) = &obj.animation else {
                continue;
            };
            let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;

            for track in &binding.nla_tracks {
                for handle in track.strips.iter().flatten().copied() {
                    let key = SourceKey::action(handle);
                    let id = self.registry.id_of(key)?;

                    if self.registry.need_update(key) {
                        let sampled = match self.scene.action(handle) {
                            Some(action) => {
                                tracing::info!("Export animation '{}' ({})", track.name, action.name);
                                sample_action(&self.ctx, obj, action, fps, self.config.flush_trailing_keyframe)
                            }
                            None => Err(missing("action", handle)),
                        };
                        let Some(sampled) = self.recover(&id, sampled)? else {
                            // the action never reaches the document
                            self.registry.mark_dirty(key);
                            continue;
                        };
                        self.builder.add(AnimationKf {
                            id: id.clone(),
                            name: track.name.clone(),
                            duration: sampled.duration,
                            target_kind: sampled.target_kind,
                            clips: sampled.clips,
                        })?;
                    }
                    self.relate(&id, &object_id)?;
                }
            }
        }
        Ok(())
    }
}
