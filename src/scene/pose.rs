//! Frame evaluation: the scene posed at a given frame under a given action.

use glam::{Mat4, Quat, Vec3};

use super::snapshot::{
    ActionData, Interpolation, ObjectData, Scene, SceneObject, TransformKey, TransformTrack,
};

/// What a pose sample describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTarget {
    /// The object's own transform, relative to its parent object.
    Object,
    /// Bone `i` of the object's armature, relative to its parent bone.
    Joint(usize),
}

/// Result of evaluating one object at one frame.
#[derive(Debug, Clone)]
pub struct FramePose {
    object_local: Mat4,
    /// Posed bone matrices in armature space.
    bones: Vec<Mat4>,
    parents: Vec<Option<usize>>,
}

impl FramePose {
    /// Local transform of `target` in this pose.
    ///
    /// A joint's local matrix is `parent_pose⁻¹ * bone_pose`; roots use their
    /// armature-space pose directly. Unknown joints yield identity.
    pub fn local(&self, target: SampleTarget) -> Mat4 {
        match target {
            SampleTarget::Object => self.object_local,
            SampleTarget::Joint(i) => {
                let Some(bone) = self.bones.get(i) else {
                    return Mat4::IDENTITY;
                };
                match self.parents[i] {
                    Some(p) => self.bones[p].inverse() * *bone,
                    None => *bone,
                }
            }
        }
    }

    pub fn joint_count(&self) -> usize {
        self.bones.len()
    }
}

impl TransformTrack {
    /// Local matrix at `frame`, clamped to the first and last key.
    pub fn sample(&self, frame: f32) -> Option<Mat4> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if frame <= first.frame {
            return Some(key_matrix(first));
        }
        if frame >= last.frame {
            return Some(key_matrix(last));
        }

        let next = self.keys.partition_point(|k| k.frame <= frame);
        let a = &self.keys[next - 1];
        let b = &self.keys[next];
        if self.interpolation == Interpolation::Step || b.frame <= a.frame {
            return Some(key_matrix(a));
        }

        let t = (frame - a.frame) / (b.frame - a.frame);
        Some(Mat4::from_scale_rotation_translation(
            a.scale.lerp(b.scale, t),
            a.rotation.slerp(b.rotation, t),
            a.translation.lerp(b.translation, t),
        ))
    }
}

fn key_matrix(key: &TransformKey) -> Mat4 {
    Mat4::from_scale_rotation_translation(key.scale, key.rotation, key.translation)
}

/// Evaluates poses against a read-only scene.
///
/// The host's "set current frame" side effect is replaced by explicit
/// evaluation: nothing in the scene is mutated.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    scene: &'a Scene,
}

impl<'a> FrameContext<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    /// Pose of `object` at `frame` with `action` applied.
    pub fn evaluate(&self, object: &SceneObject, action: &ActionData, frame: i32) -> FramePose {
        let frame = frame as f32;
        let object_local = action
            .object_track
            .as_ref()
            .and_then(|track| track.sample(frame))
            .unwrap_or(object.matrix_local);

        let (bones, parents) = match object.data {
            ObjectData::Armature(handle) => match self.scene.armature(handle) {
                Some(armature) => {
                    let mut posed: Vec<Mat4> = Vec::with_capacity(armature.bones.len());
                    let mut parents = Vec::with_capacity(armature.bones.len());
                    for (i, bone) in armature.bones.iter().enumerate() {
                        let parent = bone.parent.filter(|&p| p < i);
                        let basis = action
                            .bone_track(&bone.name)
                            .and_then(|track| track.sample(frame))
                            .unwrap_or(Mat4::IDENTITY);
                        let rest = match parent {
                            Some(p) => armature.bones[p].matrix_local.inverse() * bone.matrix_local,
                            None => bone.matrix_local,
                        };
                        let base = parent.map(|p| posed[p]).unwrap_or(Mat4::IDENTITY);
                        posed.push(base * rest * basis);
                        parents.push(parent);
                    }
                    (posed, parents)
                }
                None => (Vec::new(), Vec::new()),
            },
            _ => (Vec::new(), Vec::new()),
        };

        FramePose {
            object_local,
            bones,
            parents,
        }
    }
}

/// Build a transform key; convenience for snapshot producers and tests.
pub fn transform_key(frame: f32, translation: Vec3, rotation: Quat, scale: Vec3) -> TransformKey {
    TransformKey {
        frame,
        translation,
        rotation,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::snapshot::{ArmatureData, BoneData, BoneTrack};
    use crate::util::mat4_approx_eq;

    fn track(keys: Vec<TransformKey>) -> TransformTrack {
        TransformTrack {
            interpolation: Interpolation::Linear,
            keys,
        }
    }

    #[test]
    fn test_track_sampling_clamps_and_interpolates() {
        let tr = track(vec![
            transform_key(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
            transform_key(10.0, Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE),
        ]);
        let mid = tr.sample(5.0).unwrap();
        assert!((mid.w_axis.x - 5.0).abs() < 1e-5);
        assert_eq!(tr.sample(-3.0).unwrap().w_axis.x, 0.0);
        assert_eq!(tr.sample(99.0).unwrap().w_axis.x, 10.0);

        let step = TransformTrack {
            interpolation: Interpolation::Step,
            ..tr
        };
        assert_eq!(step.sample(9.5).unwrap().w_axis.x, 0.0);
        assert!(TransformTrack::default().sample(1.0).is_none());
    }

    #[test]
    fn test_object_pose_falls_back_to_rest() {
        let scene = Scene::default();
        let object = SceneObject {
            matrix_local: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            ..Default::default()
        };
        let action = ActionData::default();
        let pose = FrameContext::new(&scene).evaluate(&object, &action, 4);
        assert_eq!(pose.local(SampleTarget::Object), object.matrix_local);
        assert_eq!(pose.joint_count(), 0);
    }

    #[test]
    fn test_joint_local_relative_to_parent() {
        let mut scene = Scene::default();
        scene.armatures.push(ArmatureData {
            handle: 5,
            name: "rig".into(),
            bones: vec![
                BoneData {
                    handle: 1,
                    name: "root".into(),
                    parent: None,
                    matrix_local: Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)),
                },
                BoneData {
                    handle: 2,
                    name: "tip".into(),
                    parent: Some(0),
                    matrix_local: Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
                },
            ],
        });
        let object = SceneObject {
            data: ObjectData::Armature(5),
            ..Default::default()
        };
        let action = ActionData {
            bone_tracks: vec![BoneTrack {
                bone: "tip".into(),
                track: track(vec![transform_key(
                    0.0,
                    Vec3::new(1.0, 0.0, 0.0),
                    Quat::IDENTITY,
                    Vec3::ONE,
                )]),
            }],
            ..Default::default()
        };

        let pose = FrameContext::new(&scene).evaluate(&object, &action, 0);
        let expected = Mat4::from_translation(Vec3::new(1.0, 0.0, 2.0));
        assert!(mat4_approx_eq(&pose.local(SampleTarget::Joint(1)), &expected, 1e-5));
        assert_eq!(pose.local(SampleTarget::Joint(9)), Mat4::IDENTITY);
    }
}
