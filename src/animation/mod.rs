//! Animation sampling.
//!
//! Actions are baked by evaluating the scene at every integer frame of the
//! action's range through a [`FrameContext`] and feeding the resulting local
//! transforms into one [`Sampler`] per target.

pub mod sampler;

pub use sampler::{Sampler, SamplerState};

use crate::document::{Clip, TargetKind};
use crate::scene::{ActionData, ActionRoot, FrameContext, ObjectData, SampleTarget, SceneObject};
use crate::util::{Error, Result};

/// Frame number to integer milliseconds, truncating toward zero.
pub fn to_time(frame: f32, fps: f32) -> i64 {
    ((frame * 1000.0) / fps) as i64
}

/// Integer frame range `[start, end)` of an action. The end frame is inclusive
/// in the host, hence the `+ 1`.
pub fn frame_range(action: &ActionData) -> (i32, i32) {
    let start = action.frame_start as i32;
    let end = (action.frame_end + 1.0) as i32;
    (start, end)
}

/// Action duration in milliseconds; at least one frame long.
pub fn duration_ms(action: &ActionData, fps: f32) -> u32 {
    let (start, end) = frame_range(action);
    let frames = ((end - start) as f32).max(1.0);
    to_time(frames, fps).clamp(0, u32::MAX as i64) as u32
}

/// Result of baking one action on one object.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledAction {
    pub target_kind: TargetKind,
    pub duration: u32,
    /// One clip per target: the object first (object actions), then joints
    /// in bone order.
    pub clips: Vec<Clip>,
}

/// Sample `action` applied to `object`.
///
/// Object actions sample the object and, for armature objects, every joint.
/// Armature actions sample the joints only. Other roots are unsupported.
pub fn sample_action(
    ctx: &FrameContext<'_>,
    object: &SceneObject,
    action: &ActionData,
    fps: f32,
    flush_trailing: bool,
) -> Result<SampledAction> {
    let fps = fps.max(1.0);
    let joints: Vec<(usize, String)> = match object.data {
        ObjectData::Armature(handle) => ctx
            .scene()
            .armature(handle)
            .map(|a| a.bones.iter().map(|b| b.name.clone()).enumerate().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut samplers = Vec::with_capacity(joints.len() + 1);
    let target_kind = match &action.id_root {
        ActionRoot::Object => {
            samplers.push(Sampler::new(SampleTarget::Object, None));
            TargetKind::Object
        }
        ActionRoot::Armature => TargetKind::Skeleton,
        ActionRoot::Other(root) => {
            return Err(Error::unsupported(format!(
                "action '{}': unsupported id root '{}'",
                action.name, root
            )))
        }
    };
    for (i, name) in joints {
        samplers.push(Sampler::new(SampleTarget::Joint(i), Some(name)));
    }

    let (start, end) = frame_range(action);
    for frame in start..end {
        let t = to_time(frame as f32, fps);
        let t = i32::try_from(t).map_err(|_| {
            Error::invalid(format!(
                "action '{}': frame {} is outside the representable time range",
                action.name, frame
            ))
        })?;
        let pose = ctx.evaluate(object, action, frame);
        for sampler in &mut samplers {
            sampler.capture(t, pose.local(sampler.target()));
        }
    }

    Ok(SampledAction {
        target_kind,
        duration: duration_ms(action, fps),
        clips: samplers.into_iter().map(|s| s.finish(flush_trailing)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        transform_key, ArmatureData, BoneData, BoneTrack, Interpolation, Scene, TransformTrack,
    };
    use glam::{Mat4, Quat, Vec3};

    #[test]
    fn test_to_time_truncates() {
        assert_eq!(to_time(1.0, 24.0), 41);
        assert_eq!(to_time(24.0, 24.0), 1000);
        assert_eq!(to_time(1.0, 30.0), 33);
    }

    #[test]
    fn test_duration() {
        let action = ActionData {
            frame_start: 1.0,
            frame_end: 24.0,
            ..Default::default()
        };
        assert_eq!(frame_range(&action), (1, 25));
        assert_eq!(duration_ms(&action, 24.0), 1000);

        let single = ActionData::default();
        assert_eq!(duration_ms(&single, 25.0), 40);
    }

    fn stepped_object_action() -> ActionData {
        ActionData {
            handle: 7,
            name: "Jump".into(),
            id_root: ActionRoot::Object,
            frame_start: 0.0,
            frame_end: 19.0,
            object_track: Some(TransformTrack {
                interpolation: Interpolation::Step,
                keys: vec![
                    transform_key(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
                    transform_key(10.0, Vec3::new(0.0, 0.0, 2.0), Quat::IDENTITY, Vec3::ONE),
                ],
            }),
            bone_tracks: Vec::new(),
        }
    }

    #[test]
    fn test_object_action_compresses() {
        let scene = Scene {
            fps: 1000.0,
            ..Default::default()
        };
        let ctx = FrameContext::new(&scene);
        let object = SceneObject::default();
        let sampled = sample_action(&ctx, &object, &stepped_object_action(), 1000.0, true).unwrap();

        assert_eq!(sampled.target_kind, TargetKind::Object);
        assert_eq!(sampled.clips.len(), 1);
        let clip = &sampled.clips[0];
        assert_eq!(clip.at, vec![0, 9, 10, 19]);
        // z-up 2.0 becomes y-up 2.0
        assert_eq!(clip.translation[2], [0.0, 2.0, -0.0]);
        assert_eq!(sampled.duration, 20);
    }

    #[test]
    fn test_armature_action_samples_joints_only() {
        let mut scene = Scene::default();
        scene.armatures.push(ArmatureData {
            handle: 3,
            name: "rig".into(),
            bones: vec![
                BoneData { handle: 1, name: "root".into(), parent: None, matrix_local: Mat4::IDENTITY },
                BoneData { handle: 2, name: "arm".into(), parent: Some(0), matrix_local: Mat4::IDENTITY },
            ],
        });
        let object = SceneObject {
            data: ObjectData::Armature(3),
            ..Default::default()
        };
        let action = ActionData {
            id_root: ActionRoot::Armature,
            frame_end: 4.0,
            bone_tracks: vec![BoneTrack {
                bone: "arm".into(),
                track: TransformTrack {
                    interpolation: Interpolation::Linear,
                    keys: vec![
                        transform_key(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
                        transform_key(4.0, Vec3::X, Quat::IDENTITY, Vec3::ONE),
                    ],
                },
            }],
            ..Default::default()
        };
        let ctx = FrameContext::new(&scene);
        let sampled = sample_action(&ctx, &object, &action, 24.0, true).unwrap();
        assert_eq!(sampled.target_kind, TargetKind::Skeleton);
        assert_eq!(sampled.clips.len(), 2);
        assert_eq!(sampled.clips[0].bone_name.as_deref(), Some("root"));
        // root holds still: first and last frame only
        assert_eq!(sampled.clips[0].len(), 2);
        // arm moves every frame
        assert_eq!(sampled.clips[1].len(), 5);
    }

    #[test]
    fn test_negative_frame_start_is_sampled() {
        let scene = Scene::default();
        let action = ActionData {
            frame_start: -10.0,
            frame_end: 10.0,
            object_track: Some(TransformTrack {
                interpolation: Interpolation::Linear,
                keys: vec![
                    transform_key(-10.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
                    transform_key(10.0, Vec3::new(20.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE),
                ],
            }),
            ..Default::default()
        };
        let sampled = sample_action(&FrameContext::new(&scene), &SceneObject::default(), &action, 24.0, true)
            .unwrap();

        let clip = &sampled.clips[0];
        // one keyframe per frame, starting before time zero
        assert_eq!(clip.len(), 21);
        assert_eq!(clip.at[0], to_time(-10.0, 24.0) as i32);
        assert_eq!(clip.at[0], -416);
        assert_eq!(clip.at[20], 416);
        assert_eq!(clip.translation[0][0], 0.0);
        assert!((clip.translation[20][0] - 20.0).abs() < 1e-4);
        assert!(clip.defects("test").is_empty());
        assert_eq!(sampled.duration, duration_ms(&action, 24.0));
        assert_eq!(sampled.duration, 875);
    }

    #[test]
    fn test_unsupported_root() {
        let scene = Scene::default();
        let action = ActionData {
            id_root: ActionRoot::Other("SHAPEKEY".into()),
            ..Default::default()
        };
        let err = sample_action(&FrameContext::new(&scene), &SceneObject::default(), &action, 24.0, true)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
