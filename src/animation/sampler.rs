//! Keyframe sampler with run-length compression of held poses.

use glam::Mat4;

use crate::document::Clip;
use crate::scene::SampleTarget;
use crate::util::{
    decompose, mat4_approx_eq, zup_to_yup_rotation, zup_to_yup_scale, zup_to_yup_translation,
    CELL_TOLERANCE,
};

/// Lifecycle of a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    /// Created, nothing captured yet.
    Idle,
    /// At least one sample captured.
    Sampling,
    /// [`Sampler::finish`] was called.
    Flushed,
}

/// Samples one target (the object or one joint) over a time range.
///
/// A keyframe is stored on every change of the local transform. A run of
/// equal samples is closed by a keyframe at its last time when the next
/// change arrives, so a held pose costs two keyframes instead of one per
/// frame.
#[derive(Debug, Clone)]
pub struct Sampler {
    target: SampleTarget,
    state: SamplerState,
    previous: Option<Mat4>,
    /// Last time whose sample equalled `previous` and was not stored.
    pending: Option<i32>,
    last_time: Option<i32>,
    clip: Clip,
}

impl Sampler {
    /// `bone_name` is recorded in the clip for joint targets.
    pub fn new(target: SampleTarget, bone_name: Option<String>) -> Self {
        Self {
            target,
            state: SamplerState::Idle,
            previous: None,
            pending: None,
            last_time: None,
            clip: Clip {
                bone_name,
                ..Default::default()
            },
        }
    }

    pub fn target(&self) -> SampleTarget {
        self.target
    }

    /// Whether samples are relative to a parent joint rather than the parent object.
    pub fn is_joint_relative(&self) -> bool {
        matches!(self.target, SampleTarget::Joint(_))
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// Feed the target's local transform at time `t` (milliseconds).
    ///
    /// Times must strictly increase; out-of-order samples are dropped.
    pub fn capture(&mut self, t: i32, local: Mat4) {
        match self.state {
            SamplerState::Flushed => {
                tracing::warn!("sampler for {:?} already flushed, sample at {} ms dropped", self.target, t);
                return;
            }
            SamplerState::Idle => self.state = SamplerState::Sampling,
            SamplerState::Sampling => {}
        }
        if let Some(last) = self.last_time {
            if t <= last {
                tracing::warn!(
                    "sampler for {:?}: time {} ms does not follow {} ms, dropped",
                    self.target,
                    t,
                    last
                );
                return;
            }
        }
        self.last_time = Some(t);

        match self.previous {
            Some(previous) if mat4_approx_eq(&previous, &local, CELL_TOLERANCE) => {
                self.pending = Some(t);
            }
            previous => {
                if let (Some(pending), Some(previous)) = (self.pending.take(), previous) {
                    self.store(pending, &previous);
                }
                self.store(t, &local);
                self.previous = Some(local);
            }
        }
    }

    /// Stop sampling and hand out the clip.
    ///
    /// With `flush_trailing`, a held pose at the end of the range gets its
    /// closing keyframe; without it the clip ends at the last change.
    pub fn finish(mut self, flush_trailing: bool) -> Clip {
        if flush_trailing {
            if let (Some(pending), Some(previous)) = (self.pending.take(), self.previous) {
                self.store(pending, &previous);
            }
        }
        self.state = SamplerState::Flushed;
        self.clip
    }

    /// Number of keyframes stored so far.
    pub fn keyframe_count(&self) -> usize {
        self.clip.len()
    }

    fn store(&mut self, t: i32, m: &Mat4) {
        let (translation, rotation, scale) = decompose(m);
        self.clip.at.push(t);
        self.clip.translation.push(zup_to_yup_translation(translation));
        self.clip.rotation.push(zup_to_yup_rotation(rotation));
        self.clip.scale.push(zup_to_yup_scale(scale));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn at(x: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_held_runs_compress_to_boundaries() {
        let mut s = Sampler::new(SampleTarget::Object, None);
        assert_eq!(s.state(), SamplerState::Idle);
        for f in 0..20i32 {
            let m = if f < 10 { at(0.0) } else { at(5.0) };
            s.capture(f, m);
        }
        assert_eq!(s.state(), SamplerState::Sampling);

        let clip = s.finish(true);
        assert_eq!(clip.at, vec![0, 9, 10, 19]);
        assert_eq!(clip.translation[1], [0.0, 0.0, -0.0]);
        assert_eq!(clip.translation[2], [5.0, 0.0, -0.0]);
        assert!(clip.defects("test").is_empty());
    }

    #[test]
    fn test_without_trailing_flush() {
        let mut s = Sampler::new(SampleTarget::Object, None);
        for f in 0..20i32 {
            s.capture(f, if f < 10 { at(0.0) } else { at(5.0) });
        }
        assert_eq!(s.finish(false).at, vec![0, 9, 10]);
    }

    #[test]
    fn test_changing_every_frame_keeps_every_frame() {
        let mut s = Sampler::new(SampleTarget::Joint(0), Some("root".into()));
        assert!(s.is_joint_relative());
        for f in 0..5i32 {
            s.capture(f * 40, at(f as f32));
        }
        let clip = s.finish(true);
        assert_eq!(clip.at, vec![0, 40, 80, 120, 160]);
        assert_eq!(clip.bone_name.as_deref(), Some("root"));
    }

    #[test]
    fn test_negative_times_are_kept() {
        let mut s = Sampler::new(SampleTarget::Object, None);
        for f in -5..5i32 {
            s.capture(f * 40, if f < 0 { at(0.0) } else { at(1.0) });
        }
        let clip = s.finish(true);
        assert_eq!(clip.at, vec![-200, -40, 0, 160]);
        assert!(clip.defects("test").is_empty());
    }

    #[test]
    fn test_tolerance_absorbs_noise() {
        let mut s = Sampler::new(SampleTarget::Object, None);
        s.capture(0, at(1.0));
        s.capture(1, at(1.0 + 1e-7));
        s.capture(2, at(1.0 + 1e-3));
        assert_eq!(s.finish(true).at, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_order_time_dropped() {
        let mut s = Sampler::new(SampleTarget::Object, None);
        s.capture(10, at(0.0));
        s.capture(10, at(1.0));
        s.capture(5, at(2.0));
        assert_eq!(s.keyframe_count(), 1);
    }

    #[test]
    fn test_axis_swap_on_store() {
        let mut s = Sampler::new(SampleTarget::Object, None);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(0.5),
            Vec3::new(1.0, 2.0, 3.0),
        );
        s.capture(0, m);
        let clip = s.finish(true);
        assert_eq!(clip.translation[0], [1.0, 3.0, -2.0]);
        let scale = clip.scale[0];
        assert!((scale[0] - 1.0).abs() < 1e-5);
        assert!((scale[1] - 3.0).abs() < 1e-5);
        assert!((scale[2] - 2.0).abs() < 1e-5);
        let q = Quat::from_rotation_z(0.5);
        let r = clip.rotation[0];
        assert!((r[1] - q.z).abs() < 1e-5);
        assert!((r[2] + q.y).abs() < 1e-5);
        assert!((r[3] - q.w).abs() < 1e-5);
    }
}
