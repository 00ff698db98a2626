//! Clip sampling into a pose.
//!
//! The sampler turns a continuous time into a fractional frame
//! (`frame = time * frame_rate`), interpolates each bone track at that frame
//! and writes the result through [`PoseTarget::set_bone_local_matrix`], so
//! dirty propagation happens as a side effect of the write.
//!
//! Time is used as given: wrapping or clamping at clip boundaries belongs to
//! the caller (see [`AnimationAction`](crate::animation::AnimationAction)).
//! Bones without a track keep whatever local matrix they already have, which
//! is the bind pose for a freshly created pose.

use crate::animation::binding::ClipBinding;
use crate::animation::clip::AnimationClip;
use crate::animation::tracks::BoneAnimationTrack;
use crate::scene::{PoseTarget, Transform};

pub struct AnimationSampler;

impl AnimationSampler {
    /// Samples `clip` at `time`, resolving bones by name.
    ///
    /// Returns the number of bones whose local matrix changed.
    pub fn sample<P: PoseTarget + ?Sized>(clip: &AnimationClip, time: f32, target: &mut P) -> usize {
        let frame = clip.frame_at(time);
        let mut changed = 0;

        for track in &clip.tracks {
            let Some(bone) = target.bone_index(&track.bone_name) else {
                continue;
            };
            if Self::write_track(track, frame, bone, target) {
                changed += 1;
            }
        }

        changed
    }

    /// Samples `clip` at `time` using a precomputed [`ClipBinding`].
    ///
    /// Falls back to name lookup when the binding was built for a different
    /// track layout.
    pub fn sample_bound<P: PoseTarget + ?Sized>(
        clip: &AnimationClip,
        binding: &ClipBinding,
        time: f32,
        target: &mut P,
    ) -> usize {
        if !binding.matches(clip) {
            log::debug!("Clip '{}': stale binding, resolving bones by name", clip.name);
            return Self::sample(clip, time, target);
        }

        let frame = clip.frame_at(time);
        let mut changed = 0;

        for (track, bone) in clip.tracks.iter().zip(&binding.bones) {
            let Some(bone) = *bone else {
                continue;
            };
            if Self::write_track(track, frame, bone, target) {
                changed += 1;
            }
        }

        changed
    }

    fn write_track<P: PoseTarget + ?Sized>(
        track: &BoneAnimationTrack,
        frame: f32,
        bone: usize,
        target: &mut P,
    ) -> bool {
        if track.is_empty() || bone >= target.bone_count() {
            return false;
        }
        let current = Transform::from_matrix(&target.bone_local_matrix(bone));
        let sampled = track.sample(frame, current);
        target.set_bone_local_matrix(bone, sampled.to_matrix())
    }
}
