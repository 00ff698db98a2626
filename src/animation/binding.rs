use crate::animation::clip::AnimationClip;
use crate::scene::PoseTarget;

/// Resolved track-to-bone mapping for one (clip, skeleton) pair.
///
/// `bones[i]` is the bone driven by `clip.tracks[i]`, or `None` when the
/// skeleton has no bone of that name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipBinding {
    pub bones: Vec<Option<usize>>,
}

impl ClipBinding {
    /// Looks up each track's bone by name.
    pub fn bind<P: PoseTarget + ?Sized>(clip: &AnimationClip, target: &P) -> Self {
        let bones = clip
            .tracks
            .iter()
            .map(|track| {
                let bone = target.bone_index(&track.bone_name);
                if bone.is_none() {
                    log::debug!(
                        "Clip '{}': no bone named '{}', track skipped",
                        clip.name,
                        track.bone_name
                    );
                }
                bone
            })
            .collect();
        Self { bones }
    }

    /// Number of tracks that found a bone.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.bones.iter().filter(|b| b.is_some()).count()
    }

    /// Whether this binding has one entry per track of `clip`.
    #[must_use]
    pub fn matches(&self, clip: &AnimationClip) -> bool {
        self.bones.len() == clip.tracks.len()
    }
}
