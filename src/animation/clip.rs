use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::animation::tracks::BoneAnimationTrack;

/// One animation clip: per-bone tracks sampled at a fixed frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Frames per second.
    pub frame_rate: f32,
    pub tracks: Vec<BoneAnimationTrack>,
    frame_count: usize,
    duration: f32,
}

impl AnimationClip {
    #[must_use]
    pub fn new(name: &str, frame_rate: f32, tracks: Vec<BoneAnimationTrack>) -> Self {
        let frame_count = tracks.iter().map(BoneAnimationTrack::key_count).max().unwrap_or(0);
        let duration = if frame_rate > 0.0 && frame_count > 1 {
            (frame_count - 1) as f32 / frame_rate
        } else {
            0.0
        };

        Self {
            name: name.to_string(),
            frame_rate,
            tracks,
            frame_count,
            duration,
        }
    }

    /// Number of frames in the longest track.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Time of the last frame, in seconds.
    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Fractional frame index for a time value.
    #[inline]
    #[must_use]
    pub fn frame_at(&self, time: f32) -> f32 {
        time * self.frame_rate
    }

    #[must_use]
    pub fn track_for(&self, bone_name: &str) -> Option<&BoneAnimationTrack> {
        self.tracks.iter().find(|t| t.bone_name == bone_name)
    }
}

/// Immutable set of clips keyed by clip name.
///
/// Iteration follows insertion order. A later clip with a duplicate name is
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct AnimationLibrary {
    clips: Vec<Arc<AnimationClip>>,
    by_name: FxHashMap<String, usize>,
}

impl AnimationLibrary {
    #[must_use]
    pub fn new(clips: impl IntoIterator<Item = AnimationClip>) -> Self {
        let mut library = Self::default();
        for clip in clips {
            if library.by_name.contains_key(&clip.name) {
                log::warn!("AnimationLibrary: duplicate clip '{}' ignored", clip.name);
                continue;
            }
            library.by_name.insert(clip.name.clone(), library.clips.len());
            library.clips.push(Arc::new(clip));
        }
        library
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.by_name.get(name).map(|&i| &self.clips[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AnimationClip>> {
        self.clips.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.iter().map(|c| c.name.as_str())
    }
}
