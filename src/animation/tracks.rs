use glam::{Quat, Vec3};

use crate::animation::values::Interpolatable;
use crate::scene::Transform;

/// The two keys bracketing a fractional frame, and the blend factor between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPair {
    pub prev: usize,
    pub next: usize,
    pub alpha: f32,
}

impl KeyPair {
    /// Clamps `floor(frame)` and `floor(frame) + 1` to `[0, key_count)`.
    ///
    /// Returns `None` for an empty channel.
    #[must_use]
    pub fn at_frame(frame: f32, key_count: usize) -> Option<Self> {
        if key_count == 0 {
            return None;
        }
        let frame = if frame.is_finite() { frame } else { 0.0 };
        let last = (key_count - 1) as f32;

        let base = frame.floor();
        let prev = base.clamp(0.0, last) as usize;
        let next = (base + 1.0).clamp(0.0, last) as usize;
        let alpha = (frame - base).clamp(0.0, 1.0);

        Some(Self { prev, next, alpha })
    }
}

/// Samples one channel at a fractional frame.
#[must_use]
pub fn sample_channel<T: Interpolatable>(keys: &[T], frame: f32) -> Option<T> {
    let pair = KeyPair::at_frame(frame, keys.len())?;
    if pair.prev == pair.next {
        return Some(keys[pair.prev]);
    }
    Some(T::interpolate_linear(keys[pair.prev], keys[pair.next], pair.alpha))
}

/// Keyframes for one bone, one sample per frame at the clip's frame rate.
///
/// Channels may have different lengths; an empty channel leaves that
/// component of the bone's pose untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneAnimationTrack {
    pub bone_name: String,
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

impl BoneAnimationTrack {
    #[must_use]
    pub fn new(bone_name: &str, positions: Vec<Vec3>, rotations: Vec<Quat>, scales: Vec<Vec3>) -> Self {
        Self {
            bone_name: bone_name.to_string(),
            positions,
            rotations,
            scales,
        }
    }

    /// Longest channel length.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.positions.len().max(self.rotations.len()).max(self.scales.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }

    #[inline]
    #[must_use]
    pub fn sample_position(&self, frame: f32) -> Option<Vec3> {
        sample_channel(&self.positions, frame)
    }

    #[inline]
    #[must_use]
    pub fn sample_rotation(&self, frame: f32) -> Option<Quat> {
        sample_channel(&self.rotations, frame)
    }

    #[inline]
    #[must_use]
    pub fn sample_scale(&self, frame: f32) -> Option<Vec3> {
        sample_channel(&self.scales, frame)
    }

    /// Samples every channel, taking missing components from `current`.
    #[must_use]
    pub fn sample(&self, frame: f32, current: Transform) -> Transform {
        Transform {
            position: self.sample_position(frame).unwrap_or(current.position),
            rotation: self.sample_rotation(frame).unwrap_or(current.rotation),
            scale: self.sample_scale(frame).unwrap_or(current.scale),
        }
    }
}
