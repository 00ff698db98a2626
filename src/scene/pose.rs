//! Animation Pose Cache
//!
//! Parallel per-bone arrays holding the current pose of one skeleton instance:
//! local transforms (written by the sampler or an editor gizmo), global
//! transforms and skinning matrices (derived lazily), and one dirty bit per
//! bone.
//!
//! # Invariant
//!
//! For every bone `i` whose dirty bit is clear, `global[i]` equals
//! `global[parent(i)] * local[i]` (or `local[i]` for a root). A dirty bone's
//! descendants are always dirty too, which lets [`AnimationPoseData::mark_dirty_subtree`]
//! stop at the first bone that is already marked.
//!
//! The pose never owns hierarchy data: every operation borrows the bone list
//! and processing order from the [`Skeleton`](crate::scene::Skeleton), so one
//! skeleton can drive any number of independent poses.

use std::collections::VecDeque;

use glam::Mat4;

use crate::scene::skeleton::BoneNode;
use crate::utils::math::{MATRIX_CHANGE_TOLERANCE, matrices_differ};

// ============================================================================
// Dirty bit set
// ============================================================================

/// One bit per bone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyBits {
    words: Vec<u64>,
    len: usize,
}

impl DirtyBits {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grows or shrinks the set; new bits start cleared.
    pub fn resize(&mut self, len: usize) {
        self.words.resize(len.div_ceil(64), 0);
        self.len = len;
        self.clear_tail();
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        index < self.len && (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] |= 1 << (index % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] &= !(1 << (index % 64));
        }
    }

    pub fn set_all(&mut self) {
        self.words.fill(u64::MAX);
        self.clear_tail();
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.words.iter().any(|&w| w != 0)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn clear_tail(&mut self) {
        let rem = self.len % 64;
        if rem != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u64 << rem) - 1;
        }
    }
}

// ============================================================================
// AnimationPoseData
// ============================================================================

/// The current animated pose of one skeleton instance.
#[derive(Debug, Clone, Default)]
pub struct AnimationPoseData {
    pub(crate) local_transforms: Vec<Mat4>,
    pub(crate) global_transforms: Vec<Mat4>,
    pub(crate) skinning_matrices: Vec<Mat4>,
    pub(crate) dirty: DirtyBits,
    pub(crate) any_dirty: bool,
}

impl AnimationPoseData {
    /// Creates a pose seeded with the given local transforms, fully dirty.
    #[must_use]
    pub fn from_locals(locals: Vec<Mat4>) -> Self {
        let count = locals.len();
        let mut dirty = DirtyBits::new(count);
        dirty.set_all();
        Self {
            local_transforms: locals,
            global_transforms: vec![Mat4::IDENTITY; count],
            skinning_matrices: vec![Mat4::IDENTITY; count],
            dirty,
            any_dirty: count > 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.local_transforms.len()
    }

    /// Resizes every array; new bones take `fill_local` and the whole pose is marked dirty.
    pub fn resize(&mut self, count: usize, fill_local: impl Fn(usize) -> Mat4) {
        let old = self.local_transforms.len();
        self.local_transforms.truncate(count);
        for i in old..count {
            self.local_transforms.push(fill_local(i));
        }
        self.global_transforms.resize(count, Mat4::IDENTITY);
        self.skinning_matrices.resize(count, Mat4::IDENTITY);
        self.dirty.resize(count);
        self.mark_all_dirty();
    }

    pub fn clear(&mut self) {
        self.local_transforms.clear();
        self.global_transforms.clear();
        self.skinning_matrices.clear();
        self.dirty.resize(0);
        self.any_dirty = false;
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.set_all();
        self.any_dirty = !self.dirty.is_empty();
    }

    // ------------------------------------------------------------------------
    // Read accessors (identity for out-of-range indices)
    // ------------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn local_transform(&self, index: usize) -> Mat4 {
        self.local_transforms.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    #[inline]
    #[must_use]
    pub fn global_transform(&self, index: usize) -> Mat4 {
        self.global_transforms.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    #[inline]
    #[must_use]
    pub fn skinning_matrix(&self, index: usize) -> Mat4 {
        self.skinning_matrices.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    #[inline]
    #[must_use]
    pub fn local_transforms(&self) -> &[Mat4] {
        &self.local_transforms
    }

    #[inline]
    #[must_use]
    pub fn global_transforms(&self) -> &[Mat4] {
        &self.global_transforms
    }

    #[inline]
    #[must_use]
    pub fn skinning_matrices(&self) -> &[Mat4] {
        &self.skinning_matrices
    }

    #[inline]
    #[must_use]
    pub fn is_bone_dirty(&self, index: usize) -> bool {
        self.dirty.get(index)
    }

    #[inline]
    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.any_dirty
    }

    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.count()
    }

    // ------------------------------------------------------------------------
    // Hierarchy-aware operations
    // ------------------------------------------------------------------------

    /// Breadth-first marks `index` and its descendants dirty.
    ///
    /// A bone that is already dirty is not expanded again: its subtree is
    /// dirty by invariant, so each bone is visited at most once.
    pub fn mark_dirty_subtree(&mut self, bones: &[BoneNode], index: usize) {
        if index >= self.bone_count() {
            return;
        }

        let mut queue = VecDeque::with_capacity(8);
        queue.push_back(index);

        while let Some(current) = queue.pop_front() {
            if self.dirty.get(current) {
                continue;
            }
            self.dirty.set(current);
            self.any_dirty = true;

            if let Some(bone) = bones.get(current) {
                queue.extend(bone.children.iter().copied());
            }
        }
    }

    /// Writes a local matrix if it differs beyond tolerance.
    ///
    /// Returns whether the pose changed. Out-of-range indices are ignored.
    pub fn set_local_transform(&mut self, bones: &[BoneNode], index: usize, matrix: Mat4) -> bool {
        let Some(current) = self.local_transforms.get_mut(index) else {
            return false;
        };
        if !matrices_differ(current, &matrix, MATRIX_CHANGE_TOLERANCE) {
            return false;
        }
        *current = matrix;
        self.mark_dirty_subtree(bones, index);
        true
    }

    /// Recomputes global transforms and skinning matrices of dirty bones.
    ///
    /// Walks `order` (parents before children). Indices missing from `order`
    /// keep their dirty bit, in which case `any_dirty` stays set.
    pub fn update_world_transforms(&mut self, bones: &[BoneNode], order: &[usize]) {
        if !self.any_dirty {
            return;
        }

        let count = self.bone_count().min(bones.len());
        for &index in order {
            if index >= count || !self.dirty.get(index) {
                continue;
            }

            let bone = &bones[index];
            let local = self.local_transforms[index];
            let global = match bone.parent {
                Some(parent) if parent < count => self.global_transforms[parent] * local,
                _ => local,
            };

            self.global_transforms[index] = global;
            self.skinning_matrices[index] =
                global * bone.inverse_bind_transform * bone.geometry_offset;
            self.dirty.clear(index);
        }

        self.any_dirty = self.dirty.any();
        if self.any_dirty {
            log::trace!(
                "update_world_transforms: {} bones left dirty (stale processing order?)",
                self.dirty.count()
            );
        }
    }
}
