use std::collections::VecDeque;

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{Result, SinewError};
use crate::resources::BoundingBox;
use crate::scene::pose::AnimationPoseData;
use crate::utils::math::safe_inverse;

/// One bone of the hierarchy.
///
/// Bones live in a flat array owned by [`Skeleton`]; relations are indices.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneNode {
    pub name: String,
    /// `None` for root bones.
    pub parent: Option<usize>,
    /// Local-space bind pose (relative to the parent's bind pose).
    pub bind_transform: Mat4,
    /// Inverse of the bone's global bind pose.
    pub inverse_bind_transform: Mat4,
    /// Static mesh-to-bind-space offset baked at import time.
    pub geometry_offset: Mat4,
    /// Derived from `parent` by [`Skeleton::finalize_bone_hierarchy`].
    pub children: SmallVec<[usize; 4]>,
}

/// Immutable bind-time snapshot of the hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSkeleton {
    /// Copy of the bone list taken at finalize time.
    pub(crate) bone_info: Vec<BoneNode>,
    /// Global bind transform per bone, so the bind pose can be rebuilt
    /// without walking parent chains.
    pub(crate) ref_bone_pose: Vec<Mat4>,
    pub(crate) name_to_index: FxHashMap<String, usize>,
}

impl ReferenceSkeleton {
    #[inline]
    #[must_use]
    pub fn bone_info(&self) -> &[BoneNode] {
        &self.bone_info
    }

    #[inline]
    #[must_use]
    pub fn ref_bone_pose(&self) -> &[Mat4] {
        &self.ref_bone_pose
    }

    #[inline]
    #[must_use]
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }
}

/// Bone hierarchy, bind poses and the asset-level pose cache.
///
/// # Lifecycle
///
/// 1. Construct empty with [`Skeleton::new`].
/// 2. Append bones parents-first with [`Skeleton::add_bone`].
/// 3. Call [`Skeleton::finalize_bone_hierarchy`] once.
/// 4. Drive poses with [`Skeleton::set_bone_local_matrix`] and
///    [`Skeleton::update_world_transforms`].
///
/// The skeleton owns one pose (editor edits, previews). Animated instances
/// should each own a pose from [`Skeleton::create_pose`] and drive it through
/// the `*_pose` methods or a [`PoseMut`], so that two instances of one mesh
/// never share pose state.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: String,
    pub(crate) bones: Vec<BoneNode>,
    pub(crate) reference: ReferenceSkeleton,
    pub(crate) pose: AnimationPoseData,
    pub(crate) processing_order: Vec<usize>,
    pub(crate) processing_order_dirty: bool,
}

impl Skeleton {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Resets the skeleton for re-import.
    pub fn clear(&mut self) {
        self.bones.clear();
        self.reference = ReferenceSkeleton::default();
        self.pose.clear();
        self.processing_order.clear();
        self.processing_order_dirty = true;
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Appends a bone and returns its index.
    ///
    /// `parent` must name an already-added bone; anything else makes the new
    /// bone a root. The local bind pose is derived from the parent's global
    /// bind pose, so bones must be added parents first.
    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<usize>,
        global_bind_pose: Mat4,
        geometry_offset: Mat4,
    ) -> usize {
        let index = self.bones.len();

        let parent = match parent {
            Some(p) if p < index => Some(p),
            Some(p) => {
                log::warn!("Bone '{name}': parent index {p} is not an existing bone, adding as root");
                None
            }
            None => None,
        };

        let bind_transform = match parent {
            Some(p) => safe_inverse(&self.reference.ref_bone_pose[p]) * global_bind_pose,
            None => global_bind_pose,
        };

        self.bones.push(BoneNode {
            name: name.to_string(),
            parent,
            bind_transform,
            inverse_bind_transform: safe_inverse(&global_bind_pose),
            geometry_offset,
            children: SmallVec::new(),
        });
        self.reference.ref_bone_pose.push(global_bind_pose);
        if self.reference.name_to_index.contains_key(name) {
            log::warn!("Duplicate bone name '{name}', name lookups keep the first bone");
        } else {
            self.reference.name_to_index.insert(name.to_string(), index);
        }

        self.processing_order_dirty = true;
        let bones = &self.bones;
        self.pose.resize(bones.len(), |i| bones[i].bind_transform);

        index
    }

    /// Appends a bone whose parent is looked up by name.
    ///
    /// An unknown parent name falls back to "no parent".
    pub fn add_bone_with_parent_name(
        &mut self,
        name: &str,
        parent_name: Option<&str>,
        global_bind_pose: Mat4,
        geometry_offset: Mat4,
    ) -> usize {
        let parent = parent_name.and_then(|p| {
            let found = self.reference.find_bone(p);
            if found.is_none() {
                log::warn!("Bone '{name}': unknown parent '{p}', adding as root");
            }
            found
        });
        self.add_bone(name, parent, global_bind_pose, geometry_offset)
    }

    /// Rebuilds a skeleton from stored bones and global bind poses, without
    /// re-deriving any bind matrix. Parent indices must point at earlier bones.
    pub(crate) fn from_parts(name: &str, bones: Vec<BoneNode>, ref_bone_pose: Vec<Mat4>) -> Result<Self> {
        let mut name_to_index = FxHashMap::default();
        for (index, bone) in bones.iter().enumerate() {
            name_to_index.entry(bone.name.clone()).or_insert(index);
        }
        let pose = AnimationPoseData::from_locals(bones.iter().map(|b| b.bind_transform).collect());
        let mut skeleton = Self {
            name: name.to_string(),
            bones,
            reference: ReferenceSkeleton {
                bone_info: Vec::new(),
                ref_bone_pose,
                name_to_index,
            },
            pose,
            processing_order: Vec::new(),
            processing_order_dirty: true,
        };
        skeleton.finalize_bone_hierarchy()?;
        skeleton.update_world_transforms();
        Ok(skeleton)
    }

    /// Rebuilds child lists and the processing order, and marks the pose dirty.
    ///
    /// Safe to call again; each call triggers a full recompute. Returns
    /// [`SinewError::CyclicBoneHierarchy`] when some bone cannot be reached
    /// from a root; the hierarchy is left in its rebuilt state and should be
    /// discarded by the caller.
    pub fn finalize_bone_hierarchy(&mut self) -> Result<()> {
        let count = self.bones.len();
        for bone in &mut self.bones {
            bone.children.clear();
        }
        for index in 0..count {
            if let Some(parent) = self.bones[index].parent
                && parent < count
                && parent != index
            {
                self.bones[parent].children.push(index);
            }
        }

        self.rebuild_processing_order();
        self.reference.bone_info.clone_from(&self.bones);
        self.pose.mark_all_dirty();

        if self.processing_order.len() != count {
            let mut reached = vec![false; count];
            for &i in &self.processing_order {
                reached[i] = true;
            }
            let bone = reached
                .iter()
                .position(|r| !r)
                .map(|i| self.bones[i].name.clone())
                .unwrap_or_default();
            log::error!("Skeleton '{}': cyclic parent chain through '{bone}'", self.name);
            return Err(SinewError::CyclicBoneHierarchy { bone });
        }

        log::debug!(
            "Skeleton '{}' finalized: {} bones, {} roots",
            self.name,
            count,
            self.bones.iter().filter(|b| Self::is_root(b, count)).count()
        );
        Ok(())
    }

    fn is_root(bone: &BoneNode, count: usize) -> bool {
        bone.parent.is_none_or(|p| p >= count)
    }

    /// Breadth-first order from the roots.
    fn rebuild_processing_order(&mut self) {
        let count = self.bones.len();
        self.processing_order.clear();
        self.processing_order.reserve(count);

        let mut queue: VecDeque<usize> = self
            .bones
            .iter()
            .enumerate()
            .filter(|(_, b)| Self::is_root(b, count))
            .map(|(i, _)| i)
            .collect();

        while let Some(index) = queue.pop_front() {
            self.processing_order.push(index);
            queue.extend(self.bones[index].children.iter().copied());
        }

        self.processing_order_dirty = false;
    }

    /// Cached parents-first order. Never recomputed here.
    #[inline]
    #[must_use]
    pub fn processing_order(&self) -> &[usize] {
        &self.processing_order
    }

    #[inline]
    #[must_use]
    pub fn is_processing_order_dirty(&self) -> bool {
        self.processing_order_dirty
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn bones(&self) -> &[BoneNode] {
        &self.bones
    }

    #[inline]
    #[must_use]
    pub fn bone(&self, index: usize) -> Option<&BoneNode> {
        self.bones.get(index)
    }

    #[inline]
    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.reference.find_bone(name)
    }

    #[inline]
    #[must_use]
    pub fn reference(&self) -> &ReferenceSkeleton {
        &self.reference
    }

    /// Local bind pose of a bone, identity when out of range.
    #[must_use]
    pub fn bind_local(&self, index: usize) -> Mat4 {
        self.bones.get(index).map_or(Mat4::IDENTITY, |b| b.bind_transform)
    }

    /// Global bind pose of a bone, identity when out of range.
    #[must_use]
    pub fn ref_bone_pose(&self, index: usize) -> Mat4 {
        self.reference.ref_bone_pose.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    // ========================================================================
    // Owned pose
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn pose(&self) -> &AnimationPoseData {
        &self.pose
    }

    #[inline]
    #[must_use]
    pub fn bone_local_matrix(&self, index: usize) -> Mat4 {
        self.pose.local_transform(index)
    }

    #[inline]
    #[must_use]
    pub fn bone_global_matrix(&self, index: usize) -> Mat4 {
        self.pose.global_transform(index)
    }

    #[inline]
    #[must_use]
    pub fn skinning_matrix(&self, index: usize) -> Mat4 {
        self.pose.skinning_matrix(index)
    }

    /// Writes a bone's local matrix into the owned pose.
    pub fn set_bone_local_matrix(&mut self, index: usize, matrix: Mat4) -> bool {
        self.pose.set_local_transform(&self.bones, index, matrix)
    }

    pub fn mark_bone_and_children_dirty(&mut self, index: usize) {
        self.pose.mark_dirty_subtree(&self.bones, index);
    }

    pub fn update_world_transforms(&mut self) {
        self.pose.update_world_transforms(&self.bones, &self.processing_order);
    }

    // ========================================================================
    // External poses
    // ========================================================================

    /// A fresh bind-pose cache for one animated instance.
    #[must_use]
    pub fn create_pose(&self) -> AnimationPoseData {
        AnimationPoseData::from_locals(self.bones.iter().map(|b| b.bind_transform).collect())
    }

    /// Writes every bone's bind local matrix back into `pose`.
    pub fn reset_to_bind_pose(&self, pose: &mut AnimationPoseData) {
        if pose.bone_count() != self.bones.len() {
            *pose = self.create_pose();
            return;
        }
        for (index, bone) in self.bones.iter().enumerate() {
            pose.set_local_transform(&self.bones, index, bone.bind_transform);
        }
    }

    pub fn set_pose_bone_local_matrix(
        &self,
        pose: &mut AnimationPoseData,
        index: usize,
        matrix: Mat4,
    ) -> bool {
        pose.set_local_transform(&self.bones, index, matrix)
    }

    pub fn mark_pose_dirty(&self, pose: &mut AnimationPoseData, index: usize) {
        pose.mark_dirty_subtree(&self.bones, index);
    }

    pub fn update_pose(&self, pose: &mut AnimationPoseData) {
        pose.update_world_transforms(&self.bones, &self.processing_order);
    }

    /// Borrows the skeleton together with an instance pose as one write target.
    pub fn pose_mut<'a>(&'a self, pose: &'a mut AnimationPoseData) -> PoseMut<'a> {
        PoseMut { skeleton: self, pose }
    }

    /// Bounds of the current global bone positions.
    #[must_use]
    pub fn bone_positions_bounds(&self, pose: &AnimationPoseData) -> Option<BoundingBox> {
        let bounds = BoundingBox::from_points(
            (0..self.bones.len()).map(|i| pose.global_transform(i).transform_point3(Vec3::ZERO)),
        );
        bounds.is_valid().then_some(bounds)
    }
}

// ============================================================================
// Pose write surface
// ============================================================================

/// What the animation sampler writes into.
pub trait PoseTarget {
    fn bone_count(&self) -> usize;
    fn bone_index(&self, name: &str) -> Option<usize>;
    fn bone_local_matrix(&self, index: usize) -> Mat4;
    /// Returns whether the stored matrix changed.
    fn set_bone_local_matrix(&mut self, index: usize, matrix: Mat4) -> bool;
}

impl PoseTarget for Skeleton {
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn bone_index(&self, name: &str) -> Option<usize> {
        self.reference.find_bone(name)
    }

    fn bone_local_matrix(&self, index: usize) -> Mat4 {
        self.pose.local_transform(index)
    }

    fn set_bone_local_matrix(&mut self, index: usize, matrix: Mat4) -> bool {
        Skeleton::set_bone_local_matrix(self, index, matrix)
    }
}

/// A skeleton paired with an instance-owned pose.
pub struct PoseMut<'a> {
    skeleton: &'a Skeleton,
    pose: &'a mut AnimationPoseData,
}

impl PoseMut<'_> {
    pub fn update_world_transforms(&mut self) {
        self.skeleton.update_pose(self.pose);
    }
}

impl PoseTarget for PoseMut<'_> {
    fn bone_count(&self) -> usize {
        self.skeleton.bone_count()
    }

    fn bone_index(&self, name: &str) -> Option<usize> {
        self.skeleton.bone_index(name)
    }

    fn bone_local_matrix(&self, index: usize) -> Mat4 {
        self.pose.local_transform(index)
    }

    fn set_bone_local_matrix(&mut self, index: usize, matrix: Mat4) -> bool {
        self.pose.set_local_transform(&self.skeleton.bones, index, matrix)
    }
}
