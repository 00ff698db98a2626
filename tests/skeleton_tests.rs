//! Skeleton and pose cache tests
//!
//! Tests for:
//! - Bone insertion order, local bind derivation and name lookup
//! - Hierarchy finalize (child lists, breadth-first processing order, cycles)
//! - Global transform propagation (`global = parent_global * local`)
//! - Idempotent updates and subtree-only dirty propagation
//! - Out-of-range reads/writes and per-instance pose caches

use glam::{Mat4, Quat, Vec3};
use sinew::SinewError;
use sinew::scene::{AnimationPoseData, Skeleton, Transform};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn mat_approx(a: Mat4, b: Mat4) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn t(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, z))
}

/// root -> mid -> tip with local binds [I, T(0,1,0), T(0,1,0)].
fn chain() -> Skeleton {
    let mut skeleton = Skeleton::new("chain");
    skeleton.add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY);
    skeleton.add_bone("mid", Some(0), t(0.0, 1.0, 0.0), Mat4::IDENTITY);
    skeleton.add_bone("tip", Some(1), t(0.0, 2.0, 0.0), Mat4::IDENTITY);
    skeleton.finalize_bone_hierarchy().unwrap();
    skeleton
}

/// root with two branches:
///
/// ```text
///        root(0)
///       /       \
///   left(1)   right(2)
///     |          |
///  left_end(3) right_end(4)
/// ```
fn forked() -> Skeleton {
    let mut skeleton = Skeleton::new("fork");
    skeleton.add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY);
    skeleton.add_bone("left", Some(0), t(-1.0, 1.0, 0.0), Mat4::IDENTITY);
    skeleton.add_bone("right", Some(0), t(1.0, 1.0, 0.0), Mat4::IDENTITY);
    skeleton.add_bone("left_end", Some(1), t(-1.0, 2.0, 0.0), Mat4::IDENTITY);
    skeleton.add_bone("right_end", Some(2), t(1.0, 2.0, 0.0), Mat4::IDENTITY);
    skeleton.finalize_bone_hierarchy().unwrap();
    skeleton.update_world_transforms();
    skeleton
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn add_bone_returns_sequential_indices() {
    let mut skeleton = Skeleton::new("s");
    assert_eq!(skeleton.add_bone("a", None, Mat4::IDENTITY, Mat4::IDENTITY), 0);
    assert_eq!(skeleton.add_bone("b", Some(0), Mat4::IDENTITY, Mat4::IDENTITY), 1);
    assert_eq!(skeleton.bone_count(), 2);
    assert_eq!(skeleton.bone_index("b"), Some(1));
    assert_eq!(skeleton.bone_index("missing"), None);
}

#[test]
fn chain_local_binds_are_relative_to_parent() {
    let skeleton = chain();
    assert!(mat_approx(skeleton.bind_local(0), Mat4::IDENTITY));
    assert!(mat_approx(skeleton.bind_local(1), t(0.0, 1.0, 0.0)));
    assert!(mat_approx(skeleton.bind_local(2), t(0.0, 1.0, 0.0)));
    assert!(mat_approx(skeleton.ref_bone_pose(2), t(0.0, 2.0, 0.0)));
}

#[test]
fn add_bone_with_unknown_parent_name_is_root() {
    let mut skeleton = Skeleton::new("s");
    skeleton.add_bone_with_parent_name("hip", None, Mat4::IDENTITY, Mat4::IDENTITY);
    let spine = skeleton.add_bone_with_parent_name("spine", Some("hip"), t(0.0, 1.0, 0.0), Mat4::IDENTITY);
    let stray = skeleton.add_bone_with_parent_name("stray", Some("nope"), t(5.0, 0.0, 0.0), Mat4::IDENTITY);

    assert_eq!(skeleton.bone(spine).unwrap().parent, Some(0));
    assert_eq!(skeleton.bone(stray).unwrap().parent, None);
    assert!(mat_approx(skeleton.bind_local(stray), t(5.0, 0.0, 0.0)));
}

#[test]
fn finalize_builds_children_and_breadth_first_order() {
    let skeleton = forked();
    assert_eq!(skeleton.bone(0).unwrap().children.as_slice(), &[1, 2]);
    assert_eq!(skeleton.bone(1).unwrap().children.as_slice(), &[3]);
    assert_eq!(skeleton.processing_order(), &[0, 1, 2, 3, 4]);
    assert!(!skeleton.is_processing_order_dirty());
}

#[test]
fn processing_order_goes_stale_after_add_bone() {
    let mut skeleton = chain();
    skeleton.add_bone("extra", Some(2), t(0.0, 3.0, 0.0), Mat4::IDENTITY);
    assert!(skeleton.is_processing_order_dirty());
    // The cached order is returned as-is until the next finalize.
    assert_eq!(skeleton.processing_order().len(), 3);

    skeleton.finalize_bone_hierarchy().unwrap();
    assert_eq!(skeleton.processing_order(), &[0, 1, 2, 3]);
}

#[test]
fn finalize_twice_is_stable() {
    let mut skeleton = forked();
    let order = skeleton.processing_order().to_vec();
    skeleton.finalize_bone_hierarchy().unwrap();
    assert_eq!(skeleton.processing_order(), order.as_slice());
    assert_eq!(skeleton.bone(0).unwrap().children.len(), 2);
}

#[test]
fn clear_resets_everything() {
    let mut skeleton = forked();
    skeleton.clear();
    assert!(skeleton.is_empty());
    assert_eq!(skeleton.bone_index("root"), None);
    assert!(skeleton.processing_order().is_empty());
    assert_eq!(skeleton.pose().bone_count(), 0);
}

#[test]
fn reference_skeleton_snapshots_bones() {
    let skeleton = forked();
    let reference = skeleton.reference();
    assert_eq!(reference.bone_info().len(), 5);
    assert_eq!(reference.find_bone("right_end"), Some(4));
    assert_eq!(reference.ref_bone_pose().len(), 5);
}

#[test]
fn empty_skeleton_finalizes() {
    let mut skeleton = Skeleton::new("empty");
    assert!(skeleton.finalize_bone_hierarchy().is_ok());
    skeleton.update_world_transforms();
    assert!(skeleton.processing_order().is_empty());
}

#[test]
fn cyclic_hierarchy_error_names_the_bone() {
    let err = SinewError::CyclicBoneHierarchy { bone: "spine".into() };
    assert_eq!(err.to_string(), "Bone hierarchy contains a cycle through bone 'spine'");
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn three_bone_chain_globals() {
    let mut skeleton = chain();
    skeleton.update_world_transforms();

    assert!(mat_approx(skeleton.bone_global_matrix(0), Mat4::IDENTITY));
    assert!(mat_approx(skeleton.bone_global_matrix(1), t(0.0, 1.0, 0.0)));
    assert!(mat_approx(skeleton.bone_global_matrix(2), t(0.0, 2.0, 0.0)));
}

#[test]
fn globals_compose_parent_then_local() {
    let skeleton = forked();
    for index in 0..skeleton.bone_count() {
        let local = skeleton.bone_local_matrix(index);
        let expected = match skeleton.bone(index).unwrap().parent {
            Some(parent) => skeleton.bone_global_matrix(parent) * local,
            None => local,
        };
        assert!(mat_approx(skeleton.bone_global_matrix(index), expected), "bone {index}");
    }
}

#[test]
fn bind_pose_skinning_matrices_are_identity() {
    let skeleton = forked();
    for index in 0..skeleton.bone_count() {
        assert!(mat_approx(skeleton.skinning_matrix(index), Mat4::IDENTITY), "bone {index}");
    }
}

#[test]
fn skinning_matrix_includes_geometry_offset() {
    let mut skeleton = Skeleton::new("s");
    let offset = Mat4::from_scale(Vec3::splat(0.01));
    skeleton.add_bone("root", None, t(0.0, 1.0, 0.0), offset);
    skeleton.finalize_bone_hierarchy().unwrap();
    skeleton.update_world_transforms();
    assert!(mat_approx(skeleton.skinning_matrix(0), offset));

    skeleton.set_bone_local_matrix(0, t(0.0, 3.0, 0.0));
    skeleton.update_world_transforms();
    assert!(mat_approx(skeleton.skinning_matrix(0), t(0.0, 2.0, 0.0) * offset));
}

#[test]
fn update_is_idempotent() {
    let mut skeleton = forked();
    skeleton.set_bone_local_matrix(1, Mat4::from_rotation_z(0.7) * t(-1.0, 1.0, 0.0));
    skeleton.update_world_transforms();
    assert!(!skeleton.pose().any_dirty());

    let globals = skeleton.pose().global_transforms().to_vec();
    let skinning = skeleton.pose().skinning_matrices().to_vec();
    skeleton.update_world_transforms();

    assert_eq!(skeleton.pose().global_transforms(), globals.as_slice());
    assert_eq!(skeleton.pose().skinning_matrices(), skinning.as_slice());
    assert!(!skeleton.pose().any_dirty());
}

#[test]
fn dirty_propagation_touches_only_the_subtree() {
    let mut skeleton = forked();
    let before = skeleton.pose().global_transforms().to_vec();

    assert!(skeleton.set_bone_local_matrix(1, t(-1.0, 5.0, 0.0)));
    assert!(skeleton.pose().is_bone_dirty(1));
    assert!(skeleton.pose().is_bone_dirty(3));
    assert!(!skeleton.pose().is_bone_dirty(0));
    assert!(!skeleton.pose().is_bone_dirty(2));
    assert_eq!(skeleton.pose().dirty_count(), 2);

    skeleton.update_world_transforms();
    let after = skeleton.pose().global_transforms();

    // Ancestor and the unrelated branch stay bit-for-bit identical.
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
    assert_eq!(after[4], before[4]);
    // The edited bone and its descendant moved.
    assert!(mat_approx(after[1], t(-1.0, 5.0, 0.0)));
    assert!(mat_approx(after[3], t(-1.0, 6.0, 0.0)));
}

#[test]
fn unchanged_write_does_not_dirty() {
    let mut skeleton = forked();
    let same = skeleton.bone_local_matrix(2);
    assert!(!skeleton.set_bone_local_matrix(2, same));
    let nudged = same * t(1e-8, 0.0, 0.0);
    assert!(!skeleton.set_bone_local_matrix(2, nudged));
    assert!(!skeleton.pose().any_dirty());
}

#[test]
fn explicit_mark_recomputes_subtree() {
    let mut skeleton = forked();
    skeleton.mark_bone_and_children_dirty(2);
    assert_eq!(skeleton.pose().dirty_count(), 2);
    skeleton.update_world_transforms();
    assert!(!skeleton.pose().any_dirty());
    assert!(mat_approx(skeleton.bone_global_matrix(4), t(1.0, 2.0, 0.0)));
}

#[test]
fn rotation_propagates_to_children() {
    let mut skeleton = chain();
    skeleton.update_world_transforms();
    skeleton.set_bone_local_matrix(0, Mat4::from_quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)));
    skeleton.update_world_transforms();

    let tip = Transform::from_matrix(&skeleton.bone_global_matrix(2));
    assert!(tip.position.abs_diff_eq(Vec3::new(-2.0, 0.0, 0.0), EPSILON), "got {}", tip.position);
}

// ============================================================================
// Out-of-range access
// ============================================================================

#[test]
fn out_of_range_reads_are_identity() {
    let skeleton = forked();
    assert_eq!(skeleton.bone_local_matrix(99), Mat4::IDENTITY);
    assert_eq!(skeleton.bone_global_matrix(99), Mat4::IDENTITY);
    assert_eq!(skeleton.skinning_matrix(99), Mat4::IDENTITY);
    assert_eq!(skeleton.bind_local(99), Mat4::IDENTITY);
    assert_eq!(skeleton.ref_bone_pose(99), Mat4::IDENTITY);
    assert!(skeleton.bone(99).is_none());
}

#[test]
fn out_of_range_writes_are_ignored() {
    let mut skeleton = forked();
    assert!(!skeleton.set_bone_local_matrix(99, t(1.0, 1.0, 1.0)));
    skeleton.mark_bone_and_children_dirty(99);
    assert!(!skeleton.pose().any_dirty());
}

// ============================================================================
// Per-instance poses
// ============================================================================

#[test]
fn instance_poses_are_independent() {
    let skeleton = forked();
    let mut a = skeleton.create_pose();
    let mut b = skeleton.create_pose();

    skeleton.set_pose_bone_local_matrix(&mut a, 2, t(1.0, 10.0, 0.0));
    skeleton.update_pose(&mut a);
    skeleton.update_pose(&mut b);

    assert!(mat_approx(a.global_transform(4), t(1.0, 11.0, 0.0)));
    assert!(mat_approx(b.global_transform(4), t(1.0, 2.0, 0.0)));
    assert!(mat_approx(skeleton.bone_global_matrix(4), t(1.0, 2.0, 0.0)));
}

#[test]
fn reset_to_bind_pose_restores_locals() {
    let skeleton = forked();
    let mut pose = skeleton.create_pose();
    skeleton.set_pose_bone_local_matrix(&mut pose, 1, Mat4::from_rotation_x(1.0));
    skeleton.update_pose(&mut pose);

    skeleton.reset_to_bind_pose(&mut pose);
    skeleton.update_pose(&mut pose);
    for index in 0..skeleton.bone_count() {
        assert!(mat_approx(pose.skinning_matrix(index), Mat4::IDENTITY));
    }
}

#[test]
fn reset_rebuilds_mismatched_pose() {
    let skeleton = forked();
    let mut pose = AnimationPoseData::default();
    skeleton.reset_to_bind_pose(&mut pose);
    assert_eq!(pose.bone_count(), skeleton.bone_count());
}

#[test]
fn bone_bounds_cover_current_pose() {
    let skeleton = forked();
    let mut pose = skeleton.create_pose();
    skeleton.update_pose(&mut pose);
    let bounds = skeleton.bone_positions_bounds(&pose).unwrap();
    assert!(bounds.min.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), EPSILON));
    assert!(bounds.max.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), EPSILON));

    assert!(Skeleton::new("none").bone_positions_bounds(&AnimationPoseData::default()).is_none());
}
