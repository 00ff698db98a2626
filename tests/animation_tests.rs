//! Animation Tests
//!
//! Tests for:
//! - BoneAnimationTrack frame sampling (linear position/scale, slerp rotation)
//! - Key clamping at both ends of a track and mixed channel lengths
//! - Interpolatable trait implementations (f32, Vec3, Quat)
//! - AnimationClip duration and AnimationLibrary lookup
//! - ClipBinding resolution and AnimationSampler writes into a pose
//! - AnimationAction loop modes (Once, Loop, PingPong)

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};
use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};

use sinew::animation::{
    AnimationAction, AnimationClip, AnimationLibrary, AnimationSampler, BoneAnimationTrack, ClipBinding,
    Interpolatable, LoopMode,
};
use sinew::scene::{PoseTarget, Skeleton, Transform};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn quat_approx(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

fn position_track(bone: &str, positions: Vec<Vec3>) -> BoneAnimationTrack {
    BoneAnimationTrack::new(bone, positions, vec![], vec![])
}

/// root -> mid -> tip, each one unit above its parent.
fn chain_skeleton() -> Skeleton {
    let mut skeleton = Skeleton::new("chain");
    skeleton.add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY);
    skeleton.add_bone("mid", Some(0), Mat4::from_translation(Vec3::Y), Mat4::IDENTITY);
    skeleton.add_bone("tip", Some(1), Mat4::from_translation(Vec3::Y * 2.0), Mat4::IDENTITY);
    skeleton.finalize_bone_hierarchy().unwrap();
    skeleton.update_world_transforms();
    skeleton
}

fn translation_of(m: Mat4) -> Vec3 {
    m.w_axis.truncate()
}

// ============================================================================
// BoneAnimationTrack: Position Channel
// ============================================================================

#[test]
fn track_position_midpoint() {
    let track = position_track("a", vec![Vec3::ZERO, Vec3::X * 10.0]);
    let p = track.sample_position(0.5).unwrap();
    assert!(vec3_approx(p, Vec3::X * 5.0), "Expected (5,0,0), got {p}");
}

#[test]
fn track_position_exact_keyframes() {
    let track = position_track("a", vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0]);
    assert!(vec3_approx(track.sample_position(0.0).unwrap(), Vec3::ZERO));
    assert!(vec3_approx(track.sample_position(1.0).unwrap(), Vec3::X));
    assert!(vec3_approx(track.sample_position(2.0).unwrap(), Vec3::X * 2.0));
}

#[test]
fn track_position_clamps_beyond_last_key() {
    let track = position_track("a", vec![Vec3::ZERO, Vec3::X]);
    let p = track.sample_position(7.5).unwrap();
    assert!(vec3_approx(p, Vec3::X), "Expected last key, got {p}");
}

#[test]
fn track_position_clamps_before_first_key() {
    let track = position_track("a", vec![Vec3::Y, Vec3::X]);
    let p = track.sample_position(-3.0).unwrap();
    assert!(vec3_approx(p, Vec3::Y), "Expected first key, got {p}");
}

#[test]
fn track_single_key_is_constant() {
    let track = position_track("a", vec![Vec3::Z]);
    assert!(vec3_approx(track.sample_position(0.0).unwrap(), Vec3::Z));
    assert!(vec3_approx(track.sample_position(12.3).unwrap(), Vec3::Z));
}

// ============================================================================
// BoneAnimationTrack: Rotation & Scale Channels
// ============================================================================

#[test]
fn track_rotation_is_slerped() {
    let track = BoneAnimationTrack::new(
        "a",
        vec![],
        vec![Quat::IDENTITY, Quat::from_rotation_y(FRAC_PI_2)],
        vec![],
    );
    let q = track.sample_rotation(0.5).unwrap();
    assert!(quat_approx(q, Quat::from_rotation_y(FRAC_PI_4)), "Expected 45° about Y, got {q}");
    assert!(approx(q.length(), 1.0));
}

#[test]
fn track_scale_is_linear() {
    let track = BoneAnimationTrack::new("a", vec![], vec![], vec![Vec3::ONE, Vec3::splat(3.0)]);
    assert!(vec3_approx(track.sample_scale(0.25).unwrap(), Vec3::splat(1.5)));
}

#[test]
fn track_mixed_channel_lengths() {
    let track = BoneAnimationTrack::new(
        "a",
        vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
        vec![Quat::from_rotation_z(0.3)],
        vec![],
    );
    assert_eq!(track.key_count(), 3);
    assert!(quat_approx(track.sample_rotation(1.7).unwrap(), Quat::from_rotation_z(0.3)));
}

#[test]
fn track_empty_channels_keep_current_components() {
    let track = position_track("a", vec![Vec3::X]);
    let current = Transform::new(Vec3::Y, Quat::from_rotation_x(0.5), Vec3::splat(2.0));
    let sampled = track.sample(0.0, current);
    assert!(vec3_approx(sampled.position, Vec3::X));
    assert!(quat_approx(sampled.rotation, current.rotation));
    assert!(vec3_approx(sampled.scale, current.scale));
}

// ============================================================================
// Interpolatable Trait
// ============================================================================

#[test]
fn interpolatable_f32_linear() {
    assert!(approx(f32::interpolate_linear(2.0, 4.0, 0.25), 2.5));
}

#[test]
fn interpolatable_vec3_linear() {
    let v = Vec3::interpolate_linear(Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0), 0.5);
    assert!(vec3_approx(v, Vec3::new(1.0, 2.0, 3.0)));
}

#[test]
fn interpolatable_quat_takes_shortest_arc() {
    let a = Quat::from_rotation_y(0.2);
    // Same rotation as `b`, opposite hemisphere.
    let b = -Quat::from_rotation_y(0.6);
    let q = Quat::interpolate_linear(a, b, 0.5);
    assert!(quat_approx(q, Quat::from_rotation_y(0.4)), "Got {q}");
}

// ============================================================================
// AnimationClip & AnimationLibrary
// ============================================================================

#[test]
fn clip_duration_from_frame_count_and_rate() {
    let clip = AnimationClip::new(
        "walk",
        30.0,
        vec![
            position_track("a", vec![Vec3::ZERO; 31]),
            position_track("b", vec![Vec3::ZERO; 10]),
        ],
    );
    assert_eq!(clip.frame_count(), 31);
    assert!(approx(clip.duration(), 1.0), "Expected 1s, got {}", clip.duration());
    assert!(approx(clip.frame_at(0.5), 15.0));
}

#[test]
fn clip_empty_tracks_zero_duration() {
    let clip = AnimationClip::new("empty", 30.0, vec![]);
    assert_eq!(clip.frame_count(), 0);
    assert!(approx(clip.duration(), 0.0));
}

#[test]
fn clip_track_lookup_by_bone() {
    let clip = AnimationClip::new("c", 24.0, vec![position_track("hip", vec![Vec3::ZERO])]);
    assert!(clip.track_for("hip").is_some());
    assert!(clip.track_for("spine").is_none());
}

#[test]
fn library_keeps_first_of_duplicate_names_in_order() {
    let library = AnimationLibrary::new([
        AnimationClip::new("idle", 30.0, vec![]),
        AnimationClip::new("run", 30.0, vec![]),
        AnimationClip::new("idle", 60.0, vec![]),
    ]);
    assert_eq!(library.len(), 2);
    assert_eq!(library.names().collect::<Vec<_>>(), vec!["idle", "run"]);
    assert!(approx(library.get("idle").unwrap().frame_rate, 30.0));
    assert!(library.get("jump").is_none());
}

// ============================================================================
// ClipBinding & AnimationSampler
// ============================================================================

#[test]
fn binding_skips_unknown_bones() {
    let skeleton = chain_skeleton();
    let clip = AnimationClip::new(
        "c",
        1.0,
        vec![
            position_track("tip", vec![Vec3::ZERO]),
            position_track("tail", vec![Vec3::ZERO]),
        ],
    );
    let binding = ClipBinding::bind(&clip, &skeleton);
    assert_eq!(binding.bones, vec![Some(2), None]);
    assert_eq!(binding.bound_count(), 1);
    assert!(binding.matches(&clip));
}

#[test]
fn sampler_writes_local_and_propagates() {
    let mut skeleton = chain_skeleton();
    let clip = AnimationClip::new("lift", 1.0, vec![position_track("mid", vec![Vec3::Y, Vec3::Y * 3.0])]);

    let changed = AnimationSampler::sample(&clip, 0.5, &mut skeleton);
    assert_eq!(changed, 1);
    assert!(vec3_approx(translation_of(skeleton.bone_local_matrix(1)), Vec3::Y * 2.0));
    assert!(skeleton.pose().any_dirty(), "Sampler writes should mark the pose dirty");

    skeleton.update_world_transforms();
    assert!(vec3_approx(translation_of(skeleton.bone_global_matrix(2)), Vec3::Y * 3.0));
    // Root has no track and keeps its bind pose.
    assert_eq!(skeleton.bone_global_matrix(0), Mat4::IDENTITY);
}

#[test]
fn sampler_same_time_twice_changes_nothing() {
    let mut skeleton = chain_skeleton();
    let clip = AnimationClip::new("lift", 1.0, vec![position_track("mid", vec![Vec3::Y, Vec3::Y * 3.0])]);

    AnimationSampler::sample(&clip, 0.25, &mut skeleton);
    skeleton.update_world_transforms();
    assert_eq!(AnimationSampler::sample(&clip, 0.25, &mut skeleton), 0);
    assert!(!skeleton.pose().any_dirty());
}

#[test]
fn sampler_keeps_rotation_when_track_has_only_positions() {
    let mut skeleton = chain_skeleton();
    let turned = Mat4::from_rotation_translation(Quat::from_rotation_z(0.5), Vec3::Y);
    skeleton.set_bone_local_matrix(1, turned);

    let clip = AnimationClip::new("slide", 1.0, vec![position_track("mid", vec![Vec3::X])]);
    AnimationSampler::sample(&clip, 0.0, &mut skeleton);

    let local = Transform::from_matrix(&skeleton.bone_local_matrix(1));
    assert!(vec3_approx(local.position, Vec3::X));
    assert!(quat_approx(local.rotation, Quat::from_rotation_z(0.5)));
}

#[test]
fn sampler_drives_independent_instance_poses() {
    let skeleton = chain_skeleton();
    let clip = AnimationClip::new("lift", 1.0, vec![position_track("mid", vec![Vec3::Y, Vec3::Y * 3.0])]);
    let binding = ClipBinding::bind(&clip, &skeleton);

    let mut pose_a = skeleton.create_pose();
    let mut pose_b = skeleton.create_pose();

    let mut target = skeleton.pose_mut(&mut pose_a);
    AnimationSampler::sample_bound(&clip, &binding, 1.0, &mut target);
    target.update_world_transforms();
    skeleton.update_pose(&mut pose_b);

    assert!(vec3_approx(translation_of(pose_a.global_transform(2)), Vec3::Y * 4.0));
    assert!(vec3_approx(translation_of(pose_b.global_transform(2)), Vec3::Y * 2.0));
    // The skeleton's own pose is untouched by instance sampling.
    assert!(vec3_approx(translation_of(skeleton.bone_global_matrix(2)), Vec3::Y * 2.0));
}

#[test]
fn sampler_stale_binding_falls_back_to_names() {
    let mut skeleton = chain_skeleton();
    let clip = AnimationClip::new("lift", 1.0, vec![position_track("tip", vec![Vec3::X])]);
    let stale = ClipBinding::default();

    let changed = AnimationSampler::sample_bound(&clip, &stale, 0.0, &mut skeleton);
    assert_eq!(changed, 1);
    assert_eq!(skeleton.bone_index("tip"), Some(2));
    assert!(vec3_approx(translation_of(PoseTarget::bone_local_matrix(&skeleton, 2)), Vec3::X));
}

// ============================================================================
// AnimationAction Loop Modes
// ============================================================================

/// A two-key clip lasting `duration` seconds.
fn make_simple_clip(duration: f32) -> Arc<AnimationClip> {
    Arc::new(AnimationClip::new(
        "test",
        1.0 / duration,
        vec![position_track("node", vec![Vec3::ZERO, Vec3::X])],
    ))
}

#[test]
fn action_loop_mode_once() {
    let clip = make_simple_clip(2.0);
    let mut action = AnimationAction::new(clip);
    action.loop_mode = LoopMode::Once;

    action.update(3.0);
    assert!(approx(action.time, 2.0), "Once: should clamp to duration, got {}", action.time);
    assert!(action.paused, "Once: should auto-pause at end");
}

#[test]
fn action_loop_mode_loop() {
    let clip = make_simple_clip(2.0);
    let mut action = AnimationAction::new(clip);

    action.update(2.5);
    assert!(approx(action.time, 0.5), "Loop: should wrap to 0.5, got {}", action.time);
    assert!(!action.paused, "Loop: should NOT auto-pause");
}

#[test]
fn action_loop_reverse_playback() {
    let clip = make_simple_clip(2.0);
    let mut action = AnimationAction::new(clip);
    action.time_scale = -1.0;
    action.time = 0.5;

    action.update(1.0);
    assert!(approx(action.time, 1.5), "Loop reverse: expected 1.5, got {}", action.time);
}

#[test]
fn action_ping_pong_turns_around() {
    let clip = make_simple_clip(2.0);
    let mut action = AnimationAction::new(clip).with_loop_mode(LoopMode::PingPong);

    action.update(1.5);
    assert!(approx(action.time, 1.5));
    action.update(1.0);
    assert!(approx(action.time, 1.5), "Bounced off the end, got {}", action.time);
    action.update(1.0);
    assert!(approx(action.time, 0.5), "Still running backwards, got {}", action.time);
    action.update(1.0);
    assert!(approx(action.time, 0.5), "Bounced off the start, got {}", action.time);
}

#[test]
fn action_paused_no_update() {
    let clip = make_simple_clip(2.0);
    let mut action = AnimationAction::new(clip);
    action.paused = true;
    action.time = 0.5;

    action.update(1.0);
    assert!(approx(action.time, 0.5), "Paused action should not advance");
}

#[test]
fn action_time_scale() {
    let clip = make_simple_clip(4.0);
    let mut action = AnimationAction::new(clip).with_loop_mode(LoopMode::Once);
    action.time_scale = 2.0;

    action.update(1.0);
    assert!(approx(action.time, 2.0), "Expected 2.0, got {}", action.time);
}

#[test]
fn action_reset_restarts_finished_clip() {
    let clip = make_simple_clip(1.0);
    let mut action = AnimationAction::new(clip).with_loop_mode(LoopMode::Once);
    action.update(5.0);
    assert!(action.paused);

    action.reset();
    assert!(!action.paused);
    assert!(approx(action.time, 0.0));
}
