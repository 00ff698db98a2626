//! Simulation driver tests
//!
//! Tests for:
//! - Tick order: sample, propagate, skin, commit
//! - Independent instances sharing one asset
//! - GPU mode, manual bone overrides, stop/reset
//! - Settings loaded from JSON

use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Quat, Vec3};
use sinew::animation::{AnimationClip, BoneAnimationTrack, LoopMode};
use sinew::assets::{ImportConverter, MeshData, NodeKind, Polygon, SceneData, SkinCluster};
use sinew::resources::SkinnedMesh;
use sinew::settings::{EngineSettings, SkinningMode};
use sinew::{SimulationContext, SkinnedMeshInstance};

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;
const STEP: Duration = Duration::from_millis(100);

/// Two bones (hip at origin, knee at y=1); the top edge of the quad follows
/// the knee, the bottom edge the hip.
fn leg() -> Arc<SkinnedMesh> {
    let mut scene = SceneData::new("leg");
    let hip = scene.add_node("hip", None, NodeKind::Bone, Mat4::IDENTITY);
    let knee = scene.add_node("knee", Some(hip), NodeKind::Bone, Mat4::from_translation(Vec3::Y));
    let body = scene.add_node("body", None, NodeKind::Mesh, Mat4::IDENTITY);

    let points = vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 2.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
    let mut mesh = MeshData::new("body", body, points, vec![Polygon::from_slice(&[0, 1, 2, 3])]);
    mesh.clusters = vec![
        SkinCluster {
            bone_node: hip,
            control_point_indices: vec![0, 1],
            weights: vec![1.0, 1.0],
            transform_matrix: Mat4::IDENTITY,
            transform_link_matrix: Mat4::IDENTITY,
        },
        SkinCluster {
            bone_node: knee,
            control_point_indices: vec![2, 3],
            weights: vec![1.0, 1.0],
            transform_matrix: Mat4::IDENTITY,
            transform_link_matrix: Mat4::from_translation(Vec3::Y),
        },
    ];
    scene.meshes.push(mesh);

    let asset = ImportConverter::default().convert(&scene).unwrap();
    Arc::new(asset.into_skinned().unwrap())
}

/// Slides the knee from x=0 to x=2 over one second.
fn slide_clip() -> Arc<AnimationClip> {
    let positions = (0..=10).map(|i| Vec3::new(i as f32 * 0.2, 1.0, 0.0)).collect();
    Arc::new(AnimationClip::new(
        "Slide",
        10.0,
        vec![BoneAnimationTrack::new("knee", positions, vec![Quat::IDENTITY], vec![Vec3::ONE])],
    ))
}

fn top_edge_x(instance: &SkinnedMeshInstance) -> f32 {
    let front = instance.output().front_vertices();
    let top: Vec<f32> = front
        .iter()
        .filter(|v| v.bone_indices[0] == 1)
        .map(|v| v.position().x)
        .collect();
    assert_eq!(top.len(), 2);
    top.iter().copied().fold(f32::INFINITY, f32::min)
}

// ============================================================================
// Ticking
// ============================================================================

#[test]
fn idle_instance_commits_the_bind_pose() {
    let asset = leg();
    let mut ctx = SimulationContext::new(EngineSettings::default());
    let mut instance = SkinnedMeshInstance::new(asset.clone(), &ctx);

    ctx.step(STEP);
    let report = instance.tick(&ctx);

    assert_eq!(report.sampled_bones, 0);
    assert!(report.skinned);
    assert_eq!(instance.output().version(), 1);
    for (out, bind) in instance.output().front_vertices().iter().zip(asset.bind_vertices()) {
        assert!(out.position().abs_diff_eq(bind.position(), EPSILON));
    }
}

#[test]
fn playing_clip_moves_the_following_vertices() {
    let mut ctx = SimulationContext::new(EngineSettings::default());
    let mut instance = SkinnedMeshInstance::new(leg(), &ctx);
    instance.play_with(slide_clip(), LoopMode::Once);

    for _ in 0..5 {
        ctx.step(STEP);
        instance.tick(&ctx);
    }

    // Half way: knee at x=1, so the top-left corner moved from 0 to 1.
    assert!((instance.action().unwrap().time - 0.5).abs() < EPSILON);
    assert!((top_edge_x(&instance) - 1.0).abs() < 1e-4, "{}", top_edge_x(&instance));
    assert!(instance.pose().global_transform(1).w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-4));
    assert_eq!(instance.output().commit_count(), 5);
    assert_eq!(ctx.frame_count(), 5);
}

#[test]
fn once_mode_holds_the_last_frame() {
    let mut ctx = SimulationContext::new(EngineSettings::default());
    let mut instance = SkinnedMeshInstance::new(leg(), &ctx);
    instance.play_with(slide_clip(), LoopMode::Once);

    for _ in 0..15 {
        ctx.step(STEP);
        instance.tick(&ctx);
    }
    let action = instance.action().unwrap();
    assert!(action.paused);
    assert_eq!(action.time, 1.0);
    assert!((top_edge_x(&instance) - 2.0).abs() < 1e-4);
}

#[test]
fn instances_of_one_asset_are_independent() {
    let asset = leg();
    let mut ctx = SimulationContext::new(EngineSettings::default());
    let mut moving = SkinnedMeshInstance::new(asset.clone(), &ctx);
    let mut still = SkinnedMeshInstance::new(asset.clone(), &ctx);
    moving.play(slide_clip());

    for _ in 0..3 {
        ctx.step(STEP);
        moving.tick(&ctx);
        still.tick(&ctx);
    }

    assert!(top_edge_x(&moving) > 0.5);
    assert!(top_edge_x(&still).abs() < EPSILON);
    // The shared asset keeps its own bind pose.
    assert!(asset.skeleton.bone_global_matrix(1).abs_diff_eq(Mat4::from_translation(Vec3::Y), EPSILON));
    assert_ne!(moving.output().front().id(), still.output().front().id());
}

#[test]
fn gpu_mode_updates_the_pose_but_not_the_buffer() {
    let mut settings = EngineSettings::default();
    settings.skinning.mode = SkinningMode::Gpu;
    let mut ctx = SimulationContext::new(settings);
    let mut instance = SkinnedMeshInstance::new(leg(), &ctx);
    instance.play(slide_clip());

    ctx.step(STEP);
    let report = instance.tick(&ctx);

    assert_eq!(report.sampled_bones, 1);
    assert!(!report.skinned);
    assert_eq!(instance.output().version(), 0);
    assert!(!instance.pose().any_dirty());
    assert!((instance.pose().skinning_matrix(1).w_axis.x - 0.2).abs() < 1e-4);
}

#[test]
fn manual_override_lands_on_next_tick() {
    let mut ctx = SimulationContext::new(EngineSettings::default());
    let mut instance = SkinnedMeshInstance::new(leg(), &ctx);

    assert!(instance.set_bone_local_matrix(1, Mat4::from_translation(Vec3::new(0.5, 1.0, 0.0))));
    assert!(instance.pose().is_bone_dirty(1));
    assert!(!instance.set_bone_local_matrix(9, Mat4::IDENTITY));

    ctx.step(STEP);
    instance.tick(&ctx);
    assert!((top_edge_x(&instance) - 0.5).abs() < EPSILON);
}

#[test]
fn stop_keeps_pose_and_reset_restores_bind() {
    let mut ctx = SimulationContext::new(EngineSettings::default());
    let mut instance = SkinnedMeshInstance::new(leg(), &ctx);
    instance.play(slide_clip());
    for _ in 0..2 {
        ctx.step(STEP);
        instance.tick(&ctx);
    }
    let posed = top_edge_x(&instance);
    assert!(posed > 0.1);

    instance.stop();
    assert!(instance.action().is_none());
    ctx.step(STEP);
    instance.tick(&ctx);
    assert!((top_edge_x(&instance) - posed).abs() < EPSILON);

    instance.reset_pose();
    ctx.step(STEP);
    instance.tick(&ctx);
    assert!(top_edge_x(&instance).abs() < EPSILON);
    assert!(instance.bone_bounds().is_some());
}

#[test]
fn settings_round_trip_through_json() {
    let json = r#"{ "skinning": { "mode": "Gpu" }, "import": { "max_influences": 2 } }"#;
    let settings = EngineSettings::from_json_str(json).unwrap();
    assert_eq!(settings.skinning.mode, SkinningMode::Gpu);
    assert_eq!(settings.import.max_influences, 2);
    assert!(settings.import.deduplicate_vertices);

    let again = EngineSettings::from_json_str(&settings.to_json_string().unwrap()).unwrap();
    assert_eq!(again, settings);
    assert!(EngineSettings::from_json_str("{ not json").is_err());
}
