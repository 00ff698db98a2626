//! Simulation Driver
//!
//! This module ties the per-frame pipeline together without any global state.
//! A [`SimulationContext`] carries the settings and the frame clock and is
//! passed explicitly to every [`SkinnedMeshInstance::tick`].
//!
//! # Frame order
//!
//! Each tick runs strictly in this order on the calling thread:
//!
//! 1. advance the playing action and sample its clip into the instance pose
//! 2. propagate dirty local transforms into global and skinning matrices
//! 3. skin the bind-pose vertices on the CPU (CPU mode only)
//! 4. commit the staging buffer for the renderer
//!
//! # Example
//!
//! ```rust,ignore
//! use sinew::{EngineSettings, SimulationContext, SkinnedMeshInstance};
//!
//! let mut ctx = SimulationContext::new(EngineSettings::default());
//! let mut instance = SkinnedMeshInstance::new(asset.clone(), &ctx);
//! instance.play(library.get("Walk").unwrap().clone());
//!
//! loop {
//!     ctx.tick();
//!     instance.tick(&ctx);
//!     // ... renderer uploads instance.output().front() when its version moved ...
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use glam::Mat4;

use crate::animation::{AnimationAction, AnimationClip, AnimationSampler, ClipBinding, LoopMode};
use crate::render::skinning::CpuSkinner;
use crate::render::staging::StagingVertexBuffer;
use crate::resources::geometry::BoundingBox;
use crate::resources::mesh::SkinnedMesh;
use crate::scene::AnimationPoseData;
use crate::settings::{EngineSettings, SkinningMode};
use crate::utils::time::Timer;

/// Explicit per-simulation state handed to every tick.
#[derive(Debug, Clone, Default)]
pub struct SimulationContext {
    pub settings: EngineSettings,
    pub timer: Timer,
}

impl SimulationContext {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            timer: Timer::new(),
        }
    }

    /// Advances the clock by wall time.
    pub fn tick(&mut self) {
        self.timer.tick();
    }

    /// Advances the clock by a fixed step.
    pub fn step(&mut self, dt: Duration) {
        self.timer.advance(dt);
    }

    #[inline]
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.timer.dt_seconds()
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Bones written by the sampler.
    pub sampled_bones: usize,
    /// Whether the CPU skinner filled and committed the output buffer.
    pub skinned: bool,
}

/// One animated occurrence of a [`SkinnedMesh`].
///
/// The asset (skeleton and bind-pose geometry) is shared; the pose cache,
/// playback state and skinned output belong to the instance, so any number
/// of instances of one asset animate independently.
pub struct SkinnedMeshInstance {
    asset: Arc<SkinnedMesh>,
    pose: AnimationPoseData,
    action: Option<AnimationAction>,
    binding: ClipBinding,
    skinner: CpuSkinner,
    output: StagingVertexBuffer,
}

impl SkinnedMeshInstance {
    #[must_use]
    pub fn new(asset: Arc<SkinnedMesh>, ctx: &SimulationContext) -> Self {
        let pose = asset.create_pose();
        let output = StagingVertexBuffer::new(
            asset.bind_vertices(),
            &format!("{}_Skinned", asset.geometry.name),
        );
        Self {
            asset,
            pose,
            action: None,
            binding: ClipBinding::default(),
            skinner: CpuSkinner::new(ctx.settings.skinning.clone()),
            output,
        }
    }

    #[must_use]
    pub fn asset(&self) -> &Arc<SkinnedMesh> {
        &self.asset
    }

    #[must_use]
    pub fn pose(&self) -> &AnimationPoseData {
        &self.pose
    }

    #[must_use]
    pub fn output(&self) -> &StagingVertexBuffer {
        &self.output
    }

    #[must_use]
    pub fn action(&self) -> Option<&AnimationAction> {
        self.action.as_ref()
    }

    pub fn action_mut(&mut self) -> Option<&mut AnimationAction> {
        self.action.as_mut()
    }

    /// Starts `clip` from time zero, looping.
    pub fn play(&mut self, clip: Arc<AnimationClip>) -> &mut AnimationAction {
        self.play_with(clip, LoopMode::Loop)
    }

    pub fn play_with(&mut self, clip: Arc<AnimationClip>, loop_mode: LoopMode) -> &mut AnimationAction {
        let skeleton = &self.asset.skeleton;
        self.binding = ClipBinding::bind(&clip, skeleton);
        log::debug!(
            "Instance of '{}': playing '{}' ({}/{} tracks bound)",
            self.asset.geometry.name,
            clip.name,
            self.binding.bound_count(),
            clip.tracks.len()
        );
        self.action.insert(AnimationAction::new(clip).with_loop_mode(loop_mode))
    }

    /// Stops playback; the pose keeps its last sampled state.
    pub fn stop(&mut self) {
        self.action = None;
        self.binding = ClipBinding::default();
    }

    /// Returns the instance pose to the bind pose.
    pub fn reset_pose(&mut self) {
        self.asset.skeleton.reset_to_bind_pose(&mut self.pose);
    }

    /// Manual override of one bone's local matrix, applied on the next tick.
    pub fn set_bone_local_matrix(&mut self, index: usize, matrix: Mat4) -> bool {
        self.asset
            .skeleton
            .set_pose_bone_local_matrix(&mut self.pose, index, matrix)
    }

    /// Sample, propagate, skin, commit.
    pub fn tick(&mut self, ctx: &SimulationContext) -> TickReport {
        let mut report = TickReport::default();
        let skeleton = &self.asset.skeleton;

        if let Some(action) = &mut self.action {
            action.update(ctx.dt());
            let mut target = skeleton.pose_mut(&mut self.pose);
            report.sampled_bones =
                AnimationSampler::sample_bound(action.clip(), &self.binding, action.time, &mut target);
        }

        skeleton.update_pose(&mut self.pose);

        if self.skinner.settings() != &ctx.settings.skinning {
            self.skinner.set_settings(ctx.settings.skinning.clone());
        }
        if ctx.settings.skinning.mode == SkinningMode::Cpu {
            report.skinned = self.skinner.skin_into(
                self.asset.bind_vertices(),
                self.pose.skinning_matrices(),
                &mut self.output,
            );
        }
        report
    }

    /// Bounds of the current bone positions, in mesh space.
    #[must_use]
    pub fn bone_bounds(&self) -> Option<BoundingBox> {
        self.asset.skeleton.bone_positions_bounds(&self.pose)
    }
}
