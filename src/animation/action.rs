use std::sync::Arc;

use crate::animation::clip::AnimationClip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

/// Playback state of one clip: owns the clock and the boundary handling
/// that the sampler leaves to its caller.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,

    pub time: f32,
    pub time_scale: f32,
    pub loop_mode: LoopMode,
    pub paused: bool,

    // +1 forward, -1 on the return leg of a ping-pong cycle.
    direction: f32,
}

impl AnimationAction {
    #[must_use]
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            loop_mode: LoopMode::Loop,
            paused: false,
            direction: 1.0,
        }
    }

    #[must_use]
    pub fn with_loop_mode(mut self, loop_mode: LoopMode) -> Self {
        self.loop_mode = loop_mode;
        self
    }

    #[must_use]
    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    /// Advances time by `dt` seconds and wraps it into `[0, duration]`.
    pub fn update(&mut self, dt: f32) {
        if self.paused {
            return;
        }

        let duration = self.clip.duration();
        if duration <= 0.0 {
            self.time = 0.0;
            return;
        }

        let step = dt * self.time_scale;

        match self.loop_mode {
            LoopMode::Once => {
                self.time += step;
                if self.time >= duration {
                    self.time = duration;
                    self.paused = true;
                } else if self.time < 0.0 {
                    self.time = 0.0;
                    self.paused = true;
                }
            }
            LoopMode::Loop => {
                self.time = (self.time + step).rem_euclid(duration);
            }
            LoopMode::PingPong => {
                // Unfold onto a forward cycle of length 2 * duration, then fold back.
                let double_duration = duration * 2.0;
                let phase = if self.direction > 0.0 {
                    self.time
                } else {
                    double_duration - self.time
                };
                let t = (phase + step).rem_euclid(double_duration);
                if t > duration {
                    self.time = double_duration - t;
                    self.direction = -1.0;
                } else {
                    self.time = t;
                    self.direction = 1.0;
                }
            }
        }
    }

    /// Restarts from time zero and resumes playback.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.paused = false;
        self.direction = 1.0;
    }
}
