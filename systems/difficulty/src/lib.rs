#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure time-based difficulty model shared by every generation consumer.

use std::time::Duration;

use lane_rush_core::{DifficultyConfig, DifficultySample};

/// Pure function from elapsed play time to difficulty-derived quantities.
///
/// The caller samples once per tick and hands the same
/// [`DifficultySample`] to every consumer, so a section is never activated
/// with a different difficulty than the obstacles spawned into it.
#[derive(Clone, Copy, Debug)]
pub struct Difficulty {
    config: DifficultyConfig,
}

impl Difficulty {
    /// Creates a difficulty model from a validated configuration.
    #[must_use]
    pub const fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    /// Normalized ramp progress in `[0, 1]` for the provided elapsed time.
    ///
    /// Zero at or before the ramp start, one at or after the ramp end, and
    /// linear in between.
    #[must_use]
    pub fn factor(&self, elapsed: f32) -> f32 {
        let ramp = self.config.ramp();
        ((elapsed - ramp.start()) / (ramp.end() - ramp.start())).clamp(0.0, 1.0)
    }

    /// Derives every difficulty-scaled quantity for one tick.
    #[must_use]
    pub fn sample(&self, elapsed: Duration) -> DifficultySample {
        let factor = self.factor(elapsed.as_secs_f32());
        let top_speed = self.config.top_speed();
        let obstacle_speed = self.config.obstacle_speed();
        let spawn_chance = self.config.spawn_chance();
        DifficultySample {
            factor,
            top_speed: lerp(top_speed.min(), top_speed.max(), factor),
            obstacle_speed: lerp(obstacle_speed.min(), obstacle_speed.max(), factor),
            spawn_chance: lerp(spawn_chance.min(), spawn_chance.max(), factor),
            length_scale: 1.0 + factor,
        }
    }
}

fn lerp(from: f32, to: f32, factor: f32) -> f32 {
    from + (to - from) * factor
}
