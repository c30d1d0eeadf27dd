//! Match tuning shared by the game loop and the sessions that start it.

use std::time::Duration;

/// Default game-loop period.
pub const DEFAULT_TICK_MS: u64 = 250;
/// Default probability that a tick spawns a balloon.
pub const DEFAULT_SPAWN_CHANCE: f64 = 0.6;
/// Default round length.
pub const DEFAULT_ROUND_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub tick: Duration,
    /// Always within `0.0..=1.0`
    pub spawn_chance: f64,
    pub round_duration: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_MS, DEFAULT_SPAWN_CHANCE, DEFAULT_ROUND_SECS)
    }
}

impl GameConfig {
    /// Builds a config from raw command-line values. A zero tick is bumped to
    /// one millisecond and the spawn chance is clamped into range.
    pub fn new(tick_ms: u64, spawn_chance: f64, round_secs: u64) -> Self {
        let spawn_chance = if spawn_chance.is_nan() {
            0.0
        } else {
            spawn_chance.clamp(0.0, 1.0)
        };

        Self {
            tick: Duration::from_millis(tick_ms.max(1)),
            spawn_chance,
            round_duration: Duration::from_secs(round_secs),
        }
    }

    pub fn with_round_duration(mut self, round_duration: Duration) -> Self {
        self.round_duration = round_duration;
        self
    }

    /// Largest delta time a single tick may simulate.
    pub fn max_delta_time(&self) -> f32 {
        self.tick.as_secs_f32() * 2.0
    }
}
