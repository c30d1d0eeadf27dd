//! Fixed-rate match loop, owned by the elected leader.

use crate::config::GameConfig;
use crate::state::ServerState;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Runs the match from `Starting` to `Ended`, then broadcasts the results.
pub async fn run_game_loop(state: Arc<ServerState>, config: GameConfig) {
    if let Err(e) = state.start_running().await {
        warn!("Match could not start running: {}", e);
        state.finish().await;
        return;
    }
    info!(
        "Game loop running every {:?} for {:?}",
        config.tick, config.round_duration
    );

    let mut rng = StdRng::from_entropy();
    let mut interval_timer = interval(config.tick);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let max_delta_time = config.max_delta_time();

    // Skip the first tick since it fires immediately
    interval_timer.tick().await;

    let started = Instant::now();
    let mut last_update = started;

    loop {
        interval_timer.tick().await;

        let current_time = Instant::now();
        let mut delta_time = (current_time - last_update).as_secs_f32();
        last_update = current_time;

        if delta_time > max_delta_time {
            warn!(
                "Large delta time detected ({:.3}s), capping to {:.3}s",
                delta_time, max_delta_time
            );
            delta_time = max_delta_time;
        }

        let round_over = current_time.duration_since(started) >= config.round_duration;
        if !state
            .tick(delta_time, config.spawn_chance, round_over, &mut rng)
            .await
        {
            break;
        }
    }

    state.finish().await;
}
