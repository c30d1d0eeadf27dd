//! Picks exactly one session to start the match.
//!
//! Every session that sees the lobby become startable calls [`elect`]. The
//! first one to flip the gate wins and runs the game loop; the rest carry on
//! as followers.

use crate::config::GameConfig;
use crate::game_loop::run_game_loop;
use crate::state::ServerState;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A one-shot flag that only one caller can claim until it is released.
#[derive(Debug, Default)]
pub struct LeaderGate {
    claimed: AtomicBool,
}

impl LeaderGate {
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    /// Returns true for exactly one caller while the gate is open.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Election {
    /// This caller moved the lobby to `Starting` and owns the game loop
    Leader,
    /// Someone else already won
    Follower,
    /// The lobby cannot start yet
    NotReady,
}

/// Tries to start the match. On `Leader` the lobby is already `Starting` and
/// `game_start` has gone out.
pub async fn elect(state: &ServerState) -> Election {
    if !state.can_start().await {
        return Election::NotReady;
    }
    if !state.leader().try_claim() {
        debug!("Lost leader election");
        return Election::Follower;
    }

    match state.begin_game().await {
        Ok(players) => {
            info!("Won leader election, starting with {} players", players.len());
            Election::Leader
        }
        Err(e) => {
            // Someone left between the check and the claim
            warn!("Leader could not start the match: {}", e);
            state.leader().release();
            Election::NotReady
        }
    }
}

/// Runs an election and, if this caller wins, spawns the game loop.
pub async fn start_if_ready(state: &Arc<ServerState>, config: &GameConfig) -> Election {
    let outcome = elect(state).await;
    if outcome == Election::Leader {
        tokio::spawn(run_game_loop(Arc::clone(state), config.clone()));
    }
    outcome
}
