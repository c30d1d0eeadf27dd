//! Client-side mirror of the match.
//!
//! The server is authoritative; everything here is rebuilt from what it
//! broadcasts. Between deltas balloons are moved locally so a renderer has
//! something smooth to draw.

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    Balloon, BalloonId, BalloonPosition, Color, Message, PlayerId, PlayerInfo, PlayerScore,
    PopEvent,
};
use std::collections::BTreeMap;

/// Final standings as announced by `game_end`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResults {
    pub scores: Vec<PlayerScore>,
    pub winners: Vec<PlayerId>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    /// Color to try first when picking
    pub preferred_color: Option<Color>,
    /// Color the server confirmed for us
    pub my_color: Option<Color>,
    /// Pick sent but not yet answered
    pub pending_pick: Option<Color>,
    pub ready_sent: bool,

    pub taken_colors: Vec<Color>,
    pub ready_count: usize,
    pub players: Vec<PlayerInfo>,
    pub started: bool,

    pub last_tick: u32,
    pub balloons: BTreeMap<BalloonId, Balloon>,
    pub scores: Vec<PlayerScore>,
    pub results: Option<MatchResults>,
    pub last_rejection: Option<String>,
}

impl ClientGameState {
    pub fn new(preferred_color: Option<Color>) -> Self {
        Self {
            preferred_color,
            ..Self::default()
        }
    }

    /// Our id, known once the roster arrives with `game_start`.
    pub fn my_id(&self) -> Option<PlayerId> {
        let color = self.my_color?;
        self.players
            .iter()
            .find(|player| player.color == color)
            .map(|player| player.id)
    }

    pub fn my_score(&self) -> i32 {
        let Some(id) = self.my_id() else {
            return 0;
        };
        self.scores
            .iter()
            .find(|entry| entry.player_id == id)
            .map(|entry| entry.score)
            .unwrap_or(0)
    }

    pub fn is_over(&self) -> bool {
        self.results.is_some()
    }

    pub fn on_taken_colors(&mut self, colors: Vec<Color>, ready: usize) {
        self.taken_colors = colors;
        self.ready_count = ready;
    }

    pub fn on_color_accepted(&mut self, color: Color) {
        info!("Playing as {}", color);
        self.my_color = Some(color);
        self.pending_pick = None;
    }

    pub fn on_color_rejected(&mut self, color: Color) {
        debug!("{} is taken, picking again", color);
        if self.pending_pick == Some(color) {
            self.pending_pick = None;
        }
        if !self.taken_colors.contains(&color) {
            self.taken_colors.push(color);
        }
    }

    pub fn on_rejected(&mut self, reason: String) {
        warn!("Server rejected a request: {}", reason);
        // A pick that was turned away for another reason is no longer pending
        self.pending_pick = None;
        self.last_rejection = Some(reason);
    }

    pub fn on_player_ready(&mut self, player_id: PlayerId, ready: usize, total: usize) {
        debug!("Player {} is ready ({}/{})", player_id, ready, total);
        self.ready_count = ready;
    }

    pub fn on_game_start(&mut self, players: Vec<PlayerInfo>) {
        info!("Match starting with {} players", players.len());
        self.players = players;
        self.started = true;
    }

    pub fn on_state_delta(
        &mut self,
        tick: u32,
        spawned: Vec<Balloon>,
        removed: Vec<BalloonId>,
        moved: Vec<BalloonPosition>,
        popped: Vec<PopEvent>,
        scores: Vec<PlayerScore>,
    ) {
        self.last_tick = tick;

        for balloon in spawned {
            self.balloons.insert(balloon.id, balloon);
        }
        for id in removed {
            self.balloons.remove(&id);
        }
        for position in moved {
            if let Some(balloon) = self.balloons.get_mut(&position.id) {
                balloon.x = position.x;
                balloon.y = position.y;
            }
        }
        for event in popped {
            if let Some(balloon) = self.balloons.get_mut(&event.balloon_id) {
                balloon.popped = true;
            }
        }
        self.scores = scores;
    }

    pub fn on_player_left(&mut self, player_id: PlayerId, freed_color: Option<Color>) {
        info!("Player {} left", player_id);
        self.players.retain(|player| player.id != player_id);
        if let Some(color) = freed_color {
            self.taken_colors.retain(|taken| *taken != color);
        }
    }

    pub fn on_game_end(&mut self, scores: Vec<PlayerScore>, winners: Vec<PlayerId>) {
        info!("Match over, winners: {:?}", winners);
        self.scores = scores.clone();
        self.results = Some(MatchResults { scores, winners });
    }

    /// Moves balloons locally between server updates.
    pub fn advance(&mut self, dt: f32) {
        for balloon in self.balloons.values_mut() {
            balloon.advance(dt);
        }
    }

    /// The balloon under a click at `(x, y)`. Overlaps resolve to the newest
    /// balloon, which is drawn on top.
    pub fn balloon_at(&self, x: f32, y: f32) -> Option<&Balloon> {
        self.balloons
            .values()
            .rev()
            .find(|balloon| !balloon.popped && balloon.contains(x, y))
    }

    /// Color to request next: the preferred one if free, else the first free.
    pub fn choose_color(&self) -> Option<Color> {
        let free = |color: &Color| !self.taken_colors.contains(color);
        self.preferred_color
            .filter(free)
            .or_else(|| Color::ALL.into_iter().find(free))
    }

    /// What an automated player does this frame, if anything.
    pub fn next_action<R: Rng>(&mut self, pop_chance: f64, rng: &mut R) -> Option<Message> {
        if self.is_over() {
            return None;
        }

        if !self.started {
            if self.my_color.is_none() {
                if self.pending_pick.is_some() {
                    return None;
                }
                let color = self.choose_color()?;
                self.pending_pick = Some(color);
                return Some(Message::PickColor { color });
            }
            if !self.ready_sent {
                self.ready_sent = true;
                return Some(Message::Ready);
            }
            return None;
        }

        if !rng.gen_bool(pop_chance.clamp(0.0, 1.0)) {
            return None;
        }
        let my_color = self.my_color?;
        let targets: Vec<(f32, f32)> = self
            .balloons
            .values()
            .filter(|balloon| !balloon.popped && balloon.color == my_color)
            .map(|balloon| (balloon.x, balloon.y))
            .collect();
        let &(x, y) = targets.choose(rng)?;

        let balloon_id = self.balloon_at(x, y)?.id;
        if let Some(balloon) = self.balloons.get_mut(&balloon_id) {
            balloon.popped = true;
        }
        Some(Message::PopBalloon { balloon_id })
    }
}
