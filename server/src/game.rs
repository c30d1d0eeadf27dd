//! Authoritative match state: roster, colors, balloons, scores and phase.
//!
//! `GameState` is plain data with no locking of its own. The server keeps it
//! behind [`crate::state::ServerState`], which is the only way tasks reach it.

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    Balloon, BalloonId, BalloonPosition, Color, Message, PlayerId, PlayerInfo, PlayerScore,
    PopEvent, BALLOON_RADIUS, MAX_PLAYERS, MIN_PLAYERS, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Keeps spawned balloons clear of the side walls.
const SPAWN_MARGIN_X: f32 = 60.0;
const MIN_RISE_SPEED: f32 = 60.0;
const MAX_RISE_SPEED: f32 = 120.0;
const MAX_DRIFT_SPEED: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Starting,
    Running,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("lobby is full ({0} players)")]
    LobbyFull(usize),
    #[error("color {0} is already taken")]
    ColorTaken(Color),
    #[error("cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: Phase, to: Phase },
    #[error("the match has already started")]
    MatchInProgress,
    #[error("player {0} has not picked a color")]
    NoColor(PlayerId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub color: Option<Color>,
    pub ready: bool,
    pub score: i32,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            color: None,
            ready: false,
            score: 0,
        }
    }
}

/// Result of a pop attempt. A balloon that is already gone yields the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopOutcome {
    pub hit: bool,
    pub delta_score: i32,
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    phase: Phase,
    players: BTreeMap<PlayerId, Player>,
    balloons: BTreeMap<BalloonId, Balloon>,
    next_balloon_id: BalloonId,
    spawned: Vec<Balloon>,
    popped: Vec<PopEvent>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            phase: Phase::Lobby,
            players: BTreeMap::new(),
            balloons: BTreeMap::new(),
            next_balloon_id: 1,
            spawned: Vec::new(),
            popped: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn balloon(&self, id: BalloonId) -> Option<&Balloon> {
        self.balloons.get(&id)
    }

    pub fn balloon_count(&self) -> usize {
        self.balloons.len()
    }

    pub fn add_player(&mut self, id: PlayerId) -> Result<&Player, GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::MatchInProgress);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::LobbyFull(MAX_PLAYERS));
        }

        info!("Player {} joined the lobby", id);
        let player = self.players.entry(id).or_insert_with(|| Player::new(id));
        Ok(&*player)
    }

    /// Gives `color` to player `id` unless another player holds it. Picking
    /// again while still in the lobby swaps the player's color.
    pub fn assign_color(&mut self, id: PlayerId, color: Color) -> Result<(), GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::MatchInProgress);
        }
        if !self.players.contains_key(&id) {
            return Err(GameError::UnknownPlayer(id));
        }
        if self
            .players
            .values()
            .any(|p| p.id != id && p.color == Some(color))
        {
            return Err(GameError::ColorTaken(color));
        }

        if let Some(player) = self.players.get_mut(&id) {
            player.color = Some(color);
        }
        info!("Player {} picked {}", id, color);
        Ok(())
    }

    pub fn set_ready(&mut self, id: PlayerId) -> Result<(), GameError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::UnknownPlayer(id))?;
        if player.color.is_none() {
            return Err(GameError::NoColor(id));
        }
        if !player.ready {
            player.ready = true;
            info!("Player {} is ready", id);
        }
        Ok(())
    }

    pub fn can_start(&self) -> bool {
        (MIN_PLAYERS..=MAX_PLAYERS).contains(&self.players.len())
            && self.players.values().all(|p| p.ready)
    }

    pub fn begin_game(&mut self) -> Result<(), GameError> {
        if self.phase != Phase::Lobby || !self.can_start() {
            return Err(GameError::InvalidTransition {
                from: self.phase,
                to: Phase::Starting,
            });
        }
        self.phase = Phase::Starting;
        info!("Match starting with {} players", self.players.len());
        Ok(())
    }

    pub fn start_running(&mut self) -> Result<(), GameError> {
        self.transition(Phase::Starting, Phase::Running)
    }

    pub fn end_game(&mut self) -> Result<(), GameError> {
        match self.phase {
            Phase::Starting | Phase::Running => {
                self.phase = Phase::Ended;
                info!("Match ended after {} ticks", self.tick);
                Ok(())
            }
            from => Err(GameError::InvalidTransition {
                from,
                to: Phase::Ended,
            }),
        }
    }

    fn transition(&mut self, from: Phase, to: Phase) -> Result<(), GameError> {
        if self.phase != from {
            return Err(GameError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Removes a disconnected player and frees their color. A match in
    /// progress ends once fewer than [`MIN_PLAYERS`] remain.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        info!("Player {} left, freeing {:?}", id, player.color);

        if matches!(self.phase, Phase::Starting | Phase::Running)
            && self.players.len() < MIN_PLAYERS
        {
            self.phase = Phase::Ended;
            info!("Not enough players left, ending match");
        }
        Some(player)
    }

    pub fn taken_colors(&self) -> Vec<Color> {
        self.players.values().filter_map(|p| p.color).collect()
    }

    pub fn ready_count(&self) -> usize {
        self.players.values().filter(|p| p.ready).count()
    }

    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.players
            .values()
            .filter_map(|p| p.color.map(|color| PlayerInfo { id: p.id, color }))
            .collect()
    }

    pub fn scores(&self) -> Vec<PlayerScore> {
        self.players
            .values()
            .map(|p| PlayerScore {
                player_id: p.id,
                color: p.color,
                score: p.score,
            })
            .collect()
    }

    /// Everyone sharing the highest score.
    pub fn winners(&self) -> Vec<PlayerId> {
        let Some(best) = self.players.values().map(|p| p.score).max() else {
            return Vec::new();
        };
        self.players
            .values()
            .filter(|p| p.score == best)
            .map(|p| p.id)
            .collect()
    }

    pub fn taken_colors_message(&self) -> Message {
        Message::TakenColors {
            colors: self.taken_colors(),
            ready: self.ready_count(),
        }
    }

    /// Spawns a balloon of `color` somewhere in the lower half of the field.
    pub fn spawn_balloon<R: Rng>(&mut self, color: Color, rng: &mut R) -> Balloon {
        let id = self.next_balloon_id;
        self.next_balloon_id += 1;

        let x = rng.gen_range(
            SPAWN_MARGIN_X + BALLOON_RADIUS..=WORLD_WIDTH - SPAWN_MARGIN_X - BALLOON_RADIUS,
        );
        let y = rng.gen_range(BALLOON_RADIUS..=WORLD_HEIGHT / 2.0);
        let vel_x = rng.gen_range(-MAX_DRIFT_SPEED..=MAX_DRIFT_SPEED);
        let vel_y = rng.gen_range(MIN_RISE_SPEED..=MAX_RISE_SPEED);

        let balloon = Balloon::new(id, color, x, y, vel_x, vel_y);
        debug!("Spawned {} balloon {} at ({:.0}, {:.0})", color, id, x, y);
        self.balloons.insert(id, balloon.clone());
        self.spawned.push(balloon.clone());
        balloon
    }

    /// With probability `chance`, spawns a balloon in a color someone holds.
    pub fn maybe_spawn<R: Rng>(&mut self, chance: f64, rng: &mut R) -> Option<Balloon> {
        let colors = self.taken_colors();
        if colors.is_empty() || !rng.gen_bool(chance.clamp(0.0, 1.0)) {
            return None;
        }
        let color = *colors.choose(rng)?;
        Some(self.spawn_balloon(color, rng))
    }

    /// Resolves a click on `balloon_id` by `player_id`. The first pop wins;
    /// any later attempt on the same balloon is a no-op.
    pub fn pop_balloon(&mut self, balloon_id: BalloonId, player_id: PlayerId) -> PopOutcome {
        if self.phase != Phase::Running {
            return PopOutcome::default();
        }
        let Some(color) = self.players.get(&player_id).and_then(|p| p.color) else {
            return PopOutcome::default();
        };
        let Some(balloon) = self
            .balloons
            .get_mut(&balloon_id)
            .filter(|balloon| !balloon.popped)
        else {
            return PopOutcome::default();
        };

        balloon.popped = true;
        let hit = balloon.color == color;
        let delta_score = if hit { 1 } else { -1 };

        if let Some(player) = self.players.get_mut(&player_id) {
            player.score += delta_score;
        }
        self.popped.push(PopEvent {
            balloon_id,
            player_id,
            delta_score,
        });
        debug!(
            "Player {} popped balloon {} ({:+})",
            player_id, balloon_id, delta_score
        );

        PopOutcome { hit, delta_score }
    }

    /// Moves every live balloon by `dt` seconds. Popped balloons and those
    /// that left the field are removed and their ids returned.
    pub fn advance_balloons(&mut self, dt: f32) -> Vec<BalloonId> {
        let mut removed = Vec::new();
        self.balloons.retain(|id, balloon| {
            if balloon.popped {
                removed.push(*id);
                return false;
            }
            balloon.advance(dt);
            if balloon.is_out_of_bounds() {
                removed.push(*id);
                return false;
            }
            true
        });
        removed
    }

    /// Advances the world one tick and packages everything that changed since
    /// the previous delta.
    pub fn step(&mut self, dt: f32) -> Message {
        self.tick += 1;
        let removed = self.advance_balloons(dt);
        let moved: Vec<BalloonPosition> = self.balloons.values().map(Balloon::position).collect();

        Message::StateDelta {
            tick: self.tick,
            spawned: std::mem::take(&mut self.spawned),
            removed,
            moved,
            popped: std::mem::take(&mut self.popped),
            scores: self.scores(),
        }
    }
}
