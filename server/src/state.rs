//! The one shared, mutable object on the server.
//!
//! Every operation takes the lock exactly once and does its whole logical
//! update under it, including the broadcast the update triggers, so no task
//! ever observes a roster that disagrees with the phase or the color table.

use crate::client_manager::ClientManager;
use crate::election::LeaderGate;
use crate::game::{GameError, GameState, Phase, Player, PopOutcome};
use log::{debug, info};
use rand::Rng;
use shared::{Balloon, BalloonId, Color, Message, MessageChannel, PlayerId, PlayerInfo};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

struct Inner {
    game: GameState,
    clients: ClientManager,
}

impl Inner {
    /// Broadcasts to everyone, dropping any player whose channel refuses it.
    fn broadcast(&mut self, message: &Message) {
        let failed = self.clients.broadcast(message, None);
        self.drop_players(failed);
    }

    /// Drops each player and tells the rest. Telling the rest can uncover
    /// further dead channels, which are handled the same way.
    fn drop_players(&mut self, mut failed: Vec<PlayerId>) {
        while let Some(id) = failed.pop() {
            for notice in self.evict(id) {
                failed.extend(self.clients.broadcast(&notice, None));
            }
        }
    }

    /// Removes `id` everywhere and returns the notices the others should see.
    fn evict(&mut self, id: PlayerId) -> Vec<Message> {
        self.clients.remove_client(id);
        let Some(player) = self.game.remove_player(id) else {
            return Vec::new();
        };

        let mut notices = vec![Message::PlayerLeft {
            player_id: id,
            freed_color: player.color,
        }];
        if self.game.phase() == Phase::Lobby {
            notices.push(self.game.taken_colors_message());
        }
        notices
    }
}

pub struct ServerState {
    inner: RwLock<Inner>,
    leader: LeaderGate,
    finished: Notify,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                game: GameState::new(),
                clients: ClientManager::new(),
            }),
            leader: LeaderGate::new(),
            finished: Notify::new(),
        }
    }

    pub fn leader(&self) -> &LeaderGate {
        &self.leader
    }

    /// Registers a new connection as a lobby player.
    pub async fn join(&self, channel: Arc<MessageChannel>) -> Result<PlayerId, GameError> {
        let mut inner = self.inner.write().await;
        let id = inner.clients.allocate_id();
        inner.game.add_player(id)?;
        inner.clients.add_client(id, channel);
        Ok(id)
    }

    pub async fn taken_colors(&self) -> Message {
        self.inner.read().await.game.taken_colors_message()
    }

    /// Assigns `color`, acknowledges it to the picker and refreshes everyone's
    /// view of the color table.
    pub async fn assign_color(&self, id: PlayerId, color: Color) -> Result<(), GameError> {
        let mut inner = self.inner.write().await;
        inner.game.assign_color(id, color)?;

        inner
            .clients
            .send_to(id, &Message::ColorAccepted { color });
        let taken = inner.game.taken_colors_message();
        inner.broadcast(&taken);
        Ok(())
    }

    /// Marks `id` ready and returns whether the lobby can now start.
    pub async fn set_ready(&self, id: PlayerId) -> Result<bool, GameError> {
        let mut inner = self.inner.write().await;
        inner.game.set_ready(id)?;

        let notice = Message::PlayerReady {
            player_id: id,
            ready: inner.game.ready_count(),
            total: inner.game.player_count(),
        };
        inner.broadcast(&notice);
        Ok(inner.game.can_start())
    }

    pub async fn can_start(&self) -> bool {
        self.inner.read().await.game.can_start()
    }

    pub async fn phase(&self) -> Phase {
        self.inner.read().await.game.phase()
    }

    /// Moves the lobby to `Starting` and announces the roster.
    pub async fn begin_game(&self) -> Result<Vec<PlayerInfo>, GameError> {
        let mut inner = self.inner.write().await;
        inner.game.begin_game()?;

        let players = inner.game.roster();
        inner.broadcast(&Message::GameStart {
            players: players.clone(),
        });
        Ok(players)
    }

    pub async fn start_running(&self) -> Result<(), GameError> {
        self.inner.write().await.game.start_running()
    }

    /// Spawns a balloon of `color` now. It goes out with the next delta.
    pub async fn spawn_balloon<R: Rng>(&self, color: Color, rng: &mut R) -> Balloon {
        self.inner.write().await.game.spawn_balloon(color, rng)
    }

    pub async fn pop_balloon(&self, balloon_id: BalloonId, player_id: PlayerId) -> PopOutcome {
        self.inner
            .write()
            .await
            .game
            .pop_balloon(balloon_id, player_id)
    }

    /// Drops a disconnected player and tells the others.
    pub async fn remove_player(&self, id: PlayerId) -> Option<Player> {
        let mut inner = self.inner.write().await;
        let player = inner.game.player(id).cloned();
        let notices = inner.evict(id);
        for notice in &notices {
            inner.broadcast(notice);
        }
        player
    }

    /// Runs one game-loop tick: maybe spawn, move balloons, broadcast the
    /// delta. Returns false once the match is over.
    pub async fn tick<R: Rng>(
        &self,
        dt: f32,
        spawn_chance: f64,
        round_over: bool,
        rng: &mut R,
    ) -> bool {
        let mut inner = self.inner.write().await;
        if inner.game.phase() == Phase::Ended {
            return false;
        }
        if round_over {
            info!("Round time is up");
            let _ = inner.game.end_game();
            return false;
        }

        inner.game.maybe_spawn(spawn_chance, rng);
        let delta = inner.game.step(dt);
        inner.broadcast(&delta);

        if inner.game.tick % 20 == 0 {
            debug!(
                "Tick {}: {} players, {} balloons",
                inner.game.tick,
                inner.game.player_count(),
                inner.game.balloon_count()
            );
        }
        inner.game.phase() != Phase::Ended
    }

    /// Ends the match if it is still going, broadcasts the results and wakes
    /// whoever waits in [`ServerState::wait_finished`].
    pub async fn finish(&self) -> Message {
        let mut inner = self.inner.write().await;
        if matches!(inner.game.phase(), Phase::Starting | Phase::Running) {
            let _ = inner.game.end_game();
        }

        let results = Message::GameEnd {
            scores: inner.game.scores(),
            winners: inner.game.winners(),
        };
        info!("Match over, winners: {:?}", inner.game.winners());
        inner.broadcast(&results);
        drop(inner);

        self.finished.notify_one();
        results
    }

    pub async fn wait_finished(&self) {
        self.finished.notified().await;
    }

    /// Closes every channel and waits for their queued frames to flush.
    pub async fn shutdown(&self) {
        let channels = self.inner.write().await.clients.drain();
        for channel in channels {
            channel.shutdown().await;
        }
    }

    /// Read-only access to the match, under the same lock as everything else.
    pub async fn inspect<T>(&self, f: impl FnOnce(&GameState) -> T) -> T {
        f(&self.inner.read().await.game)
    }
}
