use crate::game::ClientGameState;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ChannelError, Color, Dispatcher, Inbox, Message, MessageChannel};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Builds the handler table that keeps a [`ClientGameState`] in sync with
/// the server.
pub fn dispatcher() -> Dispatcher<ClientGameState> {
    let mut dispatcher: Dispatcher<ClientGameState> = Dispatcher::new();
    dispatcher
        .on("taken_colors", |game: &mut ClientGameState, message| {
            if let Message::TakenColors { colors, ready } = message {
                game.on_taken_colors(colors, ready);
            }
        })
        .on("color_accepted", |game, message| {
            if let Message::ColorAccepted { color } = message {
                game.on_color_accepted(color);
            }
        })
        .on("color_rejected", |game, message| {
            if let Message::ColorRejected { color } = message {
                game.on_color_rejected(color);
            }
        })
        .on("rejected", |game, message| {
            if let Message::Rejected { reason } = message {
                game.on_rejected(reason);
            }
        })
        .on("player_ready", |game, message| {
            if let Message::PlayerReady {
                player_id,
                ready,
                total,
            } = message
            {
                game.on_player_ready(player_id, ready, total);
            }
        })
        .on("game_start", |game, message| {
            if let Message::GameStart { players } = message {
                game.on_game_start(players);
            }
        })
        .on("state_delta", |game, message| {
            if let Message::StateDelta {
                tick,
                spawned,
                removed,
                moved,
                popped,
                scores,
            } = message
            {
                game.on_state_delta(tick, spawned, removed, moved, popped, scores);
            }
        })
        .on("player_left", |game, message| {
            if let Message::PlayerLeft {
                player_id,
                freed_color,
            } = message
            {
                game.on_player_left(player_id, freed_color);
            }
        })
        .on("game_end", |game, message| {
            if let Message::GameEnd { scores, winners } = message {
                game.on_game_end(scores, winners);
            }
        });
    dispatcher
}

/// A connected player: one channel, the local mirror of the match and the
/// dispatcher that keeps the two in step.
pub struct Client {
    channel: MessageChannel,
    inbox: Inbox,
    dispatcher: Dispatcher<ClientGameState>,
    game_state: ClientGameState,
    tick: Duration,
    pop_chance: f64,
    connected: bool,
}

impl Client {
    pub async fn connect(
        server_addr: &str,
        preferred_color: Option<Color>,
        tick: Duration,
        pop_chance: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        let (channel, inbox) = MessageChannel::from_tcp(stream);
        info!("Connected to {}", channel.peer());

        Ok(Client {
            channel,
            inbox,
            dispatcher: dispatcher(),
            game_state: ClientGameState::new(preferred_color),
            tick: tick.max(Duration::from_millis(1)),
            pop_chance,
            connected: true,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn send(&self, message: &Message) -> Result<(), ChannelError> {
        self.channel.send(message)
    }

    /// One frame: apply whatever arrived, move balloons locally, then act.
    /// Returns false once there is nothing left to do.
    pub fn step<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Result<bool, ChannelError> {
        let report = self
            .dispatcher
            .poll_and_dispatch(&mut self.inbox, &mut self.game_state);
        if report.dropped > 0 {
            debug!("Dropped {} unhandled messages", report.dropped);
        }
        if report.disconnected {
            self.connected = false;
        }

        if self.game_state.is_over() {
            return Ok(false);
        }
        if !self.connected {
            warn!("Server closed the connection");
            return Ok(false);
        }

        self.game_state.advance(dt);
        if let Some(action) = self.game_state.next_action(self.pop_chance, rng) {
            self.channel.send(&action)?;
        }
        Ok(true)
    }

    /// Plays until the match ends or the server goes away and returns the
    /// final local view of the match.
    pub async fn run(mut self) -> Result<ClientGameState, Box<dyn std::error::Error>> {
        let mut rng = StdRng::from_entropy();
        let mut frame_interval = interval(self.tick);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_frame = Instant::now();
        loop {
            frame_interval.tick().await;

            let now = Instant::now();
            let dt = (now - last_frame).as_secs_f32();
            last_frame = now;

            if !self.step(dt, &mut rng)? {
                break;
            }
        }

        self.channel.shutdown().await;
        Ok(self.game_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Balloon, PlayerInfo};
    use tokio::io::duplex;

    fn client_over(stream: tokio::io::DuplexStream) -> Client {
        let (channel, inbox) = MessageChannel::open(stream, "server");
        Client {
            channel,
            inbox,
            dispatcher: dispatcher(),
            game_state: ClientGameState::new(Some(Color::Yellow)),
            tick: Duration::from_millis(5),
            pop_chance: 1.0,
            connected: true,
        }
    }

    #[test]
    fn test_dispatcher_covers_server_messages() {
        let dispatcher = dispatcher();
        for action in [
            "taken_colors",
            "color_accepted",
            "color_rejected",
            "rejected",
            "player_ready",
            "game_start",
            "state_delta",
            "player_left",
            "game_end",
        ] {
            assert!(dispatcher.handles(action), "missing handler for {}", action);
        }
        assert!(!dispatcher.handles("pick_color"));
    }

    #[tokio::test]
    async fn test_step_plays_lobby_then_pops() {
        let (client_end, server_end) = duplex(64 * 1024);
        let mut client = client_over(client_end);
        let (server, mut server_inbox) = MessageChannel::open(server_end, "client");
        let mut rng = StdRng::seed_from_u64(5);

        server
            .send(&Message::TakenColors {
                colors: vec![],
                ready: 0,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.step(0.0, &mut rng).unwrap());
        assert_eq!(
            server_inbox.recv().await,
            Some(Message::PickColor {
                color: Color::Yellow
            })
        );

        server
            .send(&Message::ColorAccepted {
                color: Color::Yellow,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.step(0.0, &mut rng).unwrap());
        assert_eq!(server_inbox.recv().await, Some(Message::Ready));

        server
            .send(&Message::GameStart {
                players: vec![PlayerInfo {
                    id: 1,
                    color: Color::Yellow,
                }],
            })
            .unwrap();
        server
            .send(&Message::StateDelta {
                tick: 1,
                spawned: vec![Balloon::new(4, Color::Yellow, 300.0, 200.0, 0.0, 0.0)],
                removed: vec![],
                moved: vec![],
                popped: vec![],
                scores: vec![],
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.step(0.0, &mut rng).unwrap());
        assert_eq!(
            server_inbox.recv().await,
            Some(Message::PopBalloon { balloon_id: 4 })
        );
        assert_eq!(client.game_state().my_id(), Some(1));
    }

    #[tokio::test]
    async fn test_run_returns_results() {
        let (client_end, server_end) = duplex(64 * 1024);
        let client = client_over(client_end);
        let (server, _server_inbox) = MessageChannel::open(server_end, "client");

        server
            .send(&Message::GameEnd {
                scores: vec![],
                winners: vec![2],
            })
            .unwrap();

        let final_state = tokio::time::timeout(Duration::from_secs(5), client.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(final_state.results.map(|r| r.winners), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_step_stops_when_server_leaves() {
        let (client_end, server_end) = duplex(64 * 1024);
        let mut client = client_over(client_end);
        drop(server_end);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut rng = StdRng::seed_from_u64(5);
        assert!(!client.step(0.0, &mut rng).unwrap());
        assert!(!client.is_connected());
    }
}
