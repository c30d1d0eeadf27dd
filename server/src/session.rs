//! Per-connection handler.
//!
//! A session walks its player through `Connected -> ColorPicked -> Ready ->
//! InGame` and ends in `Disconnected` whatever state it was in when the
//! connection dropped.

use crate::config::GameConfig;
use crate::election::{start_if_ready, Election};
use crate::game::{GameError, Phase};
use crate::state::ServerState;
use log::{debug, info, trace, warn};
use shared::{BalloonId, Color, Inbox, Message, MessageChannel, PlayerId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    ColorPicked,
    Ready,
    InGame,
    Disconnected,
}

pub struct Session {
    id: PlayerId,
    channel: Arc<MessageChannel>,
    inbox: Inbox,
    state: Arc<ServerState>,
    config: GameConfig,
    stage: SessionState,
}

impl Session {
    pub fn new(
        id: PlayerId,
        channel: Arc<MessageChannel>,
        inbox: Inbox,
        state: Arc<ServerState>,
        config: GameConfig,
    ) -> Self {
        Self {
            id,
            channel,
            inbox,
            state,
            config,
            stage: SessionState::Connected,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn stage(&self) -> SessionState {
        self.stage
    }

    /// Serves the connection until the peer goes away.
    pub async fn run(mut self) {
        let snapshot = self.state.taken_colors().await;
        self.reply(&snapshot);

        while let Some(message) = self.inbox.recv().await {
            self.handle(message).await;
        }

        self.disconnect().await;
    }

    pub async fn handle(&mut self, message: Message) {
        trace!("Player {} ({:?}) sent {}", self.id, self.stage, message.action());

        match (self.stage, message) {
            (SessionState::Connected | SessionState::ColorPicked, Message::PickColor { color }) => {
                self.pick_color(color).await;
            }
            (SessionState::ColorPicked, Message::Ready) => self.confirm_ready().await,
            (SessionState::Ready | SessionState::InGame, Message::PopBalloon { balloon_id }) => {
                self.pop(balloon_id).await;
            }
            (_, Message::Unknown) => debug!("Player {} sent an unknown action", self.id),
            (stage @ (SessionState::Connected | SessionState::ColorPicked), message) => {
                self.reply(&Message::Rejected {
                    reason: format!("unexpected {} while {:?}", message.action(), stage),
                });
            }
            (stage, message) => {
                warn!(
                    "Player {} sent {} while {:?}, ignoring",
                    self.id,
                    message.action(),
                    stage
                );
            }
        }
    }

    async fn pick_color(&mut self, color: Color) {
        match self.state.assign_color(self.id, color).await {
            Ok(()) => {
                info!("Player {} picked {}", self.id, color);
                self.stage = SessionState::ColorPicked;
            }
            Err(GameError::ColorTaken(color)) => {
                self.reply(&Message::ColorRejected { color });
            }
            Err(e) => self.reply(&Message::Rejected {
                reason: e.to_string(),
            }),
        }
    }

    async fn confirm_ready(&mut self) {
        let can_start = match self.state.set_ready(self.id).await {
            Ok(can_start) => can_start,
            Err(e) => {
                self.reply(&Message::Rejected {
                    reason: e.to_string(),
                });
                return;
            }
        };
        self.stage = SessionState::Ready;

        if can_start {
            match start_if_ready(&self.state, &self.config).await {
                Election::Leader | Election::Follower => self.stage = SessionState::InGame,
                Election::NotReady => {}
            }
        }
    }

    async fn pop(&mut self, balloon_id: BalloonId) {
        self.stage = SessionState::InGame;
        let outcome = self.state.pop_balloon(balloon_id, self.id).await;
        if outcome.hit {
            trace!(
                "Player {} popped balloon {} ({:+})",
                self.id,
                balloon_id,
                outcome.delta_score
            );
        }
    }

    async fn disconnect(&mut self) {
        self.stage = SessionState::Disconnected;
        self.channel.close();

        if self.state.remove_player(self.id).await.is_some() {
            info!("Player {} left", self.id);
        }
        // The lobby may be startable now that a non-ready player is gone
        if self.state.phase().await == Phase::Lobby {
            start_if_ready(&self.state, &self.config).await;
        }
    }

    fn reply(&self, message: &Message) {
        if let Err(e) = self.channel.send(message) {
            debug!("Reply to player {} dropped: {}", self.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    struct Harness {
        state: Arc<ServerState>,
        session: Session,
        _client: MessageChannel,
        client_inbox: Inbox,
    }

    async fn harness(state: &Arc<ServerState>) -> Harness {
        let (server_end, client_end) = duplex(64 * 1024);
        let (server, inbox) = MessageChannel::open(server_end, "server");
        let (client, client_inbox) = MessageChannel::open(client_end, "client");
        let server = Arc::new(server);
        let id = state.join(Arc::clone(&server)).await.unwrap();
        let session = Session::new(id, server, inbox, Arc::clone(state), GameConfig::default());
        Harness {
            state: Arc::clone(state),
            session,
            _client: client,
            client_inbox,
        }
    }

    async fn next_matching(inbox: &mut Inbox, action: &str) -> Message {
        loop {
            let message = inbox.recv().await.expect("channel closed");
            if message.action() == action {
                return message;
            }
        }
    }

    #[tokio::test]
    async fn test_pick_color_advances_stage() {
        let state = Arc::new(ServerState::new());
        let mut h = harness(&state).await;

        h.session.handle(Message::PickColor { color: Color::Red }).await;

        assert_eq!(h.session.stage(), SessionState::ColorPicked);
        assert_eq!(
            next_matching(&mut h.client_inbox, "color_accepted").await,
            Message::ColorAccepted { color: Color::Red }
        );
    }

    #[tokio::test]
    async fn test_taken_color_is_rejected() {
        let state = Arc::new(ServerState::new());
        let mut first = harness(&state).await;
        let mut second = harness(&state).await;

        first.session.handle(Message::PickColor { color: Color::Red }).await;
        second.session.handle(Message::PickColor { color: Color::Red }).await;

        assert_eq!(second.session.stage(), SessionState::Connected);
        assert_eq!(
            next_matching(&mut second.client_inbox, "color_rejected").await,
            Message::ColorRejected { color: Color::Red }
        );
    }

    #[tokio::test]
    async fn test_ready_before_color_is_rejected() {
        let state = Arc::new(ServerState::new());
        let mut h = harness(&state).await;

        h.session.handle(Message::Ready).await;

        assert_eq!(h.session.stage(), SessionState::Connected);
        assert!(matches!(
            next_matching(&mut h.client_inbox, "rejected").await,
            Message::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn test_last_ready_player_starts_match() {
        let state = Arc::new(ServerState::new());
        let mut red = harness(&state).await;
        let mut blue = harness(&state).await;

        red.session.handle(Message::PickColor { color: Color::Red }).await;
        blue.session.handle(Message::PickColor { color: Color::Blue }).await;
        red.session.handle(Message::Ready).await;
        assert_eq!(red.session.stage(), SessionState::Ready);

        blue.session.handle(Message::Ready).await;
        assert_eq!(blue.session.stage(), SessionState::InGame);
        assert!(state.leader().is_claimed());
        assert!(matches!(
            next_matching(&mut red.client_inbox, "game_start").await,
            Message::GameStart { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_action_is_ignored() {
        let state = Arc::new(ServerState::new());
        let mut h = harness(&state).await;

        h.session.handle(Message::Unknown).await;
        assert_eq!(h.session.stage(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_frees_color() {
        let state = Arc::new(ServerState::new());
        let mut leaver = harness(&state).await;
        let mut stayer = harness(&state).await;
        leaver.session.handle(Message::PickColor { color: Color::Green }).await;

        leaver.session.disconnect().await;

        assert_eq!(leaver.session.stage(), SessionState::Disconnected);
        assert_eq!(leaver.state.inspect(|game| game.player_count()).await, 1);
        assert_eq!(
            next_matching(&mut stayer.client_inbox, "player_left").await,
            Message::PlayerLeft {
                player_id: leaver.session.id(),
                freed_color: Some(Color::Green)
            }
        );
    }
}
