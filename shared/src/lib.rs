//! Types and plumbing shared by the balloon server and its clients.
//!
//! - [`codec`] turns byte payloads into length-prefixed frames and back
//! - [`protocol`] defines the JSON messages carried inside those frames
//! - [`channel`] wraps one stream connection with a background receive task
//! - [`dispatch`] drains a channel's inbox on the owner's own tick

use serde::{Deserialize, Serialize};

pub mod channel;
pub mod codec;
pub mod dispatch;
pub mod protocol;

pub use channel::{ChannelError, Inbox, MessageChannel};
pub use codec::FrameError;
pub use dispatch::{DispatchReport, Dispatcher};
pub use protocol::{
    BalloonId, BalloonPosition, Color, Message, PlayerId, PlayerInfo, PlayerScore, PopEvent,
};

pub const WORLD_WIDTH: f32 = 1280.0;
pub const WORLD_HEIGHT: f32 = 720.0;
pub const BALLOON_RADIUS: f32 = 32.0;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;
pub const DEFAULT_PORT: u16 = 55556;

/// A balloon floating through the playfield. Positive y points up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balloon {
    pub id: BalloonId,
    pub color: Color,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    #[serde(default)]
    pub popped: bool,
}

impl Balloon {
    pub fn new(id: BalloonId, color: Color, x: f32, y: f32, vel_x: f32, vel_y: f32) -> Self {
        Self {
            id,
            color,
            x,
            y,
            vel_x,
            vel_y,
            popped: false,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
    }

    /// True once the whole balloon has left the playfield on any side.
    pub fn is_out_of_bounds(&self) -> bool {
        self.y - BALLOON_RADIUS > WORLD_HEIGHT
            || self.y + BALLOON_RADIUS < 0.0
            || self.x + BALLOON_RADIUS < 0.0
            || self.x - BALLOON_RADIUS > WORLD_WIDTH
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        let dx = x - self.x;
        let dy = y - self.y;
        dx * dx + dy * dy <= BALLOON_RADIUS * BALLOON_RADIUS
    }

    pub fn position(&self) -> BalloonPosition {
        BalloonPosition {
            id: self.id,
            x: self.x,
            y: self.y,
        }
    }
}
