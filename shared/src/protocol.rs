//! JSON message catalog exchanged between server and clients.
//!
//! Every message is a JSON object whose `action` field names its purpose.
//! Actions this build does not know decode to [`Message::Unknown`] so a newer
//! peer never breaks an older one.

use crate::Balloon;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type PlayerId = u32;
pub type BalloonId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Green, Color::Yellow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "RED",
            Color::Blue => "BLUE",
            Color::Green => "GREEN",
            Color::Yellow => "YELLOW",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown color '{}', expected one of RED, BLUE, GREEN, YELLOW", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub player_id: PlayerId,
    pub color: Option<Color>,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalloonPosition {
    pub id: BalloonId,
    pub x: f32,
    pub y: f32,
}

/// Who popped which balloon during the last tick, and what it was worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopEvent {
    pub balloon_id: BalloonId,
    pub player_id: PlayerId,
    pub delta_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Message {
    // Lobby
    TakenColors {
        colors: Vec<Color>,
        #[serde(default)]
        ready: usize,
    },
    PickColor {
        color: Color,
    },
    ColorAccepted {
        color: Color,
    },
    ColorRejected {
        color: Color,
    },
    Rejected {
        reason: String,
    },
    Ready,
    PlayerReady {
        player_id: PlayerId,
        ready: usize,
        total: usize,
    },
    GameStart {
        players: Vec<PlayerInfo>,
    },

    // Match
    PopBalloon {
        balloon_id: BalloonId,
    },
    StateDelta {
        tick: u32,
        spawned: Vec<Balloon>,
        removed: Vec<BalloonId>,
        moved: Vec<BalloonPosition>,
        popped: Vec<PopEvent>,
        scores: Vec<PlayerScore>,
    },
    GameEnd {
        scores: Vec<PlayerScore>,
        winners: Vec<PlayerId>,
    },
    PlayerLeft {
        player_id: PlayerId,
        freed_color: Option<Color>,
    },

    #[serde(other)]
    Unknown,
}

impl Message {
    /// The `action` tag this message carries on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Message::TakenColors { .. } => "taken_colors",
            Message::PickColor { .. } => "pick_color",
            Message::ColorAccepted { .. } => "color_accepted",
            Message::ColorRejected { .. } => "color_rejected",
            Message::Rejected { .. } => "rejected",
            Message::Ready => "ready",
            Message::PlayerReady { .. } => "player_ready",
            Message::GameStart { .. } => "game_start",
            Message::PopBalloon { .. } => "pop_balloon",
            Message::StateDelta { .. } => "state_delta",
            Message::GameEnd { .. } => "game_end",
            Message::PlayerLeft { .. } => "player_left",
            Message::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::TakenColors {
                colors: vec![Color::Red, Color::Green],
                ready: 1,
            },
            Message::PickColor { color: Color::Blue },
            Message::ColorAccepted { color: Color::Blue },
            Message::ColorRejected { color: Color::Red },
            Message::Rejected {
                reason: "lobby is full".to_string(),
            },
            Message::Ready,
            Message::PlayerReady {
                player_id: 2,
                ready: 1,
                total: 3,
            },
            Message::GameStart {
                players: vec![PlayerInfo {
                    id: 1,
                    color: Color::Yellow,
                }],
            },
            Message::PopBalloon { balloon_id: 12 },
            Message::StateDelta {
                tick: 3,
                spawned: vec![Balloon::new(4, Color::Red, 10.0, 20.0, 0.0, 80.0)],
                removed: vec![1, 2],
                moved: vec![BalloonPosition {
                    id: 4,
                    x: 10.0,
                    y: 40.0,
                }],
                popped: vec![PopEvent {
                    balloon_id: 2,
                    player_id: 1,
                    delta_score: -1,
                }],
                scores: vec![PlayerScore {
                    player_id: 1,
                    color: Some(Color::Red),
                    score: -1,
                }],
            },
            Message::GameEnd {
                scores: vec![],
                winners: vec![1, 3],
            },
            Message::PlayerLeft {
                player_id: 3,
                freed_color: None,
            },
        ]
    }

    #[test]
    fn test_action_matches_wire_tag() {
        for message in sample_messages() {
            let value = serde_json::to_value(&message).unwrap();
            assert_eq!(value["action"], Value::from(message.action()));
        }
    }

    #[test]
    fn test_json_roundtrip_preserves_message() {
        for message in sample_messages() {
            let text = serde_json::to_string(&message).unwrap();
            let decoded: Message = serde_json::from_str(&text).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_pick_color_wire_shape() {
        let value = serde_json::to_value(Message::PickColor {
            color: Color::Yellow,
        })
        .unwrap();
        assert_eq!(value, json!({"action": "pick_color", "color": "YELLOW"}));
    }

    #[test]
    fn test_ready_has_no_fields() {
        let value = serde_json::to_value(Message::Ready).unwrap();
        assert_eq!(value, json!({"action": "ready"}));
    }

    #[test]
    fn test_unknown_action_is_not_an_error() {
        let decoded: Message =
            serde_json::from_str(r#"{"action": "wave_hello", "hand": "left"}"#).unwrap();
        assert_eq!(decoded, Message::Unknown);
    }

    #[test]
    fn test_missing_action_is_an_error() {
        let result: Result<Message, _> = serde_json::from_str(r#"{"color": "RED"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_taken_colors_ready_defaults_to_zero() {
        let decoded: Message =
            serde_json::from_str(r#"{"action": "taken_colors", "colors": ["BLUE"]}"#).unwrap();
        assert_eq!(
            decoded,
            Message::TakenColors {
                colors: vec![Color::Blue],
                ready: 0
            }
        );
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("red".parse::<Color>(), Ok(Color::Red));
        assert_eq!("GREEN".parse::<Color>(), Ok(Color::Green));
        assert!("purple".parse::<Color>().is_err());
        assert_eq!(Color::Yellow.to_string(), "YELLOW");
    }
}
