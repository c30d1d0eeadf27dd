//! # Balloon Client Library
//!
//! Client-side plumbing for the balloon-popping match. The server is
//! authoritative: the client keeps a mirror of what it has been told and
//! sends only intentions (pick a color, confirm, pop a balloon).
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The local mirror of the match: colors, roster, balloons and scores, plus
//! the hit test a renderer calls on a click (`balloon_at`) and the simple
//! automated player the headless binary runs.
//!
//! ### Network Module (`network`)
//! Owns the TCP connection. Each frame it drains the inbox through a
//! dispatcher, moves balloons locally and sends whatever the player decided.
//! Receiving happens on a background task, so a slow frame never stalls the
//! socket and a quiet socket never stalls a frame.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::Color;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(
//!         "127.0.0.1:55556",
//!         Some(Color::Red),
//!         Duration::from_millis(16),
//!         0.3,
//!     )
//!     .await?;
//!
//!     let final_state = client.run().await?;
//!     println!("Final score: {}", final_state.my_score());
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
