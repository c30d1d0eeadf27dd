//! # Balloon Server Library
//!
//! Authoritative server for the balloon-popping match. Clients connect over
//! TCP, pick a color, confirm they are ready and then pop balloons; the
//! server owns every rule decision and streams the results back.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The match itself with no I/O: players, colors, the phase machine,
//! balloon spawning and movement, scoring.
//!
//! ### State Module (`state`)
//! Wraps the match and the client registry in one lock. Every update and the
//! broadcast it causes happen under a single acquisition.
//!
//! ### Session Module (`session`)
//! One task per connection, driving that player's lobby and in-game state.
//!
//! ### Election Module (`election`)
//! When the last player confirms, several sessions may notice at once. An
//! atomic gate lets exactly one of them start the game loop.
//!
//! ### Game Loop Module (`game_loop`)
//! Fixed-rate ticks: spawn, move, broadcast deltas, end the round.
//!
//! ### Network Module (`network`)
//! The TCP listener that turns connections into sessions.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new("127.0.0.1:55556", GameConfig::default()).await?;
//!
//!     // Returns once the match has ended and results are flushed
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod election;
pub mod game;
pub mod game_loop;
pub mod network;
pub mod session;
pub mod state;
