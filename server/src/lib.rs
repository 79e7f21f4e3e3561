//! # Tic-Tac-Toe Server Library
//!
//! Server side of the multiplayer tic-tac-toe service. Players connect over
//! TCP, claim a nickname, challenge each other and play matches in which the
//! server is the sole authority over the board. A second port relays opaque
//! video frames between the two players of a pairing.
//!
//! ## Architecture
//!
//! Every accepted socket is served by its own task. Shared state lives in a
//! handful of registries behind `tokio` locks:
//!
//! - [`registry::ConnectionRegistry`]: nickname to player handle
//! - [`challenge::ChallengeBroker`]: at most one pending challenge per target
//! - [`matches::MatchRegistry`]: live matches, at most one per player
//! - [`relay::VideoRelay`]: video pairings and per-connection frame queues
//!
//! Outbound game messages are queued on a per-connection channel and written
//! by a dedicated task, so no socket write ever happens under a lock.
//!
//! ### Lock Order
//! A match's own lock is always taken before the match registry's lock,
//! never the other way around.
//!
//! ## Module Organization
//!
//! - `config`: command line and environment settings
//! - `network`: the two listeners and their accept loops
//! - `connection`: per-connection game protocol handling
//! - `video`: per-connection video handshake and frame forwarding
//! - `game`: board rules and the match state machine
//! - `player`, `registry`, `challenge`, `matches`, `relay`: shared components
//! - `state`: the bundle of components handed to every task
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::Config;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(&Config::ephemeral()).await?;
//!     println!("game port: {}", server.game_addr()?);
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod challenge;
pub mod config;
pub mod connection;
pub mod game;
pub mod matches;
pub mod network;
pub mod player;
pub mod registry;
pub mod relay;
pub mod state;
pub mod video;
