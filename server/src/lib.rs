//! # Survival Game Server Library
//!
//! Authoritative server for the "last player standing" platformer. The server
//! holds the only true copy of every player's position, hit points and win
//! count; clients send their local view and receive the server's version back.
//!
//! ## Core Responsibilities
//!
//! ### Connection Lifecycle
//! - Accepting connections up to a configured capacity, then pausing the
//!   listening socket until a slot frees up
//! - Assigning each new player the smallest free identifier
//! - Detecting silent, closed or misbehaving peers and removing them together
//!   with every player they own
//!
//! ### Replication
//! Player events and realtime toggles are relayed to every ready peer as they
//! arrive. Positions are replicated as full snapshots at the tick rate, so a
//! missed packet is corrected by the next one.
//!
//! ### Round Logic
//! The round starts on request, players die by falling out of the world, and
//! the last survivor is announced with `MissionSuccess`.
//!
//! ## Architecture
//!
//! ### Single Task
//! One tokio task owns the listening socket, every peer socket and the
//! player registry. Sockets are polled without waiting, each loop iteration
//! runs accept, dispatch, periodic work and reaping in that order, and then
//! the task sleeps for a coarse interval. Nothing is shared, so nothing is
//! locked.
//!
//! ### Time
//! The core never reads the wall clock. [`GameServer::step`] is handed the
//! elapsed time and fixed-step timers turn it into frames, ticks and danger
//! ticks. Tests drive the same code with synthetic time.
//!
//! ## Module Organization
//!
//! - `game`: [`GameServer`], round phases and the tick/win logic
//! - `acceptor`: the [`Acceptor`] seam and its TCP implementation
//! - `dispatcher`: decoding and handling of client packets
//! - `broadcast`: fan-out of server packets to ready peers
//! - `reaper`: removal of timed-out peers
//! - `scheduler`: frame, tick and danger timers
//! - `peer`, `registry`: per-connection and per-player state
//! - `network`: [`ServerHandle`], the spawned loop and cooperative shutdown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{ServerConfig, ServerHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::with_addr("0.0.0.0:50000".parse()?);
//!     let handle = ServerHandle::start(config).await?;
//!     println!("Listening on {}", handle.local_addr());
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod acceptor;
pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod game;
pub mod network;
pub mod peer;
pub mod random;
pub mod reaper;
pub mod registry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use acceptor::{Acceptor, TcpAcceptor};
pub use config::ServerConfig;
pub use game::{GameServer, Phase, SessionState};
pub use network::ServerHandle;
