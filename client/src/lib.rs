//! # Survival Game Client Library
//!
//! Headless client core for the survival platformer. Rendering, input
//! devices and audio belong to the embedding game; this crate keeps the
//! connection alive and turns server packets into a state the game can read.
//!
//! ## Architecture Overview
//!
//! ### Poll-Driven Networking
//! The embedding game calls [`network::ServerConnection::update`] once per
//! frame. Each call reads at most one packet, never waits on the socket, and
//! sends whatever periodic update is due: a heartbeat every half second in
//! the lobby, local positions at 20Hz during a round.
//!
//! ### Server Authority
//! The server owns every position. Local players are driven by the game and
//! reported upwards; remote players are pulled a tenth of the way towards
//! each authoritative snapshot, which hides jitter from irregular tick
//! timing without ever extrapolating.
//!
//! ### Failure as State
//! A connection that cannot be opened within five seconds ends up
//! [`network::ConnectionState::Failed`]; two seconds without hearing from the
//! server end up [`network::ConnectionState::Lost`]. Neither is an error the
//! caller has to propagate.
//!
//! ## Module Organization
//!
//! - `config`: timing constants and the remembered server address file
//! - `game`: [`game::ClientState`], the projection of server state
//! - `network`: [`network::ServerConnection`] and connection errors
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::ServerConnection;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr = "127.0.0.1:50000".parse().unwrap();
//!     let mut connection = ServerConnection::connect(addr, ClientConfig::default(), false).await;
//!
//!     while connection.is_connected() && !connection.game().is_finished() {
//!         connection.update(Duration::from_millis(16));
//!         tokio::time::sleep(Duration::from_millis(16)).await;
//!     }
//! }
//! ```

pub mod config;
pub mod game;
pub mod network;
