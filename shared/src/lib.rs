//! Types shared by the survival server and its clients.
//!
//! The wire protocol lives in [`protocol`], length-prefixed framing in
//! [`frame`] and the non-blocking framed TCP stream both sides poll in
//! [`transport`]. This root module holds the small gameplay vocabulary the
//! protocol speaks in: identifiers, actions and world constants.

pub mod frame;
pub mod protocol;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use protocol::{ClientPacket, DecodeError, PlayerPosition, PlayerSummary, ServerPacket};

/// Default TCP port the server listens on.
pub const SERVER_PORT: u16 = 50000;

const TILE_SIZE: f32 = 64.0;
pub const WORLD_HEIGHT: f32 = 24.0 * TILE_SIZE;

/// Hit points every player record starts with.
pub const FULL_HIT_POINTS: HitPoints = 100;

/// Identifier of a player, unique among registered players. `0` is never
/// assigned and doubles as the "no winner" marker in `MissionSuccess`.
pub type PlayerIdentifier = u8;
pub type HitPoints = i32;
pub type GamesWon = i32;
pub type Action = u8;

/// Identifier sent in `MissionSuccess` when nobody survived.
pub const NO_WINNER: PlayerIdentifier = 0;

/// Player inputs replicated between peers, either as one-shot events or as
/// held realtime toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlayerAction {
    MoveLeft = 0,
    MoveRight = 1,
    Jump = 2,
    Attack = 3,
}

impl PlayerAction {
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            0 => Some(Self::MoveLeft),
            1 => Some(Self::MoveRight),
            2 => Some(Self::Jump),
            3 => Some(Self::Attack),
            _ => None,
        }
    }

    pub fn as_action(self) -> Action {
        self as Action
    }

    /// Whether the server has to validate and apply this action before relaying it.
    pub fn is_attack(self) -> bool {
        matches!(self, Self::Attack)
    }
}

/// Kind of a world event reported by a client's gameplay layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameActionType {
    EnemyExplode = 0,
}

impl GameActionType {
    pub fn from_action(action: Action) -> Option<Self> {
        match action {
            0 => Some(Self::EnemyExplode),
            _ => None,
        }
    }

    pub fn as_action(self) -> Action {
        self as Action
    }
}

/// One-shot gameplay event queued for transmission to the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    pub action_type: GameActionType,
    pub x: f32,
    pub y: f32,
}

impl GameAction {
    pub fn new(action_type: GameActionType, x: f32, y: f32) -> Self {
        Self { action_type, x, y }
    }
}

/// Whether a reported position lies below the bottom of the world.
pub fn is_below_world(y: f32, world_height: f32) -> bool {
    y > world_height
}
