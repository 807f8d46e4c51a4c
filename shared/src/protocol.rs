//! Wire protocol between the survival server and its clients.
//!
//! Every packet starts with a one-byte tag (the variant's declaration index)
//! followed by the variant's fields in declaration order. Server-originated
//! and client-originated packets are separate enumerations whose tag values
//! overlap; a packet is only ever decoded as the type its direction implies.
//!
//! Encoding is bincode with varint integers, so small tags, identifiers and
//! collection lengths occupy a single byte. Strings and lists carry a length
//! prefix. Decoding never reads past the supplied buffer: a short payload
//! surfaces as [`DecodeError::Truncated`].

use crate::{Action, GamesWon, PlayerIdentifier};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest encoded packet either side will produce or accept.
pub const MAX_PACKET_SIZE: usize = 16 * 1024;

const SERVER_TAG_COUNT: u8 = 15;
const CLIENT_TAG_COUNT: u8 = 9;

/// Identifier and display name, as listed in `InitialState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub identifier: PlayerIdentifier,
    pub name: String,
}

/// Identifier and authoritative position of a single player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerPosition {
    pub identifier: PlayerIdentifier,
    pub x: f32,
    pub y: f32,
}

/// Packets sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerPacket {
    BroadcastMessage {
        message: String,
    },
    InitialState {
        seed: u32,
        players: Vec<PlayerSummary>,
    },
    StartGame,
    PlayerEvent {
        identifier: PlayerIdentifier,
        action: Action,
    },
    PlayerRealtimeChange {
        identifier: PlayerIdentifier,
        action: Action,
        enabled: bool,
    },
    PlayerConnect {
        identifier: PlayerIdentifier,
    },
    PlayerDisconnect {
        identifier: PlayerIdentifier,
    },
    AcceptCoopPartner {
        identifier: PlayerIdentifier,
    },
    SpawnSelf {
        identifier: PlayerIdentifier,
    },
    UpdateClientState {
        players: Vec<PlayerPosition>,
    },
    UpdateDangerTime {
        seconds: f32,
    },
    GamesWonUpdated {
        identifier: PlayerIdentifier,
        games_won: GamesWon,
    },
    PlayerDied {
        identifier: PlayerIdentifier,
    },
    MissionSuccess {
        winner: PlayerIdentifier,
    },
    SpawnPickup {
        kind: u8,
        x: f32,
        y: f32,
    },
}

/// Packets sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    StillHereUpdate {
        identifiers: Vec<PlayerIdentifier>,
    },
    RequestStartGame,
    PlayerEvent {
        identifier: PlayerIdentifier,
        action: Action,
    },
    PlayerRealtimeChange {
        identifier: PlayerIdentifier,
        action: Action,
        enabled: bool,
    },
    RequestCoopPartner,
    PositionUpdate {
        positions: Vec<PlayerPosition>,
    },
    GameEvent {
        action: Action,
        x: f32,
        y: f32,
    },
    UpdateGamesWon {
        identifier: PlayerIdentifier,
        games_won: GamesWon,
    },
    Quit,
}

impl ServerPacket {
    pub fn tag(&self) -> u8 {
        match self {
            Self::BroadcastMessage { .. } => 0,
            Self::InitialState { .. } => 1,
            Self::StartGame => 2,
            Self::PlayerEvent { .. } => 3,
            Self::PlayerRealtimeChange { .. } => 4,
            Self::PlayerConnect { .. } => 5,
            Self::PlayerDisconnect { .. } => 6,
            Self::AcceptCoopPartner { .. } => 7,
            Self::SpawnSelf { .. } => 8,
            Self::UpdateClientState { .. } => 9,
            Self::UpdateDangerTime { .. } => 10,
            Self::GamesWonUpdated { .. } => 11,
            Self::PlayerDied { .. } => 12,
            Self::MissionSuccess { .. } => 13,
            Self::SpawnPickup { .. } => 14,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes, SERVER_TAG_COUNT)
    }
}

impl ClientPacket {
    pub fn tag(&self) -> u8 {
        match self {
            Self::StillHereUpdate { .. } => 0,
            Self::RequestStartGame => 1,
            Self::PlayerEvent { .. } => 2,
            Self::PlayerRealtimeChange { .. } => 3,
            Self::RequestCoopPartner => 4,
            Self::PositionUpdate { .. } => 5,
            Self::GameEvent { .. } => 6,
            Self::UpdateGamesWon { .. } => 7,
            Self::Quit => 8,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes, CLIENT_TAG_COUNT)
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_PACKET_SIZE as u64)
        .with_little_endian()
        .with_varint_encoding()
        .reject_trailing_bytes()
}

fn encode<T: Serialize>(packet: &T) -> Result<Vec<u8>, EncodeError> {
    wire_options().serialize(packet).map_err(|e| match *e {
        bincode::ErrorKind::SizeLimit => EncodeError::TooLarge {
            limit: MAX_PACKET_SIZE,
        },
        other => EncodeError::Serialize(other.to_string()),
    })
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8], tag_count: u8) -> Result<T, DecodeError> {
    // Tags stay below the varint escape markers, so the first byte is the tag.
    match bytes.first() {
        None => return Err(DecodeError::Empty),
        Some(&tag) if tag >= tag_count => return Err(DecodeError::UnknownTag { tag }),
        Some(_) => {}
    }

    wire_options().deserialize(bytes).map_err(|e| match *e {
        bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            DecodeError::Truncated { len: bytes.len() }
        }
        bincode::ErrorKind::SizeLimit => DecodeError::TooLarge {
            limit: MAX_PACKET_SIZE,
        },
        other => DecodeError::Malformed(other.to_string()),
    })
}

/// Errors produced while decoding a packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload had no bytes, not even a tag.
    Empty,
    /// The tag does not name any packet of the expected direction.
    UnknownTag { tag: u8 },
    /// The payload ended before the tag's fixed layout was complete.
    Truncated { len: usize },
    /// A length prefix asked for more data than any packet may hold.
    TooLarge { limit: usize },
    /// Invalid field contents (bad UTF-8, bad bool, trailing bytes, ...).
    Malformed(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty packet"),
            Self::UnknownTag { tag } => write!(f, "unknown packet tag: {tag}"),
            Self::Truncated { len } => write!(f, "packet truncated after {len} bytes"),
            Self::TooLarge { limit } => write!(f, "packet exceeds {limit} byte limit"),
            Self::Malformed(reason) => write!(f, "malformed packet: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors produced while encoding a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    TooLarge { limit: usize },
    Serialize(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { limit } => write!(f, "packet exceeds {limit} byte limit"),
            Self::Serialize(reason) => write!(f, "failed to serialize packet: {reason}"),
        }
    }
}

impl std::error::Error for EncodeError {}
