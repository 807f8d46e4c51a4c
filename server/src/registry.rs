//! Authoritative player state.
//!
//! The registry is the single source of truth for every registered player:
//! position, hit points, name and win count. Clients only ever see
//! projections of it.

use log::info;
use shared::{
    Action, GamesWon, HitPoints, PlayerIdentifier, PlayerPosition, PlayerSummary,
};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub identifier: PlayerIdentifier,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub hit_points: HitPoints,
    pub games_won: GamesWon,
    /// Last known state of each held action, as relayed by the owner.
    pub realtime_actions: BTreeMap<Action, bool>,
    /// Server time of the last accepted attack.
    pub last_attack: Option<Duration>,
}

impl PlayerRecord {
    pub fn new(identifier: PlayerIdentifier, hit_points: HitPoints) -> Self {
        Self {
            identifier,
            name: format!("Player {identifier}"),
            x: 0.0,
            y: 0.0,
            hit_points,
            games_won: 0,
            realtime_actions: BTreeMap::new(),
            last_attack: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hit_points > 0
    }

    pub fn position(&self) -> PlayerPosition {
        PlayerPosition {
            identifier: self.identifier,
            x: self.x,
            y: self.y,
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            identifier: self.identifier,
            name: self.name.clone(),
        }
    }
}

/// Players keyed by identifier, iterated in ascending identifier order.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerIdentifier, PlayerRecord>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
        }
    }

    /// Smallest identifier >= 1 not currently registered.
    pub fn free_identifier(&self) -> Option<PlayerIdentifier> {
        (1..=PlayerIdentifier::MAX).find(|identifier| !self.players.contains_key(identifier))
    }

    /// Allocates a free identifier and registers a fresh record under it.
    pub fn register(&mut self, hit_points: HitPoints) -> Option<PlayerIdentifier> {
        let identifier = self.free_identifier()?;
        self.players
            .insert(identifier, PlayerRecord::new(identifier, hit_points));
        info!("Registered player {}", identifier);
        Some(identifier)
    }

    pub fn remove(&mut self, identifier: PlayerIdentifier) -> Option<PlayerRecord> {
        let removed = self.players.remove(&identifier);
        if removed.is_some() {
            info!("Removed player {}", identifier);
        }
        removed
    }

    pub fn get(&self, identifier: PlayerIdentifier) -> Option<&PlayerRecord> {
        self.players.get(&identifier)
    }

    pub fn get_mut(&mut self, identifier: PlayerIdentifier) -> Option<&mut PlayerRecord> {
        self.players.get_mut(&identifier)
    }

    pub fn contains(&self, identifier: PlayerIdentifier) -> bool {
        self.players.contains_key(&identifier)
    }

    /// One position per registered player, in identifier order.
    pub fn positions(&self) -> Vec<PlayerPosition> {
        self.players.values().map(PlayerRecord::position).collect()
    }

    /// First player, in identifier order, that still has hit points.
    pub fn first_alive(&self) -> Option<PlayerIdentifier> {
        self.players
            .values()
            .find(|record| record.is_alive())
            .map(|record| record.identifier)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
