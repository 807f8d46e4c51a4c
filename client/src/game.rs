use crate::config::ClientConfig;
use log::{debug, info};
use shared::{
    Action, GameAction, GamesWon, PlayerIdentifier, PlayerPosition, ServerPacket, NO_WINNER,
};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Client-side view of one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub identifier: PlayerIdentifier,
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Controlled on this machine; never overwritten by server snapshots
    pub local: bool,
    pub alive: bool,
    pub games_won: GamesWon,
    pub realtime_actions: BTreeMap<Action, bool>,
}

impl PlayerView {
    fn new(identifier: PlayerIdentifier, name: String, local: bool) -> Self {
        Self {
            identifier,
            name,
            x: 0.0,
            y: 0.0,
            local,
            alive: true,
            games_won: 0,
            realtime_actions: BTreeMap::new(),
        }
    }
}

/// Pickup announced by the server, waiting for the gameplay layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickupSpawn {
    pub kind: u8,
    pub x: f32,
    pub y: f32,
}

/// Projection of the server's state as seen by one client.
///
/// Fed with every packet the server sends; the gameplay layer reads players
/// and drains the event queues.
#[derive(Debug)]
pub struct ClientState {
    pub players: BTreeMap<PlayerIdentifier, PlayerView>,
    pub local_identifiers: Vec<PlayerIdentifier>,
    pub seed: Option<u32>,
    pub lobby: bool,
    /// Hazard time accumulated from `UpdateDangerTime`
    pub danger_time: Duration,
    /// Display name of the round winner once announced
    pub winner: Option<String>,
    broadcasts: VecDeque<String>,
    broadcast_elapsed: Duration,
    broadcast_duration: Duration,
    interpolation_factor: f32,
    player_events: VecDeque<(PlayerIdentifier, Action)>,
    pickups: VecDeque<PickupSpawn>,
    game_actions: VecDeque<GameAction>,
}

impl ClientState {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            players: BTreeMap::new(),
            local_identifiers: Vec::new(),
            seed: None,
            lobby: true,
            danger_time: Duration::ZERO,
            winner: None,
            broadcasts: VecDeque::new(),
            broadcast_elapsed: Duration::ZERO,
            broadcast_duration: config.broadcast_duration,
            interpolation_factor: config.interpolation_factor,
            player_events: VecDeque::new(),
            pickups: VecDeque::new(),
            game_actions: VecDeque::new(),
        }
    }

    pub fn apply(&mut self, packet: ServerPacket) {
        match packet {
            ServerPacket::BroadcastMessage { message } => {
                if self.broadcasts.is_empty() {
                    self.broadcast_elapsed = Duration::ZERO;
                }
                self.broadcasts.push_back(message);
            }
            ServerPacket::InitialState { seed, players } => {
                self.seed = Some(seed);
                for summary in players {
                    self.players.insert(
                        summary.identifier,
                        PlayerView::new(summary.identifier, summary.name, false),
                    );
                }
            }
            ServerPacket::StartGame => {
                info!("Round started");
                self.lobby = false;
            }
            ServerPacket::PlayerEvent { identifier, action } => {
                if self.players.contains_key(&identifier) {
                    self.player_events.push_back((identifier, action));
                }
            }
            ServerPacket::PlayerRealtimeChange {
                identifier,
                action,
                enabled,
            } => {
                if let Some(player) = self.players.get_mut(&identifier) {
                    player.realtime_actions.insert(action, enabled);
                }
            }
            ServerPacket::PlayerConnect { identifier } => self.add_player(identifier, false),
            ServerPacket::PlayerDisconnect { identifier } => {
                self.players.remove(&identifier);
                self.local_identifiers.retain(|local| *local != identifier);
            }
            ServerPacket::SpawnSelf { identifier }
            | ServerPacket::AcceptCoopPartner { identifier } => {
                self.add_player(identifier, true);
                if !self.local_identifiers.contains(&identifier) {
                    self.local_identifiers.push(identifier);
                }
            }
            ServerPacket::UpdateClientState { players } => {
                if !self.lobby {
                    self.apply_snapshot(&players);
                }
            }
            ServerPacket::UpdateDangerTime { seconds } => {
                self.danger_time += Duration::from_secs_f32(seconds.max(0.0));
            }
            ServerPacket::GamesWonUpdated {
                identifier,
                games_won,
            } => {
                if let Some(player) = self.players.get_mut(&identifier) {
                    player.games_won = games_won;
                }
            }
            ServerPacket::PlayerDied { identifier } => {
                if let Some(player) = self.players.get_mut(&identifier) {
                    player.alive = false;
                }
            }
            ServerPacket::MissionSuccess { winner } => {
                let name = self.winner_name(winner);
                info!("Round won by {}", name);
                self.winner = Some(name);
            }
            ServerPacket::SpawnPickup { kind, x, y } => {
                self.pickups.push_back(PickupSpawn { kind, x, y });
            }
        }
    }

    fn add_player(&mut self, identifier: PlayerIdentifier, local: bool) {
        let player = self
            .players
            .entry(identifier)
            .or_insert_with(|| PlayerView::new(identifier, format!("Player {identifier}"), local));
        player.local = local;
    }

    /// Blends remote players towards the authoritative positions instead of
    /// snapping to them.
    fn apply_snapshot(&mut self, positions: &[PlayerPosition]) {
        for position in positions {
            let Some(player) = self.players.get_mut(&position.identifier) else {
                continue;
            };
            if player.local {
                continue;
            }

            player.x += (position.x - player.x) * self.interpolation_factor;
            player.y += (position.y - player.y) * self.interpolation_factor;
        }
    }

    pub fn winner_name(&self, winner: PlayerIdentifier) -> String {
        if winner == NO_WINNER {
            return "Nobody".to_string();
        }
        self.players
            .get(&winner)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| format!("Player {winner}"))
    }

    /// Expires the current broadcast once it has been shown long enough.
    pub fn update_broadcasts(&mut self, dt: Duration) {
        if self.broadcasts.is_empty() {
            return;
        }

        self.broadcast_elapsed += dt;
        if self.broadcast_elapsed > self.broadcast_duration {
            if let Some(expired) = self.broadcasts.pop_front() {
                debug!("Broadcast expired: {}", expired);
            }
            self.broadcast_elapsed = Duration::ZERO;
        }
    }

    pub fn current_broadcast(&self) -> Option<&str> {
        self.broadcasts.front().map(String::as_str)
    }

    /// Moves a locally controlled player. Remote players are ignored.
    pub fn set_local_position(&mut self, identifier: PlayerIdentifier, x: f32, y: f32) {
        if let Some(player) = self.players.get_mut(&identifier).filter(|p| p.local) {
            player.x = x;
            player.y = y;
        }
    }

    pub fn local_positions(&self) -> Vec<PlayerPosition> {
        self.local_identifiers
            .iter()
            .filter_map(|identifier| self.players.get(identifier))
            .map(|player| PlayerPosition {
                identifier: player.identifier,
                x: player.x,
                y: player.y,
            })
            .collect()
    }

    pub fn queue_game_action(&mut self, action: GameAction) {
        self.game_actions.push_back(action);
    }

    /// Takes the oldest queued game action; each is handed out once.
    pub fn poll_game_action(&mut self) -> Option<GameAction> {
        self.game_actions.pop_front()
    }

    pub fn poll_player_event(&mut self) -> Option<(PlayerIdentifier, Action)> {
        self.player_events.pop_front()
    }

    pub fn poll_pickup(&mut self) -> Option<PickupSpawn> {
        self.pickups.pop_front()
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{GameActionType, PlayerSummary};

    fn joined_state() -> ClientState {
        let mut state = ClientState::new(&ClientConfig::default());
        state.apply(ServerPacket::InitialState {
            seed: 99,
            players: vec![PlayerSummary {
                identifier: 1,
                name: "Player 1".to_string(),
            }],
        });
        state.apply(ServerPacket::SpawnSelf { identifier: 2 });
        state
    }

    #[test]
    fn test_join_handshake() {
        let state = joined_state();

        assert_eq!(state.seed, Some(99));
        assert_eq!(state.local_identifiers, vec![2]);
        assert!(!state.players[&1].local);
        assert!(state.players[&2].local);
        assert!(state.lobby);
    }

    #[test]
    fn test_snapshot_ignored_in_lobby() {
        let mut state = joined_state();
        state.apply(ServerPacket::UpdateClientState {
            players: vec![PlayerPosition {
                identifier: 1,
                x: 100.0,
                y: 100.0,
            }],
        });

        assert_eq!(state.players[&1].x, 0.0);
    }

    #[test]
    fn test_remote_players_are_interpolated() {
        let mut state = joined_state();
        state.apply(ServerPacket::StartGame);

        let snapshot = ServerPacket::UpdateClientState {
            players: vec![
                PlayerPosition {
                    identifier: 1,
                    x: 100.0,
                    y: -50.0,
                },
                PlayerPosition {
                    identifier: 2,
                    x: 500.0,
                    y: 500.0,
                },
            ],
        };
        state.set_local_position(2, 7.0, 8.0);
        state.apply(snapshot.clone());

        assert_approx_eq!(state.players[&1].x, 10.0);
        assert_approx_eq!(state.players[&1].y, -5.0);
        assert_eq!((state.players[&2].x, state.players[&2].y), (7.0, 8.0));

        state.apply(snapshot);
        assert_approx_eq!(state.players[&1].x, 19.0);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut state = joined_state();
        state.apply(ServerPacket::PlayerConnect { identifier: 3 });
        state.apply(ServerPacket::AcceptCoopPartner { identifier: 4 });

        assert_eq!(state.players.len(), 4);
        assert_eq!(state.local_identifiers, vec![2, 4]);

        state.apply(ServerPacket::PlayerDisconnect { identifier: 3 });
        state.apply(ServerPacket::PlayerDisconnect { identifier: 4 });
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.local_identifiers, vec![2]);
    }

    #[test]
    fn test_winner_names() {
        let mut state = joined_state();
        assert_eq!(state.winner_name(NO_WINNER), "Nobody");

        state.apply(ServerPacket::MissionSuccess { winner: 1 });
        assert_eq!(state.winner.as_deref(), Some("Player 1"));
        assert!(state.is_finished());
    }

    #[test]
    fn test_broadcast_queue_expires_in_order() {
        let mut state = ClientState::new(&ClientConfig::default());
        state.apply(ServerPacket::BroadcastMessage {
            message: "New player!".to_string(),
        });
        state.apply(ServerPacket::BroadcastMessage {
            message: "A player has disconnected".to_string(),
        });

        state.update_broadcasts(Duration::from_millis(1500));
        assert_eq!(state.current_broadcast(), Some("New player!"));

        state.update_broadcasts(Duration::from_millis(600));
        assert_eq!(state.current_broadcast(), Some("A player has disconnected"));

        state.update_broadcasts(Duration::from_millis(2100));
        assert_eq!(state.current_broadcast(), None);
    }

    #[test]
    fn test_danger_time_accumulates() {
        let mut state = joined_state();
        state.apply(ServerPacket::UpdateDangerTime { seconds: 1.0 });
        state.apply(ServerPacket::UpdateDangerTime { seconds: 1.0 });

        assert_eq!(state.danger_time, Duration::from_secs(2));
    }

    #[test]
    fn test_game_actions_polled_once() {
        let mut state = ClientState::new(&ClientConfig::default());
        state.queue_game_action(GameAction::new(GameActionType::EnemyExplode, 1.0, 2.0));

        assert!(state.poll_game_action().is_some());
        assert!(state.poll_game_action().is_none());
    }

    #[test]
    fn test_events_and_flags_for_known_players_only() {
        let mut state = joined_state();
        state.apply(ServerPacket::PlayerEvent {
            identifier: 1,
            action: 3,
        });
        state.apply(ServerPacket::PlayerEvent {
            identifier: 9,
            action: 3,
        });
        state.apply(ServerPacket::PlayerRealtimeChange {
            identifier: 1,
            action: 0,
            enabled: true,
        });
        state.apply(ServerPacket::PlayerDied { identifier: 1 });
        state.apply(ServerPacket::GamesWonUpdated {
            identifier: 1,
            games_won: 3,
        });

        assert_eq!(state.poll_player_event(), Some((1, 3)));
        assert_eq!(state.poll_player_event(), None);
        let player = &state.players[&1];
        assert_eq!(player.realtime_actions.get(&0), Some(&true));
        assert!(!player.alive);
        assert_eq!(player.games_won, 3);
    }

    #[test]
    fn test_pickups_are_queued() {
        let mut state = joined_state();
        state.apply(ServerPacket::SpawnPickup {
            kind: 2,
            x: 64.0,
            y: 128.0,
        });

        assert_eq!(
            state.poll_pickup(),
            Some(PickupSpawn {
                kind: 2,
                x: 64.0,
                y: 128.0,
            })
        );
    }
}
