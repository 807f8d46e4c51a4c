//! Inbound packet handling.
//!
//! Every ready peer is drained completely each loop iteration. Handlers run
//! one at a time against the registry, so no handler ever observes a
//! half-applied packet. Peers are only flagged here; removal happens in the
//! reaper once the whole pass is over.

use crate::acceptor::Acceptor;
use crate::game::{GameServer, Phase};
use crate::peer::Link;
use log::{debug, info, warn};
use shared::{
    is_below_world, Action, ClientPacket, GameActionType, GamesWon, PlayerAction,
    PlayerIdentifier, PlayerPosition, ServerPacket,
};

impl<A: Acceptor> GameServer<A> {
    /// Drains and dispatches all buffered packets, then reaps every peer that
    /// quit, went silent or misbehaved.
    pub fn handle_incoming_packets(&mut self) {
        let timeout = self.config.client_timeout;

        for index in 0..self.peers.len() {
            if !self.peers[index].ready {
                continue;
            }

            while !self.peers[index].timed_out {
                match self.peers[index].link.try_recv() {
                    Ok(Some(bytes)) => {
                        let now = self.now;
                        self.peers[index].touch(now);

                        match ClientPacket::decode(&bytes) {
                            Ok(packet) => self.handle_packet(index, packet),
                            Err(e) => {
                                warn!(
                                    "Malformed packet from peer {}: {}, disconnecting",
                                    self.peers[index].id, e
                                );
                                self.peers[index].timed_out = true;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!("Peer {} connection lost: {}", self.peers[index].id, e);
                        self.peers[index].timed_out = true;
                    }
                }
            }

            let peer = &mut self.peers[index];
            if !peer.timed_out && peer.is_silent(self.now, timeout) {
                info!("Peer {} timed out", peer.id);
                peer.timed_out = true;
            }
        }

        if self.peers.iter().any(|peer| peer.timed_out) {
            self.handle_disconnections();
        }
    }

    /// Applies one decoded packet from the peer at `index`.
    pub fn handle_packet(&mut self, index: usize, packet: ClientPacket) {
        match packet {
            ClientPacket::Quit => {
                info!("Peer {} quit", self.peers[index].id);
                self.peers[index].timed_out = true;
            }
            ClientPacket::StillHereUpdate { .. } => {}
            ClientPacket::PlayerEvent { identifier, action } => {
                self.handle_player_event(identifier, action);
            }
            ClientPacket::PlayerRealtimeChange {
                identifier,
                action,
                enabled,
            } => {
                if let Some(record) = self.registry.get_mut(identifier) {
                    record.realtime_actions.insert(action, enabled);
                }
                self.notify_player_realtime_change(identifier, action, enabled);
            }
            ClientPacket::RequestCoopPartner => self.handle_coop_request(index),
            ClientPacket::PositionUpdate { positions } => {
                self.handle_position_update(index, &positions);
            }
            ClientPacket::GameEvent { action, x, y } => self.handle_game_event(index, action, x, y),
            ClientPacket::RequestStartGame => self.handle_start_request(),
            ClientPacket::UpdateGamesWon {
                identifier,
                games_won,
            } => self.handle_games_won(identifier, games_won),
        }
    }

    fn handle_player_event(&mut self, identifier: PlayerIdentifier, action: Action) {
        if !self.registry.contains(identifier) {
            debug!("Dropping event {} for unknown player {}", action, identifier);
            return;
        }

        let is_attack = PlayerAction::from_action(action).is_some_and(PlayerAction::is_attack);

        if is_attack {
            if !self.attack_eligible(identifier) {
                debug!("Player {} attack rejected", identifier);
                return;
            }
            let now = self.now;
            if let Some(record) = self.registry.get_mut(identifier) {
                record.last_attack = Some(now);
            }
        }

        self.notify_player_event(identifier, action);
    }

    /// A player may attack once its cooldown has elapsed.
    pub fn attack_eligible(&self, identifier: PlayerIdentifier) -> bool {
        match self.registry.get(identifier).and_then(|record| record.last_attack) {
            Some(last) => self.now >= last + self.config.attack_cooldown,
            None => true,
        }
    }

    fn handle_coop_request(&mut self, index: usize) {
        if self.state.phase != Phase::Lobby {
            warn!(
                "Peer {} requested a co-op partner outside the lobby",
                self.peers[index].id
            );
            return;
        }
        if self.peers[index].player_identifiers.len() >= self.config.max_local_players {
            warn!(
                "Peer {} already controls {} players",
                self.peers[index].id,
                self.peers[index].player_identifiers.len()
            );
            return;
        }

        let Some(identifier) = self.registry.register(self.config.full_hit_points) else {
            warn!("No free player identifier for co-op partner");
            return;
        };

        let peer = &mut self.peers[index];
        peer.player_identifiers.push(identifier);
        peer.send(&ServerPacket::AcceptCoopPartner { identifier });
        let peer_id = peer.id;

        self.send_to_all_except(&ServerPacket::PlayerConnect { identifier }, peer_id);

        self.state.player_count += 1;
        self.state.alive_players += 1;
        info!("Peer {} added co-op partner {}", peer_id, identifier);
    }

    fn handle_position_update(&mut self, index: usize, positions: &[PlayerPosition]) {
        for position in positions {
            if !self.peers[index].owns(position.identifier) {
                warn!(
                    "Peer {} sent a position for player {} it does not control",
                    self.peers[index].id, position.identifier
                );
                continue;
            }

            let world_height = self.config.world_height;
            let in_round = self.state.phase == Phase::InProgress;
            let Some(record) = self.registry.get_mut(position.identifier) else {
                continue;
            };

            record.x = position.x;
            record.y = position.y;

            if in_round && record.is_alive() && is_below_world(record.y, world_height) {
                record.hit_points = 0;
                let identifier = record.identifier;

                self.state.alive_players = self.state.alive_players.saturating_sub(1);
                info!(
                    "Player {} fell out of the world, {} alive",
                    identifier, self.state.alive_players
                );
                self.send_to_all(&ServerPacket::PlayerDied { identifier });
            }
        }
    }

    fn handle_game_event(&mut self, index: usize, action: Action, x: f32, y: f32) {
        // Every client witnesses the same explosion; only the first peer's
        // report may drop a pickup.
        if index != 0 {
            return;
        }

        if GameActionType::from_action(action) == Some(GameActionType::EnemyExplode)
            && self.random.one_in(self.config.pickup_chance)
        {
            let kind = self.random.below(self.config.pickup_kinds);
            debug!("Spawning pickup {} at ({:.1}, {:.1})", kind, x, y);
            self.send_to_all(&ServerPacket::SpawnPickup { kind, x, y });
        }
    }

    fn handle_start_request(&mut self) {
        if self.state.phase != Phase::Lobby {
            debug!("Ignoring start request, round already started");
            return;
        }

        info!("Starting round with {} players", self.state.player_count);
        self.acceptor.set_listening(false);
        self.send_to_all(&ServerPacket::StartGame);
        self.state.phase = Phase::InProgress;
    }

    fn handle_games_won(&mut self, identifier: PlayerIdentifier, games_won: GamesWon) {
        let Some(record) = self.registry.get_mut(identifier) else {
            warn!("Games won update for unknown player {}", identifier);
            return;
        };

        record.games_won = games_won;
        self.send_to_all(&ServerPacket::GamesWonUpdated {
            identifier,
            games_won,
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::game::Phase;
    use crate::testing::{connect, push, sent_to, test_server, MockAcceptor};
    use crate::GameServer;
    use shared::{ClientPacket, PlayerAction, PlayerPosition, ServerPacket};
    use std::time::Duration;

    fn lobby_with(peers: usize) -> GameServer<MockAcceptor> {
        let mut server = test_server(ServerConfig::default());
        for _ in 0..peers {
            connect(&mut server);
        }
        for index in 0..peers {
            sent_to(&mut server, index);
        }
        server
    }

    #[test]
    fn test_quit_removes_peer_in_same_cycle() {
        let mut server = lobby_with(2);
        push(&mut server, 1, ClientPacket::Quit);

        server.handle_incoming_packets();

        assert_eq!(server.peers().len(), 1);
        assert_eq!(server.session().connected_players, 1);
        assert!(!server.registry().contains(2));

        let packets = sent_to(&mut server, 0);
        let disconnects: Vec<_> = packets
            .iter()
            .filter(|p| matches!(p, ServerPacket::PlayerDisconnect { .. }))
            .collect();
        assert_eq!(disconnects, vec![&ServerPacket::PlayerDisconnect { identifier: 2 }]);
    }

    #[test]
    fn test_heartbeat_prevents_timeout() {
        let mut server = lobby_with(2);

        server.now = Duration::from_millis(1500);
        push(&mut server, 0, ClientPacket::StillHereUpdate { identifiers: vec![1] });
        server.handle_incoming_packets();
        assert_eq!(server.peers().len(), 2);

        server.now = Duration::from_millis(2500);
        server.handle_incoming_packets();

        assert_eq!(server.peers().len(), 1);
        assert_eq!(server.peers()[0].player_identifiers, vec![1]);
    }

    #[test]
    fn test_malformed_packet_disconnects_peer() {
        let mut server = lobby_with(2);
        server.peer_mut(1).link.push_raw(vec![5, 1]);

        server.handle_incoming_packets();

        assert_eq!(server.peers().len(), 1);
        assert!(server.registry().contains(1));
        assert!(!server.registry().contains(2));
    }

    #[test]
    fn test_closed_link_disconnects_peer() {
        let mut server = lobby_with(2);
        server.peer_mut(0).link.close();

        server.handle_incoming_packets();

        assert_eq!(server.peers().len(), 1);
        assert_eq!(server.peers()[0].player_identifiers, vec![2]);
    }

    #[test]
    fn test_player_event_is_relayed() {
        let mut server = lobby_with(2);
        push(
            &mut server,
            0,
            ClientPacket::PlayerEvent {
                identifier: 1,
                action: PlayerAction::Jump.as_action(),
            },
        );

        server.handle_incoming_packets();

        let expected = ServerPacket::PlayerEvent {
            identifier: 1,
            action: 2,
        };
        assert_eq!(sent_to(&mut server, 0), vec![expected.clone()]);
        assert_eq!(sent_to(&mut server, 1), vec![expected]);
    }

    #[test]
    fn test_attack_stamps_and_respects_cooldown() {
        let config = ServerConfig {
            attack_cooldown: Duration::from_millis(500),
            ..ServerConfig::default()
        };
        let mut server = test_server(config);
        connect(&mut server);
        sent_to(&mut server, 0);
        let attack = ClientPacket::PlayerEvent {
            identifier: 1,
            action: PlayerAction::Attack.as_action(),
        };

        server.now = Duration::from_millis(100);
        server.handle_packet(0, attack.clone());
        server.now = Duration::from_millis(300);
        server.handle_packet(0, attack.clone());
        server.now = Duration::from_millis(700);
        server.handle_packet(0, attack);

        assert_eq!(sent_to(&mut server, 0).len(), 2);
        assert_eq!(
            server.registry().get(1).unwrap().last_attack,
            Some(Duration::from_millis(700))
        );
    }

    #[test]
    fn test_events_for_unknown_player_are_dropped() {
        let mut server = lobby_with(2);

        for action in [PlayerAction::Attack, PlayerAction::Jump, PlayerAction::MoveLeft] {
            server.handle_packet(
                0,
                ClientPacket::PlayerEvent {
                    identifier: 42,
                    action: action.as_action(),
                },
            );
        }

        assert!(sent_to(&mut server, 0).is_empty());
        assert!(sent_to(&mut server, 1).is_empty());
        assert!(!server.registry().contains(42));
    }

    #[test]
    fn test_realtime_change_recorded_and_relayed() {
        let mut server = lobby_with(2);
        push(
            &mut server,
            1,
            ClientPacket::PlayerRealtimeChange {
                identifier: 2,
                action: PlayerAction::MoveRight.as_action(),
                enabled: true,
            },
        );

        server.handle_incoming_packets();

        assert_eq!(
            sent_to(&mut server, 0),
            vec![ServerPacket::PlayerRealtimeChange {
                identifier: 2,
                action: 1,
                enabled: true,
            }]
        );
        let record = server.registry().get(2).unwrap();
        assert_eq!(record.realtime_actions.get(&1), Some(&true));
    }

    #[test]
    fn test_coop_partner_flow() {
        let mut server = lobby_with(2);
        push(&mut server, 0, ClientPacket::RequestCoopPartner);

        server.handle_incoming_packets();

        assert_eq!(
            sent_to(&mut server, 0),
            vec![ServerPacket::AcceptCoopPartner { identifier: 3 }]
        );
        assert_eq!(
            sent_to(&mut server, 1),
            vec![ServerPacket::PlayerConnect { identifier: 3 }]
        );
        assert_eq!(server.peers()[0].player_identifiers, vec![1, 3]);
        assert_eq!(server.session().player_count, 3);
        assert_eq!(server.session().alive_players, 3);
    }

    #[test]
    fn test_coop_partner_limit_and_lobby_only() {
        let mut server = lobby_with(2);
        push(&mut server, 0, ClientPacket::RequestCoopPartner);
        push(&mut server, 0, ClientPacket::RequestCoopPartner);
        server.handle_incoming_packets();
        assert_eq!(server.peers()[0].player_identifiers.len(), 2);

        push(&mut server, 1, ClientPacket::RequestStartGame);
        push(&mut server, 1, ClientPacket::RequestCoopPartner);
        server.handle_incoming_packets();
        assert_eq!(server.peers()[1].player_identifiers, vec![2]);
    }

    #[test]
    fn test_position_update_ownership() {
        let mut server = lobby_with(2);
        push(
            &mut server,
            0,
            ClientPacket::PositionUpdate {
                positions: vec![
                    PlayerPosition {
                        identifier: 1,
                        x: -5.0,
                        y: 40.0,
                    },
                    PlayerPosition {
                        identifier: 2,
                        x: 99.0,
                        y: 99.0,
                    },
                    PlayerPosition {
                        identifier: 77,
                        x: 1.0,
                        y: 1.0,
                    },
                ],
            },
        );

        server.handle_incoming_packets();

        let first = server.registry().get(1).unwrap();
        assert_eq!((first.x, first.y), (-5.0, 40.0));
        let second = server.registry().get(2).unwrap();
        assert_eq!((second.x, second.y), (0.0, 0.0));
        assert_eq!(server.registry().len(), 2);
    }

    #[test]
    fn test_falling_kills_once() {
        let mut server = lobby_with(3);
        push(&mut server, 0, ClientPacket::RequestStartGame);
        server.handle_incoming_packets();
        sent_to(&mut server, 1);

        let fall = ClientPacket::PositionUpdate {
            positions: vec![PlayerPosition {
                identifier: 1,
                x: 0.0,
                y: server.config().world_height + 1.0,
            }],
        };
        push(&mut server, 0, fall.clone());
        push(&mut server, 0, fall);
        server.handle_incoming_packets();

        assert_eq!(
            sent_to(&mut server, 1),
            vec![ServerPacket::PlayerDied { identifier: 1 }]
        );
        assert_eq!(server.registry().get(1).unwrap().hit_points, 0);
        assert_eq!(server.session().alive_players, 2);
    }

    #[test]
    fn test_falling_in_lobby_is_harmless() {
        let mut server = lobby_with(1);
        push(
            &mut server,
            0,
            ClientPacket::PositionUpdate {
                positions: vec![PlayerPosition {
                    identifier: 1,
                    x: 0.0,
                    y: 10_000.0,
                }],
            },
        );

        server.handle_incoming_packets();

        assert!(server.registry().get(1).unwrap().is_alive());
        assert_eq!(server.session().alive_players, 1);
    }

    #[test]
    fn test_start_game_stops_listening_once() {
        let mut server = lobby_with(2);
        push(&mut server, 1, ClientPacket::RequestStartGame);
        push(&mut server, 0, ClientPacket::RequestStartGame);

        server.handle_incoming_packets();

        assert_eq!(server.session().phase, Phase::InProgress);
        assert!(!server.acceptor().listening);
        assert_eq!(sent_to(&mut server, 0), vec![ServerPacket::StartGame]);
    }

    #[test]
    fn test_games_won_updates_registry() {
        let mut server = lobby_with(2);
        push(
            &mut server,
            1,
            ClientPacket::UpdateGamesWon {
                identifier: 2,
                games_won: 4,
            },
        );

        server.handle_incoming_packets();

        assert_eq!(server.registry().get(2).unwrap().games_won, 4);
        assert_eq!(
            sent_to(&mut server, 0),
            vec![ServerPacket::GamesWonUpdated {
                identifier: 2,
                games_won: 4,
            }]
        );
    }

    #[test]
    fn test_pickups_only_from_first_peer() {
        let mut server = lobby_with(2);
        let explosion = ClientPacket::GameEvent {
            action: 0,
            x: 128.0,
            y: 64.0,
        };

        for _ in 0..60 {
            server.handle_packet(1, explosion.clone());
        }
        assert!(sent_to(&mut server, 0).is_empty());

        for _ in 0..60 {
            server.handle_packet(0, explosion.clone());
        }
        let pickups = sent_to(&mut server, 1);
        assert!(!pickups.is_empty());
        assert!(pickups.len() < 60);
        for packet in pickups {
            match packet {
                ServerPacket::SpawnPickup { kind, x, y } => {
                    assert!(kind < server.config().pickup_kinds);
                    assert_eq!((x, y), (128.0, 64.0));
                }
                other => panic!("Unexpected packet {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_game_action_spawns_nothing() {
        let mut server = lobby_with(1);
        for _ in 0..30 {
            server.handle_packet(
                0,
                ClientPacket::GameEvent {
                    action: 9,
                    x: 0.0,
                    y: 0.0,
                },
            );
        }
        assert!(sent_to(&mut server, 0).is_empty());
    }
}
