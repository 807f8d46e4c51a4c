//! Fan-out of server packets to ready peers.
//!
//! Packets are encoded once and the same bytes are queued on every ready
//! connection. Delivery is best effort: a peer whose queue is full misses
//! the packet and catches up with the next state snapshot.

use crate::acceptor::Acceptor;
use crate::game::{GameServer, Phase};
use crate::peer::PeerId;
use log::{debug, warn};
use shared::{Action, PlayerIdentifier, PlayerSummary, ServerPacket};

impl<A: Acceptor> GameServer<A> {
    /// Sends `packet` to every ready peer.
    pub fn send_to_all(&mut self, packet: &ServerPacket) {
        self.send_filtered(packet, None);
    }

    /// Sends `packet` to every ready peer except `excluded`.
    pub fn send_to_all_except(&mut self, packet: &ServerPacket, excluded: PeerId) {
        self.send_filtered(packet, Some(excluded));
    }

    fn send_filtered(&mut self, packet: &ServerPacket, excluded: Option<PeerId>) {
        let payload = match packet.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode broadcast with tag {}: {}", packet.tag(), e);
                return;
            }
        };

        for peer in self
            .peers
            .iter_mut()
            .filter(|peer| peer.ready && Some(peer.id) != excluded)
        {
            peer.send_encoded(&payload);
        }
    }

    /// Human readable notice shown as a toast on every client.
    pub fn broadcast_message(&mut self, message: &str) {
        debug!("Broadcast: {}", message);
        self.send_to_all(&ServerPacket::BroadcastMessage {
            message: message.to_string(),
        });
    }

    pub fn notify_player_spawn(&mut self, identifier: PlayerIdentifier) {
        self.send_to_all(&ServerPacket::PlayerConnect { identifier });
    }

    pub fn notify_player_event(&mut self, identifier: PlayerIdentifier, action: Action) {
        self.send_to_all(&ServerPacket::PlayerEvent { identifier, action });
    }

    pub fn notify_player_realtime_change(
        &mut self,
        identifier: PlayerIdentifier,
        action: Action,
        enabled: bool,
    ) {
        self.send_to_all(&ServerPacket::PlayerRealtimeChange {
            identifier,
            action,
            enabled,
        });
    }

    /// Periodic replication of authoritative positions.
    ///
    /// In the lobby the snapshot is empty and serves only as a keep-alive.
    pub fn update_client_state(&mut self) {
        let players = match self.state.phase {
            Phase::Lobby => Vec::new(),
            Phase::InProgress | Phase::Finished => self.registry.positions(),
        };
        self.send_to_all(&ServerPacket::UpdateClientState { players });
    }

    /// Snapshot for a joining peer: the seed and every player owned by a
    /// peer that already completed its handshake.
    pub fn initial_state(&self) -> ServerPacket {
        let players: Vec<PlayerSummary> = self
            .peers
            .iter()
            .filter(|peer| peer.ready)
            .flat_map(|peer| peer.player_identifiers.iter())
            .filter_map(|identifier| self.registry.get(*identifier))
            .map(|record| record.summary())
            .collect();

        ServerPacket::InitialState {
            seed: self.random.seed(),
            players,
        }
    }
}
