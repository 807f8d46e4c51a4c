use crate::acceptor::Acceptor;
use crate::game::{GameServer, Phase};
use log::info;
use shared::ServerPacket;

impl<A: Acceptor> GameServer<A> {
    /// Removes every peer flagged as timed out together with the players it
    /// owns, then tells the remaining peers once per removed peer.
    ///
    /// Listening resumes if this freed capacity while still in the lobby.
    pub fn handle_disconnections(&mut self) {
        let (gone, kept): (Vec<_>, Vec<_>) =
            self.peers.drain(..).partition(|peer| peer.timed_out);
        self.peers = kept;

        if gone.is_empty() {
            return;
        }

        for peer in &gone {
            info!(
                "Removing peer {} ({} players)",
                peer.id,
                peer.player_identifiers.len()
            );

            for &identifier in &peer.player_identifiers {
                if let Some(record) = self.registry.remove(identifier) {
                    if record.is_alive() {
                        self.state.alive_players = self.state.alive_players.saturating_sub(1);
                    }
                    self.state.player_count = self.state.player_count.saturating_sub(1);
                }
                self.send_to_all(&ServerPacket::PlayerDisconnect { identifier });
            }

            self.state.connected_players = self.state.connected_players.saturating_sub(1);
            self.broadcast_message("A player has disconnected");
        }

        if self.state.phase == Phase::Lobby
            && !self.state.is_full()
            && !self.acceptor.is_listening()
        {
            info!("Capacity freed, accepting connections again");
            self.acceptor.set_listening(true);
        }
    }
}
