//! Per-connection session state.
//!
//! A [`PeerSession`] exclusively owns its connection (the [`Link`]) and
//! tracks:
//! - Whether the join handshake completed (`ready`)
//! - When the last packet arrived, for timeout detection
//! - Which player identifiers this connection controls (one, or two with a
//!   co-op partner)
//! - Whether it is due for removal (`timed_out`)

use log::{debug, warn};
use shared::transport::{FramedStream, SendStatus, TransportError};
use shared::{PlayerIdentifier, ServerPacket};
use std::time::Duration;

/// Connection seam between the server core and the network.
///
/// Implementations never block: `try_recv` returns `Ok(None)` when no
/// complete packet is available and `send` queues or drops.
pub trait Link {
    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
    fn send(&mut self, payload: &[u8]) -> Result<SendStatus, TransportError>;
    fn flush(&mut self) -> Result<(), TransportError>;
    /// Human readable remote endpoint for logs.
    fn describe(&self) -> String;
}

impl Link for FramedStream {
    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.try_recv_frame()
    }

    fn send(&mut self, payload: &[u8]) -> Result<SendStatus, TransportError> {
        self.send_frame(payload)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        FramedStream::flush(self)
    }

    fn describe(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string())
    }
}

/// Server-assigned handle of a connection, stable for its lifetime.
pub type PeerId = u64;

#[derive(Debug)]
pub struct PeerSession<L> {
    pub id: PeerId,
    pub link: L,
    /// Server time at which the last packet from this peer arrived
    pub last_packet_time: Duration,
    /// Players controlled through this connection
    pub player_identifiers: Vec<PlayerIdentifier>,
    /// Set once the join handshake has been sent
    pub ready: bool,
    /// Set when the peer quit, went silent or misbehaved
    pub timed_out: bool,
}

impl<L: Link> PeerSession<L> {
    /// Creates an unready session whose silence is measured from `now`.
    pub fn new(id: PeerId, link: L, now: Duration) -> Self {
        Self {
            id,
            link,
            last_packet_time: now,
            player_identifiers: Vec::new(),
            ready: false,
            timed_out: false,
        }
    }

    /// Encodes and sends a single packet to this peer only.
    pub fn send(&mut self, packet: &ServerPacket) {
        match packet.encode() {
            Ok(payload) => self.send_encoded(&payload),
            Err(e) => warn!("Failed to encode packet for peer {}: {}", self.id, e),
        }
    }

    /// Sends an already encoded packet. Failures are not retried; a broken
    /// connection marks the session for removal.
    pub fn send_encoded(&mut self, payload: &[u8]) {
        match self.link.send(payload) {
            Ok(SendStatus::Queued) => {}
            Ok(SendStatus::Dropped) => {
                debug!("Dropped packet for slow peer {}", self.id);
            }
            Err(e) => {
                debug!("Send to peer {} failed: {}", self.id, e);
                self.timed_out = true;
            }
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.link.flush() {
            debug!("Flush to peer {} failed: {}", self.id, e);
            self.timed_out = true;
        }
    }

    pub fn owns(&self, identifier: PlayerIdentifier) -> bool {
        self.player_identifiers.contains(&identifier)
    }

    /// Records packet arrival, resetting the silence timer.
    pub fn touch(&mut self, now: Duration) {
        self.last_packet_time = now;
    }

    /// Returns true if nothing arrived for longer than `timeout`.
    pub fn is_silent(&self, now: Duration, timeout: Duration) -> bool {
        now > self.last_packet_time + timeout
    }
}
