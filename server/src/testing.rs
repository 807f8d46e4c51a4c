//! In-memory links and acceptor for driving the server core in unit tests.

use crate::acceptor::Acceptor;
use crate::config::ServerConfig;
use crate::game::GameServer;
use crate::peer::Link;
use crate::random::RandomService;
use shared::transport::{SendStatus, TransportError};
use shared::{ClientPacket, ServerPacket};
use std::collections::VecDeque;
use std::io;

#[derive(Debug, Default)]
pub struct MockLink {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    closed: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, packet: &ClientPacket) {
        self.inbound.push_back(packet.encode().unwrap());
    }

    pub fn push_raw(&mut self, bytes: Vec<u8>) {
        self.inbound.push_back(bytes);
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Decodes and clears everything sent so far.
    pub fn take_sent(&mut self) -> Vec<ServerPacket> {
        self.sent
            .drain(..)
            .map(|bytes| ServerPacket::decode(&bytes).unwrap())
            .collect()
    }
}

impl Link for MockLink {
    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.inbound.pop_front() {
            Some(bytes) => Ok(Some(bytes)),
            None if self.closed => Err(TransportError::Closed),
            None => Ok(None),
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<SendStatus, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sent.push(payload.to_vec());
        Ok(SendStatus::Queued)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[derive(Debug, Default)]
pub struct MockAcceptor {
    pub listening: bool,
    pub pending: VecDeque<MockLink>,
}

impl Acceptor for MockAcceptor {
    type Link = MockLink;

    fn set_listening(&mut self, enable: bool) {
        self.listening = enable;
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn try_accept(&mut self) -> io::Result<Option<MockLink>> {
        Ok(self.pending.pop_front())
    }
}

pub fn test_server(config: ServerConfig) -> GameServer<MockAcceptor> {
    GameServer::new(config, MockAcceptor::default(), RandomService::new(1234))
}

/// Queues a fresh connection and runs the acceptor once.
pub fn connect(server: &mut GameServer<MockAcceptor>) -> usize {
    server.acceptor_mut().pending.push_back(MockLink::new());
    server.try_accept();
    server.peers().len() - 1
}

/// Decodes and clears everything sent to the peer at `index`.
pub fn sent_to(server: &mut GameServer<MockAcceptor>, index: usize) -> Vec<ServerPacket> {
    server.peer_mut(index).link.take_sent()
}

pub fn push(server: &mut GameServer<MockAcceptor>, index: usize, packet: ClientPacket) {
    server.peer_mut(index).link.push(&packet);
}
