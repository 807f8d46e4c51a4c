//! Connection acceptor: admits new peers up to capacity.
//!
//! The listening socket is closed while the server is full or a round is in
//! progress and re-opened on the same address once a slot frees up.

use crate::game::GameServer;
use crate::peer::{Link, PeerSession};
use log::{debug, error, info, warn};
use shared::transport::FramedStream;
use shared::ServerPacket;
use std::io;
use std::net::{SocketAddr, TcpListener};
use tokio::net::TcpStream;

/// Source of new connections for the server core.
pub trait Acceptor {
    type Link: Link;

    fn set_listening(&mut self, enable: bool);
    fn is_listening(&self) -> bool;
    /// Returns a pending connection without blocking, if there is one.
    fn try_accept(&mut self) -> io::Result<Option<Self::Link>>;
}

/// Non-blocking TCP listener that hands out [`FramedStream`]s.
pub struct TcpAcceptor {
    bind_addr: SocketAddr,
    listener: Option<TcpListener>,
    listening: bool,
    max_outbound: usize,
}

impl TcpAcceptor {
    /// Binds immediately so that the resolved address (port 0 becomes a real
    /// port) is known before the server starts.
    pub fn bind(addr: SocketAddr, max_outbound: usize) -> io::Result<Self> {
        let listener = Self::open(addr)?;
        let bind_addr = listener.local_addr()?;
        info!("Listening on {}", bind_addr);

        Ok(Self {
            bind_addr,
            listener: Some(listener),
            listening: true,
            max_outbound,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    fn open(addr: SocketAddr) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    fn ensure_open(&mut self) {
        if self.listener.is_some() {
            return;
        }
        match Self::open(self.bind_addr) {
            Ok(listener) => {
                info!("Resumed listening on {}", self.bind_addr);
                self.listener = Some(listener);
            }
            Err(e) => error!("Failed to re-open listener on {}: {}", self.bind_addr, e),
        }
    }
}

impl Acceptor for TcpAcceptor {
    type Link = FramedStream;

    fn set_listening(&mut self, enable: bool) {
        self.listening = enable;
        if enable {
            self.ensure_open();
        } else if self.listener.take().is_some() {
            info!("Stopped listening on {}", self.bind_addr);
        }
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn try_accept(&mut self) -> io::Result<Option<FramedStream>> {
        if !self.listening {
            return Ok(None);
        }
        // A failed re-open is retried on every poll
        self.ensure_open();
        let Some(listener) = &self.listener else {
            return Ok(None);
        };

        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("Accepted connection from {}", addr);
                stream.set_nonblocking(true)?;
                let stream = TcpStream::from_std(stream)?;
                Ok(Some(FramedStream::with_max_outbound(stream, self.max_outbound)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<A: Acceptor> GameServer<A> {
    /// Admits at most one pending connection.
    ///
    /// The newcomer gets a fresh player, the current roster in
    /// `InitialState` and its own `SpawnSelf`; everyone already in the game
    /// learns about it through `PlayerConnect`.
    pub fn try_accept(&mut self) {
        if !self.acceptor.is_listening() {
            return;
        }

        let link = match self.acceptor.try_accept() {
            Ok(Some(link)) => link,
            Ok(None) => return,
            Err(e) => {
                warn!("Accept failed: {}", e);
                return;
            }
        };

        let Some(identifier) = self.registry.register(self.config.full_hit_points) else {
            warn!(
                "No free player identifier, refusing connection from {}",
                link.describe()
            );
            return;
        };

        let peer_id = self.next_peer_id();
        info!(
            "Peer {} connected from {} as player {}",
            peer_id,
            link.describe(),
            identifier
        );

        let mut peer = PeerSession::new(peer_id, link, self.now);
        peer.player_identifiers.push(identifier);

        self.broadcast_message("New player!");

        peer.send(&self.initial_state());
        self.notify_player_spawn(identifier);
        peer.send(&ServerPacket::SpawnSelf { identifier });
        peer.ready = true;
        self.peers.push(peer);

        self.state.connected_players += 1;
        self.state.player_count += 1;
        self.state.alive_players += 1;

        if self.state.is_full() {
            info!(
                "Server full ({} peers), no longer accepting",
                self.state.connected_players
            );
            self.acceptor.set_listening(false);
        }
    }
}
