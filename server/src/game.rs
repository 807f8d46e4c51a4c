//! Authoritative game server core.
//!
//! [`GameServer`] owns every piece of server state: the listening socket
//! (through its [`Acceptor`]), the peer sessions, the player registry and the
//! round state. It is driven by calling [`GameServer::step`] with the time
//! elapsed since the previous call; the network task does that in a loop.
//! The component operations (accept, dispatch, broadcast, reap) are spread
//! over the sibling modules as further `impl` blocks.

use crate::acceptor::Acceptor;
use crate::config::ServerConfig;
use crate::peer::{PeerId, PeerSession};
use crate::random::RandomService;
use crate::registry::PlayerRegistry;
use crate::scheduler::TickScheduler;
use log::{debug, info};
use shared::{PlayerIdentifier, ServerPacket, NO_WINNER};
use std::time::Duration;

/// Phase of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Players join, nothing is simulated yet
    Lobby,
    InProgress,
    /// A winner was announced
    Finished,
}

/// Round bookkeeping shared by the dispatcher and the scheduler.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    /// Number of connected peers
    pub connected_players: usize,
    /// Number of registered players across all peers
    pub player_count: usize,
    pub alive_players: usize,
    pub max_connected_players: usize,
}

impl SessionState {
    pub fn new(max_connected_players: usize) -> Self {
        Self {
            phase: Phase::Lobby,
            connected_players: 0,
            player_count: 0,
            alive_players: 0,
            max_connected_players,
        }
    }

    pub fn is_lobby(&self) -> bool {
        self.phase == Phase::Lobby
    }

    pub fn is_full(&self) -> bool {
        self.connected_players >= self.max_connected_players
    }
}

pub struct GameServer<A: Acceptor> {
    pub(crate) config: ServerConfig,
    pub(crate) acceptor: A,
    pub(crate) peers: Vec<PeerSession<A::Link>>,
    pub(crate) registry: PlayerRegistry,
    pub(crate) state: SessionState,
    pub(crate) scheduler: TickScheduler,
    pub(crate) random: RandomService,
    /// Server clock, advanced by `step`
    pub(crate) now: Duration,
    next_peer_id: PeerId,
}

impl<A: Acceptor> GameServer<A> {
    /// Creates the server and starts listening.
    pub fn new(config: ServerConfig, mut acceptor: A, random: RandomService) -> Self {
        acceptor.set_listening(true);

        Self {
            state: SessionState::new(config.max_connected_players),
            scheduler: TickScheduler::new(&config),
            config,
            acceptor,
            peers: Vec::new(),
            registry: PlayerRegistry::new(),
            random,
            now: Duration::ZERO,
            next_peer_id: 1,
        }
    }

    /// Runs one server loop iteration: accept, drain packets (reaping dead
    /// peers), then whatever periodic work `dt` made due.
    pub fn step(&mut self, dt: Duration) {
        self.now += dt;

        self.try_accept();
        self.handle_incoming_packets();

        let work = self
            .scheduler
            .advance(dt, self.state.phase == Phase::InProgress);

        for _ in 0..work.ticks {
            self.tick();
        }
        for _ in 0..work.danger_ticks {
            self.update_dangers();
        }

        for peer in &mut self.peers {
            peer.flush();
        }
    }

    /// Simulation tick: replicate positions, then check for a last survivor.
    pub fn tick(&mut self) {
        self.update_client_state();

        if self.state.phase == Phase::InProgress && self.state.alive_players <= 1 {
            let winner = self.find_winner_identity();
            info!(
                "Round over, winner: {}",
                if winner == NO_WINNER {
                    "nobody".to_string()
                } else {
                    winner.to_string()
                }
            );

            self.send_to_all(&ServerPacket::MissionSuccess { winner });
            self.state.phase = Phase::Finished;
        }
    }

    /// First registered player with hit points left, or [`NO_WINNER`].
    pub fn find_winner_identity(&self) -> PlayerIdentifier {
        self.registry.first_alive().unwrap_or(NO_WINNER)
    }

    /// Keeps every client's hazard process on the same cadence.
    pub fn update_dangers(&mut self) {
        let seconds = self.config.danger_period.as_secs_f32();
        debug!("Danger tick ({:.2}s)", seconds);
        self.send_to_all(&ServerPacket::UpdateDangerTime { seconds });
    }

    pub(crate) fn next_peer_id(&mut self) -> PeerId {
        let id = self.next_peer_id;
        self.next_peer_id += 1;
        id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.registry
    }

    pub fn peers(&self) -> &[PeerSession<A::Link>] {
        &self.peers
    }

    pub fn peer_mut(&mut self, index: usize) -> &mut PeerSession<A::Link> {
        &mut self.peers[index]
    }

    pub fn acceptor(&self) -> &A {
        &self.acceptor
    }

    pub fn acceptor_mut(&mut self) -> &mut A {
        &mut self.acceptor
    }

    pub fn seed(&self) -> u32 {
        self.random.seed()
    }

    pub fn now(&self) -> Duration {
        self.now
    }
}
