//! Client side of the connection.
//!
//! [`ServerConnection`] is polled once per frame from the caller's update
//! loop. It never waits on the socket: each `update` reads at most one
//! packet, and a backlog drains over the following frames.

use crate::config::ClientConfig;
use crate::game::ClientState;
use log::{debug, info, warn};
use shared::transport::{FramedStream, SendStatus};
use shared::{Action, ClientPacket, GamesWon, PlayerIdentifier, ServerPacket};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    /// The connection could not be established within the grace period.
    Failed,
    /// The server went silent or closed the connection.
    Lost,
}

#[derive(Debug)]
pub enum ConnectError {
    Timeout { addr: SocketAddr, after: Duration },
    Io(io::Error),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { addr, after } => {
                write!(f, "could not connect to {addr} within {after:?}")
            }
            Self::Io(e) => write!(f, "could not connect: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for ConnectError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Opens a framed connection, giving up after `grace`.
pub async fn open_stream(addr: SocketAddr, grace: Duration) -> Result<FramedStream, ConnectError> {
    match timeout(grace, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(FramedStream::new(stream)),
        Ok(Err(e)) => Err(ConnectError::Io(e)),
        Err(_) => Err(ConnectError::Timeout { addr, after: grace }),
    }
}

pub struct ServerConnection {
    stream: Option<FramedStream>,
    state: ConnectionState,
    config: ClientConfig,
    game: ClientState,
    /// The server runs in this process; quitting is implied by shutting it down
    hosting: bool,
    time_since_last_packet: Duration,
    tick_elapsed: Duration,
}

impl ServerConnection {
    /// Connects to `addr`. Failure is not an error here; it leaves the
    /// connection in [`ConnectionState::Failed`].
    pub async fn connect(addr: SocketAddr, config: ClientConfig, hosting: bool) -> Self {
        let mut connection = Self {
            stream: None,
            state: ConnectionState::Connecting,
            game: ClientState::new(&config),
            config,
            hosting,
            time_since_last_packet: Duration::ZERO,
            tick_elapsed: Duration::ZERO,
        };

        info!("Connecting to {}...", addr);
        match open_stream(addr, connection.config.connect_grace).await {
            Ok(stream) => {
                info!("Connected to {}", addr);
                connection.stream = Some(stream);
                connection.state = ConnectionState::Connected;
            }
            Err(e) => {
                warn!("{}", e);
                connection.state = ConnectionState::Failed;
            }
        }
        connection
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn game(&self) -> &ClientState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut ClientState {
        &mut self.game
    }

    /// One frame of network work: read at most one packet, expire broadcasts
    /// and send whatever periodic update is due.
    pub fn update(&mut self, dt: Duration) {
        if !self.is_connected() {
            return;
        }

        self.receive_packet();
        if !self.is_connected() {
            return;
        }

        self.game.update_broadcasts(dt);
        self.tick_elapsed += dt;

        if self.game.lobby {
            if self.tick_elapsed > self.config.heartbeat_period {
                let identifiers = self.game.local_identifiers.clone();
                self.send(&ClientPacket::StillHereUpdate { identifiers });
                self.tick_elapsed = Duration::ZERO;
            }
        } else {
            while let Some(action) = self.game.poll_game_action() {
                self.send(&ClientPacket::GameEvent {
                    action: action.action_type.as_action(),
                    x: action.x,
                    y: action.y,
                });
            }

            if self.tick_elapsed > self.config.position_period {
                let positions = self.game.local_positions();
                self.send(&ClientPacket::PositionUpdate { positions });
                self.tick_elapsed = Duration::ZERO;
            }
        }

        self.time_since_last_packet += dt;

        if let Some(stream) = &mut self.stream {
            if let Err(e) = stream.flush() {
                debug!("Flush failed: {}", e);
                self.lose_connection();
            }
        }
    }

    fn receive_packet(&mut self) {
        let Some(stream) = &mut self.stream else {
            return;
        };

        match stream.try_recv_frame() {
            Ok(Some(bytes)) => {
                self.time_since_last_packet = Duration::ZERO;
                match ServerPacket::decode(&bytes) {
                    Ok(packet) => self.game.apply(packet),
                    Err(e) => warn!("Dropping malformed packet from server: {}", e),
                }
            }
            Ok(None) => {
                if self.time_since_last_packet > self.config.client_timeout {
                    warn!("Lost connection to the server");
                    self.lose_connection();
                }
            }
            Err(e) => {
                warn!("Lost connection to the server: {}", e);
                self.lose_connection();
            }
        }
    }

    fn lose_connection(&mut self) {
        self.state = ConnectionState::Lost;
        self.stream = None;
    }

    fn send(&mut self, packet: &ClientPacket) {
        let Some(stream) = &mut self.stream else {
            return;
        };

        let payload = match packet.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode packet: {}", e);
                return;
            }
        };

        match stream.send_frame(&payload) {
            Ok(SendStatus::Queued) => {}
            Ok(SendStatus::Dropped) => debug!("Outbound queue full, packet dropped"),
            Err(e) => {
                warn!("Send failed: {}", e);
                self.lose_connection();
            }
        }
    }

    pub fn request_start_game(&mut self) {
        self.send(&ClientPacket::RequestStartGame);
    }

    /// Asks for a second local player; only one partner is allowed.
    pub fn request_coop_partner(&mut self) {
        if self.game.local_identifiers.len() == 1 {
            self.send(&ClientPacket::RequestCoopPartner);
        }
    }

    pub fn send_player_event(&mut self, identifier: PlayerIdentifier, action: Action) {
        self.send(&ClientPacket::PlayerEvent { identifier, action });
    }

    pub fn send_realtime_change(
        &mut self,
        identifier: PlayerIdentifier,
        action: Action,
        enabled: bool,
    ) {
        self.send(&ClientPacket::PlayerRealtimeChange {
            identifier,
            action,
            enabled,
        });
    }

    pub fn send_games_won(&mut self, identifier: PlayerIdentifier, games_won: GamesWon) {
        self.send(&ClientPacket::UpdateGamesWon {
            identifier,
            games_won,
        });
    }

    /// Tells the server this client is leaving. Hosts skip this: their
    /// server goes away with them.
    pub fn quit(&mut self) {
        if self.hosting || !self.is_connected() {
            return;
        }

        self.send(&ClientPacket::Quit);
        if let Some(stream) = &mut self.stream {
            if let Err(e) = stream.flush() {
                debug!("Flush before quitting failed: {}", e);
            }
        }
        self.stream = None;
        self.state = ConnectionState::Lost;
        info!("Left the server");
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        self.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{GameAction, GameActionType};
    use tokio::net::TcpListener;
    use tokio::time::sleep;
    use tokio_test::assert_ok;

    async fn accept_pair(config: ClientConfig) -> (ServerConnection, FramedStream) {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = listener.local_addr().unwrap();

        let (connection, accepted) =
            tokio::join!(ServerConnection::connect(addr, config, false), listener.accept());
        let (stream, _) = assert_ok!(accepted);
        (connection, FramedStream::new(stream))
    }

    async fn recv_client_packet(stream: &mut FramedStream) -> ClientPacket {
        for _ in 0..200 {
            if let Some(bytes) = stream.try_recv_frame().unwrap() {
                return ClientPacket::decode(&bytes).unwrap();
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("No packet from client");
    }

    /// Queues a packet and keeps flushing until the socket has taken it.
    async fn send_server_packet(stream: &mut FramedStream, packet: ServerPacket) {
        stream.send_frame(&packet.encode().unwrap()).unwrap();
        for _ in 0..200 {
            stream.flush().unwrap();
            if stream.pending_outbound() == 0 {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("Packet never left the server stream");
    }

    #[tokio::test]
    async fn test_connect_failure_sets_failed() {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connection = ServerConnection::connect(addr, ClientConfig::default(), false).await;

        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_lobby_heartbeat_lists_local_players() {
        let (mut connection, mut server) = accept_pair(ClientConfig::default()).await;
        send_server_packet(&mut server, ServerPacket::SpawnSelf { identifier: 5 }).await;

        for _ in 0..50 {
            connection.update(Duration::from_millis(20));
            sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(connection.game().local_identifiers, vec![5]);
        assert_eq!(
            recv_client_packet(&mut server).await,
            ClientPacket::StillHereUpdate {
                identifiers: vec![5]
            }
        );
    }

    #[tokio::test]
    async fn test_silence_loses_connection() {
        let (mut connection, _server) = accept_pair(ClientConfig::default()).await;

        connection.update(Duration::from_millis(1500));
        assert!(connection.is_connected());
        connection.update(Duration::from_millis(1500));
        connection.update(Duration::from_millis(10));

        assert_eq!(connection.state(), ConnectionState::Lost);
    }

    #[tokio::test]
    async fn test_in_game_sends_events_then_positions() {
        let config = ClientConfig {
            client_timeout: Duration::from_secs(60),
            ..ClientConfig::default()
        };
        let (mut connection, mut server) = accept_pair(config).await;
        send_server_packet(&mut server, ServerPacket::SpawnSelf { identifier: 1 }).await;
        send_server_packet(&mut server, ServerPacket::StartGame).await;

        for _ in 0..20 {
            connection.update(Duration::from_millis(1));
            if !connection.game().lobby {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(!connection.game().lobby);

        connection.game_mut().set_local_position(1, 3.0, 4.0);
        connection
            .game_mut()
            .queue_game_action(GameAction::new(GameActionType::EnemyExplode, 9.0, 8.0));
        connection.update(Duration::from_millis(60));

        assert_eq!(
            recv_client_packet(&mut server).await,
            ClientPacket::GameEvent {
                action: 0,
                x: 9.0,
                y: 8.0,
            }
        );
        match recv_client_packet(&mut server).await {
            ClientPacket::PositionUpdate { positions } => {
                assert_eq!(positions.len(), 1);
                assert_eq!((positions[0].x, positions[0].y), (3.0, 4.0));
            }
            other => panic!("Unexpected packet {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drop_sends_quit() {
        let (connection, mut server) = accept_pair(ClientConfig::default()).await;
        drop(connection);

        assert_eq!(recv_client_packet(&mut server).await, ClientPacket::Quit);
    }
}
