//! Client timing constants and the remembered server address.

use log::{debug, warn};
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

/// File holding the last server address, next to the executable's working
/// directory.
pub const SERVER_ADDRESS_FILE: &str = "ip.txt";

pub const DEFAULT_SERVER_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a connection attempt may take before giving up.
    pub connect_grace: Duration,
    /// Server silence after which the connection counts as lost.
    pub client_timeout: Duration,
    /// Heartbeat period while waiting in the lobby.
    pub heartbeat_period: Duration,
    /// Position report period during a round.
    pub position_period: Duration,
    /// How long each broadcast message stays on screen.
    pub broadcast_duration: Duration,
    /// Fraction of the distance to the server position covered per update.
    pub interpolation_factor: f32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_grace: Duration::from_secs(5),
            client_timeout: Duration::from_secs(2),
            heartbeat_period: Duration::from_millis(500),
            position_period: Duration::from_millis(50),
            broadcast_duration: Duration::from_secs(2),
            interpolation_factor: 0.1,
        }
    }
}

/// Reads the remembered server address from `path`.
///
/// A missing, unreadable or unparsable file is replaced with one holding the
/// loopback address, which is then returned.
pub fn load_server_ip(path: impl AsRef<Path>) -> IpAddr {
    let path = path.as_ref();

    match fs::read_to_string(path) {
        Ok(contents) => match contents.trim().parse() {
            Ok(ip) => {
                debug!("Using server address {} from {}", ip, path.display());
                return ip;
            }
            Err(e) => warn!("Ignoring bad address in {}: {}", path.display(), e),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to read {}: {}", path.display(), e),
    }

    if let Err(e) = store_server_ip(path, DEFAULT_SERVER_IP) {
        warn!("Failed to write {}: {}", path.display(), e);
    }
    DEFAULT_SERVER_IP
}

pub fn store_server_ip(path: impl AsRef<Path>, ip: IpAddr) -> io::Result<()> {
    fs::write(path, ip.to_string())
}
