//! Server configuration.

use shared::transport::DEFAULT_MAX_OUTBOUND;
use shared::{HitPoints, FULL_HIT_POINTS, SERVER_PORT, WORLD_HEIGHT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listening socket binds to. Port 0 picks a free port once
    /// and keeps it for every later re-listen.
    pub bind_addr: SocketAddr,
    /// Connections accepted before the server stops listening.
    pub max_connected_players: usize,
    /// Players a single connection may own (itself plus a co-op partner).
    pub max_local_players: usize,
    /// Silence after which a peer is considered gone.
    pub client_timeout: Duration,
    pub frame_period: Duration,
    pub tick_period: Duration,
    pub danger_period: Duration,
    /// Sleep between server loop iterations.
    pub loop_sleep: Duration,
    /// Players reported below this height fall out of the world and die.
    pub world_height: f32,
    pub full_hit_points: HitPoints,
    /// One in `pickup_chance` enemy explosions drops a pickup.
    pub pickup_chance: u32,
    pub pickup_kinds: u8,
    /// Minimum time between two attacks of the same player.
    pub attack_cooldown: Duration,
    pub max_outbound_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), SERVER_PORT),
            max_connected_players: 15,
            max_local_players: 2,
            client_timeout: Duration::from_secs(2),
            frame_period: Duration::from_secs_f64(1.0 / 60.0),
            tick_period: Duration::from_millis(50),
            danger_period: Duration::from_secs(1),
            loop_sleep: Duration::from_millis(100),
            world_height: WORLD_HEIGHT,
            full_hit_points: FULL_HIT_POINTS,
            pickup_chance: 3,
            pickup_kinds: 3,
            attack_cooldown: Duration::ZERO,
            max_outbound_bytes: DEFAULT_MAX_OUTBOUND,
        }
    }
}

impl ServerConfig {
    pub fn with_addr(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }
}
