use clap::Parser;
use client::config::{load_server_ip, store_server_ip, ClientConfig, SERVER_ADDRESS_FILE};
use client::network::{ConnectionState, ServerConnection};
use log::{info, warn};
use server::{ServerConfig, ServerHandle};
use shared::SERVER_PORT;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to (defaults to the one in ip.txt)
    #[arg(short = 's', long)]
    server: Option<IpAddr>,

    /// Server port
    #[arg(short, long, default_value_t = SERVER_PORT)]
    port: u16,

    /// Host an embedded server and connect to it
    #[arg(long)]
    host: bool,

    /// Request a co-op partner once in the lobby
    #[arg(long)]
    coop: bool,

    /// Ask the server to start the round after this many seconds in the lobby
    #[arg(long)]
    start_after: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let server_handle = if args.host {
        let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port);
        Some(ServerHandle::start(ServerConfig::with_addr(bind)).await?)
    } else {
        None
    };

    let ip = match (args.host, args.server) {
        (true, _) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        (false, Some(ip)) => {
            if let Err(e) = store_server_ip(SERVER_ADDRESS_FILE, ip) {
                warn!("Failed to remember server address: {}", e);
            }
            ip
        }
        (false, None) => load_server_ip(SERVER_ADDRESS_FILE),
    };

    let mut connection = ServerConnection::connect(
        SocketAddr::new(ip, args.port),
        ClientConfig::default(),
        args.host,
    )
    .await;

    tokio::select! {
        _ = play(&mut connection, &args) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving...");
        }
    }

    connection.quit();
    if let Some(handle) = server_handle {
        handle.shutdown().await;
    }

    Ok(())
}

/// Headless player: wanders left and right until the round is decided or
/// the connection goes away.
async fn play(connection: &mut ServerConnection, args: &Args) {
    let mut frame = interval(Duration::from_millis(16));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let started = Instant::now();
    let mut last_frame = started;
    let mut requested_coop = false;
    let mut requested_start = false;
    let mut last_broadcast: Option<String> = None;

    loop {
        frame.tick().await;
        let now = Instant::now();
        let dt = now - last_frame;
        last_frame = now;

        connection.update(dt);

        match connection.state() {
            ConnectionState::Connected => {}
            ConnectionState::Failed => {
                warn!("Could not connect to the server");
                return;
            }
            ConnectionState::Lost | ConnectionState::Connecting => {
                warn!("Lost connection to the server");
                return;
            }
        }

        let game = connection.game();
        let broadcast = game.current_broadcast().map(str::to_string);
        if broadcast.is_some() && broadcast != last_broadcast {
            info!("Server: {}", broadcast.as_deref().unwrap_or_default());
        }
        last_broadcast = broadcast;

        if let Some(winner) = &game.winner {
            info!("Round over, winner: {}", winner);
            return;
        }

        if game.lobby {
            if args.coop && !requested_coop && game.local_identifiers.len() == 1 {
                connection.request_coop_partner();
                requested_coop = true;
            }
            if let Some(after) = args.start_after {
                if !requested_start && started.elapsed().as_secs_f32() >= after {
                    connection.request_start_game();
                    requested_start = true;
                }
            }
            continue;
        }

        let t = started.elapsed().as_secs_f32();
        let local = connection.game().local_identifiers.clone();
        for (offset, identifier) in local.into_iter().enumerate() {
            let x = 200.0 + 64.0 * offset as f32 + 120.0 * (t + offset as f32).sin();
            connection.game_mut().set_local_position(identifier, x, 600.0);
        }
    }
}
