use clap::Parser;
use log::info;
use server::{ServerConfig, ServerHandle};
use shared::SERVER_PORT;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the listening socket to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = SERVER_PORT)]
    port: u16,

    /// Maximum number of connected peers
    #[arg(short, long, default_value = "15")]
    max_players: usize,

    /// Seconds of silence before a peer is dropped
    #[arg(short, long, default_value = "2.0")]
    timeout: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        max_connected_players: args.max_players,
        client_timeout: Duration::try_from_secs_f64(args.timeout)?,
        ..ServerConfig::with_addr(SocketAddr::new(args.host, args.port))
    };

    info!(
        "Capacity {} peers, client timeout {:?}",
        config.max_connected_players, config.client_timeout
    );

    let handle = ServerHandle::start(config).await?;
    info!("Server running on {}, press Ctrl+C to stop", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    handle.shutdown().await;

    Ok(())
}
