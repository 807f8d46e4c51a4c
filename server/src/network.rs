//! Server task: owns the listening socket and every peer on one tokio task.

use crate::acceptor::TcpAcceptor;
use crate::config::ServerConfig;
use crate::game::GameServer;
use crate::random::RandomService;
use log::{debug, error, info};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Largest elapsed time fed into one step; longer stalls are not replayed.
const MAX_STEP: Duration = Duration::from_secs(1);

/// Handle to a running server task.
///
/// Dropping the handle asks the loop to stop but does not wait for it; call
/// [`ServerHandle::shutdown`] to stop and join.
pub struct ServerHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Binds the listening socket and spawns the server loop.
    pub async fn start(config: ServerConfig) -> io::Result<Self> {
        let acceptor = TcpAcceptor::bind(config.bind_addr, config.max_outbound_bytes)?;
        let local_addr = acceptor.local_addr();
        let random = RandomService::from_entropy();
        info!("Server starting on {} (seed {})", local_addr, random.seed());

        let running = Arc::new(AtomicBool::new(true));
        let server = GameServer::new(config, acceptor, random);
        let task = tokio::spawn(run(server, Arc::clone(&running)));

        Ok(Self {
            local_addr,
            running,
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the loop to stop and waits until it has exited.
    pub async fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Server task panicked: {}", e);
            }
        }
        info!("Server on {} stopped", self.local_addr);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

async fn run(mut server: GameServer<TcpAcceptor>, running: Arc<AtomicBool>) {
    let mut timer = interval(server.config().loop_sleep);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_step = Instant::now();

    while running.load(Ordering::Acquire) {
        timer.tick().await;

        let now = Instant::now();
        let mut dt = now - last_step;
        last_step = now;

        if dt > MAX_STEP {
            debug!("Loop stalled for {:?}, capping step", dt);
            dt = MAX_STEP;
        }

        server.step(dt);
    }

    debug!(
        "Server loop exiting with {} connected peers",
        server.session().connected_players
    );
}
