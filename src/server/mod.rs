//! TCP listener for MPD clients
//!
//! Accepts connections, enforces the connection limit and spawns one
//! [`Session`] task per client. All sessions share the core, the command
//! registry and the event bus.

mod session;

pub use session::{Session, MAX_LINE_LENGTH};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::SharedBus;
use crate::config::Config;
use crate::engine::SharedCore;
use crate::protocol::CommandRegistry;

/// Sent to a client refused because the server is full
const TOO_MANY_CONNECTIONS: &str = "ACK [0@0] {} Too many connections\n";

/// Listener settings taken from [`Config`]
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub password: Option<Arc<str>>,
    pub max_connections: usize,
    pub connection_timeout: Duration,
}

impl From<&Config> for ServerSettings {
    fn from(config: &Config) -> Self {
        Self {
            bind_address: config.bind_address(),
            password: config.password().map(Arc::from),
            max_connections: config.max_connections,
            connection_timeout: config.connection_timeout(),
        }
    }
}

/// State shared by the accept loop and every session it spawns
struct Shared {
    settings: ServerSettings,
    core: SharedCore,
    registry: Arc<CommandRegistry>,
    bus: SharedBus,
}

#[derive(Default)]
struct ServerState {
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

pub struct MpdServer {
    shared: Arc<Shared>,
    state: RwLock<ServerState>,
    /// Parent token from the application; each start gets a child
    parent: CancellationToken,
    shutdown: RwLock<CancellationToken>,
}

impl MpdServer {
    pub fn new(
        settings: ServerSettings,
        core: SharedCore,
        registry: Arc<CommandRegistry>,
        bus: SharedBus,
        shutdown: CancellationToken,
    ) -> Self {
        let token = shutdown.child_token();
        Self {
            shared: Arc::new(Shared {
                settings,
                core,
                registry,
                bus,
            }),
            state: RwLock::new(ServerState::default()),
            parent: shutdown,
            shutdown: RwLock::new(token),
        }
    }

    /// Address the listener is bound to, once started
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.state.read().await.local_addr
    }

    async fn start_internal(&self) -> Result<()> {
        if self.state.read().await.local_addr.is_some() {
            debug!("MPD server already running");
            return Ok(());
        }

        let address = &self.shared.settings.bind_address;
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("binding MPD server to {}", address))?;
        let local_addr = listener.local_addr()?;

        let shutdown = {
            let mut token = self.shutdown.write().await;
            *token = self.parent.child_token();
            token.clone()
        };

        let shared = self.shared.clone();
        let accept_task = tokio::spawn(accept_loop(listener, shared, shutdown));

        {
            let mut state = self.state.write().await;
            state.local_addr = Some(local_addr);
            state.accept_task = Some(accept_task);
        }

        info!("MPD server listening on {}", local_addr);
        Ok(())
    }

    async fn stop_internal(&self) {
        self.shutdown.read().await.cancel();

        let accept_task = {
            let mut state = self.state.write().await;
            state.local_addr = None;
            state.accept_task.take()
        };

        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                warn!("MPD accept loop ended abnormally: {}", e);
            }
        }
        info!("MPD server stopped");
    }
}

crate::impl_startable!(MpdServer, "mpd");

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, shutdown: CancellationToken) {
    let permits = Arc::new(Semaphore::new(shared.settings.max_connections));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("MPD accept loop shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        continue;
                    }
                };

                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    warn!(
                        "Rejecting {}: {} connections already open",
                        peer, shared.settings.max_connections
                    );
                    tokio::spawn(reject(stream));
                    continue;
                };

                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
                }

                let session = Session::new(
                    peer.to_string(),
                    shared.core.clone(),
                    shared.registry.clone(),
                    shared.bus.clone(),
                    shared.settings.password.clone(),
                    shared.settings.connection_timeout,
                    shutdown.child_token(),
                );
                tokio::spawn(async move {
                    if let Err(e) = session.run(stream).await {
                        debug!("Session for {} ended with error: {}", peer, e);
                    }
                    drop(permit);
                });
            }
        }
    }
}

async fn reject(mut stream: TcpStream) {
    if let Err(e) = stream.write_all(TOO_MANY_CONNECTIONS.as_bytes()).await {
        debug!("Could not notify rejected client: {}", e);
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Could not close rejected client: {}", e);
    }
}
