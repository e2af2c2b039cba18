//! MPD Control - Rust Implementation
//!
//! Serves the MPD text protocol to any number of clients sharing one
//! tracklist and playback core.

use mpd_control::adapters::memory::{MemoryLibrary, MemoryPlaylists};
use mpd_control::adapters::playlist_files::JsonPlaylistStore;
use mpd_control::adapters::simulated::SimulatedPlayer;
use mpd_control::adapters::{LibraryRouter, PlaylistStore, Startable};
use mpd_control::engine::{spawn_end_of_track_listener, Core};
use mpd_control::server::{MpdServer, ServerSettings};
use mpd_control::{bus, config, protocol};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// URI scheme served by the built-in library
const LIBRARY_SCHEME: &str = "local";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpd_control=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting MPD Control v{} ({})",
        env!("MPD_CONTROL_VERSION"),
        env!("MPD_CONTROL_GIT_SHA")
    );

    // Load configuration
    let config = config::load_config()?;
    tracing::info!(
        "Configuration loaded, listening on {}, max {} connections",
        config.bind_address(),
        config.max_connections
    );

    let registry = Arc::new(protocol::command_registry().context("building command registry")?);
    tracing::info!("{} command patterns registered", registry.len());

    let shutdown = CancellationToken::new();
    let bus = bus::create_bus();

    // Library
    let library_provider = match &config.library_file {
        Some(path) => MemoryLibrary::from_json_file(LIBRARY_SCHEME, path)?,
        None => MemoryLibrary::new(LIBRARY_SCHEME, Vec::new()),
    };
    let mut library = LibraryRouter::new();
    library.add_provider(Arc::new(library_provider));
    tracing::info!("Library initialized");

    // Stored playlists
    let playlists: Arc<dyn PlaylistStore> = match &config.playlist_dir {
        Some(dir) => Arc::new(
            JsonPlaylistStore::open(dir)
                .with_context(|| format!("opening playlist directory {}", dir.display()))?,
        ),
        None => {
            tracing::info!("Stored playlists kept in memory");
            Arc::new(MemoryPlaylists::new())
        }
    };

    // Audio output and core
    let (player, finished) = SimulatedPlayer::new(shutdown.clone());
    let core = Core::new(Arc::new(player), library, playlists, bus.clone()).into_shared();
    let end_of_track = spawn_end_of_track_listener(core.clone(), finished, shutdown.clone());

    // Server
    let server = MpdServer::new(
        ServerSettings::from(&config),
        core,
        registry,
        bus,
        shutdown.clone(),
    );
    server.start().await?;

    shutdown_signal().await;

    // Cleanup
    shutdown.cancel();
    server.stop().await;
    if let Err(e) = end_of_track.await {
        tracing::warn!("End of track listener failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
