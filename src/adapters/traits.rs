use anyhow::Result;
use async_trait::async_trait;

use crate::models::{PlaylistSummary, Query, Tlid, Track};

// =============================================================================
// Startable - Uniform service lifecycle trait
// =============================================================================

/// Trait for long-running services that can be started/stopped uniformly.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Service name used in logs (e.g., "mpd")
    fn name(&self) -> &'static str;

    /// Start the service. No-op if already running or can't start.
    async fn start(&self) -> Result<()>;

    /// Stop the service gracefully.
    async fn stop(&self);

    /// Whether this service can be started (e.g., has required config).
    /// Default: true.
    async fn can_start(&self) -> bool {
        true
    }
}

/// Macro to implement Startable trait with minimal boilerplate.
///
/// Services must implement:
/// - `async fn start_internal(&self) -> Result<()>`
/// - `async fn stop_internal(&self)`
///
/// Usage:
/// ```ignore
/// impl_startable!(MpdServer, "mpd");
/// ```
#[macro_export]
macro_rules! impl_startable {
    ($service:ty, $name:literal) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $service {
            fn name(&self) -> &'static str {
                $name
            }

            async fn start(&self) -> anyhow::Result<()> {
                self.start_internal().await
            }

            async fn stop(&self) {
                self.stop_internal().await
            }
        }
    };
}

// =============================================================================
// Audio player collaborator
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
    #[error("cannot play {uri}: {reason}")]
    Playback { uri: String, reason: String },
}

/// Notification sent by a player when a track runs out on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFinished {
    pub tlid: Tlid,
}

/// Audio engine the playback state machine drives.
///
/// Calls are made while the core is locked, so implementations must not block.
pub trait AudioPlayer: Send + Sync {
    fn load_and_play(&self, tlid: Tlid, track: &Track) -> Result<(), AudioError>;
    fn pause(&self) -> Result<(), AudioError>;
    fn resume(&self) -> Result<(), AudioError>;
    fn stop(&self) -> Result<(), AudioError>;
    fn seek(&self, position_ms: u64) -> Result<(), AudioError>;
    /// Elapsed time of the loaded track in milliseconds
    fn elapsed(&self) -> u64;
}

// =============================================================================
// Library collaborator
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    #[error("library backend failed: {0}")]
    Backend(String),
}

/// Track source for one or more URI schemes
pub trait LibraryProvider: Send + Sync {
    /// URI schemes served by this provider (e.g., "local")
    fn uri_schemes(&self) -> Vec<String>;
    fn lookup(&self, uri: &str) -> Result<Option<Track>, LibraryError>;
    fn search(&self, query: &Query) -> Result<Vec<Track>, LibraryError>;
    fn find_exact(&self, query: &Query) -> Result<Vec<Track>, LibraryError>;
    /// Every track, used for stats and `list`
    fn tracks(&self) -> Result<Vec<Track>, LibraryError>;
}

// =============================================================================
// Stored playlist collaborator
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no such playlist: {0}")]
    NotFound(String),
    #[error("playlist already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid playlist name: {0}")]
    InvalidName(String),
    #[error("playlist storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("playlist file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persistent named playlists
pub trait PlaylistStore: Send + Sync {
    fn list(&self) -> Result<Vec<PlaylistSummary>, StoreError>;
    fn load(&self, name: &str) -> Result<Vec<Track>, StoreError>;
    /// Create or replace a playlist
    fn save(&self, name: &str, tracks: &[Track]) -> Result<(), StoreError>;
    fn delete(&self, name: &str) -> Result<(), StoreError>;
    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError>;

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.list()?.iter().any(|summary| summary.name == name))
    }
}
