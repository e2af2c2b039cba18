//! Subsystem names carried on the event bus.
//!
//! These are the fixed change-notification categories clients can wait on
//! with `idle`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Subsystem
// =============================================================================

/// A change-notification category.
///
/// Ordering follows the wire names alphabetically, so sets of subsystems
/// render in a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Database,
    Mixer,
    Options,
    Output,
    Player,
    Playlist,
    StoredPlaylist,
    Update,
}

impl Subsystem {
    /// Every subsystem, in wire-name order
    pub const ALL: [Subsystem; 8] = [
        Subsystem::Database,
        Subsystem::Mixer,
        Subsystem::Options,
        Subsystem::Output,
        Subsystem::Player,
        Subsystem::Playlist,
        Subsystem::StoredPlaylist,
        Subsystem::Update,
    ];

    /// Name used on the wire (`changed: <name>`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Database => "database",
            Subsystem::Mixer => "mixer",
            Subsystem::Options => "options",
            Subsystem::Output => "output",
            Subsystem::Player => "player",
            Subsystem::Playlist => "playlist",
            Subsystem::StoredPlaylist => "stored_playlist",
            Subsystem::Update => "update",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subsystem: {0}")]
pub struct ParseSubsystemError(pub String);

impl FromStr for Subsystem {
    type Err = ParseSubsystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subsystem::ALL
            .iter()
            .find(|subsystem| subsystem.as_str() == s)
            .copied()
            .ok_or_else(|| ParseSubsystemError(s.to_string()))
    }
}
