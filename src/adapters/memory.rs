//! In-memory library and stored playlist collaborators

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use super::library::uri_scheme;
use super::traits::{LibraryError, LibraryProvider, PlaylistStore, StoreError};
use crate::models::{PlaylistSummary, Query, Track};

// =============================================================================
// MemoryLibrary
// =============================================================================

/// Library backed by a fixed list of tracks
pub struct MemoryLibrary {
    schemes: Vec<String>,
    tracks: Vec<Track>,
}

impl MemoryLibrary {
    /// Create a library serving `scheme` plus any scheme its tracks use
    pub fn new(scheme: &str, tracks: Vec<Track>) -> Self {
        let mut schemes: BTreeSet<String> = tracks.iter().filter_map(|t| uri_scheme(&t.uri)).collect();
        schemes.insert(scheme.to_string());
        Self {
            schemes: schemes.into_iter().collect(),
            tracks,
        }
    }

    /// Load tracks from a JSON array file
    pub fn from_json_file(scheme: &str, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading library file {}", path.display()))?;
        let tracks: Vec<Track> = serde_json::from_str(&content)
            .with_context(|| format!("parsing library file {}", path.display()))?;
        tracing::info!("Loaded {} tracks from {}", tracks.len(), path.display());
        Ok(Self::new(scheme, tracks))
    }
}

impl LibraryProvider for MemoryLibrary {
    fn uri_schemes(&self) -> Vec<String> {
        self.schemes.clone()
    }

    fn lookup(&self, uri: &str) -> Result<Option<Track>, LibraryError> {
        Ok(self.tracks.iter().find(|t| t.uri == uri).cloned())
    }

    fn search(&self, query: &Query) -> Result<Vec<Track>, LibraryError> {
        Ok(self
            .tracks
            .iter()
            .filter(|t| query.matches_substring(t))
            .cloned()
            .collect())
    }

    fn find_exact(&self, query: &Query) -> Result<Vec<Track>, LibraryError> {
        Ok(self
            .tracks
            .iter()
            .filter(|t| query.matches_exact(t))
            .cloned()
            .collect())
    }

    fn tracks(&self) -> Result<Vec<Track>, LibraryError> {
        Ok(self.tracks.clone())
    }
}

// =============================================================================
// MemoryPlaylists
// =============================================================================

struct StoredPlaylist {
    tracks: Vec<Track>,
    last_modified: DateTime<Utc>,
}

/// Stored playlists that live only as long as the process
#[derive(Default)]
pub struct MemoryPlaylists {
    playlists: RwLock<BTreeMap<String, StoredPlaylist>>,
}

impl MemoryPlaylists {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaylistStore for MemoryPlaylists {
    fn list(&self) -> Result<Vec<PlaylistSummary>, StoreError> {
        let playlists = self.playlists.read().unwrap_or_else(PoisonError::into_inner);
        Ok(playlists
            .iter()
            .map(|(name, playlist)| PlaylistSummary {
                name: name.clone(),
                last_modified: playlist.last_modified,
            })
            .collect())
    }

    fn load(&self, name: &str) -> Result<Vec<Track>, StoreError> {
        let playlists = self.playlists.read().unwrap_or_else(PoisonError::into_inner);
        playlists
            .get(name)
            .map(|playlist| playlist.tracks.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn save(&self, name: &str, tracks: &[Track]) -> Result<(), StoreError> {
        let mut playlists = self.playlists.write().unwrap_or_else(PoisonError::into_inner);
        playlists.insert(
            name.to_string(),
            StoredPlaylist {
                tracks: tracks.to_vec(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut playlists = self.playlists.write().unwrap_or_else(PoisonError::into_inner);
        playlists
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let mut playlists = self.playlists.write().unwrap_or_else(PoisonError::into_inner);
        if playlists.contains_key(new) {
            return Err(StoreError::AlreadyExists(new.to_string()));
        }
        let mut playlist = playlists
            .remove(old)
            .ok_or_else(|| StoreError::NotFound(old.to_string()))?;
        playlist.last_modified = Utc::now();
        playlists.insert(new.to_string(), playlist);
        Ok(())
    }
}
