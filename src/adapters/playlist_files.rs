//! Stored playlists persisted as one JSON file per playlist

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use super::traits::{PlaylistStore, StoreError};
use crate::models::{PlaylistSummary, Track};

const EXTENSION: &str = "json";

pub struct JsonPlaylistStore {
    dir: PathBuf,
}

impl JsonPlaylistStore {
    /// Use `dir` for playlist files, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::info!("Stored playlists in {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\', '\0', '\n', '\r']);
        if invalid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", name, EXTENSION)))
    }

    fn summary(path: &Path) -> Option<PlaylistSummary> {
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return None;
        }
        let name = path.file_stem()?.to_str()?.to_string();
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(PlaylistSummary {
            name,
            last_modified: DateTime::<Utc>::from(modified),
        })
    }
}

impl PlaylistStore for JsonPlaylistStore {
    fn list(&self) -> Result<Vec<PlaylistSummary>, StoreError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            if let Some(summary) = Self::summary(&entry?.path()) {
                summaries.push(summary);
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    fn load(&self, name: &str) -> Result<Vec<Track>, StoreError> {
        let path = self.path_for(name)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, name: &str, tracks: &[Track]) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let content = serde_json::to_string_pretty(tracks)?;
        std::fs::write(&path, content)?;
        tracing::debug!("Saved playlist {} ({} tracks)", name, tracks.len());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let from = self.path_for(old)?;
        let to = self.path_for(new)?;
        if to.exists() {
            return Err(StoreError::AlreadyExists(new.to_string()));
        }
        if !from.exists() {
            return Err(StoreError::NotFound(old.to_string()));
        }
        std::fs::rename(&from, &to)?;
        Ok(())
    }
}
