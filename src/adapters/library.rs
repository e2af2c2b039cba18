//! Library routing by URI scheme
//!
//! Lookups go to the provider registered for the URI's scheme. Searches fan
//! out to every provider and concatenate results in registration order.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{LibraryError, LibraryProvider};
use crate::models::{Query, Track};

/// Extract the scheme of a track URI.
///
/// Accepts both proper URLs (`file:///music/a.flac`) and the opaque
/// `scheme:path` form backends use (`local:track:a.flac`).
pub fn uri_scheme(uri: &str) -> Option<String> {
    if let Ok(parsed) = url::Url::parse(uri) {
        return Some(parsed.scheme().to_string());
    }
    let (scheme, _) = uri.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

#[derive(Default)]
pub struct LibraryRouter {
    providers: Vec<Arc<dyn LibraryProvider>>,
    by_scheme: HashMap<String, usize>,
}

impl LibraryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for all its schemes. Later providers win on conflict.
    pub fn add_provider(&mut self, provider: Arc<dyn LibraryProvider>) {
        let index = self.providers.len();
        for scheme in provider.uri_schemes() {
            if self.by_scheme.insert(scheme.clone(), index).is_some() {
                tracing::warn!("Library scheme {} registered twice, replacing", scheme);
            }
        }
        self.providers.push(provider);
    }

    /// All registered schemes, sorted
    pub fn uri_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.by_scheme.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Look up a track. A URI with no matching provider is not found.
    pub fn lookup(&self, uri: &str) -> Result<Option<Track>, LibraryError> {
        let Some(provider) = uri_scheme(uri)
            .and_then(|scheme| self.by_scheme.get(&scheme))
            .and_then(|&index| self.providers.get(index))
        else {
            tracing::debug!("No library provider for {}", uri);
            return Ok(None);
        };
        provider.lookup(uri)
    }

    pub fn search(&self, query: &Query) -> Result<Vec<Track>, LibraryError> {
        let mut tracks = Vec::new();
        for provider in &self.providers {
            tracks.extend(provider.search(query)?);
        }
        Ok(tracks)
    }

    pub fn find_exact(&self, query: &Query) -> Result<Vec<Track>, LibraryError> {
        let mut tracks = Vec::new();
        for provider in &self.providers {
            tracks.extend(provider.find_exact(query)?);
        }
        Ok(tracks)
    }

    pub fn tracks(&self) -> Result<Vec<Track>, LibraryError> {
        let mut tracks = Vec::new();
        for provider in &self.providers {
            tracks.extend(provider.tracks()?);
        }
        Ok(tracks)
    }
}
