//! Value types shared by the core, the collaborators and the protocol layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tracklist id: stable identity of a tracklist entry
pub type Tlid = u32;

/// Album metadata attached to a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub num_tracks: Option<u32>,
}

/// Immutable track metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub track_no: Option<u32>,
    /// Length in milliseconds
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Bitrate in kbit/s, only known while playing
    #[serde(default)]
    pub bitrate: Option<u32>,
}

impl Track {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artists.push(artist.into());
        self
    }

    pub fn with_album(mut self, album: Album) -> Self {
        self.album = Some(album);
        self
    }

    pub fn with_length(mut self, length_ms: u64) -> Self {
        self.length = Some(length_ms);
        self
    }

    pub fn album_name(&self) -> Option<&str> {
        self.album.as_ref().map(|album| album.name.as_str())
    }
}

/// A track queued in the tracklist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlTrack {
    pub tlid: Tlid,
    pub track: Track,
}

impl TlTrack {
    pub fn new(tlid: Tlid, track: Track) -> Self {
        Self { tlid, track }
    }
}

/// Stored playlist listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

/// Searchable track field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Any,
    Artist,
    Album,
    AlbumArtist,
    Title,
    TrackNo,
    Date,
    Genre,
    Uri,
}

impl Field {
    /// Parse a protocol tag name, case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "any" => Some(Field::Any),
            "artist" => Some(Field::Artist),
            "album" => Some(Field::Album),
            "albumartist" => Some(Field::AlbumArtist),
            "title" => Some(Field::Title),
            "track" => Some(Field::TrackNo),
            "date" => Some(Field::Date),
            "genre" => Some(Field::Genre),
            "file" | "filename" => Some(Field::Uri),
            _ => None,
        }
    }

    /// Values of this field on a track
    pub fn values(&self, track: &Track) -> Vec<String> {
        match self {
            Field::Any => [
                Field::Artist,
                Field::Album,
                Field::AlbumArtist,
                Field::Title,
                Field::TrackNo,
                Field::Date,
                Field::Genre,
                Field::Uri,
            ]
            .iter()
            .flat_map(|field| field.values(track))
            .collect(),
            Field::Artist => track.artists.clone(),
            Field::Album => track.album_name().map(str::to_string).into_iter().collect(),
            Field::AlbumArtist => track
                .album
                .as_ref()
                .map(|album| album.artists.clone())
                .unwrap_or_default(),
            Field::Title => track.name.clone().into_iter().collect(),
            Field::TrackNo => track.track_no.map(|n| n.to_string()).into_iter().collect(),
            Field::Date => track.date.clone().into_iter().collect(),
            Field::Genre => track.genre.clone().into_iter().collect(),
            Field::Uri => vec![track.uri.clone()],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Any => "any",
            Field::Artist => "artist",
            Field::Album => "album",
            Field::AlbumArtist => "albumartist",
            Field::Title => "title",
            Field::TrackNo => "track",
            Field::Date => "date",
            Field::Genre => "genre",
            Field::Uri => "file",
        };
        f.write_str(name)
    }
}

/// Library query: every field must match one of its values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    terms: BTreeMap<Field, Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: Field, value: impl Into<String>) {
        self.terms.entry(field).or_default().push(value.into());
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.add(field, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Field, &Vec<String>)> {
        self.terms.iter()
    }

    /// Exact (case-sensitive) match on every term
    pub fn matches_exact(&self, track: &Track) -> bool {
        self.terms.iter().all(|(field, wanted)| {
            let values = field.values(track);
            wanted.iter().all(|w| values.iter().any(|v| v == w))
        })
    }

    /// Case-insensitive substring match on every term
    pub fn matches_substring(&self, track: &Track) -> bool {
        self.terms.iter().all(|(field, wanted)| {
            let values: Vec<String> = field
                .values(track)
                .into_iter()
                .map(|v| v.to_lowercase())
                .collect();
            wanted.iter().all(|w| {
                let w = w.to_lowercase();
                values.iter().any(|v| v.contains(&w))
            })
        })
    }
}
