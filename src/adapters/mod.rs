//! Collaborators the core drives: audio output, track libraries, stored playlists

pub mod library;
pub mod memory;
pub mod playlist_files;
pub mod simulated;
mod traits;

pub use library::LibraryRouter;
pub use traits::{
    AudioError, AudioPlayer, LibraryError, LibraryProvider, PlaylistStore, Startable,
    StoreError, TrackFinished,
};
