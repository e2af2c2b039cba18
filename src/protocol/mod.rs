//! MPD text protocol
//!
//! Each submodule registers the patterns for one group of commands. The
//! registry is built once at startup and shared by all sessions.

pub mod audio_output;
pub mod command_list;
pub mod connection;
pub mod current_playlist;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod music_db;
pub mod playback;
pub mod reflection;
pub mod response;
pub mod status;
pub mod stored_playlists;

pub use dispatcher::{CommandRegistry, Context, RegistryError, SessionState};
pub use error::{AckCode, AckError};
pub use response::Response;

/// Protocol name sent in the greeting
pub const NAME: &str = "MPD";

/// Protocol version sent in the greeting
pub const VERSION: &str = "0.19.0";

/// Greeting line sent on connect
pub fn greeting() -> String {
    format!("OK {} {}", NAME, VERSION)
}

/// Build the registry with every supported command
pub fn command_registry() -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    audio_output::register(&mut registry)?;
    command_list::register(&mut registry)?;
    connection::register(&mut registry)?;
    current_playlist::register(&mut registry)?;
    music_db::register(&mut registry)?;
    playback::register(&mut registry)?;
    reflection::register(&mut registry)?;
    status::register(&mut registry)?;
    stored_playlists::register(&mut registry)?;
    tracing::debug!("Registered {} command patterns", registry.len());
    Ok(registry)
}
