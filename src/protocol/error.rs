//! ACK errors
//!
//! Every failed command is answered with one line:
//! `ACK [<code>@<list index>] {<command>} <message>`

use crate::adapters::{LibraryError, StoreError};
use crate::engine::{CoreError, PlaybackError, TracklistError};

/// Numeric error class carried in an ACK line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    NotImplemented,
    NotList,
    Arg,
    Password,
    Permission,
    Unknown,
    NoExist,
    PlaylistMax,
    System,
    PlaylistLoad,
    UpdateAlready,
    PlayerSync,
    Exist,
}

impl AckCode {
    pub fn value(self) -> u8 {
        match self {
            AckCode::NotImplemented => 0,
            AckCode::NotList => 1,
            AckCode::Arg => 2,
            AckCode::Password => 3,
            AckCode::Permission => 4,
            AckCode::Unknown => 5,
            AckCode::NoExist => 50,
            AckCode::PlaylistMax => 51,
            AckCode::System => 52,
            AckCode::PlaylistLoad => 53,
            AckCode::UpdateAlready => 54,
            AckCode::PlayerSync => 55,
            AckCode::Exist => 56,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ACK [{}@{}] {{{}}} {}", .code.value(), .index, .command, .message)]
pub struct AckError {
    pub code: AckCode,
    /// Position in the command list, 0 outside lists
    pub index: usize,
    /// Offending command, empty when not applicable
    pub command: String,
    pub message: String,
}

impl AckError {
    pub fn new(code: AckCode, message: impl Into<String>) -> Self {
        Self {
            code,
            index: 0,
            command: String::new(),
            message: message.into(),
        }
    }

    pub fn arg(message: impl Into<String>) -> Self {
        Self::new(AckCode::Arg, message)
    }

    pub fn no_exist(message: impl Into<String>) -> Self {
        Self::new(AckCode::NoExist, message)
    }

    pub fn exist(message: impl Into<String>) -> Self {
        Self::new(AckCode::Exist, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(AckCode::System, message)
    }

    pub fn password() -> Self {
        Self::new(AckCode::Password, "incorrect password").with_command("password")
    }

    pub fn permission(command: &str) -> Self {
        Self::new(
            AckCode::Permission,
            format!("you don't have permission for \"{}\"", command),
        )
        .with_command(command)
    }

    /// Unknown command. The command field stays empty; the name is in the message.
    pub fn unknown_command(command: &str) -> Self {
        Self::new(AckCode::Unknown, format!("unknown command \"{}\"", command))
    }

    pub fn no_command() -> Self {
        Self::new(AckCode::Unknown, "No command given")
    }

    pub fn not_implemented() -> Self {
        Self::new(AckCode::NotImplemented, "Not implemented")
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Attribute the error to `command` unless it already names one.
    ///
    /// Unknown-command errors keep an empty command field.
    pub fn attribute_to(self, command: &str) -> Self {
        if self.command.is_empty() && self.code != AckCode::Unknown {
            self.with_command(command)
        } else {
            self
        }
    }
}

impl From<TracklistError> for AckError {
    fn from(e: TracklistError) -> Self {
        match e {
            TracklistError::NoSuchTlid(_) => AckError::no_exist("No such song"),
            TracklistError::BadIndex => AckError::arg("Bad song index"),
        }
    }
}

impl From<PlaybackError> for AckError {
    fn from(e: PlaybackError) -> Self {
        match e {
            PlaybackError::NoSuchTlid(_) => AckError::no_exist("No such song"),
            PlaybackError::Audio(e) => {
                tracing::warn!("Audio failure: {}", e);
                AckError::system(e.to_string())
            }
        }
    }
}

impl From<CoreError> for AckError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Tracklist(e) => e.into(),
            CoreError::Playback(e) => e.into(),
        }
    }
}

impl From<StoreError> for AckError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AckError::no_exist("No such playlist"),
            StoreError::AlreadyExists(_) => AckError::exist("Playlist already exists"),
            StoreError::InvalidName(name) => {
                AckError::arg(format!("playlist name is invalid: {}", name))
            }
            e => {
                tracing::error!("Stored playlist failure: {}", e);
                AckError::system(e.to_string())
            }
        }
    }
}

impl From<LibraryError> for AckError {
    fn from(e: LibraryError) -> Self {
        tracing::error!("Library failure: {}", e);
        AckError::system(e.to_string())
    }
}
