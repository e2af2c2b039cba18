//! MPD Control - Rust Implementation
//!
//! A multi-client server speaking the MPD text protocol on top of one shared
//! tracklist and playback core.
//!
//! This library provides:
//! - Tracklist model with stable track ids and a change version
//! - Playback state machine with repeat/random/single/consume play order
//! - Idle/noidle change notification through the event bus
//! - Pattern-based command dispatch with command lists and auth
//! - TCP server with per-connection sessions

pub mod adapters;
pub mod bus;
pub mod config;
pub mod engine;
pub mod models;
pub mod protocol;
pub mod server;
