//! Configuration management

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Env var prefix, e.g. `MPD_CONTROL_PORT`
const ENV_PREFIX: &str = "MPD_CONTROL";

/// Directory name under the platform config dir
const APP_DIR_NAME: &str = "mpd-control";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared password; no authentication when unset
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// JSON array of tracks served by the in-memory library
    #[serde(default)]
    pub library_file: Option<PathBuf>,

    /// Directory for stored playlists; kept in memory when unset
    #[serde(default)]
    pub playlist_dir: Option<PathBuf>,
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6600
}

fn default_max_connections() -> usize {
    20
}

fn default_connection_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            password: None,
            max_connections: default_max_connections(),
            connection_timeout_secs: default_connection_timeout_secs(),
            library_file: None,
            playlist_dir: None,
        }
    }
}

impl Config {
    /// Configured password, with an empty value meaning none
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Get config directory (MPD_CONTROL_CONFIG_DIR, XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MPD_CONTROL_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support").join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR_NAME);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR_NAME);
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR_NAME);
        }
    }

    // Fallback to ./data
    PathBuf::from("./data")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        // Start with defaults
        .set_default("hostname", default_hostname())?
        .set_default("port", i64::from(default_port()))?
        .set_default("max_connections", default_max_connections() as i64)?
        .set_default("connection_timeout_secs", default_connection_timeout_secs() as i64)?
        // Load from config file if it exists (config.json, config.toml, ...)
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (MPD_CONTROL_PORT, MPD_CONTROL_PASSWORD, ...)
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("reading configuration from {}", config_dir.display()))?;

    config
        .try_deserialize()
        .context("invalid configuration")
}
