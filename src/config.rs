//! Configuration loading.

use crate::directory::snapshot::RefreshMode;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Homeserver connection for the appservice agent.
    pub homeserver: HomeserverConfig,
    /// Directory behavior.
    pub directory: DirectoryConfig,
    /// Key-verification delegate for federation auth.
    pub keyserver: KeyServerConfig,
    /// HTTP listen configuration.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Homeserver access for the appservice agent.
#[derive(Debug, Clone, Deserialize)]
pub struct HomeserverConfig {
    /// Base URL, e.g. "https://example.org".
    pub url: String,
    /// Appservice access token for outbound API calls.
    pub access_token: String,
    /// Homeserver token expected on inbound transaction pushes.
    pub hs_token: String,
}

/// Directory maintenance settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// The Space acting as the room directory (room id or alias; aliases are
    /// resolved at startup).
    pub space: String,
    /// The admin identity whose invites and commands are honored.
    pub admin_user: String,
    /// Snapshot source: "hierarchy" (default) or "store".
    #[serde(default = "default_mode")]
    pub mode: SnapshotMode,
    /// Seconds between background snapshot refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

/// Snapshot refresh strategy, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    Hierarchy,
    Store,
}

impl From<SnapshotMode> for RefreshMode {
    fn from(mode: SnapshotMode) -> Self {
        match mode {
            SnapshotMode::Hierarchy => RefreshMode::Hierarchy,
            SnapshotMode::Store => RefreshMode::Store,
        }
    }
}

/// Key server delegate.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyServerConfig {
    /// Base URL of the key-verification service.
    pub url: String,
}

/// HTTP listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_mode() -> SnapshotMode {
    SnapshotMode::Hierarchy
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "directory.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r##"
            [homeserver]
            url = "https://example.org"
            access_token = "as_token"
            hs_token = "hs_token"

            [directory]
            space = "#directory:example.org"
            admin_user = "@admin:example.org"

            [keyserver]
            url = "https://keys.example.org"
            "##,
        )
        .unwrap();

        assert_eq!(config.directory.mode, SnapshotMode::Hierarchy);
        assert_eq!(config.directory.refresh_interval_secs, 300);
        assert_eq!(config.listen.address, "0.0.0.0");
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.database.path, "directory.db");
    }

    #[test]
    fn mode_parses_lowercase() {
        let config: Config = toml::from_str(
            r#"
            [homeserver]
            url = "https://example.org"
            access_token = "a"
            hs_token = "h"

            [directory]
            space = "!space:example.org"
            admin_user = "@admin:example.org"
            mode = "store"
            refresh_interval_secs = 60

            [keyserver]
            url = "https://keys.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.directory.mode, SnapshotMode::Store);
        assert_eq!(config.directory.refresh_interval_secs, 60);
    }
}
