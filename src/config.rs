//! Daemon configuration
//!
//! `plexd` reads a TOML file:
//!
//! ```toml
//! listen = ":18833"
//! buffer = 1500
//! routes = ["10.0.0.2:18833", "10.0.0.3:18833"]
//!
//! [log]
//! debug = true
//! ```
//!
//! Route changes are picked up while running; listen address and buffer
//! size changes require a restart.

use std::path::Path;

use serde::Deserialize;

/// Broker daemon configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Local listen address; `":port"` means all interfaces
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Fan-out chunk size in bytes, the maximum datagram size carried
    #[serde(default = "default_buffer")]
    pub buffer: usize,

    /// Ingress queue depth in chunks
    #[serde(default = "default_pipe_depth")]
    pub pipe_depth: usize,

    /// Subscriber addresses dialed at startup
    #[serde(default)]
    pub routes: Vec<String>,

    #[serde(default)]
    pub log: LogConfig,
}

/// Logging options
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Raise the default filter from `plex=info` to `plex=debug`
    #[serde(default)]
    pub debug: bool,
}

fn default_listen() -> String {
    ":18833".to_string()
}

fn default_buffer() -> usize {
    1500
}

fn default_pipe_depth() -> usize {
    crate::plex::DEFAULT_PIPE_DEPTH
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            buffer: default_buffer(),
            pipe_depth: default_pipe_depth(),
            routes: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parse config file: {}", path.display()))?;
        Ok(config)
    }
}
