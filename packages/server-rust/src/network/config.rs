//! Listener configuration for the `QuickDemo` server.

use std::time::Duration;

use crate::config::AppConfig;

/// Where and how the HTTP listener runs.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// How long in-flight requests may run after shutdown is signalled.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&AppConfig> for NetworkConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            ..Self::default()
        }
    }
}
