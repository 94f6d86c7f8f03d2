//! Server configuration
//!
//! Manages server configuration settings and loading.

use serde::Deserialize;

/// Server configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// When set, a broadcast attempts every recipient and prunes the peers
    /// whose send failed, instead of aborting the fan-out on the first
    /// failure.
    pub resilient_broadcast: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2024,
            resilient_broadcast: false,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from an optional `chat_server` file and
    /// `CHAT_`-prefixed environment variables, over the defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("chat_server").required(false))
            .add_source(config::Environment::with_prefix("CHAT").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
