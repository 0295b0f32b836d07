//! Gembridge configuration structures to map the gembridge.toml configuration.

#![deny(missing_docs)]

mod access_log;
mod auth;
mod gemini;
mod health;
mod loader;
mod server;

use std::path::Path;

pub use access_log::AccessLogConfig;
pub use auth::AuthConfig;
pub use gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiConfig};
pub use health::HealthConfig;
pub use server::ServerConfig;

use serde::Deserialize;

/// Main configuration structure for the Gembridge application.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream Gemini API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// Inbound bearer-token authentication.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Per-request log written as JSON lines.
    #[serde(default)]
    pub access_log: AccessLogConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates settings that cannot be expressed through deserialization alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}
