//! HTTP server configuration settings.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::HealthConfig;

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// Largest accepted request body in bytes. Unlimited when unset.
    pub body_limit: Option<usize>,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
}
