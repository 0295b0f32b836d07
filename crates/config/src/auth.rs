//! Inbound authentication settings.

use secrecy::SecretString;
use serde::Deserialize;

/// Static bearer-token authentication for inbound requests.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// When set, every request to the completions endpoint must carry
    /// `Authorization: Bearer <token>` with exactly this value.
    pub token: Option<SecretString>,
}

impl AuthConfig {
    /// Returns whether inbound requests must be authenticated.
    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }
}
