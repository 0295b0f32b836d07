//! Upstream Gemini API settings.

use std::time::Duration;

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;

/// Base URL of the public Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Configuration of the Gemini-compatible upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    /// Base URL without the `/v1beta` suffix.
    pub base_url: String,

    /// API key sent as the `key` query parameter.
    pub api_key: Option<SecretString>,

    /// Model used when the client request has an empty model name.
    pub default_model: String,

    /// Deadline for a complete non-streaming exchange, and for the response
    /// headers of a streaming one.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Deadline for establishing the upstream connection.
    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,

    /// Longest pause allowed between two upstream lines once a stream is
    /// being relayed. Hitting it ends the client stream.
    #[serde(deserialize_with = "deserialize_duration")]
    pub stream_idle_timeout: Duration,

    /// Emit an error event before `[DONE]` when the upstream stream breaks.
    /// Off by default: a broken stream then looks like a normal completion.
    pub stream_error_events: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            stream_idle_timeout: Duration::from_secs(120),
            stream_error_events: false,
        }
    }
}
