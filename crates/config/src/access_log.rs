//! Request log settings.

use std::path::PathBuf;

use serde::Deserialize;

/// Where the per-request log entries go.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogConfig {
    /// Whether request log entries are written at all.
    pub enabled: bool,
    /// File the entries are appended to, one JSON object per line.
    pub path: PathBuf,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("requests.log"),
        }
    }
}
