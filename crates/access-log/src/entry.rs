use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AccessLog;

/// One request, as seen at both protocol layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the request arrived.
    pub timestamp: Timestamp,
    /// Address of the calling client.
    pub client_ip: String,
    /// Model name from the client request, empty if it named none.
    pub model_requested: String,
    /// Upstream URL with the API key redacted.
    pub upstream_url: String,
    /// The OpenAI-shaped request as received.
    pub request_to_proxy: Option<Value>,
    /// The Gemini-shaped request as sent upstream.
    pub request_to_upstream: Option<Value>,
    /// The Gemini-shaped response, for non-streaming calls.
    pub response_from_upstream: Option<Value>,
    /// The OpenAI-shaped response returned to the client, for non-streaming calls.
    pub final_response: Option<Value>,
    /// Status code sent to the client.
    pub status_code: u16,
    /// What went wrong, empty on success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Number of chunk events relayed, for streaming calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_relayed: Option<u64>,
}

impl LogEntry {
    /// Starts an entry for a request from `client_ip`, stamped with the current time.
    pub fn new(client_ip: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            client_ip: client_ip.into(),
            model_requested: String::new(),
            upstream_url: String::new(),
            request_to_proxy: None,
            request_to_upstream: None,
            response_from_upstream: None,
            final_response: None,
            status_code: 0,
            error: String::new(),
            chunks_relayed: None,
        }
    }

    /// Marks the request as failed.
    pub fn fail(&mut self, status_code: u16, error: impl Into<String>) {
        self.status_code = status_code;
        self.error = error.into();
    }

    /// Serializes a value for one of the snapshot fields.
    pub fn snapshot<T: Serialize>(value: &T) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Failed to snapshot value for request log: {e}");
                None
            }
        }
    }
}

/// An entry whose request is still in flight.
///
/// Recorded by [`PendingEntry::finish`], or on drop with the abandonment
/// reason as its error.
pub struct PendingEntry {
    log: AccessLog,
    entry: Option<LogEntry>,
    abandoned: &'static str,
}

impl PendingEntry {
    pub(crate) fn new(log: AccessLog, entry: LogEntry, abandoned: &'static str) -> Self {
        Self {
            log,
            entry: Some(entry),
            abandoned,
        }
    }

    /// The entry being built.
    pub fn entry_mut(&mut self) -> &mut LogEntry {
        // Only `finish` and `drop` take the entry, and both consume `self`.
        self.entry.get_or_insert_with(|| LogEntry::new(""))
    }

    /// Records the entry as it stands.
    pub fn finish(mut self) {
        if let Some(entry) = self.entry.take() {
            self.log.record(entry);
        }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        if let Some(mut entry) = self.entry.take() {
            if entry.error.is_empty() {
                entry.error = self.abandoned.to_string();
            }

            self.log.record(entry);
        }
    }
}
