//! Per-request log for Gembridge.
//!
//! Every call to the completions endpoint produces exactly one [`LogEntry`]: a
//! snapshot of what the client sent, what went upstream, what came back and
//! how the call ended. Entries are handed to an [`AccessLog`], a cheap,
//! cloneable capability that forwards them to a background writer task.

#![deny(missing_docs)]

mod entry;

use std::path::Path;

use config::AccessLogConfig;
use tokio::{
    fs::OpenOptions,
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
};

pub use entry::{LogEntry, PendingEntry};

/// Sink for request log entries.
///
/// Recording never blocks and never fails from the caller's point of view, so
/// it is safe to call from `Drop` implementations.
#[derive(Clone, Default)]
pub struct AccessLog {
    sender: Option<UnboundedSender<LogEntry>>,
}

impl AccessLog {
    /// A sink that discards every entry.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Builds the sink described by the configuration.
    ///
    /// When the configured file cannot be opened, entries go to stdout instead.
    pub async fn init(config: &AccessLogConfig) -> Self {
        if !config.enabled {
            log::debug!("Request log disabled");
            return Self::disabled();
        }

        match open_append(&config.path).await {
            Ok(file) => {
                log::info!("Writing request log to {}", config.path.display());
                Self::from_writer(file)
            }
            Err(e) => {
                log::warn!(
                    "Failed to open request log {}: {e}. Falling back to stdout",
                    config.path.display()
                );

                Self::from_writer(tokio::io::stdout())
            }
        }
    }

    /// Writes entries as JSON lines to the given writer, flushing after each one.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, receiver) = unbounded_channel();
        tokio::spawn(write_entries(writer, receiver));

        Self { sender: Some(sender) }
    }

    /// A sink whose entries are delivered to the returned receiver.
    pub fn channel() -> (Self, UnboundedReceiver<LogEntry>) {
        let (sender, receiver) = unbounded_channel();

        (Self { sender: Some(sender) }, receiver)
    }

    /// Returns whether entries are kept anywhere.
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Records a finished request.
    pub fn record(&self, entry: LogEntry) {
        if entry.error.is_empty() {
            log::info!(
                "{} model={} status={}",
                entry.client_ip,
                entry.model_requested,
                entry.status_code
            );
        } else {
            log::info!(
                "{} model={} status={} error={}",
                entry.client_ip,
                entry.model_requested,
                entry.status_code,
                entry.error
            );
        }

        let Some(ref sender) = self.sender else {
            return;
        };

        if sender.send(entry).is_err() {
            log::warn!("Request log writer is gone, dropping entry");
        }
    }

    /// Starts an entry that is recorded when finished, or with `abandoned` as
    /// its error if dropped before that.
    pub fn pending(&self, entry: LogEntry, abandoned: &'static str) -> PendingEntry {
        PendingEntry::new(self.clone(), entry, abandoned)
    }
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    OpenOptions::new().append(true).create(true).open(path).await
}

async fn write_entries<W>(mut writer: W, mut receiver: UnboundedReceiver<LogEntry>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(entry) = receiver.recv().await {
        let mut line = match serde_json::to_vec(&entry) {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to serialize request log entry: {e}");
                continue;
            }
        };

        line.push(b'\n');

        if let Err(e) = writer.write_all(&line).await {
            log::error!("Failed to write request log entry: {e}");
            continue;
        }

        if let Err(e) = writer.flush().await {
            log::error!("Failed to flush request log: {e}");
        }
    }
}
