use std::{convert::Infallible, time::Duration};

use access_log::PendingEntry;
use axum::response::sse::Event;
use futures::{Stream, StreamExt, stream};
use serde::Serialize;

use crate::{gemini::output::GenerateContentResponse, lines::LineStream, stamp::ResponseStamp};

const DATA_PREFIX: &str = "data: ";
const DONE: &str = "[DONE]";

/// Behaviour of the relay once a stream is committed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamOptions {
    /// Longest wait for the next upstream line.
    pub(crate) idle_timeout: Duration,
    /// Emit an error event before the sentinel when the upstream breaks.
    pub(crate) error_events: bool,
}

#[derive(Serialize)]
struct ErrorEvent<'a> {
    error: ErrorDetails<'a>,
}

#[derive(Serialize)]
struct ErrorDetails<'a> {
    message: &'a str,
    r#type: &'static str,
}

enum Phase {
    Relaying,
    Done,
}

struct RelayState {
    lines: LineStream,
    model: String,
    options: StreamOptions,
    /// Taken when the stream completes. Dropping it earlier records an abandoned call.
    pending: Option<PendingEntry>,
    chunks: u64,
    phase: Phase,
}

/// Re-frames upstream SSE lines as OpenAI chunk events, ending with `[DONE]`.
///
/// Lines that are not `data:` lines, fail to parse, or carry no candidate are
/// skipped. Upstream faults end the stream. The log entry is recorded when the
/// sentinel has been produced, or as abandoned if the client goes away first.
pub(crate) fn relay(
    lines: LineStream,
    model: String,
    options: StreamOptions,
    pending: PendingEntry,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    let state = RelayState {
        lines,
        model,
        options,
        pending: Some(pending),
        chunks: 0,
        phase: Phase::Relaying,
    };

    stream::unfold(state, |mut state| async move {
        if let Phase::Done = state.phase {
            return None;
        }

        loop {
            let next = tokio::time::timeout(state.options.idle_timeout, state.lines.next()).await;

            let fault = match next {
                Ok(Some(Ok(line))) => match chunk_event(&line, &state.model) {
                    Some(event) => {
                        state.chunks += 1;
                        return Some((vec![event], state));
                    }
                    None => continue,
                },
                Ok(None) => None,
                Ok(Some(Err(e))) => {
                    log::warn!("Upstream stream broke after {} chunks: {e}", state.chunks);
                    Some(format!("Upstream stream error: {e}"))
                }
                Err(_) => {
                    log::warn!(
                        "Upstream stream idle for {:?} after {} chunks",
                        state.options.idle_timeout,
                        state.chunks
                    );
                    Some("Upstream stream timed out".to_string())
                }
            };

            return Some((finish(&mut state, fault), state));
        }
    })
    .flat_map(|events| stream::iter(events.into_iter().map(Ok)))
}

/// Builds the closing events and records the log entry.
fn finish(state: &mut RelayState, fault: Option<String>) -> Vec<Event> {
    state.phase = Phase::Done;

    let mut events = Vec::with_capacity(2);

    if let Some(message) = fault.as_deref().filter(|_| state.options.error_events) {
        let body = ErrorEvent {
            error: ErrorDetails {
                message,
                r#type: "upstream_error",
            },
        };

        match sonic_rs::to_string(&body) {
            Ok(json) => events.push(Event::default().data(json)),
            Err(e) => log::error!("Failed to encode stream error event: {e}"),
        }
    }

    events.push(Event::default().data(DONE));

    if let Some(mut pending) = state.pending.take() {
        let entry = pending.entry_mut();
        entry.chunks_relayed = Some(state.chunks);

        if let Some(message) = fault {
            entry.error = message;
        }

        pending.finish();
    }

    events
}

/// Converts one upstream line into a chunk event, if it carries one.
fn chunk_event(line: &str, model: &str) -> Option<Event> {
    let payload = line.strip_prefix(DATA_PREFIX)?;

    let response: GenerateContentResponse = match sonic_rs::from_str(payload) {
        Ok(response) => response,
        Err(e) => {
            log::debug!("Skipping unparseable upstream line: {e}");
            return None;
        }
    };

    let Some(chunk) = response.into_chunk(model, ResponseStamp::fresh()) else {
        log::debug!("Skipping upstream event without candidates");
        return None;
    };

    match sonic_rs::to_string(&chunk) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            log::error!("Failed to encode chunk: {e}");
            None
        }
    }
}
