//! OpenAI Chat Completions on top of the Gemini `generateContent` API.
//!
//! Requests arrive in the OpenAI shape, are rewritten for Gemini, and the
//! answer is rewritten back. Streaming calls are relayed event by event as
//! Server-Sent Events, closed by a `[DONE]` sentinel.

use std::sync::Arc;

use access_log::AccessLog;
use axum::{
    Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    response::Response,
    routing::post,
};
use config::GeminiConfig;

mod engine;
mod error;
mod gemini;
mod lines;
mod messages;
mod request;
mod stamp;
mod stream;

use engine::Engine;

pub use error::RelayError;
pub use request::{ClientAddress, client_ip};

pub(crate) type Result<T> = std::result::Result<T, RelayError>;

/// Path of the chat completions endpoint.
pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Creates an axum router serving the chat completions endpoint.
pub fn router(config: &GeminiConfig, access_log: AccessLog) -> anyhow::Result<Router> {
    let engine = Arc::new(Engine::new(config, access_log)?);

    log::debug!("Relaying chat completions to {}", config.base_url);

    let routes = Router::new()
        .route(
            COMPLETIONS_PATH,
            post(chat_completions).fallback(method_not_allowed),
        )
        .with_state(engine);

    Ok(routes)
}

/// Handle chat completion requests.
///
/// Responds with a single JSON body, or with Server-Sent Events when the
/// request sets `stream: true`.
async fn chat_completions(
    State(engine): State<Arc<Engine>>,
    ClientAddress(client_ip): ClientAddress,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    engine.complete(client_ip, body).await
}

async fn method_not_allowed(State(engine): State<Arc<Engine>>, ClientAddress(client_ip): ClientAddress) -> Response {
    engine.method_not_allowed(client_ip)
}
