use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use futures::{StreamExt, stream};
use tokio::net::TcpListener;

/// What the mock upstream answers to every request
#[derive(Clone)]
enum Reply {
    Json(serde_json::Value),
    EventStream(String),
    /// Sends the body, then keeps the connection open without writing more
    StalledEventStream(String),
    Text(String),
}

/// Builder for a Gemini-compatible test upstream
pub struct GeminiMock {
    status: StatusCode,
    reply: Reply,
}

impl GeminiMock {
    /// Answer every call with the given `generateContent` response
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            reply: Reply::Json(body),
        }
    }

    /// Answer every call with a raw `text/event-stream` body
    pub fn event_stream(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            reply: Reply::EventStream(body.into()),
        }
    }

    /// Answer every call with `body` as the start of an event stream that never ends
    pub fn stalled_event_stream(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            reply: Reply::StalledEventStream(body.into()),
        }
    }

    /// Answer every call with an error status and a plain body
    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            reply: Reply::Text(body.into()),
        }
    }

    /// A single-candidate response with the given text
    pub fn text(text: &str) -> Self {
        Self::json(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP",
                "index": 0,
                "tokenCount": 5
            }]
        }))
    }

    pub async fn spawn(self) -> SpawnedGemini {
        let state = Arc::new(MockState {
            status: self.status,
            reply: self.reply,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .fallback(handle)
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        SpawnedGemini { address, state }
    }
}

/// A call received by the mock upstream
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Path and query, including the API key
    pub uri: String,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

struct MockState {
    status: StatusCode,
    reply: Reply,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A running mock upstream
pub struct SpawnedGemini {
    address: SocketAddr,
    state: Arc<MockState>,
}

impl SpawnedGemini {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        uri: uri.to_string(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    };

    state.requests.lock().unwrap().push(recorded);

    match &state.reply {
        Reply::Json(json) => (
            state.status,
            [(header::CONTENT_TYPE, "application/json")],
            json.to_string(),
        )
            .into_response(),
        Reply::EventStream(body) => (
            state.status,
            [(header::CONTENT_TYPE, "text/event-stream")],
            body.clone(),
        )
            .into_response(),
        Reply::StalledEventStream(body) => {
            let first = stream::iter([Ok::<_, std::io::Error>(Bytes::from(body.clone()))]);
            let body = Body::from_stream(first.chain(stream::pending()));

            (state.status, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Reply::Text(body) => (state.status, body.clone()).into_response(),
    }
}
