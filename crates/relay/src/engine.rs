use access_log::{AccessLog, LogEntry};
use axum::{
    body::Bytes,
    extract::rejection::BytesRejection,
    http::header,
    response::{IntoResponse, Response, Sse},
};
use config::GeminiConfig;

use crate::{
    error::RelayError,
    gemini::{Endpoint, GeminiClient, input::GenerateContentRequest},
    messages::ChatCompletionRequest,
    stamp::ResponseStamp,
    stream::{self, StreamOptions},
};

/// Abandonment reason of a stream the client stopped reading.
const CLIENT_DISCONNECTED: &str = "client disconnected";

/// Drives one completion call from the raw client body to the client response.
pub(crate) struct Engine {
    gemini: GeminiClient,
    access_log: AccessLog,
    stream_options: StreamOptions,
}

impl Engine {
    pub(crate) fn new(config: &GeminiConfig, access_log: AccessLog) -> anyhow::Result<Self> {
        Ok(Self {
            gemini: GeminiClient::new(config)?,
            access_log,
            stream_options: StreamOptions {
                idle_timeout: config.stream_idle_timeout,
                error_events: config.stream_error_events,
            },
        })
    }

    pub(crate) async fn complete(&self, client_ip: String, body: Result<Bytes, BytesRejection>) -> Response {
        let mut entry = LogEntry::new(client_ip);

        let body = match body {
            Ok(body) => body,
            Err(rejection) => {
                log::debug!("Failed to read request body: {rejection}");
                return self.reject(entry, RelayError::UnreadableBody(rejection.status()));
            }
        };

        let request: ChatCompletionRequest = match sonic_rs::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("Invalid chat completion request: {e}");
                return self.reject(entry, RelayError::MalformedInput);
            }
        };

        log::debug!(
            "Chat completion for model '{}' with {} messages, streaming: {}",
            request.model,
            request.messages.len(),
            request.is_streaming()
        );

        let model = self.gemini.resolve_model(&request.model).to_string();
        let upstream = GenerateContentRequest::from(&request);

        entry.model_requested = request.model.clone();
        entry.request_to_proxy = LogEntry::snapshot(&request);
        entry.request_to_upstream = LogEntry::snapshot(&upstream);

        if request.is_streaming() {
            self.stream(entry, model, upstream).await
        } else {
            self.generate(entry, &model, upstream).await
        }
    }

    /// Answers a request that never reaches the upstream with a method error.
    pub(crate) fn method_not_allowed(&self, client_ip: String) -> Response {
        self.reject(LogEntry::new(client_ip), RelayError::MethodNotAllowed)
    }

    async fn generate(&self, mut entry: LogEntry, model: &str, upstream: GenerateContentRequest) -> Response {
        let url = self.gemini.url(Endpoint::Generate, model);
        entry.upstream_url = url.redacted.clone();

        let response = match self.gemini.generate(&url, &upstream).await {
            Ok(response) => response,
            Err(error) => return self.reject(entry, error),
        };

        entry.response_from_upstream = LogEntry::snapshot(&response);

        let completion = match response.into_completion(ResponseStamp::fresh()) {
            Ok(completion) => completion,
            Err(error) => return self.reject(entry, error),
        };

        let body = match sonic_rs::to_vec(&completion) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Failed to encode chat completion: {e}");
                let error = RelayError::Serialization("Failed to marshal response".to_string());

                return self.reject(entry, error);
            }
        };

        log::debug!(
            "Chat completion successful, returning response with {} choices",
            completion.choices.len()
        );

        entry.final_response = LogEntry::snapshot(&completion);
        entry.status_code = 200;
        self.access_log.record(entry);

        ([(header::CONTENT_TYPE, "application/json")], body).into_response()
    }

    async fn stream(&self, mut entry: LogEntry, model: String, upstream: GenerateContentRequest) -> Response {
        let url = self.gemini.url(Endpoint::StreamGenerate, &model);
        entry.upstream_url = url.redacted.clone();

        let lines = match self.gemini.stream_generate(&url, &upstream).await {
            Ok(lines) => lines,
            Err(error) => return self.reject(entry, error),
        };

        // From here on the client sees 200 whatever happens upstream.
        entry.status_code = 200;

        let pending = self.access_log.pending(entry, CLIENT_DISCONNECTED);
        let events = stream::relay(lines, model, self.stream_options, pending);

        log::debug!("Returning streaming response");

        ([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response()
    }

    fn reject(&self, mut entry: LogEntry, error: RelayError) -> Response {
        entry.fail(error.status_code().as_u16(), error.to_string());
        self.access_log.record(entry);

        error.into_response()
    }
}
