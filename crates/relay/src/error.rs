use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures of a completion call that happen before the client response is committed.
///
/// Every variant becomes a status code and a plain-text body. Once an SSE
/// stream has started, faults end the stream instead and never reach this type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The body could not be read from the client connection.
    #[error("Failed to read request body")]
    UnreadableBody(StatusCode),

    /// The body is not a chat completion request.
    #[error("Invalid request body")]
    MalformedInput,

    /// Anything but POST on the completions endpoint.
    #[error("Only POST method is allowed")]
    MethodNotAllowed,

    /// The upstream could not be reached, or did not answer in time.
    #[error("{0}")]
    UpstreamTransport(String),

    /// The upstream answered with a non-success status.
    #[error("Error from upstream API: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// The upstream answered 2xx with a body that is not a Gemini response.
    #[error("Failed to unmarshal Gemini response")]
    UpstreamMalformed,

    /// The upstream response cannot be expressed in the OpenAI shape.
    #[error("{0}")]
    Mapping(String),

    /// A request or response could not be encoded.
    #[error("{0}")]
    Serialization(String),
}

impl RelayError {
    /// The HTTP status returned to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnreadableBody(status) => *status,
            Self::MalformedInput => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            // Upstream statuses are relayed verbatim; ones axum cannot represent become 502.
            Self::UpstreamStatus { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::UpstreamTransport(_) | Self::UpstreamMalformed | Self::Mapping(_) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            log::error!("Server error ({}): {self}", status.as_u16());
        }

        let mut response = (status, self.to_string()).into_response();
        let headers = response.headers_mut();

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        response
    }
}
