pub(crate) mod input;
pub(crate) mod output;

use std::{future::Future, time::Duration};

use config::GeminiConfig;
use http::header;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};

use self::{input::GenerateContentRequest, output::GenerateContentResponse};
use crate::{
    error::RelayError,
    lines::{LineStream, split_lines},
};

const REDACTED_KEY: &str = "[REDACTED]";

/// Which Gemini method a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Generate,
    StreamGenerate,
}

impl Endpoint {
    fn method(self) -> &'static str {
        match self {
            Endpoint::Generate => "generateContent?",
            Endpoint::StreamGenerate => "streamGenerateContent?alt=sse&",
        }
    }
}

/// Upstream URL, with and without the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpstreamUrl {
    pub(crate) full: String,
    pub(crate) redacted: String,
}

/// HTTP client for the Gemini API.
pub(crate) struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    default_model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub(crate) fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client for Gemini: {e}"))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
            timeout: config.timeout,
        })
    }

    /// The model to call: the requested one, or the configured default.
    pub(crate) fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.is_empty() {
            &self.default_model
        } else {
            requested
        }
    }

    pub(crate) fn url(&self, endpoint: Endpoint, model: &str) -> UpstreamUrl {
        let prefix = format!("{}/v1beta/models/{model}:{}key=", self.base_url, endpoint.method());
        let key = self.api_key.as_ref().map(|key| key.expose_secret()).unwrap_or_default();

        UpstreamUrl {
            full: format!("{prefix}{key}"),
            redacted: format!("{prefix}{REDACTED_KEY}"),
        }
    }

    /// Calls `generateContent` and parses the whole response.
    pub(crate) async fn generate(
        &self,
        url: &UpstreamUrl,
        body: &GenerateContentRequest,
    ) -> crate::Result<GenerateContentResponse> {
        let exchange = async {
            let response = self.send(url, body).await?;
            let status = response.status();

            let text = response.text().await.map_err(|e| {
                log::error!("Failed to read Gemini response body: {e}");
                RelayError::UpstreamTransport("Failed to read response from Gemini API".to_string())
            })?;

            if !status.is_success() {
                log::debug!("Gemini API error ({status}): {text}");

                return Err(RelayError::UpstreamStatus {
                    status: status.as_u16(),
                    message: text,
                });
            }

            sonic_rs::from_str::<GenerateContentResponse>(&text).map_err(|e| {
                log::error!("Failed to parse Gemini response: {e}");
                log::debug!("Raw response that failed to parse: {text}");

                RelayError::UpstreamMalformed
            })
        };

        self.deadline(exchange).await
    }

    /// Calls `streamGenerateContent` and returns the body as lines once the
    /// upstream has answered with a success status.
    pub(crate) async fn stream_generate(
        &self,
        url: &UpstreamUrl,
        body: &GenerateContentRequest,
    ) -> crate::Result<LineStream> {
        let response = self.deadline(self.send(url, body)).await?;
        let status = response.status();

        if !status.is_success() {
            let text = self.deadline(async move {
                response.text().await.map_err(|e| {
                    log::error!("Failed to read Gemini error body: {e}");
                    RelayError::UpstreamTransport("Failed to read response from Gemini API".to_string())
                })
            });

            let message = text.await?;
            log::debug!("Gemini streaming API error ({status}): {message}");

            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                message,
            });
        }

        Ok(split_lines(response.bytes_stream()))
    }

    async fn send(&self, url: &UpstreamUrl, body: &GenerateContentRequest) -> crate::Result<Response> {
        let body = sonic_rs::to_vec(body).map_err(|e| {
            log::error!("Failed to encode Gemini request: {e}");
            RelayError::Serialization("Failed to marshal Gemini request".to_string())
        })?;

        self.client
            .post(&url.full)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                log::error!("Failed to send request to {}: {e}", url.redacted);
                RelayError::UpstreamTransport("Failed to send request to Gemini API".to_string())
            })
    }

    async fn deadline<T>(&self, call: impl Future<Output = crate::Result<T>>) -> crate::Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("Gemini API did not answer within {:?}", self.timeout);
                Err(RelayError::UpstreamTransport(
                    "Timed out waiting for Gemini API".to_string(),
                ))
            }
        }
    }
}
