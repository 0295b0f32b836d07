use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use access_log::{AccessLog, LogEntry};
use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, Request, StatusCode, header, request::Parts};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tower::Layer;

const MISSING_HEADER: &str = "Authorization header is required";
const INVALID_TOKEN: &str = "Invalid API key";

/// Rejects requests that do not carry the configured static bearer token.
#[derive(Clone)]
pub(crate) struct AuthLayer(Arc<AuthLayerInner>);

struct AuthLayerInner {
    token: SecretString,
    access_log: AccessLog,
}

impl AuthLayer {
    pub fn new(token: SecretString, access_log: AccessLog) -> Self {
        Self(Arc::new(AuthLayerInner { token, access_log }))
    }
}

impl<Service> Layer<Service> for AuthLayer
where
    Service: Send + Clone,
{
    type Service = AuthService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AuthService {
            next,
            layer: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AuthService<Service> {
    next: Service,
    layer: Arc<AuthLayerInner>,
}

impl AuthLayerInner {
    /// Returns the rejection message when the request is not authorized.
    fn check(&self, parts: &Parts) -> Result<(), &'static str> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Err(MISSING_HEADER);
        };

        let value = value.to_str().map_err(|_| INVALID_TOKEN)?;

        if value.is_empty() {
            return Err(MISSING_HEADER);
        }

        // Without the scheme prefix the whole header is taken as the token.
        let presented = value.strip_prefix("Bearer ").unwrap_or(value);

        if bool::from(presented.as_bytes().ct_eq(self.token.expose_secret().as_bytes())) {
            Ok(())
        } else {
            Err(INVALID_TOKEN)
        }
    }
}

impl<Service> tower::Service<Request<Body>> for AuthService<Service>
where
    Service: tower::Service<Request<Body>, Response = Response, Error = Infallible> + Send + Clone + 'static,
    Service::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut next = self.next.clone();
        let layer = self.layer.clone();

        let (parts, body) = req.into_parts();

        Box::pin(async move {
            let message = match layer.check(&parts) {
                Ok(()) => return next.call(Request::from_parts(parts, body)).await,
                Err(message) => message,
            };

            log::debug!("Rejecting {} {}: {message}", parts.method, parts.uri.path());

            let mut entry = LogEntry::new(relay::client_ip(&parts.extensions));
            entry.fail(StatusCode::UNAUTHORIZED.as_u16(), message);
            layer.access_log.record(entry);

            let mut response = (StatusCode::UNAUTHORIZED, message).into_response();
            let headers = response.headers_mut();

            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );

            Ok(response)
        })
    }
}
