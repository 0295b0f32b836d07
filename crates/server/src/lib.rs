//! Gembridge server library.
//!
//! Provides a reusable server function to serve Gembridge either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod auth;
mod cors;
mod health;

use std::net::SocketAddr;

use access_log::AccessLog;
use anyhow::anyhow;
use auth::AuthLayer;
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use config::Config;
use http::StatusCode;
use tokio::net::TcpListener;

/// Configuration for serving Gembridge.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Gembridge TOML configuration.
    pub config: Config,
}

/// Starts and runs the Gembridge server with the provided configuration.
///
/// Returns once the process receives Ctrl+C and in-flight requests have finished.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let access_log = AccessLog::init(&config.access_log).await;

    let body_limit = match config.server.body_limit {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let mut completions = relay::router(&config.gemini, access_log.clone())?.layer(body_limit);

    match config.auth.token {
        Some(ref token) => {
            log::debug!("Bearer token authentication enabled");
            completions = completions.layer(AuthLayer::new(token.clone(), access_log));
        }
        None => log::warn!("No auth token configured, the completions endpoint is open to anyone"),
    }

    let mut app = Router::new().merge(completions);

    // Health stays reachable without a token.
    if config.server.health.enabled {
        app = app.route(&config.server.health.path, get(health::health));
    }

    let app = cors::inject_layer(app.fallback(|| async { StatusCode::NOT_FOUND }));

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!(
        "Chat completions endpoint available at: http://{listen_address}{}",
        relay::COMPLETIONS_PATH
    );

    if config.server.health.enabled {
        log::info!(
            "Health check endpoint exposed at http://{listen_address}{}",
            config.server.health.path
        );
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    log::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutdown signal received, finishing in-flight requests"),
        Err(e) => {
            log::error!("Failed to listen for the shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}
