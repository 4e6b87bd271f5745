//! HTTP server for the operator API.

use std::future::Future;

use axum::Router;
use tracing::debug;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Start the API server with graceful shutdown support.
///
/// In-flight requests (claims included) run to completion when the
/// shutdown future resolves; a claim is a single atomic operation and
/// is never cancelled midway.
pub async fn serve_with_shutdown<F>(
    app: Router,
    config: ServerConfig,
    shutdown_signal: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    debug!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}
