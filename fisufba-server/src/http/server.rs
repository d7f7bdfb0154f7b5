//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing and per-request timeout middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C, bounded by a drain deadline
//! - The gateway closed once serving stops

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode, Uri};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::routes;
use crate::config::ServerConfig;
use crate::db::Gateway;

const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8000",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8000",
];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
}

/// Build the full router: routes, fallback and middleware.
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    // CORS configuration
    let cors = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(LOCAL_ORIGINS.map(HeaderValue::from_static))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(routes::health::router())
        .merge(routes::index::router())
        .merge(routes::sessions::router())
        .merge(routes::accounts::router())
        .merge(routes::patient_information::router())
        .merge(routes::sociodemographic::router())
        .fallback(fallback)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(middleware::map_response(timeout_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unmatched routes
async fn fallback(uri: Uri) -> ApiError {
    ApiError::NotFound {
        resource: "route",
        id: uri.path().to_owned(),
    }
}

/// The timeout layer answers with an empty body; give it the usual JSON shape.
async fn timeout_body(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return ApiError::Timeout.into_response();
    }
    response
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let gateway = Gateway::connect(&config.database).await?;
/// run_server(gateway, config.server.clone()).await?;
/// ```
pub async fn run_server(gateway: Gateway, config: ServerConfig) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind_addr,
            source,
        })?;
    serve(listener, gateway, config, shutdown_signal()).await
}

/// Serve on `listener` until `shutdown` resolves.
///
/// After the signal no new connections are accepted and open ones get
/// `drain_timeout` to wind down. Past the deadline we stop waiting on them;
/// their tasks keep running, bounded by the request timeout, and
/// `Gateway::close` returns once their connections are back in the pool.
pub async fn serve<F>(
    listener: TcpListener,
    gateway: Gateway,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(AppState {
        gateway: gateway.clone(),
    });
    let app = router(state, &config);

    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let (drain_tx, mut drain_rx) = watch::channel(false);
    let signal = async move {
        shutdown.await;
        let _ = drain_tx.send(true);
    };
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .into_future();

    let drain_timeout = config.drain_timeout;
    let drain_deadline = async move {
        if drain_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(drain_timeout).await;
    };

    let result = tokio::select! {
        result = server => result.map_err(ServerError::from),
        _ = drain_deadline => {
            tracing::warn!(
                ?drain_timeout,
                "drain deadline passed, closing pool once remaining requests release their connections"
            );
            Ok(())
        }
    };

    gateway.close().await;
    tracing::info!("Server shutdown complete");
    result
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
