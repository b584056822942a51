//! HTTP server composition and serving.
//!
//! Layers, outermost first: request tracing, body limit, duration
//! instrumentation, panic translation, then the routes.

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use std::future::Future;
use std::net::SocketAddr;
use tokio::{net::TcpListener, signal};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::config::DEFAULT_BODY_LIMIT_KB;
use crate::handlers::{
    db_test_handler, health_handler, metrics_handler, pool_stats_handler, table_stats_handler,
    tables_handler,
};
use crate::middleware::{handle_panic, track_http_duration};
use crate::state::SharedState;

/// The fixed route table.
pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/db-test", get(db_test_handler))
        .route("/api/tables", get(tables_handler))
        .route("/api/table-stats", get(table_stats_handler))
        .route("/api/pool-stats", get(pool_stats_handler))
        .route("/metrics", get(metrics_handler))
}

/// Wraps `routes` in the service's middleware stack and binds the state.
pub fn with_layers(routes: Router<SharedState>, state: SharedState) -> Router {
    let body_limit = state.config.body_limit_kb.unwrap_or(DEFAULT_BODY_LIMIT_KB) * 1024;

    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_http_duration,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the complete application router.
pub fn build_router(state: SharedState) -> Router {
    with_layers(api_routes(), state)
}

/// Resolves when SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Serves `app` on `addr` until `shutdown` resolves, over TLS when paths are given.
pub async fn serve<F>(
    app: Router,
    addr: SocketAddr,
    tls: Option<(String, String)>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tls {
        Some((cert_path, key_path)) => {
            info!("Loading TLS certificate from: {}", cert_path);
            info!("Loading TLS private key from: {}", key_path);

            let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
                .await
                .map_err(|e| {
                    error!("Failed to load TLS configuration: {}", e);
                    e
                })?;

            info!("pg-introspect-api listening on https://{}", addr);
            let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!("Server error: {}", e);
                        return Err(e.into());
                    }
                }
                _ = shutdown => {
                    info!("Shutdown signal received, exiting...");
                }
            }
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            info!("pg-introspect-api listening on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(|e| {
                    error!("Server error: {}", e);
                    e
                })?;
        }
    }

    Ok(())
}
