//! pg-introspect-api library
//!
//! A small HTTP service that forwards a handful of read-only introspection
//! queries to PostgreSQL and exposes Prometheus metrics about itself and its
//! connection pool.
//!
//! # Components
//!
//! - **Metrics registry** ([`metrics::ApiMetrics`]): HTTP and query latency
//!   histograms, the pool gauge, process and tokio runtime metrics
//! - **Pool adapter** ([`db::DbPool`]): lazy `sqlx` pool with non-blocking stats
//! - **Instrumentation** ([`middleware`]): per-request duration, panic translation
//! - **Handlers** ([`handlers`]): `/health`, `/db-test`, `/api/tables`,
//!   `/api/table-stats`, `/api/pool-stats`, `/metrics`
//! - **Sampler** ([`sampler`]): copies pool size into the gauge on an interval
//!
//! # Usage
//!
//! ```no_run
//! use pg_introspect_api::{build_router, ApiMetrics, AppState, Config, DbPool};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let metrics = Arc::new(ApiMetrics::new()?);
//! metrics.register_default_process_metrics()?;
//!
//! let db = DbPool::connect_lazy(&config.database);
//! let state = AppState::new(db, metrics, config);
//! let app = build_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod sampler;
pub mod server;
pub mod state;

// Re-export main types for convenience
pub use config::{Config, DatabaseConfig};
pub use db::{DbPool, PoolSnapshot, PoolStatsSource};
pub use error::{ApiError, DatabaseError};
pub use metrics::{ApiMetrics, QueryType};
pub use server::build_router;
pub use state::{AppState, SharedState};
