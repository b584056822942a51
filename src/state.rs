//! Application state management for the API.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and middleware. It is built once in `main` and handed
//! out by reference; nothing in the crate keeps a global registry.

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::metrics::ApiMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// State shared across requests and the background sampler.
pub struct AppState {
    pub db: DbPool,
    pub metrics: Arc<ApiMetrics>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbPool, metrics: Arc<ApiMetrics>, config: Config) -> SharedState {
        Arc::new(Self {
            db,
            metrics,
            config: Arc::new(config),
        })
    }
}
