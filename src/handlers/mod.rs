//! HTTP endpoint handlers for the API.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/health`: Liveness check
//! - `/db-test`: Database server time
//! - `/api/tables`: Tables in the public schema
//! - `/api/table-stats`: Row counts and sizes per table
//! - `/api/pool-stats`: Connection pool occupancy
//! - `/metrics`: Prometheus metrics endpoint

pub mod database;
pub mod health;
pub mod metrics;
pub mod pool;

// Re-export handlers
pub use database::{db_test_handler, table_stats_handler, tables_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use pool::pool_stats_handler;
