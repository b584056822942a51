//! Database-backed endpoint handlers.
//!
//! Each handler runs one fixed SQL statement through the pool adapter under
//! a query timer and passes the rows through as JSON. On failure the detail
//! is logged and the caller gets the handler's fixed message with a 500.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::db::Row;
use crate::error::{ApiError, DatabaseError};
use crate::metrics::QueryType;
use crate::state::{AppState, SharedState};

pub const TIMESTAMP_SQL: &str = "SELECT NOW()";

pub const TABLES_SQL: &str = "\
    SELECT table_name \
    FROM information_schema.tables \
    WHERE table_schema = 'public'";

pub const TABLE_STATS_SQL: &str = "\
    SELECT \
      C.relname AS table_name, \
      S.n_live_tup AS row_count, \
      pg_size_pretty(pg_total_relation_size(C.oid)) AS total_size \
    FROM pg_class C \
    LEFT JOIN pg_namespace N ON (N.oid = C.relnamespace) \
    LEFT JOIN pg_stat_user_tables S ON (S.relid = C.oid) \
    WHERE N.nspname NOT IN ('pg_catalog', 'information_schema') \
    AND C.relkind = 'r'";

pub const DB_TEST_FAILED: &str = "Database connection failed";
pub const TABLES_FAILED: &str = "Failed to get tables";
pub const TABLE_STATS_FAILED: &str = "Failed to get table statistics";

#[derive(Debug, Serialize)]
pub struct TimestampResponse {
    pub time: Value,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<Row>,
}

#[derive(Debug, Serialize)]
pub struct TableStatsResponse {
    pub statistics: Vec<Row>,
}

/// Runs `sql` with the query histogram timing it on both outcomes.
async fn timed_query(
    state: &AppState,
    query_type: QueryType,
    sql: &str,
) -> Result<Vec<Row>, DatabaseError> {
    let _timer = state.metrics.start_query_timer(query_type);
    state.db.query(sql).await
}

/// Handler for the /db-test endpoint.
#[instrument(skip(state))]
pub async fn db_test_handler(
    State(state): State<SharedState>,
) -> Result<Json<TimestampResponse>, ApiError> {
    let rows = timed_query(&state, QueryType::Timestamp, TIMESTAMP_SQL)
        .await
        .map_err(ApiError::database(DB_TEST_FAILED))?;

    let time = rows
        .into_iter()
        .next()
        .and_then(|mut row| row.remove("now"))
        .ok_or(DatabaseError::EmptyResult)
        .map_err(ApiError::database(DB_TEST_FAILED))?;

    debug!("Database time: {}", time);
    Ok(Json(TimestampResponse { time }))
}

/// Handler for the /api/tables endpoint.
#[instrument(skip(state))]
pub async fn tables_handler(
    State(state): State<SharedState>,
) -> Result<Json<TablesResponse>, ApiError> {
    let tables = timed_query(&state, QueryType::TablesList, TABLES_SQL)
        .await
        .map_err(ApiError::database(TABLES_FAILED))?;

    debug!("Listed {} tables", tables.len());
    Ok(Json(TablesResponse { tables }))
}

/// Handler for the /api/table-stats endpoint.
///
/// Rows are passed through as decoded: `row_count` is `int8` and is emitted
/// as a JSON number (not the string form some drivers use for 64-bit
/// integers), `null` for tables without statistics yet. `total_size` is the
/// `pg_size_pretty` text.
#[instrument(skip(state))]
pub async fn table_stats_handler(
    State(state): State<SharedState>,
) -> Result<Json<TableStatsResponse>, ApiError> {
    let statistics = timed_query(&state, QueryType::TableStats, TABLE_STATS_SQL)
        .await
        .map_err(ApiError::database(TABLE_STATS_FAILED))?;

    debug!("Collected statistics for {} tables", statistics.len());
    Ok(Json(TableStatsResponse { statistics }))
}
