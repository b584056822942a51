//! Connection pool statistics endpoint handler.

use axum::{extract::State, Json};
use tracing::{debug, instrument};

use crate::db::PoolSnapshot;
use crate::state::SharedState;

/// Handler for the /api/pool-stats endpoint. Reads in-memory counters only.
#[instrument(skip(state))]
pub async fn pool_stats_handler(State(state): State<SharedState>) -> Json<PoolSnapshot> {
    let snapshot = state.db.stats();
    debug!(
        "Pool stats: total={} idle={} waiting={}",
        snapshot.total, snapshot.idle, snapshot.waiting
    );
    Json(snapshot)
}
