//! PostgreSQL connection pool adapter.
//!
//! Wraps a lazily connected `sqlx::PgPool`: connections are opened on first
//! checkout, each query checks one out and returns it when done (or failed),
//! and checkouts beyond `max_connections` queue inside the pool. A checkout
//! that needs a new connection makes exactly one connect attempt; a refused
//! or failed connect fails the query at once. Rows come back as JSON objects
//! keyed by column name so handlers can pass them through without knowing
//! their shape.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{
    PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow, PgTypeInfo, PgTypeKind,
    Postgres,
};
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

/// One result row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    /// Open connections, idle or checked out.
    pub total: u32,
    /// Open connections not currently checked out.
    pub idle: u32,
    /// Callers queued for a connection.
    pub waiting: u32,
}

impl PoolSnapshot {
    /// `total - idle - waiting`, floored at zero.
    pub fn active(&self) -> u32 {
        self.total
            .saturating_sub(self.idle)
            .saturating_sub(self.waiting)
    }
}

/// Anything that can report pool occupancy without blocking.
pub trait PoolStatsSource {
    fn stats(&self) -> PoolSnapshot;
}

/// Shared handle to the database pool.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
    options: PgConnectOptions,
    max_connections: u32,
    acquire_timeout: Duration,
    waiting: Arc<AtomicUsize>,
    /// Bounds concurrent connect attempts to the pool size.
    dialing: Arc<Semaphore>,
}

/// Counts a caller as waiting until the checkout resolves or is dropped.
struct WaitGuard<'a>(&'a AtomicUsize);

impl<'a> WaitGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl DbPool {
    /// Creates the pool without opening any connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = config.connect_options();
        let acquire_timeout = Duration::from_millis(config.acquire_timeout_ms);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(0)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options.clone());

        info!(
            "Database pool configured for {}@{}:{}/{} (max {} connections)",
            config.user, config.host, config.port, config.name, config.max_connections
        );

        Self {
            pool,
            options,
            max_connections: config.max_connections,
            acquire_timeout,
            waiting: Arc::new(AtomicUsize::new(0)),
            dialing: Arc::new(Semaphore::new(config.max_connections as usize)),
        }
    }

    /// Executes a literal SQL statement and returns its rows.
    #[instrument(skip(self), level = "debug")]
    pub async fn query(&self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        let mut conn = self.checkout().await?;

        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(DatabaseError::Query)?;

        debug!("Query returned {} rows", rows.len());
        rows.iter().map(decode_row).collect()
    }

    /// Takes an idle connection, or opens one if the pool has room, or queues.
    ///
    /// sqlx retries refused connects with backoff until the acquire timeout,
    /// so a new connection is first dialed once outside the pool and any
    /// failure is returned as is.
    async fn checkout(&self) -> Result<PoolConnection<Postgres>, DatabaseError> {
        if let Some(conn) = self.pool.try_acquire() {
            return Ok(conn);
        }

        let _waiting = WaitGuard::enter(&self.waiting);
        if self.pool.size() < self.max_connections {
            let _permit = self
                .dialing
                .acquire()
                .await
                .map_err(|_| DatabaseError::Checkout(sqlx::Error::PoolClosed))?;
            if self.pool.size() < self.max_connections {
                self.dial_once().await?;
            }
        }

        self.pool.acquire().await.map_err(DatabaseError::Checkout)
    }

    /// One connect attempt, bounded by the acquire timeout.
    async fn dial_once(&self) -> Result<(), DatabaseError> {
        let conn = tokio::time::timeout(
            self.acquire_timeout,
            PgConnection::connect_with(&self.options),
        )
        .await
        .map_err(|_| DatabaseError::Checkout(sqlx::Error::PoolTimedOut))?
        .map_err(DatabaseError::Checkout)?;

        if let Err(e) = conn.close().await {
            debug!("Closing reachability connection failed: {}", e);
        }
        Ok(())
    }

    /// Current pool counters. Never blocks and never fails.
    pub fn stats(&self) -> PoolSnapshot {
        let total = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        let waiting = u32::try_from(self.waiting.load(Ordering::Relaxed)).unwrap_or(u32::MAX);

        // size() and num_idle() are read separately; keep idle <= total.
        PoolSnapshot {
            total,
            idle: idle.min(total),
            waiting,
        }
    }

    /// Closes every connection and rejects further checkouts.
    pub async fn close(&self) {
        self.dialing.close();
        self.pool.close().await;
        info!("Database pool closed");
    }
}

impl PoolStatsSource for DbPool {
    fn stats(&self) -> PoolSnapshot {
        DbPool::stats(self)
    }
}

fn decode_row(row: &PgRow) -> Result<Row, DatabaseError> {
    let mut out = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx).map_err(|source| DatabaseError::Decode {
            column: column.name().to_string(),
            source,
        })?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    // Types are matched on the resolved base type, so decode unchecked.
    let value = match base_type(row.columns()[idx].type_info()).name() {
        "BOOL" => Value::Bool(row.try_get_unchecked::<bool, _>(idx)?),
        "INT2" => Value::from(row.try_get_unchecked::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get_unchecked::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get_unchecked::<i64, _>(idx)?),
        "OID" => Value::from(row.try_get_unchecked::<Oid, _>(idx)?.0),
        "FLOAT4" => float_value(row.try_get_unchecked::<f32, _>(idx)? as f64),
        "FLOAT8" => float_value(row.try_get_unchecked::<f64, _>(idx)?),
        // Text keeps every digit.
        "NUMERIC" => Value::String(row.try_get_unchecked::<BigDecimal, _>(idx)?.to_string()),
        "UUID" => Value::String(row.try_get_unchecked::<Uuid, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => {
            let ts = row.try_get_unchecked::<chrono::DateTime<chrono::Utc>, _>(idx)?;
            Value::String(ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        }
        "TIMESTAMP" => {
            let ts = row.try_get_unchecked::<chrono::NaiveDateTime, _>(idx)?;
            Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
        }
        "DATE" => Value::String(row.try_get_unchecked::<chrono::NaiveDate, _>(idx)?.to_string()),
        "JSON" | "JSONB" => row.try_get_unchecked::<Value, _>(idx)?,
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            Value::String(row.try_get_unchecked::<String, _>(idx)?)
        }
        other => {
            return Err(sqlx::Error::Decode(
                format!("unsupported column type {other}").into(),
            ))
        }
    };
    Ok(value)
}

/// Follows domains (such as `information_schema.sql_identifier`) to their base type.
fn base_type(info: &PgTypeInfo) -> &PgTypeInfo {
    match info.kind() {
        PgTypeKind::Domain(base) => base_type(base),
        _ => info,
    }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_is_total_minus_idle_minus_waiting() {
        let snap = PoolSnapshot {
            total: 8,
            idle: 3,
            waiting: 2,
        };
        assert_eq!(snap.active(), 3);
        assert!(snap.idle + snap.active() <= snap.total);
        assert_eq!(PoolSnapshot::default().active(), 0);

        // Queued callers on an empty pool never make active negative.
        let queued = PoolSnapshot {
            total: 0,
            idle: 0,
            waiting: 5,
        };
        assert_eq!(queued.active(), 0);
        assert!(queued.idle + queued.active() <= queued.total);
    }

    #[test]
    fn wait_guard_releases_on_drop() {
        let counter = AtomicUsize::new(0);
        {
            let _a = WaitGuard::enter(&counter);
            let _b = WaitGuard::enter(&counter);
            assert_eq!(counter.load(Ordering::Relaxed), 2);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(1.5), Value::from(1.5));
    }

    #[tokio::test]
    async fn refused_connect_fails_on_first_attempt() {
        let mut config = DatabaseConfig::default();
        config.host = "127.0.0.1".into();
        config.port = 1;
        assert_eq!(config.acquire_timeout_ms, 30_000);
        let pool = DbPool::connect_lazy(&config);

        let started = std::time::Instant::now();
        let err = pool.query("SELECT 1").await.unwrap_err();

        assert!(matches!(err, DatabaseError::Checkout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(pool.stats(), PoolSnapshot::default());
    }

    #[tokio::test]
    async fn closed_pool_rejects_checkout() {
        let pool = DbPool::connect_lazy(&DatabaseConfig::default());
        pool.close().await;
        assert!(matches!(
            pool.query("SELECT 1").await,
            Err(DatabaseError::Checkout(_))
        ));
    }

    #[tokio::test]
    async fn lazy_pool_reports_zeros() {
        let pool = DbPool::connect_lazy(&DatabaseConfig::default());
        assert_eq!(pool.stats(), PoolSnapshot::default());
    }
}
