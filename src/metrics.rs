//! Prometheus metrics definitions for pg-introspect-api.
//!
//! `ApiMetrics` owns the registry and the three service instruments:
//! the HTTP request histogram, the database query histogram and the
//! pool connections gauge. Process and tokio runtime metrics are added
//! separately by `register_default_process_metrics`.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntGauge, Registry, TextEncoder,
    DEFAULT_BUCKETS,
};
use std::time::Instant;
use tracing::warn;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 16 * 1024;

/// Database query categories, one per query handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Timestamp,
    TablesList,
    TableStats,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Timestamp => "timestamp",
            QueryType::TablesList => "tables_list",
            QueryType::TableStats => "table_stats",
        }
    }
}

/// Collection of the service's Prometheus metrics.
pub struct ApiMetrics {
    registry: Registry,
    /// labels: method, route, code
    pub http_request_duration: HistogramVec,
    /// labels: query_type
    pub db_query_duration: HistogramVec,
    pub active_connections: Gauge,
}

impl ApiMetrics {
    /// Creates a fresh registry and registers the service instruments in it.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            )
            .buckets(DEFAULT_BUCKETS.to_vec()),
            &["method", "route", "code"],
        )?;
        let db_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "db_query_duration_seconds",
                "Duration of database queries in seconds",
            )
            .buckets(DEFAULT_BUCKETS.to_vec()),
            &["query_type"],
        )?;
        let active_connections =
            Gauge::new("api_active_connections", "Number of active connections")?;

        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(db_query_duration.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;

        Ok(Self {
            registry,
            http_request_duration,
            db_query_duration,
            active_connections,
        })
    }

    /// Adds process-level and tokio runtime metrics. Call once at startup;
    /// a second call fails with an already-registered error.
    pub fn register_default_process_metrics(&self) -> Result<(), prometheus::Error> {
        #[cfg(target_os = "linux")]
        self.registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        self.registry.register(Box::new(RuntimeCollector::new()?))?;
        Ok(())
    }

    /// Records one finished HTTP request. Failures are logged, never returned.
    pub fn observe_http_duration(&self, method: &str, route: &str, status: u16, seconds: f64) {
        let code = status.to_string();
        match self
            .http_request_duration
            .get_metric_with_label_values(&[method, route, code.as_str()])
        {
            Ok(histogram) => histogram.observe(seconds),
            Err(e) => warn!("Failed to record HTTP duration for {} {}: {}", method, route, e),
        }
    }

    /// Records one database query, successful or not.
    pub fn observe_query_duration(&self, query_type: QueryType, seconds: f64) {
        match self
            .db_query_duration
            .get_metric_with_label_values(&[query_type.as_str()])
        {
            Ok(histogram) => histogram.observe(seconds),
            Err(e) => warn!("Failed to record query duration for {:?}: {}", query_type, e),
        }
    }

    /// Starts a timer that records into the query histogram when dropped.
    pub fn start_query_timer(&self, query_type: QueryType) -> QueryTimer<'_> {
        QueryTimer {
            metrics: self,
            query_type,
            start: Instant::now(),
        }
    }

    pub fn set_active_connections(&self, n: u32) {
        self.active_connections.set(f64::from(n));
    }

    /// Encodes the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::with_capacity(BUFFER_CAP);
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Measures one query; the observation happens on drop so every exit path counts.
pub struct QueryTimer<'a> {
    metrics: &'a ApiMetrics,
    query_type: QueryType,
    start: Instant,
}

impl Drop for QueryTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .observe_query_duration(self.query_type, self.start.elapsed().as_secs_f64());
    }
}

/// Reports tokio scheduler state at scrape time.
pub struct RuntimeCollector {
    workers: IntGauge,
    alive_tasks: IntGauge,
    global_queue_depth: IntGauge,
    descs: Vec<Desc>,
}

impl RuntimeCollector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let workers = IntGauge::new(
            "tokio_runtime_workers",
            "Number of worker threads used by the runtime",
        )?;
        let alive_tasks = IntGauge::new(
            "tokio_runtime_alive_tasks",
            "Number of tasks currently alive in the runtime",
        )?;
        let global_queue_depth = IntGauge::new(
            "tokio_runtime_global_queue_depth",
            "Number of tasks waiting in the runtime's global queue",
        )?;

        let descs = [&workers, &alive_tasks, &global_queue_depth]
            .iter()
            .flat_map(|g| g.desc().into_iter().cloned())
            .collect();

        Ok(Self {
            workers,
            alive_tasks,
            global_queue_depth,
            descs,
        })
    }
}

impl Collector for RuntimeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        // Outside a runtime the last values are reported as-is.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let m = handle.metrics();
            self.workers.set(m.num_workers() as i64);
            self.alive_tasks.set(m.num_alive_tasks() as i64);
            self.global_queue_depth.set(m.global_queue_depth() as i64);
        }

        let mut families = Vec::with_capacity(3);
        families.extend(self.workers.collect());
        families.extend(self.alive_tasks.collect());
        families.extend(self.global_queue_depth.collect());
        families
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_count(metrics: &ApiMetrics, route: &str, code: &str) -> u64 {
        metrics
            .http_request_duration
            .with_label_values(&["GET", route, code])
            .get_sample_count()
    }

    #[test]
    fn custom_instruments_are_rendered() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.observe_http_duration("GET", "/health", 200, 0.002);
        metrics.observe_query_duration(QueryType::TableStats, 0.05);
        metrics.set_active_connections(4);

        let text = metrics.render().unwrap();
        assert!(text.contains("# TYPE http_request_duration_seconds histogram"));
        assert!(text.contains("# TYPE db_query_duration_seconds histogram"));
        assert!(text.contains("query_type=\"table_stats\""));
        assert!(text.contains("api_active_connections 4"));
    }

    #[test]
    fn http_observations_accumulate_per_label_set() {
        let metrics = ApiMetrics::new().unwrap();
        for _ in 0..3 {
            metrics.observe_http_duration("GET", "/health", 200, 0.001);
        }
        metrics.observe_http_duration("GET", "/db-test", 500, 0.2);

        assert_eq!(sample_count(&metrics, "/health", "200"), 3);
        assert_eq!(sample_count(&metrics, "/db-test", "500"), 1);
        assert_eq!(sample_count(&metrics, "/db-test", "200"), 0);
    }

    #[test]
    fn query_timer_records_on_drop() {
        let metrics = ApiMetrics::new().unwrap();
        {
            let _timer = metrics.start_query_timer(QueryType::Timestamp);
        }
        let count = metrics
            .db_query_duration
            .with_label_values(&["timestamp"])
            .get_sample_count();
        assert_eq!(count, 1);
    }

    #[test]
    fn gauge_tracks_last_value() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.set_active_connections(7);
        metrics.set_active_connections(2);
        assert_eq!(metrics.active_connections.get(), 2.0);
    }

    #[tokio::test]
    async fn default_metrics_register_once() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.register_default_process_metrics().unwrap();
        assert!(metrics.register_default_process_metrics().is_err());

        let text = metrics.render().unwrap();
        assert!(text.contains("tokio_runtime_workers"));
        assert!(text.contains("tokio_runtime_alive_tasks"));
        #[cfg(target_os = "linux")]
        assert!(text.contains("process_resident_memory_bytes"));
    }

    #[test]
    fn query_type_labels() {
        assert_eq!(QueryType::Timestamp.as_str(), "timestamp");
        assert_eq!(QueryType::TablesList.as_str(), "tables_list");
        assert_eq!(QueryType::TableStats.as_str(), "table_stats");
    }
}
