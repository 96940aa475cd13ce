//! Metrics for the proof-of-authority engine.

mod prometheus;

pub use self::prometheus::{MetricsRegistry, PoaMetrics, run_prometheus_http_server};
