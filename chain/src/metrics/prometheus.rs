//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed proof-of-authority metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::warn;

use prometheus::{
    self, Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Proof-of-authority Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the producer
/// loop and from whatever task runs block validation.
#[derive(Clone)]
pub struct PoaMetrics {
    /// Latency of a full schedule query (window walk + ordering), in
    /// seconds. Dominated by signature recovery on cold caches.
    pub schedule_seconds: Histogram,
    /// Latency of validating a block header's authorship and timing.
    pub block_check_seconds: Histogram,
    /// Blocks produced and newly accepted by the host.
    pub blocks_produced_total: IntCounter,
    /// Build/wait rounds abandoned because the tip moved underneath them.
    pub blocks_abandoned_total: IntCounter,
    /// Incoming blocks rejected by the authority check.
    pub blocks_rejected_total: IntCounter,
    /// Ratio of miner-cache hits over total lookups (0–1).
    ///
    /// Updated periodically by the node from
    /// [`crate::consensus::MinerCache::stats`].
    pub miner_cache_hit_ratio: Gauge,
}

impl PoaMetrics {
    /// Registers the proof-of-authority metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let schedule_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "poa_schedule_seconds",
                "Time to compute the next-block miner schedule in seconds",
            )
            .buckets(vec![
                0.00001, 0.0001, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )?;
        registry.register(Box::new(schedule_seconds.clone()))?;

        let block_check_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "poa_block_check_seconds",
                "Time to validate a block header's authorship and timing in seconds",
            )
            .buckets(vec![
                0.00001, 0.0001, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )?;
        registry.register(Box::new(block_check_seconds.clone()))?;

        let blocks_produced_total = IntCounter::with_opts(Opts::new(
            "poa_blocks_produced_total",
            "Total number of locally produced blocks accepted by the host",
        ))?;
        registry.register(Box::new(blocks_produced_total.clone()))?;

        let blocks_abandoned_total = IntCounter::with_opts(Opts::new(
            "poa_blocks_abandoned_total",
            "Total number of production rounds abandoned due to a tip change",
        ))?;
        registry.register(Box::new(blocks_abandoned_total.clone()))?;

        let blocks_rejected_total = IntCounter::with_opts(Opts::new(
            "poa_blocks_rejected_total",
            "Total number of incoming blocks rejected by the authority check",
        ))?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        let miner_cache_hit_ratio = Gauge::with_opts(Opts::new(
            "poa_miner_cache_hit_ratio",
            "Ratio of miner-cache hits over total lookups (0..1)",
        ))?;
        registry.register(Box::new(miner_cache_hit_ratio.clone()))?;

        Ok(Self {
            schedule_seconds,
            block_check_seconds,
            blocks_produced_total,
            blocks_abandoned_total,
            blocks_rejected_total,
            miner_cache_hit_ratio,
        })
    }
}

/// Wrapper around a Prometheus registry and the engine metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub poa: PoaMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the proof-of-authority metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let poa = PoaMetrics::register(&registry)?;
        Ok(Self { registry, poa })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9897".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                warn!(error = %err, "prometheus HTTP server error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
