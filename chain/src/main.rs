// src/main.rs
//
// Demo node that wires up the chain library:
//
// - In-memory host over the system clock
// - A generated three-authority roster, all three producing in-process
// - Validation of every new tip with a validator-only engine
// - Prometheus metrics exporter on /metrics
//
// A real deployment would give each authority its own node and wallet; one
// process driving the whole roster is the quickest way to watch the
// rotation work.

use std::{sync::Arc, time::Duration};

use k256::ecdsa::SigningKey;
use tokio::sync::watch;
use tracing::{error, info, warn};

use poa_chain::{
    ConsensusConfig, KeyId, MemHost, Miner, MetricsRegistry, NodeConfig, PoaEngine, PoaOptions,
    SystemClock, TimeSource, is_poa_network, run_prometheus_http_server,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run_node().await {
        error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    // For now, just use defaults. Later you can load from a file/CLI/env.
    let mut cfg = NodeConfig::default();
    cfg.poa.consensus = ConsensusConfig {
        interval: 2,
        timeout: 1,
        ..ConsensusConfig::default()
    };

    if !is_poa_network(&cfg.network) {
        return Err(format!(
            "network {:?} is not a proof-of-authority network",
            cfg.network
        ));
    }

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                warn!("metrics HTTP server error: {e}");
            }
        });
        info!("metrics exporter listening on http://{addr}/metrics");
    }

    // ---------------------------
    // Roster + in-memory host
    // ---------------------------

    // In a real node the roster comes from `poa-miner-list` and the keys
    // from the wallet; the demo generates three fresh authorities.
    let keys: Vec<SigningKey> = (0..3)
        .map(|_| SigningKey::random(&mut rand::thread_rng()))
        .collect();
    let ids: Vec<KeyId> = keys
        .iter()
        .map(|k| KeyId::from_verifying_key(k.verifying_key()))
        .collect();
    let miner_list = ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    info!(roster = %miner_list, "generated demo authority roster");

    let clock = SystemClock;
    let host = Arc::new(MemHost::new(clock, clock.adjusted_time()));
    for key in keys {
        host.import_key(key);
    }

    // ---------------------------
    // One producer task per authority
    // ---------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    for id in &ids {
        let options = PoaOptions {
            miner_list: miner_list.clone(),
            miner: Some(id.to_string()),
            consensus: cfg.poa.consensus.clone(),
        };
        let engine = Arc::new(
            PoaEngine::from_options(&options)
                .map_err(|e| format!("failed to initialise poa engine: {e}"))?,
        );
        let miner = Miner::new(engine, host.clone(), metrics.clone(), shutdown_rx.clone());
        tokio::spawn(miner.run());
    }

    // ---------------------------
    // Validator-only observer
    // ---------------------------

    let observer = PoaEngine::from_options(&PoaOptions {
        miner_list: miner_list.clone(),
        miner: None,
        consensus: cfg.poa.consensus.clone(),
    })
    .map_err(|e| format!("failed to initialise observer engine: {e}"))?;

    info!(
        interval = cfg.poa.consensus.interval,
        timeout = cfg.poa.consensus.timeout,
        "node running, ctrl-c to stop"
    );

    let mut last_seen = host.tip_header().hash();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                let _ = shutdown_tx.send(true);
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                let tip = host.tip_header();
                let tip_hash = tip.hash();
                if tip_hash == last_seen {
                    continue;
                }
                last_seen = tip_hash;

                let started = std::time::Instant::now();
                let verdict = observer.check_block(host.as_ref(), &tip);
                metrics
                    .poa
                    .block_check_seconds
                    .observe(started.elapsed().as_secs_f64());

                match verdict {
                    Ok(()) => info!(
                        height = tip.height,
                        block = %tip_hash,
                        time = tip.timestamp,
                        "new tip validates"
                    ),
                    Err(reason) => {
                        metrics.poa.blocks_rejected_total.inc();
                        warn!(block = %tip_hash, %reason, "new tip failed the authority check");
                    }
                }
                metrics
                    .poa
                    .miner_cache_hit_ratio
                    .set(observer.cache().stats().hit_ratio());
            }
        }
    }

    Ok(())
}
