//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - the proof-of-authority engine (roster, local miner, cadence),
//! - the metrics exporter (enable flag + listen address),
//! - the network identity gate.
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files, or
//! environment variables as needed.

use std::net::SocketAddr;

use crate::consensus::ConsensusConfig;

/// The network identifier on which the engine activates.
pub const POA_NETWORK_ID: &str = "poa";

/// Returns `true` when `network` is the proof-of-authority network.
///
/// On any other network the engine must stay inert: no producer task, no
/// authority checks.
pub fn is_poa_network(network: &str) -> bool {
    network == POA_NETWORK_ID
}

/// Raw proof-of-authority options, as read from the host's configuration
/// surface (`poa-miner-list`, `poa-miner`, `poa-interval`, `poa-timeout`).
///
/// Parsed into an engine by
/// [`crate::consensus::PoaEngine::from_options`]; keeping the raw form
/// separate means configuration reads happen exactly once, at construction.
#[derive(Clone, Debug, Default)]
pub struct PoaOptions {
    /// Comma-separated authority addresses (`poa-miner-list`). Required:
    /// the engine refuses to start when it is empty.
    pub miner_list: String,
    /// Address of the local authority (`poa-miner`). Optional; absence
    /// disables block production but not validation.
    pub miner: Option<String>,
    /// Cadence and polling parameters (`poa-interval`, `poa-timeout`).
    pub consensus: ConsensusConfig,
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9897"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a chain node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Network identifier; the engine only activates on
    /// [`POA_NETWORK_ID`].
    pub network: String,
    /// Proof-of-authority options.
    pub poa: PoaOptions,
    /// Prometheus metrics exporter.
    pub metrics: MetricsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: POA_NETWORK_ID.to_string(),
            poa: PoaOptions::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
