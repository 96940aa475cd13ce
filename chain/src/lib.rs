//! Chain library crate.
//!
//! This crate provides a proof-of-authority consensus engine for a
//! Bitcoin-derived chain node:
//!
//! - strongly-typed domain types (`types`),
//! - the authority roster, scheduler, validator, and producer loop
//!   (`consensus`),
//! - trait seams to the surrounding node plus an in-memory host (`host`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries can compose these pieces to build authority
//! nodes, validator-only nodes, and simulators.

pub mod config;
pub mod consensus;
pub mod host;
pub mod metrics;
pub mod types;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, NodeConfig, POA_NETWORK_ID, PoaOptions, is_poa_network};

// Re-export "core" consensus types and the engine.
pub use consensus::{
    AuthorityRegistry, BlockSigner, CacheStats, ConfigError, ConsensusConfig, EligibilityError,
    Miner, MinerCache, MinerSlot, PoaEngine, SignerError, ValidationError, recover_key_id,
};

// Re-export the host seams and the in-memory host.
pub use host::{
    AssemblyError, BlockAssembler, BlockIndex, BlockSink, KeyStore, MemHost, MinerHost, MockClock,
    SubmitError, SystemClock, TimeSource,
};

// Re-export metrics registry and exporter.
pub use metrics::{MetricsRegistry, PoaMetrics, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the host stack a "typical" small deployment runs on:
/// the in-memory host over the real clock.
pub type DefaultHost = MemHost<SystemClock>;
