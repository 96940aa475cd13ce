//! Consensus configuration parameters.
//!
//! This includes both protocol-level knobs (block cadence) and
//! implementation-level ones (polling periods, cache size).

use super::error::ConfigError;

/// Consensus configuration for the proof-of-authority engine.
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Seconds between a block's timestamp and the earliest timestamp its
    /// primary successor may carry.
    pub interval: u32,
    /// Additional seconds granted to each fallback authority, cascading by
    /// position in the eligible-miner list.
    pub timeout: u32,
    /// How often the producer loop polls the chain tip, in milliseconds.
    pub tip_poll_ms: u64,
    /// How often the producer loop polls the wallet for the miner key while
    /// it is still locked, in milliseconds.
    pub key_poll_ms: u64,
    /// Capacity of each miner-cache namespace (entries).
    pub cache_capacity: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            timeout: 3,
            tip_poll_ms: 100,
            key_poll_ms: 3000,
            cache_capacity: 4096,
        }
    }
}

impl ConsensusConfig {
    /// Checks that the cadence parameters are usable.
    ///
    /// A zero interval or timeout would collapse the miner schedule, so both
    /// are rejected at engine construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
