//! The proof-of-authority engine value.
//!
//! The engine bundles the immutable pieces of the protocol — cadence
//! configuration, the authority roster, the optional local miner identity —
//! with the miner cache. It is constructed exactly once at startup from
//! parsed options and then shared (behind an `Arc`) by the producer task and
//! whichever tasks run block validation; there is no global instance.
//!
//! The scheduling and validation operations live in sibling modules as
//! further `impl PoaEngine` blocks:
//!
//! - [`super::scheduler`]: `next_miners`, `block_miner`, `next_slot`;
//! - [`super::validator`]: `check_block`.

use crate::config::PoaOptions;
use crate::types::KeyId;

use super::cache::MinerCache;
use super::config::ConsensusConfig;
use super::error::ConfigError;
use super::registry::AuthorityRegistry;

/// Shared, immutable state of the proof-of-authority protocol.
#[derive(Debug)]
pub struct PoaEngine {
    config: ConsensusConfig,
    registry: AuthorityRegistry,
    cache: MinerCache,
    local_miner: Option<KeyId>,
}

impl PoaEngine {
    /// Builds an engine from an already-parsed roster.
    ///
    /// `local_miner`, when present, must be a roster member; block
    /// production is disabled without it, validation is unaffected.
    pub fn new(
        config: ConsensusConfig,
        registry: AuthorityRegistry,
        local_miner: Option<KeyId>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(miner) = &local_miner {
            if !registry.contains(miner) {
                return Err(ConfigError::MinerNotInRoster(miner.to_string()));
            }
        }
        let cache = MinerCache::with_capacity(config.cache_capacity);
        Ok(Self {
            config,
            registry,
            cache,
            local_miner,
        })
    }

    /// Builds an engine from raw configuration options.
    ///
    /// This is the host-facing construction path: it parses the
    /// comma-separated miner list, resolves the optional local miner
    /// address, and validates the cadence parameters. Any failure is a
    /// [`ConfigError`] the host may log before continuing without
    /// proof-of-authority participation.
    pub fn from_options(options: &PoaOptions) -> Result<Self, ConfigError> {
        if options.miner_list.is_empty() {
            return Err(ConfigError::MissingMinerList);
        }
        let registry = AuthorityRegistry::parse(&options.miner_list)?;

        let local_miner = match &options.miner {
            Some(address) => {
                let keyid = KeyId::from_hex(address)
                    .ok_or_else(|| ConfigError::MalformedAddress(address.clone()))?;
                Some(keyid)
            }
            None => None,
        };

        Self::new(options.consensus.clone(), registry, local_miner)
    }

    /// The cadence configuration.
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// The configured authority roster.
    pub fn registry(&self) -> &AuthorityRegistry {
        &self.registry
    }

    /// The miner cache backing scheduling and recovery.
    pub fn cache(&self) -> &MinerCache {
        &self.cache
    }

    /// The local authority, when this node is configured to produce blocks.
    pub fn local_miner(&self) -> Option<KeyId> {
        self.local_miner
    }
}
