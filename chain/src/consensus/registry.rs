//! The configured authority roster.
//!
//! The registry is parsed once at engine construction from the
//! comma-separated miner-list option and never changes for the lifetime of
//! the process. It pairs the ordered roster (which drives rotation order)
//! with a set (which answers membership queries in O(1)).

use std::collections::HashSet;

use crate::types::KeyId;

use super::error::ConfigError;

/// Immutable, ordered roster of authorities permitted to produce blocks.
///
/// Read-only after construction and safe to share across threads without
/// synchronization.
#[derive(Clone, Debug)]
pub struct AuthorityRegistry {
    list: Vec<KeyId>,
    set: HashSet<KeyId>,
}

impl AuthorityRegistry {
    /// Parses a comma-separated list of hex authority addresses.
    ///
    /// Rejects empty lists, addresses that do not decode to a key
    /// identifier, and duplicate entries.
    pub fn parse(miner_list: &str) -> Result<Self, ConfigError> {
        if miner_list.trim().is_empty() {
            return Err(ConfigError::EmptyMinerList);
        }

        let mut list = Vec::new();
        let mut set = HashSet::new();
        for address in miner_list.split(',') {
            let address = address.trim();
            let keyid = KeyId::from_hex(address)
                .ok_or_else(|| ConfigError::MalformedAddress(address.to_string()))?;
            if !set.insert(keyid) {
                return Err(ConfigError::DuplicateMiner(address.to_string()));
            }
            list.push(keyid);
        }

        Ok(Self { list, set })
    }

    /// Builds a registry directly from an ordered list of key identifiers.
    ///
    /// Rejects empty and duplicated input with the same errors as
    /// [`AuthorityRegistry::parse`].
    pub fn from_key_ids(ids: Vec<KeyId>) -> Result<Self, ConfigError> {
        if ids.is_empty() {
            return Err(ConfigError::EmptyMinerList);
        }
        let mut set = HashSet::new();
        for id in &ids {
            if !set.insert(*id) {
                return Err(ConfigError::DuplicateMiner(id.to_string()));
            }
        }
        Ok(Self { list: ids, set })
    }

    /// Number of authorities in the roster.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` when the roster is empty (never, post-construction).
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Membership test, O(1).
    pub fn contains(&self, keyid: &KeyId) -> bool {
        self.set.contains(keyid)
    }

    /// Position of an authority in the roster, O(n).
    pub fn index_of(&self, keyid: &KeyId) -> Option<usize> {
        self.list.iter().position(|k| k == keyid)
    }

    /// Iterates the roster in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyId> {
        self.list.iter()
    }

    /// Iterates the roster in circular order starting *after* `index` and
    /// stopping *before* it comes around again.
    ///
    /// This is the rotation order used to rank eligible miners relative to
    /// the last producer; the producer's own position is visited at neither
    /// end, so for a single-entry roster the iterator is empty.
    pub fn rotation_after(&self, index: usize) -> impl Iterator<Item = &KeyId> {
        let n = self.list.len();
        (1..n).map(move |step| &self.list[(index + step) % n])
    }
}
