//! Block types and hashing.
//!
//! This module defines the header and block structures used by the engine,
//! together with the canonical hashing routines. Serialization is done with
//! **bincode 2** using the `serde` integration
//! (`bincode::serde::encode_to_vec`) and an explicit `standard()` config; the
//! same canonical encoding is used everywhere we need header bytes.
//!
//! Two digests matter for proof-of-authority:
//!
//! - [`Header::hash`] — the block hash, over the full header including the
//!   signature field; this is the identity of a block in the index.
//! - [`Header::hash_without_sig`] — the signing pre-image, over the header
//!   with the signature field cleared; this is what the producer signs and
//!   what the validator recovers the producer from.

use serde::{Deserialize, Serialize};

use super::{BlockSignature, Hash256, Script};

/// Strongly-typed block hash.
///
/// This is the content hash of a [`Header`], computed as a BLAKE3-256 digest
/// over the canonical bincode-2 serialization. Wrapping the underlying
/// [`Hash256`] avoids passing raw byte arrays around in public APIs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block header: linking, ordering, and authorship fields.
///
/// The producer of a block is not carried explicitly; it is recovered from
/// `signature` over [`Header::hash_without_sig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Header {
    /// Hash of the parent block in the canonical chain.
    pub parent: BlockHash,

    /// Height of this block; the genesis block is height 0.
    pub height: u64,

    /// Block timestamp, in seconds since Unix epoch.
    ///
    /// 32-bit, as in the Bitcoin-derived wire format. Consensus constrains
    /// this from below via the authority schedule; the upper bound is the
    /// host's ordinary timestamp validity rule.
    pub timestamp: u32,

    /// Merkle root over the block's transactions.
    pub merkle_root: Hash256,

    /// Recoverable producer signature (`vchBlockSig`), appended to the
    /// standard header fields. Empty until the block is signed.
    pub signature: BlockSignature,
}

impl Header {
    /// Builds the genesis header for a chain starting at `timestamp`.
    pub fn genesis(timestamp: u32) -> Self {
        Header {
            parent: BlockHash(Hash256::zero()),
            height: 0,
            timestamp,
            merkle_root: Hash256::zero(),
            signature: BlockSignature::empty(),
        }
    }

    /// Returns the canonical byte representation of this header.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming error,
    /// because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("Header should always be serializable with bincode 2 + serde")
    }

    /// Computes the block hash: BLAKE3-256 over the canonical bytes of the
    /// full header, signature included.
    pub fn hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(&self.canonical_bytes()))
    }

    /// Computes the signing pre-image digest: BLAKE3-256 over the canonical
    /// bytes of the header with the signature field cleared.
    ///
    /// Signing and recovery must both go through this method so that the
    /// digest never covers the signature itself.
    pub fn hash_without_sig(&self) -> Hash256 {
        let mut unsigned = self.clone();
        unsigned.signature = BlockSignature::empty();
        Hash256::compute(&unsigned.canonical_bytes())
    }

    /// Returns `true` for the genesis header.
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// Opaque transaction payload.
///
/// Transaction semantics (selection, fees, script execution) live in the
/// host; consensus only needs stable bytes to commit to via the merkle root.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Raw transaction bytes in the host's wire encoding.
    pub data: Vec<u8>,
}

impl Transaction {
    /// Builds the coinbase transaction paying `reward` at `height`.
    ///
    /// The height is embedded so that coinbases at different heights hash
    /// differently even for the same payout script.
    pub fn coinbase(reward: &Script, height: u64) -> Self {
        let mut data = Vec::with_capacity(8 + reward.as_bytes().len());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(reward.as_bytes());
        Transaction { data }
    }

    /// Computes the transaction hash over the raw bytes.
    pub fn hash(&self) -> Hash256 {
        Hash256::compute(&self.data)
    }
}

/// Block = header + list of transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Header containing linking, ordering, and authorship information.
    pub header: Header,
    /// Ordered list of transactions included in this block.
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Returns the block hash (the hash of the header).
    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }
}

/// Output of the host's block assembler.
///
/// Carries the assembled block together with the total transaction fees it
/// collects, which the host may want for logging or reward accounting.
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    /// The assembled, not-yet-signed block.
    pub block: Block,
    /// Total fees collected by the block's transactions.
    pub total_fees: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KEY_ID_LEN;
    use crate::types::KeyId;

    fn dummy_header() -> Header {
        Header {
            parent: BlockHash(Hash256([1u8; crate::types::HASH_LEN])),
            height: 3,
            timestamp: 1_700_000_000,
            merkle_root: Hash256([2u8; crate::types::HASH_LEN]),
            signature: BlockSignature::empty(),
        }
    }

    #[test]
    fn header_hash_is_deterministic() {
        let h = dummy_header();
        assert_eq!(h.hash(), h.hash());
    }

    #[test]
    fn signature_changes_block_hash_but_not_preimage() {
        let unsigned = dummy_header();
        let mut signed = unsigned.clone();
        signed.signature = BlockSignature(vec![9u8; 65]);

        assert_ne!(unsigned.hash(), signed.hash());
        assert_eq!(unsigned.hash_without_sig(), signed.hash_without_sig());
    }

    #[test]
    fn genesis_header_is_genesis() {
        let g = Header::genesis(1000);
        assert!(g.is_genesis());
        assert_eq!(g.parent, BlockHash(Hash256::zero()));
        assert_eq!(g.timestamp, 1000);
    }

    #[test]
    fn coinbase_hash_depends_on_height() {
        let script = Script::pay_to_key_id(&KeyId([5u8; KEY_ID_LEN]));
        let a = Transaction::coinbase(&script, 1);
        let b = Transaction::coinbase(&script, 2);
        assert_ne!(a.hash(), b.hash());
    }
}
