//! Core domain types used by the chain.
//!
//! This module defines strongly-typed hashes, authority identifiers, and the
//! signature/script wrappers shared across the consensus implementation. The
//! goal is to avoid "naked" byte buffers in public APIs and instead use
//! domain-specific newtypes.

use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

/// Block types and hashing.
pub mod block;

pub use block::{Block, BlockHash, BlockTemplate, Header, Transaction};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an authority key identifier.
pub const KEY_ID_LEN: usize = 20;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This type is used as the backing representation for all fixed-size hashes
/// in the chain (block hashes, merkle roots, signing pre-image digests). It
/// is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not** a
    /// password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the all-zero hash, used for genesis parent links and
    /// not-yet-filled merkle roots.
    pub fn zero() -> Self {
        Hash256([0u8; HASH_LEN])
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Authority identifier: a 20-byte hash of a secp256k1 public key.
///
/// A `KeyId` is the first [`KEY_ID_LEN`] bytes of the BLAKE3-256 digest of
/// the SEC1 compressed public key encoding. The hex form of a `KeyId` is the
/// "address" used in the miner-list configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub [u8; KEY_ID_LEN]);

impl KeyId {
    /// Derives a [`KeyId`] from a secp256k1 verifying key.
    ///
    /// The key is encoded in SEC1 compressed form before hashing, so the
    /// mapping from public keys to identifiers is canonical.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest = blake3::hash(&key.to_sec1_bytes());
        let mut id = [0u8; KEY_ID_LEN];
        id.copy_from_slice(&digest.as_bytes()[..KEY_ID_LEN]);
        KeyId(id)
    }

    /// Parses a [`KeyId`] from its 40-character hex address form.
    ///
    /// Returns `None` when the input is not valid hex or does not decode to
    /// exactly [`KEY_ID_LEN`] bytes.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let id: [u8; KEY_ID_LEN] = bytes.try_into().ok()?;
        Some(KeyId(id))
    }

    /// Returns the underlying 20-byte identifier as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; KEY_ID_LEN] {
        &self.0
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Recoverable block signature bytes (the `vchBlockSig` wire field).
///
/// The field is variable-length on the wire; the consensus engine only
/// accepts the 65-byte compact form `r || s || recovery_id` produced by
/// [`crate::consensus::BlockSigner`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockSignature(pub Vec<u8>);

impl BlockSignature {
    /// Returns an empty signature, the state of a header before signing
    /// and the canonical content of the pre-image's signature field.
    pub fn empty() -> Self {
        BlockSignature(Vec::new())
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` when no signature has been attached.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Opaque reward payout script.
///
/// The engine never interprets script bytes; it only threads them from the
/// local miner configuration into the block assembler. The helper below
/// produces the conventional pay-to-key-id form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// Builds the standard pay-to-key-id script for an authority:
    /// `DUP HASH160 <key_id> EQUALVERIFY CHECKSIG`.
    pub fn pay_to_key_id(key_id: &KeyId) -> Self {
        let mut bytes = Vec::with_capacity(KEY_ID_LEN + 5);
        bytes.extend_from_slice(&[0x76, 0xa9, 0x14]);
        bytes.extend_from_slice(key_id.as_bytes());
        bytes.extend_from_slice(&[0x88, 0xac]);
        Script(bytes)
    }

    /// Returns the raw script bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
