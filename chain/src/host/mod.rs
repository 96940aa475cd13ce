//! Interfaces to the surrounding chain node.
//!
//! The consensus engine does not own the block index, the wallet, the block
//! assembler, or the clock; it consumes them through the small traits in
//! this module. Implementations can be backed by a full node or by the
//! in-memory host in [`mem`], which is what the tests and the demo binary
//! use.
//!
//! Headers are returned by value: they are a few dozen bytes plus the
//! signature, and cloning them out of the index means the engine never holds
//! references into host-owned storage that a reorg could invalidate.

use std::fmt;

use k256::ecdsa::SigningKey;

use crate::types::{Block, BlockHash, BlockTemplate, Hash256, Header, KeyId, Script};

/// In-memory host implementation for tests, simulations, and the demo node.
pub mod mem;

pub use mem::{MemHost, MockClock, SystemClock};

/// Read access to the host's block index and active chain.
pub trait BlockIndex {
    /// Hash of the current best block, if the chain has one.
    fn tip_hash(&self) -> Option<BlockHash>;

    /// Fetches a header by block hash, if present.
    ///
    /// During a reorg an ancestor that was present a moment ago may come
    /// back `None`; callers must treat that as "retry on the next tip
    /// change", not as corruption.
    fn header(&self, hash: &BlockHash) -> Option<Header>;

    /// Hash of the genesis block.
    fn genesis_hash(&self) -> BlockHash;
}

/// The host's adjusted wall clock (network-median adjusted).
///
/// All consensus time comparisons use this source rather than the raw
/// system clock so that they agree with the host's own timestamp checks.
/// A clock running earlier than the tip's timestamp simply pushes targets
/// into the future; non-monotonic clocks are an operator problem, not an
/// engine one.
pub trait TimeSource {
    /// Current adjusted time, in seconds since Unix epoch.
    fn adjusted_time(&self) -> u32;
}

/// The host's block assembler (transaction selection lives there).
pub trait BlockAssembler {
    /// Builds an unsigned block on top of the current tip, paying
    /// `reward_script` and carrying `target_time` as its timestamp.
    fn create_new_block(
        &self,
        reward_script: &Script,
        target_time: u32,
    ) -> Result<BlockTemplate, AssemblyError>;

    /// Computes the merkle root over the block's transactions.
    fn merkle_root(&self, block: &Block) -> Hash256;
}

/// Key access into the host's wallet.
pub trait KeyStore {
    /// The signing key for `key_id`, or `None` while the wallet has not
    /// (yet) unlocked it.
    fn signing_key(&self, key_id: &KeyId) -> Option<SigningKey>;
}

/// Submission of a finished block into the host's validation pipeline.
pub trait BlockSink {
    /// Hands a block to the host's `process_new_block`.
    ///
    /// Returns `Ok(true)` when the block was newly accepted into the index,
    /// `Ok(false)` when it was a known duplicate, and an error when the host
    /// rejected it outright.
    fn process_new_block(&self, block: Block, force: bool) -> Result<bool, SubmitError>;
}

/// Everything the producer loop needs from the host, in one bound.
pub trait MinerHost:
    BlockIndex + TimeSource + BlockAssembler + KeyStore + BlockSink + Send + Sync
{
}

impl<T> MinerHost for T where
    T: BlockIndex + TimeSource + BlockAssembler + KeyStore + BlockSink + Send + Sync
{
}

/// Error produced by the host's block assembler.
#[derive(Debug)]
pub struct AssemblyError(pub String);

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block assembly failed: {}", self.0)
    }
}

/// Error produced when the host rejects a submitted block.
#[derive(Debug)]
pub struct SubmitError(pub String);

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block submission failed: {}", self.0)
    }
}

impl std::error::Error for AssemblyError {}
impl std::error::Error for SubmitError {}
