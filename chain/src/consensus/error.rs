//! Error types for the proof-of-authority engine.
//!
//! The split follows the failure surfaces of the engine: static
//! configuration problems are fatal at init ([`ConfigError`]); everything
//! else is a per-block or per-round rejection that the caller logs and
//! recovers from.

use std::fmt;

use crate::types::{BlockHash, KeyId};

/// Error raised while constructing the engine from static configuration.
///
/// These are the only fatal errors the engine produces; the host may log
/// them and continue without proof-of-authority participation.
#[derive(Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// No miner list was configured; it is required on a PoA network.
    MissingMinerList,
    /// The miner list was present but contained no addresses.
    EmptyMinerList,
    /// An address in the miner list (or the local miner option) did not
    /// decode to a key identifier.
    MalformedAddress(String),
    /// The same authority appeared twice in the miner list.
    DuplicateMiner(String),
    /// The configured local miner is not a member of the roster.
    MinerNotInRoster(String),
    /// The block interval must be non-zero.
    ZeroInterval,
    /// The fallback timeout must be non-zero.
    ZeroTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingMinerList => write!(f, "miner list is required on a poa network"),
            ConfigError::EmptyMinerList => write!(f, "miner list is empty"),
            ConfigError::MalformedAddress(addr) => write!(f, "malformed miner address: {addr}"),
            ConfigError::DuplicateMiner(addr) => {
                write!(f, "duplicate miner in the miner list: {addr}")
            }
            ConfigError::MinerNotInRoster(addr) => {
                write!(f, "local miner {addr} is not in the miner list")
            }
            ConfigError::ZeroInterval => write!(f, "poa interval must be greater than zero"),
            ConfigError::ZeroTimeout => write!(f, "poa timeout must be greater than zero"),
        }
    }
}

/// Error raised by the block signer during signing or recovery.
#[derive(Debug, Eq, PartialEq)]
pub enum SignerError {
    /// The local key material could not produce a signature.
    UnusableKey(String),
    /// The signature field does not have the 65-byte compact length.
    MalformedSignature(usize),
    /// The trailing recovery-id byte is out of range.
    InvalidRecoveryId(u8),
    /// The signature did not recover a valid public key for the digest.
    RecoveryFailed,
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerError::UnusableKey(msg) => write!(f, "unusable signing key: {msg}"),
            SignerError::MalformedSignature(len) => {
                write!(f, "malformed block signature: {len} bytes")
            }
            SignerError::InvalidRecoveryId(byte) => {
                write!(f, "invalid signature recovery id: {byte}")
            }
            SignerError::RecoveryFailed => write!(f, "signature did not recover a public key"),
        }
    }
}

/// Reason the scheduler rejected an eligibility query.
///
/// Raised when the ordered miner list for a tip cannot be computed, or when
/// the queried authority is simply not in it. Non-fatal: the validator turns
/// it into a block rejection and the producer loop skips the round.
#[derive(Debug, Eq, PartialEq)]
pub enum EligibilityError {
    /// The queried tip is not present in the block index.
    MissingTip,
    /// An ancestor disappeared from the index mid-walk (likely a reorg);
    /// the query is abandoned and retried on the next tip change.
    AncestorMissing(BlockHash),
    /// Recovering the producer of a window block failed.
    MinerRecovery {
        /// The block whose producer could not be recovered.
        block: BlockHash,
        /// The underlying signer failure.
        source: SignerError,
    },
    /// The tip's producer is not a member of the roster, so no rotation
    /// order can be derived from it.
    UnknownProducer(KeyId),
    /// The queried authority is not in the eligible list for this tip.
    NotEligible(KeyId),
}

impl fmt::Display for EligibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityError::MissingTip => write!(f, "chain tip is not in the block index"),
            EligibilityError::AncestorMissing(hash) => {
                write!(f, "ancestor block {hash} is missing from the index")
            }
            EligibilityError::MinerRecovery { block, source } => {
                write!(f, "failed to recover the miner of block {block}: {source}")
            }
            EligibilityError::UnknownProducer(keyid) => {
                write!(f, "block producer {keyid} is not in the miner list")
            }
            EligibilityError::NotEligible(keyid) => {
                write!(f, "miner {keyid} is not eligible for the next block")
            }
        }
    }
}

/// Reason an incoming block header failed proof-of-authority validation.
#[derive(Debug, Eq, PartialEq)]
pub enum ValidationError {
    /// The header's parent is unknown to the block index.
    UnknownParent(BlockHash),
    /// The producer could not be recovered from the header signature.
    Recovery(SignerError),
    /// The recovered producer is not scheduled for this slot.
    Ineligible(EligibilityError),
    /// The header timestamp is earlier than the producer's assigned time.
    TimestampTooEarly {
        /// Timestamp carried by the header.
        got: u32,
        /// Earliest timestamp the schedule permits for this producer.
        earliest: u32,
    },
}

impl From<SignerError> for ValidationError {
    fn from(e: SignerError) -> Self {
        ValidationError::Recovery(e)
    }
}

impl From<EligibilityError> for ValidationError {
    fn from(e: EligibilityError) -> Self {
        ValidationError::Ineligible(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownParent(hash) => write!(f, "unknown parent block {hash}"),
            ValidationError::Recovery(e) => write!(f, "{e}"),
            ValidationError::Ineligible(e) => write!(f, "{e}"),
            ValidationError::TimestampTooEarly { got, earliest } => {
                write!(
                    f,
                    "block time {got} is earlier than the assigned time {earliest}"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for SignerError {}
impl std::error::Error for EligibilityError {}
impl std::error::Error for ValidationError {}
