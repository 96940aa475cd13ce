//! Recoverable block signing and producer recovery.
//!
//! Blocks carry a 65-byte compact recoverable ECDSA signature
//! (`r || s || recovery_id`, secp256k1) over the header's signing pre-image
//! digest. Recoverable signatures let the validator derive the producer
//! identity without the header carrying it explicitly.
//!
//! Recovery runs on every block validation and every scheduler window walk,
//! which is why its results are memoized in [`super::cache::MinerCache`].

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};

use crate::types::{BlockSignature, Hash256, Header, KeyId};

use super::error::SignerError;

/// Length of the compact recoverable signature: 64 bytes `r || s` plus one
/// trailing recovery-id byte.
pub const COMPACT_SIG_LEN: usize = 65;

/// Signs block pre-images with the local authority's key.
///
/// Created by the producer loop once the wallet yields the miner key; the
/// derived [`KeyId`] is kept alongside so callers never re-hash the public
/// key.
#[derive(Clone)]
pub struct BlockSigner {
    signing_key: SigningKey,
    key_id: KeyId,
}

impl BlockSigner {
    /// Wraps a signing key, deriving its authority identifier.
    pub fn new(signing_key: SigningKey) -> Self {
        let key_id = KeyId::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            key_id,
        }
    }

    /// The authority identifier of this signer.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Produces the 65-byte compact recoverable signature over `digest`.
    ///
    /// Fails only when the key material cannot sign.
    pub fn sign(&self, digest: &Hash256) -> Result<BlockSignature, SignerError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| SignerError::UnusableKey(e.to_string()))?;

        let mut bytes = Vec::with_capacity(COMPACT_SIG_LEN);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(recovery_id.to_byte());
        Ok(BlockSignature(bytes))
    }

    /// Signs `header` in place over its pre-image digest.
    ///
    /// Must be called after every other header field (in particular the
    /// merkle root) is final, since the pre-image covers them all.
    pub fn sign_header(&self, header: &mut Header) -> Result<(), SignerError> {
        let digest = header.hash_without_sig();
        header.signature = self.sign(&digest)?;
        Ok(())
    }
}

impl std::fmt::Debug for BlockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material is deliberately not printed.
        f.debug_struct("BlockSigner")
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Recovers the producer's [`KeyId`] from a compact signature over `digest`.
///
/// Rejects signatures of the wrong length, with an out-of-range recovery id,
/// or that fail to recover a valid curve point.
pub fn recover_key_id(
    digest: &Hash256,
    signature: &BlockSignature,
) -> Result<KeyId, SignerError> {
    let bytes = signature.as_bytes();
    if bytes.len() != COMPACT_SIG_LEN {
        return Err(SignerError::MalformedSignature(bytes.len()));
    }

    let signature =
        EcdsaSignature::from_slice(&bytes[..64]).map_err(|_| SignerError::RecoveryFailed)?;
    let recovery_id =
        RecoveryId::from_byte(bytes[64]).ok_or(SignerError::InvalidRecoveryId(bytes[64]))?;

    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &signature, recovery_id)
        .map_err(|_| SignerError::RecoveryFailed)?;
    Ok(KeyId::from_verifying_key(&key))
}
