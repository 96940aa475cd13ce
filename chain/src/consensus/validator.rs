//! Proof-of-authority validation of incoming block headers.
//!
//! The validator re-runs the producer's own schedule query from the block's
//! parent, so the two sides can never disagree about eligibility. It bounds
//! timestamps from below only; "not too far in the future" stays with the
//! host's ordinary timestamp validity rule.

use tracing::debug;

use crate::host::BlockIndex;
use crate::types::Header;

use super::engine::PoaEngine;
use super::error::ValidationError;

impl PoaEngine {
    /// Checks a block header's authorship and timing against the schedule.
    ///
    /// Accepts the genesis block unconditionally. Every rejection carries a
    /// structured [`ValidationError`]; the caller decides how to log and
    /// whether to ban the sender. Nothing here aborts the process.
    pub fn check_block<C: BlockIndex>(
        &self,
        chain: &C,
        header: &Header,
    ) -> Result<(), ValidationError> {
        let hash = header.hash();
        if hash == chain.genesis_hash() {
            return Ok(());
        }

        if chain.header(&header.parent).is_none() {
            return Err(ValidationError::UnknownParent(header.parent));
        }

        let miner = self.block_miner(header)?;
        let slot = self.next_slot(chain, &header.parent, &miner)?;
        if header.timestamp < slot.earliest {
            return Err(ValidationError::TimestampTooEarly {
                got: header.timestamp,
                earliest: slot.earliest,
            });
        }

        debug!(block = %hash, miner = %miner, position = slot.position, "block passes authority check");
        Ok(())
    }
}
