//! The authority-rotation schedule.
//!
//! Given a chain tip, the scheduler answers: who may produce the next block,
//! in what order, and from what timestamp onwards.
//!
//! - **Recent-exclusion window.** With a roster of size `n`, the producers
//!   of the `n / 2` most recent blocks (tip first, truncated at genesis) are
//!   excluded, so no authority produces twice inside a short window.
//! - **Rotation order.** The remaining authorities are ranked by circular
//!   roster position starting after the tip's producer, which makes the
//!   order deterministic and stable across nodes.
//! - **Timing.** The miner at position `j` may publish from
//!   `tip.timestamp + interval + j * timeout` onwards.
//!
//! Both the per-block producer recovery and the per-tip miner list are
//! memoized in the engine's [`super::cache::MinerCache`]; recovery is the
//! expensive step, so a warm cache makes schedule queries cheap.

use std::collections::HashSet;

use tracing::debug;

use crate::host::BlockIndex;
use crate::types::{BlockHash, Header, KeyId};

use super::engine::PoaEngine;
use super::error::{EligibilityError, SignerError};
use super::signer;

/// A miner's slot in the schedule for the block after some tip.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MinerSlot {
    /// 0-based position in the ordered eligible-miner list.
    pub position: usize,
    /// Earliest timestamp the schedule permits for this miner's block.
    pub earliest: u32,
}

impl PoaEngine {
    /// Recovers the producer of `header` from its signature, memoized by
    /// block hash.
    pub fn block_miner(&self, header: &Header) -> Result<KeyId, SignerError> {
        let hash = header.hash();
        if let Some(miner) = self.cache().block_miner(&hash) {
            return Ok(miner);
        }

        let miner = signer::recover_key_id(&header.hash_without_sig(), &header.signature)?;
        self.cache().put_block_miner(hash, miner);
        Ok(miner)
    }

    /// Computes the ordered list of authorities eligible to produce the
    /// block after `tip`.
    ///
    /// A genesis tip yields the full roster in configuration order. Failures
    /// (a vanished ancestor, an unrecoverable window block) abort the query
    /// without caching anything, so the next tip change retries from
    /// scratch.
    pub fn next_miners<C: BlockIndex>(
        &self,
        chain: &C,
        tip: &Header,
    ) -> Result<Vec<KeyId>, EligibilityError> {
        if tip.is_genesis() {
            return Ok(self.registry().iter().copied().collect());
        }

        let tip_hash = tip.hash();
        if let Some(list) = self.cache().next_miners(&tip_hash) {
            return Ok(list);
        }

        // Producers of the recent window, walking back from the tip.
        let window = self.registry().len() / 2;
        let mut recent: HashSet<KeyId> = HashSet::new();
        let mut cursor = tip.clone();
        let mut remaining = window;
        while remaining > 0 && !cursor.is_genesis() {
            let miner = self
                .block_miner(&cursor)
                .map_err(|source| EligibilityError::MinerRecovery {
                    block: cursor.hash(),
                    source,
                })?;
            recent.insert(miner);

            cursor = chain
                .header(&cursor.parent)
                .ok_or(EligibilityError::AncestorMissing(cursor.parent))?;
            remaining -= 1;
        }

        // Rank the non-excluded authorities by roster position after the
        // tip's producer.
        let producer = self
            .block_miner(tip)
            .map_err(|source| EligibilityError::MinerRecovery {
                block: tip_hash,
                source,
            })?;
        let start = self
            .registry()
            .index_of(&producer)
            .ok_or(EligibilityError::UnknownProducer(producer))?;
        let list: Vec<KeyId> = self
            .registry()
            .rotation_after(start)
            .filter(|keyid| !recent.contains(keyid))
            .copied()
            .collect();

        debug!(
            tip = %tip_hash,
            miners = %fmt_key_ids(&list),
            "computed next-block miner list"
        );
        self.cache().put_next_miners(tip_hash, list.clone());
        Ok(list)
    }

    /// Resolves `miner`'s slot for the block after the tip at `tip_hash`.
    ///
    /// Returns the miner's position in the eligible list together with the
    /// earliest permitted timestamp, or the structured reason the miner may
    /// not produce. Producers clamp the returned time up to "now" for
    /// catch-up after an outage; the validator uses it as-is as a lower
    /// bound.
    pub fn next_slot<C: BlockIndex>(
        &self,
        chain: &C,
        tip_hash: &BlockHash,
        miner: &KeyId,
    ) -> Result<MinerSlot, EligibilityError> {
        let tip = chain
            .header(tip_hash)
            .ok_or(EligibilityError::MissingTip)?;
        let list = self.next_miners(chain, &tip)?;
        let position = list
            .iter()
            .position(|keyid| keyid == miner)
            .ok_or(EligibilityError::NotEligible(*miner))?;

        let earliest =
            tip.timestamp + self.config().interval + position as u32 * self.config().timeout;
        Ok(MinerSlot { position, earliest })
    }
}

/// Comma-joined hex rendering of a key-id list, for logs.
pub(crate) fn fmt_key_ids(ids: &[KeyId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::config::ConsensusConfig;
    use crate::consensus::registry::AuthorityRegistry;
    use crate::consensus::signer::BlockSigner;
    use crate::host::{BlockAssembler, BlockSink, MemHost, MockClock, TimeSource};
    use crate::types::Script;
    use k256::ecdsa::SigningKey;

    fn signer(seed: u8) -> BlockSigner {
        let key = SigningKey::from_bytes(&[seed; 32].into()).expect("static key bytes are valid");
        BlockSigner::new(key)
    }

    /// Engine over the given signers' identities, in order, with the
    /// scenario cadence (interval 10, timeout 3).
    fn engine_for(signers: &[BlockSigner]) -> PoaEngine {
        engine_with_config(signers, ConsensusConfig::default())
    }

    fn engine_with_config(signers: &[BlockSigner], config: ConsensusConfig) -> PoaEngine {
        let ids: Vec<KeyId> = signers.iter().map(BlockSigner::key_id).collect();
        let registry = AuthorityRegistry::from_key_ids(ids).expect("test roster is valid");
        PoaEngine::new(config, registry, None).expect("test engine config is valid")
    }

    /// Assembles, signs, and submits a block on the current tip.
    fn append_block(host: &MemHost<MockClock>, signer: &BlockSigner, timestamp: u32) -> Header {
        let script = Script::pay_to_key_id(&signer.key_id());
        let mut block = host
            .create_new_block(&script, timestamp)
            .expect("assembly should succeed")
            .block;
        block.header.merkle_root = host.merkle_root(&block);
        signer
            .sign_header(&mut block.header)
            .expect("signing should succeed");
        host.process_new_block(block.clone(), true)
            .expect("submission should succeed");
        block.header
    }

    fn ids(signers: &[&BlockSigner]) -> Vec<KeyId> {
        signers.iter().map(|s| s.key_id()).collect()
    }

    #[test]
    fn genesis_tip_schedules_the_full_roster() {
        // Scenario 1: every authority may produce block 1, in roster order,
        // with cascading earliest times 1010, 1013, 1016, 1019.
        let (a, b, c, d) = (signer(1), signer(2), signer(3), signer(4));
        let engine = engine_for(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        let tip = host.tip_header();
        let list = engine
            .next_miners(&host, &tip)
            .expect("genesis schedule should compute");
        assert_eq!(list, ids(&[&a, &b, &c, &d]));

        let tip_hash = tip.hash();
        for (position, (miner, earliest)) in
            [(&a, 1010), (&b, 1013), (&c, 1016), (&d, 1019)].iter().enumerate()
        {
            let slot = engine
                .next_slot(&host, &tip_hash, &miner.key_id())
                .expect("every authority is eligible on genesis");
            assert_eq!(slot.position, position);
            assert_eq!(slot.earliest, *earliest);
        }
    }

    #[test]
    fn recent_producers_are_excluded_and_order_follows_the_roster() {
        // Scenario 2: after A(1010) and B(1023), the window {A, B} is
        // excluded and the rotation after B yields [C, D].
        let (a, b, c, d) = (signer(1), signer(2), signer(3), signer(4));
        let engine = engine_for(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        append_block(&host, &a, 1010);
        let tip = append_block(&host, &b, 1023);

        let list = engine
            .next_miners(&host, &tip)
            .expect("schedule should compute");
        assert_eq!(list, ids(&[&c, &d]));
    }

    #[test]
    fn fallback_positions_shift_the_earliest_time() {
        // Scenarios 3 and 4 share the chain A(1010) → B(1023) → C(1036).
        // The window is {B, C}, so the list is [D, A]: D primary at 1046,
        // A fallback at 1049, and the window producers are rejected.
        let (a, b, c, d) = (signer(1), signer(2), signer(3), signer(4));
        let engine = engine_for(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        append_block(&host, &a, 1010);
        append_block(&host, &b, 1023);
        let tip = append_block(&host, &c, 1036);
        let tip_hash = tip.hash();

        let list = engine
            .next_miners(&host, &tip)
            .expect("schedule should compute");
        assert_eq!(list, ids(&[&d, &a]));

        let slot_d = engine
            .next_slot(&host, &tip_hash, &d.key_id())
            .expect("D is the primary successor");
        assert_eq!(slot_d, MinerSlot { position: 0, earliest: 1046 });

        let slot_a = engine
            .next_slot(&host, &tip_hash, &a.key_id())
            .expect("A is the fallback successor");
        assert_eq!(slot_a, MinerSlot { position: 1, earliest: 1049 });

        for excluded in [&b, &c] {
            assert_eq!(
                engine
                    .next_slot(&host, &tip_hash, &excluded.key_id())
                    .unwrap_err(),
                EligibilityError::NotEligible(excluded.key_id())
            );
        }
    }

    #[test]
    fn catch_up_clamps_the_target_to_now() {
        // Scenario 3's timing: the schedule says 1046, the clock says 1100;
        // the producer-side target is the later of the two.
        let (a, b, c, d) = (signer(1), signer(2), signer(3), signer(4));
        let engine = engine_for(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        append_block(&host, &a, 1010);
        append_block(&host, &b, 1023);
        let tip = append_block(&host, &c, 1036);

        let slot = engine
            .next_slot(&host, &tip.hash(), &d.key_id())
            .expect("D is eligible");
        assert_eq!(slot.earliest, 1046);

        let clock = MockClock::new(1100);
        let target = slot.earliest.max(clock.adjusted_time());
        assert_eq!(target, 1100);
    }

    #[test]
    fn miner_outside_the_roster_is_not_eligible() {
        let (a, b) = (signer(1), signer(2));
        let stranger = signer(9);
        let engine = engine_for(&[a.clone(), b.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        let tip_hash = host.tip_header().hash();
        assert_eq!(
            engine
                .next_slot(&host, &tip_hash, &stranger.key_id())
                .unwrap_err(),
            EligibilityError::NotEligible(stranger.key_id())
        );
    }

    #[test]
    fn unknown_tip_is_rejected() {
        let engine = engine_for(&[signer(1), signer(2)]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        let missing = BlockHash(crate::types::Hash256::compute(b"nowhere"));
        assert_eq!(
            engine
                .next_slot(&host, &missing, &signer(1).key_id())
                .unwrap_err(),
            EligibilityError::MissingTip
        );
    }

    #[test]
    fn vanished_ancestor_aborts_without_caching() {
        let (a, b, c, d) = (signer(1), signer(2), signer(3), signer(4));
        let engine = engine_for(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        let first = append_block(&host, &a, 1010);
        let tip = append_block(&host, &b, 1023);
        host.forget_block(&first.hash());

        assert_eq!(
            engine.next_miners(&host, &tip).unwrap_err(),
            EligibilityError::AncestorMissing(first.hash())
        );
        // Nothing was cached for the failed query.
        assert!(engine.cache().next_miners(&tip.hash()).is_none());
    }

    #[test]
    fn two_authorities_alternate_strictly() {
        // n = 2 means w = 1: the tip's own producer is always the one
        // excluded, so the roster alternates block by block.
        let (a, b) = (signer(1), signer(2));
        let engine = engine_for(&[a.clone(), b.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        let after_genesis = engine
            .next_miners(&host, &host.tip_header())
            .expect("schedule should compute");
        assert_eq!(after_genesis, ids(&[&a, &b]));

        let tip = append_block(&host, &a, 1010);
        assert_eq!(
            engine.next_miners(&host, &tip).expect("schedule"),
            ids(&[&b])
        );

        let tip = append_block(&host, &b, 1020);
        assert_eq!(
            engine.next_miners(&host, &tip).expect("schedule"),
            ids(&[&a])
        );
    }

    #[test]
    fn single_authority_roster_goes_quiet_after_genesis() {
        // The rotation order never revisits the tip producer's own roster
        // position, so a one-entry roster schedules nobody after block 1.
        let a = signer(1);
        let engine = engine_for(&[a.clone()]);
        let host = MemHost::new(MockClock::new(1000), 1000);

        let genesis_list = engine
            .next_miners(&host, &host.tip_header())
            .expect("schedule should compute");
        assert_eq!(genesis_list, ids(&[&a]));

        let tip = append_block(&host, &a, 1010);
        assert_eq!(
            engine.next_miners(&host, &tip).expect("schedule"),
            Vec::<KeyId>::new()
        );
    }

    #[test]
    fn schedule_is_identical_across_cache_hits_and_misses() {
        let (a, b, c, d) = (signer(1), signer(2), signer(3), signer(4));
        let signers = [a.clone(), b.clone(), c.clone(), d.clone()];
        let engine = engine_with_config(
            &signers,
            ConsensusConfig {
                // A capacity this small evicts constantly.
                cache_capacity: 1,
                ..ConsensusConfig::default()
            },
        );
        let fresh = engine_for(&signers);
        let host = MemHost::new(MockClock::new(1000), 1000);

        append_block(&host, &a, 1010);
        let mid = append_block(&host, &b, 1023);
        let tip = append_block(&host, &c, 1036);

        // Interleave queries so the tiny cache keeps evicting.
        let first = engine.next_miners(&host, &tip).expect("schedule");
        let other = engine.next_miners(&host, &mid).expect("schedule");
        let again = engine.next_miners(&host, &tip).expect("schedule");

        assert_eq!(first, again);
        assert_eq!(first, fresh.next_miners(&host, &tip).expect("schedule"));
        assert_eq!(other, fresh.next_miners(&host, &mid).expect("schedule"));
    }

    #[test]
    fn rotation_invariants_hold_over_a_long_chain() {
        // Drive 20 rounds with the primary miner always producing at its
        // earliest time, and check the quantified schedule invariants.
        let signers: Vec<BlockSigner> = (1..=5).map(signer).collect();
        let engine = engine_for(&signers);
        let host = MemHost::new(MockClock::new(1000), 1000);
        let roster: Vec<KeyId> = signers.iter().map(BlockSigner::key_id).collect();
        let window = roster.len() / 2;

        let mut producers: Vec<KeyId> = Vec::new();
        let mut last_producer: Option<KeyId> = None;
        for _ in 0..20 {
            let tip = host.tip_header();
            let list = engine.next_miners(&host, &tip).expect("schedule");

            // The list is roster members only, without duplicates.
            let mut seen = std::collections::HashSet::new();
            for keyid in &list {
                assert!(roster.contains(keyid));
                assert!(seen.insert(*keyid), "duplicate miner in the list");
            }

            // The list starts with the roster successor of the tip's
            // producer, skipping excluded entries.
            if let Some(previous) = last_producer {
                let start = roster.iter().position(|k| *k == previous).expect("member");
                let expected_head = (1..roster.len())
                    .map(|step| roster[(start + step) % roster.len()])
                    .find(|keyid| list.contains(keyid));
                assert_eq!(list.first().copied(), expected_head);
            }

            let primary = list[0];
            let slot = engine
                .next_slot(&host, &tip.hash(), &primary)
                .expect("primary is eligible");
            assert_eq!(slot.position, 0);
            assert_eq!(slot.earliest, tip.timestamp + 10);

            let producer = signers
                .iter()
                .find(|s| s.key_id() == primary)
                .expect("primary is one of the signers");
            let header = append_block(&host, producer, slot.earliest);

            // Timestamp invariant against the parent.
            assert!(header.timestamp >= tip.timestamp + 10);
            producers.push(primary);
            last_producer = Some(primary);
        }

        // No producer repeats within any window of w + 1 consecutive blocks.
        for blocks in producers.windows(window + 1) {
            let distinct: std::collections::HashSet<_> = blocks.iter().collect();
            assert_eq!(distinct.len(), blocks.len(), "producer repeated in {blocks:?}");
        }
    }

    #[test]
    fn fmt_key_ids_joins_with_commas() {
        let ids = [signer(1).key_id(), signer(2).key_id()];
        let joined = fmt_key_ids(&ids);
        assert_eq!(joined.split(',').count(), 2);
        assert!(joined.contains(&ids[0].to_string()));
    }
}
