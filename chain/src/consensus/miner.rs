//! The block producer loop.
//!
//! A single long-lived task per node that watches the chain tip and, when
//! the local authority is scheduled, assembles, signs, and submits the next
//! block. The chain is concurrently extended by peer blocks, so the loop
//! re-reads the tip at every stage boundary and abandons any work whose
//! parent is no longer the tip; stale work must never be submitted, or the
//! local authority forks itself.
//!
//! Stages, in order: wait for the wallet key (BOOT), watch the tip, check
//! eligibility, build and sign, wait for the slot time, submit. Every wait
//! also observes the shutdown flag so the task exits promptly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::host::MinerHost;
use crate::metrics::MetricsRegistry;
use crate::types::{BlockHash, Script};

use super::engine::PoaEngine;
use super::signer::BlockSigner;

/// The producer task. Construct with [`Miner::new`] and spawn
/// [`Miner::run`] onto the runtime.
pub struct Miner<H> {
    engine: Arc<PoaEngine>,
    host: Arc<H>,
    metrics: Arc<MetricsRegistry>,
    shutdown: watch::Receiver<bool>,
}

impl<H: MinerHost> Miner<H> {
    /// Creates a producer loop over the given engine and host.
    pub fn new(
        engine: Arc<PoaEngine>,
        host: Arc<H>,
        metrics: Arc<MetricsRegistry>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            host,
            metrics,
            shutdown,
        }
    }

    /// Runs the producer loop until shutdown.
    ///
    /// Returns immediately when the engine has no local miner configured;
    /// the node then participates in validation only.
    pub async fn run(mut self) {
        let Some(local) = self.engine.local_miner() else {
            info!("no poa miner configured, producer loop disabled");
            return;
        };
        let reward_script = Script::pay_to_key_id(&local);

        // BOOT: the wallet may still be locked; poll until the key shows up.
        let key_poll = self.engine.config().key_poll_ms;
        let signer = loop {
            if let Some(key) = self.host.signing_key(&local) {
                break BlockSigner::new(key);
            }
            debug!(miner = %local, "miner key not yet available, waiting");
            if !self.pause(key_poll).await {
                return;
            }
        };
        info!(miner = %local, "poa miner key acquired, watching the chain tip");

        let tip_poll = self.engine.config().tip_poll_ms;
        let mut last_tip: Option<BlockHash> = None;
        loop {
            if !self.pause(tip_poll).await {
                return;
            }
            let Some(tip) = self.host.tip_hash() else {
                continue;
            };
            if last_tip == Some(tip) {
                continue;
            }
            last_tip = Some(tip);

            // Eligibility for the block after the new tip.
            let started = Instant::now();
            let slot = match self.engine.next_slot(self.host.as_ref(), &tip, &local) {
                Ok(slot) => slot,
                Err(reason) => {
                    debug!(tip = %tip, %reason, "not scheduled for the next block");
                    continue;
                }
            };
            self.metrics
                .poa
                .schedule_seconds
                .observe(started.elapsed().as_secs_f64());

            // Catch-up clamp: after a long gap the scheduled time may be in
            // the past; publish at "now" without disturbing the ordering.
            let now = self.host.adjusted_time();
            let target = slot.earliest.max(now);
            debug!(
                tip = %tip,
                position = slot.position,
                scheduled = slot.earliest,
                target,
                "eligible to produce the next block"
            );
            if self.tip_moved(&tip, "authority check") {
                continue;
            }

            // Build and sign.
            let template = match self.host.create_new_block(&reward_script, target) {
                Ok(template) => template,
                Err(error) => {
                    warn!(tip = %tip, %error, "failed to assemble a block");
                    continue;
                }
            };
            let mut block = template.block;
            block.header.merkle_root = self.host.merkle_root(&block);
            if let Err(error) = signer.sign_header(&mut block.header) {
                warn!(tip = %tip, %error, "failed to sign the assembled block");
                continue;
            }
            if self.tip_moved(&tip, "block assembly") {
                continue;
            }
            let hash = block.hash();
            debug!(
                block = %hash,
                txs = block.txs.len(),
                fees = template.total_fees,
                "new block assembled and signed"
            );

            // Wait for the slot to open, abandoning on a tip change.
            let mut stale = false;
            while self.host.adjusted_time() < target {
                if self.tip_moved(&tip, "block time wait") {
                    stale = true;
                    break;
                }
                if !self.pause(tip_poll).await {
                    return;
                }
            }
            if stale {
                continue;
            }
            if self.tip_moved(&tip, "block time wait") {
                continue;
            }

            // Submit. Whatever the outcome, go back to watching the tip.
            match self.host.process_new_block(block, true) {
                Ok(true) => {
                    info!(block = %hash, time = target, "produced a new block");
                    self.metrics.poa.blocks_produced_total.inc();
                }
                Ok(false) => {
                    debug!(block = %hash, "submitted block was already known");
                }
                Err(error) => {
                    warn!(block = %hash, %error, "host rejected the produced block");
                }
            }
        }
    }

    /// Re-reads the tip; logs and counts the abandonment when it moved.
    fn tip_moved(&self, expected: &BlockHash, stage: &str) -> bool {
        if self.host.tip_hash() == Some(*expected) {
            return false;
        }
        debug!(tip = %expected, stage, "chain tip changed, abandoning this round");
        self.metrics.poa.blocks_abandoned_total.inc();
        true
    }

    /// Sleeps for `ms`, returning `false` when shutdown was requested (or
    /// the shutdown channel's sender is gone).
    async fn pause(&mut self, ms: u64) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
            changed = self.shutdown.changed() => {
                changed.is_ok() && !*self.shutdown.borrow()
            }
        }
    }
}
