//! In-memory host.
//!
//! This implementation is useful for unit tests, simulations, and small
//! devnets. It keeps headers and blocks in hash maps behind a `RwLock`,
//! applies a longest-chain-by-height tip rule on submission, and offers two
//! clocks: the real one and a hand-driven one for deterministic tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use k256::ecdsa::SigningKey;
use parking_lot::RwLock;

use crate::types::{
    Block, BlockHash, BlockSignature, BlockTemplate, Hash256, Header, KeyId, Script, Transaction,
};

use super::{AssemblyError, BlockAssembler, BlockIndex, BlockSink, KeyStore, SubmitError,
    TimeSource};

/// Adjusted-time source backed by the system clock.
///
/// A real node would apply the network-median offset here; for the demo the
/// raw wall clock stands in for it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn adjusted_time(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_secs() as u32
    }
}

/// Hand-driven clock for deterministic tests.
#[derive(Debug)]
pub struct MockClock {
    now: AtomicU32,
}

impl MockClock {
    /// Creates a clock reading `start`.
    pub fn new(start: u32) -> Self {
        Self {
            now: AtomicU32::new(start),
        }
    }

    /// Moves the clock to an absolute time.
    pub fn set(&self, now: u32) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Advances the clock by `secs`.
    pub fn advance(&self, secs: u32) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for MockClock {
    fn adjusted_time(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

struct ChainState {
    headers: HashMap<BlockHash, Header>,
    blocks: HashMap<BlockHash, Block>,
    tip: BlockHash,
    genesis: BlockHash,
}

/// In-memory implementation of the full host surface.
///
/// Generic over the clock so tests can drive time by hand while the demo
/// node runs on [`SystemClock`].
pub struct MemHost<C> {
    chain: RwLock<ChainState>,
    wallet: RwLock<HashMap<KeyId, SigningKey>>,
    clock: C,
}

impl<C> MemHost<C> {
    /// Creates a host whose chain consists of a genesis block at
    /// `genesis_timestamp`.
    pub fn new(clock: C, genesis_timestamp: u32) -> Self {
        let genesis = Header::genesis(genesis_timestamp);
        let genesis_hash = genesis.hash();

        let mut headers = HashMap::new();
        headers.insert(genesis_hash, genesis.clone());
        let mut blocks = HashMap::new();
        blocks.insert(
            genesis_hash,
            Block {
                header: genesis,
                txs: Vec::new(),
            },
        );

        Self {
            chain: RwLock::new(ChainState {
                headers,
                blocks,
                tip: genesis_hash,
                genesis: genesis_hash,
            }),
            wallet: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// The host's clock, for tests that drive time by hand.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Imports a signing key into the wallet, unlocking it for its
    /// authority.
    pub fn import_key(&self, key: SigningKey) -> KeyId {
        let key_id = KeyId::from_verifying_key(key.verifying_key());
        self.wallet.write().insert(key_id, key);
        key_id
    }

    /// The header of the current best block.
    pub fn tip_header(&self) -> Header {
        let chain = self.chain.read();
        chain.headers[&chain.tip].clone()
    }

    /// Height of the current best block.
    pub fn height(&self) -> u64 {
        self.tip_header().height
    }

    /// Drops a header (and its block) from the index, simulating an entry
    /// vanishing during a reorg. Test-only by intent, but harmless.
    pub fn forget_block(&self, hash: &BlockHash) {
        let mut chain = self.chain.write();
        chain.headers.remove(hash);
        chain.blocks.remove(hash);
    }
}

impl<C: Send + Sync> BlockIndex for MemHost<C> {
    fn tip_hash(&self) -> Option<BlockHash> {
        Some(self.chain.read().tip)
    }

    fn header(&self, hash: &BlockHash) -> Option<Header> {
        self.chain.read().headers.get(hash).cloned()
    }

    fn genesis_hash(&self) -> BlockHash {
        self.chain.read().genesis
    }
}

impl<C: TimeSource> TimeSource for MemHost<C> {
    fn adjusted_time(&self) -> u32 {
        self.clock.adjusted_time()
    }
}

impl<C: Send + Sync> BlockAssembler for MemHost<C> {
    fn create_new_block(
        &self,
        reward_script: &Script,
        target_time: u32,
    ) -> Result<BlockTemplate, AssemblyError> {
        let chain = self.chain.read();
        let tip = chain
            .headers
            .get(&chain.tip)
            .ok_or_else(|| AssemblyError("tip header missing from index".to_string()))?;

        let height = tip.height + 1;
        let block = Block {
            header: Header {
                parent: chain.tip,
                height,
                timestamp: target_time,
                merkle_root: Hash256::zero(),
                signature: BlockSignature::empty(),
            },
            txs: vec![Transaction::coinbase(reward_script, height)],
        };

        Ok(BlockTemplate {
            block,
            total_fees: 0,
        })
    }

    fn merkle_root(&self, block: &Block) -> Hash256 {
        let mut level: Vec<Hash256> = block.txs.iter().map(Transaction::hash).collect();
        if level.is_empty() {
            return Hash256::zero();
        }

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                // Odd count: the last hash is paired with itself.
                let left = pair[0];
                let right = *pair.last().unwrap_or(&left);
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(left.as_bytes());
                data.extend_from_slice(right.as_bytes());
                next.push(Hash256::compute(&data));
            }
            level = next;
        }
        level[0]
    }
}

impl<C: Send + Sync> KeyStore for MemHost<C> {
    fn signing_key(&self, key_id: &KeyId) -> Option<SigningKey> {
        self.wallet.read().get(key_id).cloned()
    }
}

impl<C: Send + Sync> BlockSink for MemHost<C> {
    fn process_new_block(&self, block: Block, _force: bool) -> Result<bool, SubmitError> {
        let hash = block.hash();
        let mut chain = self.chain.write();

        if chain.headers.contains_key(&hash) {
            return Ok(false);
        }
        let parent = chain
            .headers
            .get(&block.header.parent)
            .ok_or_else(|| SubmitError(format!("unknown parent {}", block.header.parent)))?;
        if block.header.height != parent.height + 1 {
            return Err(SubmitError(format!(
                "height {} does not extend parent at {}",
                block.header.height, parent.height
            )));
        }

        let tip_height = chain.headers[&chain.tip].height;
        chain.headers.insert(hash, block.header.clone());
        chain.blocks.insert(hash, block);
        // Longest chain by height; ties keep the incumbent.
        if chain.headers[&hash].height > tip_height {
            chain.tip = hash;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_script() -> Script {
        Script::pay_to_key_id(&KeyId([1u8; crate::types::KEY_ID_LEN]))
    }

    #[test]
    fn new_host_starts_at_genesis() {
        let host = MemHost::new(MockClock::new(1000), 1000);
        assert_eq!(host.height(), 0);
        assert_eq!(host.tip_hash(), Some(host.genesis_hash()));
        assert!(host.tip_header().is_genesis());
    }

    #[test]
    fn assembled_block_extends_the_tip() {
        let host = MemHost::new(MockClock::new(1000), 1000);
        let template = host
            .create_new_block(&dummy_script(), 1010)
            .expect("assembly should succeed");

        assert_eq!(template.block.header.parent, host.genesis_hash());
        assert_eq!(template.block.header.height, 1);
        assert_eq!(template.block.header.timestamp, 1010);
        assert_eq!(template.block.txs.len(), 1);
        assert_eq!(template.total_fees, 0);
    }

    #[test]
    fn submitted_block_becomes_the_tip() {
        let host = MemHost::new(MockClock::new(1000), 1000);
        let mut block = host
            .create_new_block(&dummy_script(), 1010)
            .expect("assembly should succeed")
            .block;
        block.header.merkle_root = host.merkle_root(&block);

        let accepted = host
            .process_new_block(block.clone(), true)
            .expect("submission should succeed");
        assert!(accepted);
        assert_eq!(host.tip_hash(), Some(block.hash()));
        assert_eq!(host.height(), 1);

        // Re-submission is a known duplicate, not an error.
        let again = host
            .process_new_block(block, true)
            .expect("duplicate submission should not error");
        assert!(!again);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let host = MemHost::new(MockClock::new(1000), 1000);
        let mut block = host
            .create_new_block(&dummy_script(), 1010)
            .expect("assembly should succeed")
            .block;
        block.header.parent = BlockHash(Hash256::compute(b"nowhere"));

        assert!(host.process_new_block(block, true).is_err());
    }

    #[test]
    fn shorter_fork_does_not_replace_the_tip() {
        let host = MemHost::new(MockClock::new(1000), 1000);

        let mut first = host
            .create_new_block(&dummy_script(), 1010)
            .expect("assembly should succeed")
            .block;
        first.header.merkle_root = host.merkle_root(&first);
        host.process_new_block(first.clone(), true)
            .expect("submission should succeed");

        // A competing height-1 block on genesis: accepted into the index but
        // the incumbent tip stays.
        let mut fork = first.clone();
        fork.header.timestamp += 5;
        host.process_new_block(fork, true)
            .expect("fork submission should succeed");
        assert_eq!(host.tip_hash(), Some(first.hash()));
    }

    #[test]
    fn merkle_root_handles_odd_counts() {
        let host = MemHost::new(MockClock::new(1000), 1000);
        let block = Block {
            header: Header::genesis(1000),
            txs: vec![
                Transaction { data: vec![1] },
                Transaction { data: vec![2] },
                Transaction { data: vec![3] },
            ],
        };
        let root = host.merkle_root(&block);
        assert_ne!(root, Hash256::zero());
        assert_eq!(root, host.merkle_root(&block));
    }

    #[test]
    fn wallet_yields_keys_only_after_import() {
        let host = MemHost::new(MockClock::new(1000), 1000);
        let key = SigningKey::from_bytes(&[9u8; 32].into()).expect("static key bytes are valid");
        let key_id = KeyId::from_verifying_key(key.verifying_key());

        assert!(host.signing_key(&key_id).is_none());
        host.import_key(key);
        assert!(host.signing_key(&key_id).is_some());
    }

    #[test]
    fn mock_clock_is_hand_driven() {
        let clock = MockClock::new(100);
        assert_eq!(clock.adjusted_time(), 100);
        clock.advance(5);
        assert_eq!(clock.adjusted_time(), 105);
        clock.set(1000);
        assert_eq!(clock.adjusted_time(), 1000);
    }
}
