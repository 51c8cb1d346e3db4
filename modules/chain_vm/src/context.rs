//! Execution context handed to block operations.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Utc};
use config::Config;
use timestampvm_common::{
    configuration::{max_future_skew, DEFAULT_MAX_FUTURE_SKEW_SECS},
    BlockId, BlockStatus, Clock, SystemClock,
};
use timestampvm_module_block_store::{open_store, Store, StoredBlock};
use tracing::{debug, info};

use crate::block::{Block, BlockData};
use crate::block_error::ValidationError;
use crate::pending_blocks::PendingBlockSet;

/// Everything block operations need besides the block itself: the store,
/// the clock, the pending set and the tolerated clock skew.
///
/// One context is shared by all blocks of a chain.
pub struct ChainContext {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    pending: PendingBlockSet,
    max_future_skew: Duration,
    /// Block new blocks are built on; falls back to the last accepted block.
    preferred: RwLock<Option<BlockId>>,
}

impl ChainContext {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            pending: PendingBlockSet::new(),
            max_future_skew: Duration::from_secs(DEFAULT_MAX_FUTURE_SKEW_SECS),
            preferred: RwLock::new(None),
        }
    }

    /// Set how far ahead of local time a block timestamp may be.
    pub fn with_max_future_skew(mut self, max_future_skew: Duration) -> Self {
        self.max_future_skew = max_future_skew;
        self
    }

    /// Build a context from configuration, using the system clock.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let max_future_skew = max_future_skew(&config);
        info!("Max future skew {max_future_skew:?}");
        let store = open_store(config)?;
        Ok(Self::new(store, Arc::new(SystemClock)).with_max_future_skew(max_future_skew))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn pending(&self) -> &PendingBlockSet {
        &self.pending
    }

    pub fn max_future_skew(&self) -> Duration {
        self.max_future_skew
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Latest acceptable block timestamp, in Unix seconds (exclusive).
    pub(crate) fn timestamp_limit(&self) -> i64 {
        let skew = i64::try_from(self.max_future_skew.as_secs()).unwrap_or(i64::MAX);
        self.now().timestamp().saturating_add(skew)
    }

    /// Verify a block the caller may not have been able to find.
    pub fn verify(&self, block: Option<&mut Block>) -> Result<(), ValidationError> {
        match block {
            Some(block) => block.verify(self),
            None => Err(ValidationError::NilBlock),
        }
    }

    /// Look a block up, preferring the pending set over the store.
    pub fn get_block(&self, id: &BlockId) -> Result<Option<Block>> {
        if let Some(block) = self.pending.get(id) {
            return Ok(Some(block));
        }
        let Some(stored) = self.store.get_block(id)? else {
            return Ok(None);
        };
        let block = Block::parse(&stored.bytes, stored.status)
            .with_context(|| format!("stored block {id} does not decode"))?;
        if block.id() != *id {
            bail!("stored block under {id} hashes to {}", block.id());
        }
        Ok(Some(block))
    }

    /// Decode a block received from elsewhere, taking its status from the
    /// store when the store already knows it.
    pub fn parse_block(&self, bytes: &[u8]) -> Result<Block> {
        let mut block = Block::parse(bytes, BlockStatus::Unknown)?;
        if let Some(stored) = self.store.get_block(&block.id())? {
            block.status = stored.status;
        }
        Ok(block)
    }

    /// The status the store recorded for `id`, if the block was decided.
    pub(crate) fn decided_status(&self, id: &BlockId) -> Result<Option<BlockStatus>> {
        let stored = self.store.get_block(id)?;
        Ok(stored.map(|stored| stored.status).filter(BlockStatus::decided))
    }

    /// Id of the last accepted block, if the chain has been initialised.
    pub fn last_accepted(&self) -> Result<Option<BlockId>> {
        self.store.get_last_accepted()
    }

    /// Make sure the chain has a genesis block and return the last accepted
    /// block.
    ///
    /// On an empty store the genesis block (empty parent, height 0, Unix
    /// epoch timestamp, `data` as payload) is written as accepted. Otherwise
    /// the store is left untouched.
    pub fn initialize_genesis(&self, data: BlockData) -> Result<Block> {
        if let Some(id) = self.store.get_last_accepted()? {
            let block = self
                .get_block(&id)?
                .ok_or_else(|| anyhow!("last accepted block {id} is missing from the store"))?;
            info!("Resuming chain at block {id}, height {}", block.height());
            return Ok(block);
        }

        let mut genesis = Block::new(BlockId::EMPTY, 0, DateTime::<Utc>::default(), data);
        genesis.status = BlockStatus::Accepted;
        let id = genesis.id();
        let record = StoredBlock::new(genesis.bytes().to_vec(), BlockStatus::Accepted);

        let written = self
            .store
            .put_block(&id, &record)
            .and_then(|_| self.store.set_last_accepted(&id))
            .and_then(|_| self.store.commit());
        if let Err(e) = written {
            self.store.discard();
            return Err(e.context("could not write genesis block"));
        }

        info!("Initialised genesis block {id}");
        Ok(genesis)
    }

    pub fn set_preference(&self, id: BlockId) {
        debug!("Preferring block {id}");
        *self.preferred.write().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    /// Forget the preference if it names `id`.
    pub(crate) fn clear_preference(&self, id: &BlockId) {
        let mut preferred = self.preferred.write().unwrap_or_else(PoisonError::into_inner);
        if *preferred == Some(*id) {
            debug!("Dropping preference for block {id}");
            *preferred = None;
        }
    }

    /// The block to build on: the explicit preference, else the last
    /// accepted block.
    pub fn preferred(&self) -> Result<Option<BlockId>> {
        if let Some(id) = *self.preferred.read().unwrap_or_else(PoisonError::into_inner) {
            return Ok(Some(id));
        }
        self.last_accepted()
    }

    /// Build an unverified child of the preferred block carrying `data`.
    ///
    /// The timestamp is the current time, or the parent's timestamp if the
    /// clock is behind it. Fails if the preferred block was rejected.
    pub fn build_block(&self, data: BlockData) -> Result<Block> {
        let Some(parent_id) = self.preferred()? else {
            bail!("chain has no accepted block; initialise genesis first");
        };
        let parent = self
            .get_block(&parent_id)?
            .ok_or_else(|| anyhow!("preferred block {parent_id} is unknown"))?;
        if parent.status().rejected() {
            bail!("preferred block {parent_id} was rejected");
        }
        let height = parent
            .height()
            .checked_add(1)
            .ok_or_else(|| anyhow!("parent {parent_id} is at maximum height"))?;
        let timestamp = self.now().max(parent.timestamp());

        let block = Block::new(parent_id, height, timestamp, data);
        debug!("Built block {} at height {height} on {parent_id}", block.id());
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use config::Config;
    use tempfile::TempDir;
    use timestampvm_module_block_store::InMemoryStore;
    use timestampvm_test_utils::{payload, FlakyStore, ManualClock};

    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn memory_context() -> (ChainContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_secs(NOW));
        (ChainContext::new(Arc::new(InMemoryStore::new()), clock.clone()), clock)
    }

    fn fjall_config(dir: &TempDir) -> Arc<Config> {
        Arc::new(
            Config::builder()
                .set_override("store", "fjall")
                .unwrap()
                .set_override("database-path", dir.path().to_str().unwrap())
                .unwrap()
                .set_override("max-future-skew-secs", 120)
                .unwrap()
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn genesis_is_accepted_and_recorded() {
        let (ctx, _) = memory_context();
        assert_eq!(ctx.last_accepted().unwrap(), None);

        let genesis = ctx.initialize_genesis(payload(0)).unwrap();
        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.parent_id(), BlockId::EMPTY);
        assert_eq!(genesis.timestamp_secs(), 0);
        assert_eq!(genesis.status(), BlockStatus::Accepted);
        assert_eq!(ctx.last_accepted().unwrap(), Some(genesis.id()));
        assert!(ctx.pending().is_empty());
    }

    #[test]
    fn genesis_is_not_rewritten() {
        let (ctx, _) = memory_context();
        let first = ctx.initialize_genesis(payload(0)).unwrap();
        let second = ctx.initialize_genesis(payload(9)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_genesis_write_leaves_store_empty() {
        let store = Arc::new(FlakyStore::new());
        let ctx = ChainContext::new(store.clone(), Arc::new(ManualClock::at_secs(NOW)));

        store.fail_commit(true);
        assert!(ctx.initialize_genesis(payload(0)).is_err());

        store.fail_commit(false);
        store.commit().unwrap();
        assert_eq!(store.get_last_accepted().unwrap(), None);
    }

    #[test]
    fn from_config_reads_skew_and_resumes_chain() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = {
            let ctx = ChainContext::from_config(fjall_config(&dir)).unwrap();
            assert_eq!(ctx.max_future_skew(), Duration::from_secs(120));
            ctx.initialize_genesis(payload(0)).unwrap()
        };

        let ctx = ChainContext::from_config(fjall_config(&dir)).unwrap();
        assert_eq!(ctx.last_accepted().unwrap(), Some(genesis.id()));
        assert_eq!(ctx.initialize_genesis(payload(1)).unwrap(), genesis);
    }

    #[test]
    fn build_block_extends_preferred() {
        let (ctx, clock) = memory_context();
        let genesis = ctx.initialize_genesis(payload(0)).unwrap();

        let first = ctx.build_block(payload(1)).unwrap();
        assert_eq!(first.parent_id(), genesis.id());
        assert_eq!(first.height(), 1);
        assert_eq!(first.timestamp_secs(), NOW);
        assert_eq!(first.status(), BlockStatus::Unknown);

        let mut first = first;
        first.verify(&ctx).unwrap();
        ctx.set_preference(first.id());
        assert_eq!(ctx.preferred().unwrap(), Some(first.id()));

        // A clock behind the parent never yields an earlier child.
        clock.set(DateTime::from_timestamp(NOW - 500, 0).unwrap());
        let second = ctx.build_block(payload(2)).unwrap();
        assert_eq!(second.parent_id(), first.id());
        assert_eq!(second.height(), 2);
        assert_eq!(second.timestamp_secs(), NOW);
    }

    #[test]
    fn build_block_needs_genesis() {
        let (ctx, _) = memory_context();
        assert!(ctx.build_block(payload(1)).is_err());
    }

    #[test]
    fn get_block_prefers_pending_then_store() {
        let (ctx, _) = memory_context();
        let genesis = ctx.initialize_genesis(payload(0)).unwrap();
        let mut child = ctx.build_block(payload(1)).unwrap();

        assert_eq!(ctx.get_block(&child.id()).unwrap(), None);
        child.verify(&ctx).unwrap();
        assert_eq!(ctx.get_block(&child.id()).unwrap(), Some(child.clone()));
        assert_eq!(ctx.get_block(&genesis.id()).unwrap(), Some(genesis));
    }

    #[test]
    fn parse_block_takes_status_from_store() {
        let (ctx, _) = memory_context();
        let genesis = ctx.initialize_genesis(payload(0)).unwrap();
        let child = ctx.build_block(payload(1)).unwrap();

        let parsed = ctx.parse_block(genesis.bytes()).unwrap();
        assert_eq!(parsed.status(), BlockStatus::Accepted);
        let parsed = ctx.parse_block(child.bytes()).unwrap();
        assert_eq!(parsed.status(), BlockStatus::Unknown);
        assert!(ctx.parse_block(&[0; 3]).is_err());
    }

    #[test]
    fn corrupt_store_entry_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = ChainContext::new(store.clone(), Arc::new(ManualClock::at_secs(NOW)));
        let id = BlockId::new([4; 32]);
        store
            .put_block(&id, &StoredBlock::new(vec![1, 2, 3], BlockStatus::Accepted))
            .unwrap();
        store.commit().unwrap();

        assert!(ctx.get_block(&id).is_err());
    }

    #[test]
    fn build_block_refuses_rejected_preference() {
        let (ctx, _) = memory_context();
        let genesis = ctx.initialize_genesis(payload(0)).unwrap();
        let mut child = ctx.build_block(payload(1)).unwrap();
        child.verify(&ctx).unwrap();
        child.reject(&ctx).unwrap();

        // Preferring a block after it was rejected.
        ctx.set_preference(child.id());
        assert!(ctx.build_block(payload(2)).is_err());

        ctx.set_preference(genesis.id());
        assert_eq!(ctx.build_block(payload(2)).unwrap().parent_id(), genesis.id());
    }

    #[test]
    fn decided_status_ignores_undecided_records() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = ChainContext::new(store.clone(), Arc::new(ManualClock::at_secs(NOW)));
        let processing = BlockId::new([5; 32]);
        store
            .put_block(&processing, &StoredBlock::new(vec![0; 80], BlockStatus::Processing))
            .unwrap();
        store.commit().unwrap();

        assert_eq!(ctx.decided_status(&processing).unwrap(), None);
        assert_eq!(ctx.decided_status(&BlockId::new([6; 32])).unwrap(), None);

        let genesis = ctx.initialize_genesis(payload(0)).unwrap();
        assert_eq!(ctx.decided_status(&genesis.id()).unwrap(), Some(BlockStatus::Accepted));
    }
}
