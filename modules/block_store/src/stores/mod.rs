use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use timestampvm_common::{BlockId, BlockStatus};

pub mod fjall;
pub mod memory;

/// Durable record of decided blocks and of the last accepted block.
///
/// Writes are staged by `put_block` and `set_last_accepted` and only become
/// visible to readers once `commit` applies them together. `discard` drops
/// whatever is staged. Reads always see committed state.
///
/// `commit` returns an error only when none of the staged writes became
/// visible. Once it returns `Ok` the writes are committed; how durable they
/// are is up to the implementation.
pub trait Store: Send + Sync {
    fn get_block(&self, id: &BlockId) -> Result<Option<StoredBlock>>;
    fn put_block(&self, id: &BlockId, block: &StoredBlock) -> Result<()>;

    fn get_last_accepted(&self) -> Result<Option<BlockId>>;
    fn set_last_accepted(&self, id: &BlockId) -> Result<()>;

    fn commit(&self) -> Result<()>;
    fn discard(&self);
}

/// A block as persisted: its canonical encoding plus its decided status.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct StoredBlock {
    #[n(0)]
    #[cbor(with = "minicbor::bytes")]
    pub bytes: Vec<u8>,
    #[n(1)]
    pub status: BlockStatus,
}

impl StoredBlock {
    pub fn new(bytes: Vec<u8>, status: BlockStatus) -> Self {
        Self { bytes, status }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum StagedWrite {
    Block(BlockId, StoredBlock),
    LastAccepted(BlockId),
}

/// Writes waiting for the next commit, in the order they were issued.
#[derive(Debug, Default)]
pub(crate) struct StagedWrites {
    writes: Mutex<Vec<StagedWrite>>,
}

impl StagedWrites {
    pub(crate) fn push(&self, write: StagedWrite) {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).push(write);
    }

    pub(crate) fn take(&self) -> Vec<StagedWrite> {
        std::mem::take(&mut *self.writes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn clear(&self) {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
