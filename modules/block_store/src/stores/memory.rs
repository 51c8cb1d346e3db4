use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use timestampvm_common::BlockId;

use crate::stores::{StagedWrite, StagedWrites, StoredBlock};

/// Block store kept entirely in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    committed: RwLock<Committed>,
    staged: StagedWrites,
}

#[derive(Debug, Default)]
struct Committed {
    blocks: HashMap<BlockId, StoredBlock>,
    last_accepted: Option<BlockId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed blocks.
    pub fn len(&self) -> usize {
        self.committed.read().unwrap_or_else(PoisonError::into_inner).blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl super::Store for InMemoryStore {
    fn get_block(&self, id: &BlockId) -> Result<Option<StoredBlock>> {
        let committed = self.committed.read().unwrap_or_else(PoisonError::into_inner);
        Ok(committed.blocks.get(id).cloned())
    }

    fn put_block(&self, id: &BlockId, block: &StoredBlock) -> Result<()> {
        self.staged.push(StagedWrite::Block(*id, block.clone()));
        Ok(())
    }

    fn get_last_accepted(&self) -> Result<Option<BlockId>> {
        Ok(self.committed.read().unwrap_or_else(PoisonError::into_inner).last_accepted)
    }

    fn set_last_accepted(&self, id: &BlockId) -> Result<()> {
        self.staged.push(StagedWrite::LastAccepted(*id));
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let writes = self.staged.take();
        let mut committed = self.committed.write().unwrap_or_else(PoisonError::into_inner);
        for write in writes {
            match write {
                StagedWrite::Block(id, block) => {
                    committed.blocks.insert(id, block);
                }
                StagedWrite::LastAccepted(id) => committed.last_accepted = Some(id),
            }
        }
        Ok(())
    }

    fn discard(&self) {
        self.staged.clear();
    }
}
