//! Blocks that passed verification and are waiting for a decision.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use timestampvm_common::BlockId;

use crate::block::Block;
use crate::block_error::{LifecycleError, ValidationError};

/// Verified but undecided blocks, keyed by id.
///
/// Lets a child's verification find a parent that is still pending. Every
/// access goes through one mutex, so concurrent verifications and decisions
/// never observe a half-updated map. No entry ever has a terminal status.
#[derive(Debug, Default)]
pub struct PendingBlockSet {
    blocks: Mutex<HashMap<BlockId, Block>>,
}

impl PendingBlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlockId, Block>> {
        self.blocks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a block, replacing any entry with the same id.
    ///
    /// Returns the replaced entry. Accepted or rejected blocks are refused.
    pub fn insert(&self, block: Block) -> Result<Option<Block>, ValidationError> {
        self.insert_if(block, |_| Ok(()))
    }

    /// Like [`insert`](Self::insert), but only if `admit` accepts the block.
    ///
    /// `admit` runs with the lock held, the same lock [`retire`](Self::retire)
    /// holds while a decision is persisted, so no decision on the same id
    /// can land between the check and the insert.
    pub fn insert_if<F>(&self, block: Block, admit: F) -> Result<Option<Block>, ValidationError>
    where
        F: FnOnce(&Block) -> Result<(), ValidationError>,
    {
        if block.status().decided() {
            return Err(ValidationError::AlreadyDecided {
                id: block.id(),
                status: block.status(),
            });
        }
        let mut blocks = self.lock();
        admit(&block)?;
        Ok(blocks.insert(block.id(), block))
    }

    /// Remove the entry if present.
    pub fn remove(&self, id: &BlockId) -> Option<Block> {
        self.lock().remove(id)
    }

    pub fn get(&self, id: &BlockId) -> Option<Block> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.lock().keys().copied().collect()
    }

    /// Run a terminal decision for a pending block and retire it.
    ///
    /// The lock is held while `decide` runs, and the entry is removed only if
    /// `decide` succeeds. Fails with `NotVerified` if the block is not pending.
    pub fn retire<F>(&self, id: &BlockId, decide: F) -> Result<Block, LifecycleError>
    where
        F: FnOnce(&Block) -> Result<(), LifecycleError>,
    {
        let mut blocks = self.lock();
        let Some(block) = blocks.get(id) else {
            return Err(LifecycleError::NotVerified { id: *id });
        };
        decide(block)?;
        blocks.remove(id).ok_or(LifecycleError::NotVerified { id: *id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use timestampvm_common::BlockStatus;

    fn block(n: u8) -> Block {
        Block::new(BlockId::EMPTY, 1, DateTime::from_timestamp(n as i64, 0).unwrap(), [n; 32])
    }

    #[test]
    fn insert_get_remove() {
        let set = PendingBlockSet::new();
        let b = block(1);

        assert!(set.insert(b.clone()).unwrap().is_none());
        assert_eq!(set.get(&b.id()), Some(b.clone()));
        assert_eq!(set.len(), 1);

        assert_eq!(set.remove(&b.id()), Some(b.clone()));
        assert!(set.get(&b.id()).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let set = PendingBlockSet::new();
        let b = block(2);
        set.insert(b.clone()).unwrap();
        let replaced = set.insert(b.clone()).unwrap();

        assert_eq!(replaced, Some(b));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_missing_is_noop() {
        let set = PendingBlockSet::new();
        assert!(set.remove(&BlockId::new([7; 32])).is_none());
    }

    #[test]
    fn refuses_decided_blocks() {
        let set = PendingBlockSet::new();
        let mut b = block(3);
        b.status = BlockStatus::Accepted;

        let err = set.insert(b.clone()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::AlreadyDecided {
                id: b.id(),
                status: BlockStatus::Accepted
            }
        );
        assert!(set.is_empty());
    }

    #[test]
    fn insert_if_refused_leaves_set_untouched() {
        let set = PendingBlockSet::new();
        let b = block(7);

        let err = set
            .insert_if(b.clone(), |block| {
                Err(ValidationError::AlreadyDecided {
                    id: block.id(),
                    status: BlockStatus::Accepted,
                })
            })
            .unwrap_err();
        assert!(matches!(err, ValidationError::AlreadyDecided { .. }));
        assert!(set.is_empty());

        assert!(set.insert_if(b.clone(), |_| Ok(())).unwrap().is_none());
        assert!(set.contains(&b.id()));
    }

    #[test]
    fn retire_removes_on_success() {
        let set = PendingBlockSet::new();
        let b = block(4);
        set.insert(b.clone()).unwrap();

        let retired = set.retire(&b.id(), |_| Ok(())).unwrap();
        assert_eq!(retired.id(), b.id());
        assert!(!set.contains(&b.id()));
    }

    #[test]
    fn retire_keeps_entry_on_failure() {
        let set = PendingBlockSet::new();
        let b = block(5);
        set.insert(b.clone()).unwrap();

        let result = set.retire(&b.id(), |block| {
            Err(LifecycleError::Persistence {
                id: block.id(),
                source: anyhow::anyhow!("disk full"),
            })
        });
        assert!(matches!(result, Err(LifecycleError::Persistence { .. })));
        assert!(set.contains(&b.id()));
    }

    #[test]
    fn retire_unknown_block_is_not_verified() {
        let set = PendingBlockSet::new();
        let id = block(6).id();
        let result = set.retire(&id, |_| panic!("decision must not run"));
        assert!(matches!(result, Err(LifecycleError::NotVerified { id: got }) if got == id));
    }
}
