//! Terminal accept/reject decisions.

use anyhow::Result;
use timestampvm_common::{BlockId, BlockStatus};
use timestampvm_module_block_store::{Store, StoredBlock};
use tracing::{info, warn};

use crate::block::Block;
use crate::block_error::LifecycleError;
use crate::context::ChainContext;

impl Block {
    /// Finalise this block.
    ///
    /// Writes the block record, then points the last accepted block at it,
    /// commits both together and retires the block from the pending set. The
    /// block must be pending, i.e. have passed [`Block::verify`].
    pub fn accept(&mut self, ctx: &ChainContext) -> Result<(), LifecycleError> {
        self.decide(ctx, BlockStatus::Accepted)?;
        info!("Accepted block {} at height {}", self.id(), self.height());
        Ok(())
    }

    /// Decide against this block. The last accepted pointer is left alone.
    pub fn reject(&mut self, ctx: &ChainContext) -> Result<(), LifecycleError> {
        self.decide(ctx, BlockStatus::Rejected)?;
        info!("Rejected block {} at height {}", self.id(), self.height());
        Ok(())
    }

    /// Refused if the store already recorded a decision for this id. On a
    /// store failure nothing is committed, staged writes are dropped and the
    /// block stays pending with its previous status.
    fn decide(&mut self, ctx: &ChainContext, status: BlockStatus) -> Result<(), LifecycleError> {
        let id = self.id();
        if self.status().decided() {
            return Err(LifecycleError::AlreadyDecided {
                id,
                status: self.status(),
            });
        }

        let store = ctx.store();
        let record = StoredBlock::new(self.bytes().to_vec(), status);
        let retired = ctx.pending().retire(&id, |_| {
            let recorded = ctx
                .decided_status(&id)
                .map_err(|source| LifecycleError::Persistence { id, source })?;
            if let Some(recorded) = recorded {
                return Err(LifecycleError::AlreadyDecided {
                    id,
                    status: recorded,
                });
            }
            persist(store, &id, &record).map_err(|source| {
                store.discard();
                warn!("Could not persist {status} block {id}: {source:#}");
                LifecycleError::Persistence { id, source }
            })
        });

        match retired {
            Ok(_) => {}
            Err(LifecycleError::AlreadyDecided { status: recorded, .. }) => {
                // A copy pending under an id the store has already decided.
                ctx.pending().remove(&id);
                self.status = recorded;
                return Err(LifecycleError::AlreadyDecided {
                    id,
                    status: recorded,
                });
            }
            Err(e) => return Err(e),
        }

        self.status = status;
        if status.rejected() {
            ctx.clear_preference(&id);
        }
        Ok(())
    }
}

fn persist(store: &dyn Store, id: &BlockId, record: &StoredBlock) -> Result<()> {
    store.put_block(id, record)?;
    if record.status.accepted() {
        store.set_last_accepted(id)?;
    }
    store.commit()
}
