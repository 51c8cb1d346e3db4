//! Verification of a block against its parent and local time.

use timestampvm_common::BlockStatus;
use tracing::debug;

use crate::block::Block;
use crate::block_error::ValidationError;
use crate::context::ChainContext;

impl Block {
    /// Check the block against its parent and register it as pending.
    ///
    /// A block is valid when:
    /// - its height is its parent's height plus one,
    /// - `parent.timestamp <= timestamp < now + max_future_skew`.
    ///
    /// The parent is looked up among pending blocks first, then in the store.
    /// A block the store has already recorded as accepted or rejected is
    /// refused and takes on that status. On success the block becomes
    /// `Processing` and is (re)inserted into the pending set. Calling this
    /// again re-runs every check.
    pub fn verify(&mut self, ctx: &ChainContext) -> Result<(), ValidationError> {
        let id = self.id();
        if self.status().decided() {
            return Err(ValidationError::AlreadyDecided {
                id,
                status: self.status(),
            });
        }

        let parent_id = self.parent_id();
        let parent = match ctx.get_block(&parent_id) {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                debug!("Block {id}: parent {parent_id} not found");
                return Err(ValidationError::ParentLookupFailed { parent: parent_id });
            }
            Err(e) => {
                debug!("Block {id}: could not load parent {parent_id}: {e:#}");
                return Err(ValidationError::ParentLookupFailed { parent: parent_id });
            }
        };

        let expected = parent.height().checked_add(1);
        if expected != Some(self.height()) {
            return Err(ValidationError::HeightMismatch {
                expected: expected.unwrap_or(u64::MAX),
                found: self.height(),
            });
        }

        if self.timestamp_secs() < parent.timestamp_secs() {
            return Err(ValidationError::TimestampTooEarly {
                timestamp: self.timestamp_secs(),
                parent_timestamp: parent.timestamp_secs(),
            });
        }

        let limit = ctx.timestamp_limit();
        if self.timestamp_secs() >= limit {
            return Err(ValidationError::TimestampTooLate {
                timestamp: self.timestamp_secs(),
                limit,
            });
        }

        // The store may already hold a decision for this id, made through
        // another copy of the block.
        let mut pending = self.clone();
        pending.status = BlockStatus::Processing;
        let admitted = ctx.pending().insert_if(pending, |_| match ctx.decided_status(&id) {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(ValidationError::AlreadyDecided { id, status }),
            Err(e) => {
                debug!("Block {id}: could not load its recorded status: {e:#}");
                Err(ValidationError::StatusLookupFailed { id })
            }
        });
        if let Err(ValidationError::AlreadyDecided { status, .. }) = &admitted {
            self.status = *status;
        }
        admitted?;
        self.status = BlockStatus::Processing;

        debug!("Verified block {id} at height {}", self.height());
        Ok(())
    }
}
