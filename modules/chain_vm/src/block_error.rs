//! Error types for block verification and decisions.

use timestampvm_common::{BlockId, BlockStatus};

/// Reasons a block fails [`Block::verify`](crate::block::Block::verify).
///
/// None of these are fatal to the node: the caller decides whether to drop
/// the block or try again later (e.g. once the parent is known).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Verification was requested for a block that does not exist.
    #[error("block is nil")]
    NilBlock,

    /// The block has already been accepted or rejected.
    #[error("block {id} is already {status}")]
    AlreadyDecided { id: BlockId, status: BlockStatus },

    /// The store could not tell whether the block itself was already decided.
    #[error("could not look up the recorded status of block {id}")]
    StatusLookupFailed { id: BlockId },

    /// The parent is neither pending nor in the store.
    #[error("could not retrieve parent block {parent}")]
    ParentLookupFailed { parent: BlockId },

    /// The block's height is not its parent's height plus one.
    #[error("expected block to have height {expected}, but found {found}")]
    HeightMismatch { expected: u64, found: u64 },

    #[error("block's timestamp {timestamp} is earlier than its parent's timestamp {parent_timestamp}")]
    TimestampTooEarly {
        timestamp: i64,
        parent_timestamp: i64,
    },

    #[error("block's timestamp {timestamp} is not before the local time limit {limit}")]
    TimestampTooLate { timestamp: i64, limit: i64 },
}

/// Reasons [`Block::accept`](crate::block::Block::accept) or
/// [`Block::reject`](crate::block::Block::reject) fail.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The block is not in the pending set: it was never verified, or it was
    /// already retired by another decision.
    #[error("block {id} is not pending a decision")]
    NotVerified { id: BlockId },

    #[error("block {id} is already {status}")]
    AlreadyDecided { id: BlockId, status: BlockStatus },

    /// A store write or commit failed. Nothing was committed and the block is
    /// still pending, so the whole call may be retried.
    #[error("could not persist decision for block {id}: {source}")]
    Persistence {
        id: BlockId,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors decoding a block from bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockDecodeError {
    #[error("invalid block length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("block timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}
