//! Block core of the timestamp chain VM.
//!
//! Every block carries a parent id, a height, a timestamp and a 32 byte
//! payload. A block is verified against its parent and local time, held in
//! the pending set while consensus runs, and finally accepted or rejected,
//! which persists it in the [`Store`](timestampvm_module_block_store::Store).

pub mod block;
pub mod block_error;
pub mod context;
pub mod lifecycle;
pub mod pending_blocks;
pub mod validator;

pub use block::{Block, BlockData, DATA_LEN, ENCODED_LEN};
pub use block_error::{BlockDecodeError, LifecycleError, ValidationError};
pub use context::ChainContext;
pub use pending_blocks::PendingBlockSet;
