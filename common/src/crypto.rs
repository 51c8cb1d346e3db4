//! Hashing helpers for block identities

use sha2::{Digest, Sha256};

use crate::id::BlockId;

/// Get the SHA-256 id of a block's encoded bytes
pub fn block_id(bytes: &[u8]) -> BlockId {
    BlockId::new(Sha256::digest(bytes).into())
}
