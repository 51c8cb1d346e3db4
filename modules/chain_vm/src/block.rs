//! Block representation and its canonical byte encoding.
//!
//! A block is encoded as exactly [`ENCODED_LEN`] bytes, all integers
//! big-endian:
//!
//! | offset | width | field                      |
//! |--------|-------|----------------------------|
//! | 0      | 32    | parent id                  |
//! | 32     | 8     | height (`u64`)             |
//! | 40     | 8     | timestamp (`i64` Unix secs)|
//! | 48     | 32    | payload                    |
//!
//! The same bytes are hashed for the block id and persisted in the store,
//! so changing this layout changes every block id.

use chrono::{DateTime, Utc};
use timestampvm_common::{crypto, BlockId, BlockStatus, BLOCK_ID_LEN};

use crate::block_error::BlockDecodeError;

/// Length of the opaque payload carried by every block.
pub const DATA_LEN: usize = 32;

/// Length of a block's canonical encoding.
pub const ENCODED_LEN: usize = BLOCK_ID_LEN + 8 + 8 + DATA_LEN;

pub type BlockData = [u8; DATA_LEN];

const HEIGHT_OFFSET: usize = BLOCK_ID_LEN;
const TIMESTAMP_OFFSET: usize = HEIGHT_OFFSET + 8;
const DATA_OFFSET: usize = TIMESTAMP_OFFSET + 8;

/// The immutable fields a proposer chooses.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Contents {
    parent_id: BlockId,
    height: u64,
    /// Unix seconds.
    timestamp: i64,
    data: BlockData,
}

impl Contents {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENCODED_LEN);
        bytes.extend_from_slice(self.parent_id.as_ref());
        bytes.extend_from_slice(&self.height.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    fn decode(bytes: &[u8]) -> Result<Self, BlockDecodeError> {
        let bytes: &[u8; ENCODED_LEN] =
            bytes.try_into().map_err(|_| BlockDecodeError::InvalidLength {
                expected: ENCODED_LEN,
                got: bytes.len(),
            })?;

        let mut parent_id = [0u8; BLOCK_ID_LEN];
        parent_id.copy_from_slice(&bytes[..HEIGHT_OFFSET]);
        let mut height = [0u8; 8];
        height.copy_from_slice(&bytes[HEIGHT_OFFSET..TIMESTAMP_OFFSET]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[TIMESTAMP_OFFSET..DATA_OFFSET]);
        let mut data = [0u8; DATA_LEN];
        data.copy_from_slice(&bytes[DATA_OFFSET..]);

        let timestamp = i64::from_be_bytes(timestamp);
        if DateTime::from_timestamp(timestamp, 0).is_none() {
            return Err(BlockDecodeError::TimestampOutOfRange(timestamp));
        }

        Ok(Self {
            parent_id: BlockId::new(parent_id),
            height: u64::from_be_bytes(height),
            timestamp,
            data,
        })
    }
}

/// One element of the chain.
///
/// A `Block` is a plain value: the store, clock and pending set it is
/// checked against are handed to [`Block::verify`], [`Block::accept`] and
/// [`Block::reject`] through a [`ChainContext`](crate::context::ChainContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    contents: Contents,
    bytes: Vec<u8>,
    pub(crate) status: BlockStatus,
}

impl Block {
    /// Build a new, not yet persisted block. Its status is `Unknown`.
    ///
    /// Sub-second precision of `timestamp` is dropped.
    pub fn new(
        parent_id: BlockId,
        height: u64,
        timestamp: DateTime<Utc>,
        data: BlockData,
    ) -> Self {
        let contents = Contents {
            parent_id,
            height,
            timestamp: timestamp.timestamp(),
            data,
        };
        let bytes = contents.encode();
        Self::initialize(contents, bytes, BlockStatus::Unknown)
    }

    /// Decode a block from its canonical encoding and bind it to `status`,
    /// normally the status the store reports for it.
    pub fn parse(bytes: &[u8], status: BlockStatus) -> Result<Self, BlockDecodeError> {
        let contents = Contents::decode(bytes)?;
        Ok(Self::initialize(contents, bytes.to_vec(), status))
    }

    /// Bind the encoded bytes to their id and the given status.
    fn initialize(contents: Contents, bytes: Vec<u8>, status: BlockStatus) -> Self {
        Self {
            id: crypto::block_id(&bytes),
            contents,
            bytes,
            status,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn parent_id(&self) -> BlockId {
        self.contents.parent_id
    }

    /// The genesis block has height 0.
    pub fn height(&self) -> u64 {
        self.contents.height
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.contents.timestamp, 0).unwrap_or_default()
    }

    /// Timestamp in Unix seconds, as encoded.
    pub fn timestamp_secs(&self) -> i64 {
        self.contents.timestamp
    }

    pub fn status(&self) -> BlockStatus {
        self.status
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn data(&self) -> &BlockData {
        &self.contents.data
    }
}
