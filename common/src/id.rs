use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Length in bytes of a block identifier.
pub const BLOCK_ID_LEN: usize = 32;

/// Content-derived identifier of a block.
///
/// A block id is the SHA-256 digest of the block's canonical encoding (see
/// [`crate::crypto::block_id`]), so two blocks with identical bytes always
/// share the same id. It is shown and serialised as lowercase hex and
/// CBOR-encoded as a byte string.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId([u8; BLOCK_ID_LEN]);

impl BlockId {
    /// The all-zero id, used as the parent of the genesis block.
    pub const EMPTY: BlockId = BlockId([0u8; BLOCK_ID_LEN]);

    #[inline]
    pub const fn new(bytes: [u8; BLOCK_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// True for [`BlockId::EMPTY`].
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; BLOCK_ID_LEN]
    }
}

impl From<[u8; BLOCK_ID_LEN]> for BlockId {
    #[inline]
    fn from(bytes: [u8; BLOCK_ID_LEN]) -> Self {
        Self::new(bytes)
    }
}

impl TryFrom<&[u8]> for BlockId {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let id: [u8; BLOCK_ID_LEN] = value.try_into()?;
        Ok(Self::new(id))
    }
}

impl AsRef<[u8]> for BlockId {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlockId").field(&hex::encode(self.0)).finish()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for BlockId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BLOCK_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self::new(bytes))
    }
}

impl Serialize for BlockId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<C> minicbor::Encode<C> for BlockId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'a, C> minicbor::Decode<'a, C> for BlockId {
    fn decode(
        d: &mut minicbor::Decoder<'a>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let bytes = d.bytes()?;
        Self::try_from(bytes)
            .map_err(|_| minicbor::decode::Error::message("block id must be 32 bytes"))
    }
}
