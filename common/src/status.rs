use std::fmt;

/// Where a block is in its decision lifecycle.
///
/// `Accepted` and `Rejected` are terminal: a block never leaves them.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
pub enum BlockStatus {
    /// No record of the block exists yet.
    #[default]
    #[n(0)]
    Unknown,
    /// Verified and waiting for a decision.
    #[n(1)]
    Processing,
    /// Finalised on the chain.
    #[n(2)]
    Accepted,
    /// Decided against.
    #[n(3)]
    Rejected,
}

impl BlockStatus {
    /// Returns true once the block has been accepted or rejected.
    pub fn decided(&self) -> bool {
        matches!(self, BlockStatus::Accepted | BlockStatus::Rejected)
    }

    pub fn accepted(&self) -> bool {
        matches!(self, BlockStatus::Accepted)
    }

    pub fn rejected(&self) -> bool {
        matches!(self, BlockStatus::Rejected)
    }

    pub fn processing(&self) -> bool {
        matches!(self, BlockStatus::Processing)
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockStatus::Unknown => write!(f, "unknown"),
            BlockStatus::Processing => write!(f, "processing"),
            BlockStatus::Accepted => write!(f, "accepted"),
            BlockStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_statuses_are_decided() {
        assert!(BlockStatus::Accepted.decided());
        assert!(BlockStatus::Rejected.decided());
        assert!(!BlockStatus::Processing.decided());
        assert!(!BlockStatus::Unknown.decided());
    }

    #[test]
    fn default_is_unknown() {
        assert_eq!(BlockStatus::default(), BlockStatus::Unknown);
    }

    #[test]
    fn cbor_round_trip_keeps_variant() {
        let bytes = minicbor::to_vec(BlockStatus::Rejected).unwrap();
        let status: BlockStatus = minicbor::decode(&bytes).unwrap();
        assert!(status.rejected());
    }
}
