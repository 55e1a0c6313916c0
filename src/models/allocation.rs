use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// One validated entry of the merkle allocation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationEntry {
    /// Address as written in the document (used for claim links).
    pub address: String,
    /// Total locked amount in wei.
    pub amount: U256,
    /// Merkle leaf index.
    pub index: u64,
    /// Merkle proof hashes, hex strings.
    pub proof: Vec<String>,
}

/// Parsed merkle allocation document, loaded once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleDocument {
    /// Distributor index the document was generated under, when recorded.
    pub dindex: Option<u64>,
    pub entries: Vec<AllocationEntry>,
}

/// Classification of a voter against the allocation dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Allocation entry exists and covers the vote weight.
    Matched,
    /// Allocation entry exists but the vote weight exceeds it.
    PartialMatch,
    /// Voter has no allocation entry.
    Unmatched,
}

/// Reconciliation output row, one per voter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedVoter {
    pub kind: MatchKind,
    /// EIP-55 checksummed address carried over from the voter record.
    pub address: String,
    /// Currently unlockable amount in wei.
    pub amount: U256,
    pub is_claimable: bool,
}
