//! Merkle allocation loading and voter classification.
//!
//! The allocation dataset is a merkle-tree-derived JSON document mapping
//! addresses to locked amounts and claim proofs. It is loaded and validated
//! in full before any classification runs; a schema problem fails the whole
//! command rather than emitting a partial result.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use alloy::primitives::U256;
use serde::Deserialize;
use tracing::debug;

use crate::models::allocation::{AllocationEntry, ClassifiedVoter, MatchKind, MerkleDocument};
use crate::models::vote::VoterRecord;

#[derive(Debug)]
pub enum AllocationError {
    Io(String),
    Json(String),
    Schema(String),
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::Io(msg) => write!(f, "Allocation file error: {}", msg),
            AllocationError::Json(msg) => write!(f, "Allocation JSON error: {}", msg),
            AllocationError::Schema(msg) => write!(f, "Allocation schema error: {}", msg),
        }
    }
}

impl std::error::Error for AllocationError {}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    dindex: Option<u64>,
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    address: String,
    /// Amount appears as a decimal string or a bare number in the wild.
    amount: serde_json::Value,
    index: u64,
    #[serde(default)]
    proof: Vec<String>,
}

/// Load and validate the merkle allocation document.
pub fn load_merkle_document(path: &Path) -> Result<MerkleDocument, AllocationError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AllocationError::Io(format!("{}: {}", path.display(), e)))?;
    let document: RawDocument = serde_json::from_str(&raw)
        .map_err(|e| AllocationError::Json(format!("{}: {}", path.display(), e)))?;

    let mut entries = Vec::with_capacity(document.entries.len());
    for (position, entry) in document.entries.into_iter().enumerate() {
        let address = entry.address.trim().to_string();
        if address.is_empty() {
            return Err(AllocationError::Schema(format!(
                "entry {} has an empty address",
                position
            )));
        }
        let amount = parse_amount(&entry.amount).map_err(|detail| {
            AllocationError::Schema(format!("entry {} ({}): {}", position, address, detail))
        })?;
        entries.push(AllocationEntry {
            address,
            amount,
            index: entry.index,
            proof: entry.proof,
        });
    }

    debug!(
        entries = entries.len(),
        dindex = ?document.dindex,
        "Loaded merkle allocation document"
    );
    Ok(MerkleDocument {
        dindex: document.dindex,
        entries,
    })
}

fn parse_amount(value: &serde_json::Value) -> Result<U256, String> {
    match value {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<U256>()
            .map_err(|e| format!("invalid amount {:?}: {}", s, e)),
        serde_json::Value::Number(n) => {
            let as_u64 = n
                .as_u64()
                .ok_or_else(|| format!("invalid amount {}: not an unsigned integer", n))?;
            Ok(U256::from(as_u64))
        }
        other => Err(format!("invalid amount {}: expected string or number", other)),
    }
}

/// Index document entries by lower-cased address for O(1) lookup.
pub fn index_by_address(document: &MerkleDocument) -> HashMap<String, &AllocationEntry> {
    document
        .entries
        .iter()
        .map(|entry| (entry.address.to_lowercase(), entry))
        .collect()
}

/// Policy mapping (entry, quarter label, distributor index) to the portion
/// of a locked allocation that is currently unlockable. Implementations
/// must be pure; the matcher calls them with no other state.
pub trait VestingPolicy {
    fn unlockable(&self, entry: &AllocationEntry, quarter: &str, dindex: u64) -> U256;
}

/// Treats the full locked amount as unlockable. Matches the distribution
/// documents this tooling is run against, where each quarterly document
/// already carries the claimable tranche per address.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullUnlock;

impl VestingPolicy for FullUnlock {
    fn unlockable(&self, entry: &AllocationEntry, _quarter: &str, _dindex: u64) -> U256 {
        entry.amount
    }
}

/// Reconcile voter records against the allocation document.
///
/// Every voter yields exactly one output row; a voter without an entry is
/// kept as Unmatched with a zero amount, never dropped. Claimable requires
/// an entry, a positive unlockable amount, and a distributor index matching
/// the one the document was generated under.
pub fn classify(
    voters: &[VoterRecord],
    document: &MerkleDocument,
    quarter: &str,
    dindex: u64,
    policy: &dyn VestingPolicy,
) -> Vec<ClassifiedVoter> {
    let by_address = index_by_address(document);
    let dindex_matches = document.dindex.map_or(true, |d| d == dindex);

    voters
        .iter()
        .map(|voter| match by_address.get(&voter.address.to_lowercase()) {
            Some(entry) => {
                let amount = policy.unlockable(entry, quarter, dindex);
                let kind = if entry.amount >= voter.weight {
                    MatchKind::Matched
                } else {
                    MatchKind::PartialMatch
                };
                ClassifiedVoter {
                    kind,
                    address: voter.address.clone(),
                    amount,
                    is_claimable: dindex_matches && amount > U256::ZERO,
                }
            }
            None => ClassifiedVoter {
                kind: MatchKind::Unmatched,
                address: voter.address.clone(),
                amount: U256::ZERO,
                is_claimable: false,
            },
        })
        .collect()
}
