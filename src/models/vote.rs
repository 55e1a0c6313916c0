use alloy::primitives::{Address, B256, U256};

/// Raw log entry as returned by the node, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<B256>,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// Support values carried by the governance vote-cast event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    Against,
    For,
    Abstain,
}

impl VoteChoice {
    /// Map the on-chain uint8 support value. Anything outside 0..=2 is not
    /// a valid vote and must abort decoding.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(VoteChoice::Against),
            1 => Some(VoteChoice::For),
            2 => Some(VoteChoice::Abstain),
            _ => None,
        }
    }
}

/// Decoded vote-cast event for one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCastEvent {
    pub voter: Address,
    pub choice: VoteChoice,
    /// Full uint256 voting weight. Never narrowed to a machine integer.
    pub weight: U256,
    pub reason: String,
    pub block_number: u64,
    pub log_index: u64,
}

impl VoteCastEvent {
    /// Canonical ordering key: events are totally ordered by position in
    /// the chain, regardless of fetch order.
    pub fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// One row per unique voter after aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterRecord {
    /// EIP-55 checksummed address.
    pub address: String,
    pub reason: String,
    pub weight: U256,
}

/// Entry configuration for a single fetch run. Defaults (governor address)
/// come from the CLI layer; services never read hidden globals.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub rpc_url: String,
    pub governor: Address,
    pub proposal_id: U256,
    /// Optional override of the scan start block; otherwise the proposal
    /// snapshot block is used.
    pub start_block: Option<u64>,
}
