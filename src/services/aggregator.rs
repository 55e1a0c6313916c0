//! Deterministic vote aggregation.
//!
//! Folds decoded events into one record per voter. Events are first sorted
//! into canonical chain order (block number, then log index), so a voter's
//! later vote supersedes an earlier one no matter what order the chunks
//! arrived in. Output is sorted case-insensitively by address for
//! diff-stable CSV.

use std::collections::HashMap;

use alloy::primitives::Address;

use crate::models::vote::{VoteCastEvent, VoterRecord};

/// Collapse decoded events into the final voter record set.
pub fn aggregate(mut events: Vec<VoteCastEvent>) -> Vec<VoterRecord> {
    events.sort_by_key(VoteCastEvent::ordering_key);

    let mut latest: HashMap<Address, VoteCastEvent> = HashMap::with_capacity(events.len());
    for event in events {
        // later canonical position wins
        latest.insert(event.voter, event);
    }

    let mut records: Vec<VoterRecord> = latest
        .into_values()
        .map(|event| VoterRecord {
            address: event.voter.to_checksum(None),
            reason: event.reason,
            weight: event.weight,
        })
        .collect();
    records.sort_by(|a, b| a.address.to_lowercase().cmp(&b.address.to_lowercase()));
    records
}
