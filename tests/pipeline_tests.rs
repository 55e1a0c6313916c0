//! End-to-end pipeline scenarios: raw logs through decoding, aggregation,
//! the CSV boundaries, classification and prompt generation.

use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};

use governor_voters::models::allocation::{AllocationEntry, MatchKind, MerkleDocument};
use governor_voters::models::vote::ChainLog;
use governor_voters::services::decoder::{decode_vote_cast, vote_cast_topic};
use governor_voters::services::{aggregator, allocation, csv_io, prompt};

const ADDR_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const ADDR_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..32].copy_from_slice(&value.to_be_bytes());
    word
}

fn topic_for_address(address: Address) -> B256 {
    let mut word = [0u8; 32];
    word[12..32].copy_from_slice(address.as_slice());
    B256::from(word)
}

fn vote_log(
    voter: &str,
    proposal_id: u64,
    block_number: u64,
    log_index: u64,
    support: u64,
    weight: U256,
    reason: &str,
) -> ChainLog {
    let mut data = Vec::new();
    data.extend_from_slice(&word_from_u64(support));
    data.extend_from_slice(&weight.to_be_bytes::<32>());
    data.extend_from_slice(&word_from_u64(96));
    data.extend_from_slice(&word_from_u64(reason.len() as u64));
    data.extend_from_slice(reason.as_bytes());
    while data.len() % 32 != 0 {
        data.push(0);
    }
    ChainLog {
        block_number,
        log_index,
        transaction_hash: None,
        topics: vec![
            vote_cast_topic(),
            topic_for_address(Address::from_str(voter).unwrap()),
            B256::from(U256::from(proposal_id)),
        ],
        data,
    }
}

#[test]
fn test_supersession_scenario_yields_two_sorted_rows() {
    let logs = vec![
        vote_log(ADDR_A, 42, 100, 0, 1, U256::from(5u64), "yes"),
        vote_log(ADDR_B, 42, 101, 0, 1, U256::from(10u64), ""),
        vote_log(ADDR_A, 42, 105, 0, 1, U256::from(5u64), "changed my mind"),
    ];
    let events = logs
        .iter()
        .map(|log| decode_vote_cast(log).unwrap())
        .collect::<Vec<_>>();
    let records = aggregator::aggregate(events);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].address.to_lowercase(), ADDR_A);
    assert_eq!(records[0].reason, "changed my mind");
    assert_eq!(records[1].address.to_lowercase(), ADDR_B);
    assert_eq!(records[1].reason, "");

    // CSV boundary: parse back what was emitted
    let rendered = csv_io::voters_to_csv(&records).unwrap();
    let parsed = csv_io::voters_from_csv(rendered.as_slice()).unwrap();
    assert_eq!(parsed, records);
}

#[test]
fn test_oversized_weight_survives_the_full_boundary() {
    let weight = U256::from_str("123456789012345678901234567890").unwrap();
    let logs = vec![vote_log(ADDR_A, 42, 100, 0, 1, weight, "whale")];
    let events = logs
        .iter()
        .map(|log| decode_vote_cast(log).unwrap())
        .collect::<Vec<_>>();
    let records = aggregator::aggregate(events);

    let rendered = csv_io::voters_to_csv(&records).unwrap();
    let text = String::from_utf8(rendered.clone()).unwrap();
    assert!(text.contains("123456789012345678901234567890"));

    let parsed = csv_io::voters_from_csv(rendered.as_slice()).unwrap();
    assert_eq!(parsed[0].weight, weight);
}

#[test]
fn test_claim_scenario_through_classification_and_prompts() {
    let logs = vec![vote_log(ADDR_B, 42, 101, 0, 1, U256::from(10u64), "")];
    let events = logs
        .iter()
        .map(|log| decode_vote_cast(log).unwrap())
        .collect::<Vec<_>>();
    let records = aggregator::aggregate(events);
    let checksummed_b = records[0].address.clone();

    let document = MerkleDocument {
        dindex: Some(1),
        entries: vec![AllocationEntry {
            address: ADDR_B.to_string(),
            amount: U256::from(1000u64),
            index: 3,
            proof: vec!["0x01".to_string()],
        }],
    };

    let classified =
        allocation::classify(&records, &document, "Q4 2025", 1, &allocation::FullUnlock);
    assert_eq!(classified.len(), 1);
    assert_eq!(classified[0].kind, MatchKind::Matched);
    assert_eq!(classified[0].amount, U256::from(1000u64));
    assert!(classified[0].is_claimable);

    // classified CSV boundary round trip
    let rendered = csv_io::classified_to_csv(&classified).unwrap();
    let parsed = csv_io::classified_from_csv(rendered.as_slice()).unwrap();
    assert_eq!(parsed, classified);

    let messages = prompt::build_prompts(&parsed, &document, "Q4 2025", 1).unwrap();
    assert_eq!(messages.len(), 1);
    let message = messages.get(&checksummed_b).unwrap();
    assert!(message.contains("Q4 2025"));
    assert!(message.contains("dindex=1"));
    assert!(message.contains(&format!("receiver={}", ADDR_B)));
}

#[test]
fn test_unmatched_voter_flows_through_untouched() {
    let logs = vec![vote_log(ADDR_A, 42, 100, 0, 0, U256::from(7u64), "nope")];
    let events = logs
        .iter()
        .map(|log| decode_vote_cast(log).unwrap())
        .collect::<Vec<_>>();
    let records = aggregator::aggregate(events);

    let document = MerkleDocument {
        dindex: Some(1),
        entries: vec![],
    };
    let classified =
        allocation::classify(&records, &document, "Q4 2025", 1, &allocation::FullUnlock);
    assert_eq!(classified.len(), 1);
    assert_eq!(classified[0].kind, MatchKind::Unmatched);
    assert_eq!(classified[0].amount, U256::ZERO);
    assert!(!classified[0].is_claimable);

    // not claimable, so no message and no error
    let messages = prompt::build_prompts(&classified, &document, "Q4 2025", 1).unwrap();
    assert!(messages.is_empty());
}
