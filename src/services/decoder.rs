//! Vote-cast event decoding.
//!
//! Turns a raw governor log into a typed [`VoteCastEvent`]. Two ABI shapes
//! are supported: the plain event and the extension-parameter event that
//! carries opaque `params` bytes after the reason. The shape is detected
//! from the reason head offset in the data section. A log that matches
//! neither shape, carries a truncated payload, or declares a support value
//! outside the vote enum is a fatal decode error; a corrupted vote is never
//! silently dropped.

use alloy::primitives::{keccak256, Address, B256, U256};

use crate::models::vote::{ChainLog, VoteCastEvent, VoteChoice};

/// VoteCast(address indexed voter, uint256 indexed proposalId, uint8 support, uint256 weight, string reason)
pub const VOTE_CAST_SIGNATURE: &str = "VoteCast(address,uint256,uint8,uint256,string)";

/// VoteCastWithParams(address indexed voter, uint256 indexed proposalId, uint8 support, uint256 weight, string reason, bytes params)
pub const VOTE_CAST_WITH_PARAMS_SIGNATURE: &str =
    "VoteCastWithParams(address,uint256,uint8,uint256,string,bytes)";

const WORD: usize = 32;
/// Indexed topics: event signature, voter, proposal id.
const EXPECTED_TOPICS: usize = 3;
/// Head words of the plain shape: support, weight, reason offset.
const PLAIN_HEAD_WORDS: usize = 3;
/// The extension shape adds a params offset word to the head.
const PARAMS_HEAD_WORDS: usize = 4;

/// topic0 of the plain vote-cast shape.
pub fn vote_cast_topic() -> B256 {
    keccak256(VOTE_CAST_SIGNATURE.as_bytes())
}

/// topic0 of the extension-parameter shape.
pub fn vote_cast_with_params_topic() -> B256 {
    keccak256(VOTE_CAST_WITH_PARAMS_SIGNATURE.as_bytes())
}

#[derive(Debug)]
pub enum DecodeError {
    UnexpectedTopicCount { expected: usize, actual: usize },
    UnknownEventTopic(B256),
    TruncatedData { needed: usize, actual: usize },
    /// The reason head offset matches neither known data layout.
    UnknownLayout { reason_offset: usize },
    /// An offset or length word does not fit in an in-memory size.
    OversizedWord,
    SupportOutOfRange(U256),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnexpectedTopicCount { expected, actual } => {
                write!(f, "expected {} topics, log has {}", expected, actual)
            }
            DecodeError::UnknownEventTopic(topic) => {
                write!(f, "log topic0 {} is not a vote-cast event", topic)
            }
            DecodeError::TruncatedData { needed, actual } => {
                write!(f, "log data truncated: need {} bytes, have {}", needed, actual)
            }
            DecodeError::UnknownLayout { reason_offset } => {
                write!(f, "unrecognized data layout (reason offset {})", reason_offset)
            }
            DecodeError::OversizedWord => write!(f, "offset or length word out of range"),
            DecodeError::SupportOutOfRange(value) => {
                write!(f, "support value {} outside the vote enum", value)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode a governor log known to match the vote-cast filter.
pub fn decode_vote_cast(log: &ChainLog) -> Result<VoteCastEvent, DecodeError> {
    if log.topics.len() != EXPECTED_TOPICS {
        return Err(DecodeError::UnexpectedTopicCount {
            expected: EXPECTED_TOPICS,
            actual: log.topics.len(),
        });
    }
    let topic0 = log.topics[0];
    if topic0 != vote_cast_topic() && topic0 != vote_cast_with_params_topic() {
        return Err(DecodeError::UnknownEventTopic(topic0));
    }

    let voter = Address::from_slice(&log.topics[1][12..32]);

    let data = &log.data;
    if data.len() < PLAIN_HEAD_WORDS * WORD {
        return Err(DecodeError::TruncatedData {
            needed: PLAIN_HEAD_WORDS * WORD,
            actual: data.len(),
        });
    }

    let support_word = U256::from_be_slice(&data[0..WORD]);
    let weight = U256::from_be_slice(&data[WORD..2 * WORD]);
    let reason_offset = word_as_usize(&data[2 * WORD..3 * WORD])?;

    // The plain event's dynamic section starts after three head words, the
    // params event's after four; the offset must agree with the topic.
    let head_words = if topic0 == vote_cast_topic() {
        PLAIN_HEAD_WORDS
    } else {
        PARAMS_HEAD_WORDS
    };
    if reason_offset != head_words * WORD {
        return Err(DecodeError::UnknownLayout { reason_offset });
    }
    if data.len() < head_words * WORD {
        return Err(DecodeError::TruncatedData {
            needed: head_words * WORD,
            actual: data.len(),
        });
    }

    if support_word > U256::from(u8::MAX) {
        return Err(DecodeError::SupportOutOfRange(support_word));
    }
    let choice = VoteChoice::from_wire(support_word.to::<u8>())
        .ok_or(DecodeError::SupportOutOfRange(support_word))?;

    let reason = decode_reason(data, reason_offset)?;

    Ok(VoteCastEvent {
        voter,
        choice,
        weight,
        reason,
        block_number: log.block_number,
        log_index: log.log_index,
    })
}

/// Decode the length-prefixed reason string at `offset` in the data section.
/// Reason bytes decode lossily; structural truncation stays fatal.
fn decode_reason(data: &[u8], offset: usize) -> Result<String, DecodeError> {
    let length_end = offset.checked_add(WORD).ok_or(DecodeError::OversizedWord)?;
    if data.len() < length_end {
        return Err(DecodeError::TruncatedData {
            needed: length_end,
            actual: data.len(),
        });
    }
    let length = word_as_usize(&data[offset..length_end])?;
    let reason_end = length_end.checked_add(length).ok_or(DecodeError::OversizedWord)?;
    if data.len() < reason_end {
        return Err(DecodeError::TruncatedData {
            needed: reason_end,
            actual: data.len(),
        });
    }
    Ok(String::from_utf8_lossy(&data[length_end..reason_end]).into_owned())
}

/// Read a 32-byte big-endian word as a usize offset/length.
fn word_as_usize(word: &[u8]) -> Result<usize, DecodeError> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(DecodeError::OversizedWord);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..WORD]);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| DecodeError::OversizedWord)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

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

    fn plain_log(support: u64, weight: U256, reason: &str) -> ChainLog {
        let mut data = Vec::new();
        data.extend_from_slice(&word_from_u64(support));
        data.extend_from_slice(&weight.to_be_bytes::<32>());
        data.extend_from_slice(&word_from_u64(96)); // reason offset
        data.extend_from_slice(&word_from_u64(reason.len() as u64));
        data.extend_from_slice(reason.as_bytes());
        // pad the tail to a word boundary as the ABI encoder does
        while data.len() % 32 != 0 {
            data.push(0);
        }
        ChainLog {
            block_number: 100,
            log_index: 1,
            transaction_hash: None,
            topics: vec![
                vote_cast_topic(),
                topic_for_address(Address::from_str("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap()),
                B256::from(U256::from(42u64)),
            ],
            data,
        }
    }

    #[test]
    fn test_topic_constants_match_known_signatures() {
        assert_eq!(
            format!("{}", vote_cast_topic()),
            "0xb8e138887d0aa13bab447e82de9d5c1777041ecd21ca36ba824ff1e6c07ddda4"
        );
        assert_eq!(
            format!("{}", vote_cast_with_params_topic()),
            "0xe2babfbac5889a709b63bb7f598b324e08bc5a4fb9ec647fb3cbc9ec07eb8712"
        );
    }

    #[test]
    fn test_decode_plain_shape() {
        let log = plain_log(1, U256::from(5u64), "yes");
        let event = decode_vote_cast(&log).unwrap();
        assert_eq!(event.choice, VoteChoice::For);
        assert_eq!(event.weight, U256::from(5u64));
        assert_eq!(event.reason, "yes");
        assert_eq!(event.block_number, 100);
        assert_eq!(event.log_index, 1);
    }

    #[test]
    fn test_decode_empty_reason() {
        let log = plain_log(2, U256::from(10u64), "");
        let event = decode_vote_cast(&log).unwrap();
        assert_eq!(event.choice, VoteChoice::Abstain);
        assert_eq!(event.reason, "");
    }

    #[test]
    fn test_decode_params_shape() {
        let reason = "with params";
        let params: &[u8] = &[0xde, 0xad];
        let mut data = Vec::new();
        data.extend_from_slice(&word_from_u64(0)); // support: Against
        data.extend_from_slice(&U256::from(7u64).to_be_bytes::<32>());
        data.extend_from_slice(&word_from_u64(128)); // reason offset
        let reason_padded = reason.len().div_ceil(32) * 32;
        data.extend_from_slice(&word_from_u64((128 + 32 + reason_padded) as u64)); // params offset
        data.extend_from_slice(&word_from_u64(reason.len() as u64));
        data.extend_from_slice(reason.as_bytes());
        while data.len() % 32 != 0 {
            data.push(0);
        }
        data.extend_from_slice(&word_from_u64(params.len() as u64));
        data.extend_from_slice(params);
        while data.len() % 32 != 0 {
            data.push(0);
        }

        let mut log = plain_log(0, U256::ZERO, "");
        log.topics[0] = vote_cast_with_params_topic();
        log.data = data;

        let event = decode_vote_cast(&log).unwrap();
        assert_eq!(event.choice, VoteChoice::Against);
        assert_eq!(event.weight, U256::from(7u64));
        assert_eq!(event.reason, reason);
    }

    #[test]
    fn test_decode_weight_beyond_u64() {
        let weight = U256::from_str("123456789012345678901234567890").unwrap();
        let log = plain_log(1, weight, "big");
        let event = decode_vote_cast(&log).unwrap();
        assert_eq!(event.weight.to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn test_support_out_of_range_is_fatal() {
        let log = plain_log(3, U256::from(1u64), "bad");
        match decode_vote_cast(&log) {
            Err(DecodeError::SupportOutOfRange(value)) => {
                assert_eq!(value, U256::from(3u64));
            }
            other => panic!("expected SupportOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_is_fatal() {
        let mut log = plain_log(1, U256::from(1u64), "reason text");
        log.data.truncate(100);
        assert!(matches!(
            decode_vote_cast(&log),
            Err(DecodeError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_unknown_layout_is_fatal() {
        let mut log = plain_log(1, U256::from(1u64), "x");
        // overwrite the reason offset with something neither shape uses
        log.data[64..96].copy_from_slice(&word_from_u64(64));
        assert!(matches!(
            decode_vote_cast(&log),
            Err(DecodeError::UnknownLayout { reason_offset: 64 })
        ));
    }

    #[test]
    fn test_plain_topic_with_params_offset_is_fatal() {
        let mut log = plain_log(1, U256::from(1u64), "x");
        // a four-word head under the plain topic is a shape mismatch
        log.data[64..96].copy_from_slice(&word_from_u64(128));
        assert!(matches!(
            decode_vote_cast(&log),
            Err(DecodeError::UnknownLayout { reason_offset: 128 })
        ));
    }

    #[test]
    fn test_params_topic_with_plain_offset_is_fatal() {
        let mut log = plain_log(1, U256::from(1u64), "x");
        log.topics[0] = vote_cast_with_params_topic();
        assert!(matches!(
            decode_vote_cast(&log),
            Err(DecodeError::UnknownLayout { reason_offset: 96 })
        ));
    }

    #[test]
    fn test_wrong_topic_count_is_fatal() {
        let mut log = plain_log(1, U256::from(1u64), "x");
        log.topics.pop();
        assert!(matches!(
            decode_vote_cast(&log),
            Err(DecodeError::UnexpectedTopicCount { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_foreign_topic_is_fatal() {
        let mut log = plain_log(1, U256::from(1u64), "x");
        log.topics[0] = keccak256(b"Transfer(address,address,uint256)");
        assert!(matches!(
            decode_vote_cast(&log),
            Err(DecodeError::UnknownEventTopic(_))
        ));
    }

    #[test]
    fn test_checksum_round_trip() {
        let lower = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";
        let address = Address::from_str(lower).unwrap();
        let checksummed = address.to_checksum(None);
        assert_eq!(checksummed, "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359");
        assert_eq!(checksummed.to_lowercase(), lower);
        // idempotent: re-checksumming the checksummed form is stable
        let reparsed = Address::from_str(&checksummed).unwrap();
        assert_eq!(reparsed.to_checksum(None), checksummed);
    }
}
