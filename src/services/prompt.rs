//! Claim message generation.
//!
//! Builds one chat message per claimable voter, keyed by address. The
//! message embeds the quarter label, a short human-readable token amount
//! and the claim deep link carrying everything the claim app needs to
//! verify the merkle proof.

use std::collections::BTreeMap;

use alloy::primitives::U256;

use crate::models::allocation::{AllocationEntry, ClassifiedVoter, MerkleDocument};
use crate::services::allocation::index_by_address;

const WEI_DECIMALS: usize = 18;

#[derive(Debug)]
pub enum PromptError {
    /// Claimable voters without a merkle entry: the claim link cannot be
    /// built without the leaf index and proof.
    MissingEntries(Vec<String>),
}

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptError::MissingEntries(addresses) => {
                writeln!(f, "Missing merkle entries for addresses:")?;
                for address in addresses {
                    writeln!(f, "- {}", address)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PromptError {}

/// Render a wei amount as a terse human-readable token quantity:
/// 18-decimal fixed point, then k/m suffixes past a thousand / a million.
pub fn format_token_amount(wei: U256) -> String {
    if wei.is_zero() {
        return "0.0".to_string();
    }
    let digits = wei.to_string();
    let padded = format!("{:0>width$}", digits, width = WEI_DECIMALS + 1);
    let split = padded.len() - WEI_DECIMALS;
    let whole = padded[..split].trim_start_matches('0');
    let whole = if whole.is_empty() { "0" } else { whole };
    let frac = padded[split..].trim_end_matches('0');

    let numeric = if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    };
    // precision past one decimal place does not matter for a chat message
    let value: f64 = numeric.parse().unwrap_or(0.0);
    if value >= 1_000_000.0 {
        format!("{:.1}m", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}k", value / 1_000.0)
    } else {
        format!("{:.1}", value)
    }
}

/// Build the claim message for one allocation entry.
pub fn build_claim_message(quarter: &str, dindex: u64, entry: &AllocationEntry) -> String {
    let amount_readable = format_token_amount(entry.amount);
    let merkleproof = entry
        .proof
        .iter()
        .map(|hash| hash.trim())
        .filter(|hash| !hash.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "Thank you for participating in {quarter} HYPR DAO governance. As a show of our DAOs \
         appreciation, you have earned {amount_readable} HYPR from the quarterly voting \
         incentives. To claim your incentives, please follow the link below, which will open \
         the HYPR DAO app and provide a Claim button once you have connected the wallet you \
         used to vote.\n\n\
         WARNING: Please confirm this message is coming from dao.hypr and that the app that \
         is opened is the HYPR DAO app before clicking the Claim button! If you have \
         questions about the security of your claim, please message dao.hypr.\n\n\
         hw://hypr-dao:hypr-dao:ware.hypr/claim?dindex={dindex}&index={index}&kind=4\
         &receiver={receiver}&amount={amount}&isclaimable=true&merkleproof={merkleproof}",
        quarter = quarter,
        amount_readable = amount_readable,
        dindex = dindex,
        index = entry.index,
        receiver = entry.address,
        amount = entry.amount,
        merkleproof = merkleproof,
    )
}

/// Build the address → message map for claimable voters only. Non-claimable
/// and unmatched voters are excluded entirely.
pub fn build_prompts(
    classified: &[ClassifiedVoter],
    document: &MerkleDocument,
    quarter: &str,
    dindex: u64,
) -> Result<BTreeMap<String, String>, PromptError> {
    let by_address = index_by_address(document);
    let mut messages = BTreeMap::new();
    let mut missing = Vec::new();

    for voter in classified.iter().filter(|v| v.is_claimable) {
        match by_address.get(&voter.address.to_lowercase()) {
            Some(entry) => {
                messages.insert(
                    voter.address.clone(),
                    build_claim_message(quarter, dindex, entry),
                );
            }
            None => missing.push(voter.address.clone()),
        }
    }

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(PromptError::MissingEntries(missing));
    }
    Ok(messages)
}
