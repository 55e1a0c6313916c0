//! Fetch all vote-cast events for a DAO proposal and output voters as CSV.
//!
//! Uses the standard governor event interface; both the plain and the
//! extension-parameter vote-cast shapes are collected.

use clap::Parser;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use alloy::primitives::{Address, U256};

use governor_voters::models::vote::FetchConfig;
use governor_voters::services::csv_io::{self, OutputTarget};
use governor_voters::services::rpc::GovernorClient;
use governor_voters::services::scanner::LogScanner;
use governor_voters::services::{aggregator, decoder};

/// Default DAO governor address on Base.
const DEFAULT_DAO_ADDRESS: &str = "0x000000000048395579c3C60f2F8Cb2DECa457550";

#[derive(Parser, Debug)]
#[command(
    name = "get-voters",
    about = "Fetch votes with reasons for a DAO proposal and output as CSV"
)]
struct Args {
    /// DAO Governor address
    #[arg(long, default_value = DEFAULT_DAO_ADDRESS)]
    dao: String,

    /// RPC URL (http/https) or WebSocket URL (ws/wss)
    #[arg(long)]
    rpc: String,

    /// Proposal ID to fetch votes for
    #[arg(long = "proposal-id")]
    proposal_id: String,

    /// Override the scan start block (default: the proposal snapshot block)
    #[arg(long = "from-block")]
    from_block: Option<u64>,

    /// Output file (default: stdout)
    #[arg(short, long, default_value = "-")]
    output: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,governor_voters=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let governor = Address::from_str(&args.dao)
        .map_err(|e| format!("invalid DAO address {}: {}", args.dao, e))?;
    let proposal_id = U256::from_str(&args.proposal_id)
        .map_err(|e| format!("invalid proposal id {}: {}", args.proposal_id, e))?;
    let config = FetchConfig {
        rpc_url: args.rpc,
        governor,
        proposal_id,
        start_block: args.from_block,
    };

    let client = GovernorClient::connect(&config.rpc_url, config.governor, config.proposal_id)
        .await?;

    tracing::info!(proposal_id = %config.proposal_id, "Fetching proposal info");
    let window = client.voting_window().await?;
    tracing::info!(
        start_block = window.start_block,
        end_block = window.end_block,
        "Voting block range resolved"
    );
    if window.deadline_in_future {
        tracing::warn!(
            end_block = window.end_block,
            "Current block is before the proposal deadline; results may be incomplete until the proposal closes"
        );
    }

    let start_block = config.start_block.unwrap_or(window.start_block);
    tracing::info!("Fetching votes with reasons...");
    let scanner = LogScanner::new(&client);
    let logs = scanner.scan(start_block, window.end_block).await?;

    let mut events = Vec::with_capacity(logs.len());
    for log in &logs {
        events.push(decoder::decode_vote_cast(log)?);
    }

    let records = aggregator::aggregate(events);
    tracing::info!(count = records.len(), "Aggregated voter records");

    let zero_weight = records.iter().filter(|r| r.weight.is_zero()).count();
    if zero_weight > 0 {
        tracing::warn!(count = zero_weight, "Votes with zero weight");
    }
    let mut reason_counts: HashMap<&str, usize> = HashMap::new();
    for record in &records {
        if !record.reason.is_empty() {
            *reason_counts.entry(record.reason.as_str()).or_default() += 1;
        }
    }
    let duplicate_reasons = reason_counts.values().filter(|count| **count > 1).count();
    if duplicate_reasons > 0 {
        tracing::warn!(count = duplicate_reasons, "Duplicate vote reasons detected");
    }

    let rendered = csv_io::voters_to_csv(&records)?;
    let target = OutputTarget::from_arg(&args.output);
    target.write(&rendered)?;
    if let OutputTarget::File(path) = &target {
        tracing::info!(path = %path.display(), "Written voter CSV");
    }

    Ok(())
}
