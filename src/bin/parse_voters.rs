//! Reconcile a get-voters CSV against a merkle allocation document and
//! classify every voter as Matched, PartialMatch or Unmatched.

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use governor_voters::models::allocation::MatchKind;
use governor_voters::services::allocation::{self, FullUnlock};
use governor_voters::services::csv_io::{self, OutputTarget};

#[derive(Parser, Debug)]
#[command(
    name = "parse-voters",
    about = "Classify voters against a merkle allocation document"
)]
struct Args {
    /// Path to get-voters CSV file
    voters_csv: PathBuf,

    /// Path to merkle allocation JSON
    merkle_json: PathBuf,

    /// Quarter label the incentives are evaluated at
    #[arg(long)]
    quarter: String,

    /// Distributor index for claim eligibility
    #[arg(long)]
    dindex: u64,

    /// Output file (default: stdout)
    #[arg(short, long, default_value = "-")]
    output: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,governor_voters=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let voters = csv_io::read_voters_file(&args.voters_csv)?;
    tracing::info!(count = voters.len(), "Loaded voter records");

    let document = allocation::load_merkle_document(&args.merkle_json)?;
    tracing::info!(entries = document.entries.len(), "Loaded merkle allocation document");

    let classified = allocation::classify(&voters, &document, &args.quarter, args.dindex, &FullUnlock);

    let matched = classified.iter().filter(|v| v.kind == MatchKind::Matched).count();
    let unmatched = classified.iter().filter(|v| v.kind == MatchKind::Unmatched).count();
    let claimable = classified.iter().filter(|v| v.is_claimable).count();
    tracing::info!(matched, unmatched, claimable, "Classification complete");

    let rendered = csv_io::classified_to_csv(&classified)?;
    let target = OutputTarget::from_arg(&args.output);
    target.write(&rendered)?;
    if let OutputTarget::File(path) = &target {
        tracing::info!(path = %path.display(), "Written classified CSV");
    }

    Ok(())
}
