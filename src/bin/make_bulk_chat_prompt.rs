//! Generate bulk chat prompt messages from a classified voter CSV and the
//! merkle allocation document. Output is a JSON object mapping voter
//! address to message, claimable voters only.

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use governor_voters::services::csv_io::{self, OutputTarget};
use governor_voters::services::{allocation, prompt};

#[derive(Parser, Debug)]
#[command(
    name = "make-bulk-chat-prompt",
    about = "Create an address -> message JSON for bulk chat prompts"
)]
struct Args {
    /// Path to parse-voters CSV file
    voters_csv: PathBuf,

    /// Path to merkle allocation JSON
    merkle_json: PathBuf,

    /// Quarter label used in the message
    #[arg(long)]
    quarter: String,

    /// Distributor index for claim links
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

    let classified = csv_io::read_classified_file(&args.voters_csv)?;
    tracing::info!(count = classified.len(), "Loaded classified voters");

    let document = allocation::load_merkle_document(&args.merkle_json)?;
    tracing::info!(entries = document.entries.len(), "Loaded merkle allocation document");

    let messages = prompt::build_prompts(&classified, &document, &args.quarter, args.dindex)?;
    tracing::info!(count = messages.len(), "Built claim messages");

    let mut rendered = serde_json::to_vec(&messages)?;
    rendered.push(b'\n');
    let target = OutputTarget::from_arg(&args.output);
    target.write(&rendered)?;
    if let OutputTarget::File(path) = &target {
        tracing::info!(path = %path.display(), "Written prompt JSON");
    }

    Ok(())
}
