//! CSV boundaries between the pipeline's commands.
//!
//! Weights and amounts cross these boundaries as full-precision decimal
//! strings; they are never narrowed to machine integers. Output is rendered
//! fully in memory and only written once the whole command has succeeded,
//! so a fatal error never leaves a partial file behind.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::models::allocation::{ClassifiedVoter, MatchKind};
use crate::models::vote::VoterRecord;

#[derive(Debug)]
pub enum CsvError {
    Io(String),
    Format(String),
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsvError::Io(msg) => write!(f, "CSV I/O error: {}", msg),
            CsvError::Format(msg) => write!(f, "CSV format error: {}", msg),
        }
    }
}

impl std::error::Error for CsvError {}

/// Voter CSV row: `address,reason,weight`.
#[derive(Debug, Serialize, Deserialize)]
struct VoterRow {
    address: String,
    reason: String,
    weight: String,
}

/// Classified CSV row: `kind,address,amount,isClaimable`.
#[derive(Debug, Serialize, Deserialize)]
struct ClassifiedRow {
    kind: MatchKind,
    address: String,
    amount: String,
    #[serde(rename = "isClaimable")]
    is_claimable: bool,
}

/// Destination for a command's output: `-` is stdout, anything else a file.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(arg))
        }
    }

    /// Write fully rendered output in one shot.
    pub fn write(&self, content: &[u8]) -> Result<(), CsvError> {
        match self {
            OutputTarget::Stdout => io::stdout()
                .write_all(content)
                .map_err(|e| CsvError::Io(format!("stdout: {}", e))),
            OutputTarget::File(path) => fs::write(path, content)
                .map_err(|e| CsvError::Io(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Render voter records as `address,reason,weight` CSV.
pub fn voters_to_csv(records: &[VoterRecord]) -> Result<Vec<u8>, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(VoterRow {
                address: record.address.clone(),
                reason: record.reason.clone(),
                weight: record.weight.to_string(),
            })
            .map_err(|e| CsvError::Format(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| CsvError::Io(e.to_string()))
}

/// Parse a voter CSV produced by `get-voters`.
pub fn voters_from_csv<R: Read>(reader: R) -> Result<Vec<VoterRecord>, CsvError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize::<VoterRow>() {
        let row = row.map_err(|e| CsvError::Format(e.to_string()))?;
        let weight = row.weight.trim().parse::<U256>().map_err(|e| {
            CsvError::Format(format!("invalid weight for {}: {}", row.address, e))
        })?;
        records.push(VoterRecord {
            address: row.address,
            reason: row.reason,
            weight,
        });
    }
    Ok(records)
}

pub fn read_voters_file(path: &Path) -> Result<Vec<VoterRecord>, CsvError> {
    let file = fs::File::open(path)
        .map_err(|e| CsvError::Io(format!("{}: {}", path.display(), e)))?;
    voters_from_csv(file)
}

/// Render classified voters as `kind,address,amount,isClaimable` CSV.
pub fn classified_to_csv(rows: &[ClassifiedVoter]) -> Result<Vec<u8>, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(ClassifiedRow {
                kind: row.kind,
                address: row.address.clone(),
                amount: row.amount.to_string(),
                is_claimable: row.is_claimable,
            })
            .map_err(|e| CsvError::Format(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| CsvError::Io(e.to_string()))
}

/// Parse a classified CSV produced by `parse-voters`.
pub fn classified_from_csv<R: Read>(reader: R) -> Result<Vec<ClassifiedVoter>, CsvError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in csv_reader.deserialize::<ClassifiedRow>() {
        let row = row.map_err(|e| CsvError::Format(e.to_string()))?;
        let amount = row.amount.trim().parse::<U256>().map_err(|e| {
            CsvError::Format(format!("invalid amount for {}: {}", row.address, e))
        })?;
        rows.push(ClassifiedVoter {
            kind: row.kind,
            address: row.address,
            amount,
            is_claimable: row.is_claimable,
        });
    }
    Ok(rows)
}

pub fn read_classified_file(path: &Path) -> Result<Vec<ClassifiedVoter>, CsvError> {
    let file = fs::File::open(path)
        .map_err(|e| CsvError::Io(format!("{}: {}", path.display(), e)))?;
    classified_from_csv(file)
}
