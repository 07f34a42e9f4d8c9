pub mod sample;
pub mod split;

pub use sample::{sample_dataset, shortfall_notice, SampleOutcome};
pub use split::{split_dataset, Splits};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::store::{PrRecord, StoreError};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No PRs found after filtering; check your database and filters.")]
    NoEligibleRows,

    #[error("Failed to read PR store: {0}")]
    Store(#[from] StoreError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write dataset file: {0}")]
    Io(#[from] std::io::Error),
}

/// One labeled example: a diff and the human-written summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub repo: String,
    pub number: u64,
    pub diff: String,
    pub summary: String,
}

impl DatasetRow {
    pub const HEADER: [&'static str; 4] = ["repo", "number", "diff", "summary"];
}

impl From<PrRecord> for DatasetRow {
    fn from(record: PrRecord) -> Self {
        Self {
            repo: record.repo,
            number: record.number,
            diff: record.diff,
            summary: record.body,
        }
    }
}

/// Write rows as CSV with a header, creating parent directories.
/// An empty slice still produces a header-only file.
pub fn write_rows(path: &Path, rows: &[DatasetRow]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    if rows.is_empty() {
        writer.write_record(DatasetRow::HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "wrote dataset file");
    Ok(())
}

pub fn read_rows(path: &Path) -> Result<Vec<DatasetRow>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<DatasetRow>()
        .collect::<Result<Vec<_>, _>>()?;
    debug!(path = %path.display(), rows = rows.len(), "read dataset file");
    Ok(rows)
}
