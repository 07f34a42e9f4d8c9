use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tracing::{info, instrument};

use super::{write_rows, DatasetError, DatasetRow};
use crate::config::DatasetConfig;
use crate::store::{PrRecord, RecordStore};

/// Result of a sampler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Rows that passed the filters
    pub available: usize,
    /// Rows written to the output file
    pub written: usize,
}

/// Notice shown when fewer rows qualify than were asked for.
pub fn shortfall_notice(available: usize, requested: usize) -> Option<String> {
    (available < requested).then(|| format!("Only {} PRs available; sampling all of them.", available))
}

/// Filter records and draw a reproducible sample.
///
/// Keeps records with a non-blank body and a diff strictly shorter than
/// `max_diff_chars`, then picks `min(sample_size, available)` of them with a
/// generator seeded from `seed`. The input order must be deterministic for
/// the sample to be; `RecordStore::read_all` orders by key.
pub fn select_rows(
    records: Vec<PrRecord>,
    options: &DatasetConfig,
) -> Result<(Vec<DatasetRow>, usize), DatasetError> {
    let mut eligible: Vec<PrRecord> = records
        .into_iter()
        .filter(|r| r.has_summary() && r.diff_chars() < options.max_diff_chars)
        .collect();

    let total = eligible.len();
    if total == 0 {
        return Err(DatasetError::NoEligibleRows);
    }

    let sample_size = options.sample_size.min(total);
    if let Some(notice) = shortfall_notice(total, options.sample_size) {
        info!("{}", notice);
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let (chosen, _) = eligible.partial_shuffle(&mut rng, sample_size);
    let rows = chosen.iter().cloned().map(DatasetRow::from).collect();
    Ok((rows, total))
}

/// Sample the record store into a CSV at `out`.
///
/// Nothing is written when no record passes the filters.
#[instrument(skip_all, fields(out = %out.display()))]
pub fn sample_dataset(
    store: &RecordStore,
    options: &DatasetConfig,
    out: &Path,
) -> Result<SampleOutcome, DatasetError> {
    let records = store.read_all()?;
    let (rows, available) = select_rows(records, options)?;
    write_rows(out, &rows)?;
    info!("Written {} PRs to {}", rows.len(), out.display());

    Ok(SampleOutcome {
        available,
        written: rows.len(),
    })
}
