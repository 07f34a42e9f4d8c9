use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tracing::{info, instrument};

use super::{read_rows, write_rows, DatasetError, DatasetRow};

/// Disjoint train/dev/test partitions of a dataset.
#[derive(Debug, Clone, Default)]
pub struct Splits {
    pub train: Vec<DatasetRow>,
    pub dev: Vec<DatasetRow>,
    pub test: Vec<DatasetRow>,
}

impl Splits {
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.train.len(), self.dev.len(), self.test.len())
    }
}

/// `round(total * numerator / denominator)` with ties to even.
fn rounded_share(total: usize, numerator: usize, denominator: usize) -> usize {
    let scaled = total * numerator;
    let quotient = scaled / denominator;
    let twice_remainder = 2 * (scaled % denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

/// Take a seeded random share of `rows`.
///
/// Returns `(taken, remaining)`; `remaining` keeps the input order.
fn take_share<T>(rows: Vec<T>, numerator: usize, denominator: usize, seed: u64) -> (Vec<T>, Vec<T>) {
    let count = rounded_share(rows.len(), numerator, denominator);
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let (chosen, _) = indices.partial_shuffle(&mut rng, count);

    let mut slots: Vec<Option<T>> = rows.into_iter().map(Some).collect();
    let taken = chosen.iter().filter_map(|&i| slots[i].take()).collect();
    let remaining = slots.into_iter().flatten().collect();
    (taken, remaining)
}

/// Split rows 80/10/10.
///
/// 80% goes to train; half of the holdout (rounded) goes to dev and the
/// rest to test. Both draws use a fresh generator seeded with `seed`.
pub fn partition(rows: Vec<DatasetRow>, seed: u64) -> Splits {
    let (train, holdout) = take_share(rows, 4, 5, seed);
    let (dev, test) = take_share(holdout, 1, 2, seed);
    Splits { train, dev, test }
}

/// Split the CSV at `input` into `train.csv`, `dev.csv` and `test.csv`
/// under `out_dir`.
#[instrument(skip(input, out_dir), fields(input = %input.display(), out_dir = %out_dir.display()))]
pub fn split_dataset(input: &Path, out_dir: &Path, seed: u64) -> Result<Splits, DatasetError> {
    let rows = read_rows(input)?;
    let splits = partition(rows, seed);

    write_rows(&out_dir.join("train.csv"), &splits.train)?;
    write_rows(&out_dir.join("dev.csv"), &splits.dev)?;
    write_rows(&out_dir.join("test.csv"), &splits.test)?;

    let (train, dev, test) = splits.counts();
    info!("Splits: {} {} {}", train, dev, test);
    Ok(splits)
}
