//! Row partitioning: random train/validation split, threshold split, and
//! grouping into batches.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;

use crate::{Dataset, Error, Result, Threshold};

/// Bernoulli split: each row goes to training with probability
/// `training_percent / 100`, otherwise to validation.
///
/// `training_percent == 0` puts every row into validation and `100` every row
/// into training. Seed `rng` for a reproducible split.
pub fn split_random<R: Rng + ?Sized>(
    data: &Dataset,
    training_percent: f64,
    rng: &mut R,
) -> Result<(Dataset, Dataset)> {
    if !(0.0..=100.0).contains(&training_percent) {
        return Err(Error::InvalidConfig(format!(
            "training percentage must be in [0, 100], got {training_percent}"
        )));
    }

    let mut train = data.empty_like();
    let mut validation = data.empty_like();
    for (x, y) in data.iter() {
        let side = if rng.gen_range(0.0..100.0) < training_percent {
            &mut train
        } else {
            &mut validation
        };
        side.push(x, y)?;
    }
    Ok((train, validation))
}

/// Deterministic partition into `(features[column] <= value, rest)`.
///
/// Panics if the threshold column is out of bounds; check it with
/// [`Dataset::check_feature_column`] first.
pub fn split_by_threshold(data: &Dataset, threshold: Threshold) -> (Dataset, Dataset) {
    let (low, high): (Vec<usize>, Vec<usize>) =
        (0..data.len()).partition(|&i| threshold.is_low(data.features(i)));
    (data.select(&low), data.select(&high))
}

/// Identity of a batch: the exact bit patterns of every feature value except
/// the excluded column, in column order.
///
/// `-0.0` and `+0.0` map to the same key. Keys order numerically, column by
/// column, using [`f64::total_cmp`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    excluded: usize,
    bits: Vec<u64>,
}

impl BatchKey {
    pub fn new(features: &[f64], excluded: usize) -> Self {
        let bits = features
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != excluded)
            .map(|(_, &v)| if v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() })
            .collect();
        Self { excluded, bits }
    }

    /// The feature values the key was built from.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.bits.iter().map(|&b| f64::from_bits(b))
    }
}

impl Ord for BatchKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.excluded.cmp(&other.excluded).then_with(|| {
            self.values()
                .zip(other.values())
                .map(|(a, b)| a.total_cmp(&b))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| self.bits.len().cmp(&other.bits.len()))
        })
    }
}

impl PartialOrd for BatchKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BatchKey {
    /// `0->1.5 2->3` style, with original column indices.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = (0..).filter(|&i| i != self.excluded);
        for (n, (col, v)) in columns.zip(self.values()).enumerate() {
            if n > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{col}->{v}")?;
        }
        Ok(())
    }
}

/// Batches ordered by key, so iteration order does not depend on row order.
pub type BatchMap = BTreeMap<BatchKey, Dataset>;

/// Group rows that agree on every feature except `excluded_column`.
pub fn group_into_batches(data: &Dataset, excluded_column: usize) -> Result<BatchMap> {
    data.check_feature_column(excluded_column)?;

    let mut batches = BatchMap::new();
    for (x, y) in data.iter() {
        batches
            .entry(BatchKey::new(x, excluded_column))
            .or_insert_with(|| data.empty_like())
            .push(x, y)?;
    }
    log::debug!(
        "grouped {} rows into {} batches (excluded column {excluded_column})",
        data.len(),
        batches.len()
    );
    Ok(batches)
}
