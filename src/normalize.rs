//! Min/max ranges and the affine normalization built on them.
//!
//! Every column is mapped with `(x - min) / (max - min) * (b - a) + a` onto a
//! target interval `[a, b]`, by default `[NORMALIZED_MIN, NORMALIZED_MAX]`.
//! Mixed ranges keep one output range set per regime, picked per row by
//! `features[column] <= threshold`; the input ranges are shared.

use serde::{Deserialize, Serialize};

use crate::error::Side;
use crate::{Dataset, Error, Result};

/// Lower bound of the normalized interval.
pub const NORMALIZED_MIN: f64 = 0.0;
/// Upper bound of the normalized interval.
pub const NORMALIZED_MAX: f64 = 1.0;

/// Observed `(min, max)` of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    /// Map `value` from this range onto `[new_min, new_max]`.
    #[inline]
    pub fn normalize(&self, value: f64, new_min: f64, new_max: f64) -> f64 {
        (value - self.min) / (self.max - self.min) * (new_max - new_min) + new_min
    }

    /// Inverse of `normalize`. With `limit`, `value` is first clamped to
    /// `[old_min, old_max]`.
    #[inline]
    pub fn denormalize(&self, value: f64, old_min: f64, old_max: f64, limit: bool) -> f64 {
        let value = if limit {
            value.min(old_max).max(old_min)
        } else {
            value
        };
        (value - old_min) / (old_max - old_min) * (self.max - self.min) + self.min
    }

    fn widen(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

/// A column threshold: rows with `features[column] <= value` are "low".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub column: usize,
    pub value: f64,
}

impl Threshold {
    pub fn new(column: usize, value: f64) -> Self {
        Self { column, value }
    }

    /// The `<=` tie-break is shared by range computation, splitting, scaling
    /// and denormalization; boundary rows always belong to the low regime.
    #[inline]
    pub fn is_low(&self, features: &[f64]) -> bool {
        features[self.column] <= self.value
    }

    /// The same threshold expressed in normalized input space.
    pub fn normalized(&self, inputs: &[Range], new_min: f64, new_max: f64) -> Self {
        Self {
            column: self.column,
            value: inputs[self.column].normalize(self.value, new_min, new_max),
        }
    }
}

/// Input and output ranges of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSet {
    pub inputs: Vec<Range>,
    pub outputs: Vec<Range>,
}

impl RangeSet {
    /// True iff no column has `min == max`.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like `is_valid`, naming the first degenerate column.
    pub fn validate(&self) -> Result<()> {
        check_columns(Side::Input, &self.inputs)?;
        check_columns(Side::Output, &self.outputs)
    }

    pub fn normalize_row(&self, features: &mut [f64], targets: &mut [f64], new_min: f64, new_max: f64) {
        normalize(features, &self.inputs, new_min, new_max);
        normalize(targets, &self.outputs, new_min, new_max);
    }
}

/// Two range sets selected per row by a threshold. `low.inputs == high.inputs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedRangeSet {
    pub low: RangeSet,
    pub high: RangeSet,
}

impl MixedRangeSet {
    /// Range set of the regime the row belongs to.
    #[inline]
    pub fn select(&self, low: bool) -> &RangeSet {
        if low { &self.low } else { &self.high }
    }

    /// Checks all four range lists.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Also rejects regimes whose input ranges differ: rows are normalized
    /// per regime but restored by a threshold on the shared inputs.
    pub fn validate(&self) -> Result<()> {
        if self.low.inputs != self.high.inputs {
            return Err(Error::InvalidData(
                "mixed ranges must share one set of input ranges".to_owned(),
            ));
        }
        self.low.validate()?;
        self.high.validate()
    }
}

/// The ranges a run normalizes with: one set, or one set per regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ranges {
    Simple(RangeSet),
    Mixed(MixedRangeSet),
}

impl Ranges {
    /// Input ranges; shared by both regimes when mixed.
    pub fn inputs(&self) -> &[Range] {
        match self {
            Ranges::Simple(set) => &set.inputs,
            Ranges::Mixed(mixed) => &mixed.low.inputs,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Ranges::Simple(set) => set.validate(),
            Ranges::Mixed(mixed) => mixed.validate(),
        }
    }

    /// Normalize `data` in place. `threshold` is in raw feature space and is
    /// required for mixed ranges.
    pub fn normalize_dataset(
        &self,
        data: &mut Dataset,
        threshold: Option<Threshold>,
        new_min: f64,
        new_max: f64,
    ) -> Result<()> {
        let outputs = match self {
            Ranges::Simple(set) => set.outputs.len(),
            Ranges::Mixed(mixed) => mixed.low.outputs.len(),
        };
        if data.input_dim() != self.inputs().len() || data.target_dim() != outputs {
            return Err(Error::InvalidShape(format!(
                "ranges cover ({}, {outputs}) columns, dataset has ({}, {})",
                self.inputs().len(),
                data.input_dim(),
                data.target_dim()
            )));
        }
        match (self, threshold) {
            (Ranges::Simple(set), _) => normalize_dataset(data, set, new_min, new_max),
            (Ranges::Mixed(mixed), Some(t)) => {
                data.check_feature_column(t.column)?;
                normalize_dataset_mixed(data, mixed, t, new_min, new_max);
            }
            (Ranges::Mixed(_), None) => {
                return Err(Error::InvalidConfig(
                    "mixed ranges need a threshold".to_owned(),
                ));
            }
        }
        Ok(())
    }
}

fn check_columns(side: Side, ranges: &[Range]) -> Result<()> {
    match ranges.iter().position(Range::is_degenerate) {
        Some(column) => Err(Error::DegenerateRange {
            side,
            column,
            value: ranges[column].min,
        }),
        None => Ok(()),
    }
}

/// Single pass over `data` tracking per-column min and max.
///
/// The result may contain degenerate columns; check it with
/// [`RangeSet::validate`] before normalizing.
pub fn compute_range(data: &Dataset) -> Result<RangeSet> {
    if data.is_empty() {
        return Err(Error::InvalidData(
            "cannot compute ranges of an empty dataset".to_owned(),
        ));
    }

    let (x0, y0) = data.row(0);
    let mut inputs: Vec<Range> = x0.iter().map(|&v| Range::new(v, v)).collect();
    let mut outputs: Vec<Range> = y0.iter().map(|&v| Range::new(v, v)).collect();

    for (x, y) in data.iter().skip(1) {
        for (r, &v) in inputs.iter_mut().zip(x) {
            r.widen(v);
        }
        for (r, &v) in outputs.iter_mut().zip(y) {
            r.widen(v);
        }
    }

    Ok(RangeSet { inputs, outputs })
}

/// Per-regime ranges. Both regimes get the input ranges of the whole dataset
/// so inputs are normalized the same way on either side of the threshold.
pub fn compute_mixed_range(data: &Dataset, threshold: Threshold) -> Result<MixedRangeSet> {
    data.check_feature_column(threshold.column)?;

    let global = compute_range(data)?;
    let (low_rows, high_rows) = crate::split::split_by_threshold(data, threshold);
    if low_rows.is_empty() || high_rows.is_empty() {
        return Err(Error::InvalidData(format!(
            "mixed scaling threshold {} on column {} leaves one regime empty ({} low, {} high rows)",
            threshold.value,
            threshold.column,
            low_rows.len(),
            high_rows.len()
        )));
    }

    let mut low = compute_range(&low_rows)?;
    let mut high = compute_range(&high_rows)?;
    low.inputs.clone_from(&global.inputs);
    high.inputs = global.inputs;

    Ok(MixedRangeSet { low, high })
}

/// Normalize `values` column by column. Panics on length mismatch.
pub fn normalize(values: &mut [f64], ranges: &[Range], new_min: f64, new_max: f64) {
    assert_eq!(
        values.len(),
        ranges.len(),
        "vector len {} does not match {} ranges",
        values.len(),
        ranges.len()
    );
    for (v, r) in values.iter_mut().zip(ranges) {
        *v = r.normalize(*v, new_min, new_max);
    }
}

/// Inverse of [`normalize`]. With `limit`, each value is clamped to
/// `[old_min, old_max]` before inversion.
pub fn denormalize(values: &mut [f64], ranges: &[Range], old_min: f64, old_max: f64, limit: bool) {
    assert_eq!(
        values.len(),
        ranges.len(),
        "vector len {} does not match {} ranges",
        values.len(),
        ranges.len()
    );
    for (v, r) in values.iter_mut().zip(ranges) {
        *v = r.denormalize(*v, old_min, old_max, limit);
    }
}

/// Normalize every row of `data` in place.
pub fn normalize_dataset(data: &mut Dataset, ranges: &RangeSet, new_min: f64, new_max: f64) {
    for (x, y) in data.rows_mut() {
        ranges.normalize_row(x, y, new_min, new_max);
    }
}

/// Normalize every row with the regime chosen from its raw feature values.
pub fn normalize_dataset_mixed(
    data: &mut Dataset,
    ranges: &MixedRangeSet,
    threshold: Threshold,
    new_min: f64,
    new_max: f64,
) {
    for (x, y) in data.rows_mut() {
        let set = ranges.select(threshold.is_low(x));
        set.normalize_row(x, y, new_min, new_max);
    }
}
