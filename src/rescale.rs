//! Mapping model-space targets back to the units of the input file.
//!
//! The analyzer takes a [`Rescaler`] instead of ranges and scaling flags, so
//! it stays independent of how a run was normalized. Build one per run with
//! [`build_rescaler`].

use crate::normalize::{NORMALIZED_MAX, NORMALIZED_MIN};
use crate::scaling::Transform;
use crate::{Error, Range, Ranges, Result, ScalingMode, Threshold};

/// Undoes normalization and output scaling of one row's targets.
///
/// `features` are the row's normalized features; mixed implementations use
/// them to pick the regime.
pub trait Rescaler {
    fn denormalize(&self, features: &[f64], targets: &mut [f64]);

    /// Call on denormalized targets.
    fn unscale(&self, features: &[f64], targets: &mut [f64]);

    /// `denormalize` followed by `unscale`.
    fn restore(&self, features: &[f64], targets: &mut [f64]) {
        self.denormalize(features, targets);
        self.unscale(features, targets);
    }
}

/// Leaves values untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRescaler;

impl Rescaler for IdentityRescaler {
    fn denormalize(&self, _features: &[f64], _targets: &mut [f64]) {}

    fn unscale(&self, _features: &[f64], _targets: &mut [f64]) {}
}

/// One output range set and a regime-independent transform.
#[derive(Debug, Clone)]
pub struct SimpleRescaler {
    outputs: Vec<Range>,
    transform: Transform,
    limit: bool,
}

impl SimpleRescaler {
    pub fn new(outputs: Vec<Range>, transform: Transform, limit: bool) -> Self {
        Self {
            outputs,
            transform,
            limit,
        }
    }
}

impl Rescaler for SimpleRescaler {
    fn denormalize(&self, _features: &[f64], targets: &mut [f64]) {
        crate::normalize::denormalize(
            targets,
            &self.outputs,
            NORMALIZED_MIN,
            NORMALIZED_MAX,
            self.limit,
        );
    }

    fn unscale(&self, _features: &[f64], targets: &mut [f64]) {
        self.transform.invert(targets);
    }
}

/// Per-regime output ranges and transforms, selected with the threshold in
/// normalized input space.
#[derive(Debug, Clone)]
pub struct MixedRescaler {
    low: Vec<Range>,
    high: Vec<Range>,
    threshold: Threshold,
    mode: ScalingMode,
    limit: bool,
}

impl MixedRescaler {
    /// `threshold` must already be normalized.
    pub fn new(
        low: Vec<Range>,
        high: Vec<Range>,
        threshold: Threshold,
        mode: ScalingMode,
        limit: bool,
    ) -> Self {
        Self {
            low,
            high,
            threshold,
            mode,
            limit,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }
}

impl Rescaler for MixedRescaler {
    fn denormalize(&self, features: &[f64], targets: &mut [f64]) {
        let outputs = if self.threshold.is_low(features) {
            &self.low
        } else {
            &self.high
        };
        crate::normalize::denormalize(targets, outputs, NORMALIZED_MIN, NORMALIZED_MAX, self.limit);
    }

    fn unscale(&self, features: &[f64], targets: &mut [f64]) {
        self.mode
            .transform(self.threshold.is_low(features))
            .invert(targets);
    }
}

/// Pick the rescaler matching `ranges` and `mode`.
///
/// Mixed ranges need a mixed scaling mode. A mixed mode over simple ranges
/// shares the output ranges between regimes.
pub fn build_rescaler(ranges: &Ranges, mode: ScalingMode, limit: bool) -> Result<Box<dyn Rescaler>> {
    let normalized = mode
        .threshold()
        .map(|t| t.normalized(ranges.inputs(), NORMALIZED_MIN, NORMALIZED_MAX));

    match (ranges, normalized) {
        (Ranges::Simple(set), None) => Ok(Box::new(SimpleRescaler::new(
            set.outputs.clone(),
            mode.transform(false),
            limit,
        ))),
        (Ranges::Simple(set), Some(threshold)) => Ok(Box::new(MixedRescaler::new(
            set.outputs.clone(),
            set.outputs.clone(),
            threshold,
            mode,
            limit,
        ))),
        (Ranges::Mixed(mixed), Some(threshold)) => Ok(Box::new(MixedRescaler::new(
            mixed.low.outputs.clone(),
            mixed.high.outputs.clone(),
            threshold,
            mode,
            limit,
        ))),
        (Ranges::Mixed(_), None) => Err(Error::InvalidConfig(format!(
            "mixed ranges need a mixed scaling mode, got {mode:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::compute_mixed_range;
    use crate::{Dataset, MixedRangeSet};
    use approx::assert_relative_eq;

    fn mixed_data() -> Dataset {
        Dataset::from_rows(
            &[vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            &[vec![1e-4], vec![1e-2], vec![2.0], vec![5.0]],
        )
        .unwrap()
    }

    #[test]
    fn mixed_rescaler_restores_raw_targets() {
        let raw = mixed_data();
        let threshold = Threshold::new(0, 1.0);
        let mode = ScalingMode::MixedLogSqrt { threshold };

        let mut data = raw.clone();
        mode.scale_dataset(&mut data).unwrap();
        let mixed: MixedRangeSet = compute_mixed_range(&data, threshold).unwrap();
        let ranges = Ranges::Mixed(mixed);
        ranges
            .normalize_dataset(&mut data, Some(threshold), NORMALIZED_MIN, NORMALIZED_MAX)
            .unwrap();

        let rescaler = build_rescaler(&ranges, mode, false).unwrap();
        for i in 0..data.len() {
            let mut y = data.targets(i).to_vec();
            rescaler.restore(data.features(i), &mut y);
            assert_relative_eq!(y[0], raw.targets(i)[0], max_relative = 1e-9);
        }
    }

    #[test]
    fn simple_rescaler_clamps_when_limited() {
        let rescaler = SimpleRescaler::new(vec![Range::new(0.0, 10.0)], Transform::Identity, true);
        let mut y = [1.2];
        rescaler.denormalize(&[0.0], &mut y);
        assert_relative_eq!(y[0], 10.0);
    }

    #[test]
    fn mixed_ranges_without_mixed_mode_are_rejected() {
        let mixed = compute_mixed_range(&mixed_data(), Threshold::new(0, 1.0)).unwrap();
        assert!(build_rescaler(&Ranges::Mixed(mixed), ScalingMode::Log, false).is_err());
    }
}
