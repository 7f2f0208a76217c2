//! Monotone rescaling of target values.
//!
//! Targets spanning many decades are easier to fit after `ln` or `sqrt`.
//! Mixed modes pick the transform per row from a threshold on one feature
//! column: log at or below it, linear or sqrt above it. Features are never
//! rescaled.

use serde::{Deserialize, Serialize};

use crate::{Dataset, Result, Threshold};

/// Values below this floor are clamped before `ln`/`sqrt`.
pub const MINIMUM_ALLOWED_VALUE: f64 = 1e-30;

/// One elementwise transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    Log,
    Sqrt,
}

impl Transform {
    pub fn apply(self, values: &mut [f64]) {
        match self {
            Transform::Identity => {}
            Transform::Log => scale_log(values),
            Transform::Sqrt => scale_sqrt(values),
        }
    }

    pub fn invert(self, values: &mut [f64]) {
        match self {
            Transform::Identity => {}
            Transform::Log => unscale_log(values),
            Transform::Sqrt => unscale_sqrt(values),
        }
    }
}

/// Output rescaling mode. The variants are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingMode {
    #[default]
    None,
    Log,
    Sqrt,
    /// `ln` at or below the threshold, identity above.
    MixedLogLinear { threshold: Threshold },
    /// `ln` at or below the threshold, `sqrt` above.
    MixedLogSqrt { threshold: Threshold },
}

impl ScalingMode {
    /// Threshold of a mixed mode.
    pub fn threshold(&self) -> Option<Threshold> {
        match *self {
            ScalingMode::MixedLogLinear { threshold } | ScalingMode::MixedLogSqrt { threshold } => {
                Some(threshold)
            }
            ScalingMode::None | ScalingMode::Log | ScalingMode::Sqrt => None,
        }
    }

    #[inline]
    pub fn is_mixed(&self) -> bool {
        self.threshold().is_some()
    }

    /// Transform for a row in the given regime. Non-mixed modes ignore `low`.
    pub fn transform(&self, low: bool) -> Transform {
        match self {
            ScalingMode::None => Transform::Identity,
            ScalingMode::Log => Transform::Log,
            ScalingMode::Sqrt => Transform::Sqrt,
            ScalingMode::MixedLogLinear { .. } if low => Transform::Log,
            ScalingMode::MixedLogLinear { .. } => Transform::Identity,
            ScalingMode::MixedLogSqrt { .. } if low => Transform::Log,
            ScalingMode::MixedLogSqrt { .. } => Transform::Sqrt,
        }
    }

    /// Scale the targets of one raw row.
    pub fn scale_row(&self, features: &[f64], targets: &mut [f64]) {
        let low = self.threshold().is_some_and(|t| t.is_low(features));
        self.transform(low).apply(targets);
    }

    /// Scale every target in `data`. Rows are classified on raw features.
    pub fn scale_dataset(&self, data: &mut Dataset) -> Result<()> {
        if let Some(t) = self.threshold() {
            data.check_feature_column(t.column)?;
        }
        if *self == ScalingMode::None {
            return Ok(());
        }
        for (x, y) in data.rows_mut() {
            self.scale_row(x, y);
        }
        Ok(())
    }
}

/// `ln`, with values below [`MINIMUM_ALLOWED_VALUE`] clamped first.
pub fn scale_log(values: &mut [f64]) {
    for v in values {
        *v = v.max(MINIMUM_ALLOWED_VALUE).ln();
    }
}

pub fn unscale_log(values: &mut [f64]) {
    for v in values {
        *v = v.exp();
    }
}

/// `sqrt`, with values below [`MINIMUM_ALLOWED_VALUE`] clamped first.
pub fn scale_sqrt(values: &mut [f64]) {
    for v in values {
        *v = v.max(MINIMUM_ALLOWED_VALUE).sqrt();
    }
}

pub fn unscale_sqrt(values: &mut [f64]) {
    for v in values {
        *v = *v * *v;
    }
}
