//! Regression diagnostics over a predictor and a dataset.
//!
//! R² comes in two forms. [`r2_stable`] is `1 - SQR/SQT`, the usual
//! coefficient of determination, and drives progress reporting.
//! [`r2_naive`] is `SQE/SQT`; it agrees with the stable form only for
//! least-squares fits and is kept for comparison.

use crate::predictor::Predictor;
use crate::rescale::Rescaler;
use crate::{Dataset, loss};

/// Mean over rows of the per-row squared error.
///
/// NaN for an empty dataset.
pub fn mse<P: Predictor + ?Sized>(predictor: &mut P, data: &Dataset) -> f64 {
    let mut out = vec![0.0; data.target_dim()];
    let mut total = 0.0;
    for (x, y) in data.iter() {
        predictor.predict_into(x, &mut out);
        total += loss::mse(&out, y);
    }
    total / data.len() as f64
}

/// A dataset with the same features and the predictions as targets.
pub fn predict_dataset<P: Predictor + ?Sized>(predictor: &mut P, data: &Dataset) -> Dataset {
    let mut out = data.clone();
    for (x, y) in out.rows_mut() {
        predictor.predict_into(x, y);
    }
    out
}

/// Per-output `SQE / SQT`. Empty for an empty dataset.
pub fn r2_naive<P: Predictor + ?Sized>(predictor: &mut P, data: &Dataset) -> Vec<f64> {
    let predicted = predict_dataset(predictor, data);
    column_sums(data, &predicted)
        .iter()
        .map(|s| s.sqe / s.sqt)
        .collect()
}

/// Per-output `1 - SQR / SQT`. Empty for an empty dataset.
pub fn r2_stable<P: Predictor + ?Sized>(predictor: &mut P, data: &Dataset) -> Vec<f64> {
    let predicted = predict_dataset(predictor, data);
    column_sums(data, &predicted)
        .iter()
        .map(Sums::r2_stable)
        .collect()
}

/// [`r2_stable`] on targets and predictions mapped back through `rescaler`.
pub fn r2_stable_denormalized<P, R>(predictor: &mut P, data: &Dataset, rescaler: &R) -> Vec<f64>
where
    P: Predictor + ?Sized,
    R: Rescaler + ?Sized,
{
    let mut predicted = predict_dataset(predictor, data);
    let mut wanted = data.clone();
    restore_targets(&mut predicted, rescaler);
    restore_targets(&mut wanted, rescaler);
    column_sums(&wanted, &predicted)
        .iter()
        .map(Sums::r2_stable)
        .collect()
}

/// Denormalize and unscale every target of `data` in place. Features stay
/// normalized, since mixed rescalers read them to pick the regime.
pub fn restore_targets<R: Rescaler + ?Sized>(data: &mut Dataset, rescaler: &R) {
    for (x, y) in data.rows_mut() {
        rescaler.restore(x, y);
    }
}

/// Elementwise `a - b`.
pub fn diff(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "diff operands differ in length");
    a.iter().zip(b).map(|(a, b)| a - b).collect()
}

/// Elementwise `(a - b) / a`. Zero entries of `a` give inf or NaN.
pub fn relative_diff(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "relative diff operands differ in length");
    a.iter().zip(b).map(|(a, b)| (a - b) / a).collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    /// Σ(prediction - mean)²
    sqe: f64,
    /// Σ(target - mean)²
    sqt: f64,
    /// Σ(target - prediction)²
    sqr: f64,
}

impl Sums {
    fn r2_stable(&self) -> f64 {
        1.0 - self.sqr / self.sqt
    }
}

fn column_sums(wanted: &Dataset, predicted: &Dataset) -> Vec<Sums> {
    debug_assert_eq!(wanted.len(), predicted.len());
    if wanted.is_empty() {
        return Vec::new();
    }

    let n = wanted.len() as f64;
    let mut means = vec![0.0; wanted.target_dim()];
    for (_, y) in wanted.iter() {
        for (m, &v) in means.iter_mut().zip(y) {
            *m += v;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);

    let mut sums = vec![Sums::default(); wanted.target_dim()];
    for ((_, t), (_, p)) in wanted.iter().zip(predicted.iter()) {
        for (k, s) in sums.iter_mut().enumerate() {
            s.sqe += (p[k] - means[k]).powi(2);
            s.sqt += (t[k] - means[k]).powi(2);
            s.sqr += (t[k] - p[k]).powi(2);
        }
    }
    sums
}
