//! Squared-error loss.
//!
//! `mse` is symmetric in its arguments and is what the analyzer averages over
//! rows. `mse_backward` also writes `dL/d(pred)` for the predictor's
//! backward pass.

/// Mean squared error over one sample: `mean((pred - target)^2)`.
#[inline]
pub fn mse(pred: &[f64], target: &[f64]) -> f64 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );

    if pred.is_empty() {
        return 0.0;
    }

    let sum_sq = pred
        .iter()
        .zip(target)
        .fold(0.0_f64, |acc, (&p, &t)| (p - t).mul_add(p - t, acc));
    sum_sq / pred.len() as f64
}

/// MSE + gradient w.r.t. `pred`.
///
/// With `L = mean((pred - target)^2)`: `d_pred[i] = 2 * (pred[i] - target[i]) / N`.
#[inline]
pub fn mse_backward(pred: &[f64], target: &[f64], d_pred: &mut [f64]) -> f64 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
    assert_eq!(
        pred.len(),
        d_pred.len(),
        "pred len {} does not match d_pred len {}",
        pred.len(),
        d_pred.len()
    );

    if pred.is_empty() {
        return 0.0;
    }

    let inv_n = 1.0 / pred.len() as f64;
    let mut sum_sq = 0.0_f64;
    for i in 0..pred.len() {
        let diff = pred[i] - target[i];
        sum_sq = diff.mul_add(diff, sum_sq);
        d_pred[i] = 2.0 * diff * inv_n;
    }
    sum_sq * inv_n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mse_is_zero_when_equal_and_symmetric() {
        let a = [1.0, -2.0, 0.5];
        let b = [0.0, 1.0, 0.5];
        assert_eq!(mse(&a, &a), 0.0);
        assert_eq!(mse(&a, &b), mse(&b, &a));
    }

    #[test]
    fn mse_backward_matches_expected_gradient() {
        let pred = [1.0, 3.0];
        let target = [2.0, 1.0];
        let mut d = [0.0; 2];
        let loss = mse_backward(&pred, &target, &mut d);

        // mean([1, 4]) = 2.5
        assert!((loss - 2.5).abs() < 1e-12);
        assert!((d[0] - (-1.0)).abs() < 1e-12);
        assert!((d[1] - 2.0).abs() < 1e-12);
    }
}
