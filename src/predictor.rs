//! The predictor seam between the training controller and a model.
//!
//! The controller and analyzer only see [`Predictor`] and [`Trainable`];
//! [`MlpRegressor`] plugs the built-in [`Mlp`] into them.

use crate::optim::OptimizerState;
use crate::{Error, Gradients, Mlp, Optimizer, Result, Trainer, loss};

/// Maps a feature vector to a target vector.
///
/// The methods take `&mut self` so implementations can keep scratch buffers.
/// Shape mismatches panic.
pub trait Predictor {
    fn input_dim(&self) -> usize;

    fn output_dim(&self) -> usize;

    /// Write the prediction for `features` into `out`.
    fn predict_into(&mut self, features: &[f64], out: &mut [f64]);

    fn predict(&mut self, features: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.output_dim()];
        self.predict_into(features, &mut out);
        out
    }

    /// Thread count hint for the predictor's math. Ignored by default.
    fn configure_threads(&mut self, _threads: usize) {}
}

/// A predictor with a zero-grad / accumulate / step update cycle.
pub trait Trainable: Predictor {
    fn zero_grad(&mut self);

    /// Add the squared-error gradient of one row to the pending update and
    /// return that row's loss.
    fn accumulate(&mut self, features: &[f64], targets: &[f64]) -> f64;

    /// Apply the pending update.
    fn step(&mut self);
}

/// [`Mlp`] with its buffers, accumulated gradients and optimizer state.
#[derive(Debug, Clone)]
pub struct MlpRegressor {
    mlp: Mlp,
    trainer: Trainer,
    pending: Gradients,
    optimizer: OptimizerState,
    lr: f64,
    threads: usize,
}

impl MlpRegressor {
    pub fn new(mlp: Mlp, optimizer: Optimizer, lr: f64) -> Result<Self> {
        if !(lr.is_finite() && lr > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {lr}"
            )));
        }
        let optimizer = optimizer.state(&mlp)?;
        Ok(Self {
            trainer: mlp.trainer(),
            pending: mlp.gradients(),
            mlp,
            optimizer,
            lr,
            threads: 1,
        })
    }

    #[inline]
    pub fn mlp(&self) -> &Mlp {
        &self.mlp
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Predictor for MlpRegressor {
    #[inline]
    fn input_dim(&self) -> usize {
        self.mlp.input_dim()
    }

    #[inline]
    fn output_dim(&self) -> usize {
        self.mlp.output_dim()
    }

    fn predict_into(&mut self, features: &[f64], out: &mut [f64]) {
        let y = self.mlp.forward(features, &mut self.trainer.scratch);
        out.copy_from_slice(y);
    }

    fn configure_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }
}

impl Trainable for MlpRegressor {
    fn zero_grad(&mut self) {
        self.pending.zero();
    }

    fn accumulate(&mut self, features: &[f64], targets: &[f64]) -> f64 {
        let Trainer { scratch, grads } = &mut self.trainer;
        self.mlp.forward(features, scratch);
        let loss = loss::mse_backward(scratch.output(), targets, grads.d_output_mut());
        self.mlp.backward(features, scratch, grads);
        self.pending.accumulate(grads);
        loss
    }

    fn step(&mut self) {
        self.optimizer
            .step(&mut self.mlp, &mut self.pending, self.lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, MlpBuilder};

    fn regressor(lr: f64) -> MlpRegressor {
        let mlp = MlpBuilder::regressor(1, &[4], Activation::Sigmoid, 1)
            .unwrap()
            .build_with_seed(5)
            .unwrap();
        MlpRegressor::new(mlp, Optimizer::Sgd, lr).unwrap()
    }

    #[test]
    fn rejects_non_positive_learning_rate() {
        let mlp = MlpBuilder::regressor(1, &[2], Activation::Sigmoid, 1)
            .unwrap()
            .build_with_seed(0)
            .unwrap();
        assert!(MlpRegressor::new(mlp.clone(), Optimizer::Sgd, 0.0).is_err());
        assert!(MlpRegressor::new(mlp, Optimizer::Sgd, f64::NAN).is_err());
    }

    #[test]
    fn predict_matches_forward() {
        let mut model = regressor(0.1);
        let expected = {
            let mlp = model.mlp();
            mlp.forward(&[0.25], &mut mlp.scratch()).to_vec()
        };
        assert_eq!(model.predict(&[0.25]), expected);
    }

    #[test]
    fn repeated_steps_reduce_loss_on_one_row() {
        let mut model = regressor(0.5);
        let x = [0.3];
        let t = [0.8];

        model.zero_grad();
        let first = model.accumulate(&x, &t);
        model.step();
        let mut last = first;
        for _ in 0..50 {
            model.zero_grad();
            last = model.accumulate(&x, &t);
            model.step();
        }
        assert!(last < first, "loss did not drop: {first} -> {last}");
    }

    #[test]
    fn zero_grad_discards_pending_update() {
        let mut model = regressor(0.5);
        let before = model.predict(&[0.3]);
        model.accumulate(&[0.3], &[10.0]);
        model.zero_grad();
        model.step();
        assert_eq!(model.predict(&[0.3]), before);
    }

    #[test]
    fn thread_count_is_at_least_one() {
        let mut model = regressor(0.1);
        assert_eq!(model.threads(), 1);
        model.configure_threads(4);
        assert_eq!(model.threads(), 4);
        model.configure_threads(0);
        assert_eq!(model.threads(), 1);
    }
}
