//! Optimizers.
//!
//! Optimizer state (momentum, Adam moments) lives outside the model and is
//! owned by whoever drives the update cycle (`MlpRegressor`).

use serde::{Deserialize, Serialize};

use crate::{Error, Gradients, Mlp, Result};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// Optimizer choice for training.
pub enum Optimizer {
    /// Plain SGD.
    #[default]
    Sgd,
    /// SGD with momentum.
    SgdMomentum { momentum: f64 },
    /// Adam (bias-corrected).
    Adam { beta1: f64, beta2: f64, eps: f64 },
}

impl Optimizer {
    pub fn validate(self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if v.is_finite() && (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!(
                    "{name} must be finite and in [0,1), got {v}"
                )))
            }
        };

        match self {
            Optimizer::Sgd => Ok(()),
            Optimizer::SgdMomentum { momentum } => unit("momentum", momentum),
            Optimizer::Adam { beta1, beta2, eps } => {
                unit("adam beta1", beta1)?;
                unit("adam beta2", beta2)?;
                if !(eps.is_finite() && eps > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "adam eps must be finite and > 0, got {eps}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Allocate optimizer state for `model`.
    pub fn state(self, model: &Mlp) -> Result<OptimizerState> {
        self.validate()?;

        Ok(match self {
            Optimizer::Sgd => OptimizerState::Sgd,
            Optimizer::SgdMomentum { momentum } => OptimizerState::SgdMomentum {
                momentum,
                velocity: model.gradients(),
            },
            Optimizer::Adam { beta1, beta2, eps } => OptimizerState::Adam {
                beta1,
                beta2,
                eps,
                beta1_pow: 1.0,
                beta2_pow: 1.0,
                m: model.gradients(),
                v: model.gradients(),
            },
        })
    }
}

/// Owned optimizer state. Moment buffers reuse the `Gradients` layout.
#[derive(Debug, Clone)]
pub enum OptimizerState {
    Sgd,
    SgdMomentum {
        momentum: f64,
        velocity: Gradients,
    },
    Adam {
        beta1: f64,
        beta2: f64,
        eps: f64,
        beta1_pow: f64,
        beta2_pow: f64,
        m: Gradients,
        v: Gradients,
    },
}

impl OptimizerState {
    /// Apply one update. `grads` may be overwritten with the update direction.
    pub fn step(&mut self, model: &mut Mlp, grads: &mut Gradients, lr: f64) {
        assert!(lr.is_finite() && lr > 0.0, "lr must be finite and > 0");

        match self {
            OptimizerState::Sgd => model.sgd_step(grads, lr),
            OptimizerState::SgdMomentum { momentum, velocity } => {
                for layer_idx in 0..model.num_layers() {
                    decay_add(
                        velocity.d_weights_mut(layer_idx),
                        grads.d_weights(layer_idx),
                        *momentum,
                    );
                    decay_add(
                        velocity.d_biases_mut(layer_idx),
                        grads.d_biases(layer_idx),
                        *momentum,
                    );
                }
                model.sgd_step(velocity, lr);
            }
            OptimizerState::Adam {
                beta1,
                beta2,
                eps,
                beta1_pow,
                beta2_pow,
                m,
                v,
            } => {
                *beta1_pow *= *beta1;
                *beta2_pow *= *beta2;
                let corr1 = 1.0 - *beta1_pow;
                let corr2 = 1.0 - *beta2_pow;

                for layer_idx in 0..model.num_layers() {
                    adam_update(
                        grads.d_weights_mut(layer_idx),
                        m.d_weights_mut(layer_idx),
                        v.d_weights_mut(layer_idx),
                        (*beta1, *beta2, *eps, corr1, corr2),
                    );
                    adam_update(
                        grads.d_biases_mut(layer_idx),
                        m.d_biases_mut(layer_idx),
                        v.d_biases_mut(layer_idx),
                        (*beta1, *beta2, *eps, corr1, corr2),
                    );
                }
                model.sgd_step(grads, lr);
            }
        }
    }
}

/// `acc = decay * acc + g`
#[inline]
fn decay_add(acc: &mut [f64], g: &[f64], decay: f64) {
    for (a, &g) in acc.iter_mut().zip(g) {
        *a = decay * *a + g;
    }
}

/// Replaces `g` with the bias-corrected Adam direction.
#[inline]
fn adam_update(g: &mut [f64], m: &mut [f64], v: &mut [f64], hp: (f64, f64, f64, f64, f64)) {
    let (beta1, beta2, eps, corr1, corr2) = hp;
    for i in 0..g.len() {
        m[i] = beta1 * m[i] + (1.0 - beta1) * g[i];
        v[i] = beta2 * v[i] + (1.0 - beta2) * g[i] * g[i];
        g[i] = (m[i] / corr1) / ((v[i] / corr2).sqrt() + eps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, MlpBuilder};

    fn unit_model() -> Mlp {
        let mut mlp = MlpBuilder::new(1)
            .unwrap()
            .add_layer(1, Activation::Identity)
            .unwrap()
            .build_with_seed(0)
            .unwrap();
        let layer = mlp.layer_mut(0).unwrap();
        layer.weights_mut()[0] = 1.0;
        layer.biases_mut()[0] = 2.0;
        mlp
    }

    #[test]
    fn validation_rejects_bad_hyperparams() {
        assert!(Optimizer::SgdMomentum { momentum: 1.0 }.validate().is_err());
        assert!(
            Optimizer::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 0.0
            }
            .validate()
            .is_err()
        );
        assert!(Optimizer::Sgd.validate().is_ok());
    }

    #[test]
    fn momentum_first_step_equals_sgd() {
        let mut mlp = unit_model();
        let mut grads = mlp.gradients();
        grads.d_weights_mut(0)[0] = 3.0;
        grads.d_biases_mut(0)[0] = 4.0;

        let mut opt = Optimizer::SgdMomentum { momentum: 0.9 }.state(&mlp).unwrap();
        opt.step(&mut mlp, &mut grads, 0.1);

        let layer = mlp.layer(0).unwrap();
        assert!((layer.weights()[0] - 0.7).abs() < 1e-12);
        assert!((layer.biases()[0] - 1.6).abs() < 1e-12);
    }

    #[test]
    fn adam_first_step_with_unit_grad() {
        let mut mlp = unit_model();
        let mut grads = mlp.gradients();
        grads.d_weights_mut(0)[0] = 1.0;
        grads.d_biases_mut(0)[0] = 1.0;

        let mut opt = Optimizer::Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1.0,
        }
        .state(&mlp)
        .unwrap();
        opt.step(&mut mlp, &mut grads, 0.1);

        // m_hat = v_hat = 1, so the direction is 1 / (1 + eps) = 0.5.
        let layer = mlp.layer(0).unwrap();
        assert!((layer.weights()[0] - 0.95).abs() < 1e-12);
        assert!((layer.biases()[0] - 1.95).abs() < 1e-12);
    }

    #[test]
    fn optimizer_config_is_tagged_json() {
        let opt: Optimizer =
            serde_json::from_str(r#"{"kind":"sgd_momentum","momentum":0.5}"#).unwrap();
        assert_eq!(opt, Optimizer::SgdMomentum { momentum: 0.5 });
    }
}
