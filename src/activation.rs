//! Activation functions.
//!
//! A dense layer computes `z = W x + b` and then applies the activation
//! element-wise. Only the post-activation output `y` is cached, so every
//! derivative here is expressed in terms of `y`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Element-wise activation function.
pub enum Activation {
    /// Logistic sigmoid. Default for hidden layers.
    #[default]
    Sigmoid,
    Tanh,
    #[serde(rename = "relu")]
    ReLU,
    /// Linear output. Default for the output layer of a regressor.
    Identity,
}

impl Activation {
    #[inline]
    pub(crate) fn forward(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::ReLU => x.max(0.0),
            Activation::Identity => x,
        }
    }

    /// `dy/dz` from the cached output `y`.
    #[inline]
    pub(crate) fn grad_from_output(self, y: f64) -> f64 {
        match self {
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Tanh => 1.0 - y * y,
            Activation::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // Split on sign so exp never overflows.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
