//! Model builder.
//!
//! `MlpBuilder` makes the structure explicit (layer sizes + activations) and
//! picks the initializer per activation:
//!
//! - sigmoid / tanh / identity: Xavier/Glorot
//! - relu: He/Kaiming

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, Error, Init, Layer, Mlp, Result};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    out_dim: usize,
    activation: Activation,
}

/// Builder for an `Mlp`.
///
/// ```rust
/// use mlp_regress::{Activation, MlpBuilder};
///
/// # fn main() -> mlp_regress::Result<()> {
/// let mlp = MlpBuilder::new(2)?
///     .add_layer(30, Activation::Sigmoid)?
///     .add_layer(1, Activation::Identity)?
///     .build_with_seed(0)?;
/// assert_eq!(mlp.output_dim(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MlpBuilder {
    input_dim: usize,
    layers: Vec<LayerSpec>,
}

impl MlpBuilder {
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            layers: Vec::new(),
        })
    }

    /// Regressor topology: `hidden` layers with `hidden_activation`, then a
    /// linear output layer of width `output_dim`.
    pub fn regressor(
        input_dim: usize,
        hidden: &[usize],
        hidden_activation: Activation,
        output_dim: usize,
    ) -> Result<Self> {
        let mut b = Self::new(input_dim)?;
        for &width in hidden {
            b = b.add_layer(width, hidden_activation)?;
        }
        b.add_layer(output_dim, Activation::Identity)
    }

    pub fn add_layer(mut self, out_dim: usize, activation: Activation) -> Result<Self> {
        if out_dim == 0 {
            return Err(Error::InvalidConfig("layer out_dim must be > 0".to_owned()));
        }
        self.layers.push(LayerSpec {
            out_dim,
            activation,
        });
        Ok(self)
    }

    pub fn build_with_seed(self, seed: u64) -> Result<Mlp> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Mlp> {
        if self.layers.is_empty() {
            return Err(Error::InvalidConfig(
                "mlp must have at least one layer".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut in_dim = self.input_dim;
        for spec in self.layers {
            let init = default_init_for_activation(spec.activation);
            layers.push(Layer::new_with_rng(
                in_dim,
                spec.out_dim,
                init,
                spec.activation,
                rng,
            )?);
            in_dim = spec.out_dim;
        }

        Ok(Mlp::from_layers(layers))
    }
}

#[inline]
fn default_init_for_activation(act: Activation) -> Init {
    match act {
        Activation::Sigmoid | Activation::Tanh | Activation::Identity => Init::Xavier,
        Activation::ReLU => Init::He,
    }
}
