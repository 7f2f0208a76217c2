use crate::Layer;

/// Dense feed-forward network: the default predictor.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Layer>,
}

/// Reusable buffers for `Mlp::forward`.
///
/// The output of the most recent forward pass lives inside `Scratch`.
#[derive(Debug, Clone)]
pub struct Scratch {
    layer_outputs: Vec<Vec<f64>>,
}

/// Parameter gradients for an `Mlp`.
///
/// `Mlp::backward` overwrites them; `Gradients::accumulate` sums several
/// samples into one buffer for batch-wise updates.
#[derive(Debug, Clone)]
pub struct Gradients {
    d_weights: Vec<Vec<f64>>,
    d_biases: Vec<Vec<f64>>,

    // Gradient w.r.t. each layer output, including the final one.
    d_layer_outputs: Vec<Vec<f64>>,

    d_input: Vec<f64>,
}

impl Mlp {
    /// Build from already constructed layers.
    ///
    /// Panics if `layers` is empty or adjacent dims do not chain.
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        assert!(!layers.is_empty(), "mlp must have at least one layer");
        for pair in layers.windows(2) {
            assert_eq!(
                pair[0].out_dim(),
                pair[1].in_dim(),
                "layer out_dim {} does not match next in_dim {}",
                pair[0].out_dim(),
                pair[1].in_dim()
            );
        }
        Self { layers }
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_dim()
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim()
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> Option<&Layer> {
        self.layers.get(idx)
    }

    #[inline]
    pub fn layer_mut(&mut self, idx: usize) -> Option<&mut Layer> {
        self.layers.get_mut(idx)
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self)
    }

    pub fn gradients(&self) -> Gradients {
        Gradients::new(self)
    }

    #[inline]
    pub fn trainer(&self) -> Trainer {
        Trainer::new(self)
    }

    /// Forward pass for a single sample.
    ///
    /// Shape contract:
    /// - `input.len() == self.input_dim()`
    /// - `scratch` was built for this `Mlp`
    pub fn forward<'a>(&self, input: &[f64], scratch: &'a mut Scratch) -> &'a [f64] {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        assert_eq!(
            scratch.layer_outputs.len(),
            self.layers.len(),
            "scratch has {} layer outputs, model has {} layers",
            scratch.layer_outputs.len(),
            self.layers.len()
        );

        for (idx, layer) in self.layers.iter().enumerate() {
            if idx == 0 {
                layer.forward(input, &mut scratch.layer_outputs[0]);
            } else {
                let (left, right) = scratch.layer_outputs.split_at_mut(idx);
                layer.forward(&left[idx - 1], &mut right[0]);
            }
        }

        scratch.output()
    }

    /// Backward pass for a single sample.
    ///
    /// Call `forward` first with the same `input` and `scratch`, then write
    /// `dL/d(output)` into `grads.d_output_mut()`. `grads` is overwritten.
    ///
    /// Returns `dL/d(input)`.
    pub fn backward<'a>(
        &self,
        input: &[f64],
        scratch: &Scratch,
        grads: &'a mut Gradients,
    ) -> &'a [f64] {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match model input_dim {}",
            input.len(),
            self.input_dim()
        );
        assert_eq!(
            grads.d_weights.len(),
            self.layers.len(),
            "grads has {} layers, model has {} layers",
            grads.d_weights.len(),
            self.layers.len()
        );

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            let layer_input: &[f64] = if idx == 0 {
                input
            } else {
                &scratch.layer_outputs[idx - 1]
            };
            let layer_output = &scratch.layer_outputs[idx];

            if idx == 0 {
                layer.backward(
                    layer_input,
                    layer_output,
                    &grads.d_layer_outputs[0],
                    &mut grads.d_input,
                    &mut grads.d_weights[0],
                    &mut grads.d_biases[0],
                );
            } else {
                // d_inputs of this layer is d_outputs of the previous one.
                let (left, right) = grads.d_layer_outputs.split_at_mut(idx);
                layer.backward(
                    layer_input,
                    layer_output,
                    &right[0],
                    &mut left[idx - 1],
                    &mut grads.d_weights[idx],
                    &mut grads.d_biases[idx],
                );
            }
        }

        &grads.d_input
    }

    /// Applies an SGD update to all layers.
    #[inline]
    pub fn sgd_step(&mut self, grads: &Gradients, lr: f64) {
        assert!(
            lr.is_finite() && lr > 0.0,
            "learning rate must be finite and > 0"
        );
        assert_eq!(
            self.layers.len(),
            grads.d_weights.len(),
            "grads has {} layers, model has {} layers",
            grads.d_weights.len(),
            self.layers.len()
        );

        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.sgd_step(&grads.d_weights[i], &grads.d_biases[i], lr);
        }
    }
}

/// Forward/backward buffers for training a specific `Mlp`.
#[derive(Debug, Clone)]
pub struct Trainer {
    pub scratch: Scratch,
    pub grads: Gradients,
}

impl Trainer {
    pub fn new(mlp: &Mlp) -> Self {
        Self {
            scratch: Scratch::new(mlp),
            grads: Gradients::new(mlp),
        }
    }
}

impl Scratch {
    pub fn new(mlp: &Mlp) -> Self {
        let layer_outputs = mlp.layers.iter().map(|l| vec![0.0; l.out_dim()]).collect();
        Self { layer_outputs }
    }

    #[inline]
    pub fn output(&self) -> &[f64] {
        self.layer_outputs
            .last()
            .expect("scratch must have at least one layer output")
            .as_slice()
    }
}

impl Gradients {
    pub fn new(mlp: &Mlp) -> Self {
        let n = mlp.layers.len();
        let mut d_weights = Vec::with_capacity(n);
        let mut d_biases = Vec::with_capacity(n);
        let mut d_layer_outputs = Vec::with_capacity(n);

        for layer in &mlp.layers {
            d_weights.push(vec![0.0; layer.in_dim() * layer.out_dim()]);
            d_biases.push(vec![0.0; layer.out_dim()]);
            d_layer_outputs.push(vec![0.0; layer.out_dim()]);
        }

        Self {
            d_weights,
            d_biases,
            d_layer_outputs,
            d_input: vec![0.0; mlp.input_dim()],
        }
    }

    /// Mutable view of `dL/d(output)`; the loss writes here before `backward`.
    #[inline]
    pub fn d_output_mut(&mut self) -> &mut [f64] {
        self.d_layer_outputs
            .last_mut()
            .expect("mlp must have at least one layer")
            .as_mut_slice()
    }

    #[inline]
    pub fn d_weights(&self, layer_idx: usize) -> &[f64] {
        &self.d_weights[layer_idx]
    }

    #[inline]
    pub fn d_biases(&self, layer_idx: usize) -> &[f64] {
        &self.d_biases[layer_idx]
    }

    #[inline]
    pub fn d_weights_mut(&mut self, layer_idx: usize) -> &mut [f64] {
        &mut self.d_weights[layer_idx]
    }

    #[inline]
    pub fn d_biases_mut(&mut self, layer_idx: usize) -> &mut [f64] {
        &mut self.d_biases[layer_idx]
    }

    /// Zero the parameter gradients.
    pub fn zero(&mut self) {
        for v in self.d_weights.iter_mut().chain(self.d_biases.iter_mut()) {
            v.fill(0.0);
        }
    }

    /// `self += other` over the parameter gradients.
    pub fn accumulate(&mut self, other: &Gradients) {
        debug_assert_eq!(self.d_weights.len(), other.d_weights.len());
        for (dst, src) in self
            .d_weights
            .iter_mut()
            .chain(self.d_biases.iter_mut())
            .zip(other.d_weights.iter().chain(other.d_biases.iter()))
        {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }
}
