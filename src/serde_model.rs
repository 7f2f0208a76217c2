//! Versioned JSON format for network weights.
//!
//! The stored structs are separate from `Mlp`/`Layer` so the file format
//! does not follow internal layout changes. Loading re-validates shapes and
//! finiteness through [`Layer::from_parts`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Layer, Mlp, Result};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedMlp {
    pub format_version: u32,
    pub layers: Vec<SerializedLayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub in_dim: usize,
    pub out_dim: usize,
    pub activation: Activation,
    /// Row-major (out_dim, in_dim).
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
}

impl From<&Mlp> for SerializedMlp {
    fn from(model: &Mlp) -> Self {
        let layers = (0..model.num_layers())
            .filter_map(|i| model.layer(i))
            .map(|layer| SerializedLayer {
                in_dim: layer.in_dim(),
                out_dim: layer.out_dim(),
                activation: layer.activation(),
                weights: layer.weights().to_vec(),
                biases: layer.biases().to_vec(),
            })
            .collect();
        Self {
            format_version: MODEL_FORMAT_VERSION,
            layers,
        }
    }
}

impl TryFrom<SerializedMlp> for Mlp {
    type Error = Error;

    fn try_from(value: SerializedMlp) -> std::result::Result<Self, Self::Error> {
        if value.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {MODEL_FORMAT_VERSION}",
                value.format_version
            )));
        }
        if value.layers.is_empty() {
            return Err(Error::InvalidData(
                "serialized model must have at least one layer".to_owned(),
            ));
        }

        let mut layers: Vec<Layer> = Vec::with_capacity(value.layers.len());
        for (i, l) in value.layers.into_iter().enumerate() {
            if let Some(prev) = layers.last() {
                if l.in_dim != prev.out_dim() {
                    return Err(Error::InvalidData(format!(
                        "layer {i} in_dim {} does not match previous out_dim {}",
                        l.in_dim,
                        prev.out_dim()
                    )));
                }
            }
            let layer = Layer::from_parts(l.in_dim, l.out_dim, l.activation, l.weights, l.biases)
                .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))?;
            layers.push(layer);
        }
        Ok(Mlp::from_layers(layers))
    }
}

impl Mlp {
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&SerializedMlp::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedMlp = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;
        ser.try_into()
    }

    /// Save the weights as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string_pretty()?).map_err(|e| Error::io(path, e))
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer() -> Mlp {
        let l1 = Layer::from_parts(
            2,
            3,
            Activation::Sigmoid,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0.1, 0.2, 0.3],
        )
        .unwrap();
        let l2 = Layer::from_parts(3, 1, Activation::Identity, vec![7.0, 8.0, 9.0], vec![0.4]).unwrap();
        Mlp::from_layers(vec![l1, l2])
    }

    #[test]
    fn json_roundtrip_keeps_parameters_exactly() {
        let mlp = two_layer();
        let json = mlp.to_json_string_pretty().unwrap();
        let loaded = Mlp::from_json_str(&json).unwrap();
        assert_eq!(SerializedMlp::from(&loaded), SerializedMlp::from(&mlp));
        assert!(json.contains("\"activation\": \"sigmoid\""));
    }

    #[test]
    fn reads_hand_written_model() {
        let json = r#"{
            "format_version": 1,
            "layers": [
                {"in_dim": 1, "out_dim": 1, "activation": "identity", "weights": [2.0], "biases": [1.0]}
            ]
        }"#;
        let mlp = Mlp::from_json_str(json).unwrap();
        assert_eq!(mlp.forward(&[3.0], &mut mlp.scratch()).to_vec(), vec![7.0]);
    }

    #[test]
    fn rejects_unknown_version_and_broken_chains() {
        let err = Mlp::from_json_str(r#"{"format_version":999,"layers":[]}"#).unwrap_err();
        assert!(err.to_string().contains("format_version"));

        let mut ser = SerializedMlp::from(&two_layer());
        ser.layers[1].in_dim = 2;
        ser.layers[1].weights = vec![1.0, 1.0];
        assert!(Mlp::try_from(ser).is_err());
    }
}
