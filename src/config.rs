//! Run configuration and run state.
//!
//! [`RunConfig`] is what the user asked for and never changes during a run.
//! [`RunState`] collects what the pipeline derives along the way (ranges,
//! normalized threshold, batches, progress) and is threaded explicitly
//! through the stages.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::split::BatchMap;
use crate::train::{ProgressRecord, Shuffle, TrainConfig};
use crate::{Activation, Error, Optimizer, Ranges, Result, ScalingMode, Threshold};

/// Hidden layer widths of the default network.
pub const DEFAULT_HIDDEN_LAYERS: [usize; 2] = [30, 30];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Tabular data file.
    pub input: PathBuf,
    pub number_in: usize,
    pub number_out: usize,

    /// Mandatory epochs before the stopping rule applies.
    pub epochs: usize,
    pub max_epochs: Option<usize>,
    pub epsilon: f64,
    pub number_of_deteriorations: usize,
    pub timeout_secs: Option<u64>,
    pub shuffle: Shuffle,
    pub show_progress: bool,

    pub learn_rate: f64,
    pub optimizer: Optimizer,
    pub hidden_layers: Vec<usize>,
    pub hidden_activation: Activation,
    /// Passed to the predictor as a hint.
    pub threads: usize,

    pub scaling: ScalingMode,
    /// 0-based feature column whose values identify batches when excluded.
    pub batch_column: Option<usize>,
    /// Hold out part of the data and report on it after training.
    pub validate: bool,
    /// Share of rows, in percent, kept for training when `validate` is set.
    pub training_percent: f64,
    /// Seeds the validation split and the network initialization.
    pub seed: Option<u64>,
    /// Clamp predictions to the normalized interval before denormalizing.
    pub clamp_predictions: bool,

    pub in_weights: Option<PathBuf>,
    pub out_weights: Option<PathBuf>,
    pub in_min_max: Option<PathBuf>,
    pub out_min_max: Option<PathBuf>,
    pub out_values: Option<PathBuf>,
    pub out_diff: Option<PathBuf>,
    pub out_relative_diff: Option<PathBuf>,
    pub save_progress: Option<PathBuf>,
    /// Log predicted against wanted values for every row.
    pub print_behaviour: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            number_in: 1,
            number_out: 1,
            epochs: 10,
            max_epochs: None,
            epsilon: 1.0,
            number_of_deteriorations: 0,
            timeout_secs: None,
            shuffle: Shuffle::None,
            show_progress: true,
            learn_rate: 0.01,
            optimizer: Optimizer::Sgd,
            hidden_layers: DEFAULT_HIDDEN_LAYERS.to_vec(),
            hidden_activation: Activation::Sigmoid,
            threads: 1,
            scaling: ScalingMode::None,
            batch_column: None,
            validate: false,
            training_percent: 80.0,
            seed: None,
            clamp_predictions: false,
            in_weights: None,
            out_weights: None,
            in_min_max: None,
            out_min_max: None,
            out_values: None,
            out_diff: None,
            out_relative_diff: None,
            save_progress: None,
            print_behaviour: false,
        }
    }
}

impl RunConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::InvalidConfig(format!("bad config json: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json_str(&s)
    }

    /// Reject anything that would make the run meaningless. Called before any
    /// data is touched.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| -> Result<()> { Err(Error::InvalidConfig(msg)) };

        if self.number_in == 0 || self.number_out == 0 {
            return bad(format!(
                "need at least one input and one output column, got {} and {}",
                self.number_in, self.number_out
            ));
        }
        if self.epochs == 0 {
            return bad("epochs must be > 0".to_owned());
        }
        if let Some(max) = self.max_epochs {
            if max < self.epochs {
                return bad(format!("max_epochs {max} is below epochs {}", self.epochs));
            }
        }
        if !(self.learn_rate.is_finite() && self.learn_rate > 0.0) {
            return bad(format!("learn rate must be finite and > 0, got {}", self.learn_rate));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return bad(format!("epsilon must be finite and >= 0, got {}", self.epsilon));
        }
        if self.timeout_secs == Some(0) {
            return bad("timeout must be > 0".to_owned());
        }
        if !(0.0..=100.0).contains(&self.training_percent) {
            return bad(format!(
                "training percentage must be in [0, 100], got {}",
                self.training_percent
            ));
        }
        if self.threads == 0 {
            return bad("threads must be > 0".to_owned());
        }
        if self.hidden_layers.contains(&0) {
            return bad(format!("hidden layer widths must be > 0, got {:?}", self.hidden_layers));
        }
        if let Some(t) = self.scaling.threshold() {
            if t.column >= self.number_in {
                return bad(format!(
                    "mixed scaling column {} out of bounds for {} inputs",
                    t.column, self.number_in
                ));
            }
            if !t.value.is_finite() {
                return bad(format!("mixed scaling threshold must be finite, got {}", t.value));
            }
        }
        if let Some(c) = self.batch_column {
            if c >= self.number_in {
                return bad(format!("batch column {c} out of bounds for {} inputs", self.number_in));
            }
        }
        self.optimizer.validate()
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Controller settings for this run.
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            min_epochs: self.epochs,
            epsilon: self.epsilon,
            number_of_deteriorations: self.number_of_deteriorations,
            max_execution_time: self.max_execution_time(),
            max_epochs: self.max_epochs,
            record_progress: self.save_progress.is_some(),
            shuffle: self.shuffle,
            show_progress: self.show_progress,
        }
    }
}

/// Mutable products of one run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Header line of the input file, reused for every output table.
    pub header: String,
    pub ranges: Option<Ranges>,
    /// Mixed-scaling threshold in normalized input space.
    pub normalized_threshold: Option<Threshold>,
    pub batches: Option<BatchMap>,
    pub progress: Vec<ProgressRecord>,
}
