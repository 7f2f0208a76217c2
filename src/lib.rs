//! Feed-forward regression on tabular data, with the data conditioning and
//! training control around it.
//!
//! `mlp-regress` reads rows of numeric features and targets, rescales and
//! normalizes them, trains a dense network until the error stops improving,
//! and reports MSE and R² in both normalized and input-file units.
//!
//! # Pieces
//!
//! - [`normalize`]: min/max ranges, mixed two-regime ranges, affine
//!   normalization and its inverse.
//! - [`scaling`]: `ln`/`sqrt` output rescaling, optionally split by a
//!   threshold on one input column.
//! - [`split`]: random train/validation split, threshold split, batching.
//! - [`train`]: the epoch loop with its stopping rule, timeout and NaN guard.
//! - [`analyzer`]: MSE, R² (stable, naive, denormalized), diffs.
//! - [`pipeline`]: the whole run driven by a [`RunConfig`].
//!
//! The network itself ([`Mlp`]) sits behind the [`Predictor`] and
//! [`Trainable`] traits, so the controller and analyzer work with any model
//! that offers a zero-grad / accumulate / step cycle.
//!
//! # Panics vs `Result`
//!
//! The per-sample hot path ([`Mlp::forward`], [`Mlp::backward`],
//! [`Predictor::predict_into`]) panics on shape mismatches. Everything that
//! takes user data or configuration validates it and returns [`Result`].
//!
//! # Quick start
//!
//! ```rust
//! use mlp_regress::{
//!     Activation, Dataset, GradientPolicy, MlpBuilder, MlpRegressor, Optimizer, TrainConfig,
//!     TrainingController, analyzer, normalize,
//! };
//!
//! # fn main() -> mlp_regress::Result<()> {
//! let xs: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
//! let ys: Vec<Vec<f64>> = (0..20).map(|i| vec![2.0 * i as f64 + 1.0]).collect();
//! let mut data = Dataset::from_rows(&xs, &ys)?;
//!
//! let ranges = normalize::compute_range(&data)?;
//! ranges.validate()?;
//! normalize::normalize_dataset(&mut data, &ranges, 0.0, 1.0);
//!
//! let mlp = MlpBuilder::regressor(1, &[8], Activation::Sigmoid, 1)?.build_with_seed(0)?;
//! let mut model = MlpRegressor::new(mlp, Optimizer::Sgd, 0.1)?;
//!
//! let controller = TrainingController::new(TrainConfig {
//!     min_epochs: 50,
//!     epsilon: 1e-6,
//!     ..TrainConfig::default()
//! })?;
//! let report = controller.train(&mut model, &data, GradientPolicy::RowWise)?;
//! assert!(report.epochs >= 50);
//! assert!(report.final_error < report.initial_error);
//!
//! let r2 = analyzer::r2_stable(&mut model, &data);
//! assert_eq!(r2.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod analyzer;
pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod layer;
pub mod loss;
pub mod mlp;
pub mod normalize;
pub mod optim;
pub mod pipeline;
pub mod predictor;
pub mod rescale;
pub mod scaling;
pub mod serde_model;
pub mod split;
pub mod train;

pub use activation::Activation;
pub use builder::MlpBuilder;
pub use config::{RunConfig, RunState};
pub use data::Dataset;
pub use error::{Error, Result, Side};
pub use layer::{Init, Layer};
pub use mlp::{Gradients, Mlp, Scratch, Trainer};
pub use normalize::{MixedRangeSet, Range, RangeSet, Ranges, Threshold};
pub use optim::{Optimizer, OptimizerState};
pub use pipeline::{Evaluation, RunSummary};
pub use predictor::{MlpRegressor, Predictor, Trainable};
pub use rescale::{IdentityRescaler, MixedRescaler, Rescaler, SimpleRescaler, build_rescaler};
pub use scaling::ScalingMode;
pub use split::{BatchKey, BatchMap};
pub use train::{
    GradientPolicy, ProgressRecord, Shuffle, TrainConfig, TrainOutcome, TrainReport,
    TrainingController, TrainingState,
};
