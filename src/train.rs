//! The adaptive training loop.
//!
//! A run has a mandatory phase (`epoch <= min_epochs`) and a continuation
//! phase that lasts until the error stops improving by at least `epsilon`
//! for more than `number_of_deteriorations` consecutive epochs. A timeout,
//! a non-finite error, or the optional epoch cap end the run early, each with
//! its own [`TrainOutcome`]. The controller never does I/O; it only logs.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::analyzer;
use crate::predictor::Trainable;
use crate::split::BatchMap;
use crate::{Dataset, Error, Result};

/// Per-epoch ordering of rows (row-wise) or batches (batch-wise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shuffle {
    /// Keep dataset order.
    #[default]
    None,
    /// Shuffle with a deterministic RNG.
    Seeded(u64),
    /// Shuffle with an entropy-seeded RNG.
    Random,
}

impl Shuffle {
    fn rng(self) -> Option<StdRng> {
        match self {
            Shuffle::None => None,
            Shuffle::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
            Shuffle::Random => Some(StdRng::from_entropy()),
        }
    }
}

/// How parameter updates are applied within an epoch.
#[derive(Debug, Clone, Copy)]
pub enum GradientPolicy<'a> {
    /// One update per row.
    RowWise,
    /// One update per batch, with gradients summed over the batch's rows.
    BatchWise(&'a BatchMap),
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Epochs run before the stopping rule may end training.
    pub min_epochs: usize,
    /// Smallest improvement of the error that does not count as a deterioration.
    pub epsilon: f64,
    /// Consecutive deteriorations tolerated in the continuation phase.
    pub number_of_deteriorations: usize,
    /// Wall-clock budget, checked once per epoch.
    pub max_execution_time: Option<Duration>,
    /// Hard cap on epochs.
    pub max_epochs: Option<usize>,
    pub record_progress: bool,
    pub shuffle: Shuffle,
    /// Log every epoch at `info` instead of `debug`.
    pub show_progress: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            min_epochs: 10,
            epsilon: 1.0,
            number_of_deteriorations: 0,
            max_execution_time: None,
            max_epochs: None,
            record_progress: false,
            shuffle: Shuffle::None,
            show_progress: true,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "epsilon must be finite, got {}",
                self.epsilon
            )));
        }
        if self.max_epochs == Some(0) {
            return Err(Error::InvalidConfig("max_epochs must be > 0".to_owned()));
        }
        Ok(())
    }
}

/// Why training stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainOutcome {
    /// The stopping rule ended the continuation phase.
    Converged,
    /// The wall-clock budget ran out.
    Timeout,
    /// The error became NaN or infinite.
    NumericFailure,
    /// `max_epochs` was reached.
    EpochLimit,
    /// The dataset was empty; nothing was trained.
    NoData,
}

impl TrainOutcome {
    /// True for outcomes that cut training short.
    pub fn is_early_stop(self) -> bool {
        matches!(self, TrainOutcome::Timeout | TrainOutcome::NumericFailure)
    }
}

/// One recorded epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub epoch: usize,
    /// Stable R² per output.
    pub r2: Vec<f64>,
    pub mse: f64,
    pub elapsed_ms: u64,
}

/// Mutable state of one training call.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub epoch: usize,
    pub previous_error: f64,
    pub current_error: f64,
    pub deteriorations: usize,
    pub elapsed: Duration,
    pub outcome: Option<TrainOutcome>,
}

impl TrainingState {
    fn new(initial_error: f64) -> Self {
        Self {
            epoch: 0,
            previous_error: initial_error,
            current_error: initial_error,
            deteriorations: 0,
            elapsed: Duration::ZERO,
            outcome: None,
        }
    }

    #[inline]
    pub fn in_continuation(&self, min_epochs: usize) -> bool {
        self.epoch > min_epochs
    }
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub outcome: TrainOutcome,
    pub epochs: usize,
    /// Error before the first epoch.
    pub initial_error: f64,
    pub final_error: f64,
    pub elapsed: Duration,
    /// Empty unless `record_progress` was set.
    pub progress: Vec<ProgressRecord>,
}

/// Runs the epoch loop for one configuration.
#[derive(Debug, Clone)]
pub struct TrainingController {
    config: TrainConfig,
}

impl TrainingController {
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train `predictor` on `data` until a stop condition fires.
    ///
    /// The error driving the stopping rule is the MSE over all of `data`.
    /// With [`GradientPolicy::BatchWise`], updates come from the batches and
    /// `data` is only used for the error. An empty `data` returns
    /// [`TrainOutcome::NoData`] without touching the predictor.
    pub fn train<P: Trainable + ?Sized>(
        &self,
        predictor: &mut P,
        data: &Dataset,
        policy: GradientPolicy<'_>,
    ) -> Result<TrainReport> {
        let cfg = &self.config;
        if data.is_empty() {
            warn!("training set is empty; skipping training");
            return Ok(TrainReport {
                outcome: TrainOutcome::NoData,
                epochs: 0,
                initial_error: f64::NAN,
                final_error: f64::NAN,
                elapsed: Duration::ZERO,
                progress: Vec::new(),
            });
        }
        check_shapes(&*predictor, data, policy)?;

        let start = Instant::now();
        let mut rng = cfg.shuffle.rng();
        let mut progress = Vec::new();
        let initial_error = analyzer::mse(predictor, data);
        let mut state = TrainingState::new(initial_error);
        info!(
            "training on {} rows, initial mse {:.6e}, {} mandatory epochs",
            data.len(),
            state.current_error,
            cfg.min_epochs
        );

        let outcome = loop {
            state.epoch += 1;
            if state.epoch == cfg.min_epochs + 1 && cfg.min_epochs > 0 {
                info!("mandatory phase done, continuing while mse improves by >= {}", cfg.epsilon);
            }

            let train_loss = match policy {
                GradientPolicy::RowWise => row_wise_epoch(predictor, data, rng.as_mut()),
                GradientPolicy::BatchWise(batches) => {
                    batch_wise_epoch(predictor, batches, rng.as_mut())
                }
            };

            state.previous_error = state.current_error;
            state.current_error = analyzer::mse(predictor, data);
            state.elapsed = start.elapsed();

            if !state.current_error.is_finite() {
                warn!(
                    "epoch {}: mse is {}, stopping",
                    state.epoch, state.current_error
                );
                break TrainOutcome::NumericFailure;
            }

            if cfg.record_progress {
                progress.push(ProgressRecord {
                    epoch: state.epoch,
                    r2: analyzer::r2_stable(predictor, data),
                    mse: state.current_error,
                    elapsed_ms: u64::try_from(state.elapsed.as_millis()).unwrap_or(u64::MAX),
                });
            }

            if state.previous_error - state.current_error < cfg.epsilon {
                state.deteriorations += 1;
            } else {
                state.deteriorations = 0;
            }

            let line = format!(
                "epoch {}: mse {:.6e} (train loss {:.6e}), deteriorations {}, elapsed {:?}",
                state.epoch, state.current_error, train_loss, state.deteriorations, state.elapsed
            );
            if cfg.show_progress {
                info!("{line}");
            } else {
                debug!("{line}");
            }

            if cfg.max_execution_time.is_some_and(|max| state.elapsed > max) {
                warn!("timeout after {} epochs ({:?})", state.epoch, state.elapsed);
                break TrainOutcome::Timeout;
            }
            if state.in_continuation(cfg.min_epochs)
                && state.deteriorations > cfg.number_of_deteriorations
            {
                break TrainOutcome::Converged;
            }
            if cfg.max_epochs.is_some_and(|max| state.epoch >= max) {
                break TrainOutcome::EpochLimit;
            }
        };
        state.outcome = Some(outcome);

        info!(
            "training stopped after {} epochs: {:?}, mse {:.6e}",
            state.epoch, outcome, state.current_error
        );
        Ok(TrainReport {
            outcome,
            epochs: state.epoch,
            initial_error,
            final_error: state.current_error,
            elapsed: state.elapsed,
            progress,
        })
    }
}

fn check_shapes<P: Trainable + ?Sized>(
    predictor: &P,
    data: &Dataset,
    policy: GradientPolicy<'_>,
) -> Result<()> {
    let expected = (predictor.input_dim(), predictor.output_dim());
    let check = |rows: &Dataset| {
        if (rows.input_dim(), rows.target_dim()) != expected {
            return Err(Error::InvalidShape(format!(
                "dataset has ({}, {}) columns, predictor expects {expected:?}",
                rows.input_dim(),
                rows.target_dim()
            )));
        }
        Ok(())
    };
    check(data)?;
    if let GradientPolicy::BatchWise(batches) = policy {
        batches.values().try_for_each(check)?;
    }
    Ok(())
}

/// Returns the mean per-row loss seen during the epoch.
fn row_wise_epoch<P: Trainable + ?Sized>(
    predictor: &mut P,
    data: &Dataset,
    rng: Option<&mut StdRng>,
) -> f64 {
    let mut order: Vec<usize> = (0..data.len()).collect();
    if let Some(rng) = rng {
        order.shuffle(rng);
    }

    let mut total = 0.0;
    for idx in order {
        let (x, y) = data.row(idx);
        predictor.zero_grad();
        total += predictor.accumulate(x, y);
        predictor.step();
    }
    total / data.len() as f64
}

fn batch_wise_epoch<P: Trainable + ?Sized>(
    predictor: &mut P,
    batches: &BatchMap,
    rng: Option<&mut StdRng>,
) -> f64 {
    let mut order: Vec<&Dataset> = batches.values().collect();
    if let Some(rng) = rng {
        order.shuffle(rng);
    }

    let mut total = 0.0;
    let mut rows = 0;
    for batch in order {
        predictor.zero_grad();
        for (x, y) in batch.iter() {
            total += predictor.accumulate(x, y);
        }
        predictor.step();
        rows += batch.len();
    }
    total / rows as f64
}
