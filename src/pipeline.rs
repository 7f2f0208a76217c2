//! End-to-end run: load, condition, split, train, analyze, write.

use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::analyzer;
use crate::config::{RunConfig, RunState};
use crate::normalize::{self, NORMALIZED_MAX, NORMALIZED_MIN};
use crate::predictor::{MlpRegressor, Predictor};
use crate::rescale::{Rescaler, build_rescaler};
use crate::split::{group_into_batches, split_random};
use crate::train::{GradientPolicy, TrainReport, TrainingController};
use crate::{Dataset, Error, Mlp, MlpBuilder, Ranges, Result, io};

/// Accuracy of the trained model on one subset.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rows: usize,
    pub mse: f64,
    pub r2: Vec<f64>,
    pub r2_naive: Vec<f64>,
    /// Stable R² in the units of the input file.
    pub r2_denormalized: Vec<f64>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: TrainReport,
    pub training: Option<Evaluation>,
    pub validation: Option<Evaluation>,
    pub state: RunState,
}

/// Run every stage `config` asks for.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let mut state = RunState::default();

    let table = io::read_table(&config.input, config.number_in, config.number_out)?;
    info!("loaded {} rows from {}", table.data.len(), config.input.display());
    state.header = table.header;

    let data = condition(config, &mut state, table.data)?;
    let ranges = state
        .ranges
        .as_ref()
        .ok_or_else(|| Error::InvalidData("ranges were not computed".to_owned()))?;
    let rescaler = build_rescaler(ranges, config.scaling, config.clamp_predictions)?;

    let (train, validation) = if config.validate {
        let mut rng = seeded_rng(config.seed);
        let (train, validation) = split_random(&data, config.training_percent, &mut rng)?;
        info!(
            "split {} rows into {} training and {} validation rows",
            data.len(),
            train.len(),
            validation.len()
        );
        if validation.is_empty() {
            warn!("validation set is empty");
        }
        (train, validation)
    } else {
        (data.clone(), data.empty_like())
    };

    if let Some(column) = config.batch_column {
        state.batches = Some(group_into_batches(&train, column)?);
    }

    let mut model = MlpRegressor::new(build_network(config)?, config.optimizer, config.learn_rate)?;
    model.configure_threads(config.threads);

    let controller = TrainingController::new(config.train_config())?;
    let policy = match &state.batches {
        Some(batches) => GradientPolicy::BatchWise(batches),
        None => GradientPolicy::RowWise,
    };
    let mut report = controller.train(&mut model, &train, policy)?;
    state.progress = std::mem::take(&mut report.progress);

    let training = evaluate(&mut model, &train, rescaler.as_ref(), "training");
    let validation = evaluate(&mut model, &validation, rescaler.as_ref(), "validation");

    write_outputs(config, &state, &mut model, &data, rescaler.as_ref())?;

    Ok(RunSummary {
        report,
        training,
        validation,
        state,
    })
}

/// Scale outputs, settle ranges, and normalize. Leaves ranges and the
/// normalized threshold in `state`.
fn condition(config: &RunConfig, state: &mut RunState, mut data: Dataset) -> Result<Dataset> {
    let threshold = config.scaling.threshold();
    config.scaling.scale_dataset(&mut data)?;

    let ranges = match (&config.in_min_max, threshold) {
        // A 2-row file is shared by both regimes.
        (Some(path), Some(_)) => io::read_ranges(path, config.number_in, config.number_out)?,
        (Some(path), None) => Ranges::Simple(io::read_range_file(
            path,
            config.number_in,
            config.number_out,
        )?),
        (None, Some(t)) => Ranges::Mixed(normalize::compute_mixed_range(&data, t)?),
        (None, None) => Ranges::Simple(normalize::compute_range(&data)?),
    };
    ranges.validate()?;

    ranges.normalize_dataset(&mut data, threshold, NORMALIZED_MIN, NORMALIZED_MAX)?;
    state.normalized_threshold =
        threshold.map(|t| t.normalized(ranges.inputs(), NORMALIZED_MIN, NORMALIZED_MAX));
    state.ranges = Some(ranges);
    Ok(data)
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn build_network(config: &RunConfig) -> Result<Mlp> {
    if let Some(path) = &config.in_weights {
        let mlp = Mlp::load_json(path)?;
        if (mlp.input_dim(), mlp.output_dim()) != (config.number_in, config.number_out) {
            return Err(Error::InvalidShape(format!(
                "weights in {} map {} inputs to {} outputs, data has {} and {}",
                path.display(),
                mlp.input_dim(),
                mlp.output_dim(),
                config.number_in,
                config.number_out
            )));
        }
        info!("loaded weights from {}", path.display());
        return Ok(mlp);
    }

    let builder = MlpBuilder::regressor(
        config.number_in,
        &config.hidden_layers,
        config.hidden_activation,
        config.number_out,
    )?;
    match config.seed {
        Some(seed) => builder.build_with_seed(seed),
        None => builder.build_with_rng(&mut StdRng::from_entropy()),
    }
}

fn evaluate<P, R>(model: &mut P, data: &Dataset, rescaler: &R, name: &str) -> Option<Evaluation>
where
    P: Predictor + ?Sized,
    R: Rescaler + ?Sized,
{
    if data.is_empty() {
        return None;
    }
    let eval = Evaluation {
        rows: data.len(),
        mse: analyzer::mse(model, data),
        r2: analyzer::r2_stable(model, data),
        r2_naive: analyzer::r2_naive(model, data),
        r2_denormalized: analyzer::r2_stable_denormalized(model, data, rescaler),
    };
    info!(
        "{name}: {} rows, mse {:.6e}, r2 {:?}, r2 (naive) {:?}, r2 (denormalized) {:?}",
        eval.rows, eval.mse, eval.r2, eval.r2_naive, eval.r2_denormalized
    );
    Some(eval)
}

fn write_outputs<R: Rescaler + ?Sized>(
    config: &RunConfig,
    state: &RunState,
    model: &mut MlpRegressor,
    data: &Dataset,
    rescaler: &R,
) -> Result<()> {
    let Some(ranges) = &state.ranges else {
        return Ok(());
    };

    let needs_values = config.out_values.is_some()
        || config.out_diff.is_some()
        || config.out_relative_diff.is_some()
        || config.print_behaviour;
    if needs_values {
        let wanted = to_raw_units(data, ranges, rescaler);
        let inferred = to_raw_units(&analyzer::predict_dataset(model, data), ranges, rescaler);

        if config.print_behaviour {
            for ((x, want), (_, got)) in wanted.iter().zip(inferred.iter()) {
                info!("input {x:?}: inferred {got:?}, wanted {want:?}");
            }
        }
        if let Some(path) = &config.out_values {
            io::write_table(path, &state.header, &inferred)?;
        }
        if let Some(path) = &config.out_diff {
            let diff = zip_targets(&wanted, &inferred, analyzer::diff)?;
            io::write_table(path, &state.header, &diff)?;
        }
        if let Some(path) = &config.out_relative_diff {
            let diff = zip_targets(&wanted, &inferred, analyzer::relative_diff)?;
            io::write_table(path, &state.header, &diff)?;
        }
    }

    if let Some(path) = &config.out_min_max {
        match ranges {
            Ranges::Simple(set) => io::write_range_file(path, &state.header, set)?,
            Ranges::Mixed(mixed) => io::write_mixed_range_file(path, &state.header, mixed)?,
        }
    }
    if let Some(path) = &config.save_progress {
        io::write_progress(path, &state.progress, config.number_out)?;
    }
    if let Some(path) = &config.out_weights {
        model.mlp().save_json(path)?;
        info!("saved weights to {}", path.display());
    }
    Ok(())
}

/// Copy of `data` with targets restored and features denormalized.
fn to_raw_units<R: Rescaler + ?Sized>(data: &Dataset, ranges: &Ranges, rescaler: &R) -> Dataset {
    let mut out = data.clone();
    for (x, y) in out.rows_mut() {
        rescaler.restore(x, y);
        normalize::denormalize(x, ranges.inputs(), NORMALIZED_MIN, NORMALIZED_MAX, false);
    }
    out
}

/// Rows with `wanted`'s features and `f(wanted, inferred)` as targets.
fn zip_targets(
    wanted: &Dataset,
    inferred: &Dataset,
    f: fn(&[f64], &[f64]) -> Vec<f64>,
) -> Result<Dataset> {
    let mut out = wanted.empty_like();
    for ((x, want), (_, got)) in wanted.iter().zip(inferred.iter()) {
        out.push(x, &f(want, got))?;
    }
    Ok(out)
}
