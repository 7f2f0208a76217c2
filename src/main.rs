//! Command-line entry point for mlp-regress.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser};

use mlp_regress::{Error, Optimizer, RunConfig, ScalingMode, Shuffle, Threshold, pipeline};

#[derive(Parser, Debug)]
#[command(name = "mlp-regress")]
#[command(about = "Fit a feed-forward regressor to tabular data and report its accuracy")]
#[command(version)]
struct Cli {
    /// Load the whole run configuration from a JSON file; other options are ignored
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input data file (header line, then one row per line)
    #[arg(short, long, required_unless_present = "config")]
    input: Option<PathBuf>,

    /// Number of input columns
    #[arg(long, visible_alias = "numberIn", default_value_t = 1)]
    number_in: usize,

    /// Number of output columns
    #[arg(long, visible_alias = "numberOut", default_value_t = 1)]
    number_out: usize,

    /// Mandatory training epochs
    #[arg(short, long, default_value_t = 10)]
    epochs: usize,

    /// Hard cap on epochs, including the continuation phase
    #[arg(long)]
    max_epochs: Option<usize>,

    /// Log every epoch at info level
    #[arg(long, visible_alias = "showProgress", action = ArgAction::Set, default_value_t = true)]
    show_progress: bool,

    /// Smallest per-epoch improvement of the error that counts as progress
    #[arg(long, default_value_t = 1.0)]
    epsilon: f64,

    /// Consecutive deteriorations tolerated after the mandatory epochs
    #[arg(long, visible_alias = "numberOfDeteriorations", default_value_t = 0)]
    number_of_deteriorations: usize,

    /// Stop training after this many minutes
    #[arg(long, visible_alias = "timeoutMinutes", conflicts_with = "timeout_hours")]
    timeout_minutes: Option<u64>,

    /// Stop training after this many hours
    #[arg(long, visible_alias = "timeoutHours")]
    timeout_hours: Option<u64>,

    /// Learning rate
    #[arg(long, visible_alias = "learnRate", default_value_t = 0.01)]
    learn_rate: f64,

    /// Use Adam instead of plain SGD
    #[arg(long)]
    adam: bool,

    /// Hidden layer widths
    #[arg(long, value_delimiter = ',', default_values_t = [30, 30])]
    hidden: Vec<usize>,

    /// Thread count hint for the network
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Scale outputs with ln
    #[arg(long)]
    log: bool,

    /// Scale outputs with sqrt
    #[arg(long)]
    sqrt: bool,

    /// ln at or below THRESHOLD on input COLUMN (1-based), linear above
    #[arg(long, visible_alias = "loglin", num_args = 2, value_names = ["COLUMN", "THRESHOLD"])]
    log_lin: Option<Vec<String>>,

    /// ln at or below THRESHOLD on input COLUMN (1-based), sqrt above
    #[arg(long, visible_alias = "logsqrt", num_args = 2, value_names = ["COLUMN", "THRESHOLD"])]
    log_sqrt: Option<Vec<String>>,

    /// Group rows into batches that differ only in this input column (1-based)
    #[arg(long)]
    batch_column: Option<usize>,

    /// Hold out rows for validation after training
    #[arg(long)]
    validate: bool,

    /// Percentage of rows used for training when validating
    #[arg(long, visible_alias = "validatePercentage", default_value_t = 80.0)]
    validate_percentage: f64,

    /// Seed for the validation split and network initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Shuffle row order every epoch
    #[arg(long)]
    shuffle: bool,

    /// Clamp predictions to the trained range before denormalizing
    #[arg(long)]
    clamp: bool,

    #[arg(long, visible_alias = "inWeights")]
    in_weights: Option<PathBuf>,
    #[arg(long, visible_alias = "outWeights")]
    out_weights: Option<PathBuf>,
    /// Read normalization ranges instead of computing them
    #[arg(long, visible_alias = "inputMinMax")]
    in_min_max: Option<PathBuf>,
    /// Write the normalization ranges used
    #[arg(long, visible_alias = "outputMinMax")]
    out_min_max: Option<PathBuf>,
    /// Write inferred values
    #[arg(long, visible_alias = "outValues")]
    out_values: Option<PathBuf>,
    /// Write wanted minus inferred values
    #[arg(long, visible_alias = "outDiff")]
    out_diff: Option<PathBuf>,
    /// Write (wanted - inferred) / wanted
    #[arg(long, visible_alias = "outRelativeDiff")]
    out_relative_diff: Option<PathBuf>,
    /// Write per-epoch MSE and R²
    #[arg(long, visible_alias = "saveProgress")]
    save_progress: Option<PathBuf>,

    /// Log inferred against wanted values for every row
    #[arg(long, visible_alias = "printBehaviour")]
    print_behaviour: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        if let Some(path) = &self.config {
            return RunConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()));
        }

        let scaling = self.scaling()?;
        let timeout_secs = timeout_secs(self.timeout_minutes, self.timeout_hours)?;
        let batch_column = self
            .batch_column
            .map(|c| one_based(c, "batch column"))
            .transpose()?;

        Ok(RunConfig {
            input: self.input.unwrap_or_default(),
            number_in: self.number_in,
            number_out: self.number_out,
            epochs: self.epochs,
            max_epochs: self.max_epochs,
            epsilon: self.epsilon,
            number_of_deteriorations: self.number_of_deteriorations,
            timeout_secs,
            shuffle: match (self.shuffle, self.seed) {
                (false, _) => Shuffle::None,
                (true, Some(seed)) => Shuffle::Seeded(seed),
                (true, None) => Shuffle::Random,
            },
            show_progress: self.show_progress,
            learn_rate: self.learn_rate,
            optimizer: if self.adam {
                Optimizer::Adam {
                    beta1: 0.9,
                    beta2: 0.999,
                    eps: 1e-8,
                }
            } else {
                Optimizer::Sgd
            },
            hidden_layers: self.hidden,
            threads: self.threads,
            scaling,
            batch_column,
            validate: self.validate,
            training_percent: self.validate_percentage,
            seed: self.seed,
            clamp_predictions: self.clamp,
            in_weights: self.in_weights,
            out_weights: self.out_weights,
            in_min_max: self.in_min_max,
            out_min_max: self.out_min_max,
            out_values: self.out_values,
            out_diff: self.out_diff,
            out_relative_diff: self.out_relative_diff,
            save_progress: self.save_progress,
            print_behaviour: self.print_behaviour,
            ..RunConfig::default()
        })
    }

    fn scaling(&self) -> anyhow::Result<ScalingMode> {
        let selected = [self.log, self.sqrt, self.log_lin.is_some(), self.log_sqrt.is_some()]
            .iter()
            .filter(|&&on| on)
            .count();
        if selected > 1 {
            return Err(Error::InvalidConfig("only one scaling option is allowed".to_owned()).into());
        }

        Ok(if self.log {
            ScalingMode::Log
        } else if self.sqrt {
            ScalingMode::Sqrt
        } else if let Some(args) = &self.log_lin {
            ScalingMode::MixedLogLinear {
                threshold: parse_threshold(args)?,
            }
        } else if let Some(args) = &self.log_sqrt {
            ScalingMode::MixedLogSqrt {
                threshold: parse_threshold(args)?,
            }
        } else {
            ScalingMode::None
        })
    }
}

fn timeout_secs(minutes: Option<u64>, hours: Option<u64>) -> anyhow::Result<Option<u64>> {
    let (amount, unit, what) = match (minutes, hours) {
        (Some(m), _) => (m, 60, "minutes"),
        (None, Some(h)) => (h, 3600, "hours"),
        (None, None) => return Ok(None),
    };
    match amount.checked_mul(unit) {
        Some(secs) => Ok(Some(secs)),
        None => Err(Error::InvalidConfig(format!("timeout of {amount} {what} is too large")).into()),
    }
}

fn one_based(column: usize, what: &str) -> anyhow::Result<usize> {
    match column.checked_sub(1) {
        Some(c) => Ok(c),
        None => bail!("{what} is 1-based, got 0"),
    }
}

fn parse_threshold(args: &[String]) -> anyhow::Result<Threshold> {
    let [column, value] = args else {
        bail!("expected COLUMN THRESHOLD, got {args:?}");
    };
    let column: usize = column
        .parse()
        .with_context(|| format!("mixed scaling column {column:?}"))?;
    let value: f64 = value
        .parse()
        .with_context(|| format!("mixed scaling threshold {value:?}"))?;
    Ok(Threshold::new(one_based(column, "mixed scaling column")?, value))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    log::debug!("running with {config:?}");

    let summary = pipeline::run(&config)
        .with_context(|| format!("run on {} failed", config.input.display()))?;

    let report = &summary.report;
    println!(
        "stopped after {} epochs ({:?}) in {:.2?}, mse {:.6e}",
        report.epochs, report.outcome, report.elapsed, report.final_error
    );
    for (name, eval) in [("training", &summary.training), ("validation", &summary.validation)] {
        if let Some(eval) = eval {
            println!(
                "{name}: {} rows, mse {:.6e}, r2 {:?}, denormalized r2 {:?}",
                eval.rows, eval.mse, eval.r2, eval.r2_denormalized
            );
        }
    }
    Ok(())
}
