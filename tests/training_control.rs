use std::time::Duration;

use approx::assert_relative_eq;

use mlp_regress::split::group_into_batches;
use mlp_regress::{
    Activation, Dataset, GradientPolicy, MlpBuilder, MlpRegressor, Optimizer, Predictor, Shuffle,
    TrainConfig, TrainOutcome, Trainable, TrainingController, normalize,
};

/// `y = w * x + b` fitted with plain gradient descent.
#[derive(Debug, Clone)]
struct Linear {
    w: f64,
    b: f64,
    grad_w: f64,
    grad_b: f64,
    lr: f64,
    steps: usize,
}

impl Linear {
    fn new(lr: f64) -> Self {
        Self {
            w: 0.0,
            b: 0.0,
            grad_w: 0.0,
            grad_b: 0.0,
            lr,
            steps: 0,
        }
    }
}

impl Predictor for Linear {
    fn input_dim(&self) -> usize {
        1
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn predict_into(&mut self, features: &[f64], out: &mut [f64]) {
        out[0] = self.w * features[0] + self.b;
    }
}

impl Trainable for Linear {
    fn zero_grad(&mut self) {
        self.grad_w = 0.0;
        self.grad_b = 0.0;
    }

    fn accumulate(&mut self, features: &[f64], targets: &[f64]) -> f64 {
        let e = self.w * features[0] + self.b - targets[0];
        self.grad_w += 2.0 * e * features[0];
        self.grad_b += 2.0 * e;
        e * e
    }

    fn step(&mut self) {
        self.w -= self.lr * self.grad_w;
        self.b -= self.lr * self.grad_b;
        self.steps += 1;
    }
}

/// Predicts NaN as soon as it has been updated once.
struct Exploding {
    broken: bool,
}

impl Predictor for Exploding {
    fn input_dim(&self) -> usize {
        1
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn predict_into(&mut self, features: &[f64], out: &mut [f64]) {
        out[0] = if self.broken { f64::NAN } else { features[0] };
    }
}

impl Trainable for Exploding {
    fn zero_grad(&mut self) {}

    fn accumulate(&mut self, _features: &[f64], _targets: &[f64]) -> f64 {
        0.0
    }

    fn step(&mut self) {
        self.broken = true;
    }
}

/// Remembers the first feature of every row handed to `accumulate`.
struct Recording {
    inputs: usize,
    seen: Vec<f64>,
}

impl Predictor for Recording {
    fn input_dim(&self) -> usize {
        self.inputs
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn predict_into(&mut self, _features: &[f64], out: &mut [f64]) {
        out[0] = 0.0;
    }
}

impl Trainable for Recording {
    fn zero_grad(&mut self) {}

    fn accumulate(&mut self, features: &[f64], _targets: &[f64]) -> f64 {
        self.seen.push(features[0]);
        0.0
    }

    fn step(&mut self) {}
}

/// The diagonal (0,0) ... (3,3), normalized onto the unit square.
fn diagonal() -> Dataset {
    let xs: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
    let mut data = Dataset::from_rows(&xs, &xs).unwrap();
    let ranges = normalize::compute_range(&data).unwrap();
    ranges.validate().unwrap();
    normalize::normalize_dataset(&mut data, &ranges, 0.0, 1.0);
    data
}

fn controller(cfg: TrainConfig) -> TrainingController {
    TrainingController::new(TrainConfig {
        show_progress: false,
        ..cfg
    })
    .unwrap()
}

#[test]
fn no_mandatory_epochs_and_large_epsilon_stop_after_one_epoch() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 0,
        epsilon: 1.0,
        number_of_deteriorations: 0,
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    assert_eq!(report.outcome, TrainOutcome::Converged);
    assert_eq!(report.epochs, 1);
    assert_eq!(model.steps, 4);
    assert!(report.final_error < report.initial_error);
}

#[test]
fn mandatory_epochs_always_run() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 7,
        epsilon: 1e9,
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    // Every epoch counts as a deterioration, so the first continuation
    // epoch ends the run.
    assert_eq!(report.outcome, TrainOutcome::Converged);
    assert_eq!(report.epochs, 8);
    assert_eq!(model.steps, 8 * 4);
}

#[test]
fn deterioration_tolerance_extends_the_continuation_phase() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 2,
        epsilon: 1e9,
        number_of_deteriorations: 3,
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    // The counter reaches 4 at epoch 4, which is already past the mandatory phase.
    assert_eq!(report.outcome, TrainOutcome::Converged);
    assert_eq!(report.epochs, 4);
}

#[test]
fn zero_budget_times_out_after_first_epoch() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 1000,
        max_execution_time: Some(Duration::ZERO),
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    assert_eq!(report.outcome, TrainOutcome::Timeout);
    assert!(report.outcome.is_early_stop());
    assert_eq!(report.epochs, 1);
}

#[test]
fn nan_error_stops_with_numeric_failure() {
    let data = diagonal();
    let mut model = Exploding { broken: false };
    let report = controller(TrainConfig {
        min_epochs: 100,
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    assert_eq!(report.outcome, TrainOutcome::NumericFailure);
    assert_eq!(report.epochs, 1);
    assert_relative_eq!(report.initial_error, 0.0);
    assert!(report.final_error.is_nan());
}

#[test]
fn empty_dataset_trains_nothing() {
    let data = Dataset::new(1, 1).unwrap();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig::default())
        .train(&mut model, &data, GradientPolicy::RowWise)
        .unwrap();

    assert_eq!(report.outcome, TrainOutcome::NoData);
    assert_eq!(report.epochs, 0);
    assert_eq!(model.steps, 0);
}

#[test]
fn epoch_cap_ends_the_mandatory_phase_early() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 100,
        max_epochs: Some(3),
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    assert_eq!(report.outcome, TrainOutcome::EpochLimit);
    assert_eq!(report.epochs, 3);
}

#[test]
fn zero_epoch_cap_is_rejected() {
    let err = TrainingController::new(TrainConfig {
        max_epochs: Some(0),
        ..TrainConfig::default()
    });
    assert!(err.is_err());
}

#[test]
fn shape_mismatch_is_an_error() {
    let data = Dataset::from_rows(&[vec![0.0, 1.0]], &[vec![1.0]]).unwrap();
    let mut model = Linear::new(0.1);
    let res = controller(TrainConfig::default()).train(&mut model, &data, GradientPolicy::RowWise);
    assert!(res.is_err());
    assert_eq!(model.steps, 0);
}

#[test]
fn batch_wise_steps_once_per_batch() {
    // Two batches keyed on column 1; column 0 varies inside each batch.
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.5, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 1.0],
    ];
    let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![x[0]]).collect();
    let data = Dataset::from_rows(&xs, &ys).unwrap();
    let batches = group_into_batches(&data, 0).unwrap();
    assert_eq!(batches.len(), 2);

    let mlp = MlpBuilder::regressor(2, &[3], Activation::Sigmoid, 1)
        .unwrap()
        .build_with_seed(3)
        .unwrap();
    let mut model = MlpRegressor::new(mlp, Optimizer::Sgd, 0.05).unwrap();
    let report = controller(TrainConfig {
        min_epochs: 4,
        max_epochs: Some(4),
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::BatchWise(&batches))
    .unwrap();

    assert_eq!(report.outcome, TrainOutcome::EpochLimit);
    assert_eq!(report.epochs, 4);
    assert!(report.final_error.is_finite());
}

#[test]
fn batch_wise_visits_every_row_each_epoch() {
    let xs: Vec<Vec<f64>> = (0..6_u32).map(|i| vec![f64::from(i % 3), 0.0]).collect();
    let ys: Vec<Vec<f64>> = (0..6_u32).map(|i| vec![f64::from(i)]).collect();
    let data = Dataset::from_rows(&xs, &ys).unwrap();
    let batches = group_into_batches(&data, 1).unwrap();
    assert_eq!(batches.len(), 3);

    struct Counting {
        steps: usize,
        rows: usize,
    }
    impl Predictor for Counting {
        fn input_dim(&self) -> usize {
            2
        }
        fn output_dim(&self) -> usize {
            1
        }
        fn predict_into(&mut self, _features: &[f64], out: &mut [f64]) {
            out[0] = 0.0;
        }
    }
    impl Trainable for Counting {
        fn zero_grad(&mut self) {}
        fn accumulate(&mut self, _features: &[f64], _targets: &[f64]) -> f64 {
            self.rows += 1;
            0.0
        }
        fn step(&mut self) {
            self.steps += 1;
        }
    }

    let mut model = Counting { steps: 0, rows: 0 };
    controller(TrainConfig {
        min_epochs: 2,
        max_epochs: Some(2),
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::BatchWise(&batches))
    .unwrap();

    assert_eq!(model.steps, 2 * 3);
    assert_eq!(model.rows, 2 * 6);
}

#[test]
fn progress_is_recorded_once_per_epoch() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 3,
        epsilon: 1e9,
        record_progress: true,
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();

    assert_eq!(report.epochs, 4);
    let epochs: Vec<usize> = report.progress.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![1, 2, 3, 4]);
    let last = report.progress.last().unwrap();
    assert_relative_eq!(last.mse, report.final_error);
    assert_eq!(last.r2.len(), 1);
}

#[test]
fn progress_is_not_recorded_by_default() {
    let data = diagonal();
    let mut model = Linear::new(0.1);
    let report = controller(TrainConfig {
        min_epochs: 2,
        ..TrainConfig::default()
    })
    .train(&mut model, &data, GradientPolicy::RowWise)
    .unwrap();
    assert!(report.progress.is_empty());
}

#[test]
fn seeded_shuffle_is_reproducible() {
    let xs: Vec<Vec<f64>> = (0..12_u32).map(|i| vec![f64::from(i) / 11.0]).collect();
    let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![x[0] * x[0]]).collect();
    let data = Dataset::from_rows(&xs, &ys).unwrap();

    let run = |shuffle: Shuffle| {
        let mlp = MlpBuilder::regressor(1, &[5], Activation::Sigmoid, 1)
            .unwrap()
            .build_with_seed(11)
            .unwrap();
        let mut model = MlpRegressor::new(mlp, Optimizer::Sgd, 0.2).unwrap();
        controller(TrainConfig {
            min_epochs: 5,
            max_epochs: Some(5),
            shuffle,
            ..TrainConfig::default()
        })
        .train(&mut model, &data, GradientPolicy::RowWise)
        .unwrap();
        model.predict(&[0.5])
    };

    assert_eq!(run(Shuffle::Seeded(9)), run(Shuffle::Seeded(9)));
    assert_eq!(run(Shuffle::None), run(Shuffle::None));
}

fn visit_order(data: &Dataset, policy: GradientPolicy<'_>, epochs: usize, shuffle: Shuffle) -> Vec<f64> {
    let mut model = Recording {
        inputs: data.input_dim(),
        seen: Vec::new(),
    };
    controller(TrainConfig {
        min_epochs: epochs,
        max_epochs: Some(epochs),
        shuffle,
        ..TrainConfig::default()
    })
    .train(&mut model, data, policy)
    .unwrap();
    model.seen
}

#[test]
fn shuffling_reorders_rows_within_each_epoch() {
    let xs: Vec<Vec<f64>> = (0..12_u32).map(|i| vec![f64::from(i)]).collect();
    let data = Dataset::from_rows(&xs, &xs).unwrap();
    let in_order: Vec<f64> = (0..12_u32).map(f64::from).collect();

    let plain = visit_order(&data, GradientPolicy::RowWise, 3, Shuffle::None);
    assert_eq!(plain, in_order.repeat(3));

    let shuffled = visit_order(&data, GradientPolicy::RowWise, 3, Shuffle::Seeded(4));
    assert_eq!(shuffled.len(), 36);
    assert_ne!(shuffled, plain);
    for epoch in shuffled.chunks(12) {
        let mut rows = epoch.to_vec();
        rows.sort_by(f64::total_cmp);
        assert_eq!(rows, in_order, "every row is visited once per epoch");
    }
    assert_eq!(
        shuffled,
        visit_order(&data, GradientPolicy::RowWise, 3, Shuffle::Seeded(4))
    );
}

#[test]
fn shuffling_reorders_batches() {
    // Three batches of two rows, keyed on column 0.
    let xs: Vec<Vec<f64>> = (0..6_u32).map(|i| vec![f64::from(i % 3), f64::from(i)]).collect();
    let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![x[1]]).collect();
    let data = Dataset::from_rows(&xs, &ys).unwrap();
    let batches = group_into_batches(&data, 1).unwrap();
    assert_eq!(batches.len(), 3);

    let batch_order = |shuffle: Shuffle| -> Vec<f64> {
        let seen = visit_order(&data, GradientPolicy::BatchWise(&batches), 20, shuffle);
        seen.chunks(2)
            .map(|pair| {
                assert_eq!(pair[0], pair[1], "rows of one batch are visited together");
                pair[0]
            })
            .collect()
    };

    let plain = batch_order(Shuffle::None);
    assert_eq!(plain, [0.0, 1.0, 2.0].repeat(20));

    let shuffled = batch_order(Shuffle::Seeded(4));
    assert_ne!(shuffled, plain);
    for epoch in shuffled.chunks(3) {
        let mut keys = epoch.to_vec();
        keys.sort_by(f64::total_cmp);
        assert_eq!(keys, vec![0.0, 1.0, 2.0]);
    }
}
