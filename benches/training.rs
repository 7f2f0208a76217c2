use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use mlp_regress::{
    Activation, Dataset, GradientPolicy, MlpBuilder, MlpRegressor, Optimizer, TrainConfig,
    TrainingController, analyzer, normalize,
};

fn sine_data(rows: usize) -> Dataset {
    let xs: Vec<Vec<f64>> = (0..rows)
        .map(|i| {
            let t = i as f64 / rows as f64;
            vec![t, (3.0 * t).cos()]
        })
        .collect();
    let ys: Vec<Vec<f64>> = xs.iter().map(|x| vec![(6.0 * x[0]).sin() + x[1]]).collect();
    let mut data = Dataset::from_rows(&xs, &ys).expect("valid rows");
    let ranges = normalize::compute_range(&data).expect("non-empty");
    normalize::normalize_dataset(&mut data, &ranges, 0.0, 1.0);
    data
}

fn regressor() -> MlpRegressor {
    let mlp = MlpBuilder::regressor(2, &[30, 30], Activation::Sigmoid, 1)
        .expect("valid topology")
        .build_with_seed(0)
        .expect("valid topology");
    MlpRegressor::new(mlp, Optimizer::Sgd, 0.01).expect("valid learning rate")
}

fn training_epoch_bench(c: &mut Criterion) {
    let data = sine_data(1024);
    let controller = TrainingController::new(TrainConfig {
        min_epochs: 1,
        max_epochs: Some(1),
        show_progress: false,
        ..TrainConfig::default()
    })
    .expect("valid config");

    c.bench_function("train_one_epoch_1024x2_30_30_1", |b| {
        b.iter_batched(
            regressor,
            |mut model| {
                let report = controller
                    .train(&mut model, black_box(&data), GradientPolicy::RowWise)
                    .expect("shapes match");
                black_box(report.final_error)
            },
            BatchSize::SmallInput,
        )
    });
}

fn analyzer_bench(c: &mut Criterion) {
    let data = sine_data(1024);
    let mut model = regressor();

    c.bench_function("mse_1024", |b| {
        b.iter(|| black_box(analyzer::mse(&mut model, black_box(&data))))
    });
    c.bench_function("r2_stable_1024", |b| {
        b.iter(|| black_box(analyzer::r2_stable(&mut model, black_box(&data))))
    });
}

criterion_group!(benches, training_epoch_bench, analyzer_bench);
criterion_main!(benches);
