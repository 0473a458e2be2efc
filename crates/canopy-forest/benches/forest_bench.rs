//! Criterion benchmarks for canopy-forest: online growth and batch prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

use canopy_forest::{
    Estimator, ForestHParams, Monitor, TensorForestEstimator, TensorForestLossHook,
    TensorForestParams,
};

fn make_classification(
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    seed: u64,
) -> (Vec<Vec<f32>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f32> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f32 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f32>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

fn params(num_trees: usize) -> TensorForestParams {
    ForestHParams::new(5, 20)
        .with_num_trees(num_trees)
        .with_max_nodes(200)
        .with_split_after_samples(25)
        .with_seed(42)
        .fill()
        .unwrap()
}

fn fit_fresh(num_trees: usize, features: &[Vec<f32>], labels: &[usize]) -> TensorForestEstimator {
    let dir = TempDir::new().unwrap();
    let mut estimator = TensorForestEstimator::new(params(num_trees), dir.path());
    let mut monitors: Vec<Box<dyn Monitor>> = vec![Box::new(TensorForestLossHook::new(10))];
    estimator.fit(features, labels, 100, &mut monitors).unwrap();
    estimator
}

fn bench_forest_fit(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 5, 42);

    c.bench_function("forest_fit_500x20_5class_50trees", |b| {
        b.iter(|| fit_fresh(50, &features, &labels));
    });
}

fn bench_forest_predict_batch(c: &mut Criterion) {
    let (features, labels) = make_classification(500, 20, 5, 42);
    let estimator = fit_fresh(50, &features, &labels);
    let forest = estimator.forest().unwrap();

    c.bench_function("forest_predict_batch_500x20_50trees", |b| {
        b.iter(|| forest.predict_proba_batch(&features).unwrap());
    });
}

fn bench_single_tree_growth(c: &mut Criterion) {
    // Proxy for split-finding: grow a single-tree forest on 500 samples.
    let (features, labels) = make_classification(500, 20, 5, 42);

    c.bench_function("forest_single_tree_500x20_5class", |b| {
        b.iter(|| fit_fresh(1, &features, &labels));
    });
}

criterion_group!(
    benches,
    bench_forest_fit,
    bench_forest_predict_batch,
    bench_single_tree_growth
);
criterion_main!(benches);
