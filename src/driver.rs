//! Configuration to estimator to fit to evaluate to printed metrics.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use canopy_forest::{
    Estimator, EvalResults, ForestHParams, MetricSpec, Monitor, PredictionKey,
    TensorForestEstimator, TensorForestLossHook, TensorForestParams, get_metric,
};
use canopy_mnist::{Datasets, ReadOptions, read_data_sets};

use crate::flags::TrainConfig;

/// Digit classes.
pub const NUM_CLASSES: usize = 10;

/// Pixels per 28x28 image.
pub const NUM_FEATURES: usize = 784;

/// Steps without loss improvement before training stops.
pub const EARLY_STOPPING_ROUNDS: u64 = 100;

/// Supplies the train/validation/test splits.
pub trait DataSource {
    /// Load every split from (or into) `data_dir`.
    ///
    /// # Errors
    ///
    /// Whatever the loader reports.
    fn read_data_sets(&self, data_dir: &Path) -> Result<Datasets>;
}

/// The real MNIST loader.
#[derive(Debug, Clone, Default)]
pub struct MnistSource {
    options: ReadOptions,
}

impl MnistSource {
    /// Load with the given options.
    #[must_use]
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }
}

impl DataSource for MnistSource {
    fn read_data_sets(&self, data_dir: &Path) -> Result<Datasets> {
        Ok(read_data_sets(data_dir, &self.options)?)
    }
}

/// Constructs the estimator from filled hyperparameters and a model directory.
pub trait EstimatorBuilder {
    /// Estimator produced by this builder.
    type Estimator: Estimator;

    /// Build one estimator.
    fn build(&self, params: TensorForestParams, model_dir: &Path) -> Self::Estimator;
}

/// Builds a [`TensorForestEstimator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TensorForestBuilder;

impl EstimatorBuilder for TensorForestBuilder {
    type Estimator = TensorForestEstimator;

    fn build(&self, params: TensorForestParams, model_dir: &Path) -> TensorForestEstimator {
        TensorForestEstimator::new(params, model_dir)
    }
}

/// Use `model_dir` as given, or create a fresh temporary directory when it is empty.
///
/// The temporary directory is kept after the process exits.
///
/// # Errors
///
/// Fails when the temporary directory cannot be created.
pub fn resolve_model_dir(model_dir: &str) -> Result<PathBuf> {
    if !model_dir.is_empty() {
        return Ok(PathBuf::from(model_dir));
    }
    let dir = tempfile::Builder::new()
        .prefix("canopy-")
        .tempdir()
        .context("failed to create temporary model directory")?;
    Ok(dir.keep())
}

/// Forest hyperparameters for MNIST: 10 classes and 784 features, with the
/// tree count and node budget taken from `config`.
#[must_use]
pub fn forest_hparams(config: &TrainConfig) -> ForestHParams {
    ForestHParams::new(NUM_CLASSES, NUM_FEATURES)
        .with_num_trees(config.num_trees)
        .with_max_nodes(config.max_nodes)
        .with_seed(config.seed)
}

fn eval_metrics() -> Result<BTreeMap<String, MetricSpec>> {
    let accuracy = get_metric("accuracy")?;
    Ok(BTreeMap::from([(
        "accuracy".to_string(),
        MetricSpec::new(accuracy, PredictionKey::Probabilities),
    )]))
}

/// Train on the training split, evaluate on the test split, and print the
/// model directory followed by one `key: value` line per result in key order.
///
/// # Errors
///
/// Any failure from directory creation, hyperparameter validation, data
/// loading, training, evaluation, or writing to `out`.
#[instrument(skip_all, fields(num_trees = config.num_trees, max_nodes = config.max_nodes))]
pub fn train_and_eval<S, B, W>(
    config: &TrainConfig,
    source: &S,
    builder: &B,
    out: &mut W,
) -> Result<EvalResults>
where
    S: DataSource,
    B: EstimatorBuilder,
    W: Write,
{
    let model_dir = resolve_model_dir(&config.model_dir)?;
    writeln!(out, "model directory = {}", model_dir.display())?;

    let params = forest_hparams(config)
        .fill()
        .context("invalid forest hyperparameters")?;
    let mut estimator = builder.build(params, &model_dir);

    let mut monitors: Vec<Box<dyn Monitor>> =
        vec![Box::new(TensorForestLossHook::new(EARLY_STOPPING_ROUNDS))];

    let data = source
        .read_data_sets(&config.data_dir)
        .with_context(|| format!("failed to load MNIST from {}", config.data_dir.display()))?;
    info!(
        n_train = data.train.num_examples(),
        n_test = data.test.num_examples(),
        "dataset loaded"
    );

    debug!(train_steps = config.train_steps, "train_steps is not passed to fit");
    estimator
        .fit(
            data.train.images(),
            data.train.labels(),
            config.batch_size,
            &mut monitors,
        )
        .context("training failed")?;

    let results = estimator
        .evaluate(
            data.test.images(),
            data.test.labels(),
            config.batch_size,
            &eval_metrics()?,
        )
        .context("evaluation failed")?;

    for (key, value) in &results {
        writeln!(out, "{key}: {value}")?;
    }
    Ok(results)
}
