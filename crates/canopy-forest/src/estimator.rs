//! The high-level `fit` / `evaluate` estimator surface.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::checkpoint::{CHECKPOINT_FILE, Checkpoint};
use crate::error::ForestError;
use crate::forest::{ForestGrower, RandomForest};
use crate::hparams::TensorForestParams;
use crate::metrics::{
    EvalResults, MetricSpec, MetricValue, PredictionKey, Predictions, classification_log_loss,
};
use crate::monitor::{Monitor, MonitorAction};

/// Directory under the model directory that receives evaluation artifacts.
pub const EVAL_DIR: &str = "eval";

/// File name of the evaluation artifact inside [`EVAL_DIR`].
pub const EVAL_RESULTS_FILE: &str = "results.json";

/// Steps between training progress log lines.
const LOG_EVERY_STEPS: u64 = 100;

/// A trainable model with a fit/evaluate surface.
pub trait Estimator {
    /// Train on `x`/`y`, drawing `batch_size` samples per step and reporting
    /// every step to `monitors`.
    ///
    /// # Errors
    ///
    /// Implementation-specific; see the implementor.
    fn fit(
        &mut self,
        x: &[Vec<f32>],
        y: &[usize],
        batch_size: usize,
        monitors: &mut [Box<dyn Monitor>],
    ) -> Result<(), ForestError>;

    /// Evaluate on `x`/`y` in chunks of `batch_size` and compute `metrics`.
    ///
    /// # Errors
    ///
    /// Implementation-specific; see the implementor.
    fn evaluate(
        &mut self,
        x: &[Vec<f32>],
        y: &[usize],
        batch_size: usize,
        metrics: &BTreeMap<String, MetricSpec>,
    ) -> Result<EvalResults, ForestError>;
}

/// Online random forest estimator that checkpoints into a model directory.
///
/// Training resumes from `<model_dir>/forest.ckpt` when that checkpoint
/// exists, and evaluation reads it when nothing was trained in this process.
#[derive(Debug)]
pub struct TensorForestEstimator {
    params: TensorForestParams,
    model_dir: PathBuf,
    state: Option<Checkpoint>,
}

impl TensorForestEstimator {
    /// Create an estimator; nothing is read or written until `fit`/`evaluate`.
    pub fn new(params: TensorForestParams, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            params,
            model_dir: model_dir.into(),
            state: None,
        }
    }

    /// Return the hyperparameters.
    #[must_use]
    pub fn params(&self) -> &TensorForestParams {
        &self.params
    }

    /// Return the model directory.
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Return the checkpoint location inside the model directory.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.model_dir.join(CHECKPOINT_FILE)
    }

    /// Return the forest held in memory, if any.
    #[must_use]
    pub fn forest(&self) -> Option<&RandomForest> {
        self.state.as_ref().map(|c| &c.forest)
    }

    /// Return the number of training steps taken so far (0 before any training).
    #[must_use]
    pub fn global_step(&self) -> u64 {
        self.state.as_ref().map_or(0, |c| c.global_step)
    }

    /// Read the checkpoint if one exists and matches this estimator's shape:
    /// class, feature and tree counts and the per-tree node budget.
    fn restore(&self) -> Result<Option<Checkpoint>, ForestError> {
        let path = self.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }
        let checkpoint = Checkpoint::load(&path)?;
        let stored = &checkpoint.params;
        let shape = [
            ("num_classes", self.params.num_classes, stored.num_classes),
            ("num_features", self.params.num_features, stored.num_features),
            ("num_trees", self.params.num_trees, stored.num_trees),
            ("max_nodes", self.params.max_nodes, stored.max_nodes),
        ];
        if let Some(&(field, expected, found)) = shape.iter().find(|(_, e, f)| e != f) {
            return Err(ForestError::IncompatibleCheckpoint {
                path,
                field,
                expected,
                found,
            });
        }
        info!(global_step = checkpoint.global_step, "restored checkpoint");
        Ok(Some(checkpoint))
    }

    fn loaded(&mut self) -> Result<&Checkpoint, ForestError> {
        let checkpoint = match self.state.take() {
            Some(checkpoint) => checkpoint,
            None => self.restore()?.ok_or_else(|| ForestError::NotFitted {
                path: self.checkpoint_path(),
            })?,
        };
        Ok(self.state.insert(checkpoint))
    }

    fn write_results(&self, results: &EvalResults) -> Result<PathBuf, ForestError> {
        let dir = self.model_dir.join(EVAL_DIR);
        fs::create_dir_all(&dir).map_err(|e| ForestError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        let path = dir.join(EVAL_RESULTS_FILE);
        let json = serde_json::to_string_pretty(results)
            .map_err(|e| ForestError::SerializeResults { source: e })?;
        fs::write(&path, json).map_err(|e| ForestError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        debug!(path = %path.display(), "evaluation results written");
        Ok(path)
    }
}

/// Check shapes, finiteness, and label range of a labelled data set.
fn validate_inputs(
    x: &[Vec<f32>],
    y: &[usize],
    params: &TensorForestParams,
) -> Result<(), ForestError> {
    if x.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    if x.len() != y.len() {
        return Err(ForestError::LabelCountMismatch {
            n_features: x.len(),
            n_labels: y.len(),
        });
    }
    for (sample_index, row) in x.iter().enumerate() {
        if row.len() != params.num_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: params.num_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ForestError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    if let Some((sample_index, &label)) = y
        .iter()
        .enumerate()
        .find(|&(_, &label)| label >= params.num_classes)
    {
        return Err(ForestError::LabelOutOfRange {
            label,
            sample_index,
            num_classes: params.num_classes,
        });
    }
    Ok(())
}

/// Endless sequence of batches over a reshuffled-every-epoch sample order.
struct BatchCursor {
    order: Vec<usize>,
    position: usize,
    rng: ChaCha8Rng,
}

impl BatchCursor {
    fn new(n_samples: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut rng);
        Self {
            order,
            position: 0,
            rng,
        }
    }

    fn next_batch(&mut self, batch_size: usize) -> Vec<usize> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            if self.position == self.order.len() {
                self.order.shuffle(&mut self.rng);
                self.position = 0;
            }
            let take = (batch_size - batch.len()).min(self.order.len() - self.position);
            batch.extend_from_slice(&self.order[self.position..self.position + take]);
            self.position += take;
        }
        batch
    }
}

impl Estimator for TensorForestEstimator {
    /// Grow the forest batch by batch until a monitor asks to stop or no
    /// tree can grow any further, then checkpoint it.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::InvalidBatchSize`] | `batch_size` is zero |
    /// | [`ForestError::EmptyDataset`] | `x` is empty |
    /// | [`ForestError::LabelCountMismatch`] | `x` and `y` differ in length |
    /// | [`ForestError::FeatureCountMismatch`] | a row is not `num_features` wide |
    /// | [`ForestError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`ForestError::LabelOutOfRange`] | a label is `>= num_classes` |
    /// | [`ForestError::IncompatibleCheckpoint`] | checkpoint differs in classes, features, trees or `max_nodes` |
    /// | checkpoint I/O variants | reading or writing `forest.ckpt` failed |
    #[instrument(skip_all, fields(n_samples = x.len(), batch_size = batch_size))]
    fn fit(
        &mut self,
        x: &[Vec<f32>],
        y: &[usize],
        batch_size: usize,
        monitors: &mut [Box<dyn Monitor>],
    ) -> Result<(), ForestError> {
        if batch_size == 0 {
            return Err(ForestError::InvalidBatchSize { batch_size });
        }
        validate_inputs(x, y, &self.params)?;

        let start = match self.state.take() {
            Some(checkpoint) => checkpoint,
            None => match self.restore()? {
                Some(checkpoint) => checkpoint,
                None => Checkpoint {
                    global_step: 0,
                    params: self.params.clone(),
                    forest: RandomForest::stumps(&self.params),
                },
            },
        };

        let mut step = start.global_step;
        let mut grower = ForestGrower::new(start.forest, &self.params, step);
        let mut cursor = BatchCursor::new(x.len(), self.params.seed ^ step);

        info!(
            num_trees = self.params.num_trees,
            max_nodes = self.params.max_nodes,
            split_after_samples = self.params.split_after_samples,
            num_splits_to_consider = self.params.num_splits_to_consider,
            start_step = step,
            "training forest"
        );

        loop {
            if !grower.is_growing() {
                info!(step, "no tree can grow further");
                break;
            }

            let batch = cursor.next_batch(batch_size);
            grower.grow_batch(x, y, &batch, &self.params);
            step += 1;

            let loss = -grower.average_size();
            let mut stop = false;
            for monitor in monitors.iter_mut() {
                if monitor.after_step(step, loss) == MonitorAction::Stop {
                    stop = true;
                }
            }
            if step % LOG_EVERY_STEPS == 0 {
                info!(step, loss, "training progress");
            }
            if stop {
                info!(step, loss, "monitor requested stop");
                break;
            }
        }

        let checkpoint = Checkpoint {
            global_step: step,
            params: self.params.clone(),
            forest: grower.finish(),
        };
        fs::create_dir_all(&self.model_dir).map_err(|e| ForestError::CreateDir {
            path: self.model_dir.clone(),
            source: e,
        })?;
        checkpoint.save(self.checkpoint_path())?;

        info!(
            global_step = step,
            average_size = checkpoint.forest.average_size(),
            "forest training complete"
        );
        self.state = Some(checkpoint);
        Ok(())
    }

    /// Predict `x` in chunks, compute each metric plus `loss` (mean log loss)
    /// and `global_step`, and write them to `<model_dir>/eval/results.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::InvalidBatchSize`] | `batch_size` is zero |
    /// | [`ForestError::NotFitted`] | nothing trained and no checkpoint |
    /// | [`ForestError::IncompatibleCheckpoint`] | stored forest has another shape |
    /// | validation variants | as for `fit` |
    /// | metric variants | a metric rejected its input |
    /// | I/O variants | writing the results failed |
    #[instrument(skip_all, fields(n_samples = x.len(), batch_size = batch_size))]
    fn evaluate(
        &mut self,
        x: &[Vec<f32>],
        y: &[usize],
        batch_size: usize,
        metrics: &BTreeMap<String, MetricSpec>,
    ) -> Result<EvalResults, ForestError> {
        if batch_size == 0 {
            return Err(ForestError::InvalidBatchSize { batch_size });
        }
        validate_inputs(x, y, &self.params)?;

        let checkpoint = self.loaded()?;
        let global_step = checkpoint.global_step;

        let mut distributions = Vec::with_capacity(x.len());
        for chunk in x.chunks(batch_size) {
            distributions.extend(checkpoint.forest.predict_proba_batch(chunk)?);
        }
        let predictions = Predictions::from_distributions(distributions);

        let mut results = EvalResults::new();
        for (name, spec) in metrics {
            let value = spec.evaluate(&predictions, y)?;
            debug!(metric = %name, value, "metric computed");
            results.insert(name.clone(), MetricValue::Float(value));
        }
        let loss =
            classification_log_loss(predictions.column(PredictionKey::Probabilities), y)?;
        results.insert("loss".to_string(), MetricValue::Float(loss));
        results.insert("global_step".to_string(), MetricValue::Step(global_step));

        self.write_results(&results)?;
        info!(n_metrics = results.len(), global_step, "evaluation complete");
        Ok(results)
    }
}
