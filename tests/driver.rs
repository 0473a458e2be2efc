//! Driver tests with stub collaborators, plus one small end-to-end run.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::anyhow;
use clap::Parser;
use tempfile::TempDir;

use canopy::{
    DataSource, EstimatorBuilder, Flags, NUM_FEATURES, TensorForestBuilder, TrainConfig,
    train_and_eval,
};
use canopy_forest::{
    Estimator, EvalResults, ForestError, MetricSpec, MetricValue, Monitor, TensorForestParams,
};
use canopy_mnist::{DataSet, Datasets};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Calls {
    /// `(num_classes, num_features, num_trees, max_nodes, model_dir)` per build.
    builds: Vec<(usize, usize, usize, usize, PathBuf)>,
    /// `(n_samples, batch_size, n_monitors)` per fit.
    fits: Vec<(usize, usize, usize)>,
    /// `(n_samples, batch_size)` per evaluate.
    evals: Vec<(usize, usize)>,
}

type Shared = Rc<RefCell<Calls>>;

fn split(n: usize, width: usize) -> DataSet {
    let images = (0..n)
        .map(|i| {
            let mut row = vec![0.0; width];
            row[(i % 10) * (width / 10)] = 1.0;
            row
        })
        .collect();
    let labels = (0..n).map(|i| i % 10).collect();
    DataSet::new(images, labels).unwrap()
}

struct StubSource {
    width: usize,
}

impl DataSource for StubSource {
    fn read_data_sets(&self, _data_dir: &Path) -> anyhow::Result<Datasets> {
        Ok(Datasets {
            train: split(60, self.width),
            validation: split(10, self.width),
            test: split(30, self.width),
        })
    }
}

struct FailingSource;

impl DataSource for FailingSource {
    fn read_data_sets(&self, _data_dir: &Path) -> anyhow::Result<Datasets> {
        Err(anyhow!("network unreachable"))
    }
}

struct StubBuilder {
    calls: Shared,
}

impl EstimatorBuilder for StubBuilder {
    type Estimator = StubEstimator;

    fn build(&self, params: TensorForestParams, model_dir: &Path) -> StubEstimator {
        self.calls.borrow_mut().builds.push((
            params.num_classes(),
            params.num_features(),
            params.num_trees(),
            params.max_nodes(),
            model_dir.to_path_buf(),
        ));
        StubEstimator {
            calls: Rc::clone(&self.calls),
        }
    }
}

struct StubEstimator {
    calls: Shared,
}

impl Estimator for StubEstimator {
    fn fit(
        &mut self,
        x: &[Vec<f32>],
        _y: &[usize],
        batch_size: usize,
        monitors: &mut [Box<dyn Monitor>],
    ) -> Result<(), ForestError> {
        self.calls
            .borrow_mut()
            .fits
            .push((x.len(), batch_size, monitors.len()));
        Ok(())
    }

    fn evaluate(
        &mut self,
        x: &[Vec<f32>],
        _y: &[usize],
        batch_size: usize,
        metrics: &std::collections::BTreeMap<String, MetricSpec>,
    ) -> Result<EvalResults, ForestError> {
        self.calls.borrow_mut().evals.push((x.len(), batch_size));
        let mut results = EvalResults::new();
        results.insert("loss".to_string(), MetricValue::Float(0.5));
        results.insert("global_step".to_string(), MetricValue::Step(7));
        for name in metrics.keys() {
            results.insert(name.clone(), MetricValue::Float(0.875));
        }
        Ok(results)
    }
}

fn config(args: &[&str]) -> TrainConfig {
    let argv = std::iter::once("canopy").chain(args.iter().copied());
    TrainConfig::from(Flags::try_parse_from(argv).unwrap())
}

fn run_stub(config: &TrainConfig) -> (anyhow::Result<EvalResults>, String, Calls) {
    let calls = Shared::default();
    let builder = StubBuilder {
        calls: Rc::clone(&calls),
    };
    let mut out = Vec::new();
    let result = train_and_eval(config, &StubSource { width: 20 }, &builder, &mut out);
    let calls = calls.take();
    (result, String::from_utf8(out).unwrap(), calls)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn one_build_and_one_evaluate_with_flag_values() {
    let dir = TempDir::new().unwrap();
    let model_dir = dir.path().to_str().unwrap();
    let config = config(&[
        "--num_trees=5",
        "--max_nodes=50",
        "--batch_size=32",
        "--model_dir",
        model_dir,
    ]);

    let (result, _, calls) = run_stub(&config);
    result.unwrap();

    assert_eq!(
        calls.builds,
        vec![(10, NUM_FEATURES, 5, 50, dir.path().to_path_buf())]
    );
    assert_eq!(calls.fits, vec![(60, 32, 1)]);
    assert_eq!(calls.evals, vec![(30, 32)]);
}

#[test]
fn output_is_model_dir_then_sorted_metrics() {
    let dir = TempDir::new().unwrap();
    let model_dir = dir.path().to_str().unwrap();
    let (result, out, _) = run_stub(&config(&["--model_dir", model_dir]));
    result.unwrap();

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            format!("model directory = {model_dir}").as_str(),
            "accuracy: 0.875",
            "global_step: 7",
            "loss: 0.5",
        ]
    );
}

#[test]
fn empty_model_dir_gets_a_fresh_directory() {
    let (result, out, calls) = run_stub(&config(&[]));
    result.unwrap();

    let made = &calls.builds[0].4;
    assert!(made.is_dir());
    let first_line = out.lines().next().unwrap();
    assert_eq!(first_line, format!("model directory = {}", made.display()));
    std::fs::remove_dir(made).unwrap();
}

#[test]
fn invalid_hparams_fail_before_building() {
    let dir = TempDir::new().unwrap();
    let model_dir = dir.path().to_str().unwrap();
    let (result, _, calls) = run_stub(&config(&["--num_trees=0", "--model_dir", model_dir]));

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("invalid forest hyperparameters"));
    assert!(calls.builds.is_empty());
    assert!(calls.evals.is_empty());
}

#[test]
fn data_source_failure_propagates() {
    let dir = TempDir::new().unwrap();
    let config = config(&["--model_dir", dir.path().to_str().unwrap()]);
    let calls = Shared::default();
    let builder = StubBuilder {
        calls: Rc::clone(&calls),
    };

    let err = train_and_eval(&config, &FailingSource, &builder, &mut Vec::new()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("failed to load MNIST"), "{message}");
    assert!(message.contains("network unreachable"), "{message}");
    assert!(calls.borrow().fits.is_empty());
}

#[test]
fn end_to_end_with_real_forest() {
    let dir = TempDir::new().unwrap();
    let model_dir = dir.path().to_str().unwrap();
    let config = config(&[
        "--num_trees=3",
        "--max_nodes=50",
        "--batch_size=32",
        "--model_dir",
        model_dir,
    ]);

    let mut out = Vec::new();
    let results = train_and_eval(
        &config,
        &StubSource {
            width: NUM_FEATURES,
        },
        &TensorForestBuilder,
        &mut out,
    )
    .unwrap();

    let keys: Vec<&str> = results.keys().map(String::as_str).collect();
    assert_eq!(keys, ["accuracy", "global_step", "loss"]);
    assert!(matches!(results["global_step"], MetricValue::Step(step) if step > 0));
    assert!(dir.path().join("forest.ckpt").exists());
    assert!(dir.path().join("eval").join("results.json").exists());

    let out = String::from_utf8(out).unwrap();
    assert_eq!(out.lines().count(), 4);
}
