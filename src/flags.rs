//! Command-line flags and the configuration record built from them.

use std::path::PathBuf;

use clap::Parser;

/// Train a random forest on MNIST and print its evaluation metrics.
#[derive(Parser, Debug, Clone)]
#[command(name = "canopy")]
#[command(about = "Train and evaluate a random forest on MNIST")]
#[command(version)]
pub struct Flags {
    /// Base directory for output models (empty: a fresh temporary directory)
    #[arg(long = "model_dir", default_value = "")]
    pub model_dir: String,

    /// Directory for storing data
    #[arg(long = "data_dir", default_value = "/tmp/data/")]
    pub data_dir: PathBuf,

    /// Number of training steps (accepted but not used by training)
    #[arg(long = "train_steps", default_value_t = 1000)]
    pub train_steps: u64,

    /// Number of examples in a training batch
    #[arg(long = "batch_size", default_value_t = 1000)]
    pub batch_size: usize,

    /// Number of trees in the forest
    #[arg(long = "num_trees", default_value_t = 100)]
    pub num_trees: usize,

    /// Max total nodes in a single tree
    #[arg(long = "max_nodes", default_value_t = 1000)]
    pub max_nodes: usize,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    pub quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

impl Flags {
    /// Log filter directive selected by `--verbose` / `--quiet`.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (true, _) => "debug",
            (_, true) => "error",
            _ => "info",
        }
    }
}

/// Run configuration, copied field for field from the parsed [`Flags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainConfig {
    /// Output directory; empty selects a temporary one.
    pub model_dir: String,
    /// Dataset cache directory.
    pub data_dir: PathBuf,
    /// Inert; recorded but never passed to training.
    pub train_steps: u64,
    /// Batch size for both training and evaluation.
    pub batch_size: usize,
    /// Trees in the forest.
    pub num_trees: usize,
    /// Node budget per tree.
    pub max_nodes: usize,
    /// Forest seed.
    pub seed: u64,
}

impl From<Flags> for TrainConfig {
    fn from(flags: Flags) -> Self {
        Self {
            model_dir: flags.model_dir,
            data_dir: flags.data_dir,
            train_steps: flags.train_steps,
            batch_size: flags.batch_size,
            num_trees: flags.num_trees,
            max_nodes: flags.max_nodes,
            seed: flags.seed,
        }
    }
}
