//! Online random forest classification: grow, checkpoint, evaluate.
//!
//! Trees grow batch by batch from fertile leaves that split once they have
//! seen enough samples, in parallel via rayon. An [`Estimator`] wraps the
//! forest with a fit/evaluate surface, early-stopping monitors, bincode
//! checkpoints, and a named metric registry.

mod checkpoint;
mod error;
mod estimator;
mod forest;
mod hparams;
mod metrics;
mod monitor;
mod node;
mod predict;
mod split;
mod tree;

pub use checkpoint::{CHECKPOINT_FILE, Checkpoint};
pub use error::ForestError;
pub use estimator::{EVAL_DIR, EVAL_RESULTS_FILE, Estimator, TensorForestEstimator};
pub use forest::RandomForest;
pub use hparams::{ForestHParams, TensorForestParams};
pub use metrics::{
    EvalResults, MetricFn, MetricInput, MetricSpec, MetricValue, PredictionKey, Predictions,
    accuracy, classification_log_loss, get_metric, precision, recall, top_5,
};
pub use monitor::{DEFAULT_LOSS_THRESHOLD, Monitor, MonitorAction, TensorForestLossHook};
pub use node::{FeatureIndex, Node, NodeIndex};
pub use predict::ClassDistribution;
pub use tree::DecisionTree;
