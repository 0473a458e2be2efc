use std::path::PathBuf;

/// Errors from forest hyperparameters, training, evaluation, and checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when num_classes is zero.
    #[error("num_classes must be at least 1, got {num_classes}")]
    InvalidClassCount {
        /// The invalid num_classes value provided.
        num_classes: usize,
    },

    /// Returned when num_features is zero.
    #[error("num_features must be at least 1, got {num_features}")]
    InvalidFeatureCount {
        /// The invalid num_features value provided.
        num_features: usize,
    },

    /// Returned when num_trees is zero.
    #[error("num_trees must be at least 1, got {num_trees}")]
    InvalidTreeCount {
        /// The invalid num_trees value provided.
        num_trees: usize,
    },

    /// Returned when max_nodes is zero.
    #[error("max_nodes must be at least 1, got {max_nodes}")]
    InvalidMaxNodes {
        /// The invalid max_nodes value provided.
        max_nodes: usize,
    },

    /// Returned when split_after_samples is zero.
    #[error("split_after_samples must be at least 1, got {split_after_samples}")]
    InvalidSplitAfterSamples {
        /// The invalid split_after_samples value provided.
        split_after_samples: usize,
    },

    /// Returned when bagging_fraction is not in (0.0, 1.0].
    #[error("bagging_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBaggingFraction {
        /// The invalid bagging_fraction value provided.
        fraction: f64,
    },

    /// Returned when batch_size is zero.
    #[error("batch_size must be at least 1, got {batch_size}")]
    InvalidBatchSize {
        /// The invalid batch_size value provided.
        batch_size: usize,
    },

    /// Returned when the input has zero samples.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when features and labels have different lengths.
    #[error("got {n_features} feature rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_features: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when a sample has a different number of features than the forest expects.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a label is outside `0..num_classes`.
    #[error("label {label} at sample {sample_index} is out of range for {num_classes} classes")]
    LabelOutOfRange {
        /// The offending label.
        label: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The configured number of classes.
        num_classes: usize,
    },

    /// Returned when `get_metric` is asked for a name it does not know.
    #[error("unknown metric \"{name}\"")]
    UnknownMetric {
        /// The requested metric name.
        name: String,
    },

    /// Returned when a metric is handed a prediction column it cannot use.
    #[error("metric requires {expected} predictions")]
    MetricInput {
        /// The prediction column the metric needs.
        expected: &'static str,
    },

    /// Returned when evaluating before any model has been trained or checkpointed.
    #[error("no trained model in memory and no checkpoint at {path}")]
    NotFitted {
        /// Checkpoint path that was checked.
        path: PathBuf,
    },

    /// Returned when a checkpoint's forest shape differs from the estimator's.
    #[error("checkpoint {path} has {field} = {found}, expected {expected}")]
    IncompatibleCheckpoint {
        /// Path to the checkpoint.
        path: PathBuf,
        /// Hyperparameter that differs.
        field: &'static str,
        /// Value the estimator was built with.
        expected: usize,
        /// Value stored in the checkpoint.
        found: usize,
    },

    /// Returned when the model directory cannot be created.
    #[error("cannot create model directory {path}")]
    CreateDir {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when checkpoint serialization fails.
    #[error("failed to serialize checkpoint")]
    SerializeCheckpoint {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when checkpoint deserialization fails.
    #[error("failed to deserialize checkpoint from {path}")]
    DeserializeCheckpoint {
        /// Path to the checkpoint that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when a checkpoint has an incompatible format version.
    #[error("incompatible checkpoint version in {path}: expected {expected}, found {found}")]
    IncompatibleCheckpointVersion {
        /// The format version this build expects.
        expected: u32,
        /// The format version found in the file.
        found: u32,
        /// Path to the checkpoint.
        path: PathBuf,
    },

    /// Returned when serializing evaluation results to JSON fails.
    #[error("failed to serialize evaluation results")]
    SerializeResults {
        /// The underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a file under the model directory cannot be written.
    #[error("failed to write {path}")]
    WriteFile {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a file under the model directory cannot be read.
    #[error("failed to read {path}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
