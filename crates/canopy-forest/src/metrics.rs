//! Evaluation metrics and the name-based metric registry.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ForestError;
use crate::predict::{ClassDistribution, argmax, top_k};

/// Probabilities are clipped into `[EPS, 1 - EPS]` before taking logs.
const LOG_LOSS_EPS: f64 = 1e-15;

/// Which prediction column a metric is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionKey {
    /// Per-class probability rows.
    Probabilities,
    /// Predicted class ids.
    Classes,
}

/// Borrowed view of one prediction column.
#[derive(Debug, Clone, Copy)]
pub enum MetricInput<'a> {
    /// Per-class probability rows.
    Probabilities(&'a [Vec<f64>]),
    /// Predicted class ids.
    Classes(&'a [usize]),
}

/// Signature shared by every registered metric.
pub type MetricFn = fn(MetricInput<'_>, &[usize]) -> Result<f64, ForestError>;

/// Model outputs for an evaluation set.
#[derive(Debug, Clone, Default)]
pub struct Predictions {
    probabilities: Vec<Vec<f64>>,
    classes: Vec<usize>,
}

impl Predictions {
    /// Build both prediction columns from per-sample distributions.
    #[must_use]
    pub fn from_distributions(distributions: Vec<ClassDistribution>) -> Self {
        let classes = distributions
            .iter()
            .map(ClassDistribution::predicted_class)
            .collect();
        let probabilities = distributions
            .into_iter()
            .map(ClassDistribution::into_vec)
            .collect();
        Self {
            probabilities,
            classes,
        }
    }

    /// Select one column.
    #[must_use]
    pub fn column(&self, key: PredictionKey) -> MetricInput<'_> {
        match key {
            PredictionKey::Probabilities => MetricInput::Probabilities(&self.probabilities),
            PredictionKey::Classes => MetricInput::Classes(&self.classes),
        }
    }

    /// Number of predicted samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// `true` when no sample was predicted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// A metric function bound to the prediction column it reads.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    metric_fn: MetricFn,
    prediction_key: PredictionKey,
}

impl MetricSpec {
    /// Bind `metric_fn` to `prediction_key`.
    #[must_use]
    pub fn new(metric_fn: MetricFn, prediction_key: PredictionKey) -> Self {
        Self {
            metric_fn,
            prediction_key,
        }
    }

    /// Return the prediction column this metric reads.
    #[must_use]
    pub fn prediction_key(&self) -> PredictionKey {
        self.prediction_key
    }

    /// Compute the metric against `labels`.
    ///
    /// # Errors
    ///
    /// Propagates the metric function's error.
    pub fn evaluate(&self, predictions: &Predictions, labels: &[usize]) -> Result<f64, ForestError> {
        (self.metric_fn)(predictions.column(self.prediction_key), labels)
    }
}

/// A single evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// A real-valued statistic.
    Float(f64),
    /// A step counter.
    Step(u64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Step(v) => write!(f, "{v}"),
        }
    }
}

/// Evaluation results keyed by metric name, iterated in lexicographic order.
pub type EvalResults = BTreeMap<String, MetricValue>;

/// Look up a metric by name.
///
/// Known names: `accuracy`, `top_5`, `classification_log_loss`,
/// `precision`, `recall`.
///
/// # Errors
///
/// Returns [`ForestError::UnknownMetric`] for any other name.
pub fn get_metric(name: &str) -> Result<MetricFn, ForestError> {
    match name {
        "accuracy" => Ok(accuracy),
        "top_5" => Ok(top_5),
        "classification_log_loss" => Ok(classification_log_loss),
        "precision" => Ok(precision),
        "recall" => Ok(recall),
        other => Err(ForestError::UnknownMetric {
            name: other.to_string(),
        }),
    }
}

fn predicted_classes(input: MetricInput<'_>) -> Vec<usize> {
    match input {
        MetricInput::Classes(classes) => classes.to_vec(),
        MetricInput::Probabilities(rows) => rows.iter().map(|r| argmax(r)).collect(),
    }
}

fn require_probabilities(input: MetricInput<'_>) -> Result<&[Vec<f64>], ForestError> {
    match input {
        MetricInput::Probabilities(rows) => Ok(rows),
        MetricInput::Classes(_) => Err(ForestError::MetricInput {
            expected: "probability",
        }),
    }
}

fn check_lengths(n_predictions: usize, labels: &[usize]) -> Result<(), ForestError> {
    if labels.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    if n_predictions != labels.len() {
        return Err(ForestError::LabelCountMismatch {
            n_features: n_predictions,
            n_labels: labels.len(),
        });
    }
    Ok(())
}

/// Fraction of samples whose predicted class equals the label.
///
/// # Errors
///
/// Returns [`ForestError::EmptyDataset`] or [`ForestError::LabelCountMismatch`].
pub fn accuracy(input: MetricInput<'_>, labels: &[usize]) -> Result<f64, ForestError> {
    let predicted = predicted_classes(input);
    check_lengths(predicted.len(), labels)?;
    let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
    Ok(correct as f64 / labels.len() as f64)
}

/// Fraction of samples whose label is among the five most probable classes.
///
/// # Errors
///
/// Returns [`ForestError::MetricInput`] for class predictions, otherwise
/// [`ForestError::EmptyDataset`] or [`ForestError::LabelCountMismatch`].
pub fn top_5(input: MetricInput<'_>, labels: &[usize]) -> Result<f64, ForestError> {
    let rows = require_probabilities(input)?;
    check_lengths(rows.len(), labels)?;
    let hits = rows
        .iter()
        .zip(labels)
        .filter(|&(row, label)| top_k(row, 5).contains(label))
        .count();
    Ok(hits as f64 / labels.len() as f64)
}

/// Mean negative log-probability assigned to the true label.
///
/// # Errors
///
/// Returns [`ForestError::MetricInput`] for class predictions, otherwise
/// [`ForestError::EmptyDataset`] or [`ForestError::LabelCountMismatch`].
pub fn classification_log_loss(input: MetricInput<'_>, labels: &[usize]) -> Result<f64, ForestError> {
    let rows = require_probabilities(input)?;
    check_lengths(rows.len(), labels)?;
    let total: f64 = rows
        .iter()
        .zip(labels)
        .map(|(row, &label)| {
            let p = row.get(label).copied().unwrap_or(0.0);
            -p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS).ln()
        })
        .sum();
    Ok(total / labels.len() as f64)
}

/// Per-class `(true positives, predicted count, support)`.
fn class_tallies(predicted: &[usize], labels: &[usize]) -> Vec<(usize, usize, usize)> {
    let n_classes = predicted
        .iter()
        .chain(labels)
        .max()
        .map_or(0, |&m| m + 1);
    let mut tallies = vec![(0usize, 0usize, 0usize); n_classes];
    for (&p, &l) in predicted.iter().zip(labels) {
        tallies[p].1 += 1;
        tallies[l].2 += 1;
        if p == l {
            tallies[l].0 += 1;
        }
    }
    tallies
}

/// Precision averaged over the classes that were predicted at least once.
///
/// # Errors
///
/// Returns [`ForestError::EmptyDataset`] or [`ForestError::LabelCountMismatch`].
pub fn precision(input: MetricInput<'_>, labels: &[usize]) -> Result<f64, ForestError> {
    let predicted = predicted_classes(input);
    check_lengths(predicted.len(), labels)?;
    let per_class: Vec<f64> = class_tallies(&predicted, labels)
        .into_iter()
        .filter(|&(_, n_pred, _)| n_pred > 0)
        .map(|(tp, n_pred, _)| tp as f64 / n_pred as f64)
        .collect();
    Ok(per_class.iter().sum::<f64>() / per_class.len().max(1) as f64)
}

/// Recall averaged over the classes present in `labels`.
///
/// # Errors
///
/// Returns [`ForestError::EmptyDataset`] or [`ForestError::LabelCountMismatch`].
pub fn recall(input: MetricInput<'_>, labels: &[usize]) -> Result<f64, ForestError> {
    let predicted = predicted_classes(input);
    check_lengths(predicted.len(), labels)?;
    let per_class: Vec<f64> = class_tallies(&predicted, labels)
        .into_iter()
        .filter(|&(_, _, support)| support > 0)
        .map(|(tp, _, support)| tp as f64 / support as f64)
        .collect();
    Ok(per_class.iter().sum::<f64>() / per_class.len().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probs() -> Vec<Vec<f64>> {
        vec![
            vec![0.7, 0.2, 0.1],
            vec![0.1, 0.3, 0.6],
            vec![0.2, 0.5, 0.3],
            vec![0.4, 0.4, 0.2],
        ]
    }

    #[test]
    fn accuracy_from_probabilities_uses_argmax() {
        let rows = probs();
        // argmax: 0, 2, 1, 0 (tie resolved to the first class)
        let acc = accuracy(MetricInput::Probabilities(&rows), &[0, 2, 2, 1]).unwrap();
        assert!((acc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn accuracy_from_classes() {
        let acc = accuracy(MetricInput::Classes(&[1, 1, 0]), &[1, 0, 0]).unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn accuracy_rejects_length_mismatch() {
        let err = accuracy(MetricInput::Classes(&[1, 1]), &[1]).unwrap_err();
        assert!(matches!(err, ForestError::LabelCountMismatch { .. }));
    }

    #[test]
    fn top_5_counts_label_within_five() {
        let row: Vec<f64> = (0..10).map(|i| i as f64 / 45.0).collect();
        let rows = vec![row.clone(), row];
        // Class 9 is most likely, class 0 least likely.
        let score = top_5(MetricInput::Probabilities(&rows), &[9, 0]).unwrap();
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn top_5_breaks_ties_toward_lower_classes() {
        let rows = vec![vec![0.1; 10]];
        assert_eq!(top_5(MetricInput::Probabilities(&rows), &[4]).unwrap(), 1.0);
        assert_eq!(top_5(MetricInput::Probabilities(&rows), &[5]).unwrap(), 0.0);
        assert_eq!(top_5(MetricInput::Probabilities(&rows), &[10]).unwrap(), 0.0);
    }

    #[test]
    fn top_5_requires_probabilities() {
        let err = top_5(MetricInput::Classes(&[0]), &[0]).unwrap_err();
        assert!(matches!(err, ForestError::MetricInput { .. }));
    }

    #[test]
    fn log_loss_of_confident_correct_is_small() {
        let rows = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let loss = classification_log_loss(MetricInput::Probabilities(&rows), &[0, 1]).unwrap();
        assert!(loss < 1e-10);
    }

    #[test]
    fn log_loss_known_value() {
        let rows = vec![vec![0.5, 0.5]];
        let loss = classification_log_loss(MetricInput::Probabilities(&rows), &[1]).unwrap();
        assert!((loss - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn macro_precision_and_recall() {
        // True: [0,0,0,1,1,1,2,2,2]  Pred: [0,0,1,1,1,2,2,2,0]
        let labels = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = [0, 0, 1, 1, 1, 2, 2, 2, 0];
        let p = precision(MetricInput::Classes(&predicted), &labels).unwrap();
        let r = recall(MetricInput::Classes(&predicted), &labels).unwrap();
        assert!((p - 2.0 / 3.0).abs() < 1e-12);
        assert!((r - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn registry_resolves_known_names() {
        for name in ["accuracy", "top_5", "classification_log_loss", "precision", "recall"] {
            assert!(get_metric(name).is_ok(), "{name}");
        }
        let err = get_metric("auc").unwrap_err();
        assert!(matches!(err, ForestError::UnknownMetric { name } if name == "auc"));
    }

    #[test]
    fn spec_reads_its_column() {
        let predictions = Predictions::from_distributions(vec![
            ClassDistribution::new(vec![0.9, 0.1]),
            ClassDistribution::new(vec![0.3, 0.7]),
        ]);
        let spec = MetricSpec::new(get_metric("accuracy").unwrap(), PredictionKey::Classes);
        assert!((spec.evaluate(&predictions, &[0, 0]).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(predictions.len(), 2);
    }

    #[test]
    fn metric_value_display() {
        assert_eq!(MetricValue::Float(0.5).to_string(), "0.5");
        assert_eq!(MetricValue::Step(42).to_string(), "42");
    }
}
