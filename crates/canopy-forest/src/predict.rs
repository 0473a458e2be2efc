//! Prediction methods for the forest ensemble.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::ForestError;
use crate::forest::RandomForest;

/// Class probability distribution from a prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probs: Vec<f64>,
}

impl ClassDistribution {
    pub(crate) fn new(probs: Vec<f64>) -> Self {
        Self { probs }
    }

    /// Return the predicted class (argmax of probabilities, lowest index on ties).
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        argmax(&self.probs)
    }

    /// Return the probability distribution as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }

    /// Consume the distribution and return the probabilities.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.probs
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// The `k` most probable classes, most probable first; lower index wins ties.
pub(crate) fn top_k(probs: &[f64], k: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f64)> = probs.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.into_iter().take(k).map(|(class, _)| class).collect()
}

impl RandomForest {
    /// Return the averaged class probability distribution for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::FeatureCountMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f32]) -> Result<ClassDistribution, ForestError> {
        if sample.len() != self.n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.n_features,
                got: sample.len(),
                sample_index: 0,
            });
        }

        let mut avg = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            for (i, p) in tree.predict_proba(sample).iter().enumerate() {
                avg[i] += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        avg.iter_mut().for_each(|v| *v /= n);

        Ok(ClassDistribution::new(avg))
    }

    /// Return probability distributions for a batch of samples in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::FeatureCountMismatch`] naming the first offending sample.
    pub fn predict_proba_batch(
        &self,
        features: &[Vec<f32>],
    ) -> Result<Vec<ClassDistribution>, ForestError> {
        if let Some((sample_index, row)) = features
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.n_features)
        {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.n_features,
                got: row.len(),
                sample_index,
            });
        }
        features
            .par_iter()
            .map(|sample| self.predict_proba(sample))
            .collect()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
