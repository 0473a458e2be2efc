//! Forest hyperparameters and their derived ("filled") form.

use crate::error::ForestError;

/// Hyperparameters for an online random forest.
///
/// Construct via [`ForestHParams::new`], chain `with_*` methods, then call
/// [`ForestHParams::fill`] to validate and resolve derived values.
///
/// # Defaults
///
/// | Parameter                | Default                              |
/// |--------------------------|--------------------------------------|
/// | `num_trees`              | 100                                  |
/// | `max_nodes`              | 10000                                |
/// | `split_after_samples`    | 250                                  |
/// | `num_splits_to_consider` | `max(10, ceil(sqrt(num_features)))`  |
/// | `max_fertile_nodes`      | `ceil(max_nodes / 2)`                |
/// | `bagging_fraction`       | 1.0                                  |
/// | `seed`                   | 42                                   |
#[derive(Debug, Clone, PartialEq)]
pub struct ForestHParams {
    num_classes: usize,
    num_features: usize,
    num_trees: usize,
    max_nodes: usize,
    split_after_samples: usize,
    num_splits_to_consider: Option<usize>,
    max_fertile_nodes: Option<usize>,
    bagging_fraction: f64,
    seed: u64,
}

impl ForestHParams {
    /// Create hyperparameters for a problem with the given class and feature counts.
    #[must_use]
    pub fn new(num_classes: usize, num_features: usize) -> Self {
        Self {
            num_classes,
            num_features,
            num_trees: 100,
            max_nodes: 10_000,
            split_after_samples: 250,
            num_splits_to_consider: None,
            max_fertile_nodes: None,
            bagging_fraction: 1.0,
            seed: 42,
        }
    }

    /// Set the number of trees in the forest.
    #[must_use]
    pub fn with_num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
        self
    }

    /// Set the maximum number of nodes (splits and leaves) in a single tree.
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Set how many samples a fertile leaf collects before it tries to split.
    #[must_use]
    pub fn with_split_after_samples(mut self, split_after_samples: usize) -> Self {
        self.split_after_samples = split_after_samples;
        self
    }

    /// Set the number of candidate features examined per split.
    #[must_use]
    pub fn with_num_splits_to_consider(mut self, num_splits_to_consider: usize) -> Self {
        self.num_splits_to_consider = Some(num_splits_to_consider);
        self
    }

    /// Set the maximum number of leaves per tree that may collect samples at once.
    #[must_use]
    pub fn with_max_fertile_nodes(mut self, max_fertile_nodes: usize) -> Self {
        self.max_fertile_nodes = Some(max_fertile_nodes);
        self
    }

    /// Set the probability that a tree sees any given training sample.
    #[must_use]
    pub fn with_bagging_fraction(mut self, bagging_fraction: f64) -> Self {
        self.bagging_fraction = bagging_fraction;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Return the number of features.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Return the number of trees.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Return the per-tree node limit.
    #[must_use]
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Validate every field and resolve the derived ones.
    ///
    /// # Errors
    ///
    /// | Variant                                   | When                                    |
    /// |-------------------------------------------|-----------------------------------------|
    /// | [`ForestError::InvalidClassCount`]        | `num_classes` is zero                   |
    /// | [`ForestError::InvalidFeatureCount`]      | `num_features` is zero                  |
    /// | [`ForestError::InvalidTreeCount`]         | `num_trees` is zero                     |
    /// | [`ForestError::InvalidMaxNodes`]          | `max_nodes` is zero                     |
    /// | [`ForestError::InvalidSplitAfterSamples`] | `split_after_samples` is zero           |
    /// | [`ForestError::InvalidBaggingFraction`]   | `bagging_fraction` is not in (0.0, 1.0] |
    pub fn fill(self) -> Result<TensorForestParams, ForestError> {
        if self.num_classes == 0 {
            return Err(ForestError::InvalidClassCount {
                num_classes: self.num_classes,
            });
        }
        if self.num_features == 0 {
            return Err(ForestError::InvalidFeatureCount {
                num_features: self.num_features,
            });
        }
        if self.num_trees == 0 {
            return Err(ForestError::InvalidTreeCount {
                num_trees: self.num_trees,
            });
        }
        if self.max_nodes == 0 {
            return Err(ForestError::InvalidMaxNodes {
                max_nodes: self.max_nodes,
            });
        }
        if self.split_after_samples == 0 {
            return Err(ForestError::InvalidSplitAfterSamples {
                split_after_samples: self.split_after_samples,
            });
        }
        if self.bagging_fraction <= 0.0 || self.bagging_fraction > 1.0 {
            return Err(ForestError::InvalidBaggingFraction {
                fraction: self.bagging_fraction,
            });
        }

        let num_splits_to_consider = self
            .num_splits_to_consider
            .unwrap_or_else(|| ((self.num_features as f64).sqrt().ceil() as usize).max(10))
            .clamp(1, self.num_features);
        let max_fertile_nodes = self
            .max_fertile_nodes
            .unwrap_or_else(|| self.max_nodes.div_ceil(2))
            .max(1);

        Ok(TensorForestParams {
            num_classes: self.num_classes,
            num_features: self.num_features,
            num_trees: self.num_trees,
            max_nodes: self.max_nodes,
            split_after_samples: self.split_after_samples,
            num_splits_to_consider,
            max_fertile_nodes,
            bagging_fraction: self.bagging_fraction,
            seed: self.seed,
        })
    }
}

/// Validated hyperparameters with every derived value resolved.
///
/// Only produced by [`ForestHParams::fill`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorForestParams {
    pub(crate) num_classes: usize,
    pub(crate) num_features: usize,
    pub(crate) num_trees: usize,
    pub(crate) max_nodes: usize,
    pub(crate) split_after_samples: usize,
    pub(crate) num_splits_to_consider: usize,
    pub(crate) max_fertile_nodes: usize,
    pub(crate) bagging_fraction: f64,
    pub(crate) seed: u64,
}

impl TensorForestParams {
    /// Return the number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Return the number of features.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Return the number of trees.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Return the per-tree node limit.
    #[must_use]
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Return the number of samples a fertile leaf collects before splitting.
    #[must_use]
    pub fn split_after_samples(&self) -> usize {
        self.split_after_samples
    }

    /// Return the number of candidate features examined per split.
    #[must_use]
    pub fn num_splits_to_consider(&self) -> usize {
        self.num_splits_to_consider
    }

    /// Return the cap on simultaneously fertile leaves per tree.
    #[must_use]
    pub fn max_fertile_nodes(&self) -> usize {
        self.max_fertile_nodes
    }

    /// Return the per-tree sample inclusion probability.
    #[must_use]
    pub fn bagging_fraction(&self) -> f64 {
        self.bagging_fraction
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
