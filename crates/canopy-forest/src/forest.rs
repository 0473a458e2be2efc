//! The forest ensemble and its batch-wise parallel growth.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::hparams::TensorForestParams;
use crate::tree::{DecisionTree, TreeGrower};

/// A random forest ensemble of [`DecisionTree`]s.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl RandomForest {
    /// A forest of single-leaf trees.
    pub(crate) fn stumps(params: &TensorForestParams) -> Self {
        Self {
            trees: (0..params.num_trees)
                .map(|_| DecisionTree::stump(params.num_features, params.num_classes))
                .collect(),
            n_features: params.num_features,
            n_classes: params.num_classes,
        }
    }

    /// Mean number of nodes per tree.
    #[must_use]
    pub fn average_size(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: usize = self.trees.iter().map(DecisionTree::n_nodes).sum();
        total as f64 / self.trees.len() as f64
    }

    /// Borrow the trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Grows every tree of a forest one batch at a time.
#[derive(Debug)]
pub(crate) struct ForestGrower {
    growers: Vec<TreeGrower>,
    n_features: usize,
    n_classes: usize,
}

impl ForestGrower {
    /// Wrap `forest` for further growth. Per-tree seeds come from a master
    /// RNG seeded with `params.seed` and the step the growth resumes at.
    pub(crate) fn new(forest: RandomForest, params: &TensorForestParams, global_step: u64) -> Self {
        let mut master_rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(global_step));
        let growers = forest
            .trees
            .into_iter()
            .map(|tree| {
                let seed: u64 = master_rng.r#gen();
                TreeGrower::resume(tree, params, seed)
            })
            .collect();
        Self {
            growers,
            n_features: forest.n_features,
            n_classes: forest.n_classes,
        }
    }

    /// Grow all trees in parallel on one batch of sample indices.
    #[instrument(skip_all, fields(batch_len = batch.len()))]
    pub(crate) fn grow_batch(
        &mut self,
        features: &[Vec<f32>],
        labels: &[usize],
        batch: &[usize],
        params: &TensorForestParams,
    ) {
        self.growers
            .par_iter_mut()
            .for_each(|grower| grower.grow(features, labels, batch, params));
        debug!(average_size = self.average_size(), "batch grown");
    }

    /// `true` while any tree can still add nodes.
    pub(crate) fn is_growing(&self) -> bool {
        self.growers.iter().any(TreeGrower::is_growing)
    }

    /// Mean number of nodes per tree.
    pub(crate) fn average_size(&self) -> f64 {
        if self.growers.is_empty() {
            return 0.0;
        }
        let total: usize = self.growers.iter().map(|g| g.tree().n_nodes()).sum();
        total as f64 / self.growers.len() as f64
    }

    /// Drop the training state and return the fitted forest.
    pub(crate) fn finish(self) -> RandomForest {
        RandomForest {
            trees: self
                .growers
                .into_par_iter()
                .map(TreeGrower::into_tree)
                .collect(),
            n_features: self.n_features,
            n_classes: self.n_classes,
        }
    }
}
