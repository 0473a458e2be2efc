use std::collections::{BTreeMap, VecDeque};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::hparams::TensorForestParams;
use crate::node::{Node, NodeIndex};
use crate::split::find_best_split;

/// A decision tree stored as an arena of [`Node`]s, root at index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// A tree consisting of a single empty leaf.
    pub(crate) fn stump(n_features: usize, n_classes: usize) -> Self {
        Self {
            nodes: vec![Node::empty_leaf(n_classes)],
            n_features,
            n_classes,
        }
    }

    /// Class distribution of the leaf `sample` reaches.
    ///
    /// The caller guarantees `sample.len() == n_features`.
    pub(crate) fn predict_proba(&self, sample: &[f32]) -> Vec<f64> {
        let leaf = self.traverse(sample);
        self.nodes[leaf.index()]
            .distribution()
            .unwrap_or_else(|| vec![0.0; self.n_classes])
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree. A lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut queue = VecDeque::from([(0usize, 0usize)]);
        while let Some((idx, d)) = queue.pop_front() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    fn traverse(&self, sample: &[f32]) -> NodeIndex {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return NodeIndex::new(idx),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

/// Training state wrapped around a [`DecisionTree`].
///
/// Fertile leaves collect the indices of samples routed to them; once a
/// leaf holds `split_after_samples` of them it is split or, when no split
/// helps, retired. Leaves that could not become fertile because of the
/// `max_fertile_nodes` cap wait in a queue until a slot frees up.
#[derive(Debug)]
pub(crate) struct TreeGrower {
    tree: DecisionTree,
    fertile: BTreeMap<usize, Vec<usize>>,
    waiting: VecDeque<usize>,
    full: bool,
    rng: ChaCha8Rng,
}

impl TreeGrower {
    /// Start growing from `tree`; every current leaf becomes a split candidate.
    pub(crate) fn resume(tree: DecisionTree, params: &TensorForestParams, seed: u64) -> Self {
        let full = tree.nodes.len() + 2 > params.max_nodes;
        let mut grower = Self {
            fertile: BTreeMap::new(),
            waiting: VecDeque::new(),
            full,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tree,
        };
        if !full {
            let leaves: Vec<usize> = grower
                .tree
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.is_leaf())
                .map(|(i, _)| i)
                .collect();
            for leaf in leaves {
                grower.make_fertile(leaf, params);
            }
        }
        grower
    }

    /// `true` while at least one leaf can still be split.
    pub(crate) fn is_growing(&self) -> bool {
        !self.full && !self.fertile.is_empty()
    }

    pub(crate) fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    pub(crate) fn into_tree(self) -> DecisionTree {
        self.tree
    }

    /// Route one batch of samples through the tree and split ripe leaves.
    pub(crate) fn grow(
        &mut self,
        features: &[Vec<f32>],
        labels: &[usize],
        batch: &[usize],
        params: &TensorForestParams,
    ) {
        for &si in batch {
            if params.bagging_fraction < 1.0 && !self.rng.gen_bool(params.bagging_fraction) {
                continue;
            }
            let leaf = self.tree.traverse(&features[si]).index();
            if let Node::Leaf { class_counts } = &mut self.tree.nodes[leaf] {
                class_counts[labels[si]] += 1;
            }
            let ripe = match self.fertile.get_mut(&leaf) {
                Some(samples) => {
                    samples.push(si);
                    samples.len() >= params.split_after_samples
                }
                None => false,
            };
            if ripe {
                self.split_leaf(leaf, features, labels, params);
            }
        }
    }

    fn split_leaf(
        &mut self,
        leaf: usize,
        features: &[Vec<f32>],
        labels: &[usize],
        params: &TensorForestParams,
    ) {
        let Some(samples) = self.fertile.remove(&leaf) else {
            return;
        };

        if self.tree.nodes.len() + 2 > params.max_nodes {
            self.full = true;
            self.fertile.clear();
            self.waiting.clear();
            return;
        }

        let split = find_best_split(
            features,
            labels,
            &samples,
            self.tree.n_classes,
            params.num_splits_to_consider,
            &mut self.rng,
        );

        match split {
            Some(split) => {
                let left = self.tree.nodes.len();
                let right = left + 1;
                self.tree.nodes.push(Node::Leaf {
                    class_counts: split.left_counts,
                });
                self.tree.nodes.push(Node::Leaf {
                    class_counts: split.right_counts,
                });
                self.tree.nodes[leaf] = Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: NodeIndex::new(left),
                    right: NodeIndex::new(right),
                };
                trace!(leaf, n_nodes = self.tree.nodes.len(), "leaf split");
                self.make_fertile(left, params);
                self.make_fertile(right, params);
            }
            None => trace!(leaf, "leaf retired"),
        }

        self.promote_waiting(params);
    }

    fn make_fertile(&mut self, leaf: usize, params: &TensorForestParams) {
        if self.fertile.len() < params.max_fertile_nodes {
            self.fertile.insert(leaf, Vec::with_capacity(params.split_after_samples));
        } else {
            self.waiting.push_back(leaf);
        }
    }

    fn promote_waiting(&mut self, params: &TensorForestParams) {
        while self.fertile.len() < params.max_fertile_nodes {
            let Some(leaf) = self.waiting.pop_front() else {
                break;
            };
            self.fertile
                .insert(leaf, Vec::with_capacity(params.split_after_samples));
        }
    }
}
