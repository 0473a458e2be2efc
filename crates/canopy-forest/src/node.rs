use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a tree arena.
///
/// Children are referenced by [`NodeIndex`]. Leaves keep raw class counts
/// so that samples arriving after a split keep refining the estimate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Samples with `feature <= threshold` go left.
        threshold: f32,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
    },
    /// A terminal leaf node.
    Leaf {
        /// Number of routed training samples per class.
        class_counts: Vec<u64>,
    },
}

impl Node {
    pub(crate) fn empty_leaf(n_classes: usize) -> Self {
        Node::Leaf {
            class_counts: vec![0; n_classes],
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Return the number of training samples counted at this leaf (0 for splits).
    #[must_use]
    pub fn n_samples(&self) -> u64 {
        match self {
            Node::Leaf { class_counts } => class_counts.iter().sum(),
            Node::Split { .. } => 0,
        }
    }

    /// Normalized class distribution of a leaf.
    ///
    /// A leaf that has not seen any sample yields the uniform distribution.
    /// Returns `None` for split nodes.
    #[must_use]
    pub fn distribution(&self) -> Option<Vec<f64>> {
        let Node::Leaf { class_counts } = self else {
            return None;
        };
        let total: u64 = class_counts.iter().sum();
        let n = class_counts.len() as f64;
        Some(if total == 0 {
            vec![1.0 / n; class_counts.len()]
        } else {
            class_counts
                .iter()
                .map(|&c| c as f64 / total as f64)
                .collect()
        })
    }
}
