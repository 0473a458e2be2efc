use rand::Rng;

use crate::node::FeatureIndex;

/// Gini impurity `1 - Σ(p_i²)` of a set of class counts.
///
/// Returns 0.0 for an empty set.
#[must_use]
pub(crate) fn gini(class_counts: &[u64], n_samples: u64) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    let n = n_samples as f64;
    let sum_sq: f64 = class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum();
    1.0 - sum_sq
}

/// Best split found over a leaf's accumulated samples.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f32,
    /// Class counts of the accumulated samples routed left.
    pub(crate) left_counts: Vec<u64>,
    /// Class counts of the accumulated samples routed right.
    pub(crate) right_counts: Vec<u64>,
}

/// Find the best Gini split of `sample_indices` among `num_candidates`
/// randomly chosen features.
///
/// `features` is row-major: `features[sample_idx][feature_idx]`.
///
/// Returns `None` when the samples are pure or every candidate feature is
/// constant over them.
pub(crate) fn find_best_split(
    features: &[Vec<f32>],
    labels: &[usize],
    sample_indices: &[usize],
    n_classes: usize,
    num_candidates: usize,
    rng: &mut impl Rng,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    let n_features = features.first().map_or(0, Vec::len);
    if n_samples < 2 || n_features == 0 {
        return None;
    }

    let mut parent_counts = vec![0u64; n_classes];
    for &si in sample_indices {
        parent_counts[labels[si]] += 1;
    }
    let parent_impurity = gini(&parent_counts, n_samples as u64);
    if parent_impurity == 0.0 {
        return None;
    }

    // Partial Fisher-Yates over the feature indices.
    let mut feature_order: Vec<usize> = (0..n_features).collect();
    let take = num_candidates.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        feature_order.swap(i, j);
    }

    let mut best_decrease = 0.0f64;
    let mut best: Option<(usize, f32)> = None;
    let mut sorted: Vec<(f32, usize)> = Vec::with_capacity(n_samples);

    for &feat_idx in &feature_order[..take] {
        sorted.clear();
        sorted.extend(sample_indices.iter().map(|&si| (features[si][feat_idx], labels[si])));
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0u64; n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, class_i) = sorted[i];
            left_counts[class_i] += 1;
            right_counts[class_i] -= 1;

            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            let n_left = (i + 1) as u64;
            let n_right = n_samples as u64 - n_left;
            let decrease = (n_samples as f64) * parent_impurity
                - (n_left as f64) * gini(&left_counts, n_left)
                - (n_right as f64) * gini(&right_counts, n_right);

            if decrease > best_decrease {
                best_decrease = decrease;
                best = Some((feat_idx, val_i + (val_next - val_i) / 2.0));
            }
        }
    }

    let (feat_idx, threshold) = best?;

    let mut left_counts = vec![0u64; n_classes];
    let mut right_counts = vec![0u64; n_classes];
    for &si in sample_indices {
        if features[si][feat_idx] <= threshold {
            left_counts[labels[si]] += 1;
        } else {
            right_counts[labels[si]] += 1;
        }
    }

    Some(SplitResult {
        feature: FeatureIndex::new(feat_idx),
        threshold,
        left_counts,
        right_counts,
    })
}
