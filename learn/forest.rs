//! # Random Forest Feature Importance
//!
//! Grows a bagged ensemble of fully-grown Gini trees and reports the mean
//! decrease in impurity per feature. Only the importances are kept; the trees
//! themselves are discarded after growing.
//!
//! Each tree is fit on a bootstrap sample of the rows. At every node, features are
//! visited in a random order until `max_features` non-constant features have been
//! scored. A node becomes a leaf when it is pure, has fewer than
//! `min_samples_split` rows, or admits no split that separates distinct values.
//! Per-tree importances are normalised to sum to one before averaging.

use crate::learn::estimator::{LearnError, check_training_input};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Feature values closer than this are treated as equal when placing thresholds.
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Features scored per split; `None` means `floor(sqrt(n_features))`.
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
    pub random_seed: u64,
}

impl ForestParams {
    pub fn new(random_seed: u64) -> Self {
        Self {
            n_trees: 100,
            max_features: None,
            min_samples_split: 2,
            random_seed,
        }
    }
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

struct Split {
    feature: usize,
    threshold: f64,
    /// `n_node * gini(node) - n_left * gini(left) - n_right * gini(right)`
    improvement: f64,
}

struct TreeGrower<'a> {
    x: ArrayView2<'a, f64>,
    positive: Vec<bool>,
    max_features: usize,
    min_samples_split: usize,
}

impl TreeGrower<'_> {
    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<Split> {
        let n_node = rows.len();
        let node_pos = rows.iter().filter(|&&r| self.positive[r]).count();
        let node_impurity = n_node as f64 * gini(node_pos, n_node);

        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<Split> = None;
        let mut scored = 0;
        let mut values: Vec<(f64, bool)> = Vec::with_capacity(n_node);
        for feature in features {
            if scored >= self.max_features {
                break;
            }
            values.clear();
            values.extend(rows.iter().map(|&r| (self.x[[r, feature]], self.positive[r])));
            values.sort_by(|a, b| a.0.total_cmp(&b.0));
            if values[n_node - 1].0 <= values[0].0 + FEATURE_THRESHOLD {
                continue;
            }
            scored += 1;

            let mut left_pos = 0;
            for split_at in 1..n_node {
                if values[split_at - 1].1 {
                    left_pos += 1;
                }
                if values[split_at].0 <= values[split_at - 1].0 + FEATURE_THRESHOLD {
                    continue;
                }
                let right_pos = node_pos - left_pos;
                let n_right = n_node - split_at;
                let improvement = node_impurity
                    - split_at as f64 * gini(left_pos, split_at)
                    - n_right as f64 * gini(right_pos, n_right);
                if best.as_ref().is_none_or(|b| improvement > b.improvement) {
                    best = Some(Split {
                        feature,
                        threshold: (values[split_at - 1].0 + values[split_at].0) / 2.0,
                        improvement,
                    });
                }
            }
        }
        best
    }

    /// Grows one tree over `rows` (bootstrap indices, possibly repeated) and adds
    /// its unnormalised impurity decreases to `importance`.
    fn grow(&self, rows: Vec<usize>, rng: &mut StdRng, importance: &mut [f64]) {
        let mut stack = vec![rows];
        while let Some(node) = stack.pop() {
            let positives = node.iter().filter(|&&r| self.positive[r]).count();
            if node.len() < self.min_samples_split || positives == 0 || positives == node.len() {
                continue;
            }
            let Some(split) = self.best_split(&node, rng) else {
                continue;
            };
            importance[split.feature] += split.improvement;
            let (left, right): (Vec<usize>, Vec<usize>) = node
                .into_iter()
                .partition(|&r| self.x[[r, split.feature]] <= split.threshold);
            stack.push(right);
            stack.push(left);
        }
    }
}

/// Mean decrease in Gini impurity per column of `x`, normalised to sum to one
/// (all zeros if no tree could split).
pub fn feature_importances(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    params: &ForestParams,
) -> Result<Array1<f64>, LearnError> {
    check_training_input(x, y)?;
    let n = x.nrows();
    let p = x.ncols();
    let max_features = params
        .max_features
        .unwrap_or_else(|| (p as f64).sqrt().floor() as usize)
        .clamp(1, p.max(1));

    let grower = TreeGrower {
        x,
        positive: y.iter().map(|&v| v > 0.5).collect(),
        max_features,
        min_samples_split: params.min_samples_split.max(2),
    };

    let mut rng = StdRng::seed_from_u64(params.random_seed);
    let mut total = Array1::<f64>::zeros(p);
    for tree in 0..params.n_trees {
        let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        let mut importance = vec![0.0; p];
        grower.grow(bootstrap, &mut rng, &mut importance);
        let tree_sum: f64 = importance.iter().sum();
        if tree_sum > 0.0 {
            for (acc, value) in total.iter_mut().zip(&importance) {
                *acc += value / tree_sum;
            }
        } else {
            log::trace!("Tree {tree} made no split");
        }
    }

    let sum = total.sum();
    if sum > 0.0 {
        total /= sum;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use rand_distr::StandardNormal;

    #[test]
    fn informative_feature_ranks_first() {
        let mut rng = StdRng::seed_from_u64(17);
        let n = 120;
        let mut x = Array2::zeros((n, 4));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let label = if i % 3 == 0 { 1.0 } else { 0.0 };
            x[[i, 0]] = rng.sample::<f64, _>(StandardNormal);
            x[[i, 1]] = rng.sample::<f64, _>(StandardNormal);
            x[[i, 2]] = 3.0 * label + 0.5 * rng.sample::<f64, _>(StandardNormal);
            x[[i, 3]] = rng.sample::<f64, _>(StandardNormal);
            y[i] = label;
        }
        let importances = feature_importances(x.view(), y.view(), &ForestParams::new(5)).unwrap();
        assert_abs_diff_eq!(importances.sum(), 1.0, epsilon = 1e-9);
        let top = importances
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(top, 2);
    }

    #[test]
    fn importances_are_reproducible_for_a_seed() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        let y = Array1::from_shape_fn(30, |i| if i % 2 == 0 { 1.0 } else { 0.0 });
        let a = feature_importances(x.view(), y.view(), &ForestParams::new(5)).unwrap();
        let b = feature_importances(x.view(), y.view(), &ForestParams::new(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_features_get_no_importance() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { 1.0 } else { i as f64 });
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 1.0 } else { 0.0 });
        let importances = feature_importances(x.view(), y.view(), &ForestParams::new(1)).unwrap();
        assert_eq!(importances[0], 0.0);
        assert_abs_diff_eq!(importances[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn gini_of_balanced_node_is_one_half() {
        assert_abs_diff_eq!(gini(5, 10), 0.5);
        assert_eq!(gini(0, 10), 0.0);
        assert_eq!(gini(0, 0), 0.0);
    }
}
