//! Stratified k-fold splitting.
//!
//! Class members are dealt to folds round-robin over the label-sorted sample list,
//! which keeps every fold's class ratio within one sample of the global ratio.
//! Within a class, fold ids are assigned in row order, or in a seeded random order
//! when shuffling is enabled.

use crate::learn::estimator::LearnError;
use ndarray::ArrayView1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// One train/test partition of the row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle_seed: Option<u64>,
}

impl StratifiedKFold {
    /// Deterministic folds, no shuffling.
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle_seed: None,
        }
    }

    /// Folds whose per-class assignment is shuffled with a fixed seed.
    pub fn shuffled(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle_seed: Some(seed),
        }
    }

    /// Splits the rows of `y` into `n_splits` folds. Every row appears in exactly
    /// one test set, and the folds are returned in fold-id order.
    pub fn split(&self, y: ArrayView1<f64>) -> Result<Vec<Fold>, LearnError> {
        let n = y.len();
        if self.n_splits < 2 || self.n_splits > n {
            return Err(LearnError::InvalidSplit {
                n_splits: self.n_splits,
                n_samples: n,
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(LearnError::NonFinite("labels passed to the splitter"));
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        let encoded: Vec<usize> = y
            .iter()
            .map(|v| classes.partition_point(|c| c < v))
            .collect();

        let mut counts = vec![0usize; classes.len()];
        for &k in &encoded {
            counts[k] += 1;
        }
        if counts.iter().all(|&c| c < self.n_splits) {
            return Err(LearnError::InvalidSplit {
                n_splits: self.n_splits,
                n_samples: n,
            });
        }
        if let Some(&smallest) = counts.iter().min() {
            if smallest < self.n_splits {
                log::warn!(
                    "The least populated class has only {} members, fewer than n_splits = {}",
                    smallest,
                    self.n_splits
                );
            }
        }

        // allocation[fold][class] from dealing the label-sorted list round-robin
        let mut ordered = encoded.clone();
        ordered.sort_unstable();
        let mut allocation = vec![vec![0usize; classes.len()]; self.n_splits];
        for (position, &k) in ordered.iter().enumerate() {
            allocation[position % self.n_splits][k] += 1;
        }

        let mut rng = self.shuffle_seed.map(StdRng::seed_from_u64);
        let mut test_fold = vec![0usize; n];
        for k in 0..classes.len() {
            let mut fold_ids: Vec<usize> = (0..self.n_splits)
                .flat_map(|fold| std::iter::repeat_n(fold, allocation[fold][k]))
                .collect();
            if let Some(rng) = rng.as_mut() {
                fold_ids.shuffle(rng);
            }
            let members = encoded.iter().enumerate().filter(|&(_, &c)| c == k);
            for ((row, _), fold) in members.zip(fold_ids) {
                test_fold[row] = fold;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&row| test_fold[row] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn labels(pos: usize, neg: usize) -> Array1<f64> {
        let mut y = Array1::zeros(pos + neg);
        for i in 0..pos {
            y[i * (pos + neg) / pos] = 1.0;
        }
        y
    }

    #[test]
    fn every_row_is_held_out_exactly_once() {
        let y = labels(13, 29);
        for splitter in [StratifiedKFold::new(10), StratifiedKFold::shuffled(10, 42)] {
            let folds = splitter.split(y.view()).unwrap();
            assert_eq!(folds.len(), 10);
            let mut seen = vec![0usize; y.len()];
            for fold in &folds {
                assert!(!fold.test.is_empty());
                assert_eq!(fold.train.len() + fold.test.len(), y.len());
                for &row in &fold.test {
                    seen[row] += 1;
                }
            }
            assert!(seen.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn folds_preserve_class_ratio() {
        let y = labels(20, 80);
        let folds = StratifiedKFold::shuffled(10, 7).split(y.view()).unwrap();
        for fold in &folds {
            let positives = fold.test.iter().filter(|&&r| y[r] == 1.0).count();
            assert_eq!(positives, 2);
            assert_eq!(fold.test.len(), 10);
        }
    }

    #[test]
    fn shuffling_is_reproducible_for_a_seed() {
        let y = labels(15, 15);
        let a = StratifiedKFold::shuffled(5, 3).split(y.view()).unwrap();
        let b = StratifiedKFold::shuffled(5, 3).split(y.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_many_splits_is_rejected() {
        let y = labels(2, 3);
        assert!(matches!(
            StratifiedKFold::new(6).split(y.view()),
            Err(LearnError::InvalidSplit { .. })
        ));
        assert!(matches!(
            StratifiedKFold::new(1).split(y.view()),
            Err(LearnError::InvalidSplit { .. })
        ));
    }
}
