//! Exhaustive search over the SVC regularisation constant.
//!
//! Each candidate `C` is scored by the mean ROC AUC of the decision function over
//! an inner, unshuffled stratified k-fold split of the training rows. A candidate
//! whose folds cannot be scored (a fold with a single class) gets a NaN score and
//! can never win. The first candidate with the highest score is refitted on all
//! training rows. Candidates are evaluated in parallel; scores are collected in
//! candidate order, so the outcome does not depend on scheduling.

use crate::learn::estimator::{Classifier, LearnError, check_training_input};
use crate::learn::folds::{Fold, StratifiedKFold};
use crate::learn::metrics::roc_auc;
use crate::learn::svm::{Svc, SvcParams};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

/// `C = 10^i` for `i` in `-4..=4`.
pub const REGULARIZATION_GRID: [f64; 9] = [1e-4, 1e-3, 1e-2, 1e-1, 1.0, 1e1, 1e2, 1e3, 1e4];

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchParams {
    /// Kernel, tolerance and seed shared by every candidate. Its `c` is ignored.
    pub base: SvcParams,
    pub c_values: Vec<f64>,
    pub cv_folds: usize,
}

impl GridSearchParams {
    /// The full [`REGULARIZATION_GRID`] with 5 inner folds.
    pub fn regularization_grid(base: SvcParams) -> Self {
        Self {
            base,
            c_values: REGULARIZATION_GRID.to_vec(),
            cv_folds: 5,
        }
    }
}

pub struct GridSearch {
    params: GridSearchParams,
    best: Option<Svc>,
}

impl GridSearch {
    pub fn new(params: GridSearchParams) -> Self {
        Self { params, best: None }
    }

    /// The regularisation constant selected by the last `fit`.
    pub fn best_c(&self) -> Option<f64> {
        self.best.as_ref().map(|svc| svc.params().c)
    }
}

fn score_candidate(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    folds: &[Fold],
    params: &SvcParams,
) -> Result<f64, LearnError> {
    let mut total = 0.0;
    for fold in folds {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train = y.select(Axis(0), &fold.train);
        let mut svc = Svc::new(params.clone());
        match svc.fit(x_train.view(), y_train.view()) {
            Err(LearnError::SingleClass(_)) => return Ok(f64::NAN),
            other => other?,
        }
        let decisions = svc.decision_function(x.select(Axis(0), &fold.test).view())?;
        let y_test = y.select(Axis(0), &fold.test);
        match roc_auc(y_test.view(), decisions.view()) {
            Ok(auc) => total += auc,
            Err(LearnError::SingleClass(_)) => return Ok(f64::NAN),
            Err(e) => return Err(e),
        }
    }
    Ok(total / folds.len() as f64)
}

impl Classifier for GridSearch {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), LearnError> {
        check_training_input(x, y)?;
        let folds = StratifiedKFold::new(self.params.cv_folds).split(y)?;

        let candidates: Vec<SvcParams> = self
            .params
            .c_values
            .iter()
            .map(|&c| self.params.base.clone().with_c(c))
            .collect();
        let scores = candidates
            .par_iter()
            .map(|candidate| score_candidate(x, y, &folds, candidate))
            .collect::<Result<Vec<f64>, LearnError>>()?;

        let mut best_index = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (index, &score) in scores.iter().enumerate() {
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        log::debug!(
            "Grid search scores {:?}; selected C = {:e} (mean AUC {:.4})",
            scores,
            candidates[best_index].c,
            best_score
        );

        let mut best = Svc::new(candidates[best_index].clone());
        best.fit(x, y)?;
        self.best = Some(best);
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, LearnError> {
        self.best
            .as_ref()
            .ok_or(LearnError::NotFitted)?
            .predict_proba(x)
    }
}
