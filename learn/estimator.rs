//! # Estimator Contracts
//!
//! Every model in this crate is driven through the [`Classifier`] trait: `fit` on a
//! feature matrix and a binary label vector (term = 1, preterm = 0), then
//! `predict_proba` for the probability of label 1.
//!
//! Models are never reused across folds. Callers hold a cloneable *specification*
//! ([`PipelineSpec`], [`ClassifierSpec`]) and call `build()` whenever they need an
//! untrained model, so one fit can never leak state into the next.

use crate::learn::grid::{GridSearch, GridSearchParams};
use crate::learn::oversample::Adasyn;
use crate::learn::scaler::StandardScaler;
use crate::learn::svm::{Svc, SvcParams};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the statistical routines.
#[derive(Error, Debug)]
pub enum LearnError {
    #[error("The feature matrix has {rows} rows, but the label vector has {labels} entries.")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("The model was trained on {expected} features, but {found} were supplied.")]
    FeatureCountMismatch { expected: usize, found: usize },

    #[error("Labels must be binary (0 or 1). Found the value {0}.")]
    NonBinaryLabel(f64),

    #[error("Cannot fit a model on an empty training set.")]
    EmptyInput,

    #[error("Only one class is present, but {0} requires both classes.")]
    SingleClass(&'static str),

    #[error("Cannot split {n_samples} samples into {n_splits} stratified folds.")]
    InvalidSplit { n_splits: usize, n_samples: usize },

    #[error("The folds did not cover every row exactly once ({missing} rows never held out).")]
    IncompleteCoverage { missing: usize },

    #[error("Non-finite values (NaN or Infinity) were found in the {0}.")]
    NonFinite(&'static str),

    #[error("The model must be fitted before it can predict.")]
    NotFitted,
}

/// A binary probabilistic classifier.
pub trait Classifier: Send {
    /// Trains the model. Any previous fit is discarded.
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), LearnError>;

    /// Returns `P(label = 1)` for every row of `x`.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, LearnError>;
}

/// Validates a training pair: matching lengths, at least one row, finite
/// features and labels restricted to `{0, 1}`.
pub fn check_training_input(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), LearnError> {
    if x.nrows() != y.len() {
        return Err(LearnError::ShapeMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(LearnError::EmptyInput);
    }
    if let Some(&bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(LearnError::NonBinaryLabel(bad));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(LearnError::NonFinite("feature matrix"));
    }
    Ok(())
}

/// Counts `(negatives, positives)` in a validated label vector.
pub fn class_counts(y: ArrayView1<f64>) -> (usize, usize) {
    let positives = y.iter().filter(|&&v| v > 0.5).count();
    (y.len() - positives, positives)
}

/// Optional preprocessing step in front of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preprocessing {
    /// Features are passed through unchanged.
    Identity,
    /// Features are centred and scaled with statistics learned on the training rows.
    Standardize,
}

/// Blueprint for the classifier at the end of a pipeline.
#[derive(Debug, Clone)]
pub enum ClassifierSpec {
    Svc(SvcParams),
    /// An SVC whose regularisation constant is chosen by inner cross-validation.
    GridSearch(GridSearchParams),
}

impl ClassifierSpec {
    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            ClassifierSpec::Svc(params) => Box::new(Svc::new(params.clone())),
            ClassifierSpec::GridSearch(params) => Box::new(GridSearch::new(params.clone())),
        }
    }
}

/// Blueprint for a preprocessing, oversampling and classification chain.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub preprocessing: Preprocessing,
    /// When present, the oversampler only ever sees the rows passed to `fit`.
    pub oversampler: Option<Adasyn>,
    pub classifier: ClassifierSpec,
}

impl PipelineSpec {
    /// Builds a fresh, untrained pipeline.
    pub fn build(&self) -> Pipeline {
        let scaler = match self.preprocessing {
            Preprocessing::Identity => None,
            Preprocessing::Standardize => Some(StandardScaler::new()),
        };
        Pipeline {
            scaler,
            oversampler: self.oversampler.clone(),
            classifier: self.classifier.build(),
        }
    }
}

/// A trained (or trainable) chain: standardize, then oversample, then classify.
pub struct Pipeline {
    scaler: Option<StandardScaler>,
    oversampler: Option<Adasyn>,
    classifier: Box<dyn Classifier>,
}

impl Classifier for Pipeline {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), LearnError> {
        check_training_input(x, y)?;
        let transformed = match self.scaler.as_mut() {
            Some(scaler) => scaler.fit_transform(x)?,
            None => x.to_owned(),
        };

        match &self.oversampler {
            Some(oversampler) => {
                let (x_resampled, y_resampled) = oversampler.sample(transformed.view(), y)?;
                log::debug!(
                    "Oversampled training partition from {} to {} rows",
                    y.len(),
                    y_resampled.len()
                );
                self.classifier.fit(x_resampled.view(), y_resampled.view())
            }
            None => self.classifier.fit(transformed.view(), y),
        }
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, LearnError> {
        match &self.scaler {
            Some(scaler) => {
                let transformed = scaler.transform(x)?;
                self.classifier.predict_proba(transformed.view())
            }
            None => self.classifier.predict_proba(x),
        }
    }
}
