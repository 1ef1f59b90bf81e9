//! # Cross-Validated Evaluation
//!
//! [`evaluate`] drives one pipeline specification through a stratified k-fold
//! split. Every fold trains a freshly built pipeline on its training rows and
//! records the positive-class probability for each held-out row, so every input
//! row ends up with exactly one out-of-fold prediction.
//!
//! A [`PredictionTable`] is persisted in a row-indexed columnar layout:
//!
//! ```json
//! { "fold": {"0": 3, "1": 0}, "label": {"0": 1.0, "1": 0.0}, "prediction": {"0": 0.82, "1": 0.11} }
//! ```

use crate::learn::estimator::{Classifier, LearnError, PipelineSpec, check_training_input};
use crate::learn::folds::StratifiedKFold;
use crate::learn::metrics::roc_auc;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The held-out prediction for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRecord {
    pub fold: usize,
    pub label: f64,
    /// Predicted probability of label 1.
    pub prediction: f64,
}

/// One [`PredictionRecord`] per evaluated row, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DetailColumns", try_from = "DetailColumns")]
pub struct PredictionTable {
    records: Vec<PredictionRecord>,
}

/// Serialized form of a [`PredictionTable`]: three columns keyed by row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailColumns {
    pub fold: BTreeMap<usize, usize>,
    pub label: BTreeMap<usize, f64>,
    pub prediction: BTreeMap<usize, f64>,
}

impl From<PredictionTable> for DetailColumns {
    fn from(table: PredictionTable) -> Self {
        let records = table.records.iter().enumerate();
        Self {
            fold: records.clone().map(|(i, r)| (i, r.fold)).collect(),
            label: records.clone().map(|(i, r)| (i, r.label)).collect(),
            prediction: records.map(|(i, r)| (i, r.prediction)).collect(),
        }
    }
}

impl TryFrom<DetailColumns> for PredictionTable {
    type Error = String;

    fn try_from(columns: DetailColumns) -> Result<Self, Self::Error> {
        let n = columns.fold.len();
        if columns.label.len() != n || columns.prediction.len() != n {
            return Err(format!(
                "detail columns differ in length: fold {}, label {}, prediction {}",
                n,
                columns.label.len(),
                columns.prediction.len()
            ));
        }
        let mut records = Vec::with_capacity(n);
        for row in 0..n {
            let (Some(&fold), Some(&label), Some(&prediction)) = (
                columns.fold.get(&row),
                columns.label.get(&row),
                columns.prediction.get(&row),
            ) else {
                return Err(format!("row {row} is missing from the detail columns"));
            };
            records.push(PredictionRecord {
                fold,
                label,
                prediction,
            });
        }
        Ok(Self { records })
    }
}

impl PredictionTable {
    pub fn from_records(records: Vec<PredictionRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn labels(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.label).collect()
    }

    pub fn predictions(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.prediction).collect()
    }

    /// ROC AUC of the recorded predictions against the recorded labels.
    pub fn auc(&self) -> Result<f64, LearnError> {
        roc_auc(self.labels().view(), self.predictions().view())
    }

    /// Distinct fold ids, ascending.
    pub fn fold_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.records.iter().map(|r| r.fold).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Out-of-fold predictions for every row of `x`.
pub fn evaluate(
    spec: &PipelineSpec,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    splitter: &StratifiedKFold,
) -> Result<PredictionTable, LearnError> {
    check_training_input(x, y)?;
    let folds = splitter.split(y)?;
    let mut records: Vec<Option<PredictionRecord>> = vec![None; y.len()];

    for (fold_id, fold) in folds.iter().enumerate() {
        let mut pipeline = spec.build();
        let x_train = x.select(Axis(0), &fold.train);
        let y_train = y.select(Axis(0), &fold.train);
        pipeline.fit(x_train.view(), y_train.view())?;

        let probabilities = pipeline.predict_proba(x.select(Axis(0), &fold.test).view())?;
        for (&row, &prediction) in fold.test.iter().zip(probabilities.iter()) {
            records[row] = Some(PredictionRecord {
                fold: fold_id,
                label: y[row],
                prediction,
            });
        }
        log::debug!(
            "Fold {}/{}: trained on {} rows, predicted {}",
            fold_id + 1,
            folds.len(),
            fold.train.len(),
            fold.test.len()
        );
    }

    let missing = records.iter().filter(|r| r.is_none()).count();
    if missing > 0 {
        return Err(LearnError::IncompleteCoverage { missing });
    }
    Ok(PredictionTable::from_records(records.into_iter().flatten().collect()))
}

/// Fits once on all rows and predicts the same rows. Every record gets fold id 0.
pub fn evaluate_in_sample(
    spec: &PipelineSpec,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<PredictionTable, LearnError> {
    let mut pipeline = spec.build();
    pipeline.fit(x, y)?;
    let probabilities = pipeline.predict_proba(x)?;
    Ok(PredictionTable::from_records(
        y.iter()
            .zip(probabilities.iter())
            .map(|(&label, &prediction)| PredictionRecord {
                fold: 0,
                label,
                prediction,
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learn::estimator::{ClassifierSpec, Preprocessing};
    use crate::learn::svm::{Kernel, SvcParams};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn linear_spec() -> PipelineSpec {
        PipelineSpec {
            preprocessing: Preprocessing::Standardize,
            oversampler: None,
            classifier: ClassifierSpec::Svc(SvcParams::new(Kernel::Linear)),
        }
    }

    fn shifted_blobs(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let shift = if i % 2 == 0 { 2.0 } else { -2.0 };
            shift + ((i * 7 + j * 3) % 5) as f64 * 0.3
        });
        let y = Array1::from_shape_fn(n, |i| if i % 2 == 0 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn every_row_is_predicted_once_with_its_own_label() {
        let (x, y) = shifted_blobs(40);
        let table = evaluate(&linear_spec(), x.view(), y.view(), &StratifiedKFold::new(4)).unwrap();
        assert_eq!(table.len(), 40);
        assert_eq!(table.labels(), y);
        assert_eq!(table.fold_ids(), vec![0, 1, 2, 3]);
        assert!(table.predictions().iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn separable_blobs_score_perfectly() {
        let (x, y) = shifted_blobs(40);
        let table = evaluate(&linear_spec(), x.view(), y.view(), &StratifiedKFold::new(4)).unwrap();
        assert_abs_diff_eq!(table.auc().unwrap(), 1.0);
    }

    #[test]
    fn in_sample_uses_a_single_fold() {
        let (x, y) = shifted_blobs(20);
        let table = evaluate_in_sample(&linear_spec(), x.view(), y.view()).unwrap();
        assert_eq!(table.len(), 20);
        assert_eq!(table.fold_ids(), vec![0]);
    }

    #[test]
    fn detail_columns_are_keyed_by_row() {
        let table = PredictionTable::from_records(vec![
            PredictionRecord {
                fold: 1,
                label: 0.0,
                prediction: 0.25,
            },
            PredictionRecord {
                fold: 0,
                label: 1.0,
                prediction: 0.75,
            },
        ]);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["fold"]["0"], 1);
        assert!(json["fold"]["0"].is_u64(), "fold ids are written as integers");
        assert_eq!(json["label"]["1"], 1.0);
        assert_eq!(json["prediction"]["0"], 0.25);
        let back: PredictionTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn gaps_in_row_keys_are_rejected() {
        let json = r#"{"fold": {"0": 0, "2": 0}, "label": {"0": 1.0, "2": 0.0}, "prediction": {"0": 0.5, "2": 0.5}}"#;
        assert!(serde_json::from_str::<PredictionTable>(json).is_err());
    }
}
