//! # Evaluation Protocols
//!
//! Both studies score their classifier four ways over the same cohort:
//!
//! 1. without oversampling: stratified k-fold cross-validation of the base
//!    pipeline (optional standardization, optional grid search over `C`);
//! 2. with correct oversampling: ADASYN applied to each fold's training rows
//!    only, feeding the classifier on raw features (no standardization);
//! 3. in-sample: the plain SVC fitted and scored on all rows;
//! 4. with incorrect oversampling: ADASYN applied once to the whole cohort, then
//!    ordinary cross-validation. Synthetic rows derived from a test row's
//!    neighbours end up in training folds, which inflates the AUC.
//!
//! The gap between (1)/(2) and (4) is what the harness exists to show.

use crate::config::ConfigError;
use crate::data::DataError;
use crate::evaluate::{PredictionTable, evaluate, evaluate_in_sample};
use crate::learn::grid::GridSearchParams;
use crate::learn::{
    Adasyn, ClassifierSpec, Kernel, LearnError, PipelineSpec, Preprocessing, StratifiedKFold,
    SvcParams,
};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to write or read results: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode or decode results as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings shared by the four protocol branches of one study run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    pub kernel: Kernel,
    pub preprocessing: Preprocessing,
    pub grid: bool,
    pub random_seed: u64,
    pub n_splits: usize,
}

impl ProtocolConfig {
    fn base_svc(&self) -> SvcParams {
        SvcParams::new(self.kernel).with_seed(self.random_seed)
    }

    fn classifier(&self) -> ClassifierSpec {
        if self.grid {
            ClassifierSpec::GridSearch(GridSearchParams::regularization_grid(self.base_svc()))
        } else {
            ClassifierSpec::Svc(self.base_svc())
        }
    }

    fn pipeline(&self) -> PipelineSpec {
        PipelineSpec {
            preprocessing: self.preprocessing,
            oversampler: None,
            classifier: self.classifier(),
        }
    }

    /// The oversampling classifier is scored bare: the configured preprocessing
    /// does not apply to it.
    fn oversampling_pipeline(&self, oversampler: Adasyn) -> PipelineSpec {
        PipelineSpec {
            preprocessing: Preprocessing::Identity,
            oversampler: Some(oversampler),
            classifier: self.classifier(),
        }
    }

    fn splitter(&self) -> StratifiedKFold {
        StratifiedKFold::shuffled(self.n_splits, self.random_seed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    WithoutOversampling,
    WithOversampling,
    InSample,
    IncorrectOversampling,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::WithoutOversampling,
        Protocol::WithOversampling,
        Protocol::InSample,
        Protocol::IncorrectOversampling,
    ];

    /// Key prefix used in the persisted results.
    pub fn key(self) -> &'static str {
        match self {
            Protocol::WithoutOversampling => "without_oversampling",
            Protocol::WithOversampling => "with_oversampling",
            Protocol::InSample => "in_sample",
            Protocol::IncorrectOversampling => "incorrect_oversampling",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key().replace('_', " "))
    }
}

/// AUC and per-row predictions for every protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsBundle {
    pub without_oversampling_auc: f64,
    pub without_oversampling_details: PredictionTable,
    pub with_oversampling_auc: f64,
    pub with_oversampling_details: PredictionTable,
    pub in_sample_auc: f64,
    pub in_sample_details: PredictionTable,
    pub incorrect_oversampling_auc: f64,
    pub incorrect_oversampling_details: PredictionTable,
}

impl ResultsBundle {
    pub fn auc(&self, protocol: Protocol) -> f64 {
        match protocol {
            Protocol::WithoutOversampling => self.without_oversampling_auc,
            Protocol::WithOversampling => self.with_oversampling_auc,
            Protocol::InSample => self.in_sample_auc,
            Protocol::IncorrectOversampling => self.incorrect_oversampling_auc,
        }
    }

    pub fn details(&self, protocol: Protocol) -> &PredictionTable {
        match protocol {
            Protocol::WithoutOversampling => &self.without_oversampling_details,
            Protocol::WithOversampling => &self.with_oversampling_details,
            Protocol::InSample => &self.in_sample_details,
            Protocol::IncorrectOversampling => &self.incorrect_oversampling_details,
        }
    }

    /// Writes the bundle as JSON, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), StudyError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        log::info!("Results written to '{}'", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, StudyError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn scored(
    protocol: Protocol,
    table: PredictionTable,
) -> Result<(f64, PredictionTable), StudyError> {
    let auc = table.auc()?;
    log::info!("{protocol}: AUC = {auc:.4} over {} rows", table.len());
    Ok((auc, table))
}

/// Runs the four protocols over an already selected cohort.
pub fn run_protocols(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    config: &ProtocolConfig,
) -> Result<ResultsBundle, StudyError> {
    log::info!(
        "Running protocols on {} rows x {} features ({:?} kernel, grid search {}, {} folds)",
        x.nrows(),
        x.ncols(),
        config.kernel,
        if config.grid { "on" } else { "off" },
        config.n_splits
    );
    let splitter = config.splitter();

    let (without_auc, without) = scored(
        Protocol::WithoutOversampling,
        evaluate(&config.pipeline(), x, y, &splitter)?,
    )?;

    let oversampler = Adasyn::new(config.random_seed);
    let (with_auc, with) = scored(
        Protocol::WithOversampling,
        evaluate(&config.oversampling_pipeline(oversampler.clone()), x, y, &splitter)?,
    )?;

    let plain = PipelineSpec {
        preprocessing: Preprocessing::Identity,
        oversampler: None,
        classifier: ClassifierSpec::Svc(config.base_svc()),
    };
    let (in_sample_auc, in_sample) = scored(Protocol::InSample, evaluate_in_sample(&plain, x, y)?)?;

    let (x_over, y_over) = oversampler.sample(x, y)?;
    let (incorrect_auc, incorrect) = scored(
        Protocol::IncorrectOversampling,
        evaluate(&config.pipeline(), x_over.view(), y_over.view(), &splitter)?,
    )?;

    if incorrect_auc < without_auc {
        log::warn!(
            "Incorrect oversampling scored below no oversampling ({incorrect_auc:.4} < {without_auc:.4})"
        );
    }

    Ok(ResultsBundle {
        without_oversampling_auc: without_auc,
        without_oversampling_details: without,
        with_oversampling_auc: with_auc,
        with_oversampling_details: with,
        in_sample_auc,
        in_sample_details: in_sample,
        incorrect_oversampling_auc: incorrect_auc,
        incorrect_oversampling_details: incorrect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_persisted_field_names() {
        let keys: Vec<&str> = Protocol::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(
            keys,
            vec![
                "without_oversampling",
                "with_oversampling",
                "in_sample",
                "incorrect_oversampling"
            ]
        );
        assert_eq!(Protocol::InSample.to_string(), "in sample");
    }

    #[test]
    fn grid_flag_selects_the_classifier() {
        let mut config = ProtocolConfig {
            kernel: Kernel::Linear,
            preprocessing: Preprocessing::Standardize,
            grid: true,
            random_seed: 3,
            n_splits: 10,
        };
        assert!(matches!(config.classifier(), ClassifierSpec::GridSearch(_)));
        config.grid = false;
        match config.classifier() {
            ClassifierSpec::Svc(params) => {
                assert_eq!(params.kernel, Kernel::Linear);
                assert_eq!(params.random_seed, 3);
            }
            other => panic!("Expected a plain SVC, got {:?}", other),
        }
    }

    #[test]
    fn correct_oversampling_skips_the_configured_preprocessing() {
        let config = ProtocolConfig {
            kernel: Kernel::Rbf,
            preprocessing: Preprocessing::Standardize,
            grid: false,
            random_seed: 1,
            n_splits: 10,
        };
        let spec = config.oversampling_pipeline(Adasyn::new(1));
        assert_eq!(spec.preprocessing, Preprocessing::Identity);
        assert_eq!(spec.oversampler, Some(Adasyn::new(1)));
        assert!(matches!(spec.classifier, ClassifierSpec::Svc(_)));

        let base = config.pipeline();
        assert_eq!(base.preprocessing, Preprocessing::Standardize);
        assert_eq!(base.oversampler, None);
    }
}
