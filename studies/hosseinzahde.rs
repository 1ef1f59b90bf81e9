//! Hosseinzahde study: RBF SVC on the ten most important features.

use crate::config::{Study, StudyConfig};
use crate::data::{FeatureTable, validate_labels};
use crate::protocol::{ResultsBundle, StudyError, run_protocols};
use crate::selection::top_features_by_importance;
use ndarray::ArrayView1;

/// Selects features by random-forest importance on the full table, runs the four
/// protocols, and saves the results.
pub fn study_hosseinzahde(
    features: &FeatureTable,
    target: ArrayView1<f64>,
    config: &StudyConfig,
) -> Result<ResultsBundle, StudyError> {
    validate_labels(features, target)?;
    log::info!("Hosseinzahde study on {} recordings", features.n_rows());

    let selected = features.select_columns(&top_features_by_importance(features, target)?)?;
    let results = run_protocols(
        selected.values(),
        target,
        &config.protocol(Study::Hosseinzahde),
    )?;
    results.save(&config.output_path(Study::Hosseinzahde))?;
    Ok(results)
}
