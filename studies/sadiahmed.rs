//! Sadi-Ahmed study: linear SVC on 21 EMD features over a rank-selected cohort.

use crate::cohort::select_cohort;
use crate::config::{Study, StudyConfig};
use crate::data::{FeatureTable, validate_labels};
use crate::protocol::{ResultsBundle, StudyError, run_protocols};
use crate::selection::sadi_ahmed_columns;
use ndarray::ArrayView1;

/// Restricts the table to the study's features and cohort, runs the four
/// protocols, and saves the results.
pub fn study_sadiahmed(
    features: &FeatureTable,
    target: ArrayView1<f64>,
    config: &StudyConfig,
) -> Result<ResultsBundle, StudyError> {
    validate_labels(features, target)?;
    log::info!("Sadi-Ahmed study on {} recordings", features.n_rows());

    let (cohort, labels) = select_cohort(&sadi_ahmed_columns(features)?, target)?;
    let results = run_protocols(
        cohort.values(),
        labels.view(),
        &config.protocol(Study::SadiAhmed),
    )?;
    results.save(&config.output_path(Study::SadiAhmed))?;
    Ok(results)
}
