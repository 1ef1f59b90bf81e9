//! Feature subsets used by the two studies.

use crate::data::{DataError, FeatureTable};
use crate::learn::LearnError;
use crate::learn::forest::{ForestParams, feature_importances};
use itertools::Itertools;
use ndarray::ArrayView1;

/// EMD-derived features of the Sadi-Ahmed study: IMFs 3 and 6 on all three channels.
pub const SADI_AHMED_FEATURES: [&str; 21] = [
    "FeaturesSadiAhmed_emd_3_n_peaks_ch1",
    "FeaturesSadiAhmed_emd_3_fwh_peak_freq_ch1",
    "FeaturesSadiAhmed_emd_3_gap_ch1",
    "FeaturesSadiAhmed_emd_6_n_peaks_ch1",
    "FeaturesSadiAhmed_emd_6_med_freq_ch1",
    "FeaturesSadiAhmed_emd_6_fwh_peak_power_ch1",
    "FeaturesSadiAhmed_emd_6_fwl_peak_power_ch1",
    "FeaturesSadiAhmed_emd_3_n_peaks_ch2",
    "FeaturesSadiAhmed_emd_3_fwh_peak_freq_ch2",
    "FeaturesSadiAhmed_emd_3_gap_ch2",
    "FeaturesSadiAhmed_emd_6_n_peaks_ch2",
    "FeaturesSadiAhmed_emd_6_med_freq_ch2",
    "FeaturesSadiAhmed_emd_6_fwh_peak_power_ch2",
    "FeaturesSadiAhmed_emd_6_fwl_peak_power_ch2",
    "FeaturesSadiAhmed_emd_3_n_peaks_ch3",
    "FeaturesSadiAhmed_emd_3_fwh_peak_freq_ch3",
    "FeaturesSadiAhmed_emd_3_gap_ch3",
    "FeaturesSadiAhmed_emd_6_n_peaks_ch3",
    "FeaturesSadiAhmed_emd_6_med_freq_ch3",
    "FeaturesSadiAhmed_emd_6_fwh_peak_power_ch3",
    "FeaturesSadiAhmed_emd_6_fwl_peak_power_ch3",
];

/// Seed of the importance forest used by the Hosseinzahde study.
pub const IMPORTANCE_SEED: u64 = 5;

pub const TOP_FEATURE_COUNT: usize = 10;

/// Column indices ordered by descending importance. Equal importances are
/// ordered by descending column index.
pub fn rank_by_importance(importances: ArrayView1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..importances.len()).collect();
    order.sort_by(|&a, &b| importances[b].total_cmp(&importances[a]).then(b.cmp(&a)));
    order
}

/// Names of the `TOP_FEATURE_COUNT` columns with the highest random-forest
/// importance, most important first. Tables with fewer columns keep them all.
pub fn top_features_by_importance(
    table: &FeatureTable,
    labels: ArrayView1<f64>,
) -> Result<Vec<String>, LearnError> {
    let importances = feature_importances(
        table.values(),
        labels,
        &ForestParams::new(IMPORTANCE_SEED),
    )?;
    let selected: Vec<String> = rank_by_importance(importances.view())
        .into_iter()
        .take(TOP_FEATURE_COUNT)
        .map(|i| table.names()[i].clone())
        .collect();
    log::info!("Selected features by importance: {}", selected.iter().join(", "));
    Ok(selected)
}

/// The fixed Sadi-Ahmed feature list plus the cohort metadata columns.
pub fn sadi_ahmed_columns(table: &FeatureTable) -> Result<FeatureTable, DataError> {
    let mut names: Vec<&str> = SADI_AHMED_FEATURES.to_vec();
    names.extend([
        crate::cohort::RECTIME_COLUMN,
        crate::cohort::GESTATION_COLUMN,
    ]);
    table.select_columns(&names)
}
