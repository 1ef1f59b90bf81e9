//! Recording-time window and rank-slice cohort selection for the Sadi-Ahmed study.
//!
//! The published cohort is reproduced by keeping recordings taken between weeks 27
//! and 32, ranking each outcome group by the interval from recording to delivery,
//! and keeping a fixed slice of each ranking. The slice bounds are empirical: they
//! are the ones that best reproduce the published cohort statistics.

use crate::data::{DataError, FeatureTable};
use ndarray::{Array1, ArrayView1, Axis};
use std::ops::{Range, RangeInclusive};

pub const RECTIME_COLUMN: &str = "Rectime";
pub const GESTATION_COLUMN: &str = "Gestation";

/// Inclusive recording-time window, in weeks of gestation.
pub const RECTIME_WINDOW: RangeInclusive<f64> = 27.0..=32.0;

/// Positions kept from the term group once sorted by `Gestation - Rectime`.
pub const TERM_RANK_SLICE: Range<usize> = 10..25;

/// Positions kept from the preterm group once sorted by `Gestation - Rectime`.
pub const PRETERM_RANK_SLICE: Range<usize> = 2..17;

/// Row positions of `group` sorted by ascending `diffs`, sliced to `slice`.
/// The sort is stable, so equal intervals keep their row order.
fn ranked_slice(group: &[usize], diffs: &[f64], slice: Range<usize>, label: &str) -> Vec<usize> {
    let mut order: Vec<usize> = (0..group.len()).collect();
    order.sort_by(|&a, &b| diffs[a].total_cmp(&diffs[b]));

    let start = slice.start.min(order.len());
    let end = slice.end.min(order.len());
    if end - start < slice.len() {
        log::warn!(
            "Only {} {label} recordings available for rank slice {:?}; keeping {}",
            order.len(),
            slice,
            end - start
        );
    }
    order[start..end].iter().map(|&i| group[i]).collect()
}

/// Filters and orders the rows of `table` into the study cohort: term rows first,
/// then preterm rows. The metadata columns are dropped from the result.
pub fn select_cohort(
    table: &FeatureTable,
    labels: ArrayView1<f64>,
) -> Result<(FeatureTable, Array1<f64>), DataError> {
    let rectime = table.column(RECTIME_COLUMN)?;
    let gestation = table.column(GESTATION_COLUMN)?;

    let in_window: Vec<usize> = (0..table.n_rows())
        .filter(|&i| RECTIME_WINDOW.contains(&rectime[i]))
        .collect();
    log::info!(
        "{} of {} recordings fall in the recording-time window {:?}",
        in_window.len(),
        table.n_rows(),
        RECTIME_WINDOW
    );

    let (term, preterm): (Vec<usize>, Vec<usize>) =
        in_window.iter().partition(|&&i| labels[i] == 1.0);
    let diffs = |rows: &[usize]| -> Vec<f64> {
        rows.iter().map(|&i| gestation[i] - rectime[i]).collect()
    };

    let mut cohort = ranked_slice(&term, &diffs(term.as_slice()), TERM_RANK_SLICE, "term");
    let n_term = cohort.len();
    cohort.extend(ranked_slice(
        &preterm,
        &diffs(preterm.as_slice()),
        PRETERM_RANK_SLICE,
        "preterm",
    ));
    log::info!(
        "Selected cohort of {} term and {} preterm recordings",
        n_term,
        cohort.len() - n_term
    );

    let selected = table
        .select_rows(&cohort)
        .drop_columns(&[RECTIME_COLUMN, GESTATION_COLUMN])?;
    Ok((selected, labels.select(Axis(0), &cohort)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// `n` rows alternating term/preterm, all inside the window, with the
    /// delivery interval decreasing with the row index.
    fn synthetic(n: usize) -> (FeatureTable, Array1<f64>) {
        let values = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => 30.0,
            _ => 30.0 + (n - i) as f64,
        });
        let table = FeatureTable::new(
            vec!["f".into(), RECTIME_COLUMN.into(), GESTATION_COLUMN.into()],
            values,
        )
        .unwrap();
        let labels = Array1::from_shape_fn(n, |i| if i % 2 == 0 { 1.0 } else { 0.0 });
        (table, labels)
    }

    #[test]
    fn metadata_columns_are_dropped() {
        let (table, labels) = synthetic(60);
        let (cohort, _) = select_cohort(&table, labels.view()).unwrap();
        assert_eq!(cohort.names(), &["f".to_string()]);
    }

    #[test]
    fn rows_outside_window_are_excluded() {
        let (table, labels) = synthetic(60);
        let mut values = table.values().to_owned();
        for i in 0..10 {
            values[[i, 1]] = 26.5;
        }
        let shifted = FeatureTable::new(table.names().to_vec(), values).unwrap();
        let (cohort, _) = select_cohort(&shifted, labels.view()).unwrap();
        assert!(cohort.column("f").unwrap().iter().all(|&v| v >= 10.0));
    }

    #[test]
    fn short_groups_are_truncated() {
        let (table, labels) = synthetic(20);
        let (cohort, kept) = select_cohort(&table, labels.view()).unwrap();
        // 10 term rows keep nothing from [10, 25); 10 preterm rows keep [2, 10).
        assert_eq!(kept.iter().filter(|&&v| v == 1.0).count(), 0);
        assert_eq!(kept.len(), 8);
        assert_eq!(cohort.n_rows(), 8);
    }

    #[test]
    fn missing_metadata_column_is_an_error() {
        let table = FeatureTable::new(vec!["f".into()], Array2::zeros((4, 1))).unwrap();
        let labels = Array1::zeros(4);
        assert!(matches!(
            select_cohort(&table, labels.view()),
            Err(DataError::ColumnNotFound(_))
        ));
    }
}
