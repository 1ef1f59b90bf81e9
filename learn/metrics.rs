use crate::learn::estimator::LearnError;
use ndarray::ArrayView1;

/// Area under the ROC curve, computed through the Mann-Whitney rank statistic.
///
/// Tied scores receive their average rank, so a tie between a positive and a
/// negative contributes one half. Labels above 0.5 count as positives.
pub fn roc_auc(labels: ArrayView1<f64>, scores: ArrayView1<f64>) -> Result<f64, LearnError> {
    if labels.len() != scores.len() {
        return Err(LearnError::ShapeMismatch {
            rows: scores.len(),
            labels: labels.len(),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(LearnError::NonFinite("scores passed to ROC AUC"));
    }

    let n = labels.len();
    let n_pos = labels.iter().filter(|&&t| t > 0.5).count() as f64;
    let n_neg = n as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Err(LearnError::SingleClass("ROC AUC"));
    }

    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&i, &j| scores[i].total_cmp(&scores[j]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[idx[j]] == scores[idx[i]] {
            j += 1;
        }
        let avg_rank = (i + j - 1) as f64 / 2.0 + 1.0;
        for &k in &idx[i..j] {
            ranks[k] = avg_rank;
        }
        i = j;
    }

    let sum_ranks_pos: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|&(&t, _)| t > 0.5)
        .map(|(_, &r)| r)
        .sum();

    // U = sum_ranks_pos - n_pos * (n_pos + 1) / 2
    Ok((sum_ranks_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn perfect_ranking_scores_one() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.2, 0.8, 0.9];
        assert_abs_diff_eq!(roc_auc(y.view(), p.view()).unwrap(), 1.0);
    }

    #[test]
    fn inverted_ranking_scores_zero() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        let p = array![0.1, 0.2, 0.8, 0.9];
        assert_abs_diff_eq!(roc_auc(y.view(), p.view()).unwrap(), 0.0);
    }

    #[test]
    fn ties_count_as_half() {
        let y = array![0.0, 1.0];
        let p = array![0.5, 0.5];
        assert_abs_diff_eq!(roc_auc(y.view(), p.view()).unwrap(), 0.5);
    }

    #[test]
    fn matches_pairwise_count() {
        // pairs (pos, neg): (0.35 > 0.1), (0.35 < 0.4), (0.8 > 0.1), (0.8 > 0.4)
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.4, 0.35, 0.8];
        assert_abs_diff_eq!(roc_auc(y.view(), p.view()).unwrap(), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn single_class_is_an_error() {
        let y = array![1.0, 1.0];
        let p = array![0.3, 0.4];
        assert!(matches!(
            roc_auc(y.view(), p.view()),
            Err(LearnError::SingleClass(_))
        ));
    }
}
