use crate::learn::estimator::LearnError;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Column-wise standardisation to zero mean and unit (population) variance.
/// Columns with zero variance are centred but left unscaled.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    fitted: Option<(Array1<f64>, Array1<f64>)>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self { fitted: None }
    }

    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<(), LearnError> {
        if x.nrows() == 0 {
            return Err(LearnError::EmptyInput);
        }
        let mean = x.mean_axis(Axis(0)).ok_or(LearnError::EmptyInput)?;
        let mut scale = x.std_axis(Axis(0), 0.0);
        scale.mapv_inplace(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        self.fitted = Some((mean, scale));
        Ok(())
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, LearnError> {
        let (mean, scale) = self.fitted.as_ref().ok_or(LearnError::NotFitted)?;
        if x.ncols() != mean.len() {
            return Err(LearnError::FeatureCountMismatch {
                expected: mean.len(),
                found: x.ncols(),
            });
        }
        Ok((&x - mean) / scale)
    }

    pub fn fit_transform(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>, LearnError> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn transformed_columns_have_zero_mean_and_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let mut scaler = StandardScaler::new();
        let z = scaler.fit_transform(x.view()).unwrap();
        for column in z.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(column.std(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_column_is_only_centred() {
        let x = array![[5.0, 1.0], [5.0, 3.0]];
        let mut scaler = StandardScaler::new();
        let z = scaler.fit_transform(x.view()).unwrap();
        assert_abs_diff_eq!(z[[0, 0]], 0.0);
        assert_abs_diff_eq!(z[[1, 0]], 0.0);
    }

    #[test]
    fn training_statistics_are_reused_on_new_rows() {
        let train = array![[0.0], [2.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(train.view()).unwrap();
        let z = scaler.transform(array![[4.0]].view()).unwrap();
        assert_abs_diff_eq!(z[[0, 0]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn column_count_must_match_training() {
        let mut scaler = StandardScaler::new();
        scaler.fit(array![[0.0, 1.0]].view()).unwrap();
        assert!(matches!(
            scaler.transform(array![[0.0]].view()),
            Err(LearnError::FeatureCountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }
}
