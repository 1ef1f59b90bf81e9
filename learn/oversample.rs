//! # ADASYN Oversampling
//!
//! Adaptive synthetic sampling (He et al., 2008). Minority rows whose
//! neighbourhoods are dominated by the majority class receive proportionally more
//! synthetic neighbours. Each synthetic row lies on the segment between a minority
//! row and one of its nearest minority neighbours.
//!
//! The oversampler declines to act (and returns a copy of its input) when the
//! classes are already close to balanced (`n_min / n_maj > d_th`), when no minority
//! row has a majority neighbour, or when there are fewer than two minority rows.

use crate::learn::estimator::{LearnError, check_training_input, class_counts};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Adasyn {
    pub n_neighbors: usize,
    /// Imbalance threshold above which no oversampling happens.
    pub d_th: f64,
    /// Desired balance level after oversampling; 1.0 generates up to full balance.
    pub beta: f64,
    pub random_seed: u64,
}

impl Adasyn {
    pub fn new(random_seed: u64) -> Self {
        Self {
            n_neighbors: 5,
            d_th: 0.9,
            beta: 1.0,
            random_seed,
        }
    }

    /// Returns the input rows followed by the synthetic minority rows.
    pub fn sample(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>), LearnError> {
        check_training_input(x, y)?;
        let (negatives, positives) = class_counts(y);
        let (min_label, n_min, n_maj) = if positives < negatives {
            (1.0, positives, negatives)
        } else {
            (0.0, negatives, positives)
        };

        if n_min < 2 {
            log::warn!("ADASYN needs at least two minority rows, found {n_min}; not oversampling");
            return Ok((x.to_owned(), y.to_owned()));
        }
        let imbalance = n_min as f64 / n_maj as f64;
        if imbalance > self.d_th {
            log::debug!(
                "Imbalance ratio {imbalance:.3} exceeds d_th = {}; not oversampling",
                self.d_th
            );
            return Ok((x.to_owned(), y.to_owned()));
        }

        let minority_rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == min_label).collect();
        let x_min = x.select(Axis(0), &minority_rows);
        let k = (self.n_neighbors + 1).min(n_min);

        // Share of majority rows among each minority row's neighbours in the full set.
        let ratios: Vec<f64> = minority_rows
            .iter()
            .map(|&row| {
                let neighbours = nearest_neighbours(x, x.row(row), k);
                let majority = neighbours
                    .iter()
                    .skip(1)
                    .filter(|&&nb| y[nb] != min_label)
                    .count();
                majority as f64 / self.n_neighbors as f64
            })
            .collect();
        let ratio_sum: f64 = ratios.iter().sum();
        if ratio_sum == 0.0 {
            log::warn!("No minority row has a majority neighbour; not oversampling");
            return Ok((x.to_owned(), y.to_owned()));
        }

        // Truncated, then exactly this many base rows are drawn by weight.
        let to_generate = ((n_maj - n_min) as f64 * self.beta) as usize;
        let weights = WeightedIndex::new(&ratios)
            .map_err(|_| LearnError::NonFinite("ADASYN neighbourhood weights"))?;
        let neighbourhoods: Vec<Vec<usize>> = (0..n_min)
            .map(|i| nearest_neighbours(x_min.view(), x_min.row(i), k))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.random_seed);
        let mut synthetic: Vec<Array1<f64>> = Vec::with_capacity(to_generate);
        for _ in 0..to_generate {
            let i = weights.sample(&mut rng);
            let Some(&partner) = neighbourhoods[i][1..].choose(&mut rng) else {
                continue;
            };
            let base = x_min.row(i);
            let step: f64 = rng.gen_range(0.0..1.0);
            synthetic.push(&base + &((&x_min.row(partner) - &base) * step));
        }

        let n = y.len();
        let n_synthetic = synthetic.len();
        let mut x_out = Array2::zeros((n + n_synthetic, x.ncols()));
        x_out.slice_mut(s![..n, ..]).assign(&x);
        for (offset, row) in synthetic.iter().enumerate() {
            x_out.row_mut(n + offset).assign(row);
        }
        let y_out = y
            .iter()
            .copied()
            .chain(std::iter::repeat_n(min_label, n_synthetic))
            .collect::<Array1<f64>>();
        log::debug!("ADASYN generated {n_synthetic} synthetic minority rows");
        Ok((x_out, y_out))
    }
}

/// Indices of the `k` rows of `data` closest to `query` (Euclidean), nearest
/// first. Distance ties are broken by row index.
fn nearest_neighbours(data: ArrayView2<f64>, query: ArrayView1<f64>, k: usize) -> Vec<usize> {
    let mut distances: Vec<(f64, usize)> = data
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, row)| {
            let d: f64 = row.iter().zip(query.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
            (d, i)
        })
        .collect();
    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    distances.into_iter().take(k).map(|(_, i)| i).collect()
}
