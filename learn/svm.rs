//! # Support Vector Classification
//!
//! A C-SVC solved with sequential minimal optimisation, following the libsvm
//! formulation:
//!
//! - The dual `min 0.5 aᵀQa − eᵀa` subject to `0 ≤ a ≤ C` and `yᵀa = 0` is solved
//!   with second-order working set selection (Fan, Chen and Lin, 2005). The full
//!   kernel matrix is cached, which is fine for cohorts of a few hundred rows.
//! - Probabilities come from Platt scaling. The sigmoid is fitted on decision
//!   values obtained by an internal 5-fold cross-validation over the training rows
//!   (Lin, Lin and Weng, 2007), so the calibration is not fitted on in-sample
//!   margins.
//!
//! Label 1 is the positive class of the decision function.

use crate::learn::estimator::{Classifier, LearnError, check_training_input, class_counts};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const TAU: f64 = 1e-12;
const MIN_ITERATION_LIMIT: usize = 10_000_000;

/// Kernel family. The RBF width is derived from the training data at fit time as
/// `gamma = 1 / (n_features * Var(X))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvcParams {
    pub kernel: Kernel,
    /// Regularisation constant.
    pub c: f64,
    /// Stopping tolerance on the maximal KKT violation.
    pub tolerance: f64,
    /// Number of internal folds used to collect decision values for Platt scaling.
    pub probability_folds: usize,
    /// Seeds the internal fold permutation.
    pub random_seed: u64,
}

impl SvcParams {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            c: 1.0,
            tolerance: 1e-3,
            probability_folds: 5,
            random_seed: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct KernelFunction {
    kind: Kernel,
    gamma: f64,
}

impl KernelFunction {
    fn for_data(kind: Kernel, x: ArrayView2<f64>) -> Self {
        let gamma = match kind {
            Kernel::Linear => 0.0,
            Kernel::Rbf => {
                let variance = x.var(0.0);
                if variance > 0.0 && x.ncols() > 0 {
                    1.0 / (x.ncols() as f64 * variance)
                } else {
                    1.0
                }
            }
        };
        Self { kind, gamma }
    }

    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.kind {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf => {
                let sq_dist: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
                (-self.gamma * sq_dist).exp()
            }
        }
    }
}

/// The solved dual restricted to its support vectors.
#[derive(Debug, Clone)]
struct DualModel {
    support: Array2<f64>,
    /// `alpha_i * y_i` for each support vector.
    coef: Array1<f64>,
    rho: f64,
    kernel: KernelFunction,
}

impl DualModel {
    fn decision(&self, row: ArrayView1<f64>) -> f64 {
        self.support
            .axis_iter(Axis(0))
            .zip(self.coef.iter())
            .map(|(sv, &coef)| coef * self.kernel.eval(sv, row))
            .sum::<f64>()
            - self.rho
    }
}

/// Solves the C-SVC dual for labels `signs` in `{-1, +1}`.
fn solve_dual(
    x: ArrayView2<f64>,
    signs: &[f64],
    kernel: KernelFunction,
    c: f64,
    tolerance: f64,
) -> DualModel {
    let n = signs.len();
    let mut q = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let value = signs[i] * signs[j] * kernel.eval(x.row(i), x.row(j));
            q[[i, j]] = value;
            q[[j, i]] = value;
        }
    }
    let diag: Vec<f64> = (0..n).map(|i| q[[i, i]]).collect();

    let mut alpha = vec![0.0; n];
    let mut grad = vec![-1.0; n];
    let limit = MIN_ITERATION_LIMIT.max(100 * n);
    let mut iterations = 0;

    while let Some((i, j)) = select_working_set(&q, &diag, signs, &alpha, &grad, c, tolerance) {
        iterations += 1;
        if iterations > limit {
            log::warn!("SMO reached the iteration limit ({limit}) before converging");
            break;
        }

        let (old_i, old_j) = (alpha[i], alpha[j]);
        if signs[i] != signs[j] {
            let quad = (diag[i] + diag[j] + 2.0 * q[[i, j]]).max(TAU);
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let quad = (diag[i] + diag[j] - 2.0 * q[[i, j]]).max(TAU);
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let delta_i = alpha[i] - old_i;
        let delta_j = alpha[j] - old_j;
        for k in 0..n {
            grad[k] += q[[i, k]] * delta_i + q[[j, k]] * delta_j;
        }
    }
    log::trace!("SMO finished after {iterations} iterations on {n} rows");

    let rho = compute_rho(signs, &alpha, &grad, c);
    let support_rows: Vec<usize> = (0..n).filter(|&i| alpha[i] > 0.0).collect();
    DualModel {
        support: x.select(Axis(0), &support_rows),
        coef: support_rows.iter().map(|&i| alpha[i] * signs[i]).collect(),
        rho,
        kernel,
    }
}

/// Second-order working set selection. Returns `None` once the maximal violating
/// pair is within `tolerance`.
fn select_working_set(
    q: &Array2<f64>,
    diag: &[f64],
    signs: &[f64],
    alpha: &[f64],
    grad: &[f64],
    c: f64,
    tolerance: f64,
) -> Option<(usize, usize)> {
    let n = signs.len();
    let mut gmax = f64::NEG_INFINITY;
    let mut selected_i = None;
    for t in 0..n {
        if signs[t] > 0.0 {
            if alpha[t] < c && -grad[t] >= gmax {
                gmax = -grad[t];
                selected_i = Some(t);
            }
        } else if alpha[t] > 0.0 && grad[t] >= gmax {
            gmax = grad[t];
            selected_i = Some(t);
        }
    }
    let i = selected_i?;

    let mut gmax2 = f64::NEG_INFINITY;
    let mut selected_j = None;
    let mut obj_diff_min = f64::INFINITY;
    for t in 0..n {
        let (grad_diff, quad) = if signs[t] > 0.0 {
            if alpha[t] <= 0.0 {
                continue;
            }
            gmax2 = gmax2.max(grad[t]);
            (gmax + grad[t], diag[i] + diag[t] - 2.0 * signs[i] * q[[i, t]])
        } else {
            if alpha[t] >= c {
                continue;
            }
            gmax2 = gmax2.max(-grad[t]);
            (gmax - grad[t], diag[i] + diag[t] + 2.0 * signs[i] * q[[i, t]])
        };
        if grad_diff > 0.0 {
            let obj_diff = -(grad_diff * grad_diff) / quad.max(TAU);
            if obj_diff <= obj_diff_min {
                obj_diff_min = obj_diff;
                selected_j = Some(t);
            }
        }
    }

    if gmax + gmax2 < tolerance {
        return None;
    }
    selected_j.map(|j| (i, j))
}

fn compute_rho(signs: &[f64], alpha: &[f64], grad: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;
    for t in 0..signs.len() {
        let yg = signs[t] * grad[t];
        let at_upper = alpha[t] >= c;
        let at_lower = alpha[t] <= 0.0;
        if at_upper {
            if signs[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if at_lower {
            if signs[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }
    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}

/// Decision values for every training row, each produced by a model that never
/// saw that row.
fn cross_validated_decisions(
    x: ArrayView2<f64>,
    signs: &[f64],
    kernel: KernelFunction,
    params: &SvcParams,
) -> Vec<f64> {
    let n = signs.len();
    let folds = params.probability_folds.max(2).min(n.max(1));
    let mut rng = StdRng::seed_from_u64(params.random_seed);
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut rng);

    let mut decisions = vec![0.0; n];
    for fold in 0..folds {
        let begin = fold * n / folds;
        let end = (fold + 1) * n / folds;
        let train: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        let held_out = &perm[begin..end];

        let positives = train.iter().filter(|&&t| signs[t] > 0.0).count();
        let negatives = train.len() - positives;
        let constant = match (positives, negatives) {
            (0, 0) => Some(0.0),
            (_, 0) => Some(1.0),
            (0, _) => Some(-1.0),
            _ => None,
        };
        if let Some(value) = constant {
            for &t in held_out {
                decisions[t] = value;
            }
            continue;
        }

        let sub_x = x.select(Axis(0), &train);
        let sub_signs: Vec<f64> = train.iter().map(|&t| signs[t]).collect();
        let model = solve_dual(sub_x.view(), &sub_signs, kernel, params.c, params.tolerance);
        for &t in held_out {
            decisions[t] = model.decision(x.row(t));
        }
    }
    decisions
}

fn platt_probability(decision: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

fn platt_objective(decisions: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decisions
        .iter()
        .zip(targets)
        .map(|(&d, &t)| {
            let f_apb = d * a + b;
            if f_apb >= 0.0 {
                t * f_apb + (1.0 + (-f_apb).exp()).ln()
            } else {
                (t - 1.0) * f_apb + (1.0 + f_apb.exp()).ln()
            }
        })
        .sum()
}

/// Fits `P(y = 1 | f) = 1 / (1 + exp(A f + B))` with a Newton method and
/// backtracking line search, using Platt's regularised targets.
fn fit_platt(decisions: &[f64], signs: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = signs.iter().filter(|&&s| s > 0.0).count() as f64;
    let prior0 = signs.len() as f64 - prior1;
    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = signs
        .iter()
        .map(|&s| if s > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = platt_objective(decisions, &targets, a, b);

    for iter in 0..MAX_ITER {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (SIGMA, SIGMA, 0.0, 0.0, 0.0);
        for (&d, &t) in decisions.iter().zip(&targets) {
            let p = platt_probability(d, a, b);
            let d2 = p * (1.0 - p);
            h11 += d * d * d2;
            h22 += d2;
            h21 += d * d2;
            let d1 = t - p;
            g1 += d * d1;
            g2 += d1;
        }
        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = platt_objective(decisions, &targets, new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }
        if step < MIN_STEP {
            log::debug!("Platt scaling line search failed at iteration {iter}");
            break;
        }
        if iter + 1 == MAX_ITER {
            log::debug!("Platt scaling reached the maximal number of iterations");
        }
    }
    (a, b)
}

#[derive(Debug, Clone)]
struct FittedSvc {
    model: DualModel,
    platt: (f64, f64),
    n_features: usize,
}

/// Probabilistic support vector classifier.
#[derive(Debug, Clone)]
pub struct Svc {
    params: SvcParams,
    fitted: Option<FittedSvc>,
}

impl Svc {
    pub fn new(params: SvcParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &SvcParams {
        &self.params
    }

    fn fitted_for(&self, x: ArrayView2<f64>) -> Result<&FittedSvc, LearnError> {
        let fitted = self.fitted.as_ref().ok_or(LearnError::NotFitted)?;
        if x.ncols() != fitted.n_features {
            return Err(LearnError::FeatureCountMismatch {
                expected: fitted.n_features,
                found: x.ncols(),
            });
        }
        Ok(fitted)
    }

    /// Signed distance to the separating surface; positive values favour label 1.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, LearnError> {
        let fitted = self.fitted_for(x)?;
        Ok(x.axis_iter(Axis(0)).map(|row| fitted.model.decision(row)).collect())
    }
}

impl Classifier for Svc {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), LearnError> {
        check_training_input(x, y)?;
        let (negatives, positives) = class_counts(y);
        if negatives == 0 || positives == 0 {
            return Err(LearnError::SingleClass("SVC"));
        }

        let signs: Vec<f64> = y.iter().map(|&v| if v > 0.5 { 1.0 } else { -1.0 }).collect();
        let kernel = KernelFunction::for_data(self.params.kernel, x);
        let model = solve_dual(x, &signs, kernel, self.params.c, self.params.tolerance);
        let decisions = cross_validated_decisions(x, &signs, kernel, &self.params);
        let platt = fit_platt(&decisions, &signs);
        log::trace!(
            "SVC fitted: {} support vectors of {} rows, C = {:e}, Platt (A, B) = ({:.4}, {:.4})",
            model.coef.len(),
            signs.len(),
            self.params.c,
            platt.0,
            platt.1
        );

        self.fitted = Some(FittedSvc {
            model,
            platt,
            n_features: x.ncols(),
        });
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, LearnError> {
        let fitted = self.fitted_for(x)?;
        let (a, b) = fitted.platt;
        Ok(x.axis_iter(Axis(0))
            .map(|row| platt_probability(fitted.model.decision(row), a, b))
            .collect())
    }
}
