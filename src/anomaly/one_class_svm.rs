//! One-class SVM with an RBF kernel, trained by sequential minimal optimisation.
//!
//! The dual problem is
//!
//! ```text
//! min 1/2 a'Qa   subject to   0 <= a_i <= 1,   sum(a) = nu * l
//! ```
//!
//! with `Q_ij = K(x_i, x_j)`. Each step moves the pair of coefficients that
//! violates the optimality conditions the most.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::OutlierDetector;
use crate::error::{Error, Result};
use crate::neighbors::squared_distance;
use crate::parsing::check_features;

/// Stop once the maximal violation drops below this
const TOLERANCE: f64 = 1e-3;
const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// 1 / (n_features * var(X))
    Scale,
    Value(f64),
}

impl Gamma {
    fn resolve(self, inputs: &ArrayView2<f64>) -> f64 {
        match self {
            Gamma::Value(gamma) => gamma,
            Gamma::Scale => {
                let var = inputs.var(0.0);
                if var > 0.0 {
                    1.0 / (inputs.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OneClassSvm {
    pub nu: f64,
    pub gamma: Gamma,
    pub max_iter: usize,
    support_vectors: Option<Array2<f64>>,
    dual_coef: Array1<f64>,
    rho: f64,
    fitted_gamma: f64,
}

impl OneClassSvm {
    pub fn new(nu: f64, gamma: Gamma) -> OneClassSvm {
        OneClassSvm {
            nu,
            gamma,
            max_iter: 100_000,
            support_vectors: None,
            dual_coef: Array1::zeros(0),
            rho: 0.0,
            fitted_gamma: 0.0,
        }
    }

    pub fn n_support(&self) -> usize {
        self.dual_coef.len()
    }

    pub fn dual_coef(&self) -> &Array1<f64> {
        &self.dual_coef
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    fn kernel(&self, a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        (-self.fitted_gamma * squared_distance(a, b)).exp()
    }
}

impl Default for OneClassSvm {
    fn default() -> Self {
        OneClassSvm::new(0.5, Gamma::Scale)
    }
}

/// Solver state over the full training set
struct Smo {
    q: Array2<f64>,
    alpha: Array1<f64>,
    grad: Array1<f64>,
}

impl Smo {
    fn new(q: Array2<f64>, nu: f64) -> Smo {
        let l = q.nrows();
        let budget = nu * l as f64;
        let full = budget.floor() as usize;

        let mut alpha = Array1::zeros(l);
        for i in 0..full.min(l) {
            alpha[i] = 1.0;
        }
        if full < l {
            alpha[full] = budget - full as f64;
        }

        let grad = q.dot(&alpha);
        Smo { q, alpha, grad }
    }

    /// Indices (i, j) of the maximal violating pair, or None once optimal within tolerance
    fn select_pair(&self) -> Option<(usize, usize)> {
        let mut up = (f64::NEG_INFINITY, None);
        let mut low = (f64::INFINITY, None);

        for (t, (&a, &g)) in self.alpha.iter().zip(self.grad.iter()).enumerate() {
            if a < 1.0 && -g > up.0 {
                up = (-g, Some(t));
            }
            if a > 0.0 && -g < low.0 {
                low = (-g, Some(t));
            }
        }

        match (up, low) {
            ((m, Some(i)), (big_m, Some(j))) if m - big_m >= TOLERANCE => Some((i, j)),
            _ => None,
        }
    }

    /// Move mass from `j` to `i`, keeping the sum and the box constraints
    fn step(&mut self, i: usize, j: usize) {
        let (old_i, old_j) = (self.alpha[i], self.alpha[j]);
        let mut quad = self.q[[i, i]] + self.q[[j, j]] - 2.0 * self.q[[i, j]];
        if quad <= 0.0 {
            quad = TAU;
        }

        let delta = (self.grad[i] - self.grad[j]) / quad;
        let sum = old_i + old_j;
        let mut new_i = old_i - delta;
        let mut new_j = old_j + delta;

        if sum > 1.0 {
            if new_i > 1.0 {
                new_i = 1.0;
                new_j = sum - 1.0;
            }
            if new_j > 1.0 {
                new_j = 1.0;
                new_i = sum - 1.0;
            }
        } else {
            if new_j < 0.0 {
                new_j = 0.0;
                new_i = sum;
            }
            if new_i < 0.0 {
                new_i = 0.0;
                new_j = sum;
            }
        }

        self.alpha[i] = new_i;
        self.alpha[j] = new_j;

        let (d_i, d_j) = (new_i - old_i, new_j - old_j);
        let q_i = self.q.row(i);
        let q_j = self.q.row(j);
        for (k, g) in self.grad.iter_mut().enumerate() {
            *g += q_i[k] * d_i + q_j[k] * d_j;
        }
    }

    /// Offset: mean gradient over free coefficients, or the midpoint of the bounds
    fn rho(&self) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut free_sum = 0.0;
        let mut n_free = 0;

        for (&a, &g) in self.alpha.iter().zip(self.grad.iter()) {
            if a >= 1.0 {
                lower = lower.max(g);
            } else if a <= 0.0 {
                upper = upper.min(g);
            } else {
                n_free += 1;
                free_sum += g;
            }
        }

        if n_free > 0 {
            free_sum / n_free as f64
        } else {
            (upper + lower) / 2.0
        }
    }
}

impl OutlierDetector for OneClassSvm {
    fn fit(&mut self, inputs: &ArrayView2<f64>) -> Result<()> {
        if inputs.nrows() == 0 {
            return Err(Error::dataset("cannot fit a one-class SVM on zero rows"));
        }
        if !(self.nu > 0.0 && self.nu <= 1.0) {
            return Err(Error::invalid_parameter(format!(
                "nu must lie in (0, 1], got {}",
                self.nu
            )));
        }

        self.fitted_gamma = self.gamma.resolve(inputs);
        if self.fitted_gamma <= 0.0 {
            return Err(Error::invalid_parameter("gamma must be positive"));
        }

        let l = inputs.nrows();
        let mut q = Array2::<f64>::zeros((l, l));
        for i in 0..l {
            for j in i..l {
                let k = self.kernel(&inputs.row(i), &inputs.row(j));
                q[[i, j]] = k;
                q[[j, i]] = k;
            }
        }

        let mut smo = Smo::new(q, self.nu);
        let mut iterations = 0;
        while let Some((i, j)) = smo.select_pair() {
            if iterations >= self.max_iter {
                tracing::warn!(
                    iterations,
                    "One-class SVM reached the iteration cap before converging"
                );
                break;
            }
            smo.step(i, j);
            iterations += 1;
        }

        self.rho = smo.rho();
        let support: Vec<usize> = (0..l).filter(|&i| smo.alpha[i] > 0.0).collect();
        self.dual_coef = smo.alpha.select(Axis(0), &support);
        self.support_vectors = Some(inputs.select(Axis(0), &support));

        tracing::debug!(
            iterations,
            n_support = support.len(),
            rho = self.rho,
            gamma = self.fitted_gamma,
            "Fitted one-class SVM"
        );

        Ok(())
    }

    /// Kernel expansion `sum_i a_i K(x_i, x)`
    fn score_samples(&self, inputs: &ArrayView2<f64>) -> Result<Array1<f64>> {
        let support = self.support_vectors.as_ref().ok_or(Error::NotFitted("OneClassSvm"))?;
        check_features(inputs, support.ncols())?;

        Ok(inputs
            .axis_iter(Axis(0))
            .map(|row| {
                support
                    .axis_iter(Axis(0))
                    .zip(self.dual_coef.iter())
                    .map(|(sv, a)| a * self.kernel(&sv, &row))
                    .sum()
            })
            .collect())
    }

    fn decision_function(&self, inputs: &ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.score_samples(inputs)? - self.rho)
    }

    fn name(&self) -> &'static str {
        "OneClassSvm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::OUTLIER;
    use crate::parsing::synthetic::make_blobs;
    use ndarray::{arr2, concatenate, s};

    fn cloud_with_outliers() -> Array2<f64> {
        let blob = make_blobs(100, &arr2(&[[0.0, 0.0]]), 1.0, 9).unwrap().data;
        let far = arr2(&[[8.0, 8.0], [-8.0, 7.0]]);
        concatenate(Axis(0), &[blob.view(), far.view()]).unwrap()
    }

    #[test]
    fn test_dual_constraints_hold() {
        let data = cloud_with_outliers();
        let mut svm = OneClassSvm::new(0.1, Gamma::Scale);
        svm.fit(&data.view()).unwrap();

        let total: f64 = svm.dual_coef().sum();
        assert!((total - 0.1 * data.nrows() as f64).abs() < 1e-9);
        assert!(svm.dual_coef().iter().all(|&a| a > 0.0 && a <= 1.0));
        // nu lower-bounds the share of support vectors
        assert!(svm.n_support() as f64 >= 0.1 * data.nrows() as f64 - 1.0);
    }

    #[test]
    fn test_far_points_are_outliers() {
        let data = cloud_with_outliers();
        let blob = data.slice(s![..100, ..]);
        let mut svm = OneClassSvm::new(0.05, Gamma::Scale);
        svm.fit(&blob).unwrap();

        let unseen = svm.predict(&data.slice(s![100.., ..])).unwrap();
        assert!(unseen.iter().all(|&p| p == OUTLIER));
        assert!(svm.predict(&arr2(&[[0.0, 0.0]]).view()).unwrap()[0] != OUTLIER);

        // Free support vectors may sit just below zero, within the stopping tolerance
        let decision = svm.decision_function(&blob).unwrap();
        let margin_errors = decision.iter().filter(|&&d| d < -TOLERANCE).count();
        assert!(
            margin_errors as f64 <= 0.05 * blob.nrows() as f64,
            "{} margin errors",
            margin_errors
        );
    }

    #[test]
    fn test_nu_bounds_margin_errors() {
        let data = cloud_with_outliers();
        for nu in [0.05, 0.2, 0.5] {
            let mut svm = OneClassSvm::new(nu, Gamma::Scale);
            svm.fit(&data.view()).unwrap();

            let decision = svm.decision_function(&data.view()).unwrap();
            let margin_errors = decision.iter().filter(|&&d| d < -TOLERANCE).count();
            assert!(
                margin_errors as f64 <= nu * data.nrows() as f64,
                "nu {}: {}",
                nu,
                margin_errors
            );
        }
    }

    #[test]
    fn test_gamma_scale() {
        let data = arr2(&[[0.0, 2.0], [2.0, 0.0]]);
        // Four values 0, 2, 2, 0 have variance 1
        assert!((Gamma::Scale.resolve(&data.view()) - 0.5).abs() < 1e-12);
        assert_eq!(Gamma::Value(3.0).resolve(&data.view()), 3.0);
    }

    #[test]
    fn test_invalid_nu_and_unfitted() {
        let data = cloud_with_outliers();
        let mut svm = OneClassSvm::new(0.0, Gamma::Scale);
        assert!(matches!(svm.fit(&data.view()), Err(Error::InvalidParameter(_))));
        assert!(matches!(svm.decision_function(&data.view()), Err(Error::NotFitted(_))));
    }
}
