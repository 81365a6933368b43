//! L2-regularized linear classifier.

use std::collections::BTreeMap;
use std::ops::Range;

use ndarray::Array1;

use crate::data::{Dataset, FeatureVec};
use crate::training::{ConfigError, Loss};
use crate::utils::{sign, Parallelism};

/// A linear model `x ↦ ⟨w, x⟩` with loss `ℓ` and regularization `λ`.
///
/// The objective being minimized over a dataset of `n` examples is
///
/// ```text
/// F(w) = (1/n) Σᵢ ℓ(yᵢ, ⟨w, xᵢ⟩) + (λ/2)‖w‖²
/// ```
#[derive(Debug, Clone)]
pub struct LinearModel {
    lambda: f64,
    loss: Loss,
    weights: Array1<f64>,
}

impl LinearModel {
    /// A zero-weight model. Rejects `λ ≤ 0`.
    pub fn new(lambda: f64, loss: Loss) -> Result<Self, ConfigError> {
        if lambda <= 0.0 {
            return Err(ConfigError::NonPositiveLambda(lambda));
        }
        Ok(Self {
            lambda,
            loss,
            weights: Array1::zeros(0),
        })
    }

    /// The same configuration around a different weight vector.
    pub fn with_weights(&self, weights: Array1<f64>) -> Self {
        Self {
            lambda: self.lambda,
            loss: self.loss,
            weights,
        }
    }

    #[inline]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    #[inline]
    pub fn loss(&self) -> Loss {
        self.loss
    }

    #[inline]
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: Array1<f64>) {
        self.weights = weights;
    }

    fn weights_slice(&self) -> &[f64] {
        self.weights.as_slice().expect("weights are contiguous")
    }

    /// `‖w‖₂`
    pub fn weight_norm(&self) -> f64 {
        self.weights.dot(&self.weights).sqrt()
    }

    /// `‖w‖∞`
    pub fn weight_inf_norm(&self) -> f64 {
        self.weights.iter().fold(0.0, |best, w| f64::max(best, w.abs()))
    }

    /// The dataset as the trainers consume it. The linear model trains on
    /// the input features directly; feature-expanding models hook in here.
    pub fn transform(&self, data: &Dataset) -> Dataset {
        data.clone()
    }

    /// The decision value `⟨w, x⟩`.
    #[inline]
    pub fn decision(&self, x: &FeatureVec) -> f64 {
        x.dot(self.weights_slice())
    }

    /// Regularized empirical risk over the whole dataset.
    pub fn empirical_risk(&self, data: &Dataset) -> f64 {
        self.empirical_risk_range(data, 0..data.len())
    }

    /// Regularized empirical risk over `[start, end)`: the mean loss over
    /// the range plus `(λ/2)‖w‖²`.
    pub fn empirical_risk_range(&self, data: &Dataset, range: Range<usize>) -> f64 {
        let n = range.len();
        let sum_loss = self.sum_loss(data, range);
        sum_loss / n as f64 + self.regularizer()
    }

    /// Empirical risk with the per-example losses summed across a chunk per
    /// core. Read-only on `w`; independent of the SGD lock discipline.
    pub fn parallel_empirical_risk(&self, data: &Dataset, parallelism: Parallelism) -> f64 {
        let n = data.len();
        let n_chunks = rayon::current_num_threads();
        let chunk = n / n_chunks;
        if chunk == 0 || !parallelism.is_parallel() {
            return self.empirical_risk(data);
        }
        let ranges: Vec<Range<usize>> = (0..n_chunks)
            .map(|i| {
                let end = if i + 1 == n_chunks { n } else { (i + 1) * chunk };
                i * chunk..end
            })
            .collect();
        let sum_loss: f64 = parallelism
            .maybe_par_map(ranges, |r| self.sum_loss(data, r))
            .into_iter()
            .sum();
        sum_loss / n as f64 + self.regularizer()
    }

    /// Gradient of the empirical risk over the whole dataset.
    pub fn grad_empirical_risk(&self, data: &Dataset) -> Array1<f64> {
        self.grad_empirical_risk_range(data, 0..data.len())
    }

    /// Gradient of the empirical risk over `[start, end)`:
    /// `(1/n) Σ ℓ'(yᵢ, ⟨w, xᵢ⟩)·xᵢ + λ·w`.
    pub fn grad_empirical_risk_range(&self, data: &Dataset, range: Range<usize>) -> Array1<f64> {
        let n = range.len();
        let w = self.weights_slice();
        let mut grad = Array1::<f64>::zeros(self.weights.len());
        for (x, y) in data.range(range) {
            let dloss = self.loss.dloss(y, x.dot(w));
            for (k, v) in x.iter_nonzero() {
                grad[k] += v * dloss;
            }
        }
        grad *= 1.0 / n as f64;
        grad.scaled_add(self.lambda, &self.weights);
        grad
    }

    /// `‖∇F(w)‖₂`
    pub fn norm_grad_empirical_risk(&self, data: &Dataset) -> f64 {
        let grad = self.grad_empirical_risk(data);
        grad.dot(&grad).sqrt()
    }

    /// Sign predictions over the dataset, in the label domain {-1, +1}.
    pub fn predict(&self, data: &Dataset) -> Array1<f64> {
        data.iter().map(|(x, _)| sign(self.decision(x))).collect()
    }

    /// Configuration key/value dump, merged into by the trainers.
    pub fn mapconfig(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("model_type".to_string(), "linear".to_string());
        m.insert("model_lambda".to_string(), format!("{}", self.lambda));
        m
    }

    fn sum_loss(&self, data: &Dataset, range: Range<usize>) -> f64 {
        let w = self.weights_slice();
        data.range(range)
            .map(|(x, y)| self.loss.loss(y, x.dot(w)))
            .sum()
    }

    fn regularizer(&self) -> f64 {
        self.lambda / 2.0 * self.weights.dot(&self.weights)
    }
}
