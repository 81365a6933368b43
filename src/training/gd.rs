//! Deterministic full-batch gradient descent.
//!
//! Single-threaded reference trainer on the same objective and schedule
//! family as [`ParSgd`](super::ParSgd); used to validate the parallel path
//! on small problems. One round is one full pass:
//!
//! ```text
//! t = r + t_offset,  η_t = c0 / (λ·t)
//! w ← (1 - η_t·λ)·w - (η_t/n)·Σ ℓ'(yᵢ, ⟨w, xᵢ⟩)·xᵢ
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use ndarray::Array1;

use crate::data::Dataset;
use crate::model::LinearModel;
use crate::utils::Parallelism;

use super::error::{ConfigError, TrainError};
use super::logger::{TrainingLogger, Verbosity};
use super::sgd::RoundHistory;

/// Parameters for full-batch gradient descent.
#[derive(Clone, Debug)]
pub struct GdParams {
    /// Full-batch update rounds.
    pub n_rounds: usize,
    /// Offset added to the logical time step.
    pub t_offset: usize,
    /// Step-size scale: `η_t = c0 / (λ·t)`.
    pub c0: f64,
    /// Verbosity level for training output.
    pub verbosity: Verbosity,
}

impl Default for GdParams {
    fn default() -> Self {
        Self {
            n_rounds: 1,
            t_offset: 0,
            c0: 1.0,
            verbosity: Verbosity::default(),
        }
    }
}

/// Full-batch gradient-descent trainer for a [`LinearModel`].
#[derive(Debug)]
pub struct Gd {
    model: LinearModel,
    params: GdParams,
    training_size: usize,
    history: Vec<RoundHistory>,
}

impl Gd {
    pub fn new(model: LinearModel, params: GdParams) -> Result<Self, ConfigError> {
        if params.n_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if params.c0 <= 0.0 {
            return Err(ConfigError::NonPositiveStepScale(params.c0));
        }
        Ok(Self {
            model,
            params,
            training_size: 0,
            history: Vec::new(),
        })
    }

    /// Fit the model with `n_rounds` full-batch updates.
    pub fn fit(&mut self, data: &Dataset, keep_histories: bool) -> Result<(), TrainError> {
        if data.is_empty() {
            return Err(ConfigError::EmptyDataset.into());
        }
        let logger = TrainingLogger::new(self.params.verbosity);

        let mut data = self.model.transform(data);
        data.materialize(Parallelism::from_threads(0));

        let n = data.len();
        let d = data.n_features();
        self.training_size = n;
        logger.info(format_args!("fitting n={n} d={d}"));

        self.history.clear();
        if keep_histories {
            self.history.reserve(self.params.n_rounds);
        }
        if self.model.weights().len() != d {
            self.model.set_weights(Array1::zeros(d));
        }

        let lambda = self.model.lambda();
        let loss = self.model.loss();
        let timer = Instant::now();
        let mut accum = Array1::<f64>::zeros(d);
        for round in 1..=self.params.n_rounds {
            let t_eff = round + self.params.t_offset;
            let eta_t = self.params.c0 / (lambda * t_eff as f64);

            accum.fill(0.0);
            {
                let w = self
                    .model
                    .weights()
                    .as_slice()
                    .expect("weights are contiguous");
                for (x, y) in data.iter() {
                    let dloss = loss.dloss(y, x.dot(w));
                    for (k, xk) in x.iter_nonzero() {
                        accum[k] += xk * dloss;
                    }
                }
            }
            accum *= eta_t / n as f64;

            let mut w = self.model.weights().clone();
            w *= 1.0 - eta_t * lambda;
            w -= &accum;
            self.model.set_weights(w);

            if keep_histories {
                self.history.push(RoundHistory {
                    round,
                    elapsed_us: timer.elapsed().as_micros(),
                    weights: self.model.weights().clone(),
                });
            }
            if logger.enabled() {
                logger.info(format_args!("finished round {round}"));
                logger.info(format_args!("current risk: {}", self.model.empirical_risk(&data)));
                logger.info(format_args!("step size: {eta_t}"));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    pub fn into_model(self) -> LinearModel {
        self.model
    }

    pub fn history(&self) -> &[RoundHistory] {
        &self.history
    }

    pub fn training_size(&self) -> usize {
        self.training_size
    }

    pub fn name(&self) -> &'static str {
        "gd"
    }

    pub fn mapconfig(&self) -> BTreeMap<String, String> {
        let mut m = self.model.mapconfig();
        m.insert("clf_name".to_string(), self.name().to_string());
        m.insert("clf_nrounds".to_string(), self.params.n_rounds.to_string());
        m.insert("clf_t_offset".to_string(), self.params.t_offset.to_string());
        m.insert("clf_c0".to_string(), format!("{}", self.params.c0));
        m.insert("clf_training_sz".to_string(), self.training_size.to_string());
        m
    }

    pub fn jsonconfig(&self) -> String {
        serde_json::to_string(&self.mapconfig()).expect("config map serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureVec;
    use crate::training::Loss;
    use approx::assert_abs_diff_eq;

    fn single_example() -> Dataset {
        Dataset::new(vec![FeatureVec::dense(vec![1.0, 0.0])], vec![1.0]).unwrap()
    }

    #[test]
    fn one_round_matches_hand_computation() {
        // n=1, hinge, lambda=1, c0=1: t=1, eta=1.
        // accum = dloss * x = -1 * [1, 0]; scaled by eta/n = 1.
        // w = (1 - 1*1)*0 - accum = [1, 0].
        let model = LinearModel::new(1.0, Loss::Hinge).unwrap();
        let mut clf = Gd::new(model, GdParams::default()).unwrap();
        clf.fit(&single_example(), false).unwrap();
        let w = clf.model().weights();
        assert_abs_diff_eq!(w[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_config() {
        let model = LinearModel::new(1.0, Loss::Hinge).unwrap();
        assert!(matches!(
            Gd::new(
                model.clone(),
                GdParams {
                    n_rounds: 0,
                    ..Default::default()
                }
            ),
            Err(ConfigError::ZeroRounds)
        ));
        assert!(matches!(
            Gd::new(
                model,
                GdParams {
                    c0: -1.0,
                    ..Default::default()
                }
            ),
            Err(ConfigError::NonPositiveStepScale(_))
        ));
    }

    #[test]
    fn risk_decreases_on_square_loss() {
        let data = Dataset::new(
            vec![
                FeatureVec::dense(vec![1.0, 0.5]),
                FeatureVec::dense(vec![-0.5, 1.0]),
                FeatureVec::dense(vec![1.0, -1.0]),
            ],
            vec![1.0, -1.0, 1.0],
        )
        .unwrap();
        let model = LinearModel::new(0.1, Loss::Square).unwrap();
        let mut clf = Gd::new(
            model,
            GdParams {
                n_rounds: 20,
                t_offset: 5,
                ..Default::default()
            },
        )
        .unwrap();
        clf.fit(&data, true).unwrap();

        let risks: Vec<f64> = clf
            .history()
            .iter()
            .map(|h| {
                clf.model()
                    .with_weights(h.weights.clone())
                    .empirical_risk(&data)
            })
            .collect();
        for pair in risks.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9, "risk went up: {pair:?}");
        }
    }

    #[test]
    fn histories_are_per_round() {
        let model = LinearModel::new(1.0, Loss::Hinge).unwrap();
        let mut clf = Gd::new(
            model,
            GdParams {
                n_rounds: 4,
                ..Default::default()
            },
        )
        .unwrap();
        clf.fit(&single_example(), true).unwrap();
        assert_eq!(clf.history().len(), 4);
        assert_eq!(clf.history()[0].round, 1);
        assert_eq!(clf.history()[3].round, 4);
        assert_eq!(clf.training_size(), 1);
    }
}
