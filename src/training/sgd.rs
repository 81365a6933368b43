//! Asynchronous parallel SGD over a shared weight vector.
//!
//! Each round draws one permutation of the dataset, splits it into
//! contiguous shards, and hands one shard to each long-lived worker. The
//! workers walk their shard updating the shared [`LockVec`] either
//! completely unlocked (Hogwild) or under per-coordinate locks; the only
//! cross-worker synchronization is the join at the end of the round.
//!
//! # The update rule
//!
//! For the example at shard-local position `i` (1-based) in round `r` over
//! `n` examples, the step size is `η_t = c0 / (λ·t)` with
//! `t = (r-1)·n + i + t_offset`. Every worker derives `t` from its own
//! shard position; a shared counter would serialize the workers.
//!
//! For each non-zero entry `(k, x_k)` of the example:
//!
//! ```text
//! w_k ← (1 - η_t·λ·n/c_k)·w_k - η_t·ℓ'(y, ⟨w, x⟩)·x_k
//! ```
//!
//! where `c_k` counts the examples in which feature `k` is non-zero. The
//! `n/c_k` scaling concentrates the shrinkage a dense regularizer would
//! spread over every step onto the steps that actually touch the feature,
//! so coordinates with `c_k = 0` stay exactly zero.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use ndarray::Array1;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::{Dataset, FeatureVec};
use crate::model::LinearModel;
use crate::utils::Parallelism;

use super::error::{ConfigError, TrainError};
use super::executor::WorkerThread;
use super::logger::{TrainingLogger, Verbosity};
use super::loss::Loss;
use super::lvec::LockVec;

/// Parameters for parallel SGD training.
#[derive(Clone, Debug)]
pub struct ParSgdParams {
    /// Rounds (full passes) over the dataset.
    pub n_rounds: usize,

    /// Requested worker count. Collapses to 1 when the dataset is smaller
    /// than the request.
    pub n_workers: usize,

    /// Per-coordinate locking. Off is the Hogwild mode: racy updates,
    /// justified on sparse problems where per-coordinate collisions are
    /// rare.
    pub locking: bool,

    /// Offset added to the logical time step; tempers the earliest (and
    /// largest) step sizes.
    pub t_offset: usize,

    /// Step-size scale: `η_t = c0 / (λ·t)`.
    pub c0: f64,

    /// Seed for the per-round permutation draws.
    pub seed: u64,

    /// Verbosity level for training output.
    pub verbosity: Verbosity,
}

impl Default for ParSgdParams {
    fn default() -> Self {
        Self {
            n_rounds: 1,
            n_workers: 1,
            locking: false,
            t_offset: 0,
            c0: 1.0,
            seed: 42,
            verbosity: Verbosity::default(),
        }
    }
}

/// Weight-vector snapshot taken at a round boundary.
#[derive(Clone, Debug)]
pub struct RoundHistory {
    /// 1-based round id.
    pub round: usize,
    /// Elapsed microseconds since the start of the first round.
    pub elapsed_us: u128,
    /// Snapshot of `w` at the end of the round.
    pub weights: Array1<f64>,
}

/// Parallel SGD trainer for a [`LinearModel`].
#[derive(Debug)]
pub struct ParSgd {
    model: LinearModel,
    params: ParSgdParams,
    rng: Xoshiro256PlusPlus,
    training_size: usize,
    history: Vec<RoundHistory>,
}

impl ParSgd {
    /// Create a trainer. Configuration errors are reported here, before
    /// any worker exists.
    pub fn new(model: LinearModel, params: ParSgdParams) -> Result<Self, ConfigError> {
        if params.n_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if params.n_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if params.c0 <= 0.0 {
            return Err(ConfigError::NonPositiveStepScale(params.c0));
        }
        let rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        Ok(Self {
            model,
            params,
            rng,
            training_size: 0,
            history: Vec::new(),
        })
    }

    /// Fit the model with `n_rounds` passes over `data`.
    ///
    /// On return the model holds the final snapshot of the shared weight
    /// vector. With `keep_histories`, one [`RoundHistory`] per round is
    /// retained. There is no partial success: either all rounds ran or an
    /// error is returned after the workers were joined.
    pub fn fit(&mut self, data: &Dataset, keep_histories: bool) -> Result<(), TrainError> {
        if data.is_empty() {
            return Err(ConfigError::EmptyDataset.into());
        }
        let logger = TrainingLogger::new(self.params.verbosity);

        let mut data = self.model.transform(data);
        let timer = Instant::now();
        data.materialize(Parallelism::from_threads(0));
        logger.info(format_args!(
            "materializing took {} ms",
            timer.elapsed().as_millis()
        ));
        if logger.enabled() {
            logger.info(format_args!("fitting n={} d={}", data.len(), data.n_features()));
            logger.info(format_args!("max x norm is {}", data.max_x_norm()));
        }

        let n = data.len();
        self.training_size = n;
        let n_workers = if n < self.params.n_workers {
            1
        } else {
            self.params.n_workers
        };
        logger.info(format_args!("actual workers: {n_workers}"));
        logger.info(format_args!(
            "starting eta_t: {}",
            self.params.c0 / (self.model.lambda() * (1 + self.params.t_offset) as f64)
        ));

        let state = Arc::new(LockVec::zeroed(data.n_features()));
        let data = Arc::new(data);
        self.history.clear();
        if keep_histories {
            self.history.reserve(self.params.n_rounds);
        }

        let workers: Vec<WorkerThread> =
            (0..n_workers).map(|_| WorkerThread::spawn(None)).collect();

        let fit_result = self.run_rounds(&workers, &state, &data, keep_histories, &logger);

        self.model.set_weights(state.snapshot());
        for worker in workers {
            worker.join();
        }
        fit_result
    }

    fn run_rounds(
        &mut self,
        workers: &[WorkerThread],
        state: &Arc<LockVec>,
        data: &Arc<Dataset>,
        keep_histories: bool,
        logger: &TrainingLogger,
    ) -> Result<(), TrainError> {
        let n = data.len();
        let n_workers = workers.len();
        let timer = Instant::now();
        for round in 1..=self.params.n_rounds {
            // Single permutation draw per round; workers never touch the RNG.
            let permutation = Arc::new(data.permutation(&mut self.rng));

            let round_timer = Instant::now();
            let completions: Vec<_> = workers
                .iter()
                .enumerate()
                .map(|(shard_idx, worker)| {
                    let task = ShardTask {
                        state: Arc::clone(state),
                        data: Arc::clone(data),
                        permutation: Arc::clone(&permutation),
                        shard: shard_bounds(n, n_workers, shard_idx),
                        round,
                        lambda: self.model.lambda(),
                        loss: self.model.loss(),
                        c0: self.params.c0,
                        t_offset: self.params.t_offset,
                    };
                    if self.params.locking {
                        worker.submit(move || task.run::<true>())
                    } else {
                        worker.submit(move || task.run::<false>())
                    }
                })
                .collect();

            // The round barrier: every worker acknowledged its shard.
            let mut failure = None;
            for completion in completions {
                if let Err(msg) = completion.wait() {
                    failure.get_or_insert(msg);
                }
            }
            if let Some(msg) = failure {
                return Err(TrainError::Worker(msg));
            }

            if keep_histories {
                self.history.push(RoundHistory {
                    round,
                    elapsed_us: timer.elapsed().as_micros(),
                    weights: state.snapshot(),
                });
            }
            if logger.enabled() {
                logger.info(format_args!(
                    "finished round {round} in {} ms",
                    round_timer.elapsed().as_millis()
                ));
                let probe = self.model.with_weights(state.snapshot());
                logger.info(format_args!("current risk: {}", probe.empirical_risk(data)));
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

    /// Per-round snapshots from the last `fit(_, true)` call.
    pub fn history(&self) -> &[RoundHistory] {
        &self.history
    }

    /// `n` of the last fitted dataset.
    pub fn training_size(&self) -> usize {
        self.training_size
    }

    pub fn name(&self) -> &'static str {
        "parsgd"
    }

    pub fn mapconfig(&self) -> BTreeMap<String, String> {
        let mut m = self.model.mapconfig();
        m.insert("clf_name".to_string(), self.name().to_string());
        m.insert("clf_nrounds".to_string(), self.params.n_rounds.to_string());
        m.insert("clf_nworkers".to_string(), self.params.n_workers.to_string());
        m.insert("clf_do_locking".to_string(), self.params.locking.to_string());
        m.insert("clf_t_offset".to_string(), self.params.t_offset.to_string());
        m.insert("clf_c0".to_string(), format!("{}", self.params.c0));
        m.insert("clf_training_sz".to_string(), self.training_size.to_string());
        m
    }

    pub fn jsonconfig(&self) -> String {
        serde_json::to_string(&self.mapconfig()).expect("config map serializes")
    }
}

/// Contiguous index range of shard `shard_idx` out of `n_shards` over `n`
/// elements: `⌊n/n_shards⌋` each, the last shard absorbing the remainder.
fn shard_bounds(n: usize, n_shards: usize, shard_idx: usize) -> Range<usize> {
    let per_shard = n / n_shards;
    let start = shard_idx * per_shard;
    let end = if shard_idx + 1 == n_shards {
        n
    } else {
        start + per_shard
    };
    start..end
}

/// One worker's slice of a round.
struct ShardTask {
    state: Arc<LockVec>,
    data: Arc<Dataset>,
    permutation: Arc<Vec<usize>>,
    shard: Range<usize>,
    round: usize,
    lambda: f64,
    loss: Loss,
    c0: f64,
    t_offset: usize,
}

impl ShardTask {
    /// Monomorphized per locking mode so the per-coordinate branch
    /// disappears from the inner loops.
    fn run<const LOCKING: bool>(self) {
        let n = self.data.len();
        let nf = n as f64;
        let counts = self.data.feature_counts();
        for (pos, &example_idx) in self.permutation[self.shard.clone()].iter().enumerate() {
            let (x, y) = self.data.example(example_idx);
            let t_eff = (self.round - 1) * n + (pos + 1) + self.t_offset;
            let eta_t = self.c0 / (self.lambda * t_eff as f64);
            let haty = dot::<LOCKING>(x, &self.state);
            let dloss = self.loss.dloss(y, haty);
            for (k, xk) in x.iter_nonzero() {
                // In locking mode the slot is still held from the dot pass.
                let w_old = self.state.read_unsynchronized(k);
                debug_assert!(counts[k] > 0, "visited feature has a zero count");
                let w_new =
                    (1.0 - eta_t * self.lambda * nf / counts[k] as f64) * w_old - eta_t * dloss * xk;
                if LOCKING {
                    self.state.write_and_unlock(k, w_new);
                } else {
                    self.state.write_unsynchronized(k, w_new);
                }
            }
        }
    }
}

/// `⟨w, x⟩` over the non-zero entries of `x`.
///
/// With locking, every coordinate of `x` is acquired here in ascending
/// index order and released by the update pass; ordered acquisition is
/// what keeps concurrent holders from deadlocking.
#[inline]
fn dot<const LOCKING: bool>(x: &FeatureVec, w: &LockVec) -> f64 {
    x.iter_nonzero()
        .map(|(k, v)| {
            v * if LOCKING {
                w.lock_and_read(k)
            } else {
                w.read_unsynchronized(k)
            }
        })
        .sum()
}
