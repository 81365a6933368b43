//! Trainer error taxonomy.
//!
//! Configuration errors are surfaced synchronously, before any worker is
//! spawned. Worker failures propagate to the trainer, which joins the
//! remaining workers and then reports a single fatal condition; there is no
//! partial-success path.

/// A training parameter outside its domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("lambda must be positive, got {0}")]
    NonPositiveLambda(f64),

    #[error("need at least one round")]
    ZeroRounds,

    #[error("need at least one worker")]
    ZeroWorkers,

    #[error("step-size scale c0 must be positive, got {0}")]
    NonPositiveStepScale(f64),

    #[error("dataset is empty")]
    EmptyDataset,
}

/// A `fit()` failure. Either the configuration was rejected up front or a
/// worker task died; the weight vector is unspecified afterwards.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("worker task failed: {0}")]
    Worker(String),
}
