//! Training infrastructure for the parallel SGD engine.
//!
//! ## Shared Infrastructure
//!
//! - [`Loss`]: the closed set of loss functions
//! - [`LockVec`]: the shared weight vector with per-coordinate locking
//! - [`WorkerThread`]: long-lived worker with a capacity-1 mailbox
//! - [`TrainingLogger`], [`Verbosity`]: stderr progress logging
//! - [`ConfigError`], [`TrainError`]: trainer error taxonomy
//!
//! ## Trainers
//!
//! - [`ParSgd`]: asynchronous parallel SGD, unlocked (Hogwild) or with
//!   per-coordinate locks
//! - [`Gd`]: deterministic full-batch gradient descent, used to validate
//!   the SGD path
//!
//! ## Metrics
//!
//! - [`metrics::accuracy`]: classification accuracy on sign predictions

mod error;
mod executor;
mod gd;
mod logger;
mod loss;
mod lvec;
pub mod metrics;
mod sgd;

pub use error::{ConfigError, TrainError};
pub use executor::{Completion, WorkerThread};
pub use gd::{Gd, GdParams};
pub use logger::{TrainingLogger, Verbosity};
pub use loss::Loss;
pub use lvec::LockVec;
pub use sgd::{ParSgd, ParSgdParams, RoundHistory};
