//! parsgd: parallel stochastic gradient descent for sparse linear classifiers.
//!
//! This crate trains L2-regularized linear classifiers with asynchronous
//! (Hogwild-style) SGD: several worker threads read and write one shared
//! weight vector, either completely unlocked or with per-coordinate locks.
//!
//! # Key Types
//!
//! - [`ParSgd`] / [`ParSgdParams`] - the parallel SGD trainer
//! - [`Gd`] / [`GdParams`] - full-batch gradient descent, used for validation
//! - [`LinearModel`] / [`Loss`] - the model being fit and its loss function
//! - [`Dataset`] / [`FeatureVec`] - training data handling
//!
//! # Training
//!
//! Build a [`LinearModel`], wrap it in a [`ParSgd`] with [`ParSgdParams`],
//! then call `fit()` on a [`Dataset`]. See the [`training`] module for
//! details on the update rule and the locking discipline.
//!
//! # Loading Data
//!
//! The [`data::io`] module reads the binary sparse/dense formats as well as
//! svmlight-like and plain ASCII text files.

pub mod data;
pub mod model;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Data types (for preparing training data)
pub use data::{Dataset, FeatureVec};

// The model being trained
pub use model::LinearModel;

// Trainers and their configuration
pub use training::{Gd, GdParams, ParSgd, ParSgdParams, RoundHistory};

// Losses, errors, logging
pub use training::{ConfigError, Loss, TrainError, Verbosity};

// Shared utilities
pub use utils::Parallelism;
