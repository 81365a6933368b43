//! Model types.
//!
//! A model pairs a weight vector with a loss function and the L2
//! regularization strength, and evaluates the regularized empirical risk,
//! its gradient, and sign predictions over a dataset.

mod linear;

pub use linear::LinearModel;
