//! Evaluation metrics.

use ndarray::ArrayView1;

/// Fraction of positions where `actual` and `predicted` agree.
///
/// Both inputs live in the label domain {-1, +1}.
///
/// # Panics
/// Panics when the lengths differ or the inputs are empty.
pub fn accuracy(actual: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    assert_eq!(actual.len(), predicted.len(), "length mismatch");
    assert!(!actual.is_empty(), "accuracy of an empty set");
    let correct = actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, p)| a == p)
        .count();
    correct as f64 / actual.len() as f64
}
