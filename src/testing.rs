//! Testing utilities: deterministic synthetic datasets.
//!
//! Used by unit and integration tests; kept in the library so scenario
//! tests under `tests/` can share them.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::{Dataset, FeatureVec};
use crate::utils::sign;

/// A linearly separable classification dataset with a margin gap.
///
/// Draws a ground-truth weight vector and dense examples uniform in
/// `[-1, 1]`, labels by the sign of the margin. Examples landing within
/// 0.25 of the separating hyperplane are redrawn so the classes do not
/// crowd the boundary. Deterministic in `seed`.
pub fn synthetic_separable(n: usize, d: usize, seed: u64) -> Dataset {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let truth: Vec<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);
    while xs.len() < n {
        let values: Vec<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let margin: f64 = values.iter().zip(&truth).map(|(v, t)| v * t).sum();
        if margin.abs() < 0.25 {
            continue;
        }
        ys.push(sign(margin));
        xs.push(FeatureVec::dense(values));
    }
    Dataset::new(xs, ys).expect("xs and ys have equal length")
}

/// Random sparse examples with `nnz` non-zeros each, values in `[0.5, 1.5]`
/// on distinct indices, random `±1` labels. Deterministic in `seed`.
pub fn random_sparse_examples(
    n: usize,
    d: usize,
    nnz: usize,
    seed: u64,
) -> (Vec<FeatureVec>, Vec<f64>) {
    assert!(nnz <= d);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);
    for _ in 0..n {
        let mut indices: Vec<usize> = (0..d).collect();
        for i in (1..indices.len()).rev() {
            let j = rng.gen_range(0..=i);
            indices.swap(i, j);
        }
        let mut entries: Vec<(usize, f64)> = indices[..nnz]
            .iter()
            .map(|&i| (i, rng.gen_range(0.5..1.5)))
            .collect();
        entries.sort_unstable_by_key(|&(i, _)| i);
        xs.push(FeatureVec::sparse(entries));
        ys.push(if rng.gen_bool(0.5) { 1.0 } else { -1.0 });
    }
    (xs, ys)
}
