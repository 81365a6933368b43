//! Dataset container: ordered `(x, y)` examples with permutation, range
//! views, per-feature usage counts, and materialization of transformed data.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use rand::Rng;

use super::io::DataError;
use super::vector::FeatureVec;
use crate::utils::Parallelism;

/// Per-example transform applied lazily until [`Dataset::materialize`].
type FeatureMap = Arc<dyn Fn(&FeatureVec) -> FeatureVec + Send + Sync>;

enum Storage {
    /// Concrete examples; shape and feature counts are valid.
    Concrete(Vec<FeatureVec>),
    /// Examples seen through a per-example map; must be materialized before
    /// iteration.
    Transformed {
        base: Vec<FeatureVec>,
        map: FeatureMap,
        post_dim: usize,
    },
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        match self {
            Storage::Concrete(xs) => Storage::Concrete(xs.clone()),
            Storage::Transformed { base, map, post_dim } => Storage::Transformed {
                base: base.clone(),
                map: Arc::clone(map),
                post_dim: *post_dim,
            },
        }
    }
}

/// An ordered collection of `(x, y)` training examples, `y ∈ {-1, +1}`.
///
/// The feature dimension `d` is one plus the largest feature index occurring
/// anywhere and is fixed once the dataset is built. Per-feature usage counts
/// (`c_k` = number of examples where feature `k` is non-zero) are computed
/// exactly once, at construction or materialization, and are immutable
/// shared state during training.
#[derive(Clone)]
pub struct Dataset {
    storage: Storage,
    ys: Vec<f64>,
    n_features: usize,
    feature_counts: Vec<usize>,
}

impl Dataset {
    /// Build a dataset from concrete examples.
    ///
    /// Fails with [`DataError::ShapeMismatch`] when `xs` and `ys` disagree
    /// in length.
    pub fn new(xs: Vec<FeatureVec>, ys: Vec<f64>) -> Result<Self, DataError> {
        if xs.len() != ys.len() {
            return Err(DataError::ShapeMismatch {
                n_examples: xs.len(),
                n_labels: ys.len(),
            });
        }
        let n_features = xs.iter().map(FeatureVec::dim).max().unwrap_or(0);
        let feature_counts = count_features(&xs, n_features);
        Ok(Self {
            storage: Storage::Concrete(xs),
            ys,
            n_features,
            feature_counts,
        })
    }

    /// View this dataset through a per-example transform producing vectors
    /// of dimension `post_dim`.
    ///
    /// The result must be [`materialize`](Self::materialize)d before
    /// iteration; shape and feature counts become valid at that point.
    pub fn transformed(
        self,
        map: impl Fn(&FeatureVec) -> FeatureVec + Send + Sync + 'static,
        post_dim: usize,
    ) -> Self {
        let base = match self.storage {
            Storage::Concrete(xs) => xs,
            // Stacked transforms are not needed anywhere; materialize first.
            Storage::Transformed { .. } => panic!("transform of an unmaterialized dataset"),
        };
        Self {
            storage: Storage::Transformed {
                base,
                map: Arc::new(map),
                post_dim,
            },
            ys: self.ys,
            n_features: post_dim,
            feature_counts: Vec::new(),
        }
    }

    /// Convert a transformed view into concrete storage, in parallel across
    /// cores when allowed, and (re)compute shape and feature counts.
    ///
    /// No-op on concrete datasets. Small datasets fall back to sequential
    /// materialization even when parallelism is allowed.
    pub fn materialize(&mut self, parallelism: Parallelism) {
        let Storage::Transformed { base, map, .. } = &self.storage else {
            return;
        };
        let parallelism = if base.len() < rayon::current_num_threads() {
            Parallelism::Sequential
        } else {
            parallelism
        };
        let map = map.as_ref();
        let xs: Vec<FeatureVec> = parallelism.maybe_par_map(base, |x| map(x));
        self.n_features = xs.iter().map(FeatureVec::dim).max().unwrap_or(0);
        self.feature_counts = count_features(&xs, self.n_features);
        self.storage = Storage::Concrete(xs);
    }

    /// Whether the dataset is backed by concrete storage.
    pub fn is_materialized(&self) -> bool {
        matches!(self.storage, Storage::Concrete(_))
    }

    /// Number of examples.
    #[inline]
    pub fn len(&self) -> usize {
        self.ys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ys.is_empty()
    }

    /// Feature dimension `d`.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Per-feature usage counts, `c_k` for `k ∈ 0..d`.
    #[inline]
    pub fn feature_counts(&self) -> &[usize] {
        debug_assert!(self.is_materialized(), "feature counts require materialization");
        &self.feature_counts
    }

    /// Labels in natural order.
    #[inline]
    pub fn labels(&self) -> &[f64] {
        &self.ys
    }

    /// The example at index `i`.
    #[inline]
    pub fn example(&self, i: usize) -> (&FeatureVec, f64) {
        let Storage::Concrete(xs) = &self.storage else {
            panic!("dataset must be materialized before iteration");
        };
        (&xs[i], self.ys[i])
    }

    /// Iterate `(x, y)` pairs in natural order.
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureVec, f64)> + '_ {
        (0..self.len()).map(move |i| self.example(i))
    }

    /// Iterate `(x, y)` pairs over the contiguous index range `[start, end)`.
    pub fn range(&self, range: Range<usize>) -> impl Iterator<Item = (&FeatureVec, f64)> + '_ {
        range.map(move |i| self.example(i))
    }

    /// Iterate `(x, y)` pairs following a caller-supplied index slice
    /// (typically one shard of a permutation).
    pub fn iter_indices<'a>(
        &'a self,
        indices: &'a [usize],
    ) -> impl Iterator<Item = (&'a FeatureVec, f64)> + 'a {
        indices.iter().map(move |&i| self.example(i))
    }

    /// Draw a Fisher-Yates permutation of `{0..n-1}` from `rng`.
    ///
    /// This is the single per-round randomness source; workers never
    /// consult the RNG.
    pub fn permutation(&self, rng: &mut impl Rng) -> Vec<usize> {
        let mut pi: Vec<usize> = (0..self.len()).collect();
        for i in (1..pi.len()).rev() {
            let j = rng.gen_range(0..=i);
            pi.swap(i, j);
        }
        pi
    }

    /// Largest example L2 norm (0 on an empty dataset).
    pub fn max_x_norm(&self) -> f64 {
        self.iter().map(|(x, _)| x.norm()).fold(0.0, f64::max)
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("n", &self.len())
            .field("d", &self.n_features)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

fn count_features(xs: &[FeatureVec], n_features: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_features];
    for x in xs {
        for (k, _) in x.iter_nonzero() {
            counts[k] += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn small_dataset() -> Dataset {
        Dataset::new(
            vec![
                FeatureVec::sparse(vec![(0, 1.0)]),
                FeatureVec::sparse(vec![(2, -1.0)]),
                FeatureVec::dense(vec![1.0, 0.0, 2.0]),
            ],
            vec![1.0, -1.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn shape_and_counts() {
        let d = small_dataset();
        assert_eq!(d.len(), 3);
        assert_eq!(d.n_features(), 3);
        // Feature 1 is zero everywhere (stored zero in the dense example).
        assert_eq!(d.feature_counts(), &[2, 0, 2]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let err = Dataset::new(vec![FeatureVec::dense(vec![1.0])], vec![1.0, -1.0]).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
    }

    #[test]
    fn permutation_is_a_permutation_and_seed_deterministic() {
        let d = small_dataset();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let pi = d.permutation(&mut rng);
        let mut sorted = pi.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);

        let mut rng2 = Xoshiro256PlusPlus::seed_from_u64(7);
        assert_eq!(pi, d.permutation(&mut rng2));
    }

    #[test]
    fn range_and_indices_iteration() {
        let d = small_dataset();
        let ys: Vec<f64> = d.range(1..3).map(|(_, y)| y).collect();
        assert_eq!(ys, vec![-1.0, 1.0]);

        let idx = [2, 0];
        let ys: Vec<f64> = d.iter_indices(&idx).map(|(_, y)| y).collect();
        assert_eq!(ys, vec![1.0, 1.0]);
    }

    #[test]
    fn materialize_applies_transform() {
        let scale = |x: &FeatureVec| {
            FeatureVec::sparse(x.iter_nonzero().map(|(i, v)| (i, 2.0 * v)).collect())
        };
        let mut seq = small_dataset().transformed(scale, 3);
        assert!(!seq.is_materialized());
        seq.materialize(Parallelism::Sequential);
        assert!(seq.is_materialized());
        assert_eq!(seq.example(0).0.component(0), 2.0);
        assert_eq!(seq.feature_counts(), &[2, 0, 2]);

        let mut par = small_dataset().transformed(scale, 3);
        par.materialize(Parallelism::Parallel);
        for i in 0..seq.len() {
            assert_eq!(seq.example(i).0, par.example(i).0);
        }
    }

    #[test]
    fn materialize_is_idempotent_on_concrete() {
        let mut d = small_dataset();
        d.materialize(Parallelism::Parallel);
        assert_eq!(d.len(), 3);
        assert_eq!(d.feature_counts(), &[2, 0, 2]);
    }

    #[test]
    fn max_norm() {
        let d = small_dataset();
        let expected = (1.0f64 + 4.0).sqrt();
        assert!((d.max_x_norm() - expected).abs() < 1e-12);
    }
}
