//! End-to-end training scenarios for the parallel SGD trainer.

use approx::assert_abs_diff_eq;
use ndarray::{Array1, ArrayView1};

use parsgd::data::{Dataset, FeatureVec};
use parsgd::testing::synthetic_separable;
use parsgd::training::metrics::accuracy;
use parsgd::{Gd, GdParams, LinearModel, Loss, ParSgd, ParSgdParams};

fn hinge_model(lambda: f64) -> LinearModel {
    LinearModel::new(lambda, Loss::Hinge).unwrap()
}

fn fit_sgd(data: &Dataset, params: ParSgdParams, keep_histories: bool) -> ParSgd {
    let mut clf = ParSgd::new(hinge_model(1.0), params).unwrap();
    clf.fit(data, keep_histories).unwrap();
    clf
}

/// Single-example sanity: one hinge step with eta = 1 writes exactly
/// w = [1, 0].
#[test]
fn single_example_single_round() {
    let data = Dataset::new(vec![FeatureVec::dense(vec![1.0, 0.0])], vec![1.0]).unwrap();
    let clf = fit_sgd(&data, ParSgdParams::default(), false);

    let w = clf.model().weights();
    assert_eq!(w.len(), 2);
    assert_eq!(w[0], 1.0);
    assert_eq!(w[1], 0.0);
    assert_eq!(clf.training_size(), 1);
}

fn disjoint_two_example_dataset() -> Dataset {
    Dataset::new(
        vec![
            FeatureVec::dense(vec![1.0, 0.0, 0.0]),
            FeatureVec::dense(vec![0.0, 0.0, 1.0]),
        ],
        vec![1.0, -1.0],
    )
    .unwrap()
}

/// Two workers on shards touching disjoint coordinates: the positive
/// example pushes w_0 up, the negative pushes w_2 down, w_1 is never
/// touched, and repeated runs are bit-identical.
#[test]
fn two_parallel_non_colliding_shards() {
    let data = disjoint_two_example_dataset();
    let params = ParSgdParams {
        n_workers: 2,
        ..Default::default()
    };
    let clf = fit_sgd(&data, params.clone(), false);
    let w = clf.model().weights();
    assert!(w[0] > 0.0);
    assert_eq!(w[1], 0.0);
    assert!(w[2] < 0.0);

    for _ in 0..5 {
        let again = fit_sgd(&data, params.clone(), false);
        assert_eq!(w, again.model().weights());
    }
}

/// Locked and unlocked agree exactly when shards touch disjoint
/// coordinates: without contention the locks cannot change the arithmetic.
#[test]
fn locked_and_unlocked_agree_on_disjoint_shards() {
    let data = disjoint_two_example_dataset();
    let unlocked = fit_sgd(
        &data,
        ParSgdParams {
            n_workers: 2,
            locking: false,
            ..Default::default()
        },
        false,
    );
    let locked = fit_sgd(
        &data,
        ParSgdParams {
            n_workers: 2,
            locking: true,
            ..Default::default()
        },
        false,
    );
    assert_eq!(unlocked.model().weights(), locked.model().weights());
}

/// Coordinates whose feature never appears stay exactly zero through all
/// rounds; the scaled regularizer never touches them.
#[test]
fn absent_features_stay_exactly_zero() {
    let data = Dataset::new(vec![FeatureVec::sparse(vec![(3, 1.0)])], vec![1.0]).unwrap();
    // d comes from the data: feature 3 is the highest, so w has length 4
    // and 0..=2 must stay zero. Use several rounds to accumulate updates.
    let clf = fit_sgd(
        &data,
        ParSgdParams {
            n_rounds: 10,
            ..Default::default()
        },
        true,
    );

    let w = clf.model().weights();
    assert_eq!(w.len(), 4);
    assert!(w[3] != 0.0);
    for k in 0..3 {
        assert_eq!(w[k], 0.0, "untouched coordinate {k} drifted");
    }
    // Also true at every round boundary, not just at the end.
    for h in clf.history() {
        for k in 0..3 {
            assert_eq!(h.weights[k], 0.0);
        }
    }
}

/// Serial determinism: same seed, one worker, locking on - two runs
/// produce bit-identical weights.
#[test]
fn serial_runs_are_bit_identical() {
    let data = synthetic_separable(64, 8, 123);
    let params = ParSgdParams {
        n_rounds: 3,
        n_workers: 1,
        locking: true,
        seed: 7,
        ..Default::default()
    };
    let a = fit_sgd(&data, params.clone(), false);
    let b = fit_sgd(&data, params, false);
    assert_eq!(a.model().weights(), b.model().weights());
}

/// Requesting more workers than examples collapses to one worker: the
/// result is bit-identical to an explicit single-worker run.
#[test]
fn oversized_worker_count_collapses_to_one() {
    let data = disjoint_two_example_dataset();
    let oversized = fit_sgd(
        &data,
        ParSgdParams {
            n_workers: 64,
            ..Default::default()
        },
        false,
    );
    let single = fit_sgd(
        &data,
        ParSgdParams {
            n_workers: 1,
            ..Default::default()
        },
        false,
    );
    assert_eq!(oversized.model().weights(), single.model().weights());
}

/// Histories carry one entry per round with 1-based ids, monotone
/// timestamps, and the last snapshot equal to the final weights.
#[test]
fn histories_record_round_snapshots() {
    let data = synthetic_separable(32, 4, 5);
    let clf = fit_sgd(
        &data,
        ParSgdParams {
            n_rounds: 4,
            n_workers: 2,
            ..Default::default()
        },
        true,
    );
    let history = clf.history();
    assert_eq!(history.len(), 4);
    for (idx, h) in history.iter().enumerate() {
        assert_eq!(h.round, idx + 1);
        assert_eq!(h.weights.len(), data.n_features());
    }
    for pair in history.windows(2) {
        assert!(pair[0].elapsed_us <= pair[1].elapsed_us);
    }
    assert_eq!(&history[3].weights, clf.model().weights());
}

/// No histories are kept unless asked for.
#[test]
fn histories_are_opt_in() {
    let data = synthetic_separable(16, 4, 5);
    let clf = fit_sgd(&data, ParSgdParams::default(), false);
    assert!(clf.history().is_empty());
}

/// Risk decreases across rounds for a single worker on a separable
/// problem with a small step scale.
#[test]
fn risk_decreases_across_rounds() {
    let data = synthetic_separable(200, 6, 11);
    let model = LinearModel::new(1e-2, Loss::Hinge).unwrap();
    let mut clf = ParSgd::new(
        model,
        ParSgdParams {
            n_rounds: 8,
            t_offset: 100,
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
    assert!(
        risks.last().unwrap() < risks.first().unwrap(),
        "risk did not improve: {risks:?}"
    );
}

/// Hogwild with real parallelism converges on a sparse problem: final
/// training accuracy beats the all-positive baseline by a wide margin.
#[test]
fn hogwild_converges_on_separable_data() {
    let data = synthetic_separable(400, 10, 77);
    for locking in [false, true] {
        let model = LinearModel::new(1e-2, Loss::Hinge).unwrap();
        let mut clf = ParSgd::new(
            model,
            ParSgdParams {
                n_rounds: 12,
                n_workers: 4,
                locking,
                t_offset: 200,
                ..Default::default()
            },
        )
        .unwrap();
        clf.fit(&data, false).unwrap();
        let predictions = clf.model().predict(&data);
        let acc = accuracy(ArrayView1::from(data.labels()), predictions.view());
        assert!(acc > 0.85, "locking={locking} accuracy {acc}");
    }
}

/// SGD (both locking modes) and batch GD agree in their sign predictions
/// on a tiny separable problem after enough rounds.
#[test]
fn sgd_and_gd_agree_on_sign_predictions() {
    let data = synthetic_separable(60, 4, 3);
    let lambda = 1e-2;

    let mut gd = Gd::new(
        LinearModel::new(lambda, Loss::Hinge).unwrap(),
        GdParams {
            n_rounds: 200,
            t_offset: 10,
            ..Default::default()
        },
    )
    .unwrap();
    gd.fit(&data, false).unwrap();
    let gd_predictions = gd.model().predict(&data);
    let gd_acc = accuracy(ArrayView1::from(data.labels()), gd_predictions.view());
    assert_abs_diff_eq!(gd_acc, 1.0);

    for locking in [false, true] {
        let mut sgd = ParSgd::new(
            LinearModel::new(lambda, Loss::Hinge).unwrap(),
            ParSgdParams {
                n_rounds: 40,
                n_workers: 2,
                locking,
                t_offset: 100,
                ..Default::default()
            },
        )
        .unwrap();
        sgd.fit(&data, false).unwrap();
        let sgd_predictions = sgd.model().predict(&data);
        assert_eq!(
            gd_predictions, sgd_predictions,
            "locking={locking} disagrees with batch GD"
        );
    }
}

/// The trainer's weight vector has dimension d even when the last
/// examples carry no high feature indices.
#[test]
fn weight_dimension_comes_from_the_whole_dataset() {
    let data = Dataset::new(
        vec![
            FeatureVec::sparse(vec![(9, 1.0)]),
            FeatureVec::sparse(vec![(0, 1.0)]),
        ],
        vec![1.0, -1.0],
    )
    .unwrap();
    let clf = fit_sgd(&data, ParSgdParams::default(), false);
    assert_eq!(clf.model().weights().len(), 10);
}

/// Square loss drives the single-example margin toward its label.
#[test]
fn square_loss_regresses_toward_label() {
    let data = Dataset::new(vec![FeatureVec::dense(vec![1.0])], vec![1.0]).unwrap();
    let model = LinearModel::new(0.5, Loss::Square).unwrap();
    let mut clf = ParSgd::new(
        model,
        ParSgdParams {
            n_rounds: 50,
            t_offset: 1,
            ..Default::default()
        },
    )
    .unwrap();
    clf.fit(&data, false).unwrap();
    let margin = clf.model().weights()[0];
    assert!((margin - 1.0).abs() < 0.5, "margin {margin} far from label");
}

/// Weights survive into with_weights-built models: histories can be
/// replayed for evaluation.
#[test]
fn history_weights_evaluate_like_the_final_model() {
    let data = synthetic_separable(32, 4, 21);
    let clf = fit_sgd(
        &data,
        ParSgdParams {
            n_rounds: 2,
            ..Default::default()
        },
        true,
    );
    let last = clf.history().last().unwrap();
    let rebuilt = clf.model().with_weights(last.weights.clone());
    assert_abs_diff_eq!(
        rebuilt.empirical_risk(&data),
        clf.model().empirical_risk(&data),
        epsilon = 1e-15
    );
}

/// Heavier contention smoke test: all workers hammer the same few
/// coordinates in both locking modes without corrupting the weights.
#[test]
fn contended_training_produces_finite_weights() {
    let xs: Vec<FeatureVec> = (0..200)
        .map(|i| FeatureVec::sparse(vec![(i % 3, 1.0), (3, 0.5)]))
        .collect();
    let ys: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let data = Dataset::new(xs, ys).unwrap();

    for locking in [false, true] {
        let model = LinearModel::new(1e-2, Loss::Logistic).unwrap();
        let mut clf = ParSgd::new(
            model,
            ParSgdParams {
                n_rounds: 5,
                n_workers: 4,
                locking,
                t_offset: 10,
                ..Default::default()
            },
        )
        .unwrap();
        clf.fit(&data, false).unwrap();
        let w: &Array1<f64> = clf.model().weights();
        assert_eq!(w.len(), 4);
        assert!(w.iter().all(|v| v.is_finite()));
    }
}
