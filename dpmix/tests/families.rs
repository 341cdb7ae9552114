use nalgebra::{DMatrix, DVector, Vector2, dvector};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use dpmix::models::{LikelihoodModel, Nig, ScheduleMixture, SegmentMixture};
use dpmix::{AcceptanceRule, Dpmm, Error, SamplerConfig, Trace};

fn config() -> SamplerConfig {
    SamplerConfig {
        alpha: 0.1,
        n_iter: 200,
        n_refresh: 50,
        acceptance: AcceptanceRule::Posterior,
        seed: Some(11),
        ..SamplerConfig::default()
    }
}

fn run<L: LikelihoodModel>(likelihood: L, data: &[L::Observation]) -> Trace {
    let config = config();
    let mut rng = config.rng();
    let mut dpmm = Dpmm::new(likelihood, config).unwrap();
    let trace = dpmm.run(data, &mut rng).unwrap();

    assert!(trace.is_complete());
    assert_eq!(trace.len(), 100);
    for row in trace.labels() {
        assert_eq!(row.len(), data.len());
        assert!(row.iter().all(|&label| label < 200));
    }
    trace
}

/// Mean co-clustering of distinct pairs from the same group and from different groups, where
/// items below `split` form the first group.
fn within_and_across(trace: &Trace, split: usize) -> (f64, f64) {
    let assoc = trace.co_clustering();
    let n = assoc.nrows();
    let (mut within, mut n_within) = (0.0, 0.0);
    let (mut across, mut n_across) = (0.0, 0.0);
    for p in 0..n {
        for q in (p + 1)..n {
            if (p < split) == (q < split) {
                within += assoc[(p, q)];
                n_within += 1.0;
            } else {
                across += assoc[(p, q)];
                n_across += 1.0;
            }
        }
    }
    (within / n_within, across / n_across)
}

fn assert_groups_recovered(trace: &Trace, split: usize) {
    let (within, across) = within_and_across(trace, split);
    assert!(across < 0.1, "groups merged: across {across:.3}");
    assert!(
        within > across + 0.3,
        "groups not recovered: within {within:.3}, across {across:.3}"
    );
}

/// Points along two segments with a little perpendicular scatter.
fn two_segments(n: usize, rng: &mut SmallRng) -> Vec<DVector<f64>> {
    (0..n)
        .map(|i| {
            let t: f64 = rng.random();
            let jitter: f64 = 0.05 * (rng.random::<f64>() - 0.5);
            if i < n / 2 {
                dvector![-6.0 + 4.0 * t, -2.0 + jitter]
            } else {
                dvector![2.0 + jitter, 1.0 + 5.0 * t]
            }
        })
        .collect()
}

fn bounds() -> (Vector2<f64>, Vector2<f64>) {
    (Vector2::new(-10.0, -10.0), Vector2::new(10.0, 10.0))
}

#[test]
fn regression_mixture_separates_lines() {
    let mut rng = SmallRng::seed_from_u64(0x1234);
    let data: Vec<(DVector<f64>, f64)> = (0..30)
        .map(|i| {
            let t: f64 = rng.random_range(-3.0..3.0);
            let y = if i < 15 { 2.0 + 1.5 * t } else { -1.0 - 2.0 * t };
            (dvector![1.0, t], y + 0.1 * (rng.random::<f64>() - 0.5))
        })
        .collect();

    let nig = Nig::new(DVector::zeros(2), DMatrix::identity(2, 2) * 10.0, 2.0, 0.5).unwrap();
    let trace = run(nig, &data);
    assert_groups_recovered(&trace, 15);
}

#[test]
fn segment_mixture_separates_segments() {
    let mut rng = SmallRng::seed_from_u64(0x1234);
    let data = two_segments(30, &mut rng);
    let (lower, upper) = bounds();

    let segments = SegmentMixture::new(lower, upper, 3.0, 0.2).unwrap();
    let trace = run(segments, &data);
    assert_groups_recovered(&trace, 15);
}

#[test]
fn schedule_mixture_separates_segments() {
    let mut rng = SmallRng::seed_from_u64(0x1234);
    let data = two_segments(30, &mut rng);
    let (lower, upper) = bounds();

    let schedule = ScheduleMixture::new(lower, upper, 3, 2.0, 0.05, 2.0).unwrap();
    let trace = run(schedule, &data);
    assert_groups_recovered(&trace, 15);
}

#[test]
fn wrong_dimension_fails_before_sampling() {
    let (lower, upper) = bounds();
    let segments = SegmentMixture::new(lower, upper, 3.0, 0.2).unwrap();
    let data = vec![dvector![0.0, 1.0], dvector![0.0, 1.0, 2.0]];

    let config = config();
    let mut rng = config.rng();
    let mut dpmm = Dpmm::new(segments, config).unwrap();
    assert!(matches!(
        dpmm.run(&data, &mut rng),
        Err(Error::DimensionMismatch {
            index: 1,
            expected: 2,
            found: 3
        })
    ));
}

#[test]
fn small_budget_is_exhausted() {
    let mut rng = SmallRng::seed_from_u64(0x1234);
    let data = two_segments(10, &mut rng);
    let (lower, upper) = bounds();
    let segments = SegmentMixture::new(lower, upper, 3.0, 0.2).unwrap();

    // Everyone starts in slot 0, leaving two free slots for three auxiliary clusters.
    let config = SamplerConfig {
        initial_clusters: 1,
        max_clusters: 3,
        ..config()
    };
    let mut chain = config.rng();
    let mut dpmm = Dpmm::new(segments, config).unwrap();

    assert!(matches!(
        dpmm.run(&data, &mut chain),
        Err(Error::CapacityExceeded { capacity: 3 })
    ));
}
