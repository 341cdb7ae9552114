use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rv::dist::Gaussian;
use rv::traits::Sampleable;

use dpmix::models::Niw;
use dpmix::{AcceptanceRule, Dpmm, SamplerConfig, Trace};

fn blobs(n_per_blob: usize, rng: &mut SmallRng) -> Vec<DVector<f64>> {
    let noise = Gaussian::new(0.0, 0.2).unwrap();
    [-10.0, 10.0]
        .iter()
        .flat_map(|&centre| {
            (0..n_per_blob)
                .map(|_| {
                    let offset: Vec<f64> = noise.sample(2, rng);
                    DVector::from_vec(offset).add_scalar(centre)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Recorded iterations in which some item of `items` left the first one's cluster.
fn iterations_split(trace: &Trace, items: std::ops::Range<usize>) -> Vec<usize> {
    trace
        .iterations()
        .iter()
        .zip(trace.labels())
        .filter(|(_, row)| items.clone().any(|i| row[i] != row[items.start]))
        .map(|(&iteration, _)| iteration)
        .collect()
}

#[test]
fn separated_blobs_get_their_own_clusters() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = SmallRng::seed_from_u64(1);
    let data = blobs(10, &mut rng);

    let niw = Niw::new(
        DVector::zeros(2),
        0.001,
        4,
        DMatrix::identity(2, 2) * 0.1,
    )
    .unwrap()
    .with_steps(0.1, 0.1)
    .unwrap();
    // Singleton covariances need the prior to stay away from zero.
    let config = SamplerConfig {
        alpha: 1.0,
        n_iter: 200,
        acceptance: AcceptanceRule::Posterior,
        seed: Some(2),
        ..SamplerConfig::default()
    };

    let mut chain = config.rng();
    let mut dpmm = Dpmm::new(niw, config).unwrap();
    let trace = dpmm.run(&data, &mut chain).unwrap();

    assert!(trace.is_complete());
    assert_eq!(trace.len(), 100);
    assert_eq!(trace.to_matrix().shape(), (20, 100));

    assert_eq!(iterations_split(&trace, 0..10), Vec::<usize>::new());
    assert_eq!(iterations_split(&trace, 10..20), Vec::<usize>::new());

    let apart = trace
        .labels()
        .iter()
        .filter(|row| row[0] != row[10])
        .count();
    assert_eq!(apart, trace.len());
}
