use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use nalgebra::{DMatrix, DVector, Vector2};
use rand::Rng;
use rand_xoshiro::Xoshiro256Plus;
use rv::dist::Gaussian;
use rv::traits::Sampleable;

use dpmix::diagnostics::LogDiagnostics;
use dpmix::models::{Family, LikelihoodModel, Nig, Niw, ScheduleMixture, SegmentMixture};
use dpmix::{AcceptanceRule, Dpmm, Run, SamplerConfig};

/// Simulate a two-cluster data set and cluster it with a Dirichlet process mixture.
#[derive(Parser, Debug)]
#[command(name = "dpmix", version, about)]
struct Args {
    /// likelihood family: niw, nig, segment or schedule
    #[arg(short, long, default_value_t = Family::Niw)]
    family: Family,

    /// Dirichlet process concentration
    #[arg(short, long)]
    alpha: Option<f64>,

    /// number of Gibbs iterations
    #[arg(short, long)]
    n_iter: Option<usize>,

    /// random seed
    #[arg(long)]
    seed: Option<u64>,

    /// weigh parameter proposals by the prior as well as the likelihood
    #[arg(long)]
    posterior: bool,

    /// 0: quiet, 1: log every item move, 2: log every iteration
    #[arg(short, long)]
    verbosity: Option<u8>,

    /// JSON sampler configuration; command line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// number of simulated points
    #[arg(short, long, default_value_t = 40)]
    points: usize,

    /// write the final chain state as JSON
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Args {
    fn sampler_config(&self) -> Result<SamplerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                SamplerConfig::from_json(&json)?
            }
            None => SamplerConfig::default(),
        };

        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(n_iter) = self.n_iter {
            config.n_iter = n_iter;
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.posterior {
            config.acceptance = AcceptanceRule::Posterior;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.sampler_config()?;
    let mut rng = config.rng();
    let snapshot = args.snapshot.as_deref();

    info!("family {}, {} points", args.family, args.points);
    match args.family {
        Family::Niw => {
            let niw = Niw::new(
                DVector::zeros(2),
                0.01,
                4,
                DMatrix::identity(2, 2) * 0.5,
            )?
            .with_steps(0.1, 0.1)?;
            let data = simulate_blobs(args.points, &mut rng);
            run(niw, &data, config, snapshot, &mut rng)
        }
        Family::Nig => {
            let nig = Nig::new(DVector::zeros(2), DMatrix::identity(2, 2) * 10.0, 2.0, 0.5)?;
            let data = simulate_regressions(args.points, &mut rng);
            run(nig, &data, config, snapshot, &mut rng)
        }
        Family::Segment => {
            let (lower, upper) = bounding_box();
            let segments = SegmentMixture::new(lower, upper, 3.0, 0.2)?;
            let data = simulate_segments(args.points, &mut rng);
            run(segments, &data, config, snapshot, &mut rng)
        }
        Family::Schedule => {
            let (lower, upper) = bounding_box();
            let schedule = ScheduleMixture::new(lower, upper, 4, 2.0, 0.05, 2.0)?;
            let data = simulate_segments(args.points, &mut rng);
            run(schedule, &data, config, snapshot, &mut rng)
        }
    }
}

fn run<L>(
    likelihood: L,
    data: &[L::Observation],
    config: SamplerConfig,
    snapshot: Option<&Path>,
    rng: &mut Xoshiro256Plus,
) -> Result<()>
where
    L: LikelihoodModel,
    L::Parameter: serde::Serialize,
{
    let mut dpmm = Dpmm::new(likelihood, config)?.with_diagnostics(LogDiagnostics);
    let state = dpmm.initial_state(data, rng)?;
    let Run { trace, state } = dpmm.run_from(state, data, rng)?;

    for (iteration, labels) in trace.iterations().iter().zip(trace.labels()) {
        println!("iteration {iteration}: cluster sizes {:?}", cluster_sizes(labels));
    }
    if !trace.is_complete() {
        println!("run stopped early");
    }
    println!("labels: {:?}", state.partition.labels());

    if let Some(path) = snapshot {
        fs::write(path, serde_json::to_string_pretty(&state)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote snapshot to {}", path.display());
    }
    Ok(())
}

/// Sizes of the clusters in one row of labels, largest first.
fn cluster_sizes(labels: &[usize]) -> Vec<usize> {
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    let mut sizes: Vec<usize> = sorted
        .chunk_by(|a, b| a == b)
        .map(<[usize]>::len)
        .collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes
}

fn bounding_box() -> (Vector2<f64>, Vector2<f64>) {
    (Vector2::new(-10.0, -10.0), Vector2::new(10.0, 10.0))
}

fn simulate_blobs<R: Rng>(n: usize, rng: &mut R) -> Vec<DVector<f64>> {
    let noise = Gaussian::new_unchecked(0.0, 0.5);
    (0..n)
        .map(|i| {
            let centre = if i < n / 2 { -5.0 } else { 5.0 };
            let offset: Vec<f64> = noise.sample(2, rng);
            DVector::from_vec(offset).add_scalar(centre)
        })
        .collect()
}

fn simulate_regressions<R: Rng>(n: usize, rng: &mut R) -> Vec<(DVector<f64>, f64)> {
    let noise = Gaussian::new_unchecked(0.0, 0.3);
    (0..n)
        .map(|i| {
            let t: f64 = rng.random_range(-3.0..3.0);
            let (intercept, slope) = if i < n / 2 { (2.0, 1.5) } else { (-1.0, -2.0) };
            let e: f64 = noise.draw(rng);
            (DVector::from_vec(vec![1.0, t]), intercept + slope * t + e)
        })
        .collect()
}

fn simulate_segments<R: Rng>(n: usize, rng: &mut R) -> Vec<DVector<f64>> {
    let noise = Gaussian::new_unchecked(0.0, 0.1);
    let segments = [
        (Vector2::new(-6.0, -5.0), Vector2::new(-1.0, 4.0)),
        (Vector2::new(1.0, -4.0), Vector2::new(7.0, 2.0)),
    ];
    (0..n)
        .map(|i| {
            let (start, end) = segments[usize::from(i >= n / 2)];
            let direction = end - start;
            let normal = Vector2::new(-direction.y, direction.x).normalize();
            let along: f64 = rng.random();
            let offset: f64 = noise.draw(rng);
            let p = start + direction * along + normal * offset;
            DVector::from_vec(vec![p.x, p.y])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Args, cluster_sizes};
    use dpmix::AcceptanceRule;
    use dpmix::models::Family;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "dpmix", "--family", "segment", "--alpha", "0.5", "--n-iter", "20", "--seed", "3",
        ]);
        assert_eq!(args.family, Family::Segment);

        let config = args.sampler_config().unwrap();
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.n_iter, 20);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.max_clusters, 200);
        assert_eq!(config.acceptance, AcceptanceRule::LikelihoodRatio);

        let args = Args::parse_from(["dpmix", "--posterior"]);
        let config = args.sampler_config().unwrap();
        assert_eq!(config.acceptance, AcceptanceRule::Posterior);
    }

    #[test]
    fn unknown_family_is_rejected() {
        assert!(Args::try_parse_from(["dpmix", "--family", "crp"]).is_err());
    }

    #[test]
    fn invalid_override_fails_validation() {
        let args = Args::parse_from(["dpmix", "--n-iter", "1"]);
        assert!(args.sampler_config().is_err());
    }

    #[test]
    fn sizes_largest_first() {
        assert_eq!(cluster_sizes(&[4, 0, 4, 4, 2, 0]), vec![3, 2, 1]);
    }
}
