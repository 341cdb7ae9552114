use nalgebra::{DVector, Vector2};
use rand::Rng;
use rv::dist::{Gamma, Gaussian, SymmetricDirichlet};
use rv::misc::LogSumExp;
use rv::traits::{HasDensity, Sampleable};
use serde::{Deserialize, Serialize};

use super::LikelihoodModel;
use crate::error::{Error, Result};
use crate::utils::{Bounds, jitter2, project_onto_segment, scale_walk, walk};

/// A directed segment, its perpendicular concentration and the schedule of component weights
/// along it, from `start` to `end`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleParameter {
    pub start: Vector2<f64>,
    pub end: Vector2<f64>,
    pub concentration: f64,
    pub weights: Vec<f64>,
}

/// Points laid out along a directed segment according to a piecewise-constant schedule.
///
/// The segment is cut into `weights.len()` equal bins; a point projecting into bin `b` has
/// density `B * w_b / length` along the segment times a perpendicular Gaussian with precision
/// `concentration`. Points that project outside the segment have zero density.
#[derive(Clone, Debug)]
pub struct ScheduleMixture {
    bounds: Bounds,
    n_bins: usize,
    concentration_prior: Gamma,
    weight_prior: SymmetricDirichlet,
    endpoint_walk: Gaussian,
    concentration_walk: Gaussian,
    weight_walk: Gaussian,
}

impl ScheduleMixture {
    pub const DEFAULT_ENDPOINT_STEP: f64 = 0.2;
    pub const DEFAULT_CONCENTRATION_STEP: f64 = 0.2;
    pub const DEFAULT_WEIGHT_STEP: f64 = 0.1;

    /// # Arguments
    /// * `lower`, `upper` - Bounding box for the endpoints.
    /// * `n_bins` - Number of schedule components along the segment.
    /// * `concentration_shape`, `concentration_rate` - Gamma prior on the concentration.
    /// * `weight_alpha` - Symmetric Dirichlet prior on the schedule weights.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for invalid priors or an empty bounding box.
    pub fn new(
        lower: Vector2<f64>,
        upper: Vector2<f64>,
        n_bins: usize,
        concentration_shape: f64,
        concentration_rate: f64,
        weight_alpha: f64,
    ) -> Result<Self> {
        let concentration_prior = Gamma::new(concentration_shape, concentration_rate)
            .map_err(|e| Error::InvalidConfig {
                field: "schedule.concentration",
                message: format!("{e:?}"),
            })?;
        let weight_prior =
            SymmetricDirichlet::new(weight_alpha, n_bins).map_err(|e| Error::InvalidConfig {
                field: "schedule.weights",
                message: format!("{e:?}"),
            })?;

        Ok(Self {
            bounds: Bounds::new("schedule.bounds", lower, upper)?,
            n_bins,
            concentration_prior,
            weight_prior,
            endpoint_walk: walk("schedule.endpoint_step", Self::DEFAULT_ENDPOINT_STEP)?,
            concentration_walk: walk(
                "schedule.concentration_step",
                Self::DEFAULT_CONCENTRATION_STEP,
            )?,
            weight_walk: walk("schedule.weight_step", Self::DEFAULT_WEIGHT_STEP)?,
        })
    }

    /// # Errors
    /// If any step is not strictly positive.
    pub fn with_steps(
        mut self,
        endpoint_step: f64,
        concentration_step: f64,
        weight_step: f64,
    ) -> Result<Self> {
        self.endpoint_walk = walk("schedule.endpoint_step", endpoint_step)?;
        self.concentration_walk = walk("schedule.concentration_step", concentration_step)?;
        self.weight_walk = walk("schedule.weight_step", weight_step)?;
        Ok(self)
    }

    #[must_use]
    pub const fn n_bins(&self) -> usize {
        self.n_bins
    }
}

/// Move the weights by a Gaussian step on their logits and renormalise.
fn walk_simplex<R: Rng>(weights: &[f64], step: &Gaussian, rng: &mut R) -> Vec<f64> {
    let logits: Vec<f64> = weights
        .iter()
        .map(|w| {
            let delta: f64 = step.draw(rng);
            w.ln() + delta
        })
        .collect();
    let total = logits.iter().logsumexp();
    logits.into_iter().map(|l| (l - total).exp()).collect()
}

fn sum_ln(weights: &[f64]) -> f64 {
    weights.iter().map(|w| w.ln()).sum()
}

impl LikelihoodModel for ScheduleMixture {
    type Observation = DVector<f64>;
    type Parameter = ScheduleParameter;

    fn ln_density(&self, x: &DVector<f64>, parameter: &ScheduleParameter) -> f64 {
        let n_bins = parameter.weights.len();
        if n_bins == 0 || !(parameter.concentration > 0.0) {
            return f64::NEG_INFINITY;
        }
        let Some(p) = project_onto_segment(&parameter.start, &parameter.end, x) else {
            return f64::NEG_INFINITY;
        };

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let (bin, bins) = (
            ((p.along * n_bins as f64) as usize).min(n_bins - 1),
            n_bins as f64,
        );
        let w = parameter.weights[bin];
        if !(w > 0.0) {
            return f64::NEG_INFINITY;
        }

        let perpendicular = Gaussian::new_unchecked(0.0, parameter.concentration.sqrt().recip());
        (bins * w).ln() - p.length.ln() + perpendicular.ln_f(&p.offset)
    }

    fn ln_prior(&self, parameter: &ScheduleParameter) -> f64 {
        let k = parameter.concentration;
        if !(k > 0.0 && k.is_finite())
            || parameter.weights.len() != self.n_bins
            || !parameter.weights.iter().all(|&w| w > 0.0)
            || !self.bounds.contains(&parameter.start)
            || !self.bounds.contains(&parameter.end)
        {
            return f64::NEG_INFINITY;
        }
        self.concentration_prior.ln_f(&k) + self.weight_prior.ln_f(&parameter.weights)
    }

    fn sample_prior<R: Rng>(&self, rng: &mut R) -> ScheduleParameter {
        ScheduleParameter {
            start: self.bounds.draw(rng),
            end: self.bounds.draw(rng),
            concentration: self.concentration_prior.draw(rng),
            weights: self.weight_prior.draw(rng),
        }
    }

    fn perturb<R: Rng>(&self, parameter: &ScheduleParameter, rng: &mut R) -> ScheduleParameter {
        ScheduleParameter {
            start: jitter2(&parameter.start, &self.endpoint_walk, rng),
            end: jitter2(&parameter.end, &self.endpoint_walk, rng),
            concentration: scale_walk(parameter.concentration, &self.concentration_walk, rng),
            weights: walk_simplex(&parameter.weights, &self.weight_walk, rng),
        }
    }

    fn ln_proposal_ratio(&self, current: &ScheduleParameter, proposed: &ScheduleParameter) -> f64 {
        // A symmetric walk on the logits moves the simplex with Jacobian prod(w).
        (proposed.concentration / current.concentration).ln() + sum_ln(&proposed.weights)
            - sum_ln(&current.weights)
    }

    fn check_observation(&self, index: usize, x: &DVector<f64>) -> Result<()> {
        if x.len() == 2 {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                index,
                expected: 2,
                found: x.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{Vector2, dvector};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{ScheduleMixture, ScheduleParameter, walk_simplex};
    use crate::models::LikelihoodModel;
    use crate::utils::walk;

    fn family() -> ScheduleMixture {
        ScheduleMixture::new(
            Vector2::new(-10.0, -10.0),
            Vector2::new(10.0, 10.0),
            4,
            2.0,
            0.5,
            2.0,
        )
        .unwrap()
    }

    #[test]
    fn schedule_weights_shape_density_along_segment() {
        let schedule = family();
        let parameter = ScheduleParameter {
            start: Vector2::new(0.0, 0.0),
            end: Vector2::new(4.0, 0.0),
            concentration: 4.0,
            weights: vec![0.7, 0.1, 0.1, 0.1],
        };

        let early = schedule.ln_density(&dvector![0.5, 0.0], &parameter);
        let late = schedule.ln_density(&dvector![3.5, 0.0], &parameter);
        assert::close(early - late, 7.0_f64.ln(), 1E-10);

        // The end point itself falls in the last bin.
        let end = schedule.ln_density(&dvector![4.0, 0.0], &parameter);
        assert::close(end, late, 1E-10);

        let expected = (4.0_f64 * 0.7).ln() - 4.0_f64.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
            + 0.5 * 4.0_f64.ln();
        assert::close(early, expected, 1E-10);
    }

    #[test]
    fn zero_weight_bin_has_no_density() {
        let schedule = family();
        let parameter = ScheduleParameter {
            start: Vector2::new(0.0, 0.0),
            end: Vector2::new(4.0, 0.0),
            concentration: 1.0,
            weights: vec![0.0, 0.5, 0.5, 0.0],
        };

        assert_eq!(
            schedule.ln_density(&dvector![0.5, 0.0], &parameter),
            f64::NEG_INFINITY
        );
        assert!(schedule.ln_density(&dvector![1.5, 0.3], &parameter).is_finite());
    }

    #[test]
    fn walk_stays_on_simplex() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let step = walk("test", 0.3).unwrap();
        let mut weights = vec![0.25; 4];

        for _ in 0..200 {
            weights = walk_simplex(&weights, &step, &mut rng);
            assert::close(weights.iter().sum::<f64>(), 1.0, 1E-12);
            assert!(weights.iter().all(|&w| w > 0.0));
        }
    }

    #[test]
    fn prior_is_gamma_times_dirichlet() {
        // concentration ~ Gamma(2, rate 0.5), weights ~ Dirichlet(2, 2, 2, 2)
        let schedule = family();
        let flat = ScheduleParameter {
            start: Vector2::new(0.0, 0.0),
            end: Vector2::new(4.0, 0.0),
            concentration: 1.0,
            weights: vec![0.25; 4],
        };
        let tilted = ScheduleParameter {
            concentration: 2.0,
            weights: vec![0.4, 0.2, 0.2, 0.2],
            ..flat.clone()
        };

        let expected = 2.0_f64.ln() - 0.5 + 0.4_f64.ln() + 3.0 * 0.2_f64.ln()
            - 4.0 * 0.25_f64.ln();
        assert::close(
            schedule.ln_prior(&tilted) - schedule.ln_prior(&flat),
            expected,
            1E-10,
        );

        let emptied = ScheduleParameter {
            weights: vec![0.5, 0.5, 0.0, 0.0],
            ..flat.clone()
        };
        assert_eq!(schedule.ln_prior(&emptied), f64::NEG_INFINITY);
        let short = ScheduleParameter {
            weights: vec![0.5, 0.5],
            ..flat
        };
        assert_eq!(schedule.ln_prior(&short), f64::NEG_INFINITY);
    }

    #[test]
    fn prior_draws_match_bins() {
        let mut rng = SmallRng::seed_from_u64(0x9876);
        let schedule = family();

        for _ in 0..50 {
            let parameter = schedule.sample_prior(&mut rng);
            assert_eq!(parameter.weights.len(), schedule.n_bins());
            assert!(parameter.concentration > 0.0);
            assert!(schedule.ln_prior(&parameter).is_finite());
        }
    }
}
