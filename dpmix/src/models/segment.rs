use nalgebra::{DVector, Vector2};
use rand::Rng;
use rv::dist::{Gaussian, InvGamma};
use rv::traits::{HasDensity, Sampleable};
use serde::{Deserialize, Serialize};

use super::LikelihoodModel;
use crate::error::{Error, Result};
use crate::utils::{Bounds, jitter2, project_onto_segment, scale_walk, walk};

/// A line segment with Gaussian scatter around it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentParameter {
    pub start: Vector2<f64>,
    pub end: Vector2<f64>,
    pub noise: f64,
}

/// Planar points spread uniformly along a segment with perpendicular Gaussian noise.
///
/// The density is `N(offset; 0, noise) / length` where the point projects inside the
/// segment and zero elsewhere. Endpoints are uniform in a bounding box a priori and the noise
/// scale is inverse-gamma.
#[derive(Clone, Debug)]
pub struct SegmentMixture {
    bounds: Bounds,
    noise_prior: InvGamma,
    endpoint_walk: Gaussian,
    noise_walk: Gaussian,
}

impl SegmentMixture {
    pub const DEFAULT_ENDPOINT_STEP: f64 = 0.2;
    pub const DEFAULT_NOISE_STEP: f64 = 0.2;

    /// # Errors
    /// Returns [`Error::InvalidConfig`] for an empty bounding box or invalid noise prior.
    pub fn new(
        lower: Vector2<f64>,
        upper: Vector2<f64>,
        noise_shape: f64,
        noise_scale: f64,
    ) -> Result<Self> {
        let noise_prior =
            InvGamma::new(noise_shape, noise_scale).map_err(|e| Error::InvalidConfig {
                field: "segment.noise",
                message: format!("{e:?}"),
            })?;

        Ok(Self {
            bounds: Bounds::new("segment.bounds", lower, upper)?,
            noise_prior,
            endpoint_walk: walk("segment.endpoint_step", Self::DEFAULT_ENDPOINT_STEP)?,
            noise_walk: walk("segment.noise_step", Self::DEFAULT_NOISE_STEP)?,
        })
    }

    /// # Errors
    /// If either step is not strictly positive.
    pub fn with_steps(mut self, endpoint_step: f64, noise_step: f64) -> Result<Self> {
        self.endpoint_walk = walk("segment.endpoint_step", endpoint_step)?;
        self.noise_walk = walk("segment.noise_step", noise_step)?;
        Ok(self)
    }
}

impl LikelihoodModel for SegmentMixture {
    type Observation = DVector<f64>;
    type Parameter = SegmentParameter;

    fn ln_density(&self, x: &DVector<f64>, parameter: &SegmentParameter) -> f64 {
        if !(parameter.noise > 0.0) {
            return f64::NEG_INFINITY;
        }
        project_onto_segment(&parameter.start, &parameter.end, x).map_or(
            f64::NEG_INFINITY,
            |p| {
                Gaussian::new_unchecked(0.0, parameter.noise).ln_f(&p.offset) - p.length.ln()
            },
        )
    }

    fn ln_prior(&self, parameter: &SegmentParameter) -> f64 {
        let noise = parameter.noise;
        if !(noise > 0.0 && noise.is_finite())
            || !self.bounds.contains(&parameter.start)
            || !self.bounds.contains(&parameter.end)
        {
            return f64::NEG_INFINITY;
        }
        self.noise_prior.ln_f(&noise)
    }

    fn sample_prior<R: Rng>(&self, rng: &mut R) -> SegmentParameter {
        SegmentParameter {
            start: self.bounds.draw(rng),
            end: self.bounds.draw(rng),
            noise: self.noise_prior.draw(rng),
        }
    }

    fn perturb<R: Rng>(&self, parameter: &SegmentParameter, rng: &mut R) -> SegmentParameter {
        SegmentParameter {
            start: jitter2(&parameter.start, &self.endpoint_walk, rng),
            end: jitter2(&parameter.end, &self.endpoint_walk, rng),
            noise: scale_walk(parameter.noise, &self.noise_walk, rng),
        }
    }

    fn ln_proposal_ratio(&self, current: &SegmentParameter, proposed: &SegmentParameter) -> f64 {
        (proposed.noise / current.noise).ln()
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
