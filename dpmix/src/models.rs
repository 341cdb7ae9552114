use std::fmt::Debug;

use rand::Rng;

use crate::error::Result;

/// Per-cluster likelihood together with the prior over cluster parameters.
///
/// This is the only way the samplers touch a family: parameters are passed around opaquely
/// and every density, prior draw and random-walk proposal goes through these methods.
pub trait LikelihoodModel {
    /// A single datum.
    type Observation;
    /// The parameter realization owned by one cluster.
    type Parameter: Clone + Debug;

    /// Log density of `x` under a cluster with `parameter`. Returns `-inf` where the density
    /// vanishes.
    fn ln_density(&self, x: &Self::Observation, parameter: &Self::Parameter) -> f64;

    /// Density of `x` under a cluster with `parameter`.
    fn density(&self, x: &Self::Observation, parameter: &Self::Parameter) -> f64 {
        self.ln_density(x, parameter).exp()
    }

    /// Log prior density of `parameter`, up to an additive constant.
    ///
    /// Read by prior-weighted acceptance. The default is flat.
    fn ln_prior(&self, _parameter: &Self::Parameter) -> f64 {
        0.0
    }

    /// Draw a fresh parameter from the prior.
    fn sample_prior<R: Rng>(&self, rng: &mut R) -> Self::Parameter;

    /// Random-walk proposal around `parameter`.
    fn perturb<R: Rng>(&self, parameter: &Self::Parameter, rng: &mut R) -> Self::Parameter;

    /// `ln q(current | proposed) - ln q(proposed | current)` for [`LikelihoodModel::perturb`].
    ///
    /// Zero for symmetric walks.
    fn ln_proposal_ratio(&self, _current: &Self::Parameter, _proposed: &Self::Parameter) -> f64 {
        0.0
    }

    /// Reject observations the family cannot score, e.g. the wrong dimension.
    ///
    /// # Errors
    /// Implementations return [`crate::Error::DimensionMismatch`] for malformed data.
    fn check_observation(&self, _index: usize, _x: &Self::Observation) -> Result<()> {
        Ok(())
    }

    /// Joint log likelihood of `xs` under a single cluster.
    fn ln_likelihood<'a, I>(&self, xs: I, parameter: &Self::Parameter) -> f64
    where
        I: IntoIterator<Item = &'a Self::Observation>,
        Self::Observation: 'a,
    {
        xs.into_iter().map(|x| self.ln_density(x, parameter)).sum()
    }
}

pub mod family;
pub mod mixture;
pub mod nig;
pub mod niw;
pub mod schedule;
pub mod segment;

pub use family::Family;
pub use mixture::MixtureState;
pub use nig::{Nig, RegressionParameter};
pub use niw::{GaussianParameter, Niw};
pub use schedule::{ScheduleMixture, ScheduleParameter};
pub use segment::{SegmentMixture, SegmentParameter};
