use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rv::dist::{Gaussian, MvGaussian, NormalInvWishart};
use rv::traits::{HasDensity, Sampleable};
use serde::{Deserialize, Serialize};

use super::LikelihoodModel;
use crate::error::{Error, Result};
use crate::utils::{jitter, scale_walk, walk};

/// Location and covariance of a multivariate Gaussian cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianParameter {
    pub mean: DVector<f64>,
    pub cov: DMatrix<f64>,
}

/// Multivariate Gaussian clusters under a Normal-Inverse-Wishart prior.
///
/// The prior is not used conjugately: cluster parameters are refreshed by a random walk that
/// moves the mean additively and the covariance by a common log-normal scale factor.
#[derive(Clone, Debug)]
pub struct Niw {
    prior: NormalInvWishart,
    mean_walk: Gaussian,
    scale_walk: Gaussian,
}

impl Niw {
    pub const DEFAULT_MEAN_STEP: f64 = 0.2;
    pub const DEFAULT_SCALE_STEP: f64 = 0.2;

    /// Create a new NIW family.
    ///
    /// # Arguments
    /// * `mean` - Prior mean of the cluster locations.
    /// * `k` - Number of pseudo-observations behind `mean`.
    /// * `df` - Inverse-Wishart degrees of freedom.
    /// * `scale` - Inverse-Wishart scale matrix.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the hyper-parameters do not form a valid NIW.
    pub fn new(mean: DVector<f64>, k: f64, df: usize, scale: DMatrix<f64>) -> Result<Self> {
        let prior =
            NormalInvWishart::new(mean, k, df, scale).map_err(|e| Error::InvalidConfig {
                field: "niw",
                message: format!("{e:?}"),
            })?;

        Ok(Self {
            prior,
            mean_walk: walk("niw.mean_step", Self::DEFAULT_MEAN_STEP)?,
            scale_walk: walk("niw.scale_step", Self::DEFAULT_SCALE_STEP)?,
        })
    }

    /// A broad prior centred on the origin with identity scale.
    ///
    /// # Errors
    /// If `dim` is zero.
    pub fn standard(dim: usize) -> Result<Self> {
        Self::new(DVector::zeros(dim), 0.05, dim + 2, DMatrix::identity(dim, dim))
    }

    /// Set the random-walk step sizes for the mean and the log covariance scale.
    ///
    /// # Errors
    /// If either step is not strictly positive.
    pub fn with_steps(mut self, mean_step: f64, scale_step: f64) -> Result<Self> {
        self.mean_walk = walk("niw.mean_step", mean_step)?;
        self.scale_walk = walk("niw.scale_step", scale_step)?;
        Ok(self)
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.prior.mu().len()
    }
}

impl LikelihoodModel for Niw {
    type Observation = DVector<f64>;
    type Parameter = GaussianParameter;

    fn ln_density(&self, x: &DVector<f64>, parameter: &GaussianParameter) -> f64 {
        MvGaussian::new(parameter.mean.clone(), parameter.cov.clone())
            .map_or(f64::NEG_INFINITY, |mvg| mvg.ln_f(x))
    }

    fn ln_prior(&self, parameter: &GaussianParameter) -> f64 {
        MvGaussian::new(parameter.mean.clone(), parameter.cov.clone())
            .map_or(f64::NEG_INFINITY, |mvg| self.prior.ln_f(&mvg))
    }

    fn sample_prior<R: Rng>(&self, rng: &mut R) -> GaussianParameter {
        let mvg: MvGaussian = self.prior.draw(rng);
        GaussianParameter {
            mean: mvg.mu().clone(),
            cov: mvg.cov().clone(),
        }
    }

    fn perturb<R: Rng>(&self, parameter: &GaussianParameter, rng: &mut R) -> GaussianParameter {
        let mean = jitter(&parameter.mean, &self.mean_walk, rng);
        let factor = scale_walk(1.0, &self.scale_walk, rng);
        GaussianParameter {
            mean,
            cov: &parameter.cov * factor,
        }
    }

    fn ln_proposal_ratio(&self, current: &GaussianParameter, proposed: &GaussianParameter) -> f64 {
        // Every free entry of the covariance is scaled by the same factor.
        let d = self.dim();
        #[allow(clippy::cast_precision_loss)]
        let n_free = (d * (d + 1) / 2) as f64;
        n_free * (proposed.cov[(0, 0)] / current.cov[(0, 0)]).ln()
    }

    fn check_observation(&self, index: usize, x: &DVector<f64>) -> Result<()> {
        if x.len() == self.dim() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                index,
                expected: self.dim(),
                found: x.len(),
            })
        }
    }
}
