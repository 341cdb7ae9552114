use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rv::dist::{Gaussian, InvGamma, MvGaussian};
use rv::traits::{HasDensity, Sampleable};
use serde::{Deserialize, Serialize};

use super::LikelihoodModel;
use crate::error::{Error, Result};
use crate::utils::{jitter, scale_walk, walk};

/// Regression coefficients and noise variance of one cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionParameter {
    pub weights: DVector<f64>,
    pub variance: f64,
}

/// Mixture of linear regressions `y ~ N(w'x, variance)` under a Normal-Inverse-Gamma prior:
/// `variance ~ InvGamma(shape, scale)` and `w | variance ~ N(mean, variance * cov)`.
///
/// Observations are `(x, y)` covariate/response pairs.
#[derive(Clone, Debug)]
pub struct Nig {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
    variance_prior: InvGamma,
    weight_walk: Gaussian,
    variance_walk: Gaussian,
}

impl Nig {
    pub const DEFAULT_WEIGHT_STEP: f64 = 0.1;
    pub const DEFAULT_VARIANCE_STEP: f64 = 0.2;

    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `cov` is not positive definite, its shape does not
    /// match `mean`, or the inverse-gamma parameters are invalid.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>, shape: f64, scale: f64) -> Result<Self> {
        if cov.shape() != (mean.len(), mean.len()) {
            return Err(Error::InvalidConfig {
                field: "nig.cov",
                message: format!(
                    "expected {0}x{0} covariance, got {1:?}",
                    mean.len(),
                    cov.shape()
                ),
            });
        }
        MvGaussian::new(mean.clone(), cov.clone()).map_err(|e| Error::InvalidConfig {
            field: "nig.cov",
            message: format!("{e:?}"),
        })?;

        let variance_prior = InvGamma::new(shape, scale).map_err(|e| Error::InvalidConfig {
            field: "nig.variance",
            message: format!("{e:?}"),
        })?;

        Ok(Self {
            mean,
            cov,
            variance_prior,
            weight_walk: walk("nig.weight_step", Self::DEFAULT_WEIGHT_STEP)?,
            variance_walk: walk("nig.variance_step", Self::DEFAULT_VARIANCE_STEP)?,
        })
    }

    /// Zero-mean weights with unit prior covariance and `InvGamma(2, 1)` noise.
    ///
    /// # Errors
    /// If `dim` is zero.
    pub fn standard(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig {
                field: "nig",
                message: String::from("need at least one covariate"),
            });
        }
        Self::new(DVector::zeros(dim), DMatrix::identity(dim, dim), 2.0, 1.0)
    }

    /// # Errors
    /// If either step is not strictly positive.
    pub fn with_steps(mut self, weight_step: f64, variance_step: f64) -> Result<Self> {
        self.weight_walk = walk("nig.weight_step", weight_step)?;
        self.variance_walk = walk("nig.variance_step", variance_step)?;
        Ok(self)
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Prior of the weights given the noise variance.
    fn weight_prior(&self, variance: f64) -> Option<MvGaussian> {
        MvGaussian::new(self.mean.clone(), &self.cov * variance).ok()
    }
}

impl LikelihoodModel for Nig {
    type Observation = (DVector<f64>, f64);
    type Parameter = RegressionParameter;

    fn ln_density(&self, (x, y): &(DVector<f64>, f64), parameter: &RegressionParameter) -> f64 {
        if !(parameter.variance > 0.0 && parameter.variance.is_finite()) {
            return f64::NEG_INFINITY;
        }
        Gaussian::new_unchecked(parameter.weights.dot(x), parameter.variance.sqrt()).ln_f(y)
    }

    fn ln_prior(&self, parameter: &RegressionParameter) -> f64 {
        let v = parameter.variance;
        if !(v > 0.0 && v.is_finite()) {
            return f64::NEG_INFINITY;
        }
        self.weight_prior(v).map_or(f64::NEG_INFINITY, |mvg| {
            self.variance_prior.ln_f(&v) + mvg.ln_f(&parameter.weights)
        })
    }

    fn sample_prior<R: Rng>(&self, rng: &mut R) -> RegressionParameter {
        let variance: f64 = self.variance_prior.draw(rng);
        let weights = self
            .weight_prior(variance)
            .map_or_else(|| self.mean.clone(), |mvg| mvg.draw(rng));
        RegressionParameter { weights, variance }
    }

    fn perturb<R: Rng>(
        &self,
        parameter: &RegressionParameter,
        rng: &mut R,
    ) -> RegressionParameter {
        RegressionParameter {
            weights: jitter(&parameter.weights, &self.weight_walk, rng),
            variance: scale_walk(parameter.variance, &self.variance_walk, rng),
        }
    }

    fn ln_proposal_ratio(
        &self,
        current: &RegressionParameter,
        proposed: &RegressionParameter,
    ) -> f64 {
        (proposed.variance / current.variance).ln()
    }

    fn check_observation(&self, index: usize, (x, _): &(DVector<f64>, f64)) -> Result<()> {
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

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector, dvector};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{Nig, RegressionParameter};
    use crate::models::LikelihoodModel;

    #[test]
    fn density_is_gaussian_residual() {
        let nig = Nig::standard(2).unwrap();
        let parameter = RegressionParameter {
            weights: dvector![2.0, -1.0],
            variance: 0.25,
        };
        let obs = (dvector![1.0, 1.0], 1.5);

        // residual 0.5, sd 0.5
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln() - 0.5_f64.ln() - 0.5;
        assert::close(nig.ln_density(&obs, &parameter), expected, 1E-10);
    }

    #[test]
    fn non_positive_variance_has_no_density() {
        let nig = Nig::standard(1).unwrap();
        let parameter = RegressionParameter {
            weights: dvector![1.0],
            variance: 0.0,
        };

        assert_eq!(nig.ln_density(&(dvector![1.0], 1.0), &parameter), f64::NEG_INFINITY);
        assert_eq!(nig.ln_prior(&parameter), f64::NEG_INFINITY);
    }

    #[test]
    fn prior_draws_are_finite_under_prior() {
        let mut rng = SmallRng::seed_from_u64(0x1234);
        let nig = Nig::standard(3).unwrap();

        for _ in 0..100 {
            let parameter = nig.sample_prior(&mut rng);
            assert_eq!(parameter.weights.len(), 3);
            assert!(parameter.variance > 0.0);
            assert!(nig.ln_prior(&parameter).is_finite());
        }
    }

    #[test]
    fn prior_ratio_matches_closed_form() {
        // w | v ~ N(0, v), v ~ InvGamma(2, 1)
        let nig = Nig::standard(1).unwrap();
        let a = RegressionParameter {
            weights: dvector![0.0],
            variance: 1.0,
        };
        let b = RegressionParameter {
            weights: dvector![1.0],
            variance: 2.0,
        };

        let expected = -3.5 * 2.0_f64.ln() + 0.25;
        assert::close(nig.ln_prior(&b) - nig.ln_prior(&a), expected, 1E-10);
    }

    #[test]
    fn perturb_scales_variance() {
        let mut rng = SmallRng::seed_from_u64(0x4321);
        let nig = Nig::standard(2).unwrap();
        let parameter = nig.sample_prior(&mut rng);
        let proposed = nig.perturb(&parameter, &mut rng);

        assert!(proposed.variance > 0.0);
        assert::close(
            nig.ln_proposal_ratio(&parameter, &proposed),
            (proposed.variance / parameter.variance).ln(),
            1E-12,
        );
    }

    #[test]
    fn invalid_hyper_parameters() {
        assert!(Nig::standard(0).is_err());
        assert!(Nig::new(DVector::zeros(2), DMatrix::identity(3, 3), 2.0, 1.0).is_err());
        assert!(Nig::new(DVector::zeros(2), -DMatrix::identity(2, 2), 2.0, 1.0).is_err());
        assert!(Nig::new(DVector::zeros(2), DMatrix::identity(2, 2), -1.0, 1.0).is_err());
    }
}
