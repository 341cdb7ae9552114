use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Verbosity;
use crate::error::{Error, Result};
use crate::mcmc::samplers::continuous::refresh::AcceptanceRule;

/// Run settings for the mixture sampler.
///
/// Missing fields take their defaults when deserialized, so a partial JSON document such as
/// `{"alpha": 0.5, "seed": 7}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Dirichlet process concentration.
    pub alpha: f64,
    /// Outer Gibbs iterations. The first half is burn-in.
    pub n_iter: usize,
    /// Auxiliary clusters per reassignment (`M`).
    pub n_auxiliary: usize,
    /// Random-walk sweeps per parameter refresh.
    pub n_refresh: usize,
    /// Acceptance test of the parameter refresh.
    pub acceptance: AcceptanceRule,
    /// Slots the initial state spreads items over.
    pub initial_clusters: usize,
    /// Hard budget of cluster slots.
    pub max_clusters: usize,
    pub verbosity: u8,
    /// Seed for the chain's generator; `None` draws one from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            n_iter: 200,
            n_auxiliary: 3,
            n_refresh: 100,
            acceptance: AcceptanceRule::LikelihoodRatio,
            initial_clusters: 30,
            max_clusters: 200,
            verbosity: 0,
            seed: None,
        }
    }
}

impl SamplerConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// [`Error::Json`] for malformed input, otherwise as [`SamplerConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field, message: &str| {
            Err(Error::InvalidConfig {
                field,
                message: message.to_owned(),
            })
        };

        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return invalid("alpha", "must be positive and finite");
        }
        if self.n_iter < 2 {
            return invalid("n_iter", "need at least two iterations");
        }
        if self.n_auxiliary == 0 {
            return invalid("n_auxiliary", "need at least one auxiliary cluster");
        }
        if self.initial_clusters == 0 {
            return invalid("initial_clusters", "need at least one initial cluster");
        }
        if self.initial_clusters > self.max_clusters {
            return invalid("initial_clusters", "exceeds max_clusters");
        }
        self.verbosity()?;
        Ok(())
    }

    /// # Errors
    /// [`Error::InvalidConfig`] if the level is above 2.
    pub fn verbosity(&self) -> Result<Verbosity> {
        Verbosity::try_from(self.verbosity)
    }

    /// Iterations discarded before the trace starts recording.
    #[must_use]
    pub const fn burn_in(&self) -> usize {
        self.n_iter / 2
    }

    /// Generator for one chain.
    #[must_use]
    pub fn rng(&self) -> Xoshiro256Plus {
        Xoshiro256Plus::seed_from_u64(self.seed.unwrap_or_else(rand::random))
    }
}
