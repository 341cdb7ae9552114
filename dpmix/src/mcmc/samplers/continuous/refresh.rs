use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mcmc::Sampler;
use crate::models::{LikelihoodModel, MixtureState};

/// How a proposed cluster parameter is accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceRule {
    /// Accept when `ln u < ln L(proposed) - ln L(current)` over the cluster's members.
    #[default]
    LikelihoodRatio,
    /// Metropolis-Hastings on likelihood times prior, with the family's proposal correction.
    Posterior,
    /// Reject every proposal. Parameters never move; useful to isolate the partition moves.
    AlwaysReject,
}

/// Counts over one call to [`ParameterRefresh::refresh`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub proposed: usize,
    pub accepted: usize,
    /// Proposals accepted because the current parameter gave its members zero likelihood.
    pub escaped_zero: usize,
}

impl RefreshStats {
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.accepted as f64 / self.proposed as f64;
            rate
        }
    }
}

/// Symmetric-random-walk Metropolis refresh of every occupied cluster's parameter, holding the
/// partition fixed.
#[derive(Debug)]
pub struct ParameterRefresh<L> {
    likelihood: Arc<L>,
    n_sweeps: usize,
    rule: AcceptanceRule,
}

impl<L> Clone for ParameterRefresh<L> {
    fn clone(&self) -> Self {
        Self {
            likelihood: Arc::clone(&self.likelihood),
            n_sweeps: self.n_sweeps,
            rule: self.rule,
        }
    }
}

/// Cached score of one cluster's current parameter.
struct Chain {
    cluster: usize,
    members: Vec<usize>,
    ln_likelihood: f64,
    ln_prior: f64,
}

impl<L: LikelihoodModel> ParameterRefresh<L> {
    pub const DEFAULT_N_SWEEPS: usize = 100;

    #[must_use]
    pub const fn new(likelihood: Arc<L>, n_sweeps: usize) -> Self {
        Self {
            likelihood,
            n_sweeps,
            rule: AcceptanceRule::LikelihoodRatio,
        }
    }

    #[must_use]
    pub const fn with_rule(mut self, rule: AcceptanceRule) -> Self {
        self.rule = rule;
        self
    }

    #[must_use]
    pub const fn n_sweeps(&self) -> usize {
        self.n_sweeps
    }

    #[must_use]
    pub const fn rule(&self) -> AcceptanceRule {
        self.rule
    }

    /// Run `n_sweeps` passes over the occupied clusters, proposing one move per cluster per
    /// pass. Clusters are visited in ascending slot order.
    ///
    /// A cluster whose current parameter gives zero likelihood to its members accepts any
    /// proposal.
    ///
    /// # Errors
    /// [`Error::MissingParameter`] if an occupied cluster has no parameter.
    pub fn refresh<R: Rng>(
        &self,
        state: &mut MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<RefreshStats> {
        let mut chains = Vec::with_capacity(state.partition.n_occupied());
        for (cluster, members) in state.partition.members() {
            let parameter = state
                .table
                .get(cluster)
                .ok_or(Error::MissingParameter { cluster })?;
            chains.push(Chain {
                cluster,
                ln_likelihood: self
                    .likelihood
                    .ln_likelihood(members.iter().map(|&i| &data[i]), parameter),
                ln_prior: self.likelihood.ln_prior(parameter),
                members,
            });
        }

        let mut stats = RefreshStats::default();
        for _ in 0..self.n_sweeps {
            for chain in &mut chains {
                let current = state
                    .table
                    .get(chain.cluster)
                    .ok_or(Error::MissingParameter {
                        cluster: chain.cluster,
                    })?;
                let proposed = self.likelihood.perturb(current, rng);
                stats.proposed += 1;

                let ln_likelihood = self
                    .likelihood
                    .ln_likelihood(chain.members.iter().map(|&i| &data[i]), &proposed);
                let ln_prior = self.likelihood.ln_prior(&proposed);

                let accept = match self.rule {
                    AcceptanceRule::AlwaysReject => false,
                    _ if chain.ln_likelihood == f64::NEG_INFINITY => {
                        stats.escaped_zero += 1;
                        true
                    }
                    AcceptanceRule::LikelihoodRatio => {
                        let u: f64 = rng.random();
                        u.ln() < ln_likelihood - chain.ln_likelihood
                    }
                    AcceptanceRule::Posterior => {
                        let ln_alpha = ln_likelihood + ln_prior
                            - chain.ln_likelihood
                            - chain.ln_prior
                            + self.likelihood.ln_proposal_ratio(current, &proposed);
                        let u: f64 = rng.random();
                        u.ln() < ln_alpha
                    }
                };

                if accept {
                    stats.accepted += 1;
                    chain.ln_likelihood = ln_likelihood;
                    chain.ln_prior = ln_prior;
                    state.table.insert(chain.cluster, proposed);
                }
            }
        }

        Ok(stats)
    }
}

impl<L> Sampler<MixtureState<L::Parameter>, [L::Observation]> for ParameterRefresh<L>
where
    L: LikelihoodModel,
{
    fn step<R: Rng>(
        &mut self,
        mut model: MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<MixtureState<L::Parameter>> {
        self.refresh(&mut model, data, rng)?;
        Ok(model)
    }
}
