use std::sync::Arc;

use log::trace;
use rand::Rng;

use crate::error::{Error, Result};
use crate::mcmc::Sampler;
use crate::models::{LikelihoodModel, MixtureState};
use crate::rvs::ln_pflip_or_uniform;

/// Gibbs sampling on the space of partitions for non-conjugate mixtures, using `M` auxiliary
/// clusters drawn from the prior to stand in for every cluster that could be opened
/// (Neal 2000, algorithm 8).
#[derive(Debug)]
pub struct AuxiliaryGibbs<L> {
    likelihood: Arc<L>,
    alpha: f64,
    n_auxiliary: usize,
}

impl<L> Clone for AuxiliaryGibbs<L> {
    fn clone(&self) -> Self {
        Self {
            likelihood: Arc::clone(&self.likelihood),
            alpha: self.alpha,
            n_auxiliary: self.n_auxiliary,
        }
    }
}

/// Outcome of moving one item.
///
/// When the item lands in one of the auxiliary clusters, `retained` carries its parameter;
/// the caller owns committing it to the cluster table.
#[derive(Clone, Debug, PartialEq)]
pub struct Reassignment<P> {
    pub previous: usize,
    pub cluster: usize,
    pub retained: Option<P>,
    /// Every candidate had zero weight and the cluster was picked uniformly.
    pub degenerate: bool,
}

/// Tallies over one sweep of [`AuxiliaryGibbs::sweep`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub moves: usize,
    pub births: usize,
    pub degenerate: usize,
}

impl<L: LikelihoodModel> AuxiliaryGibbs<L> {
    pub const DEFAULT_N_AUXILIARY: usize = 3;

    /// # Errors
    /// [`Error::InvalidConfig`] unless `alpha` is positive and finite and `n_auxiliary > 0`.
    pub fn new(likelihood: Arc<L>, alpha: f64, n_auxiliary: usize) -> Result<Self> {
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(Error::InvalidConfig {
                field: "alpha",
                message: format!("concentration must be positive and finite, got {alpha}"),
            });
        }
        if n_auxiliary == 0 {
            return Err(Error::InvalidConfig {
                field: "n_auxiliary",
                message: String::from("need at least one auxiliary cluster"),
            });
        }
        Ok(Self {
            likelihood,
            alpha,
            n_auxiliary,
        })
    }

    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub const fn n_auxiliary(&self) -> usize {
        self.n_auxiliary
    }

    /// Resample the cluster of item `index`.
    ///
    /// The item leaves its cluster first, so it never weighs in on its own old cluster's
    /// occupancy. If it was alone there, the vacated slot and its parameter become the first
    /// auxiliary candidate; the remaining auxiliaries get fresh prior draws. Existing clusters
    /// are weighted by `occupancy * density`, auxiliaries by `alpha / M * density`.
    ///
    /// # Errors
    /// * [`Error::CapacityExceeded`] if fewer than `M` empty slots are left. The state is
    ///   restored before returning.
    /// * [`Error::MissingParameter`] if an occupied cluster has no parameter.
    pub fn reassign<R: Rng>(
        &self,
        index: usize,
        state: &mut MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<Reassignment<L::Parameter>> {
        let m = self.n_auxiliary;
        let x = &data[index];

        let previous = state.partition.remove(index);
        let vacated = state.partition.occupancy(previous) == 0;

        let mut slots = Vec::with_capacity(m);
        if vacated {
            slots.push(previous);
        }
        let needed = m - slots.len();
        slots.extend(
            state
                .partition
                .empty_slots(m)
                .into_iter()
                .filter(|&j| j != previous)
                .take(needed),
        );
        if slots.len() < m {
            state.partition.insert(index, previous);
            return Err(Error::CapacityExceeded {
                capacity: state.partition.capacity(),
            });
        }

        let mut auxiliary = Vec::with_capacity(m);
        if vacated {
            let parameter = state
                .table
                .take(previous)
                .ok_or(Error::MissingParameter { cluster: previous })?;
            auxiliary.push(parameter);
        }
        while auxiliary.len() < m {
            auxiliary.push(self.likelihood.sample_prior(rng));
        }

        let existing: Vec<usize> = state.partition.occupied_clusters().collect();

        #[allow(clippy::cast_precision_loss)]
        let ln_pseudo_count = (self.alpha / m as f64).ln();
        let mut ln_weights = Vec::with_capacity(existing.len() + m);
        for &cluster in &existing {
            let parameter = state
                .table
                .get(cluster)
                .ok_or(Error::MissingParameter { cluster })?;
            #[allow(clippy::cast_precision_loss)]
            let ln_count = (state.partition.occupancy(cluster) as f64).ln();
            ln_weights.push(ln_count + self.likelihood.ln_density(x, parameter));
        }
        ln_weights.extend(
            auxiliary
                .iter()
                .map(|parameter| ln_pseudo_count + self.likelihood.ln_density(x, parameter)),
        );

        let (choice, degenerate) = ln_pflip_or_uniform(&ln_weights, rng);
        if degenerate {
            trace!(
                "item {index}: all {} candidates have zero weight, drawing uniformly",
                ln_weights.len()
            );
        }

        let (cluster, retained) = match choice.checked_sub(existing.len()) {
            None => (existing[choice], None),
            Some(k) => (slots[k], auxiliary.into_iter().nth(k)),
        };
        state.partition.insert(index, cluster);

        Ok(Reassignment {
            previous,
            cluster,
            retained,
            degenerate,
        })
    }

    /// Reassign every item once, in index order, committing retained auxiliary parameters.
    ///
    /// `on_item` sees the state after each item has been placed.
    ///
    /// # Errors
    /// [`Error::DataLength`] if `data` does not match the partition; otherwise the first error
    /// from [`AuxiliaryGibbs::reassign`].
    pub fn sweep<R, F>(
        &self,
        state: &mut MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
        mut on_item: F,
    ) -> Result<SweepStats>
    where
        R: Rng,
        F: FnMut(usize, &MixtureState<L::Parameter>),
    {
        if state.partition.n_items() != data.len() {
            return Err(Error::DataLength {
                expected: state.partition.n_items(),
                found: data.len(),
            });
        }

        let mut stats = SweepStats::default();
        for index in 0..data.len() {
            let outcome = self.reassign(index, state, data, rng)?;
            if outcome.cluster != outcome.previous {
                stats.moves += 1;
            }
            if outcome.degenerate {
                stats.degenerate += 1;
            }
            if let Some(parameter) = outcome.retained {
                stats.births += 1;
                state.table.insert(outcome.cluster, parameter);
            }
            on_item(index, state);
        }

        Ok(stats)
    }
}

impl<L> Sampler<MixtureState<L::Parameter>, [L::Observation]> for AuxiliaryGibbs<L>
where
    L: LikelihoodModel,
{
    fn step<R: Rng>(
        &mut self,
        mut model: MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<MixtureState<L::Parameter>> {
        self.sweep(&mut model, data, rng, |_, _| ())?;
        Ok(model)
    }
}
