use std::collections::BTreeSet;
use std::fmt::Debug;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::LikelihoodModel;
use crate::data::{ClusterTable, Partition};
use crate::error::{Error, Result};
use crate::utils::NoPrettyPrint;

/// Full state of one chain: who sits where, and the parameter of every occupied cluster.
///
/// Snapshots of this type (via serde) are enough to resume a chain exactly.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureState<P> {
    pub partition: Partition,
    pub table: ClusterTable<P>,
}

impl<P: Debug> Debug for MixtureState<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixtureState")
            .field("assignments", &NoPrettyPrint::new(self.partition.labels()))
            .field("counts", &NoPrettyPrint::new(self.partition.counts()))
            .field("parameters", &NoPrettyPrint::new(self.table.iter().collect::<Vec<_>>()))
            .finish()
    }
}

impl<P> MixtureState<P> {
    /// Random initial state: items spread uniformly over the first `n_clusters` slots, and a
    /// prior draw for every slot that ends up occupied.
    ///
    /// # Errors
    /// Returns [`Error::CapacityExceeded`] if `n_clusters > capacity`.
    pub fn initialize<L, R>(
        likelihood: &L,
        n_items: usize,
        n_clusters: usize,
        capacity: usize,
        rng: &mut R,
    ) -> Result<Self>
    where
        L: LikelihoodModel<Parameter = P>,
        R: Rng,
    {
        let partition = Partition::random(n_items, n_clusters, capacity, rng)?;
        let mut table = ClusterTable::new();
        for cluster in partition.occupied_clusters() {
            table.insert(cluster, likelihood.sample_prior(rng));
        }
        Ok(Self { partition, table })
    }

    /// Parameter of the cluster holding `index`.
    ///
    /// # Errors
    /// [`Error::ItemOutOfRange`] for an unknown item, [`Error::MissingParameter`] if its
    /// cluster has no parameter.
    pub fn parameter_of(&self, index: usize) -> Result<&P> {
        let cluster = self
            .partition
            .assignment(index)
            .ok_or(Error::ItemOutOfRange {
                index,
                n_items: self.partition.n_items(),
            })?;
        self.table
            .get(cluster)
            .ok_or(Error::MissingParameter { cluster })
    }

    /// Check that every occupied cluster has a parameter and no empty one does.
    ///
    /// # Errors
    /// [`Error::MissingParameter`] or [`Error::StaleParameter`] naming the first offending slot.
    pub fn check_consistency(&self) -> Result<()> {
        let occupied: BTreeSet<usize> = self.partition.occupied_clusters().collect();
        let live: BTreeSet<usize> = self.table.iter().map(|(j, _)| j).collect();
        if let Some(&cluster) = occupied.difference(&live).next() {
            return Err(Error::MissingParameter { cluster });
        }
        if let Some(&cluster) = live.difference(&occupied).next() {
            return Err(Error::StaleParameter { cluster });
        }
        Ok(())
    }

    /// Joint log likelihood of `data` under the current assignment and parameters.
    pub fn ln_likelihood<L>(&self, likelihood: &L, data: &[L::Observation]) -> f64
    where
        L: LikelihoodModel<Parameter = P>,
    {
        data.iter()
            .enumerate()
            .map(|(index, x)| {
                self.parameter_of(index)
                    .map_or(f64::NEG_INFINITY, |p| likelihood.ln_density(x, p))
            })
            .sum()
    }
}
