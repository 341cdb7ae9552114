use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Assignment of data items to cluster slots.
///
/// Slots live in a bounded arena; a slot with zero occupancy is absent and is kept on a
/// free list so it can host auxiliary proposals. Labels are slot indices and stay stable for
/// the life of a chain.
///
/// Only the labels and the arena size are serialized; occupancy and the free list are rebuilt
/// and checked when a snapshot is loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PartitionSnapshot", into = "PartitionSnapshot")]
pub struct Partition {
    assignments: Vec<usize>,
    occupancy: Vec<usize>,
    free: BTreeSet<usize>,
    capacity: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartitionSnapshot {
    assignments: Vec<usize>,
    n_slots: usize,
    capacity: usize,
}

impl From<Partition> for PartitionSnapshot {
    fn from(partition: Partition) -> Self {
        Self {
            n_slots: partition.occupancy.len(),
            assignments: partition.assignments,
            capacity: partition.capacity,
        }
    }
}

impl TryFrom<PartitionSnapshot> for Partition {
    type Error = Error;

    fn try_from(snapshot: PartitionSnapshot) -> Result<Self> {
        Self::with_slots(snapshot.assignments, snapshot.n_slots, snapshot.capacity)
    }
}

impl Partition {
    /// Create a partition from an explicit assignment vector.
    ///
    /// # Arguments
    /// * `assignments` - Slot index for each item.
    /// * `capacity` - Maximum number of cluster slots.
    ///
    /// # Errors
    /// Returns [`Error::CapacityExceeded`] if any label is outside the slot budget.
    pub fn from_assignments(assignments: Vec<usize>, capacity: usize) -> Result<Self> {
        let n_slots = assignments.iter().max().map_or(0, |max| max + 1);
        Self::with_slots(assignments, n_slots, capacity)
    }

    /// Create a partition over an arena of `n_slots` slots, some of which may be empty.
    ///
    /// # Errors
    /// [`Error::CapacityExceeded`] if `n_slots` is over `capacity`, and
    /// [`Error::LabelOutOfRange`] for a label outside the arena.
    pub fn with_slots(assignments: Vec<usize>, n_slots: usize, capacity: usize) -> Result<Self> {
        if n_slots > capacity {
            return Err(Error::CapacityExceeded { capacity });
        }
        let outside = assignments.iter().enumerate().find(|&(_, &j)| j >= n_slots);
        if let Some((index, &label)) = outside {
            return Err(Error::LabelOutOfRange {
                index,
                label,
                n_slots,
            });
        }

        let mut occupancy = vec![0; n_slots];
        assignments.iter().for_each(|&j| occupancy[j] += 1);

        let free = occupancy
            .iter()
            .enumerate()
            .filter_map(|(j, &count)| (count == 0).then_some(j))
            .collect();

        Ok(Self {
            assignments,
            occupancy,
            free,
            capacity,
        })
    }

    /// Assign `n` items uniformly at random among the first `n_clusters` slots.
    ///
    /// # Errors
    /// Returns [`Error::CapacityExceeded`] if `n_clusters` exceeds `capacity`.
    pub fn random<R: Rng>(
        n: usize,
        n_clusters: usize,
        capacity: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if n_clusters > capacity {
            return Err(Error::CapacityExceeded { capacity });
        }
        let assignments = (0..n).map(|_| rng.random_range(0..n_clusters)).collect();
        Self::from_assignments(assignments, capacity)
    }

    /// Take item `index` out of its cluster.
    ///
    /// The recorded assignment is left in place until the item is inserted again; only the
    /// occupancy changes. Returns the cluster the item came from.
    pub fn remove(&mut self, index: usize) -> usize {
        let cluster = self.assignments[index];
        debug_assert!(self.occupancy[cluster] > 0);
        self.occupancy[cluster] -= 1;
        if self.occupancy[cluster] == 0 {
            self.free.insert(cluster);
        }
        cluster
    }

    /// Put item `index` into `cluster`.
    pub fn insert(&mut self, index: usize, cluster: usize) {
        if cluster >= self.occupancy.len() {
            self.grow_to(cluster + 1);
        }
        self.assignments[index] = cluster;
        self.occupancy[cluster] += 1;
        self.free.remove(&cluster);
    }

    /// Slots with at least one occupant, in ascending order.
    pub fn occupied_clusters(&self) -> impl Iterator<Item = usize> + '_ {
        self.occupancy
            .iter()
            .enumerate()
            .filter_map(|(j, &count)| (count > 0).then_some(j))
    }

    /// Up to `count` empty slots, lowest index first.
    ///
    /// The arena grows as needed but never past the capacity, so fewer than `count` slots are
    /// returned only when the budget is exhausted. Occupied slots are never returned.
    pub fn empty_slots(&mut self, count: usize) -> Vec<usize> {
        while self.free.len() < count && self.occupancy.len() < self.capacity {
            let next = self.occupancy.len();
            self.grow_to(next + 1);
        }
        self.free.iter().take(count).copied().collect()
    }

    /// Items grouped by the cluster that holds them.
    #[must_use]
    pub fn members(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, &cluster) in self.assignments.iter().enumerate() {
            members.entry(cluster).or_default().push(index);
        }
        members
    }

    #[must_use]
    pub fn occupancy(&self, cluster: usize) -> usize {
        self.occupancy.get(cluster).copied().unwrap_or(0)
    }

    /// Cluster label of each item.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.assignments
    }

    #[must_use]
    pub fn assignment(&self, index: usize) -> Option<usize> {
        self.assignments.get(index).copied()
    }

    #[must_use]
    pub fn n_items(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn n_occupied(&self) -> usize {
        self.occupancy.len() - self.free.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy counts of every allocated slot, including empty ones.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.occupancy
    }

    fn grow_to(&mut self, n_slots: usize) {
        let start = self.occupancy.len();
        self.occupancy.resize(n_slots, 0);
        self.free.extend(start..n_slots);
    }
}
