use serde::{Deserialize, Serialize};

/// Parameters of the live clusters, addressed by the same slot index as the [`Partition`].
///
/// [`Partition`]: crate::data::Partition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterTable<P> {
    slots: Vec<Option<P>>,
}

impl<P> Default for ClusterTable<P> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<P> ClusterTable<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameter of `cluster`, if it is live.
    #[must_use]
    pub fn get(&self, cluster: usize) -> Option<&P> {
        self.slots.get(cluster).and_then(Option::as_ref)
    }

    /// Store `parameter` for `cluster`, returning the value it replaces.
    pub fn insert(&mut self, cluster: usize, parameter: P) -> Option<P> {
        if cluster >= self.slots.len() {
            self.slots.resize_with(cluster + 1, || None);
        }
        self.slots[cluster].replace(parameter)
    }

    /// Drop the parameter of `cluster` and hand it back.
    pub fn take(&mut self, cluster: usize) -> Option<P> {
        self.slots.get_mut(cluster).and_then(Option::take)
    }

    #[must_use]
    pub fn contains(&self, cluster: usize) -> bool {
        self.get(cluster).is_some()
    }

    /// Live `(cluster, parameter)` pairs in ascending cluster order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &P)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(j, p)| p.as_ref().map(|p| (j, p)))
    }

    /// Number of live parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|p| p.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
