pub mod cluster_table;
pub mod partition;

pub use cluster_table::ClusterTable;
pub use partition::Partition;
