use thiserror::Error;

/// Errors raised while configuring or running the mixture sampler.
///
/// Degenerate weights and zero-likelihood parameters are not errors; the samplers absorb them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown likelihood family `{0}` (expected one of: niw, nig, segment, schedule)")]
    InvalidFamily(String),

    #[error("cluster slot budget of {capacity} exhausted")]
    CapacityExceeded { capacity: usize },

    #[error("item {index} is labelled {label} but only {n_slots} slots exist")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        n_slots: usize,
    },

    #[error("item {index} is not in a partition of {n_items} items")]
    ItemOutOfRange { index: usize, n_items: usize },

    #[error("invalid configuration for {field}: {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("observation {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("state tracks {expected} items but {found} observations were given")]
    DataLength { expected: usize, found: usize },

    #[error("occupied cluster {cluster} has no parameter")]
    MissingParameter { cluster: usize },

    #[error("empty cluster {cluster} still holds a parameter")]
    StaleParameter { cluster: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
