//! Dirichlet process mixtures with non-conjugate cluster likelihoods.
//!
//! Cluster assignments are resampled with auxiliary-variable Gibbs moves (Neal's algorithm 8)
//! and cluster parameters with a random-walk Metropolis refresh. Families plug in through
//! [`models::LikelihoodModel`].
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod dpmm;
pub mod error;
pub mod mcmc;
pub mod models;
pub mod rvs;

mod utils;

pub use config::SamplerConfig;
pub use dpmm::{Dpmm, Run, Trace};
pub use error::{Error, Result};
pub use mcmc::samplers::continuous::refresh::AcceptanceRule;
