use std::fmt::Debug;

use log::info;

use crate::error::{Error, Result};
use crate::models::MixtureState;
use crate::utils::NoPrettyPrint;

/// Which observer callbacks the driver makes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Silent,
    /// After every item reassignment.
    PerItem,
    /// After every outer iteration.
    PerSweep,
}

impl TryFrom<u8> for Verbosity {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Self::Silent),
            1 => Ok(Self::PerItem),
            2 => Ok(Self::PerSweep),
            _ => Err(Error::InvalidConfig {
                field: "verbosity",
                message: format!("expected 0, 1 or 2, got {level}"),
            }),
        }
    }
}

/// Read-only look at the chain handed to a [`Diagnostics`] observer.
#[derive(Debug)]
pub struct DiagnosticsView<'a, X, P> {
    pub observations: &'a [X],
    pub state: &'a MixtureState<P>,
    /// One-based outer iteration.
    pub iteration: usize,
    /// The item just reassigned, for per-item callbacks.
    pub item: Option<usize>,
}

impl<X, P> DiagnosticsView<'_, X, P> {
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        self.state.partition.labels()
    }
}

/// Observer of a running chain. It cannot change the state.
pub trait Diagnostics<X, P> {
    fn on_item(&mut self, _view: &DiagnosticsView<'_, X, P>) {}

    fn on_sweep(&mut self, _view: &DiagnosticsView<'_, X, P>) {}
}

/// Writes cluster counts (and, per sweep, parameters) to the `log` facade at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl<X, P: Debug> Diagnostics<X, P> for LogDiagnostics {
    fn on_item(&mut self, view: &DiagnosticsView<'_, X, P>) {
        if let Some(item) = view.item {
            info!(
                "iteration {} item {item} -> cluster {}: counts {:?}",
                view.iteration,
                view.labels()[item],
                NoPrettyPrint::new(view.state.partition.counts()),
            );
        }
    }

    fn on_sweep(&mut self, view: &DiagnosticsView<'_, X, P>) {
        info!(
            "iteration {}: {} clusters, counts {:?}",
            view.iteration,
            view.state.partition.n_occupied(),
            NoPrettyPrint::new(view.state.partition.counts()),
        );
        for (cluster, parameter) in view.state.table.iter() {
            info!("  cluster {cluster}: {:?}", NoPrettyPrint::new(parameter));
        }
    }
}
