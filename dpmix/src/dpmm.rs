use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, debug, info, log_enabled, trace, warn};
use nalgebra::DMatrix;
use rand::Rng;

use crate::config::SamplerConfig;
use crate::diagnostics::{Diagnostics, DiagnosticsView, Verbosity};
use crate::error::{Error, Result};
use crate::mcmc::Sampler;
use crate::mcmc::samplers::continuous::refresh::{AcceptanceRule, ParameterRefresh};
use crate::mcmc::samplers::partition::auxiliary::AuxiliaryGibbs;
use crate::models::{LikelihoodModel, MixtureState};

/// Cluster labels recorded after burn-in, one row of `n` labels per iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    n_items: usize,
    iterations: Vec<usize>,
    labels: Vec<Vec<usize>>,
    complete: bool,
}

impl Trace {
    fn new(n_items: usize) -> Self {
        Self {
            n_items,
            ..Self::default()
        }
    }

    fn record(&mut self, iteration: usize, labels: &[usize]) {
        self.iterations.push(iteration);
        self.labels.push(labels.to_vec());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub const fn n_items(&self) -> usize {
        self.n_items
    }

    /// `false` if the run was cancelled before its last iteration.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Outer iteration each row was recorded at.
    #[must_use]
    pub fn iterations(&self) -> &[usize] {
        &self.iterations
    }

    #[must_use]
    pub fn labels(&self) -> &[Vec<usize>] {
        &self.labels
    }

    /// Labels of one item across the recorded iterations.
    #[must_use]
    pub fn item_labels(&self, item: usize) -> Vec<usize> {
        self.labels.iter().map(|row| row[item]).collect()
    }

    /// `n_items x len` matrix of labels; column `t` is the `t`-th recorded iteration.
    #[must_use]
    pub fn to_matrix(&self) -> DMatrix<usize> {
        DMatrix::from_fn(self.n_items, self.len(), |item, t| self.labels[t][item])
    }

    /// Number of occupied clusters at each recorded iteration.
    #[must_use]
    pub fn n_clusters(&self) -> Vec<usize> {
        self.labels
            .iter()
            .map(|row| {
                let mut seen: Vec<usize> = row.clone();
                seen.sort_unstable();
                seen.dedup();
                seen.len()
            })
            .collect()
    }

    /// Fraction of recorded iterations in which each pair of items shared a cluster.
    #[must_use]
    pub fn co_clustering(&self) -> DMatrix<f64> {
        let mut together = DMatrix::<f64>::zeros(self.n_items, self.n_items);
        for row in &self.labels {
            for p in 0..self.n_items {
                for q in 0..self.n_items {
                    if row[p] == row[q] {
                        together[(p, q)] += 1.0;
                    }
                }
            }
        }
        if !self.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let scale = (self.len() as f64).recip();
            together *= scale;
        }
        together
    }
}

/// Result of [`Dpmm::run_from`]: the trace and the chain's final state, from which a run can
/// be resumed.
#[derive(Clone, Debug)]
pub struct Run<P> {
    pub trace: Trace,
    pub state: MixtureState<P>,
}

/// Dirichlet process mixture driven by auxiliary-variable Gibbs reassignments and a
/// random-walk refresh of the cluster parameters.
///
/// One outer iteration ([`Sampler::step`]) reassigns every item in index order, then refreshes
/// all occupied clusters. [`Dpmm::run`] records labels once past the first `n_iter / 2`
/// iterations.
pub struct Dpmm<L: LikelihoodModel> {
    likelihood: Arc<L>,
    config: SamplerConfig,
    verbosity: Verbosity,
    reassignment: AuxiliaryGibbs<L>,
    refresh: ParameterRefresh<L>,
    cancel: Option<Arc<AtomicBool>>,
    diagnostics: Option<Box<dyn Diagnostics<L::Observation, L::Parameter>>>,
    iteration: usize,
}

impl<L: LikelihoodModel> std::fmt::Debug for Dpmm<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dpmm")
            .field("config", &self.config)
            .field("iteration", &self.iteration)
            .field("observed", &self.diagnostics.is_some())
            .finish_non_exhaustive()
    }
}

impl<L: LikelihoodModel> Dpmm<L> {
    /// # Errors
    /// [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(likelihood: L, config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        let likelihood = Arc::new(likelihood);
        Ok(Self {
            reassignment: AuxiliaryGibbs::new(
                Arc::clone(&likelihood),
                config.alpha,
                config.n_auxiliary,
            )?,
            refresh: ParameterRefresh::new(Arc::clone(&likelihood), config.n_refresh)
                .with_rule(config.acceptance),
            verbosity: config.verbosity()?,
            likelihood,
            config,
            cancel: None,
            diagnostics: None,
            iteration: 0,
        })
    }

    /// Stop between outer iterations once `flag` is set.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Observer called according to the configured verbosity.
    #[must_use]
    pub fn with_diagnostics<D>(mut self, diagnostics: D) -> Self
    where
        D: Diagnostics<L::Observation, L::Parameter> + 'static,
    {
        self.diagnostics = Some(Box::new(diagnostics));
        self
    }

    #[must_use]
    pub fn with_acceptance_rule(mut self, rule: AcceptanceRule) -> Self {
        self.config.acceptance = rule;
        self.refresh = self.refresh.with_rule(rule);
        self
    }

    #[must_use]
    pub fn likelihood(&self) -> &L {
        &self.likelihood
    }

    #[must_use]
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Outer iterations taken so far by this driver.
    #[must_use]
    pub const fn iteration(&self) -> usize {
        self.iteration
    }

    fn check_data(&self, data: &[L::Observation]) -> Result<()> {
        data.iter()
            .enumerate()
            .try_for_each(|(index, x)| self.likelihood.check_observation(index, x))
    }

    /// Items spread uniformly over the first `initial_clusters` slots, with a prior draw per
    /// occupied cluster.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] for observations the family cannot score.
    pub fn initial_state<R: Rng>(
        &self,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<MixtureState<L::Parameter>> {
        self.check_data(data)?;
        MixtureState::initialize(
            self.likelihood.as_ref(),
            data.len(),
            self.config.initial_clusters,
            self.config.max_clusters,
            rng,
        )
    }

    /// Run a fresh chain for `n_iter` iterations.
    ///
    /// # Errors
    /// As [`Dpmm::initial_state`] and [`Dpmm::run_from`].
    pub fn run<R: Rng>(&mut self, data: &[L::Observation], rng: &mut R) -> Result<Trace> {
        let state = self.initial_state(data, rng)?;
        Ok(self.run_from(state, data, rng)?.trace)
    }

    /// Run `n_iter` iterations starting from `state`, e.g. a deserialized snapshot.
    ///
    /// A cancelled run returns what it recorded so far with [`Trace::is_complete`] unset.
    ///
    /// # Errors
    /// * [`Error::DataLength`] or [`Error::DimensionMismatch`] if `data` does not fit.
    /// * [`Error::MissingParameter`] or [`Error::StaleParameter`] for an inconsistent state.
    /// * [`Error::CapacityExceeded`] if the slot budget runs out.
    pub fn run_from<R: Rng>(
        &mut self,
        mut state: MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<Run<L::Parameter>> {
        self.check_data(data)?;
        if state.partition.n_items() != data.len() {
            return Err(Error::DataLength {
                expected: state.partition.n_items(),
                found: data.len(),
            });
        }
        state.check_consistency()?;

        let n_iter = self.config.n_iter;
        let burn_in = self.config.burn_in();
        info!(
            "sampling {} items for {n_iter} iterations ({burn_in} burn-in), alpha = {}",
            data.len(),
            self.config.alpha
        );

        self.iteration = 0;
        let mut trace = Trace::new(data.len());
        for iteration in 1..=n_iter {
            if self.is_cancelled() {
                warn!("cancelled after {} of {n_iter} iterations", iteration - 1);
                return Ok(Run { trace, state });
            }
            state = self.step(state, data, rng)?;
            if iteration > burn_in {
                trace.record(iteration, state.partition.labels());
            }
        }
        trace.complete = true;

        info!(
            "finished with {} clusters",
            state.partition.n_occupied()
        );
        Ok(Run { trace, state })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl<L: LikelihoodModel> Sampler<MixtureState<L::Parameter>, [L::Observation]> for Dpmm<L> {
    fn step<R: Rng>(
        &mut self,
        mut model: MixtureState<L::Parameter>,
        data: &[L::Observation],
        rng: &mut R,
    ) -> Result<MixtureState<L::Parameter>> {
        self.iteration += 1;
        let iteration = self.iteration;

        let per_item = self.verbosity == Verbosity::PerItem;
        let diagnostics = &mut self.diagnostics;
        let sweep = self
            .reassignment
            .sweep(&mut model, data, rng, |item, state| {
                if !per_item {
                    return;
                }
                if let Some(observer) = diagnostics.as_mut() {
                    observer.on_item(&DiagnosticsView {
                        observations: data,
                        state,
                        iteration,
                        item: Some(item),
                    });
                }
            })?;
        let refresh = self.refresh.refresh(&mut model, data, rng)?;

        debug!(
            "iteration {iteration}: {} clusters, {} moves, {} births, {} degenerate draws, \
             refresh acceptance {:.3} ({} from zero likelihood)",
            model.partition.n_occupied(),
            sweep.moves,
            sweep.births,
            sweep.degenerate,
            refresh.acceptance_rate(),
            refresh.escaped_zero,
        );
        if log_enabled!(Level::Trace) {
            trace!(
                "iteration {iteration}: ln likelihood {}",
                model.ln_likelihood(self.likelihood.as_ref(), data)
            );
        }

        if self.verbosity == Verbosity::PerSweep {
            if let Some(observer) = self.diagnostics.as_mut() {
                observer.on_sweep(&DiagnosticsView {
                    observations: data,
                    state: &model,
                    iteration,
                    item: None,
                });
            }
        }

        Ok(model)
    }
}
