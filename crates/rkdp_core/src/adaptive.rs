//! Adaptive Dormand-Prince 5(4) integration.
//!
//! [`Dp45Run`] owns the state of one run and advances it one attempt at a
//! time, which lets callers interleave their own checks (cancellation,
//! progress reporting) between steps. [`integrate_dp45`] drives a run to the
//! end of the interval or to the iteration cap.

use crate::controller::{error_estimate, AdaptiveSettings, StepController, StepDecision};
use crate::error::ConfigError;
use crate::problem::Problem;
use crate::tableau::{ButcherTableau, STAGES};
use crate::trace::{CompletionStatus, Diagnostic, DiagnosticKind, IntegrationOutcome, RunStats, Trace};
use crate::traits::{lit, DynamicalSystem, Evaluation, Scalar};

/// Divisor of the interval length giving the default first trial step.
const INITIAL_DT_DIVISOR: f64 = 1e6;

/// Result of a single call to [`Dp45Run::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepEvent<T> {
    Accepted {
        t: T,
        dt: T,
        err_ratio: T,
        next_dt: T,
    },
    Rejected {
        t: T,
        dt: T,
        err_ratio: T,
        next_dt: T,
    },
    /// The trial step ran past the interval end and was shortened.
    Clamped { t: T, dt: T, next_dt: T },
    /// Nothing left to do; carries the final status.
    Finished(CompletionStatus),
}

/// State of one adaptive run. `S` may be an owned system or a reference to one.
pub struct Dp45Run<'a, T: Scalar, S: DynamicalSystem<T>> {
    system: S,
    tableau: &'a ButcherTableau<T>,
    controller: StepController<T>,
    t: T,
    t_end: T,
    state: Vec<T>,
    stage_state: Vec<T>,
    deriv: Vec<T>,
    k: [Vec<T>; STAGES],
    trace: Trace<T>,
    diagnostics: Vec<Diagnostic>,
    stats: RunStats,
    max_iterations: usize,
    status: Option<CompletionStatus>,
}

impl<'a, T: Scalar, S: DynamicalSystem<T>> Dp45Run<'a, T, S> {
    /// Validates the request and records the initial condition.
    pub fn new(
        system: S,
        problem: &Problem<T>,
        tableau: &'a ButcherTableau<T>,
        settings: AdaptiveSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        problem.validate(&system)?;

        let dim = problem.dimension();
        // Settings are checked as f64; they must also survive the conversion to T.
        let err_tol: T = lit(settings.err_tol);
        if !(err_tol > T::zero() && err_tol.is_finite()) {
            return Err(ConfigError::InvalidTolerance(settings.err_tol));
        }
        let initial_dt = match settings.initial_dt {
            Some(dt) => lit(dt),
            None => problem.span() / lit(INITIAL_DT_DIVISOR),
        };
        if !(initial_dt > T::zero() && initial_dt.is_finite()) {
            return Err(ConfigError::InvalidInitialStep(
                initial_dt.to_f64().unwrap_or(f64::NAN),
            ));
        }

        let mut trace = Trace::new(dim);
        trace.push(problem.t0, &problem.initial_state);

        Ok(Self {
            system,
            tableau,
            controller: StepController::new(&settings, initial_dt),
            t: problem.t0,
            t_end: problem.t1,
            state: problem.initial_state.clone(),
            stage_state: vec![T::zero(); dim],
            deriv: vec![T::zero(); dim],
            k: std::array::from_fn(|_| vec![T::zero(); dim]),
            trace,
            diagnostics: Vec::new(),
            stats: RunStats::default(),
            max_iterations: settings.max_iterations,
            status: None,
        })
    }

    pub fn t(&self) -> T {
        self.t
    }

    pub fn t_end(&self) -> T {
        self.t_end
    }

    pub fn state(&self) -> &[T] {
        &self.state
    }

    /// Step size of the next attempt.
    pub fn dt(&self) -> T {
        self.controller.dt()
    }

    pub fn trace(&self) -> &Trace<T> {
        &self.trace
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn status(&self) -> Option<CompletionStatus> {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }

    /// Performs one loop iteration: evaluate the stages, estimate the error,
    /// and accept, reject or clamp the step.
    pub fn advance(&mut self) -> StepEvent<T> {
        if let Some(status) = self.status {
            return StepEvent::Finished(status);
        }
        if self.t >= self.t_end {
            return self.finish(CompletionStatus::Complete);
        }
        if self.stats.attempts >= self.max_iterations {
            self.diagnostics.push(Diagnostic {
                step: self.stats.attempts,
                t: self.t.to_f64().unwrap_or(f64::NAN),
                kind: DiagnosticKind::IterationCapExceeded {
                    max_iterations: self.max_iterations,
                    t_reached: self.t.to_f64().unwrap_or(f64::NAN),
                },
            });
            return self.finish(CompletionStatus::IterationCapExceeded);
        }

        let attempt = self.stats.attempts;
        self.stats.attempts += 1;

        let t = self.t;
        let dt = self.controller.dt();
        if let Evaluation::Degraded(degradation) = self.evaluate_stages(t, dt) {
            self.diagnostics.push(Diagnostic {
                step: attempt,
                t: t.to_f64().unwrap_or(f64::NAN),
                kind: DiagnosticKind::DegradedNumerics { degradation },
            });
        }

        let err_ratio = self.controller.ratio(error_estimate(self.tableau, &self.k));

        match self.controller.decide(err_ratio, t, self.t_end) {
            StepDecision::Accept {
                dt,
                next_dt,
                lands_on_end,
            } => {
                for i in 0..self.state.len() {
                    let mut increment = T::zero();
                    for j in 0..STAGES {
                        increment = increment + self.tableau.b_high[j] * self.k[j][i];
                    }
                    self.state[i] = self.state[i] + increment;
                }
                self.t = if lands_on_end { self.t_end } else { t + dt };
                self.trace.push(self.t, &self.state);

                self.stats.accepted += 1;
                if let Some(dt) = dt.to_f64() {
                    self.stats.record_accepted_dt(dt);
                }
                StepEvent::Accepted {
                    t: self.t,
                    dt,
                    err_ratio,
                    next_dt,
                }
            }
            StepDecision::Reject { next_dt } => {
                self.stats.rejected += 1;
                StepEvent::Rejected {
                    t,
                    dt,
                    err_ratio,
                    next_dt,
                }
            }
            StepDecision::Clamp { next_dt } => {
                self.stats.clamped += 1;
                StepEvent::Clamped { t, dt, next_dt }
            }
        }
    }

    /// Advances until the run finishes or `max_attempts` more attempts have
    /// been made. Returns the status once finished.
    pub fn advance_by(&mut self, max_attempts: usize) -> Option<CompletionStatus> {
        for _ in 0..max_attempts {
            if let StepEvent::Finished(status) = self.advance() {
                return Some(status);
            }
        }
        self.status
    }

    /// Drives the run to completion and returns everything it produced.
    pub fn run(mut self) -> IntegrationOutcome<T> {
        let status = loop {
            if let StepEvent::Finished(status) = self.advance() {
                break status;
            }
        };
        IntegrationOutcome {
            trace: self.trace,
            status,
            diagnostics: self.diagnostics,
            stats: self.stats,
        }
    }

    /// Consumes a finished run. Returns `None` while the run can still
    /// advance, so a run stopped by its caller is never mistaken for one that
    /// hit the iteration cap.
    pub fn into_outcome(self) -> Option<IntegrationOutcome<T>> {
        Some(IntegrationOutcome {
            status: self.status?,
            trace: self.trace,
            diagnostics: self.diagnostics,
            stats: self.stats,
        })
    }

    fn finish(&mut self, status: CompletionStatus) -> StepEvent<T> {
        self.status = Some(status);
        StepEvent::Finished(status)
    }

    /// Fills `k[s] = dt·f(t + c[s]·dt, x + Σ_{j<s} a[s][j]·k[j])`.
    fn evaluate_stages(&mut self, t: T, dt: T) -> Evaluation {
        let mut health = Evaluation::Nominal;
        for s in 0..STAGES {
            for i in 0..self.state.len() {
                let mut acc = self.state[i];
                for j in 0..s {
                    acc = acc + self.tableau.a[s][j] * self.k[j][i];
                }
                self.stage_state[i] = acc;
            }
            health = health.merge(self.system.apply(
                t + self.tableau.c[s] * dt,
                &self.stage_state,
                &mut self.deriv,
            ));
            for i in 0..self.state.len() {
                self.k[s][i] = self.deriv[i] * dt;
            }
        }
        self.stats.rhs_evaluations += STAGES;
        health
    }
}

/// Integrates `problem` with the adaptive Dormand-Prince pair.
///
/// Hitting `settings.max_iterations` is not an error: the partial trace is
/// returned with [`CompletionStatus::IterationCapExceeded`].
pub fn integrate_dp45<T: Scalar, S: DynamicalSystem<T>>(
    system: &S,
    problem: &Problem<T>,
    tableau: &ButcherTableau<T>,
    settings: AdaptiveSettings,
) -> Result<IntegrationOutcome<T>, ConfigError> {
    Dp45Run::new(system, problem, tableau, settings).map(Dp45Run::run)
}
