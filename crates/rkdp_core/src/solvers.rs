use crate::error::ConfigError;
use crate::problem::Problem;
use crate::trace::{CompletionStatus, Diagnostic, DiagnosticKind, IntegrationOutcome, RunStats, Trace};
use crate::traits::{lit, DynamicalSystem, Evaluation, Scalar, Steppable};
use serde::{Deserialize, Serialize};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) -> Evaluation {
        let start = *t;
        let half_dt = dt * lit::<T>(0.5);

        let mut health = system.apply(start, state, &mut self.k1);
        shifted(&mut self.tmp, state, &self.k1, half_dt);
        health = health.merge(system.apply(start + half_dt, &self.tmp, &mut self.k2));
        shifted(&mut self.tmp, state, &self.k2, half_dt);
        health = health.merge(system.apply(start + half_dt, &self.tmp, &mut self.k3));
        shifted(&mut self.tmp, state, &self.k3, dt);
        health = health.merge(system.apply(start + dt, &self.tmp, &mut self.k4));

        // Simpson weights 1/6, 2/6, 2/6, 1/6.
        let weight = dt / lit::<T>(6.0);
        let two = lit::<T>(2.0);
        for (i, x) in state.iter_mut().enumerate() {
            *x = *x + weight * (self.k1[i] + two * (self.k2[i] + self.k3[i]) + self.k4[i]);
        }

        *t = start + dt;
        health
    }
}

/// `out = x + h * slope`.
fn shifted<T: Scalar>(out: &mut [T], x: &[T], slope: &[T], h: T) {
    for ((o, &xi), &si) in out.iter_mut().zip(x).zip(slope) {
        *o = xi + h * si;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rk4Settings {
    /// Number of samples in the output, initial condition included.
    pub points: usize,
}

impl Default for Rk4Settings {
    fn default() -> Self {
        Self { points: 50 }
    }
}

/// Integrates `problem` with `settings.points - 1` equal RK4 steps.
///
/// The returned trace holds exactly `settings.points` samples.
pub fn integrate_rk4<T: Scalar>(
    system: &impl DynamicalSystem<T>,
    problem: &Problem<T>,
    settings: Rk4Settings,
) -> Result<IntegrationOutcome<T>, ConfigError> {
    if settings.points < 2 {
        return Err(ConfigError::TooFewPoints(settings.points));
    }
    problem.validate(system)?;

    let dim = problem.dimension();
    let steps = settings.points - 1;
    let dt = problem.span() / lit::<T>(steps as f64);

    let mut solver = RK4::new(dim);
    let mut state = problem.initial_state.clone();
    let mut t = problem.t0;
    let mut trace = Trace::with_capacity(dim, settings.points);
    let mut diagnostics = Vec::new();
    let mut stats = RunStats::default();
    trace.push(t, &state);

    for step in 0..steps {
        let t_start = t;
        if let Evaluation::Degraded(degradation) = solver.step(system, &mut t, &mut state, dt) {
            diagnostics.push(Diagnostic {
                step,
                t: t_start.to_f64().unwrap_or(f64::NAN),
                kind: DiagnosticKind::DegradedNumerics { degradation },
            });
        }
        // The last sample sits on t1 regardless of accumulated rounding.
        if step + 1 == steps {
            t = problem.t1;
        }
        trace.push(t, &state);
    }

    stats.attempts = steps;
    stats.accepted = steps;
    stats.rhs_evaluations = 4 * steps;
    if let Some(dt) = dt.to_f64() {
        stats.record_accepted_dt(dt);
    }

    Ok(IntegrationOutcome {
        trace,
        status: CompletionStatus::Complete,
        diagnostics,
        stats,
    })
}
