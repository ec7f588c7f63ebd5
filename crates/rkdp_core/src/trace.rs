//! Integration results: the sampled trajectory plus everything a caller needs
//! to judge how trustworthy it is.

use crate::traits::{Degradation, Scalar};
use serde::{Deserialize, Serialize};

/// Ordered `(time, state)` samples stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace<T> {
    dim: usize,
    times: Vec<T>,
    states: Vec<T>,
}

impl<T: Scalar> Trace<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            times: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn with_capacity(dim: usize, samples: usize) -> Self {
        Self {
            dim,
            times: Vec::with_capacity(samples),
            states: Vec::with_capacity(samples * dim),
        }
    }

    pub fn push(&mut self, t: T, state: &[T]) {
        debug_assert_eq!(state.len(), self.dim);
        self.times.push(t);
        self.states.extend_from_slice(state);
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[T] {
        &self.times
    }

    pub fn time(&self, index: usize) -> T {
        self.times[index]
    }

    /// Every state back to back, `dim` values per sample.
    pub fn states(&self) -> &[T] {
        &self.states
    }

    pub fn state(&self, index: usize) -> &[T] {
        &self.states[index * self.dim..(index + 1) * self.dim]
    }

    /// The last sample, if any.
    pub fn last(&self) -> Option<(T, &[T])> {
        let index = self.len().checked_sub(1)?;
        Some((self.times[index], self.state(index)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, &[T])> + '_ {
        self.times
            .iter()
            .copied()
            .zip(self.states.chunks_exact(self.dim.max(1)))
    }
}

/// How an integration run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    IterationCapExceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An RHS evaluation recovered from a numerical problem.
    DegradedNumerics { degradation: Degradation },
    /// The iteration cap was hit before the end of the interval.
    IterationCapExceeded { max_iterations: usize, t_reached: f64 },
}

/// A warning record attached to an integration outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Loop iteration (step attempt) the record belongs to.
    pub step: usize,
    /// Start time of that step.
    pub t: f64,
    pub kind: DiagnosticKind,
}

/// Counters collected while integrating.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub attempts: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub clamped: usize,
    pub rhs_evaluations: usize,
    pub min_dt: Option<f64>,
    pub max_dt: Option<f64>,
}

impl RunStats {
    pub(crate) fn record_accepted_dt(&mut self, dt: f64) {
        self.min_dt = Some(self.min_dt.map_or(dt, |v| v.min(dt)));
        self.max_dt = Some(self.max_dt.map_or(dt, |v| v.max(dt)));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationOutcome<T> {
    pub trace: Trace<T>,
    pub status: CompletionStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RunStats,
}

impl<T: Scalar> IntegrationOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.status == CompletionStatus::Complete
    }

    /// Whether any RHS evaluation had to fall back to a substitute value.
    pub fn is_degraded(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::DegradedNumerics { .. }))
    }
}
