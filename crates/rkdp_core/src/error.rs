use thiserror::Error;

/// Invalid integration requests, rejected before any stepping begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial state must have positive dimension")]
    EmptyState,
    #[error("system dimension {system} does not match initial state length {state}")]
    DimensionMismatch { system: usize, state: usize },
    #[error("at least 2 sample points are required (got {0})")]
    TooFewPoints(usize),
    #[error("error tolerance must be positive and finite (got {0})")]
    InvalidTolerance(f64),
    #[error("integration interval [{t0}, {t1}] must be finite with t1 > t0")]
    InvalidInterval { t0: f64, t1: f64 },
    #[error("max_iterations must be greater than zero")]
    ZeroIterationCap,
    #[error("initial step size must be positive and finite (got {0})")]
    InvalidInitialStep(f64),
    #[error("controller constant `{name}` is out of range (got {value})")]
    InvalidControllerConstant { name: &'static str, value: f64 },
    #[error("expected {expected} coefficients, got {got}")]
    CoefficientCount { expected: usize, got: usize },
}
