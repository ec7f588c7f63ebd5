use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, LowerExp};

/// A trait for types that can be used as scalars in our dynamical systems.
/// Must support basic arithmetic, debug printing, scientific formatting and
/// conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + LowerExp + Send + Sync + 'static {}

impl<T: Float + FromPrimitive + Debug + LowerExp + Send + Sync + 'static> Scalar for T {}

/// Converts an `f64` literal into the scalar type.
///
/// Every `Float` type can represent an `f64` approximately, so the fallback to
/// NaN is only reachable for exotic scalar implementations.
pub fn lit<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Soft numerical failures an RHS evaluation can report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// The mass matrix determinant fell below the singularity threshold and
    /// was replaced by 1.0 for this evaluation.
    SingularMassMatrix { determinant: f64 },
}

/// Health of a single RHS evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Evaluation {
    #[default]
    Nominal,
    Degraded(Degradation),
}

impl Evaluation {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Evaluation::Degraded(_))
    }

    /// Keeps the first degradation seen across several evaluations.
    pub fn merge(self, other: Evaluation) -> Evaluation {
        match self {
            Evaluation::Nominal => other,
            degraded => degraded,
        }
    }
}

/// Represents a continuous-time dynamical system dx/dt = f(t, x).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt into (same length as `x`)
    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Evaluation;
}

impl<T: Scalar, S: DynamicalSystem<T> + ?Sized> DynamicalSystem<T> for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) -> Evaluation {
        (**self).apply(t, x, out)
    }
}

/// A trait for solvers that can step a system forward with a fixed dt.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    ///
    /// Returns the combined health of the stage evaluations.
    fn step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) -> Evaluation;
}
