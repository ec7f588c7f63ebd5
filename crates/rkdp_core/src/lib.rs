pub mod adaptive;
pub mod controller;
pub mod error;
pub mod output;
pub mod problem;
pub mod solvers;
pub mod systems;
pub mod tableau;
pub mod trace;
/// The `rkdp_core` crate integrates ordinary differential equations of
/// physical dynamical systems. It is generic over the scalar type (`f32` or
/// `f64`) wherever the physics allows.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (RHS plugins), `Steppable` (fixed-step solvers).
/// - **Tableau**: the Dormand-Prince 5(4) Butcher tableau, built once and shared read-only.
/// - **Solvers**: fixed-step RK4 (`solvers`) and adaptive Dormand-Prince with a PI step controller (`adaptive`, `controller`).
/// - **Systems**: harmonic oscillator, decoupled oscillator pair, Lagrangian double pendulum.
/// - **Trace / output**: sampled trajectories with diagnostics, and their CSV form.
pub mod traits;

pub use adaptive::{integrate_dp45, Dp45Run, StepEvent};
pub use controller::AdaptiveSettings;
pub use error::ConfigError;
pub use problem::Problem;
pub use solvers::{integrate_rk4, Rk4Settings};
pub use tableau::ButcherTableau;
pub use trace::{CompletionStatus, Diagnostic, DiagnosticKind, IntegrationOutcome, Trace};
