//! JavaScript bridge for `rkdp_core`.
//!
//! Models are picked by name, integrations return serialized
//! `IntegrationOutcome` objects, and long adaptive runs can be advanced in
//! batches through [`WasmDp45Runner`] so the caller's event loop stays
//! responsive.

mod runner;
mod system;

pub use runner::WasmDp45Runner;
pub use system::{pendulum_coefficients, tableau_summary, trace_to_csv, WasmSystem};
