//! Model selection and one-shot integrations.

use anyhow::{bail, Context, Result};
use rkdp_core::output::write_csv;
use rkdp_core::systems::{DoublePendulum, HarmonicOscillator, OscillatorPair, PendulumCoefficients};
use rkdp_core::tableau::dormand_prince_f64;
use rkdp_core::traits::{Degradation, DynamicalSystem, Evaluation};
use rkdp_core::{
    integrate_dp45, integrate_rk4, AdaptiveSettings, IntegrationOutcome, Problem, Rk4Settings,
    Trace,
};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// The models the bridge knows how to build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Model {
    Harmonic(HarmonicOscillator<f64>),
    Pair(OscillatorPair<f64>),
    Pendulum(DoublePendulum),
}

impl Model {
    /// Total energy of `state`. For the damped pair this is the sum of the
    /// two undamped oscillator energies.
    pub(crate) fn energy(&self, state: &[f64]) -> f64 {
        match self {
            Model::Harmonic(m) => m.energy(state),
            Model::Pair(m) => {
                let fast = 2.0 * m.omega;
                0.5 * (state[2] * state[2] + m.omega * m.omega * state[0] * state[0])
                    + 0.5 * (state[3] * state[3] + fast * fast * state[1] * state[1])
            }
            Model::Pendulum(m) => m.energy(state).total,
        }
    }

    /// Column header used when a trace of this model is written as CSV.
    pub(crate) fn csv_header(&self) -> &'static str {
        match self {
            Model::Harmonic(_) => "T [time], X [pos], V [vel]",
            Model::Pair(_) | Model::Pendulum(_) => {
                "T [time], Theta [rad], Phi [rad], Om_Theta [rad/s], Om_Phi [rad/s]"
            }
        }
    }
}

impl DynamicalSystem<f64> for Model {
    fn dimension(&self) -> usize {
        match self {
            Model::Harmonic(m) => m.dimension(),
            Model::Pair(m) => m.dimension(),
            Model::Pendulum(m) => m.dimension(),
        }
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) -> Evaluation {
        match self {
            Model::Harmonic(m) => m.apply(t, x, out),
            Model::Pair(m) => m.apply(t, x, out),
            Model::Pendulum(m) => m.apply(t, x, out),
        }
    }
}

/// Builds a model from its name and parameter vector.
///
/// - `"harmonic"`: `[]` (ω = 1) or `[omega]`
/// - `"oscillator_pair"`: `[]` (ω = 1, β = 0) or `[omega, beta]`
/// - `"pendulum"`: `[]` (all coefficients 1) or
///   `[a_theta, a_phi, a_mix, b_theta, b_phi]`
pub(crate) fn build_model(name: &str, params: &[f64]) -> Result<Model> {
    let model = match (name, params) {
        ("harmonic", []) => Model::Harmonic(HarmonicOscillator::default()),
        ("harmonic", [omega]) => Model::Harmonic(HarmonicOscillator::new(*omega)),
        ("harmonic", _) => bail!(
            "Harmonic oscillator takes at most one parameter (omega), got {}.",
            params.len()
        ),
        ("oscillator_pair", []) => Model::Pair(OscillatorPair {
            omega: 1.0,
            beta: 0.0,
        }),
        ("oscillator_pair", [omega, beta]) => Model::Pair(OscillatorPair {
            omega: *omega,
            beta: *beta,
        }),
        ("oscillator_pair", _) => bail!(
            "Oscillator pair takes two parameters (omega, beta), got {}.",
            params.len()
        ),
        ("pendulum", []) => Model::Pendulum(DoublePendulum::default()),
        ("pendulum", _) => {
            let coefficients = PendulumCoefficients::try_from(params)
                .context("Invalid double pendulum coefficients")?;
            Model::Pendulum(DoublePendulum::new(coefficients))
        }
        _ => bail!("Unknown model \"{}\"; expected harmonic, oscillator_pair or pendulum.", name),
    };
    Ok(model)
}

pub(crate) fn run_rk4(
    model: &Model,
    initial_state: Vec<f64>,
    t0: f64,
    t1: f64,
    points: usize,
) -> Result<IntegrationOutcome<f64>> {
    let problem = Problem::new(initial_state, t0, t1);
    integrate_rk4(model, &problem, Rk4Settings { points }).context("RK4 integration rejected")
}

pub(crate) fn run_dp45(
    model: &Model,
    initial_state: Vec<f64>,
    t0: f64,
    t1: f64,
    settings: AdaptiveSettings,
) -> Result<IntegrationOutcome<f64>> {
    let problem = Problem::new(initial_state, t0, t1);
    integrate_dp45(model, &problem, dormand_prince_f64(), settings)
        .context("Dormand-Prince integration rejected")
}

/// Right-hand side values together with the health of the evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RhsEvaluation {
    pub(crate) derivative: Vec<f64>,
    pub(crate) degradation: Option<Degradation>,
}

pub(crate) fn evaluate_model(model: &Model, t: f64, state: &[f64]) -> Result<RhsEvaluation> {
    if state.len() != model.dimension() {
        bail!(
            "State dimension mismatch: model has {}, got {}.",
            model.dimension(),
            state.len()
        );
    }
    let mut derivative = vec![0.0; state.len()];
    let degradation = match model.apply(t, state, &mut derivative) {
        Evaluation::Nominal => None,
        Evaluation::Degraded(degradation) => Some(degradation),
    };
    Ok(RhsEvaluation {
        derivative,
        degradation,
    })
}

pub(crate) fn render_csv(header: &str, trace: &Trace<f64>) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, header, trace)?;
    String::from_utf8(buffer).context("CSV output is not valid UTF-8")
}

/// `undefined`/`null` select the defaults; any provided field overrides one.
pub(crate) fn parse_settings(settings: JsValue) -> Result<AdaptiveSettings, JsValue> {
    if settings.is_undefined() || settings.is_null() {
        return Ok(AdaptiveSettings::default());
    }
    from_value(settings).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}

pub(crate) fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

#[wasm_bindgen]
pub struct WasmSystem {
    pub(crate) model: Model,
}

#[wasm_bindgen]
impl WasmSystem {
    #[wasm_bindgen(constructor)]
    pub fn new(model: &str, params: Vec<f64>) -> Result<WasmSystem, JsValue> {
        console_error_panic_hook::set_once();

        let model = build_model(model, &params).map_err(to_js_error)?;
        Ok(WasmSystem { model })
    }

    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    pub fn csv_header(&self) -> String {
        self.model.csv_header().to_string()
    }

    /// Returns `{ derivative, degradation }`; `degradation` is `null` unless
    /// the model had to substitute a value.
    pub fn evaluate(&self, t: f64, state: &[f64]) -> Result<JsValue, JsValue> {
        let evaluation = evaluate_model(&self.model, t, state).map_err(to_js_error)?;
        to_value(&evaluation).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn energy(&self, state: &[f64]) -> Result<f64, JsValue> {
        if state.len() != self.model.dimension() {
            return Err(JsValue::from_str("State dimension mismatch."));
        }
        Ok(self.model.energy(state))
    }

    pub fn integrate_rk4(
        &self,
        initial_state: Vec<f64>,
        t0: f64,
        t1: f64,
        points: u32,
    ) -> Result<JsValue, JsValue> {
        let outcome =
            run_rk4(&self.model, initial_state, t0, t1, points as usize).map_err(to_js_error)?;
        to_value(&outcome).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn integrate_dp45(
        &self,
        initial_state: Vec<f64>,
        t0: f64,
        t1: f64,
        settings: JsValue,
    ) -> Result<JsValue, JsValue> {
        let settings = parse_settings(settings)?;
        let outcome = run_dp45(&self.model, initial_state, t0, t1, settings).map_err(to_js_error)?;
        to_value(&outcome).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

/// Renders a serialized outcome (as returned by the integrate calls) as CSV.
#[wasm_bindgen]
pub fn trace_to_csv(header: &str, outcome: JsValue) -> Result<String, JsValue> {
    let outcome: IntegrationOutcome<f64> = from_value(outcome)
        .map_err(|e| JsValue::from_str(&format!("Invalid outcome: {}", e)))?;
    render_csv(header, &outcome.trace).map_err(to_js_error)
}

/// `[a_theta, a_phi, a_mix, b_theta, b_phi]` for two uniform rods.
#[wasm_bindgen]
pub fn pendulum_coefficients(l1: f64, l2: f64, m1: f64, m2: f64, g: f64) -> Vec<f64> {
    PendulumCoefficients::from_physical(l1, l2, m1, m2, g)
        .to_array()
        .to_vec()
}

#[wasm_bindgen]
pub fn tableau_summary() -> String {
    dormand_prince_f64().to_string()
}
