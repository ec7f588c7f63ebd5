//! Batched adaptive integration for callers that cannot block.

use crate::system::{build_model, parse_settings, to_js_error, Model};
use anyhow::Result;
use js_sys::Float64Array;
use rkdp_core::tableau::dormand_prince_f64;
use rkdp_core::{AdaptiveSettings, CompletionStatus, Dp45Run, IntegrationOutcome, Problem};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// Progress payload for the stepped Dormand-Prince run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Dp45Progress {
    done: bool,
    status: Option<CompletionStatus>,
    t: f64,
    t_end: f64,
    dt: f64,
    attempts: usize,
    accepted: usize,
    rejected: usize,
    samples: usize,
}

type ModelRun = Dp45Run<'static, f64, Model>;

fn start_run(
    model: Model,
    initial_state: Vec<f64>,
    t0: f64,
    t1: f64,
    settings: AdaptiveSettings,
) -> Result<ModelRun> {
    let problem = Problem::new(initial_state, t0, t1);
    Ok(Dp45Run::new(model, &problem, dormand_prince_f64(), settings)?)
}

fn progress_of(run: &ModelRun) -> Dp45Progress {
    let stats = run.stats();
    Dp45Progress {
        done: run.is_finished(),
        status: run.status(),
        t: run.t(),
        t_end: run.t_end(),
        dt: run.dt(),
        attempts: stats.attempts,
        accepted: stats.accepted,
        rejected: stats.rejected,
        samples: run.trace().len(),
    }
}

fn snapshot(run: &ModelRun) -> Option<IntegrationOutcome<f64>> {
    Some(IntegrationOutcome {
        trace: run.trace().clone(),
        status: run.status()?,
        diagnostics: run.diagnostics().to_vec(),
        stats: *run.stats(),
    })
}

#[wasm_bindgen]
pub struct WasmDp45Runner {
    run: Option<ModelRun>,
}

#[wasm_bindgen]
impl WasmDp45Runner {
    #[wasm_bindgen(constructor)]
    pub fn new(
        model: &str,
        params: Vec<f64>,
        initial_state: Vec<f64>,
        t0: f64,
        t1: f64,
        settings: JsValue,
    ) -> Result<WasmDp45Runner, JsValue> {
        console_error_panic_hook::set_once();

        let model = build_model(model, &params).map_err(to_js_error)?;
        let settings = parse_settings(settings)?;
        let run = start_run(model, initial_state, t0, t1, settings).map_err(to_js_error)?;
        Ok(WasmDp45Runner { run: Some(run) })
    }

    pub fn is_done(&self) -> bool {
        self.run.as_ref().map_or(true, ModelRun::is_finished)
    }

    /// Makes up to `batch_size` step attempts and reports where the run is.
    pub fn run_steps(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        run.advance_by(batch_size as usize);

        to_value(&progress_of(run))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        to_value(&progress_of(run))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Accepted sample times so far.
    pub fn get_times(&self) -> Result<Float64Array, JsValue> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        Ok(Float64Array::from(run.trace().times()))
    }

    /// Accepted states so far, flattened row by row.
    pub fn get_states(&self) -> Result<Float64Array, JsValue> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;
        Ok(Float64Array::from(run.trace().states()))
    }

    pub fn get_result(&self) -> Result<JsValue, JsValue> {
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        let outcome = snapshot(run)
            .ok_or_else(|| JsValue::from_str("Adaptive run has not finished yet."))?;

        to_value(&outcome).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
