//! Embedded error estimation and PI step-size control.

use crate::error::ConfigError;
use crate::tableau::{ButcherTableau, STAGES};
use crate::traits::{lit, Scalar};
use serde::{Deserialize, Serialize};

/// Shrink factor applied when the error estimate is not a finite number.
const NON_FINITE_SHRINK: f64 = 0.1;

/// Tolerance, loop bound and controller constants of an adaptive run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    /// Maximum absolute local error allowed per step.
    pub err_tol: f64,
    pub max_iterations: usize,
    /// First trial step; `None` uses `(t1 - t0) / 1e6`.
    pub initial_dt: Option<f64>,
    pub safety: f64,
    /// Exponent of the current error ratio when growing the step.
    pub p_gain: f64,
    /// Exponent of the previous error ratio when growing the step.
    pub i_gain: f64,
    /// Exponent of the error ratio when shrinking a rejected step.
    pub p_loss: f64,
    /// Upper bound on `dt_new / dt` after an accepted step.
    pub max_growth: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            err_tol: 1e-10,
            max_iterations: 100_000,
            initial_dt: None,
            safety: 0.8,
            p_gain: -0.14,
            i_gain: -0.08,
            p_loss: -0.2,
            max_growth: 8.0,
        }
    }
}

impl AdaptiveSettings {
    pub fn with_tolerance(err_tol: f64) -> Self {
        Self {
            err_tol,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.err_tol > 0.0 && self.err_tol.is_finite()) {
            return Err(ConfigError::InvalidTolerance(self.err_tol));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterationCap);
        }
        if let Some(dt) = self.initial_dt {
            if !(dt > 0.0 && dt.is_finite()) {
                return Err(ConfigError::InvalidInitialStep(dt));
            }
        }
        let constants = [
            ("safety", self.safety, self.safety > 0.0 && self.safety <= 1.0),
            ("p_gain", self.p_gain, self.p_gain <= 0.0),
            ("i_gain", self.i_gain, self.i_gain <= 0.0),
            ("p_loss", self.p_loss, self.p_loss < 0.0),
            ("max_growth", self.max_growth, self.max_growth >= 1.0),
        ];
        for (name, value, ok) in constants {
            if !ok || !value.is_finite() {
                return Err(ConfigError::InvalidControllerConstant { name, value });
            }
        }
        Ok(())
    }
}

/// Largest component of the embedded error estimate `|Σ_j e[j]·k[j][i]|`.
///
/// `k[j]` holds stage `j` already multiplied by the step size.
pub fn error_estimate<T: Scalar>(tableau: &ButcherTableau<T>, k: &[Vec<T>; STAGES]) -> T {
    let dim = k[0].len();
    let mut worst = T::zero();
    for i in 0..dim {
        let mut sum = T::zero();
        for j in 0..STAGES {
            sum = sum + tableau.e[j] * k[j][i];
        }
        let err = sum.abs();
        // NaN must win so a blown-up stage is never accepted.
        if err.is_nan() || err > worst {
            worst = err;
        }
        if worst.is_nan() {
            break;
        }
    }
    worst
}

/// What the controller decided for the step just evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepDecision<T> {
    /// Advance by `dt`; the next attempt uses `next_dt`.
    Accept { dt: T, next_dt: T, lands_on_end: bool },
    /// Discard the step and retry with `next_dt`.
    Reject { next_dt: T },
    /// The step would have run past the interval end; retry with exactly the
    /// remaining span.
    Clamp { next_dt: T },
}

/// Per-run state of the PI controller.
#[derive(Debug, Clone)]
pub struct StepController<T: Scalar> {
    dt: T,
    err_ratio_old: T,
    rejected: bool,
    err_tol: T,
    safety: T,
    p_gain: T,
    i_gain: T,
    p_loss: T,
    max_growth: T,
}

impl<T: Scalar> StepController<T> {
    /// Builds a controller from already validated settings.
    pub fn new(settings: &AdaptiveSettings, initial_dt: T) -> Self {
        Self {
            dt: initial_dt,
            err_ratio_old: T::one(),
            rejected: false,
            err_tol: lit(settings.err_tol),
            safety: lit(settings.safety),
            p_gain: lit(settings.p_gain),
            i_gain: lit(settings.i_gain),
            p_loss: lit(settings.p_loss),
            max_growth: lit(settings.max_growth),
        }
    }

    pub fn dt(&self) -> T {
        self.dt
    }

    pub fn rejected(&self) -> bool {
        self.rejected
    }

    pub fn err_ratio_old(&self) -> T {
        self.err_ratio_old
    }

    /// Scales a raw error estimate by the tolerance.
    pub fn ratio(&self, error: T) -> T {
        error / self.err_tol
    }

    /// Decides on the step of size [`Self::dt`] taken from `t` towards `t_end`.
    pub fn decide(&mut self, err_ratio: T, t: T, t_end: T) -> StepDecision<T> {
        let dt = self.dt;
        let remaining = t_end - t;

        if dt - remaining >= self.err_tol {
            self.dt = remaining;
            return StepDecision::Clamp { next_dt: remaining };
        }

        if err_ratio < T::one() {
            let next_dt = if self.rejected {
                self.rejected = false;
                dt
            } else {
                dt * self.growth_factor(err_ratio)
            };
            self.err_ratio_old = err_ratio;
            self.dt = next_dt;
            StepDecision::Accept {
                dt,
                next_dt,
                lands_on_end: dt == remaining,
            }
        } else {
            let factor = if err_ratio.is_finite() {
                self.safety * err_ratio.powf(self.p_loss)
            } else {
                lit(NON_FINITE_SHRINK)
            };
            self.rejected = true;
            if err_ratio.is_finite() {
                self.err_ratio_old = err_ratio;
            }
            self.dt = dt * factor;
            StepDecision::Reject { next_dt: self.dt }
        }
    }

    fn growth_factor(&self, err_ratio: T) -> T {
        if err_ratio <= T::zero() {
            return self.max_growth;
        }
        let mut factor = self.safety * err_ratio.powf(self.p_gain);
        if self.err_ratio_old > T::zero() {
            factor = factor * self.err_ratio_old.powf(self.i_gain);
        }
        factor.min(self.max_growth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(dt: f64) -> StepController<f64> {
        StepController::new(&AdaptiveSettings::with_tolerance(1e-6), dt)
    }

    #[test]
    fn default_settings_use_pi_constants() {
        let settings = AdaptiveSettings::default();
        assert_eq!(settings.safety, 0.8);
        assert_eq!(settings.p_gain, -0.14);
        assert_eq!(settings.i_gain, -0.08);
        assert_eq!(settings.p_loss, -0.2);
        assert_eq!(settings.max_growth, 8.0);
        assert_eq!(settings.max_iterations, 100_000);
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        for tol in [0.0, -1e-3, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                AdaptiveSettings::with_tolerance(tol).validate(),
                Err(ConfigError::InvalidTolerance(_))
            ));
        }
        let settings = AdaptiveSettings {
            max_iterations: 0,
            ..AdaptiveSettings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::ZeroIterationCap));

        let settings = AdaptiveSettings {
            initial_dt: Some(-0.1),
            ..AdaptiveSettings::default()
        };
        assert_eq!(settings.validate(), Err(ConfigError::InvalidInitialStep(-0.1)));

        let settings = AdaptiveSettings {
            max_growth: 0.5,
            ..AdaptiveSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ConfigError::InvalidControllerConstant {
                name: "max_growth",
                value: 0.5
            })
        );
    }

    #[test]
    fn first_accept_grows_with_pi_law() {
        let mut ctrl = controller(0.1);
        let decision = ctrl.decide(0.5, 0.0, 10.0);
        let expected = 0.1 * 0.8 * 0.5_f64.powf(-0.14);
        match decision {
            StepDecision::Accept {
                dt,
                next_dt,
                lands_on_end,
            } => {
                assert_eq!(dt, 0.1);
                assert!((next_dt - expected).abs() < 1e-15);
                assert!(!lands_on_end);
            }
            other => panic!("expected accept, got {other:?}"),
        }
        assert_eq!(ctrl.err_ratio_old(), 0.5);

        // Second accept brings in the integral term.
        let dt = ctrl.dt();
        ctrl.decide(0.25, 0.1, 10.0);
        let expected = dt * 0.8 * 0.25_f64.powf(-0.14) * 0.5_f64.powf(-0.08);
        assert!((ctrl.dt() - expected).abs() < 1e-15);
    }

    #[test]
    fn growth_is_capped_and_zero_error_does_not_overflow() {
        let mut ctrl = controller(0.01);
        ctrl.decide(1e-30, 0.0, 10.0);
        assert!((ctrl.dt() - 0.08).abs() < 1e-15);

        ctrl.decide(0.0, 0.01, 10.0);
        assert!((ctrl.dt() - 0.64).abs() < 1e-15);
        assert!(ctrl.dt().is_finite());

        // Previous ratio of zero only drops the integral term.
        ctrl.decide(0.5, 0.09, 10.0);
        let expected = 0.64 * 0.8 * 0.5_f64.powf(-0.14);
        assert!((ctrl.dt() - expected).abs() < 1e-12);
    }

    #[test]
    fn rejection_shrinks_and_blocks_next_growth() {
        let mut ctrl = controller(0.1);
        let decision = ctrl.decide(32.0, 0.0, 10.0);
        let shrunk = 0.1 * 0.8 * 32.0_f64.powf(-0.2);
        assert!(matches!(decision, StepDecision::Reject { .. }));
        assert!((ctrl.dt() - shrunk).abs() < 1e-15);
        assert!(ctrl.rejected());
        assert_eq!(ctrl.err_ratio_old(), 32.0);

        match ctrl.decide(0.1, 0.0, 10.0) {
            StepDecision::Accept { dt, next_dt, .. } => {
                assert_eq!(dt, shrunk);
                assert_eq!(next_dt, shrunk);
            }
            other => panic!("expected accept, got {other:?}"),
        }
        assert!(!ctrl.rejected());
    }

    #[test]
    fn ratio_of_exactly_one_is_rejected() {
        let mut ctrl = controller(0.1);
        assert!(matches!(ctrl.decide(1.0, 0.0, 10.0), StepDecision::Reject { .. }));
    }

    #[test]
    fn non_finite_error_shrinks_by_fixed_factor() {
        let mut ctrl = controller(0.1);
        ctrl.decide(f64::NAN, 0.0, 10.0);
        assert!((ctrl.dt() - 0.01).abs() < 1e-15);
        assert_eq!(ctrl.err_ratio_old(), 1.0);
    }

    #[test]
    fn overshoot_clamps_without_counting_as_rejection() {
        let mut ctrl = controller(0.5);
        let decision = ctrl.decide(0.1, 9.75, 10.0);
        assert_eq!(decision, StepDecision::Clamp { next_dt: 0.25 });
        assert!(!ctrl.rejected());
        assert_eq!(ctrl.err_ratio_old(), 1.0);

        match ctrl.decide(0.1, 9.75, 10.0) {
            StepDecision::Accept { dt, lands_on_end, .. } => {
                assert_eq!(dt, 0.25);
                assert!(lands_on_end);
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn overshoot_within_tolerance_is_accepted() {
        let mut ctrl = controller(0.25 + 5e-7);
        assert!(matches!(
            ctrl.decide(0.1, 9.75, 10.0),
            StepDecision::Accept {
                lands_on_end: false,
                ..
            }
        ));
    }

    #[test]
    fn error_estimate_takes_worst_component() {
        let tableau = ButcherTableau::<f64>::dormand_prince();
        let mut k: [Vec<f64>; STAGES] = std::array::from_fn(|_| vec![0.0, 0.0]);
        k[6] = vec![1.0, -2.0];
        let err = error_estimate(&tableau, &k);
        assert!((err - 2.0 * 0.025).abs() < 1e-15);

        // Identical stages carry no error since Σ e = 0.
        let k: [Vec<f64>; STAGES] = std::array::from_fn(|_| vec![3.0]);
        assert!(error_estimate(&tableau, &k) < 1e-14);

        let mut k: [Vec<f64>; STAGES] = std::array::from_fn(|_| vec![0.0, 0.0]);
        k[0][1] = f64::NAN;
        assert!(error_estimate(&tableau, &k).is_nan());
    }
}
