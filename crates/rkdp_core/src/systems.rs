//! Right-hand sides of the physical models shipped with the library.
//!
//! Every model implements [`DynamicalSystem`], so the integrators never know
//! which physics they are advancing.

use crate::error::ConfigError;
use crate::traits::{lit, Degradation, DynamicalSystem, Evaluation, Scalar};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Determinants below this magnitude are treated as singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-12;

/// 1D harmonic oscillator, state `[position, velocity]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicOscillator<T> {
    pub omega: T,
}

impl<T: Scalar> HarmonicOscillator<T> {
    pub fn new(omega: T) -> Self {
        Self { omega }
    }

    /// Mechanical energy per unit mass, `(v² + ω²x²) / 2`.
    pub fn energy(&self, state: &[T]) -> T {
        let half = lit::<T>(0.5);
        half * (state[1] * state[1] + self.omega * self.omega * state[0] * state[0])
    }
}

impl<T: Scalar> Default for HarmonicOscillator<T> {
    fn default() -> Self {
        Self { omega: T::one() }
    }
}

impl<T: Scalar> DynamicalSystem<T> for HarmonicOscillator<T> {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) -> Evaluation {
        out[0] = x[1];
        out[1] = -self.omega * self.omega * x[0];
        Evaluation::Nominal
    }
}

/// Two decoupled oscillators, the second at twice the frequency and damped.
/// State `[theta, phi, omega_theta, omega_phi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorPair<T> {
    pub omega: T,
    pub beta: T,
}

impl<T: Scalar> DynamicalSystem<T> for OscillatorPair<T> {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) -> Evaluation {
        let two = lit::<T>(2.0);
        let fast = two * self.omega;
        out[0] = x[2];
        out[1] = x[3];
        out[2] = -self.omega * self.omega * x[0];
        out[3] = -fast * fast * x[1] - two * self.beta * x[3];
        Evaluation::Nominal
    }
}

/// Coefficients of the double pendulum Lagrangian
/// `a_theta·ω_θ² + a_phi·ω_φ² + a_mix·cos(φ-θ)·ω_θ·ω_φ + b_theta·cos θ + b_phi·cos φ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendulumCoefficients {
    pub a_theta: f64,
    pub a_phi: f64,
    pub a_mix: f64,
    pub b_theta: f64,
    pub b_phi: f64,
}

impl Default for PendulumCoefficients {
    fn default() -> Self {
        Self {
            a_theta: 1.0,
            a_phi: 1.0,
            a_mix: 1.0,
            b_theta: 1.0,
            b_phi: 1.0,
        }
    }
}

impl PendulumCoefficients {
    /// Coefficients for two uniform rods of lengths `l1`, `l2` and masses
    /// `m1`, `m2` hanging in a gravity field `g`.
    pub fn from_physical(l1: f64, l2: f64, m1: f64, m2: f64, g: f64) -> Self {
        Self {
            a_theta: m1 * l1 * l1 / 6.0 + 0.5 * m2 * l1 * l1,
            a_phi: m2 * l2 * l2 / 6.0,
            a_mix: 0.5 * m2 * l1 * l2,
            b_theta: l1 * g * (m1 / 2.0 + m2),
            b_phi: 0.5 * l2 * g * m2,
        }
    }

    /// `[a_theta, a_phi, a_mix, b_theta, b_phi]`.
    pub fn to_array(&self) -> [f64; 5] {
        [self.a_theta, self.a_phi, self.a_mix, self.b_theta, self.b_phi]
    }
}

impl TryFrom<&[f64]> for PendulumCoefficients {
    type Error = ConfigError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        match *values {
            [a_theta, a_phi, a_mix, b_theta, b_phi] => Ok(Self {
                a_theta,
                a_phi,
                a_mix,
                b_theta,
                b_phi,
            }),
            _ => Err(ConfigError::CoefficientCount {
                expected: 5,
                got: values.len(),
            }),
        }
    }
}

/// Energy split of a double pendulum state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendulumEnergy {
    pub kinetic: f64,
    pub potential: f64,
    pub total: f64,
}

/// Cartesian positions of the joint and the free end, pivot at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendulumPositions {
    pub joint: [f64; 2],
    pub tip: [f64; 2],
}

/// Double pendulum in Lagrangian form, state `[theta, phi, omega_theta, omega_phi]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DoublePendulum {
    pub coefficients: PendulumCoefficients,
}

impl DoublePendulum {
    pub fn new(coefficients: PendulumCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn mass_matrix(&self, theta: f64, phi: f64) -> Matrix2<f64> {
        let k = &self.coefficients;
        let mix = k.a_mix * (phi - theta).cos();
        Matrix2::new(2.0 * k.a_theta, mix, mix, 2.0 * k.a_phi)
    }

    pub fn energy(&self, state: &[f64]) -> PendulumEnergy {
        let k = &self.coefficients;
        let (theta, phi, om_theta, om_phi) = (state[0], state[1], state[2], state[3]);
        let kinetic = k.a_theta * om_theta * om_theta
            + k.a_phi * om_phi * om_phi
            + k.a_mix * (phi - theta).cos() * om_theta * om_phi;
        let potential = -k.b_theta * theta.cos() - k.b_phi * phi.cos();
        PendulumEnergy {
            kinetic,
            potential,
            total: kinetic + potential,
        }
    }

    pub fn positions(l1: f64, l2: f64, state: &[f64]) -> PendulumPositions {
        let joint = [l1 * state[0].sin(), -l1 * state[0].cos()];
        let tip = [joint[0] + l2 * state[1].sin(), joint[1] - l2 * state[1].cos()];
        PendulumPositions { joint, tip }
    }
}

impl DynamicalSystem<f64> for DoublePendulum {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) -> Evaluation {
        let k = &self.coefficients;
        let (theta, phi, om_theta, om_phi) = (x[0], x[1], x[2], x[3]);
        let delta_sin = (phi - theta).sin();

        let mass = self.mass_matrix(theta, phi);
        let forcing = Vector2::new(
            k.a_mix * delta_sin * om_phi * om_phi - k.b_theta * theta.sin(),
            -k.a_mix * delta_sin * om_theta * om_theta - k.b_phi * phi.sin(),
        );

        let mut det = mass.determinant();
        let mut health = Evaluation::Nominal;
        if det.abs() < SINGULAR_DETERMINANT {
            health = Evaluation::Degraded(Degradation::SingularMassMatrix { determinant: det });
            det = 1.0;
        }

        let adjugate = Matrix2::new(mass[(1, 1)], -mass[(0, 1)], -mass[(1, 0)], mass[(0, 0)]);
        let accel = adjugate * forcing / det;

        out[0] = om_theta;
        out[1] = om_phi;
        out[2] = accel[0];
        out[3] = accel[1];
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harmonic_oscillator_uses_configured_frequency() {
        let system = HarmonicOscillator::<f64>::new(2.0);
        let mut out = [0.0; 2];
        let health = system.apply(0.0, &[1.0, 3.0], &mut out);
        assert_eq!(health, Evaluation::Nominal);
        assert_eq!(out, [3.0, -4.0]);
        assert!((system.energy(&[1.0, 3.0]) - 6.5).abs() < 1e-15);
    }

    #[test]
    fn oscillator_pair_damps_only_the_fast_mode() {
        let system = OscillatorPair {
            omega: 1.0,
            beta: 0.5,
        };
        let mut out = [0.0; 4];
        system.apply(0.0, &[1.0, 1.0, 0.0, 2.0], &mut out);
        assert_eq!(out, [0.0, 2.0, -1.0, -4.0 - 2.0]);
    }

    #[test]
    fn pendulum_at_rest_hanging_down_stays_put() {
        let system = DoublePendulum::default();
        let mut out = [1.0; 4];
        let health = system.apply(0.0, &[0.0, 0.0, 0.0, 0.0], &mut out);
        assert_eq!(health, Evaluation::Nominal);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn pendulum_accelerations_solve_mass_matrix_system() {
        let coefficients = PendulumCoefficients::from_physical(0.3, 0.3, 0.3, 0.3, 9.8);
        let system = DoublePendulum::new(coefficients);
        let state = [0.7, -0.4, 1.3, -2.1];
        let mut out = [0.0; 4];
        system.apply(0.0, &state, &mut out);

        let k = coefficients;
        let delta = state[1] - state[0];
        let lhs = system.mass_matrix(state[0], state[1]) * Vector2::new(out[2], out[3]);
        let rhs0 = k.a_mix * delta.sin() * state[3] * state[3] - k.b_theta * state[0].sin();
        let rhs1 = -k.a_mix * delta.sin() * state[2] * state[2] - k.b_phi * state[1].sin();
        assert!((lhs[0] - rhs0).abs() < 1e-12);
        assert!((lhs[1] - rhs1).abs() < 1e-12);
        assert_eq!(out[0], state[2]);
        assert_eq!(out[1], state[3]);
    }

    #[test]
    fn singular_mass_matrix_is_flagged_and_substituted() {
        // 4·a_theta·a_phi == a_mix² makes det(A) vanish when phi == theta.
        let system = DoublePendulum::new(PendulumCoefficients {
            a_theta: 0.5,
            a_phi: 0.5,
            a_mix: 1.0,
            b_theta: 1.0,
            b_phi: 1.0,
        });
        let mut out = [0.0; 4];
        let health = system.apply(0.0, &[0.3, 0.3, 0.0, 0.0], &mut out);

        match health {
            Evaluation::Degraded(Degradation::SingularMassMatrix { determinant }) => {
                assert!(determinant.abs() < SINGULAR_DETERMINANT)
            }
            other => panic!("expected singular mass matrix, got {other:?}"),
        }
        assert!(out.iter().all(|v| v.is_finite()));
        // A = [[1, 1], [1, 1]] and F = [-sin 0.3, -sin 0.3], so adj(A)·F vanishes.
        assert!(out[2].abs() < 1e-12);
        assert!(out[3].abs() < 1e-12);
    }

    #[test]
    fn coefficients_from_slice_require_five_values() {
        let k = PendulumCoefficients::try_from(&[1.0, 2.0, 3.0, 4.0, 5.0][..])
            .expect("five values should parse");
        assert_eq!(k.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);

        let err = PendulumCoefficients::try_from(&[1.0, 2.0][..]).expect_err("too short");
        assert_eq!(err, ConfigError::CoefficientCount { expected: 5, got: 2 });
    }

    #[test]
    fn physical_coefficients_follow_uniform_rod_model() {
        let k = PendulumCoefficients::from_physical(1.0, 2.0, 3.0, 6.0, 10.0);
        assert!((k.a_theta - (0.5 + 3.0)).abs() < 1e-12);
        assert!((k.a_phi - 4.0).abs() < 1e-12);
        assert!((k.a_mix - 6.0).abs() < 1e-12);
        assert!((k.b_theta - 75.0).abs() < 1e-12);
        assert!((k.b_phi - 60.0).abs() < 1e-12);
    }

    #[test]
    fn pendulum_energy_and_positions_at_reference_state() {
        let system = DoublePendulum::default();
        let energy = system.energy(&[0.0, 0.0, 1.0, 1.0]);
        assert!((energy.kinetic - 3.0).abs() < 1e-12);
        assert!((energy.potential + 2.0).abs() < 1e-12);
        assert!((energy.total - 1.0).abs() < 1e-12);

        let pos = DoublePendulum::positions(1.0, 1.0, &[0.0, std::f64::consts::FRAC_PI_2, 0.0, 0.0]);
        assert!(pos.joint[0].abs() < 1e-12 && (pos.joint[1] + 1.0).abs() < 1e-12);
        assert!((pos.tip[0] - 1.0).abs() < 1e-12 && (pos.tip[1] + 1.0).abs() < 1e-12);
    }
}
