//! Butcher tableau of the Dormand-Prince 5(4) embedded pair.

use crate::traits::{lit, Scalar};
use std::fmt;
use std::sync::OnceLock;

/// Number of stages of the Dormand-Prince pair (FSAL stage included).
pub const STAGES: usize = 7;

/// Coefficients of an explicit embedded Runge-Kutta method with [`STAGES`] stages.
///
/// `b_high` produces the propagated (5th order) solution, `b_low` the
/// embedded 4th order one, and `e = b_high - b_low` the local error estimate.
/// The tableau is built once and only read afterwards, so a single instance
/// can be shared by any number of integration runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau<T: Scalar> {
    pub c: [T; STAGES],
    pub a: [[T; STAGES]; STAGES],
    pub b_high: [T; STAGES],
    pub b_low: [T; STAGES],
    pub e: [T; STAGES],
}

/// Lower-triangular stage coefficients, rows padded with zeros.
const DP_A: [[f64; STAGES]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
];

const DP_C: [f64; STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const DP_B5: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];

const DP_B4: [f64; STAGES] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

impl<T: Scalar> ButcherTableau<T> {
    /// The Dormand-Prince 5(4) tableau (Dormand & Prince, 1980).
    pub fn dormand_prince() -> Self {
        let c = DP_C.map(lit::<T>);
        let a = DP_A.map(|row| row.map(lit::<T>));
        let b_high = DP_B5.map(lit::<T>);
        let b_low = DP_B4.map(lit::<T>);

        let mut e = [T::zero(); STAGES];
        for i in 0..STAGES {
            e[i] = b_high[i] - b_low[i];
        }

        Self {
            c,
            a,
            b_high,
            b_low,
            e,
        }
    }
}

/// Process-wide `f64` Dormand-Prince tableau, built on first use.
pub fn dormand_prince_f64() -> &'static ButcherTableau<f64> {
    static TABLEAU: OnceLock<ButcherTableau<f64>> = OnceLock::new();
    TABLEAU.get_or_init(ButcherTableau::dormand_prince)
}

impl<T: Scalar> Default for ButcherTableau<T> {
    fn default() -> Self {
        Self::dormand_prince()
    }
}

impl<T: Scalar> fmt::Display for ButcherTableau<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..STAGES {
            write!(f, "c[{i}] = {:.10e} | a[{i}] =", self.c[i])?;
            for j in 0..i {
                write!(f, " {:.10e}", self.a[i][j])?;
            }
            writeln!(f)?;
        }
        for (name, row) in [("b_high", &self.b_high), ("b_low", &self.b_low), ("e", &self.e)] {
            write!(f, "{name} =")?;
            for value in row {
                write!(f, " {:.10e}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
