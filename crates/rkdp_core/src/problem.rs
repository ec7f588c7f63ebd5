use crate::error::ConfigError;
use crate::traits::{DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};

/// An initial value problem: where to start and over which interval.
///
/// The right-hand side is passed next to the problem, so the same problem can
/// be integrated against different models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem<T> {
    pub initial_state: Vec<T>,
    pub t0: T,
    pub t1: T,
}

impl<T: Scalar> Problem<T> {
    pub fn new(initial_state: Vec<T>, t0: T, t1: T) -> Self {
        Self {
            initial_state,
            t0,
            t1,
        }
    }

    pub fn dimension(&self) -> usize {
        self.initial_state.len()
    }

    pub fn span(&self) -> T {
        self.t1 - self.t0
    }

    /// Checks the problem against the system it will be integrated with.
    pub fn validate(&self, system: &impl DynamicalSystem<T>) -> Result<(), ConfigError> {
        if self.initial_state.is_empty() {
            return Err(ConfigError::EmptyState);
        }
        if system.dimension() != self.initial_state.len() {
            return Err(ConfigError::DimensionMismatch {
                system: system.dimension(),
                state: self.initial_state.len(),
            });
        }
        if !self.t0.is_finite() || !self.t1.is_finite() || self.t1 <= self.t0 {
            return Err(ConfigError::InvalidInterval {
                t0: self.t0.to_f64().unwrap_or(f64::NAN),
                t1: self.t1.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Problem;
    use crate::error::ConfigError;
    use crate::systems::{DoublePendulum, HarmonicOscillator};

    #[test]
    fn validate_accepts_matching_problem() {
        let problem = Problem::new(vec![1.0, 0.0], 0.0, 1.0);
        assert_eq!(problem.validate(&HarmonicOscillator::default()), Ok(()));
        assert_eq!(problem.span(), 1.0);
    }

    #[test]
    fn validate_rejects_bad_problems() {
        let oscillator = HarmonicOscillator::<f64>::default();
        assert_eq!(
            Problem::new(vec![], 0.0, 1.0).validate(&oscillator),
            Err(ConfigError::EmptyState)
        );
        assert_eq!(
            Problem::new(vec![1.0, 0.0], 0.0, 1.0).validate(&DoublePendulum::default()),
            Err(ConfigError::DimensionMismatch {
                system: 4,
                state: 2
            })
        );
        assert!(matches!(
            Problem::new(vec![1.0, 0.0], 1.0, 1.0).validate(&oscillator),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(matches!(
            Problem::new(vec![1.0, 0.0], 0.0, f64::INFINITY).validate(&oscillator),
            Err(ConfigError::InvalidInterval { .. })
        ));
    }
}
