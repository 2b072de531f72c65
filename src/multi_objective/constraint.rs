use tracing::debug;

use crate::error::{OptimizationError, Result};

/// Minimum number of feasible points that must remain inside a narrowed window.
const MIN_POINTS_IN_WINDOW: usize = 3;

/// A range or equality constraint on one objective value.
///
/// Equality constraints are handled as a window `[lower, upper]` around the target.
/// The window shrinks as the population finds feasible solutions, so the search
/// progressively focuses on the target value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveConstraint {
    Range {
        objective: usize,
        min: f64,
        max: f64,
    },
    Equality {
        objective: usize,
        target: f64,
        lower: f64,
        upper: f64,
    },
}

impl ObjectiveConstraint {
    pub fn range(objective: usize, min: f64, max: f64) -> Self {
        ObjectiveConstraint::Range {
            objective,
            min,
            max,
        }
    }

    /// Equality constraint with an initial symmetric window of `tolerance`.
    pub fn equality(objective: usize, target: f64, tolerance: f64) -> Self {
        ObjectiveConstraint::Equality {
            objective,
            target,
            lower: target - tolerance,
            upper: target + tolerance,
        }
    }

    pub fn objective(&self) -> usize {
        match self {
            ObjectiveConstraint::Range { objective, .. }
            | ObjectiveConstraint::Equality { objective, .. } => *objective,
        }
    }

    /// Current `(lower, upper)` acceptance window.
    pub fn window(&self) -> (f64, f64) {
        match self {
            ObjectiveConstraint::Range { min, max, .. } => (*min, *max),
            ObjectiveConstraint::Equality { lower, upper, .. } => (*lower, *upper),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid = match self {
            ObjectiveConstraint::Range { min, max, .. } => {
                min.is_finite() && max.is_finite() && min <= max
            }
            ObjectiveConstraint::Equality {
                target,
                lower,
                upper,
                ..
            } => {
                target.is_finite()
                    && lower.is_finite()
                    && upper.is_finite()
                    && lower <= target
                    && target <= upper
            }
        };
        if valid {
            Ok(())
        } else {
            Err(OptimizationError::Configuration(format!(
                "Invalid window for objective constraint {:?}",
                self
            )))
        }
    }

    /// Whether the objective vector lies inside the window. Missing objectives fail.
    pub fn is_satisfied(&self, objectives: &[f64]) -> bool {
        let (lower, upper) = self.window();
        objectives
            .get(self.objective())
            .is_some_and(|v| *v >= lower && *v <= upper)
    }

    /// Tightens an equality window given the objective values of feasible individuals.
    ///
    /// The window is halved around the target when at least three feasible values stay
    /// inside; otherwise each bound moves halfway towards the feasible span. The target
    /// always remains inside the window. Range constraints are left untouched.
    pub fn narrow(&mut self, feasible_values: &[f64]) {
        let ObjectiveConstraint::Equality {
            objective,
            target,
            lower,
            upper,
        } = self
        else {
            return;
        };
        if feasible_values.is_empty() {
            return;
        }

        let half_lower = *target - (*target - *lower) / 2.0;
        let half_upper = *target + (*upper - *target) / 2.0;
        let inside = feasible_values
            .iter()
            .filter(|v| **v >= half_lower && **v <= half_upper)
            .count();

        if inside >= MIN_POINTS_IN_WINDOW {
            *lower = half_lower;
            *upper = half_upper;
        } else {
            let span_min = feasible_values.iter().copied().fold(f64::INFINITY, f64::min);
            let span_max = feasible_values
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            *lower += (span_min.min(*target) - *lower) / 2.0;
            *upper += (span_max.max(*target) - *upper) / 2.0;
        }
        debug!(
            objective = *objective,
            lower = *lower,
            upper = *upper,
            "Equality window narrowed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfaction() {
        let constraint = ObjectiveConstraint::range(1, 0.0, 2.0);
        assert!(constraint.is_satisfied(&[9.0, 1.0]));
        assert!(!constraint.is_satisfied(&[1.0, 3.0]));
        assert!(!constraint.is_satisfied(&[1.0]));
    }

    #[test]
    fn test_validation() {
        assert!(ObjectiveConstraint::range(0, 2.0, 1.0).validate().is_err());
        assert!(ObjectiveConstraint::equality(0, 1.0, -0.5).validate().is_err());
        assert!(ObjectiveConstraint::equality(0, 1.0, 0.5).validate().is_ok());
    }

    #[test]
    fn test_narrow_halves_window_with_enough_points() {
        let mut constraint = ObjectiveConstraint::equality(0, 10.0, 4.0);
        constraint.narrow(&[9.5, 10.0, 10.5, 13.0]);
        assert_eq!(constraint.window(), (8.0, 12.0));
    }

    #[test]
    fn test_narrow_nudges_towards_feasible_span() {
        let mut constraint = ObjectiveConstraint::equality(0, 10.0, 4.0);
        constraint.narrow(&[13.0, 13.5]);
        let (lower, upper) = constraint.window();
        assert_eq!(lower, 8.0);
        assert_eq!(upper, 13.75);
        assert!(lower <= 10.0 && 10.0 <= upper);
    }

    #[test]
    fn test_range_is_never_narrowed() {
        let mut constraint = ObjectiveConstraint::range(0, 0.0, 4.0);
        constraint.narrow(&[1.0, 2.0, 3.0]);
        assert_eq!(constraint.window(), (0.0, 4.0));
    }
}
