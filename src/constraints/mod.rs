//! # Constraints
//!
//! Composable feasibility checks for individuals.
//!
//! A [`Problem`] answers feasibility with a single `bool`. For problems whose constraints
//! are naturally a list of independent requirements, this module offers:
//!
//! - the [`Constraint`] trait, which reports every way an individual falls short as a
//!   [`ConstraintViolation`],
//! - [`ConstraintSet`], a collection of constraints checked together,
//! - [`ConstrainedProblem`], which attaches a constraint set to any objective so repair,
//!   local search and the solver see the combined feasibility,
//! - ready-made constraints on the flat variables: [`WeightCapacityConstraint`] and
//!   [`CardinalityConstraint`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use heuropt::constraints::{ConstraintSet, WeightCapacityConstraint};
//! use heuropt::individual::{Genome, Individual};
//!
//! let constraints = ConstraintSet::builder()
//!     .with_constraint(WeightCapacityConstraint::new("Knapsack", vec![4.0, 3.0, 5.0], 8.0).unwrap())
//!     .build();
//!
//! let light = Individual::new(0, Genome::Binary(vec![true, true, false]));
//! let heavy = Individual::new(1, Genome::Binary(vec![true, false, true]));
//! assert!(constraints.is_valid(&light));
//! assert_eq!(constraints.check_all(&heavy).len(), 1);
//! ```

mod capacity;

pub use capacity::{CardinalityConstraint, WeightCapacityConstraint};

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::error::Result;
use crate::individual::{Fitness, Individual};
use crate::problem::Problem;

/// Represents a violation of a constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    constraint_name: String,
    description: String,
    /// Higher means more severe.
    severity: Option<f64>,
}

impl ConstraintViolation {
    pub fn new<S: Into<String>, D: Into<String>>(constraint_name: S, description: D) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            description: description.into(),
            severity: None,
        }
    }

    pub fn with_severity<S: Into<String>, D: Into<String>>(
        constraint_name: S,
        description: D,
        severity: f64,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            description: description.into(),
            severity: Some(severity),
        }
    }

    pub fn constraint_name(&self) -> &str {
        &self.constraint_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Option<f64> {
        self.severity
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Constraint '{}' violated: {}{}",
            self.constraint_name(),
            self.description(),
            self.severity()
                .map(|s| format!(" (severity: {})", s))
                .unwrap_or_default()
        )
    }
}

/// A requirement an individual must satisfy.
pub trait Constraint: Debug + Send + Sync {
    /// Returns every violation of this constraint; empty means satisfied.
    fn check(&self, individual: &Individual) -> Vec<ConstraintViolation>;

    /// Sums the severity of the violations, counting unrated ones as 1.
    fn penalty_score(&self, violations: &[ConstraintViolation]) -> f64 {
        violations.iter().map(|v| v.severity.unwrap_or(1.0)).sum()
    }
}

/// Constraints checked together.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Arc<dyn Constraint>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ConstraintSetBuilder {
        ConstraintSetBuilder::default()
    }

    pub fn add_constraint<C>(&mut self, constraint: C) -> &mut Self
    where
        C: Constraint + 'static,
    {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn check_all(&self, individual: &Individual) -> Vec<ConstraintViolation> {
        self.constraints
            .iter()
            .flat_map(|c| c.check(individual))
            .collect()
    }

    /// Total penalty over every violated constraint.
    pub fn total_penalty_score(&self, individual: &Individual) -> f64 {
        self.constraints
            .iter()
            .map(|c| {
                let violations = c.check(individual);
                if violations.is_empty() {
                    0.0
                } else {
                    c.penalty_score(&violations)
                }
            })
            .sum()
    }

    /// Stops at the first violated constraint.
    pub fn is_valid(&self, individual: &Individual) -> bool {
        self.constraints
            .iter()
            .all(|c| c.check(individual).is_empty())
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSetBuilder {
    constraints: Vec<Arc<dyn Constraint>>,
}

impl ConstraintSetBuilder {
    pub fn with_constraint<C>(mut self, constraint: C) -> Self
    where
        C: Constraint + 'static,
    {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn build(self) -> ConstraintSet {
        ConstraintSet {
            constraints: self.constraints,
        }
    }
}

/// An objective combined with a constraint set.
///
/// An individual is feasible when both the wrapped problem's own check and every
/// constraint of the set accept it. Evaluation is delegated unchanged.
#[derive(Debug, Clone)]
pub struct ConstrainedProblem<P> {
    problem: P,
    constraints: ConstraintSet,
}

impl<P: Problem> ConstrainedProblem<P> {
    pub fn new(problem: P, constraints: ConstraintSet) -> Self {
        Self {
            problem,
            constraints,
        }
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn inner(&self) -> &P {
        &self.problem
    }
}

impl<P: Problem> Problem for ConstrainedProblem<P> {
    fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
        self.problem.evaluate(individual)
    }

    fn check_constraints(&self, individual: &Individual) -> bool {
        self.problem.check_constraints(individual) && self.constraints.is_valid(individual)
    }

    fn repair_lower_bound(&self, individual: &Individual) -> Option<f64> {
        self.problem.repair_lower_bound(individual)
    }
}
