//! Constraints over the flat variables of an individual.

use crate::constraints::{Constraint, ConstraintViolation};
use crate::error::{OptimizationError, Result};
use crate::individual::Individual;

/// Requires `Σ weightᵢ · xᵢ ≤ capacity` over the flat variables.
///
/// The severity of a violation is the excess weight.
#[derive(Debug, Clone)]
pub struct WeightCapacityConstraint {
    name: String,
    weights: Vec<f64>,
    capacity: f64,
}

impl WeightCapacityConstraint {
    /// # Errors
    ///
    /// Returns a `Configuration` error for an empty weight list or a non-finite weight
    /// or capacity.
    pub fn new<S: Into<String>>(name: S, weights: Vec<f64>, capacity: f64) -> Result<Self> {
        if weights.is_empty() {
            return Err(OptimizationError::Configuration(
                "Weights cannot be empty".to_string(),
            ));
        }
        if !capacity.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(OptimizationError::Configuration(
                "Weights and capacity must be finite".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            weights,
            capacity,
        })
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn weight_of(&self, individual: &Individual) -> f64 {
        individual
            .variables()
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum()
    }
}

impl Constraint for WeightCapacityConstraint {
    fn check(&self, individual: &Individual) -> Vec<ConstraintViolation> {
        let weight = self.weight_of(individual);
        if weight <= self.capacity {
            return Vec::new();
        }
        vec![ConstraintViolation::with_severity(
            &self.name,
            format!(
                "Total weight {} exceeds capacity {}",
                weight, self.capacity
            ),
            weight - self.capacity,
        )]
    }
}

/// Bounds the number of non-zero flat variables.
#[derive(Debug, Clone)]
pub struct CardinalityConstraint {
    name: String,
    min: usize,
    max: usize,
}

impl CardinalityConstraint {
    pub fn new<S: Into<String>>(name: S, min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(OptimizationError::Configuration(format!(
                "Cardinality minimum {} exceeds maximum {}",
                min, max
            )));
        }
        Ok(Self {
            name: name.into(),
            min,
            max,
        })
    }
}

impl Constraint for CardinalityConstraint {
    fn check(&self, individual: &Individual) -> Vec<ConstraintViolation> {
        let count = individual.variables().iter().filter(|v| **v != 0.0).count();
        if count < self.min {
            vec![ConstraintViolation::with_severity(
                &self.name,
                format!("{} non-zero variables, at least {} required", count, self.min),
                (self.min - count) as f64,
            )]
        } else if count > self.max {
            vec![ConstraintViolation::with_severity(
                &self.name,
                format!("{} non-zero variables, at most {} allowed", count, self.max),
                (count - self.max) as f64,
            )]
        } else {
            Vec::new()
        }
    }
}
