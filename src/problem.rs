//! # Problems
//!
//! A problem is made of two parts:
//!
//! - a [`Problem`] implementation supplied by the caller: the objective function and the
//!   constraint checker,
//! - a [`ProblemDefinition`] describing how individuals are laid out (their
//!   [`Representation`]), how many objectives there are and which objectives carry
//!   range or equality constraints.
//!
//! ## Example
//!
//! ```rust
//! use heuropt::individual::{Fitness, Individual};
//! use heuropt::problem::{Problem, ProblemDefinition, Representation};
//! use heuropt::error::Result;
//!
//! struct OneMax;
//!
//! impl Problem for OneMax {
//!     fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
//!         let ones = individual.booleans().unwrap_or(&[]).iter().filter(|b| **b).count();
//!         Ok(Fitness::Scalar(ones as f64))
//!     }
//! }
//!
//! let definition = ProblemDefinition::new(Representation::binary(16)).unwrap();
//! assert_eq!(definition.variables().len(), 16);
//! ```

use crate::error::{OptimizationError, Result};
use crate::individual::tree::TreeConfig;
use crate::individual::{Fitness, Genome, Individual};
use crate::multi_objective::ObjectiveConstraint;
use crate::rng::RandomNumberGenerator;

/// The objective function and constraint checker of an optimization problem.
///
/// Implementations must be pure functions of the individual's content: the engine may
/// evaluate individuals from several worker threads at once.
pub trait Problem: Send + Sync {
    /// Computes the fitness of a fully assembled individual. Higher is better.
    fn evaluate(&self, individual: &Individual) -> Result<Fitness>;

    /// Returns `true` when the individual satisfies every constraint.
    fn check_constraints(&self, _individual: &Individual) -> bool {
        true
    }

    /// Lowest fitness a repair of `individual` may end at, read before the repair starts.
    ///
    /// Every objective of the repaired individual must reach the bound; a repair that
    /// falls below it is an `InvariantViolation`. `None` disables the check.
    fn repair_lower_bound(&self, _individual: &Individual) -> Option<f64> {
        None
    }
}

impl std::fmt::Debug for dyn Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Problem")
    }
}

/// Layout of a single (non-mixed) representation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub enum LeafRepresentation {
    Binary { length: usize },
    /// Inclusive `(min, max)` per variable.
    Integer { bounds: Vec<(i64, i64)> },
    /// Inclusive `(min, max)` per variable.
    Continuous { bounds: Vec<(f64, f64)> },
    Tree(TreeConfig),
}

impl LeafRepresentation {
    fn variable_count(&self) -> usize {
        match self {
            LeafRepresentation::Binary { length } => *length,
            LeafRepresentation::Integer { bounds } => bounds.len(),
            LeafRepresentation::Continuous { bounds } => bounds.len(),
            LeafRepresentation::Tree(_) => 0,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            LeafRepresentation::Binary { length } if *length == 0 => Err(
                OptimizationError::Configuration("Binary dimension must be positive".to_string()),
            ),
            LeafRepresentation::Integer { bounds } if bounds.is_empty() => Err(
                OptimizationError::Configuration("Integer dimension must be positive".to_string()),
            ),
            LeafRepresentation::Integer { bounds } => {
                match bounds.iter().position(|(lo, hi)| lo > hi) {
                    Some(i) => Err(OptimizationError::Configuration(format!(
                        "Integer variable {} has min greater than max",
                        i
                    ))),
                    None => Ok(()),
                }
            }
            LeafRepresentation::Continuous { bounds } if bounds.is_empty() => {
                Err(OptimizationError::Configuration(
                    "Continuous dimension must be positive".to_string(),
                ))
            }
            LeafRepresentation::Continuous { bounds } => {
                match bounds
                    .iter()
                    .position(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi))
                {
                    Some(i) => Err(OptimizationError::Configuration(format!(
                        "Continuous variable {} has invalid bounds",
                        i
                    ))),
                    None => Ok(()),
                }
            }
            LeafRepresentation::Tree(config) => config.validate(),
            LeafRepresentation::Binary { .. } => Ok(()),
        }
    }

    /// Draws a uniformly random genome of this layout.
    pub fn random_genome(&self, rng: &mut RandomNumberGenerator) -> Genome {
        match self {
            LeafRepresentation::Binary { length } => {
                Genome::Binary((0..*length).map(|_| rng.bernoulli(0.5)).collect())
            }
            LeafRepresentation::Integer { bounds } => Genome::Integer(
                bounds
                    .iter()
                    .map(|&(lo, hi)| rng.range_i64(lo, hi))
                    .collect(),
            ),
            LeafRepresentation::Continuous { bounds } => Genome::Continuous(
                bounds
                    .iter()
                    .map(|&(lo, hi)| rng.range_f64(lo, hi))
                    .collect(),
            ),
            LeafRepresentation::Tree(config) => Genome::Tree(config.random_tree(rng)),
        }
    }
}

/// Layout of every individual of a problem.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub enum Representation {
    Leaf(LeafRepresentation),
    /// One composite child per entry, in order.
    Mixed(Vec<LeafRepresentation>),
}

impl Representation {
    pub fn binary(length: usize) -> Self {
        Representation::Leaf(LeafRepresentation::Binary { length })
    }

    pub fn integer(bounds: Vec<(i64, i64)>) -> Self {
        Representation::Leaf(LeafRepresentation::Integer { bounds })
    }

    pub fn uniform_integer(length: usize, min: i64, max: i64) -> Self {
        Self::integer(vec![(min, max); length])
    }

    /// Continuous variables in the unit interval.
    pub fn continuous(length: usize) -> Self {
        Self::continuous_bounded(vec![(0.0, 1.0); length])
    }

    pub fn continuous_bounded(bounds: Vec<(f64, f64)>) -> Self {
        Representation::Leaf(LeafRepresentation::Continuous { bounds })
    }

    pub fn tree(config: TreeConfig) -> Self {
        Representation::Leaf(LeafRepresentation::Tree(config))
    }

    pub fn mixed(slots: Vec<LeafRepresentation>) -> Self {
        Representation::Mixed(slots)
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, Representation::Mixed(_))
    }

    /// Sub-representations; a leaf representation is a single slot.
    pub fn slots(&self) -> &[LeafRepresentation] {
        match self {
            Representation::Leaf(leaf) => std::slice::from_ref(leaf),
            Representation::Mixed(slots) => slots,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Binary,
    Integer,
    Continuous,
}

/// Bounds and origin of one flat variable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableInfo {
    pub kind: VariableKind,
    pub min: f64,
    pub max: f64,
    /// Sub-representation slot the variable belongs to.
    pub slot: usize,
}

impl VariableInfo {
    /// Smallest meaningful change of the variable.
    pub fn unit(&self) -> Option<f64> {
        match self.kind {
            VariableKind::Binary | VariableKind::Integer => Some(1.0),
            VariableKind::Continuous => None,
        }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn denormalize(&self, p: f64) -> f64 {
        self.min + p.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

/// Static description of an optimization problem.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ProblemDefinition {
    representation: Representation,
    objectives: usize,
    objective_constraints: Vec<ObjectiveConstraint>,
    variables: Vec<VariableInfo>,
}

impl ProblemDefinition {
    /// Validates the representation and builds a single-objective definition.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for empty or zero-dimension representations,
    /// inverted bounds, or invalid tree settings.
    pub fn new(representation: Representation) -> Result<Self> {
        let slots = representation.slots();
        if slots.is_empty() {
            return Err(OptimizationError::Configuration(
                "Mixed representation needs at least one slot".to_string(),
            ));
        }
        for slot in slots {
            slot.validate()?;
        }

        let mut variables = Vec::new();
        for (slot_index, slot) in slots.iter().enumerate() {
            match slot {
                LeafRepresentation::Binary { length } => {
                    variables.extend((0..*length).map(|_| VariableInfo {
                        kind: VariableKind::Binary,
                        min: 0.0,
                        max: 1.0,
                        slot: slot_index,
                    }))
                }
                LeafRepresentation::Integer { bounds } => {
                    variables.extend(bounds.iter().map(|&(lo, hi)| VariableInfo {
                        kind: VariableKind::Integer,
                        min: lo as f64,
                        max: hi as f64,
                        slot: slot_index,
                    }))
                }
                LeafRepresentation::Continuous { bounds } => {
                    variables.extend(bounds.iter().map(|&(lo, hi)| VariableInfo {
                        kind: VariableKind::Continuous,
                        min: lo,
                        max: hi,
                        slot: slot_index,
                    }))
                }
                LeafRepresentation::Tree(_) => {}
            }
        }
        debug_assert_eq!(
            variables.len(),
            slots.iter().map(LeafRepresentation::variable_count).sum::<usize>()
        );

        Ok(Self {
            representation,
            objectives: 1,
            objective_constraints: Vec::new(),
            variables,
        })
    }

    /// Sets the number of objectives.
    pub fn with_objectives(mut self, objectives: usize) -> Result<Self> {
        if objectives == 0 {
            return Err(OptimizationError::Configuration(
                "Number of objectives must be greater than 0".to_string(),
            ));
        }
        self.objectives = objectives;
        Ok(self)
    }

    /// Adds a range or equality constraint on one objective.
    pub fn with_objective_constraint(mut self, constraint: ObjectiveConstraint) -> Result<Self> {
        if constraint.objective() >= self.objectives {
            return Err(OptimizationError::Configuration(format!(
                "Objective constraint refers to objective {} but there are only {}",
                constraint.objective(),
                self.objectives
            )));
        }
        constraint.validate()?;
        self.objective_constraints.push(constraint);
        Ok(self)
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn objectives(&self) -> usize {
        self.objectives
    }

    pub fn is_multi_objective(&self) -> bool {
        self.objectives > 1
    }

    pub fn objective_constraints(&self) -> &[ObjectiveConstraint] {
        &self.objective_constraints
    }

    /// Flat variable table, in the order used by [`Individual::variable`].
    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    pub fn variable(&self, index: usize) -> Result<&VariableInfo> {
        self.variables
            .get(index)
            .ok_or_else(|| crate::error::out_of_range("Variable", index, self.variables.len()))
    }

    /// Whether at least one flat variable is continuous.
    pub fn has_continuous_variables(&self) -> bool {
        self.variables
            .iter()
            .any(|v| v.kind == VariableKind::Continuous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::IdGenerator;

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(ProblemDefinition::new(Representation::binary(0)).is_err());
        assert!(ProblemDefinition::new(Representation::continuous(0)).is_err());
        assert!(ProblemDefinition::new(Representation::integer(vec![])).is_err());
        assert!(ProblemDefinition::new(Representation::mixed(vec![])).is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert!(ProblemDefinition::new(Representation::integer(vec![(3, 1)])).is_err());
        assert!(
            ProblemDefinition::new(Representation::continuous_bounded(vec![(1.0, 0.0)])).is_err()
        );
    }

    #[test]
    fn test_mixed_variable_table() {
        let definition = ProblemDefinition::new(Representation::mixed(vec![
            LeafRepresentation::Binary { length: 2 },
            LeafRepresentation::Tree(TreeConfig::default()),
            LeafRepresentation::Integer {
                bounds: vec![(-1, 4)],
            },
        ]))
        .unwrap();

        let kinds: Vec<VariableKind> = definition.variables().iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![VariableKind::Binary, VariableKind::Binary, VariableKind::Integer]
        );
        assert_eq!(definition.variables()[2].slot, 2);
        assert_eq!(definition.variables()[2].min, -1.0);
    }

    #[test]
    fn test_random_individual_matches_layout() {
        let definition = ProblemDefinition::new(Representation::mixed(vec![
            LeafRepresentation::Continuous {
                bounds: vec![(-2.0, 2.0); 3],
            },
            LeafRepresentation::Integer {
                bounds: vec![(0, 5); 2],
            },
        ]))
        .unwrap();
        let ids = IdGenerator::new();
        let mut rng = RandomNumberGenerator::from_seed(9);
        let individual = Individual::random(&definition, &ids, &mut rng);

        assert!(individual.is_composite());
        assert_eq!(individual.variable_count(), 5);
        for (value, info) in individual.variables().iter().zip(definition.variables()) {
            assert!(*value >= info.min && *value <= info.max);
        }
    }

    #[test]
    fn test_objective_count_validation() {
        let definition = ProblemDefinition::new(Representation::binary(4)).unwrap();
        assert!(definition.clone().with_objectives(0).is_err());
        let definition = definition.with_objectives(2).unwrap();
        assert!(definition.is_multi_objective());
    }

    #[test]
    fn test_normalize_round_trip_bounds() {
        let info = VariableInfo {
            kind: VariableKind::Continuous,
            min: -1.0,
            max: 3.0,
            slot: 0,
        };
        assert_eq!(info.normalize(1.0), 0.5);
        assert_eq!(info.denormalize(0.25), 0.0);
        assert_eq!(info.normalize(10.0), 1.0);
    }
}
