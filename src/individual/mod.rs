//! # Individuals
//!
//! An [`Individual`] is one candidate solution. Its content is a [`Genome`]: a leaf holds
//! exactly one representation (a boolean, integer or real chromosome, or an expression
//! tree), while a composite holds an ordered list of leaf children, one per
//! sub-representation of a mixed problem.
//!
//! Every numeric variable of an individual is reachable through a *flat index*
//! (`0..variable_count()`), walking composite children in order and skipping trees.
//! Repair, local search and the guided-convergence model all work on that view, so
//! they apply unchanged to binary, integer, continuous and mixed problems.
//!
//! Fitness is cached on the individual. Any content mutation clears it, and
//! evaluating an already evaluated individual is an error.

pub mod tree;

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{out_of_range, OptimizationError, Result};
use crate::problem::{Problem, ProblemDefinition};
use crate::rng::RandomNumberGenerator;

pub use tree::ExpressionTree;

/// Hands out problem-scoped individual identifiers.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// The objective value(s) of an evaluated individual. Higher is better.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Fitness {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Fitness {
    /// All objective values; a scalar fitness is a single objective.
    pub fn objectives(&self) -> &[f64] {
        match self {
            Fitness::Scalar(value) => std::slice::from_ref(value),
            Fitness::Vector(values) => values,
        }
    }

    pub fn scalar(&self) -> Option<f64> {
        match self {
            Fitness::Scalar(value) => Some(*value),
            Fitness::Vector(_) => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.objectives().iter().all(|v| v.is_finite())
    }

    /// Strict improvement: `>` for scalars, Pareto dominance for vectors.
    pub fn dominates(&self, other: &Fitness) -> bool {
        let (a, b) = (self.objectives(), other.objectives());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).all(|(x, y)| x >= y) && a.iter().zip(b).any(|(x, y)| x > y)
    }
}

/// The content of an individual.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Genome {
    Binary(Vec<bool>),
    Integer(Vec<i64>),
    Continuous(Vec<f64>),
    Tree(ExpressionTree),
    Composite(Vec<Individual>),
}

impl Genome {
    /// Number of flat numeric variables held directly by this genome.
    fn leaf_variable_count(&self) -> usize {
        match self {
            Genome::Binary(bits) => bits.len(),
            Genome::Integer(values) => values.len(),
            Genome::Continuous(values) => values.len(),
            Genome::Tree(_) | Genome::Composite(_) => 0,
        }
    }

    fn leaf_value(&self, index: usize) -> Option<f64> {
        match self {
            Genome::Binary(bits) => bits.get(index).map(|&b| if b { 1.0 } else { 0.0 }),
            Genome::Integer(values) => values.get(index).map(|&v| v as f64),
            Genome::Continuous(values) => values.get(index).copied(),
            Genome::Tree(_) | Genome::Composite(_) => None,
        }
    }

    fn set_leaf_value(&mut self, index: usize, value: f64) -> bool {
        match self {
            Genome::Binary(bits) => bits.get_mut(index).map(|b| *b = value >= 0.5).is_some(),
            Genome::Integer(values) => values
                .get_mut(index)
                .map(|v| *v = value.round() as i64)
                .is_some(),
            Genome::Continuous(values) => values.get_mut(index).map(|v| *v = value).is_some(),
            Genome::Tree(_) | Genome::Composite(_) => false,
        }
    }

    fn describe(&self, out: &mut String) {
        match self {
            Genome::Binary(bits) => {
                out.push_str("b:");
                out.extend(bits.iter().map(|&b| if b { '1' } else { '0' }));
            }
            Genome::Integer(values) => {
                out.push_str("i:");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}", v);
                }
            }
            Genome::Continuous(values) => {
                out.push_str("r:");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{:?}", v);
                }
            }
            Genome::Tree(tree) => {
                let _ = write!(out, "t:{}", tree);
            }
            Genome::Composite(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    child.genome.describe(out);
                }
            }
        }
    }
}

/// A candidate solution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    id: u64,
    genome: Genome,
    fitness: Option<Fitness>,
}

impl Individual {
    pub fn new(id: u64, genome: Genome) -> Self {
        Self {
            id,
            genome,
            fitness: None,
        }
    }

    /// Builds a composite individual. Children must be leaves.
    pub fn composite(id: u64, children: Vec<Individual>) -> Result<Self> {
        if children.iter().any(Individual::is_composite) {
            return Err(OptimizationError::Configuration(
                "Composite individuals cannot be nested".to_string(),
            ));
        }
        Ok(Self::new(id, Genome::Composite(children)))
    }

    /// Creates a random individual laid out according to `definition`.
    pub fn random(
        definition: &ProblemDefinition,
        ids: &IdGenerator,
        rng: &mut RandomNumberGenerator,
    ) -> Self {
        let slots = definition.representation().slots();
        if definition.representation().is_mixed() {
            let children = slots
                .iter()
                .map(|slot| Individual::new(ids.next_id(), slot.random_genome(rng)))
                .collect();
            Individual::new(ids.next_id(), Genome::Composite(children))
        } else {
            Individual::new(ids.next_id(), slots[0].random_genome(rng))
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Replaces the whole genome, clearing the fitness.
    pub fn set_genome(&mut self, genome: Genome) {
        self.genome = genome;
        self.fitness = None;
    }

    /// Deep copy with a fresh identifier and no fitness.
    pub fn clone_fresh(&self, ids: &IdGenerator) -> Self {
        let genome = match &self.genome {
            Genome::Composite(children) => Genome::Composite(
                children.iter().map(|child| child.clone_fresh(ids)).collect(),
            ),
            other => other.clone(),
        };
        Self::new(ids.next_id(), genome)
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub fn fitness(&self) -> Result<&Fitness> {
        self.fitness
            .as_ref()
            .ok_or(OptimizationError::NotEvaluated(self.id))
    }

    /// Scalar fitness, or `None` for unevaluated or multi-objective individuals.
    pub fn scalar_fitness(&self) -> Option<f64> {
        self.fitness.as_ref().and_then(Fitness::scalar)
    }

    /// Marks the individual as needing a fresh evaluation.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// Runs the objective function and caches the result.
    ///
    /// # Errors
    ///
    /// - `AlreadyEvaluated` when the fitness is already cached,
    /// - `FitnessCalculation` when the objective returns a non-finite value,
    /// - whatever error the objective itself returns.
    pub fn evaluate(&mut self, problem: &dyn Problem) -> Result<&Fitness> {
        if self.fitness.is_some() {
            return Err(OptimizationError::AlreadyEvaluated(self.id));
        }
        let fitness = problem.evaluate(self)?;
        if !fitness.is_finite() {
            return Err(OptimizationError::FitnessCalculation(format!(
                "Non-finite fitness {:?} for individual {}",
                fitness, self.id
            )));
        }
        Ok(self.fitness.insert(fitness))
    }

    /// Stores a fitness computed elsewhere (used by caches and tests).
    pub fn set_fitness(&mut self, fitness: Fitness) {
        self.fitness = Some(fitness);
    }

    pub fn has_boolean_chromosome(&self) -> bool {
        matches!(self.genome, Genome::Binary(_))
    }

    pub fn has_integer_chromosome(&self) -> bool {
        matches!(self.genome, Genome::Integer(_))
    }

    pub fn has_real_chromosome(&self) -> bool {
        matches!(self.genome, Genome::Continuous(_))
    }

    pub fn has_tree(&self) -> bool {
        matches!(self.genome, Genome::Tree(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.genome, Genome::Composite(_))
    }

    pub fn booleans(&self) -> Option<&[bool]> {
        match &self.genome {
            Genome::Binary(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn integers(&self) -> Option<&[i64]> {
        match &self.genome {
            Genome::Integer(values) => Some(values),
            _ => None,
        }
    }

    pub fn reals(&self) -> Option<&[f64]> {
        match &self.genome {
            Genome::Continuous(values) => Some(values),
            _ => None,
        }
    }

    pub fn tree(&self) -> Option<&ExpressionTree> {
        match &self.genome {
            Genome::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Individual] {
        match &self.genome {
            Genome::Composite(children) => children,
            _ => &[],
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool> {
        let bits = self.booleans().ok_or_else(|| missing("boolean"))?;
        bits.get(index)
            .copied()
            .ok_or_else(|| out_of_range("Boolean chromosome", index, bits.len()))
    }

    pub fn set_boolean(&mut self, index: usize, value: bool) -> Result<()> {
        match &mut self.genome {
            Genome::Binary(bits) => {
                let len = bits.len();
                *bits
                    .get_mut(index)
                    .ok_or_else(|| out_of_range("Boolean chromosome", index, len))? = value;
            }
            _ => return Err(missing("boolean")),
        }
        self.fitness = None;
        Ok(())
    }

    pub fn integer(&self, index: usize) -> Result<i64> {
        let values = self.integers().ok_or_else(|| missing("integer"))?;
        values
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range("Integer chromosome", index, values.len()))
    }

    pub fn set_integer(&mut self, index: usize, value: i64) -> Result<()> {
        match &mut self.genome {
            Genome::Integer(values) => {
                let len = values.len();
                *values
                    .get_mut(index)
                    .ok_or_else(|| out_of_range("Integer chromosome", index, len))? = value;
            }
            _ => return Err(missing("integer")),
        }
        self.fitness = None;
        Ok(())
    }

    pub fn real(&self, index: usize) -> Result<f64> {
        let values = self.reals().ok_or_else(|| missing("real"))?;
        values
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range("Real chromosome", index, values.len()))
    }

    pub fn set_real(&mut self, index: usize, value: f64) -> Result<()> {
        match &mut self.genome {
            Genome::Continuous(values) => {
                let len = values.len();
                *values
                    .get_mut(index)
                    .ok_or_else(|| out_of_range("Real chromosome", index, len))? = value;
            }
            _ => return Err(missing("real")),
        }
        self.fitness = None;
        Ok(())
    }

    pub fn child(&self, index: usize) -> Result<&Individual> {
        let children = self.children();
        children
            .get(index)
            .ok_or_else(|| out_of_range("Child", index, children.len()))
    }

    /// Mutable access to a child; the composite's fitness is cleared.
    pub fn child_mut(&mut self, index: usize) -> Result<&mut Individual> {
        self.fitness = None;
        match &mut self.genome {
            Genome::Composite(children) => {
                let len = children.len();
                children
                    .get_mut(index)
                    .ok_or_else(|| out_of_range("Child", index, len))
            }
            _ => Err(missing("composite")),
        }
    }

    pub fn add_child(&mut self, child: Individual) -> Result<()> {
        if child.is_composite() {
            return Err(OptimizationError::Configuration(
                "Composite individuals cannot be nested".to_string(),
            ));
        }
        match &mut self.genome {
            Genome::Composite(children) => children.push(child),
            _ => return Err(missing("composite")),
        }
        self.fitness = None;
        Ok(())
    }

    pub fn remove_child(&mut self, index: usize) -> Result<Individual> {
        let removed = match &mut self.genome {
            Genome::Composite(children) => {
                if index >= children.len() {
                    return Err(out_of_range("Child", index, children.len()));
                }
                children.remove(index)
            }
            _ => return Err(missing("composite")),
        };
        self.fitness = None;
        Ok(removed)
    }

    /// Genome of the given sub-representation slot (slot 0 for leaf individuals).
    pub fn slot_genome(&self, slot: usize) -> Option<&Genome> {
        match &self.genome {
            Genome::Composite(children) => children.get(slot).map(|c| &c.genome),
            genome if slot == 0 => Some(genome),
            _ => None,
        }
    }

    /// Number of flat numeric variables.
    pub fn variable_count(&self) -> usize {
        match &self.genome {
            Genome::Composite(children) => children
                .iter()
                .map(|c| c.genome.leaf_variable_count())
                .sum(),
            genome => genome.leaf_variable_count(),
        }
    }

    fn locate(&self, index: usize) -> Option<(&Genome, usize)> {
        match &self.genome {
            Genome::Composite(children) => {
                let mut offset = index;
                for child in children {
                    let count = child.genome.leaf_variable_count();
                    if offset < count {
                        return Some((&child.genome, offset));
                    }
                    offset -= count;
                }
                None
            }
            genome => (index < genome.leaf_variable_count()).then_some((genome, index)),
        }
    }

    fn locate_mut(&mut self, index: usize) -> Option<(&mut Genome, usize)> {
        match &mut self.genome {
            Genome::Composite(children) => {
                let mut offset = index;
                for child in children.iter_mut() {
                    let count = child.genome.leaf_variable_count();
                    if offset < count {
                        child.fitness = None;
                        return Some((&mut child.genome, offset));
                    }
                    offset -= count;
                }
                None
            }
            genome => {
                let count = genome.leaf_variable_count();
                (index < count).then_some((genome, index))
            }
        }
    }

    /// Value of a flat variable; booleans read as `0.0` / `1.0`.
    pub fn variable(&self, index: usize) -> Result<f64> {
        self.locate(index)
            .and_then(|(genome, local)| genome.leaf_value(local))
            .ok_or_else(|| out_of_range("Variable", index, self.variable_count()))
    }

    /// Sets a flat variable. Booleans threshold at `0.5`, integers round.
    pub fn set_variable(&mut self, index: usize, value: f64) -> Result<()> {
        let count = self.variable_count();
        let (genome, local) = self
            .locate_mut(index)
            .ok_or_else(|| out_of_range("Variable", index, count))?;
        genome.set_leaf_value(local, value);
        self.fitness = None;
        Ok(())
    }

    pub fn add_to_variable(&mut self, index: usize, amount: f64) -> Result<()> {
        let value = self.variable(index)?;
        self.set_variable(index, value + amount)
    }

    pub fn remove_from_variable(&mut self, index: usize, amount: f64) -> Result<()> {
        let value = self.variable(index)?;
        self.set_variable(index, value - amount)
    }

    /// All flat variable values in order.
    pub fn variables(&self) -> Vec<f64> {
        (0..self.variable_count())
            .filter_map(|i| self.variable(i).ok())
            .collect()
    }

    /// Deterministic structural description used for deduplication and caching.
    pub fn description(&self) -> String {
        let mut out = String::new();
        self.genome.describe(&mut out);
        out
    }
}

fn missing(kind: &str) -> OptimizationError {
    OptimizationError::Configuration(format!("Individual has no {} chromosome", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::tree::Node;

    struct SumProblem;

    impl Problem for SumProblem {
        fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
            Ok(Fitness::Scalar(individual.variables().iter().sum()))
        }
    }

    fn mixed(ids: &IdGenerator) -> Individual {
        Individual::composite(
            ids.next_id(),
            vec![
                Individual::new(ids.next_id(), Genome::Binary(vec![true, false])),
                Individual::new(
                    ids.next_id(),
                    Genome::Tree(ExpressionTree::new(Node::Variable(0))),
                ),
                Individual::new(ids.next_id(), Genome::Continuous(vec![0.25, 0.75])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_flat_variables_skip_trees() {
        let ids = IdGenerator::new();
        let individual = mixed(&ids);
        assert_eq!(individual.variable_count(), 4);
        assert_eq!(individual.variables(), vec![1.0, 0.0, 0.25, 0.75]);
        assert!(individual.variable(4).is_err());
    }

    #[test]
    fn test_set_variable_clears_fitness() {
        let ids = IdGenerator::new();
        let mut individual = mixed(&ids);
        individual.evaluate(&SumProblem).unwrap();
        assert!(individual.is_evaluated());

        individual.set_variable(1, 1.0).unwrap();
        assert!(!individual.is_evaluated());
        assert_eq!(individual.children()[0].booleans(), Some(&[true, true][..]));
    }

    #[test]
    fn test_evaluate_twice_fails() {
        let ids = IdGenerator::new();
        let mut individual = Individual::new(ids.next_id(), Genome::Continuous(vec![0.5]));
        individual.evaluate(&SumProblem).unwrap();
        let err = individual.evaluate(&SumProblem).unwrap_err();
        assert!(matches!(err, OptimizationError::AlreadyEvaluated(_)));

        individual.invalidate();
        assert!(individual.evaluate(&SumProblem).is_ok());
    }

    #[test]
    fn test_clone_fresh_is_independent() {
        let ids = IdGenerator::new();
        let mut original = Individual::new(ids.next_id(), Genome::Integer(vec![1, 2, 3]));
        original.evaluate(&SumProblem).unwrap();

        let mut copy = original.clone_fresh(&ids);
        assert_ne!(copy.id(), original.id());
        assert!(!copy.is_evaluated());

        copy.set_integer(0, 9).unwrap();
        assert_eq!(original.integer(0).unwrap(), 1);
        assert_eq!(copy.integer(0).unwrap(), 9);
    }

    #[test]
    fn test_bounds_checks() {
        let ids = IdGenerator::new();
        let mut individual = Individual::new(ids.next_id(), Genome::Binary(vec![false; 3]));
        assert!(matches!(
            individual.boolean(3),
            Err(OptimizationError::OutOfRange(_))
        ));
        assert!(individual.set_boolean(5, true).is_err());
        assert!(individual.integer(0).is_err());
        assert!(individual.child(0).is_err());
    }

    #[test]
    fn test_composite_children() {
        let ids = IdGenerator::new();
        let mut individual = mixed(&ids);
        assert!(individual.is_composite());
        assert!(individual.child(1).unwrap().has_tree());

        let removed = individual.remove_child(1).unwrap();
        assert!(removed.has_tree());
        assert_eq!(individual.children().len(), 2);

        let nested = mixed(&ids);
        assert!(individual.add_child(nested).is_err());
    }

    #[test]
    fn test_description_is_structural() {
        let ids = IdGenerator::new();
        let a = mixed(&ids);
        let b = a.clone_fresh(&ids);
        assert_eq!(a.description(), b.description());
        assert_eq!(a.description(), "b:10|t:x0|r:0.25,0.75");
    }

    #[test]
    fn test_fitness_dominance() {
        assert!(Fitness::Scalar(2.0).dominates(&Fitness::Scalar(1.0)));
        assert!(!Fitness::Scalar(1.0).dominates(&Fitness::Scalar(1.0)));
        assert!(Fitness::Vector(vec![2.0, 2.0]).dominates(&Fitness::Vector(vec![1.0, 2.0])));
        assert!(!Fitness::Vector(vec![2.0, 0.0]).dominates(&Fitness::Vector(vec![1.0, 2.0])));
    }

    #[test]
    fn test_non_finite_fitness_rejected() {
        struct NanProblem;
        impl Problem for NanProblem {
            fn evaluate(&self, _individual: &Individual) -> Result<Fitness> {
                Ok(Fitness::Scalar(f64::NAN))
            }
        }
        let mut individual = Individual::new(0, Genome::Binary(vec![true]));
        assert!(matches!(
            individual.evaluate(&NanProblem),
            Err(OptimizationError::FitnessCalculation(_))
        ));
        assert!(!individual.is_evaluated());
    }
}
