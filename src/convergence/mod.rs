//! # Guided Convergence
//!
//! The guided-convergence model keeps, for every flat variable, a probability
//! distribution estimated from the population. Reproduction, repair and local search
//! sample or rank variables through it instead of treating every value as equally likely.
//!
//! - Binary and continuous variables hold a single probability `p` in `[0, 1]` (the
//!   population mean, normalized against the variable's bounds), smoothed with
//!   `p' = (1 - λ)·p + λ·p_population`.
//! - Integer variables hold an empirical discrete distribution (value → cumulative
//!   probability), rebuilt from population frequencies on every update.
//!
//! ```rust
//! use heuropt::convergence::GuidedConvergence;
//! use heuropt::individual::{Genome, Individual};
//! use heuropt::problem::{ProblemDefinition, Representation};
//!
//! let definition = ProblemDefinition::new(Representation::binary(2)).unwrap();
//! let mut model = GuidedConvergence::new(&definition, 1.0).unwrap();
//! let population = vec![
//!     Individual::new(0, Genome::Binary(vec![true, false])),
//!     Individual::new(1, Genome::Binary(vec![true, true])),
//! ];
//! model.update(&population).unwrap();
//! assert_eq!(model.probability(0).unwrap(), 1.0);
//! assert_eq!(model.probability(1).unwrap(), 0.5);
//! ```

pub mod contribution;
pub mod direction;

use std::collections::BTreeMap;

use crate::error::{out_of_range, OptimizationError, Result};
use crate::individual::Individual;
use crate::problem::{ProblemDefinition, VariableInfo, VariableKind};
use crate::rng::RandomNumberGenerator;

pub use contribution::VariableContribution;
pub use direction::{Direction, DirectionHeuristic, SearchDirection};

const CUMULATIVE_TOLERANCE: f64 = 1e-6;

/// Empirical distribution over the values of one integer variable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscreteDistribution {
    values: Vec<i64>,
    cumulative: Vec<f64>,
}

impl DiscreteDistribution {
    /// Builds a distribution from explicit cumulative probabilities.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` when lengths differ, the table is not
    /// non-decreasing, or the last entry is not `1.0` within tolerance.
    pub fn from_parts(values: Vec<i64>, cumulative: Vec<f64>) -> Result<Self> {
        if values.len() != cumulative.len() {
            return Err(OptimizationError::InvariantViolation(format!(
                "Discrete distribution has {} values but {} cumulative entries",
                values.len(),
                cumulative.len()
            )));
        }
        if cumulative.windows(2).any(|w| w[1] < w[0]) {
            return Err(OptimizationError::InvariantViolation(
                "Cumulative probabilities must be non-decreasing".to_string(),
            ));
        }
        if let Some(&last) = cumulative.last() {
            if (last - 1.0).abs() > CUMULATIVE_TOLERANCE {
                return Err(OptimizationError::InvariantViolation(format!(
                    "Cumulative probabilities sum to {} instead of 1",
                    last
                )));
            }
        }
        Ok(Self { values, cumulative })
    }

    fn from_counts(counts: &BTreeMap<i64, usize>) -> Result<Self> {
        let total: usize = counts.values().sum();
        if total == 0 {
            return Ok(Self::default());
        }
        let mut running = 0usize;
        let mut values = Vec::with_capacity(counts.len());
        let mut cumulative = Vec::with_capacity(counts.len());
        for (&value, &count) in counts {
            running += count;
            values.push(value);
            cumulative.push(running as f64 / total as f64);
        }
        Self::from_parts(values, cumulative)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Maps a uniform draw `u` in `[0, 1)` to a value by binary search.
    pub fn sample(&self, u: f64) -> Option<i64> {
        if self.values.is_empty() {
            return None;
        }
        let index = self.cumulative.partition_point(|&c| c <= u);
        Some(self.values[index.min(self.values.len() - 1)])
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut previous = 0.0;
        let mut mean = 0.0;
        for (&value, &c) in self.values.iter().zip(&self.cumulative) {
            mean += value as f64 * (c - previous);
            previous = c;
        }
        Some(mean)
    }
}

/// Per-variable model.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableModel {
    Probability(f64),
    Discrete(DiscreteDistribution),
}

/// The guided-convergence probability model of one optimization run.
#[derive(Debug, Clone)]
pub struct GuidedConvergence {
    models: Vec<VariableModel>,
    variables: Vec<VariableInfo>,
    learning_rate: f64,
}

impl GuidedConvergence {
    /// Creates an uninformed model (`p = 0.5`, empty discrete tables).
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `learning_rate` is not in `(0, 1]`.
    pub fn new(definition: &ProblemDefinition, learning_rate: f64) -> Result<Self> {
        if !(learning_rate > 0.0 && learning_rate <= 1.0) {
            return Err(OptimizationError::Configuration(
                "Guided convergence learning rate must be in (0.0, 1.0]".to_string(),
            ));
        }
        let variables = definition.variables().to_vec();
        let models = variables
            .iter()
            .map(|info| match info.kind {
                VariableKind::Integer => VariableModel::Discrete(DiscreteDistribution::default()),
                VariableKind::Binary | VariableKind::Continuous => VariableModel::Probability(0.5),
            })
            .collect();
        Ok(Self {
            models,
            variables,
            learning_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self, index: usize) -> Option<&VariableModel> {
        self.models.get(index)
    }

    /// Recomputes the model from a population snapshot. An empty snapshot is a no-op.
    pub fn update<'a, I>(&mut self, individuals: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        let individuals: Vec<&Individual> = individuals.into_iter().collect();
        if individuals.is_empty() {
            return Ok(());
        }
        let lambda = self.learning_rate;

        for (index, (model, info)) in self.models.iter_mut().zip(&self.variables).enumerate() {
            match model {
                VariableModel::Probability(p) => {
                    let (sum, count) = individuals
                        .iter()
                        .filter_map(|ind| ind.variable(index).ok())
                        .fold((0.0, 0usize), |(s, c), v| (s + info.normalize(v), c + 1));
                    if count > 0 {
                        let p_population = sum / count as f64;
                        *p = ((1.0 - lambda) * *p + lambda * p_population).clamp(0.0, 1.0);
                    }
                }
                VariableModel::Discrete(distribution) => {
                    let mut counts = BTreeMap::new();
                    for value in individuals.iter().filter_map(|ind| ind.variable(index).ok()) {
                        *counts.entry(value.round() as i64).or_insert(0usize) += 1;
                    }
                    *distribution = DiscreteDistribution::from_counts(&counts)?;
                }
            }
        }
        Ok(())
    }

    /// Probability of the variable, normalized into `[0, 1]`.
    ///
    /// For integer variables this is the normalized expected value of the discrete
    /// distribution (`0.5` before the first update).
    pub fn probability(&self, index: usize) -> Result<f64> {
        let model = self
            .models
            .get(index)
            .ok_or_else(|| out_of_range("Variable", index, self.models.len()))?;
        Ok(match model {
            VariableModel::Probability(p) => *p,
            VariableModel::Discrete(distribution) => distribution
                .mean()
                .map(|m| self.variables[index].normalize(m))
                .unwrap_or(0.5),
        })
    }

    /// Samples a value for the variable from the model.
    ///
    /// Binary variables return the stored probability itself (callers compare it with
    /// a uniform draw), continuous variables return the probability mapped into the
    /// variable's bounds, integer variables are drawn from the cumulative table (or
    /// uniformly within bounds before the first update).
    pub fn draw(&self, index: usize, rng: &mut RandomNumberGenerator) -> Result<f64> {
        let model = self
            .models
            .get(index)
            .ok_or_else(|| out_of_range("Variable", index, self.models.len()))?;
        let info = &self.variables[index];
        Ok(match model {
            VariableModel::Probability(p) => match info.kind {
                VariableKind::Binary => *p,
                _ => info.denormalize(*p),
            },
            VariableModel::Discrete(distribution) => match distribution.sample(rng.uniform()) {
                Some(value) => value as f64,
                None => rng.range_i64(info.min as i64, info.max as i64) as f64,
            },
        })
    }
}
