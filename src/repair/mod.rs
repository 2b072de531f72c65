//! # Repair
//!
//! Moves an infeasible individual back into the feasible region by redistributing
//! "weight" between its flat variables.
//!
//! Each variable gets a direction (add or remove) from the
//! [`DirectionHeuristic`](crate::convergence::DirectionHeuristic). Variables that can move in
//! their direction become candidates, scored by guided-convergence probability plus random
//! jitter and tried most-promising first. Early moves shift a random share of the
//! available headroom; later moves shift all of it. Repair stops at the first feasible
//! state and credits the direction that got there.
//!
//! A problem may declare a fitness lower bound for the repaired individual through
//! [`Problem::repair_lower_bound`]; a successful repair below it is reported as an
//! `InvariantViolation` instead of a success.
//!
//! When every candidate is used up, the individual is reverted to its original content
//! with [`RepairConfig::revert_probability`] and otherwise left in its partially
//! repaired state. Either way the outcome is [`RepairOutcome::Failed`].

mod weighted;

pub use weighted::{FlatVariables, WeightedVariables};

use tracing::{debug, trace};

use crate::context::SearchContext;
use crate::convergence::{Direction, VariableContribution};
use crate::error::{OptimizationError, Result};
use crate::individual::Individual;
use crate::problem::Problem;
use crate::rng::RandomNumberGenerator;

/// Result of a repair attempt. Exhaustion is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    AlreadyFeasible,
    Repaired { moves: usize },
    /// No feasible state was found; `reverted` tells whether the original content was restored.
    Failed { reverted: bool },
}

impl RepairOutcome {
    /// Whether the individual satisfies every constraint after repair.
    pub fn is_feasible(&self) -> bool {
        !matches!(self, RepairOutcome::Failed { .. })
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Number of partial moves before moves shift the whole headroom.
    pub full_move_after: usize,
    /// Probability of restoring the original content after a failed repair.
    pub revert_probability: f64,
    /// Amounts below this threshold are replaced by the whole headroom.
    pub rounding_threshold: f64,
    /// Weight of the uniform jitter added to candidate scores.
    pub jitter: f64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            full_move_after: 3,
            revert_probability: 0.8,
            rounding_threshold: 1e-9,
            jitter: 0.5,
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.revert_probability) {
            return Err(OptimizationError::Configuration(
                "Revert probability must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(self.rounding_threshold >= 0.0 && self.jitter >= 0.0) {
            return Err(OptimizationError::Configuration(
                "Rounding threshold and jitter must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Repairer {
    config: RepairConfig,
}

impl Repairer {
    pub fn new(config: RepairConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Repairs `individual` in place against `problem`'s constraint checker.
    ///
    /// A feasible individual is returned untouched as [`RepairOutcome::AlreadyFeasible`].
    /// When the problem declares a lower bound, a repaired individual is evaluated in
    /// place so the bound can be checked.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` when the repaired fitness falls below the problem's
    /// lower bound, and propagates evaluation failures of that check.
    pub fn repair(
        &self,
        individual: &mut Individual,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<RepairOutcome> {
        if problem.check_constraints(individual) {
            return Ok(RepairOutcome::AlreadyFeasible);
        }
        let snapshot = individual.clone();
        let lower_bound = problem.repair_lower_bound(&snapshot);

        let mut candidates = {
            let variables = FlatVariables::new(individual, ctx.definition.variables())?;
            let mut candidates = Vec::with_capacity(variables.len());
            for index in 0..variables.len() {
                let direction = ctx.directions.choose(index, rng);
                let eligible = match direction {
                    Direction::Add => variables.can_add(index)?,
                    Direction::Remove => variables.can_remove(index)?,
                };
                if !eligible {
                    continue;
                }
                let p = ctx.convergence.probability(index)?;
                let preference = match direction {
                    Direction::Add => p,
                    Direction::Remove => 1.0 - p,
                };
                let score = preference + self.config.jitter * rng.uniform();
                candidates.push((VariableContribution::new(index, score), direction));
            }
            candidates
        };
        // ascending, so popping yields the most promising candidate
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut moves = 0;
        while let Some((contribution, direction)) = candidates.pop() {
            let index = contribution.index;
            {
                let mut variables = FlatVariables::new(individual, ctx.definition.variables())?;
                let headroom = match direction {
                    Direction::Add => variables.max_value(index)? - variables.value(index)?,
                    Direction::Remove => variables.value(index)? - variables.min_value(index)?,
                };
                let amount = self.move_amount(&variables, index, headroom, moves, rng)?;
                match direction {
                    Direction::Add => variables.add(index, amount)?,
                    Direction::Remove => variables.remove(index, amount)?,
                }
            }
            moves += 1;
            trace!(index, ?direction, moves, "Repair move");

            if problem.check_constraints(individual) {
                if let Some(bound) = lower_bound {
                    check_lower_bound(individual, problem, bound)?;
                }
                ctx.directions.record(index, direction);
                return Ok(RepairOutcome::Repaired { moves });
            }
        }

        let reverted = rng.bernoulli(self.config.revert_probability);
        if reverted {
            *individual = snapshot;
        }
        debug!(moves, reverted, "Repair exhausted its candidates");
        Ok(RepairOutcome::Failed { reverted })
    }

    fn move_amount(
        &self,
        variables: &FlatVariables<'_>,
        index: usize,
        headroom: f64,
        moves: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<f64> {
        if moves >= self.config.full_move_after {
            return Ok(headroom);
        }
        let share = headroom * rng.uniform();
        let amount = match variables.unit(index)? {
            Some(unit) => (share / unit).ceil().max(1.0) * unit,
            None => share,
        };
        if amount < self.config.rounding_threshold {
            Ok(headroom)
        } else {
            Ok(amount.min(headroom))
        }
    }
}

fn check_lower_bound(
    individual: &mut Individual,
    problem: &dyn Problem,
    bound: f64,
) -> Result<()> {
    let below = individual
        .evaluate(problem)?
        .objectives()
        .iter()
        .copied()
        .find(|v| *v < bound);
    if let Some(value) = below {
        return Err(OptimizationError::InvariantViolation(format!(
            "Repair of individual {} lowered its fitness to {} below the bound {}",
            individual.id(),
            value,
            bound
        )));
    }
    Ok(())
}
