//! Add/remove/swap neighborhood search on the flat variables.

use tracing::trace;

use crate::context::SearchContext;
use crate::convergence::{SearchDirection, VariableContribution};
use crate::error::{OptimizationError, Result};
use crate::individual::Individual;
use crate::local_search::{ensure_evaluated, LocalSearch};
use crate::problem::Problem;
use crate::repair::{FlatVariables, WeightedVariables};
use crate::rng::RandomNumberGenerator;

/// How many neighbors are examined before a move is committed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeighborhoodVariant {
    /// Commits the first improving move; each ranked candidate is paired with one
    /// swap partner of the same rank.
    #[default]
    Simple,
    /// Tries every candidate against every swap partner and commits the best move.
    Expensive,
}

/// Neighborhood search.
///
/// The *included* set holds variables that can still be decreased, the *excluded* set
/// variables that can still be increased. A forward search adds to excluded variables
/// and, when adding alone does not pay off, swaps with an included one. A backward
/// search does the opposite. Candidates are ranked by their guided-convergence
/// probability scaled by a uniform draw.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct NeighborhoodSearch {
    variant: NeighborhoodVariant,
    max_iterations: usize,
    /// Step of continuous variables as a fraction of their range.
    continuous_step: f64,
}

#[derive(Debug, Clone, Copy)]
struct Move {
    primary: usize,
    partner: Option<usize>,
}

impl NeighborhoodSearch {
    /// Creates a neighborhood search that commits at most `max_iterations` moves.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iterations` is 0.
    pub fn new(variant: NeighborhoodVariant, max_iterations: usize) -> Result<Self> {
        if max_iterations == 0 {
            return Err(OptimizationError::Configuration(
                "Maximum iterations must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            variant,
            max_iterations,
            continuous_step: 0.1,
        })
    }

    /// Sets the step of continuous variables, as a fraction of their range.
    ///
    /// # Errors
    ///
    /// Returns an error unless `step` lies in `(0, 1]`.
    pub fn with_continuous_step(mut self, step: f64) -> Result<Self> {
        if !(step > 0.0 && step <= 1.0) {
            return Err(OptimizationError::Configuration(
                "Continuous step must be in (0.0, 1.0]".to_string(),
            ));
        }
        self.continuous_step = step;
        Ok(self)
    }

    pub fn variant(&self) -> NeighborhoodVariant {
        self.variant
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Included and excluded variables, each sorted most promising first.
    fn ranked_sets(
        &self,
        individual: &mut Individual,
        ctx: &SearchContext<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let variables = FlatVariables::new(individual, ctx.definition.variables())?;
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for index in 0..variables.len() {
            let p = ctx.convergence.probability(index)?;
            if variables.can_remove(index)? {
                included.push(VariableContribution::new(index, (1.0 - p) * rng.uniform()));
            }
            if variables.can_add(index)? {
                excluded.push(VariableContribution::new(index, p * rng.uniform()));
            }
        }
        included.sort_by(|a, b| b.cmp(a));
        excluded.sort_by(|a, b| b.cmp(a));
        Ok((
            included.into_iter().map(|c| c.index).collect(),
            excluded.into_iter().map(|c| c.index).collect(),
        ))
    }

    /// Applies a move to a copy of `base`. Returns the evaluated neighbor, or `None` when
    /// it violates a constraint.
    fn neighbor(
        &self,
        base: &Individual,
        mv: Move,
        direction: SearchDirection,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
    ) -> Result<Option<Individual>> {
        let mut candidate = base.clone();
        {
            let mut variables = FlatVariables::new(&mut candidate, ctx.definition.variables())?;
            let primary_step = self.step(&variables, mv.primary)?;
            match direction {
                SearchDirection::Forward => variables.add(mv.primary, primary_step)?,
                SearchDirection::Backward => variables.remove(mv.primary, primary_step)?,
            }
            if let Some(partner) = mv.partner {
                let partner_step = self.step(&variables, partner)?;
                match direction {
                    SearchDirection::Forward => variables.remove(partner, partner_step)?,
                    SearchDirection::Backward => variables.add(partner, partner_step)?,
                }
            }
        }
        candidate.invalidate();
        if !problem.check_constraints(&candidate) {
            return Ok(None);
        }
        candidate.evaluate(problem)?;
        Ok(Some(candidate))
    }

    fn step(&self, variables: &FlatVariables<'_>, index: usize) -> Result<f64> {
        Ok(match variables.unit(index)? {
            Some(unit) => unit,
            None => self.continuous_step * (variables.max_value(index)? - variables.min_value(index)?),
        })
    }

    /// Returns the neighbor when it is strictly better than `incumbent`.
    fn improving(
        &self,
        base: &Individual,
        incumbent: &Individual,
        mv: Move,
        direction: SearchDirection,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
    ) -> Result<Option<Individual>> {
        Ok(match self.neighbor(base, mv, direction, problem, ctx)? {
            Some(candidate) if candidate.fitness()?.dominates(incumbent.fitness()?) => {
                Some(candidate)
            }
            _ => None,
        })
    }

    fn first_improvement(
        &self,
        current: &Individual,
        primaries: &[usize],
        partners: &[usize],
        direction: SearchDirection,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
    ) -> Result<Option<Individual>> {
        for (rank, &primary) in primaries.iter().enumerate() {
            let single = Move {
                primary,
                partner: None,
            };
            if let Some(better) = self.improving(current, current, single, direction, problem, ctx)? {
                return Ok(Some(better));
            }
            if let Some(&partner) = partners.get(rank).filter(|&&p| p != primary) {
                let swap = Move {
                    primary,
                    partner: Some(partner),
                };
                if let Some(better) =
                    self.improving(current, current, swap, direction, problem, ctx)?
                {
                    return Ok(Some(better));
                }
            }
        }
        Ok(None)
    }

    fn best_improvement(
        &self,
        current: &Individual,
        primaries: &[usize],
        partners: &[usize],
        direction: SearchDirection,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
    ) -> Result<Option<Individual>> {
        let mut best: Option<Individual> = None;
        for &primary in primaries {
            let moves = std::iter::once(None)
                .chain(partners.iter().filter(|&&p| p != primary).map(|&p| Some(p)));
            for partner in moves {
                let mv = Move { primary, partner };
                let incumbent = best.as_ref().unwrap_or(current);
                if let Some(better) = self.improving(current, incumbent, mv, direction, problem, ctx)? {
                    best = Some(better);
                }
            }
        }
        Ok(best)
    }
}

impl LocalSearch for NeighborhoodSearch {
    fn search(
        &self,
        individual: &mut Individual,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<bool> {
        ensure_evaluated(individual, problem)?;
        if ctx.definition.variables().is_empty() {
            return Ok(false);
        }

        let direction = ctx.directions.choose_search(rng);
        let mut moves = 0;
        for _ in 0..self.max_iterations {
            let (included, excluded) = self.ranked_sets(individual, ctx, rng)?;
            let (primaries, partners) = match direction {
                SearchDirection::Forward => (excluded, included),
                SearchDirection::Backward => (included, excluded),
            };
            let next = match self.variant {
                NeighborhoodVariant::Simple => {
                    self.first_improvement(individual, &primaries, &partners, direction, problem, ctx)?
                }
                NeighborhoodVariant::Expensive => {
                    self.best_improvement(individual, &primaries, &partners, direction, problem, ctx)?
                }
            };
            match next {
                Some(better) => {
                    *individual = better;
                    moves += 1;
                }
                None => break,
            }
        }

        trace!(?direction, moves, "Neighborhood search finished");
        if moves > 0 {
            ctx.directions.record_search(direction);
        }
        Ok(moves > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::{Fitness, Genome};
    use crate::problem::{ProblemDefinition, Representation};
    use crate::reproduction::test_support::Fixture;

    const VALUES: [f64; 4] = [1.0, 5.0, 3.0, 4.0];

    /// Four items of weight 2 with room for two of them.
    struct PairKnapsack;

    impl Problem for PairKnapsack {
        fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
            let value = individual
                .variables()
                .iter()
                .zip(VALUES)
                .map(|(x, v)| x * v)
                .sum();
            Ok(Fitness::Scalar(value))
        }

        fn check_constraints(&self, individual: &Individual) -> bool {
            individual.variables().iter().sum::<f64>() <= 2.0
        }
    }

    fn fixture() -> Fixture {
        Fixture::new(ProblemDefinition::new(Representation::binary(4)).unwrap(), 6, 21)
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(NeighborhoodSearch::new(NeighborhoodVariant::Simple, 0).is_err());
        let search = NeighborhoodSearch::new(NeighborhoodVariant::Simple, 5).unwrap();
        assert!(search.with_continuous_step(0.0).is_err());
    }

    #[test]
    fn test_expensive_search_reaches_optimum() {
        let fixture = fixture();
        let ctx = fixture.context();
        let search = NeighborhoodSearch::new(NeighborhoodVariant::Expensive, 10).unwrap();
        for seed in 0..10 {
            let mut rng = RandomNumberGenerator::from_seed(seed);
            let mut individual = Individual::new(0, Genome::Binary(vec![true, false, false, true]));
            let improved = search
                .search(&mut individual, &PairKnapsack, &ctx, &mut rng)
                .unwrap();
            assert!(improved);
            assert_eq!(individual.scalar_fitness(), Some(9.0));
            assert!(PairKnapsack.check_constraints(&individual));
        }
    }

    #[test]
    fn test_simple_search_never_worsens() {
        let fixture = fixture();
        let ctx = fixture.context();
        let search = NeighborhoodSearch::new(NeighborhoodVariant::Simple, 10).unwrap();
        for seed in 0..10 {
            let mut rng = RandomNumberGenerator::from_seed(seed);
            let mut individual = Individual::new(0, Genome::Binary(vec![true, false, false, true]));
            let improved = search
                .search(&mut individual, &PairKnapsack, &ctx, &mut rng)
                .unwrap();
            let value = individual.scalar_fitness().unwrap();
            assert!(value >= 5.0);
            assert_eq!(improved, value > 5.0);
            assert!(PairKnapsack.check_constraints(&individual));
        }
    }

    #[test]
    fn test_improvement_reinforces_direction() {
        let fixture = fixture();
        let ctx = fixture.context();
        let search = NeighborhoodSearch::new(NeighborhoodVariant::Expensive, 10).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(8);
        let mut individual = Individual::new(0, Genome::Binary(vec![true, false, false, true]));
        search
            .search(&mut individual, &PairKnapsack, &ctx, &mut rng)
            .unwrap();
        let (forward, backward) = fixture.directions.search_tallies();
        assert_eq!(forward + backward, 1);
    }

    #[test]
    fn test_local_optimum_is_left_alone() {
        let fixture = fixture();
        let ctx = fixture.context();
        let search = NeighborhoodSearch::new(NeighborhoodVariant::Expensive, 10).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(2);
        let mut individual = Individual::new(0, Genome::Binary(vec![false, true, false, true]));
        let original = individual.genome().clone();
        let improved = search
            .search(&mut individual, &PairKnapsack, &ctx, &mut rng)
            .unwrap();
        assert!(!improved);
        assert_eq!(individual.genome(), &original);
        assert_eq!(individual.scalar_fitness(), Some(9.0));
        assert_eq!(fixture.directions.search_tallies(), (0, 0));
    }
}
