//! # Population
//!
//! Two stores back a run:
//!
//! - the *large population*, a fixed-capacity buffer of evaluated individuals with holes
//!   while it fills up; once full, a newcomer only enters by evicting the worst slot;
//! - the *ranked population*, the working set of at most `size` individuals (best first)
//!   from which reproduction draws parents.
//!
//! Both stores deduplicate by [`Individual::description`], so the search never cycles on
//! identical solutions.

use std::collections::HashSet;

use tracing::debug;

use crate::distance::DistanceCallback;
use crate::error::{OptimizationError, Result};
use crate::individual::{Fitness, Individual};
use crate::multi_objective::{EpsilonIndicatorRanking, ObjectiveConstraint};

/// Result of [`Population::add_individual`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted(usize),
    /// The buffer was full and the worst stored individual was evicted.
    Replaced(usize),
    Skipped,
}

/// Read-only copy of the ranked population handed to reproduction.
#[derive(Debug, Clone, Default)]
pub struct ParentPool {
    individuals: Vec<Individual>,
    scores: Vec<f64>,
}

impl ParentPool {
    pub fn new(individuals: Vec<Individual>, scores: Vec<f64>) -> Result<Self> {
        if individuals.len() != scores.len() {
            return Err(OptimizationError::Configuration(format!(
                "Parent pool has {} individuals but {} scores",
                individuals.len(),
                scores.len()
            )));
        }
        Ok(Self {
            individuals,
            scores,
        })
    }

    /// Builds a pool ordered by descending scalar fitness. Unevaluated individuals score
    /// `f64::NEG_INFINITY`.
    pub fn from_individuals(mut individuals: Vec<Individual>) -> Self {
        let score = |ind: &Individual| ind.scalar_fitness().unwrap_or(f64::NEG_INFINITY);
        individuals.sort_by(|a, b| score(b).total_cmp(&score(a)));
        let scores = individuals.iter().map(score).collect();
        Self {
            individuals,
            scores,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Selection scores, higher is better, parallel to [`individuals`](Self::individuals).
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn get(&self, index: usize) -> Option<&Individual> {
        self.individuals.get(index)
    }

    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }
}

#[derive(Debug, Clone)]
pub struct Population {
    large: Vec<Option<Individual>>,
    large_scores: Vec<f64>,
    large_descriptions: HashSet<String>,
    filled: usize,
    size: usize,
    ranked: Vec<Individual>,
    scores: Vec<f64>,
    promoted: HashSet<String>,
    best: Option<Individual>,
    objective_constraints: Vec<ObjectiveConstraint>,
}

impl Population {
    /// Creates an empty population.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when `size` is zero or exceeds `capacity`.
    pub fn new(size: usize, capacity: usize) -> Result<Self> {
        if size == 0 {
            return Err(OptimizationError::Configuration(
                "Population size must be greater than 0".to_string(),
            ));
        }
        if capacity < size {
            return Err(OptimizationError::Configuration(format!(
                "Large population capacity {} is smaller than population size {}",
                capacity, size
            )));
        }
        Ok(Self {
            large: vec![None; capacity],
            large_scores: vec![f64::NEG_INFINITY; capacity],
            large_descriptions: HashSet::new(),
            filled: 0,
            size,
            ranked: Vec::with_capacity(size),
            scores: Vec::with_capacity(size),
            promoted: HashSet::new(),
            best: None,
            objective_constraints: Vec::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.large.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of occupied slots of the large population.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Number of individuals in the ranked population.
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty() && self.filled == 0
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    /// Objective windows a promoted best solution must satisfy. [`rank`](Self::rank)
    /// replaces them with the ranking's current, possibly narrowed, windows.
    pub fn set_objective_constraints(&mut self, constraints: Vec<ObjectiveConstraint>) {
        self.objective_constraints = constraints;
    }

    pub fn objective_constraints(&self) -> &[ObjectiveConstraint] {
        &self.objective_constraints
    }

    fn is_feasible(&self, fitness: &Fitness) -> bool {
        self.objective_constraints
            .iter()
            .all(|c| c.is_satisfied(fitness.objectives()))
    }

    /// Stores an evaluated individual in the large population.
    ///
    /// Duplicates (by description) are skipped. When the buffer is full the newcomer
    /// replaces the worst stored individual if its fitness dominates that one's.
    ///
    /// # Errors
    ///
    /// Returns `NotEvaluated` for an individual without fitness.
    pub fn add_individual(&mut self, individual: Individual) -> Result<Insertion> {
        let fitness = individual.fitness()?.clone();
        let description = individual.description();
        if self.large_descriptions.contains(&description) {
            return Ok(Insertion::Skipped);
        }

        if self.filled < self.large.len() {
            let slot = self.filled;
            self.large_scores[slot] = provisional_score(&fitness);
            self.large[slot] = Some(individual);
            self.large_descriptions.insert(description);
            self.filled += 1;
            return Ok(Insertion::Inserted(slot));
        }

        let Some(worst) = self.worst_slot() else {
            return Ok(Insertion::Skipped);
        };
        let worst_fitness = match &self.large[worst] {
            Some(stored) => stored.fitness()?,
            None => return Ok(Insertion::Skipped),
        };
        if !fitness.dominates(worst_fitness) {
            return Ok(Insertion::Skipped);
        }

        if let Some(evicted) = self.large[worst].take() {
            self.large_descriptions.remove(&evicted.description());
        }
        self.large_scores[worst] = provisional_score(&fitness);
        self.large[worst] = Some(individual);
        self.large_descriptions.insert(description);
        Ok(Insertion::Replaced(worst))
    }

    fn worst_slot(&self) -> Option<usize> {
        (0..self.large.len())
            .filter(|&i| self.large[i].is_some())
            .min_by(|&a, &b| self.large_scores[a].total_cmp(&self.large_scores[b]))
    }

    /// Promotes `individual` to the front of the ranked population if it strictly improves
    /// on the best known solution and has not been promoted before.
    ///
    /// With objective constraints set, only individuals inside every window are promoted.
    /// A best solution that fell outside the windows after they narrowed is replaced by
    /// any feasible newcomer.
    pub fn cluster_best_solution(&mut self, individual: &Individual) -> Result<bool> {
        let fitness = individual.fitness()?;
        if !self.is_feasible(fitness) {
            return Ok(false);
        }
        if let Some(best) = &self.best {
            let best_fitness = best.fitness()?;
            if self.is_feasible(best_fitness) && !fitness.dominates(best_fitness) {
                return Ok(false);
            }
        }
        let description = individual.description();
        if !self.promoted.insert(description.clone()) {
            return Ok(false);
        }

        let score = match fitness.scalar() {
            Some(value) => value,
            None => self.scores.first().map_or(0.0, |s| s + 1.0),
        };
        if let Some(position) = self
            .ranked
            .iter()
            .position(|ind| ind.description() == description)
        {
            self.ranked.remove(position);
            self.scores.remove(position);
        }
        self.ranked.insert(0, individual.clone());
        self.scores.insert(0, score);
        self.ranked.truncate(self.size);
        self.scores.truncate(self.size);
        self.best = Some(individual.clone());
        debug!(id = individual.id(), fitness = ?fitness, "New best solution");
        Ok(true)
    }

    /// Rebuilds the ranked population from the large buffer.
    ///
    /// Single-objective problems without objective constraints rank by scalar fitness;
    /// otherwise the epsilon-indicator ranking is used and the score is the negated rank.
    pub fn rank(&mut self, ranking: &mut EpsilonIndicatorRanking) -> Result<()> {
        let occupied: Vec<usize> = (0..self.large.len())
            .filter(|&i| self.large[i].is_some())
            .collect();
        if occupied.is_empty() {
            return Err(OptimizationError::EmptyPopulation);
        }

        let mut objectives = Vec::with_capacity(occupied.len());
        for &slot in &occupied {
            if let Some(individual) = &self.large[slot] {
                objectives.push(individual.fitness()?.objectives().to_vec());
            }
        }

        let scores: Vec<f64> =
            if objectives.iter().all(|o| o.len() == 1) && ranking.constraints().is_empty() {
                objectives.iter().map(|o| o[0]).collect()
            } else {
                ranking
                    .rank(&objectives)?
                    .into_iter()
                    .map(|r| -(r as f64))
                    .collect()
            };
        self.objective_constraints = ranking.constraints().to_vec();
        self.apply_scores(&occupied, &scores);
        Ok(())
    }

    /// Rebuilds the ranked population from explicit per-slot scores.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `scores` is not one value per occupied slot.
    pub fn rank_by_scores(&mut self, scores: &[f64]) -> Result<()> {
        let occupied: Vec<usize> = (0..self.large.len())
            .filter(|&i| self.large[i].is_some())
            .collect();
        if occupied.len() != scores.len() {
            return Err(OptimizationError::Configuration(format!(
                "Expected {} scores, got {}",
                occupied.len(),
                scores.len()
            )));
        }
        self.apply_scores(&occupied, scores);
        Ok(())
    }

    fn apply_scores(&mut self, occupied: &[usize], scores: &[f64]) {
        for (&slot, &score) in occupied.iter().zip(scores) {
            self.large_scores[slot] = score;
        }
        let mut order: Vec<usize> = occupied.to_vec();
        order.sort_by(|&a, &b| {
            self.large_scores[b]
                .total_cmp(&self.large_scores[a])
                .then_with(|| a.cmp(&b))
        });

        self.ranked.clear();
        self.scores.clear();
        let mut seen = HashSet::new();
        for slot in order {
            if self.ranked.len() == self.size {
                break;
            }
            if let Some(individual) = &self.large[slot] {
                if seen.insert(individual.description()) {
                    self.ranked.push(individual.clone());
                    self.scores.push(self.large_scores[slot]);
                }
            }
        }

        // only the ranked set and the current best can be promoted again
        let best = self.best.as_ref().map(Individual::description);
        self.promoted
            .retain(|d| seen.contains(d) || best.as_deref() == Some(d.as_str()));
    }

    /// O(1) lookup in the large population; `None` for holes and out-of-range indices.
    pub fn get_individual_from_large_population(&self, index: usize) -> Option<&Individual> {
        self.large.get(index).and_then(Option::as_ref)
    }

    /// O(1) lookup in the ranked population; `None` when out of range.
    pub fn get_individual_from_population(&self, index: usize) -> Option<&Individual> {
        self.ranked.get(index)
    }

    pub fn large_population(&self) -> impl Iterator<Item = &Individual> {
        self.large.iter().flatten()
    }

    pub fn ranked(&self) -> &[Individual] {
        &self.ranked
    }

    pub fn snapshot(&self) -> ParentPool {
        ParentPool {
            individuals: self.ranked.clone(),
            scores: self.scores.clone(),
        }
    }

    /// Closest other member of the ranked population to `index` under `distance`.
    pub fn nearest_neighbor(
        &self,
        index: usize,
        distance: &DistanceCallback,
    ) -> Result<Option<(usize, f64)>> {
        if index >= self.ranked.len() {
            return Err(crate::error::out_of_range(
                "Population member",
                index,
                self.ranked.len(),
            ));
        }
        let mut nearest: Option<(usize, f64)> = None;
        for other in (0..self.ranked.len()).filter(|&j| j != index) {
            let d = distance.get_distance(index, other)?;
            if nearest.map_or(true, |(_, best)| d < best) {
                nearest = Some((other, d));
            }
        }
        Ok(nearest)
    }

    /// Empties both stores. Objective constraints are kept.
    pub fn clear(&mut self) {
        self.large.iter_mut().for_each(|slot| *slot = None);
        self.large_scores.fill(f64::NEG_INFINITY);
        self.large_descriptions.clear();
        self.filled = 0;
        self.ranked.clear();
        self.scores.clear();
        self.promoted.clear();
        self.best = None;
    }
}

/// Score of a freshly inserted slot until the next ranking pass.
fn provisional_score(fitness: &Fitness) -> f64 {
    fitness.scalar().unwrap_or(f64::NEG_INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Genome;

    fn scored(id: u64, bits: &[bool], fitness: f64) -> Individual {
        let mut ind = Individual::new(id, Genome::Binary(bits.to_vec()));
        ind.set_fitness(Fitness::Scalar(fitness));
        ind
    }

    fn numbered(id: u64, value: i64, fitness: f64) -> Individual {
        let mut ind = Individual::new(id, Genome::Integer(vec![value]));
        ind.set_fitness(Fitness::Scalar(fitness));
        ind
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(Population::new(0, 10).is_err());
        assert!(Population::new(10, 5).is_err());
    }

    #[test]
    fn test_capacity_is_never_exceeded() {
        let mut population = Population::new(2, 4).unwrap();
        for i in 0..10 {
            population.add_individual(numbered(i, i as i64, i as f64)).unwrap();
            assert!(population.filled() <= population.capacity());
        }
        assert_eq!(population.capacity(), 4);
        assert_eq!(population.filled(), 4);
        for slot in 0..4 {
            assert!(population.get_individual_from_large_population(slot).is_some());
        }
        assert!(population.get_individual_from_large_population(4).is_none());

        let mut stored: Vec<f64> = population
            .large_population()
            .filter_map(Individual::scalar_fitness)
            .collect();
        stored.sort_by(f64::total_cmp);
        assert_eq!(stored, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_worse_newcomer_is_skipped_when_full() {
        let mut population = Population::new(1, 2).unwrap();
        population.add_individual(numbered(0, 0, 5.0)).unwrap();
        population.add_individual(numbered(1, 1, 6.0)).unwrap();
        assert_eq!(
            population.add_individual(numbered(2, 2, 1.0)).unwrap(),
            Insertion::Skipped
        );
        assert_eq!(
            population.add_individual(numbered(3, 3, 7.0)).unwrap(),
            Insertion::Replaced(0)
        );
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let mut population = Population::new(2, 4).unwrap();
        assert_eq!(
            population.add_individual(scored(0, &[true], 1.0)).unwrap(),
            Insertion::Inserted(0)
        );
        assert_eq!(
            population.add_individual(scored(1, &[true], 1.0)).unwrap(),
            Insertion::Skipped
        );
    }

    #[test]
    fn test_unevaluated_individual_rejected() {
        let mut population = Population::new(2, 4).unwrap();
        let ind = Individual::new(0, Genome::Binary(vec![false]));
        assert!(population.add_individual(ind).is_err());
    }

    #[test]
    fn test_rank_orders_best_first() {
        let mut population = Population::new(2, 4).unwrap();
        population.add_individual(numbered(0, 0, 1.0)).unwrap();
        population.add_individual(numbered(1, 1, 3.0)).unwrap();
        population.add_individual(numbered(2, 2, 2.0)).unwrap();
        population.rank(&mut EpsilonIndicatorRanking::new()).unwrap();

        assert_eq!(population.len(), 2);
        assert_eq!(population.get_individual_from_population(0).unwrap().id(), 1);
        assert_eq!(population.get_individual_from_population(1).unwrap().id(), 2);
        assert!(population.get_individual_from_population(2).is_none());
        assert_eq!(population.snapshot().scores(), &[3.0, 2.0]);
    }

    #[test]
    fn test_rank_multi_objective_uses_negated_rank() {
        let mut population = Population::new(2, 4).unwrap();
        let mut low = Individual::new(0, Genome::Integer(vec![0]));
        low.set_fitness(Fitness::Vector(vec![1.0, 1.0]));
        let mut high = Individual::new(1, Genome::Integer(vec![1]));
        high.set_fitness(Fitness::Vector(vec![2.0, 2.0]));
        population.add_individual(low).unwrap();
        population.add_individual(high).unwrap();
        population.rank(&mut EpsilonIndicatorRanking::new()).unwrap();

        let snapshot = population.snapshot();
        assert_eq!(snapshot.best().unwrap().id(), 1);
        assert_eq!(snapshot.scores(), &[-1.0, -2.0]);
    }

    #[test]
    fn test_empty_rank_fails() {
        let mut population = Population::new(2, 4).unwrap();
        assert!(matches!(
            population.rank(&mut EpsilonIndicatorRanking::new()),
            Err(OptimizationError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_cluster_best_solution_never_promotes_twice() {
        let mut population = Population::new(3, 6).unwrap();
        let first = numbered(0, 1, 2.0);
        assert!(population.cluster_best_solution(&first).unwrap());
        assert!(!population.cluster_best_solution(&first).unwrap());

        let worse = numbered(1, 2, 1.0);
        assert!(!population.cluster_best_solution(&worse).unwrap());

        let better = numbered(2, 3, 4.0);
        assert!(population.cluster_best_solution(&better).unwrap());
        assert_eq!(population.best().unwrap().id(), 2);
        assert_eq!(population.get_individual_from_population(0).unwrap().id(), 2);
        assert_eq!(population.len(), 2);
    }

    #[test]
    fn test_promoted_set_is_pruned_by_ranking() {
        let mut population = Population::new(3, 6).unwrap();
        for i in 0..50 {
            let individual = numbered(i, i as i64, i as f64);
            assert!(population.cluster_best_solution(&individual).unwrap());
            population.add_individual(individual).unwrap();
        }
        assert_eq!(population.promoted.len(), 50);

        population.rank(&mut EpsilonIndicatorRanking::new()).unwrap();
        assert!(population.promoted.len() <= population.size() + 1);
        assert!(population.promoted.contains(&numbered(49, 49, 49.0).description()));

        // the current best still cannot be promoted twice
        assert!(!population
            .cluster_best_solution(&numbered(49, 49, 49.0))
            .unwrap());
        assert!(population
            .cluster_best_solution(&numbered(50, 50, 50.0))
            .unwrap());
    }

    fn vector(id: u64, value: i64, objectives: &[f64]) -> Individual {
        let mut ind = Individual::new(id, Genome::Integer(vec![value]));
        ind.set_fitness(Fitness::Vector(objectives.to_vec()));
        ind
    }

    #[test]
    fn test_infeasible_individual_is_not_promoted() {
        let mut population = Population::new(3, 6).unwrap();
        population.set_objective_constraints(vec![ObjectiveConstraint::range(0, 0.0, 1.0)]);
        let feasible = vector(0, 0, &[0.5, 0.5]);
        assert!(population.cluster_best_solution(&feasible).unwrap());

        // dominates the best but leaves the window on the first objective
        let outside = vector(1, 1, &[2.0, 2.0]);
        assert!(!population.cluster_best_solution(&outside).unwrap());
        assert_eq!(population.best().unwrap().id(), 0);

        let better = vector(2, 2, &[0.9, 0.9]);
        assert!(population.cluster_best_solution(&better).unwrap());
        assert_eq!(population.best().unwrap().id(), 2);
    }

    #[test]
    fn test_feasible_individual_replaces_infeasible_best() {
        let mut population = Population::new(3, 6).unwrap();
        let early = vector(0, 0, &[3.0, 3.0]);
        assert!(population.cluster_best_solution(&early).unwrap());

        // the windows narrowed after `early` was promoted
        population.set_objective_constraints(vec![ObjectiveConstraint::range(0, 0.0, 1.0)]);
        let dominated = vector(1, 1, &[0.5, 0.5]);
        assert!(population.cluster_best_solution(&dominated).unwrap());
        assert_eq!(population.best().unwrap().id(), 1);
        assert_eq!(population.get_individual_from_population(0).unwrap().id(), 1);
    }

    #[test]
    fn test_rank_adopts_ranking_constraints() {
        let mut population = Population::new(2, 4).unwrap();
        population.add_individual(vector(0, 0, &[0.5, 0.1])).unwrap();
        population.add_individual(vector(1, 1, &[0.2, 0.3])).unwrap();
        let constraint = ObjectiveConstraint::range(0, 0.0, 1.0);
        let mut ranking = EpsilonIndicatorRanking::with_constraints(vec![constraint]);
        population.rank(&mut ranking).unwrap();
        assert_eq!(population.objective_constraints(), ranking.constraints());
        population.clear();
        assert_eq!(population.objective_constraints().len(), 1);
    }

    #[test]
    fn test_nearest_neighbor() {
        let mut population = Population::new(3, 3).unwrap();
        for (i, value) in [0, 10, 3].into_iter().enumerate() {
            population
                .add_individual(numbered(i as u64, value, value as f64))
                .unwrap();
        }
        population.rank(&mut EpsilonIndicatorRanking::new()).unwrap();
        // ranked order: 10, 3, 0
        let values: [f64; 3] = [10.0, 3.0, 0.0];
        let distance = DistanceCallback::with(move |i, j| (values[i] - values[j]).abs());
        assert_eq!(population.nearest_neighbor(2, &distance).unwrap(), Some((1, 3.0)));
        assert!(population
            .nearest_neighbor(0, &DistanceCallback::new())
            .is_err());
    }

    #[test]
    fn test_clear() {
        let mut population = Population::new(1, 2).unwrap();
        population.add_individual(numbered(0, 0, 1.0)).unwrap();
        population.cluster_best_solution(&numbered(0, 0, 1.0)).unwrap();
        population.clear();
        assert!(population.is_empty());
        assert!(population.best().is_none());
        assert!(population.get_individual_from_large_population(0).is_none());
    }
}
