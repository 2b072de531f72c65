use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use heuropt::{
    caching::CachedProblem,
    constraints::{
        CardinalityConstraint, ConstrainedProblem, ConstraintSet, WeightCapacityConstraint,
    },
    repair::RepairConfig,
    solver::{LogLevel, SolverBuilder, SolverOptions},
    Fitness, Individual, Problem, ProblemDefinition, Representation, Result,
};

const VALUES: [f64; 10] = [10.0, 13.0, 7.0, 8.0, 4.0, 12.0, 9.0, 3.0, 11.0, 6.0];
const WEIGHTS: [f64; 10] = [5.0, 7.0, 3.0, 4.0, 2.0, 6.0, 5.0, 1.0, 6.0, 3.0];
const CAPACITY: f64 = 20.0;

#[derive(Debug, Clone)]
struct Knapsack;

impl Problem for Knapsack {
    fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
        let value: f64 = individual
            .variables()
            .iter()
            .zip(VALUES)
            .map(|(x, v)| x * v)
            .sum();
        Ok(Fitness::Scalar(value))
    }
}

fn capacity_constraint() -> WeightCapacityConstraint {
    WeightCapacityConstraint::new("capacity", WEIGHTS.to_vec(), CAPACITY).unwrap()
}

fn constrained() -> ConstrainedProblem<Knapsack> {
    let constraints = ConstraintSet::builder()
        .with_constraint(capacity_constraint())
        .build();
    ConstrainedProblem::new(Knapsack, constraints)
}

/// Exhaustive optimum over all 2^10 subsets.
fn brute_force_optimum() -> f64 {
    (0u32..1 << 10)
        .filter_map(|mask| {
            let chosen = (0..10).filter(|i| mask & (1 << i) != 0);
            let (weight, value) = chosen.fold((0.0, 0.0), |(w, v), i| {
                (w + WEIGHTS[i], v + VALUES[i])
            });
            (weight <= CAPACITY).then_some(value)
        })
        .fold(0.0, f64::max)
}

fn options(seed: u64) -> SolverOptions {
    SolverOptions::builder()
        .num_generations(60)
        .population_size(30)
        .large_population_capacity(120)
        .num_offspring(30)
        .local_search_probability(0.2)
        .seed(seed)
        .build()
}

fn solve(seed: u64) -> Individual {
    let mut solver = SolverBuilder::new()
        .with_problem(constrained())
        .with_definition(ProblemDefinition::new(Representation::binary(10)).unwrap())
        .with_options(options(seed))
        .build()
        .unwrap();
    solver.run().unwrap().best.unwrap()
}

#[test]
fn test_knapsack_close_to_optimum() {
    let best = solve(17);
    let optimum = brute_force_optimum();
    assert!(capacity_constraint().weight_of(&best) <= CAPACITY);
    assert!(best.scalar_fitness().unwrap() >= 0.9 * optimum);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let first = solve(42);
    let second = solve(42);
    assert_eq!(first.genome(), second.genome());
    assert_eq!(first.scalar_fitness(), second.scalar_fitness());
}

#[test]
fn test_every_ranked_individual_is_feasible() {
    let problem = constrained();
    let mut solver = SolverBuilder::new()
        .with_problem(problem.clone())
        .with_definition(ProblemDefinition::new(Representation::binary(10)).unwrap())
        .with_options(options(3))
        .with_repair(RepairConfig::default())
        .build()
        .unwrap();
    solver.run().unwrap();

    let population = solver.population();
    let population = population.lock();
    assert!(!population.ranked().is_empty());
    for individual in population.ranked() {
        assert!(problem.check_constraints(individual));
    }
}

#[test]
fn test_cardinality_and_capacity_combined() {
    let constraints = ConstraintSet::builder()
        .with_constraint(capacity_constraint())
        .with_constraint(CardinalityConstraint::new("at most three", 0, 3).unwrap())
        .build();
    let problem = ConstrainedProblem::new(Knapsack, constraints);
    let mut solver = SolverBuilder::new()
        .with_problem(problem.clone())
        .with_definition(ProblemDefinition::new(Representation::binary(10)).unwrap())
        .with_options(options(8))
        .build()
        .unwrap();
    let best = solver.run().unwrap().best.unwrap();
    assert!(problem.check_constraints(&best));
    assert!(best.variables().iter().filter(|x| **x != 0.0).count() <= 3);
}

#[derive(Debug, Clone, Default)]
struct CountingKnapsack {
    calls: Arc<AtomicUsize>,
}

impl Problem for CountingKnapsack {
    fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Knapsack.evaluate(individual)
    }

    fn check_constraints(&self, individual: &Individual) -> bool {
        capacity_constraint().weight_of(individual) <= CAPACITY
    }
}

#[test]
fn test_cache_saves_evaluations() {
    let cached = CachedProblem::new(CountingKnapsack::default());
    let shared: Arc<dyn Problem> = Arc::new(cached.clone());
    let mut solver = SolverBuilder::new()
        .with_shared_problem(shared)
        .with_definition(ProblemDefinition::new(Representation::binary(10)).unwrap())
        .with_options(options(5))
        .build()
        .unwrap();
    let report = solver.run().unwrap();

    let stats = cached.stats();
    let inner_calls = cached.inner().calls.load(Ordering::SeqCst);
    assert_eq!(inner_calls, stats.misses);
    assert_eq!(stats.hits + stats.misses, report.evaluations);
    // 1024 distinct subsets bound the number of real evaluations.
    assert!(inner_calls <= 1024);
    assert!(stats.hits > 0);
}

#[test]
fn test_verbose_logging_run() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    let mut solver = SolverBuilder::new()
        .with_problem(constrained())
        .with_definition(ProblemDefinition::new(Representation::binary(10)).unwrap())
        .with_options(
            SolverOptions::builder()
                .num_generations(3)
                .population_size(5)
                .large_population_capacity(10)
                .num_offspring(5)
                .log_level(LogLevel::Verbose)
                .seed(1)
                .build(),
        )
        .build()
        .unwrap();
    let report = solver.run().unwrap();
    assert_eq!(report.generations, 3);
}
