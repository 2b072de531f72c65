use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, info, trace};

use crate::context::SearchContext;
use crate::convergence::{DirectionHeuristic, GuidedConvergence};
use crate::error::{OptimizationError, Result};
use crate::individual::{Fitness, IdGenerator, Individual};
use crate::local_search::{LocalSearch, NelderMead, SimplexWorker};
use crate::multi_objective::EpsilonIndicatorRanking;
use crate::population::{ParentPool, Population};
use crate::problem::{Problem, ProblemDefinition};
use crate::repair::Repairer;
use crate::reproduction::{Reproducer, Reproduction};
use crate::rng::RandomNumberGenerator;

use super::{GenerationReport, LogLevel, Observers, SolverOptions};

/// Initial individuals drawn per population slot before giving up on feasibility.
const INITIAL_ATTEMPTS_PER_SLOT: usize = 10;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct SolverReport {
    /// Best solution found, `None` only if the run was cancelled before initialization.
    pub best: Option<Individual>,
    /// Completed generations.
    pub generations: usize,
    /// Objective evaluations performed by the generational loop.
    pub evaluations: usize,
    /// Offspring discarded because repair could not make them feasible.
    pub repair_failures: usize,
    /// The keep-running flag was cleared.
    pub cancelled: bool,
    /// The run stopped early because the best solution stagnated.
    pub stagnated: bool,
}

/// Counts objective evaluations on their way to the user's problem.
struct CountingProblem<'a> {
    inner: &'a dyn Problem,
    evaluations: AtomicUsize,
}

impl Problem for CountingProblem<'_> {
    fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.inner.evaluate(individual)
    }

    fn check_constraints(&self, individual: &Individual) -> bool {
        self.inner.check_constraints(individual)
    }

    fn repair_lower_bound(&self, individual: &Individual) -> Option<f64> {
        self.inner.repair_lower_bound(individual)
    }
}

#[derive(Debug, Default)]
struct RunState {
    generations: usize,
    repair_failures: usize,
    stagnant: usize,
    last_percent: usize,
}

/// The optimization engine.
///
/// Built with [`SolverBuilder`](super::SolverBuilder). Each call to [`Solver::run`]
/// starts from a fresh population and fresh learning state; identifiers keep counting.
#[derive(Debug)]
pub struct Solver {
    problem: Arc<dyn Problem>,
    definition: Arc<ProblemDefinition>,
    options: SolverOptions,
    reproducer: Reproducer,
    repairer: Repairer,
    local_search: Arc<dyn LocalSearch>,
    simplex: NelderMead,
    observers: Arc<Observers>,
    keep_running: Arc<AtomicBool>,
    ids: Arc<IdGenerator>,
    population: Arc<Mutex<Population>>,
    directions: Arc<DirectionHeuristic>,
    convergence: GuidedConvergence,
    ranking: EpsilonIndicatorRanking,
}

impl Solver {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        problem: Arc<dyn Problem>,
        definition: ProblemDefinition,
        options: SolverOptions,
        reproducer: Reproducer,
        repairer: Repairer,
        local_search: Arc<dyn LocalSearch>,
        simplex: NelderMead,
        observers: Observers,
        keep_running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let mut population = Population::new(
            options.get_population_size(),
            options.get_large_population_capacity(),
        )?;
        population.set_objective_constraints(definition.objective_constraints().to_vec());
        let convergence = GuidedConvergence::new(&definition, options.get_learning_rate())?;
        let directions = DirectionHeuristic::new(definition.variables().len());
        let ranking =
            EpsilonIndicatorRanking::with_constraints(definition.objective_constraints().to_vec());
        Ok(Self {
            problem,
            definition: Arc::new(definition),
            options,
            reproducer,
            repairer,
            local_search,
            simplex,
            observers: Arc::new(observers),
            keep_running,
            ids: Arc::new(IdGenerator::new()),
            population: Arc::new(Mutex::new(population)),
            directions: Arc::new(directions),
            convergence,
            ranking,
        })
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn definition(&self) -> &ProblemDefinition {
        &self.definition
    }

    /// The flag polled once per generation; store `false` to cancel a run.
    pub fn keep_running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.keep_running)
    }

    /// The population of the current or last run.
    pub fn population(&self) -> Arc<Mutex<Population>> {
        Arc::clone(&self.population)
    }

    pub fn directions(&self) -> &DirectionHeuristic {
        &self.directions
    }

    pub fn convergence(&self) -> &GuidedConvergence {
        &self.convergence
    }

    /// Runs the optimization.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPopulation` when no feasible initial individual can be found, and
    /// propagates objective failures and broken invariants. Errors are logged before
    /// being returned.
    pub fn run(&mut self) -> Result<SolverReport> {
        self.execute().map_err(|e| {
            error!(error = %e, "Solver run failed");
            e
        })
    }

    fn execute(&mut self) -> Result<SolverReport> {
        self.reset()?;
        let mut rng = match self.options.get_seed() {
            Some(seed) => RandomNumberGenerator::from_seed(seed),
            None => RandomNumberGenerator::new(),
        };
        let problem = Arc::clone(&self.problem);
        let counting = CountingProblem {
            inner: problem.as_ref(),
            evaluations: AtomicUsize::new(0),
        };
        let mut state = RunState::default();
        let mut worker: Option<SimplexWorker> = None;
        let mut cancelled = false;
        let mut stagnated = false;

        info!(
            generations = self.options.get_num_generations(),
            population = self.options.get_population_size(),
            offspring = self.options.get_num_offspring(),
            "Starting solver"
        );

        if !self.keep_running.load(Ordering::Relaxed) {
            cancelled = true;
        } else {
            self.initialize(&counting, &mut rng, &mut state, &mut worker)?;
        }

        while !cancelled && state.generations < self.options.get_num_generations() {
            if !self.keep_running.load(Ordering::Relaxed) {
                info!(generation = state.generations, "Solver cancelled");
                cancelled = true;
                break;
            }
            let before = self.best_fitness();
            self.generation(&counting, &mut rng, &mut state, &mut worker)?;
            let after = self.best_fitness();
            let improved = match (&before, &after) {
                (None, Some(_)) => true,
                (Some(before), Some(after)) => after.dominates(before),
                _ => false,
            };
            state.stagnant = if improved { 0 } else { state.stagnant + 1 };
            state.generations += 1;

            self.report_generation(
                &mut state,
                after,
                counting.evaluations.load(Ordering::Relaxed),
            );

            if let Some(limit) = self.options.get_max_stagnant_generations() {
                if state.stagnant >= limit {
                    info!(generation = state.generations, limit, "Best solution stagnated");
                    stagnated = true;
                    break;
                }
            }
        }

        if let Some(worker) = worker.take() {
            let report = worker.join()?;
            debug!(
                iterations = report.iterations,
                improvements = report.improvements,
                "Simplex worker joined"
            );
        }

        let best = self.population.lock().best().cloned();
        let evaluations = counting.evaluations.load(Ordering::Relaxed);
        info!(
            generations = state.generations,
            evaluations,
            best = ?best.as_ref().and_then(|b| b.fitness().ok()),
            "Solver finished"
        );
        Ok(SolverReport {
            best,
            generations: state.generations,
            evaluations,
            repair_failures: state.repair_failures,
            cancelled,
            stagnated,
        })
    }

    fn reset(&mut self) -> Result<()> {
        {
            let mut population = self.population.lock();
            population.clear();
            population
                .set_objective_constraints(self.definition.objective_constraints().to_vec());
        }
        self.convergence =
            GuidedConvergence::new(&self.definition, self.options.get_learning_rate())?;
        self.directions = Arc::new(DirectionHeuristic::new(self.definition.variables().len()));
        self.ranking = EpsilonIndicatorRanking::with_constraints(
            self.definition.objective_constraints().to_vec(),
        );
        Ok(())
    }

    fn best_fitness(&self) -> Option<Fitness> {
        self.population
            .lock()
            .best()
            .and_then(|best| best.fitness().ok().cloned())
    }

    /// Random feasible individuals fill the first generation.
    fn initialize(
        &mut self,
        problem: &CountingProblem<'_>,
        rng: &mut RandomNumberGenerator,
        state: &mut RunState,
        worker: &mut Option<SimplexWorker>,
    ) -> Result<()> {
        let size = self.options.get_population_size();
        let empty = ParentPool::default();
        let ctx = SearchContext::new(
            &self.definition,
            &empty,
            &self.convergence,
            &self.directions,
            &self.ids,
        );

        let mut individuals = Vec::with_capacity(size);
        for _ in 0..size * INITIAL_ATTEMPTS_PER_SLOT {
            if individuals.len() == size {
                break;
            }
            let mut individual = self.reproducer.reproduce(&ctx, rng)?;
            if self
                .repairer
                .repair(&mut individual, problem, &ctx, rng)?
                .is_feasible()
            {
                individuals.push(individual);
            } else {
                state.repair_failures += 1;
            }
        }
        if individuals.is_empty() {
            error!(attempts = size * INITIAL_ATTEMPTS_PER_SLOT, "No feasible initial individual");
            return Err(OptimizationError::EmptyPopulation);
        }

        self.evaluate_batch(&mut individuals, problem)?;
        self.integrate(individuals, worker)?;
        self.rank_and_learn()?;
        debug!(
            population = self.population.lock().len(),
            "Initial population ranked"
        );
        Ok(())
    }

    fn generation(
        &mut self,
        problem: &CountingProblem<'_>,
        rng: &mut RandomNumberGenerator,
        state: &mut RunState,
        worker: &mut Option<SimplexWorker>,
    ) -> Result<()> {
        let parents = self.population.lock().snapshot();
        let ctx = SearchContext::new(
            &self.definition,
            &parents,
            &self.convergence,
            &self.directions,
            &self.ids,
        );

        let mut offspring = Vec::with_capacity(self.options.get_num_offspring());
        for _ in 0..self.options.get_num_offspring() {
            let mut child = self.reproducer.reproduce(&ctx, rng)?;
            if !self
                .repairer
                .repair(&mut child, problem, &ctx, rng)?
                .is_feasible()
            {
                state.repair_failures += 1;
                continue;
            }
            if rng.bernoulli(self.options.get_local_search_probability()) {
                let improved = self.local_search.search(&mut child, problem, &ctx, rng)?;
                trace!(id = child.id(), improved, "Local search applied");
            }
            offspring.push(child);
        }

        self.evaluate_batch(&mut offspring, problem)?;
        self.integrate(offspring, worker)?;
        self.rank_and_learn()
    }

    /// Evaluates every unevaluated individual, in parallel for large batches.
    fn evaluate_batch(&self, batch: &mut [Individual], problem: &CountingProblem<'_>) -> Result<()> {
        let pending = batch.iter().filter(|i| !i.is_evaluated()).count();
        let evaluate = |individual: &mut Individual| -> Result<()> {
            if !individual.is_evaluated() {
                individual.evaluate(problem)?;
            }
            Ok(())
        };
        if pending >= self.options.get_parallel_threshold() {
            trace!(pending, "Evaluating batch in parallel");
            batch.par_iter_mut().try_for_each(evaluate)
        } else {
            batch.iter_mut().try_for_each(evaluate)
        }
    }

    /// Stores evaluated individuals and promotes new best solutions.
    fn integrate(
        &self,
        individuals: Vec<Individual>,
        worker: &mut Option<SimplexWorker>,
    ) -> Result<()> {
        for individual in individuals {
            let promoted = {
                let mut population = self.population.lock();
                population.add_individual(individual.clone())?;
                population.cluster_best_solution(&individual)?
            };
            if promoted {
                self.observers.notify_improvement(&individual);
                self.maybe_spawn_simplex(&individual, worker)?;
            }
        }
        Ok(())
    }

    fn maybe_spawn_simplex(
        &self,
        best: &Individual,
        worker: &mut Option<SimplexWorker>,
    ) -> Result<()> {
        if !self.options.get_concurrent_simplex()
            || !self.definition.has_continuous_variables()
            || best.scalar_fitness().is_none()
        {
            return Ok(());
        }
        if worker.as_ref().is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }
        if let Some(finished) = worker.take() {
            let report = finished.join()?;
            debug!(improvements = report.improvements, "Simplex worker finished");
        }

        let observers = Arc::clone(&self.observers);
        *worker = Some(SimplexWorker::spawn(
            self.simplex.clone(),
            best.clone(),
            Arc::clone(&self.problem),
            Arc::clone(&self.definition),
            Arc::clone(&self.ids),
            Arc::clone(&self.population),
            Arc::clone(&self.keep_running),
            move |improved: &Individual| observers.notify_improvement(improved),
        )?);
        Ok(())
    }

    fn rank_and_learn(&mut self) -> Result<()> {
        let mut population = self.population.lock();
        population.rank(&mut self.ranking)?;
        self.convergence.update(population.ranked())
    }

    fn report_generation(&self, state: &mut RunState, best: Option<Fitness>, evaluations: usize) {
        let total = self.options.get_num_generations().max(1);
        let generation = state.generations - 1;
        let population_size = self.population.lock().ranked().len();

        match self.options.get_log_level() {
            LogLevel::Verbose => {
                info!(
                    generation,
                    best = ?best,
                    population = population_size,
                    evaluations,
                    repair_failures = state.repair_failures,
                    "Generation complete"
                );
                for individual in self.population.lock().ranked() {
                    debug!(id = individual.id(), fitness = ?individual.fitness().ok(), "Ranked");
                }
            }
            LogLevel::Minimal => info!(generation, "Generation complete"),
            LogLevel::None => trace!(generation, "Generation complete"),
        }

        let report = GenerationReport {
            generation,
            best_fitness: best,
            population_size,
            evaluations,
            repair_failures: state.repair_failures,
            stagnant_generations: state.stagnant,
        };
        self.observers.notify_generation(&report);

        let percent = state.generations * 100 / total;
        if percent > state.last_percent {
            state.last_percent = percent;
            self.observers.notify_progress(
                &format!("Generation {}/{}", state.generations, total),
                percent as f64,
            );
        }
    }
}
