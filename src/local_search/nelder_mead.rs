//! Downhill simplex (Nelder–Mead) refinement of continuous variables.
//!
//! The simplex minimizes; individuals are refined by minimizing their negated scalar
//! fitness. Vertices outside the variable bounds or violating a constraint take the
//! value `f64::MAX` without being evaluated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::context::SearchContext;
use crate::error::{OptimizationError, Result};
use crate::individual::{Fitness, IdGenerator, Individual};
use crate::local_search::{ensure_evaluated, LocalSearch};
use crate::population::Population;
use crate::problem::{Problem, ProblemDefinition, VariableKind};
use crate::rng::RandomNumberGenerator;

/// Simplex coefficients and stopping rules.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iterations: usize,
    /// Stop once every vertex lies within this distance of the best one.
    pub tolerance: f64,
    /// Initial edge length as a fraction of each variable's range.
    pub initial_step: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
            initial_step: 0.05,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
        }
    }
}

impl NelderMeadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(OptimizationError::Configuration(
                "Maximum iterations must be greater than 0".to_string(),
            ));
        }
        if !(self.tolerance > 0.0 && self.initial_step > 0.0 && self.initial_step <= 1.0) {
            return Err(OptimizationError::Configuration(
                "Tolerance must be positive and the initial step in (0.0, 1.0]".to_string(),
            ));
        }
        let unit = |c: f64| c > 0.0 && c < 1.0;
        if !(self.reflection > 0.0
            && self.expansion > 1.0
            && unit(self.contraction)
            && unit(self.shrink))
        {
            return Err(OptimizationError::Configuration(format!(
                "Invalid simplex coefficients: reflection {}, expansion {}, contraction {}, shrink {}",
                self.reflection, self.expansion, self.contraction, self.shrink
            )));
        }
        Ok(())
    }
}

/// Outcome of a raw minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    /// Whether the simplex collapsed below the tolerance.
    pub converged: bool,
    /// Longest distance from the best vertex to any other vertex at exit.
    pub longest_edge: f64,
}

#[derive(Debug, Clone)]
struct Vertex {
    point: Vec<f64>,
    value: f64,
}

fn in_bounds(point: &[f64], bounds: &[(f64, f64)]) -> bool {
    point
        .iter()
        .zip(bounds)
        .all(|(&x, &(lo, hi))| x >= lo && x <= hi)
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// `from + coefficient · (to − from)`
fn along(from: &[f64], to: &[f64], coefficient: f64) -> Vec<f64> {
    from.iter()
        .zip(to)
        .map(|(f, t)| f + coefficient * (t - f))
        .collect()
}

struct Simplex<'a, F> {
    config: &'a NelderMeadConfig,
    bounds: &'a [(f64, f64)],
    objective: F,
}

impl<F> Simplex<'_, F>
where
    F: FnMut(&[f64]) -> Result<f64>,
{
    fn vertex(&mut self, point: Vec<f64>) -> Result<Vertex> {
        let value = if in_bounds(&point, self.bounds) {
            (self.objective)(&point)?
        } else {
            f64::MAX
        };
        Ok(Vertex { point, value })
    }

    fn initial(&mut self, start: &[f64]) -> Result<Vec<Vertex>> {
        let mut vertices = Vec::with_capacity(start.len() + 1);
        vertices.push(self.vertex(start.to_vec())?);
        for (i, &(lo, hi)) in self.bounds.iter().enumerate() {
            let step = self.config.initial_step * (hi - lo);
            let mut point = start.to_vec();
            point[i] = if point[i] + step <= hi {
                point[i] + step
            } else {
                point[i] - step
            };
            vertices.push(self.vertex(point)?);
        }
        Ok(vertices)
    }

    fn run<O>(
        &mut self,
        start: &[f64],
        mut on_improvement: O,
        keep_running: &dyn Fn() -> bool,
    ) -> Result<Minimum>
    where
        O: FnMut(&[f64], f64) -> Result<()>,
    {
        let n = start.len();
        let mut vertices = self.initial(start)?;
        let by_value = |a: &Vertex, b: &Vertex| a.value.total_cmp(&b.value);
        vertices.sort_by(by_value);
        let mut best_value = vertices[0].value;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations && keep_running() {
            vertices.sort_by(by_value);
            if vertices[0].value < best_value {
                best_value = vertices[0].value;
                on_improvement(&vertices[0].point, best_value)?;
            }
            if longest_edge(&vertices) < self.config.tolerance {
                converged = true;
                break;
            }
            iterations += 1;

            let mut centroid = vec![0.0; n];
            for vertex in &vertices[..n] {
                for (c, x) in centroid.iter_mut().zip(&vertex.point) {
                    *c += x / n as f64;
                }
            }
            let worst = &vertices[n];
            let reflected =
                self.vertex(along(&centroid, &worst.point, -self.config.reflection))?;

            if reflected.value < vertices[0].value {
                let expanded =
                    self.vertex(along(&centroid, &reflected.point, self.config.expansion))?;
                vertices[n] = if expanded.value < reflected.value {
                    expanded
                } else {
                    reflected
                };
                continue;
            }
            if reflected.value < vertices[n - 1].value {
                vertices[n] = reflected;
                continue;
            }

            let contracted = if reflected.value < vertices[n].value {
                let outside =
                    self.vertex(along(&centroid, &reflected.point, self.config.contraction))?;
                (outside.value <= reflected.value).then_some(outside)
            } else {
                let inside =
                    self.vertex(along(&centroid, &vertices[n].point, self.config.contraction))?;
                (inside.value < vertices[n].value).then_some(inside)
            };
            match contracted {
                Some(vertex) => vertices[n] = vertex,
                None => {
                    let best = vertices[0].point.clone();
                    for i in 1..=n {
                        let point = along(&best, &vertices[i].point, self.config.shrink);
                        vertices[i] = self.vertex(point)?;
                    }
                }
            }
        }

        vertices.sort_by(by_value);
        if vertices[0].value < best_value {
            on_improvement(&vertices[0].point, vertices[0].value)?;
        }
        let longest_edge = longest_edge(&vertices);
        let best = vertices.swap_remove(0);
        Ok(Minimum {
            point: best.point,
            value: best.value,
            iterations,
            converged,
            longest_edge,
        })
    }
}

fn longest_edge(vertices: &[Vertex]) -> f64 {
    vertices[1..]
        .iter()
        .map(|v| distance(&v.point, &vertices[0].point))
        .fold(0.0, f64::max)
}

fn check_dimensions(start: &[f64], bounds: &[(f64, f64)]) -> Result<()> {
    if start.len() != bounds.len() {
        return Err(OptimizationError::Configuration(format!(
            "Start point has {} coordinates but {} bounds were given",
            start.len(),
            bounds.len()
        )));
    }
    if let Some(i) = bounds
        .iter()
        .position(|(lo, hi)| !(lo.is_finite() && hi.is_finite() && lo < hi))
    {
        return Err(OptimizationError::Configuration(format!(
            "Bound {} is not a finite, non-empty interval",
            i
        )));
    }
    Ok(())
}

/// Minimizes `objective` inside the box `bounds`, starting from `start`.
///
/// # Examples
///
/// ```rust
/// use heuropt::local_search::{minimize, NelderMeadConfig};
///
/// let minimum = minimize(
///     |p| (p[0] - 0.2).powi(2) + p[1] * p[1],
///     &[0.5, 0.5],
///     &[(-1.0, 1.0), (-1.0, 1.0)],
///     &NelderMeadConfig::default(),
/// )
/// .unwrap();
/// assert!((minimum.point[0] - 0.2).abs() < 1e-3);
/// ```
///
/// # Errors
///
/// Returns a `Configuration` error for invalid settings, mismatched dimensions or
/// empty bounds.
pub fn minimize<F>(
    mut objective: F,
    start: &[f64],
    bounds: &[(f64, f64)],
    config: &NelderMeadConfig,
) -> Result<Minimum>
where
    F: FnMut(&[f64]) -> f64,
{
    config.validate()?;
    check_dimensions(start, bounds)?;
    if start.is_empty() {
        return Ok(Minimum {
            point: Vec::new(),
            value: objective(start),
            iterations: 0,
            converged: true,
            longest_edge: 0.0,
        });
    }
    let mut simplex = Simplex {
        config,
        bounds,
        objective: |p: &[f64]| -> Result<f64> { Ok(objective(p)) },
    };
    simplex.run(start, |_, _| Ok(()), &|| true)
}

/// Receives every new global best found while a simplex runs.
pub trait ImprovementSink {
    fn improved(&mut self, individual: &Individual) -> Result<()>;
}

impl<F> ImprovementSink for F
where
    F: FnMut(&Individual) -> Result<()>,
{
    fn improved(&mut self, individual: &Individual) -> Result<()> {
        self(individual)
    }
}

/// Result of refining one individual.
#[derive(Debug, Clone, Default)]
pub struct SimplexReport {
    pub iterations: usize,
    pub converged: bool,
    /// Number of global-best improvements passed to the sink.
    pub improvements: usize,
    /// The refined individual when it beats the starting point.
    pub best: Option<Individual>,
}

/// Nelder–Mead local search over the continuous flat variables of an individual.
///
/// Binary, integer and tree content is held fixed, so composite individuals are refined
/// on their continuous children only. Multi-objective individuals are left alone.
#[derive(Debug, Clone, Default)]
pub struct NelderMead {
    config: NelderMeadConfig,
}

impl NelderMead {
    pub fn new(config: NelderMeadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NelderMeadConfig {
        &self.config
    }

    /// Runs the simplex from an evaluated individual.
    ///
    /// The starting individual is not modified. Each new best is rebuilt as a fresh
    /// individual (new id, fitness set) and handed to `sink`.
    ///
    /// # Errors
    ///
    /// Returns `NotEvaluated` for an unevaluated start and propagates objective errors.
    pub fn refine(
        &self,
        start: &Individual,
        problem: &dyn Problem,
        definition: &ProblemDefinition,
        ids: &IdGenerator,
        keep_running: &dyn Fn() -> bool,
        sink: &mut dyn ImprovementSink,
    ) -> Result<SimplexReport> {
        let Some(start_fitness) = start.fitness()?.scalar() else {
            return Ok(SimplexReport::default());
        };
        let indices: Vec<usize> = definition
            .variables()
            .iter()
            .enumerate()
            .filter(|(_, info)| info.kind == VariableKind::Continuous)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Ok(SimplexReport::default());
        }

        let bounds: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| {
                let info = &definition.variables()[i];
                (info.min, info.max)
            })
            .collect();
        let point = indices
            .iter()
            .map(|&i| start.variable(i))
            .collect::<Result<Vec<f64>>>()?;
        check_dimensions(&point, &bounds)?;

        let place = |point: &[f64], individual: &mut Individual| -> Result<()> {
            for (&index, &value) in indices.iter().zip(point) {
                individual.set_variable(index, value)?;
            }
            Ok(())
        };
        let objective = |point: &[f64]| -> Result<f64> {
            let mut candidate = start.clone();
            place(point, &mut candidate)?;
            if !problem.check_constraints(&candidate) {
                return Ok(f64::MAX);
            }
            let value = candidate.evaluate(problem)?.scalar().ok_or_else(|| {
                OptimizationError::FitnessCalculation(
                    "Simplex refinement needs a scalar fitness".to_string(),
                )
            })?;
            Ok(-value)
        };

        let mut improvements = 0;
        let mut simplex = Simplex {
            config: &self.config,
            bounds: &bounds,
            objective,
        };
        let on_improvement = |point: &[f64], value: f64| -> Result<()> {
            if -value <= start_fitness {
                return Ok(());
            }
            let mut candidate = start.clone_fresh(ids);
            place(point, &mut candidate)?;
            candidate.set_fitness(Fitness::Scalar(-value));
            improvements += 1;
            sink.improved(&candidate)
        };
        let minimum = simplex.run(&point, on_improvement, keep_running)?;

        let best = if -minimum.value > start_fitness {
            let mut refined = start.clone();
            place(&minimum.point, &mut refined)?;
            refined.set_fitness(Fitness::Scalar(-minimum.value));
            Some(refined)
        } else {
            None
        };
        debug!(
            iterations = minimum.iterations,
            converged = minimum.converged,
            improvements,
            "Simplex refinement finished"
        );
        Ok(SimplexReport {
            iterations: minimum.iterations,
            converged: minimum.converged,
            improvements,
            best,
        })
    }
}

impl LocalSearch for NelderMead {
    fn search(
        &self,
        individual: &mut Individual,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
        _rng: &mut RandomNumberGenerator,
    ) -> Result<bool> {
        ensure_evaluated(individual, problem)?;
        let mut ignore = |_: &Individual| -> Result<()> { Ok(()) };
        let report = self.refine(
            individual,
            problem,
            ctx.definition,
            ctx.ids,
            &|| true,
            &mut ignore,
        )?;
        match report.best {
            Some(best) => {
                *individual = best;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A simplex refinement running on its own thread.
///
/// Every new best is stored in the shared population and promoted with
/// [`Population::cluster_best_solution`]; promoted individuals are passed to the
/// improvement callback. The worker stops at convergence, when its budget runs out, or
/// when either the run's keep-running flag or its own stop flag is cleared.
#[derive(Debug)]
pub struct SimplexWorker {
    handle: Option<JoinHandle<Result<SimplexReport>>>,
    stop: Arc<AtomicBool>,
}

impl SimplexWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn<F>(
        search: NelderMead,
        start: Individual,
        problem: Arc<dyn Problem>,
        definition: Arc<ProblemDefinition>,
        ids: Arc<IdGenerator>,
        population: Arc<Mutex<Population>>,
        keep_running: Arc<AtomicBool>,
        on_improvement: F,
    ) -> Result<Self>
    where
        F: Fn(&Individual) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("simplex".to_string())
            .spawn(move || {
                info!(id = start.id(), "Simplex worker started");
                let running =
                    || keep_running.load(Ordering::Relaxed) && !stopped.load(Ordering::Relaxed);
                let mut sink = |candidate: &Individual| -> Result<()> {
                    let mut population = population.lock();
                    population.add_individual(candidate.clone())?;
                    if population.cluster_best_solution(candidate)? {
                        drop(population);
                        on_improvement(candidate);
                    }
                    Ok(())
                };
                let report = search.refine(
                    &start,
                    problem.as_ref(),
                    &definition,
                    &ids,
                    &running,
                    &mut sink,
                );
                match &report {
                    Ok(report) => info!(
                        iterations = report.iterations,
                        improvements = report.improvements,
                        "Simplex worker finished"
                    ),
                    Err(e) => warn!(error = %e, "Simplex worker failed"),
                }
                report
            })?;
        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Asks the worker to stop after its current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stops the worker and waits for it.
    ///
    /// # Errors
    ///
    /// Returns `Concurrency` if the worker panicked, or the error it failed with.
    pub fn join(mut self) -> Result<SimplexReport> {
        self.stop();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                OptimizationError::Concurrency("Simplex worker panicked".to_string())
            })?,
            None => Ok(SimplexReport::default()),
        }
    }
}

impl Drop for SimplexWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Genome;
    use crate::problem::Representation;
    use crate::reproduction::test_support::Fixture;
    use std::sync::atomic::AtomicUsize;

    /// Maximizes `-(x² + y²)`.
    struct Bowl;

    impl Problem for Bowl {
        fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
            let v = individual.variables();
            Ok(Fitness::Scalar(-(v[0] * v[0] + v[1] * v[1])))
        }
    }

    fn bowl_definition() -> ProblemDefinition {
        ProblemDefinition::new(Representation::continuous_bounded(vec![(-1.0, 1.0); 2])).unwrap()
    }

    fn start() -> Individual {
        let mut individual = Individual::new(0, Genome::Continuous(vec![0.5, 0.5]));
        individual.evaluate(&Bowl).unwrap();
        individual
    }

    #[test]
    fn test_minimize_converges_on_paraboloid() {
        let minimum = minimize(
            |p| p[0] * p[0] + p[1] * p[1],
            &[0.5, 0.5],
            &[(-1.0, 1.0), (-1.0, 1.0)],
            &NelderMeadConfig::default(),
        )
        .unwrap();
        assert!(minimum.converged);
        assert!(minimum.longest_edge < 1e-6);
        assert!(minimum.iterations <= 1000);
        assert!(minimum.point.iter().all(|x| x.abs() < 1e-3));
    }

    #[test]
    fn test_out_of_bounds_vertices_are_rejected() {
        let mut evaluated_outside = false;
        let minimum = minimize(
            |p| {
                if p[0] < 0.0 || p[0] > 1.0 {
                    evaluated_outside = true;
                }
                -p[0]
            },
            &[0.9],
            &[(0.0, 1.0)],
            &NelderMeadConfig::default(),
        )
        .unwrap();
        assert!(!evaluated_outside);
        assert!(minimum.point[0] <= 1.0);
        assert!((minimum.point[0] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_input() {
        let config = NelderMeadConfig::default();
        assert!(minimize(|_| 0.0, &[0.0], &[(0.0, 1.0), (0.0, 1.0)], &config).is_err());
        assert!(minimize(|_| 0.0, &[0.0], &[(1.0, 1.0)], &config).is_err());
        let bad = NelderMeadConfig {
            contraction: 1.5,
            ..Default::default()
        };
        assert!(NelderMead::new(bad).is_err());
    }

    #[test]
    fn test_local_search_improves_individual() {
        let fixture = Fixture::new(bowl_definition(), 4, 1);
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mut individual = start();
        let id = individual.id();
        let improved = NelderMead::default()
            .search(&mut individual, &Bowl, &fixture.context(), &mut rng)
            .unwrap();
        assert!(improved);
        assert_eq!(individual.id(), id);
        assert!(individual.scalar_fitness().unwrap() > -1e-6);
    }

    #[test]
    fn test_infeasible_vertices_are_skipped() {
        /// Feasible only for `x ≥ 0.3`.
        struct Fenced;

        impl Problem for Fenced {
            fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
                Bowl.evaluate(individual)
            }

            fn check_constraints(&self, individual: &Individual) -> bool {
                individual.variables()[0] >= 0.3
            }
        }

        let fixture = Fixture::new(bowl_definition(), 4, 1);
        let mut rng = RandomNumberGenerator::from_seed(1);
        let mut individual = start();
        NelderMead::default()
            .search(&mut individual, &Fenced, &fixture.context(), &mut rng)
            .unwrap();
        assert!(Fenced.check_constraints(&individual));
        assert!(individual.scalar_fitness().unwrap() > -0.5);
    }

    #[test]
    fn test_sink_sees_each_improvement() {
        let definition = bowl_definition();
        let ids = IdGenerator::new();
        let mut seen = Vec::new();
        let mut sink = |candidate: &Individual| -> Result<()> {
            seen.push(candidate.scalar_fitness().unwrap());
            Ok(())
        };
        let report = NelderMead::default()
            .refine(&start(), &Bowl, &definition, &ids, &|| true, &mut sink)
            .unwrap();
        assert_eq!(report.improvements, seen.len());
        assert!(seen.windows(2).all(|w| w[1] > w[0]));
        assert!(report.best.is_some());
    }

    #[test]
    fn test_cleared_flag_stops_immediately() {
        let definition = bowl_definition();
        let ids = IdGenerator::new();
        let mut sink = |_: &Individual| -> Result<()> { Ok(()) };
        let report = NelderMead::default()
            .refine(&start(), &Bowl, &definition, &ids, &|| false, &mut sink)
            .unwrap();
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_worker_promotes_improvements() {
        let population = Arc::new(Mutex::new(Population::new(5, 50).unwrap()));
        let seed = start();
        population.lock().add_individual(seed.clone()).unwrap();
        population.lock().cluster_best_solution(&seed).unwrap();

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let worker = SimplexWorker::spawn(
            NelderMead::default(),
            seed,
            Arc::new(Bowl),
            Arc::new(bowl_definition()),
            Arc::new(IdGenerator::new()),
            Arc::clone(&population),
            Arc::new(AtomicBool::new(true)),
            move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();
        while !worker.is_finished() {
            thread::yield_now();
        }
        let report = worker.join().unwrap();

        assert!(report.improvements > 0);
        assert_eq!(notified.load(Ordering::Relaxed), report.improvements);
        let best = population.lock().best().cloned().unwrap();
        assert!(best.scalar_fitness().unwrap() > -1e-6);
    }
}
