use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::{OptimizationError, Result};
use crate::individual::Individual;
use crate::local_search::{
    LocalSearch, NeighborhoodSearch, NeighborhoodVariant, NelderMead, NelderMeadConfig,
};
use crate::problem::{Problem, ProblemDefinition, VariableKind};
use crate::repair::{RepairConfig, Repairer};
use crate::reproduction::{Reproducer, ReproductionConfig};

use super::{GenerationReport, Observers, Solver, SolverOptions};

const DEFAULT_NEIGHBORHOOD_ITERATIONS: usize = 10;

/// Fluent construction of a [`Solver`].
///
/// A problem and a definition are required; everything else has defaults. The default
/// local search is a Nelder–Mead simplex when every variable is continuous and a simple
/// neighborhood search otherwise.
#[derive(Debug, Default)]
pub struct SolverBuilder {
    problem: Option<Arc<dyn Problem>>,
    definition: Option<ProblemDefinition>,
    options: SolverOptions,
    reproduction: ReproductionConfig,
    repair: RepairConfig,
    simplex: NelderMeadConfig,
    local_search: Option<Arc<dyn LocalSearch>>,
    observers: Observers,
    keep_running: Option<Arc<AtomicBool>>,
}

impl SolverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_problem<P>(mut self, problem: P) -> Self
    where
        P: Problem + 'static,
    {
        self.problem = Some(Arc::new(problem));
        self
    }

    /// Uses a problem that is shared with the caller.
    pub fn with_shared_problem(mut self, problem: Arc<dyn Problem>) -> Self {
        self.problem = Some(problem);
        self
    }

    pub fn with_definition(mut self, definition: ProblemDefinition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_reproduction(mut self, config: ReproductionConfig) -> Self {
        self.reproduction = config;
        self
    }

    pub fn with_repair(mut self, config: RepairConfig) -> Self {
        self.repair = config;
        self
    }

    /// Settings of the concurrent simplex worker.
    pub fn with_simplex(mut self, config: NelderMeadConfig) -> Self {
        self.simplex = config;
        self
    }

    pub fn with_local_search<L>(mut self, local_search: L) -> Self
    where
        L: LocalSearch + 'static,
    {
        self.local_search = Some(Arc::new(local_search));
        self
    }

    /// Shares a cancellation flag; clearing it stops the run at the next generation.
    pub fn with_keep_running(mut self, flag: Arc<AtomicBool>) -> Self {
        self.keep_running = Some(flag);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.observers.on_progress(callback);
        self
    }

    pub fn on_improvement<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Individual) + Send + Sync + 'static,
    {
        self.observers.on_improvement(callback);
        self
    }

    pub fn on_generation<F>(mut self, callback: F) -> Self
    where
        F: Fn(&GenerationReport) + Send + Sync + 'static,
    {
        self.observers.on_generation(callback);
        self
    }

    /// Validates every setting and builds the solver.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the problem or definition is missing or any
    /// configuration is invalid.
    pub fn build(self) -> Result<Solver> {
        let problem = self
            .problem
            .ok_or_else(|| OptimizationError::Configuration("Problem not specified".to_string()))?;
        let definition = self.definition.ok_or_else(|| {
            OptimizationError::Configuration("Problem definition not specified".to_string())
        })?;
        self.options.validate()?;

        let reproducer = Reproducer::new(self.reproduction)?;
        let repairer = Repairer::new(self.repair)?;
        let simplex = NelderMead::new(self.simplex)?;
        let local_search = match self.local_search {
            Some(local_search) => local_search,
            None => default_local_search(&definition)?,
        };

        Solver::new(
            problem,
            definition,
            self.options,
            reproducer,
            repairer,
            local_search,
            simplex,
            self.observers,
            self.keep_running
                .unwrap_or_else(|| Arc::new(AtomicBool::new(true))),
        )
    }
}

fn default_local_search(definition: &ProblemDefinition) -> Result<Arc<dyn LocalSearch>> {
    let variables = definition.variables();
    let all_continuous = !variables.is_empty()
        && variables
            .iter()
            .all(|info| info.kind == VariableKind::Continuous);
    Ok(if all_continuous {
        Arc::new(NelderMead::default())
    } else {
        Arc::new(NeighborhoodSearch::new(
            NeighborhoodVariant::Simple,
            DEFAULT_NEIGHBORHOOD_ITERATIONS,
        )?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Fitness;
    use crate::problem::Representation;

    struct Zero;

    impl Problem for Zero {
        fn evaluate(&self, _individual: &Individual) -> Result<Fitness> {
            Ok(Fitness::Scalar(0.0))
        }
    }

    #[test]
    fn test_missing_parts() {
        let err = SolverBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("Problem not specified"));

        let err = SolverBuilder::new().with_problem(Zero).build().unwrap_err();
        assert!(err.to_string().contains("definition"));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let definition = ProblemDefinition::new(Representation::binary(4)).unwrap();
        let result = SolverBuilder::new()
            .with_problem(Zero)
            .with_definition(definition.clone())
            .with_options(SolverOptions::builder().population_size(0).build())
            .build();
        assert!(result.is_err());

        let result = SolverBuilder::new()
            .with_problem(Zero)
            .with_definition(definition)
            .with_repair(RepairConfig {
                jitter: -1.0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_local_search_follows_representation() {
        let continuous = ProblemDefinition::new(Representation::continuous(3)).unwrap();
        let binary = ProblemDefinition::new(Representation::binary(3)).unwrap();
        assert!(format!("{:?}", default_local_search(&continuous).unwrap()).contains("NelderMead"));
        assert!(format!("{:?}", default_local_search(&binary).unwrap())
            .contains("NeighborhoodSearch"));
    }
}
