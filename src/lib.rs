//! Heuristic optimization over binary, integer, continuous, tree and mixed
//! representations.
//!
//! ```rust
//! use heuropt::{Fitness, Individual, Problem, ProblemDefinition, Representation, Result};
//! use heuropt::solver::{SolverBuilder, SolverOptions};
//!
//! struct OneMax;
//!
//! impl Problem for OneMax {
//!     fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
//!         Ok(Fitness::Scalar(individual.variables().iter().sum()))
//!     }
//! }
//!
//! let mut solver = SolverBuilder::new()
//!     .with_problem(OneMax)
//!     .with_definition(ProblemDefinition::new(Representation::binary(16))?)
//!     .with_options(SolverOptions::builder().num_generations(20).seed(1).build())
//!     .build()?;
//! let report = solver.run()?;
//! assert!(report.best.is_some());
//! # Ok::<(), heuropt::OptimizationError>(())
//! ```

pub mod caching;
pub mod constraints;
pub mod context;
pub mod convergence;
pub mod distance;
pub mod error;
pub mod individual;
pub mod local_search;
pub mod multi_objective;
pub mod population;
pub mod problem;
pub mod repair;
pub mod reproduction;
pub mod rng;
pub mod selection;
pub mod solver;

// Re-export commonly used types for convenience
pub use error::{OptimizationError, OptionExt, Result, ResultExt};
pub use individual::{Fitness, Genome, IdGenerator, Individual};
pub use problem::{LeafRepresentation, Problem, ProblemDefinition, Representation};
pub use solver::{Solver, SolverBuilder, SolverOptions, SolverReport};
