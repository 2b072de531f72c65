//! # Local Search
//!
//! Local search refines a single individual by exploring its neighborhood and moving to
//! better solutions. Two algorithms are provided:
//!
//! - [`NeighborhoodSearch`]: add/remove/swap moves on the flat variables, steered by the
//!   guided-convergence probabilities and the forward/backward direction heuristic,
//! - [`NelderMead`]: a downhill simplex over the continuous variables, usable inline or
//!   on a background thread through [`SimplexWorker`].
//!
//! A local search never makes an individual worse: it either returns `true` with the
//! individual replaced by a feasible, strictly dominating neighbor (already evaluated),
//! or returns `false` with the individual unchanged apart from a first evaluation.

mod nelder_mead;
mod neighborhood;

pub use nelder_mead::{
    minimize, ImprovementSink, Minimum, NelderMead, NelderMeadConfig, SimplexReport,
    SimplexWorker,
};
pub use neighborhood::{NeighborhoodSearch, NeighborhoodVariant};

use std::fmt::Debug;

use crate::context::SearchContext;
use crate::error::Result;
use crate::individual::Individual;
use crate::problem::Problem;
use crate::rng::RandomNumberGenerator;

/// A trait for local search algorithms.
pub trait LocalSearch: Debug + Send + Sync {
    /// Applies the local search to `individual`.
    ///
    /// Returns `true` if the individual was improved, `false` otherwise. An unevaluated
    /// individual is evaluated first, so on return it always carries a fitness.
    fn search(
        &self,
        individual: &mut Individual,
        problem: &dyn Problem,
        ctx: &SearchContext<'_>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<bool>;
}

/// Evaluates `individual` unless its fitness is already cached.
pub(crate) fn ensure_evaluated(individual: &mut Individual, problem: &dyn Problem) -> Result<()> {
    if !individual.is_evaluated() {
        individual.evaluate(problem)?;
    }
    Ok(())
}
