use crate::convergence::{DirectionHeuristic, GuidedConvergence};
use crate::individual::IdGenerator;
use crate::population::ParentPool;
use crate::problem::ProblemDefinition;

/// Read-only run state shared by reproduction, repair and local search.
///
/// The direction heuristic is the only part that changes through this context; it
/// synchronizes internally.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub definition: &'a ProblemDefinition,
    pub parents: &'a ParentPool,
    pub convergence: &'a GuidedConvergence,
    pub directions: &'a DirectionHeuristic,
    pub ids: &'a IdGenerator,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        definition: &'a ProblemDefinition,
        parents: &'a ParentPool,
        convergence: &'a GuidedConvergence,
        directions: &'a DirectionHeuristic,
        ids: &'a IdGenerator,
    ) -> Self {
        Self {
            definition,
            parents,
            convergence,
            directions,
            ids,
        }
    }

    /// Flat index of the first variable of a sub-representation slot.
    pub fn slot_offset(&self, slot: usize) -> usize {
        self.definition
            .variables()
            .iter()
            .take_while(|info| info.slot < slot)
            .count()
    }
}
