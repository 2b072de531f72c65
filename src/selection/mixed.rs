use crate::error::{OptimizationError, Result};
use crate::rng::RandomNumberGenerator;
use crate::selection::rank::RankBasedSelection;
use crate::selection::selection_strategy::{collect_selection, SelectionStrategy};

/// Rank-based selection mixed with uniform picks.
///
/// Each draw is uniform over the pool with probability `uniform_probability` and
/// rank-based otherwise, so low-ranked individuals keep contributing genetic material.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct MixedSelection {
    rank: RankBasedSelection,
    uniform_probability: f64,
    allow_duplicates: bool,
}

impl MixedSelection {
    pub fn new(rank: RankBasedSelection, uniform_probability: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&uniform_probability) {
            return Err(OptimizationError::Configuration(
                "Uniform selection probability must be in [0.0, 1.0]".to_string(),
            ));
        }
        Ok(Self {
            rank: rank.with_duplicates(),
            uniform_probability,
            allow_duplicates: false,
        })
    }

    pub fn with_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    /// Sets the uniform draw probability, clamped to `[0, 1]`.
    pub fn with_uniform_probability(mut self, uniform_probability: f64) -> Self {
        self.uniform_probability = uniform_probability.clamp(0.0, 1.0);
        self
    }

    pub fn uniform_probability(&self) -> f64 {
        self.uniform_probability
    }
}

impl Default for MixedSelection {
    fn default() -> Self {
        Self {
            rank: RankBasedSelection::default().with_duplicates(),
            uniform_probability: 0.2,
            allow_duplicates: false,
        }
    }
}

impl SelectionStrategy for MixedSelection {
    fn select(
        &self,
        scores: &[f64],
        num_to_select: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<usize>> {
        collect_selection(scores, num_to_select, self.allow_duplicates, || {
            if rng.bernoulli(self.uniform_probability) {
                Ok(rng.index(scores.len()))
            } else {
                self.rank.select_one(scores, rng)
            }
        })
    }
}
