use crate::error::{OptimizationError, Result};
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::{collect_selection, SelectionStrategy};

/// A selection strategy that selects individuals based on their rank in the population.
///
/// Rank-based selection assigns a selection probability to each individual based on its
/// rank in the population, rather than its absolute score. This helps prevent
/// premature convergence when there are a few individuals with much higher fitness than
/// the rest of the population, and works unchanged with negated multi-objective ranks.
///
/// With `N` individuals and pressure `s`, the individual of rank `r` (0 = best) is picked
/// with probability `(s - 2(s - 1)·r/(N - 1)) / N`.
///
/// # Examples
///
/// ```
/// use heuropt::selection::{RankBasedSelection, SelectionStrategy};
/// use heuropt::rng::RandomNumberGenerator;
/// use heuropt::error::Result;
///
/// fn main() -> Result<()> {
///     let scores = vec![0.5, 0.8, 0.3, 0.9, 0.1];
///     let mut rng = RandomNumberGenerator::from_seed(7);
///
///     let selection = RankBasedSelection::new(1.5, false)?;
///     let selected = selection.select(&scores, 3, &mut rng)?;
///
///     assert_eq!(selected.len(), 3);
///
///     Ok(())
/// }
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct RankBasedSelection {
    /// Higher values increase selection pressure.
    selection_pressure: f64,
    allow_duplicates: bool,
}

impl RankBasedSelection {
    /// Creates a new RankBasedSelection strategy.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if `selection_pressure` is not in the range [1.0, 2.0].
    pub fn new(selection_pressure: f64, allow_duplicates: bool) -> Result<Self> {
        if !(1.0..=2.0).contains(&selection_pressure) {
            return Err(OptimizationError::Configuration(
                "Selection pressure must be in the range [1.0, 2.0]".to_string(),
            ));
        }

        Ok(Self {
            selection_pressure,
            allow_duplicates,
        })
    }

    /// Sets the selection pressure.
    ///
    /// - At 1.0, all individuals have equal selection probability
    /// - At 2.0, selection pressure is at its maximum and the worst individual is never picked
    pub fn with_pressure(mut self, selection_pressure: f64) -> Result<Self> {
        if !(1.0..=2.0).contains(&selection_pressure) {
            return Err(OptimizationError::Configuration(
                "Selection pressure must be in the range [1.0, 2.0]".to_string(),
            ));
        }

        self.selection_pressure = selection_pressure;

        Ok(self)
    }

    pub fn with_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    /// Cumulative selection probabilities, parallel to `scores`.
    fn calculate_probabilities(&self, scores: &[f64]) -> Vec<f64> {
        let population_size = scores.len();

        let mut indices: Vec<usize> = (0..population_size).collect();
        indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut rank_map = vec![0; population_size];
        for (rank, &idx) in indices.iter().enumerate() {
            rank_map[idx] = rank;
        }

        let n = population_size as f64;
        let s = self.selection_pressure;
        let mut probs: Vec<f64> = Vec::with_capacity(population_size);
        let mut cumulative = 0.0;

        for &rank in rank_map.iter() {
            let prob = if population_size == 1 {
                1.0
            } else {
                (s - 2.0 * (s - 1.0) * rank as f64 / (n - 1.0)) / n
            };
            cumulative += prob;
            probs.push(cumulative);
        }

        if let Some(last) = probs.last() {
            if *last > 0.0 && (*last - 1.0).abs() > f64::EPSILON {
                let last = *last;
                for prob in &mut probs {
                    *prob /= last;
                }
            }
        }

        if let Some(last) = probs.last_mut() {
            *last = 1.0;
        }

        probs
    }

    fn select_individual(cumulative_probs: &[f64], rng: &mut RandomNumberGenerator) -> usize {
        let r = rng.uniform();
        cumulative_probs
            .partition_point(|&p| p <= r)
            .min(cumulative_probs.len() - 1)
    }
}

impl Default for RankBasedSelection {
    fn default() -> Self {
        Self {
            selection_pressure: 1.5,
            allow_duplicates: false,
        }
    }
}

impl SelectionStrategy for RankBasedSelection {
    fn select(
        &self,
        scores: &[f64],
        num_to_select: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<usize>> {
        if scores.is_empty() {
            return Err(OptimizationError::EmptyPopulation);
        }
        let cumulative_probs = self.calculate_probabilities(scores);
        collect_selection(scores, num_to_select, self.allow_duplicates, || {
            Ok(Self::select_individual(&cumulative_probs, rng))
        })
    }
}
