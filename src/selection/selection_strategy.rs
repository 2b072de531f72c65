use std::fmt::Debug;

use crate::error::{OptimizationError, Result};
use crate::rng::RandomNumberGenerator;

/// Trait for parent selection strategies.
///
/// A strategy looks only at the selection scores of a [`ParentPool`](crate::population::ParentPool)
/// (higher is better) and returns indices into it, so parents are never copied or mutated
/// during selection.
///
/// # Examples
///
/// ```
/// use heuropt::selection::{SelectionStrategy, TournamentSelection};
/// use heuropt::rng::RandomNumberGenerator;
/// use heuropt::error::Result;
///
/// fn main() -> Result<()> {
///     let scores = vec![0.5, 0.8, 0.3, 0.9, 0.1];
///     let mut rng = RandomNumberGenerator::from_seed(42);
///
///     let selection = TournamentSelection::default();
///     let selected = selection.select(&scores, 3, &mut rng)?;
///
///     assert_eq!(selected.len(), 3);
///     assert!(selected.iter().all(|&i| i < scores.len()));
///
///     Ok(())
/// }
/// ```
pub trait SelectionStrategy: Debug + Send + Sync {
    /// Selects `num_to_select` indices into `scores`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPopulation` when `scores` is empty.
    fn select(
        &self,
        scores: &[f64],
        num_to_select: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<usize>>;

    /// Selects a single index.
    fn select_one(&self, scores: &[f64], rng: &mut RandomNumberGenerator) -> Result<usize> {
        self.select(scores, 1, rng)?
            .first()
            .copied()
            .ok_or(OptimizationError::EmptyPopulation)
    }
}

/// Draws indices with `draw` until `num_to_select` are collected, honoring the duplicate
/// policy. Without duplicates at most `len` indices are returned; after a bounded number of
/// rejected draws the remaining slots are filled in descending score order.
pub(crate) fn collect_selection<F>(
    scores: &[f64],
    num_to_select: usize,
    allow_duplicates: bool,
    mut draw: F,
) -> Result<Vec<usize>>
where
    F: FnMut() -> Result<usize>,
{
    if scores.is_empty() {
        return Err(OptimizationError::EmptyPopulation);
    }
    if allow_duplicates {
        return (0..num_to_select).map(|_| draw()).collect();
    }

    let target = num_to_select.min(scores.len());
    let mut selected = Vec::with_capacity(target);
    let mut taken = vec![false; scores.len()];
    let mut attempts = 0;
    while selected.len() < target && attempts < 10 * scores.len() {
        let idx = draw()?;
        if !taken[idx] {
            taken[idx] = true;
            selected.push(idx);
        }
        attempts += 1;
    }
    if selected.len() < target {
        let mut rest: Vec<usize> = (0..scores.len()).filter(|&i| !taken[i]).collect();
        rest.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        selected.extend(rest.into_iter().take(target - selected.len()));
    }
    Ok(selected)
}
