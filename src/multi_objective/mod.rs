//! # Multi-Objective Ranking
//!
//! Turns a population's objective vectors (all maximized) into a total order using an
//! epsilon-indicator built on hypervolume differences, followed by greedy peeling of
//! the worst individual.
//!
//! 1. Every objective is normalized against the population's min and max, oriented so
//!    that `0` is the best value and `1` the worst.
//! 2. `indicator[a][b] = HV(b) − HV(max(a, b))` with `HV(x) = Π (3.5 − x_k)` measures how
//!    much `b` dominates `a`.
//! 3. With `c = max |indicator|` (at least `0.01`) and `κ = 0.05`, an individual's score is
//!    `Σ_j −exp(−indicator[j][i] / (κ·c))`.
//! 4. The minimum score is repeatedly removed and given the worst remaining rank; the
//!    survivors get back the contribution of the removed individual.
//!
//! When objective constraints are configured, feasible individuals are ranked ahead of
//! infeasible ones, and equality windows are narrowed once enough of the population is
//! feasible.
//!
//! ```rust
//! use heuropt::multi_objective::EpsilonIndicatorRanking;
//!
//! let mut ranking = EpsilonIndicatorRanking::new();
//! let ranks = ranking.rank(&[vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
//! assert_eq!(ranks, vec![2, 1]);
//! ```

mod constraint;

pub use constraint::ObjectiveConstraint;

use tracing::trace;

use crate::error::{OptimizationError, Result};

/// Reference point coordinate, dominating every normalized vector.
pub const REFERENCE_POINT: f64 = 3.5;
/// Scaling factor of the indicator fitness.
pub const KAPPA: f64 = 0.05;
const SCALE_FLOOR: f64 = 0.01;
const NORMALIZATION_EPSILON: f64 = 1e-12;
/// Feasible fraction above which equality windows are narrowed.
const NARROWING_THRESHOLD: f64 = 0.3;

fn hypervolume(point: impl Iterator<Item = f64>) -> f64 {
    point.map(|x| REFERENCE_POINT - x).product()
}

/// Stateful ranker; the state is the set of objective constraints whose equality
/// windows tighten over successive calls.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct EpsilonIndicatorRanking {
    constraints: Vec<ObjectiveConstraint>,
}

impl EpsilonIndicatorRanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraints(constraints: Vec<ObjectiveConstraint>) -> Self {
        Self { constraints }
    }

    pub fn constraints(&self) -> &[ObjectiveConstraint] {
        &self.constraints
    }

    /// Ranks objective vectors; the result holds one rank per input, `1` being best.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when vectors have different or zero lengths,
    /// and a `FitnessCalculation` error when a value is not finite.
    pub fn rank(&mut self, fitness: &[Vec<f64>]) -> Result<Vec<usize>> {
        if fitness.is_empty() {
            return Ok(Vec::new());
        }
        let objectives = fitness[0].len();
        if objectives == 0 || fitness.iter().any(|f| f.len() != objectives) {
            return Err(OptimizationError::Configuration(
                "All fitness vectors must have the same, non-zero number of objectives"
                    .to_string(),
            ));
        }
        if fitness.iter().flatten().any(|v| !v.is_finite()) {
            return Err(OptimizationError::FitnessCalculation(
                "Cannot rank non-finite objective values".to_string(),
            ));
        }

        let ranks = indicator_ranks(fitness, objectives);
        if self.constraints.is_empty() {
            return Ok(ranks);
        }
        Ok(self.apply_constraints(fitness, ranks))
    }

    fn apply_constraints(&mut self, fitness: &[Vec<f64>], ranks: Vec<usize>) -> Vec<usize> {
        let feasible: Vec<bool> = fitness
            .iter()
            .map(|f| self.constraints.iter().all(|c| c.is_satisfied(f)))
            .collect();

        let mut order: Vec<usize> = (0..fitness.len()).collect();
        order.sort_by_key(|&i| (!feasible[i], ranks[i]));
        let mut reranked = vec![0; fitness.len()];
        for (position, &i) in order.iter().enumerate() {
            reranked[i] = position + 1;
        }

        let feasible_count = feasible.iter().filter(|f| **f).count();
        if feasible_count as f64 / fitness.len() as f64 > NARROWING_THRESHOLD {
            for constraint in &mut self.constraints {
                let objective = constraint.objective();
                let values: Vec<f64> = fitness
                    .iter()
                    .zip(&feasible)
                    .filter(|(_, ok)| **ok)
                    .filter_map(|(f, _)| f.get(objective).copied())
                    .collect();
                constraint.narrow(&values);
            }
        }
        reranked
    }
}

/// Unconstrained indicator ranking of already validated vectors.
fn indicator_ranks(fitness: &[Vec<f64>], objectives: usize) -> Vec<usize> {
    let n = fitness.len();
    let mut min = vec![f64::INFINITY; objectives];
    let mut max = vec![f64::NEG_INFINITY; objectives];
    for vector in fitness {
        for (k, &v) in vector.iter().enumerate() {
            min[k] = min[k].min(v);
            max[k] = max[k].max(v);
        }
    }
    let normalized: Vec<Vec<f64>> = fitness
        .iter()
        .map(|vector| {
            vector
                .iter()
                .enumerate()
                .map(|(k, &v)| (max[k] - v) / (max[k] - min[k] + NORMALIZATION_EPSILON))
                .collect()
        })
        .collect();

    let mut indicator = vec![vec![0.0; n]; n];
    let mut scale = 0.0f64;
    for a in 0..n {
        for b in 0..n {
            if a == b {
                continue;
            }
            let hv_b = hypervolume(normalized[b].iter().copied());
            let hv_joint = hypervolume(
                normalized[a]
                    .iter()
                    .zip(&normalized[b])
                    .map(|(x, y)| x.max(*y)),
            );
            indicator[a][b] = hv_b - hv_joint;
            scale = scale.max(indicator[a][b].abs());
        }
    }
    let divisor = KAPPA * scale.max(SCALE_FLOOR);

    let mut scores: Vec<f64> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| -(-indicator[j][i] / divisor).exp())
                .sum()
        })
        .collect();

    let mut ranks = vec![0; n];
    let mut alive = vec![true; n];
    for rank in (1..=n).rev() {
        let mut worst: Option<usize> = None;
        for i in (0..n).filter(|&i| alive[i]) {
            // strict comparison keeps the lowest index on ties
            if worst.map_or(true, |w| scores[i] < scores[w]) {
                worst = Some(i);
            }
        }
        let Some(worst) = worst else { break };
        ranks[worst] = rank;
        alive[worst] = false;
        scores[worst] = f64::INFINITY;
        for i in (0..n).filter(|&i| alive[i]) {
            scores[i] += (-indicator[worst][i] / divisor).exp();
        }
        trace!(individual = worst, rank, "Peeled");
    }
    ranks
}
