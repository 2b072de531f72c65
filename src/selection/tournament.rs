use crate::error::{OptimizationError, Result};
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::{collect_selection, SelectionStrategy};

/// A selection strategy that selects individuals through tournament selection.
///
/// Tournament selection works by randomly picking a small group of individuals
/// (the tournament size) and then choosing the best one from that group. This process
/// is repeated until the desired number of individuals are selected.
///
/// - Smaller tournament sizes lead to more exploration (more random selection)
/// - Larger tournament sizes lead to more exploitation (more focus on the best individuals)
///
/// Genetic programming reproduction uses tournaments of three by default.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    tournament_size: usize,
    allow_duplicates: bool,
}

impl TournamentSelection {
    /// Creates a new TournamentSelection strategy with the specified tournament size.
    ///
    /// # Errors
    ///
    /// Returns an error if `tournament_size` is 0.
    pub fn new(tournament_size: usize, allow_duplicates: bool) -> Result<Self> {
        if tournament_size < 1 {
            return Err(OptimizationError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            tournament_size,
            allow_duplicates,
        })
    }

    pub fn with_tournament_size(mut self, tournament_size: usize) -> Result<Self> {
        if tournament_size < 1 {
            return Err(OptimizationError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        self.tournament_size = tournament_size;
        Ok(self)
    }

    pub fn with_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }

    /// Runs a single tournament and returns the index of the winner.
    fn run_tournament(&self, scores: &[f64], rng: &mut RandomNumberGenerator) -> usize {
        let mut best_idx = rng.index(scores.len());
        for _ in 1..self.tournament_size {
            let idx = rng.index(scores.len());
            if scores[idx] > scores[best_idx] {
                best_idx = idx;
            }
        }
        best_idx
    }
}

impl Default for TournamentSelection {
    fn default() -> Self {
        Self {
            tournament_size: 2,
            allow_duplicates: false,
        }
    }
}

impl SelectionStrategy for TournamentSelection {
    fn select(
        &self,
        scores: &[f64],
        num_to_select: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<usize>> {
        collect_selection(scores, num_to_select, self.allow_duplicates, || {
            Ok(self.run_tournament(scores, rng))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_selection() {
        let scores = vec![0.5, 0.8, 0.3, 0.9, 0.1];
        let mut rng = RandomNumberGenerator::from_seed(1);

        let selection = TournamentSelection::default();
        let selected = selection.select(&scores, 3, &mut rng).unwrap();

        assert_eq!(selected.len(), 3);
        let mut unique = selected.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_large_tournament_prefers_best() {
        let scores = vec![0.5, 0.8, 0.3, 0.9, 0.1];
        let mut rng = RandomNumberGenerator::from_seed(2);
        let selection = TournamentSelection::new(200, true).unwrap();

        let selected = selection.select(&scores, 20, &mut rng).unwrap();
        assert!(selected.iter().all(|&i| i == 3));
    }

    #[test]
    fn test_without_duplicates_caps_at_population() {
        let scores = vec![1.0, 2.0];
        let mut rng = RandomNumberGenerator::from_seed(3);
        let selected = TournamentSelection::default()
            .select(&scores, 5, &mut rng)
            .unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_invalid_tournament_size() {
        assert!(TournamentSelection::new(0, false).is_err());
        assert!(TournamentSelection::default().with_tournament_size(0).is_err());
    }

    #[test]
    fn test_empty_population() {
        let mut rng = RandomNumberGenerator::from_seed(4);
        assert!(TournamentSelection::default()
            .select(&[], 1, &mut rng)
            .is_err());
    }
}
