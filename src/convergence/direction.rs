//! Improvement tallies that bias repair and local search towards directions that paid off.

use parking_lot::Mutex;

use crate::rng::RandomNumberGenerator;

/// Whether a move increases or decreases a variable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Add,
    Remove,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Add => Direction::Remove,
            Direction::Remove => Direction::Add,
        }
    }
}

/// Neighborhood search orientation: forward grows the included set, backward shrinks it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    first: u64,
    second: u64,
}

impl Tally {
    /// Laplace-smoothed probability of the first outcome.
    fn probability(&self) -> f64 {
        (self.first as f64 + 1.0) / (self.first as f64 + self.second as f64 + 2.0)
    }
}

/// Per-run direction statistics shared by repair and local search.
///
/// Every update is a single critical section, so one instance can be shared between
/// the generational loop and a concurrent simplex worker.
#[derive(Debug)]
pub struct DirectionHeuristic {
    variables: Mutex<Vec<Tally>>,
    search: Mutex<Tally>,
}

impl DirectionHeuristic {
    pub fn new(variable_count: usize) -> Self {
        Self {
            variables: Mutex::new(vec![Tally::default(); variable_count]),
            search: Mutex::new(Tally::default()),
        }
    }

    /// Probability of choosing [`Direction::Add`] for the variable.
    pub fn add_probability(&self, index: usize) -> f64 {
        self.variables
            .lock()
            .get(index)
            .map(Tally::probability)
            .unwrap_or(0.5)
    }

    pub fn choose(&self, index: usize, rng: &mut RandomNumberGenerator) -> Direction {
        if rng.bernoulli(self.add_probability(index)) {
            Direction::Add
        } else {
            Direction::Remove
        }
    }

    /// Records that moving `index` in `direction` improved a solution.
    /// Unknown indices are ignored.
    pub fn record(&self, index: usize, direction: Direction) {
        if let Some(tally) = self.variables.lock().get_mut(index) {
            match direction {
                Direction::Add => tally.first += 1,
                Direction::Remove => tally.second += 1,
            }
        }
    }

    pub fn choose_search(&self, rng: &mut RandomNumberGenerator) -> SearchDirection {
        let forward = self.search.lock().probability();
        if rng.bernoulli(forward) {
            SearchDirection::Forward
        } else {
            SearchDirection::Backward
        }
    }

    pub fn record_search(&self, direction: SearchDirection) {
        let mut tally = self.search.lock();
        match direction {
            SearchDirection::Forward => tally.first += 1,
            SearchDirection::Backward => tally.second += 1,
        }
    }

    /// `(add, remove)` improvement counts of a variable.
    pub fn tallies(&self, index: usize) -> (u64, u64) {
        self.variables
            .lock()
            .get(index)
            .map(|t| (t.first, t.second))
            .unwrap_or((0, 0))
    }

    /// `(forward, backward)` improvement counts of neighborhood search.
    pub fn search_tallies(&self) -> (u64, u64) {
        let tally = self.search.lock();
        (tally.first, tally.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_laplace_smoothing() {
        let heuristic = DirectionHeuristic::new(2);
        assert_eq!(heuristic.add_probability(0), 0.5);
        heuristic.record(0, Direction::Add);
        heuristic.record(0, Direction::Add);
        assert_eq!(heuristic.add_probability(0), 0.75);
        assert_eq!(heuristic.tallies(0), (2, 0));
        assert_eq!(heuristic.add_probability(7), 0.5);
    }

    #[test]
    fn test_reinforced_direction_dominates() {
        let heuristic = DirectionHeuristic::new(1);
        for _ in 0..200 {
            heuristic.record_search(SearchDirection::Backward);
        }
        let mut rng = RandomNumberGenerator::from_seed(5);
        let backward = (0..100)
            .filter(|_| heuristic.choose_search(&mut rng) == SearchDirection::Backward)
            .count();
        assert!(backward > 90);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let heuristic = Arc::new(DirectionHeuristic::new(1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let heuristic = Arc::clone(&heuristic);
                thread::spawn(move || {
                    for _ in 0..250 {
                        heuristic.record(0, Direction::Remove);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(heuristic.tallies(0), (0, 1000));
    }
}
