//! Run event callbacks.
//!
//! Observers are synchronous and invoked once per event, on the thread that produced
//! the event. Improvement callbacks can therefore run on the simplex worker thread.

use std::fmt;

use crate::individual::{Fitness, Individual};

/// Summary of one finished generation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Zero-based generation number.
    pub generation: usize,
    pub best_fitness: Option<Fitness>,
    /// Size of the ranked population after ranking.
    pub population_size: usize,
    /// Objective evaluations so far in this run.
    pub evaluations: usize,
    /// Offspring discarded so far because repair could not make them feasible.
    pub repair_failures: usize,
    pub stagnant_generations: usize,
}

type ProgressFn = dyn Fn(&str, f64) + Send + Sync;
type ImprovementFn = dyn Fn(&Individual) + Send + Sync;
type GenerationFn = dyn Fn(&GenerationReport) + Send + Sync;

/// Registered callbacks of a solver.
#[derive(Default)]
pub struct Observers {
    progress: Vec<Box<ProgressFn>>,
    improvement: Vec<Box<ImprovementFn>>,
    generation: Vec<Box<GenerationFn>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a progress sink receiving a message and a completion percentage.
    pub fn on_progress<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.progress.push(Box::new(callback));
        self
    }

    /// Registers a callback for every new best solution.
    pub fn on_improvement<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&Individual) + Send + Sync + 'static,
    {
        self.improvement.push(Box::new(callback));
        self
    }

    pub fn on_generation<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&GenerationReport) + Send + Sync + 'static,
    {
        self.generation.push(Box::new(callback));
        self
    }

    pub fn notify_progress(&self, message: &str, percent: f64) {
        for callback in &self.progress {
            callback(message, percent);
        }
    }

    pub fn notify_improvement(&self, individual: &Individual) {
        for callback in &self.improvement {
            callback(individual);
        }
    }

    pub fn notify_generation(&self, report: &GenerationReport) {
        for callback in &self.generation {
            callback(report);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.progress.is_empty() && self.improvement.is_empty() && self.generation.is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("progress", &self.progress.len())
            .field("improvement", &self.improvement.len())
            .field("generation", &self.generation.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Genome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_each_observer_called_once_per_event() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::new();
        assert!(observers.is_empty());

        let (a, b, c) = (calls.clone(), calls.clone(), calls.clone());
        observers
            .on_progress(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_improvement(move |_| {
                b.fetch_add(10, Ordering::SeqCst);
            })
            .on_generation(move |_| {
                c.fetch_add(100, Ordering::SeqCst);
            });

        observers.notify_progress("Generation 1/10", 10.0);
        observers.notify_improvement(&Individual::new(0, Genome::Binary(vec![true])));
        observers.notify_generation(&GenerationReport {
            generation: 0,
            best_fitness: None,
            population_size: 0,
            evaluations: 0,
            repair_failures: 0,
            stagnant_generations: 0,
        });
        assert_eq!(calls.load(Ordering::SeqCst), 111);
        assert!(format!("{:?}", observers).contains("progress: 1"));
    }
}
