//! # Caching
//!
//! Memoization of objective values. Expensive objectives often see the same content
//! more than once: offspring that reproduce a parent, repairs that land on a known
//! state, or simplex vertices revisited after a shrink. [`CachedProblem`] keys results
//! by [`Individual::description`] so structurally identical individuals are evaluated
//! only once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::individual::{Fitness, Individual};
use crate::problem::Problem;

/// Hit and miss counters of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// A wrapper around a problem that caches objective values.
///
/// The cache is shared between clones and safe to use from the solver's parallel
/// evaluation. Failed evaluations are not cached. Constraint checks are delegated
/// without caching.
#[derive(Debug, Clone)]
pub struct CachedProblem<P> {
    problem: P,
    cache: Arc<Mutex<HashMap<String, Fitness>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
}

impl<P: Problem> CachedProblem<P> {
    pub fn new(problem: P) -> Self {
        Self::with_cache(problem, HashMap::new())
    }

    /// Creates a cached problem with a pre-populated cache.
    pub fn with_cache(problem: P, cache: HashMap<String, Fitness>) -> Self {
        Self {
            problem,
            cache: Arc::new(Mutex::new(cache)),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.problem
    }

    pub fn cache_size(&self) -> usize {
        self.cache.lock().len()
    }

    /// Clears the cache and resets the counters.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Returns a copy of the cache.
    pub fn get_cache(&self) -> HashMap<String, Fitness> {
        self.cache.lock().clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<P: Problem> Problem for CachedProblem<P> {
    fn evaluate(&self, individual: &Individual) -> Result<Fitness> {
        let key = individual.description();
        if let Some(fitness) = self.cache.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(fitness.clone());
        }

        // evaluated outside the lock so parallel batches do not serialize
        let fitness = self.problem.evaluate(individual)?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.cache.lock().insert(key, fitness.clone());
        Ok(fitness)
    }

    fn check_constraints(&self, individual: &Individual) -> bool {
        self.problem.check_constraints(individual)
    }

    fn repair_lower_bound(&self, individual: &Individual) -> Option<f64> {
        self.problem.repair_lower_bound(individual)
    }
}
