//! # SolverOptions
//!
//! The `SolverOptions` struct holds the run-level settings of a [`Solver`]: how many
//! generations to run, how large the ranked and large populations are, how many
//! offspring each generation produces, how often local search is applied, and when to
//! switch to parallel evaluation.
//!
//! ## Example
//!
//! ```rust
//! use heuropt::solver::{LogLevel, SolverOptions};
//!
//! let options = SolverOptions::builder()
//!     .num_generations(200)
//!     .log_level(LogLevel::Minimal)
//!     .population_size(40)
//!     .num_offspring(80)
//!     .seed(7)
//!     .build();
//! assert!(options.validate().is_ok());
//!
//! let default_options = SolverOptions::default();
//! assert_eq!(default_options.get_population_size(), 50);
//! ```
//!
//! [`Solver`]: crate::solver::Solver

use crate::error::{OptimizationError, Result};

/// How much per-generation detail the solver logs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Best fitness every generation plus the ranked population at debug level.
    Verbose,
    /// One line per generation.
    Minimal,
    #[default]
    None,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SolverOptions {
    num_generations: usize,
    log_level: LogLevel,
    population_size: usize,
    large_population_capacity: usize,
    num_offspring: usize,
    local_search_probability: f64,
    /// Minimum batch size evaluated in parallel
    parallel_threshold: usize,
    max_stagnant_generations: Option<usize>,
    learning_rate: f64,
    concurrent_simplex: bool,
    seed: Option<u64>,
}

impl SolverOptions {
    pub fn new(
        num_generations: usize,
        log_level: LogLevel,
        population_size: usize,
        num_offspring: usize,
    ) -> Self {
        Self {
            num_generations,
            log_level,
            population_size,
            num_offspring,
            ..Default::default()
        }
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for a zero population or offspring count, a large
    /// population smaller than the ranked one, or probabilities outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(OptimizationError::Configuration(
                "Population size cannot be zero".to_string(),
            ));
        }
        if self.num_offspring == 0 {
            return Err(OptimizationError::Configuration(
                "Number of offspring cannot be zero".to_string(),
            ));
        }
        if self.large_population_capacity < self.population_size {
            return Err(OptimizationError::Configuration(format!(
                "Large population capacity {} is smaller than the population size {}",
                self.large_population_capacity, self.population_size
            )));
        }
        if !(0.0..=1.0).contains(&self.local_search_probability) {
            return Err(OptimizationError::Configuration(
                "Local search probability must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(OptimizationError::Configuration(
                "Learning rate must be in (0.0, 1.0]".to_string(),
            ));
        }
        if self.max_stagnant_generations == Some(0) {
            return Err(OptimizationError::Configuration(
                "Stagnation limit must be at least one generation".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get_num_generations(&self) -> usize {
        self.num_generations
    }

    pub fn get_log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn get_population_size(&self) -> usize {
        self.population_size
    }

    pub fn get_large_population_capacity(&self) -> usize {
        self.large_population_capacity
    }

    pub fn get_num_offspring(&self) -> usize {
        self.num_offspring
    }

    pub fn get_local_search_probability(&self) -> f64 {
        self.local_search_probability
    }

    /// Returns the minimum batch size evaluated in parallel.
    pub fn get_parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn get_max_stagnant_generations(&self) -> Option<usize> {
        self.max_stagnant_generations
    }

    /// Returns the guided-convergence learning rate.
    pub fn get_learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn get_concurrent_simplex(&self) -> bool {
        self.concurrent_simplex
    }

    pub fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn set_num_generations(&mut self, num_generations: usize) {
        self.num_generations = num_generations;
    }

    pub fn set_log_level(&mut self, log_level: LogLevel) {
        self.log_level = log_level;
    }

    pub fn set_population_size(&mut self, population_size: usize) {
        self.population_size = population_size;
    }

    pub fn set_num_offspring(&mut self, num_offspring: usize) {
        self.num_offspring = num_offspring;
    }

    pub fn set_parallel_threshold(&mut self, threshold: usize) {
        self.parallel_threshold = threshold;
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    /// Returns a builder for creating a `SolverOptions` instance.
    pub fn builder() -> SolverOptionsBuilder {
        SolverOptionsBuilder::default()
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            num_generations: 100,
            log_level: LogLevel::None,
            population_size: 50,
            large_population_capacity: 500,
            num_offspring: 50,
            local_search_probability: 0.1,
            parallel_threshold: 1000,
            max_stagnant_generations: None,
            learning_rate: 0.2,
            concurrent_simplex: false,
            seed: None,
        }
    }
}

/// Builder for `SolverOptions`.
///
/// Unset values keep their defaults; validation happens when the solver is built.
#[derive(Debug, Clone, Default)]
pub struct SolverOptionsBuilder {
    options: SolverOptions,
}

impl SolverOptionsBuilder {
    pub fn num_generations(mut self, value: usize) -> Self {
        self.options.num_generations = value;
        self
    }

    pub fn log_level(mut self, value: LogLevel) -> Self {
        self.options.log_level = value;
        self
    }

    pub fn population_size(mut self, value: usize) -> Self {
        self.options.population_size = value;
        self
    }

    pub fn large_population_capacity(mut self, value: usize) -> Self {
        self.options.large_population_capacity = value;
        self
    }

    pub fn num_offspring(mut self, value: usize) -> Self {
        self.options.num_offspring = value;
        self
    }

    pub fn local_search_probability(mut self, value: f64) -> Self {
        self.options.local_search_probability = value;
        self
    }

    pub fn parallel_threshold(mut self, value: usize) -> Self {
        self.options.parallel_threshold = value;
        self
    }

    /// Stops the run after `value` generations without a new best solution.
    pub fn max_stagnant_generations(mut self, value: usize) -> Self {
        self.options.max_stagnant_generations = Some(value);
        self
    }

    pub fn learning_rate(mut self, value: f64) -> Self {
        self.options.learning_rate = value;
        self
    }

    /// Refines every new best solution with a Nelder–Mead simplex on a worker thread.
    /// Runs with a concurrent simplex are not reproducible.
    pub fn concurrent_simplex(mut self, value: bool) -> Self {
        self.options.concurrent_simplex = value;
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.options.seed = Some(value);
        self
    }

    pub fn build(self) -> SolverOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SolverOptions::default();
        assert_eq!(options.get_num_generations(), 100);
        assert_eq!(options.get_population_size(), 50);
        assert_eq!(options.get_large_population_capacity(), 500);
        assert_eq!(options.get_num_offspring(), 50);
        assert_eq!(options.get_local_search_probability(), 0.1);
        assert_eq!(options.get_parallel_threshold(), 1000);
        assert_eq!(options.get_max_stagnant_generations(), None);
        assert_eq!(options.get_learning_rate(), 0.2);
        assert!(!options.get_concurrent_simplex());
        assert_eq!(options.get_seed(), None);
        assert_eq!(options.get_log_level(), LogLevel::None);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let options = SolverOptions::builder()
            .num_generations(10)
            .population_size(8)
            .large_population_capacity(8)
            .max_stagnant_generations(3)
            .seed(42)
            .build();
        assert_eq!(options.get_num_generations(), 10);
        assert_eq!(options.get_max_stagnant_generations(), Some(3));
        assert_eq!(options.get_seed(), Some(42));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            SolverOptions::builder().population_size(0).build(),
            SolverOptions::builder().num_offspring(0).build(),
            SolverOptions::builder().large_population_capacity(10).build(),
            SolverOptions::builder().local_search_probability(1.5).build(),
            SolverOptions::builder().learning_rate(0.0).build(),
            SolverOptions::builder().max_stagnant_generations(0).build(),
        ];
        for options in cases {
            assert!(matches!(
                options.validate(),
                Err(OptimizationError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_setters() {
        let mut options = SolverOptions::new(5, LogLevel::Verbose, 4, 6);
        options.set_parallel_threshold(2);
        options.set_seed(Some(1));
        assert_eq!(options.get_num_offspring(), 6);
        assert_eq!(options.get_parallel_threshold(), 2);
        assert_eq!(options.get_seed(), Some(1));
        assert_eq!(options.get_log_level(), LogLevel::Verbose);
    }
}
