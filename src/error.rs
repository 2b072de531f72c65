//! # Error Types
//!
//! This module defines the error type shared by every component of the engine.
//!
//! Errors fall into three groups:
//!
//! - configuration errors, raised before a run starts (`Configuration`, `OutOfRange`),
//! - invariant violations, which indicate a logic bug and must never be swallowed
//!   (`InvariantViolation`, `AlreadyEvaluated`, `NotEvaluated`),
//! - external failures coming from the caller's objective function (`Evaluation`).
//!
//! Search exhaustion (a repair that found no feasible state, a local search without
//! an improving neighbor, an operator that ran out of retries) is *not* an error and
//! is reported through ordinary return values instead.
//!
//! ## Examples
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use heuropt::error::{OptimizationError, OptionExt};
//!
//! fn best_score(scores: &[f64]) -> heuropt::error::Result<f64> {
//!     scores
//!         .iter()
//!         .cloned()
//!         .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
//!         .ok_or_else_opt(|| OptimizationError::EmptyPopulation)
//! }
//!
//! assert!(best_score(&[]).is_err());
//! assert_eq!(best_score(&[1.0, 3.0]).unwrap(), 3.0);
//! ```
//!
//! Using the `ResultExt` trait to add context to errors:
//!
//! ```rust
//! use heuropt::error::{Result, ResultExt};
//!
//! fn parse_generations(raw: &str) -> Result<usize> {
//!     raw.parse::<usize>().context("Invalid generation count")
//! }
//!
//! assert!(parse_generations("ten").is_err());
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur while configuring or running an optimization.
#[derive(Error, Debug)]
pub enum OptimizationError {
    /// An invalid configuration was provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An index was outside the valid range of a chromosome, child list or table.
    #[error("Index out of range: {0}")]
    OutOfRange(String),

    /// An operation required a non-empty population.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// `evaluate` was called on an individual whose fitness is already cached.
    #[error("Individual {0} is already evaluated")]
    AlreadyEvaluated(u64),

    /// The fitness of an individual was read before it was evaluated.
    #[error("Individual {0} has not been evaluated")]
    NotEvaluated(u64),

    /// The objective function produced an unusable value.
    #[error("Fitness calculation error: {0}")]
    FitnessCalculation(String),

    /// An internal invariant was broken. This indicates a bug, not a runtime condition.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The caller-supplied objective function failed.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// A concurrently running worker could not be joined.
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for optimization operations.
pub type Result<T> = std::result::Result<T, OptimizationError>;

/// Extension trait for Result to add context to errors.
pub trait ResultExt<T, E> {
    /// Converts the error into an [`OptimizationError::Other`] prefixed with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| OptimizationError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T>` using a closure to build the error.
    fn ok_or_else_opt<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> OptimizationError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_opt<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> OptimizationError,
    {
        self.ok_or_else(err_fn)
    }
}

/// Builds an out-of-range error for `index` against a collection of `len` items.
pub(crate) fn out_of_range(what: &str, index: usize, len: usize) -> OptimizationError {
    OptimizationError::OutOfRange(format!(
        "{} index {} is out of range (length {})",
        what, index, len
    ))
}
