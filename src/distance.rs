//! Caller-supplied pairwise distance between population members.
//!
//! The engine itself never needs a metric; clustering-style utilities built on top of
//! a [`Population`](crate::population::Population) ask for one through this callback.

use std::fmt;

use crate::error::{OptimizationError, Result};

type DistanceFn = dyn Fn(usize, usize) -> f64 + Send + Sync;

/// Optional distance callback. Querying it before registration is a configuration error.
#[derive(Default)]
pub struct DistanceCallback {
    callback: Option<Box<DistanceFn>>,
}

impl DistanceCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(callback: F) -> Self
    where
        F: Fn(usize, usize) -> f64 + Send + Sync + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn register<F>(&mut self, callback: F)
    where
        F: Fn(usize, usize) -> f64 + Send + Sync + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn is_registered(&self) -> bool {
        self.callback.is_some()
    }

    /// Distance between items `i` and `j`.
    ///
    /// # Errors
    ///
    /// - `Configuration` when no callback has been registered,
    /// - `Evaluation` when the callback returns a non-finite distance.
    pub fn get_distance(&self, i: usize, j: usize) -> Result<f64> {
        let callback = self.callback.as_ref().ok_or_else(|| {
            OptimizationError::Configuration("No distance callback registered".to_string())
        })?;
        let distance = callback(i, j);
        if !distance.is_finite() {
            return Err(OptimizationError::Evaluation(format!(
                "Distance between {} and {} is not finite",
                i, j
            )));
        }
        Ok(distance)
    }
}

impl fmt::Debug for DistanceCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistanceCallback")
            .field("registered", &self.is_registered())
            .finish()
    }
}
