pub mod builder;
pub mod engine;
pub mod observer;
pub mod options;

pub use builder::SolverBuilder;
pub use engine::{Solver, SolverReport};
pub use observer::{GenerationReport, Observers};
pub use options::{LogLevel, SolverOptions, SolverOptionsBuilder};
