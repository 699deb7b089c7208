//! Splitting batch work across worker threads.

pub mod scheduler;

pub use scheduler::{evaluate_rows, ExecutionOptions, RowBlock};
