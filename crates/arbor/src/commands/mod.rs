//! Command implementations.

pub mod check;
pub mod passes;

pub use check::{CheckArgs, analyze, run_check};
pub use passes::{PassesArgs, run_passes};
