//! Benchmark objective and constraint functions

pub mod constrained;
pub mod smooth;

pub use constrained::*;
pub use smooth::*;
