//! Numeric constants and solver defaults
//!
//! The barrier constants bound what the iteration is allowed to see: after
//! moderation no objective value exceeds [`FUNCMAX`] and no constraint value
//! leaves `[-CONSTRMAX, CONSTRMAX]`, so comparisons downstream are total.

/// Machine epsilon for `f64`
pub const EPS: f64 = f64::EPSILON;

/// Largest finite `f64`
pub const REALMAX: f64 = f64::MAX;

/// Barrier value for the objective function, 2^100
pub const FUNCMAX: f64 = 1.2676506002282294e30;

/// Barrier value for constraint components, 2^100
pub const CONSTRMAX: f64 = FUNCMAX;

/// Default initial trust-region radius
pub const RHOBEG_DFT: f64 = 1.0;

/// Default final trust-region radius
pub const RHOEND_DFT: f64 = 1.0e-6;

/// Default weight of the constraint violation when selecting the returned point
pub const CWEIGHT_DFT: f64 = 1.0e8;

/// Default budget of function evaluations per variable
pub const MAXFUN_DIM_DFT: usize = 500;

/// Default capacity of the filter
pub const MAXFILT_DFT: usize = 2000;

/// Lower bound below which a filter capacity is not recommended
pub const MIN_MAXFILT: usize = 200;
