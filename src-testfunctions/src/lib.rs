//! Benchmark problems for derivative-free constrained optimization
//!
//! This library collects the objective and constraint functions used to
//! validate the `cobyla` solver, organized by category:
//!
//! - **Smooth**: unconstrained objectives (shifted quadratic, chebyquad)
//! - **Constrained**: problems with nonlinear constraints (Powell's hexagon)
//!
//! Constraint functions follow Powell's convention: a constraint vector `c`
//! is satisfied when every component is nonnegative.
//!
//! # Example
//!
//! ```rust
//! use ndarray::Array1;
//! use cobyla_testfunctions::*;
//!
//! let x = Array1::from_vec(vec![5.0, 4.0]);
//! assert_eq!(shifted_quadratic(&x), 0.0);
//!
//! let problems = get_problem_metadata();
//! assert!(problems.contains_key("hexagon"));
//! ```

use ndarray::Array1;
use std::collections::HashMap;

pub mod functions;
pub use functions::*;

/// Objective-and-constraints evaluation in the shape the solver consumes.
pub type CalcFc = fn(&Array1<f64>) -> (f64, Array1<f64>);

/// Metadata for a benchmark problem: starting point, constraint count and
/// the best known objective value.
#[derive(Debug, Clone)]
pub struct ProblemMetadata {
    /// Problem name
    pub name: String,
    /// Starting point
    pub x0: Vec<f64>,
    /// Number of constraint components returned by `calcfc`
    pub m: usize,
    /// Best known objective value
    pub fstar: f64,
    /// Combined objective/constraint evaluation
    pub calcfc: CalcFc,
    /// Description of the problem
    pub description: String,
}

fn quadratic_calcfc(x: &Array1<f64>) -> (f64, Array1<f64>) {
    (shifted_quadratic(x), Array1::zeros(1))
}

fn quadratic_disc_calcfc(x: &Array1<f64>) -> (f64, Array1<f64>) {
    // x0^2 <= 9, i.e. 9 - x0^2 >= 0
    (shifted_quadratic(x), Array1::from_vec(vec![9.0 - x[0] * x[0]]))
}

fn chebyquad_calcfc(x: &Array1<f64>) -> (f64, Array1<f64>) {
    (chebyquad(x), Array1::zeros(1))
}

fn hexagon_calcfc(x: &Array1<f64>) -> (f64, Array1<f64>) {
    (hexagon_objective(x), hexagon_constraints(x))
}

/// Get metadata for all registered benchmark problems
pub fn get_problem_metadata() -> HashMap<String, ProblemMetadata> {
    let mut metadata = HashMap::new();

    metadata.insert(
        "quadratic".to_string(),
        ProblemMetadata {
            name: "quadratic".to_string(),
            x0: vec![0.0, 0.0],
            m: 1,
            fstar: 0.0,
            calcfc: quadratic_calcfc,
            description: "Shifted quadratic, unconstrained (vacuous constraint)".to_string(),
        },
    );

    metadata.insert(
        "quadratic_disc".to_string(),
        ProblemMetadata {
            name: "quadratic_disc".to_string(),
            x0: vec![0.0, 0.0],
            m: 1,
            fstar: 4.0,
            calcfc: quadratic_disc_calcfc,
            description: "Shifted quadratic subject to x0^2 <= 9".to_string(),
        },
    );

    metadata.insert(
        "chebyquad6".to_string(),
        ProblemMetadata {
            name: "chebyquad6".to_string(),
            x0: (1..=6).map(|i| i as f64 / 7.0).collect(),
            m: 1,
            fstar: 0.0,
            calcfc: chebyquad_calcfc,
            description: "Chebyquad with n = 6, unconstrained".to_string(),
        },
    );

    metadata.insert(
        "hexagon".to_string(),
        ProblemMetadata {
            name: "hexagon".to_string(),
            x0: vec![2.0; 9],
            m: 14,
            fstar: -0.866_025_403_784_438_6,
            calcfc: hexagon_calcfc,
            description: "Powell's hexagon area problem, n = 9 with 14 constraints".to_string(),
        },
    );

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_consistent() {
        for (name, meta) in get_problem_metadata() {
            let x0 = Array1::from_vec(meta.x0.clone());
            let (f, constr) = (meta.calcfc)(&x0);
            assert!(f.is_finite(), "{}: f(x0) not finite", name);
            assert_eq!(constr.len(), meta.m, "{}: constraint count mismatch", name);
        }
    }

    #[test]
    fn test_chebyquad_reference_value() {
        // Known value used by the original test suite.
        let x = Array1::from_vec(vec![1.0, 2.0]);
        assert!((chebyquad(&x) - (91.0 + 1.0 / 9.0)).abs() < 1e-6);
    }
}
