//! Constrained benchmark problems
//!
//! Constraint vectors follow Powell's convention: component `i` is
//! satisfied when `c[i] >= 0`.

use ndarray::Array1;

/// Objective of Powell's hexagon problem (test 10 of his original report):
/// maximize the area of a hexagon of unit diameter, written as a
/// minimization over 9 variables.
pub fn hexagon_objective(x: &Array1<f64>) -> f64 {
    assert_eq!(x.len(), 9);
    -0.5 * (x[0] * x[3] - x[1] * x[2] + x[2] * x[8] - x[4] * x[8] + x[4] * x[7] - x[5] * x[6])
}

/// The 14 constraints of Powell's hexagon problem, nonnegative when satisfied
pub fn hexagon_constraints(x: &Array1<f64>) -> Array1<f64> {
    assert_eq!(x.len(), 9);
    let mut c = Array1::<f64>::zeros(14);
    c[0] = 1.0 - x[2] * x[2] - x[3] * x[3];
    c[1] = 1.0 - x[8] * x[8];
    c[2] = 1.0 - x[4] * x[4] - x[5] * x[5];
    c[3] = 1.0 - x[0] * x[0] - (x[1] - x[8]) * (x[1] - x[8]);
    c[4] = 1.0 - (x[0] - x[4]) * (x[0] - x[4]) - (x[1] - x[5]) * (x[1] - x[5]);
    c[5] = 1.0 - (x[0] - x[6]) * (x[0] - x[6]) - (x[1] - x[7]) * (x[1] - x[7]);
    c[6] = 1.0 - (x[2] - x[4]) * (x[2] - x[4]) - (x[3] - x[5]) * (x[3] - x[5]);
    c[7] = 1.0 - (x[2] - x[6]) * (x[2] - x[6]) - (x[3] - x[7]) * (x[3] - x[7]);
    c[8] = 1.0 - x[6] * x[6] - (x[7] - x[8]) * (x[7] - x[8]);
    c[9] = x[0] * x[3] - x[1] * x[2];
    c[10] = x[2] * x[8];
    c[11] = -x[4] * x[8];
    c[12] = x[4] * x[7] - x[5] * x[6];
    c[13] = x[8];
    c
}

/// Scalar violation of a constraint vector under Powell's convention
pub fn max_violation(c: &Array1<f64>) -> f64 {
    c.iter().fold(0.0_f64, |acc, &ci| acc.max(-ci))
}
