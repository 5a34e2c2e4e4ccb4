//! Small dense linear algebra helpers
//!
//! The simplex is at most a few hundred entries wide, so a plain
//! Gauss-Jordan elimination with partial pivoting is all that is needed to
//! refactor its inverse.

use ndarray::{Array2, ArrayView1};

/// Euclidean norm of a vector view
pub(crate) fn norm(v: ArrayView1<f64>) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
/// Returns `None` when the matrix is singular or contains NaN/Inf.
pub(crate) fn inverse(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() || a.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut work = a.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        // Partial pivoting: bring the largest remaining entry to the diagonal.
        let mut pivot_row = col;
        let mut pivot_val = work[[col, col]].abs();
        for row in col + 1..n {
            let val = work[[row, col]].abs();
            if val > pivot_val {
                pivot_row = row;
                pivot_val = val;
            }
        }
        if pivot_val == 0.0 || !pivot_val.is_finite() {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                work.swap([pivot_row, j], [col, j]);
                inv.swap([pivot_row, j], [col, j]);
            }
        }

        let pivot = work[[col, col]];
        for j in 0..n {
            work[[col, j]] /= pivot;
            inv[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[[row, j]] -= factor * work[[col, j]];
                inv[[row, j]] -= factor * inv[[col, j]];
            }
        }
    }

    if inv.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(inv)
}
