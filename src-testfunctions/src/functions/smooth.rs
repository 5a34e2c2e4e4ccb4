//! Smooth unconstrained objectives

use ndarray::{Array1, Array2};

/// Shifted quadratic with minimum 0 at (5, 4)
pub fn shifted_quadratic(x: &Array1<f64>) -> f64 {
    (x[0] - 5.0).powi(2) + (x[1] - 4.0).powi(2)
}

/// Chebyquad function (Fletcher, 1965)
///
/// Sum of squared deviations of the Chebyshev polynomial averages from
/// their integrals over [0, 1]. For n = 6 the minimum value is 0.
pub fn chebyquad(x: &Array1<f64>) -> f64 {
    let n = x.len();
    let mut y = Array2::<f64>::zeros((n + 1, n + 1));
    for i in 0..n {
        y[[i, 0]] = 1.0;
        y[[i, 1]] = 2.0 * x[i] - 1.0;
    }
    for j in 1..n {
        for i in 0..n {
            y[[i, j + 1]] = 2.0 * y[[i, 1]] * y[[i, j]] - y[[i, j - 1]];
        }
    }

    let mut f = 0.0;
    for j in 0..=n {
        let mut tmp = (0..n).map(|i| y[[i, j]]).sum::<f64>() / n as f64;
        if j % 2 == 0 {
            tmp += 1.0 / ((j * j) as f64 - 1.0);
        }
        f += tmp * tmp;
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shifted_quadratic_minimum() {
        let x = Array1::from_vec(vec![5.0, 4.0]);
        assert_eq!(shifted_quadratic(&x), 0.0);
        let x = Array1::from_vec(vec![0.0, 0.0]);
        assert_eq!(shifted_quadratic(&x), 41.0);
    }
}
