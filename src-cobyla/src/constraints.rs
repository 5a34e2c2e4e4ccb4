//! Two-sided constraint objects and the `minimize` front end
//!
//! Callers describe constraints the familiar way, `lb <= A x <= ub` and
//! `lb <= g(x) <= ub`; this module rewrites them into the one-sided rows
//! the solver consumes, emitting a row per finite side. An equality
//! (`lb = ub`) therefore becomes two opposing inequalities. Box bounds are
//! deliberately not accepted: they are the caller's concern and must be
//! enforced outside the solver.

use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::{CobylaConfig, CobylaError, CobylaReport, cobyla};

/// Linear constraint `lb <= A x <= ub`, component-wise. Use infinities to
/// drop a side.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    pub a: Array2<f64>,
    pub lb: Array1<f64>,
    pub ub: Array1<f64>,
}

impl LinearConstraint {
    pub fn new(a: Array2<f64>, lb: Array1<f64>, ub: Array1<f64>) -> Self {
        Self { a, lb, ub }
    }

    /// `A x <= ub`
    pub fn upper(a: Array2<f64>, ub: Array1<f64>) -> Self {
        let rows = a.nrows();
        Self { a, lb: Array1::from_elem(rows, f64::NEG_INFINITY), ub }
    }

    /// `lb <= A x`
    pub fn lower(a: Array2<f64>, lb: Array1<f64>) -> Self {
        let rows = a.nrows();
        Self { a, lb, ub: Array1::from_elem(rows, f64::INFINITY) }
    }

    /// Number of one-sided rows this constraint contributes.
    fn rows(&self) -> usize {
        self.lb.iter().filter(|v| v.is_finite()).count()
            + self.ub.iter().filter(|v| v.is_finite()).count()
    }
}

/// Nonlinear constraint `lb <= fun(x) <= ub`, component-wise.
#[derive(Clone)]
pub struct NonlinearConstraint {
    pub fun: Arc<dyn Fn(&Array1<f64>) -> Array1<f64> + Send + Sync>,
    pub lb: Array1<f64>,
    pub ub: Array1<f64>,
}

impl NonlinearConstraint {
    pub fn new(
        fun: impl Fn(&Array1<f64>) -> Array1<f64> + Send + Sync + 'static,
        lb: Array1<f64>,
        ub: Array1<f64>,
    ) -> Self {
        Self { fun: Arc::new(fun), lb, ub }
    }

    /// `fun(x) <= ub`
    pub fn upper(
        fun: impl Fn(&Array1<f64>) -> Array1<f64> + Send + Sync + 'static,
        ub: Array1<f64>,
    ) -> Self {
        let rows = ub.len();
        Self { fun: Arc::new(fun), lb: Array1::from_elem(rows, f64::NEG_INFINITY), ub }
    }

    /// `lb <= fun(x)`
    pub fn lower(
        fun: impl Fn(&Array1<f64>) -> Array1<f64> + Send + Sync + 'static,
        lb: Array1<f64>,
    ) -> Self {
        let rows = lb.len();
        Self { fun: Arc::new(fun), lb, ub: Array1::from_elem(rows, f64::INFINITY) }
    }

    fn rows(&self) -> usize {
        self.lb.iter().filter(|v| v.is_finite()).count()
            + self.ub.iter().filter(|v| v.is_finite()).count()
    }
}

fn validate(
    n: usize,
    linear: &[LinearConstraint],
    nonlinear: &[NonlinearConstraint],
    x0: &Array1<f64>,
) -> Result<(), CobylaError> {
    for lc in linear {
        if lc.a.ncols() != n {
            return Err(CobylaError::LinearConstraintWidth { cols: lc.a.ncols(), n });
        }
        if lc.lb.len() != lc.a.nrows() || lc.ub.len() != lc.a.nrows() {
            return Err(CobylaError::LinearConstraintShape {
                rows: lc.a.nrows(),
                lb: lc.lb.len(),
                ub: lc.ub.len(),
            });
        }
    }
    for nlc in nonlinear {
        if nlc.lb.len() != nlc.ub.len() {
            return Err(CobylaError::NonlinearConstraintShape {
                expected: nlc.lb.len(),
                got: nlc.ub.len(),
            });
        }
        let g = (nlc.fun)(x0);
        if g.len() != nlc.lb.len() {
            return Err(CobylaError::NonlinearConstraintShape {
                expected: nlc.lb.len(),
                got: g.len(),
            });
        }
    }
    Ok(())
}

/// Append the one-sided rows of all constraints at `x`, in declaration
/// order, linear first.
fn emit_rows(
    linear: &[LinearConstraint],
    nonlinear: &[NonlinearConstraint],
    x: &Array1<f64>,
    out: &mut Vec<f64>,
) {
    for lc in linear {
        for i in 0..lc.a.nrows() {
            let ax: f64 = (0..lc.a.ncols()).map(|j| lc.a[[i, j]] * x[j]).sum();
            if lc.ub[i].is_finite() {
                out.push(lc.ub[i] - ax);
            }
            if lc.lb[i].is_finite() {
                out.push(ax - lc.lb[i]);
            }
        }
    }
    for nlc in nonlinear {
        let g = (nlc.fun)(x);
        for i in 0..nlc.lb.len() {
            if nlc.ub[i].is_finite() {
                out.push(nlc.ub[i] - g[i]);
            }
            if nlc.lb[i].is_finite() {
                out.push(g[i] - nlc.lb[i]);
            }
        }
    }
}

/// Minimize `fun` from `x0` subject to two-sided linear and nonlinear
/// constraints. With no constraint at all a vacuous one is injected, since
/// the solver always works against at least one row. The objective and the
/// constraint rows are evaluated once at `x0` here and handed to the solver
/// as its warm start.
pub fn minimize<F>(
    fun: &F,
    x0: Array1<f64>,
    linear: &[LinearConstraint],
    nonlinear: &[NonlinearConstraint],
    mut config: CobylaConfig,
) -> Result<CobylaReport, CobylaError>
where
    F: Fn(&Array1<f64>) -> f64,
{
    let n = x0.len();
    if n == 0 {
        return Err(CobylaError::EmptyX0);
    }
    if let Some(i) = x0.iter().position(|v| v.is_nan()) {
        return Err(CobylaError::NanInX0(i));
    }
    validate(n, linear, nonlinear, &x0)?;

    let m_rows: usize = linear.iter().map(|lc| lc.rows()).sum::<usize>()
        + nonlinear.iter().map(|nlc| nlc.rows()).sum::<usize>();
    let vacuous = m_rows == 0;
    let m = if vacuous { 1 } else { m_rows };

    let calcfc = move |x: &Array1<f64>| -> (f64, Array1<f64>) {
        let f = fun(x);
        let mut rows = Vec::with_capacity(m);
        emit_rows(linear, nonlinear, x, &mut rows);
        if vacuous {
            rows.push(0.0);
        }
        (f, Array1::from_vec(rows))
    };

    if config.f0.is_none() && config.constr0.is_none() {
        let (f0, c0) = calcfc(&x0);
        config.f0 = Some(f0);
        config.constr0 = Some(c0);
    }

    cobyla(&calcfc, m, x0, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_rows_emit_finite_sides_only() {
        let lc = LinearConstraint::new(
            array![[1.0, 0.0], [0.0, 1.0]],
            array![f64::NEG_INFINITY, -1.0],
            array![2.0, 1.0],
        );
        assert_eq!(lc.rows(), 3);
        let mut rows = Vec::new();
        emit_rows(&[lc], &[], &array![0.5, 0.25], &mut rows);
        // Row order: ub side then lb side per component.
        assert_eq!(rows, vec![1.5, 0.75, 1.25]);
    }

    #[test]
    fn test_equality_row_pins_both_sides() {
        // lb = ub = 1 on x0 + x1.
        let lc = LinearConstraint::new(array![[1.0, 1.0]], array![1.0], array![1.0]);
        assert_eq!(lc.rows(), 2);
        let mut rows = Vec::new();
        emit_rows(&[lc], &[], &array![0.25, 0.25], &mut rows);
        // Both rows violated by the same amount with opposite signs.
        assert_eq!(rows, vec![0.5, -0.5]);
    }

    #[test]
    fn test_nonlinear_two_sided_rows() {
        let nlc = NonlinearConstraint::new(
            |x: &Array1<f64>| array![x[0] * x[0]],
            array![25.0],
            array![100.0],
        );
        assert_eq!(nlc.rows(), 2);
        let mut rows = Vec::new();
        emit_rows(&[], &[nlc], &array![6.0, 0.0], &mut rows);
        assert_eq!(rows, vec![64.0, 11.0]);
    }

    #[test]
    fn test_shape_validation() {
        let bad = NonlinearConstraint::new(
            |x: &Array1<f64>| array![x[0], x[1]],
            array![0.0],
            array![1.0],
        );
        let err = validate(2, &[], &[bad], &array![0.0, 0.0]);
        assert!(err.is_err());
    }
}
