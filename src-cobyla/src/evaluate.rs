//! Objective/constraint evaluation behind the moderated extreme barrier
//!
//! The user function may return NaN or infinities; the solver never sees
//! them. NaN objective values become [`FUNCMAX`], NaN constraint values
//! become `-CONSTRMAX` (an unknown constraint counts as violated), and
//! everything is clipped into the finite barrier range.

use ndarray::Array1;

use crate::consts::{CONSTRMAX, FUNCMAX, REALMAX};
use crate::message::Printer;

/// Moderate a point before handing it to the user function: NaN components
/// become [`FUNCMAX`] and infinities are clipped to the largest finite value.
pub fn moderatex(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|xi| {
        let xi = if xi.is_nan() { FUNCMAX } else { xi };
        xi.clamp(-REALMAX, REALMAX)
    })
}

/// Moderate an objective value
pub fn moderatef(f: f64) -> f64 {
    if f.is_nan() { FUNCMAX } else { f.min(FUNCMAX) }
}

/// Moderate a constraint vector
pub fn moderatec(c: &Array1<f64>) -> Array1<f64> {
    c.mapv(|ci| {
        let ci = if ci.is_nan() { -CONSTRMAX } else { ci };
        ci.clamp(-CONSTRMAX, CONSTRMAX)
    })
}

/// Scalar constraint violation of a moderated constraint vector:
/// `max(0, -min(constr))`. Zero when every component is nonnegative.
pub fn violation(constr: &Array1<f64>) -> f64 {
    constr.iter().fold(0.0_f64, |acc, &ci| acc.max(-ci))
}

/// The evaluator: counts calls and applies the barrier around the user function.
pub(crate) struct Objective<'a, F> {
    calcfc: &'a F,
    nf: usize,
}

impl<'a, F> Objective<'a, F>
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    pub fn new(calcfc: &'a F) -> Self {
        Self { calcfc, nf: 0 }
    }

    pub fn nf(&self) -> usize {
        self.nf
    }

    /// Count an evaluation performed by the caller before the solver started
    /// (the f0/constr0 warm start).
    pub fn count_warm_start(&mut self) {
        self.nf += 1;
    }

    /// Evaluate the user function at `x`, which must not contain NaN.
    /// Returns the moderated `(f, constr, cstrv)`.
    pub fn eval(&mut self, x: &Array1<f64>, printer: &Printer) -> (f64, Array1<f64>, f64) {
        debug_assert!(x.iter().all(|xi| !xi.is_nan()), "x contains NaN");
        let (raw_f, raw_c) = (self.calcfc)(&moderatex(x));
        let f = moderatef(raw_f);
        let constr = moderatec(&raw_c);
        let cstrv = violation(&constr);
        self.nf += 1;
        printer.eval_msg(self.nf, f, x, cstrv);
        (f, constr, cstrv)
    }
}
