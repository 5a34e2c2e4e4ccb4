//! Construction of the initial simplex and seeding of the filter

use ndarray::{Array1, Array2, s};

use crate::ExitStatus;
use crate::cobylb::checkbreak;
use crate::consts::REALMAX;
use crate::evaluate::{Objective, moderatec, moderatef, violation};
use crate::filter::Filter;
use crate::linalg::inverse;
use crate::message::Printer;

/// Evaluate the starting point and its `n` axis-aligned neighbors at
/// distance `rhobeg`, filling `sim`, `simi`, `fval`, `conmat` and `cval`.
/// During the sweep the best vertex found so far is kept at the pole, with
/// the offset columns adjusted so that `sim[:, 0..=j]` stays lower
/// triangular. Returns which vertices got evaluated and the termination
/// status if the sweep had to stop early.
#[allow(clippy::too_many_arguments)]
pub(crate) fn initxfc<F>(
    objective: &mut Objective<'_, F>,
    printer: &Printer,
    maxfun: usize,
    constr0: &Array1<f64>,
    ctol: f64,
    f0: f64,
    ftarget: f64,
    rhobeg: f64,
    x0: &Array1<f64>,
    conmat: &mut Array2<f64>,
    cval: &mut Array1<f64>,
    fval: &mut Array1<f64>,
    sim: &mut Array2<f64>,
    simi: &mut Array2<f64>,
) -> (Vec<bool>, Option<ExitStatus>)
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    let n = x0.len();
    debug_assert!(rhobeg > 0.0);

    sim.fill(0.0);
    for j in 0..n {
        sim[[j, j]] = rhobeg;
    }
    sim.column_mut(n).assign(x0);

    fval.fill(REALMAX);
    conmat.fill(-REALMAX);
    cval.fill(REALMAX);

    let mut evaluated = vec![false; n + 1];
    let mut info = None;

    for k in 0..=n {
        let mut x = sim.column(n).to_owned();
        let (j, f, constr, cstrv) = if k == 0 {
            let constr = moderatec(constr0);
            let cstrv = violation(&constr);
            (n, moderatef(f0), constr, cstrv)
        } else {
            let j = k - 1;
            x[j] += rhobeg;
            let (f, constr, cstrv) = objective.eval(&x, printer);
            (j, f, constr, cstrv)
        };

        evaluated[j] = true;
        fval[j] = f;
        conmat.column_mut(j).assign(&constr);
        cval[j] = cstrv;

        if let Some(status) = checkbreak(maxfun, objective.nf(), cstrv, ctol, f, ftarget, &x) {
            info = Some(status);
            break;
        }

        // Keep the best vertex at the pole; the column fix-up preserves the
        // lower-triangular shape of sim[:, 0..=j].
        if j < n && fval[j] < fval[n] {
            fval.swap(j, n);
            cval.swap(j, n);
            for i in 0..conmat.nrows() {
                conmat.swap([i, j], [i, n]);
            }
            sim.column_mut(n).assign(&x);
            for jj in 0..=j {
                sim[[j, jj]] = -rhobeg;
            }
        }
    }

    // On an early termination the caller returns before touching simi, and
    // the exit reason set above must survive untouched.
    if info.is_none() && evaluated.iter().all(|&e| e) {
        match inverse(&sim.slice(s![.., ..n]).to_owned()) {
            Some(inv) => *simi = inv,
            None => info = Some(ExitStatus::DamagingRounding),
        }
    }

    (evaluated, info)
}

/// Seed the filter with every vertex evaluated during initialization.
#[allow(clippy::too_many_arguments)]
pub(crate) fn initfilt(
    conmat: &Array2<f64>,
    ctol: f64,
    cweight: f64,
    cval: &Array1<f64>,
    fval: &Array1<f64>,
    sim: &Array2<f64>,
    evaluated: &[bool],
    filter: &mut Filter,
) {
    let n = sim.nrows();
    for i in 0..=n {
        if !evaluated[i] {
            continue;
        }
        let x = if i < n {
            &sim.column(i).to_owned() + &sim.column(n)
        } else {
            sim.column(n).to_owned()
        };
        filter.save(&x, fval[i], &conmat.column(i).to_owned(), cval[i], ctol, cweight);
    }
}
