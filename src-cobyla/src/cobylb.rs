//! The trust-region driver
//!
//! One iteration: make the best vertex the pole, raise the penalty
//! parameter until the linearized merit predicts a reduction, solve the
//! linearized subproblem inside the trust region, evaluate the trial point
//! and absorb it into the simplex, then decide between contracting,
//! improving the simplex geometry, or lowering the resolution rho. The
//! returned point is chosen from the filter, not from the simplex.

use ndarray::{Array1, Array2};

use crate::consts::{EPS, REALMAX};
use crate::evaluate::Objective;
use crate::filter::Filter;
use crate::geometry::{assess_geo, geostep, setdrop_geo, setdrop_tr};
use crate::initialize::{initfilt, initxfc};
use crate::linalg::norm;
use crate::message::Printer;
use crate::trustregion::{redrat, trrad, trstlp};
use crate::update::{findpole, updatepole, updatexfc};
use crate::{CallbackAction, CobylaCallback, CobylaIntermediate, ExitStatus};

// Simplex-management factors from the COBYLA paper. Alpha and beta bound
// the acceptable geometry; gamma scales the geometry step.
const FACTOR_ALPHA: f64 = 0.25;
const FACTOR_BETA: f64 = 2.1;
const FACTOR_GAMMA: f64 = 0.5;

// Keeping the penalty parameter strictly positive guarantees prerem > 0
// whenever the subproblem solver makes progress, so the reduction ratio
// stays meaningful even on feasibility-only problems.
const CPENMIN: f64 = EPS;

/// Ratio between the typical change of the objective and that of the
/// constraints over the current simplex, used to pick the penalty
/// parameter. Zero when the constraint values give no signal.
pub(crate) fn fcratio(conmat: &Array2<f64>, fval: &Array1<f64>) -> f64 {
    let m = conmat.nrows();
    let ncols = conmat.ncols();
    let fmin = fval.iter().cloned().fold(f64::INFINITY, f64::min);
    let fmax = fval.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let mut denom = f64::INFINITY;
    for i in 0..m {
        let mut cmin = f64::INFINITY;
        let mut cmax = f64::NEG_INFINITY;
        for j in 0..ncols {
            cmin = cmin.min(conmat[[i, j]]);
            cmax = cmax.max(conmat[[i, j]]);
        }
        if cmin < 0.5 * cmax {
            denom = denom.min(cmax.max(0.0) - cmin);
        }
    }
    if denom.is_finite() && fmin < fmax {
        (fmax - fmin) / denom
    } else {
        0.0
    }
}

/// The shared rho-reduction schedule: a tenth when far from rhoend, the
/// geometric mean in the middle range, rhoend itself when close.
pub(crate) fn redrho(rho: f64, rhoend: f64) -> f64 {
    let rho_ratio = rho / rhoend;
    if rho_ratio > 250.0 {
        0.1 * rho
    } else if rho_ratio <= 16.0 {
        rhoend
    } else {
        rho_ratio.sqrt() * rhoend
    }
}

/// Check whether the iteration must stop. A later condition overrides an
/// earlier one, so exhausting the budget wins over reaching the target.
pub(crate) fn checkbreak(
    maxfun: usize,
    nf: usize,
    cstrv: f64,
    ctol: f64,
    f: f64,
    ftarget: f64,
    x: &Array1<f64>,
) -> Option<ExitStatus> {
    let mut info = None;
    // X can be Inf, as finite + finite can be Inf numerically.
    if x.iter().any(|v| v.is_nan() || v.is_infinite()) {
        info = Some(ExitStatus::NanInfX);
    }
    // The barrier should rule this out; kept for security.
    if f.is_nan() || f == f64::INFINITY || cstrv.is_nan() || cstrv == f64::INFINITY {
        info = Some(ExitStatus::NanInfF);
    }
    if cstrv <= ctol && f <= ftarget {
        info = Some(ExitStatus::FtargetAchieved);
    }
    if nf >= maxfun {
        info = Some(ExitStatus::MaxfunReached);
    }
    info
}

/// Linear models of the constraints and the objective over the simplex:
/// column `i < m` is the gradient of constraint `i`, column `m` is minus
/// the gradient of the objective.
pub(crate) fn build_models(
    conmat: &Array2<f64>,
    fval: &Array1<f64>,
    simi: &Array2<f64>,
) -> Array2<f64> {
    let m = conmat.nrows();
    let n = simi.nrows();
    let mut a = Array2::<f64>::zeros((n, m + 1));
    for i in 0..m {
        for k in 0..n {
            let mut v = 0.0;
            for j in 0..n {
                v += (conmat[[i, j]] - conmat[[i, n]]) * simi[[j, k]];
            }
            a[[k, i]] = v;
        }
    }
    for k in 0..n {
        let mut v = 0.0;
        for j in 0..n {
            v += (fval[n] - fval[j]) * simi[[j, k]];
        }
        a[[k, m]] = v;
    }
    a
}

fn build_rhs(conmat: &Array2<f64>, fval: &Array1<f64>) -> Array1<f64> {
    let m = conmat.nrows();
    let n = conmat.ncols() - 1;
    let mut b = Array1::<f64>::zeros(m + 1);
    for i in 0..m {
        b[i] = -conmat[[i, n]];
    }
    // The last entry does not influence the subproblem.
    b[m] = -fval[n];
    b
}

/// Reduction of the linearized constraint violation achieved by `d`.
fn predict_violation_reduction(
    a: &Array2<f64>,
    b: &Array1<f64>,
    d: &Array1<f64>,
    cval_pole: f64,
) -> f64 {
    let m = a.ncols() - 1;
    let n = a.nrows();
    let mut worst = 0.0_f64;
    for i in 0..m {
        let ad: f64 = (0..n).map(|k| d[k] * a[[k, i]]).sum();
        worst = worst.max(b[i] - ad);
    }
    cval_pole - worst
}

fn predict_objective_reduction(a: &Array2<f64>, d: &Array1<f64>) -> f64 {
    let m = a.ncols() - 1;
    let n = a.nrows();
    (0..n).map(|k| d[k] * a[[k, m]]).sum()
}

/// Raise the penalty parameter until the predicted merit reduction
/// `preref + cpen * prerec` is positive, re-rotating the pole whenever the
/// new penalty changes the best vertex. At most `n + 1` rounds are needed.
#[allow(clippy::too_many_arguments)]
fn getcpen(
    cpen_in: f64,
    delta: f64,
    conmat: &mut Array2<f64>,
    cval: &mut Array1<f64>,
    fval: &mut Array1<f64>,
    sim: &mut Array2<f64>,
    simi: &mut Array2<f64>,
) -> f64 {
    let n = sim.nrows();
    let mut cpen = cpen_in;

    for _ in 0..=n {
        if updatepole(cpen, conmat, cval, fval, sim, simi).is_err() {
            break;
        }
        let a = build_models(conmat, fval, simi);
        let b = build_rhs(conmat, fval);
        let d = trstlp(&a, &b, delta);
        let prerec = predict_violation_reduction(&a, &b, &d, cval[n]);
        let preref = predict_objective_reduction(&a, &d);
        if !(prerec > 0.0 && preref < 0.0) {
            break;
        }
        cpen = cpen.max((-2.0 * preref / prerec).min(REALMAX));
        if findpole(cpen, cval, fval) == n {
            break;
        }
    }
    cpen
}

pub(crate) struct CobylbResult {
    pub x: Array1<f64>,
    pub f: f64,
    pub constr: Array1<f64>,
    pub cstrv: f64,
    pub nf: usize,
    pub status: ExitStatus,
}

/// The actual computations of the solver; inputs are already validated and
/// defaulted, and the starting point has been evaluated (`f0`, `constr0`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn cobylb<F>(
    objective: &mut Objective<'_, F>,
    printer: &Printer,
    maxfilt: usize,
    maxfun: usize,
    ctol: f64,
    cweight: f64,
    eta1: f64,
    eta2: f64,
    ftarget: f64,
    gamma1: f64,
    gamma2: f64,
    rhobeg: f64,
    rhoend: f64,
    constr0: &Array1<f64>,
    f0: f64,
    x0: &Array1<f64>,
    mut callback: Option<&mut CobylaCallback>,
) -> CobylbResult
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    let n = x0.len();
    let m = constr0.len();

    let mut conmat = Array2::<f64>::from_elem((m, n + 1), -REALMAX);
    let mut cval = Array1::<f64>::from_elem(n + 1, REALMAX);
    let mut fval = Array1::<f64>::from_elem(n + 1, REALMAX);
    let mut sim = Array2::<f64>::zeros((n, n + 1));
    let mut simi = Array2::<f64>::zeros((n, n));

    let (evaluated, init_info) = initxfc(
        objective, printer, maxfun, constr0, ctol, f0, ftarget, rhobeg, x0, &mut conmat,
        &mut cval, &mut fval, &mut sim, &mut simi,
    );

    let mut filter = Filter::new(maxfilt.max(1).min(maxfun.max(1)));
    initfilt(&conmat, ctol, cweight, &cval, &fval, &sim, &evaluated, &mut filter);

    if let Some(status) = init_info {
        return finish(&filter, cweight, ctol, objective.nf(), status, printer);
    }

    let mut rho = rhobeg;
    let mut delta = rhobeg;
    let mut cpen = CPENMIN.max(fcratio(&conmat, &fval).min(1.0e3));

    // Below gamma3 * rho the radius collapses onto rho. Gamma3 must stay
    // under gamma2, or a very successful step at delta = rho would see its
    // expansion undone immediately.
    let gamma3 = 1.0_f64.max((0.75 * gamma2).min(1.5));

    let maxtr = maxfun.max(maxfun.saturating_mul(2));
    let mut status = ExitStatus::MaxtrReached;

    // Carried across iterations: when the step is too short to evaluate,
    // the decision logic below reuses the values from the last full one.
    let mut d = Array1::<f64>::zeros(n);
    let mut shortd = false;
    let mut trfail = false;
    let mut ratio = -1.0_f64;
    let mut jdrop_tr: Option<usize> = None;

    for tr in 0..maxtr {
        if let Some(cb) = callback.as_deref_mut() {
            let intermediate = CobylaIntermediate {
                x: sim.column(n).to_owned(),
                fun: fval[n],
                cstrv: cval[n],
                constr: conmat.column(n).to_owned(),
                nf: objective.nf(),
                tr,
            };
            if matches!(cb(&intermediate), CallbackAction::Stop) {
                status = ExitStatus::CallbackTerminate;
                break;
            }
        }

        // First of the two penalty updates: cpen only grows here.
        let cpen_old = cpen;
        cpen = getcpen(cpen, delta, &mut conmat, &mut cval, &mut fval, &mut sim, &mut simi);
        if cpen > cpen_old {
            printer.cpen_msg(cpen);
        }

        if updatepole(cpen, &mut conmat, &mut cval, &mut fval, &mut sim, &mut simi).is_err() {
            status = ExitStatus::DamagingRounding;
            break;
        }

        let adequate_geo = assess_geo(delta, FACTOR_ALPHA, FACTOR_BETA, &sim, &simi);

        let a = build_models(&conmat, &fval, &simi);
        let b = build_rhs(&conmat, &fval);
        d = trstlp(&a, &b, delta);
        let dnorm = delta.min(norm(d.view()));

        // Compare against rho, not delta: resolution decides what counts
        // as too short to be worth an evaluation.
        shortd = dnorm < 0.1 * rho;

        let prerec = predict_violation_reduction(&a, &b, &d, cval[n]);
        let preref = predict_objective_reduction(&a, &d);
        let prerem = preref + cpen * prerec;
        trfail = prerem.is_nan() || prerem < 1.0e-5 * cpen.min(1.0) * rho * rho;

        if shortd || trfail {
            // The subproblem gave nothing usable; contract and retry.
            delta *= 0.1;
            if delta <= gamma3 * rho {
                delta = rho;
            }
        } else {
            let x = &sim.column(n).to_owned() + &d;
            let (f, constr, cstrv) = objective.eval(&x, printer);
            filter.save(&x, f, &constr, cstrv, ctol, cweight);

            let actrem = (fval[n] + cpen * cval[n]) - (f + cpen * cstrv);
            ratio = redrat(actrem, prerem);

            delta = trrad(delta, dnorm, eta1, eta2, gamma1, gamma2, ratio);
            if delta <= gamma3 * rho {
                delta = rho;
            }

            let ximproved = actrem > 0.0;
            jdrop_tr = setdrop_tr(ximproved, &d, delta, rho, &sim, &simi);
            if updatexfc(
                jdrop_tr, &constr, cpen, cstrv, &d, f, &mut conmat, &mut cval, &mut fval,
                &mut sim, &mut simi,
            )
            .is_err()
            {
                status = ExitStatus::DamagingRounding;
                break;
            }
            if let Some(s) = checkbreak(maxfun, objective.nf(), cstrv, ctol, f, ftarget, &x) {
                status = s;
                break;
            }
        }

        // Decide the follow-up. A bad step either asks for better geometry
        // or, when the geometry is already adequate and the radius is at
        // the resolution, for a smaller rho. Never both.
        let bad_trstep = shortd || trfail || ratio <= 0.0 || jdrop_tr.is_none();
        let improve_geo = bad_trstep && !adequate_geo;
        let reduce_rho = bad_trstep && adequate_geo && delta.max(dnorm) <= rho;
        debug_assert!(!(improve_geo && reduce_rho));

        // The geometry is re-assessed: delta has changed since
        // adequate_geo was computed, and the pole may have moved.
        if improve_geo && !assess_geo(delta, FACTOR_ALPHA, FACTOR_BETA, &sim, &simi) {
            let Some(jdrop_geo) = setdrop_geo(delta, FACTOR_ALPHA, FACTOR_BETA, &sim, &simi)
            else {
                status = ExitStatus::DamagingRounding;
                break;
            };
            d = geostep(jdrop_geo, cpen, &conmat, delta, &fval, FACTOR_GAMMA, &simi);

            let x = &sim.column(n).to_owned() + &d;
            let (f, constr, cstrv) = objective.eval(&x, printer);
            filter.save(&x, f, &constr, cstrv, ctol, cweight);

            if updatexfc(
                Some(jdrop_geo), &constr, cpen, cstrv, &d, f, &mut conmat, &mut cval, &mut fval,
                &mut sim, &mut simi,
            )
            .is_err()
            {
                status = ExitStatus::DamagingRounding;
                break;
            }
            if let Some(s) = checkbreak(maxfun, objective.nf(), cstrv, ctol, f, ftarget, &x) {
                status = s;
                break;
            }
        }

        if reduce_rho {
            if rho <= rhoend {
                status = ExitStatus::SmallTrRadius;
                break;
            }
            delta = (0.5 * rho).max(redrho(rho, rhoend));
            rho = redrho(rho, rhoend);
            // Second penalty update: cpen only shrinks here.
            cpen = CPENMIN.max(cpen.min(fcratio(&conmat, &fval)));
            printer.rho_msg(rho, cpen, objective.nf(), fval[n], &sim.column(n).to_owned(), cval[n]);
            if updatepole(cpen, &mut conmat, &mut cval, &mut fval, &mut sim, &mut simi).is_err() {
                status = ExitStatus::DamagingRounding;
                break;
            }
        }
    }

    // Give the last trust-region step a chance if it was never evaluated:
    // the pole has not moved since it was computed.
    if status == ExitStatus::SmallTrRadius && shortd && objective.nf() < maxfun {
        let x = &sim.column(n).to_owned() + &d;
        let (f, constr, cstrv) = objective.eval(&x, printer);
        filter.save(&x, f, &constr, cstrv, ctol, cweight);
    }

    finish(&filter, cpen.max(cweight), ctol, objective.nf(), status, printer)
}

/// The returned iterate comes from the filter: the best evaluated point
/// under the selection merit, which the pole does not always attain.
fn finish(
    filter: &Filter,
    cweight: f64,
    ctol: f64,
    nf: usize,
    status: ExitStatus,
    printer: &Printer,
) -> CobylbResult {
    let kopt = filter.select(cweight, ctol);
    let (x, f, constr, cstrv) = filter.entry(kopt);
    printer.ret_msg(status, nf, f, x, cstrv);
    CobylbResult {
        x: x.clone(),
        f,
        constr: constr.clone(),
        cstrv,
        nf,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fcratio_typical_changes() {
        // One constraint varying over [-2, 2], objective over [0, 6]:
        // denom = 4, ratio = 6/4.
        let conmat = array![[-2.0, 0.0, 2.0]];
        let fval = array![0.0, 3.0, 6.0];
        assert_eq!(fcratio(&conmat, &fval), 1.5);
    }

    #[test]
    fn test_fcratio_no_signal() {
        // Constant constraint values give no signal.
        let conmat = array![[1.0, 1.0, 1.0]];
        let fval = array![0.0, 3.0, 6.0];
        assert_eq!(fcratio(&conmat, &fval), 0.0);
    }

    #[test]
    fn test_redrho_schedule() {
        // Far from the end: a tenth.
        assert_eq!(redrho(1.0, 1e-6), 0.1);
        // Close to the end: snap to it.
        assert_eq!(redrho(1.5e-6, 1e-6), 1e-6);
        // In between: geometric mean.
        let rho = redrho(1e-4, 1e-6);
        assert!((rho - 1e-5).abs() < 1e-18);
    }

    #[test]
    fn test_checkbreak_priorities() {
        let x = array![0.0, 0.0];
        assert_eq!(checkbreak(100, 5, 0.0, 0.0, 1.0, f64::NEG_INFINITY, &x), None);
        assert_eq!(
            checkbreak(100, 5, 0.0, 0.0, -1.0, 0.0, &x),
            Some(ExitStatus::FtargetAchieved)
        );
        // Budget exhaustion overrides the target.
        assert_eq!(
            checkbreak(5, 5, 0.0, 0.0, -1.0, 0.0, &x),
            Some(ExitStatus::MaxfunReached)
        );
        // A violated point does not trigger the target.
        assert_eq!(checkbreak(100, 5, 1.0, 0.0, -1.0, 0.0, &x), None);
        let bad = array![f64::INFINITY, 0.0];
        assert_eq!(
            checkbreak(100, 5, 0.0, 0.0, 1.0, f64::NEG_INFINITY, &bad),
            Some(ExitStatus::NanInfX)
        );
    }

    #[test]
    fn test_build_models_recovers_linear_gradients() {
        // f(x) = 3 x0 - x1 and c(x) = x0 + 2 x1 over the unit simplex at
        // the origin: the models must reproduce the exact gradients.
        let sim = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let simi = array![[1.0, 0.0], [0.0, 1.0]];
        let fval = array![3.0, -1.0, 0.0];
        let conmat = array![[1.0, 2.0, 0.0]];
        let a = build_models(&conmat, &fval, &simi);
        // Constraint gradient.
        assert_eq!(a[[0, 0]], 1.0);
        assert_eq!(a[[1, 0]], 2.0);
        // Minus the objective gradient.
        assert_eq!(a[[0, 1]], -3.0);
        assert_eq!(a[[1, 1]], 1.0);
    }
}
