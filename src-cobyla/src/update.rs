//! Simplex bookkeeping: vertex replacement and pole rotation
//!
//! The simplex is stored as `sim` (n x (n+1)): column `n` is the pole (the
//! current best point) and columns `0..n` hold vertex offsets from it.
//! `simi` tracks the inverse of the offset block and is maintained by
//! rank-1 updates; when rounding damages it beyond repair both matrices are
//! reverted and the caller is told.

use ndarray::{Array1, Array2, s};

use crate::linalg::inverse;

/// Tolerance on the inf-norm of `simi * sim[:, :n] - I` at rest.
pub(crate) const ITOL: f64 = 1.0;

/// Rounding errors have damaged the simplex inverse beyond repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DamagingRounding;

/// Inf-norm of `simi * sim[:, :n] - I`; NaN if any product entry is NaN.
fn inverse_error(sim: &Array2<f64>, simi: &Array2<f64>) -> f64 {
    let n = simi.nrows();
    let mut erri = 0.0_f64;
    for i in 0..n {
        for j in 0..n {
            let mut v = 0.0;
            for k in 0..n {
                v += simi[[i, k]] * sim[[k, j]];
            }
            if i == j {
                v -= 1.0;
            }
            if v.is_nan() {
                return f64::NAN;
            }
            erri = erri.max(v.abs());
        }
    }
    erri
}

/// Verify `simi` against `sim`; if the error is out of tolerance, try a full
/// refactorization and keep whichever inverse is better. Returns the final
/// error, possibly NaN.
fn verify_or_refactor(sim: &Array2<f64>, simi: &mut Array2<f64>) -> f64 {
    let n = simi.nrows();
    let mut erri = inverse_error(sim, simi);
    if erri > 0.1 * ITOL || erri.is_nan() {
        if let Some(fresh) = inverse(&sim.slice(s![.., ..n]).to_owned()) {
            let erri_fresh = inverse_error(sim, &fresh);
            if erri_fresh < erri || (erri.is_nan() && !erri_fresh.is_nan()) {
                *simi = fresh;
                erri = erri_fresh;
            }
        }
    }
    erri
}

/// Translate the simplex so that the pole moves by `t`: the pole column
/// gains `t` and every offset column loses it. Shared by the vertex
/// replacement (when the trial point replaces the pole) and the pole
/// rotation.
fn translate_pole(sim: &mut Array2<f64>, t: &Array1<f64>) {
    let n = sim.nrows();
    for i in 0..n {
        sim[[i, n]] += t[i];
    }
    for j in 0..n {
        for i in 0..n {
            sim[[i, j]] -= t[i];
        }
    }
}

/// Replace a vertex of the simplex with the trial step `d` (expressed
/// relative to the pole) and record its objective/constraint values.
/// `jdrop = None` means the step was judged not worth keeping; nothing
/// happens. `jdrop = n` replaces the pole itself, translating the simplex.
#[allow(clippy::too_many_arguments)]
pub(crate) fn updatexfc(
    jdrop: Option<usize>,
    constr: &Array1<f64>,
    cpen: f64,
    cstrv: f64,
    d: &Array1<f64>,
    f: f64,
    conmat: &mut Array2<f64>,
    cval: &mut Array1<f64>,
    fval: &mut Array1<f64>,
    sim: &mut Array2<f64>,
    simi: &mut Array2<f64>,
) -> Result<(), DamagingRounding> {
    let Some(jdrop) = jdrop else {
        return Ok(());
    };
    let n = sim.nrows();

    let sim_old = sim.clone();
    let simi_old = simi.clone();

    if jdrop < n {
        sim.column_mut(jdrop).assign(d);
        // Rank-1 update of the inverse for a single changed column.
        let simid = simi.dot(d);
        let denom = simid[jdrop];
        let simi_jdrop = simi.row(jdrop).to_owned() / denom;
        for i in 0..n {
            for j in 0..n {
                simi[[i, j]] -= simid[i] * simi_jdrop[j];
            }
        }
        simi.row_mut(jdrop).assign(&simi_jdrop);
    } else {
        // The trial point replaces the pole.
        let simid = simi.dot(d);
        let sum_simid = simid.sum();
        let colsum: Array1<f64> = (0..n).map(|j| simi.column(j).sum()).collect();
        translate_pole(sim, d);
        for i in 0..n {
            for j in 0..n {
                simi[[i, j]] += simid[i] * colsum[j] / (1.0 - sum_simid);
            }
        }
    }

    let erri = verify_or_refactor(sim, simi);
    if erri <= ITOL {
        fval[jdrop] = f;
        conmat.column_mut(jdrop).assign(constr);
        cval[jdrop] = cstrv;
        updatepole(cpen, conmat, cval, fval, sim, simi)
    } else {
        *sim = sim_old;
        *simi = simi_old;
        Err(DamagingRounding)
    }
}

/// Identify the best vertex under the merit `phi = f + cpen * cstrv`.
/// The pole keeps its place on ties.
pub(crate) fn findpole(cpen: f64, cval: &Array1<f64>, fval: &Array1<f64>) -> usize {
    let n = fval.len() - 1;
    let phi: Vec<f64> = fval
        .iter()
        .zip(cval.iter())
        .map(|(&fj, &cj)| fj + cpen * cj)
        .collect();

    let mut jopt = n;
    let mut candidate = n;
    let mut phimin = f64::INFINITY;
    for (j, &pj) in phi.iter().enumerate() {
        if pj < phimin {
            phimin = pj;
            candidate = j;
        }
    }
    if phi[candidate] < phi[jopt] {
        jopt = candidate;
    }
    if cpen <= 0.0 && (0..=n).any(|j| cval[j] < cval[jopt] && phi[j] <= phimin) {
        let cmin = (0..=n)
            .filter(|&j| phi[j] <= phimin)
            .map(|j| cval[j])
            .fold(f64::INFINITY, f64::min);
        if let Some(j) = (0..=n).find(|&j| cval[j] == cmin) {
            jopt = j;
        }
    }
    jopt
}

/// Rotate the best vertex into the pole column, updating `simi` with the
/// involutive row identity of the rotation matrix, and swap the stored
/// objective/constraint values accordingly.
pub(crate) fn updatepole(
    cpen: f64,
    conmat: &mut Array2<f64>,
    cval: &mut Array1<f64>,
    fval: &mut Array1<f64>,
    sim: &mut Array2<f64>,
    simi: &mut Array2<f64>,
) -> Result<(), DamagingRounding> {
    let n = sim.nrows();
    let jopt = findpole(cpen, cval, fval);

    let sim_old = sim.clone();
    let simi_old = simi.clone();

    if jopt < n {
        let t = sim.column(jopt).to_owned();
        translate_pole(sim, &t);
        // The old pole becomes vertex jopt.
        for i in 0..n {
            sim[[i, jopt]] = -t[i];
        }
        // The rotation matrix is its own inverse: row jopt of the new
        // inverse is minus the sum of all rows, the others are unchanged.
        let rowsum: Array1<f64> = (0..n).map(|j| -simi_old.column(j).sum()).collect();
        simi.row_mut(jopt).assign(&rowsum);
    }

    let erri = verify_or_refactor(sim, simi);
    if erri <= ITOL {
        if jopt < n {
            fval.swap(jopt, n);
            cval.swap(jopt, n);
            for i in 0..conmat.nrows() {
                conmat.swap([i, jopt], [i, n]);
            }
        }
        Ok(())
    } else {
        *sim = sim_old;
        *simi = simi_old;
        Err(DamagingRounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_simplex() -> (Array2<f64>, Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        // Offsets 0.5*I, pole at (1, 1).
        let sim = array![[0.5, 0.0, 1.0], [0.0, 0.5, 1.0]];
        let simi = array![[2.0, 0.0], [0.0, 2.0]];
        let fval = array![3.0, 2.0, 1.0];
        let conmat = array![[0.0, 0.0, 0.0]];
        let cval = array![0.0, 0.0, 0.0];
        (sim, simi, fval, conmat, cval)
    }

    #[test]
    fn test_findpole_prefers_lowest_merit() {
        let fval = array![3.0, 2.0, 1.0];
        let cval = array![0.0, 0.0, 0.0];
        assert_eq!(findpole(1.0, &cval, &fval), 2);
        let fval = array![0.5, 2.0, 1.0];
        assert_eq!(findpole(1.0, &cval, &fval), 0);
    }

    #[test]
    fn test_findpole_weighs_violation() {
        let fval = array![0.0, 2.0, 1.0];
        let cval = array![10.0, 0.0, 0.0];
        // With a large penalty the violated vertex loses.
        assert_eq!(findpole(1.0, &cval, &fval), 2);
        // With a tiny penalty it wins.
        assert_eq!(findpole(1e-12, &cval, &fval), 0);
    }

    #[test]
    fn test_updatepole_moves_best_vertex_and_keeps_inverse() {
        let (mut sim, mut simi, mut fval, mut conmat, mut cval) = sample_simplex();
        fval = array![0.5, 2.0, 1.0];
        updatepole(1.0, &mut conmat, &mut cval, &mut fval, &mut sim, &mut simi).unwrap();
        // The best vertex value is now at the pole.
        assert_eq!(fval[2], 0.5);
        // Pole merit is minimal among all vertices.
        for j in 0..2 {
            assert!(fval[2] + cval[2] <= fval[j] + cval[j]);
        }
        // Geometry: pole moved to (1.5, 1), old pole kept as a vertex.
        assert_eq!(sim.column(2).to_vec(), vec![1.5, 1.0]);
        assert!(inverse_error(&sim, &simi) <= 0.1);
    }

    #[test]
    fn test_updatepole_is_idempotent() {
        let (mut sim, mut simi, mut fval, mut conmat, mut cval) = sample_simplex();
        fval = array![0.5, 2.0, 1.0];
        updatepole(1.0, &mut conmat, &mut cval, &mut fval, &mut sim, &mut simi).unwrap();
        let sim1 = sim.clone();
        let fval1 = fval.clone();
        updatepole(1.0, &mut conmat, &mut cval, &mut fval, &mut sim, &mut simi).unwrap();
        assert_eq!(sim, sim1);
        assert_eq!(fval, fval1);
    }

    #[test]
    fn test_updatexfc_replaces_vertex() {
        let (mut sim, mut simi, mut fval, mut conmat, mut cval) = sample_simplex();
        let d = array![0.25, 0.25];
        let constr = array![0.0];
        updatexfc(
            Some(0),
            &constr,
            1.0,
            0.0,
            &d,
            5.0,
            &mut conmat,
            &mut cval,
            &mut fval,
            &mut sim,
            &mut simi,
        )
        .unwrap();
        // Vertex 0 holds the new point and the inverse is still consistent.
        assert!(fval.iter().any(|&v| v == 5.0));
        assert!(inverse_error(&sim, &simi) <= 0.1);
    }

    #[test]
    fn test_updatexfc_none_is_noop() {
        let (mut sim, mut simi, mut fval, mut conmat, mut cval) = sample_simplex();
        let sim0 = sim.clone();
        let d = array![0.25, 0.25];
        let constr = array![0.0];
        updatexfc(
            None,
            &constr,
            1.0,
            0.0,
            &d,
            5.0,
            &mut conmat,
            &mut cval,
            &mut fval,
            &mut sim,
            &mut simi,
        )
        .unwrap();
        assert_eq!(sim, sim0);
    }

    #[test]
    fn test_updatexfc_pole_translation() {
        let (mut sim, mut simi, mut fval, mut conmat, mut cval) = sample_simplex();
        let d = array![0.1, -0.2];
        let constr = array![0.0];
        updatexfc(
            Some(2),
            &constr,
            1.0,
            0.0,
            &d,
            0.1,
            &mut conmat,
            &mut cval,
            &mut fval,
            &mut sim,
            &mut simi,
        )
        .unwrap();
        assert_eq!(fval[2], 0.1);
        assert!(inverse_error(&sim, &simi) <= 0.1);
    }
}
