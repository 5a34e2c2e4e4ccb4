//! Simplex geometry control
//!
//! A simplex is acceptable for interpolation when none of its edges is too
//! long (`||sim[:, j]|| <= beta * delta`) and none of its "heights" is too
//! small (`1 / ||simi[j, :]|| >= alpha * delta`). When the trust-region
//! step cannot make progress and the geometry is inadequate, one vertex is
//! replaced by a step designed purely to restore these bounds.

use ndarray::{Array1, Array2};

use crate::cobylb::build_models;
use crate::linalg::norm;

/// Is the interpolation set acceptable at resolution `delta`?
pub(crate) fn assess_geo(
    delta: f64,
    factor_alpha: f64,
    factor_beta: f64,
    sim: &Array2<f64>,
    simi: &Array2<f64>,
) -> bool {
    let n = sim.nrows();
    for j in 0..n {
        let veta = norm(sim.column(j));
        let vsig = 1.0 / norm(simi.row(j));
        // Negated comparisons so that NaN reads as inadequate.
        if !(veta <= factor_beta * delta) || !(vsig >= factor_alpha * delta) {
            return false;
        }
    }
    true
}

/// Choose the vertex to replace with the trust-region trial point, or
/// `None` to discard the point. Vertices are scored by the magnitude of
/// their barycentric coordinate at `d`, weighted up for vertices far from
/// the trial point (or from the pole when the merit did not improve).
/// When the step improved the merit the point is always kept: if no vertex
/// scores, the pole itself is replaced, translating the simplex.
pub(crate) fn setdrop_tr(
    ximproved: bool,
    d: &Array1<f64>,
    _delta: f64,
    rho: f64,
    sim: &Array2<f64>,
    simi: &Array2<f64>,
) -> Option<usize> {
    let n = sim.nrows();
    if d.iter().any(|v| v.is_nan()) {
        return None;
    }
    let simid = simi.dot(d);

    let mut score = Vec::with_capacity(n);
    for j in 0..n {
        let distsq: f64 = (0..n)
            .map(|i| {
                let s = if ximproved { sim[[i, j]] - d[i] } else { sim[[i, j]] };
                s * s
            })
            .sum();
        let weight = (distsq / (rho * rho)).max(1.0);
        score.push(weight * simid[j].abs());
    }

    let mut jmax = None;
    let mut best = 0.0_f64;
    for (j, &sj) in score.iter().enumerate() {
        if sj > best {
            best = sj;
            jmax = Some(j);
        }
    }

    if score.iter().any(|&s| s > 1.0) || (ximproved && score.iter().any(|&s| s > 0.0)) {
        jmax
    } else if ximproved {
        Some(n)
    } else {
        None
    }
}

/// Choose the vertex worst for the geometry: the longest edge if any edge
/// exceeds `beta * delta`, otherwise the smallest height below
/// `alpha * delta`. Never the pole. `None` only if the simplex data is so
/// damaged that neither bound identifies a vertex.
pub(crate) fn setdrop_geo(
    delta: f64,
    factor_alpha: f64,
    factor_beta: f64,
    sim: &Array2<f64>,
    simi: &Array2<f64>,
) -> Option<usize> {
    let n = sim.nrows();
    let veta: Vec<f64> = (0..n).map(|j| norm(sim.column(j))).collect();
    let vsig: Vec<f64> = (0..n).map(|j| 1.0 / norm(simi.row(j))).collect();

    if veta.iter().any(|&v| v > factor_beta * delta) {
        let mut jmax = None;
        let mut best = f64::NEG_INFINITY;
        for (j, &v) in veta.iter().enumerate() {
            if v > best {
                best = v;
                jmax = Some(j);
            }
        }
        jmax
    } else if vsig.iter().any(|&v| v < factor_alpha * delta) {
        let mut jmin = None;
        let mut best = f64::INFINITY;
        for (j, &v) in vsig.iter().enumerate() {
            if v < best {
                best = v;
                jmin = Some(j);
            }
        }
        jmin
    } else {
        None
    }
}

/// Geometry-improving step of length `factor_gamma * delta` along the
/// direction orthogonal to the face opposite vertex `jdrop`, with the sign
/// chosen to decrease the linearized merit function.
pub(crate) fn geostep(
    jdrop: usize,
    cpen: f64,
    conmat: &Array2<f64>,
    delta: f64,
    fval: &Array1<f64>,
    factor_gamma: f64,
    simi: &Array2<f64>,
) -> Array1<f64> {
    let n = simi.nrows();
    let m = conmat.nrows();

    let row_norm = norm(simi.row(jdrop));
    let mut d: Array1<f64> = simi.row(jdrop).to_owned() * (factor_gamma * delta / row_norm);

    let a = build_models(conmat, fval, simi);
    // Linearized violations of +d and -d relative to the pole.
    let mut cvmaxp = 0.0_f64;
    let mut cvmaxm = 0.0_f64;
    for i in 0..m {
        let gd: f64 = (0..n).map(|k| d[k] * a[[k, i]]).sum();
        cvmaxp = cvmaxp.max(-gd - conmat[[i, n]]);
        cvmaxm = cvmaxm.max(gd - conmat[[i, n]]);
    }
    let dobj: f64 = (0..n).map(|k| d[k] * a[[k, m]]).sum();
    if 2.0 * dobj < cpen * (cvmaxp - cvmaxm) {
        d.mapv_inplace(|v| -v);
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_assess_geo_accepts_fresh_simplex() {
        // rhobeg-scaled identity offsets are acceptable at delta = rhobeg.
        let sim = array![[0.5, 0.0, 0.0], [0.0, 0.5, 0.0]];
        let simi = array![[2.0, 0.0], [0.0, 2.0]];
        assert!(assess_geo(0.5, 0.25, 2.1, &sim, &simi));
    }

    #[test]
    fn test_assess_geo_rejects_long_edge() {
        let sim = array![[5.0, 0.0, 0.0], [0.0, 0.5, 0.0]];
        let simi = array![[0.2, 0.0], [0.0, 2.0]];
        assert!(!assess_geo(0.5, 0.25, 2.1, &sim, &simi));
    }

    #[test]
    fn test_assess_geo_rejects_thin_simplex() {
        // Second vertex nearly parallel to the first.
        let sim = array![[0.5, 0.5, 0.0], [0.0, 1e-4, 0.0]];
        let simi = array![[2.0, -5000.0], [0.0, 10000.0]];
        assert!(!assess_geo(0.5, 0.25, 2.1, &sim, &simi));
    }

    #[test]
    fn test_setdrop_geo_picks_long_edge() {
        let sim = array![[5.0, 0.0, 0.0], [0.0, 0.5, 0.0]];
        let simi = array![[0.2, 0.0], [0.0, 2.0]];
        assert_eq!(setdrop_geo(0.5, 0.25, 2.1, &sim, &simi), Some(0));
    }

    #[test]
    fn test_setdrop_tr_keeps_improving_point() {
        let sim = array![[0.5, 0.0, 0.0], [0.0, 0.5, 0.0]];
        let simi = array![[2.0, 0.0], [0.0, 2.0]];
        let d = array![0.3, 0.0];
        let jdrop = setdrop_tr(true, &d, 0.5, 0.5, &sim, &simi);
        assert_eq!(jdrop, Some(0));
    }

    #[test]
    fn test_setdrop_tr_discards_useless_point() {
        let sim = array![[0.5, 0.0, 0.0], [0.0, 0.5, 0.0]];
        let simi = array![[2.0, 0.0], [0.0, 2.0]];
        // Tiny step, no improvement: no vertex is worth dropping.
        let d = array![0.01, 0.01];
        assert_eq!(setdrop_tr(false, &d, 0.5, 0.5, &sim, &simi), None);
    }

    #[test]
    fn test_geostep_has_requested_length_and_sign() {
        let sim = array![[0.5, 0.0, 0.0], [0.0, 0.5, 0.0]];
        let simi = array![[2.0, 0.0], [0.0, 2.0]];
        // Objective decreasing in +x: fval at vertex 0 lower than the pole.
        let fval = array![0.0, 1.0, 1.0];
        let conmat = array![[0.0, 0.0, 0.0]];
        let d = geostep(0, 1.0, &conmat, 0.5, &fval, 0.5, &simi);
        let len = (d[0] * d[0] + d[1] * d[1]).sqrt();
        assert!((len - 0.25).abs() < 1e-12);
        // The merit decreases along +x, so the step points that way.
        assert!(d[0] > 0.0);
        let _ = sim;
    }
}
