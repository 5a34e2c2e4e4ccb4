//! Filter of mutually non-dominated iterates
//!
//! The filter only decides which evaluated point is returned at the end; it
//! never interferes with the iterations. An entry is a point together with
//! its objective value, constraint vector and scalar violation. No entry
//! strictly dominates another under [`is_better`].

use ndarray::Array1;

use crate::consts::{CONSTRMAX, EPS, FUNCMAX, REALMAX};

/// Does `(f1, c1)` strictly dominate `(f2, c2)`? Here `c` is the scalar
/// constraint violation, a nonnegative number, and `ctol` is the violation
/// below which a point counts as feasible.
pub fn is_better(f1: f64, c1: f64, f2: f64, c2: f64, ctol: f64) -> bool {
    if f1.is_nan() || c1.is_nan() {
        return false;
    }
    if (f1 < f2 && c1 <= c2) || (f1 <= f2 && c1 < c2) {
        return true;
    }
    // A feasible point beats one whose violation is clearly above the
    // tolerance. The MIN avoids overflow when ctol is huge.
    let cref = 10.0 * EPS.max(ctol.min(0.01 * CONSTRMAX));
    f1 < REALMAX && c1 <= ctol && (c2 > ctol.max(cref) || c2.is_nan())
}

pub(crate) struct Filter {
    maxfilt: usize,
    x: Vec<Array1<f64>>,
    f: Vec<f64>,
    constr: Vec<Array1<f64>>,
    cstrv: Vec<f64>,
}

impl Filter {
    pub fn new(maxfilt: usize) -> Self {
        let maxfilt = maxfilt.max(1);
        Self {
            maxfilt,
            x: Vec::new(),
            f: Vec::new(),
            constr: Vec::new(),
            cstrv: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.f.len()
    }

    pub fn entry(&self, k: usize) -> (&Array1<f64>, f64, &Array1<f64>, f64) {
        (&self.x[k], self.f[k], &self.constr[k], self.cstrv[k])
    }

    /// Insert a candidate unless an existing entry dominates it; entries the
    /// candidate dominates are removed. When the filter is full and nothing
    /// can be removed by dominance, the worst entry under the merit
    /// `phi = f + cweight * max(cstrv - ctol, 0)` is evicted.
    pub fn save(
        &mut self,
        x: &Array1<f64>,
        f: f64,
        constr: &Array1<f64>,
        cstrv: f64,
        ctol: f64,
        cweight: f64,
    ) {
        if self
            .f
            .iter()
            .zip(self.cstrv.iter())
            .any(|(&fi, &ci)| is_better(fi, ci, f, cstrv, ctol))
        {
            return;
        }

        let mut keep: Vec<bool> = self
            .f
            .iter()
            .zip(self.cstrv.iter())
            .map(|(&fi, &ci)| !is_better(f, cstrv, fi, ci, ctol))
            .collect();

        if keep.iter().filter(|&&k| k).count() == self.maxfilt {
            keep[self.worst_entry(ctol, cweight)] = false;
        }

        let mut idx = 0;
        for k in 0..keep.len() {
            if keep[k] {
                if idx != k {
                    self.x.swap(idx, k);
                    self.f.swap(idx, k);
                    self.constr.swap(idx, k);
                    self.cstrv.swap(idx, k);
                }
                idx += 1;
            }
        }
        self.x.truncate(idx);
        self.f.truncate(idx);
        self.constr.truncate(idx);
        self.cstrv.truncate(idx);

        self.x.push(x.clone());
        self.f.push(f);
        self.constr.push(constr.clone());
        self.cstrv.push(cstrv);
    }

    /// Index of the entry to evict when the filter is full. The merit and
    /// the tie-breaks are the mirror image of [`Filter::select`]: maximize
    /// phi, then the shifted violation, then f, then the raw violation,
    /// taking the lowest index when everything ties.
    fn worst_entry(&self, ctol: f64, cweight: f64) -> usize {
        let shifted: Vec<f64> = self.cstrv.iter().map(|&c| (c - ctol).max(0.0)).collect();
        let phi: Vec<f64> = if cweight <= 0.0 {
            self.f.clone()
        } else if cweight == f64::INFINITY {
            shifted.clone()
        } else {
            self.f
                .iter()
                .zip(shifted.iter())
                .map(|(&fi, &si)| {
                    let fi = if fi.is_nan() { -REALMAX } else { fi.max(-REALMAX) };
                    fi + cweight * si
                })
                .collect()
        };

        let phimax = phi.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let cref = phi
            .iter()
            .zip(shifted.iter())
            .filter(|&(&p, _)| p >= phimax)
            .map(|(_, &s)| s)
            .fold(f64::NEG_INFINITY, f64::max);
        let fref = shifted
            .iter()
            .zip(self.f.iter())
            .filter(|&(&s, _)| s >= cref)
            .map(|(_, &fi)| fi)
            .fold(f64::NEG_INFINITY, f64::max);
        let cmax = self
            .f
            .iter()
            .zip(self.cstrv.iter())
            .filter(|&(&fi, _)| fi <= fref)
            .map(|(_, &ci)| ci)
            .fold(f64::NEG_INFINITY, f64::max);
        self.cstrv.iter().position(|&ci| ci == cmax).unwrap_or(0)
    }

    /// Select the entry to return: minimize `phi = max(f, -REALMAX) +
    /// cweight * max(cstrv - ctol, 0)` among entries below the tightest
    /// usable references, breaking ties by smaller shifted violation, then
    /// smaller f, then smaller raw violation, then lowest index.
    pub fn select(&self, cweight: f64, ctol: f64) -> usize {
        let nhist = self.len();
        debug_assert!(nhist > 0);

        let usable = |fref: f64, cref: f64| {
            self.f
                .iter()
                .zip(self.cstrv.iter())
                .any(|(&fi, &ci)| fi < fref && ci < cref)
        };
        let (fref, cref) = if usable(FUNCMAX, CONSTRMAX) {
            (FUNCMAX, CONSTRMAX)
        } else if usable(REALMAX, CONSTRMAX) {
            (REALMAX, CONSTRMAX)
        } else if usable(FUNCMAX, REALMAX) {
            (FUNCMAX, REALMAX)
        } else {
            (REALMAX, REALMAX)
        };

        if !usable(fref, cref) {
            return nhist - 1;
        }

        // Shift the violations so that cstrv <= ctol counts as no violation.
        let shifted: Vec<f64> = self.cstrv.iter().map(|&c| (c - ctol).max(0.0)).collect();
        let cmin = self
            .f
            .iter()
            .zip(shifted.iter())
            .filter(|&(&fi, _)| fi < fref)
            .map(|(_, &s)| s)
            .fold(f64::INFINITY, f64::min);
        // Without the EPS floor, cmin = 0 would rule out every point below.
        let cref = EPS.max(2.0 * cmin);

        let phi: Vec<f64> = if cweight <= 0.0 {
            self.f.clone()
        } else if cweight == f64::INFINITY {
            shifted.clone()
        } else {
            self.f
                .iter()
                .zip(shifted.iter())
                .map(|(&fi, &si)| fi.max(-REALMAX) + cweight * si)
                .collect()
        };

        let phimin = self
            .f
            .iter()
            .zip(shifted.iter())
            .zip(phi.iter())
            .filter(|&((&fi, &si), _)| fi < fref && si <= cref)
            .map(|(_, &p)| p)
            .fold(f64::INFINITY, f64::min);
        let cref = self
            .f
            .iter()
            .zip(shifted.iter())
            .zip(phi.iter())
            .filter(|&((&fi, _), &p)| fi < fref && p <= phimin)
            .map(|((_, &si), _)| si)
            .fold(f64::INFINITY, f64::min);
        let fref = shifted
            .iter()
            .zip(self.f.iter())
            .filter(|&(&si, _)| si <= cref)
            .map(|(_, &fi)| fi)
            .fold(f64::INFINITY, f64::min);
        let copt = self
            .f
            .iter()
            .zip(self.cstrv.iter())
            .filter(|&(&fi, _)| fi <= fref)
            .map(|(_, &ci)| ci)
            .fold(f64::INFINITY, f64::min);
        self.cstrv
            .iter()
            .zip(self.f.iter())
            .position(|(&ci, &fi)| ci == copt && fi <= fref)
            .unwrap_or(nhist - 1)
    }
}
