//! Trust-region subproblem solver
//!
//! [`trstlp`] computes the trial step of one trust-region iteration from
//! the linearized problem
//!
//! ```text
//! maximize A[:, m] . d   subject to   A[:, i] . d >= b[i]  (i < m),  ||d|| <= delta
//! ```
//!
//! by Powell's two-stage active-set scheme. Stage one finds the step of
//! least length that minimizes the worst violation of the linear
//! constraints; if the violation reaches zero strictly inside the ball,
//! stage two spends the remaining freedom on the objective, never letting a
//! violation grow past its stage-one level. The active normals are kept in
//! a plane-rotation (QR-like) factorization: `z` is orthonormal and
//! `z[:, k] . A[:, iact[j]] = 0` for `k > j`, with diagonal `zdota`.
//!
//! Inner products whose value could be pure rounding noise are forced to
//! zero, candidate ties are broken toward the smallest index, and each
//! stage carries a three-strikes guard against cycling.

use ndarray::{Array1, Array2, ArrayView1};

use crate::consts::{EPS, REALMAX};

/// Zero out a sum whose magnitude is attributable to rounding in its terms.
fn kill_rounding(sum: f64, sumabs: f64) -> f64 {
    let acca = sumabs + 0.1 * sum.abs();
    let accb = sumabs + 0.2 * sum.abs();
    if sumabs >= acca || acca >= accb { 0.0 } else { sum }
}

fn inprod(u: ArrayView1<f64>, v: ArrayView1<f64>) -> f64 {
    u.iter().zip(v.iter()).map(|(x, y)| x * y).sum()
}

fn inprod_moderated(u: ArrayView1<f64>, v: ArrayView1<f64>) -> f64 {
    let mut sum = 0.0;
    let mut sumabs = 0.0;
    for (x, y) in u.iter().zip(v.iter()) {
        let t = x * y;
        sum += t;
        sumabs += t.abs();
    }
    kill_rounding(sum, sumabs)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Feasibility,
    Objective,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StageEnd {
    /// The step reached the trust-region boundary; nothing left to do.
    OnBall,
    /// The stage ran out of work (converged, stalled, or failed to progress).
    Done,
}

struct ActiveSet {
    n: usize,
    /// Number of genuine constraints (the objective is appended as an
    /// extra column in stage two).
    m: usize,
    d: Array1<f64>,
    z: Array2<f64>,
    zdota: Vec<f64>,
    vmultc: Vec<f64>,
    iact: Vec<usize>,
    nact: usize,
    cviol: f64,
}

/// Compute the trust-region trial step. `a` is `n x (m+1)`: constraint
/// gradients in the first `m` columns, minus the objective gradient in the
/// last. `b` holds the constraint right-hand sides (its last entry is
/// unused by the mathematics and kept only for symmetry).
pub(crate) fn trstlp(a: &Array2<f64>, b: &Array1<f64>, delta: f64) -> Array1<f64> {
    let n = a.nrows();
    let m = a.ncols() - 1;
    let mut ws = ActiveSet {
        n,
        m,
        d: Array1::zeros(n),
        z: Array2::zeros((n, n)),
        zdota: vec![0.0; n],
        vmultc: vec![0.0; m + 1],
        iact: (0..=m).collect(),
        nact: 0,
        cviol: 0.0,
    };
    if ws.solve_stage(a, b, delta, Stage::Feasibility) == StageEnd::OnBall {
        return ws.d;
    }
    ws.solve_stage(a, b, delta, Stage::Objective);
    ws.d
}

impl ActiveSet {
    fn solve_stage(
        &mut self,
        a: &Array2<f64>,
        b: &Array1<f64>,
        delta: f64,
        stage: Stage,
    ) -> StageEnd {
        let n = self.n;
        let m = self.m;
        let mcon = match stage {
            Stage::Feasibility => m,
            Stage::Objective => m + 1,
        };

        let mut icon = match stage {
            Stage::Feasibility => {
                for k in 0..m {
                    self.iact[k] = k;
                }
                self.nact = 0;
                self.d.fill(0.0);
                self.z = Array2::eye(n);
                self.cviol = b.iter().take(m).fold(0.0_f64, |acc, &bi| acc.max(bi));
                for k in 0..m {
                    self.vmultc[k] = self.cviol - b[k];
                }
                if m == 0 || self.cviol <= 0.0 {
                    return StageEnd::Done;
                }
                let mut imax = None;
                let mut bmax = f64::NEG_INFINITY;
                for (k, &bk) in b.iter().take(m).enumerate() {
                    if bk > bmax {
                        bmax = bk;
                        imax = Some(k);
                    }
                }
                match imax {
                    Some(k) => k,
                    None => return StageEnd::Done,
                }
            }
            Stage::Objective => {
                if inprod(self.d.view(), self.d.view()) >= delta * delta {
                    return StageEnd::OnBall;
                }
                self.iact[mcon - 1] = mcon - 1;
                self.vmultc[mcon - 1] = 0.0;
                mcon - 1
            }
        };

        let mut sdirn = Array1::<f64>::zeros(n);
        let mut optold = f64::INFINITY;
        let mut nactold = self.nact;
        let mut nfail = 0usize;
        let maxiter = 10_000.min(100 * mcon.max(n));

        for _ in 0..maxiter {
            let optnew = match stage {
                Stage::Feasibility => self.cviol,
                Stage::Objective => -inprod(self.d.view(), a.column(mcon - 1)),
            };
            // Three consecutive iterations without a better objective or a
            // larger active set end the stage; this prevents cycling.
            if optnew < optold || self.nact > nactold {
                nactold = self.nact;
                nfail = 0;
            } else {
                nfail += 1;
                if nfail == 3 {
                    return StageEnd::Done;
                }
            }
            optold = optold.min(optnew);

            if icon >= self.nact {
                if !self.add_constraint(a, icon, stage, mcon) {
                    return StageEnd::Done;
                }
                // Direction of the next move. In stage one it keeps unit
                // products with every active normal; in stage two it is the
                // direction orthogonal to the other active normals with
                // unit product against the objective gradient.
                match stage {
                    Stage::Feasibility => {
                        let kk = self.iact[self.nact - 1];
                        let t = (inprod(sdirn.view(), a.column(kk)) - 1.0)
                            / self.zdota[self.nact - 1];
                        for i in 0..n {
                            sdirn[i] -= t * self.z[[i, self.nact - 1]];
                        }
                    }
                    Stage::Objective => {
                        for i in 0..n {
                            sdirn[i] = self.z[[i, self.nact - 1]] / self.zdota[self.nact - 1];
                        }
                    }
                }
            } else {
                // A multiplier fell to zero: drop the constraint.
                self.shift_active(a, icon, self.nact - 1);
                self.nact -= 1;
                match stage {
                    Stage::Feasibility => {
                        let t = inprod(sdirn.view(), self.z.column(self.nact));
                        for i in 0..n {
                            sdirn[i] -= t * self.z[[i, self.nact]];
                        }
                    }
                    Stage::Objective => {
                        for i in 0..n {
                            sdirn[i] = self.z[[i, self.nact - 1]] / self.zdota[self.nact - 1];
                        }
                    }
                }
            }

            // Step length along sdirn to the trust-region boundary.
            let mut dd = delta * delta;
            for i in 0..n {
                if self.d[i].abs() >= EPS * delta {
                    dd -= self.d[i] * self.d[i];
                }
            }
            if dd <= 0.0 {
                return StageEnd::Done;
            }
            let sd = inprod(self.d.view(), sdirn.view());
            let ss = inprod(sdirn.view(), sdirn.view());
            let mut temp = (ss * dd).sqrt();
            if sd.abs() >= EPS * temp {
                temp = (ss * dd + sd * sd).sqrt();
            }
            let stpful = dd / (temp + sd);
            let mut step = stpful;
            if stage == Stage::Feasibility {
                // Stop when the remaining violation is rounding-level noise
                // against the step, and never walk past the point where the
                // worst violation hits zero.
                let acca = step + 0.1 * self.cviol;
                let accb = step + 0.2 * self.cviol;
                if step >= acca || acca >= accb {
                    return StageEnd::Done;
                }
                step = step.min(self.cviol);
            }

            let mut dnew = self.d.clone();
            for i in 0..n {
                dnew[i] += step * sdirn[i];
            }
            let cvold = self.cviol;
            if stage == Stage::Feasibility {
                self.cviol = 0.0;
                for k in 0..self.nact {
                    let kk = self.iact[k];
                    self.cviol = self.cviol.max(b[kk] - inprod(a.column(kk), dnew.view()));
                }
            }

            // Multipliers the active set would have at dnew.
            let mut vmultd = vec![0.0; mcon];
            let mut w = dnew.clone();
            for k in (0..self.nact).rev() {
                let zw = inprod_moderated(self.z.column(k), w.view());
                let t = zw / self.zdota[k];
                vmultd[k] = t;
                if k > 0 {
                    let kk = self.iact[k];
                    for i in 0..n {
                        w[i] -= t * a[[i, kk]];
                    }
                }
            }
            if stage == Stage::Objective {
                // The objective stays in the active set.
                vmultd[self.nact - 1] = vmultd[self.nact - 1].max(0.0);
            }

            // Slack of the inactive constraints at dnew, relative to the
            // permitted violation level.
            for k in self.nact..mcon {
                let kk = self.iact[k];
                let mut sum = self.cviol - b[kk];
                let mut sumabs = self.cviol + b[kk].abs();
                for i in 0..n {
                    let t = a[[i, kk]] * dnew[i];
                    sum += t;
                    sumabs += t.abs();
                }
                vmultd[k] = kill_rounding(sum, sumabs);
            }

            // Fraction of the move to dnew that keeps every multiplier and
            // slack nonnegative; the blocking constraint is handled next.
            let mut ratio = 1.0;
            let mut blocking = None;
            for k in 0..mcon {
                if vmultd[k] < 0.0 {
                    let t = self.vmultc[k] / (self.vmultc[k] - vmultd[k]);
                    if t < ratio {
                        ratio = t;
                        blocking = Some(k);
                    }
                }
            }

            let frac = 1.0 - ratio;
            for i in 0..n {
                self.d[i] = frac * self.d[i] + ratio * dnew[i];
            }
            for k in 0..mcon {
                self.vmultc[k] = (frac * self.vmultc[k] + ratio * vmultd[k]).max(0.0);
            }
            if stage == Stage::Feasibility {
                self.cviol = cvold + ratio * (self.cviol - cvold);
            }

            match blocking {
                Some(k) => icon = k,
                None => {
                    if step == stpful {
                        return StageEnd::OnBall;
                    }
                    // Stage one only: the worst violation reached zero
                    // strictly inside the ball.
                    return StageEnd::Done;
                }
            }
        }
        StageEnd::Done
    }

    /// Bring constraint `iact[icon]` (inactive) into the active set. If its
    /// gradient is dependent on the active normals, one active constraint
    /// is traded out by a multiplier ratio test. Returns false when the
    /// constraint cannot be added.
    fn add_constraint(&mut self, a: &Array2<f64>, icon: usize, stage: Stage, mcon: usize) -> bool {
        let n = self.n;
        let kk = self.iact[icon];

        // Rotate the trailing columns of z so that only column nact keeps a
        // component along the new gradient.
        let mut tot = 0.0;
        for k in (self.nact..n).rev() {
            let sp = inprod_moderated(self.z.column(k), a.column(kk));
            if tot == 0.0 {
                tot = sp;
            } else {
                let kp = k + 1;
                let temp = (sp * sp + tot * tot).sqrt();
                let alpha = sp / temp;
                let beta = tot / temp;
                for i in 0..n {
                    let zk = alpha * self.z[[i, k]] + beta * self.z[[i, kp]];
                    self.z[[i, kp]] = alpha * self.z[[i, kp]] - beta * self.z[[i, k]];
                    self.z[[i, k]] = zk;
                }
                tot = temp;
            }
        }

        if tot != 0.0 {
            self.nact += 1;
            self.zdota[self.nact - 1] = tot;
            self.vmultc[icon] = self.vmultc[self.nact - 1];
            self.vmultc[self.nact - 1] = 0.0;
            self.iact.swap(icon, self.nact - 1);
        } else {
            // The new gradient lies in the span of the active normals.
            // Express it there and trade out the active constraint with the
            // smallest multiplier ratio (the objective never leaves).
            let mut vmultd = vec![0.0; self.nact];
            let mut w = a.column(kk).to_owned();
            for k in (0..self.nact).rev() {
                let zw = inprod_moderated(self.z.column(k), w.view());
                let t = zw / self.zdota[k];
                vmultd[k] = t;
                if k > 0 {
                    let kw = self.iact[k];
                    for i in 0..n {
                        w[i] -= t * a[[i, kw]];
                    }
                }
            }

            let mut ratio = -1.0;
            let mut iout = None;
            for k in (0..self.nact).rev() {
                if vmultd[k] > 0.0 && self.iact[k] < self.m {
                    let t = self.vmultc[k] / vmultd[k];
                    if ratio < 0.0 || t < ratio {
                        ratio = t;
                        iout = Some(k);
                    }
                }
            }
            let Some(iout) = iout else {
                return false;
            };

            for k in 0..self.nact {
                self.vmultc[k] = (self.vmultc[k] - ratio * vmultd[k]).max(0.0);
            }
            if iout < self.nact - 1 {
                self.shift_active(a, iout, self.nact - 1);
            }
            let temp = inprod(self.z.column(self.nact - 1), a.column(kk));
            if temp == 0.0 {
                return false;
            }
            self.zdota[self.nact - 1] = temp;
            self.vmultc[icon] = 0.0;
            self.iact[icon] = self.iact[self.nact - 1];
            self.vmultc[self.nact - 1] = ratio;
            self.iact[self.nact - 1] = kk;
        }

        // In stage two the objective must stay the last active constraint.
        if stage == Stage::Objective && kk != mcon - 1 && self.nact >= 2 {
            self.shift_active(a, self.nact - 2, self.nact - 1);
        }
        true
    }

    /// Move the active constraint at position `from` to position `to`,
    /// shifting the ones in between down and repairing the factorization
    /// with one plane rotation per slot.
    fn shift_active(&mut self, a: &Array2<f64>, from: usize, to: usize) {
        let n = self.n;
        let isav = self.iact[from];
        let vsav = self.vmultc[from];
        for k in from..to {
            let kp = k + 1;
            let kw = self.iact[kp];
            let sp = inprod(self.z.column(k), a.column(kw));
            let temp = (sp * sp + self.zdota[kp] * self.zdota[kp]).sqrt();
            let alpha = self.zdota[kp] / temp;
            let beta = sp / temp;
            for i in 0..n {
                let zk = beta * self.z[[i, k]] + alpha * self.z[[i, kp]];
                self.z[[i, kp]] = alpha * self.z[[i, k]] - beta * self.z[[i, kp]];
                self.z[[i, k]] = zk;
            }
            self.zdota[kp] = alpha * self.zdota[k];
            self.zdota[k] = temp;
            self.iact[k] = kw;
            self.vmultc[k] = self.vmultc[kp];
        }
        self.iact[to] = isav;
        self.vmultc[to] = vsav;
    }
}

/// Standard trust-region radius update from the reduction ratio.
pub(crate) fn trrad(
    delta_in: f64,
    dnorm: f64,
    eta1: f64,
    eta2: f64,
    gamma1: f64,
    gamma2: f64,
    ratio: f64,
) -> f64 {
    if ratio <= eta1 {
        gamma1 * dnorm
    } else if ratio <= eta2 {
        (gamma1 * delta_in).max(dnorm)
    } else {
        (gamma1 * delta_in).max(gamma2 * dnorm)
    }
}

/// Reduction ratio `ared / pred`, made safe against NaN and against a
/// nonpositive prediction: both force a value that contracts the region.
pub(crate) fn redrat(ared: f64, pred: f64) -> f64 {
    if ared.is_nan() || pred.is_nan() || pred <= 0.0 {
        -REALMAX
    } else {
        ared / pred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn norm(v: &Array1<f64>) -> f64 {
        v.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    #[test]
    fn test_trstlp_steepest_descent_without_constraints() {
        // One vacuous constraint with zero gradient; objective gradient
        // column pushes along (1, 0). The step should reach the ball.
        let a = array![[0.0, 1.0], [0.0, 0.0]];
        let b = array![0.0, 0.0];
        let d = trstlp(&a, &b, 0.5);
        assert!((d[0] - 0.5).abs() < 1e-12);
        assert!(d[1].abs() < 1e-12);
    }

    #[test]
    fn test_trstlp_respects_halfspace() {
        // Constraint d_x >= 0 active at the center; objective favors
        // (-1, -1). The solution is the projection onto the halfspace,
        // scaled to the ball: (0, -1).
        let a = array![[1.0, -1.0], [0.0, -1.0]];
        let b = array![0.0, 0.0];
        let d = trstlp(&a, &b, 1.0);
        assert!(d[0].abs() < 1e-10);
        assert!((d[1] + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_trstlp_reduces_violation_within_ball() {
        // Constraint d_x >= 1 is infeasible at d = 0 and the ball is too
        // small to fix it; stage one walks to the boundary toward it.
        let a = array![[1.0, 0.0], [0.0, 0.0]];
        let b = array![1.0, 0.0];
        let d = trstlp(&a, &b, 0.5);
        assert!((d[0] - 0.5).abs() < 1e-10);
        assert!(d[1].abs() < 1e-10);
    }

    #[test]
    fn test_trstlp_restores_feasibility_then_stops() {
        // Same constraint but a large ball: stage one stops exactly at
        // d_x = 1 and the zero objective gradient gives stage two nothing
        // to do.
        let a = array![[1.0, 0.0], [0.0, 0.0]];
        let b = array![1.0, 0.0];
        let d = trstlp(&a, &b, 4.0);
        assert!((d[0] - 1.0).abs() < 1e-10);
        assert!(norm(&d) <= 4.0 + 1e-12);
    }

    #[test]
    fn test_trstlp_two_constraints_vertex() {
        // d_x >= 0 and d_y >= 0 both active, objective pulls into the
        // forbidden quadrant: the origin is optimal.
        let a = array![[1.0, 0.0, -1.0], [0.0, 1.0, -1.0]];
        let b = array![0.0, 0.0, 0.0];
        let d = trstlp(&a, &b, 1.0);
        assert!(norm(&d) < 1e-9);
    }

    #[test]
    fn test_trstlp_never_leaves_the_ball() {
        let a = array![[0.3, -1.2, 2.0], [-0.7, 0.4, 1.0]];
        let b = array![0.2, -0.5, 0.0];
        for &delta in &[0.1, 0.5, 2.0] {
            let d = trstlp(&a, &b, delta);
            assert!(norm(&d) <= delta * (1.0 + 1e-10));
        }
    }

    #[test]
    fn test_trrad_contracts_and_expands() {
        // Poor ratio contracts on the step length.
        assert_eq!(trrad(1.0, 0.8, 0.1, 0.7, 0.5, 2.0, 0.0), 0.4);
        // Moderate ratio keeps at least half the radius.
        assert_eq!(trrad(1.0, 0.8, 0.1, 0.7, 0.5, 2.0, 0.5), 0.8);
        // High ratio doubles the step.
        assert_eq!(trrad(1.0, 0.8, 0.1, 0.7, 0.5, 2.0, 0.9), 1.6);
    }

    #[test]
    fn test_redrat_guards_bad_predictions() {
        assert_eq!(redrat(1.0, 2.0), 0.5);
        assert_eq!(redrat(f64::NAN, 2.0), -REALMAX);
        assert_eq!(redrat(1.0, 0.0), -REALMAX);
        assert_eq!(redrat(1.0, -1.0), -REALMAX);
    }
}
