//! COBYLA: derivative-free constrained minimization in pure Rust
//!
//! Powell's Constrained Optimization BY Linear Approximations. The solver
//! maintains a simplex of n+1 interpolation points, builds affine models of
//! the objective and of every constraint from the vertices, and advances by
//! trust-region steps computed from the linearized problem. No gradients
//! are ever requested from the user.
//!
//! Supported features:
//! - General inequality constraints evaluated together with the objective
//! - Moderated extreme barrier: NaN/Inf from the user function never
//!   poison the iteration
//! - A non-dominated filter guaranteeing the returned point is the best
//!   evaluated one under the selection merit
//! - Optional warm start (`f0`/`constr0`) when the caller already knows the
//!   values at the starting point
//! - Optional per-iteration callback that can stop the solve early
//! - SciPy-shaped [`LinearConstraint`]/[`NonlinearConstraint`] helpers and a
//!   [`minimize`] front end that rewrites them for the solver
//!
//! The solver-level constraint convention is Powell's: `calcfc` returns
//! `(f, constr)` and component `i` is satisfied when `constr[i] >= 0`; the
//! scalar violation is `max(0, -min(constr))`.
//!
//! # Example
//!
//! ```no_run
//! use cobyla::{cobyla, CobylaConfigBuilder};
//! use ndarray::{array, Array1};
//!
//! // Minimize (x0 - 5)^2 + (x1 - 4)^2 subject to x0^2 <= 9.
//! let calcfc = |x: &Array1<f64>| {
//!     let f = (x[0] - 5.0).powi(2) + (x[1] - 4.0).powi(2);
//!     (f, array![9.0 - x[0] * x[0]])
//! };
//! let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).build();
//! let report = cobyla(&calcfc, 1, array![0.0, 0.0], config).unwrap();
//! assert!(report.success);
//! ```

use ndarray::Array1;

pub mod constraints;
pub mod recorder;

mod cobylb;
mod consts;
mod evaluate;
mod filter;
mod geometry;
mod initialize;
mod linalg;
mod message;
mod trustregion;
mod update;


pub use consts::{CONSTRMAX, CWEIGHT_DFT, EPS, FUNCMAX, MAXFILT_DFT, MAXFUN_DIM_DFT, REALMAX};
pub use constraints::{LinearConstraint, NonlinearConstraint, minimize};
pub use evaluate::{moderatec, moderatef, moderatex, violation};
pub use filter::is_better;
pub use recorder::{EvaluationRecord, EvaluationRecorder, run_recorded_cobyla};

use cobylb::cobylb;
use consts::{MIN_MAXFILT, RHOBEG_DFT, RHOEND_DFT};
use evaluate::Objective;
use message::Printer;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The lower bound of the trust-region radius was reached.
    SmallTrRadius,
    /// A feasible point with objective value at most `ftarget` was found.
    FtargetAchieved,
    /// The budget of function evaluations is exhausted.
    MaxfunReached,
    /// The trust-region iteration limit was hit (should not happen).
    MaxtrReached,
    /// NaN or Inf occurred in the variables.
    NanInfX,
    /// The objective or a constraint became NaN or +Inf (should not happen
    /// with the moderated barrier).
    NanInfF,
    /// Rounding errors damaged the simplex beyond repair.
    DamagingRounding,
    /// The trust-region subproblem solver failed (should not happen).
    TrSubproblemFailed,
    /// The user callback asked to stop.
    CallbackTerminate,
}

impl ExitStatus {
    fn message(self) -> &'static str {
        match self {
            ExitStatus::SmallTrRadius => "Converged (the trust-region radius reached rhoend)",
            ExitStatus::FtargetAchieved => "Reached the target objective value",
            ExitStatus::MaxfunReached => "Maximum number of function evaluations reached",
            ExitStatus::MaxtrReached => "Maximum number of trust-region iterations reached",
            ExitStatus::NanInfX => "NaN or Inf occurred in the variables",
            ExitStatus::NanInfF => "The objective or constraint values became NaN or Inf",
            ExitStatus::DamagingRounding => "Rounding errors are becoming damaging",
            ExitStatus::TrSubproblemFailed => "A trust-region step failed to reduce the model",
            ExitStatus::CallbackTerminate => "Stopped by callback",
        }
    }
}

/// Rejected input reported before any iteration starts.
#[derive(Debug, thiserror::Error)]
pub enum CobylaError {
    #[error("x0 must not be empty")]
    EmptyX0,
    #[error("x0 contains NaN at index {0}")]
    NanInX0(usize),
    #[error("f0 and constr0 must be both present or both absent")]
    PartialWarmStart,
    #[error("constr0 has length {got}, expected m = {expected}")]
    Constr0SizeMismatch { got: usize, expected: usize },
    #[error("rhobeg and rhoend must satisfy 0 < rhoend <= rhobeg (got rhobeg = {rhobeg}, rhoend = {rhoend})")]
    InvalidRho { rhobeg: f64, rhoend: f64 },
    #[error("linear constraint needs {rows} bounds per side, got lb = {lb}, ub = {ub}")]
    LinearConstraintShape { rows: usize, lb: usize, ub: usize },
    #[error("linear constraint has {cols} columns but x0 has {n} entries")]
    LinearConstraintWidth { cols: usize, n: usize },
    #[error("nonlinear constraint declares {expected} components but its function returned {got}")]
    NonlinearConstraintShape { expected: usize, got: usize },
}

/// Information handed to the callback at the start of every trust-region
/// iteration: the current best vertex and the evaluation count.
pub struct CobylaIntermediate {
    pub x: Array1<f64>,
    pub fun: f64,
    pub cstrv: f64,
    pub constr: Array1<f64>,
    pub nf: usize,
    pub tr: usize,
}

/// Action returned by the callback.
pub enum CallbackAction {
    Continue,
    Stop,
}

/// Per-iteration callback; returning [`CallbackAction::Stop`] halts the
/// solve after the current iteration with the best point found so far.
pub type CobylaCallback = Box<dyn FnMut(&CobylaIntermediate) -> CallbackAction + Send>;

/// Configuration of the solver. Unset optional fields are derived from the
/// problem dimension and from each other when the solve starts.
pub struct CobylaConfig {
    /// Initial trust-region radius; about a tenth of the greatest expected
    /// change to a variable. Default 1.
    pub rhobeg: Option<f64>,
    /// Final trust-region radius: the resolution wanted on the variables.
    /// Default 1e-6.
    pub rhoend: Option<f64>,
    /// Stop as soon as a feasible point with `f <= ftarget` appears.
    pub ftarget: f64,
    /// Constraint violation below which a point counts as feasible. Only
    /// used when selecting the returned point. Absolute, not relative.
    pub ctol: f64,
    /// Weight of the violation in the selection of the returned point.
    pub cweight: f64,
    /// Budget of objective evaluations; default `500 * n`.
    pub maxfun: Option<usize>,
    /// Verbosity: 0 silent; +-1 return message; +-2 also rho/cpen changes;
    /// +-3 also every evaluation. Negative values append to
    /// `COBYLA_output.txt` instead of stderr.
    pub iprint: i32,
    /// Trust-region ratio threshold below which the radius contracts.
    pub eta1: Option<f64>,
    /// Trust-region ratio threshold above which the radius expands.
    pub eta2: Option<f64>,
    /// Contraction factor of the trust-region radius.
    pub gamma1: f64,
    /// Expansion factor of the trust-region radius.
    pub gamma2: f64,
    /// Capacity of the filter of non-dominated points.
    pub maxfilt: usize,
    /// Objective value at x0, if the caller already evaluated it.
    pub f0: Option<f64>,
    /// Constraint values at x0; present exactly when `f0` is.
    pub constr0: Option<Array1<f64>>,
    /// Optional per-iteration callback (may stop early).
    pub callback: Option<CobylaCallback>,
}

impl Default for CobylaConfig {
    fn default() -> Self {
        Self {
            rhobeg: None,
            rhoend: None,
            ftarget: f64::NEG_INFINITY,
            ctol: EPS,
            cweight: CWEIGHT_DFT,
            maxfun: None,
            iprint: 0,
            eta1: None,
            eta2: None,
            gamma1: 0.5,
            gamma2: 2.0,
            maxfilt: MAXFILT_DFT,
            f0: None,
            constr0: None,
            callback: None,
        }
    }
}

/// Fluent builder for [`CobylaConfig`].
pub struct CobylaConfigBuilder {
    cfg: CobylaConfig,
}

impl Default for CobylaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CobylaConfigBuilder {
    pub fn new() -> Self {
        Self { cfg: CobylaConfig::default() }
    }
    pub fn rhobeg(mut self, v: f64) -> Self {
        self.cfg.rhobeg = Some(v);
        self
    }
    pub fn rhoend(mut self, v: f64) -> Self {
        self.cfg.rhoend = Some(v);
        self
    }
    pub fn ftarget(mut self, v: f64) -> Self {
        self.cfg.ftarget = v;
        self
    }
    pub fn ctol(mut self, v: f64) -> Self {
        self.cfg.ctol = v;
        self
    }
    pub fn cweight(mut self, v: f64) -> Self {
        self.cfg.cweight = v;
        self
    }
    pub fn maxfun(mut self, v: usize) -> Self {
        self.cfg.maxfun = Some(v);
        self
    }
    pub fn iprint(mut self, v: i32) -> Self {
        self.cfg.iprint = v;
        self
    }
    pub fn eta1(mut self, v: f64) -> Self {
        self.cfg.eta1 = Some(v);
        self
    }
    pub fn eta2(mut self, v: f64) -> Self {
        self.cfg.eta2 = Some(v);
        self
    }
    pub fn gamma1(mut self, v: f64) -> Self {
        self.cfg.gamma1 = v;
        self
    }
    pub fn gamma2(mut self, v: f64) -> Self {
        self.cfg.gamma2 = v;
        self
    }
    pub fn maxfilt(mut self, v: usize) -> Self {
        self.cfg.maxfilt = v;
        self
    }
    pub fn warm_start(mut self, f0: f64, constr0: Array1<f64>) -> Self {
        self.cfg.f0 = Some(f0);
        self.cfg.constr0 = Some(constr0);
        self
    }
    pub fn callback(mut self, cb: CobylaCallback) -> Self {
        self.cfg.callback = Some(cb);
        self
    }
    pub fn build(self) -> CobylaConfig {
        self.cfg
    }
}

/// Result of a solve.
#[derive(Debug, Clone)]
pub struct CobylaReport {
    /// The returned point: the best evaluated one under the selection merit.
    pub x: Array1<f64>,
    /// Objective value at `x`.
    pub fun: f64,
    /// Scalar constraint violation at `x`.
    pub cstrv: f64,
    /// Constraint values at `x`.
    pub constr: Array1<f64>,
    /// Number of objective evaluations spent.
    pub nf: usize,
    /// Why the solver stopped.
    pub status: ExitStatus,
    /// Whether the stop was a normal termination.
    pub success: bool,
    pub message: String,
}

/// The COBYLA solver over a combined objective/constraint function.
///
/// `calcfc(x)` returns `(f, constr)` with `constr.len() == m`; a constraint
/// component is satisfied when it is nonnegative.
pub struct Cobyla<'a, F>
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    calcfc: &'a F,
    m: usize,
    x0: Array1<f64>,
    config: CobylaConfig,
}

impl<'a, F> Cobyla<'a, F>
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    pub fn new(calcfc: &'a F, m: usize, x0: Array1<f64>) -> Self {
        Self { calcfc, m, x0, config: CobylaConfig::default() }
    }

    /// Mutable access to the configuration
    pub fn config_mut(&mut self) -> &mut CobylaConfig {
        &mut self.config
    }

    /// Run the optimization and return a report
    pub fn solve(&mut self) -> Result<CobylaReport, CobylaError> {
        cobyla(self.calcfc, self.m, self.x0.clone(), std::mem::take(&mut self.config))
    }
}

/// Minimize `calcfc` from `x0` with `m` inequality constraints.
///
/// This is the solver entry; see [`minimize`] for the SciPy-shaped front
/// end that accepts two-sided constraint objects.
pub fn cobyla<F>(
    calcfc: &F,
    m: usize,
    x0: Array1<f64>,
    mut config: CobylaConfig,
) -> Result<CobylaReport, CobylaError>
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    let n = x0.len();
    if n == 0 {
        return Err(CobylaError::EmptyX0);
    }
    if let Some(i) = x0.iter().position(|v| v.is_nan()) {
        return Err(CobylaError::NanInX0(i));
    }
    if config.f0.is_some() != config.constr0.is_some() {
        return Err(CobylaError::PartialWarmStart);
    }
    if let Some(c0) = &config.constr0 {
        if c0.len() != m {
            return Err(CobylaError::Constr0SizeMismatch { got: c0.len(), expected: m });
        }
    }

    let rhobeg = match (config.rhobeg, config.rhoend) {
        (Some(rb), _) => rb,
        (None, Some(re)) if re.is_finite() && re > 0.0 => (10.0 * re).max(RHOBEG_DFT),
        (None, _) => RHOBEG_DFT,
    };
    let rhoend = match config.rhoend {
        Some(re) => re,
        None if rhobeg > 0.0 => EPS.max((0.1 * rhobeg).min(RHOEND_DFT)),
        None => RHOEND_DFT,
    };
    if !(rhobeg.is_finite() && rhoend.is_finite() && 0.0 < rhoend && rhoend <= rhobeg) {
        return Err(CobylaError::InvalidRho { rhobeg, rhoend });
    }

    let eta1 = match (config.eta1, config.eta2) {
        (Some(e1), _) => e1,
        (None, Some(e2)) if 0.0 < e2 && e2 < 1.0 => EPS.max(e2 / 7.0),
        (None, _) => 0.1,
    };
    let eta2 = match config.eta2 {
        Some(e2) => e2,
        None if 0.0 < eta1 && eta1 < 1.0 => (eta1 + 2.0) / 3.0,
        None => 0.7,
    };

    let maxfun = config.maxfun.unwrap_or(MAXFUN_DIM_DFT * n);
    // A filter shorter than MIN_MAXFILT risks dropping the best point.
    let maxfilt = if config.maxfilt == 0 {
        MAXFILT_DFT
    } else {
        config.maxfilt.max(MIN_MAXFILT)
    };

    let printer = Printer::new(config.iprint);
    let mut objective = Objective::new(calcfc);

    // Use the caller-supplied values at x0 when available; otherwise clip
    // the starting point and spend the first evaluation here.
    let mut x0 = x0;
    let (f0, constr0) = match (config.f0.take(), config.constr0.take()) {
        (Some(f0), Some(c0)) if x0.iter().all(|v| v.is_finite()) => {
            objective.count_warm_start();
            (f0, c0)
        }
        _ => {
            x0 = moderatex(&x0);
            let (f, c, _) = objective.eval(&x0, &printer);
            (f, c)
        }
    };

    let result = cobylb(
        &mut objective,
        &printer,
        maxfilt,
        maxfun,
        config.ctol,
        config.cweight,
        eta1,
        eta2,
        config.ftarget,
        config.gamma1,
        config.gamma2,
        rhobeg,
        rhoend,
        &constr0,
        f0,
        &x0,
        config.callback.as_mut(),
    );

    let success = matches!(
        result.status,
        ExitStatus::SmallTrRadius | ExitStatus::FtargetAchieved | ExitStatus::CallbackTerminate
    );
    Ok(CobylaReport {
        x: result.x,
        fun: result.f,
        cstrv: result.cstrv,
        constr: result.constr,
        nf: result.nf,
        status: result.status,
        success,
        message: result.status.message().to_string(),
    })
}
