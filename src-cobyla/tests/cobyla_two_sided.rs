use cobyla::{
    CobylaConfigBuilder, ExitStatus, LinearConstraint, NonlinearConstraint, minimize,
};
use cobyla_testfunctions::shifted_quadratic;
use ndarray::{Array1, array};

fn converged(status: ExitStatus) -> bool {
    matches!(status, ExitStatus::SmallTrRadius | ExitStatus::FtargetAchieved)
}

#[test]
fn test_two_sided_nonlinear_constraint() {
    // 25 <= x0^2 <= 100 expands to two rows; the optimum (5, 4) sits on
    // the lower side and stays reachable.
    let fun = |x: &Array1<f64>| shifted_quadratic(x);
    let nlc = NonlinearConstraint::new(
        |x: &Array1<f64>| array![x[0] * x[0]],
        array![25.0],
        array![100.0],
    );
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let report = minimize(&fun, array![0.0, 0.0], &[], &[nlc], config).unwrap();

    assert!(converged(report.status), "status: {:?}", report.status);
    assert!(report.fun.abs() <= 1e-4, "f = {:.6e}", report.fun);
    assert!((report.x[0] - 5.0).abs() < 1e-2);
    assert!((report.x[1] - 4.0).abs() < 1e-2);
    assert_eq!(report.constr.len(), 2);
}

#[test]
fn test_active_linear_constraints() {
    // x0 + x1 <= 1 and x0 - x1 <= 1 push the optimum to the vertex-free
    // point (1, 0) on the first constraint.
    let fun = |x: &Array1<f64>| shifted_quadratic(x);
    let lc = LinearConstraint::upper(array![[1.0, 1.0], [1.0, -1.0]], array![1.0, 1.0]);
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let report = minimize(&fun, array![0.0, 0.0], &[lc], &[], config).unwrap();

    assert!(converged(report.status), "status: {:?}", report.status);
    assert!((report.x[0] - 1.0).abs() < 1e-2, "x = {:?}", report.x);
    assert!(report.x[1].abs() < 1e-2, "x = {:?}", report.x);
    assert!((report.fun - 32.0).abs() <= 1e-4, "f = {:.6e}", report.fun);
    // Both rows hold at the solution.
    assert!(report.x[0] + report.x[1] <= 1.0 + 1e-6);
    assert!(report.x[0] - report.x[1] <= 1.0 + 1e-6);
}

#[test]
fn test_inactive_constraints_leave_optimum_alone() {
    let fun = |x: &Array1<f64>| shifted_quadratic(x);
    let lc = LinearConstraint::upper(array![[1.0, 1.0], [1.0, -1.0]], array![10.0, 5.0]);
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let report = minimize(&fun, array![0.0, 0.0], &[lc], &[], config).unwrap();

    assert!(converged(report.status));
    assert!(report.fun.abs() <= 1e-4);
    assert!((report.x[0] - 5.0).abs() < 1e-2);
    assert!((report.x[1] - 4.0).abs() < 1e-2);
}

#[test]
fn test_equality_via_equal_bounds() {
    // 8 <= x0 + x1 <= 8 and 5 <= x0 - x1 <= 5 pin x at (6.5, 1.5).
    let fun = |x: &Array1<f64>| shifted_quadratic(x);
    let lc = LinearConstraint::new(
        array![[1.0, 1.0], [1.0, -1.0]],
        array![8.0, 5.0],
        array![8.0, 5.0],
    );
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let report = minimize(&fun, array![6.5, 1.5], &[lc], &[], config).unwrap();

    assert!((report.x[0] - 6.5).abs() < 1e-2, "x = {:?}", report.x);
    assert!((report.x[1] - 1.5).abs() < 1e-2, "x = {:?}", report.x);
    assert!(report.cstrv <= 1e-4);
}
