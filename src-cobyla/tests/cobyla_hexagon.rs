use cobyla::{CobylaConfigBuilder, ExitStatus, cobyla};
use cobyla_testfunctions::{hexagon_constraints, hexagon_objective, max_violation};
use ndarray::Array1;

#[test]
fn test_cobyla_hexagon() {
    // Powell's hexagon-area problem: nine variables, fourteen nonlinear
    // constraints, best value -sqrt(3)/2, starting well infeasible. The
    // problem has weaker local solutions (a square of unit diameter gives
    // -1/2); the standard initial radius of 1 reaches the published one.
    let calcfc = |x: &Array1<f64>| (hexagon_objective(x), hexagon_constraints(x));
    let config = CobylaConfigBuilder::new().rhobeg(1.0).rhoend(1e-6).maxfun(500).build();
    let report = cobyla(&calcfc, 14, Array1::from_elem(9, 2.0), config).unwrap();

    assert!(
        matches!(report.status, ExitStatus::SmallTrRadius | ExitStatus::FtargetAchieved),
        "status: {:?}",
        report.status
    );
    let fstar = -(3.0_f64).sqrt() / 2.0;
    assert!((report.fun - fstar).abs() <= 1e-4, "f = {:.8}, expected {:.8}", report.fun, fstar);
    assert!(report.cstrv <= 1e-5, "cstrv = {:.2e}", report.cstrv);
    assert!(max_violation(&hexagon_constraints(&report.x)) <= 1e-5);
}

#[test]
fn test_cobyla_hexagon_warm_start() {
    let calcfc = |x: &Array1<f64>| (hexagon_objective(x), hexagon_constraints(x));
    let x0 = Array1::from_elem(9, 2.0);
    let (f0, c0) = calcfc(&x0);
    let config = CobylaConfigBuilder::new()
        .rhobeg(1.0)
        .rhoend(1e-6)
        .maxfun(500)
        .warm_start(f0, c0)
        .build();
    let report = cobyla(&calcfc, 14, x0, config).unwrap();

    let fstar = -(3.0_f64).sqrt() / 2.0;
    assert!((report.fun - fstar).abs() <= 1e-4, "f = {:.8}", report.fun);
}
