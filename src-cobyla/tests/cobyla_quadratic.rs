use cobyla::{CobylaConfigBuilder, ExitStatus, cobyla, run_recorded_cobyla};
use cobyla_testfunctions::shifted_quadratic;
use ndarray::{Array1, array};

fn converged(status: ExitStatus) -> bool {
    matches!(status, ExitStatus::SmallTrRadius | ExitStatus::FtargetAchieved)
}

#[test]
fn test_cobyla_quadratic_unconstrained() {
    let calcfc = |x: &Array1<f64>| (shifted_quadratic(x), Array1::zeros(1));
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let report = cobyla(&calcfc, 1, array![0.0, 0.0], config).unwrap();

    assert!(converged(report.status), "status: {:?}", report.status);
    assert!(report.fun.abs() <= 1e-4, "f = {:.6e}", report.fun);
    assert!((report.x[0] - 5.0).abs() < 1e-2);
    assert!((report.x[1] - 4.0).abs() < 1e-2);
}

#[test]
fn test_cobyla_quadratic_disc_constraint() {
    // x0^2 <= 9 keeps the first coordinate at 3; the optimum moves to
    // (3, 4) with objective 4.
    let calcfc =
        |x: &Array1<f64>| (shifted_quadratic(x), array![9.0 - x[0] * x[0]]);
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let report = cobyla(&calcfc, 1, array![0.0, 0.0], config).unwrap();

    assert!(converged(report.status), "status: {:?}", report.status);
    assert!((report.fun - 4.0).abs() <= 1e-4, "f = {:.6e}", report.fun);
    assert!((report.x[0] - 3.0).abs() < 1e-2);
    assert!((report.x[1] - 4.0).abs() < 1e-2);
    assert!(report.cstrv <= 1e-6, "cstrv = {:.2e}", report.cstrv);
}

#[test]
fn test_cobyla_quadratic_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().to_str().unwrap();

    let calcfc = |x: &Array1<f64>| (shifted_quadratic(x), Array1::zeros(1));
    let config = CobylaConfigBuilder::new().rhobeg(0.5).rhoend(1e-6).maxfun(500).build();
    let result =
        run_recorded_cobyla("quadratic", calcfc, 1, array![0.0, 0.0], config, output_dir);

    assert!(result.is_ok());
    let (report, csv_path) = result.unwrap();
    assert!(report.fun.abs() <= 1e-4);
    assert!(std::path::Path::new(&csv_path).exists());
    // The metadata sidecar is written next to the trace.
    assert!(dir.path().join("quadratic.json").exists());
}
