use std::sync::{Arc, Mutex};

use cobyla::{CallbackAction, CobylaConfigBuilder, ExitStatus, cobyla};
use cobyla_testfunctions::shifted_quadratic;
use ndarray::{Array1, array};

#[test]
fn test_callback_is_invoked_with_best_point() {
    let calcfc = |x: &Array1<f64>| (shifted_quadratic(x), array![10.0 - x[0], 10.0 - x[1]]);
    let called = Arc::new(Mutex::new(false));
    let called_clone = called.clone();
    let config = CobylaConfigBuilder::new()
        .rhobeg(0.5)
        .rhoend(1e-6)
        .callback(Box::new(move |intermediate| {
            *called_clone.lock().unwrap() = true;
            assert_eq!(intermediate.x.len(), 2);
            assert_eq!(intermediate.constr.len(), 2);
            assert!(intermediate.fun.is_finite());
            CallbackAction::Continue
        }))
        .build();
    let report = cobyla(&calcfc, 2, array![0.0, 0.0], config).unwrap();

    assert!(*called.lock().unwrap());
    assert!(report.success);
    assert!(report.fun.abs() <= 1e-4);
}

#[test]
fn test_callback_early_termination() {
    let calcfc = |x: &Array1<f64>| (shifted_quadratic(x), Array1::zeros(1));
    let config = CobylaConfigBuilder::new()
        .rhobeg(0.5)
        .callback(Box::new(|intermediate| {
            if intermediate.x[0] > 1.0 { CallbackAction::Stop } else { CallbackAction::Continue }
        }))
        .build();
    let report = cobyla(&calcfc, 1, array![0.0, 0.0], config).unwrap();

    assert_eq!(report.status, ExitStatus::CallbackTerminate);
    // Terminated early: the result is not yet optimal.
    assert!(report.fun > 1e-4);
}
