//! Progress output controlled by `iprint`
//!
//! `iprint = 0` is silent; `|iprint| >= 1` prints a message at return;
//! `|iprint| >= 2` also prints every change of rho and of the penalty
//! parameter; `|iprint| >= 3` also prints every function evaluation.
//! Negative values append to `COBYLA_output.txt` instead of stderr.

use std::fs::OpenOptions;
use std::io::Write;

use ndarray::Array1;

use crate::ExitStatus;

const OUTPUT_FILE: &str = "COBYLA_output.txt";

pub(crate) struct Printer {
    level: i32,
}

impl Printer {
    pub fn new(iprint: i32) -> Self {
        Self { level: iprint }
    }

    fn emit(&self, line: &str) {
        if self.level < 0 {
            // Output failures must not disturb the solve.
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(OUTPUT_FILE) {
                let _ = writeln!(file, "{}", line);
            }
        } else {
            eprintln!("{}", line);
        }
    }

    pub fn eval_msg(&self, nf: usize, f: f64, x: &Array1<f64>, cstrv: f64) {
        if self.level.abs() >= 3 {
            self.emit(&format!(
                "COBYLA nf {:5}  f={:.6e}  cstrv={:.3e}  x={}",
                nf,
                f,
                cstrv,
                format_point(x)
            ));
        }
    }

    pub fn rho_msg(&self, rho: f64, cpen: f64, nf: usize, f: f64, x: &Array1<f64>, cstrv: f64) {
        if self.level.abs() >= 2 {
            self.emit(&format!(
                "COBYLA new rho={:.3e}  cpen={:.3e}  nf {:5}  best f={:.6e}  cstrv={:.3e}  x={}",
                rho,
                cpen,
                nf,
                f,
                cstrv,
                format_point(x)
            ));
        }
    }

    pub fn cpen_msg(&self, cpen: f64) {
        if self.level.abs() >= 2 {
            self.emit(&format!("COBYLA new cpen={:.3e}", cpen));
        }
    }

    pub fn ret_msg(&self, status: ExitStatus, nf: usize, f: f64, x: &Array1<f64>, cstrv: f64) {
        if self.level.abs() >= 1 {
            self.emit(&format!(
                "COBYLA return ({:?})  nf {:5}  f={:.6e}  cstrv={:.3e}  x={}",
                status,
                nf,
                f,
                cstrv,
                format_point(x)
            ));
        }
    }
}

fn format_point(x: &Array1<f64>) -> String {
    let parts: Vec<String> = x.iter().map(|xi| format!("{:.6e}", xi)).collect();
    format!("[{}]", parts.join(", "))
}
