//! Recording wrapper for testing and analysis
//!
//! [`run_recorded_cobyla`] wraps the user function so that every
//! evaluation lands in memory, runs the solver, then writes the trace to a
//! CSV file with a JSON metadata sidecar describing the run.

use std::error::Error;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::sync::{Arc, Mutex};

use ndarray::Array1;
use serde::Serialize;

use crate::evaluate::{moderatec, violation};
use crate::{CobylaConfig, CobylaReport, cobyla};

/// A single recorded evaluation
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    /// Evaluation number (1-based)
    pub nf: usize,
    /// Point at which the user function was called
    pub x: Vec<f64>,
    /// Objective value
    pub f: f64,
    /// Scalar constraint violation
    pub cstrv: f64,
}

/// Records every evaluation of the wrapped function
pub struct EvaluationRecorder {
    function_name: String,
    records: Arc<Mutex<Vec<EvaluationRecord>>>,
}

#[derive(Serialize)]
struct RunMetadata<'a> {
    function_name: &'a str,
    n: usize,
    m: usize,
    nf: usize,
    status: String,
    fun: f64,
    cstrv: f64,
}

impl EvaluationRecorder {
    pub fn new(function_name: String) -> Self {
        Self { function_name, records: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn record_evaluation(&self, x: &Array1<f64>, f: f64, cstrv: f64) {
        let mut records = self.records.lock().unwrap();
        let nf = records.len() + 1;
        records.push(EvaluationRecord { nf, x: x.to_vec(), f, cstrv });
    }

    pub fn num_evaluations(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<EvaluationRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Save the trace to `<output_dir>/<function_name>.csv` and return the path
    pub fn save_to_csv(&self, output_dir: &str) -> Result<String, Box<dyn Error>> {
        create_dir_all(output_dir)?;
        let filename = format!("{}/{}.csv", output_dir, self.function_name);
        let mut writer = csv::Writer::from_path(&filename)?;

        let records = self.records.lock().unwrap();
        let num_dimensions = records.first().map_or(0, |r| r.x.len());

        let mut header = vec!["nf".to_string()];
        for i in 0..num_dimensions {
            header.push(format!("x{}", i));
        }
        header.push("f".to_string());
        header.push("cstrv".to_string());
        writer.write_record(&header)?;

        for record in records.iter() {
            let mut row = vec![record.nf.to_string()];
            for &xi in &record.x {
                row.push(format!("{:.16e}", xi));
            }
            row.push(format!("{:.16e}", record.f));
            row.push(format!("{:.16e}", record.cstrv));
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(filename)
    }

    /// Save a JSON sidecar describing the finished run
    pub fn save_metadata(
        &self,
        output_dir: &str,
        m: usize,
        report: &CobylaReport,
    ) -> Result<String, Box<dyn Error>> {
        create_dir_all(output_dir)?;
        let filename = format!("{}/{}.json", output_dir, self.function_name);
        let metadata = RunMetadata {
            function_name: &self.function_name,
            n: report.x.len(),
            m,
            nf: report.nf,
            status: format!("{:?}", report.status),
            fun: report.fun,
            cstrv: report.cstrv,
        };
        let mut file = File::create(&filename)?;
        file.write_all(serde_json::to_string_pretty(&metadata)?.as_bytes())?;
        Ok(filename)
    }
}

/// Run the solver with every evaluation recorded to CSV
///
/// Primarily used by the test suite and the CLI. Returns the report and
/// the path of the CSV trace.
pub fn run_recorded_cobyla<F>(
    function_name: &str,
    calcfc: F,
    m: usize,
    x0: Array1<f64>,
    config: CobylaConfig,
    output_dir: &str,
) -> Result<(CobylaReport, String), Box<dyn Error>>
where
    F: Fn(&Array1<f64>) -> (f64, Array1<f64>),
{
    create_dir_all(output_dir)?;

    let recorder = Arc::new(EvaluationRecorder::new(function_name.to_string()));
    let recorder_clone = recorder.clone();
    let recorded_calcfc = move |x: &Array1<f64>| -> (f64, Array1<f64>) {
        let (f, constr) = calcfc(x);
        let cstrv = violation(&moderatec(&constr));
        recorder_clone.record_evaluation(x, f, cstrv);
        (f, constr)
    };

    let report = cobyla(&recorded_calcfc, m, x0, config)?;

    let csv_path = recorder.save_to_csv(output_dir)?;
    recorder.save_metadata(output_dir, m, &report)?;

    Ok((report, csv_path))
}
