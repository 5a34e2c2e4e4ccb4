use clap::Parser;
use ndarray::Array1;

use cobyla::{CobylaConfigBuilder, run_recorded_cobyla};
use cobyla_testfunctions::get_problem_metadata;

/// CLI arguments for running the solver on registered benchmark problems
#[derive(Parser)]
#[command(name = "run_cobyla")]
#[command(about = "Run the COBYLA solver on benchmark problems and record the evaluations")]
struct Args {
    /// Comma-separated list of problems to run; if empty runs all
    #[arg(short, long)]
    problems: Option<String>,

    /// Initial trust-region radius
    #[arg(long, default_value = "1.0")]
    rhobeg: f64,

    /// Final trust-region radius
    #[arg(long, default_value = "1e-6")]
    rhoend: f64,

    /// Budget of function evaluations (0 = default of 500 per variable)
    #[arg(long, default_value = "0")]
    maxfun: usize,

    /// Verbosity level (0..3, negative values write to COBYLA_output.txt)
    #[arg(long, default_value = "0")]
    iprint: i32,

    /// Output directory for CSV/JSON records
    #[arg(short, long, default_value = "./data_generated/records")]
    output_dir: String,
}

fn main() {
    let args = Args::parse();
    let registry = get_problem_metadata();

    let selected: Vec<String> = match &args.problems {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => {
            let mut names: Vec<String> = registry.keys().cloned().collect();
            names.sort();
            names
        }
    };

    let mut failures = 0usize;
    for name in &selected {
        let Some(problem) = registry.get(name) else {
            eprintln!("unknown problem: {} (available: {:?})", name, {
                let mut names: Vec<&String> = registry.keys().collect();
                names.sort();
                names
            });
            failures += 1;
            continue;
        };

        let mut builder = CobylaConfigBuilder::new()
            .rhobeg(args.rhobeg)
            .rhoend(args.rhoend)
            .iprint(args.iprint);
        if args.maxfun > 0 {
            builder = builder.maxfun(args.maxfun);
        }

        let x0 = Array1::from_vec(problem.x0.clone());
        match run_recorded_cobyla(
            name,
            problem.calcfc,
            problem.m,
            x0,
            builder.build(),
            &args.output_dir,
        ) {
            Ok((report, csv_path)) => {
                println!(
                    "{:14} f={:+.6e} (best known {:+.6e})  cstrv={:.2e}  nf={:4}  {:?}  trace: {}",
                    name, report.fun, problem.fstar, report.cstrv, report.nf, report.status,
                    csv_path
                );
                if !report.success {
                    failures += 1;
                }
            }
            Err(e) => {
                eprintln!("{}: {}", name, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
