//! Top-level application orchestration.
//!
//! `src/main.rs` only installs logging and maps errors to exit codes; this
//! module is the "real main" that reads inputs, runs the pipeline and prints
//! reports.

use std::path::Path;

use tracing::info;

use crate::cli::{CheckArgs, Cli, Command, PermArgs, PlotArgs, RunArgs};
use crate::config::{DriverSpec, read_deck};
use crate::error::AppError;
use crate::output::read_history_csv;
use crate::permutate::read_permutation_spec;

pub mod pipeline;

use pipeline::RunOutput;

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Run(args) => handle_run(args, false),
        Command::Eos(args) => handle_run(args, true),
        Command::Check(args) => handle_check(args),
        Command::Perm(args) => handle_perm(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_run(args: RunArgs, eos_only: bool) -> Result<(), AppError> {
    let deck = read_deck(&args.deck)?;
    if eos_only && !matches!(deck.driver, DriverSpec::Eos { .. }) {
        return Err(AppError::new(
            2,
            format!("'{}' is not an EOS deck; use `mps run`", args.deck.display()),
        ));
    }
    ensure_dir(&args.dir)?;

    let output = pipeline::run_deck(&deck, &args.dir)?;
    info!(runid = %deck.runid, output = %output.output().display(), "run complete");

    let (x, y) = match &output {
        RunOutput::Solid { summary, .. } => {
            println!("{}", crate::report::format_run_summary(&deck.runid, summary));
            ("STRAIN_XX", "STRESS_XX")
        }
        RunOutput::Eos { summary, hugoniot, .. } => {
            let points = hugoniot.as_ref().map(|(_, points)| points.as_slice());
            println!("{}", crate::report::format_eos_summary(&deck.runid, summary, points));
            ("RHO", "PRES")
        }
    };
    println!("Output: {}", output.output().display());

    if args.plot {
        plot_columns(output.output(), x, y, args.width, args.height)?;
    }
    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    let deck = read_deck(&args.deck)?;
    let sim = pipeline::check_deck(&deck)?;
    match &sim {
        pipeline::Simulation::Solid(driver) => println!(
            "{}: ok ({} legs, {} steps, termination time {})",
            deck.runid,
            driver.path().legs().len(),
            driver.path().total_steps(),
            driver.path().termination_time()
        ),
        pipeline::Simulation::Eos { driver, .. } => {
            println!("{}: ok ({} surface points)", deck.runid, driver.surface().len())
        }
    }
    Ok(())
}

fn handle_perm(args: PermArgs) -> Result<(), AppError> {
    let mut spec = read_permutation_spec(&args.job)?;
    if let Some(n) = args.nprocs {
        spec.nprocs = n;
    }
    ensure_dir(&args.dir)?;

    let report = pipeline::run_permutation(&spec, &args.dir)?;
    println!("{}", crate::report::format_permutation_report(&spec.runid, &report));

    if !report.results.is_empty() && report.failed() == report.results.len() {
        return Err(AppError::new(4, "every permutation job failed; see the ledger"));
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    plot_columns(&args.csv, &args.x, &args.y, args.width, args.height)
}

fn plot_columns(csv: &Path, x: &str, y: &str, width: usize, height: usize) -> Result<(), AppError> {
    let history = read_history_csv(csv)?;
    let plot = crate::plot::render_history_plot(&history, x, y, width, height).ok_or_else(|| {
        AppError::new(
            2,
            format!("'{}' has no column '{x}' or '{y}'", csv.display()),
        )
    })?;
    println!("{plot}");
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create output dir '{}': {e}", dir.display())))
}
