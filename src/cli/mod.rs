//! Command-line parsing for the material-point driver.
//!
//! Argument parsing and command dispatch stay separate from the driver code;
//! everything here is plain data handed to `crate::app`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "mps", version, about = "Material point simulator: mixed-control deformation paths")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `MPS_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an input deck and write its output table.
    Run(RunArgs),
    /// Validate an input deck without integrating.
    Check(CheckArgs),
    /// Run a parameter permutation study.
    Perm(PermArgs),
    /// Run an EOS deck (same as `run`, but rejects solid decks).
    Eos(RunArgs),
    /// Plot two columns of an output CSV in the terminal.
    Plot(PlotArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// JSON input deck.
    #[arg(value_name = "DECK")]
    pub deck: PathBuf,

    /// Directory for output files.
    #[arg(short = 'd', long, default_value = ".")]
    pub dir: PathBuf,

    /// Plot STRAIN_XX vs STRESS_XX (or RHO vs PRES) after the run.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "DECK")]
    pub deck: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct PermArgs {
    /// JSON permutation job.
    #[arg(value_name = "JOB")]
    pub job: PathBuf,

    /// Parent directory of `<runid>.eval/`.
    #[arg(short = 'd', long, default_value = ".")]
    pub dir: PathBuf,

    /// Override the job's worker count.
    #[arg(short = 'j', long)]
    pub nprocs: Option<usize>,
}

/// Options for plotting a saved output table.
#[derive(Debug, Parser, Clone)]
pub struct PlotArgs {
    /// Output CSV written by `mps run`.
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,

    /// Column on the horizontal axis.
    #[arg(long, default_value = "STRAIN_XX")]
    pub x: String,

    /// Column on the vertical axis.
    #[arg(long, default_value = "STRESS_XX")]
    pub y: String,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}
