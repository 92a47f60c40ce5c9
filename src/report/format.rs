//! Plain-text run reports.
//!
//! Formatting lives in one place so the drivers stay free of presentation
//! code and output changes are localized.

use nalgebra::Vector6;

use crate::domain::SYMM_LABELS;
use crate::eos::{EosSummary, HugoniotPoint};
use crate::permutate::{JobStatus, PermutationReport};
use crate::solver::{LegReport, RunSummary};

/// Format the summary of a completed solid run.
pub fn format_run_summary(runid: &str, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== mps - {runid} ===\n"));
    out.push_str(&format!("Started: {}\n", summary.started.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!(
        "Legs: {} | steps: {} | final time: {:.6}\n",
        summary.legs.len(),
        summary.steps,
        summary.final_time
    ));
    out.push_str(&format!(
        "Newton: iterations={} evaluations={} max cutback depth={}\n",
        summary.outcome.iterations, summary.outcome.evaluations, summary.outcome.cutback_depth
    ));
    out.push_str(&format!("Wall time: {:.3}s\n", summary.wall_seconds));

    out.push('\n');
    out.push_str(&format_leg_table(&summary.legs));

    out.push_str("\nFinal state:\n");
    out.push_str(&format!("- stress: {}\n", fmt_sym(&summary.final_stress)));
    out.push_str(&format!("- strain: {}\n", fmt_sym(&summary.final_strain)));

    out
}

/// Per-leg step and solver statistics.
pub fn format_leg_table(legs: &[LegReport]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>5} {:>7} {:>8} {:>8} {:>8}", "leg", "steps", "iters", "evals", "cutback").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<5} {:-<7} {:-<8} {:-<8} {:-<8}", "", "", "", "", "").trim_end());
    out.push('\n');

    for leg in legs {
        out.push_str(
            format!(
                "{:>5} {:>7} {:>8} {:>8} {:>8}",
                leg.number, leg.steps, leg.outcome.iterations, leg.outcome.evaluations, leg.outcome.cutback_depth
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

pub fn format_eos_summary(runid: &str, summary: &EosSummary, hugoniot: Option<&[HugoniotPoint]>) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== mps eos - {runid} ===\n"));
    out.push_str(&format!("Started: {}\n", summary.started.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!(
        "Points: {} | final pressure: {:.6e} | final energy: {:.6e}\n",
        summary.points, summary.final_pressure, summary.final_energy
    ));
    out.push_str(&format!("Wall time: {:.3}s\n", summary.wall_seconds));

    if let Some(points) = hugoniot {
        out.push_str(&format!("\nHugoniot ({} points):\n", points.len()));
        out.push_str(format!("{:>14} {:>14} {:>14} {:>14}", "density", "temperature", "energy", "pressure").trim_end());
        out.push('\n');
        for p in points {
            out.push_str(
                format!(
                    "{:>14.6e} {:>14.6e} {:>14.6e} {:>14.6e}",
                    p.density, p.temperature, p.energy, p.pressure
                )
                .trim_end(),
            );
            out.push('\n');
        }
    }
    out
}

/// Ledger-style summary of a permutation study.
pub fn format_permutation_report(runid: &str, report: &PermutationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== mps perm - {runid} ===\n"));
    out.push_str(&format!("Started: {}\n", report.started.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!(
        "Jobs: {} | failed: {} | workers: {} | wall time: {:.3}s\n",
        report.results.len(),
        report.failed(),
        report.workers,
        report.wall_seconds
    ));
    out.push_str(&format!("Ledger: {}\n", report.ledger.display()));
    if let Some(path) = &report.correlations {
        out.push_str(&format!("Correlations: {}\n", path.display()));
    }
    out.push('\n');

    for r in &report.results {
        let status = match r.status {
            JobStatus::Ok => "ok",
            JobStatus::Failed => "FAILED",
        };
        out.push_str(&format!("{:>4} {:<6} params={} responses={}", r.number, status, fmt_vec(&r.params), fmt_vec(&r.responses)));
        if let Some(msg) = &r.message {
            out.push_str(&format!(" ({})", truncate(msg, 60)));
        }
        out.push('\n');
    }
    out
}

fn fmt_sym(v: &Vector6<f64>) -> String {
    let parts: Vec<String> = SYMM_LABELS
        .iter()
        .zip(v.iter())
        .map(|(label, x)| format!("{label}={x:.6e}"))
        .collect();
    parts.join(" ")
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
