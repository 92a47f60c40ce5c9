//! Shared run pipeline used by every front-end subcommand.
//!
//! deck -> material -> driver -> sink -> summary
//!
//! The permutation runner reuses the same path for each job so a job is
//! exactly what `mps run` would have done with the substituted parameters.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{DriverSpec, HugoniotSpec, InputDeck};
use crate::eos::{EosDriver, EosSummary, HugoniotPoint, hugoniot_over_range, write_hugoniot_csv};
use crate::error::{AppError, DriverError};
use crate::material::{create_eos_material, create_material};
use crate::output::{CsvSink, read_history_csv};
use crate::permutate::{PermutationReport, PermutationSpec, Permutator, build_jobs};
use crate::solver::{PathDriver, RunSummary};

/// A deck resolved into its driver.
pub enum Simulation {
    Solid(PathDriver),
    Eos {
        driver: EosDriver,
        hugoniot: Option<HugoniotSpec>,
    },
}

impl Simulation {
    /// Build the material and driver; every input error surfaces here.
    pub fn from_deck(deck: &InputDeck) -> Result<Self, DriverError> {
        match &deck.driver {
            DriverSpec::Solid { path, options, newton } => {
                let material = create_material(&deck.material)?;
                let driver = PathDriver::from_text(path, options, material, *newton)?;
                Ok(Simulation::Solid(driver))
            }
            DriverSpec::Eos {
                surface,
                options,
                hugoniot,
            } => {
                let material = create_eos_material(&deck.material)?;
                let driver = EosDriver::from_text(surface, options, material)?;
                Ok(Simulation::Eos {
                    driver,
                    hugoniot: hugoniot.clone(),
                })
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Simulation::Solid(_) => "solid",
            Simulation::Eos { .. } => "eos",
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub enum RunOutput {
    Solid {
        output: PathBuf,
        summary: RunSummary,
    },
    Eos {
        output: PathBuf,
        summary: EosSummary,
        hugoniot: Option<(PathBuf, Vec<HugoniotPoint>)>,
    },
}

impl RunOutput {
    pub fn output(&self) -> &Path {
        match self {
            RunOutput::Solid { output, .. } | RunOutput::Eos { output, .. } => output,
        }
    }
}

/// Validate a deck without integrating anything.
pub fn check_deck(deck: &InputDeck) -> Result<Simulation, AppError> {
    let sim = Simulation::from_deck(deck)?;
    info!(runid = %deck.runid, kind = sim.kind(), "input deck is valid");
    Ok(sim)
}

/// Run a deck, writing `<runid>.csv` (or the deck's output path) under `dir`.
pub fn run_deck(deck: &InputDeck, dir: &Path) -> Result<RunOutput, DriverError> {
    let output = deck.output_path(dir);
    match Simulation::from_deck(deck)? {
        Simulation::Solid(mut driver) => {
            let mut sink = CsvSink::create(&output, driver.layout())?;
            let summary = driver.run(&mut sink)?;
            Ok(RunOutput::Solid { output, summary })
        }
        Simulation::Eos { driver, hugoniot } => {
            let mut sink = CsvSink::create(&output, driver.layout())?;
            let summary = driver.run(&mut sink)?;
            let hugoniot = match hugoniot {
                Some(spec) => {
                    let points = hugoniot_over_range(
                        driver.material(),
                        spec.density_range,
                        spec.initial_temperature,
                        spec.increments,
                    )?;
                    let path = dir.join(format!("{}.hugoniot.csv", deck.runid));
                    write_hugoniot_csv(&path, &points)?;
                    info!(points = points.len(), path = %path.display(), "hugoniot written");
                    Some((path, points))
                }
                None => None,
            };
            Ok(RunOutput::Eos {
                output,
                summary,
                hugoniot,
            })
        }
    }
}

/// Run every parameter set of a permutation study on the worker pool.
///
/// Each job runs its deck inside its own directory and reports the final
/// value of each requested response column.
pub fn run_permutation(spec: &PermutationSpec, dir: &Path) -> Result<PermutationReport, DriverError> {
    let variables = spec.generate_variables()?;
    let names: Vec<String> = variables.iter().map(|v| v.name.clone()).collect();
    let jobs = build_jobs(spec.method, &variables)?;

    let permutator = Permutator::new(
        &spec.runid,
        dir,
        names,
        spec.responses.iter().map(ToString::to_string).collect(),
        jobs,
        spec.nprocs,
    )
    .with_correlations(spec.correlations);

    permutator.run(|job| {
        let mut deck = spec.deck_for(&job.names, &job.params);
        deck.output.path = Some(job.dir.join(format!("{}.csv", deck.runid)));

        let output = run_deck(&deck, &job.dir).map_err(|e| e.to_string())?;
        let history = read_history_csv(output.output()).map_err(|e| e.to_string())?;
        spec.responses
            .iter()
            .map(|response| {
                let column = history
                    .column(&response.column)
                    .ok_or_else(|| format!("response '{response}' is not an output column"))?;
                response
                    .reduction
                    .apply(&column)
                    .ok_or_else(|| format!("response '{response}' has no output rows"))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mps-pipeline-{}-{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn deck(json: &str) -> InputDeck {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn solid_deck_runs_to_csv() {
        let dir = scratch("solid");
        let d = deck(
            r#"{"runid": "uni",
                "material": {"model": "elastic", "parameters": {"K": 10.0, "G": 6.0}},
                "driver": {"kind": "solid", "path": "1 4 222222 0.01 0 0 0 0 0"}}"#,
        );
        let out = run_deck(&d, &dir).unwrap();
        assert_eq!(out.output(), dir.join("uni.csv"));

        let history = read_history_csv(out.output()).unwrap();
        assert_eq!(history.rows.len(), 5);
        let sxx = history.last("STRESS_XX").unwrap();
        assert!((sxx - (10.0 + 4.0 * 6.0 / 3.0) * 0.01).abs() < 1e-10);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn check_reports_every_bad_leg() {
        let d = deck(
            r#"{"runid": "bad",
                "material": {"model": "elastic", "parameters": {"K": 10.0, "G": 6.0}},
                "driver": {"kind": "solid", "path": "1 1 222222 0 0 0 0 0 0\nx 1 222222 0 0 0 0 0 0\n0.5 1 222222 0 0 0 0 0 0"}}"#,
        );
        let err = check_deck(&d).err().unwrap();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("leg 2"));
        assert!(err.to_string().contains("leg 3"));
    }

    #[test]
    fn eos_deck_writes_hugoniot() {
        let dir = scratch("eos");
        let d = deck(
            r#"{"runid": "gas",
                "material": {"model": "idealgas", "parameters": {"R": 1.0, "CV": 2.5}},
                "driver": {"kind": "eos", "surface": "1 12 1.0 300\n3 12 2.0 600",
                           "hugoniot": {"density_range": [1.0, 1.5], "initial_temperature": 300.0,
                                        "increments": 5}}}"#,
        );
        match run_deck(&d, &dir).unwrap() {
            RunOutput::Eos { hugoniot: Some((path, points)), .. } => {
                assert_eq!(points.len(), 5);
                assert!(path.exists());
            }
            other => panic!("unexpected output {other:?}"),
        }
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn permutation_collects_final_responses() {
        let dir = scratch("perm");
        let spec: PermutationSpec = serde_json::from_str(
            r#"{"runid": "study", "method": "zip", "nprocs": 2,
                "variables": [{"name": "K", "generator": {"kind": "list", "values": [10.0, 20.0]}}],
                "responses": ["STRESS_XX"],
                "deck": {"runid": "uni",
                         "material": {"model": "elastic", "parameters": {"K": 1.0, "G": 6.0}},
                         "driver": {"kind": "solid", "path": "1 2 222222 0.01 0 0 0 0 0"}}}"#,
        )
        .unwrap();

        let report = run_permutation(&spec, &dir).unwrap();
        assert_eq!(report.failed(), 0);
        let first = report.results[0].responses[0];
        let second = report.results[1].responses[0];
        assert!((first - 0.18).abs() < 1e-10);
        assert!((second - 0.28).abs() < 1e-10);
        assert!(report.results[0].dir.join("uni.csv").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn permutation_reduces_responses_and_correlates() {
        let dir = scratch("perm-reduce");
        let spec: PermutationSpec = serde_json::from_str(
            r#"{"runid": "cyc", "method": "zip", "correlations": true,
                "variables": [{"name": "K", "generator": {"kind": "list", "values": [10.0, 20.0, 30.0]}}],
                "responses": ["STRESS_XX", "max(STRESS_XX)", "mean(STRAIN_XX)", "absmin(STRESS_XX)"],
                "deck": {"runid": "cyc",
                         "material": {"model": "elastic", "parameters": {"K": 1.0, "G": 6.0}},
                         "driver": {"kind": "solid", "path": "1 1 222222 0.01 0 0 0 0 0\n2 1 222222 0 0 0 0 0 0"}}}"#,
        )
        .unwrap();

        let report = run_permutation(&spec, &dir).unwrap();
        assert_eq!(report.failed(), 0);
        // K = 10, G = 6: peak 0.18 at t = 1, unloaded at t = 2
        let r = &report.results[0].responses;
        assert!(r[0].abs() < 1e-12);
        assert!((r[1] - 0.18).abs() < 1e-10);
        assert!((r[2] - 0.01 / 3.0).abs() < 1e-12);
        assert!(r[3].abs() < 1e-12);

        let ledger = fs::read_to_string(&report.ledger).unwrap();
        assert!(ledger.starts_with("job,status,dir,K,STRESS_XX,max(STRESS_XX),mean(STRAIN_XX),absmin(STRESS_XX)"));
        let corr = fs::read_to_string(report.correlations.as_ref().unwrap()).unwrap();
        assert!(corr.lines().nth(2).unwrap().starts_with("STRESS_XX,"));
        fs::remove_dir_all(&dir).ok();
    }
}
