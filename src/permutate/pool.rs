//! Bounded worker pool for permutation jobs.
//!
//! Jobs run on a dedicated `rayon` pool. Each worker sends its result over
//! an `mpsc` channel; the controller thread is the only writer of the
//! ledger. A failing job is recorded and never cancels its siblings.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Instant;

use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::DriverError;
use crate::permutate::{correlation_matrix, write_correlations};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Failed,
}

/// What a job function sees.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// 1-based job number.
    pub number: usize,
    pub dir: PathBuf,
    pub names: Vec<String>,
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub number: usize,
    pub status: JobStatus,
    pub dir: PathBuf,
    pub params: Vec<f64>,
    /// NaN for every response of a failed job.
    pub responses: Vec<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermutationReport {
    pub started: DateTime<Local>,
    pub wall_seconds: f64,
    pub root: PathBuf,
    pub ledger: PathBuf,
    pub workers: usize,
    /// Written only when requested and at least two jobs succeeded.
    pub correlations: Option<PathBuf>,
    /// Sorted by job number.
    pub results: Vec<JobResult>,
}

impl PermutationReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.status == JobStatus::Failed).count()
    }
}

pub struct Permutator {
    runid: String,
    root: PathBuf,
    names: Vec<String>,
    responses: Vec<String>,
    jobs: Vec<Vec<f64>>,
    nprocs: usize,
    correlations: bool,
}

/// `min(requested, available cores, jobs)`, and at least one.
pub fn pool_size(requested: usize, jobs: usize) -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    requested.max(1).min(cores).min(jobs.max(1))
}

impl Permutator {
    /// `root` is the parent directory of `<runid>.eval/`.
    pub fn new(
        runid: &str,
        root: &Path,
        names: Vec<String>,
        responses: Vec<String>,
        jobs: Vec<Vec<f64>>,
        nprocs: usize,
    ) -> Self {
        Self {
            runid: runid.to_string(),
            root: root.join(format!("{runid}.eval")),
            names,
            responses,
            jobs,
            nprocs,
            correlations: false,
        }
    }

    pub fn with_correlations(mut self, enabled: bool) -> Self {
        self.correlations = enabled;
        self
    }

    pub fn eval_root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, number: usize) -> PathBuf {
        let width = self.jobs.len().to_string().len().max(2);
        self.root.join(format!("eval_{number:0width$}"))
    }

    /// Run every job through `func`, which returns one value per response.
    pub fn run<F>(&self, func: F) -> Result<PermutationReport, DriverError>
    where
        F: Fn(&Job) -> Result<Vec<f64>, String> + Sync,
    {
        let started = Local::now();
        let clock = Instant::now();

        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;

        let workers = pool_size(self.nprocs, self.jobs.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| DriverError::Io(format!("failed to start worker pool: {e}")))?;
        info!(runid = %self.runid, jobs = self.jobs.len(), workers, "starting permutation jobs");

        let ledger_path = self.root.join("ledger.csv");
        let mut ledger = csv::Writer::from_path(&ledger_path)?;
        ledger.write_record(self.ledger_header())?;

        let (tx, rx) = mpsc::channel::<JobResult>();
        let mut results = Vec::with_capacity(self.jobs.len());

        let controller: Result<(), DriverError> = std::thread::scope(|scope| {
            scope.spawn(|| {
                pool.install(|| {
                    self.jobs
                        .par_iter()
                        .enumerate()
                        .for_each_with(tx, |tx, (i, params)| {
                            let result = self.run_job(i + 1, params, &func);
                            // receiver outlives the pool
                            let _ = tx.send(result);
                        });
                });
            });

            for result in rx {
                ledger.write_record(self.ledger_row(&result))?;
                ledger.flush()?;
                results.push(result);
            }
            Ok(())
        });
        controller?;

        results.sort_by_key(|r| r.number);
        let correlations = if self.correlations {
            self.correlate(&results)?
        } else {
            None
        };
        let report = PermutationReport {
            started,
            wall_seconds: clock.elapsed().as_secs_f64(),
            root: self.root.clone(),
            ledger: ledger_path,
            workers,
            correlations,
            results,
        };
        if report.failed() == report.results.len() {
            error!(runid = %self.runid, "all permutation jobs failed");
        } else {
            info!(
                runid = %self.runid,
                failed = report.failed(),
                seconds = report.wall_seconds,
                "permutation jobs complete"
            );
        }
        Ok(report)
    }

    fn run_job<F>(&self, number: usize, params: &[f64], func: &F) -> JobResult
    where
        F: Fn(&Job) -> Result<Vec<f64>, String>,
    {
        let job = Job {
            number,
            dir: self.job_dir(number),
            names: self.names.clone(),
            params: params.to_vec(),
        };
        info!(job = number, total = self.jobs.len(), "starting job");

        let outcome = write_params(&job)
            .map_err(|e| format!("failed to prepare {}: {e}", job.dir.display()))
            .and_then(|_| func(&job))
            .and_then(|values| {
                if values.len() == self.responses.len() {
                    Ok(values)
                } else {
                    Err(format!(
                        "{} response value(s) for {} response name(s)",
                        values.len(),
                        self.responses.len()
                    ))
                }
            });

        match outcome {
            Ok(responses) => JobResult {
                number,
                status: JobStatus::Ok,
                dir: job.dir,
                params: job.params,
                responses,
                message: None,
            },
            Err(message) => {
                error!(job = number, %message, "job failed");
                JobResult {
                    number,
                    status: JobStatus::Failed,
                    dir: job.dir,
                    params: job.params,
                    responses: vec![f64::NAN; self.responses.len()],
                    message: Some(message),
                }
            }
        }
    }

    /// Correlate parameters and responses over the successful jobs.
    fn correlate(&self, results: &[JobResult]) -> Result<Option<PathBuf>, DriverError> {
        let ok: Vec<&JobResult> = results.iter().filter(|r| r.status == JobStatus::Ok).collect();
        if ok.len() < 2 {
            warn!(runid = %self.runid, succeeded = ok.len(), "too few jobs succeeded to correlate");
            return Ok(None);
        }

        let mut names = self.names.clone();
        names.extend(self.responses.iter().cloned());
        let columns: Vec<Vec<f64>> = (0..names.len())
            .map(|k| {
                ok.iter()
                    .map(|r| r.params.iter().chain(&r.responses).nth(k).copied().unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();

        let path = self.root.join("correlations.csv");
        write_correlations(&path, &names, &correlation_matrix(&columns))?;
        info!(path = %path.display(), "wrote correlation matrix");
        Ok(Some(path))
    }

    fn ledger_header(&self) -> Vec<String> {
        let mut header = vec!["job".to_string(), "status".to_string(), "dir".to_string()];
        header.extend(self.names.iter().cloned());
        header.extend(self.responses.iter().cloned());
        header
    }

    fn ledger_row(&self, r: &JobResult) -> Vec<String> {
        let status = match r.status {
            JobStatus::Ok => "ok",
            JobStatus::Failed => "failed",
        };
        let mut row = vec![r.number.to_string(), status.to_string(), r.dir.display().to_string()];
        row.extend(r.params.iter().map(|v| v.to_string()));
        row.extend(r.responses.iter().map(|v| v.to_string()));
        row
    }
}

fn write_params(job: &Job) -> std::io::Result<()> {
    fs::create_dir_all(&job.dir)?;
    let mut file = File::create(job.dir.join("params.in"))?;
    for (name, value) in job.names.iter().zip(&job.params) {
        writeln!(file, "{name} = {value:.18e}")?;
    }
    Ok(())
}
