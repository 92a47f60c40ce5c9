//! Permutated parameters and the job tables built from them.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Uniform, Weibull};
use serde::{Deserialize, Serialize};

use crate::eos::linspace;
use crate::error::DriverError;

/// How the values of one permutated parameter are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Generator {
    /// `n` evenly spaced values in `[start, end]`.
    Range { start: f64, end: f64, n: usize },
    List { values: Vec<f64> },
    Uniform { low: f64, high: f64, n: usize },
    Normal { mean: f64, std_dev: f64, n: usize },
    /// `n` draws from a Weibull distribution.
    Weibull { scale: f64, shape: f64, n: usize },
    /// `n` evenly spaced values within `± percent %` of `value`.
    Percentage { value: f64, percent: f64, n: usize },
}

impl Generator {
    pub fn is_random(&self) -> bool {
        matches!(
            self,
            Generator::Uniform { .. } | Generator::Normal { .. } | Generator::Weibull { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub generator: Generator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermutateVariable {
    pub name: String,
    pub values: Vec<f64>,
    pub random: bool,
}

fn bad(name: &str, msg: impl std::fmt::Display) -> DriverError {
    DriverError::invalid(0, format!("{name}: {msg}"))
}

impl PermutateVariable {
    pub fn generate(spec: &VariableSpec, rng: &mut StdRng) -> Result<Self, DriverError> {
        let name = spec.name.as_str();
        let values = match &spec.generator {
            Generator::Range { start, end, n } => linspace(*start, *end, *n),
            Generator::List { values } => values.clone(),
            Generator::Uniform { low, high, n } => {
                if !(low < high) {
                    return Err(bad(name, format!("uniform needs low < high, got [{low}, {high}]")));
                }
                Uniform::new(*low, *high).sample_iter(rng).take(*n).collect()
            }
            Generator::Normal { mean, std_dev, n } => {
                let dist = Normal::new(*mean, *std_dev).map_err(|e| bad(name, e))?;
                dist.sample_iter(rng).take(*n).collect()
            }
            Generator::Weibull { scale, shape, n } => {
                let dist = Weibull::new(*scale, *shape).map_err(|e| bad(name, e))?;
                dist.sample_iter(rng).take(*n).collect()
            }
            Generator::Percentage { value, percent, n } => {
                let delta = value * percent / 100.0;
                linspace(value - delta, value + delta, *n)
            }
        };

        if values.is_empty() {
            return Err(bad(name, "generator produced no values"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(bad(name, "generator produced non-finite values"));
        }
        Ok(Self {
            name: spec.name.clone(),
            values,
            random: spec.generator.is_random(),
        })
    }
}

/// How variables are combined into jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermutationMethod {
    /// i-th job takes the i-th value of every variable.
    #[default]
    Zip,
    /// Cartesian product.
    Combination,
    /// Zip of random draws.
    Shotgun,
}

/// Parameter sets, one per job, in variable order.
pub fn build_jobs(method: PermutationMethod, vars: &[PermutateVariable]) -> Result<Vec<Vec<f64>>, DriverError> {
    let Some(first) = vars.first() else {
        return Err(DriverError::invalid(0, "no permutated variables"));
    };

    match method {
        PermutationMethod::Zip | PermutationMethod::Shotgun => {
            if method == PermutationMethod::Shotgun {
                if let Some(v) = vars.iter().find(|v| !v.random) {
                    return Err(bad(&v.name, "shotgun needs a random generator"));
                }
            }
            let n = first.values.len();
            if let Some(v) = vars.iter().find(|v| v.values.len() != n) {
                return Err(bad(
                    &v.name,
                    format!("{} values, expected {n} to match '{}'", v.values.len(), first.name),
                ));
            }
            Ok((0..n).map(|i| vars.iter().map(|v| v.values[i]).collect()).collect())
        }
        PermutationMethod::Combination => {
            let mut jobs: Vec<Vec<f64>> = vec![Vec::new()];
            for v in vars {
                jobs = jobs
                    .iter()
                    .flat_map(|prefix| {
                        v.values.iter().map(move |&x| {
                            let mut next = prefix.clone();
                            next.push(x);
                            next
                        })
                    })
                    .collect();
            }
            Ok(jobs)
        }
    }
}
