//! Parameter permutation: run one simulation per parameter set on a bounded
//! worker pool and collect the results in a ledger.

pub mod correlate;
pub mod pool;
pub mod response;
pub mod variable;

pub use correlate::*;
pub use pool::*;
pub use response::*;
pub use variable::*;

use std::fs::File;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::InputDeck;
use crate::error::{AppError, DriverError};

fn default_nprocs() -> usize {
    1
}

/// A permutation study: the base deck plus the material parameters to vary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationSpec {
    pub runid: String,
    #[serde(default)]
    pub method: PermutationMethod,
    /// Seed for the random generators.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_nprocs")]
    pub nprocs: usize,
    pub variables: Vec<VariableSpec>,
    /// Output columns, each reduced to one value per job.
    #[serde(default)]
    pub responses: Vec<ResponseSpec>,
    /// Also write `correlations.csv` beside the ledger.
    #[serde(default)]
    pub correlations: bool,
    pub deck: InputDeck,
}

impl PermutationSpec {
    pub fn generate_variables(&self) -> Result<Vec<PermutateVariable>, DriverError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.variables
            .iter()
            .map(|spec| PermutateVariable::generate(spec, &mut rng))
            .collect()
    }

    /// Copy of the base deck with `params` substituted as material parameters.
    pub fn deck_for(&self, names: &[String], params: &[f64]) -> InputDeck {
        let mut deck = self.deck.clone();
        for (name, &value) in names.iter().zip(params) {
            deck.material.parameters.insert(name.clone(), value);
        }
        deck
    }
}

pub fn read_permutation_spec(path: &Path) -> Result<PermutationSpec, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open permutation job '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid permutation job '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_substitutes_parameters() {
        let json = r#"{
            "runid": "study",
            "method": "combination",
            "variables": [
                {"name": "K", "generator": {"kind": "list", "values": [1.0, 2.0]}},
                {"name": "G", "generator": {"kind": "range", "start": 1.0, "end": 2.0, "n": 3}}
            ],
            "responses": ["STRESS_XX", "absmax(STRAIN_XX)"],
            "deck": {
                "runid": "base",
                "material": {"model": "elastic", "parameters": {"K": 5.0, "G": 5.0}},
                "driver": {"kind": "solid", "path": "1 1 222222 0.01 0 0 0 0 0"}
            }
        }"#;
        let spec: PermutationSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.nprocs, 1);
        assert_eq!(spec.method, PermutationMethod::Combination);
        assert!(!spec.correlations);
        assert_eq!(spec.responses[0], ResponseSpec::last("STRESS_XX"));
        assert_eq!(spec.responses[1].reduction, Reduction::AbsMax);

        let vars = spec.generate_variables().unwrap();
        let names: Vec<String> = vars.iter().map(|v| v.name.clone()).collect();
        let jobs = build_jobs(spec.method, &vars).unwrap();
        assert_eq!(jobs.len(), 6);

        let deck = spec.deck_for(&names, &jobs[5]);
        assert_eq!(deck.material.parameters["K"], 2.0);
        assert_eq!(deck.material.parameters["G"], 2.0);
        assert_eq!(spec.deck.material.parameters["K"], 5.0);
    }
}
