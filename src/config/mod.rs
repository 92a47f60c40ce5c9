//! Run configuration.
//!
//! Everything that influences a run is carried by these structs and passed
//! explicitly to the constructors that need it. Input decks are JSON files
//! deserialized straight into `InputDeck`.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path as FsPath, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Newton / cutback controls for the step solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    /// Relative residual tolerance.
    pub rel_tol: f64,
    /// Absolute residual tolerance (stress units).
    pub abs_tol: f64,
    /// Lower bound on the stress scale used by the relative test.
    pub stress_floor: f64,
    pub max_iterations: usize,
    /// Maximum bisection depth of a single sub-step.
    pub max_cutbacks: usize,
    /// Relative perturbation for finite-difference tangents.
    pub fd_step: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            rel_tol: 1e-9,
            abs_tol: 1e-12,
            stress_floor: 1.0,
            max_iterations: 25,
            max_cutbacks: 8,
            fd_step: f64::EPSILON.sqrt(),
        }
    }
}

/// Layout of the leg text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LegFormat {
    /// `<time> <num_steps> <control> <values...> [temperature]`
    #[default]
    Default,
    /// Plain numeric table, one leg per row.
    Table,
}

/// Meaning of the time column of a table-formatted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    #[default]
    Time,
    Dt,
}

/// Path-wide options: strain measure and global multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    /// Seth-Hill parameter.
    pub kappa: f64,
    pub amplitude: f64,
    /// Rate multiplier (strain and stress rates; divides time).
    pub ratfac: f64,
    /// Step-count multiplier.
    pub nfac: f64,
    pub tstar: f64,
    pub estar: f64,
    pub sstar: f64,
    pub fstar: f64,
    pub efstar: f64,
    pub dstar: f64,
    pub format: LegFormat,
    pub tblcols: String,
    pub tbltfmt: TimeFormat,
    pub tblcfmt: String,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            kappa: 0.0,
            amplitude: 1.0,
            ratfac: 1.0,
            nfac: 1.0,
            tstar: 1.0,
            estar: 1.0,
            sstar: 1.0,
            fstar: 1.0,
            efstar: 1.0,
            dstar: 1.0,
            format: LegFormat::Default,
            tblcols: "1:7".to_string(),
            tbltfmt: TimeFormat::Time,
            tblcfmt: "222222".to_string(),
        }
    }
}

/// Multipliers for an EOS surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceOptions {
    pub amplitude: f64,
    pub rstar: f64,
    pub tstar: f64,
    pub nfac: f64,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            rstar: 1.0,
            tstar: 1.0,
            nfac: 1.0,
        }
    }
}

/// Hugoniot extraction request for EOS runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HugoniotSpec {
    pub density_range: [f64; 2],
    pub initial_temperature: f64,
    #[serde(default = "default_increments")]
    pub increments: usize,
}

fn default_increments() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub model: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

/// Driver selection, resolved once when the simulation is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DriverSpec {
    Solid {
        path: String,
        #[serde(default)]
        options: PathOptions,
        #[serde(default)]
        newton: NewtonSettings,
    },
    Eos {
        surface: String,
        #[serde(default)]
        options: SurfaceOptions,
        #[serde(default)]
        hugoniot: Option<HugoniotSpec>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputSpec {
    /// Output CSV; defaults to `<runid>.csv` in the working directory.
    pub path: Option<PathBuf>,
}

/// A complete simulation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDeck {
    pub runid: String,
    pub material: MaterialSpec,
    pub driver: DriverSpec,
    #[serde(default)]
    pub output: OutputSpec,
}

impl InputDeck {
    pub fn output_path(&self, dir: &FsPath) -> PathBuf {
        self.output
            .path
            .clone()
            .unwrap_or_else(|| dir.join(format!("{}.csv", self.runid)))
    }
}

/// Read an input deck from a JSON file.
pub fn read_deck(path: &FsPath) -> Result<InputDeck, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open input deck '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid input deck '{}': {e}", path.display())))
}
