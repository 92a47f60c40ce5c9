//! Shared domain types.
//!
//! Tensor conventions used throughout the crate:
//!
//! - symmetric tensors are `Vector6` ordered `XX, YY, ZZ, XY, YZ, XZ` and hold
//!   tensor (not engineering) shear components
//! - full tensors (deformation gradient, rotation) are `Matrix3`

use nalgebra::{Matrix3, Vector6};
use serde::{Deserialize, Serialize};

use crate::material::Material;

/// Labels of the six symmetric components, in storage order.
pub const SYMM_LABELS: [&str; 6] = ["XX", "YY", "ZZ", "XY", "YZ", "XZ"];

/// Labels of the nine full-tensor components, row-major.
pub const TENS_LABELS: [&str; 9] = ["XX", "XY", "XZ", "YX", "YY", "YZ", "ZX", "ZY", "ZZ"];

/// Per-component boundary condition type.
///
/// The discriminants are the digits used in the textual leg encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCode {
    StrainRate = 1,
    Strain = 2,
    StressRate = 3,
    Stress = 4,
    DefGrad = 5,
    EField = 6,
    Displacement = 8,
    Skip = 9,
}

impl ControlCode {
    pub fn from_digit(digit: u32) -> Option<Self> {
        match digit {
            1 => Some(ControlCode::StrainRate),
            2 => Some(ControlCode::Strain),
            3 => Some(ControlCode::StressRate),
            4 => Some(ControlCode::Stress),
            5 => Some(ControlCode::DefGrad),
            6 => Some(ControlCode::EField),
            8 => Some(ControlCode::Displacement),
            9 => Some(ControlCode::Skip),
            _ => None,
        }
    }

    pub fn digit(self) -> u32 {
        self as u32
    }

    /// Stress or stress rate: the strain increment is a Newton unknown.
    pub fn is_stress_like(self) -> bool {
        matches!(self, ControlCode::Stress | ControlCode::StressRate)
    }

    pub fn is_rate(self) -> bool {
        matches!(self, ControlCode::StrainRate | ControlCode::StressRate)
    }

    /// Codes that may remain in a leg after formatting.
    pub fn is_plain(self) -> bool {
        matches!(
            self,
            ControlCode::StrainRate | ControlCode::Strain | ControlCode::StressRate | ControlCode::Stress
        )
    }
}

/// A validated load segment.
///
/// Produced only by `legs::format_legs`; all special encodings (deformation
/// gradient, displacement, volumetric) have already been reduced to six plain
/// strain/stress codes.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    /// 1-based leg number as written in the input.
    pub number: usize,
    pub termination_time: f64,
    pub num_steps: usize,
    pub control: [ControlCode; 6],
    pub values: Vector6<f64>,
    pub rotation: Matrix3<f64>,
    pub efield: [f64; 3],
    pub temperature: Option<f64>,
}

impl Leg {
    /// Initial-condition legs seed the state and perform no integration.
    pub fn is_initial_condition(&self) -> bool {
        self.num_steps == 0
    }

    pub fn has_stress_control(&self) -> bool {
        self.control.iter().any(|c| c.is_stress_like())
    }

    /// Control digits as written in the textual encoding, e.g. `"422222"`.
    pub fn control_string(&self) -> String {
        self.control
            .iter()
            .filter_map(|c| char::from_digit(c.digit(), 10))
            .collect()
    }
}

/// An ordered, immutable load history for one material point.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    legs: Vec<Leg>,
    kappa: f64,
}

impl Path {
    pub(crate) fn new(legs: Vec<Leg>, kappa: f64) -> Self {
        Self { legs, kappa }
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Seth-Hill parameter of the strain measure.
    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    pub fn termination_time(&self) -> f64 {
        self.legs.last().map(|l| l.termination_time).unwrap_or(0.0)
    }

    pub fn total_steps(&self) -> usize {
        self.legs.iter().map(|l| l.num_steps).sum()
    }
}

/// Point-wise mechanical/thermal state carried between sub-steps.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverState {
    pub time: f64,
    pub stress: Vector6<f64>,
    pub strain: Vector6<f64>,
    /// Rate of deformation of the last committed step.
    pub stretching: Vector6<f64>,
    pub defgrad: Matrix3<f64>,
    pub rotation: Matrix3<f64>,
    pub temperature: f64,
    pub efield: [f64; 3],
    /// Material internal-state vector.
    pub state_vars: Vec<f64>,
    /// Index of the leg being integrated (0-based).
    pub leg: usize,
    /// Committed sub-steps since the start of the path.
    pub step: usize,
}

impl DriverState {
    /// Reference configuration for `material`.
    pub fn new(material: &dyn Material) -> Self {
        Self {
            time: 0.0,
            stress: Vector6::zeros(),
            strain: Vector6::zeros(),
            stretching: Vector6::zeros(),
            defgrad: Matrix3::identity(),
            rotation: Matrix3::identity(),
            temperature: material.initial_temperature(),
            efield: [0.0; 3],
            state_vars: material.initial_state(),
            leg: 0,
            step: 0,
        }
    }
}

/// One committed output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub time: f64,
    pub global: Vec<f64>,
    pub element: Vec<f64>,
    pub displacement: Vec<f64>,
}

/// Per sub-step solver statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// Newton updates (linear solves) performed across all cutback pieces.
    pub iterations: usize,
    /// Material evaluations, including finite-difference perturbations.
    pub evaluations: usize,
    /// Deepest bisection level needed to commit the sub-step.
    pub cutback_depth: usize,
}

impl StepOutcome {
    pub fn absorb(&mut self, other: StepOutcome) {
        self.iterations += other.iterations;
        self.evaluations += other.evaluations;
        self.cutback_depth = self.cutback_depth.max(other.cutback_depth);
    }
}
