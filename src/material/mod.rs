//! Constitutive-model boundary.
//!
//! The driver only talks to materials through the [`Material`] trait:
//!
//! - the caller owns every array; `update` receives borrowed start-of-step
//!   values and returns fresh end-of-step values
//! - implementations must not keep hidden state between calls
//! - a kernel either supplies its own tangent ([`TangentSource::Analytic`])
//!   or lets the step solver estimate it by finite differences
//!
//! Equation-of-state models used by the EOS driver implement [`EosMaterial`].

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Matrix6, Vector6};

use crate::config::MaterialSpec;
use crate::error::MaterialError;

pub mod elastic;
pub mod idealgas;
pub mod vonmises;

pub use elastic::LinearElastic;
pub use idealgas::IdealGas;
pub use vonmises::VonMises;

/// How the tangent stiffness `dσ/dε` is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TangentSource {
    /// `MaterialResponse::jacobian` is always populated.
    Analytic,
    /// The step solver perturbs the stress-controlled strain components.
    FiniteDifference,
}

/// Everything a kernel sees for one update.
#[derive(Debug, Clone, Copy)]
pub struct MaterialInput<'a> {
    pub time: f64,
    pub dtime: f64,
    pub temperature: f64,
    pub dtemperature: f64,
    /// Rate of deformation over the step.
    pub stretching: &'a Vector6<f64>,
    /// End-of-step strain (Seth-Hill measure of the path).
    pub strain: &'a Vector6<f64>,
    /// End-of-step deformation gradient.
    pub defgrad: &'a Matrix3<f64>,
    pub efield: &'a [f64; 3],
    /// Start-of-step stress.
    pub stress: &'a Vector6<f64>,
    /// Start-of-step internal state.
    pub state: &'a [f64],
}

impl MaterialInput<'_> {
    /// Strain increment `d · dt`.
    pub fn strain_increment(&self) -> Vector6<f64> {
        self.stretching * self.dtime
    }
}

/// End-of-step values returned by a kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialResponse {
    pub stress: Vector6<f64>,
    pub state: Vec<f64>,
    pub jacobian: Option<Matrix6<f64>>,
}

impl MaterialResponse {
    /// Reject NaN/inf before the solver sees them.
    pub fn checked(self) -> Result<Self, MaterialError> {
        if self.stress.iter().any(|v| !v.is_finite()) {
            return Err(MaterialError::NonFinite("stress"));
        }
        if self.state.iter().any(|v| !v.is_finite()) {
            return Err(MaterialError::NonFinite("state variables"));
        }
        if let Some(j) = &self.jacobian {
            if j.iter().any(|v| !v.is_finite()) {
                return Err(MaterialError::NonFinite("jacobian"));
            }
        }
        Ok(self)
    }
}

/// A stress-strain kernel for the solid driver.
pub trait Material: Send + Sync {
    fn name(&self) -> &str;

    /// Names of the internal state variables, in storage order.
    fn state_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![0.0; self.state_names().len()]
    }

    fn initial_temperature(&self) -> f64 {
        0.0
    }

    fn tangent_source(&self) -> TangentSource;

    fn update(&self, input: &MaterialInput<'_>) -> Result<MaterialResponse, MaterialError>;
}

/// Thermodynamic state returned by an equation of state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EosResponse {
    pub pressure: f64,
    pub energy: f64,
    /// `∂P/∂T` at constant density.
    pub dpdt: f64,
    /// `∂E/∂T` at constant density.
    pub dedt: f64,
}

/// A density/temperature equation of state.
pub trait EosMaterial: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, density: f64, temperature: f64) -> Result<EosResponse, MaterialError>;
}

/// Case-insensitive parameter table with unknown-name detection.
#[derive(Debug, Clone)]
pub struct Parameters {
    model: String,
    values: BTreeMap<String, f64>,
}

impl Parameters {
    pub fn new(model: &str, raw: &BTreeMap<String, f64>, known: &[&str]) -> Result<Self, MaterialError> {
        let mut values = BTreeMap::new();
        for (name, &value) in raw {
            let key = name.to_uppercase();
            if !known.contains(&key.as_str()) {
                return Err(MaterialError::parameter(format!(
                    "{model}: unknown parameter '{name}' (expected one of {})",
                    known.join(", ")
                )));
            }
            if !value.is_finite() {
                return Err(MaterialError::parameter(format!("{model}: {name} must be finite")));
            }
            values.insert(key, value);
        }
        Ok(Self {
            model: model.to_string(),
            values,
        })
    }

    pub fn required(&self, name: &str) -> Result<f64, MaterialError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| MaterialError::parameter(format!("{}: missing parameter {name}", self.model)))
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.values.get(name).copied().unwrap_or(default)
    }
}

/// Build a solid-driver material from its input description.
pub fn create_material(spec: &MaterialSpec) -> Result<Box<dyn Material>, MaterialError> {
    match spec.model.to_lowercase().as_str() {
        "elastic" => Ok(Box::new(LinearElastic::from_parameters(&spec.parameters)?)),
        "vonmises" => Ok(Box::new(VonMises::from_parameters(&spec.parameters)?)),
        _ => Err(MaterialError::UnknownModel(spec.model.clone())),
    }
}

/// Build an EOS-driver material from its input description.
pub fn create_eos_material(spec: &MaterialSpec) -> Result<Box<dyn EosMaterial>, MaterialError> {
    match spec.model.to_lowercase().as_str() {
        "idealgas" => Ok(Box::new(IdealGas::from_parameters(&spec.parameters)?)),
        _ => Err(MaterialError::UnknownModel(spec.model.clone())),
    }
}
