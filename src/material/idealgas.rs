//! Ideal gas equation of state: `P = ρ R T`, `E = Cv T`.

use std::collections::BTreeMap;

use crate::error::MaterialError;
use crate::material::{EosMaterial, EosResponse, Parameters};

#[derive(Debug, Clone, PartialEq)]
pub struct IdealGas {
    gas_constant: f64,
    specific_heat: f64,
}

impl IdealGas {
    pub fn new(gas_constant: f64, specific_heat: f64) -> Result<Self, MaterialError> {
        if !(gas_constant > 0.0 && specific_heat > 0.0) {
            return Err(MaterialError::parameter("idealgas: R and CV must be > 0"));
        }
        Ok(Self {
            gas_constant,
            specific_heat,
        })
    }

    pub fn from_parameters(raw: &BTreeMap<String, f64>) -> Result<Self, MaterialError> {
        let params = Parameters::new("idealgas", raw, &["R", "CV"])?;
        Self::new(params.required("R")?, params.required("CV")?)
    }
}

impl EosMaterial for IdealGas {
    fn name(&self) -> &str {
        "idealgas"
    }

    fn evaluate(&self, density: f64, temperature: f64) -> Result<EosResponse, MaterialError> {
        if !(density > 0.0) {
            return Err(MaterialError::inadmissible(format!("density must be > 0, got {density}")));
        }
        if !(temperature > 0.0) {
            return Err(MaterialError::inadmissible(format!(
                "temperature must be > 0, got {temperature}"
            )));
        }
        Ok(EosResponse {
            pressure: density * self.gas_constant * temperature,
            energy: self.specific_heat * temperature,
            dpdt: density * self.gas_constant,
            dedt: self.specific_heat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_and_energy() {
        let gas = IdealGas::new(2.0, 3.0).unwrap();
        let r = gas.evaluate(1.5, 100.0).unwrap();
        assert_eq!(r.pressure, 300.0);
        assert_eq!(r.energy, 300.0);
        assert_eq!(r.dpdt, 3.0);
        assert_eq!(r.dedt, 3.0);
    }

    #[test]
    fn rejects_non_physical_state() {
        let gas = IdealGas::new(1.0, 1.0).unwrap();
        assert!(gas.evaluate(0.0, 1.0).is_err());
        assert!(gas.evaluate(1.0, -5.0).is_err());
        assert!(IdealGas::new(0.0, 1.0).is_err());
    }
}
