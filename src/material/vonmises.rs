//! J2 (von Mises) plasticity with linear isotropic hardening.
//!
//! Radial return on the trial stress; the tangent is left to the step
//! solver's finite-difference tangent.

use std::collections::BTreeMap;

use crate::error::MaterialError;
use crate::material::{LinearElastic, Material, MaterialInput, MaterialResponse, Parameters, TangentSource};
use crate::math::{ddot, deviator, identity6, trace};

#[derive(Debug, Clone, PartialEq)]
pub struct VonMises {
    elastic: LinearElastic,
    yield_stress: f64,
    hardening: f64,
}

impl VonMises {
    pub fn new(bulk: f64, shear: f64, yield_stress: f64, hardening: f64) -> Result<Self, MaterialError> {
        let elastic = LinearElastic::new(bulk, shear)?;
        if !(yield_stress > 0.0) {
            return Err(MaterialError::parameter(format!("vonmises: Y0 must be > 0, got {yield_stress}")));
        }
        if hardening < 0.0 {
            return Err(MaterialError::parameter(format!("vonmises: H must be >= 0, got {hardening}")));
        }
        Ok(Self {
            elastic,
            yield_stress,
            hardening,
        })
    }

    pub fn from_parameters(raw: &BTreeMap<String, f64>) -> Result<Self, MaterialError> {
        let params = Parameters::new("vonmises", raw, &["K", "G", "Y0", "H"])?;
        Self::new(
            params.required("K")?,
            params.required("G")?,
            params.required("Y0")?,
            params.get_or("H", 0.0),
        )
    }
}

impl Material for VonMises {
    fn name(&self) -> &str {
        "vonmises"
    }

    fn state_names(&self) -> Vec<String> {
        vec!["EQPS".to_string()]
    }

    fn tangent_source(&self) -> TangentSource {
        TangentSource::FiniteDifference
    }

    fn update(&self, input: &MaterialInput<'_>) -> Result<MaterialResponse, MaterialError> {
        let eqps = input.state.first().copied().unwrap_or(0.0);
        let g = self.elastic.shear_modulus();

        let trial = self.elastic.update(input)?.stress;
        let s = deviator(&trial);
        let q = (1.5 * ddot(&s, &s)).sqrt();
        let flow_stress = self.yield_stress + self.hardening * eqps;

        if q <= flow_stress {
            return MaterialResponse {
                stress: trial,
                state: vec![eqps],
                jacobian: None,
            }
            .checked();
        }

        let dgamma = (q - flow_stress) / (3.0 * g + self.hardening);
        let scale = 1.0 - 3.0 * g * dgamma / q;
        let stress = s * scale + identity6() * (trace(&trial) / 3.0);

        MaterialResponse {
            stress,
            state: vec![eqps + dgamma],
            jacobian: None,
        }
        .checked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector6};

    fn shear_update(mat: &VonMises, gamma: f64, state: &[f64]) -> MaterialResponse {
        let d = Vector6::new(0.0, 0.0, 0.0, gamma, 0.0, 0.0);
        let zero = Vector6::zeros();
        let f = Matrix3::identity();
        mat.update(&MaterialInput {
            time: 1.0,
            dtime: 1.0,
            temperature: 0.0,
            dtemperature: 0.0,
            stretching: &d,
            strain: &d,
            defgrad: &f,
            efield: &[0.0; 3],
            stress: &zero,
            state,
        })
        .unwrap()
    }

    #[test]
    fn elastic_below_yield() {
        let mat = VonMises::new(100.0, 50.0, 1000.0, 0.0).unwrap();
        let out = shear_update(&mat, 0.01, &[0.0]);
        assert_relative_eq!(out.stress[3], 2.0 * 50.0 * 0.01, epsilon = 1e-12);
        assert_eq!(out.state, vec![0.0]);
    }

    #[test]
    fn perfect_plasticity_caps_mises_stress() {
        let y0 = 1.0;
        let mat = VonMises::new(100.0, 50.0, y0, 0.0).unwrap();
        let out = shear_update(&mat, 0.1, &[0.0]);
        let s = deviator(&out.stress);
        let q = (1.5 * ddot(&s, &s)).sqrt();
        assert_relative_eq!(q, y0, epsilon = 1e-12);
        assert!(out.state[0] > 0.0);
    }

    #[test]
    fn hardening_raises_flow_stress() {
        let mat = VonMises::new(100.0, 50.0, 1.0, 10.0).unwrap();
        let out = shear_update(&mat, 0.1, &[0.0]);
        let s = deviator(&out.stress);
        let q = (1.5 * ddot(&s, &s)).sqrt();
        assert_relative_eq!(q, 1.0 + 10.0 * out.state[0], epsilon = 1e-10);
    }
}
