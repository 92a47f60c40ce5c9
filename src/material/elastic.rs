//! Isotropic linear elasticity (hypoelastic rate form).
//!
//! `σ_{n+1} = σ_n + C : (d Δt)` with `C = λ I⊗I + 2G 𝕀`, `λ = K - 2G/3`.

use std::collections::BTreeMap;

use nalgebra::Matrix6;

use crate::error::MaterialError;
use crate::material::{Material, MaterialInput, MaterialResponse, Parameters, TangentSource};
use crate::math::{identity6, trace};

#[derive(Debug, Clone, PartialEq)]
pub struct LinearElastic {
    bulk: f64,
    shear: f64,
    tangent: TangentSource,
}

impl LinearElastic {
    pub fn new(bulk: f64, shear: f64) -> Result<Self, MaterialError> {
        if !(bulk > 0.0) {
            return Err(MaterialError::parameter(format!("elastic: K must be > 0, got {bulk}")));
        }
        if !(shear > 0.0) {
            return Err(MaterialError::parameter(format!("elastic: G must be > 0, got {shear}")));
        }
        Ok(Self {
            bulk,
            shear,
            tangent: TangentSource::Analytic,
        })
    }

    pub fn from_parameters(raw: &BTreeMap<String, f64>) -> Result<Self, MaterialError> {
        let params = Parameters::new("elastic", raw, &["K", "G"])?;
        Self::new(params.required("K")?, params.required("G")?)
    }

    /// Withhold the analytic tangent so callers fall back to finite differences.
    pub fn with_tangent(mut self, tangent: TangentSource) -> Self {
        self.tangent = tangent;
        self
    }

    pub fn bulk_modulus(&self) -> f64 {
        self.bulk
    }

    pub fn shear_modulus(&self) -> f64 {
        self.shear
    }

    /// Elastic stiffness in 6-vector storage (tensor shear components).
    pub fn stiffness(&self) -> Matrix6<f64> {
        let lambda = self.bulk - 2.0 * self.shear / 3.0;
        let mut c = Matrix6::zeros();
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] = lambda;
            }
        }
        for i in 0..6 {
            c[(i, i)] += 2.0 * self.shear;
        }
        c
    }
}

impl Material for LinearElastic {
    fn name(&self) -> &str {
        "elastic"
    }

    fn tangent_source(&self) -> TangentSource {
        self.tangent
    }

    fn update(&self, input: &MaterialInput<'_>) -> Result<MaterialResponse, MaterialError> {
        let de = input.strain_increment();
        let lambda = self.bulk - 2.0 * self.shear / 3.0;
        let stress = input.stress + identity6() * (lambda * trace(&de)) + de * (2.0 * self.shear);

        let jacobian = match self.tangent {
            TangentSource::Analytic => Some(self.stiffness()),
            TangentSource::FiniteDifference => None,
        };

        MaterialResponse {
            stress,
            state: input.state.to_vec(),
            jacobian,
        }
        .checked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector6};

    #[test]
    fn uniaxial_strain_response() {
        let (k, g) = (10.0, 6.0);
        let mat = LinearElastic::new(k, g).unwrap();
        let d = Vector6::new(0.01, 0.0, 0.0, 0.0, 0.0, 0.0);
        let zero = Vector6::zeros();
        let f = Matrix3::identity();
        let input = MaterialInput {
            time: 1.0,
            dtime: 1.0,
            temperature: 0.0,
            dtemperature: 0.0,
            stretching: &d,
            strain: &d,
            defgrad: &f,
            efield: &[0.0; 3],
            stress: &zero,
            state: &[],
        };
        let out = mat.update(&input).unwrap();
        assert_relative_eq!(out.stress[0], (k + 4.0 * g / 3.0) * 0.01, epsilon = 1e-14);
        assert_relative_eq!(out.stress[1], (k - 2.0 * g / 3.0) * 0.01, epsilon = 1e-14);
        assert_relative_eq!(out.stress[3], 0.0);
        assert_eq!(out.jacobian, Some(mat.stiffness()));
    }

    #[test]
    fn numeric_tangent_variant_omits_jacobian() {
        let mat = LinearElastic::new(1.0, 1.0)
            .unwrap()
            .with_tangent(TangentSource::FiniteDifference);
        assert_eq!(mat.tangent_source(), TangentSource::FiniteDifference);
    }

    #[test]
    fn moduli_must_be_positive() {
        assert!(LinearElastic::new(0.0, 1.0).is_err());
        assert!(LinearElastic::new(1.0, -1.0).is_err());
        assert!(LinearElastic::new(f64::NAN, 1.0).is_err());
    }
}
