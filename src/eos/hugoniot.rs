//! Principal Hugoniot extraction.
//!
//! At each density `ρ` we solve the Rankine-Hugoniot energy balance
//!
//! ```text
//! f(T) = E(ρ, T) - E0 - ½ (P(ρ, T) + P0) (V0 - V) = 0,   V = 1/ρ
//! f'(T) = ∂E/∂T - ½ ∂P/∂T (V0 - V)
//! ```
//!
//! for the temperature by Newton, warm-starting from the previous density.

use std::fs::File;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::eos::linspace;
use crate::error::DriverError;
use crate::material::EosMaterial;

const TOL: f64 = 1e-9;
const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HugoniotPoint {
    pub density: f64,
    pub temperature: f64,
    pub energy: f64,
    pub pressure: f64,
}

/// Hugoniot through `(densities[0], initial_temperature)`.
pub fn hugoniot(
    material: &dyn EosMaterial,
    densities: &[f64],
    initial_temperature: f64,
) -> Result<Vec<HugoniotPoint>, DriverError> {
    let Some(&rho0) = densities.first() else {
        return Ok(Vec::new());
    };
    let reference = material.evaluate(rho0, initial_temperature)?;
    let (e0, p0) = (reference.energy, reference.pressure);
    let scale = e0.abs().max(1.0);

    let mut temperature = initial_temperature;
    let mut points = Vec::with_capacity(densities.len());
    for &rho in densities {
        let a = 0.5 * (1.0 / rho0 - 1.0 / rho);

        let mut converged = None;
        let mut residual = f64::INFINITY;
        for iteration in 0..MAX_ITERATIONS {
            let state = material.evaluate(rho, temperature)?;
            let f = state.energy - e0 - (state.pressure + p0) * a;
            residual = (f / scale).abs();
            if residual < TOL {
                converged = Some((state, iteration));
                break;
            }
            let df = state.dedt - state.dpdt * a;
            if df == 0.0 || !df.is_finite() {
                break;
            }
            temperature -= f / df;
        }

        let Some((state, iterations)) = converged else {
            return Err(DriverError::ConvergenceFailure {
                iterations: MAX_ITERATIONS,
                residual,
            });
        };
        debug!(density = rho, temperature, iterations, "hugoniot point");
        points.push(HugoniotPoint {
            density: rho,
            temperature,
            energy: state.energy,
            pressure: state.pressure,
        });
    }
    Ok(points)
}

/// Hugoniot over `increments` evenly spaced densities.
pub fn hugoniot_over_range(
    material: &dyn EosMaterial,
    density_range: [f64; 2],
    initial_temperature: f64,
    increments: usize,
) -> Result<Vec<HugoniotPoint>, DriverError> {
    if density_range.iter().any(|r| !(*r > 0.0)) {
        return Err(DriverError::invalid(0, "densities in density_range must be > 0"));
    }
    if !(initial_temperature > 0.0) || increments == 0 {
        return Err(DriverError::invalid(0, "hugoniot needs initial_temperature > 0 and increments > 0"));
    }
    let densities = linspace(density_range[0], density_range[1], increments);
    hugoniot(material, &densities, initial_temperature)
}

pub fn write_hugoniot_csv(path: &Path, points: &[HugoniotPoint]) -> Result<(), DriverError> {
    let file = File::create(path)
        .map_err(|e| DriverError::Io(format!("failed to create '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    for p in points {
        writer.serialize(p)?;
    }
    writer.flush()?;
    Ok(())
}
