use std::time::Instant;

use chrono::{DateTime, Local};
use nalgebra::Matrix3;
use tracing::info;

use crate::config::SurfaceOptions;
use crate::domain::StepRecord;
use crate::eos::{SurfacePoint, build_surface, parse_surface};
use crate::error::DriverError;
use crate::material::{EosMaterial, EosResponse};
use crate::math::flatten;
use crate::output::{OutputSink, VariableLayout, nodal_displacements};

#[derive(Debug, Clone, PartialEq)]
pub struct EosSummary {
    pub started: DateTime<Local>,
    pub wall_seconds: f64,
    pub points: usize,
    pub final_pressure: f64,
    pub final_energy: f64,
}

/// Walks a density/temperature surface with one EOS call per point.
pub struct EosDriver {
    surface: Vec<SurfacePoint>,
    material: Box<dyn EosMaterial>,
    layout: VariableLayout,
}

impl EosDriver {
    pub fn new(surface: Vec<SurfacePoint>, material: Box<dyn EosMaterial>) -> Result<Self, DriverError> {
        if surface.is_empty() {
            return Err(DriverError::invalid(0, "empty EOS surface"));
        }
        Ok(Self {
            surface,
            material,
            layout: VariableLayout::eos(),
        })
    }

    pub fn from_text(text: &str, opts: &SurfaceOptions, material: Box<dyn EosMaterial>) -> Result<Self, DriverError> {
        let corners = parse_surface(text)?;
        Self::new(build_surface(&corners, opts)?, material)
    }

    pub fn surface(&self) -> &[SurfacePoint] {
        &self.surface
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn material(&self) -> &dyn EosMaterial {
        self.material.as_ref()
    }

    pub fn run(&self, sink: &mut dyn OutputSink) -> Result<EosSummary, DriverError> {
        let started = Local::now();
        let clock = Instant::now();

        let first = self.surface[0];
        let rho0 = first.density;
        let mut last = self.material.evaluate(first.density, first.temperature)?;
        sink.write(&record(&first, rho0, &last, 0.0, 0))?;

        let mut t_prev = first.time;
        let mut step = 0;
        for point in &self.surface[1..] {
            let dt = point.time - t_prev;
            if !(dt > 0.0) {
                continue;
            }
            last = self.material.evaluate(point.density, point.temperature)?;
            step += 1;
            sink.write(&record(point, rho0, &last, dt, step))?;
            t_prev = point.time;
        }
        sink.finish()?;

        info!(points = step, model = self.material.name(), "eos surface complete");
        Ok(EosSummary {
            started,
            wall_seconds: clock.elapsed().as_secs_f64(),
            points: step,
            final_pressure: last.pressure,
            final_energy: last.energy,
        })
    }
}

fn record(point: &SurfacePoint, rho0: f64, eos: &EosResponse, dt: f64, step: usize) -> StepRecord {
    let defgrad = Matrix3::identity() * (rho0 / point.density).cbrt();
    let mut element = vec![
        point.density,
        point.temperature,
        eos.energy,
        eos.pressure,
        eos.dpdt,
        eos.dedt,
    ];
    element.extend(flatten(&defgrad));
    StepRecord {
        time: point.time,
        global: vec![dt, step as f64, 0.0, 0.0],
        element,
        displacement: nodal_displacements(&defgrad),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::IdealGas;
    use crate::output::MemorySink;
    use approx::assert_relative_eq;

    #[test]
    fn walks_every_surface_point() {
        let gas = Box::new(IdealGas::new(2.0, 3.0).unwrap());
        let driver = EosDriver::from_text("1 12 1.0 100\n2 12 8.0 200", &SurfaceOptions::default(), gas).unwrap();
        let mut sink = MemorySink::new(driver.layout());
        let summary = driver.run(&mut sink).unwrap();

        assert_eq!(driver.surface().len(), 4);
        assert_eq!(summary.points, 3);
        assert_eq!(sink.records().len(), 4);
        assert!(sink.is_finished());

        let history = sink.history();
        assert_eq!(history.last("PRES"), Some(8.0 * 2.0 * 200.0));
        assert_eq!(history.last("ENRGY"), Some(600.0));
        // eight-fold compression halves every edge
        assert_relative_eq!(history.last("DEFGRAD_XX").unwrap(), 0.5, max_relative = 1e-12);
        assert_eq!(history.last("DEFGRAD_XY"), Some(0.0));
        assert_eq!(history.column("STEP_NUM").unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
    }
}
