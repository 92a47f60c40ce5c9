//! Path-level state machine.
//!
//! `Init -> Leg(0) -> Leg(1) -> ... -> Done`, or `Failed` as soon as a leg
//! cannot be integrated. The material state lives in `DriverState` and is
//! carried across legs untouched.

use std::time::Instant;

use chrono::{DateTime, Local};
use nalgebra::Vector6;
use tracing::{error, info};

use crate::config::{NewtonSettings, PathOptions};
use crate::domain::{ControlCode, DriverState, Leg, Path, StepOutcome};
use crate::error::DriverError;
use crate::legs::build_path;
use crate::material::Material;
use crate::math::stretch_from_strain;
use crate::output::{OutputSink, VariableLayout, solid_record};
use crate::solver::{LegReport, LegStepper, StepSolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Init,
    /// Integrating the leg at this index.
    Leg(usize),
    Done,
    Failed,
}

/// Totals and final state of a completed path.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started: DateTime<Local>,
    pub wall_seconds: f64,
    pub legs: Vec<LegReport>,
    pub steps: usize,
    pub outcome: StepOutcome,
    pub final_time: f64,
    pub final_stress: Vector6<f64>,
    pub final_strain: Vector6<f64>,
}

pub struct PathDriver {
    path: Path,
    material: Box<dyn Material>,
    settings: NewtonSettings,
    layout: VariableLayout,
    state: DriverState,
    phase: DriverPhase,
}

impl PathDriver {
    pub fn new(path: Path, material: Box<dyn Material>, settings: NewtonSettings) -> Self {
        let layout = VariableLayout::solid(material.as_ref());
        let state = DriverState::new(material.as_ref());
        Self {
            path,
            material,
            settings,
            layout,
            state,
            phase: DriverPhase::Init,
        }
    }

    /// Parse and validate `text`, then build the driver.
    pub fn from_text(
        text: &str,
        options: &PathOptions,
        material: Box<dyn Material>,
        settings: NewtonSettings,
    ) -> Result<Self, DriverError> {
        let path = build_path(text, options)?;
        Ok(Self::new(path, material, settings))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    pub fn material(&self) -> &dyn Material {
        self.material.as_ref()
    }

    /// Integrate the whole path from the reference state.
    ///
    /// Every call starts over, so running twice replays the same history.
    /// The sink is finished only when the path completes.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> Result<RunSummary, DriverError> {
        let started = Local::now();
        let clock = Instant::now();

        self.phase = DriverPhase::Init;
        self.state = DriverState::new(self.material.as_ref());

        let result = self.integrate(sink);
        let reports = match result {
            Ok(reports) => reports,
            Err(e) => {
                self.phase = DriverPhase::Failed;
                error!(error = %e, time = self.state.time, "path failed");
                return Err(e);
            }
        };

        if let Err(e) = sink.finish() {
            self.phase = DriverPhase::Failed;
            error!(error = %e, "output could not be finished");
            return Err(e);
        }
        self.phase = DriverPhase::Done;

        let mut outcome = StepOutcome::default();
        for r in &reports {
            outcome.absorb(r.outcome);
        }
        let summary = RunSummary {
            started,
            wall_seconds: clock.elapsed().as_secs_f64(),
            steps: reports.iter().map(|r| r.steps).sum(),
            legs: reports,
            outcome,
            final_time: self.state.time,
            final_stress: self.state.stress,
            final_strain: self.state.strain,
        };
        info!(
            steps = summary.steps,
            iterations = summary.outcome.iterations,
            evaluations = summary.outcome.evaluations,
            max_cutback_depth = summary.outcome.cutback_depth,
            "path complete"
        );
        Ok(summary)
    }

    fn integrate(&mut self, sink: &mut dyn OutputSink) -> Result<Vec<LegReport>, DriverError> {
        if let Some(first) = self.path.legs().first() {
            if first.is_initial_condition() {
                seed_initial_state(&mut self.state, first, self.path.kappa())?;
            }
        }
        sink.write(&solid_record(&self.state, 0.0, 0, &StepOutcome::default()))?;

        let solver = StepSolver::new(self.material.as_ref(), self.settings, self.path.kappa());
        let stepper = LegStepper::new(&solver);

        let mut reports = Vec::with_capacity(self.path.legs().len());
        for (idx, leg) in self.path.legs().iter().enumerate() {
            self.phase = DriverPhase::Leg(idx);
            self.state.leg = idx;
            if leg.is_initial_condition() {
                continue;
            }
            info!(
                leg = leg.number,
                control = %leg.control_string(),
                steps = leg.num_steps,
                end_time = leg.termination_time,
                "starting leg"
            );
            reports.push(stepper.run(leg, &mut self.state, sink)?);
        }
        Ok(reports)
    }
}

/// Apply an initial-condition leg: stress and strain components are set
/// directly, rates are ignored.
fn seed_initial_state(state: &mut DriverState, leg: &Leg, kappa: f64) -> Result<(), DriverError> {
    for (j, &code) in leg.control.iter().enumerate() {
        match code {
            ControlCode::Strain => state.strain[j] = leg.values[j],
            ControlCode::Stress => state.stress[j] = leg.values[j],
            _ => {}
        }
    }
    let defgrad = stretch_from_strain(&state.strain, kappa)
        .filter(|f| f.determinant() > 0.0)
        .ok_or_else(|| DriverError::invalid(leg.number, "initial strain has no admissible stretch"))?;
    state.defgrad = defgrad;
    state.efield = leg.efield;
    if let Some(t) = leg.temperature {
        state.temperature = t;
    }
    Ok(())
}
