//! Sub-division of one leg into fixed sub-steps.

use nalgebra::Vector6;
use tracing::debug;

use crate::domain::{ControlCode, DriverState, Leg, StepOutcome};
use crate::error::DriverError;
use crate::output::{OutputSink, solid_record};
use crate::solver::{ControlPartition, StepSolver, StepTarget};

/// Totals for one integrated leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegReport {
    pub number: usize,
    pub steps: usize,
    pub outcome: StepOutcome,
}

pub struct LegStepper<'a, 'm> {
    solver: &'a StepSolver<'m>,
}

impl<'a, 'm> LegStepper<'a, 'm> {
    pub fn new(solver: &'a StepSolver<'m>) -> Self {
        Self { solver }
    }

    /// Integrate `leg` from `state`, writing one record per sub-step.
    ///
    /// Targets are interpolated linearly between the start-of-leg state and
    /// the leg values; `dt` is fixed by the leg, whatever cutbacks happen
    /// inside a sub-step.
    pub fn run(
        &self,
        leg: &Leg,
        state: &mut DriverState,
        sink: &mut dyn OutputSink,
    ) -> Result<LegReport, DriverError> {
        let mut report = LegReport {
            number: leg.number,
            ..LegReport::default()
        };
        if leg.is_initial_condition() {
            return Ok(report);
        }

        let n = leg.num_steps;
        let t_start = state.time;
        let dt = (leg.termination_time - t_start) / n as f64;
        if !(dt > 0.0) {
            return Err(DriverError::invalid(
                leg.number,
                format!("leg ends at {} but the path is already at {t_start}", leg.termination_time),
            ));
        }

        let partition = ControlPartition::new(&leg.control);
        let strain0 = state.strain;
        let stress0 = state.stress;
        let temp0 = state.temperature;
        let efield0 = state.efield;

        for i in 1..=n {
            let frac = i as f64 / n as f64;
            let elapsed = dt * i as f64;

            let mut d_eps_known = Vector6::zeros();
            let mut sigma_target = state.stress;
            for (j, &code) in leg.control.iter().enumerate() {
                let value = leg.values[j];
                match code {
                    ControlCode::StrainRate => d_eps_known[j] = value * dt,
                    ControlCode::Strain => {
                        d_eps_known[j] = strain0[j] + (value - strain0[j]) * frac - state.strain[j];
                    }
                    ControlCode::StressRate => sigma_target[j] = stress0[j] + value * elapsed,
                    ControlCode::Stress => sigma_target[j] = stress0[j] + (value - stress0[j]) * frac,
                    _ => {}
                }
            }

            let target = StepTarget {
                d_eps_known,
                sigma_target,
                dt,
                time_end: if i == n { leg.termination_time } else { t_start + elapsed },
                temperature_end: leg
                    .temperature
                    .map(|t| temp0 + (t - temp0) * frac)
                    .unwrap_or(temp0),
                efield_end: std::array::from_fn(|k| efield0[k] + (leg.efield[k] - efield0[k]) * frac),
            };

            let outcome = self
                .solver
                .advance(state, &partition, &target)
                .map_err(|failure| DriverError::IntegrationFailure {
                    leg: leg.number,
                    step: i,
                    cutbacks: failure.cutbacks,
                    source: Box::new(failure.cause),
                })?;

            state.step += 1;
            report.steps += 1;
            report.outcome.absorb(outcome);
            debug!(
                leg = leg.number,
                step = i,
                time = state.time,
                iterations = outcome.iterations,
                evaluations = outcome.evaluations,
                cutbacks = outcome.cutback_depth,
                "sub-step committed"
            );

            sink.write(&solid_record(state, dt, leg.number, &outcome))?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NewtonSettings;
    use crate::material::LinearElastic;
    use crate::output::{MemorySink, VariableLayout};
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn leg(time: f64, n: usize, control: [ControlCode; 6], values: [f64; 6]) -> Leg {
        Leg {
            number: 1,
            termination_time: time,
            num_steps: n,
            control,
            values: Vector6::from(values),
            rotation: Matrix3::identity(),
            efield: [0.0; 3],
            temperature: None,
        }
    }

    #[test]
    fn strain_rate_leg_accumulates_linearly() {
        let mat = LinearElastic::new(10.0, 5.0).unwrap();
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let mut sink = MemorySink::new(&VariableLayout::solid(&mat));
        let mut state = DriverState::new(&mat);

        let mut control = [ControlCode::Strain; 6];
        control[0] = ControlCode::StrainRate;
        let l = leg(2.0, 4, control, [0.01, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let report = LegStepper::new(&solver).run(&l, &mut state, &mut sink).unwrap();

        assert_eq!(report.steps, 4);
        assert_eq!(report.outcome.evaluations, 4);
        assert_eq!(sink.records().len(), 4);
        assert_relative_eq!(state.strain[0], 0.02, max_relative = 1e-12);
        assert_eq!(state.time, 2.0);
        assert_relative_eq!(sink.records()[1].time, 1.0);
        assert_relative_eq!(sink.records()[1].global[0], 0.5);
    }

    #[test]
    fn stress_rate_target_grows_with_time() {
        let mat = LinearElastic::new(10.0, 5.0).unwrap();
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let mut sink = MemorySink::new(&VariableLayout::solid(&mat));
        let mut state = DriverState::new(&mat);

        let mut control = [ControlCode::Strain; 6];
        control[0] = ControlCode::StressRate;
        let l = leg(2.0, 5, control, [3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        LegStepper::new(&solver).run(&l, &mut state, &mut sink).unwrap();

        assert_relative_eq!(state.stress[0], 6.0, max_relative = 1e-9);
        assert_relative_eq!(sink.records()[0].element[0], 1.2, max_relative = 1e-9);
    }

    #[test]
    fn leg_temperature_is_interpolated() {
        let mat = LinearElastic::new(10.0, 5.0).unwrap();
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let mut sink = MemorySink::new(&VariableLayout::solid(&mat));
        let mut state = DriverState::new(&mat);

        let mut l = leg(1.0, 2, [ControlCode::Strain; 6], [0.0; 6]);
        l.temperature = Some(300.0);
        LegStepper::new(&solver).run(&l, &mut state, &mut sink).unwrap();

        let tmpr = VariableLayout::solid(&mat)
            .elements()
            .iter()
            .position(|n| n == "TMPR")
            .unwrap();
        assert_eq!(sink.records()[0].element[tmpr], 150.0);
        assert_eq!(state.temperature, 300.0);
    }
}
