//! Single sub-step integration: mixed-control Newton with bisection cutback.
//!
//! For one sub-step the strain increment is known on `strain_idx` and the
//! end-of-step stress is prescribed on `stress_idx`. We iterate on the
//! unknown strain components:
//!
//! ```text
//! r     = σ(dε)[stress_idx] - σ_target[stress_idx]
//! J_ss  δ = -r
//! dε[stress_idx] += δ
//! ```
//!
//! When a piece fails (no convergence, inadmissible material state), the
//! remaining part of the sub-step is bisected and retried from the last
//! committed state. Committed pieces are never rolled back.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix6, Vector6};
use tracing::{debug, trace, warn};

use crate::config::NewtonSettings;
use crate::domain::{DriverState, StepOutcome};
use crate::error::{DriverError, MaterialError};
use crate::material::{Material, MaterialInput, MaterialResponse, TangentSource};
use crate::math::{rate_of_deformation, solve_dense, stretch_from_strain};
use crate::solver::ControlPartition;

/// Prescribed data for one sub-step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTarget {
    /// Known strain increment on `strain_idx` (other entries ignored).
    pub d_eps_known: Vector6<f64>,
    /// End-of-step stress on `stress_idx` (other entries ignored).
    pub sigma_target: Vector6<f64>,
    pub dt: f64,
    /// Time reported once the sub-step is committed.
    pub time_end: f64,
    pub temperature_end: f64,
    pub efield_end: [f64; 3],
}

/// A sub-step that could not be committed.
#[derive(Debug)]
pub struct StepFailure {
    /// Bisections performed before giving up.
    pub cutbacks: usize,
    pub cause: DriverError,
    pub outcome: StepOutcome,
}

/// End-of-piece values produced by one converged Newton solve.
#[derive(Debug, Clone)]
struct Trial {
    stress: Vector6<f64>,
    strain: Vector6<f64>,
    stretching: Vector6<f64>,
    defgrad: Matrix3<f64>,
    state_vars: Vec<f64>,
}

/// Inputs of one piece that stay fixed across its Newton iterations.
struct Piece<'s> {
    start: &'s DriverState,
    dt: f64,
    temperature_end: f64,
    efield: [f64; 3],
}

pub struct StepSolver<'m> {
    material: &'m dyn Material,
    settings: NewtonSettings,
    kappa: f64,
}

impl<'m> StepSolver<'m> {
    pub fn new(material: &'m dyn Material, settings: NewtonSettings, kappa: f64) -> Self {
        Self {
            material,
            settings,
            kappa,
        }
    }

    pub fn settings(&self) -> &NewtonSettings {
        &self.settings
    }

    pub fn material(&self) -> &dyn Material {
        self.material
    }

    /// Integrate one sub-step, committing into `state` on success.
    ///
    /// On failure `state` holds the last committed piece (possibly the
    /// start-of-step state); callers treat the path as failed.
    pub fn advance(
        &self,
        state: &mut DriverState,
        partition: &ControlPartition,
        target: &StepTarget,
    ) -> Result<StepOutcome, StepFailure> {
        let sigma0 = state.stress;
        let temp0 = state.temperature;
        let efield0 = state.efield;
        let t0 = state.time;

        let mut outcome = StepOutcome::default();
        let mut done = 0.0_f64;
        let mut h = 1.0_f64;
        let mut depth = 0_usize;

        while done < 1.0 {
            let mut end = done + h.min(1.0 - done);
            if 1.0 - end < 1e-12 {
                end = 1.0;
            }
            let frac = end - done;

            let d_eps_known = target.d_eps_known * frac;
            let sigma_target = sigma0 + (target.sigma_target - sigma0) * end;
            let temperature_end = temp0 + (target.temperature_end - temp0) * end;
            let efield: [f64; 3] = std::array::from_fn(|i| efield0[i] + (target.efield_end[i] - efield0[i]) * end);

            let piece = Piece {
                start: &*state,
                dt: target.dt * frac,
                temperature_end,
                efield,
            };
            let result = self.solve_piece(&piece, partition, &d_eps_known, &sigma_target, &mut outcome);

            match result {
                Ok(trial) => {
                    state.stress = trial.stress;
                    state.strain = trial.strain;
                    state.stretching = trial.stretching;
                    state.defgrad = trial.defgrad;
                    state.state_vars = trial.state_vars;
                    state.temperature = temperature_end;
                    state.efield = efield;
                    state.time = t0 + target.dt * end;
                    done = end;
                }
                Err(e) if e.is_recoverable() => {
                    depth += 1;
                    if depth > self.settings.max_cutbacks {
                        outcome.cutback_depth = depth - 1;
                        return Err(StepFailure {
                            cutbacks: depth - 1,
                            cause: e,
                            outcome,
                        });
                    }
                    h *= 0.5;
                    warn!(
                        depth,
                        fraction = h,
                        time = t0 + target.dt * done,
                        error = %e,
                        "cutting back sub-step"
                    );
                }
                Err(e) => {
                    outcome.cutback_depth = depth;
                    return Err(StepFailure {
                        cutbacks: depth,
                        cause: e,
                        outcome,
                    });
                }
            }
        }

        state.time = target.time_end;
        outcome.cutback_depth = depth;
        Ok(outcome)
    }

    /// Newton solve of one piece starting from `piece.start`.
    fn solve_piece(
        &self,
        piece: &Piece<'_>,
        partition: &ControlPartition,
        d_eps_known: &Vector6<f64>,
        sigma_target: &Vector6<f64>,
        outcome: &mut StepOutcome,
    ) -> Result<Trial, DriverError> {
        let stress_idx = partition.stress_idx();

        let mut d_eps = Vector6::zeros();
        for &i in partition.strain_idx() {
            d_eps[i] = d_eps_known[i];
        }

        let mut iterations = 0;
        loop {
            let (trial, response) = self.evaluate(piece, &d_eps)?;
            outcome.evaluations += 1;

            if partition.is_strain_only() {
                return Ok(trial);
            }

            let residual = DVector::from_iterator(
                stress_idx.len(),
                stress_idx.iter().map(|&i| trial.stress[i] - sigma_target[i]),
            );
            let r_max = residual.amax();
            if self.converged(r_max, sigma_target, &trial.stress, stress_idx) {
                debug!(iterations, residual = r_max, "newton converged");
                return Ok(trial);
            }
            if iterations >= self.settings.max_iterations {
                return Err(DriverError::ConvergenceFailure {
                    iterations,
                    residual: r_max,
                });
            }

            let jacobian = match (self.material.tangent_source(), response.jacobian) {
                (TangentSource::Analytic, Some(j)) => j,
                _ => self.perturbed_jacobian(piece, &d_eps, &trial.stress, stress_idx, outcome)?,
            };
            let reduced = DMatrix::from_fn(stress_idx.len(), stress_idx.len(), |r, c| {
                jacobian[(stress_idx[r], stress_idx[c])]
            });
            let delta = solve_dense(&reduced, &(-residual)).ok_or(DriverError::ConvergenceFailure {
                iterations,
                residual: r_max,
            })?;

            for (k, &i) in stress_idx.iter().enumerate() {
                d_eps[i] += delta[k];
            }
            iterations += 1;
            outcome.iterations += 1;
            trace!(iterations, residual = r_max, "newton update");
        }
    }

    /// Absolute test, or residual relative to the largest stress in play.
    ///
    /// Only the stress-controlled components set the scale; a large stress
    /// in a strain-controlled component must not loosen the test.
    fn converged(
        &self,
        r_max: f64,
        sigma_target: &Vector6<f64>,
        sigma_trial: &Vector6<f64>,
        stress_idx: &[usize],
    ) -> bool {
        if r_max <= self.settings.abs_tol {
            return true;
        }
        let scale = stress_idx
            .iter()
            .fold(self.settings.stress_floor, |acc, &i| {
                acc.max(sigma_target[i].abs()).max(sigma_trial[i].abs())
            });
        r_max / scale < self.settings.rel_tol
    }

    /// Forward-difference tangent, columns `stress_idx` only.
    fn perturbed_jacobian(
        &self,
        piece: &Piece<'_>,
        d_eps: &Vector6<f64>,
        sigma: &Vector6<f64>,
        stress_idx: &[usize],
        outcome: &mut StepOutcome,
    ) -> Result<Matrix6<f64>, DriverError> {
        let mut jacobian = Matrix6::zeros();
        for &j in stress_idx {
            let h = self.settings.fd_step * d_eps[j].abs().max(1.0);
            let mut perturbed = *d_eps;
            perturbed[j] += h;
            let (trial, _) = self.evaluate(piece, &perturbed)?;
            outcome.evaluations += 1;
            jacobian.set_column(j, &((trial.stress - sigma) / h));
        }
        Ok(jacobian)
    }

    /// One material call for the strain increment `d_eps`.
    fn evaluate(&self, piece: &Piece<'_>, d_eps: &Vector6<f64>) -> Result<(Trial, MaterialResponse), DriverError> {
        let start = piece.start;
        let strain = start.strain + d_eps;

        let stretching = rate_of_deformation(&start.strain, &strain, self.kappa, piece.dt)
            .ok_or_else(|| MaterialError::inadmissible("strain has no real stretch for this kappa"))?;
        let defgrad = stretch_from_strain(&strain, self.kappa)
            .ok_or_else(|| MaterialError::inadmissible("strain has no real stretch for this kappa"))?;
        let jac = defgrad.determinant();
        if !(jac > 0.0) {
            return Err(MaterialError::inadmissible(format!("deformation Jacobian {jac:.4e} is not positive")).into());
        }

        let input = MaterialInput {
            time: start.time,
            dtime: piece.dt,
            temperature: start.temperature,
            dtemperature: piece.temperature_end - start.temperature,
            stretching: &stretching,
            strain: &strain,
            defgrad: &defgrad,
            efield: &piece.efield,
            stress: &start.stress,
            state: &start.state_vars,
        };
        let response = self.material.update(&input)?.checked()?;

        let trial = Trial {
            stress: response.stress,
            strain,
            stretching,
            defgrad,
            state_vars: response.state.clone(),
        };
        Ok((trial, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ControlCode;
    use crate::material::LinearElastic;
    use approx::assert_relative_eq;

    const K: f64 = 150.0e3;
    const G: f64 = 80.0e3;

    fn target(d_eps: Vector6<f64>, sigma: Vector6<f64>, dt: f64) -> StepTarget {
        StepTarget {
            d_eps_known: d_eps,
            sigma_target: sigma,
            dt,
            time_end: dt,
            temperature_end: 0.0,
            efield_end: [0.0; 3],
        }
    }

    #[test]
    fn strain_only_step_is_one_evaluation() {
        let mat = LinearElastic::new(K, G).unwrap();
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let partition = ControlPartition::new(&[ControlCode::Strain; 6]);
        let mut state = DriverState::new(&mat);

        let d = Vector6::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0);
        let out = solver
            .advance(&mut state, &partition, &target(d, Vector6::zeros(), 0.1))
            .unwrap();

        assert_eq!(out.evaluations, 1);
        assert_eq!(out.iterations, 0);
        assert_relative_eq!(state.stress[0], (K + 4.0 * G / 3.0) * 1e-3, max_relative = 1e-12);
        assert_relative_eq!(state.time, 0.1);
        assert_relative_eq!(state.stretching[0], 1e-2, max_relative = 1e-12);
    }

    #[test]
    fn uniaxial_stress_converges_in_one_update_with_analytic_tangent() {
        let mat = LinearElastic::new(K, G).unwrap();
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let mut control = [ControlCode::Stress; 6];
        control[0] = ControlCode::Strain;
        let partition = ControlPartition::new(&control);
        let mut state = DriverState::new(&mat);

        let d = Vector6::new(1e-3, 0.0, 0.0, 0.0, 0.0, 0.0);
        let out = solver
            .advance(&mut state, &partition, &target(d, Vector6::zeros(), 1.0))
            .unwrap();

        assert_eq!(out.iterations, 1);
        let young = 9.0 * K * G / (3.0 * K + G);
        let nu = (3.0 * K - 2.0 * G) / (2.0 * (3.0 * K + G));
        assert_relative_eq!(state.stress[0], young * 1e-3, max_relative = 1e-9);
        assert_relative_eq!(state.strain[1], -nu * 1e-3, max_relative = 1e-9);
        assert!(state.stress[1].abs() < 1e-6);
    }

    #[test]
    fn finite_difference_tangent_perturbs_each_stress_column() {
        let mat = LinearElastic::new(K, G)
            .unwrap()
            .with_tangent(TangentSource::FiniteDifference);
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let mut control = [ControlCode::Strain; 6];
        control[0] = ControlCode::Stress;
        let partition = ControlPartition::new(&control);
        let mut state = DriverState::new(&mat);

        let sigma = Vector6::new(100.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let out = solver
            .advance(&mut state, &partition, &target(Vector6::zeros(), sigma, 1.0))
            .unwrap();

        assert!(out.iterations >= 1 && out.iterations <= 2, "{out:?}");
        // one trial plus one perturbation per update, then the accepting trial
        assert_eq!(out.evaluations, 2 * out.iterations + 1);
        assert_relative_eq!(state.strain[0], 100.0 / (K + 4.0 * G / 3.0), max_relative = 1e-8);
    }

    #[test]
    fn exhausted_iterations_without_cutbacks_fail() {
        let mat = LinearElastic::new(K, G).unwrap();
        let settings = NewtonSettings {
            max_iterations: 0,
            max_cutbacks: 0,
            ..NewtonSettings::default()
        };
        let solver = StepSolver::new(&mat, settings, 0.0);
        let partition = ControlPartition::new(&[ControlCode::Stress; 6]);
        let mut state = DriverState::new(&mat);
        let sigma = Vector6::repeat(10.0);

        let err = solver
            .advance(&mut state, &partition, &target(Vector6::zeros(), sigma, 1.0))
            .unwrap_err();
        assert_eq!(err.cutbacks, 0);
        assert!(matches!(err.cause, DriverError::ConvergenceFailure { iterations: 0, .. }));
        assert_eq!(state.time, 0.0);
    }

    #[test]
    fn strain_controlled_stress_does_not_scale_the_residual() {
        let mat = LinearElastic::new(K, G).unwrap();
        let solver = StepSolver::new(&mat, NewtonSettings::default(), 0.0);
        let stress_idx = [1, 2, 3, 4, 5];
        let target = Vector6::zeros();

        let loud_strain_side = Vector6::new(1.0e6, 1.0e-4, 0.0, 0.0, 0.0, 0.0);
        assert!(!solver.converged(1.0e-4, &target, &loud_strain_side, &stress_idx));

        let loud_stress_side = Vector6::new(0.0, 1.0e6, 0.0, 0.0, 0.0, 0.0);
        assert!(solver.converged(1.0e-4, &target, &loud_stress_side, &stress_idx));
    }
}
