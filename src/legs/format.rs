//! Leg formatting: multipliers, special encodings, admissibility checks.

use nalgebra::{Matrix3, Vector6};

use crate::config::PathOptions;
use crate::domain::{ControlCode, Leg, Path};
use crate::error::{DriverError, LegError};
use crate::legs::RawLeg;
use crate::math::{distance_from_identity, polar_decomposition, strain_from_stretch};

/// Tolerance on `|R - I|` for deformation-gradient legs.
const ROTATION_TOL: f64 = 1e-10;

/// Global multipliers derived from `PathOptions`.
#[derive(Debug, Clone, Copy)]
struct Factors {
    time: f64,
    strain: f64,
    stress: f64,
    defgrad: f64,
    efield: f64,
    displacement: f64,
    rate: f64,
    steps: f64,
}

impl Factors {
    fn new(opts: &PathOptions) -> Result<Self, LegError> {
        if !(opts.tstar > 0.0) {
            return Err(LegError::new(0, format!("tstar must be > 0, got {}", opts.tstar)));
        }
        if !(opts.ratfac > 0.0) {
            return Err(LegError::new(0, format!("ratfac must be > 0, got {}", opts.ratfac)));
        }
        if !(opts.nfac > 0.0) {
            return Err(LegError::new(0, format!("nfac must be > 0, got {}", opts.nfac)));
        }
        if opts.amplitude == 0.0 {
            return Err(LegError::new(0, "amplitude must be nonzero"));
        }
        let amp = opts.amplitude;
        Ok(Self {
            time: amp.abs() * opts.tstar / opts.ratfac,
            strain: amp * opts.estar,
            stress: amp * opts.sstar,
            defgrad: amp * opts.fstar,
            efield: amp * opts.efstar,
            displacement: amp * opts.dstar,
            rate: opts.ratfac,
            steps: opts.nfac,
        })
    }
}

/// Validate `raw` and reduce it to a `Path` of six-component plain legs.
///
/// Every leg is checked even after an earlier one fails; all problems are
/// returned together.
pub fn format_legs(raw: &[RawLeg], opts: &PathOptions) -> Result<Path, DriverError> {
    let factors = Factors::new(opts).map_err(|e| DriverError::InputValidation(vec![e]))?;
    let kappa = opts.kappa;

    let mut errors = Vec::new();
    let stress_controlled = raw
        .iter()
        .any(|leg| leg.control.iter().any(|c| c.is_stress_like()));
    if stress_controlled && kappa != 0.0 {
        errors.push(LegError::new(
            0,
            format!("stress control requires kappa = 0, got kappa = {kappa}"),
        ));
    }

    let mut legs = Vec::with_capacity(raw.len());
    let mut prev_time: Option<f64> = None;

    for (i, r) in raw.iter().enumerate() {
        let time = factors.time * r.time;
        let num_steps = if r.num_steps == 0 {
            0
        } else {
            ((factors.steps * r.num_steps as f64).floor() as usize).max(1)
        };

        if !(time >= 0.0) {
            errors.push(LegError::new(r.number, format!("termination time must be >= 0, got {time}")));
            continue;
        }
        if num_steps == 0 {
            if i != 0 || time != 0.0 {
                errors.push(LegError::new(
                    r.number,
                    "only the first leg, at time 0, may have zero steps",
                ));
            }
        } else if let Some(prev) = prev_time {
            if time <= prev {
                errors.push(LegError::new(
                    r.number,
                    format!("termination time must increase, {time} <= {prev}"),
                ));
            }
        } else if time <= 0.0 {
            errors.push(LegError::new(r.number, "an integrating leg must end after time 0"));
        }
        prev_time = Some(time);

        match format_leg(r, &factors, kappa) {
            Ok((control, values, efield)) => {
                if time == 0.0 {
                    if let Err(e) = check_initial_state(r.number, &control) {
                        errors.push(e);
                        continue;
                    }
                }
                legs.push(Leg {
                    number: r.number,
                    termination_time: time,
                    num_steps,
                    control,
                    values,
                    rotation: Matrix3::identity(),
                    efield,
                    temperature: r.temperature,
                });
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(Path::new(legs, kappa))
    } else {
        Err(DriverError::InputValidation(errors))
    }
}

type Formatted = ([ControlCode; 6], Vector6<f64>, [f64; 3]);

fn format_leg(r: &RawLeg, f: &Factors, kappa: f64) -> Result<Formatted, LegError> {
    let leg = r.number;

    let mut efield = [0.0; 3];
    let mut n_efield = 0;
    let mut control = Vec::with_capacity(r.control.len());
    let mut values = Vec::with_capacity(r.values.len());
    for (&code, &value) in r.control.iter().zip(&r.values) {
        match code {
            ControlCode::EField => {
                if n_efield == 3 {
                    return Err(LegError::new(leg, "at most 3 electric field components allowed"));
                }
                efield[n_efield] = f.efield * value;
                n_efield += 1;
            }
            ControlCode::Skip => {}
            _ => {
                control.push(code);
                values.push(value);
            }
        }
    }

    if control.is_empty() {
        return Err(LegError::new(leg, "no mechanical control components"));
    }

    let (control, values) = if control.contains(&ControlCode::DefGrad) {
        defgrad_leg(leg, &control, &values, f, kappa)?
    } else if control.contains(&ControlCode::Displacement) {
        displacement_leg(leg, &control, &values, f, kappa)?
    } else if control.len() == 1 && control[0] == ControlCode::Strain {
        volumetric_leg(leg, values[0] * f.strain, kappa)?
    } else if control.len() == 1 && control[0] == ControlCode::Stress {
        pressure_leg(values[0] * f.stress)
    } else {
        plain_leg(leg, &control, &values, f, kappa)?
    };

    Ok((control, values, efield))
}

fn require_all(leg: usize, control: &[ControlCode], code: ControlCode, count: usize, name: &str) -> Result<(), LegError> {
    if control.iter().any(|&c| c != code) {
        return Err(LegError::new(
            leg,
            format!("mixed mode {name} legs are not allowed"),
        ));
    }
    if control.len() != count {
        return Err(LegError::new(
            leg,
            format!("{name} legs need {count} components, got {}", control.len()),
        ));
    }
    Ok(())
}

fn strain_leg(leg: usize, u: &Matrix3<f64>, kappa: f64) -> Result<([ControlCode; 6], Vector6<f64>), LegError> {
    let e = strain_from_stretch(u, kappa)
        .ok_or_else(|| LegError::new(leg, "stretch has no real strain for this kappa"))?;
    Ok(([ControlCode::Strain; 6], e))
}

fn defgrad_leg(
    leg: usize,
    control: &[ControlCode],
    values: &[f64],
    f: &Factors,
    kappa: f64,
) -> Result<([ControlCode; 6], Vector6<f64>), LegError> {
    require_all(leg, control, ControlCode::DefGrad, 9, "deformation gradient")?;
    let defgrad = Matrix3::from_row_slice(values) * f.defgrad;
    let jac = defgrad.determinant();
    if !(jac > 0.0) {
        return Err(LegError::new(
            leg,
            format!("inadmissible deformation gradient gave a Jacobian of {jac:.4e}"),
        ));
    }
    let (rotation, stretch) = polar_decomposition(&defgrad)
        .ok_or_else(|| LegError::new(leg, "polar decomposition of the deformation gradient failed"))?;
    if distance_from_identity(&rotation) > ROTATION_TOL {
        return Err(LegError::new(
            leg,
            "deformation gradient carries a rotation, which is not supported",
        ));
    }
    strain_leg(leg, &stretch, kappa)
}

fn displacement_leg(
    leg: usize,
    control: &[ControlCode],
    values: &[f64],
    f: &Factors,
    kappa: f64,
) -> Result<([ControlCode; 6], Vector6<f64>), LegError> {
    require_all(leg, control, ControlCode::Displacement, 3, "displacement")?;
    let mut stretch = Matrix3::identity();
    for (i, &u) in values.iter().enumerate() {
        let s = 1.0 + f.displacement * u;
        if !(s > 0.0) {
            return Err(LegError::new(
                leg,
                format!("displacement component {} gives non-positive stretch {s}", i + 1),
            ));
        }
        stretch[(i, i)] = s;
    }
    strain_leg(leg, &stretch, kappa)
}

fn volumetric_leg(leg: usize, ev: f64, kappa: f64) -> Result<([ControlCode; 6], Vector6<f64>), LegError> {
    let component = if kappa == 0.0 {
        ev / 3.0
    } else {
        let base = kappa * ev + 1.0;
        if !(base > 0.0) {
            return Err(LegError::new(
                leg,
                format!("volumetric strain {ev} is inadmissible for kappa = {kappa}"),
            ));
        }
        (base.powf(1.0 / 3.0) - 1.0) / kappa
    };
    Ok((
        [ControlCode::Strain; 6],
        Vector6::new(component, component, component, 0.0, 0.0, 0.0),
    ))
}

fn pressure_leg(pressure: f64) -> ([ControlCode; 6], Vector6<f64>) {
    let mut control = [ControlCode::Stress; 6];
    control[3..].fill(ControlCode::Strain);
    (control, Vector6::new(-pressure, -pressure, -pressure, 0.0, 0.0, 0.0))
}

fn plain_leg(
    leg: usize,
    control: &[ControlCode],
    values: &[f64],
    f: &Factors,
    kappa: f64,
) -> Result<([ControlCode; 6], Vector6<f64>), LegError> {
    if let Some(bad) = control.iter().find(|c| !c.is_plain()) {
        return Err(LegError::new(
            leg,
            format!("control flag {} cannot be mixed with other flags", bad.digit()),
        ));
    }
    if control.len() > 6 {
        return Err(LegError::new(
            leg,
            format!("at most 6 strain/stress components allowed, got {}", control.len()),
        ));
    }

    let mut out_control = [ControlCode::Strain; 6];
    let mut out_values = Vector6::zeros();
    for (i, (&code, &value)) in control.iter().zip(values).enumerate() {
        let scaled = match code {
            ControlCode::StrainRate => value * f.strain * f.rate,
            ControlCode::Strain => value * f.strain,
            ControlCode::StressRate => value * f.stress * f.rate,
            _ => value * f.stress,
        };
        if code == ControlCode::Strain && !(1.0 + kappa * scaled > 0.0) {
            return Err(LegError::new(
                leg,
                format!("strain component {} = {scaled} is inadmissible for kappa = {kappa}", i + 1),
            ));
        }
        out_control[i] = code;
        out_values[i] = scaled;
    }
    Ok((out_control, out_values))
}

/// A leg ending at `t = 0` sets the initial state and must be unambiguous.
fn check_initial_state(leg: usize, control: &[ControlCode; 6]) -> Result<(), LegError> {
    if control.contains(&ControlCode::StressRate) {
        return Err(LegError::new(leg, "initial stress rate is ambiguous"));
    }
    let stress = control.iter().filter(|c| c.is_stress_like()).count();
    if stress != 0 && stress != 6 {
        return Err(LegError::new(
            leg,
            "mixed stress and strain initial state is not allowed",
        ));
    }
    Ok(())
}
