//! Density/temperature surfaces for the EOS driver.
//!
//! A surface is given by corner lines `<num_steps> <control> <v1> <v2>`,
//! where the control digits say which value is density (`1`) and which is
//! temperature (`2`). Consecutive corners are expanded with `num_steps`
//! evenly spaced points each; the surface is the Cartesian product of the
//! expanded densities and temperatures, walked with pseudo-time in `[0, 1]`.

use crate::config::SurfaceOptions;
use crate::error::{DriverError, LegError};
use crate::legs::parse::finite_float;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceCorner {
    pub num_steps: usize,
    pub density: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub time: f64,
    pub density: f64,
    pub temperature: f64,
}

/// `n` evenly spaced values from `a` to `b` inclusive.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let h = (b - a) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { b } else { a + h * i as f64 }).collect()
        }
    }
}

/// Parse corner lines; every malformed line is reported.
pub fn parse_surface(text: &str) -> Result<Vec<SurfaceCorner>, DriverError> {
    let mut corners = Vec::new();
    let mut errors = Vec::new();

    let lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));
    for (idx, line) in lines.enumerate() {
        let number = idx + 1;
        match parse_corner(line, number) {
            Ok(c) => corners.push(c),
            Err(e) => errors.push(e),
        }
    }

    if corners.len() + errors.len() < 2 {
        errors.push(LegError::new(0, "a surface needs at least two corners"));
    }
    if errors.is_empty() {
        Ok(corners)
    } else {
        Err(DriverError::InputValidation(errors))
    }
}

fn parse_corner(line: &str, number: usize) -> Result<SurfaceCorner, LegError> {
    let toks: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    let [steps, control, v1, v2] = toks.as_slice() else {
        return Err(LegError::new(
            number,
            format!("expected '<num_steps> <control> <v1> <v2>', got '{line}'"),
        ));
    };

    let num_steps = steps
        .parse::<usize>()
        .map_err(|_| LegError::new(number, format!("number of steps must be a non-negative integer, got '{steps}'")))?;
    let values = [v1, v2].map(|v| finite_float(v));
    let (Some(a), Some(b)) = (&values[0], &values[1]) else {
        return Err(LegError::new(
            number,
            format!("each surface value must be a finite float, got '{v1}' and '{v2}'"),
        ));
    };

    let (density, temperature) = match *control {
        "12" => (*a, *b),
        "21" => (*b, *a),
        _ => {
            return Err(LegError::new(
                number,
                format!("control must name density (1) and temperature (2) once each, got '{control}'"),
            ));
        }
    };
    if !(density > 0.0 && temperature > 0.0) {
        return Err(LegError::new(number, "density and temperature must be > 0"));
    }

    Ok(SurfaceCorner {
        num_steps,
        density,
        temperature,
    })
}

/// Apply multipliers and expand corners into the walked surface.
pub fn build_surface(corners: &[SurfaceCorner], opts: &SurfaceOptions) -> Result<Vec<SurfacePoint>, DriverError> {
    if !(opts.rstar > 0.0 && opts.tstar > 0.0 && opts.nfac > 0.0) {
        return Err(DriverError::invalid(0, "rstar, tstar and nfac must be > 0"));
    }
    let rfac = opts.amplitude * opts.rstar;
    let tfac = opts.amplitude * opts.tstar;

    let mut densities = Vec::new();
    let mut temperatures = Vec::new();
    for pair in corners.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let n = (opts.nfac * end.num_steps as f64).floor() as usize;
        densities.extend(linspace(rfac * start.density, rfac * end.density, n));
        temperatures.extend(linspace(tfac * start.temperature, tfac * end.temperature, n));
    }

    if densities.is_empty() {
        return Err(DriverError::invalid(0, "surface expands to no points"));
    }
    if densities.iter().chain(&temperatures).any(|v| !(*v > 0.0)) {
        return Err(DriverError::invalid(0, "scaled densities and temperatures must be > 0"));
    }

    let count = densities.len() * temperatures.len();
    let times = linspace(0.0, 1.0, count);
    let mut points = Vec::with_capacity(count);
    for &density in &densities {
        for &temperature in &temperatures {
            points.push(SurfacePoint {
                time: times[points.len()],
                density,
                temperature,
            });
        }
    }
    Ok(points)
}
