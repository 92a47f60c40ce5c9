//! Textual leg parsing.
//!
//! Two layouts are accepted:
//!
//! - default: `<time> <num_steps> <control_digits> <v1> ... <vN> [temperature]`
//! - table: numeric rows with a shared control string, one step per row
//!
//! Parsing never stops at the first bad line: every problem is recorded as a
//! `LegError` so the user sees the full list at once. Numeric admissibility
//! (monotonic time, Jacobians, kappa restrictions) is checked later by
//! `format_legs`.

use crate::config::TimeFormat;
use crate::domain::ControlCode;
use crate::error::LegError;

/// A leg as written by the user, before multipliers and reductions.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLeg {
    /// 1-based leg number.
    pub number: usize,
    pub time: f64,
    pub num_steps: usize,
    pub control: Vec<ControlCode>,
    pub values: Vec<f64>,
    pub temperature: Option<f64>,
}

/// Split a line on whitespace and commas.
fn tokens(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Non-blank, non-comment lines.
fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'))
}

/// Parse a control string such as `"422222"`.
pub fn parse_control(control: &str, leg: usize) -> Result<Vec<ControlCode>, LegError> {
    let mut out = Vec::with_capacity(control.len());
    for (i, ch) in control.chars().enumerate() {
        let code = ch
            .to_digit(10)
            .and_then(ControlCode::from_digit)
            .ok_or_else(|| {
                LegError::new(
                    leg,
                    format!("control flag {} must be one of 1, 2, 3, 4, 5, 6, 8, 9, got '{ch}'", i + 1),
                )
            })?;
        out.push(code);
    }
    if out.is_empty() {
        return Err(LegError::new(leg, "empty control string"));
    }
    Ok(out)
}

/// Parse the default leg layout.
pub fn parse_legs_default(text: &str) -> (Vec<RawLeg>, Vec<LegError>) {
    let mut legs = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in content_lines(text).enumerate() {
        let number = idx + 1;
        match parse_default_line(line, number) {
            Ok(leg) => legs.push(leg),
            Err(e) => errors.extend(e),
        }
    }

    if legs.is_empty() && errors.is_empty() {
        errors.push(LegError::new(0, "path contains no legs"));
    }
    (legs, errors)
}

/// `str::parse` also accepts `inf` and `NaN`; neither is a usable leg value.
pub(crate) fn finite_float(tok: &str) -> Option<f64> {
    tok.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_default_line(line: &str, number: usize) -> Result<RawLeg, Vec<LegError>> {
    let toks = tokens(line);
    if toks.len() < 3 {
        return Err(vec![LegError::new(
            number,
            format!("expected '<time> <num_steps> <control> <values...>', got '{line}'"),
        )]);
    }

    let mut errors = Vec::new();

    let time = finite_float(toks[0]).unwrap_or_else(|| {
        errors.push(LegError::new(
            number,
            format!("termination time must be a finite float, got '{}'", toks[0]),
        ));
        f64::NAN
    });

    let num_steps = match toks[1].parse::<i64>() {
        Ok(n) if n >= 0 => n as usize,
        Ok(n) => {
            errors.push(LegError::new(number, format!("number of steps must be >= 0, got {n}")));
            0
        }
        Err(_) => {
            errors.push(LegError::new(
                number,
                format!("number of steps must be an integer, got '{}'", toks[1]),
            ));
            0
        }
    };

    let control = match parse_control(toks[2], number) {
        Ok(c) => c,
        Err(e) => {
            errors.push(e);
            Vec::new()
        }
    };

    let mut values = Vec::with_capacity(toks.len() - 3);
    for (i, tok) in toks[3..].iter().enumerate() {
        match finite_float(tok) {
            Some(v) => values.push(v),
            None => errors.push(LegError::new(
                number,
                format!("component {} must be a finite float, got '{tok}'", i + 1),
            )),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // One trailing value beyond the control count is the leg temperature.
    let temperature = if values.len() == control.len() + 1 {
        values.pop()
    } else {
        None
    };
    if values.len() != control.len() {
        return Err(vec![LegError::new(
            number,
            format!(
                "{} control flag(s) but {} value(s)",
                control.len(),
                values.len()
            ),
        )]);
    }

    Ok(RawLeg {
        number,
        time,
        num_steps,
        control,
        values,
        temperature,
    })
}

/// Expand a column spec like `"1:7"` or `"1 3:5 8:14:2"` into 0-based indices.
///
/// Ranges are 1-based with an inclusive end; an optional third field is the
/// stride.
pub fn parse_table_columns(spec: &str) -> Result<Vec<usize>, String> {
    let mut columns = Vec::new();
    for item in tokens(spec) {
        let parts: Result<Vec<usize>, _> = item.split(':').map(|p| p.trim().parse::<usize>()).collect();
        let parts = parts.map_err(|_| format!("table columns must be integers, got '{item}'"))?;
        if parts.iter().any(|&p| p == 0) {
            return Err(format!("table columns are 1-based, got '{item}'"));
        }
        match parts.as_slice() {
            [c] => columns.push(c - 1),
            [start, end] => columns.extend((start - 1)..*end),
            [start, end, step] if *step > 0 => columns.extend(((start - 1)..*end).step_by(*step)),
            _ => return Err(format!("column range must be start:end[:step], got '{item}'")),
        }
    }
    if columns.is_empty() {
        return Err("no table columns selected".to_string());
    }
    Ok(columns)
}

/// Parse the table layout: the first selected column is time, the rest are
/// the component values for `control`.
pub fn parse_legs_table(
    text: &str,
    columns: &str,
    time_format: TimeFormat,
    control: &str,
) -> (Vec<RawLeg>, Vec<LegError>) {
    let mut legs = Vec::new();
    let mut errors = Vec::new();

    let columns = match parse_table_columns(columns) {
        Ok(c) => c,
        Err(msg) => return (legs, vec![LegError::new(0, msg)]),
    };
    let control = match parse_control(control, 0) {
        Ok(c) => c,
        Err(e) => return (legs, vec![e]),
    };

    let mut time = 0.0;
    for (idx, line) in content_lines(text).enumerate() {
        let number = idx + 1;
        let row: Option<Vec<f64>> = tokens(line).iter().map(|t| finite_float(t)).collect();
        let Some(row) = row else {
            errors.push(LegError::new(
                number,
                format!("every column must be a finite float, got '{line}'"),
            ));
            continue;
        };
        let selected: Option<Vec<f64>> = columns.iter().map(|&c| row.get(c).copied()).collect();
        let Some(selected) = selected else {
            errors.push(LegError::new(number, "requested column not found"));
            continue;
        };

        time = match time_format {
            TimeFormat::Dt => time + selected[0],
            TimeFormat::Time => selected[0],
        };
        let values = selected[1..].to_vec();
        if values.len() != control.len() {
            errors.push(LegError::new(
                number,
                format!("{} control flag(s) but {} value(s)", control.len(), values.len()),
            ));
            continue;
        }

        legs.push(RawLeg {
            number,
            time,
            num_steps: 1,
            control: control.clone(),
            values,
            temperature: None,
        });
    }

    if legs.is_empty() && errors.is_empty() {
        errors.push(LegError::new(0, "path contains no legs"));
    }
    (legs, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_parses_values_and_temperature() {
        let text = "
            # initial state
            0 0 222222 0 0 0 0 0 0
            1, 10, 422222, 5e3, 0, 0, 0, 0, 0, 300
        ";
        let (legs, errors) = parse_legs_default(text);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[1].number, 2);
        assert_eq!(legs[1].num_steps, 10);
        assert_eq!(legs[1].control[0], ControlCode::Stress);
        assert_eq!(legs[1].values[0], 5e3);
        assert_eq!(legs[1].temperature, Some(300.0));
        assert_eq!(legs[0].temperature, None);
    }

    #[test]
    fn errors_are_collected_across_lines() {
        let text = "
            1 -2 222222 0 0 0 0 0 0
            2 1 2x2222 0 0 0 0 0 0
            3 1 222222 0 0 abc 0 0 0
            4 1 222 0 0
        ";
        let (legs, errors) = parse_legs_default(text);
        assert!(legs.is_empty());
        let legs_with_errors: Vec<usize> = errors.iter().map(|e| e.leg).collect();
        assert_eq!(legs_with_errors, vec![1, 2, 3, 4]);
        assert!(errors[0].message.contains(">= 0"));
        assert!(errors[1].message.contains("control flag 2"));
        assert!(errors[2].message.contains("component 3"));
        assert!(errors[3].message.contains("3 control flag(s) but 2 value(s)"));
    }

    #[test]
    fn empty_path_is_an_error() {
        let (_, errors) = parse_legs_default("\n# nothing\n");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn table_columns_expand_ranges() {
        assert_eq!(parse_table_columns("1:7").unwrap(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(parse_table_columns("1 3:4 6:10:2").unwrap(), vec![0, 2, 3, 5, 7, 9]);
        assert!(parse_table_columns("0:3").is_err());
        assert!(parse_table_columns("a").is_err());
    }

    #[test]
    fn table_layout_accumulates_dt() {
        let text = "
            0.5 9 0.01 0
            0.5 9 0.02 0
        ";
        let (legs, errors) = parse_legs_table(text, "1 3:4", TimeFormat::Dt, "24");
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].time, 0.5);
        assert_eq!(legs[1].time, 1.0);
        assert_eq!(legs[1].values, vec![0.02, 0.0]);
        assert_eq!(legs[1].num_steps, 1);
    }
}
