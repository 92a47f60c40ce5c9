//! Pearson correlations among the parameters and responses of a study.

use std::path::Path;

use crate::error::DriverError;

/// Pearson correlation of two equally long samples.
///
/// NaN when either sample is constant or has fewer than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean = |v: &[f64]| v[..n].iter().sum::<f64>() / n as f64;
    let (mx, my) = (mean(x), mean(y));

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Symmetric correlation matrix of `columns`.
pub fn correlation_matrix(columns: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = columns.len();
    let mut m = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let r = if i == j && pearson(&columns[i], &columns[i]).is_finite() {
                1.0
            } else {
                pearson(&columns[i], &columns[j])
            };
            m[i][j] = r;
            m[j][i] = r;
        }
    }
    m
}

/// Write the matrix as CSV with the names heading both rows and columns.
pub fn write_correlations(path: &Path, names: &[String], matrix: &[Vec<f64>]) -> Result<(), DriverError> {
    let mut w = csv::Writer::from_path(path)?;
    let mut header = vec![String::new()];
    header.extend(names.iter().cloned());
    w.write_record(&header)?;
    for (name, row) in names.iter().zip(matrix) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|r| format!("{r:.4}")));
        w.write_record(&record)?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_samples_are_fully_correlated() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(pearson(&x, &[2.0, 4.0, 6.0, 8.0]), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&x, &[-1.0, -3.0, -5.0, -7.0]), -1.0, epsilon = 1e-12);
        assert!(pearson(&x, &[5.0; 4]).is_nan());
        assert!(pearson(&[1.0], &[1.0]).is_nan());
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let cols = vec![vec![1.0, 2.0, 3.0], vec![1.0, 0.0, 1.0], vec![3.0, 3.0, 3.0]];
        let m = correlation_matrix(&cols);
        assert_eq!(m[0][0], 1.0);
        assert_eq!(m[0][1], m[1][0]);
        assert_relative_eq!(m[0][1], 0.0, epsilon = 1e-12);
        assert!(m[2][2].is_nan());
    }
}
