//! Dense linear solves for the Newton update.
//!
//! Each Newton iteration solves
//!
//! ```text
//! J[s, s] · δ = -r
//! ```
//!
//! where `s` are the stress-controlled components (1 to 6 of them). The
//! systems are tiny, so we use LU with partial pivoting and fall back to SVD
//! when LU reports a singular pivot (a material with a zero tangent in one
//! direction should still yield a least-norm update rather than abort).

use nalgebra::{DMatrix, DVector};

/// Solve a small square system.
///
/// Returns `None` if the system cannot be solved to finite values.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return None;
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    if let Some(x) = a.clone().lu().solve(b) {
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }

    let svd = a.clone().svd(true, true);
    for &tol in &[1e-12, 1e-10] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) && x.iter().any(|v| *v != 0.0) {
                return Some(x);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_simple_system() {
        // 2x + y = 5, x + 3y = 10
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[5.0, 10.0]);

        let x = solve_dense(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_shapes_and_nan() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        assert!(solve_dense(&a, &DVector::from_row_slice(&[1.0])).is_none());

        let bad = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        assert!(solve_dense(&bad, &DVector::from_row_slice(&[1.0])).is_none());
    }

    #[test]
    fn all_zero_system_has_no_update() {
        let a = DMatrix::<f64>::zeros(2, 2);
        let b = DVector::from_row_slice(&[1.0, 1.0]);
        assert!(solve_dense(&a, &b).is_none());
    }
}
