//! Second-order tensor helpers and Seth-Hill kinematics.
//!
//! The generalized (Seth-Hill) strain of a stretch `U` is
//!
//! ```text
//! E = (U^κ - I) / κ     κ ≠ 0
//! E = ln U              κ = 0
//! ```
//!
//! evaluated spectrally on the symmetric tensor. All functions return `None`
//! instead of producing NaN when the stretch is not positive definite.

use nalgebra::{Matrix3, Vector3, Vector6};

/// Symmetric 6-vector -> 3x3 matrix.
pub fn sym_to_matrix(a: &Vector6<f64>) -> Matrix3<f64> {
    Matrix3::new(
        a[0], a[3], a[5], //
        a[3], a[1], a[4], //
        a[5], a[4], a[2],
    )
}

/// Symmetric part of a 3x3 matrix as a 6-vector.
pub fn matrix_to_sym(m: &Matrix3<f64>) -> Vector6<f64> {
    Vector6::new(
        m[(0, 0)],
        m[(1, 1)],
        m[(2, 2)],
        0.5 * (m[(0, 1)] + m[(1, 0)]),
        0.5 * (m[(1, 2)] + m[(2, 1)]),
        0.5 * (m[(0, 2)] + m[(2, 0)]),
    )
}

/// Row-major flattening (`XX, XY, XZ, YX, ...`).
pub fn flatten(m: &Matrix3<f64>) -> [f64; 9] {
    let mut out = [0.0; 9];
    for i in 0..3 {
        for j in 0..3 {
            out[3 * i + j] = m[(i, j)];
        }
    }
    out
}

pub fn trace(a: &Vector6<f64>) -> f64 {
    a[0] + a[1] + a[2]
}

/// Isotropic identity in 6-vector storage.
pub fn identity6() -> Vector6<f64> {
    Vector6::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0)
}

pub fn deviator(a: &Vector6<f64>) -> Vector6<f64> {
    a - identity6() * (trace(a) / 3.0)
}

/// Double contraction `a : b` of two symmetric tensors.
pub fn ddot(a: &Vector6<f64>, b: &Vector6<f64>) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + 2.0 * (a[3] * b[3] + a[4] * b[4] + a[5] * b[5])
}

/// Apply a scalar function to the eigenvalues of a symmetric matrix.
fn spectral_map(m: &Matrix3<f64>, f: impl Fn(f64) -> Option<f64>) -> Option<Matrix3<f64>> {
    let eig = m.symmetric_eigen();
    let mut mapped = Vector3::zeros();
    for (i, &lam) in eig.eigenvalues.iter().enumerate() {
        let v = f(lam)?;
        if !v.is_finite() {
            return None;
        }
        mapped[i] = v;
    }
    let v = eig.eigenvectors;
    Some(v * Matrix3::from_diagonal(&mapped) * v.transpose())
}

/// Seth-Hill strain of a symmetric stretch tensor.
pub fn strain_from_stretch(u: &Matrix3<f64>, kappa: f64) -> Option<Vector6<f64>> {
    let e = spectral_map(u, |lam| {
        if lam <= 0.0 {
            None
        } else if kappa == 0.0 {
            Some(lam.ln())
        } else {
            Some((lam.powf(kappa) - 1.0) / kappa)
        }
    })?;
    Some(matrix_to_sym(&e))
}

pub fn log_strain(u: &Matrix3<f64>) -> Option<Vector6<f64>> {
    strain_from_stretch(u, 0.0)
}

/// Inverse of [`strain_from_stretch`].
pub fn stretch_from_strain(e: &Vector6<f64>, kappa: f64) -> Option<Matrix3<f64>> {
    spectral_map(&sym_to_matrix(e), |x| {
        if kappa == 0.0 {
            Some(x.exp())
        } else {
            let base = 1.0 + kappa * x;
            if base <= 0.0 { None } else { Some(base.powf(1.0 / kappa)) }
        }
    })
}

/// Rate of deformation that carries the strain from `old` to `new` over `dt`.
///
/// For the logarithmic measure (`κ = 0`) this is the plain difference
/// quotient; otherwise both states are mapped back to log strain first.
pub fn rate_of_deformation(old: &Vector6<f64>, new: &Vector6<f64>, kappa: f64, dt: f64) -> Option<Vector6<f64>> {
    if dt <= 0.0 {
        return None;
    }
    if kappa == 0.0 {
        return Some((new - old) / dt);
    }
    let u_old = stretch_from_strain(old, kappa)?;
    let u_new = stretch_from_strain(new, kappa)?;
    let ln_old = log_strain(&u_old)?;
    let ln_new = log_strain(&u_new)?;
    Some((ln_new - ln_old) / dt)
}

/// Polar decomposition `F = R U`.
///
/// Returns `None` unless `det F > 0`.
pub fn polar_decomposition(f: &Matrix3<f64>) -> Option<(Matrix3<f64>, Matrix3<f64>)> {
    if !(f.determinant() > 0.0) {
        return None;
    }
    let svd = f.svd(true, true);
    let w = svd.u?;
    let v_t = svd.v_t?;
    let r = w * v_t;
    let u = v_t.transpose() * Matrix3::from_diagonal(&svd.singular_values) * v_t;
    Some((r, u))
}

/// Largest absolute entry-wise difference from the identity.
pub fn distance_from_identity(m: &Matrix3<f64>) -> f64 {
    (m - Matrix3::identity()).iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}
