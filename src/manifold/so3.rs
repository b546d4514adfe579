//! SO(3) tangent-space operations on unit quaternions.
//!
//! Rotations are stored as `nalgebra::UnitQuaternion<f64>` and perturbed
//! through the rotation-vector (axis-angle) exponential map. All functions
//! are pure and handle the small-angle limit with Taylor branches so the
//! identity update `exp(0) = I` is exact.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Angle threshold below which Taylor expansions replace the closed forms.
const SMALL_ANGLE: f64 = 1e-10;

/// Hat operator: maps a 3-vector to its skew-symmetric matrix, so that
/// `hat(a) * b == a × b`.
pub fn hat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Exponential map: rotation vector (axis-angle) to unit quaternion.
///
/// For `ω` with angle `θ = ‖ω‖`, returns the quaternion
/// `(cos(θ/2), sin(θ/2)·ω/θ)`. Exact identity at `ω = 0`.
pub fn exp(omega: &Vector3<f64>) -> UnitQuaternion<f64> {
    let theta_sq = omega.norm_squared();
    let (w, scale) = if theta_sq < SMALL_ANGLE {
        // sin(θ/2)/θ ≈ 1/2 − θ²/48, cos(θ/2) ≈ 1 − θ²/8
        (1.0 - theta_sq / 8.0, 0.5 - theta_sq / 48.0)
    } else {
        let theta = theta_sq.sqrt();
        let half = 0.5 * theta;
        (half.cos(), half.sin() / theta)
    };
    UnitQuaternion::new_normalize(Quaternion::new(
        w,
        scale * omega.x,
        scale * omega.y,
        scale * omega.z,
    ))
}

/// Logarithm map: unit quaternion to rotation vector.
///
/// The sign of the quaternion is canonicalized (`w ≥ 0`) so the returned
/// angle is in `[0, π]`.
pub fn log(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    let (w, vec) = if q.w < 0.0 {
        (-q.w, -q.imag())
    } else {
        (q.w, q.imag())
    };
    let vec_norm = vec.norm();
    if vec_norm < SMALL_ANGLE {
        // θ ≈ 2‖v‖/w for small angles
        vec * (2.0 / w)
    } else {
        let theta = 2.0 * vec_norm.atan2(w);
        vec * (theta / vec_norm)
    }
}

/// Inverse of the SO(3) right Jacobian, evaluated at rotation vector `phi`.
///
/// Satisfies, to first order in `δ`:
/// `log(exp(phi) · exp(δ)) ≈ phi + right_jacobian_inv(phi) · δ`.
///
/// Closed form (exact for `‖phi‖ < π`):
/// `Jr⁻¹ = I + ½·hat(φ) + (1/θ² − (1+cosθ)/(2θ·sinθ))·hat(φ)²`.
pub fn right_jacobian_inv(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta_sq = phi.norm_squared();
    let phi_hat = hat(phi);
    let phi_hat_sq = phi_hat * phi_hat;
    if theta_sq < SMALL_ANGLE {
        Matrix3::identity() + 0.5 * phi_hat + phi_hat_sq / 12.0
    } else {
        let theta = theta_sq.sqrt();
        let coeff = 1.0 / theta_sq - (1.0 + theta.cos()) / (2.0 * theta * theta.sin());
        Matrix3::identity() + 0.5 * phi_hat + coeff * phi_hat_sq
    }
}

/// Inverse of the SO(3) left Jacobian: `Jl⁻¹(φ) = Jr⁻¹(−φ)`.
///
/// Satisfies, to first order in `δ`:
/// `log(exp(δ) · exp(phi)) ≈ phi + left_jacobian_inv(phi) · δ`.
pub fn left_jacobian_inv(phi: &Vector3<f64>) -> Matrix3<f64> {
    right_jacobian_inv(&(-phi))
}
