//! Rigid 3D transforms as a plain rotation+translation struct.
//!
//! [`Pose3`] is the pose payload carried by camera vertices. It is a plain
//! struct (unit quaternion + 3-vector) with composition, inversion and point
//! transforms as explicit methods, plus the tangent update rule used during
//! optimization.
//!
//! # Update rule
//!
//! The 6-dimensional tangent layout is `[ω, t]`: three rotation components
//! followed by three translation components. [`Pose3::oplus`] applies
//!
//! ```text
//! R ← R · exp(ω)        (rotation increment composed on the right)
//! t ← t + δt            (translation additive in the world frame)
//! ```
//!
//! which is the classic SBA camera update: the increment group is the direct
//! product SO(3) × R³, so applying `d1` then `d2` equals applying the single
//! composed delta `(log(exp(ω1)·exp(ω2)), t1 + t2)`.

use nalgebra::{UnitQuaternion, Vector3, Vector6};

use crate::manifold::so3;

/// A rigid transform: rotation followed by translation.
///
/// When held by a camera vertex, `Pose3` is the camera-to-world transform:
/// `rotation` is the camera orientation and `translation` the camera center,
/// both expressed in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Pose3 {
    /// Create a pose from rotation and translation.
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Group composition: `self ∘ other`.
    pub fn compose(&self, other: &Pose3) -> Pose3 {
        Pose3 {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// Group inverse.
    pub fn inverse(&self) -> Pose3 {
        let rotation_inv = self.rotation.inverse();
        Pose3 {
            rotation: rotation_inv,
            translation: -(rotation_inv * self.translation),
        }
    }

    /// Transform a point from this frame into the parent frame: `R·p + t`.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Transform a point from the parent frame into this frame:
    /// `Rᵀ·(p − t)`. For a camera pose this maps world points into the
    /// camera frame.
    pub fn inverse_transform(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * (p - self.translation)
    }

    /// Apply a tangent-space increment `[ω, t]` in place.
    ///
    /// Well-defined for arbitrarily small and exactly-zero deltas (identity
    /// update).
    pub fn oplus(&mut self, omega: &Vector3<f64>, delta_t: &Vector3<f64>) {
        self.rotation *= so3::exp(omega);
        self.translation += delta_t;
    }

    /// Rotation component as a rotation vector (`log` of the quaternion).
    pub fn rotation_log(&self) -> Vector3<f64> {
        so3::log(&self.rotation)
    }

    /// Minimal 6-vector representation `[ω, t]`.
    pub fn to_minimal(&self) -> Vector6<f64> {
        let omega = self.rotation_log();
        Vector6::new(
            omega.x,
            omega.y,
            omega.z,
            self.translation.x,
            self.translation.y,
            self.translation.z,
        )
    }

    /// Reconstruct a pose from a minimal 6-vector `[ω, t]`.
    pub fn from_minimal(data: &Vector6<f64>) -> Self {
        let omega = Vector3::new(data[0], data[1], data[2]);
        Self {
            rotation: so3::exp(&omega),
            translation: Vector3::new(data[3], data[4], data[5]),
        }
    }
}

impl Default for Pose3 {
    fn default() -> Self {
        Self::identity()
    }
}
