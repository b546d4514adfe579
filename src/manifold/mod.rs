//! Manifold operations for optimization on non-Euclidean spaces.
//!
//! The estimation core updates camera poses through a local tangent-space
//! parameterization: rotations live on SO(3) and are perturbed through the
//! exponential map, translations are Euclidean. This module provides those
//! operations as explicit pure functions on plain types rather than through
//! operator overloading, so each piece (exponential map, logarithm, Jacobian
//! inverses, pose composition) is independently testable.
//!
//! - [`so3`]: rotation-vector exponential/logarithm on unit quaternions,
//!   the hat (skew) operator, and closed-form inverse right/left Jacobians.
//! - [`se3`]: the [`se3::Pose3`] rotation+translation struct with
//!   composition, inversion, point transforms, and the tangent update rule
//!   used by camera vertices.

pub mod se3;
pub mod so3;
