//! Camera pose vertices.

use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3, Vector6};

use crate::camera::{CustomCam, SbaCam};
use crate::manifold::se3::Pose3;
use crate::vertex::{check_dim, Vertex, VertexId};
use crate::error::GraphResult;

/// Rebuild the rotation from flat `[qx, qy, qz, qw]` data. Already-unit
/// input is passed through unchanged so flat-data round-trips reproduce the
/// exact bits.
fn rotation_from_data(data: &[f64]) -> UnitQuaternion<f64> {
    let quaternion = Quaternion::new(data[3], data[0], data[1], data[2]);
    if (quaternion.norm_squared() - 1.0).abs() < 1e-12 {
        UnitQuaternion::new_unchecked(quaternion)
    } else {
        UnitQuaternion::new_normalize(quaternion)
    }
}

/// Camera vertex carrying an [`SbaCam`] estimate.
///
/// Full representation (11): `[qx,qy,qz,qw, tx,ty,tz, fx,fy,cx,cy]`.
/// Minimal representation (6): `[ω, t]`. The tangent update perturbs the
/// pose only; calibration stays untouched and is changed through
/// [`SbaCam::set_kcam`] on the estimate.
#[derive(Debug, Clone)]
pub struct VertexCam {
    id: VertexId,
    fixed: bool,
    estimate: SbaCam,
}

impl VertexCam {
    pub fn new(id: VertexId, estimate: SbaCam) -> Self {
        Self {
            id,
            fixed: false,
            estimate,
        }
    }

    pub fn estimate(&self) -> &SbaCam {
        &self.estimate
    }

    pub fn estimate_mut(&mut self) -> &mut SbaCam {
        &mut self.estimate
    }

    /// Replace the whole estimate with a manifold value.
    pub fn set_estimate(&mut self, estimate: SbaCam) {
        self.estimate = estimate;
    }

    /// Replace the pose while keeping the calibration.
    pub fn set_pose(&mut self, pose: Pose3) {
        self.estimate.pose = pose;
    }
}

impl Vertex for VertexCam {
    fn id(&self) -> VertexId {
        self.id
    }

    fn is_fixed(&self) -> bool {
        self.fixed
    }

    fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    fn estimate_dimension(&self) -> usize {
        11
    }

    fn minimal_dimension(&self) -> usize {
        6
    }

    fn set_to_origin(&mut self) {
        self.estimate.pose = Pose3::identity();
    }

    fn oplus(&mut self, delta: &[f64]) -> GraphResult<()> {
        check_dim(6, delta.len())?;
        let omega = Vector3::new(delta[0], delta[1], delta[2]);
        let delta_t = Vector3::new(delta[3], delta[4], delta[5]);
        self.estimate.pose.oplus(&omega, &delta_t);
        Ok(())
    }

    fn estimate_data(&self) -> DVector<f64> {
        let q = self.estimate.pose.rotation;
        let t = self.estimate.pose.translation;
        DVector::from_vec(vec![
            q.i,
            q.j,
            q.k,
            q.w,
            t.x,
            t.y,
            t.z,
            self.estimate.fx,
            self.estimate.fy,
            self.estimate.cx,
            self.estimate.cy,
        ])
    }

    fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        check_dim(11, data.len())?;
        self.estimate.pose.rotation = rotation_from_data(data);
        self.estimate.pose.translation = Vector3::new(data[4], data[5], data[6]);
        self.estimate.fx = data[7];
        self.estimate.fy = data[8];
        self.estimate.cx = data[9];
        self.estimate.cy = data[10];
        Ok(())
    }

    fn minimal_estimate_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.estimate.pose.to_minimal().as_slice())
    }

    fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        check_dim(6, data.len())?;
        self.estimate.pose = Pose3::from_minimal(&Vector6::from_column_slice(data));
        Ok(())
    }
}

/// Camera vertex carrying a [`CustomCam`] estimate.
///
/// Full representation (11): `[qx,qy,qz,qw, tx,ty,tz, fx,fy,cx,cy]`.
/// Minimal representation (6): `[ω, t]`, same update rule as [`VertexCam`].
#[derive(Debug, Clone)]
pub struct VertexCustomCam {
    id: VertexId,
    fixed: bool,
    estimate: CustomCam,
}

impl VertexCustomCam {
    pub fn new(id: VertexId, estimate: CustomCam) -> Self {
        Self {
            id,
            fixed: false,
            estimate,
        }
    }

    pub fn estimate(&self) -> &CustomCam {
        &self.estimate
    }

    pub fn estimate_mut(&mut self) -> &mut CustomCam {
        &mut self.estimate
    }

    pub fn set_estimate(&mut self, estimate: CustomCam) {
        self.estimate = estimate;
    }

    pub fn set_pose(&mut self, pose: Pose3) {
        self.estimate.pose = pose;
    }
}

impl Vertex for VertexCustomCam {
    fn id(&self) -> VertexId {
        self.id
    }

    fn is_fixed(&self) -> bool {
        self.fixed
    }

    fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    fn estimate_dimension(&self) -> usize {
        11
    }

    fn minimal_dimension(&self) -> usize {
        6
    }

    fn set_to_origin(&mut self) {
        self.estimate.pose = Pose3::identity();
    }

    fn oplus(&mut self, delta: &[f64]) -> GraphResult<()> {
        check_dim(6, delta.len())?;
        let omega = Vector3::new(delta[0], delta[1], delta[2]);
        let delta_t = Vector3::new(delta[3], delta[4], delta[5]);
        self.estimate.pose.oplus(&omega, &delta_t);
        Ok(())
    }

    fn estimate_data(&self) -> DVector<f64> {
        let q = self.estimate.pose.rotation;
        let t = self.estimate.pose.translation;
        DVector::from_vec(vec![
            q.i,
            q.j,
            q.k,
            q.w,
            t.x,
            t.y,
            t.z,
            self.estimate.fx,
            self.estimate.fy,
            self.estimate.cx,
            self.estimate.cy,
        ])
    }

    fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        check_dim(11, data.len())?;
        self.estimate.pose.rotation = rotation_from_data(data);
        self.estimate.pose.translation = Vector3::new(data[4], data[5], data[6]);
        self.estimate.fx = data[7];
        self.estimate.fy = data[8];
        self.estimate.cx = data[9];
        self.estimate.cy = data[10];
        Ok(())
    }

    fn minimal_estimate_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.estimate.pose.to_minimal().as_slice())
    }

    fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        check_dim(6, data.len())?;
        self.estimate.pose = Pose3::from_minimal(&Vector6::from_column_slice(data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::so3;

    fn sample_cam() -> SbaCam {
        let mut cam = SbaCam::new(
            so3::exp(&Vector3::new(0.1, -0.2, 0.05)),
            Vector3::new(0.5, 1.0, -0.3),
        );
        cam.set_kcam(500.0, 510.0, 320.0, 240.0, 0.1);
        cam
    }

    #[test]
    fn test_dimensions() {
        let vertex = VertexCam::new(0, sample_cam());
        assert_eq!(vertex.estimate_dimension(), 11);
        assert_eq!(vertex.minimal_dimension(), 6);
        assert_eq!(vertex.estimate_data().len(), 11);
        assert_eq!(vertex.minimal_estimate_data().len(), 6);
    }

    #[test]
    fn test_estimate_data_roundtrip_is_exact() {
        let mut vertex = VertexCam::new(0, sample_cam());
        let data = vertex.estimate_data();
        vertex.set_estimate_data(data.as_slice()).unwrap();
        // set(get()) reproduces the exact bits, no renormalization drift
        assert_eq!(vertex.estimate_data(), data);
    }

    #[test]
    fn test_oplus_moves_pose_only() {
        let mut vertex = VertexCam::new(0, sample_cam());
        vertex
            .oplus(&[0.01, -0.02, 0.005, 0.1, -0.2, 0.3])
            .unwrap();
        // calibration untouched
        assert_eq!(vertex.estimate().fx, 500.0);
        assert_eq!(vertex.estimate().baseline, 0.1);
        // translation is world-frame additive
        let expected_t = Vector3::new(0.5 + 0.1, 1.0 - 0.2, -0.3 + 0.3);
        assert!((vertex.estimate().pose.translation - expected_t).norm() < 1e-14);
    }

    #[test]
    fn test_set_to_origin_keeps_calibration() {
        let mut vertex = VertexCam::new(0, sample_cam());
        vertex.set_to_origin();
        assert!(vertex.estimate().pose.translation.norm() < 1e-15);
        assert!(vertex.estimate().pose.rotation.angle() < 1e-15);
        assert_eq!(vertex.estimate().fx, 500.0);
    }

    #[test]
    fn test_minimal_roundtrip() {
        let mut vertex = VertexCam::new(0, sample_cam());
        let pose_before = vertex.estimate().pose;
        let minimal = vertex.minimal_estimate_data();
        vertex.set_minimal_estimate_data(minimal.as_slice()).unwrap();
        assert!((vertex.estimate().pose.translation - pose_before.translation).norm() < 1e-12);
        assert!(vertex.estimate().pose.rotation.angle_to(&pose_before.rotation) < 1e-12);
    }

    #[test]
    fn test_custom_cam_roundtrip_is_exact() {
        let mut cam = CustomCam::new(
            so3::exp(&Vector3::new(-0.3, 0.1, 0.2)),
            Vector3::new(1.0, 0.0, 2.0),
        );
        cam.set_cam(450.0, 460.0, 320.0, 240.0);
        let mut vertex = VertexCustomCam::new(3, cam);
        assert_eq!(vertex.estimate_dimension(), 11);
        let data = vertex.estimate_data();
        vertex.set_estimate_data(data.as_slice()).unwrap();
        assert_eq!(vertex.estimate_data(), data);
    }

    #[test]
    fn test_non_unit_quaternion_data_is_normalized() {
        let mut vertex = VertexCam::new(0, sample_cam());
        let mut data = vertex.estimate_data();
        for k in 0..4 {
            data[k] *= 2.0;
        }
        vertex.set_estimate_data(data.as_slice()).unwrap();
        let q = vertex.estimate().pose.rotation;
        assert!((q.norm() - 1.0).abs() < 1e-14);
    }
}
