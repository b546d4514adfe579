//! Camera-to-camera constraint edges.
//!
//! Both edges connect two [`VertexCam`](crate::vertex::VertexCam) vertices
//! (slot 0 observing, slot 1 observed) and support bootstrapping: when
//! exactly one endpoint is fixed, [`Edge::initial_estimate`] produces the
//! pose of the free endpoint that makes the residual exactly zero.

use nalgebra::{DMatrix, DVector, Matrix3, Quaternion, UnitQuaternion, Vector3};

use crate::edge::{cam_at, check_arity, edge_plumbing, Edge};
use crate::error::{GraphError, GraphResult};
use crate::manifold::{se3::Pose3, so3};
use crate::vertex::{GraphVertex, Vertex, VertexId};

/// Relative-pose constraint between two cameras. Residual dimension 6.
///
/// The measurement is the pose of camera 1 expressed in camera 0's frame,
/// `m = pose₀⁻¹ ∘ pose₁`. The residual is the product-group log of the
/// discrepancy, consistent with the camera tangent update:
///
/// ```text
/// e_rot = Log(Rmᵀ · R₀ᵀ · R₁)
/// e_t   = Rmᵀ · (R₀ᵀ·(t₁ − t₀) − tm)
/// ```
#[derive(Debug, Clone)]
pub struct EdgeSbaCam {
    vertices: [VertexId; 2],
    measurement: Pose3,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeSbaCam {
    pub fn new(cam0: VertexId, cam1: VertexId, measurement: Pose3) -> Self {
        Self {
            vertices: [cam0, cam1],
            measurement,
            information: DMatrix::identity(6, 6),
            error: DVector::zeros(6),
            jacobians: vec![DMatrix::zeros(6, 6), DMatrix::zeros(6, 6)],
        }
    }

    pub fn measurement(&self) -> &Pose3 {
        &self.measurement
    }

    pub fn set_measurement(&mut self, measurement: Pose3) {
        self.measurement = measurement;
    }

    fn poses(vertices: &[&GraphVertex]) -> GraphResult<(Pose3, Pose3)> {
        let cam0 = cam_at(vertices, 0)?;
        let cam1 = cam_at(vertices, 1)?;
        Ok((cam0.estimate().pose, cam1.estimate().pose))
    }
}

impl Edge for EdgeSbaCam {
    edge_plumbing!(6, 7);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let (pose0, pose1) = Self::poses(vertices)?;
        let rot_discrepancy =
            self.measurement.rotation.inverse() * pose0.rotation.inverse() * pose1.rotation;
        let e_rot = so3::log(&rot_discrepancy);
        let e_t = self.measurement.rotation.inverse()
            * (pose0.rotation.inverse() * (pose1.translation - pose0.translation)
                - self.measurement.translation);
        let mut error = DVector::zeros(6);
        error.fixed_rows_mut::<3>(0).copy_from(&e_rot);
        error.fixed_rows_mut::<3>(3).copy_from(&e_t);
        Ok(error)
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let (pose0, pose1) = Self::poses(vertices)?;
        let rm_t: Matrix3<f64> = self
            .measurement
            .rotation
            .inverse()
            .to_rotation_matrix()
            .into_inner();
        let r0_t: Matrix3<f64> = pose0.rotation.inverse().to_rotation_matrix().into_inner();
        let e_rot = so3::log(
            &(self.measurement.rotation.inverse() * pose0.rotation.inverse() * pose1.rotation),
        );
        let rm_r0_t = rm_t * r0_t;
        let relative_t = r0_t * (pose1.translation - pose0.translation);

        // slot 0: observing camera
        let mut jac0 = DMatrix::zeros(6, 6);
        jac0.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(-so3::left_jacobian_inv(&e_rot) * rm_t));
        jac0.fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(rm_t * so3::hat(&relative_t)));
        jac0.fixed_view_mut::<3, 3>(3, 3).copy_from(&(-rm_r0_t));

        // slot 1: observed camera
        let mut jac1 = DMatrix::zeros(6, 6);
        jac1.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&so3::right_jacobian_inv(&e_rot));
        jac1.fixed_view_mut::<3, 3>(3, 3).copy_from(&rm_r0_t);

        self.jacobians = vec![jac0, jac1];
        Ok(())
    }

    fn measurement_data(&self) -> DVector<f64> {
        let q = self.measurement.rotation;
        let t = self.measurement.translation;
        DVector::from_vec(vec![q.i, q.j, q.k, q.w, t.x, t.y, t.z])
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        crate::vertex::check_dim(7, data.len())?;
        self.measurement = Pose3::new(
            UnitQuaternion::new_normalize(Quaternion::new(data[3], data[0], data[1], data[2])),
            Vector3::new(data[4], data[5], data[6]),
        );
        Ok(())
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let (pose0, pose1) = Self::poses(vertices)?;
        self.measurement = pose0.inverse().compose(&pose1);
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(2, vertices.len())?;
        cam_at(vertices, 0)?;
        cam_at(vertices, 1)?;
        Ok(())
    }

    fn initial_estimate_possible(&self, vertices: &[&GraphVertex]) -> bool {
        match (cam_at(vertices, 0), cam_at(vertices, 1)) {
            (Ok(cam0), Ok(cam1)) => cam0.is_fixed() != cam1.is_fixed(),
            _ => false,
        }
    }

    fn initial_estimate(&self, vertices: &[&GraphVertex]) -> GraphResult<(VertexId, Pose3)> {
        if !self.initial_estimate_possible(vertices) {
            return Err(GraphError::InitialEstimateUnavailable);
        }
        let cam0 = cam_at(vertices, 0)?;
        let cam1 = cam_at(vertices, 1)?;
        if cam0.is_fixed() {
            Ok((cam1.id(), cam0.estimate().pose.compose(&self.measurement)))
        } else {
            Ok((
                cam0.id(),
                cam1.estimate().pose.compose(&self.measurement.inverse()),
            ))
        }
    }
}

/// Distance constraint between two camera centers. Residual dimension 1:
/// `e = m − ‖t₁ − t₀‖`. Orientations do not enter the residual, so the
/// rotation columns of both Jacobian blocks are zero.
#[derive(Debug, Clone)]
pub struct EdgeSbaScale {
    vertices: [VertexId; 2],
    measurement: f64,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeSbaScale {
    pub fn new(cam0: VertexId, cam1: VertexId, measurement: f64) -> Self {
        Self {
            vertices: [cam0, cam1],
            measurement,
            information: DMatrix::identity(1, 1),
            error: DVector::zeros(1),
            jacobians: vec![DMatrix::zeros(1, 6), DMatrix::zeros(1, 6)],
        }
    }

    pub fn measurement(&self) -> f64 {
        self.measurement
    }

    pub fn set_measurement(&mut self, measurement: f64) {
        self.measurement = measurement;
    }
}

impl Edge for EdgeSbaScale {
    edge_plumbing!(1, 1);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let cam0 = cam_at(vertices, 0)?;
        let cam1 = cam_at(vertices, 1)?;
        let distance =
            (cam1.estimate().pose.translation - cam0.estimate().pose.translation).norm();
        Ok(DVector::from_vec(vec![self.measurement - distance]))
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let cam0 = cam_at(vertices, 0)?;
        let cam1 = cam_at(vertices, 1)?;
        let baseline = cam1.estimate().pose.translation - cam0.estimate().pose.translation;
        let distance = baseline.norm();
        let mut jac0 = DMatrix::zeros(1, 6);
        let mut jac1 = DMatrix::zeros(1, 6);
        if distance < 1e-12 {
            // coincident centers, direction undefined
            jac0.fill(f64::NAN);
            jac1.fill(f64::NAN);
        } else {
            let direction = baseline / distance;
            for k in 0..3 {
                jac0[(0, 3 + k)] = direction[k];
                jac1[(0, 3 + k)] = -direction[k];
            }
        }
        self.jacobians = vec![jac0, jac1];
        Ok(())
    }

    fn measurement_data(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.measurement])
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        crate::vertex::check_dim(1, data.len())?;
        self.measurement = data[0];
        Ok(())
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let cam0 = cam_at(vertices, 0)?;
        let cam1 = cam_at(vertices, 1)?;
        self.measurement =
            (cam1.estimate().pose.translation - cam0.estimate().pose.translation).norm();
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(2, vertices.len())?;
        cam_at(vertices, 0)?;
        cam_at(vertices, 1)?;
        Ok(())
    }

    fn initial_estimate_possible(&self, vertices: &[&GraphVertex]) -> bool {
        match (cam_at(vertices, 0), cam_at(vertices, 1)) {
            (Ok(cam0), Ok(cam1)) => cam0.is_fixed() != cam1.is_fixed(),
            _ => false,
        }
    }

    /// Repositions the free camera along the current center-to-center
    /// direction at distance `m` from the fixed one; the free camera keeps
    /// its orientation.
    fn initial_estimate(&self, vertices: &[&GraphVertex]) -> GraphResult<(VertexId, Pose3)> {
        if !self.initial_estimate_possible(vertices) {
            return Err(GraphError::InitialEstimateUnavailable);
        }
        let cam0 = cam_at(vertices, 0)?;
        let cam1 = cam_at(vertices, 1)?;
        let (fixed, free) = if cam0.is_fixed() {
            (cam0, cam1)
        } else {
            (cam1, cam0)
        };
        let baseline = free.estimate().pose.translation - fixed.estimate().pose.translation;
        let distance = baseline.norm();
        if distance < 1e-12 {
            return Err(GraphError::InitialEstimateUnavailable);
        }
        let translation = fixed.estimate().pose.translation + baseline * (self.measurement / distance);
        Ok((
            free.id(),
            Pose3::new(free.estimate().pose.rotation, translation),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SbaCam;
    use crate::edge::numerical_jacobian;
    use crate::vertex::VertexCam;

    fn cam_vertex(id: VertexId, omega: Vector3<f64>, t: Vector3<f64>) -> GraphVertex {
        GraphVertex::Cam(VertexCam::new(id, SbaCam::new(so3::exp(&omega), t)))
    }

    #[test]
    fn test_sba_cam_zero_residual_from_state() {
        let cam0 = cam_vertex(0, Vector3::new(0.1, -0.2, 0.3), Vector3::new(1.0, 0.0, -0.5));
        let cam1 = cam_vertex(1, Vector3::new(-0.05, 0.15, 0.1), Vector3::new(2.0, 0.3, 0.1));
        let mut edge = EdgeSbaCam::new(0, 1, Pose3::identity());
        let verts = [&cam0, &cam1];
        edge.set_measurement_from_state(&verts).unwrap();
        edge.compute_error(&verts).unwrap();
        assert!(edge.error().norm() < 1e-12);
    }

    #[test]
    fn test_sba_cam_analytic_matches_numeric() {
        let cam0 = cam_vertex(0, Vector3::new(0.1, -0.2, 0.3), Vector3::new(1.0, 0.0, -0.5));
        let cam1 = cam_vertex(1, Vector3::new(-0.05, 0.15, 0.1), Vector3::new(2.0, 0.3, 0.1));
        let measurement = Pose3::new(
            so3::exp(&Vector3::new(0.02, 0.1, -0.08)),
            Vector3::new(0.9, 0.2, 0.4),
        );
        let mut edge = EdgeSbaCam::new(0, 1, measurement);
        let verts = [&cam0, &cam1];
        edge.linearize_oplus(&verts).unwrap();
        let numeric = numerical_jacobian(&edge, &verts).unwrap();
        for (analytic, numeric) in edge.jacobians().iter().zip(&numeric) {
            let scale = numeric.norm().max(1.0);
            assert!(
                (analytic - numeric).norm() / scale < 1e-4,
                "blocks differ:\n{}\nvs\n{}",
                analytic,
                numeric
            );
        }
    }

    #[test]
    fn test_sba_cam_measurement_data_roundtrip() {
        let measurement = Pose3::new(
            so3::exp(&Vector3::new(0.3, 0.0, -0.1)),
            Vector3::new(1.0, 2.0, 3.0),
        );
        let mut edge = EdgeSbaCam::new(0, 1, measurement);
        let data = edge.measurement_data();
        assert_eq!(data.len(), 7);
        edge.set_measurement_data(data.as_slice()).unwrap();
        assert!((edge.measurement_data() - data).norm() < 1e-14);
    }

    #[test]
    fn test_sba_cam_initial_estimate_requires_one_fixed() {
        let mut cam0 = cam_vertex(0, Vector3::zeros(), Vector3::zeros());
        let cam1 = cam_vertex(1, Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
        let edge = EdgeSbaCam::new(0, 1, Pose3::identity());

        assert!(!edge.initial_estimate_possible(&[&cam0, &cam1]));
        assert_eq!(
            edge.initial_estimate(&[&cam0, &cam1]),
            Err(GraphError::InitialEstimateUnavailable)
        );

        cam0.set_fixed(true);
        assert!(edge.initial_estimate_possible(&[&cam0, &cam1]));
    }

    #[test]
    fn test_sba_cam_initial_estimate_reproduces_measurement() {
        let mut cam0 = cam_vertex(0, Vector3::new(0.2, -0.1, 0.05), Vector3::new(0.5, 1.0, 0.0));
        cam0.set_fixed(true);
        let cam1 = cam_vertex(1, Vector3::zeros(), Vector3::zeros());
        let measurement = Pose3::new(
            so3::exp(&Vector3::new(-0.1, 0.3, 0.0)),
            Vector3::new(1.0, 0.0, 0.2),
        );
        let mut edge = EdgeSbaCam::new(0, 1, measurement);

        let (id, pose) = edge.initial_estimate(&[&cam0, &cam1]).unwrap();
        assert_eq!(id, 1);

        // applying the bootstrap pose makes the residual vanish
        let mut bootstrapped = VertexCam::new(1, SbaCam::default());
        bootstrapped.set_pose(pose);
        let cam1_updated = GraphVertex::Cam(bootstrapped);
        edge.compute_error(&[&cam0, &cam1_updated]).unwrap();
        assert!(edge.error().norm() < 1e-12);
    }

    #[test]
    fn test_sba_scale_residual() {
        let cam0 = cam_vertex(0, Vector3::zeros(), Vector3::zeros());
        let cam1 = cam_vertex(1, Vector3::zeros(), Vector3::new(3.0, 0.0, 4.0));
        let mut edge = EdgeSbaScale::new(0, 1, 5.0);
        edge.compute_error(&[&cam0, &cam1]).unwrap();
        assert!(edge.error()[0].abs() < 1e-12);

        edge.set_measurement(6.0);
        edge.compute_error(&[&cam0, &cam1]).unwrap();
        assert!((edge.error()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sba_scale_zero_residual_from_state() {
        let cam0 = cam_vertex(0, Vector3::new(0.1, 0.0, 0.0), Vector3::new(0.2, -0.1, 0.3));
        let cam1 = cam_vertex(1, Vector3::zeros(), Vector3::new(1.5, 0.7, -0.2));
        let mut edge = EdgeSbaScale::new(0, 1, 0.0);
        let verts = [&cam0, &cam1];
        edge.set_measurement_from_state(&verts).unwrap();
        edge.compute_error(&verts).unwrap();
        assert!(edge.error()[0].abs() < 1e-15);
    }

    #[test]
    fn test_sba_scale_analytic_matches_numeric() {
        let cam0 = cam_vertex(0, Vector3::new(0.1, 0.0, 0.0), Vector3::new(0.2, -0.1, 0.3));
        let cam1 = cam_vertex(1, Vector3::zeros(), Vector3::new(1.5, 0.7, -0.2));
        let mut edge = EdgeSbaScale::new(0, 1, 2.0);
        let verts = [&cam0, &cam1];
        edge.linearize_oplus(&verts).unwrap();
        let numeric = numerical_jacobian(&edge, &verts).unwrap();
        for (analytic, numeric) in edge.jacobians().iter().zip(&numeric) {
            assert!((analytic - numeric).norm() < 1e-5);
        }
    }

    #[test]
    fn test_sba_scale_initial_estimate_rescales_baseline() {
        let mut cam0 = cam_vertex(0, Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
        cam0.set_fixed(true);
        let cam1 = cam_vertex(1, Vector3::zeros(), Vector3::new(3.0, 0.0, 0.0));
        let edge = EdgeSbaScale::new(0, 1, 4.0);
        let (id, pose) = edge.initial_estimate(&[&cam0, &cam1]).unwrap();
        assert_eq!(id, 1);
        assert!((pose.translation - Vector3::new(5.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
