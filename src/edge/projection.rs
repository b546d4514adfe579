//! Reprojection edges: world landmark observed in one camera image.
//!
//! All residuals are `predicted − measured` in pixel coordinates. The point
//! occupies slot 0 and the camera slot 1; the intrinsics variant appends the
//! shared-intrinsics vertex as slot 2.
//!
//! When the landmark sits at or behind the optical center the predicted
//! projection is undefined; residual and Jacobian caches are filled with NaN
//! instead of returning an error.

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, UnitQuaternion, Vector2, Vector3};

use crate::camera::{point_pose_jacobian, projection_jacobian};
use crate::edge::{
    cam_at, check_arity, custom_cam_at, custom_point_at, edge_plumbing, intrinsics_at, point_at,
    Edge,
};
use crate::error::GraphResult;
use crate::vertex::{GraphVertex, VertexId};

fn nan_vector(dim: usize) -> DVector<f64> {
    DVector::from_element(dim, f64::NAN)
}

fn nan_jacobians(dim: usize, widths: &[usize]) -> Vec<DMatrix<f64>> {
    widths
        .iter()
        .map(|&w| DMatrix::from_element(dim, w, f64::NAN))
        .collect()
}

/// Chain-rule blocks for a monocular reprojection term:
/// `(∂e/∂p_world, ∂e/∂[δω, δt])`.
fn mono_jacobians(
    p_cam: &Vector3<f64>,
    rotation: &UnitQuaternion<f64>,
    fx: f64,
    fy: f64,
) -> (SMatrix<f64, 2, 3>, SMatrix<f64, 2, 6>) {
    let proj = projection_jacobian(p_cam, fx, fy);
    let r_transpose: Matrix3<f64> = rotation.inverse().to_rotation_matrix().into_inner();
    (proj * r_transpose, proj * point_pose_jacobian(p_cam, rotation))
}

/// Monocular reprojection of a [`VertexSbaPointXyz`](crate::vertex::VertexSbaPointXyz)
/// into a [`VertexCam`](crate::vertex::VertexCam). Residual dimension 2.
#[derive(Debug, Clone)]
pub struct EdgeProjectP2MC {
    vertices: [VertexId; 2],
    measurement: Vector2<f64>,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeProjectP2MC {
    pub fn new(point: VertexId, cam: VertexId, measurement: Vector2<f64>) -> Self {
        Self {
            vertices: [point, cam],
            measurement,
            information: DMatrix::identity(2, 2),
            error: DVector::zeros(2),
            jacobians: vec![DMatrix::zeros(2, 3), DMatrix::zeros(2, 6)],
        }
    }

    pub fn measurement(&self) -> &Vector2<f64> {
        &self.measurement
    }
}

impl Edge for EdgeProjectP2MC {
    edge_plumbing!(2, 2);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        Ok(match cam.estimate().project(point.estimate()) {
            Some(uv) => DVector::from_column_slice((uv - self.measurement).as_slice()),
            None => nan_vector(2),
        })
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        let camera = cam.estimate();
        let p_cam = camera.to_camera_frame(point.estimate());
        if p_cam.z < crate::camera::MIN_DEPTH {
            self.jacobians = nan_jacobians(2, &[3, 6]);
            return Ok(());
        }
        let (point_block, cam_block) =
            mono_jacobians(&p_cam, &camera.pose.rotation, camera.fx, camera.fy);
        self.jacobians = vec![
            DMatrix::from_iterator(2, 3, point_block.iter().copied()),
            DMatrix::from_iterator(2, 6, cam_block.iter().copied()),
        ];
        Ok(())
    }

    fn measurement_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.measurement.as_slice())
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        crate::vertex::check_dim(2, data.len())?;
        self.measurement = Vector2::new(data[0], data[1]);
        Ok(())
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        self.measurement = cam
            .estimate()
            .project(point.estimate())
            .unwrap_or_else(|| Vector2::from_element(f64::NAN));
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(2, vertices.len())?;
        point_at(vertices, 0)?;
        cam_at(vertices, 1)?;
        Ok(())
    }
}

/// Monocular reprojection with the reduced (baseline-free) camera model:
/// a [`VertexCustomXyz`](crate::vertex::VertexCustomXyz) observed by a
/// [`VertexCustomCam`](crate::vertex::VertexCustomCam). Residual dimension 2.
#[derive(Debug, Clone)]
pub struct EdgeCustomCamera {
    vertices: [VertexId; 2],
    measurement: Vector2<f64>,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeCustomCamera {
    pub fn new(point: VertexId, cam: VertexId, measurement: Vector2<f64>) -> Self {
        Self {
            vertices: [point, cam],
            measurement,
            information: DMatrix::identity(2, 2),
            error: DVector::zeros(2),
            jacobians: vec![DMatrix::zeros(2, 3), DMatrix::zeros(2, 6)],
        }
    }

    pub fn measurement(&self) -> &Vector2<f64> {
        &self.measurement
    }
}

impl Edge for EdgeCustomCamera {
    edge_plumbing!(2, 2);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let point = custom_point_at(vertices, 0)?;
        let cam = custom_cam_at(vertices, 1)?;
        Ok(match cam.estimate().project(point.estimate()) {
            Some(uv) => DVector::from_column_slice((uv - self.measurement).as_slice()),
            None => nan_vector(2),
        })
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = custom_point_at(vertices, 0)?;
        let cam = custom_cam_at(vertices, 1)?;
        let camera = cam.estimate();
        let p_cam = camera.to_camera_frame(point.estimate());
        if p_cam.z < crate::camera::MIN_DEPTH {
            self.jacobians = nan_jacobians(2, &[3, 6]);
            return Ok(());
        }
        let (point_block, cam_block) =
            mono_jacobians(&p_cam, &camera.pose.rotation, camera.fx, camera.fy);
        self.jacobians = vec![
            DMatrix::from_iterator(2, 3, point_block.iter().copied()),
            DMatrix::from_iterator(2, 6, cam_block.iter().copied()),
        ];
        Ok(())
    }

    fn measurement_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.measurement.as_slice())
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        crate::vertex::check_dim(2, data.len())?;
        self.measurement = Vector2::new(data[0], data[1]);
        Ok(())
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = custom_point_at(vertices, 0)?;
        let cam = custom_cam_at(vertices, 1)?;
        self.measurement = cam
            .estimate()
            .project(point.estimate())
            .unwrap_or_else(|| Vector2::from_element(f64::NAN));
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(2, vertices.len())?;
        custom_point_at(vertices, 0)?;
        custom_cam_at(vertices, 1)?;
        Ok(())
    }
}

/// Stereo reprojection `(u, v, u_right)` of a point into a stereo camera.
/// Residual dimension 3.
#[derive(Debug, Clone)]
pub struct EdgeProjectP2SC {
    vertices: [VertexId; 2],
    measurement: Vector3<f64>,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeProjectP2SC {
    pub fn new(point: VertexId, cam: VertexId, measurement: Vector3<f64>) -> Self {
        Self {
            vertices: [point, cam],
            measurement,
            information: DMatrix::identity(3, 3),
            error: DVector::zeros(3),
            jacobians: vec![DMatrix::zeros(3, 3), DMatrix::zeros(3, 6)],
        }
    }

    pub fn measurement(&self) -> &Vector3<f64> {
        &self.measurement
    }

    /// Stereo projection Jacobian with respect to the camera-frame point.
    /// Third row differentiates `u_right = u − fx·b/z`.
    fn stereo_projection_jacobian(
        p_cam: &Vector3<f64>,
        fx: f64,
        fy: f64,
        baseline: f64,
    ) -> SMatrix<f64, 3, 3> {
        let inv_z = 1.0 / p_cam.z;
        let inv_z_sq = inv_z * inv_z;
        SMatrix::<f64, 3, 3>::new(
            fx * inv_z,
            0.0,
            -fx * p_cam.x * inv_z_sq,
            0.0,
            fy * inv_z,
            -fy * p_cam.y * inv_z_sq,
            fx * inv_z,
            0.0,
            fx * (baseline - p_cam.x) * inv_z_sq,
        )
    }
}

impl Edge for EdgeProjectP2SC {
    edge_plumbing!(3, 3);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        Ok(match cam.estimate().project_stereo(point.estimate()) {
            Some(uvr) => DVector::from_column_slice((uvr - self.measurement).as_slice()),
            None => nan_vector(3),
        })
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        let camera = cam.estimate();
        let p_cam = camera.to_camera_frame(point.estimate());
        if p_cam.z < crate::camera::MIN_DEPTH {
            self.jacobians = nan_jacobians(3, &[3, 6]);
            return Ok(());
        }
        let proj =
            Self::stereo_projection_jacobian(&p_cam, camera.fx, camera.fy, camera.baseline);
        let r_transpose: Matrix3<f64> =
            camera.pose.rotation.inverse().to_rotation_matrix().into_inner();
        let point_block = proj * r_transpose;
        let cam_block = proj * point_pose_jacobian(&p_cam, &camera.pose.rotation);
        self.jacobians = vec![
            DMatrix::from_iterator(3, 3, point_block.iter().copied()),
            DMatrix::from_iterator(3, 6, cam_block.iter().copied()),
        ];
        Ok(())
    }

    fn measurement_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.measurement.as_slice())
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        crate::vertex::check_dim(3, data.len())?;
        self.measurement = Vector3::new(data[0], data[1], data[2]);
        Ok(())
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        self.measurement = cam
            .estimate()
            .project_stereo(point.estimate())
            .unwrap_or_else(|| Vector3::from_element(f64::NAN));
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(2, vertices.len())?;
        point_at(vertices, 0)?;
        cam_at(vertices, 1)?;
        Ok(())
    }
}

/// Monocular reprojection with intrinsics estimated by a shared
/// [`VertexIntrinsics`](crate::vertex::VertexIntrinsics) vertex. Residual
/// dimension 2, arity 3 (point, camera, intrinsics); the camera's own
/// calibration fields are ignored.
#[derive(Debug, Clone)]
pub struct EdgeProjectP2MCIntrinsics {
    vertices: [VertexId; 3],
    measurement: Vector2<f64>,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeProjectP2MCIntrinsics {
    pub fn new(
        point: VertexId,
        cam: VertexId,
        intrinsics: VertexId,
        measurement: Vector2<f64>,
    ) -> Self {
        Self {
            vertices: [point, cam, intrinsics],
            measurement,
            information: DMatrix::identity(2, 2),
            error: DVector::zeros(2),
            jacobians: vec![
                DMatrix::zeros(2, 3),
                DMatrix::zeros(2, 6),
                DMatrix::zeros(2, 4),
            ],
        }
    }

    pub fn measurement(&self) -> &Vector2<f64> {
        &self.measurement
    }

    fn project(
        p_cam: &Vector3<f64>,
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
    ) -> Option<Vector2<f64>> {
        if p_cam.z < crate::camera::MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / p_cam.z;
        Some(Vector2::new(
            fx * p_cam.x * inv_z + cx,
            fy * p_cam.y * inv_z + cy,
        ))
    }
}

impl Edge for EdgeProjectP2MCIntrinsics {
    edge_plumbing!(2, 2);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        let intrinsics = intrinsics_at(vertices, 2)?;
        let p_cam = cam.estimate().to_camera_frame(point.estimate());
        Ok(
            match Self::project(
                &p_cam,
                intrinsics.fx(),
                intrinsics.fy(),
                intrinsics.cx(),
                intrinsics.cy(),
            ) {
                Some(uv) => DVector::from_column_slice((uv - self.measurement).as_slice()),
                None => nan_vector(2),
            },
        )
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        let intrinsics = intrinsics_at(vertices, 2)?;
        let camera = cam.estimate();
        let p_cam = camera.to_camera_frame(point.estimate());
        if p_cam.z < crate::camera::MIN_DEPTH {
            self.jacobians = nan_jacobians(2, &[3, 6, 4]);
            return Ok(());
        }
        let (point_block, cam_block) = mono_jacobians(
            &p_cam,
            &camera.pose.rotation,
            intrinsics.fx(),
            intrinsics.fy(),
        );
        // ∂(u,v)/∂(fx,fy,cx,cy) at fixed p_cam
        let inv_z = 1.0 / p_cam.z;
        let intrinsics_block = SMatrix::<f64, 2, 4>::new(
            p_cam.x * inv_z,
            0.0,
            1.0,
            0.0,
            0.0,
            p_cam.y * inv_z,
            0.0,
            1.0,
        );
        self.jacobians = vec![
            DMatrix::from_iterator(2, 3, point_block.iter().copied()),
            DMatrix::from_iterator(2, 6, cam_block.iter().copied()),
            DMatrix::from_iterator(2, 4, intrinsics_block.iter().copied()),
        ];
        Ok(())
    }

    fn measurement_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.measurement.as_slice())
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        crate::vertex::check_dim(2, data.len())?;
        self.measurement = Vector2::new(data[0], data[1]);
        Ok(())
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let point = point_at(vertices, 0)?;
        let cam = cam_at(vertices, 1)?;
        let intrinsics = intrinsics_at(vertices, 2)?;
        let p_cam = cam.estimate().to_camera_frame(point.estimate());
        self.measurement = Self::project(
            &p_cam,
            intrinsics.fx(),
            intrinsics.fy(),
            intrinsics.cx(),
            intrinsics.cy(),
        )
        .unwrap_or_else(|| Vector2::from_element(f64::NAN));
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(3, vertices.len())?;
        point_at(vertices, 0)?;
        cam_at(vertices, 1)?;
        intrinsics_at(vertices, 2)?;
        Ok(())
    }
}
