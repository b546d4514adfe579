//! Camera-manifold payloads held by camera vertices.
//!
//! Two pinhole models are provided:
//!
//! - [`SbaCam`]: full model with separate focal lengths, principal point and
//!   a stereo baseline. Supports monocular and stereo projection.
//! - [`CustomCam`]: reduced monocular variant, same pinhole intrinsics but no
//!   stereo baseline.
//!
//! Both carry a [`Pose3`] camera-to-world transform; world points are mapped
//! into the camera frame with `p_cam = Rᵀ·(p_world − t)` before projection.
//! Projection returns `None` when the camera-frame depth falls below
//! [`MIN_DEPTH`]; callers translate that into non-finite residuals rather
//! than failures so the driver's robustification can react.

use nalgebra::{Matrix3, SMatrix, UnitQuaternion, Vector2, Vector3};

use crate::manifold::{se3::Pose3, so3};

/// Minimum camera-frame depth accepted by the projection functions.
pub const MIN_DEPTH: f64 = 1e-6;

/// Jacobian of the normalized pinhole projection with respect to the
/// camera-frame point, for focal lengths `fx`, `fy`:
///
/// ```text
/// u = fx·x/z + cx  =>  ∂u/∂(x,y,z) = [fx/z, 0, −fx·x/z²]
/// v = fy·y/z + cy  =>  ∂v/∂(x,y,z) = [0, fy/z, −fy·y/z²]
/// ```
pub fn projection_jacobian(p_cam: &Vector3<f64>, fx: f64, fy: f64) -> SMatrix<f64, 2, 3> {
    let inv_z = 1.0 / p_cam.z;
    let inv_z_sq = inv_z * inv_z;
    SMatrix::<f64, 2, 3>::new(
        fx * inv_z,
        0.0,
        -fx * p_cam.x * inv_z_sq,
        0.0,
        fy * inv_z,
        -fy * p_cam.y * inv_z_sq,
    )
}

/// Jacobian of the camera-frame point with respect to the camera tangent
/// update `[ω, t]` (rotation first).
///
/// With `p_cam = Rᵀ(p − t)` and the update `R ← R·exp(ω)`, `t ← t + δt`:
///
/// ```text
/// ∂p_cam/∂ω  = [p_cam]×
/// ∂p_cam/∂δt = −Rᵀ
/// ```
pub fn point_pose_jacobian(p_cam: &Vector3<f64>, rotation: &UnitQuaternion<f64>) -> SMatrix<f64, 3, 6> {
    let r_transpose: Matrix3<f64> = rotation.inverse().to_rotation_matrix().into_inner();
    let p_cam_skew = so3::hat(p_cam);
    let mut jac = SMatrix::<f64, 3, 6>::zeros();
    jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&p_cam_skew);
    jac.fixed_view_mut::<3, 3>(0, 3).copy_from(&(-r_transpose));
    jac
}

/// Full SBA camera: pose, per-axis focal lengths, principal point and
/// stereo baseline.
///
/// The packed full representation has 11 scalars,
/// `[qx,qy,qz,qw, tx,ty,tz, fx,fy,cx,cy]`; the baseline is calibration set
/// through [`SbaCam::set_kcam`] and excluded from the flat data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SbaCam {
    pub pose: Pose3,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub baseline: f64,
}

impl SbaCam {
    /// Create a camera from orientation and position with default
    /// calibration (`fx = fy = 1`, `cx = cy = 0.5`, `baseline = 0.1`).
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            pose: Pose3::new(rotation, translation),
            ..Self::default()
        }
    }

    /// Set the calibration parameters.
    pub fn set_kcam(&mut self, fx: f64, fy: f64, cx: f64, cy: f64, baseline: f64) {
        self.fx = fx;
        self.fy = fy;
        self.cx = cx;
        self.cy = cy;
        self.baseline = baseline;
    }

    /// Map a world point into the camera frame.
    pub fn to_camera_frame(&self, p_world: &Vector3<f64>) -> Vector3<f64> {
        self.pose.inverse_transform(p_world)
    }

    /// Project a world point to left-image pixel coordinates.
    ///
    /// Returns `None` when the camera-frame depth is below [`MIN_DEPTH`].
    pub fn project(&self, p_world: &Vector3<f64>) -> Option<Vector2<f64>> {
        let p_cam = self.to_camera_frame(p_world);
        self.project_camera_point(&p_cam)
    }

    /// Project an already camera-frame point.
    pub fn project_camera_point(&self, p_cam: &Vector3<f64>) -> Option<Vector2<f64>> {
        if p_cam.z < MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / p_cam.z;
        Some(Vector2::new(
            self.fx * p_cam.x * inv_z + self.cx,
            self.fy * p_cam.y * inv_z + self.cy,
        ))
    }

    /// Stereo projection `(u, v, u_right)` with
    /// `u_right = u − fx·baseline/z`.
    pub fn project_stereo(&self, p_world: &Vector3<f64>) -> Option<Vector3<f64>> {
        let p_cam = self.to_camera_frame(p_world);
        if p_cam.z < MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / p_cam.z;
        let u = self.fx * p_cam.x * inv_z + self.cx;
        let v = self.fy * p_cam.y * inv_z + self.cy;
        Some(Vector3::new(u, v, u - self.fx * self.baseline * inv_z))
    }
}

impl Default for SbaCam {
    fn default() -> Self {
        Self {
            pose: Pose3::identity(),
            fx: 1.0,
            fy: 1.0,
            cx: 0.5,
            cy: 0.5,
            baseline: 0.1,
        }
    }
}

/// Reduced monocular camera: pose plus pinhole intrinsics without a stereo
/// baseline.
///
/// The packed full representation has 11 scalars,
/// `[qx,qy,qz,qw, tx,ty,tz, fx,fy,cx,cy]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomCam {
    pub pose: Pose3,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CustomCam {
    /// Create a camera from orientation and position with default
    /// calibration (`fx = fy = 1`, `cx = cy = 0.5`).
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            pose: Pose3::new(rotation, translation),
            ..Self::default()
        }
    }

    /// Set the calibration parameters.
    pub fn set_cam(&mut self, fx: f64, fy: f64, cx: f64, cy: f64) {
        self.fx = fx;
        self.fy = fy;
        self.cx = cx;
        self.cy = cy;
    }

    /// Map a world point into the camera frame.
    pub fn to_camera_frame(&self, p_world: &Vector3<f64>) -> Vector3<f64> {
        self.pose.inverse_transform(p_world)
    }

    /// Project a world point to pixel coordinates.
    pub fn project(&self, p_world: &Vector3<f64>) -> Option<Vector2<f64>> {
        let p_cam = self.to_camera_frame(p_world);
        if p_cam.z < MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / p_cam.z;
        Some(Vector2::new(
            self.fx * p_cam.x * inv_z + self.cx,
            self.fy * p_cam.y * inv_z + self.cy,
        ))
    }
}

impl Default for CustomCam {
    fn default() -> Self {
        Self {
            pose: Pose3::identity(),
            fx: 1.0,
            fy: 1.0,
            cx: 0.5,
            cy: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cam() -> SbaCam {
        let mut cam = SbaCam::new(UnitQuaternion::identity(), Vector3::zeros());
        cam.set_kcam(500.0, 500.0, 320.0, 240.0, 0.08);
        cam
    }

    #[test]
    fn test_project_optical_axis() {
        let cam = test_cam();
        let uv = cam.project(&Vector3::new(0.0, 0.0, 2.0)).unwrap();
        assert!((uv.x - 320.0).abs() < 1e-12);
        assert!((uv.y - 240.0).abs() < 1e-12);
    }

    #[test]
    fn test_project_known_point() {
        let cam = test_cam();
        let uv = cam.project(&Vector3::new(1.0, 2.0, 5.0)).unwrap();
        assert!((uv.x - (500.0 * 0.2 + 320.0)).abs() < 1e-12);
        assert!((uv.y - (500.0 * 0.4 + 240.0)).abs() < 1e-12);
    }

    #[test]
    fn test_project_behind_camera() {
        let cam = test_cam();
        assert!(cam.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
        assert!(cam.project_stereo(&Vector3::new(0.1, 0.1, 0.0)).is_none());
    }

    #[test]
    fn test_stereo_disparity_positive() {
        let cam = test_cam();
        let uvr = cam.project_stereo(&Vector3::new(0.5, -0.2, 4.0)).unwrap();
        // right u is shifted left by fx·b/z
        assert!((uvr.x - uvr.z - 500.0 * 0.08 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_with_pose() {
        // camera moved 1m along +x, looking down +z
        let mut cam = test_cam();
        cam.pose.translation = Vector3::new(1.0, 0.0, 0.0);
        let uv = cam.project(&Vector3::new(1.0, 0.0, 3.0)).unwrap();
        assert!((uv.x - 320.0).abs() < 1e-12);
    }

    #[test]
    fn test_projection_jacobian_central_difference() {
        let cam = test_cam();
        let p_cam = Vector3::new(0.4, -0.3, 2.5);
        let jac = projection_jacobian(&p_cam, cam.fx, cam.fy);
        let h = 1e-6;
        for k in 0..3 {
            let mut dp = Vector3::zeros();
            dp[k] = h;
            let plus = cam.project_camera_point(&(p_cam + dp)).unwrap();
            let minus = cam.project_camera_point(&(p_cam - dp)).unwrap();
            let numeric = (plus - minus) / (2.0 * h);
            assert!((jac.column(k) - numeric).norm() < 1e-5);
        }
    }

    #[test]
    fn test_custom_cam_projection() {
        let mut cam = CustomCam::new(UnitQuaternion::identity(), Vector3::zeros());
        cam.set_cam(450.0, 460.0, 320.0, 240.0);
        let uv = cam.project(&Vector3::new(1.0, 1.0, 2.0)).unwrap();
        assert!((uv.x - (450.0 * 0.5 + 320.0)).abs() < 1e-12);
        assert!((uv.y - (460.0 * 0.5 + 240.0)).abs() < 1e-12);
    }
}
