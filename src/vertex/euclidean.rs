//! Euclidean-parameter vertices: landmarks, scalars and shared intrinsics.
//!
//! All types here update additively; the full and minimal representations
//! coincide except for [`VertexIntrinsics`], where the stereo baseline is
//! part of the state but never perturbed.

use nalgebra::{DVector, Vector3, Vector5};

use crate::error::GraphResult;
use crate::vertex::{check_dim, Vertex, VertexId};

macro_rules! point_vertex {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            id: VertexId,
            fixed: bool,
            estimate: Vector3<f64>,
        }

        impl $name {
            pub fn new(id: VertexId, estimate: Vector3<f64>) -> Self {
                Self {
                    id,
                    fixed: false,
                    estimate,
                }
            }

            pub fn estimate(&self) -> &Vector3<f64> {
                &self.estimate
            }

            pub fn set_estimate(&mut self, estimate: Vector3<f64>) {
                self.estimate = estimate;
            }
        }

        impl Vertex for $name {
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
                3
            }

            fn minimal_dimension(&self) -> usize {
                3
            }

            fn set_to_origin(&mut self) {
                self.estimate = Vector3::zeros();
            }

            fn oplus(&mut self, delta: &[f64]) -> GraphResult<()> {
                check_dim(3, delta.len())?;
                self.estimate += Vector3::new(delta[0], delta[1], delta[2]);
                Ok(())
            }

            fn estimate_data(&self) -> DVector<f64> {
                DVector::from_column_slice(self.estimate.as_slice())
            }

            fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
                check_dim(3, data.len())?;
                self.estimate = Vector3::new(data[0], data[1], data[2]);
                Ok(())
            }

            fn minimal_estimate_data(&self) -> DVector<f64> {
                self.estimate_data()
            }

            fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
                self.set_estimate_data(data)
            }
        }
    };
}

point_vertex!(
    /// 3D landmark observed by [`VertexCam`](crate::vertex::VertexCam)
    /// cameras.
    VertexSbaPointXyz
);

point_vertex!(
    /// 3D landmark observed by
    /// [`VertexCustomCam`](crate::vertex::VertexCustomCam) cameras.
    VertexCustomXyz
);

macro_rules! scalar_vertex {
    ($(#[$doc:meta])* $name:ident, origin = $origin:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            id: VertexId,
            fixed: bool,
            estimate: f64,
        }

        impl $name {
            pub fn new(id: VertexId, estimate: f64) -> Self {
                Self {
                    id,
                    fixed: false,
                    estimate,
                }
            }

            pub fn estimate(&self) -> f64 {
                self.estimate
            }

            pub fn set_estimate(&mut self, estimate: f64) {
                self.estimate = estimate;
            }
        }

        impl Vertex for $name {
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
                1
            }

            fn minimal_dimension(&self) -> usize {
                1
            }

            fn set_to_origin(&mut self) {
                self.estimate = $origin;
            }

            fn oplus(&mut self, delta: &[f64]) -> GraphResult<()> {
                check_dim(1, delta.len())?;
                self.estimate += delta[0];
                Ok(())
            }

            fn estimate_data(&self) -> DVector<f64> {
                DVector::from_vec(vec![self.estimate])
            }

            fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
                check_dim(1, data.len())?;
                self.estimate = data[0];
                Ok(())
            }

            fn minimal_estimate_data(&self) -> DVector<f64> {
                self.estimate_data()
            }

            fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
                self.set_estimate_data(data)
            }
        }
    };
}

scalar_vertex!(
    /// Per-keyframe depth-map scale factor. Origin is the neutral scale 1.
    VertexScale,
    origin = 1.0
);

scalar_vertex!(
    /// Free scalar with origin 0, used for canonical (normalized) quantities.
    VertexCanonical,
    origin = 0.0
);

/// Shared pinhole intrinsics `(fx, fy, cx, cy, baseline)`.
///
/// Full dimension 5, minimal dimension 4: tangent updates perturb the first
/// four components, the baseline stays calibration.
#[derive(Debug, Clone)]
pub struct VertexIntrinsics {
    id: VertexId,
    fixed: bool,
    estimate: Vector5<f64>,
}

impl VertexIntrinsics {
    pub fn new(id: VertexId, estimate: Vector5<f64>) -> Self {
        Self {
            id,
            fixed: false,
            estimate,
        }
    }

    /// Vertex at the default intrinsics
    /// `(fx, fy, cx, cy, b) = (1, 1, 0.5, 0.5, 0.1)`.
    pub fn default_with_id(id: VertexId) -> Self {
        Self::new(id, Vector5::new(1.0, 1.0, 0.5, 0.5, 0.1))
    }

    pub fn estimate(&self) -> &Vector5<f64> {
        &self.estimate
    }

    pub fn set_estimate(&mut self, estimate: Vector5<f64>) {
        self.estimate = estimate;
    }

    pub fn fx(&self) -> f64 {
        self.estimate[0]
    }

    pub fn fy(&self) -> f64 {
        self.estimate[1]
    }

    pub fn cx(&self) -> f64 {
        self.estimate[2]
    }

    pub fn cy(&self) -> f64 {
        self.estimate[3]
    }

    pub fn baseline(&self) -> f64 {
        self.estimate[4]
    }
}

impl Vertex for VertexIntrinsics {
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
        5
    }

    fn minimal_dimension(&self) -> usize {
        4
    }

    fn set_to_origin(&mut self) {
        self.estimate = Vector5::new(1.0, 1.0, 0.5, 0.5, 0.1);
    }

    fn oplus(&mut self, delta: &[f64]) -> GraphResult<()> {
        check_dim(4, delta.len())?;
        for k in 0..4 {
            self.estimate[k] += delta[k];
        }
        Ok(())
    }

    fn estimate_data(&self) -> DVector<f64> {
        DVector::from_column_slice(self.estimate.as_slice())
    }

    fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        check_dim(5, data.len())?;
        self.estimate = Vector5::from_column_slice(data);
        Ok(())
    }

    fn minimal_estimate_data(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.estimate.as_slice()[..4])
    }

    fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        check_dim(4, data.len())?;
        for k in 0..4 {
            self.estimate[k] = data[k];
        }
        Ok(())
    }
}
