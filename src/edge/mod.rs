//! Measurement edges.
//!
//! An edge connects an ordered list of vertices, stores a measurement and an
//! information matrix, and caches a residual vector plus one Jacobian block
//! per connected vertex. Residual and Jacobians are pure functions of vertex
//! state and measurement; [`Edge::compute_error`] and
//! [`Edge::linearize_oplus`] only refresh the caches.
//!
//! Invalid geometry (a landmark at or behind a camera's optical center) is
//! not an error: the residual is filled with NaN so a robustified driver can
//! reject the term. Errors are reserved for structural misuse, wrong vertex
//! kinds, wrong arity, wrong data lengths.

use nalgebra::{DMatrix, DVector};

use crate::error::{GraphError, GraphResult};
use crate::manifold::se3::Pose3;
use crate::vertex::{
    GraphVertex, Vertex, VertexCam, VertexCustomCam, VertexCustomXyz, VertexId, VertexIntrinsics,
    VertexSbaPointXyz, VertexScale,
};

pub mod pose;
pub mod projection;
pub mod scale;

pub use pose::{EdgeSbaCam, EdgeSbaScale};
pub use projection::{
    EdgeCustomCamera, EdgeProjectP2MC, EdgeProjectP2MCIntrinsics, EdgeProjectP2SC,
};
pub use scale::{EdgeDepthConsistencyScale, EdgeScaleNetworkConsistency};

/// Step size for central-difference numeric differentiation.
pub const NUMERIC_JACOBIAN_STEP: f64 = 1e-6;

/// Contract shared by all edge types.
///
/// `vertices` slices passed to the evaluation methods hold the connected
/// vertices in the order of [`Edge::vertex_ids`]; the graph resolves ids to
/// references before dispatching.
pub trait Edge {
    /// Connected vertex ids, in residual/Jacobian slot order.
    fn vertex_ids(&self) -> &[VertexId];

    /// Residual dimension, fixed per edge type.
    fn dimension(&self) -> usize;

    /// Measurement flat-data length, fixed per edge type.
    fn measurement_dimension(&self) -> usize;

    /// Information matrix (inverse measurement covariance),
    /// `dimension × dimension`.
    fn information(&self) -> &DMatrix<f64>;

    /// Replace the information matrix; rejects wrong shapes.
    fn set_information(&mut self, information: DMatrix<f64>) -> GraphResult<()>;

    /// Cached residual from the last [`Edge::compute_error`].
    fn error(&self) -> &DVector<f64>;

    /// Overwrite the residual cache.
    fn store_error(&mut self, error: DVector<f64>);

    /// Cached Jacobian blocks from the last [`Edge::linearize_oplus`], one
    /// per connected vertex, each `dimension × minimal_dimension` of that
    /// vertex.
    fn jacobians(&self) -> &[DMatrix<f64>];

    /// Overwrite the Jacobian cache.
    fn store_jacobians(&mut self, jacobians: Vec<DMatrix<f64>>);

    /// Evaluate the residual at the given vertex states without touching the
    /// caches.
    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>>;

    /// Refresh the residual cache.
    fn compute_error(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        let error = self.residual(vertices)?;
        self.store_error(error);
        Ok(())
    }

    /// Refresh the Jacobian cache with analytic blocks.
    ///
    /// Types without an analytic linearization return
    /// [`GraphError::MissingAnalyticJacobian`]; callers fall back to
    /// [`numerical_jacobian`].
    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()>;

    /// Measurement as a flat array.
    fn measurement_data(&self) -> DVector<f64>;

    /// Overwrite the measurement from a flat array; rejects wrong lengths.
    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()>;

    /// Set the measurement to the value predicted by the current vertex
    /// states, making the residual exactly zero there.
    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()>;

    /// Validate arity and vertex kinds at graph insertion time.
    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()>;

    /// Weighted squared residual `eᵀ·Ω·e` of the cached error.
    fn chi2(&self) -> f64 {
        let error = self.error();
        (self.information() * error).dot(error)
    }

    /// Whether [`Edge::initial_estimate`] can bootstrap a connected vertex
    /// from this edge's measurement. Defaults to `false`; pose edges return
    /// `true` iff exactly one endpoint is fixed.
    fn initial_estimate_possible(&self, _vertices: &[&GraphVertex]) -> bool {
        false
    }

    /// Bootstrap the free endpoint from the fixed one and the measurement.
    /// Returns the id of the vertex to update and its new pose.
    fn initial_estimate(&self, _vertices: &[&GraphVertex]) -> GraphResult<(VertexId, Pose3)> {
        Err(GraphError::InitialEstimateUnavailable)
    }
}

/// Central-difference Jacobian blocks over the connected vertices' tangent
/// spaces, one `dimension × minimal_dimension` block per vertex.
pub fn numerical_jacobian(
    edge: &dyn Edge,
    vertices: &[&GraphVertex],
) -> GraphResult<Vec<DMatrix<f64>>> {
    let mut jacobians = Vec::with_capacity(vertices.len());
    for (slot, vertex) in vertices.iter().enumerate() {
        let tangent_dim = vertex.minimal_dimension();
        let mut jacobian = DMatrix::zeros(edge.dimension(), tangent_dim);
        for k in 0..tangent_dim {
            let mut delta = vec![0.0; tangent_dim];

            delta[k] = NUMERIC_JACOBIAN_STEP;
            let mut plus = (*vertex).clone();
            plus.oplus(&delta)?;

            delta[k] = -NUMERIC_JACOBIAN_STEP;
            let mut minus = (*vertex).clone();
            minus.oplus(&delta)?;

            let scratch: Vec<&GraphVertex> = vertices
                .iter()
                .enumerate()
                .map(|(j, &v)| if j == slot { &plus } else { v })
                .collect();
            let error_plus = edge.residual(&scratch)?;

            let scratch: Vec<&GraphVertex> = vertices
                .iter()
                .enumerate()
                .map(|(j, &v)| if j == slot { &minus } else { v })
                .collect();
            let error_minus = edge.residual(&scratch)?;

            jacobian.set_column(
                k,
                &((error_plus - error_minus) / (2.0 * NUMERIC_JACOBIAN_STEP)),
            );
        }
        jacobians.push(jacobian);
    }
    Ok(jacobians)
}

pub(crate) fn check_arity(expected: usize, actual: usize) -> GraphResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(GraphError::ArityMismatch { expected, actual })
    }
}

pub(crate) fn check_information_shape(dim: usize, information: &DMatrix<f64>) -> GraphResult<()> {
    if information.nrows() == dim && information.ncols() == dim {
        Ok(())
    } else {
        Err(GraphError::DimensionMismatch {
            expected: dim * dim,
            actual: information.nrows() * information.ncols(),
        })
    }
}

macro_rules! typed_accessor {
    ($name:ident, $as_fn:ident, $vertex_ty:ty, $kind:literal) => {
        pub(crate) fn $name<'a>(
            vertices: &[&'a GraphVertex],
            slot: usize,
        ) -> GraphResult<&'a $vertex_ty> {
            let vertex = vertices.get(slot).copied().ok_or(GraphError::ArityMismatch {
                expected: slot + 1,
                actual: vertices.len(),
            })?;
            vertex.$as_fn().ok_or_else(|| GraphError::VertexTypeMismatch {
                slot,
                expected: $kind,
                actual: vertex.kind_name(),
            })
        }
    };
}

/// Implements the cache/measurement plumbing shared by every edge type:
/// slot list, dimensions, information matrix with shape check, residual and
/// Jacobian caches.
macro_rules! edge_plumbing {
    ($dim:expr, $measurement_dim:expr) => {
        fn vertex_ids(&self) -> &[VertexId] {
            &self.vertices
        }

        fn dimension(&self) -> usize {
            $dim
        }

        fn measurement_dimension(&self) -> usize {
            $measurement_dim
        }

        fn information(&self) -> &DMatrix<f64> {
            &self.information
        }

        fn set_information(&mut self, information: DMatrix<f64>) -> GraphResult<()> {
            crate::edge::check_information_shape($dim, &information)?;
            self.information = information;
            Ok(())
        }

        fn error(&self) -> &DVector<f64> {
            &self.error
        }

        fn store_error(&mut self, error: DVector<f64>) {
            self.error = error;
        }

        fn jacobians(&self) -> &[DMatrix<f64>] {
            &self.jacobians
        }

        fn store_jacobians(&mut self, jacobians: Vec<DMatrix<f64>>) {
            self.jacobians = jacobians;
        }
    };
}

pub(crate) use edge_plumbing;

typed_accessor!(cam_at, as_cam, VertexCam, "VertexCam");
typed_accessor!(custom_cam_at, as_custom_cam, VertexCustomCam, "VertexCustomCam");
typed_accessor!(point_at, as_point_xyz, VertexSbaPointXyz, "VertexSbaPointXyz");
typed_accessor!(custom_point_at, as_custom_xyz, VertexCustomXyz, "VertexCustomXyz");
typed_accessor!(scale_at, as_scale, VertexScale, "VertexScale");
typed_accessor!(intrinsics_at, as_intrinsics, VertexIntrinsics, "VertexIntrinsics");

/// Tagged union over all concrete edge types, used by graph storage.
#[derive(Debug, Clone)]
pub enum GraphEdge {
    ProjectP2MC(EdgeProjectP2MC),
    CustomCamera(EdgeCustomCamera),
    ProjectP2SC(EdgeProjectP2SC),
    ProjectP2MCIntrinsics(EdgeProjectP2MCIntrinsics),
    SbaCam(EdgeSbaCam),
    SbaScale(EdgeSbaScale),
    ScaleNetworkConsistency(EdgeScaleNetworkConsistency),
    DepthConsistencyScale(EdgeDepthConsistencyScale),
}

macro_rules! for_each_edge {
    ($self:ident, $e:ident => $body:expr) => {
        match $self {
            GraphEdge::ProjectP2MC($e) => $body,
            GraphEdge::CustomCamera($e) => $body,
            GraphEdge::ProjectP2SC($e) => $body,
            GraphEdge::ProjectP2MCIntrinsics($e) => $body,
            GraphEdge::SbaCam($e) => $body,
            GraphEdge::SbaScale($e) => $body,
            GraphEdge::ScaleNetworkConsistency($e) => $body,
            GraphEdge::DepthConsistencyScale($e) => $body,
        }
    };
}

impl GraphEdge {
    /// Stable name of the concrete edge kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GraphEdge::ProjectP2MC(_) => "EdgeProjectP2MC",
            GraphEdge::CustomCamera(_) => "EdgeCustomCamera",
            GraphEdge::ProjectP2SC(_) => "EdgeProjectP2SC",
            GraphEdge::ProjectP2MCIntrinsics(_) => "EdgeProjectP2MCIntrinsics",
            GraphEdge::SbaCam(_) => "EdgeSbaCam",
            GraphEdge::SbaScale(_) => "EdgeSbaScale",
            GraphEdge::ScaleNetworkConsistency(_) => "EdgeScaleNetworkConsistency",
            GraphEdge::DepthConsistencyScale(_) => "EdgeDepthConsistencyScale",
        }
    }
}

impl Edge for GraphEdge {
    fn vertex_ids(&self) -> &[VertexId] {
        for_each_edge!(self, e => e.vertex_ids())
    }

    fn dimension(&self) -> usize {
        for_each_edge!(self, e => e.dimension())
    }

    fn measurement_dimension(&self) -> usize {
        for_each_edge!(self, e => e.measurement_dimension())
    }

    fn information(&self) -> &DMatrix<f64> {
        for_each_edge!(self, e => e.information())
    }

    fn set_information(&mut self, information: DMatrix<f64>) -> GraphResult<()> {
        for_each_edge!(self, e => e.set_information(information))
    }

    fn error(&self) -> &DVector<f64> {
        for_each_edge!(self, e => e.error())
    }

    fn store_error(&mut self, error: DVector<f64>) {
        for_each_edge!(self, e => e.store_error(error))
    }

    fn jacobians(&self) -> &[DMatrix<f64>] {
        for_each_edge!(self, e => e.jacobians())
    }

    fn store_jacobians(&mut self, jacobians: Vec<DMatrix<f64>>) {
        for_each_edge!(self, e => e.store_jacobians(jacobians))
    }

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        for_each_edge!(self, e => e.residual(vertices))
    }

    fn compute_error(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        for_each_edge!(self, e => e.compute_error(vertices))
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        for_each_edge!(self, e => e.linearize_oplus(vertices))
    }

    fn measurement_data(&self) -> DVector<f64> {
        for_each_edge!(self, e => e.measurement_data())
    }

    fn set_measurement_data(&mut self, data: &[f64]) -> GraphResult<()> {
        for_each_edge!(self, e => e.set_measurement_data(data))
    }

    fn set_measurement_from_state(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        for_each_edge!(self, e => e.set_measurement_from_state(vertices))
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        for_each_edge!(self, e => e.check_vertices(vertices))
    }

    fn chi2(&self) -> f64 {
        for_each_edge!(self, e => e.chi2())
    }

    fn initial_estimate_possible(&self, vertices: &[&GraphVertex]) -> bool {
        for_each_edge!(self, e => e.initial_estimate_possible(vertices))
    }

    fn initial_estimate(&self, vertices: &[&GraphVertex]) -> GraphResult<(VertexId, Pose3)> {
        for_each_edge!(self, e => e.initial_estimate(vertices))
    }
}
