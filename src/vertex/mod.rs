//! Optimizable graph vertices.
//!
//! A vertex owns an estimate living on some manifold together with a fixed
//! flag. Edges never know the concrete vertex types they connect to at the
//! storage level; the graph holds [`GraphVertex`] values and edges downcast
//! through the typed accessors when computing residuals.
//!
//! Two flat-array views exist for every vertex:
//!
//! - the *full* estimate (`estimate_data`), the over-parameterized internal
//!   representation (e.g. 11 scalars for a camera with a unit quaternion),
//! - the *minimal* representation (`minimal_estimate_data`), matching the
//!   tangent-space dimension used by `oplus` and the Jacobian columns.
//!
//! Both setters reject wrong-length input with
//! [`GraphError::DimensionMismatch`]; data is never truncated or padded.

use nalgebra::DVector;

use crate::error::{GraphError, GraphResult};

pub mod camera;
pub mod euclidean;

pub use camera::{VertexCam, VertexCustomCam};
pub use euclidean::{
    VertexCanonical, VertexCustomXyz, VertexIntrinsics, VertexSbaPointXyz, VertexScale,
};

/// Identifier a vertex carries and edges reference. Assigned by the caller,
/// unique within a graph.
pub type VertexId = usize;

/// Returns a dimension-mismatch error unless `actual == expected`.
pub(crate) fn check_dim(expected: usize, actual: usize) -> GraphResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(GraphError::DimensionMismatch { expected, actual })
    }
}

/// Capability contract shared by all vertex types.
pub trait Vertex {
    /// Caller-assigned identifier.
    fn id(&self) -> VertexId;

    /// Whether the vertex is held constant during optimization.
    fn is_fixed(&self) -> bool;

    /// Mark the vertex as held constant (or free it again).
    fn set_fixed(&mut self, fixed: bool);

    /// Length of the full (possibly over-parameterized) flat representation.
    fn estimate_dimension(&self) -> usize;

    /// Tangent-space dimension: length of `oplus` deltas and width of the
    /// Jacobian block any edge holds for this vertex. Never larger than
    /// [`Vertex::estimate_dimension`].
    fn minimal_dimension(&self) -> usize;

    /// Reset the estimate to the type-specific origin.
    fn set_to_origin(&mut self);

    /// Apply a tangent-space increment of length
    /// [`Vertex::minimal_dimension`]. A zero delta leaves the estimate
    /// unchanged.
    fn oplus(&mut self, delta: &[f64]) -> GraphResult<()>;

    /// Full flat representation of the current estimate.
    fn estimate_data(&self) -> DVector<f64>;

    /// Overwrite the estimate from its full flat representation.
    fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()>;

    /// Minimal flat representation of the current estimate.
    fn minimal_estimate_data(&self) -> DVector<f64>;

    /// Overwrite the estimate from its minimal flat representation.
    fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()>;
}

/// Tagged union over all concrete vertex types, used by graph storage and
/// edge dispatch.
#[derive(Debug, Clone)]
pub enum GraphVertex {
    Cam(VertexCam),
    CustomCam(VertexCustomCam),
    PointXyz(VertexSbaPointXyz),
    CustomXyz(VertexCustomXyz),
    Scale(VertexScale),
    Canonical(VertexCanonical),
    Intrinsics(VertexIntrinsics),
}

macro_rules! for_each_vertex {
    ($self:ident, $v:ident => $body:expr) => {
        match $self {
            GraphVertex::Cam($v) => $body,
            GraphVertex::CustomCam($v) => $body,
            GraphVertex::PointXyz($v) => $body,
            GraphVertex::CustomXyz($v) => $body,
            GraphVertex::Scale($v) => $body,
            GraphVertex::Canonical($v) => $body,
            GraphVertex::Intrinsics($v) => $body,
        }
    };
}

impl GraphVertex {
    /// Stable name of the concrete vertex kind, used in type-mismatch
    /// diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GraphVertex::Cam(_) => "VertexCam",
            GraphVertex::CustomCam(_) => "VertexCustomCam",
            GraphVertex::PointXyz(_) => "VertexSbaPointXyz",
            GraphVertex::CustomXyz(_) => "VertexCustomXyz",
            GraphVertex::Scale(_) => "VertexScale",
            GraphVertex::Canonical(_) => "VertexCanonical",
            GraphVertex::Intrinsics(_) => "VertexIntrinsics",
        }
    }

    pub fn as_cam(&self) -> Option<&VertexCam> {
        match self {
            GraphVertex::Cam(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_custom_cam(&self) -> Option<&VertexCustomCam> {
        match self {
            GraphVertex::CustomCam(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_point_xyz(&self) -> Option<&VertexSbaPointXyz> {
        match self {
            GraphVertex::PointXyz(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_custom_xyz(&self) -> Option<&VertexCustomXyz> {
        match self {
            GraphVertex::CustomXyz(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_scale(&self) -> Option<&VertexScale> {
        match self {
            GraphVertex::Scale(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_canonical(&self) -> Option<&VertexCanonical> {
        match self {
            GraphVertex::Canonical(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_intrinsics(&self) -> Option<&VertexIntrinsics> {
        match self {
            GraphVertex::Intrinsics(v) => Some(v),
            _ => None,
        }
    }
}

impl Vertex for GraphVertex {
    fn id(&self) -> VertexId {
        for_each_vertex!(self, v => v.id())
    }

    fn is_fixed(&self) -> bool {
        for_each_vertex!(self, v => v.is_fixed())
    }

    fn set_fixed(&mut self, fixed: bool) {
        for_each_vertex!(self, v => v.set_fixed(fixed))
    }

    fn estimate_dimension(&self) -> usize {
        for_each_vertex!(self, v => v.estimate_dimension())
    }

    fn minimal_dimension(&self) -> usize {
        for_each_vertex!(self, v => v.minimal_dimension())
    }

    fn set_to_origin(&mut self) {
        for_each_vertex!(self, v => v.set_to_origin())
    }

    fn oplus(&mut self, delta: &[f64]) -> GraphResult<()> {
        for_each_vertex!(self, v => v.oplus(delta))
    }

    fn estimate_data(&self) -> DVector<f64> {
        for_each_vertex!(self, v => v.estimate_data())
    }

    fn set_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        for_each_vertex!(self, v => v.set_estimate_data(data))
    }

    fn minimal_estimate_data(&self) -> DVector<f64> {
        for_each_vertex!(self, v => v.minimal_estimate_data())
    }

    fn set_minimal_estimate_data(&mut self, data: &[f64]) -> GraphResult<()> {
        for_each_vertex!(self, v => v.set_minimal_estimate_data(data))
    }
}
