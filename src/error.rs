//! Error types for the sba-graph library.
//!
//! All fallible operations in the vertex/edge core return [`GraphResult`].
//! The taxonomy follows the contract of the estimation core: wrong-length
//! data is rejected immediately, endpoint type violations are caught when an
//! edge is inserted into the graph, and the one edge type without an analytic
//! Jacobian reports that as its own variant so the caller can fall back to
//! numeric differentiation. Degenerate geometry (a point at or behind the
//! optical center) is deliberately *not* an error: projection edges report it
//! as non-finite residual entries so robust kernels in the driver can react.

use thiserror::Error;

/// Main result type used throughout the sba-graph library.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by the vertex/edge estimation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A data array, delta vector, or increment of the wrong length was
    /// passed to a vertex or edge operation. Never silently coerced.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An edge references a vertex id that is not stored in the graph.
    #[error("vertex {0} not found in the graph")]
    VertexNotFound(usize),

    /// A vertex with this id is already stored in the graph.
    #[error("vertex {0} already exists in the graph")]
    DuplicateVertex(usize),

    /// An edge index past the end of the graph's edge list.
    #[error("edge {0} not found in the graph")]
    EdgeNotFound(usize),

    /// A connected vertex does not have the kind the edge requires.
    #[error("edge endpoint {slot}: expected {expected}, got {actual}")]
    VertexTypeMismatch {
        slot: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// An edge was constructed with the wrong number of connected vertices.
    #[error("edge connects {actual} vertices, expected {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    /// The edge type provides no analytic Jacobian; the caller must fall
    /// back to numeric differentiation.
    #[error("{0} has no analytic Jacobian; use numeric differentiation")]
    MissingAnalyticJacobian(&'static str),

    /// `initial_estimate` was called on an edge whose endpoints do not allow
    /// bootstrapping (exactly one endpoint must be fixed).
    #[error("initial estimate requires exactly one fixed endpoint")]
    InitialEstimateUnavailable,
}
