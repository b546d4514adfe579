//! Vertex/edge estimation core for sparse bundle adjustment.
//!
//! The crate models a nonlinear least-squares problem as a graph: vertices
//! carry manifold-valued estimates (camera poses with calibration, 3D
//! landmarks, scalar scales, shared intrinsics), edges carry measurements
//! and produce residuals and Jacobian blocks against the vertices they
//! connect. A solver drives the loop: evaluate residuals, linearize, solve
//! the normal equations, push the increment back through each vertex's
//! tangent-space update. This crate provides everything in that loop except
//! the linear solve and the iteration policy.
//!
//! # Layout
//!
//! - [`manifold`]: SO(3) tangent operations and the [`manifold::se3::Pose3`]
//!   rigid transform with the camera update rule.
//! - [`camera`]: pinhole payloads ([`camera::SbaCam`], [`camera::CustomCam`])
//!   with monocular/stereo projection and projection Jacobians.
//! - [`vertex`]: the [`vertex::Vertex`] contract, seven concrete vertex
//!   types, and the [`vertex::GraphVertex`] dispatch enum.
//! - [`edge`]: the [`edge::Edge`] contract, eight measurement edge types,
//!   and central-difference numeric differentiation as a fallback.
//! - [`graph`]: the [`graph::Graph`] arena with validated insertion,
//!   parallel evaluation phases, and increment application.
//!
//! # Example
//!
//! ```
//! use nalgebra::{UnitQuaternion, Vector2, Vector3};
//! use sba_graph::camera::SbaCam;
//! use sba_graph::edge::EdgeProjectP2MC;
//! use sba_graph::vertex::{GraphVertex, VertexCam, VertexSbaPointXyz};
//! use sba_graph::{Graph, GraphEdge};
//!
//! let mut cam = SbaCam::new(UnitQuaternion::identity(), Vector3::zeros());
//! cam.set_kcam(500.0, 500.0, 320.0, 240.0, 0.1);
//!
//! let mut graph = Graph::new();
//! graph.add_vertex(GraphVertex::Cam(VertexCam::new(0, cam)))?;
//! graph.add_vertex(GraphVertex::PointXyz(VertexSbaPointXyz::new(
//!     1,
//!     Vector3::new(0.0, 0.0, 5.0),
//! )))?;
//! graph.add_edge(GraphEdge::ProjectP2MC(EdgeProjectP2MC::new(
//!     1,
//!     0,
//!     Vector2::new(320.0, 240.0),
//! )))?;
//! graph.compute_active_errors()?;
//! assert!(graph.chi2() < 1e-12);
//! # Ok::<(), sba_graph::GraphError>(())
//! ```

pub mod camera;
pub mod edge;
pub mod error;
pub mod graph;
pub mod logger;
pub mod manifold;
pub mod vertex;

pub use edge::{Edge, GraphEdge};
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, GraphStatistics};
pub use vertex::{GraphVertex, Vertex, VertexId};
