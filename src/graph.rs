//! Graph assembly: vertex arena plus edge list.
//!
//! Vertices are stored in insertion order in a `Vec` with a side index from
//! id to slot; edges hold vertex ids and are resolved to references at
//! evaluation time. Structural validation (existing endpoints, correct
//! kinds, correct arity) happens once when an edge is inserted, so the hot
//! evaluation paths only do slot lookups.
//!
//! The evaluation phases ([`Graph::compute_active_errors`],
//! [`Graph::linearize_all`]) run edge-parallel with rayon: vertices are
//! read-only during a phase and every edge writes only its own caches.

use std::collections::HashMap;
use std::fmt;

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::debug;

use crate::edge::{numerical_jacobian, Edge, GraphEdge};
use crate::error::{GraphError, GraphResult};
use crate::vertex::{GraphVertex, Vertex, VertexId};

/// Size summary of an assembled graph.
#[derive(Debug, Clone)]
pub struct GraphStatistics {
    pub num_vertices: usize,
    pub num_edges: usize,
    pub num_free_vertices: usize,
    pub num_fixed_vertices: usize,
    pub total_minimal_dimension: usize,
    pub total_residual_dimension: usize,
}

impl fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Graph statistics:\n\
             Vertices: {} (free: {}, fixed: {})\n\
             Edges: {}\n\
             Free tangent dimension: {}\n\
             Residual dimension: {}",
            self.num_vertices,
            self.num_free_vertices,
            self.num_fixed_vertices,
            self.num_edges,
            self.total_minimal_dimension,
            self.total_residual_dimension
        )
    }
}

/// Vertex arena and edge list of one estimation problem.
#[derive(Default)]
pub struct Graph {
    vertices: Vec<GraphVertex>,
    index: HashMap<VertexId, usize>,
    edges: Vec<GraphEdge>,
}

fn resolve_refs<'a>(
    vertices: &'a [GraphVertex],
    index: &HashMap<VertexId, usize>,
    ids: &[VertexId],
) -> GraphResult<Vec<&'a GraphVertex>> {
    ids.iter()
        .map(|id| {
            index
                .get(id)
                .map(|&slot| &vertices[slot])
                .ok_or(GraphError::VertexNotFound(*id))
        })
        .collect()
}

impl Graph {
    /// Creates a new, empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex; its id must be unused.
    pub fn add_vertex(&mut self, vertex: GraphVertex) -> GraphResult<VertexId> {
        let id = vertex.id();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateVertex(id));
        }
        self.index.insert(id, self.vertices.len());
        self.vertices.push(vertex);
        Ok(id)
    }

    /// Add an edge; every endpoint must exist and have the kind the edge
    /// requires.
    pub fn add_edge(&mut self, edge: GraphEdge) -> GraphResult<usize> {
        let refs = resolve_refs(&self.vertices, &self.index, edge.vertex_ids())?;
        edge.check_vertices(&refs)?;
        self.edges.push(edge);
        Ok(self.edges.len() - 1)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&GraphVertex> {
        self.index.get(&id).map(|&slot| &self.vertices[slot])
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut GraphVertex> {
        match self.index.get(&id) {
            Some(&slot) => Some(&mut self.vertices[slot]),
            None => None,
        }
    }

    pub fn edge(&self, index: usize) -> Option<&GraphEdge> {
        self.edges.get(index)
    }

    pub fn edge_mut(&mut self, index: usize) -> Option<&mut GraphEdge> {
        self.edges.get_mut(index)
    }

    /// Vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &GraphVertex> {
        self.vertices.iter()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Fix or free a vertex.
    pub fn set_fixed(&mut self, id: VertexId, fixed: bool) -> GraphResult<()> {
        self.vertex_mut(id)
            .ok_or(GraphError::VertexNotFound(id))?
            .set_fixed(fixed);
        Ok(())
    }

    pub fn statistics(&self) -> GraphStatistics {
        let num_fixed_vertices = self.vertices.iter().filter(|v| v.is_fixed()).count();
        GraphStatistics {
            num_vertices: self.vertices.len(),
            num_edges: self.edges.len(),
            num_free_vertices: self.vertices.len() - num_fixed_vertices,
            num_fixed_vertices,
            total_minimal_dimension: self
                .vertices
                .iter()
                .filter(|v| !v.is_fixed())
                .map(|v| v.minimal_dimension())
                .sum(),
            total_residual_dimension: self.edges.iter().map(|e| e.dimension()).sum(),
        }
    }

    /// Refresh every edge's residual cache against the current vertex
    /// states. Edge-parallel; vertices are read-only during the phase.
    pub fn compute_active_errors(&mut self) -> GraphResult<()> {
        let vertices = &self.vertices;
        let index = &self.index;
        self.edges.par_iter_mut().try_for_each(|edge| {
            let ids = edge.vertex_ids().to_vec();
            let refs = resolve_refs(vertices, index, &ids)?;
            edge.compute_error(&refs)
        })
    }

    /// Refresh every edge's Jacobian cache. Edges without an analytic
    /// linearization get central-difference blocks instead.
    pub fn linearize_all(&mut self) -> GraphResult<()> {
        let vertices = &self.vertices;
        let index = &self.index;
        self.edges.par_iter_mut().try_for_each(|edge| {
            let ids = edge.vertex_ids().to_vec();
            let refs = resolve_refs(vertices, index, &ids)?;
            match edge.linearize_oplus(&refs) {
                Err(GraphError::MissingAnalyticJacobian(kind)) => {
                    debug!(edge = kind, "no analytic Jacobian, using central differences");
                    let jacobians = numerical_jacobian(&*edge, &refs)?;
                    edge.store_jacobians(jacobians);
                    Ok(())
                }
                other => other,
            }
        })
    }

    /// Apply one solver increment.
    ///
    /// `delta` concatenates one tangent block per *free* vertex in insertion
    /// order; fixed vertices contribute nothing. The total length must match
    /// exactly.
    pub fn apply_increment(&mut self, delta: &DVector<f64>) -> GraphResult<()> {
        let expected: usize = self
            .vertices
            .iter()
            .filter(|v| !v.is_fixed())
            .map(|v| v.minimal_dimension())
            .sum();
        if delta.len() != expected {
            return Err(GraphError::DimensionMismatch {
                expected,
                actual: delta.len(),
            });
        }
        let mut offset = 0;
        for vertex in &mut self.vertices {
            if vertex.is_fixed() {
                continue;
            }
            let dim = vertex.minimal_dimension();
            vertex.oplus(&delta.as_slice()[offset..offset + dim])?;
            offset += dim;
        }
        Ok(())
    }

    /// Sum of `eᵀ·Ω·e` over all edges, from the cached residuals.
    pub fn chi2(&self) -> f64 {
        self.edges.iter().map(|e| e.chi2()).sum()
    }

    /// Bootstrap a free endpoint of the given edge from its measurement and
    /// its fixed endpoint.
    pub fn initial_estimate(&mut self, edge_index: usize) -> GraphResult<()> {
        let (id, pose) = {
            let edge = self
                .edges
                .get(edge_index)
                .ok_or(GraphError::EdgeNotFound(edge_index))?;
            let refs = resolve_refs(&self.vertices, &self.index, edge.vertex_ids())?;
            edge.initial_estimate(&refs)?
        };
        let vertex = self
            .vertex_mut(id)
            .ok_or(GraphError::VertexNotFound(id))?;
        match vertex {
            GraphVertex::Cam(cam) => cam.set_pose(pose),
            GraphVertex::CustomCam(cam) => cam.set_pose(pose),
            other => {
                return Err(GraphError::VertexTypeMismatch {
                    slot: 0,
                    expected: "VertexCam",
                    actual: other.kind_name(),
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SbaCam;
    use crate::edge::{
        EdgeDepthConsistencyScale, EdgeProjectP2MC, EdgeSbaCam, EdgeScaleNetworkConsistency,
    };
    use crate::manifold::{se3::Pose3, so3};
    use crate::vertex::{VertexCam, VertexSbaPointXyz, VertexScale};
    use nalgebra::{Vector2, Vector3};

    fn cam_vertex(id: VertexId, t: Vector3<f64>) -> GraphVertex {
        let mut cam = SbaCam::new(so3::exp(&Vector3::zeros()), t);
        cam.set_kcam(500.0, 500.0, 320.0, 240.0, 0.08);
        GraphVertex::Cam(VertexCam::new(id, cam))
    }

    #[test]
    fn test_duplicate_vertex_rejected() {
        let mut graph = Graph::new();
        graph.add_vertex(cam_vertex(0, Vector3::zeros())).unwrap();
        assert_eq!(
            graph.add_vertex(cam_vertex(0, Vector3::zeros())),
            Err(GraphError::DuplicateVertex(0))
        );
    }

    #[test]
    fn test_add_edge_requires_existing_endpoints() {
        let mut graph = Graph::new();
        graph.add_vertex(cam_vertex(0, Vector3::zeros())).unwrap();
        let edge = GraphEdge::SbaCam(EdgeSbaCam::new(0, 9, Pose3::identity()));
        assert_eq!(graph.add_edge(edge), Err(GraphError::VertexNotFound(9)));
    }

    #[test]
    fn test_add_edge_checks_vertex_kinds() {
        let mut graph = Graph::new();
        graph.add_vertex(cam_vertex(0, Vector3::zeros())).unwrap();
        graph.add_vertex(cam_vertex(1, Vector3::zeros())).unwrap();
        // slot 0 must be a point
        let edge = GraphEdge::ProjectP2MC(EdgeProjectP2MC::new(0, 1, Vector2::zeros()));
        assert!(matches!(
            graph.add_edge(edge),
            Err(GraphError::VertexTypeMismatch { slot: 0, .. })
        ));
    }

    #[test]
    fn test_apply_increment_skips_fixed_vertices() {
        let mut graph = Graph::new();
        graph.add_vertex(cam_vertex(0, Vector3::zeros())).unwrap();
        graph
            .add_vertex(GraphVertex::PointXyz(VertexSbaPointXyz::new(
                1,
                Vector3::new(1.0, 2.0, 3.0),
            )))
            .unwrap();
        graph.set_fixed(0, true).unwrap();

        // only the free point contributes: 3 entries
        let delta = DVector::from_vec(vec![0.1, -0.2, 0.3]);
        graph.apply_increment(&delta).unwrap();
        let point = graph.vertex(1).unwrap().as_point_xyz().unwrap();
        assert!((point.estimate() - Vector3::new(1.1, 1.8, 3.3)).norm() < 1e-14);

        // wrong total length rejected
        let too_long = DVector::from_vec(vec![0.0; 9]);
        assert_eq!(
            graph.apply_increment(&too_long),
            Err(GraphError::DimensionMismatch {
                expected: 3,
                actual: 9
            })
        );
    }

    #[test]
    fn test_compute_errors_and_chi2() {
        let mut graph = Graph::new();
        graph
            .add_vertex(GraphVertex::Scale(VertexScale::new(0, 2.0)))
            .unwrap();
        graph
            .add_edge(GraphEdge::ScaleNetworkConsistency(
                EdgeScaleNetworkConsistency::new(0, 1.5),
            ))
            .unwrap();
        graph.compute_active_errors().unwrap();
        assert!((graph.chi2() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_linearize_all_uses_numeric_fallback() {
        let mut graph = Graph::new();
        for (id, s) in [1.0, 2.0, 4.0].iter().enumerate() {
            graph
                .add_vertex(GraphVertex::Scale(VertexScale::new(id, *s)))
                .unwrap();
        }
        let edge = EdgeDepthConsistencyScale::new(vec![0, 1, 2], 0.0).unwrap();
        let index = graph
            .add_edge(GraphEdge::DepthConsistencyScale(edge))
            .unwrap();
        graph.linearize_all().unwrap();
        let jacobians = graph.edge(index).unwrap().jacobians();
        assert_eq!(jacobians.len(), 3);
        assert!((jacobians[0][(0, 0)] - (2.0 / 3.0) * (-4.0)).abs() < 1e-5);
    }

    #[test]
    fn test_initial_estimate_through_graph() {
        let mut graph = Graph::new();
        graph.add_vertex(cam_vertex(0, Vector3::new(1.0, 0.0, 0.0))).unwrap();
        graph.add_vertex(cam_vertex(1, Vector3::zeros())).unwrap();
        graph.set_fixed(0, true).unwrap();
        let measurement = Pose3::new(so3::exp(&Vector3::zeros()), Vector3::new(0.5, 0.0, 0.0));
        let index = graph
            .add_edge(GraphEdge::SbaCam(EdgeSbaCam::new(0, 1, measurement)))
            .unwrap();
        graph.initial_estimate(index).unwrap();
        let cam1 = graph.vertex(1).unwrap().as_cam().unwrap();
        assert!((cam1.estimate().pose.translation - Vector3::new(1.5, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_statistics() {
        let mut graph = Graph::new();
        graph.add_vertex(cam_vertex(0, Vector3::zeros())).unwrap();
        graph
            .add_vertex(GraphVertex::PointXyz(VertexSbaPointXyz::new(
                1,
                Vector3::new(0.0, 0.0, 5.0),
            )))
            .unwrap();
        graph.set_fixed(0, true).unwrap();
        graph
            .add_edge(GraphEdge::ProjectP2MC(EdgeProjectP2MC::new(
                1,
                0,
                Vector2::zeros(),
            )))
            .unwrap();
        let stats = graph.statistics();
        assert_eq!(stats.num_vertices, 2);
        assert_eq!(stats.num_edges, 1);
        assert_eq!(stats.num_fixed_vertices, 1);
        assert_eq!(stats.total_minimal_dimension, 3);
        assert_eq!(stats.total_residual_dimension, 2);
    }
}
