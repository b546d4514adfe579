//! Scale-consistency edges over per-keyframe depth scales.

use nalgebra::{DMatrix, DVector};

use crate::edge::{check_arity, edge_plumbing, scale_at, Edge};
use crate::error::{GraphError, GraphResult};
use crate::vertex::{GraphVertex, VertexId};

/// Unary prior pulling one [`VertexScale`](crate::vertex::VertexScale)
/// toward a measured value: `e = s − m`. Residual dimension 1.
#[derive(Debug, Clone)]
pub struct EdgeScaleNetworkConsistency {
    vertices: [VertexId; 1],
    measurement: f64,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeScaleNetworkConsistency {
    pub fn new(scale: VertexId, measurement: f64) -> Self {
        Self {
            vertices: [scale],
            measurement,
            information: DMatrix::identity(1, 1),
            error: DVector::zeros(1),
            jacobians: vec![DMatrix::zeros(1, 1)],
        }
    }

    pub fn measurement(&self) -> f64 {
        self.measurement
    }
}

impl Edge for EdgeScaleNetworkConsistency {
    edge_plumbing!(1, 1);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let scale = scale_at(vertices, 0)?;
        Ok(DVector::from_vec(vec![scale.estimate() - self.measurement]))
    }

    fn linearize_oplus(&mut self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        scale_at(vertices, 0)?;
        self.jacobians = vec![DMatrix::from_element(1, 1, 1.0)];
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
        let scale = scale_at(vertices, 0)?;
        self.measurement = scale.estimate();
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(1, vertices.len())?;
        scale_at(vertices, 0)?;
        Ok(())
    }
}

/// Spread constraint over N ≥ 2 scale vertices. Residual dimension 1:
///
/// ```text
/// e = mean over pairs i < j of (sᵢ − sⱼ)²  −  m
/// ```
///
/// This edge carries no analytic linearization;
/// [`Edge::linearize_oplus`] returns
/// [`GraphError::MissingAnalyticJacobian`] and
/// [`Graph::linearize_all`](crate::graph::Graph::linearize_all) substitutes
/// central-difference blocks.
#[derive(Debug, Clone)]
pub struct EdgeDepthConsistencyScale {
    vertices: Vec<VertexId>,
    measurement: f64,
    information: DMatrix<f64>,
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
}

impl EdgeDepthConsistencyScale {
    /// At least two scale vertices are required.
    pub fn new(scales: Vec<VertexId>, measurement: f64) -> GraphResult<Self> {
        if scales.len() < 2 {
            return Err(GraphError::ArityMismatch {
                expected: 2,
                actual: scales.len(),
            });
        }
        let arity = scales.len();
        Ok(Self {
            vertices: scales,
            measurement,
            information: DMatrix::identity(1, 1),
            error: DVector::zeros(1),
            jacobians: vec![DMatrix::zeros(1, 1); arity],
        })
    }

    pub fn measurement(&self) -> f64 {
        self.measurement
    }

    fn mean_pairwise_spread(&self, vertices: &[&GraphVertex]) -> GraphResult<f64> {
        let mut scales = Vec::with_capacity(vertices.len());
        for slot in 0..self.vertices.len() {
            scales.push(scale_at(vertices, slot)?.estimate());
        }
        let n = scales.len();
        let pairs = (n * (n - 1) / 2) as f64;
        let mut sum = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let diff = scales[i] - scales[j];
                sum += diff * diff;
            }
        }
        Ok(sum / pairs)
    }
}

impl Edge for EdgeDepthConsistencyScale {
    edge_plumbing!(1, 1);

    fn residual(&self, vertices: &[&GraphVertex]) -> GraphResult<DVector<f64>> {
        let spread = self.mean_pairwise_spread(vertices)?;
        Ok(DVector::from_vec(vec![spread - self.measurement]))
    }

    fn linearize_oplus(&mut self, _vertices: &[&GraphVertex]) -> GraphResult<()> {
        Err(GraphError::MissingAnalyticJacobian(
            "EdgeDepthConsistencyScale",
        ))
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
        self.measurement = self.mean_pairwise_spread(vertices)?;
        Ok(())
    }

    fn check_vertices(&self, vertices: &[&GraphVertex]) -> GraphResult<()> {
        check_arity(self.vertices.len(), vertices.len())?;
        for slot in 0..self.vertices.len() {
            scale_at(vertices, slot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::numerical_jacobian;
    use crate::vertex::VertexScale;

    #[test]
    fn test_network_consistency_residual() {
        let scale = GraphVertex::Scale(VertexScale::new(0, 2.0));
        let mut edge = EdgeScaleNetworkConsistency::new(0, 2.0);
        edge.compute_error(&[&scale]).unwrap();
        assert!(edge.error()[0].abs() < 1e-15);

        edge.set_measurement_data(&[1.5]).unwrap();
        edge.compute_error(&[&scale]).unwrap();
        assert!((edge.error()[0] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_network_consistency_zero_residual_from_state() {
        let scale = GraphVertex::Scale(VertexScale::new(0, 0.37));
        let mut edge = EdgeScaleNetworkConsistency::new(0, 9.0);
        edge.set_measurement_from_state(&[&scale]).unwrap();
        edge.compute_error(&[&scale]).unwrap();
        assert!(edge.error()[0].abs() < 1e-15);
    }

    #[test]
    fn test_network_consistency_jacobian_is_one() {
        let scale = GraphVertex::Scale(VertexScale::new(0, 2.0));
        let mut edge = EdgeScaleNetworkConsistency::new(0, 1.0);
        edge.linearize_oplus(&[&scale]).unwrap();
        assert_eq!(edge.jacobians()[0][(0, 0)], 1.0);
        let numeric = numerical_jacobian(&edge, &[&scale]).unwrap();
        assert!((numeric[0][(0, 0)] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_depth_consistency_requires_two_scales() {
        assert_eq!(
            EdgeDepthConsistencyScale::new(vec![0], 0.0).unwrap_err(),
            GraphError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_depth_consistency_mean_pairwise_spread() {
        let scales: Vec<GraphVertex> = [1.0, 2.0, 4.0]
            .iter()
            .enumerate()
            .map(|(id, &s)| GraphVertex::Scale(VertexScale::new(id, s)))
            .collect();
        let refs: Vec<&GraphVertex> = scales.iter().collect();
        let mut edge = EdgeDepthConsistencyScale::new(vec![0, 1, 2], 0.0).unwrap();
        edge.compute_error(&refs).unwrap();
        // pairs: 1, 9, 4 -> mean 14/3
        assert!((edge.error()[0] - 14.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_consistency_zero_residual_from_state() {
        let scales: Vec<GraphVertex> = [1.0, 2.0, 4.0]
            .iter()
            .enumerate()
            .map(|(id, &s)| GraphVertex::Scale(VertexScale::new(id, s)))
            .collect();
        let refs: Vec<&GraphVertex> = scales.iter().collect();
        let mut edge = EdgeDepthConsistencyScale::new(vec![0, 1, 2], 9.0).unwrap();
        edge.set_measurement_from_state(&refs).unwrap();
        edge.compute_error(&refs).unwrap();
        assert!(edge.error()[0].abs() < 1e-15);
    }

    #[test]
    fn test_depth_consistency_has_no_analytic_jacobian() {
        let scales: Vec<GraphVertex> = (0..2)
            .map(|id| GraphVertex::Scale(VertexScale::new(id, 1.0 + id as f64)))
            .collect();
        let refs: Vec<&GraphVertex> = scales.iter().collect();
        let mut edge = EdgeDepthConsistencyScale::new(vec![0, 1], 0.0).unwrap();
        assert_eq!(
            edge.linearize_oplus(&refs),
            Err(GraphError::MissingAnalyticJacobian(
                "EdgeDepthConsistencyScale"
            ))
        );
    }

    #[test]
    fn test_depth_consistency_numeric_gradient() {
        let scales: Vec<GraphVertex> = [1.0, 2.0, 4.0]
            .iter()
            .enumerate()
            .map(|(id, &s)| GraphVertex::Scale(VertexScale::new(id, s)))
            .collect();
        let refs: Vec<&GraphVertex> = scales.iter().collect();
        let edge = EdgeDepthConsistencyScale::new(vec![0, 1, 2], 0.0).unwrap();
        let numeric = numerical_jacobian(&edge, &refs).unwrap();
        // d/ds_i of the mean spread: (2/P)·Σ_{j≠i}(s_i − s_j), P = 3
        assert!((numeric[0][(0, 0)] - (2.0 / 3.0) * ((1.0 - 2.0) + (1.0 - 4.0))).abs() < 1e-5);
        assert!((numeric[1][(0, 0)] - (2.0 / 3.0) * ((2.0 - 1.0) + (2.0 - 4.0))).abs() < 1e-5);
        assert!((numeric[2][(0, 0)] - (2.0 / 3.0) * ((4.0 - 1.0) + (4.0 - 2.0))).abs() < 1e-5);
    }
}
