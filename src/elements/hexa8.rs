//! Linear 8-node hexahedral kernel (trilinear shape functions).

use super::{ElementKernel, QuadraturePoint};

/// Node ordering follows the usual bottom-face-then-top-face
/// convention: 1-4 at `zeta = -1`, 5-8 at `zeta = +1`.
pub struct Hexa8;

const XI_N: [f64; 8] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const ETA_N: [f64; 8] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const ZETA_N: [f64; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

impl ElementKernel for Hexa8 {
    fn num_nodes(&self) -> usize {
        8
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        let gp = 1.0 / f64::sqrt(3.0);
        let mut points = Vec::with_capacity(8);
        for &zeta in &[-gp, gp] {
            for &eta in &[-gp, gp] {
                for &xi in &[-gp, gp] {
                    points.push(QuadraturePoint {
                        xi,
                        eta,
                        zeta,
                        weight: 1.0,
                    });
                }
            }
        }
        points
    }

    fn shape_functions(&self, xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
        (0..8)
            .map(|i| {
                (1.0 + xi * XI_N[i]) * (1.0 + eta * ETA_N[i]) * (1.0 + zeta * ZETA_N[i]) / 8.0
            })
            .collect()
    }

    fn shape_derivatives_natural(&self, xi: f64, eta: f64, zeta: f64) -> Vec<[f64; 3]> {
        (0..8)
            .map(|i| {
                let dxi = XI_N[i] * (1.0 + eta * ETA_N[i]) * (1.0 + zeta * ZETA_N[i]) / 8.0;
                let deta = (1.0 + xi * XI_N[i]) * ETA_N[i] * (1.0 + zeta * ZETA_N[i]) / 8.0;
                let dzeta = (1.0 + xi * XI_N[i]) * (1.0 + eta * ETA_N[i]) * ZETA_N[i] / 8.0;
                [dxi, deta, dzeta]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::evaluate;
    use crate::mesh::Node;

    #[test]
    fn shape_functions_partition_of_unity() {
        let kernel = Hexa8;
        for &(xi, eta, zeta) in &[(0.0, 0.0, 0.0), (0.5, 0.5, 0.5), (-0.5, 0.3, 0.7)] {
            let n = kernel.shape_functions(xi, eta, zeta);
            let sum: f64 = n.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn shape_functions_are_one_at_own_node_zero_elsewhere() {
        let kernel = Hexa8;
        for i in 0..8 {
            let n = kernel.shape_functions(XI_N[i], ETA_N[i], ZETA_N[i]);
            for (j, &nj) in n.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((nj - expected).abs() < 1e-12);
            }
        }
    }

    fn unit_cube() -> Vec<Node> {
        vec![
            Node::new(1, 0.0, 0.0, 0.0),
            Node::new(2, 1.0, 0.0, 0.0),
            Node::new(3, 1.0, 1.0, 0.0),
            Node::new(4, 0.0, 1.0, 0.0),
            Node::new(5, 0.0, 0.0, 1.0),
            Node::new(6, 1.0, 0.0, 1.0),
            Node::new(7, 1.0, 1.0, 1.0),
            Node::new(8, 0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn jacobian_of_unit_cube_at_center_is_half_identity() {
        let kernel = Hexa8;
        let nodes = unit_cube();
        let eval = evaluate(&kernel, 1, &nodes, 0.0, 0.0, 0.0).unwrap();
        // physical side length 1 maps from natural side length 2, so dx/dxi = 0.5
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 0.5 } else { 0.0 };
                assert!((eval.jacobian[(i, j)] - expected).abs() < 1e-12);
            }
        }
        assert!((eval.det_j - 0.125).abs() < 1e-12);
    }

    #[test]
    fn degenerate_jacobian_detected_for_collapsed_element() {
        let kernel = Hexa8;
        let mut nodes = unit_cube();
        // Collapse node 2 onto node 1: the element has zero volume.
        nodes[1] = Node::new(2, 0.0, 0.0, 0.0);
        let err = evaluate(&kernel, 1, &nodes, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            crate::error::FeaError::DegenerateJacobian { .. }
        ));
    }
}
