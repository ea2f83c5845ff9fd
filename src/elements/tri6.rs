//! Quadratic 6-node triangle kernel. Nodes 1-3 are corners, 4 is the
//! midside of edge 1-2, 5 of edge 2-3, 6 of edge 1-3.

use super::{ElementKernel, QuadraturePoint};

pub struct Tri6;

impl ElementKernel for Tri6 {
    fn num_nodes(&self) -> usize {
        6
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        vec![
            QuadraturePoint { xi: 0.5, eta: 0.5, zeta: 0.0, weight: 1.0 / 6.0 },
            QuadraturePoint { xi: 0.0, eta: 0.5, zeta: 0.0, weight: 1.0 / 6.0 },
            QuadraturePoint { xi: 0.5, eta: 0.0, zeta: 0.0, weight: 1.0 / 6.0 },
        ]
    }

    fn shape_functions(&self, xi: f64, eta: f64, _zeta: f64) -> Vec<f64> {
        let l1 = 1.0 - xi - eta;
        let l2 = xi;
        let l3 = eta;
        vec![
            l1 * (2.0 * l1 - 1.0),
            l2 * (2.0 * l2 - 1.0),
            l3 * (2.0 * l3 - 1.0),
            4.0 * l1 * l2,
            4.0 * l2 * l3,
            4.0 * l1 * l3,
        ]
    }

    fn shape_derivatives_natural(&self, xi: f64, eta: f64, _zeta: f64) -> Vec<[f64; 3]> {
        let l1 = 1.0 - xi - eta;
        let l2 = xi;
        let l3 = eta;
        vec![
            [-(4.0 * l1 - 1.0), -(4.0 * l1 - 1.0), 0.0],
            [4.0 * l2 - 1.0, 0.0, 0.0],
            [0.0, 4.0 * l3 - 1.0, 0.0],
            [4.0 * (l1 - l2), -4.0 * l2, 0.0],
            [4.0 * l3, 4.0 * l2, 0.0],
            [-4.0 * l3, 4.0 * (l1 - l3), 0.0],
        ]
    }
}
