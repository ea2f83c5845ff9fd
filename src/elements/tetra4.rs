//! Linear 4-node tetrahedral kernel.
//!
//! Natural coordinates are volume (barycentric) coordinates
//! `L1 = 1 - xi - eta - zeta`, `L2 = xi`, `L3 = eta`, `L4 = zeta`, with
//! node 1 at the origin of natural space.

use super::{ElementKernel, QuadraturePoint};

pub struct Tetra4;

impl ElementKernel for Tetra4 {
    fn num_nodes(&self) -> usize {
        4
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        // Single-point rule at the centroid, weight 1/6 (the tetrahedron's
        // reference volume), per §4.1.
        vec![QuadraturePoint {
            xi: 0.25,
            eta: 0.25,
            zeta: 0.25,
            weight: 1.0 / 6.0,
        }]
    }

    fn shape_functions(&self, xi: f64, eta: f64, zeta: f64) -> Vec<f64> {
        vec![1.0 - xi - eta - zeta, xi, eta, zeta]
    }

    fn shape_derivatives_natural(&self, _xi: f64, _eta: f64, _zeta: f64) -> Vec<[f64; 3]> {
        vec![[-1.0, -1.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
    }
}
