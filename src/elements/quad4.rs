//! Bilinear 4-node quadrilateral kernel, treated as a planar element
//! embedded in 3D with `zeta` unused.

use super::{ElementKernel, QuadraturePoint};

pub struct Quad4;

const XI_N: [f64; 4] = [-1.0, 1.0, 1.0, -1.0];
const ETA_N: [f64; 4] = [-1.0, -1.0, 1.0, 1.0];

impl ElementKernel for Quad4 {
    fn num_nodes(&self) -> usize {
        4
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        let gp = 1.0 / f64::sqrt(3.0);
        let mut points = Vec::with_capacity(4);
        for &eta in &[-gp, gp] {
            for &xi in &[-gp, gp] {
                points.push(QuadraturePoint { xi, eta, zeta: 0.0, weight: 1.0 });
            }
        }
        points
    }

    fn shape_functions(&self, xi: f64, eta: f64, _zeta: f64) -> Vec<f64> {
        (0..4)
            .map(|i| (1.0 + xi * XI_N[i]) * (1.0 + eta * ETA_N[i]) / 4.0)
            .collect()
    }

    fn shape_derivatives_natural(&self, xi: f64, eta: f64, _zeta: f64) -> Vec<[f64; 3]> {
        (0..4)
            .map(|i| {
                let dxi = XI_N[i] * (1.0 + eta * ETA_N[i]) / 4.0;
                let deta = (1.0 + xi * XI_N[i]) * ETA_N[i] / 4.0;
                [dxi, deta, 0.0]
            })
            .collect()
    }
}
