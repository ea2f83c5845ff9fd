//! Linear 3-node triangle kernel (constant-strain triangle), treated
//! as a planar element embedded in 3D with `zeta` unused.

use super::{ElementKernel, QuadraturePoint};

pub struct Tri3;

impl ElementKernel for Tri3 {
    fn num_nodes(&self) -> usize {
        3
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        // 3-point rule at the edge midpoints, weight 1/6 each, per §4.1.
        vec![
            QuadraturePoint { xi: 0.5, eta: 0.5, zeta: 0.0, weight: 1.0 / 6.0 },
            QuadraturePoint { xi: 0.0, eta: 0.5, zeta: 0.0, weight: 1.0 / 6.0 },
            QuadraturePoint { xi: 0.5, eta: 0.0, zeta: 0.0, weight: 1.0 / 6.0 },
        ]
    }

    fn shape_functions(&self, xi: f64, eta: f64, _zeta: f64) -> Vec<f64> {
        vec![1.0 - xi - eta, xi, eta]
    }

    fn shape_derivatives_natural(&self, _xi: f64, _eta: f64, _zeta: f64) -> Vec<[f64; 3]> {
        vec![[-1.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_functions_partition_of_unity() {
        let kernel = Tri3;
        let n = kernel.shape_functions(0.3, 0.4, 0.0);
        let sum: f64 = n.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}
