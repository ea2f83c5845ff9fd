//! Element kernel library (C4): shape functions, Jacobians,
//! strain-displacement and constitutive matrices, integrated by Gauss
//! quadrature.
//!
//! [`ElementKind`] (in `crate::mesh`) is the broad mesh-level tag drawn
//! from `{Beam, Triangle, Quad, Tetra, Hexa, Pyramid, Prism}`. Only a
//! subset of those kinds has a supported kernel, matching the shape
//! functions actually specified: linear Tetra, linear Hexa, linear and
//! quadratic Triangle, and linear Quad. [`KernelKind`] is that narrower,
//! kernel-level dispatch; mapping a mesh element to its `KernelKind` is
//! `KernelKind::for_element`, which returns `None` for kinds (or node
//! counts) with no supported kernel rather than panicking.

mod hexa8;
mod quad4;
mod tetra4;
mod tri3;
mod tri6;

pub use hexa8::Hexa8;
pub use quad4::Quad4;
pub use tetra4::Tetra4;
pub use tri3::Tri3;
pub use tri6::Tri6;

use nalgebra::{DMatrix, Matrix3};

use crate::error::{FeaError, Result};
use crate::materials::Material;
use crate::mesh::{Element, ElementKind, Node};

/// A single Gauss quadrature sample: natural coordinates and weight.
#[derive(Debug, Clone, Copy)]
pub struct QuadraturePoint {
    pub xi: f64,
    pub eta: f64,
    pub zeta: f64,
    pub weight: f64,
}

/// Per-quadrature-point kernel evaluation: shape functions, their
/// global-coordinate derivatives, the Jacobian, and its determinant.
pub struct KernelEval {
    pub n: Vec<f64>,
    /// `dN/dx, dN/dy, dN/dz` per node (global derivatives).
    pub d_n_global: Vec<[f64; 3]>,
    pub jacobian: Matrix3<f64>,
    pub det_j: f64,
}

/// The element-kernel contract from §4.1: shape functions, natural
/// derivatives, and Gauss quadrature rule for one element kind.
pub trait ElementKernel {
    fn num_nodes(&self) -> usize;

    /// Quadrature rule (points and weights) for this kind, per §4.1's
    /// minimums. Implementations must not hard-code a finer rule.
    fn quadrature(&self) -> Vec<QuadraturePoint>;

    /// Shape-function vector `N(xi, eta, zeta)`.
    fn shape_functions(&self, xi: f64, eta: f64, zeta: f64) -> Vec<f64>;

    /// Natural-coordinate derivatives `dN/dxi, dN/deta, dN/dzeta` per
    /// node, i.e. `dN in R^{n x 3}` stored node-major.
    fn shape_derivatives_natural(&self, xi: f64, eta: f64, zeta: f64) -> Vec<[f64; 3]>;
}

/// Evaluate a kernel at one quadrature point: Jacobian, its determinant
/// (checked against the degeneracy floor), and global shape-function
/// derivatives.
pub fn evaluate(
    kernel: &dyn ElementKernel,
    element_id: i64,
    nodes: &[Node],
    xi: f64,
    eta: f64,
    zeta: f64,
) -> Result<KernelEval> {
    let n = kernel.shape_functions(xi, eta, zeta);
    let d_n_natural = kernel.shape_derivatives_natural(xi, eta, zeta);

    let mut jacobian = Matrix3::zeros();
    for (i, node) in nodes.iter().enumerate() {
        let [dxi, deta, dzeta] = d_n_natural[i];
        jacobian[(0, 0)] += dxi * node.x;
        jacobian[(0, 1)] += dxi * node.y;
        jacobian[(0, 2)] += dxi * node.z;
        jacobian[(1, 0)] += deta * node.x;
        jacobian[(1, 1)] += deta * node.y;
        jacobian[(1, 2)] += deta * node.z;
        jacobian[(2, 0)] += dzeta * node.x;
        jacobian[(2, 1)] += dzeta * node.y;
        jacobian[(2, 2)] += dzeta * node.z;
    }

    let det_j = jacobian.determinant();
    if det_j.abs() <= 1e-10 {
        return Err(FeaError::DegenerateJacobian { element_id, det_j });
    }

    let j_inv = jacobian
        .try_inverse()
        .ok_or(FeaError::DegenerateJacobian { element_id, det_j })?;

    let d_n_global: Vec<[f64; 3]> = d_n_natural
        .iter()
        .map(|&[dxi, deta, dzeta]| {
            let natural = nalgebra::Vector3::new(dxi, deta, dzeta);
            let global = j_inv * natural;
            [global[0], global[1], global[2]]
        })
        .collect();

    Ok(KernelEval {
        n,
        d_n_global,
        jacobian,
        det_j,
    })
}

/// Strain-displacement matrix `B in R^{6 x 3n}` for a 3D mechanical
/// element, engineering-strain ordered `[exx, eyy, ezz, gxy, gyz, gxz]`.
pub fn strain_displacement_matrix(eval: &KernelEval) -> DMatrix<f64> {
    let n = eval.n.len();
    let mut b = DMatrix::zeros(6, 3 * n);
    for i in 0..n {
        let [dx, dy, dz] = eval.d_n_global[i];
        let c = i * 3;
        b[(0, c)] = dx;
        b[(1, c + 1)] = dy;
        b[(2, c + 2)] = dz;
        b[(3, c)] = dy;
        b[(3, c + 1)] = dx;
        b[(4, c + 1)] = dz;
        b[(4, c + 2)] = dy;
        b[(5, c + 2)] = dx;
        b[(5, c)] = dz;
    }
    b
}

/// Thermal strain-displacement matrix `B_t in R^{3 x n}`.
pub fn thermal_gradient_matrix(eval: &KernelEval) -> DMatrix<f64> {
    let n = eval.n.len();
    let mut b_t = DMatrix::zeros(3, n);
    for i in 0..n {
        let [dx, dy, dz] = eval.d_n_global[i];
        b_t[(0, i)] = dx;
        b_t[(1, i)] = dy;
        b_t[(2, i)] = dz;
    }
    b_t
}

/// Mechanical constitutive matrix for an isotropic material: the
/// classical 6x6 linear-elastic matrix.
pub fn isotropic_constitutive_matrix(material: &Material) -> Result<DMatrix<f64>> {
    let e = material.youngs_modulus().map_err(|_| {
        FeaError::InvalidProperty(format!(
            "material '{}' is missing youngs_modulus for a mechanical element",
            material.name
        ))
    })?;
    let nu = material.poissons_ratio().map_err(|_| {
        FeaError::InvalidProperty(format!(
            "material '{}' is missing poissons_ratio for a mechanical element",
            material.name
        ))
    })?;

    let c = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let diag = 1.0 - nu;
    let shear = (1.0 - 2.0 * nu) / 2.0;

    let mut d = DMatrix::zeros(6, 6);
    d[(0, 0)] = diag * c;
    d[(0, 1)] = nu * c;
    d[(0, 2)] = nu * c;
    d[(1, 0)] = nu * c;
    d[(1, 1)] = diag * c;
    d[(1, 2)] = nu * c;
    d[(2, 0)] = nu * c;
    d[(2, 1)] = nu * c;
    d[(2, 2)] = diag * c;
    d[(3, 3)] = shear * c;
    d[(4, 4)] = shear * c;
    d[(5, 5)] = shear * c;
    Ok(d)
}

/// Thermal constitutive matrix for an isotropic material: `k * I3`.
pub fn isotropic_thermal_conductivity_matrix(material: &Material) -> Result<DMatrix<f64>> {
    let k = material.get("thermal_conductivity")?;
    Ok(DMatrix::from_diagonal_element(3, 3, k))
}

/// Kernel-level dispatch for the element kinds with a supported
/// element kernel. Resolving an `Element` to a `KernelKind` is
/// infallible bookkeeping (`for_element`); actually *using* an
/// unsupported kind in an assembly is an assembly error.
pub enum KernelKind {
    Tetra4(Tetra4),
    Hexa8(Hexa8),
    Tri3(Tri3),
    Tri6(Tri6),
    Quad4(Quad4),
}

impl KernelKind {
    pub fn for_element(element: &Element) -> Option<Self> {
        match (element.kind, element.nodes.len()) {
            (ElementKind::Tetra, 4) => Some(KernelKind::Tetra4(Tetra4)),
            (ElementKind::Hexa, 8) => Some(KernelKind::Hexa8(Hexa8)),
            (ElementKind::Triangle, 3) => Some(KernelKind::Tri3(Tri3)),
            (ElementKind::Triangle, 6) => Some(KernelKind::Tri6(Tri6)),
            (ElementKind::Quad, 4) => Some(KernelKind::Quad4(Quad4)),
            _ => None,
        }
    }

    pub fn kernel(&self) -> &dyn ElementKernel {
        match self {
            KernelKind::Tetra4(k) => k,
            KernelKind::Hexa8(k) => k,
            KernelKind::Tri3(k) => k,
            KernelKind::Tri6(k) => k,
            KernelKind::Quad4(k) => k,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::ElementKind;

    #[test]
    fn unsupported_kind_resolves_to_none() {
        let beam = Element::new(1, ElementKind::Beam, vec![1, 2]);
        assert!(KernelKind::for_element(&beam).is_none());
    }

    #[test]
    fn hexa8_resolves() {
        let hexa = Element::new(1, ElementKind::Hexa, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(KernelKind::for_element(&hexa).is_some());
    }
}
