//! Modal analysis (C8 + the modal half of C11): the generalized
//! eigenproblem `K phi = lambda M phi`, plus participation factors and
//! effective-mass ratios per §4.7.
//!
//! The back end reduces the assembled system to its free DOFs (the
//! DOFs without a Dirichlet BC), then solves the reduced generalized
//! eigenproblem by a dense Cholesky transform: factor `M_red = L L^T`,
//! form the ordinary symmetric eigenproblem `K* = L^-1 K_red L^-T`,
//! solve it with `nalgebra_lapack::SymmetricEigen` (LAPACK `dsyev`,
//! ascending order), then recover `phi_red = L^-T psi` and scatter it
//! back into the full DOF space with zeros at constrained DOFs. This
//! produces mass-normalized mode shapes (`PhiᵀMPhi = I`) for free,
//! without a separate normalization pass. A Lanczos or
//! subspace-iteration back end would scale further out in DOF count
//! without densifying the reduced `M`; this crate's
//! demonstration-scale target makes the dense transform the simpler
//! and more auditable choice (see DESIGN.md).

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use nalgebra_lapack::SymmetricEigen;

use crate::assembly::{assemble_mass, assemble_stiffness};
use crate::bc_application::resolve_displacement_dofs;
use crate::conditions::BoundaryCondition;
use crate::error::{FeaError, Result};
use crate::materials::MaterialLibrary;
use crate::mesh::{DofScheme, Mesh};
use crate::results::{Frequency, ModeShape, ResultContainer};

/// Eigenvalues at or below this floor are treated as numerical noise
/// around a removed rigid-body mode rather than a genuine near-zero
/// flexible mode.
const EIGENVALUE_FLOOR: f64 = 1e-10;

/// One solved mode: eigenvalue-derived frequency data plus the
/// mass-normalized shape vector over every global DOF (zero at
/// constrained DOFs), and the participation/effective-mass figures
/// from §4.7.
#[derive(Debug, Clone)]
pub struct Mode {
    pub frequency: Frequency,
    pub shape: DVector<f64>,
    pub participation_factor: [f64; 3],
    pub effective_mass: [f64; 3],
    pub effective_mass_ratio: [f64; 3],
}

/// Orchestrates a modal extraction: assemble K and M, apply Dirichlet
/// BCs (displacement/symmetry only, per §4.7 — no load is involved),
/// solve for the lowest `num_modes` eigenpairs.
pub struct ModalAnalysis<'a> {
    mesh: &'a Mesh,
    materials: &'a MaterialLibrary,
    bcs: &'a [BoundaryCondition],
    num_modes: usize,
}

impl<'a> ModalAnalysis<'a> {
    pub fn new(mesh: &'a Mesh, materials: &'a MaterialLibrary, bcs: &'a [BoundaryCondition], num_modes: usize) -> Self {
        Self { mesh, materials, bcs, num_modes }
    }

    pub fn solve(&self) -> Result<(ResultContainer, Vec<Mode>)> {
        if self.num_modes == 0 {
            return Err(FeaError::InvalidSettings("num_modes must be >= 1".to_string()));
        }
        self.mesh.validate()?;

        let (num_dofs, dof_map) = self.mesh.assign_dofs(DofScheme::Mechanical3);
        let k_full = assemble_stiffness(self.mesh, self.materials, &dof_map, num_dofs)?.to_dense();
        let m_full = assemble_mass(self.mesh, self.materials, &dof_map, num_dofs)?.to_dense();

        let prescribed = resolve_displacement_dofs(self.mesh, self.bcs, &dof_map)?;
        let constrained: std::collections::HashSet<usize> = prescribed.iter().map(|p| p.dof).collect();
        let free: Vec<usize> = (0..num_dofs).filter(|d| !constrained.contains(d)).collect();
        let n_free = free.len();
        if n_free == 0 {
            return Err(FeaError::InvalidBoundaryCondition("every DOF is constrained; no free DOFs for a modal analysis".to_string()));
        }

        let mut k_red = DMatrix::<f64>::zeros(n_free, n_free);
        let mut m_red = DMatrix::<f64>::zeros(n_free, n_free);
        for (i_red, &i_full) in free.iter().enumerate() {
            for (j_red, &j_full) in free.iter().enumerate() {
                k_red[(i_red, j_red)] = k_full[(i_full, j_full)];
                m_red[(i_red, j_red)] = m_full[(i_full, j_full)];
            }
        }

        let chol_m = nalgebra::Cholesky::new(m_red).ok_or(FeaError::NotPositiveDefinite)?;
        let l = chol_m.l();
        let l_inv = l.clone().try_inverse().ok_or(FeaError::Singular)?;
        let k_star = &l_inv * &k_red * l_inv.transpose();

        let eigen = SymmetricEigen::new(k_star);
        let l_inv_t = l_inv.transpose();

        let mut pairs: Vec<(f64, DVector<f64>)> = Vec::new();
        for i in 0..n_free {
            let lambda = eigen.eigenvalues[i];
            if lambda > EIGENVALUE_FLOOR {
                let psi = eigen.eigenvectors.column(i).clone_owned();
                pairs.push((lambda, &l_inv_t * psi));
            }
        }
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let num_modes = self.num_modes.min(pairs.len());
        if num_modes == 0 {
            return Err(FeaError::EigenproblemFailed);
        }

        let m_total: f64 = (0..num_dofs).map(|i| m_full[(i, i)]).sum();

        let mut modes = Vec::with_capacity(num_modes);
        let mut results = ResultContainer::new();

        for (mode_idx, (lambda, phi_red)) in pairs.into_iter().take(num_modes).enumerate() {
            let omega = lambda.sqrt();
            let f_hz = omega / (2.0 * std::f64::consts::PI);
            let period_s = if f_hz > 0.0 { 1.0 / f_hz } else { f64::INFINITY };

            let mut phi = DVector::<f64>::zeros(num_dofs);
            for (i_red, &i_full) in free.iter().enumerate() {
                phi[i_full] = phi_red[i_red];
            }

            let mut participation = [0.0; 3];
            let mut effective_mass = [0.0; 3];
            for (axis, participation_slot) in participation.iter_mut().enumerate() {
                let mut r = DVector::<f64>::zeros(num_dofs);
                for i in 0..num_dofs / 3 {
                    r[i * 3 + axis] = 1.0;
                }
                let gamma = (phi.transpose() * &m_full * &r)[(0, 0)];
                *participation_slot = gamma;
                effective_mass[axis] = gamma * gamma;
            }
            let effective_mass_ratio = [
                effective_mass[0] / m_total,
                effective_mass[1] / m_total,
                effective_mass[2] / m_total,
            ];

            let frequency = Frequency {
                mode_number: mode_idx + 1,
                f_hz,
                period_s,
                omega_rad_s: omega,
            };
            results.frequencies.push(frequency);

            for node in self.mesh.nodes() {
                let base = dof_map[&node.id];
                results.mode_shapes.push(ModeShape {
                    node_id: node.id,
                    mode_number: mode_idx + 1,
                    x: phi[base],
                    y: phi[base + 1],
                    z: phi[base + 2],
                });
            }

            modes.push(Mode {
                frequency,
                shape: phi,
                participation_factor: participation,
                effective_mass,
                effective_mass_ratio,
            });
        }

        Ok((results, modes))
    }
}

/// Verifies `PhiᵀMPhi = I_k` within the §8 invariant 8 tolerance, for
/// callers that want to assert the normalization contract themselves.
pub fn mass_orthonormality_residual(modes: &[Mode], m: &DMatrix<f64>) -> f64 {
    let mut max_residual = 0.0f64;
    for (i, mode_i) in modes.iter().enumerate() {
        for (j, mode_j) in modes.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            let value = (mode_i.shape.transpose() * m * &mode_j.shape)[(0, 0)];
            max_residual = max_residual.max((value - expected).abs());
        }
    }
    max_residual
}

/// Node-to-global-DOF map, re-exposed for callers (e.g. the dynamic
/// solver) that need to project a mode shape back onto node ids
/// without re-running `assign_dofs` themselves.
pub fn dof_map_for(mesh: &Mesh) -> HashMap<i64, usize> {
    mesh.assign_dofs(DofScheme::Mechanical3).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Axis;
    use crate::materials::Material;
    use crate::mesh::{Element, ElementKind, Node};

    /// Scenario 3 (§8): modal analysis of a fixed-free rod modeled as
    /// a stack of hexahedra along x, fixed at x=0, free elsewhere.
    /// First longitudinal mode f1 ~= (1/4L) sqrt(E/rho).
    fn fixed_free_rod(n_elements: usize, length: f64, e: f64, rho: f64) -> (Mesh, MaterialLibrary, Vec<BoundaryCondition>) {
        let mut mesh = Mesh::new();
        let mut materials = MaterialLibrary::new();
        let steel = materials.add(Material::isotropic("rod", e, 0.0, rho).unwrap());

        let dx = length / n_elements as f64;
        let side = 0.1;
        let mut node_id = 1;
        let mut layer_ids: Vec<[i64; 4]> = Vec::new();
        for layer in 0..=n_elements {
            let x = layer as f64 * dx;
            let ids = [node_id, node_id + 1, node_id + 2, node_id + 3];
            mesh.add_node(Node::new(ids[0], x, 0.0, 0.0)).unwrap();
            mesh.add_node(Node::new(ids[1], x, side, 0.0)).unwrap();
            mesh.add_node(Node::new(ids[2], x, side, side)).unwrap();
            mesh.add_node(Node::new(ids[3], x, 0.0, side)).unwrap();
            layer_ids.push(ids);
            node_id += 4;
        }
        let mut elem_id = 1;
        for layer in 0..n_elements {
            let a = layer_ids[layer];
            let b = layer_ids[layer + 1];
            mesh.add_element(
                Element::new(elem_id, ElementKind::Hexa, vec![a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3]])
                    .with_material(steel),
            )
            .unwrap();
            elem_id += 1;
        }
        let base: Vec<i64> = layer_ids[0].to_vec();
        mesh.add_node_group("base", base).unwrap();

        let bcs = vec![
            BoundaryCondition::Displacement {
                name: "fix_x".to_string(),
                group: "base".to_string(),
                axis: Axis::X,
                value: 0.0,
            },
            BoundaryCondition::Displacement {
                name: "fix_y".to_string(),
                group: "base".to_string(),
                axis: Axis::Y,
                value: 0.0,
            },
            BoundaryCondition::Displacement {
                name: "fix_z".to_string(),
                group: "base".to_string(),
                axis: Axis::Z,
                value: 0.0,
            },
        ];
        (mesh, materials, bcs)
    }

    #[test]
    fn fixed_free_rod_first_mode_matches_analytic_estimate() {
        let e = 210e9;
        let rho = 7800.0;
        let length = 1.0;
        let (mesh, materials, bcs) = fixed_free_rod(12, length, e, rho);

        let analysis = ModalAnalysis::new(&mesh, &materials, &bcs, 3);
        let (results, _modes) = analysis.solve().unwrap();

        let f1 = results.frequencies[0].f_hz;
        let expected = (1.0 / (4.0 * length)) * (e / rho).sqrt();
        assert!(
            (f1 - expected).abs() / expected < 0.05,
            "f1={}, expected ~{}",
            f1,
            expected
        );
    }

    #[test]
    fn eigenvalues_are_nonnegative_and_ascending() {
        let (mesh, materials, bcs) = fixed_free_rod(4, 1.0, 210e9, 7800.0);
        let analysis = ModalAnalysis::new(&mesh, &materials, &bcs, 5);
        let (results, _modes) = analysis.solve().unwrap();
        let mut prev = 0.0;
        for freq in &results.frequencies {
            assert!(freq.omega_rad_s >= 0.0);
            assert!(freq.omega_rad_s + 1e-6 >= prev);
            prev = freq.omega_rad_s;
        }
    }

    #[test]
    fn modes_are_mass_orthonormal() {
        let (mesh, materials, bcs) = fixed_free_rod(4, 1.0, 210e9, 7800.0);
        let analysis = ModalAnalysis::new(&mesh, &materials, &bcs, 4);
        let (_results, modes) = analysis.solve().unwrap();

        let (num_dofs, dof_map) = mesh.assign_dofs(DofScheme::Mechanical3);
        let m = assemble_mass(&mesh, &materials, &dof_map, num_dofs).unwrap().to_dense();
        let residual = mass_orthonormality_residual(&modes, &m);
        assert!(residual < 1e-6, "residual={}", residual);
    }

    #[test]
    fn rejects_zero_num_modes() {
        let (mesh, materials, bcs) = fixed_free_rod(2, 1.0, 210e9, 7800.0);
        let analysis = ModalAnalysis::new(&mesh, &materials, &bcs, 0);
        assert!(analysis.solve().is_err());
    }
}
