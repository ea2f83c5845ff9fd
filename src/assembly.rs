//! Global matrix and load-vector assembly (C5).
//!
//! Every assembler here follows the same shape: sweep elements once,
//! push `(row, col, value)` triplets into a [`CooMatrix`], then build
//! the [`CsrMatrix`] once from the whole triplet stream. Duplicate
//! triplets are summed by `nalgebra_sparse` during the COO-to-CSR
//! conversion, so overlapping element contributions at shared nodes
//! combine for free. No assembler ever mutates a sparse matrix
//! in place per element.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::conditions::Load;
use crate::elements::{
    evaluate, isotropic_constitutive_matrix, isotropic_thermal_conductivity_matrix,
    strain_displacement_matrix, thermal_gradient_matrix, ElementKernel, KernelKind,
};
use crate::error::{FeaError, Result};
use crate::materials::{Material, MaterialHandle, MaterialLibrary};
use crate::mesh::{DofScheme, Element, Mesh, Node};

/// A prescribed-DOF / force pair is always looked up through this map:
/// node id to the node's first (lowest-numbered) global DOF index.
pub type DofMap = HashMap<i64, usize>;

pub(crate) fn element_nodes(mesh: &Mesh, element: &Element) -> Result<Vec<Node>> {
    element
        .nodes
        .iter()
        .map(|&id| {
            mesh.get_node(id).copied().ok_or_else(|| {
                FeaError::InvalidMesh(format!(
                    "element {} references unknown node {}",
                    element.id, id
                ))
            })
        })
        .collect()
}

pub(crate) fn element_dofs(element: &Element, dof_map: &DofMap, dofs_per_node: usize) -> Result<Vec<usize>> {
    let mut dofs = Vec::with_capacity(element.nodes.len() * dofs_per_node);
    for &id in &element.nodes {
        let base = *dof_map.get(&id).ok_or_else(|| {
            FeaError::InvalidMesh(format!(
                "element {} references node {} with no assigned DOF",
                element.id, id
            ))
        })?;
        for k in 0..dofs_per_node {
            dofs.push(base + k);
        }
    }
    Ok(dofs)
}

/// Resolves the material actually governing an element: an element
/// group's `material_override` wins over the element's own handle.
fn resolve_material(mesh: &Mesh, element: &Element) -> Option<MaterialHandle> {
    for group in mesh.element_groups() {
        if let Some(handle) = group.material_override {
            if group.element_ids.contains(&element.id) {
                return Some(handle);
            }
        }
    }
    element.material
}

pub(crate) fn material_for(mesh: &Mesh, materials: &MaterialLibrary, element: &Element) -> Result<(MaterialHandle, Material)> {
    let handle = resolve_material(mesh, element).ok_or_else(|| {
        FeaError::InvalidProperty(format!("element {} has no assigned material", element.id))
    })?;
    let material = materials.get(handle).cloned().ok_or_else(|| {
        FeaError::InvalidProperty(format!(
            "element {} references an unknown material handle",
            element.id
        ))
    })?;
    Ok((handle, material))
}

pub(crate) fn kernel_for(element: &Element) -> Result<KernelKind> {
    KernelKind::for_element(element).ok_or_else(|| {
        FeaError::InvalidMesh(format!(
            "element {} of kind {:?} with {} nodes has no supported element kernel",
            element.id,
            element.kind,
            element.nodes.len()
        ))
    })
}

fn push_dense_block(coo: &mut CooMatrix<f64>, dofs: &[usize], block: &DMatrix<f64>) {
    for (i, &row) in dofs.iter().enumerate() {
        for (j, &col) in dofs.iter().enumerate() {
            let v = block[(i, j)];
            if v != 0.0 {
                coo.push(row, col, v);
            }
        }
    }
}

/// Scalar bilinear-form element matrix `Σ N^T N c |det J| w`, used for
/// both the mass and thermal-capacity forms (which differ only in the
/// scalar coefficient `c` and the number of DOFs per node).
fn scalar_bilinear_matrix(
    kernel: &dyn ElementKernel,
    element_id: i64,
    nodes: &[Node],
    coefficient: f64,
) -> Result<DMatrix<f64>> {
    let n = kernel.num_nodes();
    let mut m = DMatrix::<f64>::zeros(n, n);
    for qp in kernel.quadrature() {
        let eval = evaluate(kernel, element_id, nodes, qp.xi, qp.eta, qp.zeta)?;
        let nvec = DVector::from_vec(eval.n.clone());
        m += (&nvec * nvec.transpose()) * (coefficient * eval.det_j.abs() * qp.weight);
    }
    Ok(m)
}

/// Tiles an `n x n` scalar matrix into block-diagonal form for a
/// multi-DOF-per-node scheme: entry `(i, j)` becomes `dofs_per_node`
/// diagonal entries at `(i*dpn+k, j*dpn+k)`, zero off those diagonals.
fn expand_diagonal_blocks(scalar: &DMatrix<f64>, dofs_per_node: usize) -> DMatrix<f64> {
    let n = scalar.nrows();
    let mut expanded = DMatrix::<f64>::zeros(n * dofs_per_node, n * dofs_per_node);
    for i in 0..n {
        for j in 0..n {
            let v = scalar[(i, j)];
            for k in 0..dofs_per_node {
                expanded[(i * dofs_per_node + k, j * dofs_per_node + k)] = v;
            }
        }
    }
    expanded
}

/// Assembles the global mechanical stiffness matrix `K` per §4.2:
/// `Kₑ = Σ Bᵀ D B |det J| w` at each quadrature point, summed into
/// `(row, col, value)` triplets and built once into CSR.
pub fn assemble_stiffness(
    mesh: &Mesh,
    materials: &MaterialLibrary,
    dof_map: &DofMap,
    num_dofs: usize,
) -> Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(num_dofs, num_dofs);
    for element in mesh.elements() {
        let kernel_kind = kernel_for(element)?;
        let kernel = kernel_kind.kernel();
        let (_, material) = material_for(mesh, materials, element)?;
        let d = isotropic_constitutive_matrix(&material)?;
        let nodes = element_nodes(mesh, element)?;
        let dofs = element_dofs(element, dof_map, DofScheme::Mechanical3.dofs_per_node())?;

        let mut ke = DMatrix::<f64>::zeros(dofs.len(), dofs.len());
        for qp in kernel.quadrature() {
            let eval = evaluate(kernel, element.id, &nodes, qp.xi, qp.eta, qp.zeta)?;
            let b = strain_displacement_matrix(&eval);
            ke += (&b.transpose() * &d * &b) * (eval.det_j.abs() * qp.weight);
        }
        push_dense_block(&mut coo, &dofs, &ke);
    }
    Ok(CsrMatrix::from(&coo))
}

/// Assembles the consistent global mass matrix `M`, per §4.2.
pub fn assemble_mass(
    mesh: &Mesh,
    materials: &MaterialLibrary,
    dof_map: &DofMap,
    num_dofs: usize,
) -> Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(num_dofs, num_dofs);
    for element in mesh.elements() {
        let kernel_kind = kernel_for(element)?;
        let kernel = kernel_kind.kernel();
        let (_, material) = material_for(mesh, materials, element)?;
        let rho = material.density()?;
        let nodes = element_nodes(mesh, element)?;
        let dofs = element_dofs(element, dof_map, DofScheme::Mechanical3.dofs_per_node())?;

        let scalar = scalar_bilinear_matrix(kernel, element.id, &nodes, rho)?;
        let me = expand_diagonal_blocks(&scalar, DofScheme::Mechanical3.dofs_per_node());
        push_dense_block(&mut coo, &dofs, &me);
    }
    Ok(CsrMatrix::from(&coo))
}

/// Rayleigh damping `C = αM + βK`, built directly from the already
/// assembled `K` and `M` triplet streams rather than re-sweeping
/// elements.
pub fn rayleigh_damping(k: &CsrMatrix<f64>, m: &CsrMatrix<f64>, alpha: f64, beta: f64) -> CsrMatrix<f64> {
    let n = k.nrows();
    let mut coo = CooMatrix::new(n, n);
    for (row, col, value) in m.triplet_iter() {
        if alpha != 0.0 {
            coo.push(row, col, alpha * value);
        }
    }
    for (row, col, value) in k.triplet_iter() {
        if beta != 0.0 {
            coo.push(row, col, beta * value);
        }
    }
    CsrMatrix::from(&coo)
}

/// Assembles the global thermal conductivity matrix `K_t`, per §4.2:
/// `K_tₑ = Σ B_tᵀ D_t B_t |det J| w`.
pub fn assemble_thermal_conductivity(
    mesh: &Mesh,
    materials: &MaterialLibrary,
    dof_map: &DofMap,
    num_dofs: usize,
) -> Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(num_dofs, num_dofs);
    for element in mesh.elements() {
        let kernel_kind = kernel_for(element)?;
        let kernel = kernel_kind.kernel();
        let (_, material) = material_for(mesh, materials, element)?;
        let d_t = isotropic_thermal_conductivity_matrix(&material)?;
        let nodes = element_nodes(mesh, element)?;
        let dofs = element_dofs(element, dof_map, DofScheme::Thermal1.dofs_per_node())?;

        let mut ke = DMatrix::<f64>::zeros(dofs.len(), dofs.len());
        for qp in kernel.quadrature() {
            let eval = evaluate(kernel, element.id, &nodes, qp.xi, qp.eta, qp.zeta)?;
            let b_t = thermal_gradient_matrix(&eval);
            ke += (&b_t.transpose() * &d_t * &b_t) * (eval.det_j.abs() * qp.weight);
        }
        push_dense_block(&mut coo, &dofs, &ke);
    }
    Ok(CsrMatrix::from(&coo))
}

/// Assembles the global thermal capacity matrix `C_t`, per §4.2:
/// `C_tₑ = Σ Nᵀ N ρ cₚ |det J| w`.
pub fn assemble_thermal_capacity(
    mesh: &Mesh,
    materials: &MaterialLibrary,
    dof_map: &DofMap,
    num_dofs: usize,
) -> Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(num_dofs, num_dofs);
    for element in mesh.elements() {
        let kernel_kind = kernel_for(element)?;
        let kernel = kernel_kind.kernel();
        let (_, material) = material_for(mesh, materials, element)?;
        let rho = material.density()?;
        let cp = material.get("specific_heat")?;
        let nodes = element_nodes(mesh, element)?;
        let dofs = element_dofs(element, dof_map, DofScheme::Thermal1.dofs_per_node())?;

        let ke = scalar_bilinear_matrix(kernel, element.id, &nodes, rho * cp)?;
        push_dense_block(&mut coo, &dofs, &ke);
    }
    Ok(CsrMatrix::from(&coo))
}

/// Assembles the mechanical load vector from point forces and body
/// forces, per §4.2. Loads whose group is missing from the mesh fail
/// with `InvalidLoad`; loads that do not apply to a translational DOF
/// scheme (e.g. `Moment`, which would need rotational DOFs this crate
/// does not model) are skipped.
pub fn assemble_mechanical_loads(
    mesh: &Mesh,
    materials: &MaterialLibrary,
    loads: &[Load],
    dof_map: &DofMap,
    num_dofs: usize,
) -> Result<DVector<f64>> {
    let mut f = DVector::<f64>::zeros(num_dofs);

    for load in loads {
        match load {
            Load::PointForce { group, fx, fy, fz, .. } => {
                let node_group = mesh.get_node_group(group).ok_or_else(|| {
                    FeaError::InvalidLoad(format!("point force '{}' targets unknown group '{}'", load.name(), group))
                })?;
                for &node_id in &node_group.node_ids {
                    let base = *dof_map.get(&node_id).ok_or_else(|| {
                        FeaError::InvalidLoad(format!("node {} has no assigned DOF", node_id))
                    })?;
                    f[base] += fx;
                    f[base + 1] += fy;
                    f[base + 2] += fz;
                }
            }
            Load::BodyForce { group, bx, by, bz, .. } => {
                let element_group = mesh.get_element_group(group).ok_or_else(|| {
                    FeaError::InvalidLoad(format!("body force '{}' targets unknown group '{}'", load.name(), group))
                })?;
                for &element_id in &element_group.element_ids {
                    let element = mesh.get_element(element_id).ok_or_else(|| {
                        FeaError::InvalidLoad(format!("element group '{}' references unknown element {}", group, element_id))
                    })?;
                    let kernel_kind = kernel_for(element)?;
                    let kernel = kernel_kind.kernel();
                    let nodes = element_nodes(mesh, element)?;
                    let dofs = element_dofs(element, dof_map, DofScheme::Mechanical3.dofs_per_node())?;

                    for qp in kernel.quadrature() {
                        let eval = evaluate(kernel, element.id, &nodes, qp.xi, qp.eta, qp.zeta)?;
                        let scale = eval.det_j.abs() * qp.weight;
                        for (i, &ni) in eval.n.iter().enumerate() {
                            f[dofs[i * 3]] += ni * bx * scale;
                            f[dofs[i * 3 + 1]] += ni * by * scale;
                            f[dofs[i * 3 + 2]] += ni * bz * scale;
                        }
                    }
                }
            }
            Load::SurfacePressure { group, magnitude, .. } => {
                assemble_surface_pressure(mesh, group, *magnitude, dof_map, &mut f)?;
            }
            _ => {}
        }
    }

    Ok(f)
}

/// Outward-normal-weighted surface pressure, per §4.2: at each facet
/// quadrature point the outward normal comes from the cross product of
/// the two tangent basis vectors `∂x/∂ξ` and `∂x/∂η`; its magnitude is
/// the surface Jacobian used in place of `det(J)`.
fn assemble_surface_pressure(
    mesh: &Mesh,
    group: &str,
    magnitude: f64,
    dof_map: &DofMap,
    f: &mut DVector<f64>,
) -> Result<()> {
    let element_group = mesh.get_element_group(group).ok_or_else(|| {
        FeaError::InvalidLoad(format!("surface pressure targets unknown group '{}'", group))
    })?;
    for &element_id in &element_group.element_ids {
        let element = mesh.get_element(element_id).ok_or_else(|| {
            FeaError::InvalidLoad(format!("element group '{}' references unknown element {}", group, element_id))
        })?;
        let kernel_kind = kernel_for(element)?;
        let kernel = kernel_kind.kernel();
        let nodes = element_nodes(mesh, element)?;
        let dofs = element_dofs(element, dof_map, DofScheme::Mechanical3.dofs_per_node())?;

        for qp in kernel.quadrature() {
            let n = kernel.shape_functions(qp.xi, qp.eta, qp.zeta);
            let d_n = kernel.shape_derivatives_natural(qp.xi, qp.eta, qp.zeta);

            let mut tangent_xi = nalgebra::Vector3::zeros();
            let mut tangent_eta = nalgebra::Vector3::zeros();
            for (i, node) in nodes.iter().enumerate() {
                let [dxi, deta, _] = d_n[i];
                tangent_xi += nalgebra::Vector3::new(node.x, node.y, node.z) * dxi;
                tangent_eta += nalgebra::Vector3::new(node.x, node.y, node.z) * deta;
            }
            let normal = tangent_xi.cross(&tangent_eta);
            let scale = normal.norm();
            if scale <= 1e-10 {
                return Err(FeaError::DegenerateJacobian { element_id: element.id, det_j: scale });
            }
            let unit_normal = normal / scale;

            for (i, &ni) in n.iter().enumerate() {
                let force = unit_normal * (ni * magnitude * scale * qp.weight);
                f[dofs[i * 3]] += force.x;
                f[dofs[i * 3 + 1]] += force.y;
                f[dofs[i * 3 + 2]] += force.z;
            }
        }
    }
    Ok(())
}

/// Assembles the thermal load vector, per §4.2: concentrated heat-rate
/// loads at nodes. Volumetric heat generation over an element group is
/// handled the same way with `q` substituted for `heat_rate` wherever
/// a future `Load` variant targets an element group instead of a node
/// group.
pub fn assemble_thermal_loads(mesh: &Mesh, loads: &[Load], dof_map: &DofMap, num_dofs: usize) -> Result<DVector<f64>> {
    let mut q = DVector::<f64>::zeros(num_dofs);
    for load in loads {
        if let Load::Thermal { group, heat_rate, .. } = load {
            let node_group = mesh.get_node_group(group).ok_or_else(|| {
                FeaError::InvalidLoad(format!("thermal load '{}' targets unknown group '{}'", load.name(), group))
            })?;
            for &node_id in &node_group.node_ids {
                let dof = *dof_map.get(&node_id).ok_or_else(|| {
                    FeaError::InvalidLoad(format!("node {} has no assigned DOF", node_id))
                })?;
                q[dof] += heat_rate;
            }
        }
    }
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::Material;
    use crate::mesh::{Element, ElementKind, Mesh, Node};

    fn unit_cube_mesh() -> (Mesh, MaterialLibrary) {
        let mut mesh = Mesh::new();
        let coords = [
            (1, 0.0, 0.0, 0.0),
            (2, 1.0, 0.0, 0.0),
            (3, 1.0, 1.0, 0.0),
            (4, 0.0, 1.0, 0.0),
            (5, 0.0, 0.0, 1.0),
            (6, 1.0, 0.0, 1.0),
            (7, 1.0, 1.0, 1.0),
            (8, 0.0, 1.0, 1.0),
        ];
        for (id, x, y, z) in coords {
            mesh.add_node(Node::new(id, x, y, z)).unwrap();
        }
        let mut materials = MaterialLibrary::new();
        let steel = materials.add(Material::isotropic("steel", 210e9, 0.3, 7800.0).unwrap());
        mesh.add_element(
            Element::new(1, ElementKind::Hexa, vec![1, 2, 3, 4, 5, 6, 7, 8]).with_material(steel),
        )
        .unwrap();
        (mesh, materials)
    }

    #[test]
    fn stiffness_is_symmetric() {
        let (mesh, materials) = unit_cube_mesh();
        let (num_dofs, dof_map) = mesh.assign_dofs(DofScheme::Mechanical3);
        let k = assemble_stiffness(&mesh, &materials, &dof_map, num_dofs).unwrap();
        let dense = k.to_dense();
        let scale = dense.abs().max().max(1.0);
        for i in 0..num_dofs {
            for j in 0..num_dofs {
                assert!(
                    (dense[(i, j)] - dense[(j, i)]).abs() <= 1e-9 * scale,
                    "K not symmetric at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn stiffness_has_zero_energy_for_rigid_translation() {
        let (mesh, materials) = unit_cube_mesh();
        let (num_dofs, dof_map) = mesh.assign_dofs(DofScheme::Mechanical3);
        let k = assemble_stiffness(&mesh, &materials, &dof_map, num_dofs).unwrap();
        let dense = k.to_dense();

        // A rigid translation along x is a zero-energy mode: K * u = 0.
        let mut u = DVector::<f64>::zeros(num_dofs);
        for i in 0..num_dofs / 3 {
            u[i * 3] = 1.0;
        }
        let r = &dense * &u;
        let scale = dense.abs().max().max(1.0);
        for v in r.iter() {
            assert!(
                v.abs() <= 1e-8 * scale,
                "residual {} should be ~0 for rigid mode",
                v
            );
        }
    }

    #[test]
    fn assembly_is_independent_of_element_iteration_order() {
        let mut mesh_a = Mesh::new();
        let mut mesh_b = Mesh::new();
        let coords = [
            (1, 0.0, 0.0, 0.0),
            (2, 1.0, 0.0, 0.0),
            (3, 1.0, 1.0, 0.0),
            (4, 0.0, 1.0, 0.0),
            (5, 0.0, 0.0, 1.0),
            (6, 1.0, 0.0, 1.0),
            (7, 1.0, 1.0, 1.0),
            (8, 0.0, 1.0, 1.0),
            (9, 2.0, 0.0, 0.0),
            (10, 2.0, 1.0, 0.0),
            (11, 2.0, 0.0, 1.0),
            (12, 2.0, 1.0, 1.0),
        ];
        for (id, x, y, z) in coords {
            mesh_a.add_node(Node::new(id, x, y, z)).unwrap();
            mesh_b.add_node(Node::new(id, x, y, z)).unwrap();
        }
        let mut materials = MaterialLibrary::new();
        let steel = materials.add(Material::isotropic("steel", 210e9, 0.3, 7800.0).unwrap());

        let e1 = Element::new(1, ElementKind::Hexa, vec![1, 2, 3, 4, 5, 6, 7, 8]).with_material(steel);
        let e2 = Element::new(2, ElementKind::Hexa, vec![2, 9, 10, 3, 6, 11, 12, 7]).with_material(steel);

        mesh_a.add_element(e1.clone()).unwrap();
        mesh_a.add_element(e2.clone()).unwrap();
        mesh_b.add_element(e2).unwrap();
        mesh_b.add_element(e1).unwrap();

        let (num_dofs, dof_map) = mesh_a.assign_dofs(DofScheme::Mechanical3);
        let ka = assemble_stiffness(&mesh_a, &materials, &dof_map, num_dofs).unwrap().to_dense();
        let kb = assemble_stiffness(&mesh_b, &materials, &dof_map, num_dofs).unwrap().to_dense();

        let max_diff = (&ka - &kb).abs().max();
        assert!(max_diff <= 1e-12 * ka.abs().max().max(1.0));
    }

    #[test]
    fn point_force_sums_to_applied_total() {
        let (mesh, materials) = unit_cube_mesh();
        let (num_dofs, dof_map) = mesh.assign_dofs(DofScheme::Mechanical3);
        let mut mesh = mesh;
        mesh.add_node_group("loaded", vec![5, 6, 7, 8]).unwrap();
        let loads = vec![Load::PointForce {
            name: "p1".to_string(),
            group: "loaded".to_string(),
            fx: 0.0,
            fy: 0.0,
            fz: 100.0,
            variation: crate::conditions::TimeVariation::Static,
        }];
        let f = assemble_mechanical_loads(&mesh, &materials, &loads, &dof_map, num_dofs).unwrap();
        let total_fz: f64 = (0..num_dofs / 3).map(|i| f[i * 3 + 2]).sum();
        assert!((total_fz - 400.0).abs() < 1e-9);
    }
}
