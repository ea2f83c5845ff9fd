//! Linear static analysis (C9): one-pass orchestration of C4 through
//! C7, then result recovery, per §4.5.

use std::collections::HashMap;

use nalgebra::DVector;

use crate::assembly::{assemble_mechanical_loads, assemble_stiffness, material_for};
use crate::bc_application::{apply_penalty, recover_reactions, resolve_displacement_dofs, PrescribedDof};
use crate::conditions::{BoundaryCondition, Load};
use crate::elements::{evaluate, isotropic_constitutive_matrix, strain_displacement_matrix, KernelKind};
use crate::error::{FeaError, Result};
use crate::linear_solver::{self, LinearSolverKind};
use crate::materials::MaterialLibrary;
use crate::mesh::{DofScheme, Mesh};
use crate::progress::{CancellationToken, NoOpProgress, ProgressSink};
use crate::results::{Displacement, ReactionForce, ResultContainer, Stress, Strain};

/// Integer solver tag written to the `# Solver Type:` metadata line
/// of an exported result file (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    LinearStatic = 1,
    Nonlinear = 2,
    Modal = 3,
    Dynamic = 4,
    ThermalSteady = 5,
    ThermalTransient = 6,
}

fn validate_conditions(mesh: &Mesh, bcs: &[BoundaryCondition], loads: &[Load]) -> Result<()> {
    for bc in bcs {
        if !bc.is_valid(mesh) {
            return Err(FeaError::InvalidBoundaryCondition(format!(
                "'{}' targets a group not present in the mesh",
                bc.name()
            )));
        }
    }
    for load in loads {
        if !load.is_valid(mesh) {
            return Err(FeaError::InvalidLoad(format!(
                "'{}' targets a group not present in the mesh",
                load.name()
            )));
        }
    }
    Ok(())
}

/// Orchestrates a single linear static solve: assemble, apply BCs,
/// solve, recover. Takes mesh/materials/BCs/loads by reference per
/// §5's shared-read resource model; owns its result container
/// exclusively until it returns it to the caller.
pub struct StaticAnalysis<'a> {
    mesh: &'a Mesh,
    materials: &'a MaterialLibrary,
    bcs: &'a [BoundaryCondition],
    loads: &'a [Load],
}

impl<'a> StaticAnalysis<'a> {
    pub fn new(mesh: &'a Mesh, materials: &'a MaterialLibrary, bcs: &'a [BoundaryCondition], loads: &'a [Load]) -> Self {
        Self { mesh, materials, bcs, loads }
    }

    pub fn solve(&self) -> Result<ResultContainer> {
        self.solve_with_progress(&mut NoOpProgress, &CancellationToken::new())
    }

    pub fn solve_with_progress(&self, progress: &mut dyn ProgressSink, cancellation: &CancellationToken) -> Result<ResultContainer> {
        validate_conditions(self.mesh, self.bcs, self.loads)?;
        self.mesh.validate()?;

        if cancellation.is_cancelled() {
            return Err(FeaError::Cancelled);
        }

        // 1. Assign DOFs.
        let (num_dofs, dof_map) = self.mesh.assign_dofs(DofScheme::Mechanical3);
        progress.report(0.1);

        // 2. Assemble K and F.
        let k0 = assemble_stiffness(self.mesh, self.materials, &dof_map, num_dofs)?.to_dense();
        let f0 = assemble_mechanical_loads(self.mesh, self.materials, self.loads, &dof_map, num_dofs)?;
        progress.report(0.4);

        if cancellation.is_cancelled() {
            return Err(FeaError::Cancelled);
        }

        // 3. Apply BCs. Retain the pre-penalty (k0, f0) for reaction
        // recovery (§4.5 step 6).
        let prescribed: Vec<PrescribedDof> = resolve_displacement_dofs(self.mesh, self.bcs, &dof_map)?;
        let (k, f) = apply_penalty(&k0, &f0, &prescribed);
        progress.report(0.5);

        if cancellation.is_cancelled() {
            return Err(FeaError::Cancelled);
        }

        // 4. Solve K u = F.
        let kind = LinearSolverKind::for_problem_size(num_dofs);
        let u = linear_solver::solve(&k, &f, kind)?;
        progress.report(0.8);

        // 5 & 6. Recover results.
        let mut results = ResultContainer::new();
        results.solver_type = Some(SolverKind::LinearStatic as i64);
        self.recover_displacements(&u, &dof_map, &mut results);
        self.recover_element_fields(&u, &dof_map, &mut results)?;
        self.recover_reactions(&k0, &f0, &u, &prescribed, &dof_map, &mut results);
        progress.report(1.0);

        Ok(results)
    }

    fn recover_displacements(&self, u: &DVector<f64>, dof_map: &HashMap<i64, usize>, results: &mut ResultContainer) {
        for node in self.mesh.nodes() {
            let base = dof_map[&node.id];
            results.displacements.push(
                node.id,
                Displacement {
                    node_id: node.id,
                    x: u[base],
                    y: u[base + 1],
                    z: u[base + 2],
                },
            );
        }
    }

    /// Strain at the element centroid via `ε = B(0,0,0) u_e`, stress
    /// `σ = D ε`, per §4.5 step 5. The evaluation point `(0,0,0)` is
    /// taken literally from the natural-coordinate system regardless
    /// of element kind, matching the specified recovery rule exactly.
    fn recover_element_fields(&self, u: &DVector<f64>, dof_map: &HashMap<i64, usize>, results: &mut ResultContainer) -> Result<()> {
        for element in self.mesh.elements() {
            let kernel_kind = KernelKind::for_element(element).ok_or_else(|| {
                FeaError::InvalidMesh(format!(
                    "element {} of kind {:?} has no supported element kernel",
                    element.id, element.kind
                ))
            })?;
            let kernel = kernel_kind.kernel();
            let nodes: Vec<_> = element
                .nodes
                .iter()
                .map(|&id| *self.mesh.get_node(id).unwrap())
                .collect();
            let eval = evaluate(kernel, element.id, &nodes, 0.0, 0.0, 0.0)?;
            let b = strain_displacement_matrix(&eval);

            let mut ue = DVector::<f64>::zeros(3 * element.nodes.len());
            for (i, &node_id) in element.nodes.iter().enumerate() {
                let base = dof_map[&node_id];
                ue[i * 3] = u[base];
                ue[i * 3 + 1] = u[base + 1];
                ue[i * 3 + 2] = u[base + 2];
            }

            let strain = &b * &ue;
            let (_, material) = material_for(self.mesh, self.materials, element)?;
            let d = isotropic_constitutive_matrix(&material)?;
            let stress = &d * &strain;

            results.strains.push(
                element.id,
                Strain::from_components(element.id, strain[0], strain[1], strain[2], strain[3], strain[4], strain[5]),
            );
            results.stresses.push(
                element.id,
                Stress::from_components(element.id, stress[0], stress[1], stress[2], stress[3], stress[4], stress[5]),
            );
        }
        Ok(())
    }

    fn recover_reactions(
        &self,
        k0: &nalgebra::DMatrix<f64>,
        f0: &DVector<f64>,
        u: &DVector<f64>,
        prescribed: &[PrescribedDof],
        dof_map: &HashMap<i64, usize>,
        results: &mut ResultContainer,
    ) {
        let constrained_dofs: Vec<usize> = prescribed.iter().map(|p| p.dof).collect();
        let reactions = recover_reactions(k0, f0, u, &constrained_dofs);

        let mut by_node: HashMap<i64, [f64; 3]> = HashMap::new();
        for node in self.mesh.nodes() {
            let base = dof_map[&node.id];
            let mut r = [0.0; 3];
            let mut any = false;
            for k in 0..3 {
                if let Some(&v) = reactions.get(&(base + k)) {
                    r[k] = v;
                    any = true;
                }
            }
            if any {
                by_node.insert(node.id, r);
            }
        }
        for (node_id, r) in by_node {
            results.reactions.push(
                node_id,
                ReactionForce {
                    node_id,
                    fx: r[0],
                    fy: r[1],
                    fz: r[2],
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{Axis, TimeVariation};
    use crate::materials::Material;
    use crate::mesh::{Element, ElementKind, Node};

    /// Scenario 1 (§8): unit-cube tension. Fix x=0 face in X, apply a
    /// 1 N total tensile force on x=1 split evenly over its four
    /// corner nodes (the consistent nodal load a uniform 1 Pa pressure
    /// over the unit face would itself produce); expect u_x(x=1) ~= 1/E.
    #[test]
    fn unit_cube_tension_matches_analytic_extension() {
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
        let e = 210e9;
        let steel = materials.add(Material::isotropic("steel", e, 0.3, 7800.0).unwrap());
        mesh.add_element(Element::new(1, ElementKind::Hexa, vec![1, 2, 3, 4, 5, 6, 7, 8]).with_material(steel))
            .unwrap();
        mesh.add_node_group("fixed_x0", vec![1, 4, 5, 8]).unwrap();
        mesh.add_node_group("loaded_x1", vec![2, 3, 6, 7]).unwrap();

        let bcs = vec![
            BoundaryCondition::Displacement {
                name: "fix_x".to_string(),
                group: "fixed_x0".to_string(),
                axis: Axis::X,
                value: 0.0,
            },
            BoundaryCondition::Displacement {
                name: "fix_y".to_string(),
                group: "fixed_x0".to_string(),
                axis: Axis::Y,
                value: 0.0,
            },
            BoundaryCondition::Displacement {
                name: "fix_z".to_string(),
                group: "fixed_x0".to_string(),
                axis: Axis::Z,
                value: 0.0,
            },
        ];
        let loads = vec![Load::PointForce {
            name: "p1".to_string(),
            group: "loaded_x1".to_string(),
            fx: 0.25,
            fy: 0.0,
            fz: 0.0,
            variation: TimeVariation::Static,
        }];

        let analysis = StaticAnalysis::new(&mesh, &materials, &bcs, &loads);
        let results = analysis.solve().unwrap();

        let u1 = results.displacements.get(2).unwrap(); // node 2 at x=1
        let expected = 1.0 / e;
        assert!(
            (u1.x - expected).abs() / expected < 1e-5,
            "u_x={}, expected {}",
            u1.x,
            expected
        );
    }

    #[test]
    fn missing_group_bc_rejected_without_mutating_result() {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0)).unwrap();
        mesh.add_node(Node::new(2, 1.0, 0.0, 0.0)).unwrap();
        mesh.add_node(Node::new(3, 0.0, 1.0, 0.0)).unwrap();
        mesh.add_node(Node::new(4, 0.0, 0.0, 1.0)).unwrap();
        mesh.add_element(Element::new(1, ElementKind::Tetra, vec![1, 2, 3, 4])).unwrap();
        let materials = MaterialLibrary::new();
        let bcs = vec![BoundaryCondition::Displacement {
            name: "bad".to_string(),
            group: "does_not_exist".to_string(),
            axis: Axis::X,
            value: 0.0,
        }];
        let analysis = StaticAnalysis::new(&mesh, &materials, &bcs, &[]);
        let err = analysis.solve().unwrap_err();
        assert!(matches!(err, FeaError::InvalidBoundaryCondition(_)));
    }
}
