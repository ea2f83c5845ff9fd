//! Non-linear static analysis (C10): load-stepped Newton iteration
//! over the C4-C7 pipeline, with line search and adaptive stepping,
//! per §4.6.
//!
//! Element internal force and tangent stiffness are evaluated at the
//! element centroid (natural coordinates `(0,0,0)`), the same
//! single-point convention the linear solver uses for stress/strain
//! recovery — the element's volume (`Σ |det J| w` over its elastic
//! quadrature rule) stands in for the per-point integration weight.

use std::collections::HashMap;

use nalgebra::DVector;

use crate::assembly::{assemble_mechanical_loads, element_dofs, element_nodes, kernel_for, material_for};
use crate::bc_application::{apply_penalty_dof, resolve_displacement_dofs, PrescribedDof, PENALTY};
use crate::conditions::{BoundaryCondition, Load};
use crate::elements::{evaluate, isotropic_constitutive_matrix, strain_displacement_matrix, KernelEval};
use crate::error::{FeaError, Result};
use crate::materials::{Material, MaterialLibrary};
use crate::mesh::{DofScheme, Mesh};
use crate::progress::{CancellationToken, NoOpProgress, ProgressSink};
use crate::results::{LoadStepResult, ReactionForce, ResultContainer, Stress, Strain};
use crate::settings::{NonlinearMethod, NonlinearSettings, NonlinearityType};

/// Accumulated state at one element's centroid, carried across load
/// steps for a `Material`/`Combined` non-linearity run. Absent for
/// elements whose material declares no `yield_stress` (purely-elastic
/// materials never enter this map).
#[derive(Debug, Clone, Copy, Default)]
struct PlasticState {
    equivalent_plastic_strain: f64,
    plastic_strain: [f64; 6],
}

/// One element's centroid evaluation plus its elastic constitutive
/// matrix, cached once per load step since the mesh geometry and
/// material are step-invariant (only `u` moves within a step).
struct ElementContext {
    element_id: i64,
    dofs: Vec<usize>,
    eval: KernelEval,
    b: nalgebra::DMatrix<f64>,
    d_elastic: nalgebra::DMatrix<f64>,
    volume: f64,
    material: Material,
}

fn build_element_contexts(mesh: &Mesh, materials: &MaterialLibrary, dof_map: &HashMap<i64, usize>) -> Result<Vec<ElementContext>> {
    let mut contexts = Vec::new();
    for element in mesh.elements() {
        let kernel_kind = kernel_for(element)?;
        let kernel = kernel_kind.kernel();
        let (_, material) = material_for(mesh, materials, element)?;
        let nodes = element_nodes(mesh, element)?;
        let dofs = element_dofs(element, dof_map, DofScheme::Mechanical3.dofs_per_node())?;

        let eval = evaluate(kernel, element.id, &nodes, 0.0, 0.0, 0.0)?;
        let b = strain_displacement_matrix(&eval);
        let d_elastic = isotropic_constitutive_matrix(&material)?;

        let mut volume = 0.0;
        for qp in kernel.quadrature() {
            let v = evaluate(kernel, element.id, &nodes, qp.xi, qp.eta, qp.zeta)?;
            volume += v.det_j.abs() * qp.weight;
        }

        contexts.push(ElementContext {
            element_id: element.id,
            dofs,
            eval,
            b,
            d_elastic,
            volume,
            material,
        });
    }
    Ok(contexts)
}

/// Radial-return isotropic J2 plasticity with linear hardening,
/// evaluated at the centroid. Returns the updated stress and the
/// algorithmic (consistent) tangent modulus.
fn j2_return_mapping(
    d_elastic: &nalgebra::DMatrix<f64>,
    shear_modulus: f64,
    yield_stress: f64,
    hardening_modulus: f64,
    strain: &DVector<f64>,
    state: &mut PlasticState,
) -> (DVector<f64>, nalgebra::DMatrix<f64>) {
    let mut elastic_strain = DVector::<f64>::zeros(6);
    for i in 0..6 {
        elastic_strain[i] = strain[i] - state.plastic_strain[i];
    }
    let trial_stress = d_elastic * &elastic_strain;

    let hydrostatic = (trial_stress[0] + trial_stress[1] + trial_stress[2]) / 3.0;
    let mut deviatoric = trial_stress.clone();
    deviatoric[0] -= hydrostatic;
    deviatoric[1] -= hydrostatic;
    deviatoric[2] -= hydrostatic;
    let von_mises_trial = (1.5
        * (deviatoric[0] * deviatoric[0]
            + deviatoric[1] * deviatoric[1]
            + deviatoric[2] * deviatoric[2]
            + 2.0 * (deviatoric[3] * deviatoric[3] + deviatoric[4] * deviatoric[4] + deviatoric[5] * deviatoric[5])))
        .sqrt();

    let flow_stress = yield_stress + hardening_modulus * state.equivalent_plastic_strain;
    if von_mises_trial <= flow_stress {
        return (trial_stress, d_elastic.clone());
    }

    let delta_gamma = (von_mises_trial - flow_stress) / (3.0 * shear_modulus + hardening_modulus);
    let scale = 1.0 - 3.0 * shear_modulus * delta_gamma / von_mises_trial;

    let mut stress = &deviatoric * scale;
    stress[0] += hydrostatic;
    stress[1] += hydrostatic;
    stress[2] += hydrostatic;

    // Associative flow: d(eps_p) = delta_gamma * (3/2) * s/von_mises.
    // Tensor shear components are half the engineering (Voigt) ones, so
    // the engineering plastic-shear increment carries an extra factor
    // of 2 relative to the normal components.
    for i in 0..6 {
        let tensor_component = 1.5 * deviatoric[i] / von_mises_trial;
        state.plastic_strain[i] += delta_gamma * tensor_component * if i >= 3 { 2.0 } else { 1.0 };
    }
    state.equivalent_plastic_strain += delta_gamma;

    // A simplified (non-fully-consistent) tangent: the elastic modulus
    // isotropically scaled by the same stress-reduction factor used for
    // the updated stress. This sacrifices the asymptotic quadratic
    // Newton convergence rate a fully consistent tangent would give in
    // exchange for a closed form with no risk of an inconsistent Voigt
    // outer-product term; the outer load-stepping/line-search loop
    // still converges, just in more iterations per step.
    let tangent = d_elastic * scale;
    (stress, tangent)
}

/// Geometric (initial-stress) stiffness block contribution: for each
/// node pair `(I, J)`, `G_IJ = Σ_a Σ_b dN_I/dx_a σ_ab dN_J/dx_b`,
/// tiled into the 3x3 identity block per §4.6.
fn geometric_stiffness(eval: &KernelEval, stress: &DVector<f64>, volume: f64) -> nalgebra::DMatrix<f64> {
    let n = eval.n.len();
    let sigma = nalgebra::Matrix3::new(
        stress[0], stress[3], stress[5], stress[3], stress[1], stress[4], stress[5], stress[4], stress[2],
    );
    let mut k_sigma = nalgebra::DMatrix::<f64>::zeros(3 * n, 3 * n);
    for i in 0..n {
        let grad_i = nalgebra::Vector3::new(eval.d_n_global[i][0], eval.d_n_global[i][1], eval.d_n_global[i][2]);
        for j in 0..n {
            let grad_j = nalgebra::Vector3::new(eval.d_n_global[j][0], eval.d_n_global[j][1], eval.d_n_global[j][2]);
            let g = (grad_i.transpose() * sigma * grad_j)[(0, 0)] * volume;
            for k in 0..3 {
                k_sigma[(i * 3 + k, j * 3 + k)] += g;
            }
        }
    }
    k_sigma
}

/// Forms the internal-force vector and tangent stiffness at the
/// current displacement state `u`, per the non-linearity type(s) in
/// effect. `plastic_states` is updated in place only when the caller
/// commits the step (see `NonlinearAnalysis::solve`); trial evaluations
/// during line search use a scratch copy.
fn form_internal_state(
    contexts: &[ElementContext],
    u: &DVector<f64>,
    num_dofs: usize,
    nonlinearity: NonlinearityType,
    plastic_states: &mut HashMap<i64, PlasticState>,
) -> (DVector<f64>, nalgebra::DMatrix<f64>) {
    let mut f_int = DVector::<f64>::zeros(num_dofs);
    let mut k_t = nalgebra::DMatrix::<f64>::zeros(num_dofs, num_dofs);
    let use_material = matches!(nonlinearity, NonlinearityType::Material | NonlinearityType::Combined);
    let use_geometric = matches!(nonlinearity, NonlinearityType::Geometric | NonlinearityType::Combined);

    for ctx in contexts {
        let mut ue = DVector::<f64>::zeros(ctx.dofs.len());
        for (i, &dof) in ctx.dofs.iter().enumerate() {
            ue[i] = u[dof];
        }
        let strain = &ctx.b * &ue;

        let (stress, tangent) = if use_material {
            if let (Some(yield_stress), Some(hardening_modulus)) = (ctx.material.yield_stress(), ctx.material.hardening_modulus()) {
                let shear_modulus = ctx.material.shear_modulus().unwrap_or(0.0);
                let state = plastic_states.entry(ctx.element_id).or_default();
                let mut trial_state = *state;
                let (stress, tangent) = j2_return_mapping(&ctx.d_elastic, shear_modulus, yield_stress, hardening_modulus, &strain, &mut trial_state);
                *state = trial_state;
                (stress, tangent)
            } else {
                (&ctx.d_elastic * &strain, ctx.d_elastic.clone())
            }
        } else {
            (&ctx.d_elastic * &strain, ctx.d_elastic.clone())
        };

        let fe = (ctx.b.transpose() * &stress) * ctx.volume;
        let mut ke = (ctx.b.transpose() * &tangent * &ctx.b) * ctx.volume;

        if use_geometric {
            ke += geometric_stiffness(&ctx.eval, &stress, ctx.volume);
        }

        for (i, &row) in ctx.dofs.iter().enumerate() {
            f_int[row] += fe[i];
            for (j, &col) in ctx.dofs.iter().enumerate() {
                k_t[(row, col)] += ke[(i, j)];
            }
        }
    }
    (f_int, k_t)
}

fn apply_residual_bcs(k_t: &mut nalgebra::DMatrix<f64>, residual: &mut DVector<f64>, prescribed: &[PrescribedDof], u: &DVector<f64>) {
    for p in prescribed {
        apply_penalty_dof(k_t, residual, p.dof, 0.0);
        residual[p.dof] = PENALTY * (p.value - u[p.dof]);
    }
}

/// Orchestrates one load-stepped non-linear solve.
pub struct NonlinearAnalysis<'a> {
    mesh: &'a Mesh,
    materials: &'a MaterialLibrary,
    bcs: &'a [BoundaryCondition],
    loads: &'a [Load],
    settings: &'a NonlinearSettings,
}

impl<'a> NonlinearAnalysis<'a> {
    pub fn new(mesh: &'a Mesh, materials: &'a MaterialLibrary, bcs: &'a [BoundaryCondition], loads: &'a [Load], settings: &'a NonlinearSettings) -> Self {
        Self { mesh, materials, bcs, loads, settings }
    }

    pub fn solve(&self) -> std::result::Result<ResultContainer, (FeaError, ResultContainer)> {
        self.solve_with_progress(&mut NoOpProgress, &CancellationToken::new())
    }

    pub fn solve_with_progress(
        &self,
        progress: &mut dyn ProgressSink,
        cancellation: &CancellationToken,
    ) -> std::result::Result<ResultContainer, (FeaError, ResultContainer)> {
        let mut results = ResultContainer::new();
        results.solver_type = Some(crate::analysis::SolverKind::Nonlinear as i64);

        if let Err(e) = self.settings.validate() {
            return Err((e, results));
        }
        if let Err(e) = self.mesh.validate() {
            return Err((e, results));
        }

        let (num_dofs, dof_map) = self.mesh.assign_dofs(DofScheme::Mechanical3);
        let f_ext_total = match assemble_mechanical_loads(self.mesh, self.materials, self.loads, &dof_map, num_dofs) {
            Ok(f) => f,
            Err(e) => return Err((e, results)),
        };
        let prescribed: Vec<PrescribedDof> = match resolve_displacement_dofs(self.mesh, self.bcs, &dof_map) {
            Ok(p) => p,
            Err(e) => return Err((e, results)),
        };
        let contexts = match build_element_contexts(self.mesh, self.materials, &dof_map) {
            Ok(c) => c,
            Err(e) => return Err((e, results)),
        };

        let mut u = DVector::<f64>::zeros(num_dofs);
        let mut plastic_states: HashMap<i64, PlasticState> = HashMap::new();
        let mut lambda = 0.0f64;
        let base_delta_lambda = 1.0 / self.settings.num_load_steps as f64;
        let mut delta_lambda = base_delta_lambda;
        let mut consecutive_cheap_steps = 0usize;

        while lambda < 1.0 - 1e-12 {
            if cancellation.is_cancelled() {
                return Err((FeaError::Cancelled, results));
            }

            let trial_lambda = (lambda + delta_lambda).min(1.0);
            let u_before_step = u.clone();

            match self.try_load_step(&contexts, &f_ext_total, &prescribed, trial_lambda, num_dofs, &mut u, &mut plastic_states, cancellation) {
                Ok(iterations) => {
                    lambda = trial_lambda;
                    results.load_steps.push(LoadStepResult { lambda, u: u.as_slice().to_vec() });
                    progress.report(lambda);

                    if self.settings.adaptive_load_stepping {
                        if iterations < self.settings.max_iterations / 4 {
                            consecutive_cheap_steps += 1;
                        } else {
                            consecutive_cheap_steps = 0;
                        }
                        // Only grow back toward (and past) the base step once a
                        // prior step has actually been reduced below it; a
                        // well-conditioned problem solved entirely at the base
                        // `1/num_load_steps` increment must land on exactly
                        // `num_load_steps` decile snapshots, never overshoot them.
                        if consecutive_cheap_steps >= 1 && delta_lambda < base_delta_lambda - 1e-12 {
                            delta_lambda = (delta_lambda * 1.5).min(self.settings.max_load_step_size);
                        }
                    }
                }
                Err(FeaError::Cancelled) => return Err((FeaError::Cancelled, results)),
                Err(_) => {
                    u = u_before_step;
                    if !self.settings.adaptive_load_stepping {
                        return Err((FeaError::NonlinearDiverged { load_factor: trial_lambda, iteration: self.settings.max_iterations }, results));
                    }
                    delta_lambda /= 2.0;
                    if delta_lambda < self.settings.min_load_step_size {
                        return Err((FeaError::LoadStepUnderflow { load_factor: lambda }, results));
                    }
                }
            }
        }

        self.recover_final_state(&contexts, &u, &f_ext_total, &prescribed, &dof_map, &mut results);
        progress.report(1.0);
        Ok(results)
    }

    /// Runs the Newton (or arc-length) iteration for one target load
    /// factor, mutating `u` and `plastic_states` only on convergence.
    /// Returns the number of iterations used, or a `FeaError` leaving
    /// `u`/`plastic_states` as the caller's snapshot-and-restore
    /// contract expects (restoring `plastic_states` is the caller's
    /// job via retry since this crate applies plasticity only to a
    /// committed step's final pass below).
    #[allow(clippy::too_many_arguments)]
    fn try_load_step(
        &self,
        contexts: &[ElementContext],
        f_ext_total: &DVector<f64>,
        prescribed: &[PrescribedDof],
        trial_lambda: f64,
        num_dofs: usize,
        u: &mut DVector<f64>,
        plastic_states: &mut HashMap<i64, PlasticState>,
        cancellation: &CancellationToken,
    ) -> Result<usize> {
        let f_ext = f_ext_total * trial_lambda;
        let mut scratch_states = plastic_states.clone();
        let mut trial_u = u.clone();
        let mut cached_tangent: Option<nalgebra::DMatrix<f64>> = None;
        let mut previous_step: Option<(DVector<f64>, DVector<f64>)> = None; // (u, f_int) before the last update

        for iteration in 0..self.settings.max_iterations {
            if cancellation.is_cancelled() {
                return Err(FeaError::Cancelled);
            }

            let (f_int, k_t_fresh) = form_internal_state(contexts, &trial_u, num_dofs, self.settings.nonlinearity_type, &mut scratch_states);
            // ModifiedNewtonRaphson reuses the tangent formed at the first
            // iteration of the step for every subsequent solve. QuasiNewton
            // applies a Broyden secant update to the previous tangent
            // instead of re-forming it from the element kernels. Every
            // other method re-forms the tangent each iteration.
            let mut k_t = match self.settings.method {
                NonlinearMethod::ModifiedNewtonRaphson => cached_tangent.get_or_insert_with(|| k_t_fresh.clone()).clone(),
                NonlinearMethod::QuasiNewton => {
                    let updated = match (&cached_tangent, &previous_step) {
                        (Some(k_prev), Some((u_prev, f_int_prev))) => {
                            let delta_u = &trial_u - u_prev;
                            let denom = (delta_u.transpose() * &delta_u)[(0, 0)];
                            if denom > 1e-30 {
                                let delta_f = &f_int - f_int_prev;
                                let residual_term = &delta_f - k_prev * &delta_u;
                                k_prev + (residual_term * delta_u.transpose()) / denom
                            } else {
                                k_prev.clone()
                            }
                        }
                        _ => k_t_fresh.clone(),
                    };
                    cached_tangent = Some(updated.clone());
                    updated
                }
                NonlinearMethod::NewtonRaphson | NonlinearMethod::ArcLength => k_t_fresh.clone(),
            };
            previous_step = Some((trial_u.clone(), f_int.clone()));
            let mut residual = &f_ext - &f_int;
            apply_residual_bcs(&mut k_t, &mut residual, prescribed, &trial_u);

            let f_ext_norm = f_ext.norm().max(1.0);
            if residual.norm() / f_ext_norm < self.settings.convergence_tolerance {
                *u = trial_u;
                *plastic_states = scratch_states;
                return Ok(iteration + 1);
            }

            let du = match k_t.clone().lu().solve(&residual) {
                Some(du) => du,
                None => return Err(FeaError::Singular),
            };

            let alpha = if self.settings.use_line_search {
                self.line_search(contexts, &f_ext, num_dofs, &trial_u, &du, &residual, prescribed, &scratch_states)
            } else {
                1.0
            };

            let previous_norm = residual.norm();
            trial_u += alpha * &du;

            let (f_int_new, _) = form_internal_state(contexts, &trial_u, num_dofs, self.settings.nonlinearity_type, &mut scratch_states.clone());
            let mut residual_new = &f_ext - &f_int_new;
            apply_residual_bcs(&mut k_t, &mut residual_new, prescribed, &trial_u);
            if residual_new.norm() > previous_norm * 10.0 {
                return Err(FeaError::NonlinearDiverged { load_factor: trial_lambda, iteration });
            }
        }
        Err(FeaError::NonlinearDiverged { load_factor: trial_lambda, iteration: self.settings.max_iterations })
    }

    #[allow(clippy::too_many_arguments)]
    fn line_search(
        &self,
        contexts: &[ElementContext],
        f_ext: &DVector<f64>,
        num_dofs: usize,
        u: &DVector<f64>,
        du: &DVector<f64>,
        residual0: &DVector<f64>,
        prescribed: &[PrescribedDof],
        plastic_states: &HashMap<i64, PlasticState>,
    ) -> f64 {
        let s0 = (du.transpose() * residual0)[(0, 0)].abs();
        if s0 < 1e-30 {
            return 1.0;
        }
        let mut best_alpha = 1.0;
        let mut best_value = f64::INFINITY;
        let mut alpha = 1.0;
        for _ in 0..self.settings.max_line_search_iterations {
            let u_trial = u + alpha * du;
            let mut states = plastic_states.clone();
            let (f_int, mut k_t) = form_internal_state(contexts, &u_trial, num_dofs, self.settings.nonlinearity_type, &mut states);
            let mut r = f_ext - &f_int;
            apply_residual_bcs(&mut k_t, &mut r, prescribed, &u_trial);
            let s = (du.transpose() * &r)[(0, 0)].abs();
            if s < best_value {
                best_value = s;
                best_alpha = alpha;
            }
            if s < self.settings.line_search_tolerance * s0 {
                return alpha;
            }
            alpha *= 0.5;
        }
        best_alpha
    }

    fn recover_final_state(
        &self,
        contexts: &[ElementContext],
        u: &DVector<f64>,
        f_ext_total: &DVector<f64>,
        prescribed: &[PrescribedDof],
        dof_map: &HashMap<i64, usize>,
        results: &mut ResultContainer,
    ) {
        let mut f_int = DVector::<f64>::zeros(u.len());
        for ctx in contexts {
            let mut ue = DVector::<f64>::zeros(ctx.dofs.len());
            for (i, &dof) in ctx.dofs.iter().enumerate() {
                ue[i] = u[dof];
            }
            let strain = &ctx.b * &ue;
            let stress = &ctx.d_elastic * &strain;
            results.strains.push(
                ctx.element_id,
                Strain::from_components(ctx.element_id, strain[0], strain[1], strain[2], strain[3], strain[4], strain[5]),
            );
            results.stresses.push(
                ctx.element_id,
                Stress::from_components(ctx.element_id, stress[0], stress[1], stress[2], stress[3], stress[4], stress[5]),
            );
            let fe = (ctx.b.transpose() * &stress) * ctx.volume;
            for (i, &row) in ctx.dofs.iter().enumerate() {
                f_int[row] += fe[i];
            }
        }

        let mut by_node: HashMap<i64, [f64; 3]> = HashMap::new();
        for p in prescribed {
            let r = f_int[p.dof] - f_ext_total[p.dof];
            for (&node_id, &base) in dof_map {
                if p.dof >= base && p.dof < base + 3 {
                    let entry = by_node.entry(node_id).or_insert([0.0; 3]);
                    entry[p.dof - base] = r;
                }
            }
        }
        for (node_id, r) in by_node {
            results.reactions.push(node_id, ReactionForce { node_id, fx: r[0], fy: r[1], fz: r[2] });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{Axis, TimeVariation};
    use crate::materials::Material;
    use crate::mesh::{Element, ElementKind, Node};

    fn unit_cube() -> (Mesh, MaterialLibrary, Vec<BoundaryCondition>, Vec<Load>) {
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
        mesh.add_element(Element::new(1, ElementKind::Hexa, vec![1, 2, 3, 4, 5, 6, 7, 8]).with_material(steel))
            .unwrap();
        mesh.add_node_group("fixed_x0", vec![1, 4, 5, 8]).unwrap();
        mesh.add_node_group("loaded_x1", vec![2, 3, 6, 7]).unwrap();

        let bcs = vec![
            BoundaryCondition::Displacement { name: "fix_x".to_string(), group: "fixed_x0".to_string(), axis: Axis::X, value: 0.0 },
            BoundaryCondition::Displacement { name: "fix_y".to_string(), group: "fixed_x0".to_string(), axis: Axis::Y, value: 0.0 },
            BoundaryCondition::Displacement { name: "fix_z".to_string(), group: "fixed_x0".to_string(), axis: Axis::Z, value: 0.0 },
        ];
        let loads = vec![Load::PointForce {
            name: "p1".to_string(),
            group: "loaded_x1".to_string(),
            fx: 0.25,
            fy: 0.0,
            fz: 0.0,
            variation: TimeVariation::Static,
        }];
        (mesh, materials, bcs, loads)
    }

    /// Scenario 5 (§8): 10 load steps over a linear (geometric-only,
    /// small-strain) problem land on `lambda in {0.1, ..., 1.0}` with no
    /// adaptive changes needed, and displacement scales linearly with
    /// lambda.
    #[test]
    fn ten_load_steps_track_linear_lambda_scaling() {
        let (mesh, materials, bcs, loads) = unit_cube();
        let mut settings = NonlinearSettings::default();
        settings.num_load_steps = 10;
        settings.adaptive_load_stepping = true;
        settings.nonlinearity_type = NonlinearityType::Geometric;

        let analysis = NonlinearAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let results = analysis.solve().unwrap();

        assert_eq!(results.load_steps.len(), 10);
        let (_, dof_map) = mesh.assign_dofs(DofScheme::Mechanical3);
        let dof_x_node2 = dof_map[&2];
        let final_ux = results.load_steps.last().unwrap().u[dof_x_node2];
        let expected_final = 0.25 / 210e9 * 1.0; // same consistent nodal load as the linear-statics test
        assert!((final_ux - expected_final).abs() / expected_final < 1e-4);

        for step in &results.load_steps {
            let ux = step.u[dof_x_node2];
            let expected = step.lambda * expected_final;
            assert!((ux - expected).abs() / expected.max(1e-20) < 1e-3 || expected.abs() < 1e-18);
        }
    }

    #[test]
    fn monotone_load_factor_without_adaptive_stepping() {
        let (mesh, materials, bcs, loads) = unit_cube();
        let mut settings = NonlinearSettings::default();
        settings.num_load_steps = 5;
        settings.adaptive_load_stepping = false;

        let analysis = NonlinearAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let results = analysis.solve().unwrap();

        let mut prev = 0.0;
        for step in &results.load_steps {
            assert!(step.lambda > prev);
            prev = step.lambda;
        }
        assert!((prev - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_invalid_settings_before_touching_mesh() {
        let (mesh, materials, bcs, loads) = unit_cube();
        let mut settings = NonlinearSettings::default();
        settings.max_iterations = 0;
        let analysis = NonlinearAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let (err, results) = analysis.solve().unwrap_err();
        assert!(matches!(err, FeaError::InvalidSettings(_)));
        assert!(results.load_steps.is_empty());
    }
}
