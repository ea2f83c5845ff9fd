//! Thermal analysis (C12): steady-state and transient heat conduction
//! over the C4-C7 pipeline, per §4.7's thermal counterpart.
//!
//! Steady-state solves `K_t T = Q` once. Transient marches
//! `C_t dT/dt + K_t T = Q` with a theta-method that collapses to
//! implicit Euler (`theta=1`), Crank-Nicolson (`theta=0.5`), or
//! explicit Euler (`theta=0`) depending on
//! [`ThermalTimeIntegrationMethod`]. Convection and heat-flux boundary
//! conditions are folded into `K_t`/`Q` once before the loop (the same
//! constant-across-time load convention `dynamic_solver` uses), so a
//! step's effective operator depends only on its own `dt`.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector, Vector3};

use crate::assembly::{
    assemble_thermal_capacity, assemble_thermal_conductivity, assemble_thermal_loads, element_dofs, element_nodes,
    kernel_for, material_for, DofMap,
};
use crate::bc_application::{apply_convection, apply_heat_flux, apply_penalty_dof, resolve_temperature_dofs, PrescribedDof};
use crate::conditions::BoundaryCondition;
use crate::elements::{evaluate, isotropic_thermal_conductivity_matrix, thermal_gradient_matrix};
use crate::error::{FeaError, Result};
use crate::materials::MaterialLibrary;
use crate::mesh::{DofScheme, Mesh};
use crate::progress::{CancellationToken, NoOpProgress, ProgressSink};
use crate::results::{HeatFlux as HeatFluxResult, ResultContainer, Temperature, ThermalGradient};
use crate::settings::{ThermalAnalysisType, ThermalSettings, ThermalTimeIntegrationMethod};

/// A facet element's thermal DOFs plus its integrated area, computed
/// with the same outward-normal/Jacobian convention `assemble_surface_pressure`
/// uses for mechanical surface loads.
fn facet_dofs_and_area(mesh: &Mesh, element_id: i64, dof_map: &DofMap) -> Result<(Vec<usize>, f64)> {
    let element = mesh
        .get_element(element_id)
        .ok_or_else(|| FeaError::InvalidBoundaryCondition(format!("unknown element {}", element_id)))?;
    let kernel_kind = kernel_for(element)?;
    let kernel = kernel_kind.kernel();
    let nodes = element_nodes(mesh, element)?;
    let dofs = element_dofs(element, dof_map, DofScheme::Thermal1.dofs_per_node())?;

    let mut area = 0.0;
    for qp in kernel.quadrature() {
        let d_n = kernel.shape_derivatives_natural(qp.xi, qp.eta, qp.zeta);
        let mut tangent_xi = Vector3::zeros();
        let mut tangent_eta = Vector3::zeros();
        for (i, node) in nodes.iter().enumerate() {
            let [dxi, deta, _] = d_n[i];
            tangent_xi += Vector3::new(node.x, node.y, node.z) * dxi;
            tangent_eta += Vector3::new(node.x, node.y, node.z) * deta;
        }
        area += tangent_xi.cross(&tangent_eta).norm() * qp.weight;
    }
    Ok((dofs, area))
}

/// Folds every `Convection` BC into `(matrix, rhs)`, lumping `h*A` and
/// `h*A*T_inf` equally across a facet's nodes per §4.3.
fn apply_convection_bcs(mesh: &Mesh, bcs: &[BoundaryCondition], dof_map: &DofMap, matrix: &mut DMatrix<f64>, rhs: &mut DVector<f64>) -> Result<()> {
    for bc in bcs {
        if let BoundaryCondition::Convection { group, film_coefficient, ambient_temperature, name } = bc {
            let element_group = mesh.get_element_group(group).ok_or_else(|| {
                FeaError::InvalidBoundaryCondition(format!("convection BC '{}' targets unknown group '{}'", name, group))
            })?;
            for &element_id in &element_group.element_ids {
                let (dofs, area) = facet_dofs_and_area(mesh, element_id, dof_map)?;
                apply_convection(matrix, rhs, &dofs, area, *film_coefficient, *ambient_temperature);
            }
        }
    }
    Ok(())
}

/// Folds every `HeatFlux` BC into `rhs`, lumping the facet's total
/// flux equally across its nodes (the same equal split `apply_convection`
/// uses internally for its own lumping).
fn apply_heat_flux_bcs(mesh: &Mesh, bcs: &[BoundaryCondition], dof_map: &DofMap, rhs: &mut DVector<f64>) -> Result<()> {
    for bc in bcs {
        if let BoundaryCondition::HeatFlux { group, magnitude, name } = bc {
            let element_group = mesh.get_element_group(group).ok_or_else(|| {
                FeaError::InvalidBoundaryCondition(format!("heat flux BC '{}' targets unknown group '{}'", name, group))
            })?;
            for &element_id in &element_group.element_ids {
                let (dofs, area) = facet_dofs_and_area(mesh, element_id, dof_map)?;
                let n = dofs.len() as f64;
                let weights = vec![1.0 / n; dofs.len()];
                apply_heat_flux(rhs, &dofs, &weights, *magnitude, area);
            }
        }
    }
    Ok(())
}

/// `Δt_crit = min_e(h_e² / (2α))`, `α = k/(ρ cₚ)`, per §4.7's thermal
/// counterpart to the mechanical critical time step. `ThermalSettings`
/// carries no safety factor, unlike `DynamicSettings`, so the raw
/// critical value is used unscaled.
fn thermal_critical_time_step(mesh: &Mesh, materials: &MaterialLibrary) -> Result<f64> {
    let mut dt_crit = f64::INFINITY;
    for element in mesh.elements() {
        let (_, material) = material_for(mesh, materials, element)?;
        let k = material.get("thermal_conductivity")?;
        let rho = material.get("density")?;
        let cp = material.get("specific_heat")?;
        let alpha = k / (rho * cp);
        let nodes = element_nodes(mesh, element)?;
        let mut h = f64::INFINITY;
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let dx = nodes[i].x - nodes[j].x;
                let dy = nodes[i].y - nodes[j].y;
                let dz = nodes[i].z - nodes[j].z;
                h = h.min((dx * dx + dy * dy + dz * dz).sqrt());
            }
        }
        dt_crit = dt_crit.min(h * h / (2.0 * alpha));
    }
    Ok(dt_crit)
}

fn theta_for(method: ThermalTimeIntegrationMethod) -> f64 {
    match method {
        ThermalTimeIntegrationMethod::ImplicitEuler => 1.0,
        ThermalTimeIntegrationMethod::CrankNicolson => 0.5,
        ThermalTimeIntegrationMethod::ExplicitEuler => 0.0,
    }
}

/// Orchestrates a single thermal solve, steady-state or transient.
pub struct ThermalAnalysis<'a> {
    mesh: &'a Mesh,
    materials: &'a MaterialLibrary,
    bcs: &'a [BoundaryCondition],
    loads: &'a [crate::conditions::Load],
    settings: &'a ThermalSettings,
}

impl<'a> ThermalAnalysis<'a> {
    pub fn new(
        mesh: &'a Mesh,
        materials: &'a MaterialLibrary,
        bcs: &'a [BoundaryCondition],
        loads: &'a [crate::conditions::Load],
        settings: &'a ThermalSettings,
    ) -> Self {
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
        results.solver_type = Some(match self.settings.analysis_type {
            ThermalAnalysisType::SteadyState => crate::analysis::SolverKind::ThermalSteady,
            ThermalAnalysisType::Transient => crate::analysis::SolverKind::ThermalTransient,
        } as i64);

        if let Err(e) = self.settings.validate() {
            return Err((e, results));
        }
        if let Err(e) = self.mesh.validate() {
            return Err((e, results));
        }

        let (num_dofs, dof_map) = self.mesh.assign_dofs(DofScheme::Thermal1);
        let k_t = match assemble_thermal_conductivity(self.mesh, self.materials, &dof_map, num_dofs) {
            Ok(k) => k.to_dense(),
            Err(e) => return Err((e, results)),
        };
        let q_ext = match assemble_thermal_loads(self.mesh, self.loads, &dof_map, num_dofs) {
            Ok(q) => q,
            Err(e) => return Err((e, results)),
        };
        let prescribed: Vec<PrescribedDof> = match resolve_temperature_dofs(self.mesh, self.bcs, &dof_map) {
            Ok(p) => p,
            Err(e) => return Err((e, results)),
        };

        // Convection and heat-flux BCs are time-invariant (same
        // constant-load convention `dynamic_solver` uses), so they are
        // folded into the conductivity operator and load vector once.
        let mut k_eff = k_t.clone();
        let mut q_eff = q_ext.clone();
        if let Err(e) = apply_convection_bcs(self.mesh, self.bcs, &dof_map, &mut k_eff, &mut q_eff) {
            return Err((e, results));
        }
        if let Err(e) = apply_heat_flux_bcs(self.mesh, self.bcs, &dof_map, &mut q_eff) {
            return Err((e, results));
        }

        if cancellation.is_cancelled() {
            return Err((FeaError::Cancelled, results));
        }

        match self.settings.analysis_type {
            ThermalAnalysisType::SteadyState => {
                let mut matrix = k_eff;
                let mut rhs = q_eff;
                for p in &prescribed {
                    apply_penalty_dof(&mut matrix, &mut rhs, p.dof, p.value);
                }
                progress.report(0.5);
                let kind = crate::linear_solver::LinearSolverKind::for_problem_size(num_dofs);
                let t = match crate::linear_solver::solve(&matrix, &rhs, kind) {
                    Ok(t) => t,
                    Err(e) => return Err((e, results)),
                };
                if let Err(e) = self.recover_thermal_fields(&t, &dof_map, self.settings.start_time, &mut results) {
                    return Err((e, results));
                }
                progress.report(1.0);
                Ok(results)
            }
            ThermalAnalysisType::Transient => {
                let c_t = match assemble_thermal_capacity(self.mesh, self.materials, &dof_map, num_dofs) {
                    Ok(c) => c.to_dense(),
                    Err(e) => return Err((e, results)),
                };

                let theta = theta_for(self.settings.time_integration_method);
                let mut dt = self.settings.time_step;
                if self.settings.time_integration_method == ThermalTimeIntegrationMethod::ExplicitEuler {
                    let dt_crit = match thermal_critical_time_step(self.mesh, self.materials) {
                        Ok(dt) => dt,
                        Err(e) => return Err((e, results)),
                    };
                    if dt > dt_crit {
                        log::warn!("thermal time step {} exceeds explicit critical step {}, clamping", dt, dt_crit);
                        dt = dt_crit;
                    }
                }
                let t_start = self.settings.start_time;
                let t_end = self.settings.end_time;

                let mut temp = DVector::<f64>::from_element(num_dofs, self.settings.ambient_temperature);
                for p in &prescribed {
                    temp[p.dof] = p.value;
                }
                if let Err(e) = self.recover_thermal_fields(&temp, &dof_map, t_start, &mut results) {
                    return Err((e, results));
                }

                let kind = crate::linear_solver::LinearSolverKind::for_problem_size(num_dofs);

                let mut t = t_start;
                while t < t_end - 1e-12 {
                    if cancellation.is_cancelled() {
                        return Err((FeaError::Cancelled, results));
                    }
                    let step_dt = dt.min(t_end - t);
                    let m_over_dt = &c_t * (1.0 / step_dt);
                    let mut step_matrix = &m_over_dt + theta * &k_eff;
                    let mut rhs = &m_over_dt * &temp - (1.0 - theta) * (&k_eff * &temp) + &q_eff;
                    for p in &prescribed {
                        apply_penalty_dof(&mut step_matrix, &mut rhs, p.dof, p.value);
                    }

                    let t_next = match crate::linear_solver::solve(&step_matrix, &rhs, kind) {
                        Ok(t) => t,
                        Err(e) => return Err((e, results)),
                    };

                    t += step_dt;
                    temp = t_next;
                    if let Err(e) = self.recover_thermal_fields(&temp, &dof_map, t, &mut results) {
                        return Err((e, results));
                    }
                    progress.report(((t - t_start) / (t_end - t_start)).min(1.0));
                }

                progress.report(1.0);
                Ok(results)
            }
        }
    }

    /// Pushes one `Temperature` entry per node, plus one nodally-averaged
    /// `ThermalGradient`/`HeatFlux` pair per node (element-centroid values,
    /// per the same single-point convention `StaticAnalysis` uses for
    /// stress/strain recovery, averaged across the node's adjacent elements).
    fn recover_thermal_fields(&self, t: &DVector<f64>, dof_map: &DofMap, time: f64, results: &mut ResultContainer) -> Result<()> {
        for node in self.mesh.nodes() {
            let dof = dof_map[&node.id];
            results.temperatures.push(Temperature { node_id: node.id, time, value: t[dof] });
        }

        let mut gradient_sum: HashMap<i64, [f64; 3]> = HashMap::new();
        let mut flux_sum: HashMap<i64, [f64; 3]> = HashMap::new();
        let mut count: HashMap<i64, usize> = HashMap::new();

        for element in self.mesh.elements() {
            let kernel_kind = kernel_for(element)?;
            let kernel = kernel_kind.kernel();
            let (_, material) = material_for(self.mesh, self.materials, element)?;
            let nodes = element_nodes(self.mesh, element)?;
            let eval = evaluate(kernel, element.id, &nodes, 0.0, 0.0, 0.0)?;
            let b_t = thermal_gradient_matrix(&eval);
            let d_t = isotropic_thermal_conductivity_matrix(&material)?;

            let mut t_e = DVector::<f64>::zeros(element.nodes.len());
            for (i, &node_id) in element.nodes.iter().enumerate() {
                t_e[i] = t[dof_map[&node_id]];
            }
            let gradient = &b_t * &t_e;
            let flux = -(&d_t * &gradient);

            for &node_id in &element.nodes {
                let g = gradient_sum.entry(node_id).or_insert([0.0; 3]);
                g[0] += gradient[0];
                g[1] += gradient[1];
                g[2] += gradient[2];
                let f = flux_sum.entry(node_id).or_insert([0.0; 3]);
                f[0] += flux[0];
                f[1] += flux[1];
                f[2] += flux[2];
                *count.entry(node_id).or_insert(0) += 1;
            }
        }

        for node in self.mesh.nodes() {
            if let Some(&n) = count.get(&node.id) {
                let n = n as f64;
                let g = gradient_sum[&node.id];
                let f = flux_sum[&node.id];
                results.thermal_gradients.push(ThermalGradient { node_id: node.id, time, gx: g[0] / n, gy: g[1] / n, gz: g[2] / n });
                results.heat_fluxes.push(HeatFluxResult { node_id: node.id, time, qx: f[0] / n, qy: f[1] / n, qz: f[2] / n });
            }
        }
        Ok(())
    }
}
