//! Dynamic analysis (C11): time integration of `M ü + C u̇ + K u = F`
//! over the C4-C7 pipeline, per §4.7. Five schemes share one
//! BC-penalty convention with the static and non-linear solvers; the
//! free-vibration half of C11 (the generalized eigenproblem) lives in
//! `modal_solver.rs`.
//!
//! The external force vector is assembled once and held constant
//! across time (`Load::variation` tags other than `Static` are
//! accepted but not yet evaluated at each step).
//! TODO: Support time-varying loads.

use nalgebra::{DMatrix, DVector};

use crate::assembly::{assemble_mass, assemble_mechanical_loads, assemble_stiffness, element_nodes, material_for, rayleigh_damping};
use crate::bc_application::{apply_penalty_dof, resolve_displacement_dofs, PrescribedDof};
use crate::conditions::{BoundaryCondition, Load};
use crate::error::{FeaError, Result};
use crate::materials::MaterialLibrary;
use crate::mesh::{DofScheme, Element, Mesh};
use crate::progress::{CancellationToken, NoOpProgress, ProgressSink};
use crate::results::{DynamicStepResult, ResultContainer};
use crate::settings::{DynamicSettings, TimeIntegrationMethod};

/// Minimum pairwise nodal distance within an element: a topology-agnostic
/// stand-in for "minimum edge length" that needs no per-kind edge table.
fn element_characteristic_length(mesh: &Mesh, element: &Element) -> Result<f64> {
    let nodes = element_nodes(mesh, element)?;
    let mut min_dist = f64::INFINITY;
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let dx = nodes[i].x - nodes[j].x;
            let dy = nodes[i].y - nodes[j].y;
            let dz = nodes[i].z - nodes[j].z;
            min_dist = min_dist.min((dx * dx + dy * dy + dz * dz).sqrt());
        }
    }
    Ok(min_dist)
}

/// `Δt_crit = min_e(h_e / c_e)`, `c_e = sqrt(E/rho)`, per §4.7.
fn critical_time_step(mesh: &Mesh, materials: &MaterialLibrary) -> Result<f64> {
    let mut dt_crit = f64::INFINITY;
    for element in mesh.elements() {
        let (_, material) = material_for(mesh, materials, element)?;
        let c = (material.youngs_modulus()? / material.density()?).sqrt();
        let h = element_characteristic_length(mesh, element)?;
        dt_crit = dt_crit.min(h / c);
    }
    Ok(dt_crit)
}

/// Applies each prescribed DOF's actual value: used whenever the system
/// being solved is posed directly in displacement.
fn apply_prescribed(matrix: &mut DMatrix<f64>, rhs: &mut DVector<f64>, prescribed: &[PrescribedDof]) {
    for p in prescribed {
        apply_penalty_dof(matrix, rhs, p.dof, p.value);
    }
}

/// Pins each prescribed DOF to zero: used for acceleration- and
/// velocity-based systems, valid because a displacement BC is
/// time-invariant so its velocity and acceleration are both zero.
fn pin_prescribed(matrix: &mut DMatrix<f64>, rhs: &mut DVector<f64>, prescribed: &[PrescribedDof]) {
    for p in prescribed {
        apply_penalty_dof(matrix, rhs, p.dof, 0.0);
    }
}

/// Newmark predictor/corrector solving for `u_{n+1}` directly, per the
/// standard effective-stiffness formulation. Shared by plain Newmark
/// and, over a scaled sub-step, by Wilson-theta and Bathe.
#[allow(clippy::too_many_arguments)]
fn newmark_solve_for_u(
    k: &DMatrix<f64>,
    m: &DMatrix<f64>,
    c: &DMatrix<f64>,
    beta: f64,
    gamma: f64,
    dt: f64,
    u_n: &DVector<f64>,
    v_n: &DVector<f64>,
    a_n: &DVector<f64>,
    f_next: &DVector<f64>,
    prescribed: &[PrescribedDof],
) -> Result<DVector<f64>> {
    let dt2 = dt * dt;
    let coeff_c = gamma / (beta * dt);
    let coeff_m = 1.0 / (beta * dt2);
    let mut k_eff = k + coeff_c * c + coeff_m * m;

    let m_term = a_n / (beta * dt2) + v_n / (beta * dt) + ((1.0 - 2.0 * beta) / (2.0 * beta)) * a_n;
    let c_term = gamma * a_n / (beta * dt) + ((gamma - beta) / beta) * v_n + (dt * (gamma - 2.0 * beta) / (2.0 * beta)) * a_n;
    let mut f_eff = f_next + m * m_term + c * c_term;

    apply_prescribed(&mut k_eff, &mut f_eff, prescribed);
    k_eff.lu().solve(&f_eff).ok_or(FeaError::Singular)
}

fn newmark_accel_velocity(u_next: &DVector<f64>, u_n: &DVector<f64>, v_n: &DVector<f64>, a_n: &DVector<f64>, beta: f64, gamma: f64, dt: f64) -> (DVector<f64>, DVector<f64>) {
    let dt2 = dt * dt;
    let a_next = (u_next - u_n) / (beta * dt2) - v_n / (beta * dt) - ((1.0 - 2.0 * beta) / (2.0 * beta)) * a_n;
    let v_next = v_n + dt * ((1.0 - gamma) * a_n + gamma * &a_next);
    (v_next, a_next)
}

/// Orchestrates a single dynamic (time-integration) solve: assemble
/// `K`, `M`, `C` once, march the `(u, v, a)` state across
/// `[start_time, end_time]`, snapshot every `save_interval` steps.
pub struct DynamicAnalysis<'a> {
    mesh: &'a Mesh,
    materials: &'a MaterialLibrary,
    bcs: &'a [BoundaryCondition],
    loads: &'a [Load],
    settings: &'a DynamicSettings,
}

impl<'a> DynamicAnalysis<'a> {
    pub fn new(mesh: &'a Mesh, materials: &'a MaterialLibrary, bcs: &'a [BoundaryCondition], loads: &'a [Load], settings: &'a DynamicSettings) -> Self {
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
        results.solver_type = Some(crate::analysis::SolverKind::Dynamic as i64);

        if let Err(e) = self.settings.validate() {
            return Err((e, results));
        }
        if let Err(e) = self.mesh.validate() {
            return Err((e, results));
        }

        let (num_dofs, dof_map) = self.mesh.assign_dofs(DofScheme::Mechanical3);
        let k_sparse = match assemble_stiffness(self.mesh, self.materials, &dof_map, num_dofs) {
            Ok(k) => k,
            Err(e) => return Err((e, results)),
        };
        let m_sparse = match assemble_mass(self.mesh, self.materials, &dof_map, num_dofs) {
            Ok(m) => m,
            Err(e) => return Err((e, results)),
        };
        let k = k_sparse.to_dense();
        let m = m_sparse.to_dense();
        let c = rayleigh_damping(&k_sparse, &m_sparse, self.settings.rayleigh_alpha, self.settings.rayleigh_beta).to_dense();
        let f_ext = match assemble_mechanical_loads(self.mesh, self.materials, self.loads, &dof_map, num_dofs) {
            Ok(f) => f,
            Err(e) => return Err((e, results)),
        };
        let prescribed: Vec<PrescribedDof> = match resolve_displacement_dofs(self.mesh, self.bcs, &dof_map) {
            Ok(p) => p,
            Err(e) => return Err((e, results)),
        };

        let mut dt = self.settings.time_step;
        if self.settings.method == TimeIntegrationMethod::CentralDifference {
            let dt_crit = match critical_time_step(self.mesh, self.materials) {
                Ok(d) => d,
                Err(e) => return Err((e, results)),
            };
            let allowed = dt_crit * self.settings.explicit_safety_factor;
            if dt > allowed {
                log::warn!("time_step {:.3e} exceeds the explicit critical step {:.3e}; clamping", dt, allowed);
                dt = allowed;
            }
        }

        let mut u = DVector::<f64>::zeros(num_dofs);
        for p in &prescribed {
            u[p.dof] = p.value;
        }
        let mut v = DVector::<f64>::zeros(num_dofs);
        let mut m_for_a0 = m.clone();
        let mut f_for_a0 = &f_ext - &c * &v - &k * &u;
        pin_prescribed(&mut m_for_a0, &mut f_for_a0, &prescribed);
        let mut a = match m_for_a0.lu().solve(&f_for_a0) {
            Some(a0) => a0,
            None => return Err((FeaError::Singular, results)),
        };

        let t_start = self.settings.start_time;
        let t_end = self.settings.end_time;
        results.time_history.push(DynamicStepResult { time: t_start, u: u.as_slice().to_vec(), v: v.as_slice().to_vec(), a: a.as_slice().to_vec() });

        let mut t = t_start;
        let mut step_index = 0usize;
        let mut consecutive_cheap_steps = 0usize;

        while t < t_end - 1e-12 {
            if cancellation.is_cancelled() {
                return Err((FeaError::Cancelled, results));
            }
            let step_dt = dt.min(t_end - t);

            match self.time_step(&k, &m, &c, step_dt, &u, &v, &a, &f_ext, &prescribed) {
                Ok((u_next, v_next, a_next)) => {
                    t += step_dt;
                    step_index += 1;
                    u = u_next;
                    v = v_next;
                    a = a_next;

                    if step_index % self.settings.save_interval == 0 {
                        results.time_history.push(DynamicStepResult { time: t, u: u.as_slice().to_vec(), v: v.as_slice().to_vec(), a: a.as_slice().to_vec() });
                    }
                    progress.report(((t - t_start) / (t_end - t_start)).min(1.0));

                    if self.settings.adaptive_time_stepping {
                        consecutive_cheap_steps += 1;
                        if consecutive_cheap_steps >= 3 {
                            dt = (dt * 2.0).min(self.settings.max_time_step);
                            consecutive_cheap_steps = 0;
                        }
                    }
                }
                Err(e) => {
                    if !self.settings.adaptive_time_stepping {
                        return Err((e, results));
                    }
                    consecutive_cheap_steps = 0;
                    dt /= 2.0;
                    if dt < self.settings.min_time_step {
                        // The closed error enum has no time-step-specific
                        // variant; `LoadStepUnderflow`'s `load_factor` field
                        // carries the time at which the floor was hit here
                        // (see DESIGN.md).
                        return Err((FeaError::LoadStepUnderflow { load_factor: t }, results));
                    }
                }
            }
        }

        if results.time_history.last().map(|s| (s.time - t).abs() > 1e-12).unwrap_or(true) {
            results.time_history.push(DynamicStepResult { time: t, u: u.as_slice().to_vec(), v: v.as_slice().to_vec(), a: a.as_slice().to_vec() });
        }
        progress.report(1.0);
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn time_step(
        &self,
        k: &DMatrix<f64>,
        m: &DMatrix<f64>,
        c: &DMatrix<f64>,
        dt: f64,
        u_n: &DVector<f64>,
        v_n: &DVector<f64>,
        a_n: &DVector<f64>,
        f_next: &DVector<f64>,
        prescribed: &[PrescribedDof],
    ) -> Result<(DVector<f64>, DVector<f64>, DVector<f64>)> {
        match self.settings.method {
            TimeIntegrationMethod::Newmark => {
                let beta = self.settings.beta;
                let gamma = self.settings.gamma;
                let u_next = newmark_solve_for_u(k, m, c, beta, gamma, dt, u_n, v_n, a_n, f_next, prescribed)?;
                let (v_next, a_next) = newmark_accel_velocity(&u_next, u_n, v_n, a_n, beta, gamma, dt);
                Ok((u_next, v_next, a_next))
            }

            // Solves for a_{n+1} directly, the natural unknown of the
            // HHT-alpha effective system; prescribed DOFs are pinned to
            // zero acceleration, valid since their displacement sits at
            // a time-invariant value already baked into u_n.
            TimeIntegrationMethod::HhtAlpha => {
                let alpha = self.settings.hht_alpha;
                let beta = (1.0 - alpha).powi(2) / 4.0;
                let gamma = 0.5 - alpha;
                let dt2 = dt * dt;

                let mut k_eff = m + (1.0 + alpha) * dt * gamma * c + (1.0 + alpha) * dt2 * beta * k;
                let mut f_eff = (1.0 + alpha) * f_next - alpha * f_next
                    - c * v_n
                    - k * u_n
                    - ((1.0 + alpha) * dt * (1.0 - gamma)) * (c * a_n)
                    - ((1.0 + alpha) * dt) * (k * v_n)
                    - ((1.0 + alpha) * dt2 * (0.5 - beta)) * (k * a_n);
                pin_prescribed(&mut k_eff, &mut f_eff, prescribed);

                let a_next = k_eff.lu().solve(&f_eff).ok_or(FeaError::Singular)?;
                let u_next = u_n + dt * v_n + dt2 * ((0.5 - beta) * a_n + beta * &a_next);
                let v_next = v_n + dt * ((1.0 - gamma) * a_n + gamma * &a_next);
                Ok((u_next, v_next, a_next))
            }

            // Explicit leapfrog (velocity Verlet): equivalent to the
            // textbook central-difference scheme when C = 0, and a
            // semi-implicit approximation of it otherwise.
            TimeIntegrationMethod::CentralDifference => {
                let mut u_next = u_n + dt * v_n + 0.5 * dt * dt * a_n;
                for p in prescribed {
                    u_next[p.dof] = p.value;
                }
                let mut m_bc = m.clone();
                let mut f_trial = f_next - c * v_n - k * &u_next;
                pin_prescribed(&mut m_bc, &mut f_trial, prescribed);
                let a_trial = m_bc.lu().solve(&f_trial).ok_or(FeaError::Singular)?;
                let mut v_next = v_n + 0.5 * dt * (a_n + &a_trial);
                let mut a_next = a_trial;
                for p in prescribed {
                    v_next[p.dof] = 0.0;
                    a_next[p.dof] = 0.0;
                }
                Ok((u_next, v_next, a_next))
            }

            TimeIntegrationMethod::WilsonTheta => {
                let theta = self.settings.wilson_theta;
                let dt_w = theta * dt;
                let u_theta = newmark_solve_for_u(k, m, c, 1.0 / 6.0, 0.5, dt_w, u_n, v_n, a_n, f_next, prescribed)?;
                let (_, a_theta) = newmark_accel_velocity(&u_theta, u_n, v_n, a_n, 1.0 / 6.0, 0.5, dt_w);

                let a_next = a_n + (&a_theta - a_n) / theta;
                let v_next = v_n + dt * 0.5 * (a_n + &a_next);
                let u_next = u_n + dt * v_n + (dt * dt / 6.0) * (&a_next + 2.0 * a_n);
                Ok((u_next, v_next, a_next))
            }

            // Bathe's two-substep composite scheme (the open question in
            // §9 resolves this at the method-literature level): a
            // trapezoidal (average-acceleration Newmark) sub-step over
            // [t_n, t_n + dt/2], then a three-point Euler-backward
            // sub-step over [t_n + dt/2, t_n + dt].
            TimeIntegrationMethod::Bathe => {
                let dt_half = dt / 2.0;
                let u_half = newmark_solve_for_u(k, m, c, 0.25, 0.5, dt_half, u_n, v_n, a_n, f_next, prescribed)?;
                let (v_half, _) = newmark_accel_velocity(&u_half, u_n, v_n, a_n, 0.25, 0.5, dt_half);

                let dt2 = dt * dt;
                let mut k_eff = (9.0 / dt2) * m + (3.0 / dt) * c + k;
                let mut f_eff = f_next
                    + m * ((3.0 / dt2) * (4.0 * &u_half - u_n) + (1.0 / dt) * (4.0 * &v_half - v_n))
                    + c * ((1.0 / dt) * (4.0 * &u_half - u_n));
                apply_prescribed(&mut k_eff, &mut f_eff, prescribed);

                let u_next = k_eff.lu().solve(&f_eff).ok_or(FeaError::Singular)?;
                let v_next = (u_n - 4.0 * &u_half + 3.0 * &u_next) / dt;
                let a_next = (v_n - 4.0 * &v_half + 3.0 * &v_next) / dt;
                Ok((u_next, v_next, a_next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{Axis, TimeVariation};
    use crate::materials::Material;
    use crate::mesh::{Element, ElementKind, Node};

    fn cantilever_tip_mass() -> (Mesh, MaterialLibrary, Vec<BoundaryCondition>, Vec<Load>) {
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
            BoundaryCondition::Displacement { name: "fx".to_string(), group: "fixed_x0".to_string(), axis: Axis::X, value: 0.0 },
            BoundaryCondition::Displacement { name: "fy".to_string(), group: "fixed_x0".to_string(), axis: Axis::Y, value: 0.0 },
            BoundaryCondition::Displacement { name: "fz".to_string(), group: "fixed_x0".to_string(), axis: Axis::Z, value: 0.0 },
        ];
        let loads = vec![Load::PointForce {
            name: "p1".to_string(),
            group: "loaded_x1".to_string(),
            fx: 1.0e5,
            fy: 0.0,
            fz: 0.0,
            variation: TimeVariation::Static,
        }];
        (mesh, materials, bcs, loads)
    }

    #[test]
    fn newmark_produces_one_snapshot_per_save_interval() {
        let (mesh, materials, bcs, loads) = cantilever_tip_mass();
        let mut settings = DynamicSettings::default();
        settings.end_time = 0.01;
        settings.time_step = 1e-3;
        settings.save_interval = 2;

        let analysis = DynamicAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let results = analysis.solve().unwrap();

        // 10 steps at save_interval 2 -> snapshots at t=0, 2, 4, 6, 8, 10 steps = 6 entries.
        assert_eq!(results.time_history.len(), 6);
        assert!((results.time_history[0].time - 0.0).abs() < 1e-12);
        let last = results.time_history.last().unwrap();
        assert!((last.time - 0.01).abs() < 1e-9);
    }

    #[test]
    fn fixed_node_stays_at_zero_displacement_throughout() {
        let (mesh, materials, bcs, loads) = cantilever_tip_mass();
        let mut settings = DynamicSettings::default();
        settings.end_time = 0.005;
        settings.time_step = 1e-3;

        let analysis = DynamicAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let results = analysis.solve().unwrap();

        for snapshot in &results.time_history {
            // node 1 occupies DOFs 0..3, all fixed to zero.
            assert!(snapshot.u[0].abs() < 1e-6);
            assert!(snapshot.u[1].abs() < 1e-6);
            assert!(snapshot.u[2].abs() < 1e-6);
        }
    }

    #[test]
    fn hht_alpha_and_newmark_agree_at_zero_alpha() {
        let (mesh, materials, bcs, loads) = cantilever_tip_mass();
        let mut newmark_settings = DynamicSettings::default();
        newmark_settings.end_time = 0.004;
        newmark_settings.time_step = 1e-3;

        let mut hht_settings = newmark_settings.clone();
        hht_settings.method = TimeIntegrationMethod::HhtAlpha;
        hht_settings.hht_alpha = 0.0;

        let newmark_result = DynamicAnalysis::new(&mesh, &materials, &bcs, &loads, &newmark_settings).solve().unwrap();
        let hht_result = DynamicAnalysis::new(&mesh, &materials, &bcs, &loads, &hht_settings).solve().unwrap();

        let u_newmark = newmark_result.time_history.last().unwrap();
        let u_hht = hht_result.time_history.last().unwrap();
        for (a, b) in u_newmark.u.iter().zip(u_hht.u.iter()) {
            assert!((a - b).abs() < 1e-6 * a.abs().max(1.0), "newmark {} vs hht {}", a, b);
        }
    }

    #[test]
    fn invalid_settings_rejected_before_touching_mesh() {
        let (mesh, materials, bcs, loads) = cantilever_tip_mass();
        let mut settings = DynamicSettings::default();
        settings.time_step = -1.0;

        let analysis = DynamicAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let (err, results) = analysis.solve().unwrap_err();
        assert!(matches!(err, FeaError::InvalidSettings(_)));
        assert!(results.time_history.is_empty());
    }

    #[test]
    fn central_difference_respects_explicit_critical_step() {
        let (mesh, materials, bcs, loads) = cantilever_tip_mass();
        let mut settings = DynamicSettings::default();
        settings.method = TimeIntegrationMethod::CentralDifference;
        settings.end_time = 1e-5;
        settings.time_step = 1.0; // deliberately far above the critical step
        settings.gamma = 0.5;
        settings.beta = 0.25;

        let analysis = DynamicAnalysis::new(&mesh, &materials, &bcs, &loads, &settings);
        let results = analysis.solve().unwrap();
        assert!(results.time_history.len() > 1);
    }
}
