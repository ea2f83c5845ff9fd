//! Result container (C13): typed, key-indexed collections of analysis
//! output, plus the §6 line-oriented text persistence format.
//!
//! Every collection pairs a dense `Vec<T>` with a primary-key to
//! index `HashMap` so point lookup is O(1); insertion is append-only
//! and keeps both halves in lock-step (see [`IndexedVec`]).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, SymmetricEigen};

use crate::error::{FeaError, Result};

/// An append-only, key-indexed collection: `Vec<T>` plus a
/// primary-key to index map. `T`'s key is supplied by the caller at
/// push time so the same container type serves node-keyed,
/// element-keyed, and mode-keyed records alike.
#[derive(Debug, Clone, Default)]
pub struct IndexedVec<T> {
    items: Vec<T>,
    index: HashMap<i64, usize>,
}

impl<T> IndexedVec<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn push(&mut self, key: i64, item: T) {
        self.index.insert(key, self.items.len());
        self.items.push(item);
    }

    pub fn get(&self, key: i64) -> Option<&T> {
        self.index.get(&key).map(|&i| &self.items[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    pub node_id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Displacement {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Six independent stress components plus the derived invariants
/// computed once at recovery time (§4.5 step 5) so statistical
/// queries never recompute an eigen-decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stress {
    pub elem_id: i64,
    pub sxx: f64,
    pub syy: f64,
    pub szz: f64,
    pub sxy: f64,
    pub syz: f64,
    pub sxz: f64,
    pub von_mises: f64,
    pub principal: [f64; 3],
    pub max_shear: f64,
}

impl Stress {
    /// Build from the six engineering-stress components, computing
    /// principal invariants (sorted descending), von Mises, and max
    /// shear per §4.5 step 5.
    pub fn from_components(elem_id: i64, sxx: f64, syy: f64, szz: f64, sxy: f64, syz: f64, sxz: f64) -> Self {
        let tensor = Matrix3::new(sxx, sxy, sxz, sxy, syy, syz, sxz, syz, szz);
        let eigen = SymmetricEigen::new(tensor);
        let mut principal = [eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2]];
        principal.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let [s1, s2, s3] = principal;
        let von_mises = (0.5 * ((s1 - s2).powi(2) + (s2 - s3).powi(2) + (s3 - s1).powi(2))).sqrt();
        let max_shear = (s1 - s3) / 2.0;
        Self {
            elem_id,
            sxx,
            syy,
            szz,
            sxy,
            syz,
            sxz,
            von_mises,
            principal,
            max_shear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strain {
    pub elem_id: i64,
    pub exx: f64,
    pub eyy: f64,
    pub ezz: f64,
    pub exy: f64,
    pub eyz: f64,
    pub exz: f64,
    pub principal: [f64; 3],
    pub max_shear_half: f64,
}

impl Strain {
    pub fn from_components(elem_id: i64, exx: f64, eyy: f64, ezz: f64, exy: f64, eyz: f64, exz: f64) -> Self {
        // Engineering shear strains (gamma) carry a factor of 2 relative
        // to the tensor shear components that an eigen-decomposition
        // expects.
        let tensor = Matrix3::new(exx, exy / 2.0, exz / 2.0, exy / 2.0, eyy, eyz / 2.0, exz / 2.0, eyz / 2.0, ezz);
        let eigen = SymmetricEigen::new(tensor);
        let mut principal = [eigen.eigenvalues[0], eigen.eigenvalues[1], eigen.eigenvalues[2]];
        principal.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let max_shear_half = (principal[0] - principal[2]) / 2.0;
        Self {
            elem_id,
            exx,
            eyy,
            ezz,
            exy,
            eyz,
            exz,
            principal,
            max_shear_half,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactionForce {
    pub node_id: i64,
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
}

impl ReactionForce {
    pub fn magnitude(&self) -> f64 {
        (self.fx * self.fx + self.fy * self.fy + self.fz * self.fz).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frequency {
    pub mode_number: usize,
    pub f_hz: f64,
    pub period_s: f64,
    pub omega_rad_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeShape {
    pub node_id: i64,
    pub mode_number: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ModeShape {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadStepResult {
    pub lambda: f64,
    pub u: Vec<f64>,
}

/// One saved snapshot of a dynamic time-integration run (§4.7's
/// save-interval rule): the full displacement/velocity/acceleration
/// state vector at `time`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicStepResult {
    pub time: f64,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub a: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature {
    pub node_id: i64,
    pub time: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatFlux {
    pub node_id: i64,
    pub time: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalGradient {
    pub node_id: i64,
    pub time: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
}

/// Component selector for the `max_stress` / `min_stress` statistical
/// queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressComponent {
    Sxx,
    Syy,
    Szz,
    Sxy,
    Syz,
    Sxz,
    VonMises,
    MaxShear,
    Principal1,
    Principal2,
    Principal3,
}

fn stress_component_value(s: &Stress, component: StressComponent) -> f64 {
    match component {
        StressComponent::Sxx => s.sxx,
        StressComponent::Syy => s.syy,
        StressComponent::Szz => s.szz,
        StressComponent::Sxy => s.sxy,
        StressComponent::Syz => s.syz,
        StressComponent::Sxz => s.sxz,
        StressComponent::VonMises => s.von_mises,
        StressComponent::MaxShear => s.max_shear,
        StressComponent::Principal1 => s.principal[0],
        StressComponent::Principal2 => s.principal[1],
        StressComponent::Principal3 => s.principal[2],
    }
}

/// The full set of analysis output for one solve (C13). Every
/// collection is append-only; a solver pushes into it as it recovers
/// results and hands the completed container back to the caller.
#[derive(Debug, Clone, Default)]
pub struct ResultContainer {
    pub mesh_id: Option<String>,
    pub solver_type: Option<i64>,
    pub displacements: IndexedVec<Displacement>,
    pub stresses: IndexedVec<Stress>,
    pub strains: IndexedVec<Strain>,
    pub reactions: IndexedVec<ReactionForce>,
    pub frequencies: Vec<Frequency>,
    pub mode_shapes: Vec<ModeShape>,
    pub load_steps: Vec<LoadStepResult>,
    pub time_history: Vec<DynamicStepResult>,
    pub temperatures: Vec<Temperature>,
    pub heat_fluxes: Vec<HeatFlux>,
    pub thermal_gradients: Vec<ThermalGradient>,
}

impl ResultContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_displacement_magnitude(&self) -> f64 {
        self.displacements
            .iter()
            .map(Displacement::magnitude)
            .fold(0.0, f64::max)
    }

    pub fn max_stress(&self, component: StressComponent) -> f64 {
        if self.stresses.is_empty() {
            return 0.0;
        }
        self.stresses
            .iter()
            .map(|s| stress_component_value(s, component))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_stress(&self, component: StressComponent) -> f64 {
        if self.stresses.is_empty() {
            return 0.0;
        }
        self.stresses
            .iter()
            .map(|s| stress_component_value(s, component))
            .fold(f64::INFINITY, f64::min)
    }

    /// Sum of reaction-force components along one axis (0=X, 1=Y,
    /// 2=Z). Empty collections return `0.0`, never an error.
    pub fn total_reaction_force(&self, axis: usize) -> f64 {
        self.reactions
            .iter()
            .map(|r| match axis {
                0 => r.fx,
                1 => r.fy,
                _ => r.fz,
            })
            .sum()
    }

    /// Serialize every populated section in the §6 text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(mesh_id) = &self.mesh_id {
            let _ = writeln!(out, "# Mesh: {}", mesh_id);
        }
        if let Some(solver_type) = self.solver_type {
            let _ = writeln!(out, "# Solver Type: {}", solver_type);
        }

        if !self.displacements.is_empty() {
            let _ = writeln!(out, "Displacements");
            for d in self.displacements.iter() {
                let _ = writeln!(out, "{} {} {} {} {}", d.node_id, d.x, d.y, d.z, d.magnitude());
            }
        }
        if !self.stresses.is_empty() {
            let _ = writeln!(out, "Stresses");
            for s in self.stresses.iter() {
                let _ = writeln!(
                    out,
                    "{} {} {} {} {} {} {} {} {} {} {} {}",
                    s.elem_id,
                    s.sxx,
                    s.syy,
                    s.szz,
                    s.sxy,
                    s.syz,
                    s.sxz,
                    s.von_mises,
                    s.principal[0],
                    s.principal[1],
                    s.principal[2],
                    s.max_shear
                );
            }
        }
        if !self.strains.is_empty() {
            let _ = writeln!(out, "Strains");
            for s in self.strains.iter() {
                let _ = writeln!(
                    out,
                    "{} {} {} {} {} {} {} {} {} {} {}",
                    s.elem_id,
                    s.exx,
                    s.eyy,
                    s.ezz,
                    s.exy,
                    s.eyz,
                    s.exz,
                    s.principal[0],
                    s.principal[1],
                    s.principal[2],
                    s.max_shear_half
                );
            }
        }
        if !self.reactions.is_empty() {
            let _ = writeln!(out, "ReactionForces");
            for r in self.reactions.iter() {
                let _ = writeln!(out, "{} {} {} {} {}", r.node_id, r.fx, r.fy, r.fz, r.magnitude());
            }
        }
        if !self.frequencies.is_empty() {
            let _ = writeln!(out, "Frequencies");
            for f in &self.frequencies {
                let _ = writeln!(out, "{} {} {} {}", f.mode_number, f.f_hz, f.period_s, f.omega_rad_s);
            }
        }
        if !self.mode_shapes.is_empty() {
            let _ = writeln!(out, "ModeShapes");
            for m in &self.mode_shapes {
                let _ = writeln!(
                    out,
                    "{} {} {} {} {} {}",
                    m.node_id,
                    m.mode_number,
                    m.x,
                    m.y,
                    m.z,
                    m.magnitude()
                );
            }
        }
        if !self.load_steps.is_empty() {
            let _ = writeln!(out, "LoadSteps");
            for step in &self.load_steps {
                let mut line = format!("{}", step.lambda);
                for v in &step.u {
                    line.push(' ');
                    line.push_str(&v.to_string());
                }
                let _ = writeln!(out, "{}", line);
            }
        }
        if !self.time_history.is_empty() {
            let _ = writeln!(out, "TimeHistory");
            for step in &self.time_history {
                let mut line = format!("{} {}", step.time, step.u.len());
                for v in step.u.iter().chain(step.v.iter()).chain(step.a.iter()) {
                    line.push(' ');
                    line.push_str(&v.to_string());
                }
                let _ = writeln!(out, "{}", line);
            }
        }
        if !self.temperatures.is_empty() {
            let _ = writeln!(out, "Temperatures");
            for t in &self.temperatures {
                let _ = writeln!(out, "{} {} {}", t.node_id, t.time, t.value);
            }
        }
        if !self.heat_fluxes.is_empty() {
            let _ = writeln!(out, "HeatFluxes");
            for q in &self.heat_fluxes {
                let _ = writeln!(out, "{} {} {} {} {}", q.node_id, q.time, q.qx, q.qy, q.qz);
            }
        }
        if !self.thermal_gradients.is_empty() {
            let _ = writeln!(out, "ThermalGradients");
            for g in &self.thermal_gradients {
                let _ = writeln!(out, "{} {} {} {} {}", g.node_id, g.time, g.gx, g.gy, g.gz);
            }
        }
        out
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }

    /// Inverse of [`ResultContainer::to_text`]: parse the §6 format
    /// back into a container. Round-trips every value it emitted
    /// (§8 invariant 10): lines are LF-delimited, comment lines begin
    /// with `#` and are ignored except the two recognized metadata
    /// lines, and trailing whitespace is ignored.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut out = ResultContainer::new();
        let mut section: Option<&str> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim_end();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("# Mesh:") {
                out.mesh_id = Some(rest.trim().to_string());
                continue;
            }
            if let Some(rest) = line.strip_prefix("# Solver Type:") {
                out.solver_type = Some(rest.trim().parse().map_err(|_| {
                    FeaError::ResultParse(format!("bad solver type line: '{}'", line))
                })?);
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            match line {
                "Displacements" | "Stresses" | "Strains" | "ReactionForces" | "Frequencies" | "ModeShapes"
                | "LoadSteps" | "TimeHistory" | "Temperatures" | "HeatFluxes" | "ThermalGradients" => {
                    section = Some(line);
                    continue;
                }
                _ => {}
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            let parse_err = |what: &str| FeaError::ResultParse(format!("malformed {} record: '{}'", what, line));
            let f = |i: usize, what: &str| -> Result<f64> { fields.get(i).and_then(|s| s.parse().ok()).ok_or_else(|| parse_err(what)) };
            let i64_at = |i: usize, what: &str| -> Result<i64> { fields.get(i).and_then(|s| s.parse().ok()).ok_or_else(|| parse_err(what)) };
            let usize_at = |i: usize, what: &str| -> Result<usize> { fields.get(i).and_then(|s| s.parse().ok()).ok_or_else(|| parse_err(what)) };

            match section {
                Some("Displacements") => {
                    let node_id = i64_at(0, "Displacement")?;
                    out.displacements.push(
                        node_id,
                        Displacement {
                            node_id,
                            x: f(1, "Displacement")?,
                            y: f(2, "Displacement")?,
                            z: f(3, "Displacement")?,
                        },
                    );
                }
                Some("Stresses") => {
                    let elem_id = i64_at(0, "Stress")?;
                    out.stresses.push(
                        elem_id,
                        Stress {
                            elem_id,
                            sxx: f(1, "Stress")?,
                            syy: f(2, "Stress")?,
                            szz: f(3, "Stress")?,
                            sxy: f(4, "Stress")?,
                            syz: f(5, "Stress")?,
                            sxz: f(6, "Stress")?,
                            von_mises: f(7, "Stress")?,
                            principal: [f(8, "Stress")?, f(9, "Stress")?, f(10, "Stress")?],
                            max_shear: f(11, "Stress")?,
                        },
                    );
                }
                Some("Strains") => {
                    let elem_id = i64_at(0, "Strain")?;
                    out.strains.push(
                        elem_id,
                        Strain {
                            elem_id,
                            exx: f(1, "Strain")?,
                            eyy: f(2, "Strain")?,
                            ezz: f(3, "Strain")?,
                            exy: f(4, "Strain")?,
                            eyz: f(5, "Strain")?,
                            exz: f(6, "Strain")?,
                            principal: [f(7, "Strain")?, f(8, "Strain")?, f(9, "Strain")?],
                            max_shear_half: f(10, "Strain")?,
                        },
                    );
                }
                Some("ReactionForces") => {
                    let node_id = i64_at(0, "ReactionForce")?;
                    out.reactions.push(
                        node_id,
                        ReactionForce {
                            node_id,
                            fx: f(1, "ReactionForce")?,
                            fy: f(2, "ReactionForce")?,
                            fz: f(3, "ReactionForce")?,
                        },
                    );
                }
                Some("Frequencies") => {
                    out.frequencies.push(Frequency {
                        mode_number: usize_at(0, "Frequency")?,
                        f_hz: f(1, "Frequency")?,
                        period_s: f(2, "Frequency")?,
                        omega_rad_s: f(3, "Frequency")?,
                    });
                }
                Some("ModeShapes") => {
                    out.mode_shapes.push(ModeShape {
                        node_id: i64_at(0, "ModeShape")?,
                        mode_number: usize_at(1, "ModeShape")?,
                        x: f(2, "ModeShape")?,
                        y: f(3, "ModeShape")?,
                        z: f(4, "ModeShape")?,
                    });
                }
                Some("LoadSteps") => {
                    if fields.is_empty() {
                        return Err(parse_err("LoadStep"));
                    }
                    let lambda: f64 = fields[0].parse().map_err(|_| parse_err("LoadStep"))?;
                    let mut u = Vec::with_capacity(fields.len() - 1);
                    for field in &fields[1..] {
                        u.push(field.parse::<f64>().map_err(|_| parse_err("LoadStep"))?);
                    }
                    out.load_steps.push(LoadStepResult { lambda, u });
                }
                Some("TimeHistory") => {
                    if fields.len() < 2 {
                        return Err(parse_err("TimeHistory"));
                    }
                    let time: f64 = fields[0].parse().map_err(|_| parse_err("TimeHistory"))?;
                    let n: usize = fields[1].parse().map_err(|_| parse_err("TimeHistory"))?;
                    if fields.len() != 2 + 3 * n {
                        return Err(parse_err("TimeHistory"));
                    }
                    let rest = &fields[2..];
                    let parse_block = |block: &[&str]| -> Result<Vec<f64>> {
                        block.iter().map(|s| s.parse().map_err(|_| parse_err("TimeHistory"))).collect()
                    };
                    let u = parse_block(&rest[0..n])?;
                    let v = parse_block(&rest[n..2 * n])?;
                    let a = parse_block(&rest[2 * n..3 * n])?;
                    out.time_history.push(DynamicStepResult { time, u, v, a });
                }
                Some("Temperatures") => {
                    out.temperatures.push(Temperature {
                        node_id: i64_at(0, "Temperature")?,
                        time: f(1, "Temperature")?,
                        value: f(2, "Temperature")?,
                    });
                }
                Some("HeatFluxes") => {
                    out.heat_fluxes.push(HeatFlux {
                        node_id: i64_at(0, "HeatFlux")?,
                        time: f(1, "HeatFlux")?,
                        qx: f(2, "HeatFlux")?,
                        qy: f(3, "HeatFlux")?,
                        qz: f(4, "HeatFlux")?,
                    });
                }
                Some("ThermalGradients") => {
                    out.thermal_gradients.push(ThermalGradient {
                        node_id: i64_at(0, "ThermalGradient")?,
                        time: f(1, "ThermalGradient")?,
                        gx: f(2, "ThermalGradient")?,
                        gy: f(3, "ThermalGradient")?,
                        gz: f(4, "ThermalGradient")?,
                    });
                }
                _ => {
                    return Err(FeaError::ResultParse(format!("record outside any section: '{}'", line)));
                }
            }
        }

        Ok(out)
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_container_statistics_are_zero_not_error() {
        let r = ResultContainer::new();
        assert_eq!(r.max_displacement_magnitude(), 0.0);
        assert_eq!(r.max_stress(StressComponent::VonMises), 0.0);
        assert_eq!(r.min_stress(StressComponent::VonMises), 0.0);
        assert_eq!(r.total_reaction_force(0), 0.0);
    }

    #[test]
    fn uniaxial_stress_principal_ordering_and_von_mises() {
        let s = Stress::from_components(1, 100.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(s.principal[0] >= s.principal[1]);
        assert!(s.principal[1] >= s.principal[2]);
        assert!((s.von_mises - 100.0).abs() < 1e-9);
        assert!(s.von_mises >= 0.0);
        let trace = s.sxx + s.syy + s.szz;
        let principal_sum: f64 = s.principal.iter().sum();
        assert!((trace - principal_sum).abs() < 1e-9);
    }

    #[test]
    fn round_trip_preserves_every_value() {
        let mut r = ResultContainer::new();
        r.mesh_id = Some("cube".to_string());
        r.solver_type = Some(1);
        r.displacements.push(
            1,
            Displacement {
                node_id: 1,
                x: 1.234567890123e-7,
                y: 0.0,
                z: -3.3,
            },
        );
        r.stresses.push(1, Stress::from_components(1, 1.0, 2.0, 3.0, 0.1, 0.2, 0.3));
        r.reactions.push(
            2,
            ReactionForce {
                node_id: 2,
                fx: 10.0,
                fy: -10.0,
                fz: 0.0,
            },
        );
        r.frequencies.push(Frequency {
            mode_number: 1,
            f_hz: 12923.4,
            period_s: 1.0 / 12923.4,
            omega_rad_s: 2.0 * std::f64::consts::PI * 12923.4,
        });
        r.load_steps.push(LoadStepResult {
            lambda: 0.5,
            u: vec![1e-12, -2e-12, 0.0],
        });

        let text = r.to_text();
        let parsed = ResultContainer::from_text(&text).unwrap();

        assert_eq!(parsed.mesh_id, r.mesh_id);
        assert_eq!(parsed.solver_type, r.solver_type);
        assert_eq!(parsed.displacements.len(), 1);
        let d0 = parsed.displacements.get(1).unwrap();
        assert!((d0.x - 1.234567890123e-7).abs() <= 1e-15 * d0.x.abs().max(1.0));
        assert_eq!(parsed.stresses.len(), 1);
        assert_eq!(parsed.reactions.len(), 1);
        assert_eq!(parsed.frequencies.len(), 1);
        assert_eq!(parsed.load_steps.len(), 1);
        assert_eq!(parsed.load_steps[0].u, r.load_steps[0].u);
    }

    #[test]
    fn time_history_round_trips() {
        let mut r = ResultContainer::new();
        r.time_history.push(DynamicStepResult {
            time: 0.002,
            u: vec![1e-6, -2e-6],
            v: vec![0.1, -0.2],
            a: vec![5.0, -5.0],
        });
        let parsed = ResultContainer::from_text(&r.to_text()).unwrap();
        assert_eq!(parsed.time_history.len(), 1);
        assert_eq!(parsed.time_history[0], r.time_history[0]);
    }

    #[test]
    fn thermal_results_round_trip() {
        let mut r = ResultContainer::new();
        r.temperatures.push(Temperature {
            node_id: 1,
            time: 1.0,
            value: 85.5,
        });
        r.heat_fluxes.push(HeatFlux {
            node_id: 1,
            time: 1.0,
            qx: 12.0,
            qy: 0.0,
            qz: -3.5,
        });
        r.thermal_gradients.push(ThermalGradient {
            node_id: 1,
            time: 1.0,
            gx: 1.0,
            gy: 2.0,
            gz: 3.0,
        });
        let parsed = ResultContainer::from_text(&r.to_text()).unwrap();
        assert_eq!(parsed.temperatures.len(), 1);
        assert_eq!(parsed.heat_fluxes.len(), 1);
        assert_eq!(parsed.thermal_gradients.len(), 1);
        assert_eq!(parsed.temperatures[0], r.temperatures[0]);
        assert_eq!(parsed.heat_fluxes[0], r.heat_fluxes[0]);
        assert_eq!(parsed.thermal_gradients[0], r.thermal_gradients[0]);
    }

    #[test]
    fn missing_group_error_leaves_container_unmutated() {
        // Parsing malformed text must not partially populate the container.
        let err = ResultContainer::from_text("Displacements\n1 2 3\n").unwrap_err();
        assert!(matches!(err, FeaError::ResultParse(_)));
    }
}
