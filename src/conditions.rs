//! Boundary conditions and loads: declarative prescriptions targeting
//! named groups, validated against a mesh before a solve uses them (C3).

use crate::mesh::Mesh;

/// Displacement component tag used by `Displacement` BCs and `Symmetry`
/// reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A boundary condition: a named, tagged record targeting a group.
/// `Displacement`, `Temperature`, and `Symmetry` target node groups;
/// `Pressure`, `HeatFlux`, and `Convection` target element groups
/// (surface facets). `Force` and `Contact` are carried for data-model
/// completeness; `Force` is ordinarily expressed as a `Load::PointForce`
/// in this crate, and `Contact` is an explicit Non-goal stub.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryCondition {
    Displacement {
        name: String,
        group: String,
        axis: Axis,
        value: f64,
    },
    Force {
        name: String,
        group: String,
        axis: Axis,
        value: f64,
    },
    Pressure {
        name: String,
        group: String,
        magnitude: f64,
    },
    Temperature {
        name: String,
        group: String,
        value: f64,
    },
    HeatFlux {
        name: String,
        group: String,
        magnitude: f64,
    },
    Convection {
        name: String,
        group: String,
        film_coefficient: f64,
        ambient_temperature: f64,
    },
    Symmetry {
        name: String,
        group: String,
        axis: Axis,
    },
    Contact {
        name: String,
        group: String,
    },
}

impl BoundaryCondition {
    pub fn name(&self) -> &str {
        match self {
            BoundaryCondition::Displacement { name, .. }
            | BoundaryCondition::Force { name, .. }
            | BoundaryCondition::Pressure { name, .. }
            | BoundaryCondition::Temperature { name, .. }
            | BoundaryCondition::HeatFlux { name, .. }
            | BoundaryCondition::Convection { name, .. }
            | BoundaryCondition::Symmetry { name, .. }
            | BoundaryCondition::Contact { name, .. } => name,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            BoundaryCondition::Displacement { group, .. }
            | BoundaryCondition::Force { group, .. }
            | BoundaryCondition::Pressure { group, .. }
            | BoundaryCondition::Temperature { group, .. }
            | BoundaryCondition::HeatFlux { group, .. }
            | BoundaryCondition::Convection { group, .. }
            | BoundaryCondition::Symmetry { group, .. }
            | BoundaryCondition::Contact { group, .. } => group,
        }
    }

    /// Targets a node group (as opposed to an element group).
    pub fn targets_node_group(&self) -> bool {
        matches!(
            self,
            BoundaryCondition::Displacement { .. }
                | BoundaryCondition::Force { .. }
                | BoundaryCondition::Temperature { .. }
                | BoundaryCondition::Symmetry { .. }
        )
    }

    /// Resolves a `Symmetry` BC to the equivalent `Displacement` BC on
    /// the named group's normal component, per §4.3.
    pub fn reduce_symmetry(&self) -> Option<BoundaryCondition> {
        match self {
            BoundaryCondition::Symmetry { name, group, axis } => Some(BoundaryCondition::Displacement {
                name: format!("{}_reduced", name),
                group: group.clone(),
                axis: *axis,
                value: 0.0,
            }),
            _ => None,
        }
    }

    /// Validates this BC against a mesh: the target group must exist
    /// and must be the right kind (node group vs. element group).
    pub fn is_valid(&self, mesh: &Mesh) -> bool {
        if self.targets_node_group() {
            mesh.has_node_group(self.group())
        } else {
            mesh.has_element_group(self.group())
        }
    }
}

/// Time-variation tag for a [`Load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeVariation {
    Static,
    Transient,
    Harmonic,
    Random,
}

/// A load: analogous to [`BoundaryCondition`] but carrying a
/// time-variation tag. `PointForce`, `Moment`, and `Thermal` target
/// node groups; `SurfacePressure`, `BodyForce`, and `Centrifugal`
/// target element groups. `LineForce`, `Acceleration`, and
/// `Pretension` are carried for data-model completeness.
#[derive(Debug, Clone, PartialEq)]
pub enum Load {
    PointForce {
        name: String,
        group: String,
        fx: f64,
        fy: f64,
        fz: f64,
        variation: TimeVariation,
    },
    LineForce {
        name: String,
        group: String,
        magnitude_per_length: f64,
        variation: TimeVariation,
    },
    SurfacePressure {
        name: String,
        group: String,
        magnitude: f64,
        variation: TimeVariation,
    },
    BodyForce {
        name: String,
        group: String,
        bx: f64,
        by: f64,
        bz: f64,
        variation: TimeVariation,
    },
    Moment {
        name: String,
        group: String,
        mx: f64,
        my: f64,
        mz: f64,
        variation: TimeVariation,
    },
    Acceleration {
        name: String,
        group: String,
        ax: f64,
        ay: f64,
        az: f64,
        variation: TimeVariation,
    },
    Centrifugal {
        name: String,
        group: String,
        omega: f64,
        axis: Axis,
        variation: TimeVariation,
    },
    Thermal {
        name: String,
        group: String,
        heat_rate: f64,
        variation: TimeVariation,
    },
    Pretension {
        name: String,
        group: String,
        force: f64,
        variation: TimeVariation,
    },
}

impl Load {
    pub fn name(&self) -> &str {
        match self {
            Load::PointForce { name, .. }
            | Load::LineForce { name, .. }
            | Load::SurfacePressure { name, .. }
            | Load::BodyForce { name, .. }
            | Load::Moment { name, .. }
            | Load::Acceleration { name, .. }
            | Load::Centrifugal { name, .. }
            | Load::Thermal { name, .. }
            | Load::Pretension { name, .. } => name,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            Load::PointForce { group, .. }
            | Load::LineForce { group, .. }
            | Load::SurfacePressure { group, .. }
            | Load::BodyForce { group, .. }
            | Load::Moment { group, .. }
            | Load::Acceleration { group, .. }
            | Load::Centrifugal { group, .. }
            | Load::Thermal { group, .. }
            | Load::Pretension { group, .. } => group,
        }
    }

    pub fn targets_node_group(&self) -> bool {
        matches!(self, Load::PointForce { .. } | Load::Moment { .. } | Load::Thermal { .. })
    }

    pub fn is_valid(&self, mesh: &Mesh) -> bool {
        if self.targets_node_group() {
            mesh.has_node_group(self.group())
        } else {
            mesh.has_element_group(self.group())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Element, ElementKind, Mesh, Node};

    fn cube_mesh() -> Mesh {
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
        mesh.add_element(Element::new(1, ElementKind::Hexa, vec![1, 2, 3, 4, 5, 6, 7, 8]))
            .unwrap();
        mesh.add_node_group("fixed_x0", vec![1, 4, 5, 8]).unwrap();
        mesh.add_element_group("face_x1", vec![1], None).unwrap();
        mesh
    }

    #[test]
    fn displacement_bc_valid_against_existing_node_group() {
        let mesh = cube_mesh();
        let bc = BoundaryCondition::Displacement {
            name: "fix_x".to_string(),
            group: "fixed_x0".to_string(),
            axis: Axis::X,
            value: 0.0,
        };
        assert!(bc.is_valid(&mesh));
    }

    #[test]
    fn missing_group_rejection() {
        let mesh = cube_mesh();
        let bc = BoundaryCondition::Displacement {
            name: "fix_x".to_string(),
            group: "does_not_exist".to_string(),
            axis: Axis::X,
            value: 0.0,
        };
        assert!(!bc.is_valid(&mesh));
    }

    #[test]
    fn pressure_load_and_bc_target_element_groups() {
        let mesh = cube_mesh();
        let bc = BoundaryCondition::Pressure {
            name: "p1".to_string(),
            group: "face_x1".to_string(),
            magnitude: 1.0,
        };
        assert!(bc.is_valid(&mesh));

        let load = Load::SurfacePressure {
            name: "p1".to_string(),
            group: "face_x1".to_string(),
            magnitude: 1.0,
            variation: TimeVariation::Static,
        };
        assert!(load.is_valid(&mesh));
    }

    #[test]
    fn symmetry_reduces_to_displacement() {
        let sym = BoundaryCondition::Symmetry {
            name: "sym_x".to_string(),
            group: "fixed_x0".to_string(),
            axis: Axis::X,
        };
        let reduced = sym.reduce_symmetry().unwrap();
        assert!(matches!(reduced, BoundaryCondition::Displacement { value, .. } if value == 0.0));
    }
}
