//! Mesh, nodes, elements, and named groups (C1).
//!
//! A [`Mesh`] owns its nodes, elements, and groups and exposes O(1)
//! lookup by id or name. DOF indices are *not* stored on [`Node`] —
//! they are assigned in a single dense scan at solver entry (see
//! [`Mesh::assign_dofs`]) and are meaningless before that scan runs.

use std::collections::HashMap;

use crate::error::{FeaError, Result};
use crate::materials::MaterialHandle;

/// A mesh node: identity plus physical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Node {
    pub fn new(id: i64, x: f64, y: f64, z: f64) -> Self {
        Self { id, x, y, z }
    }

    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Element kind tags, drawn from the abstract taxonomy in the data model.
///
/// `Beam`, `Pyramid`, and `Prism` are recognized for mesh bookkeeping and
/// group targeting; they have no supported element kernel (see
/// `elements::KernelKind`) and attempting to assemble one is an assembly
/// error, not a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Beam,
    Triangle,
    Quad,
    Tetra,
    Hexa,
    Pyramid,
    Prism,
}

impl ElementKind {
    /// Legal node counts for this kind. Quadratic variants come second.
    pub fn legal_node_counts(self) -> &'static [usize] {
        match self {
            ElementKind::Beam => &[2, 3],
            ElementKind::Triangle => &[3, 6],
            ElementKind::Quad => &[4, 8],
            ElementKind::Tetra => &[4, 10],
            ElementKind::Hexa => &[8, 20],
            ElementKind::Pyramid => &[5],
            ElementKind::Prism => &[6, 15],
        }
    }

    pub fn is_valid_node_count(self, n: usize) -> bool {
        self.legal_node_counts().contains(&n)
    }
}

/// A single finite element: identity, kind, ordered connectivity, and an
/// optional material handle. Node order defines the local-to-natural
/// coordinate mapping; reordering it changes the Jacobian sign.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: i64,
    pub kind: ElementKind,
    pub nodes: Vec<i64>,
    pub material: Option<MaterialHandle>,
}

impl Element {
    pub fn new(id: i64, kind: ElementKind, nodes: Vec<i64>) -> Self {
        Self {
            id,
            kind,
            nodes,
            material: None,
        }
    }

    pub fn with_material(mut self, handle: MaterialHandle) -> Self {
        self.material = Some(handle);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.kind.is_valid_node_count(self.nodes.len()) {
            return Err(FeaError::InvalidMesh(format!(
                "element {} of kind {:?} has {} nodes, which is not a legal count ({:?})",
                self.id,
                self.kind,
                self.nodes.len(),
                self.kind.legal_node_counts()
            )));
        }
        Ok(())
    }
}

/// A named set of node ids, unique per mesh among node groups.
#[derive(Debug, Clone)]
pub struct NodeGroup {
    pub name: String,
    pub node_ids: Vec<i64>,
}

/// A named set of element ids. When `material_override` is set it
/// overrides the per-element material of every member for the duration
/// of the solve that reads it.
#[derive(Debug, Clone)]
pub struct ElementGroup {
    pub name: String,
    pub element_ids: Vec<i64>,
    pub material_override: Option<MaterialHandle>,
}

/// Degree-of-freedom scheme: mechanical analysis assigns 3 translational
/// DOFs per node, thermal analysis assigns a single temperature DOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DofScheme {
    Mechanical3,
    Thermal1,
}

impl DofScheme {
    pub fn dofs_per_node(self) -> usize {
        match self {
            DofScheme::Mechanical3 => 3,
            DofScheme::Thermal1 => 1,
        }
    }
}

/// Owns nodes, elements, and named groups; provides O(1) lookup by id
/// or name via four id-to-index maps and two name-to-index maps.
#[derive(Debug, Clone)]
pub struct Mesh {
    nodes: Vec<Node>,
    node_index: HashMap<i64, usize>,
    elements: Vec<Element>,
    element_index: HashMap<i64, usize>,
    node_groups: Vec<NodeGroup>,
    node_group_index: HashMap<String, usize>,
    element_groups: Vec<ElementGroup>,
    element_group_index: HashMap<String, usize>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            elements: Vec::new(),
            element_index: HashMap::new(),
            node_groups: Vec::new(),
            node_group_index: HashMap::new(),
            element_groups: Vec::new(),
            element_group_index: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.node_index.contains_key(&node.id) {
            return Err(FeaError::InvalidMesh(format!(
                "duplicate node id {}",
                node.id
            )));
        }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_element(&mut self, element: Element) -> Result<()> {
        element.validate()?;
        if self.element_index.contains_key(&element.id) {
            return Err(FeaError::InvalidMesh(format!(
                "duplicate element id {}",
                element.id
            )));
        }
        for &node_id in &element.nodes {
            if !self.node_index.contains_key(&node_id) {
                return Err(FeaError::InvalidMesh(format!(
                    "element {} references unknown node {}",
                    element.id, node_id
                )));
            }
        }
        self.element_index.insert(element.id, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    pub fn add_node_group(&mut self, name: impl Into<String>, node_ids: Vec<i64>) -> Result<()> {
        let name = name.into();
        if self.node_group_index.contains_key(&name) {
            return Err(FeaError::InvalidMesh(format!(
                "duplicate node group name '{}'",
                name
            )));
        }
        for &id in &node_ids {
            if !self.node_index.contains_key(&id) {
                return Err(FeaError::InvalidMesh(format!(
                    "node group '{}' references unknown node {}",
                    name, id
                )));
            }
        }
        self.node_group_index
            .insert(name.clone(), self.node_groups.len());
        self.node_groups.push(NodeGroup { name, node_ids });
        Ok(())
    }

    pub fn add_element_group(
        &mut self,
        name: impl Into<String>,
        element_ids: Vec<i64>,
        material_override: Option<MaterialHandle>,
    ) -> Result<()> {
        let name = name.into();
        if self.element_group_index.contains_key(&name) {
            return Err(FeaError::InvalidMesh(format!(
                "duplicate element group name '{}'",
                name
            )));
        }
        for &id in &element_ids {
            if !self.element_index.contains_key(&id) {
                return Err(FeaError::InvalidMesh(format!(
                    "element group '{}' references unknown element {}",
                    name, id
                )));
            }
        }
        self.element_group_index
            .insert(name.clone(), self.element_groups.len());
        self.element_groups.push(ElementGroup {
            name,
            element_ids,
            material_override,
        });
        Ok(())
    }

    pub fn get_node(&self, id: i64) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn get_element(&self, id: i64) -> Option<&Element> {
        self.element_index.get(&id).map(|&i| &self.elements[i])
    }

    pub fn get_node_group(&self, name: &str) -> Option<&NodeGroup> {
        self.node_group_index
            .get(name)
            .map(|&i| &self.node_groups[i])
    }

    pub fn get_element_group(&self, name: &str) -> Option<&ElementGroup> {
        self.element_group_index
            .get(name)
            .map(|&i| &self.element_groups[i])
    }

    pub fn has_node_group(&self, name: &str) -> bool {
        self.node_group_index.contains_key(name)
    }

    pub fn has_element_group(&self, name: &str) -> bool {
        self.element_group_index.contains_key(name)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn node_groups(&self) -> &[NodeGroup] {
        &self.node_groups
    }

    pub fn element_groups(&self) -> &[ElementGroup] {
        &self.element_groups
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Re-validate every mesh-wide invariant from the data model. Useful
    /// to call once at solver entry even if a mesh was partly assembled
    /// through means other than the `add_*` methods.
    pub fn validate(&self) -> Result<()> {
        for element in &self.elements {
            element.validate()?;
            for &node_id in &element.nodes {
                if !self.node_index.contains_key(&node_id) {
                    return Err(FeaError::InvalidMesh(format!(
                        "element {} references unknown node {}",
                        element.id, node_id
                    )));
                }
            }
        }
        for group in &self.node_groups {
            for &id in &group.node_ids {
                if !self.node_index.contains_key(&id) {
                    return Err(FeaError::InvalidMesh(format!(
                        "node group '{}' references unknown node {}",
                        group.name, id
                    )));
                }
            }
        }
        for group in &self.element_groups {
            for &id in &group.element_ids {
                if !self.element_index.contains_key(&id) {
                    return Err(FeaError::InvalidMesh(format!(
                        "element group '{}' references unknown element {}",
                        group.name, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Assign global DOF indices in a single dense scan over nodes in
    /// insertion order. Returns `num_dofs = n * dofs_per_node` and a
    /// lookup from node id to its first DOF index.
    pub fn assign_dofs(&self, scheme: DofScheme) -> (usize, HashMap<i64, usize>) {
        let dpn = scheme.dofs_per_node();
        let mut map = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            map.insert(node.id, i * dpn);
        }
        (self.nodes.len() * dpn, map)
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_nodes() -> Vec<Node> {
        vec![
            Node::new(1, 0.0, 0.0, 0.0),
            Node::new(2, 1.0, 0.0, 0.0),
            Node::new(3, 1.0, 1.0, 0.0),
            Node::new(4, 0.0, 1.0, 0.0),
            Node::new(5, 0.0, 0.0, 1.0),
            Node::new(6, 1.0, 0.0, 1.0),
            Node::new(7, 1.0, 1.0, 1.0),
            Node::new(8, 0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn add_nodes_and_elements() {
        let mut mesh = Mesh::new();
        for n in unit_cube_nodes() {
            mesh.add_node(n).unwrap();
        }
        mesh.add_element(Element::new(
            1,
            ElementKind::Hexa,
            vec![1, 2, 3, 4, 5, 6, 7, 8],
        ))
        .unwrap();
        assert_eq!(mesh.num_nodes(), 8);
        assert_eq!(mesh.num_elements(), 1);
    }

    #[test]
    fn rejects_element_with_unknown_node() {
        let mut mesh = Mesh::new();
        for n in unit_cube_nodes() {
            mesh.add_node(n).unwrap();
        }
        let err = mesh
            .add_element(Element::new(1, ElementKind::Tetra, vec![1, 2, 3, 99]))
            .unwrap_err();
        assert!(matches!(err, FeaError::InvalidMesh(_)));
    }

    #[test]
    fn rejects_illegal_node_count() {
        let mut mesh = Mesh::new();
        for n in unit_cube_nodes() {
            mesh.add_node(n).unwrap();
        }
        let err = mesh
            .add_element(Element::new(1, ElementKind::Tetra, vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, FeaError::InvalidMesh(_)));
    }

    #[test]
    fn dof_assignment_is_total_and_dense() {
        let mut mesh = Mesh::new();
        for n in unit_cube_nodes() {
            mesh.add_node(n).unwrap();
        }
        let (num_dofs, map) = mesh.assign_dofs(DofScheme::Mechanical3);
        assert_eq!(num_dofs, 24);
        let mut seen: Vec<usize> = map.values().copied().collect();
        seen.sort();
        assert_eq!(seen, vec![0, 3, 6, 9, 12, 15, 18, 21]);
    }

    #[test]
    fn node_groups_require_existing_nodes() {
        let mut mesh = Mesh::new();
        for n in unit_cube_nodes() {
            mesh.add_node(n).unwrap();
        }
        mesh.add_node_group("fixed_x0", vec![1, 4, 5, 8]).unwrap();
        assert!(mesh.has_node_group("fixed_x0"));
        assert!(!mesh.has_node_group("nonexistent"));

        let err = mesh.add_node_group("bad", vec![999]).unwrap_err();
        assert!(matches!(err, FeaError::InvalidMesh(_)));
    }

    #[test]
    fn element_group_material_override() {
        use crate::materials::MaterialHandle;
        let mut mesh = Mesh::new();
        for n in unit_cube_nodes() {
            mesh.add_node(n).unwrap();
        }
        mesh.add_element(Element::new(
            1,
            ElementKind::Hexa,
            vec![1, 2, 3, 4, 5, 6, 7, 8],
        ))
        .unwrap();
        mesh.add_element_group("all", vec![1], Some(MaterialHandle(0)))
            .unwrap();
        let group = mesh.get_element_group("all").unwrap();
        assert_eq!(group.material_override, Some(MaterialHandle(0)));
    }
}
