//! Scenario 2 (end-to-end): cantilever tip deflection against the
//! Euler-Bernoulli reference. Ten hex elements along X, 0.01x0.01 m
//! cross-section, 0.1 m length, steel. The x=0 face is fully fixed; a
//! -1 N point force in Y is split evenly over the four tip-face nodes
//! (the consistent nodal load a point force at the tip center would
//! itself produce on a mesh with no literal center node).

use fea_core::{Axis, BoundaryCondition, Element, ElementKind, Load, Material, MaterialLibrary, Mesh, Node, StaticAnalysis, TimeVariation};

fn cantilever(n_elements: usize, length: f64, side: f64, e: f64, nu: f64, rho: f64) -> (Mesh, MaterialLibrary, Vec<i64>) {
    let mut mesh = Mesh::new();
    let mut materials = MaterialLibrary::new();
    let steel = materials.add(Material::isotropic("steel", e, nu, rho).unwrap());

    let dx = length / n_elements as f64;
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
    let tip: Vec<i64> = layer_ids[n_elements].to_vec();
    (mesh, materials, tip)
}

#[test]
fn cantilever_tip_deflection_matches_euler_bernoulli_within_5_percent() {
    let e = 210e9;
    let nu = 0.3;
    let rho = 7800.0;
    let length = 0.1;
    let side = 0.01;
    let force = -1.0;

    let (mut mesh, materials, tip) = cantilever(10, length, side, e, nu, rho);
    mesh.add_node_group("tip", tip.clone()).unwrap();

    let bcs = vec![
        BoundaryCondition::Displacement { name: "fix_x".to_string(), group: "base".to_string(), axis: Axis::X, value: 0.0 },
        BoundaryCondition::Displacement { name: "fix_y".to_string(), group: "base".to_string(), axis: Axis::Y, value: 0.0 },
        BoundaryCondition::Displacement { name: "fix_z".to_string(), group: "base".to_string(), axis: Axis::Z, value: 0.0 },
    ];
    let loads = vec![Load::PointForce {
        name: "tip_load".to_string(),
        group: "tip".to_string(),
        fx: 0.0,
        fy: force / tip.len() as f64,
        fz: 0.0,
        variation: TimeVariation::Static,
    }];

    let analysis = StaticAnalysis::new(&mesh, &materials, &bcs, &loads);
    let results = analysis.solve().unwrap();

    let i = side.powi(4) / 12.0;
    let expected = force * length.powi(3) / (3.0 * e * i);
    let u_avg: f64 = tip.iter().map(|&n| results.displacements.get(n).unwrap().y).sum::<f64>() / tip.len() as f64;
    assert!(
        (u_avg - expected).abs() / expected.abs() < 0.05,
        "u_y_avg={}, expected~={}",
        u_avg,
        expected
    );
}
