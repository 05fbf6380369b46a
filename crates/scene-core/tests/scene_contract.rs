use shotkit_scene_core::{
    descendants, short_name, strip_namespace, AttrValue, MemoryScene, NodeKind, Scene,
};

fn reference_asset(scene: &mut dyn Scene, namespace: &str) -> shotkit_scene_core::NodeId {
    let root = scene
        .create_node(&format!("{namespace}:char_A"), NodeKind::Transform, None)
        .unwrap();
    let body = scene
        .create_node(&format!("{namespace}:body"), NodeKind::Transform, Some(root))
        .unwrap();
    scene
        .create_node(&format!("{namespace}:bodyShape"), NodeKind::Mesh, Some(body))
        .unwrap();
    root
}

#[test]
fn two_references_share_short_names_but_not_identity() {
    let mut scene = MemoryScene::new();
    let first = reference_asset(&mut scene, "ns1");
    let second = reference_asset(&mut scene, "ns2");
    scene.set_referenced(first, true).unwrap();
    scene.set_referenced(second, true).unwrap();

    assert_ne!(first, second);
    assert_eq!(short_name(&scene, first).unwrap(), "char_A");
    assert_eq!(short_name(&scene, second).unwrap(), "char_A");
    assert_eq!(scene.roots(), vec![first, second]);
    assert_eq!(scene.nodes_of_kind(NodeKind::Mesh).len(), 2);

    let names: Vec<String> = descendants(&scene, second)
        .unwrap()
        .into_iter()
        .map(|n| scene.name(n).unwrap())
        .collect();
    assert_eq!(names, vec!["ns2:body", "ns2:bodyShape"]);
    assert_eq!(strip_namespace(&names[1]), "bodyShape");
}

#[test]
fn attributes_survive_a_json_round_trip_through_the_trait() {
    let mut scene = MemoryScene::new();
    let node = scene.create_node("prop_B", NodeKind::Transform, None).unwrap();
    {
        let dynamic: &mut dyn Scene = &mut scene;
        dynamic
            .set_attr(node, "displaySmoothMesh", AttrValue::Int(2))
            .unwrap();
        dynamic
            .set_attr(node, "tag_info", AttrValue::from("{\"types\": \"prop\"}"))
            .unwrap();
    }

    let restored = MemoryScene::from_json(&scene.to_json().unwrap()).unwrap();
    assert_eq!(
        restored.attr(node, "displaySmoothMesh").unwrap(),
        Some(AttrValue::Int(2))
    );
    assert_eq!(
        restored.attr_names(node).unwrap(),
        vec!["displaySmoothMesh", "tag_info"]
    );
}
