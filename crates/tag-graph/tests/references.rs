use serde_json::json;
use shotkit_catalogue::Snapshot;
use shotkit_common::{MissingEntryPolicy, ProjectConfig, WarningCode, Warnings};
use shotkit_project_model::TagRecord;
use shotkit_scene_core::{descendants, MemoryScene, NodeId, NodeKind, Scene};
use shotkit_tag_graph::{TagFilter, TagGraph};

fn reference(scene: &mut MemoryScene, namespace: &str) -> NodeId {
    let root = scene
        .create_node(&format!("{namespace}:char_A"), NodeKind::Transform, None)
        .unwrap();
    let geo = scene
        .create_node(&format!("{namespace}:body"), NodeKind::Transform, Some(root))
        .unwrap();
    scene
        .create_node(&format!("{namespace}:bodyShape"), NodeKind::Mesh, Some(geo))
        .unwrap();
    scene.set_referenced(root, true).unwrap();
    root
}

fn snapshot() -> Snapshot {
    let (snapshot, _) = Snapshot::build(
        &[
            json!({"id": "a-1", "name": "char_A", "category": "character"}),
            json!({"id": "a-2", "name": "prop_B", "category": "prop"}),
        ],
        &[],
        &[],
        &ProjectConfig::default(),
    );
    snapshot
}

#[test]
fn tagging_one_reference_leaves_the_other_untagged() {
    let graph = TagGraph::new("DEMO_TAG");
    let mut scene = MemoryScene::new();
    let first = reference(&mut scene, "ns1");
    let second = reference(&mut scene, "ns2");

    graph
        .tag(
            &mut scene,
            first,
            &TagRecord::new(Some("a-1".to_string())).with_types(["character"]),
            None,
        )
        .unwrap();

    for node in std::iter::once(second).chain(descendants(&scene, second).unwrap()) {
        if scene.kind(node).unwrap() == NodeKind::Transform {
            assert_eq!(graph.find_tag_for_node(&scene, node).unwrap(), None);
        }
    }
    let all = graph.find_all_tags(&scene, &TagFilter::any()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].node, first);
}

#[test]
fn resolution_prefers_the_stored_id_then_names() {
    let graph = TagGraph::new("DEMO_TAG");
    let snapshot = snapshot();
    let mut scene = MemoryScene::new();
    let by_id = scene.create_node("ns1:whatever", NodeKind::Transform, None).unwrap();
    let by_name = scene.create_node("ns2:prop_B1", NodeKind::Transform, None).unwrap();

    let tagged = graph
        .tag(&mut scene, by_id, &TagRecord::new(Some("a-1".to_string())), None)
        .unwrap();
    graph.embed(&mut scene, by_name, &TagRecord::new(None)).unwrap();
    let embedded = graph.find_tag_for_node(&scene, by_name).unwrap().unwrap();

    let mut warnings = Warnings::new();
    let entry = graph
        .resolve_to_catalogue(&scene, &tagged, &snapshot, &mut warnings)
        .unwrap()
        .unwrap();
    assert_eq!(entry.name, "char_A");
    let entry = graph
        .resolve_to_catalogue(&scene, &embedded, &snapshot, &mut warnings)
        .unwrap()
        .unwrap();
    assert_eq!(entry.id, "a-2");
    assert!(warnings.is_empty());
}

#[test]
fn missing_entries_follow_the_policy() {
    let snapshot = snapshot();
    let mut scene = MemoryScene::new();
    let node = scene.create_node("stranger", NodeKind::Transform, None).unwrap();

    let silent = TagGraph::new("DEMO_TAG");
    let tag = silent.tag(&mut scene, node, &TagRecord::new(None), None).unwrap();
    let mut warnings = Warnings::new();
    assert!(silent
        .resolve_to_catalogue(&scene, &tag, &snapshot, &mut warnings)
        .unwrap()
        .is_none());
    assert!(warnings.is_empty());

    let loud = TagGraph::new("DEMO_TAG").with_resolution_policy(MissingEntryPolicy::Warn);
    loud.resolve_to_catalogue(&scene, &tag, &snapshot, &mut warnings)
        .unwrap();
    assert!(warnings.contains(WarningCode::CatalogueEntryMissing));
}
