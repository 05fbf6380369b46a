//! List the tags of a dumped scene.

use std::path::PathBuf;

use shotkit_scene_core::{MemoryScene, Scene};
use shotkit_tag_graph::TagFilter;

use super::Context;

pub fn run(ctx: &Context, scene: PathBuf, types: Vec<String>, json: bool) -> anyhow::Result<()> {
    let scene = MemoryScene::load(&scene)
        .map_err(|e| anyhow::anyhow!("Failed to load scene {}: {e}", scene.display()))?;
    let graph = shotkit_tag_graph::TagGraph::from_config(&ctx.config);
    let tags = graph.find_all_tags(&scene, &TagFilter::any().with_types(types))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    println!("Tags ({}):", tags.len());
    for tag in &tags {
        let record = &tag.record;
        println!("  {} ({:?})", scene.name(tag.node)?, tag.form);
        println!(
            "    Catalogue id: {}",
            record.catalogue_id.as_deref().unwrap_or("-")
        );
        if !record.types.is_empty() {
            let types: Vec<&str> = record.types.iter().map(String::as_str).collect();
            println!("    Types: {}", types.join(", "));
        }
        if let Some(hires) = &record.hires {
            println!("    Hires: {hires}");
        }
        for (mesh, groups) in &record.shaders {
            let groups: Vec<&str> = groups.iter().map(String::as_str).collect();
            println!("    Shader {mesh}: {}", groups.join(", "));
        }
    }
    Ok(())
}
