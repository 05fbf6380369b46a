//! Assemble a shot into an in-memory scene.

use std::path::PathBuf;

use shotkit_common::CancelToken;
use shotkit_scene_core::Scene;
use shotkit_tag_graph::TagFilter;

use super::{open_scene, print_warnings, Context};

pub async fn run(
    ctx: &Context,
    shot: PathBuf,
    catalogue: Option<PathBuf>,
    scene: Option<PathBuf>,
    dump: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let project = ctx.project(catalogue.as_deref());
    if catalogue.is_some() {
        let report = project
            .catalogue()
            .refresh()
            .await
            .map_err(|e| anyhow::anyhow!("Catalogue refresh failed: {e}"))?;
        tracing::info!(
            assets = report.assets,
            shots = report.shots,
            sequences = report.sequences,
            "Catalogue refreshed"
        );
    }

    let mut scene = open_scene(scene.as_deref())?;
    let cancel = CancelToken::new();
    let summary = project
        .assembler()
        .load(&mut scene, &shot, &cancel)
        .map_err(|e| anyhow::anyhow!("Failed to load shot [{}]: {e}", e.code()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Assembled: {}", summary.shot.display());
        println!("  Nodes in scene: {}", scene.node_count());
        println!();

        println!("Imported ({}):", summary.items.len());
        for item in &summary.items {
            println!(
                "  {} [{}] namespace '{}': {} node(s), {} root(s), {} tagged",
                item.file,
                item.kind,
                item.namespace,
                item.nodes.len(),
                item.roots.len(),
                item.tagged.len()
            );
        }
        if !summary.overrides.is_empty() {
            println!("\nOverrides applied: {}", summary.overrides.join(", "));
        }
        if !summary.assignments.is_empty() {
            println!("\nShader assignments:");
            for assignment in &summary.assignments {
                println!("  {} -> {}", assignment.mesh, assignment.shading_group);
            }
        }

        let tags = project.tags().find_all_tags(&scene, &TagFilter::any())?;
        if !tags.is_empty() {
            println!("\nTags:");
            for tag in &tags {
                let entry = tag
                    .record
                    .catalogue_id
                    .as_deref()
                    .and_then(|id| project.catalogue().find_entry(id))
                    .map(|e| e.name.clone())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {} ({:?}) entry {entry}", scene.name(tag.node)?, tag.form);
            }
        }

        if !summary.failures.is_empty() {
            println!("\nFailed ({}):", summary.failures.len());
            for failure in &summary.failures {
                println!("  - {} [{}]: {}", failure.item, failure.code, failure.message);
            }
        }
        print_warnings(summary.warnings.iter());
        if summary.cancelled {
            println!("\nLoad was cancelled.");
        }
    }

    if let Some(path) = dump {
        scene
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to write scene {}: {e}", path.display()))?;
        println!("\nScene written to {}", path.display());
    }
    Ok(())
}
