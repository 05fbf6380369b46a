//! Export roots of a dumped scene.

use std::path::PathBuf;

use shotkit_cache_exchange::{ExchangeContext, ExportJob, FileKind};
use shotkit_common::CancelToken;
use shotkit_project_model::FrameRange;
use shotkit_scene_core::{MemoryScene, NodeId, Scene};
use shotkit_tag_graph::TagFilter;

use super::Context;

#[allow(clippy::too_many_arguments)]
pub fn run(
    ctx: &Context,
    scene_path: PathBuf,
    output: PathBuf,
    nodes: Vec<String>,
    proxy: bool,
    start: f64,
    end: f64,
    step: f64,
) -> anyhow::Result<()> {
    let mut scene = MemoryScene::load(&scene_path)
        .map_err(|e| anyhow::anyhow!("Failed to load scene {}: {e}", scene_path.display()))?;
    let project = ctx.project(None);

    let roots = if nodes.is_empty() {
        tagged_roots(&project, &scene)?
    } else {
        nodes
            .iter()
            .map(|name| {
                scene
                    .find_by_name(name)
                    .ok_or_else(|| anyhow::anyhow!("No node named '{name}' in the scene"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    if roots.is_empty() {
        anyhow::bail!("Nothing to export: no node given and no tagged root in the scene");
    }

    let kind = if proxy {
        FileKind::RenderProxy
    } else {
        FileKind::PointCache
    };
    let extension = output
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let handler = project.file_types().handler(&extension, kind)?;

    let cancel = CancelToken::new();
    let job = ExportJob::new(roots, &output, FrameRange::new(start, end, step));
    let mut exchange = ExchangeContext::new(&mut scene, project.tags(), &cancel);
    let report = handler
        .export(&mut exchange, &job)
        .map_err(|e| anyhow::anyhow!("Export failed [{}]: {e}", e.code()))?;

    println!("Exported {} to {}", handler.label(), report.destination.display());
    println!("  Roots: {}", report.roots.join(", "));
    println!("  Nodes: {}", report.nodes);
    println!("  Frames: {}", report.frames_written);
    if let Some(sidecar) = &report.sidecar {
        println!("  Tag sidecar: {}", sidecar.display());
    }
    if report.cancelled {
        println!("\nExport was cancelled; the file holds the frames written so far.");
    }
    Ok(())
}

/// Tagged nodes with no tagged ancestor.
fn tagged_roots(
    project: &shotkit_assembler::Project,
    scene: &MemoryScene,
) -> anyhow::Result<Vec<NodeId>> {
    let tags = project.tags().find_all_tags(scene, &TagFilter::any())?;
    let tagged: Vec<NodeId> = tags.iter().map(|t| t.node).collect();
    let mut roots = Vec::new();
    for node in &tagged {
        let mut ancestor = scene.parent(*node)?;
        let mut nested = false;
        while let Some(parent) = ancestor {
            if tagged.contains(&parent) {
                nested = true;
                break;
            }
            ancestor = scene.parent(parent)?;
        }
        if !nested {
            roots.push(*node);
        }
    }
    Ok(roots)
}
