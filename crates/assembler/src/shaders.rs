//! Shading groups: materialization and assignment.
//!
//! A tag's shader map names, per mesh short name, the shading groups the
//! mesh must be bound to. Wiring locates each group in the scene, asks the
//! [`ShaderLibrary`] to create it when absent, then assigns it to the mesh
//! shapes. Assignment goes through the shape's single-input
//! `shading_group` plug, so it replaces any previous assignment.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use shotkit_cache_exchange::reference::SHADING_GROUP_ATTR;
use shotkit_common::{
    CancelToken, MissingEntryPolicy, ShotkitError, ShotkitResult, WarningCode, Warnings,
};
use shotkit_catalogue::Snapshot;
use shotkit_scene_core::{mesh_transforms, shapes, short_name, strip_namespace, subtree, AttrValue, NodeId, NodeKind, Scene};
use shotkit_tag_graph::{TagGraph, TagNode};

/// Suffix hosts append to meshes rebuilt by deformers.
const DEFORMED_SUFFIX: &str = "Deformed";

/// Creates shading groups on demand.
pub trait ShaderLibrary: Send + Sync {
    /// Create shading group `name` in the scene.
    fn materialize(&self, scene: &mut dyn Scene, name: &str) -> ShotkitResult<NodeId>;
}

/// Shading groups described by `<dir>/<name><ext>` JSON objects whose
/// scalar members become attributes of the created node.
#[derive(Debug, Clone)]
pub struct DirectoryShaderLibrary {
    dir: PathBuf,
    extension: String,
}

impl DirectoryShaderLibrary {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = if extension.is_empty() || extension.starts_with('.') {
            extension
        } else {
            format!(".{extension}")
        };
        Self {
            dir: dir.into(),
            extension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn description_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", strip_namespace(name), self.extension))
    }
}

impl ShaderLibrary for DirectoryShaderLibrary {
    fn materialize(&self, scene: &mut dyn Scene, name: &str) -> ShotkitResult<NodeId> {
        let path = self.description_path(name);
        let unavailable = |message: String| ShotkitError::ShaderUnavailable {
            name: name.to_string(),
            message,
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
        let Value::Object(attrs) = serde_json::from_str(&content)
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?
        else {
            return Err(unavailable(format!("{} is not a JSON object", path.display())));
        };

        let node = scene.create_node(name, NodeKind::ShadingGroup, None)?;
        for (attr, raw) in &attrs {
            match AttrValue::from_json(raw) {
                Some(value) => scene.set_attr(node, attr, value)?,
                None => tracing::debug!(shader = %name, attr = %attr, "Skipping non-scalar shader attribute"),
            }
        }
        tracing::debug!(shader = %name, path = %path.display(), "Shading group materialized");
        Ok(node)
    }
}

/// One shading-group assignment made by wiring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub mesh: String,
    pub shading_group: String,
}

/// Outcome of a wiring pass.
#[derive(Debug, Clone, Default)]
pub struct WiringReport {
    /// Tagged roots wired, in order.
    pub roots: Vec<NodeId>,
    pub assignments: Vec<Assignment>,
    pub warnings: Warnings,
    /// Set when the pass stopped early on cancellation.
    pub cancelled: bool,
}

/// Inputs of a wiring pass.
pub struct ShaderWiring<'a> {
    pub tags: &'a TagGraph,
    pub snapshot: &'a Snapshot,
    pub library: Option<&'a dyn ShaderLibrary>,
    pub policy: MissingEntryPolicy,
}

impl ShaderWiring<'_> {
    /// Wire every tagged node of `roots`. Untagged roots are skipped;
    /// cancellation is checked between roots.
    pub fn run(
        &self,
        scene: &mut dyn Scene,
        roots: &[NodeId],
        cancel: &CancelToken,
    ) -> ShotkitResult<WiringReport> {
        let mut report = WiringReport::default();
        for root in roots {
            if cancel.is_cancelled() {
                tracing::info!(wired = report.roots.len(), "Shader wiring cancelled between roots");
                report.cancelled = true;
                break;
            }
            let Some(tag) = self.tags.find_tag_for_node(&*scene, *root)? else {
                continue;
            };
            let entry = self.tags.resolve_with_policy(
                &*scene,
                &tag,
                self.snapshot,
                self.policy,
                &mut report.warnings,
            )?;
            tracing::trace!(
                root = %root,
                entry = entry.as_ref().map(|e| e.id.as_str()).unwrap_or("-"),
                "Catalogue entry checked before wiring"
            );
            self.wire_tag(scene, &tag, &mut report)?;
            report.roots.push(*root);
        }
        Ok(report)
    }

    fn wire_tag(
        &self,
        scene: &mut dyn Scene,
        tag: &TagNode,
        report: &mut WiringReport,
    ) -> ShotkitResult<()> {
        if tag.record.shaders.is_empty() {
            return Ok(());
        }
        let target = wiring_target(&*scene, tag)?;
        let meshes = mesh_transforms(&*scene, target)?;

        for (key, groups) in &tag.record.shaders {
            let mut matched = Vec::new();
            for mesh in &meshes {
                let name = short_name(&*scene, *mesh)?;
                if name == *key || name.strip_suffix(DEFORMED_SUFFIX) == Some(key.as_str()) {
                    matched.push((*mesh, name));
                }
            }
            if matched.is_empty() {
                tracing::debug!(node = %tag.node, mesh = %key, "Shader map names no mesh under node");
                continue;
            }

            for group in groups {
                let Some(sg) = self.locate_or_create(scene, group, &mut report.warnings)? else {
                    continue;
                };
                for (mesh, name) in &matched {
                    for shape in shapes(&*scene, *mesh, NodeKind::Mesh)? {
                        scene.connect(sg, "message", shape, SHADING_GROUP_ATTR)?;
                    }
                    report.assignments.push(Assignment {
                        mesh: name.clone(),
                        shading_group: group.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn locate_or_create(
        &self,
        scene: &mut dyn Scene,
        group: &str,
        warnings: &mut Warnings,
    ) -> ShotkitResult<Option<NodeId>> {
        if let Some(sg) = find_shading_group(&*scene, group)? {
            return Ok(Some(sg));
        }
        let Some(library) = self.library else {
            warnings.warn(
                WarningCode::ShaderUnresolved,
                group,
                "shading group not in scene and no shader library configured",
            );
            return Ok(None);
        };
        match library.materialize(scene, group) {
            Ok(sg) => Ok(Some(sg)),
            Err(e) => {
                warnings.warn(WarningCode::ShaderUnresolved, group, e.to_string());
                Ok(None)
            }
        }
    }
}

/// The hires group when it is still alive, else the tagged node.
fn wiring_target(scene: &dyn Scene, tag: &TagNode) -> ShotkitResult<NodeId> {
    if let Some(hires) = tag.hires_node.filter(|h| scene.exists(*h)) {
        return Ok(hires);
    }
    if let Some(name) = &tag.record.hires {
        for node in subtree(scene, tag.node)? {
            if short_name(scene, node)? == *name {
                return Ok(node);
            }
        }
    }
    Ok(tag.node)
}

/// A shading group by full name, else by namespace-stripped name.
fn find_shading_group(scene: &dyn Scene, name: &str) -> ShotkitResult<Option<NodeId>> {
    if let Some(node) = scene.find_by_name(name) {
        if scene.kind(node)? == NodeKind::ShadingGroup {
            return Ok(Some(node));
        }
    }
    let short = strip_namespace(name);
    for node in scene.nodes_of_kind(NodeKind::ShadingGroup) {
        if short_name(scene, node)? == short {
            return Ok(Some(node));
        }
    }
    Ok(None)
}
