//! Host cache and proxy plugin contracts.
//!
//! The core never touches cache payloads itself. It hands a plugin the
//! nodes, the path, and the flags, and expects it to write files or create
//! scene nodes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use shotkit_common::ShotkitResult;
use shotkit_project_model::FrameRange;
use shotkit_scene_core::{NodeId, Scene};

/// Point-cache export flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheFlags {
    pub write_uv_sets: bool,
    pub write_color_sets: bool,
    pub write_face_sets: bool,

    /// `None` keeps namespaces, `Some(0)` strips all of them, `Some(n)`
    /// strips the first `n` levels.
    pub strip_namespaces: Option<u32>,

    pub world_space: bool,

    /// Skip nodes that are hidden or have a hidden ancestor.
    pub renderable_only: bool,

    pub euler_filter: bool,
}

/// Render-proxy export flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyFlags {
    /// Record the bounding box of the exported roots.
    pub compute_bbox: bool,

    /// Record the shading-group assignments of the exported meshes.
    pub auto_shader_sync: bool,
}

impl Default for ProxyFlags {
    fn default() -> Self {
        Self {
            compute_bbox: true,
            auto_shader_sync: true,
        }
    }
}

/// An open point-cache file receiving one sample per frame.
pub trait FrameWriter {
    fn write_frame(&mut self, scene: &dyn Scene, frame: f64) -> ShotkitResult<()>;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> ShotkitResult<()>;
}

/// Host point-cache plugin.
pub trait CachePlugin: Send + Sync {
    /// Plugin name, as reported in `HostExporterMissing` errors.
    fn name(&self) -> &str;

    /// Whether the plugin is loaded in the host.
    fn is_loaded(&self) -> bool;

    /// Start a cache file for `nodes`, already closed under descendants.
    fn open_writer(
        &self,
        scene: &dyn Scene,
        nodes: &[NodeId],
        path: &Path,
        flags: &CacheFlags,
    ) -> ShotkitResult<Box<dyn FrameWriter>>;

    /// Recreate the cached hierarchy. Returns every created node, parents
    /// before children.
    fn import(
        &self,
        scene: &mut dyn Scene,
        path: &Path,
        parent: Option<NodeId>,
        namespace: Option<&str>,
    ) -> ShotkitResult<Vec<NodeId>>;
}

/// Host render-proxy plugin.
pub trait ProxyPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn is_loaded(&self) -> bool;

    fn export(
        &self,
        scene: &dyn Scene,
        roots: &[NodeId],
        path: &Path,
        frames: &FrameRange,
        flags: &ProxyFlags,
    ) -> ShotkitResult<()>;

    /// Create a proxy stand-in for `path`. Returns every created node.
    fn import(
        &self,
        scene: &mut dyn Scene,
        path: &Path,
        parent: Option<NodeId>,
        namespace: Option<&str>,
    ) -> ShotkitResult<Vec<NodeId>>;
}
