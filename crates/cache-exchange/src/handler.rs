//! File-type handlers and the jobs they run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shotkit_common::{CancelToken, ShotkitResult, Warnings};
use shotkit_project_model::FrameRange;
use shotkit_scene_core::{NodeId, Scene};
use shotkit_tag_graph::TagGraph;

use crate::export::ExportStage;
use crate::plugin::{CacheFlags, ProxyFlags};

/// Kinds of exchange files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    PointCache,
    RenderProxy,
}

impl FileKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointCache => "point_cache",
            Self::RenderProxy => "render_proxy",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "point_cache" | "cache" => Ok(Self::PointCache),
            "render_proxy" | "proxy" => Ok(Self::RenderProxy),
            other => Err(format!("unknown file kind '{other}'")),
        }
    }
}

/// What a handler may touch while running.
pub struct ExchangeContext<'a> {
    pub scene: &'a mut dyn Scene,
    pub tags: &'a TagGraph,
    pub cancel: &'a CancelToken,
}

impl<'a> ExchangeContext<'a> {
    pub fn new(scene: &'a mut dyn Scene, tags: &'a TagGraph, cancel: &'a CancelToken) -> Self {
        Self {
            scene,
            tags,
            cancel,
        }
    }
}

/// An export request.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub roots: Vec<NodeId>,

    /// Cache or proxy file to write.
    pub destination: PathBuf,

    pub frames: FrameRange,

    pub cache: CacheFlags,

    pub proxy: ProxyFlags,
}

impl ExportJob {
    pub fn new(roots: Vec<NodeId>, destination: impl Into<PathBuf>, frames: FrameRange) -> Self {
        Self {
            roots,
            destination: destination.into(),
            frames,
            cache: CacheFlags::default(),
            proxy: ProxyFlags::default(),
        }
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub destination: PathBuf,
    pub sidecar: Option<PathBuf>,

    /// Exported root short names, in write order.
    pub roots: Vec<String>,

    /// Number of nodes written, roots included.
    pub nodes: usize,

    pub frames_written: usize,

    /// Set when the export stopped early on cancellation.
    pub cancelled: bool,

    /// Stages the export went through.
    pub stages: Vec<ExportStage>,
}

/// An import request.
#[derive(Debug, Clone, Default)]
pub struct ImportJob {
    pub path: PathBuf,
    pub parent: Option<NodeId>,
    pub namespace: Option<String>,

    /// Set `displaySmoothMesh` on imported meshes.
    pub auto_smooth: bool,

    /// Inline record from the shot file, when dispatched by the assembler.
    pub data: Map<String, Value>,
}

impl ImportJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: Option<NodeId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_auto_smooth(mut self, auto_smooth: bool) -> Self {
        self.auto_smooth = auto_smooth;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Every created node.
    pub nodes: Vec<NodeId>,

    /// Created nodes directly under the import parent.
    pub roots: Vec<NodeId>,

    /// Nodes whose tag was reattached from a sidecar.
    pub tagged: Vec<NodeId>,

    pub warnings: Warnings,
}

/// Export/import behavior for one `(extension, kind)`.
pub trait FileTypeHandler: Send + Sync {
    /// Extension without the leading dot.
    fn extension(&self) -> &str;

    fn kind(&self) -> FileKind;

    /// Display label for UI collaborators.
    fn label(&self) -> &str;

    fn icon(&self) -> &str;

    fn export(&self, ctx: &mut ExchangeContext<'_>, job: &ExportJob) -> ShotkitResult<ExportReport>;

    fn import(&self, ctx: &mut ExchangeContext<'_>, job: &ImportJob) -> ShotkitResult<ImportReport>;
}
