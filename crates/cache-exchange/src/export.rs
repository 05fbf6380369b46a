//! Export state machine shared by the handlers.
//!
//! `Idle -> CollectingRoots -> ResolvingTags -> WritingSidecar ->
//! WritingCache -> Done`, or `Failed` from any stage. A failed export
//! deletes every output file it started writing. Tag resolution only reads
//! the scene, so no lock state needs restoring.

use std::path::{Path, PathBuf};

use serde::Serialize;

use shotkit_common::{ShotkitError, ShotkitResult};
use shotkit_scene_core::{is_renderable, short_name, subtree, NodeId, Scene};

/// Stages of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Idle,
    CollectingRoots,
    ResolvingTags,
    WritingSidecar,
    WritingCache,
    Done,
    Failed,
}

/// Progress of one export and the files it owns.
#[derive(Debug)]
pub(crate) struct ExportRun {
    destination: PathBuf,
    history: Vec<ExportStage>,
    outputs: Vec<PathBuf>,
}

impl ExportRun {
    pub(crate) fn new(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
            history: vec![ExportStage::Idle],
            outputs: Vec::new(),
        }
    }

    pub(crate) fn stage(&self) -> ExportStage {
        self.history
            .last()
            .copied()
            .unwrap_or(ExportStage::Idle)
    }

    pub(crate) fn advance(&mut self, next: ExportStage) {
        tracing::debug!(
            destination = %self.destination.display(),
            from = ?self.stage(),
            to = ?next,
            "Export stage"
        );
        self.history.push(next);
    }

    /// Register a file about to be written, removed again on failure.
    pub(crate) fn owns(&mut self, path: &Path) {
        self.outputs.push(path.to_path_buf());
    }

    pub(crate) fn finish(mut self) -> Vec<ExportStage> {
        self.advance(ExportStage::Done);
        self.history
    }

    /// Delete partial outputs and mark the run failed.
    pub(crate) fn fail(mut self, err: ShotkitError) -> ShotkitError {
        let failed_in = self.stage();
        for path in self.outputs.iter().rev() {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed partial export output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::error!(path = %path.display(), "Failed to remove partial export output: {}", e),
            }
        }
        self.advance(ExportStage::Failed);
        tracing::error!(
            destination = %self.destination.display(),
            stage = ?failed_in,
            code = %err.code(),
            "Export failed: {}",
            err
        );
        err
    }
}

/// Roots sorted by short name, and every node to write: the roots closed
/// under descendants, optionally restricted to renderable nodes.
pub(crate) fn collect_roots<S: Scene + ?Sized>(
    scene: &S,
    requested: &[NodeId],
    renderable_only: bool,
) -> ShotkitResult<(Vec<NodeId>, Vec<NodeId>)> {
    if requested.is_empty() {
        return Err(ShotkitError::NoRoots {
            message: "no root nodes were given".to_string(),
        });
    }

    let mut roots = Vec::new();
    for root in requested {
        if !scene.exists(*root) {
            return Err(ShotkitError::node_missing(root.to_string()));
        }
        if roots.contains(root) {
            continue;
        }
        if renderable_only && !is_renderable(scene, *root)? {
            tracing::debug!(node = %root, "Skipping hidden root");
            continue;
        }
        roots.push(*root);
    }
    if roots.is_empty() {
        return Err(ShotkitError::NoRoots {
            message: "every root is hidden".to_string(),
        });
    }

    let mut keyed = Vec::with_capacity(roots.len());
    for root in roots {
        keyed.push((short_name(scene, root)?, root));
    }
    keyed.sort();
    let roots: Vec<NodeId> = keyed.into_iter().map(|(_, id)| id).collect();

    let mut nodes = Vec::new();
    for root in &roots {
        for node in subtree(scene, *root)? {
            if nodes.contains(&node) {
                continue;
            }
            if renderable_only && !is_renderable(scene, node)? {
                continue;
            }
            nodes.push(node);
        }
    }
    Ok((roots, nodes))
}

/// Make sure the destination's directory exists and the path is not a
/// directory.
pub(crate) fn prepare_destination(path: &Path) -> ShotkitResult<()> {
    let unwritable = |message: String| ShotkitError::DestinationUnwritable {
        path: path.to_path_buf(),
        message,
    };
    if path.is_dir() {
        return Err(unwritable("destination is a directory".to_string()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| unwritable(e.to_string()))?;
        }
    }
    Ok(())
}
