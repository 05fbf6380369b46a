//! Point-cache handler: cache file plus tag sidecar.

use std::path::Path;

use serde_json::Value;

use shotkit_common::{ShotkitError, ShotkitResult, WarningCode};
use shotkit_project_model::{CacheSidecar, SidecarError};
use shotkit_scene_core::{short_name, AttrValue, NodeId};

use crate::export::{collect_roots, prepare_destination, ExportRun, ExportStage};
use crate::handler::{ExchangeContext, ExportJob, ExportReport, FileKind, FileTypeHandler, ImportJob, ImportReport};
use crate::plugin::CachePlugin;
use crate::reference::SMOOTH_ATTR;

/// Smooth-mesh preview level applied by `auto_smooth`.
const SMOOTH_PREVIEW: i64 = 2;

pub struct PointCacheHandler {
    extension: String,
    plugin: Box<dyn CachePlugin>,
}

impl PointCacheHandler {
    pub fn new(extension: impl Into<String>, plugin: Box<dyn CachePlugin>) -> Self {
        Self {
            extension: crate::registry::normalize_extension(&extension.into()),
            plugin,
        }
    }

    fn write(&self, ctx: &mut ExchangeContext<'_>, job: &ExportJob, run: &mut ExportRun) -> ShotkitResult<ExportReport> {
        run.advance(ExportStage::CollectingRoots);
        let (roots, nodes) = collect_roots(&*ctx.scene, &job.roots, job.cache.renderable_only)?;

        run.advance(ExportStage::ResolvingTags);
        let dictionary = ctx.tags.tag_dictionary(&*ctx.scene, &roots)?;

        run.advance(ExportStage::WritingSidecar);
        prepare_destination(&job.destination)?;
        let sidecar_path = CacheSidecar::path_for(&job.destination);
        run.owns(&sidecar_path);
        let mut sidecar = CacheSidecar::new(Some(job.frames), dictionary);
        write_sidecar(&sidecar, &sidecar_path)?;

        run.advance(ExportStage::WritingCache);
        run.owns(&job.destination);
        let mut writer = self
            .plugin
            .open_writer(&*ctx.scene, &nodes, &job.destination, &job.cache)?;
        let mut frames_written = 0;
        let mut cancelled = false;
        for frame in job.frames.samples() {
            if ctx.cancel.is_cancelled() {
                tracing::info!(
                    destination = %job.destination.display(),
                    frames_written,
                    "Export cancelled between frames"
                );
                cancelled = true;
                break;
            }
            writer.write_frame(&*ctx.scene, frame)?;
            frames_written += 1;
        }
        writer.finish()?;

        if cancelled {
            sidecar.frame_range = job.frames.truncated(frames_written);
            write_sidecar(&sidecar, &sidecar_path)?;
        }

        let mut names = Vec::with_capacity(roots.len());
        for root in &roots {
            names.push(short_name(&*ctx.scene, *root)?);
        }
        Ok(ExportReport {
            destination: job.destination.clone(),
            sidecar: Some(sidecar_path),
            roots: names,
            nodes: nodes.len(),
            frames_written,
            cancelled,
            stages: Vec::new(),
        })
    }

    /// Reattach sidecar tags onto imported roots.
    fn replay_sidecar(
        &self,
        ctx: &mut ExchangeContext<'_>,
        path: &Path,
        roots: &[NodeId],
        report: &mut ImportReport,
    ) -> ShotkitResult<()> {
        let sidecar_path = CacheSidecar::path_for(path);
        let subject = sidecar_path.display().to_string();
        let sidecar = match CacheSidecar::read(&sidecar_path) {
            Ok(sidecar) => sidecar,
            Err(SidecarError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                report.warnings.warn(
                    WarningCode::SidecarMissing,
                    subject,
                    "imported without tags",
                );
                return Ok(());
            }
            Err(e) => {
                report
                    .warnings
                    .warn(WarningCode::TagReattachFailed, subject, e.to_string());
                return Ok(());
            }
        };

        let mut matched = Vec::new();
        for root in roots {
            let name = short_name(&*ctx.scene, *root)?;
            let Some(record) = sidecar.record_for(&name) else {
                continue;
            };
            match ctx.tags.embed(&mut *ctx.scene, *root, record) {
                Ok(()) => {
                    report.tagged.push(*root);
                    matched.push(name);
                }
                Err(e) => report
                    .warnings
                    .warn(WarningCode::TagReattachFailed, name, e.to_string()),
            }
        }

        for key in sidecar.roots.keys() {
            let used = matched.iter().any(|name| {
                name == key || shotkit_project_model::strip_trailing_digits(name) == key
            });
            if !used {
                report.warnings.warn(
                    WarningCode::TagReattachFailed,
                    key.clone(),
                    format!("no imported root matches sidecar entry in {subject}"),
                );
            }
        }
        Ok(())
    }
}

impl FileTypeHandler for PointCacheHandler {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn kind(&self) -> FileKind {
        FileKind::PointCache
    }

    fn label(&self) -> &str {
        "Point Cache"
    }

    fn icon(&self) -> &str {
        "pointcache"
    }

    fn export(&self, ctx: &mut ExchangeContext<'_>, job: &ExportJob) -> ShotkitResult<ExportReport> {
        if !self.plugin.is_loaded() {
            return Err(ShotkitError::HostExporterMissing {
                plugin: self.plugin.name().to_string(),
            });
        }
        job.frames.validate().map_err(ShotkitError::config)?;

        let mut run = ExportRun::new(&job.destination);
        match self.write(ctx, job, &mut run) {
            Ok(mut report) => {
                report.stages = run.finish();
                tracing::info!(
                    destination = %report.destination.display(),
                    roots = report.roots.len(),
                    frames = report.frames_written,
                    cancelled = report.cancelled,
                    "Point cache exported"
                );
                Ok(report)
            }
            Err(e) => Err(run.fail(e)),
        }
    }

    fn import(&self, ctx: &mut ExchangeContext<'_>, job: &ImportJob) -> ShotkitResult<ImportReport> {
        if !job.path.is_file() {
            return Err(ShotkitError::FileMissing {
                path: job.path.clone(),
            });
        }
        if !self.plugin.is_loaded() {
            return Err(ShotkitError::HostImporterMissing {
                plugin: self.plugin.name().to_string(),
            });
        }

        let nodes = self.plugin.import(
            &mut *ctx.scene,
            &job.path,
            job.parent,
            job.namespace.as_deref(),
        )?;
        let mut roots = Vec::new();
        for node in &nodes {
            if ctx.scene.parent(*node)? == job.parent {
                roots.push(*node);
            }
        }

        let mut report = ImportReport {
            nodes,
            roots,
            ..ImportReport::default()
        };
        let roots = report.roots.clone();
        self.replay_sidecar(ctx, &job.path, &roots, &mut report)?;

        let auto_smooth = job.auto_smooth
            || job.data.get("auto_smooth").and_then(Value::as_bool) == Some(true);
        if auto_smooth {
            for node in &report.nodes {
                if ctx.scene.attr(*node, SMOOTH_ATTR)?.is_some() {
                    ctx.scene
                        .set_attr(*node, SMOOTH_ATTR, AttrValue::Int(SMOOTH_PREVIEW))?;
                }
            }
        }

        tracing::info!(
            path = %job.path.display(),
            nodes = report.nodes.len(),
            tagged = report.tagged.len(),
            warnings = report.warnings.len(),
            "Point cache imported"
        );
        Ok(report)
    }
}

fn write_sidecar(sidecar: &CacheSidecar, path: &Path) -> ShotkitResult<()> {
    sidecar
        .write(path)
        .map_err(|e| ShotkitError::SidecarWriteFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Whether `cache` has a sidecar next to it.
pub fn sidecar_exists(cache: &Path) -> bool {
    CacheSidecar::path_for(cache).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::JsonCachePlugin;
    use shotkit_common::{CancelToken, ErrorCode};
    use shotkit_project_model::{FrameRange, TagRecord};
    use shotkit_scene_core::{MemoryScene, NodeKind, Scene};
    use shotkit_tag_graph::TagGraph;

    fn handler() -> PointCacheHandler {
        PointCacheHandler::new(".ABC", Box::new(JsonCachePlugin::new()))
    }

    #[test]
    fn unloaded_plugin_fails_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out/anim.abc");
        let mut scene = MemoryScene::new();
        let root = scene.create_node("root", NodeKind::Transform, None).unwrap();
        let tags = TagGraph::new("shotkit");
        let cancel = CancelToken::new();
        let handler = PointCacheHandler::new("abc", Box::new(JsonCachePlugin::unloaded()));

        let mut ctx = ExchangeContext::new(&mut scene, &tags, &cancel);
        let err = handler
            .export(&mut ctx, &ExportJob::new(vec![root], &destination, FrameRange::single(1.0)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::HostExporterMissing);
        assert!(!destination.parent().unwrap().exists());
    }

    #[test]
    fn invalid_frame_ranges_are_config_errors() {
        let mut scene = MemoryScene::new();
        let root = scene.create_node("root", NodeKind::Transform, None).unwrap();
        let tags = TagGraph::new("shotkit");
        let cancel = CancelToken::new();
        let mut ctx = ExchangeContext::new(&mut scene, &tags, &cancel);
        let err = handler()
            .export(&mut ctx, &ExportJob::new(vec![root], "x.abc", FrameRange::new(5.0, 1.0, 1.0)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
    }

    #[test]
    fn auto_smooth_comes_from_inline_data() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("geo.abc");
        let mut scene = MemoryScene::new();
        let root = scene.create_node("geo", NodeKind::Transform, None).unwrap();
        scene.create_node("geoShape", NodeKind::Mesh, Some(root)).unwrap();
        let tags = TagGraph::new("shotkit");
        tags.tag(&mut scene, root, &TagRecord::new(Some("a-1".into())), None)
            .unwrap();
        let cancel = CancelToken::new();
        {
            let mut ctx = ExchangeContext::new(&mut scene, &tags, &cancel);
            handler()
                .export(&mut ctx, &ExportJob::new(vec![root], &destination, FrameRange::single(1.0)))
                .unwrap();
        }
        assert!(sidecar_exists(&destination));

        let mut target = MemoryScene::new();
        let mut data = serde_json::Map::new();
        data.insert("auto_smooth".into(), Value::Bool(true));
        let mut ctx = ExchangeContext::new(&mut target, &tags, &cancel);
        let report = handler()
            .import(&mut ctx, &ImportJob::new(&destination).with_data(data))
            .unwrap();
        assert_eq!(report.tagged, report.roots);
        assert_eq!(
            target.attr(report.roots[0], SMOOTH_ATTR).unwrap(),
            Some(AttrValue::Int(SMOOTH_PREVIEW))
        );
    }
}
