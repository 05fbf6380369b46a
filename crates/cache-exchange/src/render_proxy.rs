//! Render-proxy handler. Proxies are matched to the catalogue by name and
//! carry no sidecar.

use shotkit_common::{ShotkitError, ShotkitResult};
use shotkit_scene_core::short_name;

use crate::export::{collect_roots, prepare_destination, ExportRun, ExportStage};
use crate::handler::{ExchangeContext, ExportJob, ExportReport, FileKind, FileTypeHandler, ImportJob, ImportReport};
use crate::plugin::ProxyPlugin;

pub struct RenderProxyHandler {
    extension: String,
    plugin: Box<dyn ProxyPlugin>,
}

impl RenderProxyHandler {
    pub fn new(extension: impl Into<String>, plugin: Box<dyn ProxyPlugin>) -> Self {
        Self {
            extension: crate::registry::normalize_extension(&extension.into()),
            plugin,
        }
    }

    fn write(&self, ctx: &mut ExchangeContext<'_>, job: &ExportJob, run: &mut ExportRun) -> ShotkitResult<ExportReport> {
        run.advance(ExportStage::CollectingRoots);
        let (roots, nodes) = collect_roots(&*ctx.scene, &job.roots, false)?;

        // Proxies carry no tags.
        run.advance(ExportStage::ResolvingTags);
        ctx.cancel.check("render proxy export")?;

        run.advance(ExportStage::WritingCache);
        prepare_destination(&job.destination)?;
        run.owns(&job.destination);
        self.plugin
            .export(&*ctx.scene, &roots, &job.destination, &job.frames, &job.proxy)?;

        let mut names = Vec::with_capacity(roots.len());
        for root in &roots {
            names.push(short_name(&*ctx.scene, *root)?);
        }
        Ok(ExportReport {
            destination: job.destination.clone(),
            sidecar: None,
            roots: names,
            nodes: nodes.len(),
            frames_written: job.frames.count(),
            cancelled: false,
            stages: Vec::new(),
        })
    }
}

impl FileTypeHandler for RenderProxyHandler {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn kind(&self) -> FileKind {
        FileKind::RenderProxy
    }

    fn label(&self) -> &str {
        "Render Proxy"
    }

    fn icon(&self) -> &str {
        "standin"
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
                    "Render proxy exported"
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
        tracing::info!(path = %job.path.display(), nodes = nodes.len(), "Render proxy imported");
        Ok(ImportReport {
            nodes,
            roots,
            ..ImportReport::default()
        })
    }
}
