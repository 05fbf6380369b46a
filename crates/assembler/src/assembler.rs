//! Shot assembly: load a shot file into a scene, save staged items.
//!
//! Load runs `idle -> parsing -> importing -> wiring_shaders -> done`, or
//! `failed` when the shot file itself cannot be loaded. Per-file failures
//! never abort a load: already-imported content stays in the scene, the
//! failure is recorded in the [`PartialLoad`] summary, and the remaining
//! files are still imported.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use shotkit_cache_exchange::{ExchangeContext, FileKind, ImportJob, ImportReport};
use shotkit_common::{
    CancelToken, ErrorCode, ShotkitError, ShotkitResult, Warning, WarningCode, Warnings,
};
use shotkit_project_model::{ShotFile, ShotLoader, StagedItem, StagedOverride};
use shotkit_scene_core::{NodeId, NodeKind, Scene};

use crate::overrides::OverrideStep;
use crate::project::Project;
use crate::shaders::{Assignment, ShaderWiring};

const NODE_KINDS: [NodeKind; 5] = [
    NodeKind::Transform,
    NodeKind::Mesh,
    NodeKind::Data,
    NodeKind::ShadingGroup,
    NodeKind::Proxy,
];

/// Stages of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    Idle,
    Parsing,
    Importing,
    WiringShaders,
    Done,
    Failed,
}

/// A file imported by a load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedItem {
    /// Project-relative key from the shot file.
    pub file: String,
    pub kind: FileKind,
    pub namespace: String,
    pub nodes: Vec<NodeId>,
    pub roots: Vec<NodeId>,
    pub tagged: Vec<NodeId>,
}

/// What a failure was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSource {
    File,
    Override,
}

/// A file or override that could not be applied.
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub item: String,
    pub source: FailureSource,
    pub code: ErrorCode,
    pub message: String,
}

impl LoadFailure {
    fn new(item: impl Into<String>, source: FailureSource, err: &ShotkitError) -> Self {
        Self {
            item: item.into(),
            source,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Summary of a load. A load with failures is still a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct PartialLoad {
    pub shot: PathBuf,
    pub items: Vec<LoadedItem>,
    pub failures: Vec<LoadFailure>,

    /// Overrides applied, in execution order.
    pub overrides: Vec<String>,

    pub assignments: Vec<Assignment>,
    pub warnings: Vec<Warning>,
    pub stages: Vec<LoadStage>,

    /// Set when the load stopped early on cancellation.
    pub cancelled: bool,
}

impl PartialLoad {
    /// Whether every file and override was applied.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Imported roots across all items, in import order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.items
            .iter()
            .flat_map(|item| item.roots.iter().copied())
            .collect()
    }

    pub fn failure(&self, item: &str) -> Option<&LoadFailure> {
        self.failures.iter().find(|f| f.item == item)
    }
}

/// Shot loader and saver bound to a project.
#[derive(Debug, Clone, Copy)]
pub struct Assembler<'p> {
    project: &'p Project,
}

struct LoadRun {
    shot: PathBuf,
    stages: Vec<LoadStage>,
    items: Vec<LoadedItem>,
    failures: Vec<LoadFailure>,
    overrides: Vec<String>,
    assignments: Vec<Assignment>,
    warnings: Warnings,
    cancelled: bool,
}

impl LoadRun {
    fn new(shot: &Path) -> Self {
        Self {
            shot: shot.to_path_buf(),
            stages: vec![LoadStage::Idle],
            items: Vec::new(),
            failures: Vec::new(),
            overrides: Vec::new(),
            assignments: Vec::new(),
            warnings: Warnings::new(),
            cancelled: false,
        }
    }

    fn advance(&mut self, next: LoadStage) {
        tracing::debug!(shot = %self.shot.display(), to = ?next, "Load stage");
        self.stages.push(next);
    }

    fn fail(&mut self, item: &str, source: FailureSource, err: &ShotkitError) {
        tracing::warn!(shot = %self.shot.display(), item, code = %err.code(), "Load item failed: {}", err);
        self.failures.push(LoadFailure::new(item, source, err));
    }

    fn finish(mut self) -> PartialLoad {
        self.advance(LoadStage::Done);
        PartialLoad {
            shot: self.shot,
            items: self.items,
            failures: self.failures,
            overrides: self.overrides,
            assignments: self.assignments,
            warnings: self.warnings.into_vec(),
            stages: self.stages,
            cancelled: self.cancelled,
        }
    }
}

impl<'p> Assembler<'p> {
    pub fn new(project: &'p Project) -> Self {
        Self { project }
    }

    fn loader(&self) -> ShotLoader {
        ShotLoader::new(self.project.config().shot.clone(), self.project.root())
    }

    /// Load and fully expand a shot file without touching any scene.
    pub fn parse(&self, path: &Path) -> ShotkitResult<(ShotFile, Warnings)> {
        let loaded = self.loader().load(path)?;
        Ok((loaded.shot, loaded.warnings))
    }

    /// Assemble a shot into `scene`.
    ///
    /// Errors are returned only when the shot file cannot be loaded, in
    /// which case the scene is untouched.
    pub fn load(
        &self,
        scene: &mut dyn Scene,
        path: &Path,
        cancel: &CancelToken,
    ) -> ShotkitResult<PartialLoad> {
        let mut run = LoadRun::new(path);
        tracing::info!(shot = %path.display(), "Loading shot");

        run.advance(LoadStage::Parsing);
        let (shot, warnings) = match self.parse(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                run.advance(LoadStage::Failed);
                tracing::error!(shot = %path.display(), code = %e.code(), "Shot load failed: {}", e);
                return Err(e);
            }
        };
        run.warnings.absorb(warnings);

        run.advance(LoadStage::Importing);
        self.apply_overrides(scene, &shot, OverrideStep::Pre, &mut run);
        for (file, record) in &shot.files {
            if cancel.is_cancelled() {
                tracing::info!(shot = %path.display(), imported = run.items.len(), "Load cancelled between files");
                run.cancelled = true;
                break;
            }
            match self.import_file(scene, file, record, cancel, &mut run.warnings) {
                Ok(item) => run.items.push(item),
                Err(e) => run.fail(file, FailureSource::File, &e),
            }
        }
        if run.cancelled {
            return Ok(run.finish());
        }
        self.apply_overrides(scene, &shot, OverrideStep::Post, &mut run);

        run.advance(LoadStage::WiringShaders);
        let snapshot = self.project.catalogue().snapshot();
        let wiring = ShaderWiring {
            tags: self.project.tags(),
            snapshot: &snapshot,
            library: self.project.shader_library(),
            policy: self.project.config().policies.wiring_missing_entry,
        };
        let roots: Vec<NodeId> = run
            .items
            .iter()
            .flat_map(|item| item.roots.iter().copied())
            .collect();
        match wiring.run(scene, &roots, cancel) {
            Ok(report) => {
                run.assignments = report.assignments;
                run.warnings.absorb(report.warnings);
                run.cancelled = report.cancelled;
            }
            Err(e) => run.fail("shader_wiring", FailureSource::File, &e),
        }

        let summary = run.finish();
        tracing::info!(
            shot = %path.display(),
            items = summary.items.len(),
            failures = summary.failures.len(),
            assignments = summary.assignments.len(),
            warnings = summary.warnings.len(),
            "Shot loaded"
        );
        Ok(summary)
    }

    fn import_file(
        &self,
        scene: &mut dyn Scene,
        file: &str,
        record: &Value,
        cancel: &CancelToken,
        warnings: &mut Warnings,
    ) -> ShotkitResult<LoadedItem> {
        let path = self.project.root().join(file);
        let handler = self.project.file_types().handler_for_path(&path)?;
        let data = match record {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(ShotkitError::shot_file_invalid(format!(
                    "record of '{file}' must be an object, got {other}"
                )))
            }
        };
        let namespace = unique_namespace(&*scene, &path);
        tracing::debug!(file, namespace = %namespace, handler = handler.label(), "Importing file");

        let job = ImportJob::new(&path)
            .with_namespace(namespace.clone())
            .with_data(data);
        let mut ctx = ExchangeContext::new(scene, self.project.tags(), cancel);
        let ImportReport {
            nodes,
            roots,
            tagged,
            warnings: import_warnings,
        } = handler.import(&mut ctx, &job)?;
        warnings.absorb(import_warnings);

        Ok(LoadedItem {
            file: file.to_string(),
            kind: handler.kind(),
            namespace,
            nodes,
            roots,
            tagged,
        })
    }

    fn apply_overrides(
        &self,
        scene: &mut dyn Scene,
        shot: &ShotFile,
        step: OverrideStep,
        run: &mut LoadRun,
    ) {
        for (name, data) in &shot.overrides {
            let item = match self.project.overrides().get(name) {
                Ok(item) => item,
                Err(e) => {
                    // Reported once, with the pre-import pass.
                    if step == OverrideStep::Pre {
                        run.fail(name, FailureSource::Override, &e);
                    }
                    continue;
                }
            };
            if item.step() != step {
                continue;
            }
            match item.apply(scene, data) {
                Ok(()) => {
                    tracing::debug!(name = %name, step = %step, "Override applied");
                    run.overrides.push(name.clone());
                }
                Err(e) => {
                    run.warnings
                        .warn(WarningCode::OverrideFailed, name.clone(), e.to_string());
                    run.fail(name, FailureSource::Override, &e);
                }
            }
        }
    }

    /// Compose and atomically write a shot file from staged items.
    ///
    /// Relative paths are taken relative to the project root.
    pub fn save(
        &self,
        path: &Path,
        items: &[StagedItem],
        overrides: &[StagedOverride],
        root: Option<&Path>,
    ) -> ShotkitResult<ShotFile> {
        let project_root = self.project.root();
        let shot = ShotFile::compose(
            path,
            project_root,
            &self.project.config().shot,
            items,
            overrides,
            root,
        );
        shot.save(&project_root.join(path))?;
        Ok(shot)
    }
}

/// Namespace for an imported file: its stem, with a counter appended when
/// the scene already uses it.
fn unique_namespace(scene: &dyn Scene, path: &Path) -> String {
    let stem: String = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let base = if stem.is_empty() { "import".to_string() } else { stem };

    let mut taken = BTreeSet::new();
    for kind in NODE_KINDS {
        for node in scene.nodes_of_kind(kind) {
            if let Ok(namespace) = scene.namespace(node) {
                taken.insert(namespace);
            }
        }
    }
    if !taken.contains(&base) {
        return base;
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{base}{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
