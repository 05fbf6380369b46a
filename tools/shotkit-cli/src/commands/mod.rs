//! Subcommand implementations.

pub mod assemble;
pub mod catalogue;
pub mod export;
pub mod include;
pub mod inspect;
pub mod stage;
pub mod tags;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shotkit_assembler::Project;
use shotkit_catalogue::{JsonTracker, MemoryTracker, Tracker};
use shotkit_common::{ProjectConfig, Warning};
use shotkit_scene_core::MemoryScene;

/// Configuration and project root shared by every subcommand.
pub struct Context {
    pub config: ProjectConfig,
    pub root: PathBuf,
}

impl Context {
    pub fn new(config: ProjectConfig, root: PathBuf) -> Self {
        Self { config, root }
    }

    /// A standard project backed by `tracker`, or by an empty tracker.
    pub fn project(&self, tracker: Option<&Path>) -> Project {
        let tracker: Arc<dyn Tracker> = match tracker {
            Some(path) => Arc::new(JsonTracker::new(path)),
            None => Arc::new(MemoryTracker::default()),
        };
        Project::standard(self.config.clone(), self.root.clone(), tracker)
    }
}

/// Load a dumped scene, or start from an empty one.
pub fn open_scene(path: Option<&Path>) -> anyhow::Result<MemoryScene> {
    match path {
        Some(path) => MemoryScene::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load scene {}: {e}", path.display())),
        None => Ok(MemoryScene::new()),
    }
}

pub fn print_warnings<'a>(warnings: impl IntoIterator<Item = &'a Warning>) {
    let warnings: Vec<&Warning> = warnings.into_iter().collect();
    if warnings.is_empty() {
        return;
    }
    println!("\nWarnings:");
    for warning in warnings {
        println!("  - {warning}");
    }
}
