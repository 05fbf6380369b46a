//! The project context.
//!
//! Everything an operation needs is reached through one explicit
//! [`Project`] value built at startup; there are no process-wide
//! registries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shotkit_cache_exchange::{
    FileTypeHandler, FileTypeRegistry, JsonCachePlugin, JsonProxyPlugin, PointCacheHandler,
    RenderProxyHandler,
};
use shotkit_catalogue::{Catalogue, Tracker};
use shotkit_common::ProjectConfig;
use shotkit_tag_graph::TagGraph;

use crate::assembler::Assembler;
use crate::overrides::{OverrideRegistry, ShotOverride};
use crate::shaders::{DirectoryShaderLibrary, ShaderLibrary};

/// Default extension of reference point caches.
pub const POINT_CACHE_EXTENSION: &str = "abc";

/// Default extension of reference render proxies.
pub const RENDER_PROXY_EXTENSION: &str = "ass";

pub struct Project {
    config: ProjectConfig,
    root: PathBuf,
    catalogue: Arc<Catalogue>,
    tags: TagGraph,
    file_types: FileTypeRegistry,
    overrides: OverrideRegistry,
    shaders: Option<Box<dyn ShaderLibrary>>,
}

impl Project {
    /// A bare project: no file types, overrides, or shader library.
    pub fn new(config: ProjectConfig, root: impl Into<PathBuf>, tracker: Arc<dyn Tracker>) -> Self {
        let tags = TagGraph::from_config(&config);
        let catalogue = Arc::new(Catalogue::new(config.clone(), tracker));
        Self {
            config,
            root: root.into(),
            catalogue,
            tags,
            file_types: FileTypeRegistry::new(),
            overrides: OverrideRegistry::new(),
            shaders: None,
        }
    }

    /// A project with the reference plugins, the built-in overrides, and
    /// the configured shader directory.
    pub fn standard(
        config: ProjectConfig,
        root: impl Into<PathBuf>,
        tracker: Arc<dyn Tracker>,
    ) -> Self {
        let mut project = Self::new(config, root, tracker);
        project.register_file_type(Box::new(PointCacheHandler::new(
            POINT_CACHE_EXTENSION,
            Box::new(JsonCachePlugin::new()),
        )));
        project.register_file_type(Box::new(RenderProxyHandler::new(
            RENDER_PROXY_EXTENSION,
            Box::new(JsonProxyPlugin::new()),
        )));
        project.overrides = OverrideRegistry::with_builtins();

        let dir = project.root.join(&project.config.shaders.dir);
        let library = DirectoryShaderLibrary::new(dir, project.config.shaders.extension.clone());
        project.set_shader_library(Box::new(library));

        tracing::info!(
            project = %project.config.name,
            root = %project.root.display(),
            file_types = project.file_types.len(),
            overrides = project.overrides.len(),
            "Project initialized"
        );
        project
    }

    pub fn register_file_type(&mut self, handler: Box<dyn FileTypeHandler>) {
        self.file_types.register_file_type(handler);
    }

    pub fn register_override(&mut self, item: Box<dyn ShotOverride>) {
        self.overrides.register_override(item);
    }

    pub fn set_shader_library(&mut self, library: Box<dyn ShaderLibrary>) {
        self.shaders = Some(library);
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Directory project-relative paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalogue(&self) -> &Arc<Catalogue> {
        &self.catalogue
    }

    pub fn tags(&self) -> &TagGraph {
        &self.tags
    }

    pub fn file_types(&self) -> &FileTypeRegistry {
        &self.file_types
    }

    pub fn overrides(&self) -> &OverrideRegistry {
        &self.overrides
    }

    pub fn shader_library(&self) -> Option<&dyn ShaderLibrary> {
        self.shaders.as_deref()
    }

    pub fn assembler(&self) -> Assembler<'_> {
        Assembler::new(self)
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.config.name)
            .field("root", &self.root)
            .field("file_types", &self.file_types)
            .field("overrides", &self.overrides)
            .field("shader_library", &self.shaders.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotkit_cache_exchange::FileKind;
    use shotkit_catalogue::MemoryTracker;

    #[test]
    fn standard_projects_register_reference_handlers() {
        let tracker = Arc::new(MemoryTracker::default());
        let project = Project::standard(ProjectConfig::default(), "/projects/demo", tracker);

        assert!(project.file_types().handler("abc", FileKind::PointCache).is_ok());
        assert!(project.file_types().handler("ass", FileKind::RenderProxy).is_ok());
        assert!(project.overrides().get("attributes").is_ok());
        assert!(project.shader_library().is_some());
        assert_eq!(project.tags().tag_type(), "SHOTKIT_TAG");
    }
}
