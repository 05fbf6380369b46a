//! Registry of file-type handlers.

use std::collections::BTreeMap;
use std::path::Path;

use shotkit_common::{ShotkitError, ShotkitResult};

use crate::handler::{FileKind, FileTypeHandler};

/// Handlers keyed by `(extension, kind)`.
///
/// Extensions are stored lowercase without a leading dot.
#[derive(Default)]
pub struct FileTypeRegistry {
    handlers: BTreeMap<(String, FileKind), Box<dyn FileTypeHandler>>,
}

pub fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

impl FileTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same key.
    pub fn register_file_type(&mut self, handler: Box<dyn FileTypeHandler>) {
        let key = (normalize_extension(handler.extension()), handler.kind());
        tracing::debug!(extension = %key.0, kind = %key.1, label = handler.label(), "Registered file type");
        if self.handlers.insert(key.clone(), handler).is_some() {
            tracing::warn!(extension = %key.0, kind = %key.1, "Replaced previously registered file type");
        }
    }

    pub fn handler(&self, extension: &str, kind: FileKind) -> ShotkitResult<&dyn FileTypeHandler> {
        self.handlers
            .get(&(normalize_extension(extension), kind))
            .map(|h| &**h)
            .ok_or_else(|| ShotkitError::UnregisteredFileType {
                extension: format!("{extension} ({kind})"),
            })
    }

    /// The handler for a file, chosen by extension. When several kinds
    /// share an extension the first kind in [`FileKind`] order wins.
    pub fn handler_for_path(&self, path: &Path) -> ShotkitResult<&dyn FileTypeHandler> {
        let extension = path
            .extension()
            .map(|e| normalize_extension(&e.to_string_lossy()))
            .unwrap_or_default();
        self.handlers
            .iter()
            .find(|((ext, _), _)| *ext == extension)
            .map(|(_, h)| &**h)
            .ok_or(ShotkitError::UnregisteredFileType { extension })
    }

    /// Registered `(extension, kind, label)` triples, sorted.
    pub fn file_types(&self) -> Vec<(String, FileKind, String)> {
        self.handlers
            .iter()
            .map(|((ext, kind), h)| (ext.clone(), *kind, h.label().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for FileTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_cache::PointCacheHandler;
    use crate::reference::{JsonCachePlugin, JsonProxyPlugin};
    use crate::render_proxy::RenderProxyHandler;
    use shotkit_common::ErrorCode;

    #[test]
    fn lookups_are_case_and_dot_insensitive() {
        let mut registry = FileTypeRegistry::new();
        registry.register_file_type(Box::new(PointCacheHandler::new(
            "abc",
            Box::new(JsonCachePlugin::new()),
        )));
        registry.register_file_type(Box::new(RenderProxyHandler::new(
            "ass",
            Box::new(JsonProxyPlugin::new()),
        )));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.handler(".ABC", FileKind::PointCache).unwrap().kind(),
            FileKind::PointCache
        );
        assert_eq!(
            registry
                .handler_for_path(Path::new("shots/hero.Ass"))
                .unwrap()
                .kind(),
            FileKind::RenderProxy
        );
    }

    #[test]
    fn unknown_extensions_are_unregistered() {
        let registry = FileTypeRegistry::new();
        let err = registry
            .handler_for_path(Path::new("notes.txt"))
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::UnregisteredFileType);
        assert!(registry
            .handler("abc", FileKind::RenderProxy)
            .is_err());
    }
}
