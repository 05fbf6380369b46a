//! Error types shared across Shotkit crates.

use std::path::PathBuf;

/// Top-level error type for Shotkit operations.
#[derive(Debug, thiserror::Error)]
pub enum ShotkitError {
    #[error("Catalogue unavailable: {message}")]
    CatalogueUnavailable { message: String },

    #[error("Scene node missing: {node}")]
    SceneNodeMissing { node: String },

    #[error("Attribute {node}.{attribute} is locked")]
    AttributeLocked { node: String, attribute: String },

    #[error("Invalid tag on {node}: {message}")]
    InvalidTag { node: String, message: String },

    #[error("Include cycle detected: {chain}")]
    IncludeCycle { chain: String },

    #[error("Include could not be resolved: {path}: {message}")]
    IncludeUnresolved { path: PathBuf, message: String },

    #[error("Malformed JSON in {path}: {message}")]
    MalformedJson { path: PathBuf, message: String },

    #[error("Version mismatch in {path}: {message}")]
    VersionMismatch { path: PathBuf, message: String },

    #[error("Shot file invalid: {message}")]
    ShotFileInvalid { message: String },

    #[error("No handler registered for file type: {extension}")]
    UnregisteredFileType { extension: String },

    #[error("No override registered with name: {name}")]
    UnregisteredOverride { name: String },

    #[error("Host exporter plugin missing: {plugin}")]
    HostExporterMissing { plugin: String },

    #[error("Host importer plugin missing: {plugin}")]
    HostImporterMissing { plugin: String },

    #[error("Nothing to export: {message}")]
    NoRoots { message: String },

    #[error("Destination not writable: {path}: {message}")]
    DestinationUnwritable { path: PathBuf, message: String },

    #[error("Sidecar write failed: {path}: {message}")]
    SidecarWriteFailed { path: PathBuf, message: String },

    #[error("File missing: {path}")]
    FileMissing { path: PathBuf },

    #[error("Shader unavailable: {name}: {message}")]
    ShaderUnavailable { name: String, message: String },

    #[error("Host plugin error: {message}")]
    Plugin { message: String },

    #[error("Operation cancelled: {message}")]
    Cancelled { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShotkitError.
pub type ShotkitResult<T> = Result<T, ShotkitError>;

/// Machine-stable error codes, one per error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    CatalogueUnavailable,
    SceneNodeMissing,
    AttributeLocked,
    InvalidTag,
    IncludeCycle,
    IncludeUnresolved,
    MalformedJson,
    VersionMismatch,
    ShotFileInvalid,
    UnregisteredFileType,
    UnregisteredOverride,
    HostExporterMissing,
    HostImporterMissing,
    NoRoots,
    DestinationUnwritable,
    SidecarWriteFailed,
    FileMissing,
    ShaderUnavailable,
    Plugin,
    Cancelled,
    Config,
    Io,
    Json,
    Internal,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CatalogueUnavailable => "catalogue_unavailable",
            Self::SceneNodeMissing => "scene_node_missing",
            Self::AttributeLocked => "attribute_locked",
            Self::InvalidTag => "invalid_tag",
            Self::IncludeCycle => "include_cycle",
            Self::IncludeUnresolved => "include_unresolved",
            Self::MalformedJson => "malformed_json",
            Self::VersionMismatch => "version_mismatch",
            Self::ShotFileInvalid => "shot_file_invalid",
            Self::UnregisteredFileType => "unregistered_file_type",
            Self::UnregisteredOverride => "unregistered_override",
            Self::HostExporterMissing => "host_exporter_missing",
            Self::HostImporterMissing => "host_importer_missing",
            Self::NoRoots => "no_roots",
            Self::DestinationUnwritable => "destination_unwritable",
            Self::SidecarWriteFailed => "sidecar_write_failed",
            Self::FileMissing => "file_missing",
            Self::ShaderUnavailable => "shader_unavailable",
            Self::Plugin => "plugin_error",
            Self::Cancelled => "cancelled",
            Self::Config => "config_error",
            Self::Io => "io_error",
            Self::Json => "json_error",
            Self::Internal => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl ShotkitError {
    /// Machine-stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CatalogueUnavailable { .. } => ErrorCode::CatalogueUnavailable,
            Self::SceneNodeMissing { .. } => ErrorCode::SceneNodeMissing,
            Self::AttributeLocked { .. } => ErrorCode::AttributeLocked,
            Self::InvalidTag { .. } => ErrorCode::InvalidTag,
            Self::IncludeCycle { .. } => ErrorCode::IncludeCycle,
            Self::IncludeUnresolved { .. } => ErrorCode::IncludeUnresolved,
            Self::MalformedJson { .. } => ErrorCode::MalformedJson,
            Self::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Self::ShotFileInvalid { .. } => ErrorCode::ShotFileInvalid,
            Self::UnregisteredFileType { .. } => ErrorCode::UnregisteredFileType,
            Self::UnregisteredOverride { .. } => ErrorCode::UnregisteredOverride,
            Self::HostExporterMissing { .. } => ErrorCode::HostExporterMissing,
            Self::HostImporterMissing { .. } => ErrorCode::HostImporterMissing,
            Self::NoRoots { .. } => ErrorCode::NoRoots,
            Self::DestinationUnwritable { .. } => ErrorCode::DestinationUnwritable,
            Self::SidecarWriteFailed { .. } => ErrorCode::SidecarWriteFailed,
            Self::FileMissing { .. } => ErrorCode::FileMissing,
            Self::ShaderUnavailable { .. } => ErrorCode::ShaderUnavailable,
            Self::Plugin { .. } => ErrorCode::Plugin,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::Config { .. } => ErrorCode::Config,
            Self::Io(_) => ErrorCode::Io,
            Self::Json(_) => ErrorCode::Json,
            Self::Other(_) => ErrorCode::Internal,
        }
    }

    pub fn catalogue_unavailable(msg: impl Into<String>) -> Self {
        Self::CatalogueUnavailable {
            message: msg.into(),
        }
    }

    pub fn node_missing(node: impl Into<String>) -> Self {
        Self::SceneNodeMissing { node: node.into() }
    }

    pub fn invalid_tag(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidTag {
            node: node.into(),
            message: msg.into(),
        }
    }

    pub fn shot_file_invalid(msg: impl Into<String>) -> Self {
        Self::ShotFileInvalid {
            message: msg.into(),
        }
    }

    pub fn plugin(msg: impl Into<String>) -> Self {
        Self::Plugin {
            message: msg.into(),
        }
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error is one that aborts a Load before any import runs.
    pub fn is_load_fatal(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::IncludeCycle
                | ErrorCode::IncludeUnresolved
                | ErrorCode::MalformedJson
                | ErrorCode::VersionMismatch
                | ErrorCode::ShotFileInvalid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_snake_case() {
        let err = ShotkitError::IncludeCycle {
            chain: "a.json -> b.json -> a.json".to_string(),
        };
        assert_eq!(err.code().as_str(), "include_cycle");
        assert!(err.is_load_fatal());

        let err = ShotkitError::UnregisteredFileType {
            extension: "xyz".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::UnregisteredFileType);
        assert!(!err.is_load_fatal());
    }

    #[test]
    fn io_errors_keep_their_code() {
        let err: ShotkitError = std::io::Error::other("disk full").into();
        assert_eq!(err.code().to_string(), "io_error");
    }
}
