//! Project configuration.
//!
//! `ProjectConfig` is the read-only key-value surface the core consults at
//! initialization: the tag discriminator, valid categories per kind, the
//! field names of tracker records, shot-file version expectations and the
//! missing-entry policies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ShotkitError, ShotkitResult};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "SHOTKIT_CONFIG";

/// Project-scoped configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,

    /// Tag discriminator. Empty means `<NAME>_TAG`.
    pub tag_type: String,

    /// Valid categories per kind (`asset`, `shot`, `sequence`).
    pub categories: BTreeMap<String, Vec<String>>,

    /// Which tracker-record field carries which value.
    pub record_fields: RecordFields,

    /// File kinds each asset category is expected to produce.
    pub file_kinds: BTreeMap<String, Vec<String>>,

    /// Shot-file settings.
    pub shot: ShotSettings,

    /// Missing-entry policies.
    pub policies: Policies,

    /// Shader library location.
    pub shaders: ShaderSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Field names used to read loose tracker records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFields {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    pub category: String,
    pub file_kinds: String,
    pub sequence: String,
    pub frame_start: String,
    pub frame_end: String,
    pub shots: String,
}

/// Shot-file format expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotSettings {
    /// Shot-file extension without the dot.
    pub extension: String,

    /// Expected `data_version`.
    pub data_version: i64,

    /// Expected `assembler_version`.
    pub assembler_version: String,

    /// How version fields are compared on load.
    pub version_policy: VersionPolicy,
}

/// Version comparison policy for shot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Both fields must equal the expected values.
    #[default]
    Strict,
    /// Mismatches are accepted with a warning.
    Lenient,
}

/// What to do when a catalogue entry cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingEntryPolicy {
    Silent,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    /// Applied by `resolve_to_catalogue`.
    pub resolution_missing_entry: MissingEntryPolicy,

    /// Applied by the shader-wiring pass.
    pub wiring_missing_entry: MissingEntryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSettings {
    /// Directory holding shading-group descriptions. Relative paths are
    /// resolved against the project root.
    pub dir: PathBuf,

    /// Extension of shading-group description files, with the dot.
    pub extension: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shotkit_assembler=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let categories = BTreeMap::from([
            (
                "asset".to_string(),
                vec![
                    "character".to_string(),
                    "prop".to_string(),
                    "set".to_string(),
                    "fx".to_string(),
                ],
            ),
            ("shot".to_string(), vec!["shot".to_string()]),
            ("sequence".to_string(), vec!["sequence".to_string()]),
        ]);
        let file_kinds = BTreeMap::from([
            (
                "character".to_string(),
                vec![
                    "model".to_string(),
                    "rig".to_string(),
                    "shading".to_string(),
                    "groom".to_string(),
                ],
            ),
            (
                "prop".to_string(),
                vec![
                    "model".to_string(),
                    "rig".to_string(),
                    "shading".to_string(),
                ],
            ),
            (
                "set".to_string(),
                vec![
                    "model".to_string(),
                    "shading".to_string(),
                    "proxy".to_string(),
                ],
            ),
            ("shot".to_string(), vec!["cache".to_string()]),
        ]);

        Self {
            name: "shotkit".to_string(),
            tag_type: String::new(),
            categories,
            record_fields: RecordFields::default(),
            file_kinds,
            shot: ShotSettings::default(),
            policies: Policies::default(),
            shaders: ShaderSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            name: "name".to_string(),
            thumbnail: "thumbnail".to_string(),
            category: "category".to_string(),
            file_kinds: "file_kinds".to_string(),
            sequence: "sequence".to_string(),
            frame_start: "frame_start".to_string(),
            frame_end: "frame_end".to_string(),
            shots: "shots".to_string(),
        }
    }
}

impl Default for ShotSettings {
    fn default() -> Self {
        Self {
            extension: "shot".to_string(),
            data_version: 1,
            assembler_version: "0.0.1".to_string(),
            version_policy: VersionPolicy::Strict,
        }
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            resolution_missing_entry: MissingEntryPolicy::Silent,
            wiring_missing_entry: MissingEntryPolicy::Warn,
        }
    }
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("shaders"),
            extension: ".json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ProjectConfig {
    /// The effective tag discriminator.
    pub fn tag_type(&self) -> String {
        if self.tag_type.is_empty() {
            format!("{}_TAG", self.name.to_uppercase())
        } else {
            self.tag_type.clone()
        }
    }

    /// Valid categories for `kind`, empty when the kind is not configured.
    pub fn categories_for(&self, kind: &str) -> &[String] {
        self.categories
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `category` is declared for `kind`.
    pub fn is_known_category(&self, kind: &str, category: &str) -> bool {
        self.categories_for(kind).iter().any(|c| c == category)
    }

    /// Expected file kinds for an asset category.
    pub fn file_kinds_for(&self, category: &str) -> &[String] {
        self.file_kinds
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Parse a configuration document.
    pub fn from_json(content: &str) -> ShotkitResult<Self> {
        serde_json::from_str(content).map_err(|e| ShotkitError::config(e.to_string()))
    }

    /// Load configuration from an explicit path.
    pub fn load(path: &Path) -> ShotkitResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShotkitError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&content).map_err(|e| {
            ShotkitError::config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Load config from the standard location, falling back to defaults.
    pub fn discover() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Write configuration to `path`.
    pub fn save(&self, path: &Path) -> ShotkitResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(explicit);
    }
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shotkit").join("project.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_type_defaults_to_project_name() {
        let mut config = ProjectConfig::default();
        config.name = "dune".to_string();
        assert_eq!(config.tag_type(), "DUNE_TAG");

        config.tag_type = "CUSTOM".to_string();
        assert_eq!(config.tag_type(), "CUSTOM");
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let config = ProjectConfig::from_json(
            r#"{"name": "moth", "shot": {"version_policy": "lenient"}}"#,
        )
        .unwrap();
        assert_eq!(config.name, "moth");
        assert_eq!(config.shot.version_policy, VersionPolicy::Lenient);
        assert_eq!(config.shot.data_version, 1);
        assert_eq!(config.record_fields.id, "id");
        assert_eq!(
            config.policies.wiring_missing_entry,
            MissingEntryPolicy::Warn
        );
        assert!(config.is_known_category("asset", "character"));
        assert!(!config.is_known_category("asset", "vehicle"));
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let err = ProjectConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.code().as_str(), "config_error");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("project.json");
        let mut config = ProjectConfig::default();
        config.name = "harbor".to_string();
        config.save(&path).unwrap();

        let loaded = ProjectConfig::load(&path).unwrap();
        assert_eq!(loaded.name, "harbor");
        assert_eq!(loaded.tag_type(), "HARBOR_TAG");
    }
}
