//! Shot files: the declarative composition document.
//!
//! ```json
//! {
//!   "data_version": 1,
//!   "assembler_version": "0.0.1",
//!   "root": "shots/seq01_base.shot",
//!   "files": {"assets/chars/hero/hero_anim.abc": {"...": "<hero_anim.json>"}},
//!   "overrides": {"attributes": {"hero:body": {"visibility": 0}}}
//! }
//! ```
//!
//! `root` and `overrides` are optional. Loading expands includes, merges the
//! root chain, and checks the version fields. Saving is atomic.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use shotkit_common::{ShotSettings, ShotkitError, VersionPolicy, Warnings, WarningCode};

use crate::include::{include_expression, parent_dir, read_json, IncludeResolver};
use crate::paths;

/// Errors produced while loading or saving shot files.
#[derive(Debug, thiserror::Error)]
pub enum ShotFileError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Include cycle: {}", format_chain(.chain))]
    Cycle { chain: Vec<PathBuf> },

    #[error("Unresolved include {path}: {message}")]
    Unresolved { path: PathBuf, message: String },

    #[error("Version mismatch in {path}: {message}")]
    Version { path: PathBuf, message: String },

    #[error("Invalid shot file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<ShotFileError> for ShotkitError {
    fn from(err: ShotFileError) -> Self {
        match err {
            ShotFileError::Io { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                ShotkitError::FileMissing { path }
            }
            ShotFileError::Io { path, source } => ShotkitError::ShotFileInvalid {
                message: format!("{}: {source}", path.display()),
            },
            ShotFileError::Write { path, source } => ShotkitError::DestinationUnwritable {
                path,
                message: source.to_string(),
            },
            ShotFileError::Parse { path, source } => ShotkitError::MalformedJson {
                path,
                message: source.to_string(),
            },
            ShotFileError::Cycle { chain } => ShotkitError::IncludeCycle {
                chain: format_chain(&chain),
            },
            ShotFileError::Unresolved { path, message } => {
                ShotkitError::IncludeUnresolved { path, message }
            }
            ShotFileError::Version { path, message } => {
                ShotkitError::VersionMismatch { path, message }
            }
            ShotFileError::Invalid { path, message } => ShotkitError::ShotFileInvalid {
                message: format!("{}: {message}", path.display()),
            },
        }
    }
}

/// Shot file document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotFile {
    pub data_version: i64,
    pub assembler_version: String,

    /// Project-relative path of the root shot this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Project-relative file path to record (or include expression before
    /// loading).
    pub files: Map<String, Value>,

    #[serde(default)]
    pub overrides: Map<String, Value>,
}

/// Where a staged item's record comes from when saving.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemRecord {
    /// Written as an include expression pointing at this file.
    Include(PathBuf),
    /// Written inline.
    Inline(Map<String, Value>),
}

/// An asset file staged for a shot.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedItem {
    /// Asset file path, absolute or relative to the project root.
    pub path: PathBuf,
    pub record: ItemRecord,
}

/// An override staged for a shot.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedOverride {
    pub name: String,
    pub record: ItemRecord,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedShot {
    pub path: PathBuf,

    /// Fully expanded document with the root chain merged in.
    pub shot: ShotFile,

    pub warnings: Warnings,
}

/// Loads shot files against a project.
#[derive(Debug, Clone)]
pub struct ShotLoader {
    settings: ShotSettings,
    project_root: PathBuf,
    skip_root: bool,
}

impl ShotLoader {
    pub fn new(settings: ShotSettings, project_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            project_root: project_root.into(),
            skip_root: false,
        }
    }

    /// Do not merge the root chain (inspect the shot's own entries).
    pub fn skip_root(mut self, skip: bool) -> Self {
        self.skip_root = skip;
        self
    }

    pub fn settings(&self) -> &ShotSettings {
        &self.settings
    }

    /// Load, expand, merge, and version-check a shot file.
    pub fn load(&self, path: &Path) -> Result<LoadedShot, ShotFileError> {
        let mut resolver = IncludeResolver::new();
        let value = self.load_value(&mut resolver, path, self.skip_root)?;
        let shot = ShotFile::from_value(value, path)?;

        let mut warnings = Warnings::new();
        self.check_versions(&shot, path, &mut warnings)?;

        tracing::info!(
            path = %path.display(),
            files = shot.files.len(),
            overrides = shot.overrides.len(),
            includes = resolver.cached_files(),
            "Shot file loaded"
        );

        Ok(LoadedShot {
            path: path.to_path_buf(),
            shot,
            warnings,
        })
    }

    fn load_value(
        &self,
        resolver: &mut IncludeResolver,
        path: &Path,
        skip_root: bool,
    ) -> Result<Value, ShotFileError> {
        let canonical = std::fs::canonicalize(path).map_err(|e| ShotFileError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        resolver.begin(&canonical)?;
        let result = self.expand_document(resolver, &canonical, skip_root);
        resolver.end();
        result
    }

    fn expand_document(
        &self,
        resolver: &mut IncludeResolver,
        canonical: &Path,
        skip_root: bool,
    ) -> Result<Value, ShotFileError> {
        let invalid = |message: &str| ShotFileError::Invalid {
            path: canonical.to_path_buf(),
            message: message.to_string(),
        };

        let raw = read_json(canonical)?;
        if !raw.is_object() {
            return Err(invalid("shot file must be a JSON object"));
        }
        let Value::Object(mut doc) = resolver.expand(raw, &parent_dir(canonical))? else {
            return Err(invalid("shot file must expand to a JSON object"));
        };

        let root = doc
            .get("root")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        if let (Some(root), false) = (root, skip_root) {
            let root_path = paths::clean(&self.project_root.join(&root));
            if !root_path.is_file() {
                return Err(ShotFileError::Unresolved {
                    path: root_path,
                    message: "root shot file does not exist".to_string(),
                });
            }
            let is_self = std::fs::canonicalize(&root_path)
                .map(|p| p == canonical)
                .unwrap_or(false);
            if is_self {
                tracing::debug!(path = %canonical.display(), "Shot names itself as root, ignoring");
            } else {
                tracing::debug!(root = %root_path.display(), "Merging root shot");
                let root_value = self.load_value(resolver, &root_path, false)?;
                inherit_section(&mut doc, &root_value, "files");
                inherit_section(&mut doc, &root_value, "overrides");
            }
        }

        Ok(Value::Object(doc))
    }

    fn check_versions(
        &self,
        shot: &ShotFile,
        path: &Path,
        warnings: &mut Warnings,
    ) -> Result<(), ShotFileError> {
        let mut mismatches = Vec::new();
        if shot.data_version != self.settings.data_version {
            mismatches.push(format!(
                "data_version {} (expected {})",
                shot.data_version, self.settings.data_version
            ));
        }
        if shot.assembler_version != self.settings.assembler_version {
            mismatches.push(format!(
                "assembler_version {} (expected {})",
                shot.assembler_version, self.settings.assembler_version
            ));
        }
        if mismatches.is_empty() {
            return Ok(());
        }

        let message = mismatches.join(", ");
        match self.settings.version_policy {
            VersionPolicy::Strict => Err(ShotFileError::Version {
                path: path.to_path_buf(),
                message,
            }),
            VersionPolicy::Lenient => {
                warnings.warn(
                    WarningCode::VersionMismatchAccepted,
                    path.display().to_string(),
                    message,
                );
                Ok(())
            }
        }
    }
}

/// Copy entries of `root[section]` missing from `doc[section]`.
fn inherit_section(doc: &mut Map<String, Value>, root: &Value, section: &str) {
    let Some(Value::Object(inherited)) = root.get(section) else {
        return;
    };
    let target = doc
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(target) = target else {
        return;
    };
    for (key, value) in inherited {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

impl ShotFile {
    /// An empty shot with the given versions.
    pub fn empty(settings: &ShotSettings) -> Self {
        Self {
            data_version: settings.data_version,
            assembler_version: settings.assembler_version.clone(),
            root: None,
            files: Map::new(),
            overrides: Map::new(),
        }
    }

    /// Decode an expanded document.
    pub fn from_value(value: Value, path: &Path) -> Result<Self, ShotFileError> {
        let mut shot: ShotFile =
            serde_json::from_value(value).map_err(|e| ShotFileError::Invalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        shot.root = shot.root.filter(|r| !r.is_empty());
        shot.files = shot
            .files
            .into_iter()
            .map(|(key, value)| (key.replace('\\', "/"), value))
            .collect();
        Ok(shot)
    }

    /// Read a shot file without expanding includes or merging the root.
    pub fn read_raw(path: &Path) -> Result<Self, ShotFileError> {
        Self::from_value(read_json(path)?, path)
    }

    /// Compose a shot document for `shot_path` from staged items.
    ///
    /// File keys are relative to `project_root`; include expressions are
    /// relative to the shot file's directory. Relative input paths are taken
    /// relative to `project_root`. A repeated key keeps its first item.
    pub fn compose(
        shot_path: &Path,
        project_root: &Path,
        settings: &ShotSettings,
        items: &[StagedItem],
        overrides: &[StagedOverride],
        root: Option<&Path>,
    ) -> Self {
        let absolute = |p: &Path| paths::clean(&project_root.join(p));
        let shot_dir = parent_dir(&absolute(shot_path));

        let encode = |record: &ItemRecord| match record {
            ItemRecord::Include(path) => {
                include_expression(&paths::relative_string(&absolute(path), &shot_dir))
            }
            ItemRecord::Inline(map) => Value::Object(map.clone()),
        };

        let mut shot = Self::empty(settings);
        for item in items {
            let key = paths::relative_string(&absolute(&item.path), project_root);
            if shot.files.contains_key(&key) {
                tracing::warn!(file = %key, "Asset file is already stored, skipping");
                continue;
            }
            shot.files.insert(key, encode(&item.record));
        }
        for staged in overrides {
            if shot.overrides.contains_key(&staged.name) {
                tracing::warn!(name = %staged.name, "Override is already stored, skipping");
                continue;
            }
            shot.overrides
                .insert(staged.name.clone(), encode(&staged.record));
        }
        shot.root = root.map(|r| paths::relative_string(&absolute(r), project_root));
        shot
    }

    /// Write the document atomically: sibling temporary, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<(), ShotFileError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ShotFileError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        write_atomic(path, json.as_bytes()).map_err(|e| ShotFileError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), files = self.files.len(), "Shot file saved");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = parent_dir(path);
    std::fs::create_dir_all(&parent)?;
    let tmp = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("shot"),
        std::process::id()
    ));
    let result = (|| {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
        return result;
    }
    if let Ok(dir) = std::fs::File::open(&parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn write(path: &Path, value: &Value) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn loader(root: &Path) -> ShotLoader {
        ShotLoader::new(ShotSettings::default(), root)
    }

    #[test]
    fn empty_shot_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.shot");
        write(
            &path,
            &json!({"data_version": 1, "assembler_version": "0.0.1", "files": {}}),
        );

        let loaded = loader(dir.path()).load(&path).unwrap();
        assert!(loaded.shot.files.is_empty());
        assert!(loaded.shot.root.is_none());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn includes_are_materialized_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sh010.shot");
        write(
            &path,
            &json!({"data_version": 1, "assembler_version": "0.0.1",
                    "files": {"x.abc": {"...": "x.json"}}}),
        );
        write(&dir.path().join("x.json"), &json!({"types": "prop"}));

        let loaded = loader(dir.path()).load(&path).unwrap();
        assert_eq!(loaded.shot.files["x.abc"], json!({"types": "prop"}));
    }

    #[test]
    fn strict_versions_reject_and_lenient_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.shot");
        write(
            &path,
            &json!({"data_version": 0, "assembler_version": "0.0.1", "files": {}}),
        );

        let err = loader(dir.path()).load(&path).unwrap_err();
        assert!(matches!(err, ShotFileError::Version { .. }));
        let err: ShotkitError = err.into();
        assert_eq!(err.code().as_str(), "version_mismatch");

        let mut settings = ShotSettings::default();
        settings.version_policy = VersionPolicy::Lenient;
        let loaded = ShotLoader::new(settings, dir.path()).load(&path).unwrap();
        assert!(loaded
            .warnings
            .contains(WarningCode::VersionMismatchAccepted));
    }

    #[test]
    fn missing_fields_make_the_shot_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.shot");
        write(&path, &json!({"data_version": 1, "files": {}}));
        let err = loader(dir.path()).load(&path).unwrap_err();
        assert!(matches!(err, ShotFileError::Invalid { .. }));

        std::fs::write(&path, "{ not json").unwrap();
        let err: ShotkitError = loader(dir.path()).load(&path).unwrap_err().into();
        assert_eq!(err.code().as_str(), "malformed_json");
    }

    #[test]
    fn root_entries_are_inherited_without_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("shots/base.shot"),
            &json!({"data_version": 1, "assembler_version": "0.0.1",
                    "files": {"a.abc": {"types": "base"}, "b.abc": {"types": "base"}},
                    "overrides": {"attributes": {}}}),
        );
        let child = dir.path().join("shots/sh020.shot");
        write(
            &child,
            &json!({"data_version": 1, "assembler_version": "0.0.1",
                    "root": "shots/base.shot",
                    "files": {"a.abc": {"types": "child"}}}),
        );

        let loaded = loader(dir.path()).load(&child).unwrap();
        let files = &loaded.shot.files;
        assert_eq!(files["a.abc"], json!({"types": "child"}));
        assert_eq!(files["b.abc"], json!({"types": "base"}));
        assert!(loaded.shot.overrides.contains_key("attributes"));
        let keys: Vec<&String> = files.keys().collect();
        assert_eq!(keys, ["a.abc", "b.abc"]);

        let own = loader(dir.path()).skip_root(true).load(&child).unwrap();
        assert_eq!(own.shot.files.len(), 1);
    }

    #[test]
    fn root_cycles_and_missing_roots_fail() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("a.shot"),
            &json!({"data_version": 1, "assembler_version": "0.0.1", "root": "b.shot", "files": {}}),
        );
        write(
            &dir.path().join("b.shot"),
            &json!({"data_version": 1, "assembler_version": "0.0.1", "root": "a.shot", "files": {}}),
        );
        let err = loader(dir.path()).load(&dir.path().join("a.shot")).unwrap_err();
        assert!(matches!(err, ShotFileError::Cycle { .. }));

        write(
            &dir.path().join("c.shot"),
            &json!({"data_version": 1, "assembler_version": "0.0.1", "root": "gone.shot", "files": {}}),
        );
        let err = loader(dir.path()).load(&dir.path().join("c.shot")).unwrap_err();
        assert!(matches!(err, ShotFileError::Unresolved { .. }));
    }

    #[test]
    fn compose_writes_relative_includes_and_root() {
        let project = Path::new("/proj");
        let shot = ShotFile::compose(
            Path::new("shots/sh010.shot"),
            project,
            &ShotSettings::default(),
            &[
                StagedItem {
                    path: PathBuf::from("assets/hero/hero.abc"),
                    record: ItemRecord::Include(PathBuf::from("assets/hero/hero.json")),
                },
                StagedItem {
                    path: PathBuf::from("/proj/assets/hero/hero.abc"),
                    record: ItemRecord::Inline(Map::new()),
                },
            ],
            &[StagedOverride {
                name: "attributes".to_string(),
                record: ItemRecord::Inline(Map::new()),
            }],
            Some(Path::new("/proj/shots/base.shot")),
        );

        assert_eq!(shot.files.len(), 1);
        assert_eq!(
            shot.files["assets/hero/hero.abc"],
            json!({"...": "<../assets/hero/hero.json>"})
        );
        assert_eq!(shot.root.as_deref(), Some("shots/base.shot"));
        assert_eq!(shot.overrides["attributes"], json!({}));
    }

    #[test]
    fn save_is_atomic_and_leaves_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("sh.shot");
        let shot = ShotFile::empty(&ShotSettings::default());
        shot.save(&path).unwrap();
        shot.save(&path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(ShotFile::read_raw(&path).unwrap(), shot);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn load_of_save_returns_the_staged_records(
            assets in proptest::collection::btree_map(
                "[a-z]{1,6}",
                (any::<bool>(), "[a-z ]{0,10}"),
                0..5,
            )
        ) {
            let dir = tempfile::tempdir().unwrap();
            let project = dir.path();
            let settings = ShotSettings::default();

            let mut items = Vec::new();
            let mut expected = Map::new();
            for (name, (as_include, types)) in &assets {
                let asset = PathBuf::from(format!("assets/{name}/{name}.abc"));
                let record = json!({"types": types});
                let staged = if *as_include {
                    let record_path = PathBuf::from(format!("assets/{name}/{name}.json"));
                    write(&project.join(&record_path), &record);
                    ItemRecord::Include(record_path)
                } else {
                    ItemRecord::Inline(record.as_object().cloned().unwrap())
                };
                items.push(StagedItem { path: asset, record: staged });
                expected.insert(format!("assets/{name}/{name}.abc"), record);
            }

            let shot_path = project.join("shots").join("sh.shot");
            ShotFile::compose(&shot_path, project, &settings, &items, &[], None)
                .save(&shot_path)
                .unwrap();

            let loaded = ShotLoader::new(settings, project).load(&shot_path).unwrap();
            prop_assert_eq!(loaded.shot.files, expected);
        }
    }
}
