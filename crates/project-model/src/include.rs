//! Recursive JSON include expansion.
//!
//! An include expression is an object with exactly one key, `"..."`, whose
//! value names another JSON file relative to the including file's
//! directory, either bare (`"x.json"`) or bracketed (`"<x.json>"`). The
//! expression is replaced by the parsed, fully expanded contents of that
//! file. Expansion is depth-first and strict.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::paths;
use crate::shot::ShotFileError;

/// The single key of an include expression.
pub const INCLUDE_KEY: &str = "...";

/// Target named by an include expression, with brackets removed.
pub fn include_target(value: &Value) -> Option<&str> {
    let Value::Object(map) = value else {
        return None;
    };
    if map.len() != 1 {
        return None;
    }
    let Some(Value::String(raw)) = map.get(INCLUDE_KEY) else {
        return None;
    };
    let name = raw
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw.as_str())
        .trim();
    (!name.is_empty()).then_some(name)
}

/// Build the bracketed include expression for `relative_path`.
pub fn include_expression(relative_path: &str) -> Value {
    let mut map = Map::new();
    map.insert(
        INCLUDE_KEY.to_string(),
        Value::String(format!("<{relative_path}>")),
    );
    Value::Object(map)
}

/// Expands include expressions for one load.
///
/// Included files are cached by canonical path so repeated includes parse
/// once. Files currently being expanded are kept on a stack; re-entering one
/// is an include cycle.
#[derive(Debug, Default)]
pub struct IncludeResolver {
    cache: HashMap<PathBuf, Value>,
    in_flight: Vec<PathBuf>,
}

impl IncludeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct included files parsed so far.
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    /// Parse `path` and expand every include expression in it.
    pub fn load(&mut self, path: &Path) -> Result<Value, ShotFileError> {
        let canonical = std::fs::canonicalize(path).map_err(|e| ShotFileError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.begin(&canonical)?;
        let result = read_json(&canonical).and_then(|value| {
            let dir = parent_dir(&canonical);
            self.expand(value, &dir)
        });
        self.end();
        result
    }

    /// Mark `canonical` as in flight, failing if it already is.
    pub fn begin(&mut self, canonical: &Path) -> Result<(), ShotFileError> {
        if let Some(pos) = self.in_flight.iter().position(|p| p == canonical) {
            let mut chain: Vec<PathBuf> = self.in_flight[pos..].to_vec();
            chain.push(canonical.to_path_buf());
            return Err(ShotFileError::Cycle { chain });
        }
        self.in_flight.push(canonical.to_path_buf());
        Ok(())
    }

    /// Pop the most recent in-flight path.
    pub fn end(&mut self) {
        self.in_flight.pop();
    }

    /// Expand include expressions in `value`, resolving relative names
    /// against `base_dir`.
    pub fn expand(&mut self, value: Value, base_dir: &Path) -> Result<Value, ShotFileError> {
        if let Some(name) = include_target(&value) {
            return self.include(name, base_dir);
        }
        match value {
            Value::Object(map) => {
                let mut expanded = Map::with_capacity(map.len());
                for (key, child) in map {
                    expanded.insert(key, self.expand(child, base_dir)?);
                }
                Ok(Value::Object(expanded))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.expand(item, base_dir))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            primitive => Ok(primitive),
        }
    }

    fn include(&mut self, name: &str, base_dir: &Path) -> Result<Value, ShotFileError> {
        let candidate = Path::new(name);
        let target = if candidate.is_absolute() && candidate.is_file() {
            candidate.to_path_buf()
        } else {
            paths::clean(&base_dir.join(candidate))
        };

        let canonical =
            std::fs::canonicalize(&target).map_err(|e| ShotFileError::Unresolved {
                path: target.clone(),
                message: e.to_string(),
            })?;

        if let Some(cached) = self.cache.get(&canonical) {
            tracing::trace!(path = %canonical.display(), "Include served from cache");
            return Ok(cached.clone());
        }

        self.begin(&canonical)?;
        let result = self.parse_include(&canonical);
        self.end();

        let value = result?;
        self.cache.insert(canonical, value.clone());
        Ok(value)
    }

    fn parse_include(&mut self, canonical: &Path) -> Result<Value, ShotFileError> {
        let value = read_json(canonical).map_err(|e| match e {
            ShotFileError::Io { path, source } => ShotFileError::Unresolved {
                path,
                message: source.to_string(),
            },
            other => other,
        })?;
        if !value.is_object() {
            return Err(ShotFileError::Unresolved {
                path: canonical.to_path_buf(),
                message: "included file must contain a JSON object".to_string(),
            });
        }
        tracing::debug!(path = %canonical.display(), "Expanding include");
        self.expand(value, &parent_dir(canonical))
    }
}

/// Expand a JSON file given as `file` inside `dir`. An existing `file` path
/// is used as-is.
pub fn build_json_include(dir: &Path, file: &Path) -> Result<Value, ShotFileError> {
    let path = if file.is_file() {
        file.to_path_buf()
    } else {
        dir.join(file)
    };
    IncludeResolver::new().load(&path)
}

pub(crate) fn read_json(path: &Path) -> Result<Value, ShotFileError> {
    let content = std::fs::read_to_string(path).map_err(|e| ShotFileError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ShotFileError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: &Value) {
        std::fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    #[test]
    fn include_targets_accept_both_forms() {
        assert_eq!(include_target(&json!({"...": "<x.json>"})), Some("x.json"));
        assert_eq!(include_target(&json!({"...": "x.json"})), Some("x.json"));
        assert_eq!(include_target(&json!({"...": "x.json", "y": 1})), None);
        assert_eq!(include_target(&json!({"...": 3})), None);
        assert_eq!(include_target(&json!({"...": "<>"})), None);
    }

    #[test]
    fn includes_expand_relative_to_including_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("parts")).unwrap();
        write(dir.path(), "main.json", &json!({"a": {"...": "<parts/a.json>"}, "n": [1, {"...": "parts/a.json"}]}));
        write(&dir.path().join("parts"), "a.json", &json!({"inner": {"...": "<b.json>"}}));
        write(&dir.path().join("parts"), "b.json", &json!({"leaf": true}));

        let mut resolver = IncludeResolver::new();
        let value = resolver.load(&dir.path().join("main.json")).unwrap();
        assert_eq!(
            value,
            json!({"a": {"inner": {"leaf": true}}, "n": [1, {"inner": {"leaf": true}}]})
        );
        assert_eq!(resolver.cached_files(), 2);
    }

    #[test]
    fn cycles_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", &json!({"...": "<b.json>"}));
        write(dir.path(), "b.json", &json!({"...": "<a.json>"}));

        let err = IncludeResolver::new()
            .load(&dir.path().join("a.json"))
            .unwrap_err();
        match err {
            ShotFileError::Cycle { chain } => {
                assert_eq!(chain.len(), 3);
                assert_eq!(chain.first(), chain.last());
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_inclusion_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "self.json", &json!({"x": {"...": "self.json"}}));
        let err = IncludeResolver::new()
            .load(&dir.path().join("self.json"))
            .unwrap_err();
        assert!(matches!(err, ShotFileError::Cycle { .. }));
    }

    #[test]
    fn missing_and_non_object_includes_are_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.json", &json!({"x": {"...": "gone.json"}}));
        let err = IncludeResolver::new()
            .load(&dir.path().join("main.json"))
            .unwrap_err();
        assert!(matches!(err, ShotFileError::Unresolved { .. }));

        write(dir.path(), "list.json", &json!([1, 2]));
        write(dir.path(), "main2.json", &json!({"x": {"...": "list.json"}}));
        let err = IncludeResolver::new()
            .load(&dir.path().join("main2.json"))
            .unwrap_err();
        assert!(matches!(err, ShotFileError::Unresolved { .. }));
    }

    #[test]
    fn malformed_includes_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();
        write(dir.path(), "main.json", &json!({"x": {"...": "bad.json"}}));
        let err = IncludeResolver::new()
            .load(&dir.path().join("main.json"))
            .unwrap_err();
        assert!(matches!(err, ShotFileError::Parse { .. }));
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z ]{0,8}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn expansion_is_a_function_of_the_file_tree(
            parts in proptest::collection::btree_map("[a-z]{1,6}", leaf(), 1..5)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let mut main = Map::new();
            let mut expected = Map::new();
            for (i, (key, value)) in parts.iter().enumerate() {
                let name = format!("part{i}.json");
                write(dir.path(), &name, &json!({"value": value}));
                main.insert(key.clone(), include_expression(&name));
                expected.insert(key.clone(), json!({"value": value}));
            }
            write(dir.path(), "main.json", &Value::Object(main));

            let first = IncludeResolver::new().load(&dir.path().join("main.json")).unwrap();
            prop_assert_eq!(&first, &Value::Object(expected));

            write(dir.path(), "fixed.json", &first);
            let second = IncludeResolver::new().load(&dir.path().join("fixed.json")).unwrap();
            prop_assert_eq!(second, first);
        }
    }
}
