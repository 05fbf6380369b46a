//! Cache sidecars.
//!
//! Every point-cache `<dir>/<stem>.<ext>` is paired with a metadata file
//! `<dir>/<stem>_<ext>.info` carrying the tag dictionary of the exported
//! roots, keyed by root short name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frames::FrameRange;
use crate::tag::TagRecord;

/// Current sidecar schema version.
pub const SIDECAR_SCHEMA_VERSION: u32 = 1;

/// Sidecar document.
///
/// The serialized form depends only on the exported tags and the sampled
/// range, so exporting the same scene twice yields identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSidecar {
    pub schema_version: u32,

    /// Frame range actually sampled; `None` when no frame was written.
    #[serde(default)]
    pub frame_range: Option<FrameRange>,

    /// Tag records keyed by root short name.
    pub roots: BTreeMap<String, TagRecord>,
}

/// Errors reading or writing sidecars.
#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid sidecar {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

impl CacheSidecar {
    pub fn new(frame_range: Option<FrameRange>, roots: BTreeMap<String, TagRecord>) -> Self {
        Self {
            schema_version: SIDECAR_SCHEMA_VERSION,
            frame_range,
            roots,
        }
    }

    /// Sidecar location for a cache file.
    pub fn path_for(cache: &Path) -> PathBuf {
        let stem = cache
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match cache.extension() {
            Some(ext) => format!("{stem}_{}.info", ext.to_string_lossy()),
            None => format!("{stem}.info"),
        };
        cache.with_file_name(file_name)
    }

    /// Serialized form. `roots` is a sorted map.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> Result<(), SidecarError> {
        let json = self.to_json_pretty().map_err(|e| SidecarError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| SidecarError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parse a sidecar. The flat legacy form, where the whole document is
    /// the roots map, is accepted and reported with schema version 0.
    pub fn parse(content: &str, path: &Path) -> Result<Self, SidecarError> {
        let invalid = |message: String| SidecarError::Invalid {
            path: path.to_path_buf(),
            message,
        };
        let value: Value = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(invalid("sidecar must be a JSON object".to_string()));
        };

        if map.contains_key("schema_version") && map.contains_key("roots") {
            return serde_json::from_value(Value::Object(map)).map_err(|e| invalid(e.to_string()));
        }

        let mut roots = BTreeMap::new();
        for (name, record) in map {
            let record = TagRecord::try_from(record)
                .map_err(|e| invalid(format!("root '{name}': {e}")))?;
            roots.insert(name, record);
        }
        Ok(Self {
            schema_version: 0,
            frame_range: None,
            roots,
        })
    }

    pub fn read(path: &Path) -> Result<Self, SidecarError> {
        let content = std::fs::read_to_string(path).map_err(|e| SidecarError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Record for a root, trying the name with trailing digits removed
    /// when the exact name is absent.
    pub fn record_for(&self, short_name: &str) -> Option<&TagRecord> {
        self.roots.get(short_name).or_else(|| {
            let stripped = crate::tag::strip_trailing_digits(short_name);
            if stripped == short_name {
                None
            } else {
                self.roots.get(stripped)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_path_keeps_basename() {
        assert_eq!(
            CacheSidecar::path_for(Path::new("/caches/sh010_anim.abc")),
            PathBuf::from("/caches/sh010_anim_abc.info")
        );
    }

    #[test]
    fn written_sidecars_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_abc.info");
        let roots = BTreeMap::from([(
            "char_A".to_string(),
            TagRecord::default().with_types(["character"]),
        )]);
        let sidecar = CacheSidecar::new(Some(FrameRange::new(1.0, 10.0, 1.0)), roots);
        sidecar.write(&path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let read = CacheSidecar::read(&path).unwrap();
        assert_eq!(read, sidecar);

        read.write(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn unsampled_and_older_sidecars_have_no_range() {
        let sidecar = CacheSidecar::parse(
            r#"{"schema_version": 1, "frame_range": null, "written_at": "2020-01-01T00:00:00Z", "roots": {}}"#,
            Path::new("x_abc.info"),
        )
        .unwrap();
        assert_eq!(sidecar.frame_range, None);
        assert!(sidecar.roots.is_empty());
    }

    #[test]
    fn legacy_flat_sidecars_are_accepted() {
        let sidecar = CacheSidecar::parse(
            r#"{"char_A": {"types": "character", "shaders": {}}}"#,
            Path::new("legacy_abc.info"),
        )
        .unwrap();
        assert_eq!(sidecar.schema_version, 0);
        assert_eq!(sidecar.frame_range, None);
        assert!(sidecar.roots["char_A"].types.contains("character"));
        assert!(sidecar.record_for("char_A2").is_some());
        assert!(sidecar.record_for("prop_B").is_none());
    }

    #[test]
    fn garbage_is_invalid() {
        let err = CacheSidecar::parse("[]", Path::new("x_abc.info")).unwrap_err();
        assert!(matches!(err, SidecarError::Invalid { .. }));
    }
}
