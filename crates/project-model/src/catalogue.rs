//! Catalogue entries: assets, shots, and sequences.
//!
//! Tracker records arrive as loose JSON objects. Each one is normalized into
//! a [`CatalogueEntry`] whose payload is a tagged variant, so consumers
//! dispatch on the variant instead of probing keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use shotkit_common::{ProjectConfig, RecordFields};

/// Closed set of entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Asset,
    Shot,
    Sequence,
}

impl EntryKind {
    pub const ALL: [EntryKind; 3] = [EntryKind::Asset, EntryKind::Shot, EntryKind::Sequence];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Shot => "shot",
            Self::Sequence => "sequence",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asset" | "assets" => Ok(Self::Asset),
            "shot" | "shots" => Ok(Self::Shot),
            "sequence" | "sequences" => Ok(Self::Sequence),
            other => Err(format!("unknown entry kind '{other}'")),
        }
    }
}

/// A category resolved against the configured type registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,

    /// `false` when the category is not declared for the entry's kind.
    pub known: bool,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryPayload {
    Asset,
    Shot {
        sequence_id: String,
        frame_range: Option<(i64, i64)>,
    },
    Sequence {
        shot_ids: Vec<String>,
    },
}

/// One asset, shot, or sequence as known to the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub id: String,
    pub name: String,
    pub category: Category,

    /// File kinds the entry may carry (`model`, `rig`, `shading`, ...).
    pub file_kinds: Vec<String>,

    pub thumbnail: Option<String>,
    pub payload: EntryPayload,
}

/// Reasons a tracker record cannot become an entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no '{field}' field")]
    MissingField { field: String },
}

impl CatalogueEntry {
    pub fn kind(&self) -> EntryKind {
        match self.payload {
            EntryPayload::Asset => EntryKind::Asset,
            EntryPayload::Shot { .. } => EntryKind::Shot,
            EntryPayload::Sequence { .. } => EntryKind::Sequence,
        }
    }

    /// Parent sequence id for shots.
    pub fn sequence_id(&self) -> Option<&str> {
        match &self.payload {
            EntryPayload::Shot { sequence_id, .. } => Some(sequence_id),
            _ => None,
        }
    }

    /// Ordered shot ids for sequences.
    pub fn shot_ids(&self) -> &[String] {
        match &self.payload {
            EntryPayload::Sequence { shot_ids } => shot_ids,
            _ => &[],
        }
    }

    /// Normalize one loose tracker record of the given kind.
    ///
    /// Field names come from `config.record_fields`. Categories missing from
    /// the record default to the kind name. File kinds missing from the
    /// record default to the configured file kinds of the category.
    pub fn from_record(
        kind: EntryKind,
        record: &Value,
        config: &ProjectConfig,
    ) -> Result<Self, RecordError> {
        let fields = &config.record_fields;
        let object = record.as_object().ok_or(RecordError::NotAnObject)?;
        let get = |key: &str| object.get(key).and_then(scalar_string);

        let id = get(&fields.id).ok_or_else(|| RecordError::MissingField {
            field: fields.id.clone(),
        })?;
        let name = get(&fields.name).ok_or_else(|| RecordError::MissingField {
            field: fields.name.clone(),
        })?;

        let category_name = get(&fields.category).unwrap_or_else(|| kind.as_str().to_string());
        let category = Category {
            known: config.is_known_category(kind.as_str(), &category_name),
            name: category_name,
        };

        let file_kinds = match object.get(&fields.file_kinds) {
            Some(value) => string_list(value),
            None => config.file_kinds_for(&category.name).to_vec(),
        };

        let payload = payload_for(kind, object, fields)?;

        Ok(Self {
            id,
            name,
            category,
            file_kinds,
            thumbnail: get(&fields.thumbnail),
            payload,
        })
    }
}

fn payload_for(
    kind: EntryKind,
    object: &serde_json::Map<String, Value>,
    fields: &RecordFields,
) -> Result<EntryPayload, RecordError> {
    Ok(match kind {
        EntryKind::Asset => EntryPayload::Asset,
        EntryKind::Shot => {
            let sequence_id = object
                .get(&fields.sequence)
                .and_then(scalar_string)
                .ok_or_else(|| RecordError::MissingField {
                    field: fields.sequence.clone(),
                })?;
            let start = object.get(&fields.frame_start).and_then(Value::as_i64);
            let end = object.get(&fields.frame_end).and_then(Value::as_i64);
            EntryPayload::Shot {
                sequence_id,
                frame_range: start.zip(end),
            }
        }
        EntryKind::Sequence => EntryPayload::Sequence {
            shot_ids: object
                .get(&fields.shots)
                .map(string_list)
                .unwrap_or_default(),
        },
    })
}

/// Strings and numbers become strings; everything else is absent.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A list of scalars, or a whitespace/comma separated string.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        Value::String(raw) => raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn asset_records_normalize_with_registry() {
        let config = ProjectConfig::default();
        let entry = CatalogueEntry::from_record(
            EntryKind::Asset,
            &json!({"id": 17, "name": "hero", "category": "character", "thumbnail": "t.png"}),
            &config,
        )
        .unwrap();

        assert_eq!(entry.id, "17");
        assert_eq!(entry.kind(), EntryKind::Asset);
        assert!(entry.category.known);
        assert!(entry.file_kinds.contains(&"rig".to_string()));
        assert_eq!(entry.thumbnail.as_deref(), Some("t.png"));
    }

    #[test]
    fn unknown_categories_are_kept_and_marked() {
        let config = ProjectConfig::default();
        let entry = CatalogueEntry::from_record(
            EntryKind::Asset,
            &json!({"id": "a1", "name": "boat", "category": "vehicle", "file_kinds": "model, proxy"}),
            &config,
        )
        .unwrap();
        assert_eq!(entry.category.name, "vehicle");
        assert!(!entry.category.known);
        assert_eq!(entry.file_kinds, vec!["model", "proxy"]);
    }

    #[test]
    fn shots_need_a_sequence() {
        let config = ProjectConfig::default();
        let err = CatalogueEntry::from_record(
            EntryKind::Shot,
            &json!({"id": "s1", "name": "sh010"}),
            &config,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RecordError::MissingField {
                field: "sequence".to_string()
            }
        );

        let shot = CatalogueEntry::from_record(
            EntryKind::Shot,
            &json!({"id": "s1", "name": "sh010", "sequence": "q1", "frame_start": 1001, "frame_end": 1050}),
            &config,
        )
        .unwrap();
        assert_eq!(shot.sequence_id(), Some("q1"));
        assert_eq!(
            shot.payload,
            EntryPayload::Shot {
                sequence_id: "q1".to_string(),
                frame_range: Some((1001, 1050)),
            }
        );
    }

    #[test]
    fn custom_record_fields_are_honored() {
        let mut config = ProjectConfig::default();
        config.record_fields.id = "uid".to_string();
        config.record_fields.name = "title".to_string();
        config.record_fields.shots = "children".to_string();

        let seq = CatalogueEntry::from_record(
            EntryKind::Sequence,
            &json!({"uid": "q1", "title": "seq01", "children": ["s1", "s2"]}),
            &config,
        )
        .unwrap();
        assert_eq!(seq.name, "seq01");
        assert_eq!(seq.shot_ids(), ["s1".to_string(), "s2".to_string()]);
        assert!(matches!(
            CatalogueEntry::from_record(EntryKind::Asset, &json!("nope"), &config),
            Err(RecordError::NotAnObject)
        ));
    }
}
