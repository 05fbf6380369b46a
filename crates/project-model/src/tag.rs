//! Tag records: the identity carried by a tagged scene transform.
//!
//! The same record shape is used for the embedded `tag_info` attribute,
//! for sidecar roots, and as the logical content of a linked TagNode:
//!
//! ```json
//! {"id": "a-001", "types": "character hero", "hires": "hero_hires_grp",
//!  "shaders": {"body": ["skinSG"]}, "lod": "2"}
//! ```
//!
//! Unknown keys are kept as extra string attributes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mesh short name to the set of shading groups bound to it.
pub type ShaderMap = BTreeMap<String, BTreeSet<String>>;

pub const KEY_ID: &str = "id";
pub const KEY_TYPES: &str = "types";
pub const KEY_HIRES: &str = "hires";
pub const KEY_SHADERS: &str = "shaders";

/// Errors decoding a tag record.
#[derive(Debug, thiserror::Error)]
pub enum TagRecordError {
    #[error("tag record must be a JSON object")]
    NotAnObject,

    #[error("invalid tag field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("tag record is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Logical content of one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct TagRecord {
    /// Catalogue entry id, when known.
    pub catalogue_id: Option<String>,

    /// Free-form type flags.
    pub types: BTreeSet<String>,

    /// Short name of the hires group, when linked.
    pub hires: Option<String>,

    pub shaders: ShaderMap,

    /// Additional attributes, stored in their raw string form.
    pub extra: BTreeMap<String, String>,
}

impl TagRecord {
    pub fn new(catalogue_id: Option<String>) -> Self {
        Self {
            catalogue_id,
            ..Self::default()
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hires(mut self, hires: impl Into<String>) -> Self {
        self.hires = Some(hires.into());
        self
    }

    pub fn with_shader(mut self, mesh: impl Into<String>, shading_group: impl Into<String>) -> Self {
        self.shaders
            .entry(mesh.into())
            .or_default()
            .insert(shading_group.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Whether every flag in `required` is present.
    pub fn has_types<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        required.into_iter().all(|t| self.types.contains(t))
    }

    /// The `types` attribute string: flags joined by single spaces.
    pub fn types_string(&self) -> String {
        encode_types(&self.types)
    }

    /// The serialized shader map stored on linked tag nodes.
    pub fn shaders_string(&self) -> String {
        Value::Object(encode_shaders(&self.shaders)).to_string()
    }

    /// The `tag_info` attribute string.
    pub fn to_tag_info(&self) -> String {
        Value::from(self.clone()).to_string()
    }

    pub fn parse_tag_info(raw: &str) -> Result<Self, TagRecordError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::try_from(value)
    }
}

/// Split a whitespace-separated `types` string into flags.
pub fn decode_types(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

pub fn encode_types(types: &BTreeSet<String>) -> String {
    types.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

fn encode_shaders(shaders: &ShaderMap) -> Map<String, Value> {
    shaders
        .iter()
        .map(|(mesh, groups)| {
            (
                mesh.clone(),
                Value::Array(groups.iter().cloned().map(Value::String).collect()),
            )
        })
        .collect()
}

/// Decode a shader map from its JSON form. Values may be a single name or
/// a list of names.
pub fn decode_shaders(value: &Value) -> Result<ShaderMap, TagRecordError> {
    let invalid = |message: String| TagRecordError::InvalidField {
        field: KEY_SHADERS.to_string(),
        message,
    };
    let object = match value {
        Value::Null => return Ok(ShaderMap::new()),
        Value::String(raw) if raw.trim().is_empty() => return Ok(ShaderMap::new()),
        Value::String(raw) => {
            let parsed: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
            return decode_shaders(&parsed);
        }
        Value::Object(object) => object,
        other => return Err(invalid(format!("expected an object, got {other}"))),
    };

    let mut shaders = ShaderMap::new();
    for (mesh, groups) in object {
        let set = shaders.entry(mesh.clone()).or_default();
        match groups {
            Value::String(name) => {
                set.insert(name.clone());
            }
            Value::Array(names) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid(format!("shading group of '{mesh}' is not a string")))?;
                    set.insert(name.to_string());
                }
            }
            other => {
                return Err(invalid(format!(
                    "shading groups of '{mesh}' must be a string or list, got {other}"
                )))
            }
        }
    }
    Ok(shaders)
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl From<TagRecord> for Value {
    fn from(record: TagRecord) -> Self {
        let mut map = Map::new();
        if let Some(id) = record.catalogue_id {
            map.insert(KEY_ID.to_string(), Value::String(id));
        }
        map.insert(
            KEY_TYPES.to_string(),
            Value::String(encode_types(&record.types)),
        );
        if let Some(hires) = record.hires {
            map.insert(KEY_HIRES.to_string(), Value::String(hires));
        }
        map.insert(
            KEY_SHADERS.to_string(),
            Value::Object(encode_shaders(&record.shaders)),
        );
        for (key, value) in record.extra {
            map.insert(key, Value::String(value));
        }
        Value::Object(map)
    }
}

impl TryFrom<Value> for TagRecord {
    type Error = TagRecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(map) = value else {
            return Err(TagRecordError::NotAnObject);
        };

        let types = match map.get(KEY_TYPES) {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::String(raw)) => decode_types(raw),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(|s| s.split_whitespace())
                .map(str::to_string)
                .collect(),
            Some(other) => {
                return Err(TagRecordError::InvalidField {
                    field: KEY_TYPES.to_string(),
                    message: format!("expected a string, got {other}"),
                })
            }
        };

        let shaders = match map.get(KEY_SHADERS) {
            Some(value) => decode_shaders(value)?,
            None => ShaderMap::new(),
        };

        let extra = map
            .iter()
            .filter(|(key, _)| {
                ![KEY_ID, KEY_TYPES, KEY_HIRES, KEY_SHADERS].contains(&key.as_str())
            })
            .map(|(key, value)| {
                let raw = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), raw)
            })
            .collect();

        Ok(Self {
            catalogue_id: optional_string(map.get(KEY_ID)),
            types,
            hires: optional_string(map.get(KEY_HIRES)),
            shaders,
            extra,
        })
    }
}

/// Strip trailing ASCII digits from a short name (`char_A12` -> `char_A`).
pub fn strip_trailing_digits(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tag_info_uses_documented_field_names() {
        let record = TagRecord::new(Some("a-001".to_string()))
            .with_types(["hero", "character"])
            .with_hires("hero_hires_grp")
            .with_shader("body", "skinSG");

        let value: Value = serde_json::from_str(&record.to_tag_info()).unwrap();
        assert_eq!(value["id"], "a-001");
        assert_eq!(value["types"], "character hero");
        assert_eq!(value["hires"], "hero_hires_grp");
        assert_eq!(value["shaders"]["body"][0], "skinSG");
    }

    #[test]
    fn legacy_single_shader_strings_are_accepted() {
        let record =
            TagRecord::parse_tag_info(r#"{"types": "prop", "shaders": {"lid": "metalSG"}}"#)
                .unwrap();
        assert_eq!(record.catalogue_id, None);
        assert!(record.shaders["lid"].contains("metalSG"));
    }

    #[test]
    fn unknown_keys_become_extra_strings() {
        let record = TagRecord::parse_tag_info(r#"{"types": "", "lod": 2, "note": "x"}"#).unwrap();
        assert!(record.types.is_empty());
        assert_eq!(record.extra["lod"], "2");
        assert_eq!(record.extra["note"], "x");
    }

    #[test]
    fn non_object_tag_info_is_rejected() {
        assert!(matches!(
            TagRecord::parse_tag_info("[1, 2]"),
            Err(TagRecordError::NotAnObject)
        ));
        assert!(TagRecord::parse_tag_info("{oops").is_err());
    }

    #[test]
    fn digits_are_stripped_from_the_end_only() {
        assert_eq!(strip_trailing_digits("char_A12"), "char_A");
        assert_eq!(strip_trailing_digits("rock2_geo"), "rock2_geo");
    }

    fn flag() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}"
    }

    proptest! {
        #[test]
        fn tag_info_round_trips(
            id in proptest::option::of("[a-z0-9-]{1,12}"),
            types in proptest::collection::btree_set(flag(), 0..4),
            hires in proptest::option::of("[a-z_]{1,10}"),
            shaders in proptest::collection::btree_map(
                flag(),
                proptest::collection::btree_set("[a-zA-Z]{1,8}SG", 1..3),
                0..3,
            ),
        ) {
            let record = TagRecord {
                catalogue_id: id,
                types,
                hires,
                shaders,
                extra: BTreeMap::new(),
            };
            let parsed = TagRecord::parse_tag_info(&record.to_tag_info()).unwrap();
            prop_assert_eq!(parsed, record);
        }
    }
}
