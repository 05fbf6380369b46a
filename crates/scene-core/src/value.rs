//! Attribute values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value held by a node attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A message plug: carries no data, only connections.
    Message,
}

impl AttrValue {
    /// Type an attribute from its raw string form.
    ///
    /// The raw text is parsed as JSON. An integer becomes `Int` and a float
    /// `Float`, but only when the typed value displays back as exactly
    /// `raw`; `"1.0"` is a float while `"1e2"`, `" 7"` and `"-0"` stay
    /// strings. Everything else, including JSON strings, booleans, arrays,
    /// objects, null, and text that is not JSON, is kept verbatim as
    /// `String`. `parse_literal(raw).to_string() == raw` always holds.
    pub fn parse_literal(raw: &str) -> Self {
        let typed = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Number(n)) => match n.as_i64() {
                Some(i) => Some(AttrValue::Int(i)),
                None if n.is_f64() => n.as_f64().map(AttrValue::Float),
                None => None,
            },
            _ => None,
        };
        match typed {
            Some(value) if value.to_string() == raw => value,
            _ => AttrValue::String(raw.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Message => "message",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Truthiness as hosts read visibility-style flags.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            _ => None,
        }
    }

    /// Convert a JSON scalar into an attribute value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            // Shortest round-trip form with a fractional part: 1.0, 0.25, 1e100.
            Self::Float(x) => write!(f, "{x:?}"),
            Self::String(s) => f.write_str(s),
            Self::Message => Ok(()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_typing_follows_json() {
        assert_eq!(AttrValue::parse_literal("12"), AttrValue::Int(12));
        assert_eq!(AttrValue::parse_literal("-3"), AttrValue::Int(-3));
        assert_eq!(AttrValue::parse_literal("1.5"), AttrValue::Float(1.5));
        assert_eq!(AttrValue::parse_literal("1.0"), AttrValue::Float(1.0));
    }

    #[test]
    fn everything_else_stays_raw() {
        for raw in [
            "true", "null", "[1, 2]", "{\"a\": 1}", "hero", "12abc", "", "\"quoted\"",
            "1e2", " 7", "7 ", "-0", "1.50", "18446744073709551616",
        ] {
            assert_eq!(AttrValue::parse_literal(raw), AttrValue::String(raw.to_string()));
        }
    }

    #[test]
    fn display_form_reads_back() {
        assert_eq!(AttrValue::parse_literal("12").to_string(), "12");
        assert_eq!(AttrValue::parse_literal("0.25").to_string(), "0.25");
        assert_eq!(AttrValue::parse_literal("1.0").to_string(), "1.0");
        assert_eq!(AttrValue::parse_literal("hero").to_string(), "hero");
        assert_eq!(AttrValue::Float(2.0).to_string(), "2.0");
        assert_eq!(AttrValue::Message.to_string(), "");
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integers_stay_integers(i in any::<i64>()) {
                prop_assert_eq!(AttrValue::parse_literal(&i.to_string()), AttrValue::Int(i));
            }

            #[test]
            fn floats_stay_floats(x in (-100_000i32..100_000).prop_map(|i| f64::from(i) / 8.0)) {
                let raw = format!("{x:?}");
                prop_assert_eq!(AttrValue::parse_literal(&raw), AttrValue::Float(x));
            }

            #[test]
            fn any_text_displays_back(raw in ".*") {
                prop_assert_eq!(AttrValue::parse_literal(&raw).to_string(), raw);
            }
        }
    }
}
