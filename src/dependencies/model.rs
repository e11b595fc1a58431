//! Typed view of the metadata index response.
//!
//! The index is loose about shapes: `depots` may be a map, a bare string or
//! missing entirely, and its nested `dlc` entry varies the same way. Those
//! fields decode into sum types once, here, so the discovery logic can match on
//! variants.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// `GET <base>/v1/info/<title>` response
#[derive(Debug, Default, Deserialize)]
pub struct MetadataResponse {
    /// Entries keyed by title id
    #[serde(default)]
    pub data: HashMap<String, TitleMetadata>,
}

/// Metadata for one title
#[derive(Debug, Default, Deserialize)]
pub struct TitleMetadata {
    /// Free-form "common" attributes
    #[serde(default, deserialize_with = "lenient_map")]
    pub common: Map<String, Value>,

    /// Free-form "extended" attributes
    #[serde(default, deserialize_with = "lenient_map")]
    pub extended: Map<String, Value>,

    /// Content depots, in whatever shape the index used
    #[serde(default)]
    pub depots: DepotsField,

    /// Top-level dependent-item map
    #[serde(default, deserialize_with = "lenient_map")]
    pub dlc: Map<String, Value>,
}

/// The `depots` field
#[derive(Debug, Default, Clone, PartialEq)]
pub enum DepotsField {
    /// Field absent or `null`
    #[default]
    Absent,
    /// Depot map (may contain non-depot entries such as `branches` or `dlc`)
    Map(Map<String, Value>),
    /// Content represented as a string
    Text(String),
    /// Any other JSON shape
    Unknown(Value),
}

/// The `dlc` entry nested inside a depot map
#[derive(Debug, Clone, PartialEq)]
pub enum NestedDlc<'a> {
    /// Entry absent
    Absent,
    /// Map keyed by dependent-item id
    Map(&'a Map<String, Value>),
    /// A bare string
    Text(&'a str),
    /// Any other JSON shape
    Unknown(&'a Value),
}

impl<'de> Deserialize<'de> for DepotsField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => DepotsField::Absent,
            Value::Object(map) => DepotsField::Map(map),
            Value::String(s) => DepotsField::Text(s),
            other => DepotsField::Unknown(other),
        })
    }
}

impl DepotsField {
    /// Whether this shape means the title ships content of its own
    ///
    /// True for a non-empty map and for any string.
    pub fn owns_content(&self) -> bool {
        match self {
            DepotsField::Map(map) => !map.is_empty(),
            DepotsField::Text(_) => true,
            DepotsField::Absent | DepotsField::Unknown(_) => false,
        }
    }

    /// The `dlc` entry inside a depot map
    ///
    /// Only meaningful for [`DepotsField::Map`]; every other shape reports
    /// [`NestedDlc::Absent`].
    pub fn nested_dlc(&self) -> NestedDlc<'_> {
        let DepotsField::Map(map) = self else {
            return NestedDlc::Absent;
        };
        match map.get("dlc") {
            None | Some(Value::Null) => NestedDlc::Absent,
            Some(Value::Object(dlc)) => NestedDlc::Map(dlc),
            Some(Value::String(s)) => NestedDlc::Text(s),
            Some(other) => NestedDlc::Unknown(other),
        }
    }
}

/// JSON type name for log messages
pub fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Accept null or a non-object where an object is expected, yielding an empty map
fn lenient_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}
