//! Fleet entities as the druid API reports them.
//!
//! The backend serializes Mongo documents, so identifiers arrive either as
//! plain strings or as `{"$oid": "..."}` objects, and addresses arrive either
//! as a single string or as a list. Both shapes are normalized on the way in.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A managed worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    #[serde(
        default,
        alias = "_id",
        deserialize_with = "id_like",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default, alias = "urls", deserialize_with = "one_or_many")]
    pub address: Vec<String>,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "id_like",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub settings: Value,
    /// Client-side lock held while a mutating request for this leaf is in flight.
    #[serde(skip)]
    pub busy: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Leaf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            desc: None,
            active: false,
            address: Vec::new(),
            kind: None,
            settings: Value::Null,
            busy: false,
            extra: Map::new(),
        }
    }

    /// Decode one leaf from a keyed collection, where the map key is the name.
    pub fn from_keyed(name: &str, value: Value) -> Result<Self, serde_json::Error> {
        let value = match value {
            Value::Object(mut map) => {
                map.insert("name".to_string(), Value::String(name.to_string()));
                Value::Object(map)
            }
            other => other,
        };
        serde_json::from_value(value)
    }
}

/// A named grouping of leaves sharing a compatibility `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(
        default,
        alias = "_id",
        deserialize_with = "id_like",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    pub name: String,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "id_like",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Branch {
    /// Whether a leaf may be moved here. Advisory only; the backend decides.
    pub fn accepts(&self, leaf: &Leaf) -> bool {
        match (&self.kind, &leaf.kind) {
            (Some(branch_kind), Some(leaf_kind)) => branch_kind == leaf_kind,
            _ => false,
        }
    }
}

/// A leaf type. `get_species` reports `[name, id]` pairs while the resource
/// API reports full documents; both decode to this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpeciesRepr")]
pub struct Species {
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub settings: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpeciesRepr {
    Pair(String, Value),
    Record {
        #[serde(default, alias = "_id")]
        id: Value,
        name: String,
        #[serde(default)]
        settings: Value,
    },
}

impl From<SpeciesRepr> for Species {
    fn from(repr: SpeciesRepr) -> Self {
        match repr {
            SpeciesRepr::Pair(name, id) => Species {
                id: id_from_value(&id),
                name,
                settings: Value::Null,
            },
            SpeciesRepr::Record { id, name, settings } => Species {
                id: id_from_value(&id),
                name,
                settings,
            },
        }
    }
}

/// A log record. Only `_id` is structural; everything else is display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "id_like",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogEvent {
    pub fn log_type(&self) -> Option<&str> {
        self.str_field("log_type")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Normalize an identifier: plain string, number, or `{"$oid": "..."}`.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn id_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => id_from_value(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported identifier: {value}"))),
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s]),
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected address string or list, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_from_get_leaves_shape() {
        let leaf: Leaf = serde_json::from_value(json!({
            "id": {"$oid": "5290c5a1e4b0b8a3c1f0a001"},
            "name": "main",
            "desc": "Main site",
            "urls": ["main.example.org"],
            "type": "5290c5a1e4b0b8a3c1f0a0ff",
            "active": true,
            "branch": [null]
        }))
        .unwrap();
        assert_eq!(leaf.id.as_deref(), Some("5290c5a1e4b0b8a3c1f0a001"));
        assert_eq!(leaf.address, vec!["main.example.org".to_string()]);
        assert_eq!(leaf.kind.as_deref(), Some("5290c5a1e4b0b8a3c1f0a0ff"));
        assert!(leaf.active);
        assert!(!leaf.busy);
        assert_eq!(leaf.extra["branch"], json!([null]));
    }

    #[test]
    fn leaf_scalar_address_becomes_list() {
        let leaf: Leaf =
            serde_json::from_value(json!({"name": "api", "address": "api.example.org"})).unwrap();
        assert_eq!(leaf.address, vec!["api.example.org".to_string()]);
        assert!(!leaf.active);
    }

    #[test]
    fn leaf_busy_never_serialized() {
        let mut leaf = Leaf::new("main");
        leaf.busy = true;
        let value = serde_json::to_value(&leaf).unwrap();
        assert!(value.get("busy").is_none());
    }

    #[test]
    fn leaf_from_keyed_takes_map_key_as_name() {
        let leaf = Leaf::from_keyed("blog", json!({"active": true})).unwrap();
        assert_eq!(leaf.name, "blog");
        assert!(leaf.active);

        let renamed = Leaf::from_keyed("blog", json!({"name": "other"})).unwrap();
        assert_eq!(renamed.name, "blog");
    }

    #[test]
    fn branch_accepts_matching_type_only() {
        let branch: Branch =
            serde_json::from_value(json!({"name": "b1", "type": "python"})).unwrap();
        let mut leaf = Leaf::new("main");
        assert!(!branch.accepts(&leaf));
        leaf.kind = Some("python".to_string());
        assert!(branch.accepts(&leaf));
        leaf.kind = Some("ruby".to_string());
        assert!(!branch.accepts(&leaf));
    }

    #[test]
    fn species_from_pair_and_record() {
        let species: Vec<Species> = serde_json::from_value(json!([
            ["django", {"$oid": "abc"}],
            {"_id": "def", "name": "flask", "settings": {"workers": {"type": "int"}}}
        ]))
        .unwrap();
        assert_eq!(species[0].name, "django");
        assert_eq!(species[0].id.as_deref(), Some("abc"));
        assert_eq!(species[1].id.as_deref(), Some("def"));
        assert!(species[1].settings.is_object());
    }

    #[test]
    fn log_event_keeps_fields() {
        let event: LogEvent = serde_json::from_value(json!({
            "_id": "l1",
            "log_type": "leaf.stdout_stderr",
            "raw": "booting"
        }))
        .unwrap();
        assert_eq!(event.id.as_deref(), Some("l1"));
        assert_eq!(event.log_type(), Some("leaf.stdout_stderr"));
        assert_eq!(event.str_field("raw"), Some("booting"));
        assert!(!event.fields.contains_key("_id"));
    }
}
