//! User-field schema trees.

use std::collections::BTreeMap;

use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;

/// Per-kind tree selecting which fields survive projection.
///
/// The tree mirrors the shape of the records it projects: a boolean leaf
/// keeps the value as-is, an object descends key by key, and a
/// single-element list applies its element schema to every element of a
/// list value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSchema {
    Leaf(bool),
    Object(BTreeMap<String, FieldSchema>),
    ListOf(Box<FieldSchema>),
}

impl FieldSchema {
    /// Build a schema from its JSON representation.
    pub fn from_value(value: &Value) -> Result<FieldSchema, String> {
        match value {
            Value::Bool(flag) => Ok(FieldSchema::Leaf(*flag)),
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (key, child) in map {
                    let schema = FieldSchema::from_value(child)
                        .map_err(|e| format!("under '{key}': {e}"))?;
                    fields.insert(key.clone(), schema);
                }
                Ok(FieldSchema::Object(fields))
            }
            Value::Array(items) => {
                if items.len() != 1 {
                    return Err(format!(
                        "a list schema must hold exactly one element schema, found {}",
                        items.len()
                    ));
                }
                Ok(FieldSchema::ListOf(Box::new(FieldSchema::from_value(
                    &items[0],
                )?)))
            }
            other => Err(format!("unsupported schema node: {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for FieldSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        FieldSchema::from_value(&value).map_err(de::Error::custom)
    }
}
