//! Records and their comparable projections.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::config::TransformConfig;
use crate::config::schema::FieldSchema;
use crate::diff::{DiffReport, diff};
use crate::error::SyncError;
use crate::kind::EntityKind;

/// One catalog record: an immutable JSON tree plus its kind tag.
///
/// Identity is the value of the kind's unique-key field. Equality is
/// evaluated over the comparable projection, never the raw payload, so
/// auto-generated fields and ignored embedded children never cause a
/// difference.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: EntityKind,
    json: Value,
}

impl Record {
    pub fn new(kind: EntityKind, json: Value) -> Record {
        Record { kind, json }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    /// Value of an arbitrary field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.json.get(name)
    }

    /// The record's identity under its kind's unique-key field.
    pub fn unique_key(&self, config: &TransformConfig) -> Option<String> {
        field_as_string(&self.json, config.unique_id_field(self.kind))
    }

    /// Whether this record's unique key sits in its kind's ignore list.
    pub fn is_ignored(&self, config: &TransformConfig) -> bool {
        match self.unique_key(config) {
            Some(key) => config.ignore_list(self.kind).contains(&key),
            None => false,
        }
    }

    /// The user-field projection: auto-generated fields dropped, fields the
    /// schema requires but the record lacks materialized as `null`.
    pub fn project(&self, config: &TransformConfig) -> Value {
        project_value(&self.json, config.user_fields(self.kind))
    }

    /// The comparable projection: user fields only, with embedded children
    /// on another kind's ignore list removed.
    pub fn comparable(&self, config: &TransformConfig) -> Value {
        let mut projected = self.project(config);
        strip_embedded_ignores(&mut projected, config, None);
        projected
    }

    /// Structural diff between two records' comparable projections.
    pub fn diff(&self, other: &Record, config: &TransformConfig) -> Result<DiffReport, SyncError> {
        if self.kind != other.kind {
            return Err(SyncError::IncompatibleKinds {
                left: self.kind,
                right: other.kind,
            });
        }
        Ok(diff(&self.comparable(config), &other.comparable(config)))
    }

    /// Relaxed equality: no differences under the empty-equivalence rule.
    pub fn equals(&self, other: &Record, config: &TransformConfig) -> Result<bool, SyncError> {
        Ok(self.diff(other, config)?.is_empty())
    }
}

/// Stringify an identifier-bearing field. Null and absent are "no value";
/// non-string scalars keep their JSON rendering.
pub(crate) fn field_as_string(record: &Value, field: &str) -> Option<String> {
    match record.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Apply a schema to a JSON value, keeping only the selected fields.
fn project_value(value: &Value, schema: &FieldSchema) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match schema {
        FieldSchema::Leaf(_) => value.clone(),
        FieldSchema::Object(fields) => {
            let mut out = Map::new();
            for (key, child) in fields {
                if matches!(child, FieldSchema::Leaf(false)) {
                    continue;
                }
                match value.get(key) {
                    Some(field_value) => {
                        out.insert(key.clone(), project_value(field_value, child));
                    }
                    None => {
                        // required by the schema but absent: align the shapes
                        log::debug!("field '{key}' missing from record, materializing null");
                        out.insert(key.clone(), Value::Null);
                    }
                }
            }
            Value::Object(out)
        }
        FieldSchema::ListOf(element) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| project_value(item, element))
                    .collect(),
            ),
            other => other.clone(),
        },
    }
}

/// Ignore-list context adopted once traversal enters a kind-named key.
#[derive(Clone, Copy)]
struct IgnoreScope<'a> {
    field: &'a str,
    list: &'a BTreeSet<String>,
}

/// Remove embedded children whose unique key is on their own kind's ignore
/// list. Entering a sub-object under a key that names a kind switches the
/// active ignore scope to that kind; removals from a list are deferred
/// until the whole list has been scanned.
fn strip_embedded_ignores(value: &mut Value, config: &TransformConfig, scope: Option<IgnoreScope<'_>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_scope = match EntityKind::parse(key) {
                    Some(kind) => Some(IgnoreScope {
                        field: config.unique_id_field(kind),
                        list: config.ignore_list(kind),
                    }),
                    None => scope,
                };
                strip_embedded_ignores(child, config, child_scope);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_embedded_ignores(item, config, scope);
            }
            if let Some(scope) = scope {
                items.retain(|item| match item.get(scope.field) {
                    Some(Value::String(key)) => !scope.list.contains(key),
                    _ => true,
                });
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use serde_json::json;

    #[test]
    fn test_projection_drops_auto_fields() {
        let config = sample_config();
        let record = Record::new(
            EntityKind::Users,
            json!({
                "id": "4f7e8a",
                "name": "u1",
                "email": "u1@example.com",
                "fullname": "User One",
                "about": "",
                "created": "2020-01-01T00:00:00"
            }),
        );
        let projection = record.project(&config);
        assert_eq!(
            projection,
            json!({
                "about": "",
                "email": "u1@example.com",
                "fullname": "User One",
                "name": "u1"
            })
        );
    }

    #[test]
    fn test_projection_materializes_missing_as_null() {
        let config = sample_config();
        let record = Record::new(EntityKind::Users, json!({"name": "u1"}));
        let projection = record.project(&config);
        assert_eq!(projection.get("fullname"), Some(&Value::Null));
        assert_eq!(projection.get("email"), Some(&Value::Null));
    }

    #[test]
    fn test_projection_is_idempotent() {
        let config = sample_config();
        let record = Record::new(
            EntityKind::Packages,
            json!({
                "id": "p-1",
                "name": "pkg",
                "title": "Package",
                "resources": [{"id": "r-1", "name": "file", "url": "http://x", "format": "csv"}]
            }),
        );
        let once = record.project(&config);
        let twice = Record::new(EntityKind::Packages, once.clone()).project(&config);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_projection_replays_list_schema() {
        let config = sample_config();
        let record = Record::new(
            EntityKind::Packages,
            json!({
                "name": "pkg",
                "resources": [
                    {"id": "r-1", "name": "a", "url": "http://a", "format": "csv"},
                    {"id": "r-2", "name": "b", "url": "http://b", "format": "json"}
                ]
            }),
        );
        let projection = record.project(&config);
        assert_eq!(
            projection["resources"],
            json!([
                {"format": "csv", "name": "a", "url": "http://a"},
                {"format": "json", "name": "b", "url": "http://b"}
            ])
        );
    }

    #[test]
    fn test_embedded_ignores_are_stripped() {
        let config = sample_config(); // users ignore list holds "admin"
        let record = Record::new(
            EntityKind::Organizations,
            json!({
                "name": "acme",
                "title": "Acme",
                "users": [
                    {"name": "admin", "capacity": "admin"},
                    {"name": "u1", "capacity": "editor"}
                ]
            }),
        );
        let comparable = record.comparable(&config);
        assert_eq!(comparable["users"], json!([{"capacity": "editor", "name": "u1"}]));
    }

    #[test]
    fn test_equals_ignores_empty_type_changes() {
        let config = sample_config();
        let left = Record::new(EntityKind::Users, json!({"name": "u1", "about": null}));
        let right = Record::new(EntityKind::Users, json!({"name": "u1", "about": ""}));
        assert!(left.equals(&right, &config).unwrap());
    }

    #[test]
    fn test_equals_detects_user_field_change() {
        let config = sample_config();
        let left = Record::new(EntityKind::Users, json!({"name": "u1", "fullname": "Picard"}));
        let right = Record::new(EntityKind::Users, json!({"name": "u1", "fullname": "Kirk"}));
        assert!(!left.equals(&right, &config).unwrap());
    }

    #[test]
    fn test_equals_rejects_mixed_kinds() {
        let config = sample_config();
        let user = Record::new(EntityKind::Users, json!({"name": "x"}));
        let group = Record::new(EntityKind::Groups, json!({"name": "x"}));
        assert!(matches!(
            user.equals(&group, &config),
            Err(SyncError::IncompatibleKinds { .. })
        ));
    }

    #[test]
    fn test_is_ignored() {
        let config = sample_config();
        let admin = Record::new(EntityKind::Users, json!({"name": "admin"}));
        let user = Record::new(EntityKind::Users, json!({"name": "u1"}));
        assert!(admin.is_ignored(&config));
        assert!(!user.is_ignored(&config));
    }
}
