//! Transformation configuration: per-kind schemas and rewrite rules.
//!
//! The config file is a JSON document keyed by entity kind. Each kind's
//! entry describes which fields are user-populated, how records are
//! identified, which records are never synchronized, and the rewrites that
//! make a payload acceptable to the destination instance.

pub mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::kind::EntityKind;
use schema::FieldSchema;

/// One `(auto field, user field)` pair enabling cross-instance ID
/// translation for a kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldMapping {
    pub auto_populated_field: String,
    pub user_populated_field: String,
}

/// Marks `property` as holding an auto-ID of `obj_type`'s `obj_field`,
/// which must be remapped to destination numbering during materialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdFieldRule {
    pub property: String,
    pub obj_type: EntityKind,
    pub obj_field: String,
}

/// Everything the config knows about one entity kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KindConfig {
    pub user_populated_fields: FieldSchema,
    pub unique_id_field: String,
    #[serde(default)]
    pub ignore_list: BTreeSet<String>,
    #[serde(default)]
    pub field_mapping: Vec<FieldMapping>,
    #[serde(default)]
    pub required_default_values: serde_json::Map<String, Value>,
    /// Field name to a canonical empty value whose runtime type dictates the
    /// expected type.
    #[serde(default)]
    pub type_enforcement: serde_json::Map<String, Value>,
    #[serde(default)]
    pub id_fields: Vec<IdFieldRule>,
    /// Auto-fields copied from the source record when creating.
    #[serde(default)]
    pub fields_to_include_on_add: Vec<String>,
    /// Auto-fields copied from the destination record when updating.
    #[serde(default)]
    pub fields_to_include_on_update: Vec<String>,
    /// Custom transformer names, run in order at materialization.
    #[serde(default)]
    pub custom_transformation_method: Vec<String>,
}

/// Parsed transformation config, loaded once and queried per kind.
///
/// Construction validates that every kind has an entry, so the per-kind
/// queries are total.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    kinds: BTreeMap<EntityKind, KindConfig>,
}

impl TransformConfig {
    /// Parse and validate a config from its JSON value.
    pub fn from_value(value: Value) -> Result<TransformConfig, SyncError> {
        let kinds: BTreeMap<EntityKind, KindConfig> = serde_json::from_value(value)
            .map_err(|e| SyncError::ConfigInvalid(e.to_string()))?;
        for kind in EntityKind::ALL {
            if !kinds.contains_key(&kind) {
                return Err(SyncError::ConfigInvalid(format!(
                    "missing entry for kind '{kind}'"
                )));
            }
        }
        Ok(TransformConfig { kinds })
    }

    /// Load a config from a JSON file.
    pub fn from_path(path: &Path) -> Result<TransformConfig, SyncError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SyncError::ConfigInvalid(format!("cannot read {}: {e}", path.display()))
        })?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            SyncError::ConfigInvalid(format!("{} is not valid JSON: {e}", path.display()))
        })?;
        TransformConfig::from_value(value)
    }

    /// The full entry for one kind.
    pub fn kind(&self, kind: EntityKind) -> &KindConfig {
        &self.kinds[&kind]
    }

    /// The user-field schema tree for a kind.
    pub fn user_fields(&self, kind: EntityKind) -> &FieldSchema {
        &self.kind(kind).user_populated_fields
    }

    /// The field whose value identifies a record within its kind.
    pub fn unique_id_field(&self, kind: EntityKind) -> &str {
        &self.kind(kind).unique_id_field
    }

    /// Unique-key values never synchronized for a kind.
    pub fn ignore_list(&self, kind: EntityKind) -> &BTreeSet<String> {
        &self.kind(kind).ignore_list
    }

    pub fn field_mappings(&self, kind: EntityKind) -> &[FieldMapping] {
        &self.kind(kind).field_mapping
    }

    pub fn default_values(&self, kind: EntityKind) -> &serde_json::Map<String, Value> {
        &self.kind(kind).required_default_values
    }

    pub fn type_enforcement(&self, kind: EntityKind) -> &serde_json::Map<String, Value> {
        &self.kind(kind).type_enforcement
    }

    pub fn id_field_rules(&self, kind: EntityKind) -> &[IdFieldRule] {
        &self.kind(kind).id_fields
    }

    pub fn add_auto_fields(&self, kind: EntityKind) -> &[String] {
        &self.kind(kind).fields_to_include_on_add
    }

    pub fn update_auto_fields(&self, kind: EntityKind) -> &[String] {
        &self.kind(kind).fields_to_include_on_update
    }

    pub fn transformer_names(&self, kind: EntityKind) -> &[String] {
        &self.kind(kind).custom_transformation_method
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// A small but complete config used by tests across the crate.
    pub(crate) fn sample_config() -> TransformConfig {
        TransformConfig::from_value(sample_config_value()).unwrap()
    }

    fn sample_config_value() -> Value {
        json!({
            "users": {
                "user_populated_fields": {
                    "name": true,
                    "email": true,
                    "fullname": true,
                    "about": true
                },
                "unique_id_field": "name",
                "ignore_list": ["admin"],
                "field_mapping": [
                    {"auto_populated_field": "id", "user_populated_field": "name"}
                ]
            },
            "groups": {
                "user_populated_fields": {
                    "name": true,
                    "title": true,
                    "description": true,
                    "users": [{"name": true, "capacity": true}]
                },
                "unique_id_field": "name",
                "field_mapping": [
                    {"auto_populated_field": "id", "user_populated_field": "name"}
                ]
            },
            "organizations": {
                "user_populated_fields": {
                    "name": true,
                    "title": true,
                    "description": true,
                    "users": [{"name": true, "capacity": true}]
                },
                "unique_id_field": "name",
                "field_mapping": [
                    {"auto_populated_field": "id", "user_populated_field": "name"}
                ]
            },
            "packages": {
                "user_populated_fields": {
                    "name": true,
                    "title": true,
                    "notes": true,
                    "owner_org": true,
                    "security_class": true,
                    "download_audience": true,
                    "resource_status": true,
                    "more_info": true,
                    "resources": [{"name": true, "url": true, "format": true}]
                },
                "unique_id_field": "name",
                "field_mapping": [
                    {"auto_populated_field": "id", "user_populated_field": "name"}
                ],
                "required_default_values": {"type": "Dataset"},
                "type_enforcement": {"more_info": []},
                "id_fields": [
                    {"property": "owner_org", "obj_type": "organizations", "obj_field": "id"}
                ],
                "fields_to_include_on_update": ["id"],
                "custom_transformation_method": [
                    "fix_security_class",
                    "fix_resource_status",
                    "fix_download_audience"
                ]
            },
            "resources": {
                "user_populated_fields": {
                    "name": true,
                    "url": true,
                    "format": true
                },
                "unique_id_field": "name",
                "field_mapping": [
                    {"auto_populated_field": "id", "user_populated_field": "name"}
                ]
            }
        })
    }

    #[test]
    fn test_sample_config_queries() {
        let config = sample_config();
        assert_eq!(config.unique_id_field(EntityKind::Users), "name");
        assert!(config.ignore_list(EntityKind::Users).contains("admin"));
        assert_eq!(config.field_mappings(EntityKind::Packages).len(), 1);
        assert_eq!(config.id_field_rules(EntityKind::Packages)[0].property, "owner_org");
        assert_eq!(config.transformer_names(EntityKind::Packages).len(), 3);
        assert!(config.transformer_names(EntityKind::Users).is_empty());
    }

    #[test]
    fn test_missing_kind_is_invalid() {
        let result = TransformConfig::from_value(json!({
            "users": {
                "user_populated_fields": {"name": true},
                "unique_id_field": "name"
            }
        }));
        assert!(matches!(result, Err(SyncError::ConfigInvalid(_))));
    }

    #[test]
    fn test_unknown_kind_is_invalid() {
        let mut value = sample_config_value();
        value["datasets"] = json!({
            "user_populated_fields": {"name": true},
            "unique_id_field": "name"
        });
        assert!(matches!(
            TransformConfig::from_value(value),
            Err(SyncError::ConfigInvalid(_))
        ));
    }
}
