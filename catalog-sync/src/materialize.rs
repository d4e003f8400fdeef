//! Turning raw deltas into instance-ready payloads.
//!
//! A raw delta only says *what* changed. Before the destination API will
//! accept a record, the payload needs the right auto-fields injected,
//! required defaults filled, value types normalized, ID references
//! translated to destination numbering, and the kind's custom fixups
//! applied — in that order, since remapping expects defaults in place.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::IdRemapCache;
use crate::config::TransformConfig;
use crate::dataset::{Dataset, Delta};
use crate::diff::{is_empty_equivalent, json_type};
use crate::error::SyncError;
use crate::kind::EntityKind;
use crate::record::{Record, field_as_string};
use crate::transformers::TransformerRegistry;

/// Wire-ready payloads for one kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterializedDelta {
    pub adds: Vec<Value>,
    pub deletes: Vec<String>,
    pub updates: BTreeMap<String, Value>,
}

impl MaterializedDelta {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty() && self.updates.is_empty()
    }
}

/// Rewrites raw delta output into payloads the destination API accepts.
pub struct DeltaMaterializer<'a> {
    config: &'a TransformConfig,
    registry: &'a TransformerRegistry,
}

impl<'a> DeltaMaterializer<'a> {
    pub fn new(config: &'a TransformConfig, registry: &'a TransformerRegistry) -> Self {
        DeltaMaterializer { config, registry }
    }

    /// Materialize a raw delta. `src` and `dest` are the datasets the
    /// delta was computed from: auto-fields for adds come from the source
    /// side (the destination does not have those records yet), auto-fields
    /// for updates come from the destination side (IDs and revision
    /// numbers must survive). Deletes pass through untouched.
    pub fn materialize(
        &self,
        delta: &Delta,
        src: &Dataset,
        dest: &Dataset,
        cache: &mut IdRemapCache<'_>,
    ) -> Result<MaterializedDelta, SyncError> {
        let kind = src.kind();
        let transformer_names = self.config.transformer_names(kind);

        let mut adds = Vec::with_capacity(delta.adds.len());
        for projection in &delta.adds {
            let mut payload = Record::new(kind, projection.clone()).project(self.config);
            self.inject_auto_fields(&mut payload, kind, src, self.config.add_auto_fields(kind))?;
            self.fill_defaults(&mut payload, kind);
            self.enforce_types(&mut payload, kind);
            self.remap_id_fields(&mut payload, kind, cache)?;
            adds.push(payload);
        }
        self.registry.run(kind, transformer_names, &mut adds)?;

        let mut update_keys = Vec::with_capacity(delta.updates.len());
        let mut update_payloads = Vec::with_capacity(delta.updates.len());
        for (key, raw) in &delta.updates {
            let mut payload = Record::new(kind, raw.clone()).project(self.config);
            self.inject_auto_fields(
                &mut payload,
                kind,
                dest,
                self.config.update_auto_fields(kind),
            )?;
            self.fill_defaults(&mut payload, kind);
            self.enforce_types(&mut payload, kind);
            self.remap_id_fields(&mut payload, kind, cache)?;
            update_keys.push(key.clone());
            update_payloads.push(payload);
        }
        self.registry.run(kind, transformer_names, &mut update_payloads)?;

        Ok(MaterializedDelta {
            adds,
            deletes: delta.deletes.clone(),
            updates: update_keys.into_iter().zip(update_payloads).collect(),
        })
    }

    /// Copy the configured auto-fields from the record on `side` that
    /// shares the payload's unique key. A field missing on that side heals
    /// to null.
    fn inject_auto_fields(
        &self,
        payload: &mut Value,
        kind: EntityKind,
        side: &Dataset,
        fields: &[String],
    ) -> Result<(), SyncError> {
        if fields.is_empty() {
            return Ok(());
        }
        let unique_field = self.config.unique_id_field(kind);
        let Some(key) = field_as_string(payload, unique_field) else {
            return Err(SyncError::MissingRecord {
                kind,
                key: format!("(payload without '{unique_field}')"),
            });
        };
        let record = side
            .record(&key, self.config)
            .ok_or_else(|| SyncError::MissingRecord {
                kind,
                key: key.clone(),
            })?;
        if let Value::Object(object) = payload {
            for field in fields {
                let value = record.field(field).cloned().unwrap_or(Value::Null);
                object.insert(field.clone(), value);
            }
        }
        Ok(())
    }

    fn fill_defaults(&self, payload: &mut Value, kind: EntityKind) {
        for (field, default) in self.config.default_values(kind) {
            populate_field(payload, field, default);
        }
    }

    /// Replace empty mistyped values with the canonical empty of the
    /// expected type; warn and keep anything non-empty.
    fn enforce_types(&self, payload: &mut Value, kind: EntityKind) {
        let Value::Object(object) = payload else {
            return;
        };
        for (field, canonical) in self.config.type_enforcement(kind) {
            let Some(value) = object.get_mut(field) else {
                continue;
            };
            if json_type(value) == json_type(canonical) {
                continue;
            }
            if is_empty_equivalent(value) {
                log::info!("coercing empty '{field}' to an empty {}", json_type(canonical));
                *value = canonical.clone();
            } else {
                log::warn!(
                    "field '{field}' holds a {} but the config expects a {}; \
                     value left in place for manual review: {value}",
                    json_type(value),
                    json_type(canonical)
                );
            }
        }
    }

    /// Rewrite every configured ID reference to destination numbering.
    /// References already known on the destination stay untouched; absent
    /// or null references are nothing to remap.
    fn remap_id_fields(
        &self,
        payload: &mut Value,
        kind: EntityKind,
        cache: &mut IdRemapCache<'_>,
    ) -> Result<(), SyncError> {
        for rule in self.config.id_field_rules(kind) {
            let current = match payload.get(&rule.property) {
                Some(Value::String(value)) => value.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => {
                    log::warn!(
                        "id field '{}' holds a non-string value, not remapped: {other}",
                        rule.property
                    );
                    continue;
                }
            };
            if cache.is_auto_value_in_dest(&rule.obj_field, rule.obj_type, &current) {
                continue;
            }
            let remapped =
                cache.src_to_dest(&rule.obj_field, rule.obj_type, &current, self.config)?;
            log::debug!("remapped '{}' from {current} to {remapped}", rule.property);
            if let Some(slot) = payload.get_mut(&rule.property) {
                *slot = Value::String(remapped);
            }
        }
        Ok(())
    }
}

/// Ensure `field` exists on `target` with the shape of `default`.
///
/// A primitive default fills in when the field is absent. A list default
/// guarantees the field is a list with at least one element carrying the
/// listed keys, and appends missing primitive members. An object default
/// descends key by key.
fn populate_field(target: &mut Value, field: &str, default: &Value) {
    let Value::Object(object) = target else {
        return;
    };
    match default {
        Value::Array(defaults) => {
            let entry = object
                .entry(field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = entry else {
                return;
            };
            if items.is_empty() && defaults.iter().any(Value::is_object) {
                items.push(Value::Object(Map::new()));
            }
            for element_default in defaults {
                match element_default {
                    Value::Object(keys) => {
                        for item in items.iter_mut() {
                            for (key, value) in keys {
                                populate_field(item, key, value);
                            }
                        }
                    }
                    primitive => {
                        if !items.contains(primitive) {
                            items.push(primitive.clone());
                        }
                    }
                }
            }
        }
        Value::Object(keys) => {
            let entry = object
                .entry(field.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            for (key, value) in keys {
                populate_field(entry, key, value);
            }
        }
        primitive => {
            if !object.contains_key(field) {
                object.insert(field.to_string(), primitive.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryCatalog;
    use crate::cache::CacheLoader;
    use crate::config::tests::sample_config;
    use serde_json::json;

    fn materialize_packages(
        src_records: Vec<Value>,
        dest_records: Vec<Value>,
        src_api: &InMemoryCatalog,
        dest_api: &InMemoryCatalog,
    ) -> MaterializedDelta {
        let config = sample_config();
        let registry = TransformerRegistry::standard();
        let mut cache = IdRemapCache::new(CacheLoader::new(src_api, dest_api));
        let src = Dataset::new(EntityKind::Packages, src_records);
        let dest = Dataset::new(EntityKind::Packages, dest_records);
        let delta = src.compute_delta(&dest, &config, &mut cache).unwrap();
        DeltaMaterializer::new(&config, &registry)
            .materialize(&delta, &src, &dest, &mut cache)
            .unwrap()
    }

    fn org(id: &str, name: &str) -> Value {
        json!({"id": id, "name": name, "title": name})
    }

    #[test]
    fn test_add_remaps_owner_org() {
        let src_api = InMemoryCatalog::new()
            .with_records(EntityKind::Organizations, vec![org("A-SRC", "acme")]);
        let dest_api = InMemoryCatalog::new()
            .with_records(EntityKind::Organizations, vec![org("A-DEST", "acme")]);

        let materialized = materialize_packages(
            vec![json!({"name": "pkg", "title": "P", "owner_org": "A-SRC"})],
            vec![],
            &src_api,
            &dest_api,
        );
        assert_eq!(materialized.adds.len(), 1);
        assert_eq!(materialized.adds[0]["owner_org"], "A-DEST");
    }

    #[test]
    fn test_unmappable_reference_aborts_delta() {
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let config = sample_config();
        let registry = TransformerRegistry::standard();
        let mut cache = IdRemapCache::new(CacheLoader::new(&src_api, &dest_api));
        let src = Dataset::new(
            EntityKind::Packages,
            vec![json!({"name": "pkg", "owner_org": "GHOST"})],
        );
        let dest = Dataset::new(EntityKind::Packages, vec![]);
        let delta = src.compute_delta(&dest, &config, &mut cache).unwrap();
        let result = DeltaMaterializer::new(&config, &registry)
            .materialize(&delta, &src, &dest, &mut cache);
        assert!(matches!(result, Err(SyncError::RefIntegrity { .. })));
    }

    #[test]
    fn test_add_runs_custom_transformers() {
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let materialized = materialize_packages(
            vec![json!({"name": "pkg", "resource_status": "historicalArchive"})],
            vec![],
            &src_api,
            &dest_api,
        );
        assert_eq!(materialized.adds[0]["retention_expiry_date"], "2222-02-02");
        assert_eq!(materialized.adds[0]["download_audience"], "Public");
    }

    #[test]
    fn test_add_fills_defaults_and_coerces_empty_types() {
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let materialized = materialize_packages(
            vec![json!({"name": "pkg", "more_info": ""})],
            vec![],
            &src_api,
            &dest_api,
        );
        let add = &materialized.adds[0];
        // "type" comes from required_default_values
        assert_eq!(add["type"], "Dataset");
        // empty string mistyped against [] coerces to the canonical empty
        assert_eq!(add["more_info"], json!([]));
    }

    #[test]
    fn test_nonempty_mistyped_value_is_left_alone() {
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let materialized = materialize_packages(
            vec![json!({"name": "pkg", "more_info": "see elsewhere"})],
            vec![],
            &src_api,
            &dest_api,
        );
        assert_eq!(materialized.adds[0]["more_info"], "see elsewhere");
    }

    #[test]
    fn test_update_carries_dest_auto_fields() {
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let materialized = materialize_packages(
            vec![json!({"id": "SRC-ID", "name": "pkg", "title": "New title"})],
            vec![json!({"id": "DEST-ID", "name": "pkg", "title": "Old title"})],
            &src_api,
            &dest_api,
        );
        assert!(materialized.adds.is_empty());
        let update = &materialized.updates["pkg"];
        // user content from the source, identity from the destination
        assert_eq!(update["title"], "New title");
        assert_eq!(update["id"], "DEST-ID");
    }

    #[test]
    fn test_deletes_pass_through() {
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let materialized = materialize_packages(
            vec![],
            vec![json!({"id": "X", "name": "obsolete"})],
            &src_api,
            &dest_api,
        );
        assert_eq!(materialized.deletes, vec!["obsolete".to_string()]);
    }

    #[test]
    fn test_populate_field_primitive() {
        let mut payload = json!({"name": "pkg"});
        populate_field(&mut payload, "state", &json!("active"));
        populate_field(&mut payload, "name", &json!("other"));
        assert_eq!(payload["state"], "active");
        assert_eq!(payload["name"], "pkg");
    }

    #[test]
    fn test_populate_field_list_of_dict() {
        let mut payload = json!({"name": "pkg"});
        populate_field(
            &mut payload,
            "contacts",
            &json!([{"name": "", "email": ""}]),
        );
        assert_eq!(payload["contacts"], json!([{"email": "", "name": ""}]));

        // existing elements gain the listed keys without losing their own
        let mut payload = json!({"contacts": [{"name": "someone"}]});
        populate_field(
            &mut payload,
            "contacts",
            &json!([{"name": "", "email": ""}]),
        );
        assert_eq!(
            payload["contacts"],
            json!([{"email": "", "name": "someone"}])
        );
    }

    #[test]
    fn test_populate_field_nested_object() {
        let mut payload = json!({});
        populate_field(&mut payload, "details", &json!({"license": "open", "tier": 1}));
        assert_eq!(payload["details"], json!({"license": "open", "tier": 1}));

        let mut payload = json!({"details": {"tier": 3}});
        populate_field(&mut payload, "details", &json!({"license": "open", "tier": 1}));
        assert_eq!(payload["details"], json!({"license": "open", "tier": 3}));
    }
}
