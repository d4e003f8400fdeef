//! Read access to a catalog instance's JSON API.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ApiError;
use crate::kind::EntityKind;

pub type ApiResult<T> = Result<T, ApiError>;

/// The read operations the engine needs from one catalog instance.
///
/// One implementation serves one instance; the engine holds an adapter per
/// origin. Every call is synchronous and returns complete JSON payloads —
/// retries, pagination, and authentication all live behind the adapter.
pub trait CatalogApi {
    fn list_users(&self) -> ApiResult<Vec<Value>>;
    fn list_groups(&self) -> ApiResult<Vec<Value>>;
    fn list_organizations(&self) -> ApiResult<Vec<Value>>;
    fn list_packages(&self) -> ApiResult<Vec<Value>>;
    fn list_resources(&self) -> ApiResult<Vec<Value>>;

    fn get_user(&self, id: &str) -> ApiResult<Value>;
    fn get_group(&self, id: &str) -> ApiResult<Value>;
    fn get_organization(&self, id: &str) -> ApiResult<Value>;
    fn get_package(&self, id: &str) -> ApiResult<Value>;
    fn get_resource(&self, id: &str) -> ApiResult<Value>;

    /// Whole-kind listing dispatched on the kind tag.
    fn list(&self, kind: EntityKind) -> ApiResult<Vec<Value>> {
        match kind {
            EntityKind::Users => self.list_users(),
            EntityKind::Groups => self.list_groups(),
            EntityKind::Organizations => self.list_organizations(),
            EntityKind::Packages => self.list_packages(),
            EntityKind::Resources => self.list_resources(),
        }
    }

    /// Single-record fetch dispatched on the kind tag. The identifier may
    /// be either the auto-generated or the user-authored unique id.
    fn get(&self, kind: EntityKind, id: &str) -> ApiResult<Value> {
        match kind {
            EntityKind::Users => self.get_user(id),
            EntityKind::Groups => self.get_group(id),
            EntityKind::Organizations => self.get_organization(id),
            EntityKind::Packages => self.get_package(id),
            EntityKind::Resources => self.get_resource(id),
        }
    }
}

/// True when a record's `id` or `name` field equals the identifier.
pub(crate) fn record_matches_id(record: &Value, id: &str) -> bool {
    ["id", "name"]
        .iter()
        .any(|field| record.get(*field).and_then(Value::as_str) == Some(id))
}

/// A catalog served from records already in memory.
///
/// Backs unit tests and dry runs. Single-record fetches match on either
/// the record's `id` or its `name`.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: HashMap<EntityKind, Vec<Value>>,
}

impl InMemoryCatalog {
    pub fn new() -> InMemoryCatalog {
        InMemoryCatalog::default()
    }

    /// Builder-style population of one kind.
    pub fn with_records(mut self, kind: EntityKind, records: Vec<Value>) -> InMemoryCatalog {
        self.insert(kind, records);
        self
    }

    pub fn insert(&mut self, kind: EntityKind, records: Vec<Value>) {
        self.records.entry(kind).or_default().extend(records);
    }

    fn kind_records(&self, kind: EntityKind) -> Vec<Value> {
        self.records.get(&kind).cloned().unwrap_or_default()
    }

    fn find(&self, kind: EntityKind, id: &str) -> ApiResult<Value> {
        self.records
            .get(&kind)
            .and_then(|records| records.iter().find(|r| record_matches_id(r, id)))
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                kind,
                id: id.to_string(),
            })
    }
}

impl CatalogApi for InMemoryCatalog {
    fn list_users(&self) -> ApiResult<Vec<Value>> {
        Ok(self.kind_records(EntityKind::Users))
    }

    fn list_groups(&self) -> ApiResult<Vec<Value>> {
        Ok(self.kind_records(EntityKind::Groups))
    }

    fn list_organizations(&self) -> ApiResult<Vec<Value>> {
        Ok(self.kind_records(EntityKind::Organizations))
    }

    fn list_packages(&self) -> ApiResult<Vec<Value>> {
        Ok(self.kind_records(EntityKind::Packages))
    }

    fn list_resources(&self) -> ApiResult<Vec<Value>> {
        Ok(self.kind_records(EntityKind::Resources))
    }

    fn get_user(&self, id: &str) -> ApiResult<Value> {
        self.find(EntityKind::Users, id)
    }

    fn get_group(&self, id: &str) -> ApiResult<Value> {
        self.find(EntityKind::Groups, id)
    }

    fn get_organization(&self, id: &str) -> ApiResult<Value> {
        self.find(EntityKind::Organizations, id)
    }

    fn get_package(&self, id: &str) -> ApiResult<Value> {
        self.find(EntityKind::Packages, id)
    }

    fn get_resource(&self, id: &str) -> ApiResult<Value> {
        self.find(EntityKind::Resources, id)
    }
}
