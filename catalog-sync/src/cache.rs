//! Cross-instance identifier remapping.
//!
//! Auto-generated identifiers differ between catalog instances, but
//! cross-entity references use them. The cache keeps, per configured field
//! mapping, a bidirectional lookup between auto values and user keys on
//! each side, so a source-side reference can be rewritten to the
//! destination's numbering in two table hits.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::api::CatalogApi;
use crate::config::TransformConfig;
use crate::dataset::Dataset;
use crate::error::{ApiError, SyncError};
use crate::kind::{EntityKind, Origin};
use crate::record::field_as_string;

/// Key into the flat lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    field: String,
    kind: EntityKind,
    origin: Origin,
    key: String,
}

impl CacheKey {
    fn new(field: &str, kind: EntityKind, origin: Origin, key: &str) -> CacheKey {
        CacheKey {
            field: field.to_string(),
            kind,
            origin,
            key: key.to_string(),
        }
    }
}

/// Glues the cache to the two catalog API adapters for lazy loads.
pub struct CacheLoader<'a> {
    src: &'a dyn CatalogApi,
    dest: &'a dyn CatalogApi,
}

impl<'a> CacheLoader<'a> {
    pub fn new(src: &'a dyn CatalogApi, dest: &'a dyn CatalogApi) -> CacheLoader<'a> {
        CacheLoader { src, dest }
    }

    fn api(&self, origin: Origin) -> &'a dyn CatalogApi {
        match origin {
            Origin::Src => self.src,
            Origin::Dest => self.dest,
        }
    }
}

/// Bidirectional `(auto field, kind, origin, key) → value` lookup tables.
///
/// On the source side the forward table maps auto values to user keys; on
/// the destination side it maps user keys to auto values. The reverse
/// table inverts each cell, giving O(1) lookups in either direction.
/// Entries arrive in bulk when a dataset registers, and one at a time when
/// a referenced record was absent from the bulk load.
pub struct IdRemapCache<'a> {
    forward: HashMap<CacheKey, String>,
    reverse: HashMap<CacheKey, String>,
    loaded: HashSet<(String, EntityKind, Origin)>,
    loader: CacheLoader<'a>,
}

impl<'a> IdRemapCache<'a> {
    pub fn new(loader: CacheLoader<'a>) -> IdRemapCache<'a> {
        IdRemapCache {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            loaded: HashSet::new(),
            loader,
        }
    }

    /// Bulk-register every configured field mapping of a dataset under its
    /// origin.
    pub fn add_dataset(&mut self, dataset: &Dataset, origin: Origin, config: &TransformConfig) {
        log::debug!(
            "caching auto/user unique id pairs for {} {} records",
            dataset.len(),
            dataset.kind()
        );
        for record in dataset.records() {
            self.insert_record(record.json(), dataset.kind(), origin, config);
        }
        self.mark_loaded(dataset.kind(), origin, config);
    }

    /// Bulk-register raw API records.
    pub fn add_raw_records(
        &mut self,
        records: &[Value],
        kind: EntityKind,
        origin: Origin,
        config: &TransformConfig,
    ) {
        for record in records {
            self.insert_record(record, kind, origin, config);
        }
        self.mark_loaded(kind, origin, config);
    }

    fn insert_record(
        &mut self,
        record: &Value,
        kind: EntityKind,
        origin: Origin,
        config: &TransformConfig,
    ) {
        for mapping in config.field_mappings(kind) {
            let auto = field_as_string(record, &mapping.auto_populated_field);
            let user = field_as_string(record, &mapping.user_populated_field);
            let (Some(auto), Some(user)) = (auto, user) else {
                log::debug!(
                    "{kind} record lacks '{}'/'{}' pair, not cached",
                    mapping.auto_populated_field,
                    mapping.user_populated_field
                );
                continue;
            };
            self.insert(&mapping.auto_populated_field, kind, origin, &auto, &user);
        }
    }

    fn insert(&mut self, field: &str, kind: EntityKind, origin: Origin, auto: &str, user: &str) {
        match origin {
            Origin::Src => {
                self.forward
                    .insert(CacheKey::new(field, kind, origin, auto), user.to_string());
                self.reverse
                    .insert(CacheKey::new(field, kind, origin, user), auto.to_string());
            }
            Origin::Dest => {
                self.forward
                    .insert(CacheKey::new(field, kind, origin, user), auto.to_string());
                self.reverse
                    .insert(CacheKey::new(field, kind, origin, auto), user.to_string());
            }
        }
    }

    fn mark_loaded(&mut self, kind: EntityKind, origin: Origin, config: &TransformConfig) {
        for mapping in config.field_mappings(kind) {
            self.loaded
                .insert((mapping.auto_populated_field.clone(), kind, origin));
        }
    }

    /// Fetch both instances' records for a kind unless already cached.
    fn ensure_loaded(
        &mut self,
        field: &str,
        kind: EntityKind,
        config: &TransformConfig,
    ) -> Result<(), SyncError> {
        for origin in Origin::BOTH {
            if self.loaded.contains(&(field.to_string(), kind, origin)) {
                continue;
            }
            log::debug!("loading {kind} records from {origin} for field '{field}'");
            let records = self.loader.api(origin).list(kind)?;
            self.add_raw_records(&records, kind, origin, config);
        }
        Ok(())
    }

    /// Translate a source auto-ID into the destination's auto-ID for the
    /// same record.
    ///
    /// Resolution runs source auto → user key → destination auto. A value
    /// that already is a source user key passes straight through the first
    /// step; a user key unknown on the destination triggers a single-record
    /// fetch before giving up.
    pub fn src_to_dest(
        &mut self,
        field: &str,
        kind: EntityKind,
        src_auto: &str,
        config: &TransformConfig,
    ) -> Result<String, SyncError> {
        self.ensure_loaded(field, kind, config)?;

        let user_key = match self
            .forward
            .get(&CacheKey::new(field, kind, Origin::Src, src_auto))
        {
            Some(user) => user.clone(),
            None if self
                .reverse
                .contains_key(&CacheKey::new(field, kind, Origin::Src, src_auto)) =>
            {
                src_auto.to_string()
            }
            None => {
                log::error!(
                    "'{field}' value '{src_auto}' is unknown on either side of {kind}"
                );
                return Err(SyncError::RefIntegrity {
                    field: field.to_string(),
                    kind,
                    value: src_auto.to_string(),
                });
            }
        };

        let dest_key = CacheKey::new(field, kind, Origin::Dest, &user_key);
        if !self.forward.contains_key(&dest_key) {
            match self.loader.api(Origin::Dest).get(kind, &user_key) {
                Ok(record) => self.insert_record(&record, kind, Origin::Dest, config),
                Err(ApiError::NotFound { .. }) => {
                    log::debug!("'{user_key}' not found on the destination {kind} endpoint");
                }
                Err(err) => return Err(SyncError::Api(err)),
            }
        }
        match self.forward.get(&dest_key) {
            Some(dest_auto) => Ok(dest_auto.clone()),
            None => {
                log::error!(
                    "destination has no {kind} record for user key '{user_key}' ('{field}')"
                );
                Err(SyncError::RefIntegrity {
                    field: field.to_string(),
                    kind,
                    value: user_key,
                })
            }
        }
    }

    /// Whether an auto value is already a known destination identifier.
    /// Never triggers a load.
    pub fn is_auto_value_in_dest(&self, field: &str, kind: EntityKind, value: &str) -> bool {
        self.reverse
            .contains_key(&CacheKey::new(field, kind, Origin::Dest, value))
    }

    /// Whether an auto value is a known source identifier. Never triggers
    /// a load.
    pub fn is_auto_value_in_src(&self, field: &str, kind: EntityKind, value: &str) -> bool {
        self.forward
            .contains_key(&CacheKey::new(field, kind, Origin::Src, value))
    }

    /// User key recorded for an auto value on one origin, if cached.
    pub fn user_key_for(
        &self,
        field: &str,
        kind: EntityKind,
        origin: Origin,
        auto_value: &str,
    ) -> Option<&str> {
        let table = match origin {
            Origin::Src => &self.forward,
            Origin::Dest => &self.reverse,
        };
        table
            .get(&CacheKey::new(field, kind, origin, auto_value))
            .map(String::as_str)
    }
}
