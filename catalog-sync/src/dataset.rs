//! Datasets: per-kind record collections and delta computation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::cache::IdRemapCache;
use crate::config::TransformConfig;
use crate::error::SyncError;
use crate::kind::{EntityKind, Origin};
use crate::record::Record;

/// The raw per-kind delta between a source and a destination dataset.
///
/// `adds` hold source projections ready to create, `deletes` hold
/// destination unique keys, and `updates` hold the raw source JSON keyed by
/// unique key. The asymmetry is deliberate: updates feed the materializer,
/// which re-projects them and decorates them with destination-side
/// auto-fields, while adds are created from scratch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    pub adds: Vec<Value>,
    pub deletes: Vec<String>,
    pub updates: BTreeMap<String, Value>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty() && self.updates.is_empty()
    }

    /// Number of records the delta touches.
    pub fn len(&self) -> usize {
        self.adds.len() + self.deletes.len() + self.updates.len()
    }
}

/// A collection of records of one kind from one instance.
///
/// The unique-key index is built lazily on first lookup; records are never
/// mutated after construction.
#[derive(Debug)]
pub struct Dataset {
    kind: EntityKind,
    records: Vec<Record>,
    index: OnceCell<HashMap<String, usize>>,
}

impl Dataset {
    /// Wrap raw API records.
    pub fn new(kind: EntityKind, records: Vec<Value>) -> Dataset {
        Dataset {
            kind,
            records: records.into_iter().map(|r| Record::new(kind, r)).collect(),
            index: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    fn index(&self, config: &TransformConfig) -> &HashMap<String, usize> {
        self.index.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.records.len());
            for (pos, record) in self.records.iter().enumerate() {
                match record.unique_key(config) {
                    Some(key) => {
                        index.insert(key, pos);
                    }
                    None => log::warn!(
                        "{} record without a '{}' value left out of the index",
                        self.kind,
                        config.unique_id_field(self.kind)
                    ),
                }
            }
            index
        })
    }

    /// Sorted set of unique-key values.
    pub fn unique_keys(&self, config: &TransformConfig) -> BTreeSet<String> {
        self.index(config).keys().cloned().collect()
    }

    /// Record by unique key.
    pub fn record(&self, key: &str, config: &TransformConfig) -> Option<&Record> {
        self.index(config).get(key).map(|pos| &self.records[*pos])
    }

    /// Whether two datasets carry the same user-populated content.
    pub fn same_content(
        &self,
        other: &Dataset,
        config: &TransformConfig,
    ) -> Result<bool, SyncError> {
        if self.kind != other.kind {
            return Err(SyncError::IncompatibleKinds {
                left: self.kind,
                right: other.kind,
            });
        }
        let keys = self.unique_keys(config);
        if keys != other.unique_keys(config) {
            return Ok(false);
        }
        for key in &keys {
            let (Some(left), Some(right)) = (self.record(key, config), other.record(key, config))
            else {
                return Ok(false);
            };
            if !left.equals(right, config)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compute the raw delta that would make `dest` match this dataset.
    ///
    /// Both sides are registered with the remap cache under their origin
    /// first, so later materialization can translate ID references. Keys on
    /// the kind's ignore list never appear in any bucket.
    pub fn compute_delta(
        &self,
        dest: &Dataset,
        config: &TransformConfig,
        cache: &mut IdRemapCache<'_>,
    ) -> Result<Delta, SyncError> {
        if self.kind != dest.kind {
            return Err(SyncError::IncompatibleKinds {
                left: self.kind,
                right: dest.kind,
            });
        }
        cache.add_dataset(self, Origin::Src, config);
        cache.add_dataset(dest, Origin::Dest, config);

        let ignore = config.ignore_list(self.kind);
        let src_keys = self.unique_keys(config);
        let dest_keys = dest.unique_keys(config);

        let mut delta = Delta::default();

        for key in dest_keys.difference(&src_keys) {
            if !ignore.contains(key) {
                delta.deletes.push(key.clone());
            }
        }

        for key in src_keys.difference(&dest_keys) {
            if ignore.contains(key) {
                continue;
            }
            if let Some(record) = self.record(key, config) {
                delta.adds.push(record.comparable(config));
            }
        }

        for key in src_keys.intersection(&dest_keys) {
            if ignore.contains(key) {
                continue;
            }
            let (Some(src_record), Some(dest_record)) =
                (self.record(key, config), dest.record(key, config))
            else {
                continue;
            };
            if !src_record.equals(dest_record, config)? {
                delta.updates.insert(key.clone(), src_record.json().clone());
            }
        }

        log::info!(
            "{}: {} adds, {} deletes, {} updates",
            self.kind,
            delta.adds.len(),
            delta.deletes.len(),
            delta.updates.len()
        );
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryCatalog;
    use crate::cache::CacheLoader;
    use crate::config::tests::sample_config;
    use serde_json::json;

    fn delta_between(src: Vec<Value>, dest: Vec<Value>) -> Delta {
        let config = sample_config();
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let mut cache = IdRemapCache::new(CacheLoader::new(&src_api, &dest_api));
        let src_set = Dataset::new(EntityKind::Users, src);
        let dest_set = Dataset::new(EntityKind::Users, dest);
        src_set.compute_delta(&dest_set, &config, &mut cache).unwrap()
    }

    #[test]
    fn test_identical_snapshots_yield_empty_delta() {
        let records = vec![json!({"name": "u1", "fullname": "A"})];
        let delta = delta_between(records.clone(), records);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_pure_add() {
        let delta = delta_between(
            vec![json!({"name": "u1"}), json!({"name": "u2"})],
            vec![json!({"name": "u1"})],
        );
        assert_eq!(delta.adds.len(), 1);
        assert_eq!(delta.adds[0]["name"], "u2");
        assert!(delta.deletes.is_empty());
        assert!(delta.updates.is_empty());
    }

    #[test]
    fn test_pure_delete() {
        let delta = delta_between(
            vec![json!({"name": "u1"})],
            vec![json!({"name": "u1"}), json!({"name": "u2"})],
        );
        assert_eq!(delta.deletes, vec!["u2".to_string()]);
        assert!(delta.adds.is_empty());
        assert!(delta.updates.is_empty());
    }

    #[test]
    fn test_ignored_key_never_surfaces() {
        // "admin" is on the users ignore list in every direction
        let delta = delta_between(vec![], vec![json!({"name": "admin"})]);
        assert!(delta.is_empty());

        let delta = delta_between(vec![json!({"name": "admin"})], vec![]);
        assert!(delta.is_empty());

        let delta = delta_between(
            vec![json!({"name": "admin", "fullname": "A"})],
            vec![json!({"name": "admin", "fullname": "B"})],
        );
        assert!(delta.is_empty());
    }

    #[test]
    fn test_update_only() {
        let delta = delta_between(
            vec![json!({"name": "u1", "fullname": "Picard"})],
            vec![json!({"name": "u1", "fullname": "Kirk"})],
        );
        assert!(delta.adds.is_empty());
        assert!(delta.deletes.is_empty());
        assert_eq!(delta.updates.len(), 1);
        // updates carry the raw source record
        assert_eq!(delta.updates["u1"], json!({"name": "u1", "fullname": "Picard"}));
    }

    #[test]
    fn test_delta_buckets_are_disjoint_and_complete() {
        let src = vec![
            json!({"name": "same", "fullname": "x"}),
            json!({"name": "changed", "fullname": "new"}),
            json!({"name": "fresh"}),
        ];
        let dest = vec![
            json!({"name": "same", "fullname": "x"}),
            json!({"name": "changed", "fullname": "old"}),
            json!({"name": "stale"}),
        ];
        let delta = delta_between(src, dest);

        let adds: BTreeSet<String> = delta
            .adds
            .iter()
            .map(|a| a["name"].as_str().unwrap().to_string())
            .collect();
        let deletes: BTreeSet<String> = delta.deletes.iter().cloned().collect();
        let updates: BTreeSet<String> = delta.updates.keys().cloned().collect();

        assert!(adds.is_disjoint(&deletes));
        assert!(adds.is_disjoint(&updates));
        assert!(deletes.is_disjoint(&updates));

        let mut touched: BTreeSet<String> = BTreeSet::new();
        touched.extend(adds);
        touched.extend(deletes);
        touched.extend(updates);
        touched.insert("same".to_string()); // the unchanged record
        let all: BTreeSet<String> =
            ["same", "changed", "fresh", "stale"].iter().map(|s| s.to_string()).collect();
        assert_eq!(touched, all);
    }

    #[test]
    fn test_permuted_list_field_is_not_an_update() {
        let config = sample_config();
        let src_api = InMemoryCatalog::new();
        let dest_api = InMemoryCatalog::new();
        let mut cache = IdRemapCache::new(CacheLoader::new(&src_api, &dest_api));

        let src = Dataset::new(
            EntityKind::Packages,
            vec![json!({
                "name": "pkg",
                "resources": [
                    {"name": "a", "url": "http://a", "format": "csv"},
                    {"name": "b", "url": "http://b", "format": "json"}
                ]
            })],
        );
        let dest = Dataset::new(
            EntityKind::Packages,
            vec![json!({
                "name": "pkg",
                "resources": [
                    {"name": "b", "url": "http://b", "format": "json"},
                    {"name": "a", "url": "http://a", "format": "csv"}
                ]
            })],
        );
        let delta = src.compute_delta(&dest, &config, &mut cache).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_same_content() {
        let config = sample_config();
        let records = vec![json!({"name": "u1", "fullname": "A", "about": null})];
        let left = Dataset::new(EntityKind::Users, records.clone());
        let right = Dataset::new(
            EntityKind::Users,
            vec![json!({"name": "u1", "fullname": "A", "about": ""})],
        );
        assert!(left.same_content(&right, &config).unwrap());

        let shorter = Dataset::new(EntityKind::Users, vec![]);
        assert!(!left.same_content(&shorter, &config).unwrap());

        let other_kind = Dataset::new(EntityKind::Groups, records);
        assert!(left.same_content(&other_kind, &config).is_err());
    }
}
