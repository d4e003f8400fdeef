//! On-disk snapshots of catalog API responses.
//!
//! Snapshots let the engine run without touching the live APIs: each file
//! holds the raw list payload for one kind on one side, named
//! `<origin>_<kind>.json`. Development runs and dry runs read them through
//! [`SnapshotCatalog`], which implements the same trait a live HTTP
//! adapter would.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::api::{ApiResult, CatalogApi, record_matches_id};
use crate::error::ApiError;
use crate::kind::{EntityKind, Origin};

/// Directory of per-kind, per-origin JSON snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: PathBuf) -> std::io::Result<SnapshotStore> {
        if !dir.exists() {
            log::info!("creating snapshot directory {}", dir.display());
            fs::create_dir_all(&dir)?;
        }
        Ok(SnapshotStore { dir })
    }

    /// Default location under the platform cache directory.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("catalog-sync")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one snapshot file.
    pub fn path(&self, kind: EntityKind, origin: Origin) -> PathBuf {
        self.dir.join(format!("{origin}_{kind}.json"))
    }

    /// Read one snapshot's records.
    pub fn load(&self, kind: EntityKind, origin: Origin) -> ApiResult<Vec<Value>> {
        let path = self.path(kind, origin);
        let raw = fs::read_to_string(&path).map_err(|e| {
            ApiError::Adapter(format!("cannot read snapshot {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ApiError::Adapter(format!("snapshot {} is not a JSON list: {e}", path.display()))
        })
    }

    /// Write one snapshot's records.
    pub fn save(&self, kind: EntityKind, origin: Origin, records: &[Value]) -> ApiResult<()> {
        let path = self.path(kind, origin);
        let body = serde_json::to_string_pretty(records)
            .map_err(|e| ApiError::Adapter(e.to_string()))?;
        fs::write(&path, body).map_err(|e| {
            ApiError::Adapter(format!("cannot write snapshot {}: {e}", path.display()))
        })?;
        log::debug!("wrote {} {origin} {kind} records", records.len());
        Ok(())
    }
}

/// Catalog API adapter serving one origin's snapshot files.
pub struct SnapshotCatalog {
    store: SnapshotStore,
    origin: Origin,
}

impl SnapshotCatalog {
    pub fn new(store: SnapshotStore, origin: Origin) -> SnapshotCatalog {
        SnapshotCatalog { store, origin }
    }

    fn find(&self, kind: EntityKind, id: &str) -> ApiResult<Value> {
        let records = self.store.load(kind, self.origin)?;
        records
            .into_iter()
            .find(|record| record_matches_id(record, id))
            .ok_or_else(|| ApiError::NotFound {
                kind,
                id: id.to_string(),
            })
    }
}

impl CatalogApi for SnapshotCatalog {
    fn list_users(&self) -> ApiResult<Vec<Value>> {
        self.store.load(EntityKind::Users, self.origin)
    }

    fn list_groups(&self) -> ApiResult<Vec<Value>> {
        self.store.load(EntityKind::Groups, self.origin)
    }

    fn list_organizations(&self) -> ApiResult<Vec<Value>> {
        self.store.load(EntityKind::Organizations, self.origin)
    }

    fn list_packages(&self) -> ApiResult<Vec<Value>> {
        self.store.load(EntityKind::Packages, self.origin)
    }

    fn list_resources(&self) -> ApiResult<Vec<Value>> {
        self.store.load(EntityKind::Resources, self.origin)
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
