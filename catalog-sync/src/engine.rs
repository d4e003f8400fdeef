//! The synchronization driver.

use crate::api::CatalogApi;
use crate::cache::{CacheLoader, IdRemapCache};
use crate::config::TransformConfig;
use crate::dataset::Dataset;
use crate::error::SyncError;
use crate::kind::EntityKind;
use crate::materialize::{DeltaMaterializer, MaterializedDelta};
use crate::transformers::TransformerRegistry;

/// Result of one engine run.
///
/// Deltas computed before a failure stay valid; `failure` names the kind
/// that stopped the run, if any did.
#[derive(Debug)]
pub struct SyncReport {
    pub deltas: Vec<(EntityKind, MaterializedDelta)>,
    pub failure: Option<(EntityKind, SyncError)>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drives per-kind delta computation in dependency order: users, groups and
/// organizations before packages, so every ID-reference target is cached
/// before the referencing kind materializes. Resources are carried inside
/// package payloads.
pub struct SyncEngine<'a> {
    config: &'a TransformConfig,
    registry: &'a TransformerRegistry,
    src: &'a dyn CatalogApi,
    dest: &'a dyn CatalogApi,
}

impl<'a> SyncEngine<'a> {
    /// Build an engine, validating the configured transformer names up
    /// front so a bad name fails before anything is fetched.
    pub fn new(
        config: &'a TransformConfig,
        registry: &'a TransformerRegistry,
        src: &'a dyn CatalogApi,
        dest: &'a dyn CatalogApi,
    ) -> Result<SyncEngine<'a>, SyncError> {
        registry.validate(config)?;
        Ok(SyncEngine {
            config,
            registry,
            src,
            dest,
        })
    }

    /// Compute and materialize the delta for every kind, in order. Stops
    /// at the first fatal error but keeps what already succeeded.
    pub fn run(&self) -> SyncReport {
        let mut cache = IdRemapCache::new(CacheLoader::new(self.src, self.dest));
        let mut report = SyncReport {
            deltas: Vec::new(),
            failure: None,
        };
        for kind in EntityKind::SYNC_ORDER {
            match self.sync_kind(kind, &mut cache) {
                Ok(delta) => report.deltas.push((kind, delta)),
                Err(err) => {
                    log::error!("{kind}: {err}");
                    report.failure = Some((kind, err));
                    break;
                }
            }
        }
        report
    }

    /// One kind: snapshot both sides, compute the delta, materialize it.
    pub fn sync_kind(
        &self,
        kind: EntityKind,
        cache: &mut IdRemapCache<'_>,
    ) -> Result<MaterializedDelta, SyncError> {
        log::info!("processing {kind}");
        let src_dataset = Dataset::new(kind, self.src.list(kind)?);
        let dest_dataset = Dataset::new(kind, self.dest.list(kind)?);
        let delta = src_dataset.compute_delta(&dest_dataset, self.config, cache)?;
        DeltaMaterializer::new(self.config, self.registry)
            .materialize(&delta, &src_dataset, &dest_dataset, cache)
    }
}
