//! Differential synchronization of user-authored state between two
//! instances of an open-data catalog.
//!
//! A catalog exposes five entity kinds over a JSON API: users, groups,
//! organizations, packages and resources. Every record mixes
//! user-populated fields (authoritative for equality) with auto-generated
//! ones (IDs, timestamps, revisions) that differ between instances. This
//! crate reproduces the source instance's user-populated state on a
//! destination instance:
//!
//! 1. a schema-driven projection reduces records to their user fields
//!    ([`record`]),
//! 2. an order-insensitive structural diff decides equality ([`diff`]),
//! 3. per-kind datasets turn two snapshots into `(adds, deletes, updates)`
//!    triples ([`dataset`]),
//! 4. a lazily populated bidirectional cache translates auto-IDs between
//!    instances ([`cache`]),
//! 5. a materializer rewrites each delta into payloads the destination API
//!    accepts ([`materialize`], [`transformers`]).
//!
//! The [`engine`] drives the kinds in dependency order; the [`api`] trait
//! and the [`snapshot`] store are the only ways data enters the system.

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod diff;
pub mod engine;
pub mod error;
pub mod kind;
pub mod materialize;
pub mod record;
pub mod snapshot;
pub mod transformers;

pub use api::{ApiResult, CatalogApi, InMemoryCatalog};
pub use cache::{CacheLoader, IdRemapCache};
pub use config::schema::FieldSchema;
pub use config::{FieldMapping, IdFieldRule, KindConfig, TransformConfig};
pub use dataset::{Dataset, Delta};
pub use diff::{DiffEntry, DiffReport, diff};
pub use engine::{SyncEngine, SyncReport};
pub use error::{ApiError, SyncError};
pub use kind::{EntityKind, Origin};
pub use materialize::{DeltaMaterializer, MaterializedDelta};
pub use record::Record;
pub use snapshot::{SnapshotCatalog, SnapshotStore};
pub use transformers::{TransformerFn, TransformerRegistry};
