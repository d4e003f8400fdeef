//! Error types for the synchronization engine.

use crate::kind::EntityKind;

/// Errors surfaced by the engine.
#[derive(Debug)]
pub enum SyncError {
    /// The transformation config is malformed or inconsistent.
    ConfigInvalid(String),
    /// An ID reference could not be translated to the destination instance.
    RefIntegrity {
        field: String,
        kind: EntityKind,
        value: String,
    },
    /// Two records or datasets of different kinds were compared.
    IncompatibleKinds { left: EntityKind, right: EntityKind },
    /// A record expected to be present in a dataset was not found.
    MissingRecord { kind: EntityKind, key: String },
    /// A catalog API adapter failed.
    Api(ApiError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::ConfigInvalid(msg) => {
                write!(f, "invalid transformation config: {msg}")
            }
            SyncError::RefIntegrity { field, kind, value } => {
                write!(
                    f,
                    "cannot locate the corresponding value for '{field}' = '{value}' \
                     on either side of {kind}"
                )
            }
            SyncError::IncompatibleKinds { left, right } => {
                write!(f, "cannot compare {left} against {right}")
            }
            SyncError::MissingRecord { kind, key } => {
                write!(f, "no {kind} record with unique key '{key}'")
            }
            SyncError::Api(err) => write!(f, "catalog API error: {err}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        SyncError::Api(err)
    }
}

/// Errors returned by a catalog API adapter.
#[derive(Debug)]
pub enum ApiError {
    /// No record with the given identifier.
    NotFound { kind: EntityKind, id: String },
    /// Transport, decoding, or storage failure inside the adapter.
    Adapter(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound { kind, id } => {
                write!(f, "no {kind} record matches identifier '{id}'")
            }
            ApiError::Adapter(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApiError {}
