//! Name-dispatched payload fixups.
//!
//! Fixups cover quirks the schema machinery cannot express: enumerated
//! fields with deprecated members, sibling fields the destination API
//! insists on, and null-intolerant fields. Dispatch is a plain
//! `(kind, name)` table validated at startup, never reflection; add a new
//! transformer by extending [`TransformerRegistry::standard`].

use std::collections::HashMap;

use serde_json::Value;

use crate::config::TransformConfig;
use crate::error::SyncError;
use crate::kind::EntityKind;

/// A fixup applied to a kind's whole payload list during materialization.
pub type TransformerFn = fn(&mut [Value]);

/// Registry of custom transformers, keyed by `(kind, method name)`.
pub struct TransformerRegistry {
    table: HashMap<(EntityKind, &'static str), TransformerFn>,
}

impl TransformerRegistry {
    /// Registry with the built-in package transformers.
    pub fn standard() -> TransformerRegistry {
        let mut table: HashMap<(EntityKind, &'static str), TransformerFn> = HashMap::new();
        table.insert(
            (EntityKind::Packages, "fix_security_class"),
            fix_security_class as TransformerFn,
        );
        table.insert(
            (EntityKind::Packages, "fix_resource_status"),
            fix_resource_status as TransformerFn,
        );
        table.insert(
            (EntityKind::Packages, "fix_download_audience"),
            fix_download_audience as TransformerFn,
        );
        TransformerRegistry { table }
    }

    /// Registry without any transformers.
    pub fn empty() -> TransformerRegistry {
        TransformerRegistry {
            table: HashMap::new(),
        }
    }

    /// Verify every transformer name the config mentions resolves here.
    /// Unknown names fail fast before any delta is computed.
    pub fn validate(&self, config: &TransformConfig) -> Result<(), SyncError> {
        for kind in EntityKind::ALL {
            for name in config.transformer_names(kind) {
                if !self.table.contains_key(&(kind, name.as_str())) {
                    return Err(SyncError::ConfigInvalid(format!(
                        "custom transformer '{name}' configured for {kind} is not registered"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Run the named transformers over a payload list, in order.
    pub fn run(
        &self,
        kind: EntityKind,
        names: &[String],
        payloads: &mut [Value],
    ) -> Result<(), SyncError> {
        for name in names {
            let Some(transformer) = self.table.get(&(kind, name.as_str())) else {
                // validate() makes this unreachable in a running engine
                return Err(SyncError::ConfigInvalid(format!(
                    "custom transformer '{name}' for {kind} is not registered"
                )));
            };
            log::debug!(
                "running custom transformer '{name}' over {} {kind} payloads",
                payloads.len()
            );
            transformer(payloads);
        }
        Ok(())
    }
}

const VALID_SECURITY_CLASSES: [&str; 7] = [
    "HIGH-CABINET",
    "HIGH-CLASSIFIED",
    "HIGH-SENSITIVITY",
    "LOW-PUBLIC",
    "LOW-SENSITIVITY",
    "MEDIUM-PERSONAL",
    "MEDIUM-SENSITIVITY",
];

const VALID_DOWNLOAD_AUDIENCES: [&str; 3] = ["Government", "Named users", "Public"];

/// Sentinel far-future expiry for archived records without one.
const RETENTION_SENTINEL: &str = "2222-02-02";

/// Normalize `security_class` to the accepted enumeration. The deprecated
/// HIGH-CONFIDENTIAL maps to HIGH-CLASSIFIED; any other unknown class falls
/// back to HIGH-SENSITIVITY.
fn fix_security_class(payloads: &mut [Value]) {
    for payload in payloads.iter_mut() {
        let Some(object) = payload.as_object_mut() else {
            continue;
        };
        let Some(Value::String(class)) = object.get("security_class") else {
            continue;
        };
        if class.is_empty() || VALID_SECURITY_CLASSES.contains(&class.as_str()) {
            continue;
        }
        let fixed = if class == "HIGH-CONFIDENTIAL" {
            "HIGH-CLASSIFIED"
        } else {
            "HIGH-SENSITIVITY"
        };
        log::debug!("security_class '{class}' replaced with '{fixed}'");
        object.insert("security_class".to_string(), Value::String(fixed.to_string()));
    }
}

/// Records with `resource_status` = historicalArchive must carry a
/// `retention_expiry_date`.
fn fix_resource_status(payloads: &mut [Value]) {
    for payload in payloads.iter_mut() {
        let Some(object) = payload.as_object_mut() else {
            continue;
        };
        if object.get("resource_status").and_then(Value::as_str) == Some("historicalArchive")
            && !object.contains_key("retention_expiry_date")
        {
            object.insert(
                "retention_expiry_date".to_string(),
                Value::String(RETENTION_SENTINEL.to_string()),
            );
        }
    }
}

/// `download_audience` may not stay null; absent, null, or out-of-set
/// values become "Public".
fn fix_download_audience(payloads: &mut [Value]) {
    for payload in payloads.iter_mut() {
        let Some(object) = payload.as_object_mut() else {
            continue;
        };
        let needs_default = match object.get("download_audience") {
            None | Some(Value::Null) => true,
            Some(Value::String(audience)) => {
                !VALID_DOWNLOAD_AUDIENCES.contains(&audience.as_str())
            }
            Some(_) => true,
        };
        if needs_default {
            object.insert(
                "download_audience".to_string(),
                Value::String("Public".to_string()),
            );
        }
    }
}
