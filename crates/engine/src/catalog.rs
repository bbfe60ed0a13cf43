//! Catalog feeds.
//!
//! A feed hands the engine the full list of tracked objects once per cycle.
//! Individual records that cannot be decoded are not fatal: they come back as
//! [`TrackedObject::unparsed`] placeholders so they still count toward raw
//! totals. Only an unreadable or structurally invalid document fails a fetch.

use orbitwatch_core::TrackedObject;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Catalog fetch errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected catalog layout: {0}")]
    Format(String),
}

/// Source of tracked objects, read once at the start of every cycle
pub trait CatalogSource: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<Vec<TrackedObject>, CatalogError>;
}

/// Decode a catalog document.
///
/// Accepts either a top-level array of records or an object with an
/// `objects` array.
pub fn parse_catalog(json: &str) -> Result<Vec<TrackedObject>, CatalogError> {
    let document: Value = serde_json::from_str(json)?;
    let records = match document {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("objects") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(CatalogError::Format(
                    "expected an `objects` array".to_string(),
                ))
            }
        },
        _ => {
            return Err(CatalogError::Format(
                "expected an array of records".to_string(),
            ))
        }
    };

    let mut malformed = 0usize;
    let objects: Vec<TrackedObject> = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let id = record_id(&record, index);
            match serde_json::from_value::<TrackedObject>(record) {
                Ok(object) => object,
                Err(e) => {
                    malformed += 1;
                    warn!(object_id = %id, index, error = %e, "Malformed catalog record");
                    TrackedObject::unparsed(id)
                }
            }
        })
        .collect();

    debug!(records = objects.len(), malformed, "Catalog decoded");
    Ok(objects)
}

/// Best-effort id for a record that may not decode.
fn record_id(record: &Value, index: usize) -> String {
    match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("record-{index}"),
    }
}

/// Catalog stored as a JSON file, re-read on every fetch
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonFileCatalog {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    fn fetch(&self) -> Result<Vec<TrackedObject>, CatalogError> {
        let json = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_catalog(&json)
    }
}

/// In-memory catalog. The object list can be swapped between cycles.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    objects: RwLock<Vec<TrackedObject>>,
}

impl StaticCatalog {
    pub fn new(objects: Vec<TrackedObject>) -> Self {
        Self {
            objects: RwLock::new(objects),
        }
    }

    /// Replace the catalog served by the next fetch.
    pub fn replace(&self, objects: Vec<TrackedObject>) {
        *self.objects.write().unwrap_or_else(PoisonError::into_inner) = objects;
    }
}

impl CatalogSource for StaticCatalog {
    fn describe(&self) -> String {
        "static".to_string()
    }

    fn fetch(&self) -> Result<Vec<TrackedObject>, CatalogError> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitwatch_core::{ObjectType, OrbitState};

    const CATALOG: &str = r#"[
        {
            "id": "25544",
            "object_type": "payload",
            "epoch_s": 1700000000.0,
            "active": true,
            "state": {
                "kind": "keplerian",
                "semi_major_axis_km": 6798.0,
                "eccentricity": 0.0005,
                "inclination_rad": 0.9012,
                "raan_rad": 1.0,
                "arg_perigee_rad": 0.5,
                "mean_anomaly_rad": 2.0
            }
        },
        {
            "id": "99001",
            "object_type": "DEBRIS",
            "state": {
                "kind": "cartesian",
                "position_km": [7000.0, 0.0, 0.0],
                "velocity_km_s": [0.0, 7.5, 0.0]
            }
        },
        { "id": "bad-1", "state": { "kind": "keplerian", "semi_major_axis_km": "wide" } },
        { "id": 42, "object_type": "spaceship" },
        { "name": "no id at all", "active": "yes" }
    ]"#;

    #[test]
    fn test_parse_catalog_degrades_bad_records() {
        let objects = parse_catalog(CATALOG).unwrap();
        assert_eq!(objects.len(), 5);

        assert_eq!(objects[0].id, "25544");
        assert_eq!(objects[0].object_type, ObjectType::Payload);
        assert!(objects[0].active);
        assert!(matches!(objects[0].state, Some(OrbitState::Keplerian(_))));

        assert_eq!(objects[1].object_type, ObjectType::Debris);
        assert!(matches!(objects[1].state, Some(OrbitState::Cartesian(_))));

        assert_eq!(objects[2], TrackedObject::unparsed("bad-1"));
        assert_eq!(objects[3], TrackedObject::unparsed("42"));
        assert_eq!(objects[4], TrackedObject::unparsed("record-4"));
    }

    #[test]
    fn test_parse_catalog_accepts_wrapped_document() {
        let objects = parse_catalog(r#"{ "objects": [ { "id": "1" } ] }"#).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, "1");
        assert!(objects[0].state.is_none());
    }

    #[test]
    fn test_parse_catalog_rejects_bad_documents() {
        assert!(matches!(parse_catalog("not json"), Err(CatalogError::Parse(_))));
        assert!(matches!(parse_catalog("42"), Err(CatalogError::Format(_))));
        assert!(matches!(
            parse_catalog(r#"{ "items": [] }"#),
            Err(CatalogError::Format(_))
        ));
    }

    #[test]
    fn test_json_file_catalog() {
        let path = std::env::temp_dir().join(format!("catalog_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = JsonFileCatalog::new(&path);
        assert_eq!(catalog.fetch().unwrap().len(), 5);
        assert!(catalog.describe().starts_with("json:"));

        std::fs::remove_file(&path).ok();
        assert!(matches!(catalog.fetch(), Err(CatalogError::Io { .. })));
    }

    #[test]
    fn test_static_catalog_replace() {
        let catalog = StaticCatalog::new(vec![TrackedObject::unparsed("a")]);
        assert_eq!(catalog.fetch().unwrap().len(), 1);
        catalog.replace(Vec::new());
        assert!(catalog.fetch().unwrap().is_empty());
    }
}
