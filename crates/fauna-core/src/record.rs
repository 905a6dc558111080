//! Typed views over provider records.
//!
//! The provider serializes loosely: numeric ids arrive as strings, timestamps
//! as numbers, strings or `{"@timestamp": ...}` envelopes. Each record type
//! lifts the fields the engine needs at the boundary and keeps the raw body
//! for persistence, so the rest of the codebase never touches open-ended
//! maps.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` has unexpected value `{value}`")]
    InvalidField { field: &'static str, value: String },
    #[error("record {id} carries unknown modification type `{marker}`")]
    UnknownModification { id: i64, marker: String },
}

/// How a differential entry says its record changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Updated,
    Deleted,
}

/// One line of a differential ("changed since") response.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub id_sighting: i64,
    pub id_universal: String,
    pub modification: ModificationKind,
}

impl DiffEntry {
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        let id_sighting = id_of(value, "id_sighting")?;
        let id_universal = str_of(value, "id_universal").unwrap_or_default();
        let marker = str_of(value, "modification_type")
            .ok_or(RecordError::MissingField("modification_type"))?;
        let modification = match marker.as_str() {
            "updated" => ModificationKind::Updated,
            "deleted" => ModificationKind::Deleted,
            // Anything else means the provider grew a change kind this
            // mirror does not understand; dropping it would lose data.
            other => {
                return Err(RecordError::UnknownModification {
                    id: id_sighting,
                    marker: other.to_string(),
                })
            }
        };
        Ok(Self {
            id_sighting,
            id_universal,
            modification,
        })
    }
}

/// A single observation, as delivered inside `sightings`.
#[derive(Debug, Clone)]
pub struct Observation {
    pub id_sighting: i64,
    pub id_universal: String,
    /// WGS84 lon/lat, when the record carries coordinates.
    pub coord: Option<(f64, f64)>,
    pub insert_ts: Option<i64>,
    pub update_ts: Option<i64>,
    raw: Value,
}

impl Observation {
    /// Id, coordinates and timestamps live under `observers[0]`.
    pub fn from_json(raw: Value) -> Result<Self, RecordError> {
        let observer = raw
            .get("observers")
            .and_then(|v| v.get(0))
            .ok_or(RecordError::MissingField("observers"))?;
        let id_sighting = id_of(observer, "id_sighting")?;
        let id_universal = str_of(observer, "id_universal").unwrap_or_default();
        let coord = match (f64_of(observer, "coord_lon"), f64_of(observer, "coord_lat")) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        };
        let insert_ts = observer.get("insert_date").and_then(timestamp_of);
        let update_ts = observer.get("update_date").and_then(timestamp_of);
        Ok(Self {
            id_sighting,
            id_universal,
            coord,
            insert_ts,
            update_ts,
            raw,
        })
    }

    /// Update timestamp when present, insert timestamp otherwise.
    pub fn last_modified(&self) -> Option<i64> {
        self.update_ts.or(self.insert_ts)
    }

    /// Annotate the raw body with reprojected local coordinates.
    pub fn set_local_coord(&mut self, x: f64, y: f64) {
        if let Some(observer) = self
            .raw
            .get_mut("observers")
            .and_then(|v| v.get_mut(0))
            .and_then(Value::as_object_mut)
        {
            observer.insert("coord_x_local".to_string(), x.into());
            observer.insert("coord_y_local".to_string(), y.into());
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// A plain entity row: anything keyed by a bare `id`.
#[derive(Debug, Clone)]
pub struct SimpleRecord {
    pub id: i64,
    raw: Value,
}

impl SimpleRecord {
    pub fn from_json(raw: Value) -> Result<Self, RecordError> {
        let id = id_of(&raw, "id")?;
        Ok(Self { id, raw })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// An entity carrying top-level WGS84 coordinates.
#[derive(Debug, Clone)]
pub struct GeometryRecord {
    pub id: i64,
    pub coord: Option<(f64, f64)>,
    raw: Value,
}

impl GeometryRecord {
    pub fn from_json(raw: Value) -> Result<Self, RecordError> {
        let id = id_of(&raw, "id")?;
        let coord = match (f64_of(&raw, "coord_lon"), f64_of(&raw, "coord_lat")) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        };
        Ok(Self { id, coord, raw })
    }

    pub fn set_local_coord(&mut self, x: f64, y: f64) {
        if let Some(map) = self.raw.as_object_mut() {
            map.insert("coord_x_local".to_string(), x.into());
            map.insert("coord_y_local".to_string(), y.into());
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// A form envelope: its own metadata plus embedded sightings, which are
/// split out and persisted individually.
#[derive(Debug, Clone)]
pub struct FormRecord {
    pub id: i64,
    pub coord: Option<(f64, f64)>,
    sightings: Vec<Value>,
    raw: Value,
}

impl FormRecord {
    /// Forms are keyed by `@id` and locate coordinates at top-level
    /// `lon`/`lat`.
    pub fn from_json(mut raw: Value) -> Result<Self, RecordError> {
        let sightings = {
            let map = raw
                .as_object_mut()
                .ok_or(RecordError::MissingField("@id"))?;
            match map.remove("sightings") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        };
        let id = id_of(&raw, "@id")?;
        let coord = match (f64_of(&raw, "lon"), f64_of(&raw, "lat")) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        };
        Ok(Self {
            id,
            coord,
            sightings,
            raw,
        })
    }

    /// Hand the embedded sightings over for individual storage.
    pub fn take_sightings(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.sightings)
    }

    pub fn set_local_coord(&mut self, x: f64, y: f64) {
        if let Some(map) = self.raw.as_object_mut() {
            map.insert("coord_x_local".to_string(), x.into());
            map.insert("coord_y_local".to_string(), y.into());
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Partition descriptor from the taxonomic-group controller.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxoGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub access_mode: String,
}

impl TaxoGroup {
    pub fn is_active(&self) -> bool {
        self.access_mode != "none"
    }
}

/// Species descriptor, used when a backfill explodes a partition by species.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesEntry {
    pub id: String,
    pub is_used: String,
}

impl SpeciesEntry {
    pub fn in_use(&self) -> bool {
        self.is_used == "1"
    }
}

fn id_of(value: &Value, field: &'static str) -> Result<i64, RecordError> {
    match value.get(field) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| RecordError::InvalidField {
            field,
            value: n.to_string(),
        }),
        Some(Value::String(s)) => s.parse().map_err(|_| RecordError::InvalidField {
            field,
            value: s.clone(),
        }),
        _ => Err(RecordError::MissingField(field)),
    }
}

fn str_of(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn f64_of(value: &Value, field: &str) -> Option<f64> {
    match value.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// Timestamps arrive as epoch numbers, numeric strings or
/// `{"@timestamp": ...}` envelopes.
fn timestamp_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => map.get("@timestamp").and_then(timestamp_of),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sighting(id: &str) -> Value {
        json!({
            "observers": [{
                "id_sighting": id,
                "id_universal": format!("u-{id}"),
                "coord_lon": "5.43",
                "coord_lat": "45.12",
                "insert_date": 1_500_000_000,
                "update_date": {"@timestamp": "1600000000"},
            }],
            "species": {"id": "42"}
        })
    }

    #[test]
    fn observation_lifts_identity_coordinates_and_timestamps() {
        let obs = Observation::from_json(sighting("1234")).expect("valid sighting");
        assert_eq!(obs.id_sighting, 1234);
        assert_eq!(obs.id_universal, "u-1234");
        let (lon, lat) = obs.coord.expect("coordinates present");
        assert!((lon - 5.43).abs() < 1e-9);
        assert!((lat - 45.12).abs() < 1e-9);
        assert_eq!(obs.last_modified(), Some(1_600_000_000));
    }

    #[test]
    fn last_modified_falls_back_to_insert_date() {
        let mut value = sighting("1");
        value["observers"][0]
            .as_object_mut()
            .expect("observer object")
            .remove("update_date");
        let obs = Observation::from_json(value).expect("valid sighting");
        assert_eq!(obs.last_modified(), Some(1_500_000_000));
    }

    #[test]
    fn local_coordinates_land_in_the_raw_body() {
        let mut obs = Observation::from_json(sighting("1")).expect("valid sighting");
        obs.set_local_coord(900_001.5, 6_500_002.25);
        let observer = &obs.raw()["observers"][0];
        assert_eq!(observer["coord_x_local"], json!(900_001.5));
        assert_eq!(observer["coord_y_local"], json!(6_500_002.25));
    }

    #[test]
    fn diff_entry_classifies_updates_and_deletions() {
        let updated = DiffEntry::from_json(&json!({
            "id_sighting": "10", "id_universal": "u-10", "modification_type": "updated"
        }))
        .expect("updated entry");
        assert_eq!(updated.modification, ModificationKind::Updated);

        let deleted = DiffEntry::from_json(&json!({
            "id_sighting": 11, "id_universal": "u-11", "modification_type": "deleted"
        }))
        .expect("deleted entry");
        assert_eq!(deleted.modification, ModificationKind::Deleted);
    }

    #[test]
    fn unknown_modification_marker_is_fatal() {
        let err = DiffEntry::from_json(&json!({
            "id_sighting": "12", "id_universal": "u-12", "modification_type": "archived"
        }))
        .expect_err("unknown marker");
        match err {
            RecordError::UnknownModification { id, marker } => {
                assert_eq!(id, 12);
                assert_eq!(marker, "archived");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn form_splits_embedded_sightings_from_metadata() {
        let mut form = FormRecord::from_json(json!({
            "@id": "77",
            "lon": "5.0",
            "lat": "45.0",
            "time_start": "08:00:00",
            "sightings": [sighting("1"), sighting("2")],
        }))
        .expect("valid form");
        assert_eq!(form.id, 77);
        assert_eq!(form.take_sightings().len(), 2);
        assert!(form.raw().get("sightings").is_none());
        assert_eq!(form.raw()["time_start"], json!("08:00:00"));
    }
}
