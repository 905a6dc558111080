//! Merged response payloads.
//!
//! The provider paginates at the wire level: one logical request may come
//! back as several chunks. Chunks are classified once at the boundary and
//! folded into a single [`Payload`]; same-named lists are concatenated in
//! arrival order, the first chunk seeds the payload and later chunks append.

use serde_json::Value;
use thiserror::Error;

/// Fully merged body of one logical request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Bare list responses (differential endpoints).
    List(Vec<Value>),
    /// Envelope with a `data` list (most list and get endpoints).
    Data(Vec<Value>),
    /// Observation envelope: sightings plus optional forms.
    Observations {
        sightings: Vec<Value>,
        forms: Vec<Value>,
    },
}

/// Chunks of one request changed shape mid-stream.
#[derive(Debug, Error)]
#[error("cannot merge a {got} chunk into a {into} payload")]
pub struct MergeError {
    pub into: &'static str,
    pub got: &'static str,
}

impl Payload {
    /// Classify one decoded wire chunk.
    pub fn from_chunk(value: Value) -> Self {
        match value {
            Value::Array(items) => Payload::List(items),
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => Payload::Data(items),
                Some(Value::Object(mut data)) => Payload::Observations {
                    sightings: take_list(&mut data, "sightings"),
                    forms: take_list(&mut data, "forms"),
                },
                // Envelopes without a data key are single entities.
                _ => Payload::Data(vec![Value::Object(map)]),
            },
            other => Payload::List(vec![other]),
        }
    }

    /// Append a later chunk of the same request.
    pub fn merge(&mut self, other: Payload) -> Result<(), MergeError> {
        match (&mut *self, other) {
            (Payload::List(acc), Payload::List(more)) => {
                acc.extend(more);
                Ok(())
            }
            (Payload::Data(acc), Payload::Data(more)) => {
                acc.extend(more);
                Ok(())
            }
            (
                Payload::Observations { sightings, forms },
                Payload::Observations {
                    sightings: more_sightings,
                    forms: more_forms,
                },
            ) => {
                sightings.extend(more_sightings);
                forms.extend(more_forms);
                Ok(())
            }
            (acc, other) => Err(MergeError {
                into: acc.kind(),
                got: other.kind(),
            }),
        }
    }

    /// Plain items of a list-shaped payload; empty for observation envelopes,
    /// which expose `sightings`/`forms` through their own variant instead.
    pub fn records(&self) -> &[Value] {
        match self {
            Payload::List(items) | Payload::Data(items) => items,
            Payload::Observations { .. } => &[],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::List(items) | Payload::Data(items) => items.len(),
            Payload::Observations { sightings, forms } => sightings.len() + forms.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            Payload::List(_) => "list",
            Payload::Data(_) => "data",
            Payload::Observations { .. } => "observations",
        }
    }
}

fn take_list(map: &mut serde_json::Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_lists_and_data_envelopes_classify_apart() {
        let list = Payload::from_chunk(json!([{"id_sighting": "1"}]));
        assert!(matches!(list, Payload::List(ref items) if items.len() == 1));

        let data = Payload::from_chunk(json!({"data": [{"id": "7"}]}));
        assert!(matches!(data, Payload::Data(ref items) if items.len() == 1));
    }

    #[test]
    fn observation_envelope_splits_sightings_and_forms() {
        let payload = Payload::from_chunk(json!({
            "data": {"sightings": [{"a": 1}], "forms": [{"b": 2}]}
        }));
        match payload {
            Payload::Observations { sightings, forms } => {
                assert_eq!(sightings.len(), 1);
                assert_eq!(forms.len(), 1);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn merge_preserves_arrival_order() {
        let mut acc = Payload::from_chunk(json!({"data": {"sightings": [{"n": "a"}]}}));
        acc.merge(Payload::from_chunk(json!({"data": {"sightings": [{"n": "b"}]}})))
            .expect("same-shape merge");
        acc.merge(Payload::from_chunk(json!({"data": {"sightings": [{"n": "c"}]}})))
            .expect("same-shape merge");

        match acc {
            Payload::Observations { sightings, .. } => {
                let names: Vec<&str> = sightings
                    .iter()
                    .map(|s| s.get("n").and_then(Value::as_str).expect("n"))
                    .collect();
                assert_eq!(names, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn merge_collects_lists_named_differently_across_chunks() {
        let mut acc = Payload::from_chunk(json!({"data": {"sightings": [{"n": "a"}]}}));
        acc.merge(Payload::from_chunk(json!({"data": {"forms": [{"n": "f"}]}})))
            .expect("observation chunks merge");
        match acc {
            Payload::Observations { sightings, forms } => {
                assert_eq!(sightings.len(), 1);
                assert_eq!(forms.len(), 1);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn shape_changes_are_rejected() {
        let mut acc = Payload::from_chunk(json!([1, 2]));
        let err = acc
            .merge(Payload::from_chunk(json!({"data": [3]})))
            .expect_err("list cannot absorb data");
        assert_eq!(err.into, "list");
        assert_eq!(err.got, "data");
    }
}
