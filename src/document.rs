//! Document enhancement: ID generation policy and timestamp invariants.

use std::time::SystemTime;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;
use ulid::Ulid;

use crate::config::{ElasticConfig, IdMode};

/// Generate a fresh ULID string (26-character Crockford base32).
///
/// Useful when IDs are needed outside of document operations.
pub fn generate_ulid() -> String {
    Ulid::new().to_string()
}

/// Generate a ULID with a specific timestamp, for deterministic time-based
/// IDs in tests and backfills.
pub fn generate_ulid_from_time(ts: SystemTime) -> String {
    Ulid::from_datetime(ts).to_string()
}

/// Apply the write-path invariants to an outgoing document.
///
/// The document is materialized as a JSON object (shallow-copied when it
/// already is one, round-tripped through the codec otherwise; a codec failure
/// yields an empty object and is logged, and the subsequent write will fail
/// at the server).
///
/// A caller-supplied `_id` is always preserved. Otherwise, ULID mode injects
/// a fresh time-ordered ID; Elastic and Custom modes inject nothing. Elastic
/// leaves the server to assign a random ID, which distributes evenly across
/// shards, and Custom leaves the field entirely to the caller.
///
/// `created_at` is set to the current wall time when absent; `updated_at` is
/// always set.
pub(crate) fn enhance<T: Serialize>(config: &ElasticConfig, document: &T) -> Map<String, Value> {
    let mut map = match serde_json::to_value(document) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            error!(
                kind = %value_kind(&other),
                "document is not a JSON object, writing empty document"
            );
            Map::new()
        }
        Err(err) => {
            error!(error = %err, "failed to serialize document");
            Map::new()
        }
    };

    if !map.contains_key("_id") {
        match config.id_mode {
            IdMode::Ulid => {
                map.insert("_id".to_string(), Value::String(generate_ulid()));
            }
            // Elastic: the server assigns a random ID. Custom: the caller
            // owns the field; the server rejects the write if it required one.
            IdMode::Elastic | IdMode::Custom => {}
        }
    }

    let now = Value::String(Utc::now().to_rfc3339());
    map.entry("created_at").or_insert_with(|| now.clone());
    map.insert("updated_at".to_string(), now);

    map
}

/// Remove a caller- or enhancer-provided `_id` from a document body, handing
/// it back for use as the routing ID. `_id` is index metadata and must not
/// travel inside `_source`.
pub(crate) fn take_document_id(map: &mut Map<String, Value>) -> Option<String> {
    match map.remove("_id") {
        Some(Value::String(id)) => Some(id),
        Some(other) => {
            map.insert("_id".to_string(), other);
            None
        }
        None => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_with_mode(mode: IdMode) -> ElasticConfig {
        ElasticConfig::default().with_id_mode(mode)
    }

    #[test]
    fn ulid_mode_injects_crockford_id() {
        let config = config_with_mode(IdMode::Ulid);
        let enhanced = enhance(&config, &json!({"name": "x"}));

        let id = enhanced["_id"].as_str().expect("_id should be a string");
        assert_eq!(id.len(), 26);
        assert!(id
            .chars()
            .all(|c| "0123456789ABCDEFGHJKMNPQRSTVWXYZ".contains(c)));
        assert_eq!(enhanced["name"], "x");
        assert!(enhanced.contains_key("created_at"));
        assert!(enhanced.contains_key("updated_at"));
    }

    #[test]
    fn elastic_mode_injects_nothing() {
        let config = config_with_mode(IdMode::Elastic);
        let enhanced = enhance(&config, &json!({"name": "test", "value": 123}));
        assert!(!enhanced.contains_key("_id"));
        assert_eq!(enhanced["name"], "test");
        assert_eq!(enhanced["value"], 123);
    }

    #[test]
    fn custom_mode_injects_nothing() {
        let config = config_with_mode(IdMode::Custom);
        let enhanced = enhance(&config, &json!({"name": "test"}));
        assert!(!enhanced.contains_key("_id"));
    }

    #[test]
    fn caller_id_is_preserved_in_every_mode() {
        for mode in [IdMode::Elastic, IdMode::Ulid, IdMode::Custom] {
            let config = config_with_mode(mode);
            let enhanced = enhance(&config, &json!({"_id": "k", "v": 1}));
            assert_eq!(enhanced["_id"], "k", "mode {mode}");
        }
    }

    #[test]
    fn caller_created_at_is_preserved() {
        let config = ElasticConfig::default();
        let enhanced = enhance(&config, &json!({"created_at": "2020-01-01T00:00:00Z"}));
        assert_eq!(enhanced["created_at"], "2020-01-01T00:00:00Z");
        assert_ne!(enhanced["updated_at"], "2020-01-01T00:00:00Z");
    }

    #[test]
    fn struct_documents_round_trip_through_codec() {
        #[derive(serde::Serialize)]
        struct Article {
            title: String,
        }

        let config = ElasticConfig::default();
        let enhanced = enhance(
            &config,
            &Article {
                title: "hello".to_string(),
            },
        );
        assert_eq!(enhanced["title"], "hello");
        assert!(enhanced.contains_key("updated_at"));
    }

    #[test]
    fn non_object_document_becomes_empty_plus_timestamps() {
        let config = ElasticConfig::default();
        let enhanced = enhance(&config, &json!([1, 2, 3]));
        assert!(!enhanced.contains_key("0"));
        assert!(enhanced.contains_key("created_at"));
        assert!(enhanced.contains_key("updated_at"));
    }

    #[test]
    fn take_document_id_strips_string_ids_only() {
        let config = config_with_mode(IdMode::Ulid);
        let mut enhanced = enhance(&config, &json!({"name": "x"}));
        let id = take_document_id(&mut enhanced).expect("ULID should be extracted");
        assert_eq!(id.len(), 26);
        assert!(!enhanced.contains_key("_id"));

        let mut map = Map::new();
        map.insert("_id".to_string(), json!(42));
        assert!(take_document_id(&mut map).is_none());
        assert!(map.contains_key("_id"));
    }

    #[test]
    fn generated_ulids_are_time_ordered() {
        let earlier = generate_ulid_from_time(
            SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000),
        );
        let later = generate_ulid_from_time(
            SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
        );
        assert!(earlier < later);
    }
}
