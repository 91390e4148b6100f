//! Canonical payload hashing: restrict to trigger-relevant fields, normalize
//! recursively, serialize with sorted keys, SHA-256 hex.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// `triggers` is the processor's declared trigger map (`application_form`,
/// `documents_list`, …). Only `application_form` and a bare `revision_id` key
/// are special-cased, matching the fields the formatter actually emits for
/// Application vs. Stipulation/Document payloads.
pub fn extract_trigger_fields(payload: &Value, triggers: &serde_json::Map<String, Value>) -> Value {
    let obj = match payload.as_object() {
        Some(o) => o,
        None => return payload.clone(),
    };

    let mut out = serde_json::Map::new();

    if triggers.contains_key("application_form") {
        if let Some(form) = obj.get("application_form") {
            out.insert("application_form".to_string(), form.clone());
        }
    }

    if let Some(revision_id) = obj.get("revision_id") {
        out.insert("revision_id".to_string(), revision_id.clone());
    }

    if out.is_empty() {
        // No recognized trigger-bearing keys; hash the whole payload rather
        // than silently collapsing every payload to the same empty hash.
        payload.clone()
    } else {
        Value::Object(out)
    }
}

/// Recursively normalizes a JSON value for canonical hashing: object keys
/// are later sorted by serialization (`BTreeMap`), arrays keep order, and
/// there is no separate set/tuple representation in `serde_json::Value` (both
/// collapse to `Value::Array` already; a caller that wants set semantics is
/// responsible for sorting the array before it reaches this function).
pub fn normalize_for_hashing(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: BTreeMap<String, Value> = BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), normalize_for_hashing(v));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_for_hashing).collect()),
        other => other.clone(),
    }
}

/// Hashes a payload down to its trigger-relevant subset: canonical JSON
/// over that subset, SHA-256 hex-encoded.
pub fn generate_payload_hash(payload: &Value, triggers: &serde_json::Map<String, Value>) -> String {
    let restricted = extract_trigger_fields(payload, triggers);
    let normalized = normalize_for_hashing(&restricted);
    let canonical = serde_json::to_string(&normalized).expect("json values always serialize");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `hash(factor_key, value)` used for factor-row dedup in consolidation.
pub fn generate_factor_hash(factor_key: &str, value: &Value) -> String {
    let normalized = normalize_for_hashing(value);
    let canonical = serde_json::to_string(&normalized).expect("json values always serialize");
    let mut hasher = Sha256::new();
    hasher.update(factor_key.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn triggers(keys: &[&str]) -> serde_json::Map<String, Value> {
        keys.iter().map(|k| (k.to_string(), json!([]))).collect()
    }

    #[test]
    fn hash_stable_under_key_insertion_order() {
        let triggers = triggers(&["application_form"]);
        let p1 = json!({"application_form": {"name": "A", "ein": "1"}, "owners_list": []});
        let p2 = json!({"application_form": {"ein": "1", "name": "A"}, "owners_list": []});
        assert_eq!(generate_payload_hash(&p1, &triggers), generate_payload_hash(&p2, &triggers));
    }

    #[test]
    fn hash_changes_when_trigger_field_changes() {
        let triggers = triggers(&["application_form"]);
        let p1 = json!({"application_form": {"name": "A"}});
        let p2 = json!({"application_form": {"name": "B"}});
        assert_ne!(generate_payload_hash(&p1, &triggers), generate_payload_hash(&p2, &triggers));
    }

    #[test]
    fn hash_ignores_non_trigger_fields() {
        let triggers = triggers(&["documents_list"]);
        let p1 = json!({"revision_id": "r1", "owners_list": [1, 2, 3]});
        let p2 = json!({"revision_id": "r1", "owners_list": [9]});
        assert_eq!(generate_payload_hash(&p1, &triggers), generate_payload_hash(&p2, &triggers));
    }

    #[test]
    fn list_based_revision_id_hashes_by_order_preserving_content() {
        let triggers = triggers(&["documents_list"]);
        let p1 = json!({"revision_id": ["a", "b"]});
        let p2 = json!({"revision_id": ["b", "a"]});
        assert_ne!(generate_payload_hash(&p1, &triggers), generate_payload_hash(&p2, &triggers));
    }

    proptest! {
        /// `generate_payload_hash` must be stable under map-key-insertion-order
        /// permutation: the same (key, value) pairs built in any order hash
        /// identically, since `normalize_for_hashing` sorts at every depth.
        #[test]
        fn hash_stable_under_arbitrary_key_order(
            name in "[a-zA-Z]{1,12}",
            ein in "[0-9]{2}-[0-9]{7}",
            industry in "[a-zA-Z]{0,12}",
        ) {
            let triggers = triggers(&["application_form"]);

            let mut forward = serde_json::Map::new();
            forward.insert("merchant.name".into(), json!(name.clone()));
            forward.insert("merchant.ein".into(), json!(ein.clone()));
            forward.insert("merchant.industry".into(), json!(industry.clone()));

            let mut reversed = serde_json::Map::new();
            reversed.insert("merchant.industry".into(), json!(industry));
            reversed.insert("merchant.ein".into(), json!(ein));
            reversed.insert("merchant.name".into(), json!(name));

            let p1 = json!({"application_form": Value::Object(forward)});
            let p2 = json!({"application_form": Value::Object(reversed)});

            prop_assert_eq!(generate_payload_hash(&p1, &triggers), generate_payload_hash(&p2, &triggers));
        }
    }
}
