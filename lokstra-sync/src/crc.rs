//! CRC32/IEEE over the sorted cache content (spec §4.I, §6 GLOSSARY "CRC").
//!
//! Pure and deterministic so it can be unit-tested without a database:
//! `key + ":" + jsonValue + ";"` for every key in ascending order, hashed
//! with CRC32/IEEE. Monotonic with respect to cache state, not time - two
//! caches with the same content always produce the same CRC regardless of
//! the order updates arrived in.

use serde_json::Value;
use std::collections::BTreeMap;

pub fn compute(entries: &BTreeMap<String, Value>) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for (key, value) in entries {
        hasher.update(key.as_bytes());
        hasher.update(b":");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b";");
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_cache_has_a_stable_crc() {
        let empty: BTreeMap<String, Value> = BTreeMap::new();
        assert_eq!(compute(&empty), compute(&empty));
    }

    #[test]
    fn crc_is_independent_of_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("k1".to_string(), json!("v1"));
        a.insert("k2".to_string(), json!(2));

        let mut b = BTreeMap::new();
        b.insert("k2".to_string(), json!(2));
        b.insert("k1".to_string(), json!("v1"));

        assert_eq!(compute(&a), compute(&b));
    }

    #[test]
    fn changing_a_value_changes_the_crc() {
        let mut a = BTreeMap::new();
        a.insert("k".to_string(), json!("v1"));
        let mut b = a.clone();
        b.insert("k".to_string(), json!("v2"));
        assert_ne!(compute(&a), compute(&b));
    }

    #[test]
    fn setting_the_same_value_is_a_crc_no_op() {
        let mut a = BTreeMap::new();
        a.insert("k".to_string(), json!("v1"));
        let b = a.clone();
        assert_eq!(compute(&a), compute(&b));
    }
}
