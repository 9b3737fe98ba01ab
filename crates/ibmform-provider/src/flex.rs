//! Helpers for moving values between API models and attributes

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Strings from a list or set attribute value
pub fn expand_strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Sorted, de-duplicated set value
pub fn flatten_string_set<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: BTreeSet<String> = items.into_iter().map(Into::into).collect();
    Value::Array(set.into_iter().map(Value::String).collect())
}

/// Elements to add and to remove to turn `old` into `new`
pub fn set_difference(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    let add = new.difference(&old).map(|s| s.to_string()).collect();
    let remove = old.difference(&new).map(|s| s.to_string()).collect();
    (add, remove)
}

/// Serialize an API model into a block element
pub fn to_block<T: Serialize>(model: &T) -> Map<String, Value> {
    match serde_json::to_value(model) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Deserialize a block element into an API model
pub fn from_block<T: DeserializeOwned>(block: &Map<String, Value>) -> serde_json::Result<T> {
    serde_json::from_value(Value::Object(block.clone()))
}

/// Drop null entries so optional request fields are omitted
pub fn compact(mut map: Map<String, Value>) -> Map<String, Value> {
    map.retain(|_, v| !v.is_null());
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_expand_and_flatten_strings() {
        let v = json!(["b", "a", 3, "a"]);
        assert_eq!(expand_strings(Some(&v)), vec!["b", "a", "a"]);
        assert!(expand_strings(None).is_empty());
        assert_eq!(flatten_string_set(["b", "a", "a"]), json!(["a", "b"]));
    }

    #[test]
    fn test_set_difference() {
        let old = vec!["env:dev".to_string(), "team:a".to_string()];
        let new = vec!["team:a".to_string(), "owner:x".to_string()];
        let (add, remove) = set_difference(&old, &new);
        assert_eq!(add, vec!["owner:x"]);
        assert_eq!(remove, vec!["env:dev"]);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Member {
        port: i64,
        target: String,
    }

    #[test]
    fn test_block_conversion() {
        let block = to_block(&Member {
            port: 80,
            target: "10.0.0.4".into(),
        });
        assert_eq!(block["port"], json!(80));
        let back: Member = from_block(&block).unwrap();
        assert_eq!(back.target, "10.0.0.4");
    }

    #[test]
    fn test_compact() {
        let map = json!({"a": 1, "b": null}).as_object().cloned().unwrap();
        assert_eq!(Value::Object(compact(map)), json!({"a": 1}));
    }
}
