use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::model::vocab;

/// A non-canonical value for a reconciled property, together with the users
/// that asserted it. Only the reconciliation engine creates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    #[serde(rename = "https://schema.kgraph.dev/inference/alternatives/value")]
    pub value: Value,
    #[serde(rename = "https://schema.kgraph.dev/inference/alternatives/userIds")]
    pub user_ids: BTreeSet<String>,
}

impl Alternative {
    pub fn new(value: Value, user_ids: BTreeSet<String>) -> Self {
        Self { value, user_ids }
    }
}

/// An order-preserving JSON object as it is stored in and returned from the
/// graph. Thin wrapper over `serde_json::Map` with the access patterns the
/// indexing and query paths need.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonDocument(pub Map<String, Value>);

impl JsonDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A string-valued property, looking through single-element arrays.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            Value::String(s) => Some(s),
            Value::Array(items) => items.iter().find_map(|v| v.as_str()),
            _ => None,
        }
    }

    /// The `@id` of a reference-shaped property (`{"@id": "..."}`).
    pub fn get_reference_id(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            Value::Object(map) => map.get(vocab::jsonld::ID).and_then(Value::as_str),
            Value::String(s) => Some(s),
            Value::Array(items) => items.iter().find_map(|item| {
                item.as_object()
                    .and_then(|map| map.get(vocab::jsonld::ID))
                    .and_then(Value::as_str)
            }),
            _ => None,
        }
    }

    /// Whether the document carries the given `@type` (string or array form).
    pub fn is_of_type(&self, lookup_type: &str) -> bool {
        match self.0.get(vocab::jsonld::TYPE) {
            Some(Value::String(s)) => s == lookup_type,
            Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(lookup_type)),
            _ => false,
        }
    }

    pub fn add_type(&mut self, type_iri: &str) {
        add_to_property(&mut self.0, vocab::jsonld::TYPE, Value::String(type_iri.into()));
    }

    /// Add a value to a property, promoting it to a list when a second
    /// distinct value arrives.
    pub fn add_to_property(&mut self, property: &str, value: Value) {
        add_to_property(&mut self.0, property, value);
    }

    /// Add a `{"@id": url}` reference under the given property.
    pub fn add_reference(&mut self, property: &str, url: &str) {
        let mut reference = Map::new();
        reference.insert(vocab::jsonld::ID.to_string(), Value::String(url.to_string()));
        add_to_property(&mut self.0, property, Value::Object(reference));
    }

    /// Record an alternative for a property under the reserved alternatives
    /// key. Alternatives without any contributing user are discarded.
    pub fn add_alternative(&mut self, property: &str, alternative: Alternative) {
        if alternative.user_ids.is_empty() {
            return;
        }
        let alternatives = self
            .0
            .entry(vocab::inference::ALTERNATIVES.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = alternatives {
            let entry = map
                .entry(property.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                if let Ok(value) = serde_json::to_value(&alternative) {
                    if !items.contains(&value) {
                        items.push(value);
                    }
                }
            }
        }
    }

    /// Strip internal bookkeeping keys before handing the document to a
    /// caller.
    pub fn remove_internal_keys(&mut self) {
        self.0.retain(|key, _| !key.starts_with('_'));
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

fn add_to_property(map: &mut Map<String, Value>, property: &str, value: Value) {
    match map.get_mut(property) {
        None => {
            map.insert(property.to_string(), value);
        }
        Some(Value::Array(items)) => {
            if !items.contains(&value) {
                items.push(value);
            }
        }
        Some(existing) => {
            if *existing != value {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_to_property_promotes_to_list() {
        let mut doc = JsonDocument::new();
        doc.add_to_property("p", json!("a"));
        assert_eq!(doc.get("p"), Some(&json!("a")));

        doc.add_to_property("p", json!("a"));
        assert_eq!(doc.get("p"), Some(&json!("a")));

        doc.add_to_property("p", json!("b"));
        assert_eq!(doc.get("p"), Some(&json!(["a", "b"])));

        doc.add_to_property("p", json!("b"));
        assert_eq!(doc.get("p"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn alternatives_without_users_are_discarded() {
        let mut doc = JsonDocument::new();
        doc.add_alternative("p", Alternative::new(json!("x"), BTreeSet::new()));
        assert!(!doc.contains_key(vocab::inference::ALTERNATIVES));

        let users: BTreeSet<String> = ["123".to_string()].into();
        doc.add_alternative("p", Alternative::new(json!("x"), users));
        let alternatives = doc.get(vocab::inference::ALTERNATIVES).unwrap();
        assert_eq!(
            alternatives["p"][0][vocab::inference::ALTERNATIVES_VALUE],
            json!("x")
        );
        assert_eq!(
            alternatives["p"][0][vocab::inference::ALTERNATIVES_USER_IDS],
            json!(["123"])
        );
    }

    #[test]
    fn type_lookup_handles_string_and_array() {
        let mut doc = JsonDocument::new();
        doc.insert(vocab::jsonld::TYPE, json!("https://schema.kgraph.dev/Release"));
        assert!(doc.is_of_type(vocab::release::TYPE));

        doc.insert(vocab::jsonld::TYPE, json!(["A", "https://schema.kgraph.dev/Release"]));
        assert!(doc.is_of_type(vocab::release::TYPE));
        assert!(!doc.is_of_type("B"));
    }

    #[test]
    fn internal_keys_are_stripped() {
        let mut doc = JsonDocument::from_value(json!({
            "_key": "abc",
            "_permissionGroup": "foo",
            "http://schema.org/name": "kept"
        }))
        .unwrap();
        doc.remove_internal_keys();
        assert_eq!(doc.0.len(), 1);
        assert!(doc.contains_key("http://schema.org/name"));
    }
}
