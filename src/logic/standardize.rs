//! JSON-LD standardization: the bounded set of context handling the
//! indexing and query paths rely on. Payloads are qualified once on the way
//! in; results are optionally re-framed under their original context on the
//! way out. This is deliberately not a general JSON-LD processor.

use serde_json::{Map, Value};

use crate::model::document::JsonDocument;
use crate::model::vocab;

/// Install a `@vocab` fallback so unqualified keys resolve against the
/// instance's unique namespace.
pub fn ensure_context(map: &mut Map<String, Value>, vocab_namespace: &str) {
    match map.get_mut(vocab::jsonld::CONTEXT) {
        None => {
            let mut context = Map::new();
            context.insert(
                vocab::jsonld::VOCAB.to_string(),
                Value::String(vocab_namespace.to_string()),
            );
            map.insert(vocab::jsonld::CONTEXT.to_string(), Value::Object(context));
        }
        Some(Value::Object(context)) => {
            if !context.contains_key(vocab::jsonld::VOCAB) {
                context.insert(
                    vocab::jsonld::VOCAB.to_string(),
                    Value::String(vocab_namespace.to_string()),
                );
            }
        }
        Some(_) => {}
    }
}

/// Resolver derived from a document's `@context`.
#[derive(Debug, Default)]
struct ContextResolver {
    prefixes: Vec<(String, String)>,
    vocab: Option<String>,
}

impl ContextResolver {
    fn from_context(context: Option<&Value>) -> Self {
        let mut resolver = ContextResolver::default();
        let Some(context) = context else {
            return resolver;
        };
        let maps: Vec<&Map<String, Value>> = match context {
            Value::Object(map) => vec![map],
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        };
        for map in maps {
            for (term, definition) in map {
                let Some(iri) = definition.as_str() else {
                    continue;
                };
                if term == vocab::jsonld::VOCAB {
                    resolver.vocab = Some(iri.to_string());
                } else if !term.starts_with('@') {
                    resolver.prefixes.push((term.clone(), iri.to_string()));
                }
            }
        }
        resolver
    }

    fn resolve(&self, key: &str) -> String {
        if key.starts_with('@') || key.contains("://") {
            return key.to_string();
        }
        if let Some((prefix, suffix)) = key.split_once(':') {
            if let Some((_, iri)) = self.prefixes.iter().find(|(p, _)| p == prefix) {
                return format!("{}{}", iri, suffix);
            }
        }
        if let Some(vocab) = &self.vocab {
            return format!("{}{}", vocab, key);
        }
        key.to_string()
    }
}

/// Fully qualify every key of a JSON-LD object against its own `@context`.
/// The context is consumed: it does not appear in the result. Single-element
/// arrays collapse to their value.
pub fn fully_qualify(value: &Value) -> JsonDocument {
    let resolver = ContextResolver::from_context(
        value
            .as_object()
            .and_then(|map| map.get(vocab::jsonld::CONTEXT)),
    );
    match qualify_value(value, &resolver, true) {
        Value::Object(map) => JsonDocument(map),
        _ => JsonDocument::new(),
    }
}

fn qualify_value(value: &Value, resolver: &ContextResolver, root: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut result = Map::new();
            for (key, entry) in map {
                if root && key == vocab::jsonld::CONTEXT {
                    continue;
                }
                let qualified_key = resolver.resolve(key);
                let qualified_value = if qualified_key == vocab::jsonld::TYPE {
                    qualify_type_value(entry, resolver)
                } else {
                    qualify_value(entry, resolver, false)
                };
                result.insert(qualified_key, qualified_value);
            }
            Value::Object(result)
        }
        Value::Array(items) => {
            let mut qualified: Vec<Value> = items
                .iter()
                .map(|item| qualify_value(item, resolver, false))
                .collect();
            if qualified.len() == 1 {
                qualified.remove(0)
            } else {
                Value::Array(qualified)
            }
        }
        other => other.clone(),
    }
}

fn qualify_type_value(value: &Value, resolver: &ContextResolver) -> Value {
    match value {
        Value::String(s) => Value::String(resolver.resolve(s)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| qualify_type_value(item, resolver))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Drop every key under a blacklisted vocabulary namespace, recursively.
pub fn filter_blacklisted_keys(document: JsonDocument, blacklist: &[&str]) -> JsonDocument {
    match filter_value(Value::Object(document.0), blacklist) {
        Value::Object(map) => JsonDocument(map),
        _ => JsonDocument::new(),
    }
}

fn filter_value(value: Value, blacklist: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !blacklist.iter().any(|ns| key.starts_with(ns)))
                .map(|(key, entry)| (key, filter_value(entry, blacklist)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| filter_value(item, blacklist))
                .collect(),
        ),
        other => other,
    }
}

/// The `@context` of a payload, when it carries one.
pub fn extract_context(value: &Value) -> Option<Value> {
    value
        .as_object()
        .and_then(|map| map.get(vocab::jsonld::CONTEXT))
        .cloned()
}

/// Re-frame fully qualified keys back under the given context: known
/// namespaces compact to `prefix:suffix`, the `@vocab` namespace compacts to
/// the bare term. Longest namespace wins.
pub fn apply_context(document: JsonDocument, context: &Value) -> JsonDocument {
    let resolver = ContextResolver::from_context(Some(context));
    let mut substitutions: Vec<(String, Option<String>)> = resolver
        .prefixes
        .iter()
        .map(|(prefix, iri)| (iri.clone(), Some(prefix.clone())))
        .collect();
    if let Some(vocab_ns) = &resolver.vocab {
        substitutions.push((vocab_ns.clone(), None));
    }
    substitutions.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    match compact_value(Value::Object(document.0), &substitutions) {
        Value::Object(map) => JsonDocument(map),
        _ => JsonDocument::new(),
    }
}

fn compact_value(value: Value, substitutions: &[(String, Option<String>)]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, entry)| {
                    (
                        compact_key(key, substitutions),
                        compact_value(entry, substitutions),
                    )
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| compact_value(item, substitutions))
                .collect(),
        ),
        other => other,
    }
}

fn compact_key(key: String, substitutions: &[(String, Option<String>)]) -> String {
    for (namespace, prefix) in substitutions {
        if let Some(suffix) = key.strip_prefix(namespace.as_str()) {
            return match prefix {
                Some(prefix) => format!("{}:{}", prefix, suffix),
                None => suffix.to_string(),
            };
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qualifies_prefixed_keys_and_collapses_single_element_arrays() {
        let source = json!({
            "@context": {"test": "http://test/"},
            "test:foo": "bar",
            "test:bar": 1,
            "test:foobar": ["hello"],
            "test:barfoo": ["hello", "world"]
        });
        let qualified = fully_qualify(&source);
        assert_eq!(qualified.get("http://test/foo"), Some(&json!("bar")));
        assert_eq!(qualified.get("http://test/bar"), Some(&json!(1)));
        assert_eq!(qualified.get("http://test/foobar"), Some(&json!("hello")));
        assert_eq!(
            qualified.get("http://test/barfoo"),
            Some(&json!(["hello", "world"]))
        );
        assert!(!qualified.contains_key("@context"));
    }

    #[test]
    fn vocab_qualifies_bare_keys() {
        let mut map = json!({"name": "foo"}).as_object().unwrap().clone();
        ensure_context(&mut map, "https://schema.kgraph.dev/org/dom/schema/v1.0.0/");
        let qualified = fully_qualify(&Value::Object(map));
        assert_eq!(
            qualified.get("https://schema.kgraph.dev/org/dom/schema/v1.0.0/name"),
            Some(&json!("foo"))
        );
    }

    #[test]
    fn type_values_resolve_against_the_context() {
        let source = json!({
            "@context": {"minds": "https://schema.kgraph.dev/minds/"},
            "@type": "minds:Dataset"
        });
        let qualified = fully_qualify(&source);
        assert_eq!(
            qualified.get("@type"),
            Some(&json!("https://schema.kgraph.dev/minds/Dataset"))
        );
    }

    #[test]
    fn blacklisted_vocabularies_are_stripped_recursively() {
        let document = JsonDocument::from_value(json!({
            "https://vocab.kgraph.dev/repository/links/self": {"@id": "x"},
            "http://schema.org/name": "kept",
            "nested": {
                "https://vocab.kgraph.dev/repository/terms/rev": 2,
                "other": true
            }
        }))
        .unwrap();
        let filtered = filter_blacklisted_keys(document, vocab::VOCAB_BLACKLIST);
        assert!(!filtered.contains_key("https://vocab.kgraph.dev/repository/links/self"));
        assert_eq!(filtered.get("http://schema.org/name"), Some(&json!("kept")));
        assert_eq!(filtered.get("nested"), Some(&json!({"other": true})));
    }

    #[test]
    fn apply_context_round_trips_qualified_keys() {
        let context = json!({"test": "http://test/", "@vocab": "http://vocab/"});
        let document = JsonDocument::from_value(json!({
            "http://test/foo": "bar",
            "http://vocab/name": "baz"
        }))
        .unwrap();
        let compacted = apply_context(document, &context);
        assert_eq!(compacted.get("test:foo"), Some(&json!("bar")));
        assert_eq!(compacted.get("name"), Some(&json!("baz")));
    }
}
