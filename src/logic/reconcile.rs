//! Reconciliation of divergent representations of the same logical entity.
//! Every distinct property across the contributing sources is resolved to
//! one canonical value; disagreeing values are preserved as alternatives
//! with the users that asserted them, so no contribution is ever lost.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::model::document::{Alternative, JsonDocument};
use crate::model::message::QualifiedIndexingMessage;
use crate::model::reference::InstanceReference;
use crate::model::vocab;

/// One source's view of an entity, together with the provenance needed to
/// rank it: who changed it last, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContribution {
    pub reference: InstanceReference,
    pub user_id: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub document: JsonDocument,
}

impl SourceContribution {
    pub fn from_qualified(message: &QualifiedIndexingMessage) -> Self {
        Self {
            reference: message.reference().clone(),
            user_id: message.user_id().map(str::to_string),
            modified_at: message.modified_at().and_then(parse_timestamp),
            document: message.qualified.clone(),
        }
    }

    /// Build a contribution from a stored document, reading the provenance
    /// properties stamped during indexing.
    pub fn from_document(reference: InstanceReference, document: JsonDocument) -> Self {
        let user_id = document
            .get_string(vocab::provenance::LAST_MODIFICATION_USER_ID)
            .map(str::to_string);
        let modified_at = document
            .get_string(vocab::provenance::MODIFIED_AT)
            .and_then(parse_timestamp);
        Self {
            reference,
            user_id,
            modified_at,
            document,
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Merge the contributions into `target`.
///
/// The canonical value of a property is the one with the most recent
/// modification timestamp; exact timestamp ties resolve to the
/// lexicographically smallest user id, then to the source reference path,
/// so the outcome never depends on iteration order. Sources agreeing on the
/// canonical value produce no alternatives; every other distinct value is
/// recorded once, with the union of its contributing user ids.
pub fn merge(target: &mut JsonDocument, sources: &[SourceContribution]) {
    let mut ranked: Vec<&SourceContribution> = sources.iter().collect();
    ranked.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.user_id.cmp(&b.user_id))
            .then_with(|| a.reference.relative_path().cmp(&b.reference.relative_path()))
    });

    let properties: Vec<&String> = ranked
        .iter()
        .flat_map(|source| source.document.keys())
        .filter(|name| is_reconcilable(name))
        .unique()
        .collect();

    for property in properties {
        // Distinct values in rank order; the first one is canonical.
        let mut distinct: Vec<(&Value, BTreeSet<String>)> = Vec::new();
        for source in &ranked {
            let Some(value) = source.document.get(property) else {
                continue;
            };
            match distinct.iter_mut().find(|(v, _)| *v == value) {
                Some((_, user_ids)) => {
                    if let Some(user_id) = &source.user_id {
                        user_ids.insert(user_id.clone());
                    }
                }
                None => {
                    let mut user_ids = BTreeSet::new();
                    if let Some(user_id) = &source.user_id {
                        user_ids.insert(user_id.clone());
                    }
                    distinct.push((value, user_ids));
                }
            }
        }

        let Some((canonical, _)) = distinct.first() else {
            continue;
        };
        target.insert(property.clone(), (*canonical).clone());

        // The canonical value is never duplicated as its own alternative.
        for (value, user_ids) in distinct.iter().skip(1) {
            target.add_alternative(
                property,
                Alternative::new((*value).clone(), user_ids.clone()),
            );
        }
    }
}

/// Internal bookkeeping, JSON-LD keywords and provenance/inference terms are
/// carried by the indexing controllers, never reconciled.
fn is_reconcilable(property: &str) -> bool {
    !property.starts_with('_')
        && !property.starts_with('@')
        && !property.starts_with("https://schema.kgraph.dev/provenance/")
        && !property.starts_with("https://schema.kgraph.dev/inference/")
        && !property.starts_with("https://schema.kgraph.dev/internal#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::reference::SchemaReference;
    use serde_json::json;

    fn contribution(
        id: &str,
        user: &str,
        modified_at: &str,
        document: Value,
    ) -> SourceContribution {
        SourceContribution {
            reference: InstanceReference::new(
                SchemaReference::new("org", "dom", "schema", "v1"),
                id,
            ),
            user_id: Some(user.to_string()),
            modified_at: parse_timestamp(modified_at),
            document: JsonDocument::from_value(document).unwrap(),
        }
    }

    fn alternatives_for<'a>(doc: &'a JsonDocument, property: &str) -> Option<&'a Value> {
        doc.get(vocab::inference::ALTERNATIVES)?.get(property)
    }

    #[test]
    fn merges_three_sources_with_partial_agreement() {
        let sources = vec![
            contribution(
                "123",
                "123",
                "2018-11-10T07:15:11.289Z",
                json!({"name": "test 1", "desc": "desc 1", "activity": "activity"}),
            ),
            contribution(
                "456",
                "456",
                "2018-11-08T07:15:11.289Z",
                json!({"name": "test 2", "desc": "another desc", "activity": "activity"}),
            ),
            contribution(
                "789",
                "789",
                "2018-12-08T07:15:11.289Z",
                json!({"name": "test 1", "desc": "no desc"}),
            ),
        ];

        let mut doc = JsonDocument::new();
        merge(&mut doc, &sources);

        assert_eq!(doc.get("name"), Some(&json!("test 1")));
        assert_eq!(doc.get("desc"), Some(&json!("no desc")));
        assert_eq!(doc.get("activity"), Some(&json!("activity")));

        // All three sources disagree on desc: two alternatives remain.
        let desc_alternatives = alternatives_for(&doc, "desc").unwrap();
        assert_eq!(desc_alternatives.as_array().unwrap().len(), 2);

        // Two sources agree on the canonical name: one alternative.
        let name_alternatives = alternatives_for(&doc, "name").unwrap();
        assert_eq!(name_alternatives.as_array().unwrap().len(), 1);

        // Everyone who carries activity agrees: no alternatives at all.
        assert!(alternatives_for(&doc, "activity").is_none());
    }

    #[test]
    fn newest_timestamp_wins() {
        let sources = vec![
            contribution(
                "123",
                "123",
                "2018-11-10T07:15:11.289Z",
                json!({"name": "test 1"}),
            ),
            contribution(
                "456",
                "456",
                "2018-11-11T07:15:11.289Z",
                json!({"name": "test 2"}),
            ),
        ];

        let mut doc = JsonDocument::new();
        merge(&mut doc, &sources);

        assert_eq!(doc.get("name"), Some(&json!("test 2")));
        let alternatives = alternatives_for(&doc, "name").unwrap();
        assert_eq!(
            alternatives[0][vocab::inference::ALTERNATIVES_VALUE],
            json!("test 1")
        );
        assert_eq!(
            alternatives[0][vocab::inference::ALTERNATIVES_USER_IDS],
            json!(["123"])
        );
    }

    #[test]
    fn replacing_the_newest_value_moves_the_previous_canonical_into_alternatives() {
        let older = contribution(
            "123",
            "123",
            "2018-11-10T07:15:11.289Z",
            json!({"name": "test 1"}),
        );
        let newer = contribution(
            "456",
            "456",
            "2018-11-11T07:15:11.289Z",
            json!({"name": "test 2"}),
        );
        let newest = contribution(
            "789",
            "789",
            "2018-11-12T07:15:11.289Z",
            json!({"name": "test 3"}),
        );

        let mut doc = JsonDocument::new();
        merge(&mut doc, &[older.clone(), newer.clone()]);
        assert_eq!(doc.get("name"), Some(&json!("test 2")));

        let mut doc = JsonDocument::new();
        merge(&mut doc, &[older, newer, newest]);
        assert_eq!(doc.get("name"), Some(&json!("test 3")));
        let alternatives = alternatives_for(&doc, "name").unwrap().as_array().unwrap();
        let values: Vec<&Value> = alternatives
            .iter()
            .map(|a| &a[vocab::inference::ALTERNATIVES_VALUE])
            .collect();
        assert!(values.contains(&&json!("test 2")));
        assert!(values.contains(&&json!("test 1")));
    }

    #[test]
    fn agreeing_sources_pool_their_user_ids_in_one_alternative() {
        let sources = vec![
            contribution("123", "123", "2018-11-10T07:15:11.289Z", json!({"name": "test 1"})),
            contribution("456", "456", "2018-11-08T07:15:11.289Z", json!({"name": "test 2"})),
            contribution("789", "789", "2018-12-09T07:15:11.289Z", json!({"name": "test 1"})),
            contribution("000", "000", "2018-12-08T07:16:11.289Z", json!({"name": "test 2"})),
            contribution("111", "111", "2018-12-08T08:15:11.289Z", json!({"name": "test 1"})),
        ];

        let mut doc = JsonDocument::new();
        merge(&mut doc, &sources);

        assert_eq!(doc.get("name"), Some(&json!("test 1")));
        let alternatives = alternatives_for(&doc, "name").unwrap().as_array().unwrap();
        assert_eq!(alternatives.len(), 1);
        assert_eq!(
            alternatives[0][vocab::inference::ALTERNATIVES_VALUE],
            json!("test 2")
        );
        assert_eq!(
            alternatives[0][vocab::inference::ALTERNATIVES_USER_IDS],
            json!(["000", "456"])
        );
    }

    #[test]
    fn exact_timestamp_ties_resolve_to_the_smallest_user_id() {
        let sources = vec![
            contribution("b", "b", "2018-11-10T07:15:11.289Z", json!({"name": "from b"})),
            contribution("a", "a", "2018-11-10T07:15:11.289Z", json!({"name": "from a"})),
        ];

        let mut doc = JsonDocument::new();
        merge(&mut doc, &sources);
        assert_eq!(doc.get("name"), Some(&json!("from a")));
    }

    #[test]
    fn provenance_and_internal_keys_are_not_reconciled() {
        let sources = vec![contribution(
            "123",
            "123",
            "2018-11-10T07:15:11.289Z",
            json!({
                "name": "test 1",
                "_key": "internal",
                "https://schema.kgraph.dev/provenance/modifiedAt": "2018-11-10T07:15:11.289Z"
            }),
        )];

        let mut doc = JsonDocument::new();
        merge(&mut doc, &sources);
        assert_eq!(doc.get("name"), Some(&json!("test 1")));
        assert!(!doc.contains_key("_key"));
        assert!(!doc.contains_key(vocab::provenance::MODIFIED_AT));
    }
}
