//! Naming convention for graph-store collections, document keys and query
//! aliases. Collection names must satisfy the storage engine's identifier
//! rules and length limit, so IRIs are cleaned and, when necessary,
//! truncated with a deterministic hash suffix.

use sha2::{Digest, Sha256};

use crate::model::handle::{CollectionName, DocumentHandle};
use crate::model::reference::{InstanceReference, SchemaReference};

/// Upper bound accepted by the storage engine for collection names.
const MAX_COLLECTION_NAME_LENGTH: usize = 60;

/// Reserved prefix of edge collections.
const EDGE_PREFIX: &str = "rel";

/// Collection holding stored query specifications.
pub const SPECIFICATION_QUERIES: &str = "specification_queries";

/// Strip protocol prefixes and replace everything the storage engine would
/// reject. Dots become underscores so version numbers stay readable.
pub fn replace_special_characters(value: &str) -> String {
    let stripped = value
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    stripped
        .chars()
        .map(|c| match c {
            '.' => '_',
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            _ => '-',
        })
        .collect()
}

/// Reduce a vertex label to its `org/domain/schema/version` tail when the
/// label embeds a schema path. Labels without a version segment pass
/// through unchanged.
pub fn reduce_vertex_label(label: &str) -> &str {
    let segments: Vec<(usize, &str)> = label
        .split('/')
        .scan(0usize, |offset, segment| {
            let start = *offset;
            *offset = start + segment.len() + 1;
            Some((start, segment))
        })
        .collect();
    for index in (0..segments.len()).rev() {
        if is_version_segment(segments[index].1) && index >= 3 {
            return &label[segments[index - 3].0..];
        }
    }
    label
}

fn is_version_segment(segment: &str) -> bool {
    let Some(rest) = segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Shorten an over-long name to the limit, keeping a readable prefix and a
/// deterministic hash of the full value.
fn reduce_to_max_length(value: String) -> String {
    if value.len() <= MAX_COLLECTION_NAME_LENGTH {
        return value;
    }
    let digest = Sha256::digest(value.as_bytes());
    let hash = hex::encode(&digest[..4]);
    let prefix: String = value
        .chars()
        .take(MAX_COLLECTION_NAME_LENGTH - hash.len() - 1)
        .collect();
    format!("{}-{}", prefix, hash)
}

/// Collection of vertices labeled with the given type IRI.
pub fn vertex_collection(label: &str) -> CollectionName {
    CollectionName::from_raw(reduce_to_max_length(replace_special_characters(
        reduce_vertex_label(label),
    )))
}

/// Collection of edges built from the given qualified property name.
pub fn edge_collection(label: &str) -> CollectionName {
    CollectionName::from_raw(reduce_to_max_length(format!(
        "{}-{}",
        EDGE_PREFIX,
        replace_special_characters(label)
    )))
}

/// Collection of root vertices of one schema.
pub fn schema_collection(schema: &SchemaReference) -> CollectionName {
    CollectionName::from_raw(reduce_to_max_length(replace_special_characters(
        &schema.relative_path(),
    )))
}

/// Storage-safe document key for an identifier (uuid chain, relative path).
pub fn document_key(value: &str) -> String {
    replace_special_characters(value)
}

/// Handle of the root document of an instance.
pub fn instance_handle(reference: &InstanceReference) -> DocumentHandle {
    DocumentHandle::new(
        schema_collection(&reference.schema),
        document_key(&reference.relative_path()),
    )
}

/// Handle of a stored query specification.
pub fn specification_handle(schema: &SchemaReference, query_id: &str) -> DocumentHandle {
    DocumentHandle::new(
        CollectionName::from_raw(SPECIFICATION_QUERIES),
        document_key(&format!("{}-{}", schema.relative_path(), query_id)),
    )
}

/// Deterministic key for the edge between two documents.
pub fn edge_key(from: &str, to: &str) -> String {
    let digest = Sha256::digest(format!("{}-to-{}", from, to).as_bytes());
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_characters_are_replaced() {
        assert_eq!(
            replace_special_characters("https://schema.kgraph.dev/minds/core/dataset/v1.0.0"),
            "schema_kgraph_dev-minds-core-dataset-v1_0_0"
        );
    }

    #[test]
    fn vertex_labels_reduce_to_the_schema_tail() {
        assert_eq!(
            reduce_vertex_label("https://schema.kgraph.dev/minds/core/dataset/v1.0.0"),
            "minds/core/dataset/v1.0.0"
        );
        assert_eq!(reduce_vertex_label("http://schema.org/name"), "http://schema.org/name");
        assert_eq!(
            vertex_collection("https://schema.kgraph.dev/minds/core/dataset/v1.0.0").as_str(),
            "minds-core-dataset-v1_0_0"
        );
    }

    #[test]
    fn edge_collections_carry_the_reserved_prefix() {
        let collection = edge_collection("https://schema.kgraph.dev/release/instance");
        assert_eq!(collection.as_str(), "rel-schema_kgraph_dev-release-instance");
        assert!(collection.is_edge_collection());
    }

    #[test]
    fn long_names_are_hash_truncated_deterministically() {
        let long_label = format!("https://vocab.kgraph.dev/{}/terms", "x".repeat(120));
        let first = edge_collection(&long_label);
        let second = edge_collection(&long_label);
        assert_eq!(first, second);
        assert!(first.as_str().len() <= 60);

        let other = edge_collection(&format!("{}-different", long_label));
        assert_ne!(first, other);
    }

    #[test]
    fn edge_keys_are_stable() {
        let a = edge_key("coll/a", "coll/b");
        let b = edge_key("coll/a", "coll/b");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, edge_key("coll/b", "coll/a"));
    }
}
