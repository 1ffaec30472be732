//! In-memory graph store. Backs the test suites and local development; it
//! honors the same contracts as the HTTP backend: plans commit atomically
//! and compiled traversal queries execute with the exact semantics the
//! rendered query text has on the real engine.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::KgError;
use crate::logic::query::compiler::{CompiledFilter, FieldSource, QueryField, TraversalQuery};
use crate::model::specification::FilterOp;
use crate::model::vocab;
use crate::model::{
    CollectionName, DocumentHandle, JsonDocument, Space, TodoItem, TodoList,
};
use crate::store::traits::{DocumentKind, FootprintEntry, GraphStore, QueryRows};

#[derive(Default)]
struct SpaceData {
    collections: HashMap<CollectionName, BTreeMap<String, JsonDocument>>,
}

impl SpaceData {
    fn document(&self, handle: &DocumentHandle) -> Option<&JsonDocument> {
        self.collections.get(&handle.collection)?.get(&handle.key)
    }

    fn document_by_id(&self, id: &str) -> Option<&JsonDocument> {
        self.document(&DocumentHandle::from_id(id)?)
    }
}

#[derive(Default)]
pub struct MemoryGraphStore {
    spaces: RwLock<HashMap<Space, SpaceData>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents in one space. Test helper.
    pub fn document_count(&self, space: Space) -> usize {
        self.spaces
            .read()
            .get(&space)
            .map(|data| data.collections.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraphStore {
    async fn commit(&self, todo_list: &TodoList) -> Result<(), KgError> {
        // One write lock for the whole plan: all operations apply in order
        // or, had any been able to fail, none would be visible.
        let mut spaces = self.spaces.write();
        for item in todo_list.iter() {
            match item {
                TodoItem::UpsertVertex {
                    space,
                    handle,
                    document,
                }
                | TodoItem::UpsertEdge {
                    space,
                    handle,
                    document,
                    ..
                } => {
                    spaces
                        .entry(*space)
                        .or_default()
                        .collections
                        .entry(handle.collection.clone())
                        .or_default()
                        .insert(handle.key.clone(), document.clone());
                }
                TodoItem::DeleteVertex { space, handle } | TodoItem::DeleteEdge { space, handle } => {
                    if let Some(data) = spaces.get_mut(space) {
                        if let Some(collection) = data.collections.get_mut(&handle.collection) {
                            collection.remove(&handle.key);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn upsert_document(
        &self,
        space: Space,
        handle: &DocumentHandle,
        document: JsonDocument,
    ) -> Result<(), KgError> {
        self.spaces
            .write()
            .entry(space)
            .or_default()
            .collections
            .entry(handle.collection.clone())
            .or_default()
            .insert(handle.key.clone(), document);
        Ok(())
    }

    async fn get_document(
        &self,
        space: Space,
        handle: &DocumentHandle,
    ) -> Result<Option<JsonDocument>, KgError> {
        Ok(self
            .spaces
            .read()
            .get(&space)
            .and_then(|data| data.document(handle))
            .cloned())
    }

    async fn find_by_property(
        &self,
        space: Space,
        collection: &CollectionName,
        property: &str,
        value: &str,
    ) -> Result<Vec<JsonDocument>, KgError> {
        let spaces = self.spaces.read();
        let Some(documents) = spaces
            .get(&space)
            .and_then(|data| data.collections.get(collection))
        else {
            return Ok(Vec::new());
        };
        Ok(documents
            .values()
            .filter(|doc| doc.get_string(property) == Some(value))
            .cloned()
            .collect())
    }

    async fn instance_footprint(
        &self,
        space: Space,
        original_id: &str,
    ) -> Result<Vec<FootprintEntry>, KgError> {
        let spaces = self.spaces.read();
        let Some(data) = spaces.get(&space) else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for (collection, documents) in &data.collections {
            for (key, document) in documents {
                if document.get_string(vocab::internal::ORIGINAL_ID) != Some(original_id) {
                    continue;
                }
                let kind = if document.contains_key(vocab::internal::FROM)
                    && document.contains_key(vocab::internal::TO)
                {
                    DocumentKind::Edge
                } else {
                    DocumentKind::Vertex
                };
                entries.push(FootprintEntry {
                    space,
                    handle: DocumentHandle::new(collection.clone(), key.clone()),
                    kind,
                });
            }
        }
        Ok(entries)
    }

    async fn execute(&self, query: &TraversalQuery) -> Result<QueryRows, KgError> {
        let spaces = self.spaces.read();
        let data = spaces.get(&query.space);
        let documents = data.and_then(|data| data.collections.get(&query.root_collection));
        // A root collection that was never indexed is a not-found condition,
        // distinct from an existing collection with no matching rows.
        let (Some(data), Some(documents)) = (data, documents) else {
            return Err(KgError::not_found(format!(
                "root collection {} does not exist",
                query.root_collection
            )));
        };

        let mut rows: Vec<JsonDocument> = Vec::new();
        for document in documents.values() {
            // The whitelist is mandatory: rows outside it are excluded, and
            // an empty whitelist yields nothing at all.
            let permitted = document
                .get_string(vocab::internal::PERMISSION_GROUP)
                .map(|group| query.whitelist_organizations.iter().any(|org| org == group))
                .unwrap_or(false);
            if !permitted {
                continue;
            }

            if let Some(instance_key) = &query.instance_key {
                if document.get_string(vocab::internal::KEY) != Some(instance_key) {
                    continue;
                }
            }

            if let Some(term) = &query.search_term {
                let name = document
                    .get_string(vocab::schema_org::NAME)
                    .unwrap_or_default();
                if !name.to_lowercase().contains(&term.to_lowercase()) {
                    continue;
                }
            }

            if let Some(row) = project(data, document, &query.fields) {
                rows.push(row);
            }
        }

        sort_rows(&mut rows, &query.fields);

        let full_count = rows.len() as u64;
        let start = query.pagination.start.unwrap_or(0) as usize;
        let rows: Vec<JsonDocument> = rows
            .into_iter()
            .skip(start)
            .take(query.pagination.size.map(|s| s as usize).unwrap_or(usize::MAX))
            .collect();

        Ok(QueryRows { full_count, rows })
    }

    async fn truncate_space(&self, space: Space) -> Result<(), KgError> {
        self.spaces.write().remove(&space);
        Ok(())
    }
}

/// Project one document into the requested row shape. `None` means the
/// document is excluded: a filter rejected it or a required field is empty.
fn project(data: &SpaceData, document: &JsonDocument, fields: &[QueryField]) -> Option<JsonDocument> {
    let mut row = JsonDocument::new();
    for field in fields {
        match &field.source {
            FieldSource::Property { property } => {
                let value = document.get(property).cloned();
                if let Some(filter) = &field.filter {
                    if !value_matches(value.as_ref(), filter) {
                        return None;
                    }
                }
                if field.required && value.is_none() {
                    return None;
                }
                row.insert(field.name.clone(), value.unwrap_or(Value::Null));
            }
            FieldSource::Traversal {
                edge,
                reverse,
                fields: sub_fields,
                flatten,
            } => {
                let targets = traverse(data, document, edge, *reverse);
                let mut values = Vec::new();
                for target in targets {
                    if *flatten {
                        if let Some(FieldSource::Property { property }) =
                            sub_fields.first().map(|f| &f.source)
                        {
                            if let Some(value) = target.get(property) {
                                values.push(value.clone());
                            }
                            continue;
                        }
                    }
                    if let Some(projected) = project(data, target, sub_fields) {
                        values.push(projected.into_value());
                    }
                }
                if field.required && values.is_empty() {
                    return None;
                }
                row.insert(field.name.clone(), Value::Array(values));
            }
        }
    }
    Some(row)
}

/// Walk one edge collection from (or, reversed, to) the given document,
/// honoring the recorded list order.
fn traverse<'a>(
    data: &'a SpaceData,
    document: &JsonDocument,
    edge: &CollectionName,
    reverse: bool,
) -> Vec<&'a JsonDocument> {
    let Some(document_id) = document.get_string(vocab::internal::ID) else {
        return Vec::new();
    };
    let Some(edges) = data.collections.get(edge) else {
        return Vec::new();
    };

    let (match_key, follow_key) = if reverse {
        (vocab::internal::TO, vocab::internal::FROM)
    } else {
        (vocab::internal::FROM, vocab::internal::TO)
    };

    let mut matching: Vec<&JsonDocument> = edges
        .values()
        .filter(|edge_doc| edge_doc.get_string(match_key) == Some(document_id))
        .collect();
    matching.sort_by_key(|edge_doc| {
        edge_doc
            .get(vocab::internal::ORDER_NUMBER)
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX)
    });

    matching
        .into_iter()
        .filter_map(|edge_doc| {
            let target_id = edge_doc.get_string(follow_key)?;
            data.document_by_id(target_id)
        })
        .collect()
}

fn value_matches(value: Option<&Value>, filter: &CompiledFilter) -> bool {
    let Some(value) = value else {
        return false;
    };
    let candidates: Vec<String> = match value {
        Value::Array(items) => items.iter().map(value_as_text).collect(),
        other => vec![value_as_text(other)],
    };
    match filter.op {
        FilterOp::Equals => candidates.iter().any(|c| c == &filter.value),
        FilterOp::Contains => {
            let needle = filter.value.to_lowercase();
            candidates.iter().any(|c| c.to_lowercase().contains(&needle))
        }
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sort_rows(rows: &mut [JsonDocument], fields: &[QueryField]) {
    let sort_fields: Vec<&str> = fields
        .iter()
        .filter(|field| field.sort && matches!(field.source, FieldSource::Property { .. }))
        .map(|field| field.name.as_str())
        .collect();
    if sort_fields.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for name in &sort_fields {
            let left = a.get(name).map(value_as_text).unwrap_or_default();
            let right = b.get(name).map(value_as_text).unwrap_or_default();
            let ordering = left.cmp(&right);
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}
