//! Serialization of a transformed vertex arena into graph mutations of an
//! execution plan. All controllers plan through these helpers so vertex and
//! edge documents carry the same bookkeeping everywhere.

use std::collections::HashMap;

use crate::logic::naming;
use crate::model::graph::{Edge, EdgeTarget, Vertex};
use crate::model::vocab;
use crate::model::{
    DocumentHandle, InstanceReference, JsonDocument, Space, TodoItem, TodoList,
};
use crate::store::traits::FootprintEntry;

/// Provenance stamped onto the root document of an instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanMetadata<'a> {
    pub modified_at: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

/// Append upsert operations for every vertex and edge of the arena and
/// return the planned handles, so callers can diff them against the
/// instance's existing footprint.
pub fn plan_instance_upserts(
    space: Space,
    reference: &InstanceReference,
    vertices: &[Vertex],
    metadata: PlanMetadata<'_>,
    todo_list: &mut TodoList,
) -> Vec<DocumentHandle> {
    let by_id: HashMap<&str, &Vertex> = vertices
        .iter()
        .filter_map(|vertex| vertex.id.as_deref().map(|id| (id, vertex)))
        .collect();

    let mut planned = Vec::new();
    for (index, vertex) in vertices.iter().enumerate() {
        let Some(handle) = vertex_handle(reference, vertex) else {
            log::warn!(
                "skipping vertex without identity while indexing {}",
                reference.relative_path()
            );
            continue;
        };

        let document = vertex_document(reference, vertex, &handle, index == 0, metadata);
        planned.push(handle.clone());
        todo_list.push(TodoItem::UpsertVertex {
            space,
            handle,
            document,
        });

        for edge in &vertex.edges {
            if let Some(handle) = plan_edge(space, reference, vertex, edge, &by_id, todo_list) {
                planned.push(handle);
            }
        }
    }
    planned
}

/// Append delete operations for stored documents that are no longer part of
/// the instance.
pub fn plan_removal(entries: &[FootprintEntry], todo_list: &mut TodoList) {
    for entry in entries {
        let item = match entry.kind {
            crate::store::traits::DocumentKind::Vertex => TodoItem::DeleteVertex {
                space: entry.space,
                handle: entry.handle.clone(),
            },
            crate::store::traits::DocumentKind::Edge => TodoItem::DeleteEdge {
                space: entry.space,
                handle: entry.handle.clone(),
            },
        };
        todo_list.push(item);
    }
}

fn vertex_handle(reference: &InstanceReference, vertex: &Vertex) -> Option<DocumentHandle> {
    let uuid = vertex.uuid.as_deref()?;
    let label = vertex
        .vertex_type
        .clone()
        .unwrap_or_else(|| reference.schema.relative_path());
    Some(DocumentHandle::new(
        naming::vertex_collection(&label),
        naming::document_key(uuid),
    ))
}

fn vertex_document(
    reference: &InstanceReference,
    vertex: &Vertex,
    handle: &DocumentHandle,
    is_root: bool,
    metadata: PlanMetadata<'_>,
) -> JsonDocument {
    let mut document = JsonDocument::new();
    for property in &vertex.properties {
        document.add_to_property(&property.name, property.value.clone());
    }

    document.insert(vocab::internal::KEY, handle.key.clone());
    document.insert(vocab::internal::ID, handle.id());
    document.insert(vocab::internal::ORIGINAL_ID, reference.full_id(false));
    document.insert(
        vocab::internal::PERMISSION_GROUP,
        reference.schema.main_organization(),
    );
    if let Some(revision) = vertex.revision {
        if !document.contains_key(vocab::graph::REVISION) {
            document.insert(vocab::graph::REVISION, revision);
        }
    }
    if is_root {
        document.insert(vocab::internal::RELATIVE_URL_WITH_REV, reference.full_id(true));
        if let Some(modified_at) = metadata.modified_at {
            if !document.contains_key(vocab::provenance::MODIFIED_AT) {
                document.insert(vocab::provenance::MODIFIED_AT, modified_at);
            }
        }
        if let Some(user_id) = metadata.user_id {
            if !document.contains_key(vocab::provenance::LAST_MODIFICATION_USER_ID) {
                document.insert(vocab::provenance::LAST_MODIFICATION_USER_ID, user_id);
            }
        }
    } else {
        document.insert(vocab::graph::EMBEDDED, true);
    }
    document
}

fn plan_edge(
    space: Space,
    reference: &InstanceReference,
    source: &Vertex,
    edge: &Edge,
    by_id: &HashMap<&str, &Vertex>,
    todo_list: &mut TodoList,
) -> Option<DocumentHandle> {
    let from = vertex_handle(reference, source)?;
    let to = match &edge.target {
        EdgeTarget::Embedded { vertex_id } => {
            let target = by_id.get(vertex_id.as_str())?;
            vertex_handle(reference, target)?
        }
        EdgeTarget::External { reference: url } => {
            let Some(target) = InstanceReference::from_url(url) else {
                log::warn!(
                    "dropping edge {} of {}: unresolvable reference {}",
                    edge.name,
                    reference.relative_path(),
                    url
                );
                return None;
            };
            naming::instance_handle(&target)
        }
    };

    let from_id = from.id();
    let to_id = to.id();
    let handle = DocumentHandle::new(
        naming::edge_collection(&edge.name),
        naming::edge_key(&from_id, &to_id),
    );

    let mut document = JsonDocument::new();
    document.insert(vocab::internal::KEY, handle.key.clone());
    document.insert(vocab::internal::ID, handle.id());
    document.insert(vocab::internal::FROM, from_id.clone());
    document.insert(vocab::internal::TO, to_id.clone());
    document.insert(vocab::internal::NAME, edge.name.clone());
    document.insert(vocab::internal::ORIGINAL_ID, reference.full_id(false));
    document.insert(
        vocab::internal::PERMISSION_GROUP,
        reference.schema.main_organization(),
    );
    if let Some(order) = edge.order_number {
        document.insert(vocab::internal::ORDER_NUMBER, order as u64);
    }
    for property in &edge.properties {
        if !property.name.starts_with('_') {
            document.add_to_property(&property.name, property.value.clone());
        }
    }

    todo_list.push(TodoItem::UpsertEdge {
        space,
        handle: handle.clone(),
        from: from_id,
        to: to_id,
        document,
    });
    Some(handle)
}
