//! Transformation of a fully qualified JSON-LD document into a vertex/edge
//! graph. The recursion walks the JSON tree once; vertices are collected
//! into a flat arena in creation order with the instance's root vertex
//! first, and edges address their targets by id so embedded and external
//! links stay structurally distinct.

use serde_json::{Map, Value};

use crate::logic::naming;
use crate::model::document::JsonDocument;
use crate::model::graph::{Edge, EdgeTarget, Property, Vertex};
use crate::model::reference::InstanceReference;
use crate::model::vocab;

/// Transform a qualified document into its vertices and outgoing edges.
///
/// The root object inherits its identity from the instance reference when
/// the payload does not carry one, so synthesized child identifiers always
/// chain off a stable root.
pub fn transform(document: &JsonDocument, reference: &InstanceReference) -> Vec<Vertex> {
    let mut root = document.0.clone();
    root.entry(vocab::jsonld::ID.to_string())
        .or_insert_with(|| Value::String(reference.full_id(false)));
    root.entry(vocab::graph::UUID.to_string())
        .or_insert_with(|| Value::String(naming::document_key(&reference.relative_path())));
    root.entry(vocab::graph::REVISION.to_string())
        .or_insert_with(|| Value::from(reference.revision.unwrap_or(1)));

    let mut arena = Vec::new();
    create_vertex(
        None,
        &Value::Object(root),
        None,
        &mut arena,
        None,
        Some(reference.schema.relative_path()),
    );
    arena
}

fn create_vertex(
    key: Option<&str>,
    value: &Value,
    parent: Option<usize>,
    arena: &mut Vec<Vertex>,
    order_number: Option<usize>,
    label: Option<String>,
) {
    match value {
        Value::Object(map) => {
            // Empty objects are silently dropped.
            if map.is_empty() {
                return;
            }
            let mut vertex = Vertex::default();
            extract_label(map, &mut vertex, label);
            extract_id(key, parent, map, arena, &mut vertex, order_number);
            extract_uuid(key, parent, map, arena, &mut vertex, order_number);
            extract_revision(parent, map, arena, &mut vertex);
            extract_deprecated(parent, map, arena, &mut vertex);

            // A value wrapper never becomes a vertex; the wrapped content is
            // processed under the already-resolved type.
            if let Some(wrapped) = map.get(vocab::jsonld::VALUE) {
                create_vertex(
                    key,
                    wrapped,
                    parent,
                    arena,
                    order_number,
                    vertex.vertex_type.clone(),
                );
                return;
            }

            // Ordered lists expand into their elements with explicit order
            // numbers; the wrapping object itself produces nothing.
            if let Some(Value::Array(items)) = map.get(vocab::jsonld::LIST) {
                for (index, item) in items.iter().enumerate() {
                    create_vertex(
                        key,
                        item,
                        parent,
                        arena,
                        Some(index),
                        vertex.vertex_type.clone(),
                    );
                }
                return;
            }

            if let Some(parent_index) = parent {
                let external = map.contains_key(vocab::jsonld::ID) && vertex_has_explicit_id(map);
                let edge = build_edge(key, map, &vertex, order_number, external);
                if let Some(edge) = edge {
                    let stop = edge.is_external();
                    arena[parent_index].edges.push(edge);
                    if stop {
                        // External connections are stored as references; the
                        // branch below them belongs to another document.
                        return;
                    }
                }
            }

            arena.push(vertex);
            let vertex_index = arena.len() - 1;
            for (child_key, child_value) in map {
                create_vertex(
                    Some(child_key.as_str()),
                    child_value,
                    Some(vertex_index),
                    arena,
                    None,
                    Some(child_key.clone()),
                );
            }
        }
        Value::Array(items) => {
            for item in items {
                create_vertex(
                    key,
                    item,
                    parent,
                    arena,
                    None,
                    key.map(str::to_string).or_else(|| label.clone()),
                );
            }
        }
        scalar => {
            if let (Some(parent_index), Some(key)) = (parent, key) {
                arena[parent_index]
                    .properties
                    .push(Property::new(key, scalar.clone()));
            }
        }
    }
}

fn vertex_has_explicit_id(map: &Map<String, Value>) -> bool {
    matches!(map.get(vocab::jsonld::ID), Some(Value::String(_)))
}

fn build_edge(
    key: Option<&str>,
    map: &Map<String, Value>,
    vertex: &Vertex,
    order_number: Option<usize>,
    external: bool,
) -> Option<Edge> {
    let name = key?.to_string();
    let target = if external {
        EdgeTarget::External {
            reference: map
                .get(vocab::jsonld::ID)
                .and_then(Value::as_str)?
                .to_string(),
        }
    } else {
        EdgeTarget::Embedded {
            vertex_id: vertex.id.clone()?,
        }
    };
    let properties = map
        .iter()
        .map(|(property_key, property_value)| {
            Property::new(property_key.as_str(), property_value.clone())
        })
        .collect();
    Some(Edge {
        name,
        target,
        order_number,
        properties,
    })
}

fn extract_label(map: &Map<String, Value>, vertex: &mut Vertex, label: Option<String>) {
    // First match wins: explicit label, schema hint, then @type.
    if label.is_some() {
        vertex.vertex_type = label;
        return;
    }
    if let Some(schema) = map.get(vocab::repository::SCHEMA).and_then(Value::as_str) {
        vertex.vertex_type = Some(schema.to_string());
        return;
    }
    vertex.vertex_type = match map.get(vocab::jsonld::TYPE) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
}

fn extract_id(
    key: Option<&str>,
    parent: Option<usize>,
    map: &Map<String, Value>,
    arena: &mut [Vertex],
    vertex: &mut Vertex,
    order_number: Option<usize>,
) {
    if let Some(id) = map.get(vocab::jsonld::ID).and_then(Value::as_str) {
        vertex.id = Some(id.to_string());
        return;
    }
    if let (Some(parent_index), Some(key)) = (parent, key) {
        if let Some(parent_id) = arena[parent_index].id.clone() {
            let id = synthesize_identifier(&parent_id, key, order_number);
            vertex.id = Some(id.clone());
            vertex.add_property(vocab::jsonld::ID, id);
        }
    }
}

fn extract_uuid(
    key: Option<&str>,
    parent: Option<usize>,
    map: &Map<String, Value>,
    arena: &mut [Vertex],
    vertex: &mut Vertex,
    order_number: Option<usize>,
) {
    if let Some(uuid) = map.get(vocab::graph::UUID).and_then(Value::as_str) {
        vertex.uuid = Some(uuid.to_string());
        return;
    }
    if let (Some(parent_index), Some(key)) = (parent, key) {
        if let Some(parent_uuid) = arena[parent_index].uuid.clone() {
            let uuid = synthesize_identifier(&parent_uuid, key, order_number);
            vertex.uuid = Some(uuid.clone());
            vertex.add_property(vocab::graph::UUID, uuid);
        }
    }
}

fn extract_revision(
    parent: Option<usize>,
    map: &Map<String, Value>,
    arena: &mut [Vertex],
    vertex: &mut Vertex,
) {
    if let Some(revision) = map.get(vocab::graph::REVISION).and_then(Value::as_u64) {
        vertex.revision = Some(revision);
        return;
    }
    if let Some(parent_index) = parent {
        if let Some(revision) = arena[parent_index].revision {
            vertex.revision = Some(revision);
            vertex.add_property(vocab::graph::REVISION, revision);
        }
    }
}

fn extract_deprecated(
    parent: Option<usize>,
    map: &Map<String, Value>,
    arena: &mut [Vertex],
    vertex: &mut Vertex,
) {
    if let Some(deprecated) = map.get(vocab::graph::DEPRECATED).and_then(Value::as_bool) {
        vertex.deprecated = Some(deprecated);
        return;
    }
    if let Some(parent_index) = parent {
        if let Some(deprecated) = arena[parent_index].deprecated {
            vertex.deprecated = Some(deprecated);
            vertex.add_property(vocab::graph::DEPRECATED, deprecated);
        }
    }
}

fn synthesize_identifier(parent_id: &str, key: &str, order_number: Option<usize>) -> String {
    match order_number {
        Some(n) => format!("{}#{}-{}", parent_id, key, n),
        None => format!("{}#{}", parent_id, key),
    }
}
