//! Lowering of a parsed specification into a structured traversal query.
//! The structured form fixes the semantics — mandatory organization
//! whitelist, outermost pagination, explicit projection — and both store
//! backends execute it: the ArangoDB backend through the rendered query
//! text, the in-memory backend by direct interpretation.

use std::collections::BTreeSet;

use crate::error::KgError;
use crate::logic::naming;
use crate::model::specification::{FilterOp, SpecField, Specification};
use crate::model::{
    CollectionName, Pagination, QueryRequest, SchemaReference, Space, SubSpace,
};

/// A field filter with its value resolved; parameterized filters whose
/// parameter the caller did not supply are dropped at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub op: FilterOp,
    pub value: String,
}

/// Where a projected field takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// A property read directly off the current document.
    Property { property: String },
    /// A single traversal step over an edge collection.
    Traversal {
        edge: CollectionName,
        reverse: bool,
        fields: Vec<QueryField>,
        /// Project the single sub-field's value directly instead of
        /// nesting an object per target. Set for merged branches.
        flatten: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryField {
    pub name: String,
    pub source: FieldSource,
    pub required: bool,
    pub sort: bool,
    pub filter: Option<CompiledFilter>,
}

/// One compiled, executable graph-traversal query.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalQuery {
    pub space: Space,
    pub root_collection: CollectionName,
    /// Mandatory filter: rows outside these organizations are excluded.
    pub whitelist_organizations: Vec<String>,
    pub search_term: Option<String>,
    /// Restrict the query to the root document with this key.
    pub instance_key: Option<String>,
    /// Applied only at the outermost scope.
    pub pagination: Pagination,
    pub fields: Vec<QueryField>,
}

/// Compile a specification for one caller: the readable organizations
/// become the row whitelist, request parameters resolve field filters and
/// the requested space decides the root collection.
pub fn compile(
    specification: &Specification,
    readable_organizations: &BTreeSet<String>,
    request: &QueryRequest,
) -> Result<TraversalQuery, KgError> {
    let schema = SchemaReference::from_url(&specification.root_schema).ok_or_else(|| {
        KgError::not_found(format!(
            "no root collection for schema {}",
            specification.root_schema
        ))
    })?;

    let projected_schema = match request.space {
        Space::Editor => schema.to_sub_space(SubSpace::Editor),
        Space::Inferred => schema.to_sub_space(SubSpace::Inferred),
        Space::Native | Space::Released => schema,
    };

    let instance_key = request.instance.as_ref().map(|instance| {
        let projected = match request.space {
            Space::Editor => instance.to_sub_space(SubSpace::Editor),
            Space::Inferred => instance.to_sub_space(SubSpace::Inferred),
            Space::Native | Space::Released => instance.clone(),
        };
        naming::document_key(&projected.relative_path())
    });

    Ok(TraversalQuery {
        space: request.space,
        root_collection: naming::schema_collection(&projected_schema),
        whitelist_organizations: readable_organizations.iter().cloned().collect(),
        search_term: request.search_term.clone(),
        instance_key,
        pagination: request.pagination,
        fields: lower_fields(&specification.fields, request),
    })
}

fn lower_fields(fields: &[SpecField], request: &QueryRequest) -> Vec<QueryField> {
    let mut lowered: Vec<QueryField> = Vec::new();
    for field in fields {
        if field.merge && !field.is_leaf() {
            // A merged branch dissolves into its parent's result shape: each
            // sub-field surfaces under its own name, carried by the branch's
            // traversal. On name collisions the first-seen field wins.
            if let Some(flattened) = lower_merged_field(field, request) {
                for entry in flattened {
                    push_first_seen(&mut lowered, entry);
                }
            }
        } else if let Some(entry) = lower_field(field, request) {
            push_first_seen(&mut lowered, entry);
        }
    }
    lowered
}

fn lower_merged_field(field: &SpecField, request: &QueryRequest) -> Option<Vec<QueryField>> {
    let traverse = field.traverse.as_ref()?;
    let edge = naming::edge_collection(&traverse.path);
    let mut flattened = Vec::new();
    for child in lower_fields(&field.fields, request) {
        flattened.push(QueryField {
            name: child.name.clone(),
            required: field.required,
            sort: false,
            filter: None,
            source: FieldSource::Traversal {
                edge: edge.clone(),
                reverse: traverse.reverse,
                fields: vec![child],
                flatten: true,
            },
        });
    }
    Some(flattened)
}

fn lower_field(field: &SpecField, request: &QueryRequest) -> Option<QueryField> {
    let traverse = field.traverse.as_ref()?;
    let filter = field.filter.as_ref().and_then(|filter| {
        let value = filter
            .value
            .clone()
            .or_else(|| {
                filter
                    .parameter
                    .as_ref()
                    .and_then(|name| request.parameters.get(name).cloned())
            })?;
        Some(CompiledFilter {
            op: filter.op,
            value,
        })
    });

    let source = if field.is_leaf() {
        FieldSource::Property {
            property: traverse.path.clone(),
        }
    } else {
        FieldSource::Traversal {
            edge: naming::edge_collection(&traverse.path),
            reverse: traverse.reverse,
            fields: lower_fields(&field.fields, request),
            flatten: false,
        }
    };

    Some(QueryField {
        name: field.field_name.clone(),
        source,
        required: field.required,
        sort: field.sort,
        filter,
    })
}

fn push_first_seen(fields: &mut Vec<QueryField>, field: QueryField) {
    if !fields.iter().any(|existing| existing.name == field.name) {
        fields.push(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::specification::{FieldFilter, SpecTraverse};
    use crate::model::InstanceReference;

    fn leaf(name: &str, path: &str) -> SpecField {
        SpecField {
            field_name: name.to_string(),
            traverse: Some(SpecTraverse {
                path: path.to_string(),
                reverse: false,
            }),
            fields: Vec::new(),
            required: false,
            sort: false,
            merge: false,
            filter: None,
        }
    }

    fn specification(fields: Vec<SpecField>) -> Specification {
        Specification {
            root_schema: "https://schema.kgraph.dev/org/dom/schema/v1.0.0".to_string(),
            fields,
        }
    }

    fn orgs(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn compiles_the_root_collection_and_whitelist() {
        let query = compile(
            &specification(vec![leaf("query:name", "http://schema.org/name")]),
            &orgs(&["org"]),
            &QueryRequest::default(),
        )
        .unwrap();
        assert_eq!(query.root_collection.as_str(), "org-dom-schema-v1_0_0");
        assert_eq!(query.whitelist_organizations, vec!["org".to_string()]);
        assert_eq!(query.fields.len(), 1);
        assert!(matches!(
            &query.fields[0].source,
            FieldSource::Property { property } if property == "http://schema.org/name"
        ));
    }

    #[test]
    fn inferred_space_projects_the_root_collection() {
        let request = QueryRequest {
            space: Space::Inferred,
            ..Default::default()
        };
        let query = compile(
            &specification(vec![leaf("query:name", "http://schema.org/name")]),
            &orgs(&["org"]),
            &request,
        )
        .unwrap();
        assert_eq!(
            query.root_collection.as_str(),
            "orginferred-dom-schema-v1_0_0"
        );
    }

    #[test]
    fn unparsable_root_schema_is_a_missing_root_collection() {
        let spec = Specification {
            root_schema: "not-a-schema".to_string(),
            fields: vec![leaf("query:name", "http://schema.org/name")],
        };
        assert!(matches!(
            compile(&spec, &orgs(&["org"]), &QueryRequest::default()),
            Err(KgError::NotFound(_))
        ));
    }

    #[test]
    fn parameterized_filters_resolve_from_the_request() {
        let mut field = leaf("query:name", "http://schema.org/name");
        field.filter = Some(FieldFilter {
            op: FilterOp::Contains,
            value: None,
            parameter: Some("name".to_string()),
        });

        let mut request = QueryRequest::default();
        let query = compile(
            &specification(vec![field.clone()]),
            &orgs(&["org"]),
            &request,
        )
        .unwrap();
        // Missing parameter: the filter is dropped.
        assert!(query.fields[0].filter.is_none());

        request
            .parameters
            .insert("name".to_string(), "foo".to_string());
        let query = compile(&specification(vec![field]), &orgs(&["org"]), &request).unwrap();
        assert_eq!(
            query.fields[0].filter,
            Some(CompiledFilter {
                op: FilterOp::Contains,
                value: "foo".to_string()
            })
        );
    }

    #[test]
    fn merged_branches_flatten_into_the_parent_shape_first_seen_wins() {
        let mut branch = SpecField {
            field_name: "query:people".to_string(),
            traverse: Some(SpecTraverse {
                path: "https://schema.kgraph.dev/org/dom/schema/v1.0.0/people".to_string(),
                reverse: false,
            }),
            fields: vec![
                leaf("query:name", "http://schema.org/name"),
                leaf("query:role", "https://schema.kgraph.dev/org/dom/schema/v1.0.0/role"),
            ],
            required: false,
            sort: false,
            merge: true,
            filter: None,
        };

        let query = compile(
            &specification(vec![
                leaf("query:name", "http://schema.org/name"),
                branch.clone(),
            ]),
            &orgs(&["org"]),
            &QueryRequest::default(),
        )
        .unwrap();

        // query:name came first at root level, so the merged branch only
        // contributes query:role.
        let names: Vec<&str> = query.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["query:name", "query:role"]);
        assert!(matches!(
            &query.fields[1].source,
            FieldSource::Traversal { flatten: true, .. }
        ));

        // Without the merge flag the branch nests as usual.
        branch.merge = false;
        let query = compile(
            &specification(vec![branch]),
            &orgs(&["org"]),
            &QueryRequest::default(),
        )
        .unwrap();
        assert_eq!(query.fields[0].name, "query:people");
        assert!(matches!(
            &query.fields[0].source,
            FieldSource::Traversal { flatten: false, fields, .. } if fields.len() == 2
        ));
    }

    #[test]
    fn instance_restriction_compiles_to_the_projected_document_key() {
        let request = QueryRequest {
            instance: Some(InstanceReference::new(
                SchemaReference::new("org", "dom", "schema", "v1.0.0"),
                "x1",
            )),
            ..Default::default()
        };
        let query = compile(
            &specification(vec![leaf("query:name", "http://schema.org/name")]),
            &orgs(&["org"]),
            &request,
        )
        .unwrap();
        assert_eq!(
            query.instance_key.as_deref(),
            Some("org-dom-schema-v1_0_0-x1")
        );
    }
}
