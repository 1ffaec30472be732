//! Rendering of a compiled traversal query into AQL text for the ArangoDB
//! backend. Every name and value woven into the text first passes the
//! allow-list sanitizer; this is the hard boundary against structural query
//! injection, not a formatting helper.

use crate::logic::query::compiler::{CompiledFilter, FieldSource, QueryField, TraversalQuery};
use crate::model::specification::FilterOp;
use crate::model::vocab;

/// Strip every character outside the safe allow-list. Backticks, quotes and
/// statement separators can never reach the query text.
pub fn prevent_injection(value: &str) -> String {
    value
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | ':' | '.' | '/' | '#' | '@')
        })
        .collect()
}

struct QueryWriter {
    text: String,
    indent: usize,
    alias_counter: usize,
}

impl QueryWriter {
    fn new() -> Self {
        Self {
            text: String::new(),
            indent: 0,
            alias_counter: 0,
        }
    }

    fn line(&mut self, content: &str) {
        for _ in 0..self.indent {
            self.text.push_str("   ");
        }
        self.text.push_str(content);
        self.text.push('\n');
    }

    fn next_alias(&mut self, hint: &str) -> String {
        let cleaned: String = prevent_injection(hint)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let alias = format!("f{}_{}", self.alias_counter, cleaned);
        self.alias_counter += 1;
        alias
    }
}

/// Render the executable query text.
pub fn render(query: &TraversalQuery) -> String {
    let mut writer = QueryWriter::new();

    let whitelist = query
        .whitelist_organizations
        .iter()
        .map(|org| format!("\"{}\"", prevent_injection(org)))
        .collect::<Vec<_>>()
        .join(", ");
    writer.line(&format!("LET whitelist_organizations = [{}]", whitelist));

    writer.line(&format!(
        "FOR doc IN `{}`",
        prevent_injection(query.root_collection.as_str())
    ));
    writer.indent += 1;
    writer.line(&format!(
        "FILTER doc.`{}` IN whitelist_organizations",
        vocab::internal::PERMISSION_GROUP
    ));

    if let Some(instance_key) = &query.instance_key {
        writer.line(&format!(
            "FILTER doc.`{}` == \"{}\"",
            vocab::internal::KEY,
            prevent_injection(instance_key)
        ));
    }

    if let Some(term) = &query.search_term {
        writer.line(&format!(
            "FILTER LIKE(LOWER(doc.`{}`), \"%{}%\")",
            prevent_injection(vocab::schema_org::NAME),
            prevent_injection(&term.to_lowercase())
        ));
    }

    let projections = render_fields(&mut writer, &query.fields, "doc");

    let sort_properties: Vec<String> = query
        .fields
        .iter()
        .filter(|field| field.sort)
        .filter_map(|field| match &field.source {
            FieldSource::Property { property } => {
                Some(format!("doc.`{}`", prevent_injection(property)))
            }
            FieldSource::Traversal { .. } => None,
        })
        .collect();
    if !sort_properties.is_empty() {
        writer.line(&format!("SORT {} ASC", sort_properties.join(", ")));
    }

    // The pagination window applies at the outermost scope only.
    if query.pagination.start.is_some() || query.pagination.size.is_some() {
        writer.line(&format!(
            "LIMIT {}, {}",
            query.pagination.start.unwrap_or(0),
            query.pagination.size.unwrap_or(u64::MAX)
        ));
    }

    writer.line(&format!("RETURN {{{}}}", projections.join(", ")));
    writer.indent -= 1;

    writer.text
}

/// Emit the LET blocks and filters of one field list; returns the
/// projection entries for the enclosing RETURN.
fn render_fields(writer: &mut QueryWriter, fields: &[QueryField], doc_var: &str) -> Vec<String> {
    let mut projections = Vec::new();
    for field in fields {
        let name = prevent_injection(&field.name);
        match &field.source {
            FieldSource::Property { property } => {
                let property = prevent_injection(property);
                if let Some(filter) = &field.filter {
                    writer.line(&render_filter(doc_var, &property, filter));
                }
                if field.required {
                    writer.line(&format!("FILTER {}.`{}` != NULL", doc_var, property));
                }
                projections.push(format!("\"{}\": {}.`{}`", name, doc_var, property));
            }
            FieldSource::Traversal {
                edge,
                reverse,
                fields: sub_fields,
                flatten,
            } => {
                let alias = writer.next_alias(&field.name);
                let direction = if *reverse { "INBOUND" } else { "OUTBOUND" };
                writer.line(&format!("LET {} = (", alias));
                writer.indent += 1;
                writer.line(&format!(
                    "FOR {alias}_doc, {alias}_edge IN 1..1 {direction} {doc_var} `{edge}`",
                    alias = alias,
                    direction = direction,
                    doc_var = doc_var,
                    edge = prevent_injection(edge.as_str()),
                ));
                writer.indent += 1;
                writer.line(&format!(
                    "SORT {}_edge.`{}` ASC",
                    alias,
                    vocab::internal::ORDER_NUMBER
                ));
                let target_var = format!("{}_doc", alias);
                let sub_projections = render_fields(writer, sub_fields, &target_var);
                if *flatten {
                    // A flattened branch projects its single field's value.
                    match sub_fields.first().map(|f| &f.source) {
                        Some(FieldSource::Property { property }) => {
                            writer.line(&format!(
                                "RETURN {}.`{}`",
                                target_var,
                                prevent_injection(property)
                            ));
                        }
                        _ => {
                            writer.line(&format!("RETURN {{{}}}", sub_projections.join(", ")));
                        }
                    }
                } else {
                    writer.line(&format!("RETURN {{{}}}", sub_projections.join(", ")));
                }
                writer.indent -= 2;
                writer.line(")");
                if field.required {
                    writer.line(&format!("FILTER LENGTH({}) > 0", alias));
                }
                projections.push(format!("\"{}\": {}", name, alias));
            }
        }
    }
    projections
}

fn render_filter(doc_var: &str, property: &str, filter: &CompiledFilter) -> String {
    let value = prevent_injection(&filter.value);
    match filter.op {
        FilterOp::Equals => format!("FILTER {}.`{}` == \"{}\"", doc_var, property, value),
        FilterOp::Contains => format!(
            "FILTER LIKE(LOWER({}.`{}`), \"%{}%\")",
            doc_var,
            property,
            value.to_lowercase()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::query::compiler::{FieldSource, QueryField, TraversalQuery};
    use crate::model::handle::CollectionName;
    use crate::model::{Pagination, Space};

    fn property_field(name: &str, property: &str) -> QueryField {
        QueryField {
            name: name.to_string(),
            source: FieldSource::Property {
                property: property.to_string(),
            },
            required: false,
            sort: false,
            filter: None,
        }
    }

    fn base_query(fields: Vec<QueryField>) -> TraversalQuery {
        TraversalQuery {
            space: Space::Native,
            root_collection: CollectionName::from_raw("org-dom-schema-v1_0_0"),
            whitelist_organizations: vec!["org".to_string()],
            search_term: None,
            instance_key: None,
            pagination: Pagination::default(),
            fields,
        }
    }

    #[test]
    fn sanitizer_strips_injection_metacharacters() {
        assert_eq!(prevent_injection("FOR `x`; \"y\""), "FORxy");
        assert_eq!(
            prevent_injection("http://schema.org/name"),
            "http://schema.org/name"
        );
        assert_eq!(prevent_injection("a-b_c:d.e/f#g@h"), "a-b_c:d.e/f#g@h");
    }

    #[test]
    fn the_whitelist_filter_is_always_rendered() {
        let text = render(&base_query(vec![property_field(
            "query:name",
            "http://schema.org/name",
        )]));
        assert!(text.contains("FILTER doc.`_permissionGroup` IN whitelist_organizations"));
        assert!(text.contains("LET whitelist_organizations = [\"org\"]"));
    }

    #[test]
    fn malicious_names_cannot_break_out_of_the_query_structure() {
        let mut query = base_query(vec![property_field(
            "query:name\"; RETURN doc //",
            "http://schema.org/name` REMOVE doc IN x //",
        )]);
        query.whitelist_organizations = vec!["org\" OR true".to_string()];
        query.search_term = Some("term\"; DROP".to_string());

        let text = render(&query);
        assert!(!text.contains(';'));
        assert!(!text.contains("\"; "));
        assert!(!text.contains("` REMOVE"));
        // The payload survives only in its defanged form.
        assert!(text.contains("%termDROP%") || text.contains("%termdrop%"));
    }

    #[test]
    fn pagination_is_rendered_once_at_the_outermost_scope() {
        let nested = QueryField {
            name: "query:children".to_string(),
            source: FieldSource::Traversal {
                edge: CollectionName::from_raw("rel-children"),
                reverse: false,
                fields: vec![property_field("query:name", "http://schema.org/name")],
                flatten: false,
            },
            required: true,
            sort: false,
            filter: None,
        };
        let mut query = base_query(vec![nested]);
        query.pagination = Pagination::new(Some(10), Some(20));

        let text = render(&query);
        assert_eq!(text.matches("LIMIT").count(), 1);
        assert!(text.contains("LIMIT 10, 20"));
        assert!(text.contains("FILTER LENGTH(f0_query_children) > 0"));
        assert!(text.contains("IN 1..1 OUTBOUND doc `rel-children`"));
    }

    #[test]
    fn reverse_traversals_walk_inbound() {
        let query = base_query(vec![QueryField {
            name: "query:parents".to_string(),
            source: FieldSource::Traversal {
                edge: CollectionName::from_raw("rel-children"),
                reverse: true,
                fields: vec![property_field("query:name", "http://schema.org/name")],
                flatten: false,
            },
            required: false,
            sort: false,
            filter: None,
        }]);
        assert!(render(&query).contains("INBOUND doc `rel-children`"));
    }
}
