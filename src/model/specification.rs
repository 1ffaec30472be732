use serde_json::Value;

use crate::error::KgError;
use crate::model::document::JsonDocument;
use crate::model::vocab;

/// Comparison applied by a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    Contains,
}

impl FilterOp {
    fn parse(op: &str) -> Option<FilterOp> {
        match op.to_ascii_lowercase().as_str() {
            "equals" | "eq" => Some(FilterOp::Equals),
            "contains" | "like" => Some(FilterOp::Contains),
            _ => None,
        }
    }
}

/// Filter declared on a specification field. Either a fixed value or the
/// name of a caller-supplied parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub op: FilterOp,
    pub value: Option<String>,
    pub parameter: Option<String>,
}

/// One traversal step: the qualified edge name, optionally walked against
/// the edge direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTraverse {
    pub path: String,
    pub reverse: bool,
}

/// One projected field of a specification. A field without sub-fields
/// projects the property named by its path; a field with sub-fields
/// traverses the edge named by its path and projects the sub-fields on the
/// targets.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecField {
    pub field_name: String,
    pub traverse: Option<SpecTraverse>,
    pub fields: Vec<SpecField>,
    pub required: bool,
    pub sort: bool,
    pub merge: bool,
    pub filter: Option<FieldFilter>,
}

impl SpecField {
    pub fn is_leaf(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A declarative, storable description of which fields and traversals a
/// query projects for a root schema. Read-only once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    pub root_schema: String,
    pub fields: Vec<SpecField>,
}

impl Specification {
    /// Read a specification from its fully qualified JSON document.
    pub fn from_document(document: &JsonDocument) -> Result<Specification, KgError> {
        let root_schema = document
            .get_reference_id(vocab::query::ROOT_SCHEMA)
            .ok_or_else(|| KgError::bad_request("specification has no root schema"))?
            .to_string();

        let fields = match document.get(vocab::query::FIELDS) {
            Some(value) => parse_fields(value)?,
            None => Vec::new(),
        };

        if fields.is_empty() {
            return Err(KgError::bad_request("specification declares no fields"));
        }

        Ok(Specification { root_schema, fields })
    }
}

fn parse_fields(value: &Value) -> Result<Vec<SpecField>, KgError> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items.iter().map(|item| parse_field(item)).collect()
}

fn parse_field(value: &Value) -> Result<SpecField, KgError> {
    let map = value
        .as_object()
        .ok_or_else(|| KgError::bad_request("specification field is not an object"))?;

    let field_name = map
        .get(vocab::query::FIELD_NAME)
        .and_then(Value::as_str)
        .ok_or_else(|| KgError::bad_request("specification field has no fieldname"))?
        .to_string();

    let traverse = map
        .get(vocab::query::RELATIVE_PATH)
        .and_then(parse_traverse);

    let fields = match map.get(vocab::query::FIELDS) {
        Some(value) => parse_fields(value)?,
        None => Vec::new(),
    };

    let filter = map.get(vocab::query::FILTER).and_then(parse_filter);

    Ok(SpecField {
        field_name,
        traverse,
        fields,
        required: parse_flag(map.get(vocab::query::REQUIRED)),
        sort: parse_flag(map.get(vocab::query::SORT)),
        merge: parse_flag(map.get(vocab::query::MERGE)),
        filter,
    })
}

fn parse_traverse(value: &Value) -> Option<SpecTraverse> {
    match value {
        Value::String(path) => Some(SpecTraverse {
            path: path.clone(),
            reverse: false,
        }),
        Value::Object(map) => {
            let path = map.get(vocab::jsonld::ID).and_then(Value::as_str)?;
            let reverse = map
                .get(vocab::query::REVERSE)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(SpecTraverse {
                path: path.to_string(),
                reverse,
            })
        }
        // Multi-hop paths are reduced to their first step.
        Value::Array(items) => items.first().and_then(parse_traverse),
        _ => None,
    }
}

fn parse_filter(value: &Value) -> Option<FieldFilter> {
    let map = value.as_object()?;
    let op = map
        .get(vocab::query::FILTER_OP)
        .and_then(Value::as_str)
        .and_then(FilterOp::parse)?;
    let filter_value = map
        .get(vocab::query::FILTER_VALUE)
        .and_then(Value::as_str)
        .map(str::to_string);
    let parameter = map
        .get(vocab::query::FILTER_PARAMETER)
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(FieldFilter {
        op,
        value: filter_value,
        parameter,
    })
}

fn parse_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}
