//! Execution of specification queries: authorization resolution,
//! compilation, store execution and result post-processing. Stored
//! specifications live in their own collection of the native space.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::KgError;
use crate::logic::auth::AuthorizationContext;
use crate::logic::query::compiler;
use crate::logic::{naming, standardize};
use crate::model::specification::Specification;
use crate::model::{JsonDocument, QueryRequest, QueryResult, SchemaReference, Space};
use crate::store::traits::{Credential, GraphStore};

pub struct QueryProcessor {
    graph: Arc<dyn GraphStore>,
    auth: Arc<AuthorizationContext>,
}

impl QueryProcessor {
    pub fn new(graph: Arc<dyn GraphStore>, auth: Arc<AuthorizationContext>) -> Self {
        Self { graph, auth }
    }

    /// Run an ad-hoc specification payload.
    pub async fn query_by_specification(
        &self,
        payload: &str,
        credential: &Credential,
        request: &QueryRequest,
    ) -> Result<QueryResult, KgError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| KgError::bad_request(format!("unparsable specification: {}", e)))?;
        self.run(value, credential, request).await
    }

    /// Run a previously stored specification.
    pub async fn query_by_stored_specification(
        &self,
        schema: &SchemaReference,
        query_id: &str,
        credential: &Credential,
        request: &QueryRequest,
    ) -> Result<QueryResult, KgError> {
        let handle = naming::specification_handle(schema, query_id);
        let stored = self
            .graph
            .get_document(Space::Native, &handle)
            .await?
            .ok_or_else(|| {
                KgError::not_found(format!(
                    "no stored query {} for schema {}",
                    query_id,
                    schema.relative_path()
                ))
            })?;
        self.run(stored.into_value(), credential, request).await
    }

    /// Store a specification payload under (schema, query id). A missing id
    /// is generated. Returns the effective id.
    pub async fn store_specification(
        &self,
        schema: &SchemaReference,
        query_id: Option<&str>,
        payload: &str,
    ) -> Result<String, KgError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| KgError::bad_request(format!("unparsable specification: {}", e)))?;
        let document = JsonDocument::from_value(value)
            .ok_or_else(|| KgError::bad_request("specification payload is not an object"))?;

        // Reject specifications that would fail at query time.
        let qualified = qualify_specification(&document.clone().into_value());
        Specification::from_document(&qualified)?;

        let id = query_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let handle = naming::specification_handle(schema, &id);
        self.graph
            .upsert_document(Space::Native, &handle, document)
            .await?;
        Ok(id)
    }

    async fn run(
        &self,
        value: Value,
        credential: &Credential,
        request: &QueryRequest,
    ) -> Result<QueryResult, KgError> {
        let original_context = if request.use_original_context {
            standardize::extract_context(&value)
        } else {
            None
        };

        let specification = Specification::from_document(&qualify_specification(&value))?;

        // Authorization is resolved before any query text is built.
        let readable = self
            .auth
            .readable_organizations(credential, request.organizations.as_deref())
            .await?;
        if matches!(request.space, Space::Inferred | Space::Released) && readable.is_empty() {
            return Err(KgError::forbidden(format!(
                "no readable organization for the {:?} space",
                request.space
            )));
        }

        let query = compiler::compile(&specification, &readable, request)?;
        let rows = self.graph.execute(&query).await?;

        let results = rows
            .rows
            .into_iter()
            .map(|mut row| {
                row.remove_internal_keys();
                match &original_context {
                    Some(context) => standardize::apply_context(row, context),
                    None => row,
                }
            })
            .collect::<Vec<_>>();

        Ok(QueryResult {
            total: rows.full_count,
            size: results.len() as u64,
            start: request.pagination.start.unwrap_or(0),
            results,
        })
    }
}

/// Specifications are JSON-LD documents themselves: qualify them against
/// their own context, with the query vocabulary as the fallback for bare
/// keys.
fn qualify_specification(value: &Value) -> JsonDocument {
    use crate::model::vocab;

    let mut map = match value {
        Value::Object(map) => map.clone(),
        _ => return JsonDocument::new(),
    };
    standardize::ensure_context(&mut map, vocab::query::NAMESPACE);
    standardize::fully_qualify(&Value::Object(map))
}
