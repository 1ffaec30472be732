use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::KgError;
use crate::logic::auth::AuthorizationContext;
use crate::logic::indexing::IndexingOrchestrator;
use crate::logic::query::QueryProcessor;
use crate::model::{
    IndexingMessage, InstanceReference, Pagination, QueryRequest, QueryResult, SchemaReference,
    Space,
};
use crate::store::traits::Credential;

/// Shared state of the thin HTTP layer: the core components only.
pub struct AppState {
    pub indexing: Arc<IndexingOrchestrator>,
    pub queries: Arc<QueryProcessor>,
    pub auth: Arc<AuthorizationContext>,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct IndexingResponse {
    /// Number of graph operations committed for this request.
    pub operations: usize,
}

#[derive(Debug, Serialize)]
pub struct StoredQueryResponse {
    pub id: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(error: KgError) -> HandlerError {
    let status = match &error {
        KgError::BadRequest(_) => StatusCode::BAD_REQUEST,
        KgError::Forbidden(_) => StatusCode::FORBIDDEN,
        KgError::NotFound(_) => StatusCode::NOT_FOUND,
        KgError::Storage(_) | KgError::Upstream(_) => StatusCode::BAD_GATEWAY,
        KgError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn credential_from(headers: &HeaderMap) -> Credential {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            Credential::Token(
                value
                    .strip_prefix("Bearer ")
                    .unwrap_or(value)
                    .to_string(),
            )
        })
        .unwrap_or(Credential::Anonymous)
}

fn timestamp_or_now(params: &HashMap<String, String>) -> String {
    params
        .get("eventDateTime")
        .cloned()
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339())
}

/// Reserved query parameter names; everything else feeds parameterized
/// specification filters.
const RESERVED_PARAMETERS: [&str; 7] = [
    "start",
    "size",
    "search",
    "orgs",
    "databaseScope",
    "withContext",
    "instance",
];

fn parse_query_request(params: &HashMap<String, String>) -> Result<QueryRequest, KgError> {
    let parse_number = |key: &str| -> Result<Option<u64>, KgError> {
        params
            .get(key)
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|_| KgError::bad_request(format!("invalid {}: {}", key, value)))
            })
            .transpose()
    };

    let space = match params.get("databaseScope").map(String::as_str) {
        None => Space::Native,
        Some(scope) => match scope.to_ascii_uppercase().as_str() {
            "NATIVE" => Space::Native,
            "EDITOR" => Space::Editor,
            "INFERRED" => Space::Inferred,
            "RELEASED" => Space::Released,
            other => {
                return Err(KgError::bad_request(format!(
                    "unknown database scope: {}",
                    other
                )))
            }
        },
    };

    let instance = params
        .get("instance")
        .map(|url| {
            InstanceReference::from_url(url)
                .ok_or_else(|| KgError::bad_request(format!("invalid instance reference: {}", url)))
        })
        .transpose()?;

    let organizations = params.get("orgs").map(|orgs| {
        orgs.split(',')
            .map(str::trim)
            .filter(|org| !org.is_empty())
            .map(str::to_string)
            .collect()
    });

    let parameters = params
        .iter()
        .filter(|(key, _)| !RESERVED_PARAMETERS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(QueryRequest {
        space,
        pagination: Pagination::new(parse_number("start")?, parse_number("size")?),
        search_term: params.get("search").cloned(),
        organizations,
        instance,
        parameters,
        use_original_context: params.get("withContext").map(String::as_str) == Some("true"),
    })
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn add_instance(
    State(state): State<SharedState>,
    Path((org, domain, schema, version, id)): Path<(String, String, String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    payload: String,
) -> Result<Json<IndexingResponse>, HandlerError> {
    let reference =
        InstanceReference::new(SchemaReference::new(org, domain, schema, version), id)
            .with_revision(1);
    let message = IndexingMessage::new(
        reference,
        payload,
        Some(timestamp_or_now(&params)),
        params.get("authorId").cloned(),
    );
    let todo_list = state.indexing.insert(message).await.map_err(error_response)?;
    Ok(Json(IndexingResponse {
        operations: todo_list.len(),
    }))
}

pub async fn update_instance(
    State(state): State<SharedState>,
    Path((org, domain, schema, version, id, rev)): Path<(
        String,
        String,
        String,
        String,
        String,
        u64,
    )>,
    Query(params): Query<HashMap<String, String>>,
    payload: String,
) -> Result<Json<IndexingResponse>, HandlerError> {
    let reference =
        InstanceReference::new(SchemaReference::new(org, domain, schema, version), id)
            .with_revision(rev);
    let message = IndexingMessage::new(
        reference,
        payload,
        Some(timestamp_or_now(&params)),
        params.get("authorId").cloned(),
    );
    let todo_list = state.indexing.update(message).await.map_err(error_response)?;
    Ok(Json(IndexingResponse {
        operations: todo_list.len(),
    }))
}

pub async fn delete_instance(
    State(state): State<SharedState>,
    Path((org, domain, schema, version, id)): Path<(String, String, String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<IndexingResponse>, HandlerError> {
    let mut reference =
        InstanceReference::new(SchemaReference::new(org, domain, schema, version), id);
    if let Some(rev) = params.get("rev").and_then(|value| value.parse().ok()) {
        reference = reference.with_revision(rev);
    }
    let todo_list = state
        .indexing
        .delete(&reference)
        .await
        .map_err(error_response)?;
    Ok(Json(IndexingResponse {
        operations: todo_list.len(),
    }))
}

pub async fn clear_graph(
    State(state): State<SharedState>,
) -> Result<StatusCode, HandlerError> {
    state.indexing.clear().await.map_err(error_response)?;
    Ok(StatusCode::OK)
}

pub async fn flush_auth(State(state): State<SharedState>) -> StatusCode {
    state.auth.flush();
    StatusCode::OK
}

pub async fn run_query(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    payload: String,
) -> Result<Json<QueryResult>, HandlerError> {
    let request = parse_query_request(&params).map_err(error_response)?;
    let credential = credential_from(&headers);
    let result = state
        .queries
        .query_by_specification(&payload, &credential, &request)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}

pub async fn save_query(
    State(state): State<SharedState>,
    Path((org, domain, schema, version, query_id)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
    payload: String,
) -> Result<Json<StoredQueryResponse>, HandlerError> {
    let schema = SchemaReference::new(org, domain, schema, version);
    let id = state
        .queries
        .store_specification(&schema, Some(&query_id), &payload)
        .await
        .map_err(error_response)?;
    Ok(Json(StoredQueryResponse { id }))
}

pub async fn run_stored_query(
    State(state): State<SharedState>,
    Path((org, domain, schema, version, query_id)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<QueryResult>, HandlerError> {
    let schema = SchemaReference::new(org, domain, schema, version);
    let request = parse_query_request(&params).map_err(error_response)?;
    let credential = credential_from(&headers);
    let result = state
        .queries
        .query_by_stored_specification(&schema, &query_id, &credential, &request)
        .await
        .map_err(error_response)?;
    Ok(Json(result))
}
