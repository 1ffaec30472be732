//! ArangoDB-backed graph store, spoken to over its HTTP API. Each space
//! maps to its own database; collections are created lazily as plans touch
//! them. Reads go through the cursor API, plan commits through a server-side
//! transaction so a plan applies atomically within its space.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::KgError;
use crate::logic::query::aql;
use crate::logic::query::compiler::TraversalQuery;
use crate::model::vocab;
use crate::model::{
    CollectionName, DocumentHandle, JsonDocument, Space, TodoItem, TodoList,
};
use crate::store::traits::{DocumentKind, FootprintEntry, GraphStore, QueryRows};

/// Arango error number for an unknown collection.
const ERROR_COLLECTION_NOT_FOUND: i64 = 1203;

#[derive(Debug, Clone)]
pub struct ArangoStore {
    client: reqwest::Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl ArangoStore {
    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn database_name(&self, space: Space) -> String {
        match space {
            Space::Native => self.database.clone(),
            Space::Editor => format!("{}-editor", self.database),
            Space::Inferred => format!("{}-inferred", self.database),
            Space::Released => format!("{}-released", self.database),
        }
    }

    fn url(&self, space: Space, path: &str) -> String {
        format!(
            "{}/_db/{}/{}",
            self.base_url,
            self.database_name(space),
            path
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn ensure_database(&self, space: Space) -> Result<(), KgError> {
        let url = format!("{}/_db/_system/_api/database", self.base_url);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&json!({"name": self.database_name(space)}))
            .send()
            .await
            .map_err(storage_error)?;
        // 409: the database already exists.
        if response.status().is_success() || response.status().as_u16() == 409 {
            Ok(())
        } else {
            Err(status_error("create database", response).await)
        }
    }

    async fn ensure_collection(
        &self,
        space: Space,
        collection: &CollectionName,
    ) -> Result<(), KgError> {
        let collection_type = if collection.is_edge_collection() { 3 } else { 2 };
        let response = self
            .request(reqwest::Method::POST, self.url(space, "_api/collection"))
            .json(&json!({"name": collection.as_str(), "type": collection_type}))
            .send()
            .await
            .map_err(storage_error)?;
        if response.status().is_success() || response.status().as_u16() == 409 {
            Ok(())
        } else {
            Err(status_error("create collection", response).await)
        }
    }

    async fn list_collections(&self, space: Space) -> Result<Vec<CollectionName>, KgError> {
        let response = self
            .request(
                reqwest::Method::GET,
                self.url(space, "_api/collection?excludeSystem=true"),
            )
            .send()
            .await
            .map_err(storage_error)?;
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let body: Value = response.json().await.map_err(storage_error)?;
        let names = body["result"]
            .as_array()
            .map(|collections| {
                collections
                    .iter()
                    .filter_map(|c| c["name"].as_str())
                    .map(CollectionName::from_raw)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    /// Run one cursor query and drain all batches.
    async fn cursor(
        &self,
        space: Space,
        query: &str,
        bind_vars: Value,
        full_count: bool,
    ) -> Result<(u64, Vec<Value>), KgError> {
        let response = self
            .request(reqwest::Method::POST, self.url(space, "_api/cursor"))
            .json(&json!({
                "query": query,
                "bindVars": bind_vars,
                "batchSize": 500,
                "options": {"fullCount": full_count}
            }))
            .send()
            .await
            .map_err(storage_error)?;

        let status = response.status();
        let mut body: Value = response.json().await.map_err(storage_error)?;
        if !status.is_success() {
            if body["errorNum"].as_i64() == Some(ERROR_COLLECTION_NOT_FOUND) {
                return Err(KgError::not_found("root collection does not exist"));
            }
            return Err(KgError::Storage(format!(
                "query rejected ({}): {}",
                status,
                body["errorMessage"].as_str().unwrap_or("unknown error")
            )));
        }

        let mut results: Vec<Value> = body["result"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let full = body["extra"]["stats"]["fullCount"]
            .as_u64()
            .unwrap_or(results.len() as u64);

        while body["hasMore"].as_bool() == Some(true) {
            let id = body["id"].as_str().unwrap_or_default().to_string();
            body = self
                .request(
                    reqwest::Method::PUT,
                    self.url(space, &format!("_api/cursor/{}", id)),
                )
                .send()
                .await
                .map_err(storage_error)?
                .json()
                .await
                .map_err(storage_error)?;
            if let Some(batch) = body["result"].as_array() {
                results.extend(batch.iter().cloned());
            }
        }

        Ok((full, results))
    }
}

fn storage_error(error: reqwest::Error) -> KgError {
    KgError::Storage(error.to_string())
}

async fn status_error(action: &str, response: reqwest::Response) -> KgError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    KgError::Storage(format!("{} failed ({}): {}", action, status, body))
}

#[async_trait::async_trait]
impl GraphStore for ArangoStore {
    async fn commit(&self, todo_list: &TodoList) -> Result<(), KgError> {
        if todo_list.is_empty() {
            return Ok(());
        }

        // Transactions are scoped to one database, so the plan commits
        // atomically per space.
        let mut by_space: BTreeMap<Space, Vec<&TodoItem>> = BTreeMap::new();
        for item in todo_list.iter() {
            by_space.entry(item.space()).or_default().push(item);
        }

        for (space, items) in by_space {
            self.ensure_database(space).await?;
            let mut collections: BTreeSet<&CollectionName> = BTreeSet::new();
            for item in &items {
                collections.insert(&item.handle().collection);
            }
            for collection in &collections {
                self.ensure_collection(space, collection).await?;
            }

            let operations: Vec<Value> = items
                .iter()
                .map(|item| match item {
                    TodoItem::UpsertVertex {
                        handle, document, ..
                    }
                    | TodoItem::UpsertEdge {
                        handle, document, ..
                    } => json!({
                        "op": "upsert",
                        "collection": handle.collection.as_str(),
                        "key": handle.key,
                        "document": document,
                    }),
                    TodoItem::DeleteVertex { handle, .. } | TodoItem::DeleteEdge { handle, .. } => {
                        json!({
                            "op": "delete",
                            "collection": handle.collection.as_str(),
                            "key": handle.key,
                        })
                    }
                })
                .collect();

            let action = "function (params) {\
                 var db = require('@arangodb').db;\
                 params.items.forEach(function (item) {\
                   var collection = db._collection(item.collection);\
                   if (item.op === 'upsert') {\
                     collection.insert(item.document, {overwrite: true});\
                   } else if (collection.exists(item.key)) {\
                     collection.remove(item.key);\
                   }\
                 });\
               }";

            let write_collections: Vec<&str> =
                collections.iter().map(|c| c.as_str()).collect();
            let response = self
                .request(reqwest::Method::POST, self.url(space, "_api/transaction"))
                .json(&json!({
                    "collections": {"write": write_collections},
                    "action": action,
                    "params": {"items": operations}
                }))
                .send()
                .await
                .map_err(storage_error)?;
            if !response.status().is_success() {
                return Err(status_error("commit execution plan", response).await);
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
        self.ensure_database(space).await?;
        self.ensure_collection(space, &handle.collection).await?;

        let mut payload: Map<String, Value> = document.0;
        payload.insert(
            vocab::internal::KEY.to_string(),
            Value::String(handle.key.clone()),
        );
        let response = self
            .request(
                reqwest::Method::POST,
                self.url(
                    space,
                    &format!("_api/document/{}?overwrite=true", handle.collection),
                ),
            )
            .json(&Value::Object(payload))
            .send()
            .await
            .map_err(storage_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error("upsert document", response).await)
        }
    }

    async fn get_document(
        &self,
        space: Space,
        handle: &DocumentHandle,
    ) -> Result<Option<JsonDocument>, KgError> {
        let response = self
            .request(
                reqwest::Method::GET,
                self.url(space, &format!("_api/document/{}", handle.id())),
            )
            .send()
            .await
            .map_err(storage_error)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error("fetch document", response).await);
        }
        let value: Value = response.json().await.map_err(storage_error)?;
        Ok(JsonDocument::from_value(value))
    }

    async fn find_by_property(
        &self,
        space: Space,
        collection: &CollectionName,
        property: &str,
        value: &str,
    ) -> Result<Vec<JsonDocument>, KgError> {
        let result = self
            .cursor(
                space,
                "FOR doc IN @@collection FILTER doc.@property == @value RETURN doc",
                json!({
                    "@collection": collection.as_str(),
                    "property": property,
                    "value": value,
                }),
                false,
            )
            .await;
        let rows = match result {
            Ok((_, rows)) => rows,
            Err(KgError::NotFound(_)) => return Ok(Vec::new()),
            Err(other) => return Err(other),
        };
        Ok(rows.into_iter().filter_map(JsonDocument::from_value).collect())
    }

    async fn instance_footprint(
        &self,
        space: Space,
        original_id: &str,
    ) -> Result<Vec<FootprintEntry>, KgError> {
        let mut entries = Vec::new();
        for collection in self.list_collections(space).await? {
            let (_, rows) = self
                .cursor(
                    space,
                    "FOR doc IN @@collection FILTER doc.`_originalId` == @id \
                     RETURN {key: doc._key, edge: doc._from != null}",
                    json!({"@collection": collection.as_str(), "id": original_id}),
                    false,
                )
                .await?;
            for row in rows {
                let Some(key) = row["key"].as_str() else {
                    continue;
                };
                let kind = if row["edge"].as_bool() == Some(true) {
                    DocumentKind::Edge
                } else {
                    DocumentKind::Vertex
                };
                entries.push(FootprintEntry {
                    space,
                    handle: DocumentHandle::new(collection.clone(), key),
                    kind,
                });
            }
        }
        Ok(entries)
    }

    async fn execute(&self, query: &TraversalQuery) -> Result<QueryRows, KgError> {
        let text = aql::render(query);
        let (full_count, rows) = self
            .cursor(query.space, &text, json!({}), true)
            .await?;
        Ok(QueryRows {
            full_count,
            rows: rows.into_iter().filter_map(JsonDocument::from_value).collect(),
        })
    }

    async fn truncate_space(&self, space: Space) -> Result<(), KgError> {
        let url = format!(
            "{}/_db/_system/_api/database/{}",
            self.base_url,
            self.database_name(space)
        );
        let response = self
            .request(reqwest::Method::DELETE, url)
            .send()
            .await
            .map_err(storage_error)?;
        if response.status().is_success() || response.status().as_u16() == 404 {
            Ok(())
        } else {
            Err(status_error("drop space", response).await)
        }
    }
}
