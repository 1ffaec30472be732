//! Clients for the upstream document repository: the HTTP implementation
//! used in production and an in-memory double for tests and local runs.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::error::KgError;
use crate::model::{InstanceReference, SchemaReference};
use crate::store::traits::{Credential, DocumentRepository};

pub struct HttpDocumentRepository {
    client: reqwest::Client,
    base_url: String,
    system_token: Option<String>,
}

impl HttpDocumentRepository {
    pub fn new(base_url: impl Into<String>, system_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            system_token,
        }
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        credential: &Credential,
    ) -> reqwest::RequestBuilder {
        match credential {
            Credential::InternalMaster => match &self.system_token {
                Some(token) => request.bearer_auth(token),
                None => request,
            },
            Credential::Token(token) => request.bearer_auth(token),
            Credential::Anonymous => request,
        }
    }

    fn data_url(&self, path: &str) -> String {
        format!("{}/data/{}", self.base_url, path)
    }
}

fn upstream_error(error: reqwest::Error) -> KgError {
    KgError::Upstream(error.to_string())
}

async fn status_error(action: &str, response: reqwest::Response) -> KgError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    KgError::Upstream(format!("{} failed ({}): {}", action, status, body))
}

fn revision_of(value: &Value) -> Option<u64> {
    value.get("rev").and_then(Value::as_u64)
}

#[async_trait::async_trait]
impl DocumentRepository for HttpDocumentRepository {
    async fn fetch(
        &self,
        reference: &InstanceReference,
        credential: &Credential,
    ) -> Result<Option<Value>, KgError> {
        let mut url = self.data_url(&reference.relative_path());
        if let Some(revision) = reference.revision {
            url = format!("{}?rev={}", url, revision);
        }
        let response = self
            .authorize(self.client.get(url), credential)
            .send()
            .await
            .map_err(upstream_error)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error("fetch instance", response).await);
        }
        Ok(Some(response.json().await.map_err(upstream_error)?))
    }

    async fn create(
        &self,
        reference: &InstanceReference,
        payload: &Value,
        credential: &Credential,
    ) -> Result<InstanceReference, KgError> {
        let response = self
            .authorize(
                self.client.post(self.data_url(&reference.relative_path())),
                credential,
            )
            .json(payload)
            .send()
            .await
            .map_err(upstream_error)?;
        if !response.status().is_success() {
            return Err(status_error("create instance", response).await);
        }
        let body: Value = response.json().await.map_err(upstream_error)?;
        Ok(reference
            .clone()
            .with_revision(revision_of(&body).unwrap_or(1)))
    }

    async fn update(
        &self,
        reference: &InstanceReference,
        payload: &Value,
        credential: &Credential,
    ) -> Result<InstanceReference, KgError> {
        let url = format!(
            "{}?rev={}",
            self.data_url(&reference.relative_path()),
            reference.revision.unwrap_or(1)
        );
        let response = self
            .authorize(self.client.put(url), credential)
            .json(payload)
            .send()
            .await
            .map_err(upstream_error)?;
        if !response.status().is_success() {
            return Err(status_error("update instance", response).await);
        }
        let body: Value = response.json().await.map_err(upstream_error)?;
        Ok(reference
            .clone()
            .with_revision(revision_of(&body).unwrap_or_else(|| {
                reference.revision.map(|r| r + 1).unwrap_or(1)
            })))
    }

    async fn delete(
        &self,
        reference: &InstanceReference,
        credential: &Credential,
    ) -> Result<(), KgError> {
        let url = format!(
            "{}?rev={}",
            self.data_url(&reference.relative_path()),
            reference.revision.unwrap_or(1)
        );
        let response = self
            .authorize(self.client.delete(url), credential)
            .send()
            .await
            .map_err(upstream_error)?;
        if response.status().is_success() || response.status().as_u16() == 404 {
            Ok(())
        } else {
            Err(status_error("delete instance", response).await)
        }
    }

    async fn list_instances(
        &self,
        schema: &SchemaReference,
        from: usize,
        size: usize,
        credential: &Credential,
    ) -> Result<Vec<Value>, KgError> {
        let url = format!(
            "{}?from={}&size={}",
            self.data_url(&schema.relative_path()),
            from,
            size
        );
        let response = self
            .authorize(self.client.get(url), credential)
            .send()
            .await
            .map_err(upstream_error)?;
        if !response.status().is_success() {
            return Err(status_error("list instances", response).await);
        }
        let body: Value = response.json().await.map_err(upstream_error)?;
        Ok(body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_organizations(
        &self,
        credential: &Credential,
    ) -> Result<BTreeSet<String>, KgError> {
        let url = format!("{}/organizations", self.base_url);
        let response = self
            .authorize(self.client.get(url), credential)
            .send()
            .await
            .map_err(upstream_error)?;
        if !response.status().is_success() {
            return Err(status_error("list organizations", response).await);
        }
        let body: Value = response.json().await.map_err(upstream_error)?;
        let organizations = body
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match entry {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(map) => map
                            .get("@id")
                            .and_then(Value::as_str)
                            .map(|id| id.rsplit('/').next().unwrap_or(id).to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(organizations)
    }
}

/// In-memory repository double: versioned documents keyed by their relative
/// path plus per-credential organization grants. The internal master
/// credential sees every granted organization.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    documents: RwLock<HashMap<String, (u64, Value)>>,
    grants: RwLock<HashMap<Credential, BTreeSet<String>>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given organizations visible to a credential.
    pub fn grant(&self, credential: Credential, organizations: &[&str]) {
        self.grants
            .write()
            .entry(credential)
            .or_default()
            .extend(organizations.iter().map(|s| s.to_string()));
    }

    /// Seed a document without revision checking. Test helper.
    pub fn put(&self, reference: &InstanceReference, payload: Value) {
        let revision = reference.revision.unwrap_or(1);
        self.documents
            .write()
            .insert(reference.relative_path(), (revision, payload));
    }
}

#[async_trait::async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn fetch(
        &self,
        reference: &InstanceReference,
        _credential: &Credential,
    ) -> Result<Option<Value>, KgError> {
        Ok(self
            .documents
            .read()
            .get(&reference.relative_path())
            .map(|(_, payload)| payload.clone()))
    }

    async fn create(
        &self,
        reference: &InstanceReference,
        payload: &Value,
        _credential: &Credential,
    ) -> Result<InstanceReference, KgError> {
        let mut documents = self.documents.write();
        if documents.contains_key(&reference.relative_path()) {
            return Err(KgError::Upstream(format!(
                "instance {} already exists",
                reference.relative_path()
            )));
        }
        documents.insert(reference.relative_path(), (1, payload.clone()));
        Ok(reference.clone().with_revision(1))
    }

    async fn update(
        &self,
        reference: &InstanceReference,
        payload: &Value,
        _credential: &Credential,
    ) -> Result<InstanceReference, KgError> {
        let mut documents = self.documents.write();
        let Some((revision, stored)) = documents.get_mut(&reference.relative_path()) else {
            return Err(KgError::not_found(reference.relative_path()));
        };
        let expected = reference.revision.unwrap_or(1);
        if *revision != expected {
            return Err(KgError::Upstream(format!(
                "revision conflict on {}: expected {}, stored {}",
                reference.relative_path(),
                expected,
                revision
            )));
        }
        *revision += 1;
        *stored = payload.clone();
        Ok(reference.clone().with_revision(*revision))
    }

    async fn delete(
        &self,
        reference: &InstanceReference,
        _credential: &Credential,
    ) -> Result<(), KgError> {
        let mut documents = self.documents.write();
        if let Some((revision, _)) = documents.get(&reference.relative_path()) {
            let expected = reference.revision.unwrap_or(*revision);
            if *revision != expected {
                return Err(KgError::Upstream(format!(
                    "revision conflict on {}",
                    reference.relative_path()
                )));
            }
            documents.remove(&reference.relative_path());
        }
        Ok(())
    }

    async fn list_instances(
        &self,
        schema: &SchemaReference,
        from: usize,
        size: usize,
        _credential: &Credential,
    ) -> Result<Vec<Value>, KgError> {
        let prefix = format!("{}/", schema.relative_path());
        let documents = self.documents.read();
        let mut matching: Vec<(&String, &Value)> = documents
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, (_, payload))| (path, payload))
            .collect();
        matching.sort_by_key(|(path, _)| path.to_string());
        Ok(matching
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(_, payload)| payload.clone())
            .collect())
    }

    async fn list_organizations(
        &self,
        credential: &Credential,
    ) -> Result<BTreeSet<String>, KgError> {
        let grants = self.grants.read();
        if matches!(credential, Credential::InternalMaster) {
            return Ok(grants.values().flatten().cloned().collect());
        }
        Ok(grants.get(credential).cloned().unwrap_or_default())
    }
}
