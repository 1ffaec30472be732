use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::KgError;
use crate::logic::query::compiler::TraversalQuery;
use crate::model::{
    CollectionName, DocumentHandle, InstanceReference, JsonDocument, SchemaReference, Space,
    TodoList,
};

/// Credential a call is executed under. Indexing controllers always run
/// with the internal master credential; query calls carry the caller's
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Credential {
    InternalMaster,
    Token(String),
    Anonymous,
}

/// Whether a stored document is a vertex or an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Vertex,
    Edge,
}

/// One stored document belonging to an indexed instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintEntry {
    pub space: Space,
    pub handle: DocumentHandle,
    pub kind: DocumentKind,
}

/// Raw rows of one executed traversal query, before projection
/// post-processing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRows {
    /// Number of matching rows before pagination.
    pub full_count: u64,
    pub rows: Vec<JsonDocument>,
}

/// The graph store the execution plans are committed against and queries
/// run on. Only the query text and the transaction contract are fixed; the
/// engine behind this trait is an external collaborator.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply all operations of the plan in order, atomically: either every
    /// operation commits or none does.
    async fn commit(&self, todo_list: &TodoList) -> Result<(), KgError>;

    /// Upsert a single document outside any plan (stored specifications).
    async fn upsert_document(
        &self,
        space: Space,
        handle: &DocumentHandle,
        document: JsonDocument,
    ) -> Result<(), KgError>;

    async fn get_document(
        &self,
        space: Space,
        handle: &DocumentHandle,
    ) -> Result<Option<JsonDocument>, KgError>;

    /// Documents of a collection whose property equals the given value.
    async fn find_by_property(
        &self,
        space: Space,
        collection: &CollectionName,
        property: &str,
        value: &str,
    ) -> Result<Vec<JsonDocument>, KgError>;

    /// Every vertex and edge document bookkeeping-tagged with the given
    /// original instance id.
    async fn instance_footprint(
        &self,
        space: Space,
        original_id: &str,
    ) -> Result<Vec<FootprintEntry>, KgError>;

    /// Execute a compiled traversal query.
    async fn execute(&self, query: &TraversalQuery) -> Result<QueryRows, KgError>;

    /// Drop all data of one space. Used by the clear operation only.
    async fn truncate_space(&self, space: Space) -> Result<(), KgError>;
}

/// The upstream repository owning the source-of-record copy of every
/// document. All calls carry the resolved credential.
#[async_trait::async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Fetch the raw payload of an instance, honoring its revision when set.
    async fn fetch(
        &self,
        reference: &InstanceReference,
        credential: &Credential,
    ) -> Result<Option<Value>, KgError>;

    /// Create a new instance; the returned reference carries the assigned
    /// revision.
    async fn create(
        &self,
        reference: &InstanceReference,
        payload: &Value,
        credential: &Credential,
    ) -> Result<InstanceReference, KgError>;

    /// Update an instance at its expected revision.
    async fn update(
        &self,
        reference: &InstanceReference,
        payload: &Value,
        credential: &Credential,
    ) -> Result<InstanceReference, KgError>;

    /// Delete an instance at its expected revision.
    async fn delete(
        &self,
        reference: &InstanceReference,
        credential: &Credential,
    ) -> Result<(), KgError>;

    /// One page of all instances of a schema.
    async fn list_instances(
        &self,
        schema: &SchemaReference,
        from: usize,
        size: usize,
        credential: &Credential,
    ) -> Result<Vec<Value>, KgError>;

    /// Organizations visible to the credential. Visibility implies READ
    /// access; the repository cannot distinguish finer-grained rights yet.
    async fn list_organizations(
        &self,
        credential: &Credential,
    ) -> Result<BTreeSet<String>, KgError>;
}
