use crate::model::document::JsonDocument;
use crate::model::reference::InstanceReference;
use crate::model::vocab;

/// One inbound indexing request: the instance identity, the raw payload and
/// the request metadata. Created once per request and immutable thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexingMessage {
    pub reference: InstanceReference,
    pub payload: String,
    pub timestamp: Option<String>,
    pub user_id: Option<String>,
}

impl IndexingMessage {
    pub fn new(
        reference: InstanceReference,
        payload: impl Into<String>,
        timestamp: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            reference,
            payload: payload.into(),
            timestamp,
            user_id,
        }
    }
}

/// An indexing message after JSON-LD standardization: every key of the
/// qualified map is a fully qualified IRI.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedIndexingMessage {
    pub original: IndexingMessage,
    pub qualified: JsonDocument,
}

impl QualifiedIndexingMessage {
    pub fn new(original: IndexingMessage, qualified: JsonDocument) -> Self {
        Self { original, qualified }
    }

    pub fn reference(&self) -> &InstanceReference {
        &self.original.reference
    }

    pub fn is_of_type(&self, type_iri: &str) -> bool {
        self.qualified.is_of_type(type_iri)
    }

    /// Modification timestamp: from the qualified payload when present,
    /// otherwise from the request metadata.
    pub fn modified_at(&self) -> Option<&str> {
        self.qualified
            .get_string(vocab::provenance::MODIFIED_AT)
            .or(self.original.timestamp.as_deref())
    }

    /// Acting user: from the qualified payload when present, otherwise from
    /// the request metadata.
    pub fn user_id(&self) -> Option<&str> {
        self.qualified
            .get_string(vocab::provenance::LAST_MODIFICATION_USER_ID)
            .or(self.original.user_id.as_deref())
    }
}
