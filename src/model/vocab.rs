//! Vocabulary constants shared by the indexing and query paths.
//!
//! Keys starting with an underscore are internal bookkeeping properties of
//! the graph store and are stripped before a document is returned to a
//! caller. Everything else is a fully qualified IRI.

/// Base namespace for all terms minted by this service.
pub const NAMESPACE: &str = "https://schema.kgraph.dev/";

/// JSON-LD keywords.
pub mod jsonld {
    pub const ID: &str = "@id";
    pub const TYPE: &str = "@type";
    pub const VALUE: &str = "@value";
    pub const LIST: &str = "@list";
    pub const CONTEXT: &str = "@context";
    pub const VOCAB: &str = "@vocab";
}

/// Common schema.org terms used for display and search.
pub mod schema_org {
    pub const NAME: &str = "http://schema.org/name";
    pub const IDENTIFIER: &str = "http://schema.org/identifier";
}

/// Internal bookkeeping keys of stored graph documents.
pub mod internal {
    pub const KEY: &str = "_key";
    pub const ID: &str = "_id";
    pub const FROM: &str = "_from";
    pub const TO: &str = "_to";
    pub const NAME: &str = "_name";
    pub const ORDER_NUMBER: &str = "_orderNumber";
    pub const PERMISSION_GROUP: &str = "_permissionGroup";
    pub const ORIGINAL_ID: &str = "_originalId";
    pub const RELATIVE_URL_WITH_REV: &str = "_relativeUrlWithRev";
}

/// Qualified markers carried inside documents so that values synthesized
/// during transformation round-trip through storage.
pub mod graph {
    pub const REVISION: &str = "https://schema.kgraph.dev/internal#rev";
    pub const UUID: &str = "https://schema.kgraph.dev/internal#uuid";
    pub const DEPRECATED: &str = "https://schema.kgraph.dev/internal#deprecated";
    pub const EMBEDDED: &str = "https://schema.kgraph.dev/internal#embedded";
}

/// Provenance terms stamped on every indexed root document.
pub mod provenance {
    pub const MODIFIED_AT: &str = "https://schema.kgraph.dev/provenance/modifiedAt";
    pub const CREATED_AT: &str = "https://schema.kgraph.dev/provenance/createdAt";
    pub const LAST_MODIFICATION_USER_ID: &str =
        "https://schema.kgraph.dev/provenance/lastModificationUserId";
    pub const REVISION: &str = "https://schema.kgraph.dev/provenance/revision";
}

/// Terms of the reconciliation (inference) output.
pub mod inference {
    pub const TYPE: &str = "https://schema.kgraph.dev/Inference";
    pub const OF: &str = "https://schema.kgraph.dev/inference/inferenceOf";
    pub const ALTERNATIVES: &str = "https://schema.kgraph.dev/inference/alternatives";
    pub const ALTERNATIVES_VALUE: &str = "https://schema.kgraph.dev/inference/alternatives/value";
    pub const ALTERNATIVES_USER_IDS: &str =
        "https://schema.kgraph.dev/inference/alternatives/userIds";
}

/// Terms of release documents and the released snapshot space.
pub mod release {
    pub const TYPE: &str = "https://schema.kgraph.dev/Release";
    pub const INSTANCE: &str = "https://schema.kgraph.dev/release/instance";
    pub const REVISION: &str = "https://schema.kgraph.dev/release/revision";
    pub const STATE: &str = "https://schema.kgraph.dev/release/state";
}

/// Terms used by stored query specifications.
pub mod query {
    pub const NAMESPACE: &str = "https://schema.kgraph.dev/graphQuery/";
    pub const ROOT_SCHEMA: &str = "https://schema.kgraph.dev/graphQuery/root_schema";
    pub const FIELDS: &str = "https://schema.kgraph.dev/graphQuery/fields";
    pub const FIELD_NAME: &str = "https://schema.kgraph.dev/graphQuery/fieldname";
    pub const RELATIVE_PATH: &str = "https://schema.kgraph.dev/graphQuery/relative_path";
    pub const REVERSE: &str = "https://schema.kgraph.dev/graphQuery/reverse";
    pub const REQUIRED: &str = "https://schema.kgraph.dev/graphQuery/required";
    pub const SORT: &str = "https://schema.kgraph.dev/graphQuery/sort";
    pub const MERGE: &str = "https://schema.kgraph.dev/graphQuery/merge";
    pub const FILTER: &str = "https://schema.kgraph.dev/graphQuery/filter";
    pub const FILTER_OP: &str = "https://schema.kgraph.dev/graphQuery/op";
    pub const FILTER_VALUE: &str = "https://schema.kgraph.dev/graphQuery/value";
    pub const FILTER_PARAMETER: &str = "https://schema.kgraph.dev/graphQuery/parameter";
}

/// Vocabulary of the upstream document repository. Link bookkeeping under
/// these namespaces is stripped from payloads before indexing.
pub mod repository {
    pub const LINKS: &str = "https://vocab.kgraph.dev/repository/links/";
    pub const TERMS: &str = "https://vocab.kgraph.dev/repository/terms/";
    /// Schema hint the repository stamps on payloads; second in line for
    /// the vertex type label.
    pub const SCHEMA: &str = "https://vocab.kgraph.dev/repository/schema";
}

/// Namespaces whose keys never enter the graph.
pub const VOCAB_BLACKLIST: &[&str] = &[repository::LINKS, repository::TERMS];
