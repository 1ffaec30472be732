use serde_json::{json, Value};
use std::sync::Arc;

use kgraph::logic::naming;
use kgraph::model::vocab;
use kgraph::{
    AuthorizationContext, Credential, DocumentRepository, GraphStore, IndexingMessage,
    IndexingOrchestrator, InstanceReference, KgError, MemoryDocumentRepository, MemoryGraphStore,
    QueryProcessor, QueryRequest, SchemaReference, Space, SubSpace,
};

struct Fixture {
    graph: Arc<MemoryGraphStore>,
    repository: Arc<MemoryDocumentRepository>,
    indexing: IndexingOrchestrator,
    queries: QueryProcessor,
}

impl Fixture {
    fn new() -> Self {
        let graph = Arc::new(MemoryGraphStore::new());
        let repository = Arc::new(MemoryDocumentRepository::new());
        let graph_store: Arc<dyn GraphStore> = graph.clone();
        let repo: Arc<dyn DocumentRepository> = repository.clone();
        let auth = Arc::new(AuthorizationContext::new(repo.clone(), 100));
        Self {
            graph: graph.clone(),
            repository,
            indexing: IndexingOrchestrator::new(graph_store.clone(), repo),
            queries: QueryProcessor::new(graph_store, auth),
        }
    }
}

fn schema() -> SchemaReference {
    SchemaReference::new("org", "dom", "schema", "v1.0.0")
}

fn instance(id: &str) -> InstanceReference {
    InstanceReference::new(schema(), id).with_revision(1)
}

fn name_property() -> String {
    format!("{}name", schema().unique_namespace())
}

/// A specification projecting the `name` property of the root schema.
fn name_specification() -> String {
    json!({
        "@context": {"query": vocab::query::NAMESPACE, "@vocab": vocab::query::NAMESPACE},
        "root_schema": {"@id": format!("{}{}", vocab::NAMESPACE, schema().relative_path())},
        "fields": [
            {"fieldname": "name", "relative_path": name_property()}
        ]
    })
    .to_string()
}

fn message(reference: InstanceReference, payload: Value, user: &str, timestamp: &str) -> IndexingMessage {
    IndexingMessage::new(
        reference,
        payload.to_string(),
        Some(timestamp.to_string()),
        Some(user.to_string()),
    )
}

fn caller(fixture: &Fixture) -> Credential {
    let credential = Credential::Token("caller-token".to_string());
    fixture.repository.grant(credential.clone(), &["org"]);
    credential
}

#[tokio::test]
async fn indexed_instance_comes_back_through_the_query_compiler() {
    let fixture = Fixture::new();
    let credential = caller(&fixture);

    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "foo"}),
            "author-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();

    let result = fixture
        .queries
        .query_by_specification(&name_specification(), &credential, &QueryRequest::default())
        .await
        .unwrap();

    assert_eq!(result.total, 1);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].get("name"), Some(&json!("foo")));
    // Internal bookkeeping never leaks to the caller.
    assert!(result.results[0].keys().all(|key| !key.starts_with('_')));
}

#[tokio::test]
async fn an_empty_whitelist_returns_zero_rows() {
    let fixture = Fixture::new();
    let credential = caller(&fixture);

    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "foo"}),
            "author-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();

    // This credential has no grants at all.
    let stranger = Credential::Token("stranger".to_string());
    let result = fixture
        .queries
        .query_by_specification(&name_specification(), &stranger, &QueryRequest::default())
        .await
        .unwrap();
    assert_eq!(result.total, 0);
    assert!(result.results.is_empty());

    // An organization restriction outside the whitelist empties it too.
    let request = QueryRequest {
        organizations: Some(vec!["other-org".to_string()]),
        ..Default::default()
    };
    let result = fixture
        .queries
        .query_by_specification(&name_specification(), &credential, &request)
        .await
        .unwrap();
    assert_eq!(result.total, 0);
}

#[tokio::test]
async fn reconciliation_prefers_the_newer_source_and_keeps_the_alternative() {
    let fixture = Fixture::new();
    caller(&fixture);

    // Older native value "A", newer editor overlay "B".
    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "A"}),
            "user-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();
    fixture
        .indexing
        .insert(message(
            instance("x1").to_sub_space(SubSpace::Editor),
            json!({"name": "B"}),
            "user-2",
            "2024-03-02T10:00:00Z",
        ))
        .await
        .unwrap();

    let inferred = instance("x1").to_sub_space(SubSpace::Inferred);
    let root = fixture
        .graph
        .get_document(Space::Inferred, &naming::instance_handle(&inferred))
        .await
        .unwrap()
        .expect("inferred document exists");

    // The canonical value follows the most recent timestamp.
    assert_eq!(root.get(&name_property()), Some(&json!("B")));

    // The losing value survives as an alternative with its contributor.
    let footprint = fixture
        .graph
        .instance_footprint(Space::Inferred, &inferred.full_id(false))
        .await
        .unwrap();
    let mut found_alternative = false;
    for entry in &footprint {
        let Some(document) = fixture
            .graph
            .get_document(Space::Inferred, &entry.handle)
            .await
            .unwrap()
        else {
            continue;
        };
        if document.get(vocab::inference::ALTERNATIVES_VALUE) == Some(&json!("A")) {
            found_alternative = true;
            let users = document
                .get(vocab::inference::ALTERNATIVES_USER_IDS)
                .cloned()
                .unwrap_or(Value::Null);
            assert!(users == json!("user-1") || users == json!(["user-1"]));
        }
    }
    assert!(found_alternative, "alternative for the older value recorded");
}

#[tokio::test]
async fn deleting_an_instance_removes_it_from_query_results() {
    let fixture = Fixture::new();
    let credential = caller(&fixture);

    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "foo"}),
            "author-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();
    fixture.indexing.delete(&instance("x1")).await.unwrap();

    let result = fixture
        .queries
        .query_by_specification(&name_specification(), &credential, &QueryRequest::default())
        .await
        .unwrap();
    assert_eq!(result.total, 0);

    // The inferred projection disappears with its last contribution.
    let inferred = instance("x1").to_sub_space(SubSpace::Inferred);
    assert!(fixture
        .graph
        .instance_footprint(Space::Inferred, &inferred.full_id(false))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn stored_specifications_round_trip_and_missing_ones_are_not_found() {
    let fixture = Fixture::new();
    let credential = caller(&fixture);

    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "foo"}),
            "author-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();

    let id = fixture
        .queries
        .store_specification(&schema(), Some("by-name"), &name_specification())
        .await
        .unwrap();
    assert_eq!(id, "by-name");

    let result = fixture
        .queries
        .query_by_stored_specification(&schema(), "by-name", &credential, &QueryRequest::default())
        .await
        .unwrap();
    assert_eq!(result.total, 1);

    let missing = fixture
        .queries
        .query_by_stored_specification(&schema(), "unknown", &credential, &QueryRequest::default())
        .await;
    assert!(matches!(missing, Err(KgError::NotFound(_))));
}

#[tokio::test]
async fn release_documents_copy_their_target_into_the_released_space() {
    let fixture = Fixture::new();
    caller(&fixture);

    // Source of record for the released target.
    let target = instance("x1");
    fixture
        .repository
        .put(&target, json!({"name": "released content"}));

    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "released content"}),
            "author-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();

    let release_schema = SchemaReference::new("releases", "core", "release", "v1.0.0");
    let release_payload = json!({
        "@type": (vocab::release::TYPE),
        (vocab::release::INSTANCE): {"@id": target.full_id(true)}
    });
    fixture
        .indexing
        .insert(message(
            InstanceReference::new(release_schema, "r1").with_revision(1),
            release_payload,
            "releaser",
            "2024-03-03T10:00:00Z",
        ))
        .await
        .unwrap();

    let released = fixture
        .graph
        .get_document(Space::Released, &naming::instance_handle(&target))
        .await
        .unwrap()
        .expect("released copy exists");
    assert_eq!(
        released.get(vocab::release::STATE),
        Some(&json!("RELEASED"))
    );
    assert_eq!(
        released.get(&name_property()),
        Some(&json!("released content"))
    );
}

#[tokio::test]
async fn clear_wipes_every_space() {
    let fixture = Fixture::new();
    caller(&fixture);

    fixture
        .indexing
        .insert(message(
            instance("x1"),
            json!({"name": "foo"}),
            "author-1",
            "2024-03-01T10:00:00Z",
        ))
        .await
        .unwrap();
    assert!(fixture.graph.document_count(Space::Native) > 0);
    assert!(fixture.graph.document_count(Space::Inferred) > 0);

    fixture.indexing.clear().await.unwrap();
    for space in [Space::Native, Space::Editor, Space::Inferred, Space::Released] {
        assert_eq!(fixture.graph.document_count(space), 0);
    }
}

#[tokio::test]
async fn malformed_payloads_are_rejected_without_partial_indexing() {
    let fixture = Fixture::new();

    let result = fixture
        .indexing
        .insert(IndexingMessage::new(
            instance("x1"),
            "{not json",
            Some("2024-03-01T10:00:00Z".to_string()),
            None,
        ))
        .await;
    assert!(matches!(result, Err(KgError::BadRequest(_))));
    assert_eq!(fixture.graph.document_count(Space::Native), 0);
    assert_eq!(fixture.graph.document_count(Space::Inferred), 0);
}
