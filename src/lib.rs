pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use api::{create_router, AppState};
pub use error::KgError;
pub use logic::{AuthorizationContext, IndexingOrchestrator, QueryProcessor};
pub use model::*;
pub use store::{
    ArangoStore, Credential, DocumentRepository, GraphStore, HttpDocumentRepository,
    MemoryDocumentRepository, MemoryGraphStore,
};

use std::sync::Arc;

/// Wire the core components for the given configuration. Backends without a
/// configured URL fall back to their in-memory implementations.
pub fn build_state(config: &config::AppConfig) -> Arc<AppState> {
    let graph: Arc<dyn GraphStore> = match &config.graph.url {
        Some(url) => Arc::new(ArangoStore::new(
            url,
            &config.graph.database,
            &config.graph.username,
            &config.graph.password,
        )),
        None => Arc::new(MemoryGraphStore::new()),
    };
    let repository: Arc<dyn DocumentRepository> = match &config.repository.url {
        Some(url) => Arc::new(HttpDocumentRepository::new(
            url,
            config.repository.system_token.clone(),
        )),
        None => Arc::new(MemoryDocumentRepository::new()),
    };

    let auth = Arc::new(AuthorizationContext::new(
        repository.clone(),
        config.auth.cache_capacity,
    ));
    Arc::new(AppState {
        indexing: Arc::new(IndexingOrchestrator::new(graph.clone(), repository)),
        queries: Arc::new(QueryProcessor::new(graph, auth.clone())),
        auth,
    })
}

/// Start the HTTP server. Used by the binary and by integration tests.
pub async fn run_server() -> anyhow::Result<()> {
    use tokio::net::TcpListener;

    dotenvy::dotenv().ok();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = config::AppConfig::load()?;
    let state = build_state(&config);
    let app = create_router().with_state(state);

    let listener = TcpListener::bind(config.server_address()).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
