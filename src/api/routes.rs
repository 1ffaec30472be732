use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::api::handlers::{self, SharedState};

pub fn create_router() -> Router<SharedState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Indexing (internal: executed with full graph rights)
        .route(
            "/internal/indexing/:org/:domain/:schema/:version/:id",
            post(handlers::add_instance),
        )
        .route(
            "/internal/indexing/:org/:domain/:schema/:version/:id/:rev",
            put(handlers::update_instance),
        )
        .route(
            "/internal/indexing/:org/:domain/:schema/:version/:id",
            delete(handlers::delete_instance),
        )
        .route("/internal/indexing", delete(handlers::clear_graph))
        // Authorization cache maintenance
        .route("/internal/auth/flush", post(handlers::flush_auth))
        // Queries
        .route("/query", post(handlers::run_query))
        .route(
            "/query/:org/:domain/:schema/:version/:query_id",
            put(handlers::save_query),
        )
        .route(
            "/query/:org/:domain/:schema/:version/:query_id/instances",
            post(handlers::run_stored_query),
        )
}
