pub mod auth;
pub mod indexing;
pub mod naming;
pub mod query;
pub mod reconcile;
pub mod standardize;
pub mod transform;

pub use auth::AuthorizationContext;
pub use indexing::{IndexingController, IndexingOrchestrator};
pub use query::QueryProcessor;
pub use reconcile::SourceContribution;
