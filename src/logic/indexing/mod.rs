pub mod basic;
pub mod inference;
pub mod orchestrator;
pub mod plan;
pub mod releasing;

pub use basic::BasicIndexingController;
pub use inference::InferenceController;
pub use orchestrator::IndexingOrchestrator;
pub use releasing::ReleasingController;

use crate::error::KgError;
use crate::model::{InstanceReference, QualifiedIndexingMessage, TodoList};

/// Capability of one indexing stage. Controllers never commit anything
/// themselves: they only append operations to the shared plan. They run
/// with the internal system credential, not the caller's.
#[async_trait::async_trait]
pub trait IndexingController: Send + Sync {
    async fn insert(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError>;

    async fn update(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError>;

    async fn delete(
        &self,
        reference: &InstanceReference,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError>;

    /// Wipe the spaces this controller owns, bypassing the plan.
    async fn clear(&self) -> Result<(), KgError>;
}
