//! Basic write controller: turns a qualified message into upsert operations
//! for its native (or editor) space and, on update/delete, reconciles the
//! plan against the instance's existing footprint so stale vertices and
//! edges are removed in the same transaction.

use std::sync::Arc;

use crate::error::KgError;
use crate::logic::indexing::plan::{self, PlanMetadata};
use crate::logic::indexing::IndexingController;
use crate::logic::transform;
use crate::model::{
    InstanceReference, QualifiedIndexingMessage, Space, TodoList,
};
use crate::store::traits::GraphStore;

pub struct BasicIndexingController {
    graph: Arc<dyn GraphStore>,
}

impl BasicIndexingController {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    fn plan_upserts(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Vec<crate::model::DocumentHandle> {
        let reference = message.reference();
        let space = Space::of_sub_space(reference.sub_space());
        let vertices = transform::transform(&message.qualified, reference);
        plan::plan_instance_upserts(
            space,
            reference,
            &vertices,
            PlanMetadata {
                modified_at: message.modified_at(),
                user_id: message.user_id(),
            },
            todo_list,
        )
    }
}

#[async_trait::async_trait]
impl IndexingController for BasicIndexingController {
    async fn insert(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        self.plan_upserts(message, todo_list);
        Ok(())
    }

    async fn update(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        let reference = message.reference();
        let space = Space::of_sub_space(reference.sub_space());
        let existing = self
            .graph
            .instance_footprint(space, &reference.full_id(false))
            .await?;

        let planned = self.plan_upserts(message, todo_list);
        let stale: Vec<_> = existing
            .into_iter()
            .filter(|entry| !planned.contains(&entry.handle))
            .collect();
        plan::plan_removal(&stale, todo_list);
        Ok(())
    }

    async fn delete(
        &self,
        reference: &InstanceReference,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        let space = Space::of_sub_space(reference.sub_space());
        let existing = self
            .graph
            .instance_footprint(space, &reference.full_id(false))
            .await?;
        plan::plan_removal(&existing, todo_list);
        Ok(())
    }

    async fn clear(&self) -> Result<(), KgError> {
        self.graph.truncate_space(Space::Native).await?;
        self.graph.truncate_space(Space::Editor).await
    }
}
