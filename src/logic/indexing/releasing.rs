//! Release-state controller: reacts to release documents by copying the
//! released instance, at its pinned revision, into the released snapshot
//! space. Runs with the internal credential because the caller releasing an
//! instance does not necessarily hold write access to the released space.

use std::sync::Arc;

use crate::error::KgError;
use crate::logic::indexing::plan::{self, PlanMetadata};
use crate::logic::indexing::IndexingController;
use crate::logic::{naming, standardize, transform};
use crate::model::vocab;
use crate::model::{
    InstanceReference, JsonDocument, QualifiedIndexingMessage, Space, TodoList,
};
use crate::store::traits::{Credential, DocumentRepository, GraphStore};

pub struct ReleasingController {
    graph: Arc<dyn GraphStore>,
    repository: Arc<dyn DocumentRepository>,
}

impl ReleasingController {
    pub fn new(graph: Arc<dyn GraphStore>, repository: Arc<dyn DocumentRepository>) -> Self {
        Self { graph, repository }
    }

    fn is_release(message: &QualifiedIndexingMessage) -> bool {
        message.is_of_type(vocab::release::TYPE)
            || message.qualified.contains_key(vocab::release::INSTANCE)
    }

    fn released_target(message: &QualifiedIndexingMessage) -> Result<InstanceReference, KgError> {
        message
            .qualified
            .get_reference_id(vocab::release::INSTANCE)
            .and_then(InstanceReference::from_url)
            .ok_or_else(|| {
                KgError::bad_request(format!(
                    "release {} does not link a valid instance",
                    message.reference().relative_path()
                ))
            })
    }

    async fn plan_release(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        let target = Self::released_target(message)?;
        let payload = self
            .repository
            .fetch(&target, &Credential::InternalMaster)
            .await?
            .ok_or_else(|| {
                KgError::not_found(format!(
                    "released instance {} not present in the repository",
                    target.full_id(true)
                ))
            })?;

        let mut qualified = standardize_released_payload(&payload, &target);
        qualified.insert(vocab::release::REVISION, target.revision.unwrap_or(1));
        qualified.insert(vocab::release::STATE, "RELEASED");

        let vertices = transform::transform(&qualified, &target);
        let existing = self
            .graph
            .instance_footprint(Space::Released, &target.full_id(false))
            .await?;
        let planned = plan::plan_instance_upserts(
            Space::Released,
            &target,
            &vertices,
            PlanMetadata {
                modified_at: message.modified_at(),
                user_id: message.user_id(),
            },
            todo_list,
        );
        let stale: Vec<_> = existing
            .into_iter()
            .filter(|entry| !planned.contains(&entry.handle))
            .collect();
        plan::plan_removal(&stale, todo_list);
        Ok(())
    }

    /// Remove the released copy of whatever the stored release document
    /// points at, and of the reference itself when it was released directly.
    async fn plan_unrelease(
        &self,
        reference: &InstanceReference,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        let mut targets = vec![reference.clone()];
        let handle = naming::instance_handle(reference);
        if let Some(stored) = self.graph.get_document(Space::Native, &handle).await? {
            if let Some(target) = stored
                .get_reference_id(vocab::release::INSTANCE)
                .and_then(InstanceReference::from_url)
            {
                targets.push(target);
            }
        }
        for target in targets {
            let existing = self
                .graph
                .instance_footprint(Space::Released, &target.full_id(false))
                .await?;
            plan::plan_removal(&existing, todo_list);
        }
        Ok(())
    }
}

fn standardize_released_payload(
    payload: &serde_json::Value,
    target: &InstanceReference,
) -> JsonDocument {
    let mut map = match payload {
        serde_json::Value::Object(map) => map.clone(),
        _ => return JsonDocument::new(),
    };
    standardize::ensure_context(&mut map, &target.schema.unique_namespace());
    let qualified = standardize::fully_qualify(&serde_json::Value::Object(map));
    standardize::filter_blacklisted_keys(qualified, vocab::VOCAB_BLACKLIST)
}

#[async_trait::async_trait]
impl IndexingController for ReleasingController {
    async fn insert(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        if !Self::is_release(message) {
            return Ok(());
        }
        self.plan_release(message, todo_list).await
    }

    async fn update(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        if !Self::is_release(message) {
            return Ok(());
        }
        self.plan_release(message, todo_list).await
    }

    async fn delete(
        &self,
        reference: &InstanceReference,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        self.plan_unrelease(reference, todo_list).await
    }

    async fn clear(&self) -> Result<(), KgError> {
        self.graph.truncate_space(Space::Released).await
    }
}
