//! Inference controller: whenever a native or editor document changes, all
//! contributions for the logical entity are reconciled into one canonical
//! document that is indexed into the inferred space, carrying alternatives
//! for every disagreement.

use std::sync::Arc;

use crate::error::KgError;
use crate::logic::indexing::plan::{self, PlanMetadata};
use crate::logic::indexing::IndexingController;
use crate::logic::reconcile::{self, SourceContribution};
use crate::logic::{naming, transform};
use crate::model::vocab;
use crate::model::{
    InstanceReference, JsonDocument, QualifiedIndexingMessage, Space, SubSpace, TodoList,
};
use crate::store::traits::GraphStore;

pub struct InferenceController {
    graph: Arc<dyn GraphStore>,
}

impl InferenceController {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Collect the contributions for the logical entity behind `reference`.
    /// The message (when given) stands in for its own stored copy, which may
    /// not be committed yet; `exclude` drops the copy being deleted.
    async fn collect_contributions(
        &self,
        reference: &InstanceReference,
        message: Option<&QualifiedIndexingMessage>,
        exclude: Option<&InstanceReference>,
    ) -> Result<Vec<SourceContribution>, KgError> {
        let mut contributions = Vec::new();
        for sub_space in [SubSpace::Main, SubSpace::Editor] {
            let candidate = reference.to_sub_space(sub_space);
            if exclude
                .map(|e| e.is_same_instance_regardless_of_revision(&candidate))
                .unwrap_or(false)
            {
                continue;
            }
            if let Some(message) = message {
                if message
                    .reference()
                    .is_same_instance_regardless_of_revision(&candidate)
                {
                    contributions.push(SourceContribution::from_qualified(message));
                    continue;
                }
            }
            let space = Space::of_sub_space(sub_space);
            let handle = naming::instance_handle(&candidate);
            if let Some(document) = self.graph.get_document(space, &handle).await? {
                contributions.push(SourceContribution::from_document(candidate, document));
            }
        }
        Ok(contributions)
    }

    async fn plan_inference(
        &self,
        reference: &InstanceReference,
        message: Option<&QualifiedIndexingMessage>,
        exclude: Option<&InstanceReference>,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        let original = reference.to_sub_space(SubSpace::Main);
        let inferred = original.to_sub_space(SubSpace::Inferred);
        let contributions = self
            .collect_contributions(&original, message, exclude)
            .await?;

        let existing = self
            .graph
            .instance_footprint(Space::Inferred, &inferred.full_id(false))
            .await?;

        if contributions.is_empty() {
            // Nothing left to infer from: the inferred copy goes away.
            plan::plan_removal(&existing, todo_list);
            return Ok(());
        }

        let mut merged = JsonDocument::new();
        reconcile::merge(&mut merged, &contributions);
        decorate_inferred_document(&mut merged, &original, &contributions);

        let vertices = transform::transform(&merged, &inferred);
        let planned = plan::plan_instance_upserts(
            Space::Inferred,
            &inferred,
            &vertices,
            PlanMetadata::default(),
            todo_list,
        );
        let stale: Vec<_> = existing
            .into_iter()
            .filter(|entry| !planned.contains(&entry.handle))
            .collect();
        plan::plan_removal(&stale, todo_list);
        Ok(())
    }
}

/// Identity, type markers and provenance of the merged document.
fn decorate_inferred_document(
    merged: &mut JsonDocument,
    original: &InstanceReference,
    contributions: &[SourceContribution],
) {
    let newest = contributions
        .iter()
        .max_by(|a, b| a.modified_at.cmp(&b.modified_at));

    if let Some(newest) = newest {
        if let Some(types) = newest.document.get(vocab::jsonld::TYPE) {
            merged.insert(vocab::jsonld::TYPE, types.clone());
        }
        if let Some(modified_at) = newest.modified_at {
            merged.insert(vocab::provenance::MODIFIED_AT, modified_at.to_rfc3339());
        }
        if let Some(user_id) = &newest.user_id {
            merged.insert(vocab::provenance::LAST_MODIFICATION_USER_ID, user_id.clone());
        }
    }
    merged.add_type(vocab::inference::TYPE);
    merged.add_reference(vocab::inference::OF, &original.full_id(false));
}

#[async_trait::async_trait]
impl IndexingController for InferenceController {
    async fn insert(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        if message.reference().sub_space() == SubSpace::Inferred {
            return Ok(());
        }
        self.plan_inference(message.reference(), Some(message), None, todo_list)
            .await
    }

    async fn update(
        &self,
        message: &QualifiedIndexingMessage,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        if message.reference().sub_space() == SubSpace::Inferred {
            return Ok(());
        }
        self.plan_inference(message.reference(), Some(message), None, todo_list)
            .await
    }

    async fn delete(
        &self,
        reference: &InstanceReference,
        todo_list: &mut TodoList,
    ) -> Result<(), KgError> {
        if reference.sub_space() == SubSpace::Inferred {
            return Ok(());
        }
        self.plan_inference(reference, None, Some(reference), todo_list)
            .await
    }

    async fn clear(&self) -> Result<(), KgError> {
        self.graph.truncate_space(Space::Inferred).await
    }
}
