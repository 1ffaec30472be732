//! Orchestration of one indexing request: qualify the payload once, let
//! every controller contribute to a shared execution plan in fixed order,
//! then commit the plan as a single transaction.

use serde_json::Value;
use std::sync::Arc;

use crate::error::KgError;
use crate::logic::indexing::basic::BasicIndexingController;
use crate::logic::indexing::inference::InferenceController;
use crate::logic::indexing::releasing::ReleasingController;
use crate::logic::indexing::IndexingController;
use crate::logic::standardize;
use crate::model::vocab;
use crate::model::{
    IndexingMessage, InstanceReference, QualifiedIndexingMessage, TodoList,
};
use crate::store::traits::{DocumentRepository, GraphStore};

pub struct IndexingOrchestrator {
    /// Controllers in their fixed execution order: basic write, release
    /// propagation, reconciliation. The order is a property of this list.
    controllers: Vec<Arc<dyn IndexingController>>,
    graph: Arc<dyn GraphStore>,
}

impl IndexingOrchestrator {
    pub fn new(graph: Arc<dyn GraphStore>, repository: Arc<dyn DocumentRepository>) -> Self {
        let controllers: Vec<Arc<dyn IndexingController>> = vec![
            Arc::new(BasicIndexingController::new(graph.clone())),
            Arc::new(ReleasingController::new(graph.clone(), repository)),
            Arc::new(InferenceController::new(graph.clone())),
        ];
        Self { controllers, graph }
    }

    /// Parse and standardize an inbound payload. Malformed payloads are
    /// rejected here, before any controller runs.
    pub fn qualify(&self, message: IndexingMessage) -> Result<QualifiedIndexingMessage, KgError> {
        let value: Value = serde_json::from_str(&message.payload)
            .map_err(|e| KgError::bad_request(format!("unparsable payload: {}", e)))?;
        let mut map = match value {
            Value::Object(map) => map,
            _ => return Err(KgError::bad_request("payload is not a JSON object")),
        };

        // Sub-space overlays qualify against the main-space namespace, so the
        // same logical field resolves to the same IRI in every variant.
        let namespace = message
            .reference
            .schema
            .to_sub_space(crate::model::SubSpace::Main)
            .unique_namespace();
        standardize::ensure_context(&mut map, &namespace);
        let qualified = standardize::fully_qualify(&Value::Object(map));
        let mut qualified = standardize::filter_blacklisted_keys(qualified, vocab::VOCAB_BLACKLIST);

        if let Some(timestamp) = &message.timestamp {
            if !qualified.contains_key(vocab::provenance::MODIFIED_AT) {
                qualified.insert(vocab::provenance::MODIFIED_AT, timestamp.clone());
            }
        }
        if let Some(user_id) = &message.user_id {
            if !qualified.contains_key(vocab::provenance::LAST_MODIFICATION_USER_ID) {
                qualified.insert(vocab::provenance::LAST_MODIFICATION_USER_ID, user_id.clone());
            }
        }

        Ok(QualifiedIndexingMessage::new(message, qualified))
    }

    pub async fn insert(&self, message: IndexingMessage) -> Result<TodoList, KgError> {
        let reference = message.reference.relative_path();
        log::info!("indexing insert for {}", reference);
        let qualified = self.qualify(message)?;

        let mut todo_list = TodoList::new();
        for controller in &self.controllers {
            controller.insert(&qualified, &mut todo_list).await?;
        }
        self.graph.commit(&todo_list).await?;
        Ok(todo_list)
    }

    pub async fn update(&self, message: IndexingMessage) -> Result<TodoList, KgError> {
        let reference = message.reference.relative_path();
        log::info!(
            "indexing update for {} in rev {:?}",
            reference,
            message.reference.revision
        );
        let qualified = self.qualify(message)?;

        let mut todo_list = TodoList::new();
        for controller in &self.controllers {
            controller.update(&qualified, &mut todo_list).await?;
        }
        self.graph.commit(&todo_list).await?;
        Ok(todo_list)
    }

    pub async fn delete(&self, reference: &InstanceReference) -> Result<TodoList, KgError> {
        log::info!("indexing delete for {}", reference.relative_path());

        let mut todo_list = TodoList::new();
        for controller in &self.controllers {
            controller.delete(reference, &mut todo_list).await?;
        }
        self.graph.commit(&todo_list).await?;
        Ok(todo_list)
    }

    /// Wipe all indexed data. Bypasses the execution plan: every controller
    /// truncates the spaces it owns directly.
    pub async fn clear(&self) -> Result<(), KgError> {
        log::warn!("clearing all indexed graph data");
        for controller in &self.controllers {
            controller.clear().await?;
        }
        Ok(())
    }
}
