//! Task CRUD over the remote document.
//!
//! Every operation is a self-contained cycle against the one remote document:
//! fetch, decode, change one record in memory, encode, overwrite. Nothing is
//! cached between operations and there is no locking, so two overlapping
//! mutations each work on their own snapshot and the later overwrite wins
//! (lost update). Ids are `max(snapshot ids) + 1`, so two creates against the
//! same stale snapshot can also pick the same id.

use crate::codec;
use crate::enrichment::{Enricher, NoopEnricher, apply_enrichment};
use crate::error::{StoreError, ValidationError};
use crate::remote::DocumentStore;
use crate::types::{NewTask, Task, TaskId, TaskUpdate, validate_name};
use std::sync::Arc;
use tracing::{info, warn};

/// Task store handle. Cheap to clone.
#[derive(Clone)]
pub struct TaskStore {
    documents: Arc<dyn DocumentStore>,
    enricher: Arc<dyn Enricher>,
}

impl TaskStore {
    pub fn new(documents: Arc<dyn DocumentStore>, enricher: Arc<dyn Enricher>) -> Self {
        Self {
            documents,
            enricher,
        }
    }

    /// Store without enrichment.
    pub fn without_enrichment(documents: Arc<dyn DocumentStore>) -> Self {
        Self::new(documents, Arc::new(NoopEnricher))
    }

    async fn load(&self) -> Result<Vec<Task>, StoreError> {
        let raw = self.documents.fetch().await?;
        Ok(codec::decode(&raw)?)
    }

    async fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let content = codec::encode(tasks)?;
        self.documents.overwrite(&content).await?;
        Ok(())
    }

    /// Run enrichment on an already validated name.
    async fn enriched_name(&self, name: &str) -> String {
        let result = self.enricher.enrich(name).await;
        apply_enrichment(name, result.as_deref())
    }

    /// All tasks, in document order.
    pub async fn list(&self) -> Result<Vec<Task>, StoreError> {
        info!("Listing tasks");
        self.load().await
    }

    /// Create a task. The result is returned only after the overwrite succeeded.
    pub async fn create(&self, input: NewTask) -> Result<Task, StoreError> {
        info!("Creating task: {:?}", input.name);
        let mut tasks = self.load().await?;

        validate_name(&input.name)?;
        let id = next_id(&tasks)?;
        let task = Task {
            id,
            name: self.enriched_name(&input.name).await,
            status: input.status,
        };

        tasks.push(task.clone());
        self.save(&tasks).await?;
        info!("Task created: id={}", task.id);
        Ok(task)
    }

    /// Apply field changes to an existing task, keeping its id and position.
    pub async fn update(&self, id: TaskId, changes: TaskUpdate) -> Result<Task, StoreError> {
        info!("Updating task id={}", id);
        let mut tasks = self.load().await?;

        let Some(index) = tasks.iter().position(|t| t.id == id) else {
            warn!("Task {} not found for update", id);
            return Err(StoreError::NotFound(id));
        };

        let mut updated = changes.apply_to(&tasks[index]);
        validate_name(&updated.name)?;
        updated.name = self.enriched_name(&updated.name).await;

        tasks[index] = updated.clone();
        self.save(&tasks).await?;
        info!("Task {} updated", id);
        Ok(updated)
    }

    /// Remove a task. Nothing is written when the id does not exist.
    pub async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        info!("Deleting task id={}", id);
        let mut tasks = self.load().await?;

        let Some(index) = tasks.iter().position(|t| t.id == id) else {
            warn!("Task {} not found for delete", id);
            return Err(StoreError::NotFound(id));
        };

        tasks.remove(index);
        self.save(&tasks).await?;
        info!("Task {} deleted", id);
        Ok(())
    }
}

/// One more than the largest id in the snapshot, or 1 for an empty list.
///
/// Fails when the largest id is already `TaskId::MAX`.
pub fn next_id(tasks: &[Task]) -> Result<TaskId, ValidationError> {
    tasks
        .iter()
        .map(|t| t.id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| ValidationError::new("id", "id space exhausted"))
}
