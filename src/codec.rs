//! Conversion between the remote document content and the task list.

use crate::error::StorageError;
use crate::types::Task;
use std::collections::HashSet;

/// Decode the document content into tasks.
///
/// All-or-nothing: any invalid element or duplicate id rejects the whole
/// document, so a corrupt document is never silently truncated.
pub fn decode(raw: &str) -> Result<Vec<Task>, StorageError> {
    let tasks: Vec<Task> = serde_json::from_str(raw)
        .map_err(|e| StorageError::MalformedDocument(format!("not a task list: {}", e)))?;

    let mut seen = HashSet::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        task.validate().map_err(|e| {
            StorageError::MalformedDocument(format!("task at index {}: {}", index, e))
        })?;
        if !seen.insert(task.id) {
            return Err(StorageError::MalformedDocument(format!(
                "duplicate task id {}",
                task.id
            )));
        }
    }

    Ok(tasks)
}

/// Encode tasks as a pretty-printed JSON array (2-space indent, non-ASCII kept as-is).
pub fn encode(tasks: &[Task]) -> Result<String, StorageError> {
    serde_json::to_string_pretty(tasks)
        .map_err(|e| StorageError::MalformedDocument(format!("failed to encode tasks: {}", e)))
}
