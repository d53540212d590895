//! Core types for the task tracker.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task identifier. Always >= 1 for stored tasks.
pub type TaskId = u64;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as stored in the remote document.
///
/// Field order here is the field order in the encoded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
}

impl Task {
    /// Check the record-level invariants: positive id and a valid name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id == 0 {
            return Err(ValidationError::new("id", "id must be >= 1"));
        }
        validate_name(&self.name)
    }
}

/// Caller-supplied fields for a new task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub status: TaskStatus,
}

impl NewTask {
    pub fn new(name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Field changes for an existing task. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            name: None,
            status: Some(status),
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            status: None,
        }
    }

    /// Build the replacement record. The id of `current` is always kept.
    pub fn apply_to(&self, current: &Task) -> Task {
        Task {
            id: current.id,
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            status: self.status.unwrap_or(current.status),
        }
    }
}

/// First code point of every run of ten Unicode decimal digits (category `Nd`).
const DECIMAL_DIGIT_ZEROS: &[u32] = &[
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10, 0x104A0, 0x10D30, 0x11066, 0x110F0, 0x11136, 0x111D0,
    0x112F0, 0x11450, 0x114D0, 0x11650, 0x116C0, 0x11730, 0x118E0, 0x11950, 0x11C50, 0x11D50,
    0x11DA0, 0x11F50, 0x16A60, 0x16AC0, 0x16B50, 0x1D7CE, 0x1D7D8, 0x1D7E2, 0x1D7EC, 0x1D7F6,
    0x1E140, 0x1E2F0, 0x1E4F0, 0x1E950, 0x1FBF0,
];

/// Decimal digit in any script. Fractions and numeral letters such as `½` or
/// `Ⅻ` are numeric but not digits.
fn is_decimal_digit(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_digit();
    }
    let code = c as u32;
    let idx = DECIMAL_DIGIT_ZEROS.partition_point(|&zero| zero <= code);
    idx > 0 && code - DECIMAL_DIGIT_ZEROS[idx - 1] < 10
}

/// A task name must contain at least one alphanumeric character and must not
/// consist only of decimal digits.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if !name.chars().any(char::is_alphanumeric) {
        return Err(ValidationError::new(
            "name",
            "name must contain at least one letter or digit",
        ));
    }
    if name.chars().all(is_decimal_digit) {
        return Err(ValidationError::new(
            "name",
            "name must not consist only of digits",
        ));
    }
    Ok(())
}
