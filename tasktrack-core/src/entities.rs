//! Core entity structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Identity, Priority, Status, Timestamp, ValidationError};

/// Minimum title length, in characters.
pub const TITLE_MIN_LEN: usize = 5;
/// Maximum title length, in characters.
pub const TITLE_MAX_LEN: usize = 200;
/// Maximum description length, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 300;

/// Store-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A persisted task, owned by exactly one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<Timestamp>,
    pub priority: Priority,
    pub status: Status,
    pub owner: Identity,
}

impl TaskRecord {
    /// Build a record from a draft. The owner always comes from the
    /// authenticated caller, never from the draft.
    pub fn from_draft(id: TaskId, draft: TaskDraft, owner: Identity) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            priority: draft.priority,
            status: draft.status,
            owner,
        }
    }

    /// Overwrite the mutable fields with those of `draft`.
    pub fn apply(&mut self, draft: &TaskDraft) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.due_date = draft.due_date;
        self.priority = draft.priority;
        self.status = draft.status;
    }

    /// Listing order: due date ascending with undated tasks first, ties by id.
    pub fn listing_order(a: &TaskRecord, b: &TaskRecord) -> std::cmp::Ordering {
        a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id))
    }
}

/// Client-supplied task fields used for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
            priority: Priority::default(),
            status: Status::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due_date(mut self, due_date: Timestamp) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Check title and description lengths.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "title".to_string(),
            });
        }

        let title_len = self.title.chars().count();
        if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&title_len) {
            return Err(ValidationError::InvalidValue {
                field: "title".to_string(),
                reason: format!(
                    "must be between {} and {} characters, got {}",
                    TITLE_MIN_LEN, TITLE_MAX_LEN, title_len
                ),
            });
        }

        if let Some(description) = &self.description {
            let len = description.chars().count();
            if len > DESCRIPTION_MAX_LEN {
                return Err(ValidationError::InvalidValue {
                    field: "description".to_string(),
                    reason: format!("must be at most {} characters, got {}", DESCRIPTION_MAX_LEN, len),
                });
            }
        }

        Ok(())
    }
}
