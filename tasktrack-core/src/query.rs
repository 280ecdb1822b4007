//! Read query shapes served through the query cache.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Priority, Status, TaskRecord};

/// Operation kind of a read query, independent of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    ListAll,
    ListByStatus,
    ListByPriority,
    SearchByTitle,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::ListAll => "list-all",
            QueryKind::ListByStatus => "list-by-status",
            QueryKind::ListByPriority => "list-by-priority",
            QueryKind::SearchByTitle => "search-by-title",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cacheable read against one identity's tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "param", rename_all = "kebab-case")]
pub enum TaskQuery {
    ListAll,
    ByStatus(Status),
    ByPriority(Priority),
    SearchTitle(String),
}

impl TaskQuery {
    /// Title search query. The text is lower-cased so that searches differing
    /// only by case share a result set.
    pub fn search_title(text: &str) -> Self {
        TaskQuery::SearchTitle(text.to_lowercase())
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            TaskQuery::ListAll => QueryKind::ListAll,
            TaskQuery::ByStatus(_) => QueryKind::ListByStatus,
            TaskQuery::ByPriority(_) => QueryKind::ListByPriority,
            TaskQuery::SearchTitle(_) => QueryKind::SearchByTitle,
        }
    }

    /// Canonical parameter string, `None` for parameterless queries.
    pub fn parameter(&self) -> Option<String> {
        match self {
            TaskQuery::ListAll => None,
            TaskQuery::ByStatus(status) => Some(status.ordinal().to_string()),
            TaskQuery::ByPriority(priority) => Some(priority.ordinal().to_string()),
            TaskQuery::SearchTitle(text) => Some(text.clone()),
        }
    }

    /// Whether `record` belongs in this query's result set. Ownership is not
    /// checked here; stores scope by identity before applying the query.
    pub fn matches(&self, record: &TaskRecord) -> bool {
        match self {
            TaskQuery::ListAll => true,
            TaskQuery::ByStatus(status) => record.status == *status,
            TaskQuery::ByPriority(priority) => record.priority == *priority,
            TaskQuery::SearchTitle(text) => record.title.to_lowercase().contains(text.as_str()),
        }
    }
}

impl fmt::Display for TaskQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parameter() {
            Some(param) => write!(f, "{}({})", self.kind(), param),
            None => f.write_str(self.kind().as_str()),
        }
    }
}
