//! Ordinal task enums.
//!
//! Both enums travel over the wire as their ordinal (`0..=3`) so clients can
//! keep sending the integer codes they already use.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Task priority, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Critical];

    /// Resolve an ordinal, returning `None` outside `0..=3`.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Priority::Low),
            1 => Some(Priority::Medium),
            2 => Some(Priority::High),
            3 => Some(Priority::Critical),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Like [`Priority::from_ordinal`] but reports the range violation.
    pub fn parse_ordinal(ordinal: i64) -> Result<Self, ValidationError> {
        Self::from_ordinal(ordinal).ok_or_else(|| ValidationError::OutOfRange {
            field: "priority".to_string(),
            value: ordinal,
            min: 0,
            max: 3,
        })
    }
}

impl TryFrom<u8> for Priority {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::parse_ordinal(i64::from(value))
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.ordinal()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Task workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Done, Status::Cancelled];

    /// Resolve an ordinal, returning `None` outside `0..=3`.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Status::Todo),
            1 => Some(Status::InProgress),
            2 => Some(Status::Done),
            3 => Some(Status::Cancelled),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Like [`Status::from_ordinal`] but reports the range violation.
    pub fn parse_ordinal(ordinal: i64) -> Result<Self, ValidationError> {
        Self::from_ordinal(ordinal).ok_or_else(|| ValidationError::OutOfRange {
            field: "status".to_string(),
            value: ordinal,
            min: 0,
            max: 3,
        })
    }
}

impl TryFrom<u8> for Status {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::parse_ordinal(i64::from(value))
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        value.ordinal()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
