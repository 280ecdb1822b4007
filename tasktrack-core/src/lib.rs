//! TaskTrack Core - Entity Types
//!
//! Pure data structures shared by the storage and API crates. This crate
//! performs no I/O: identities, task records, query shapes, pagination and
//! the error taxonomy live here.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod page;
pub mod query;

pub use entities::{TaskDraft, TaskId, TaskRecord, DESCRIPTION_MAX_LEN, TITLE_MAX_LEN, TITLE_MIN_LEN};
pub use enums::{Priority, Status};
pub use error::{ConfigError, StorageError, TaskTrackError, TaskTrackResult, ValidationError};
pub use identity::{Identity, Timestamp};
pub use page::{PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use query::{QueryKind, TaskQuery};
