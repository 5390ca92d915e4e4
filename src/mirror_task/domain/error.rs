//! Error types for mirror task domain validation and parsing.

use super::{MirrorTaskEvent, MirrorTaskId, MirrorTaskStatus};
use thiserror::Error;

/// Errors returned by mirror task domain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MirrorTaskDomainError {
    /// The event is not defined for the task's current status.
    #[error("mirror task {task_id}: event '{event}' is not allowed from status '{from}'")]
    InvalidTransition {
        /// Task the event was fired against.
        task_id: MirrorTaskId,
        /// Status at the time the event was rejected.
        from: MirrorTaskStatus,
        /// Rejected event.
        event: MirrorTaskEvent,
    },

    /// Pagination parameters are out of range.
    #[error("invalid page request (per={per}, page={page}); both must be at least 1")]
    InvalidPage {
        /// Requested page size.
        per: u32,
        /// Requested 1-based page number.
        page: u32,
    },

    /// Reported progress is negative.
    #[error("invalid progress {0}, expected a non-negative value")]
    InvalidProgress(i32),
}

/// Error returned while parsing a task status from persistence or input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown mirror task status: {0}")]
pub struct ParseMirrorTaskStatusError(pub String);

/// Error returned while parsing a task event name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown mirror task event: {0}")]
pub struct ParseMirrorTaskEventError(pub String);

/// Error returned while parsing a mirror priority.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown mirror priority: {0}")]
pub struct ParseMirrorPriorityError(pub String);

/// Error returned while parsing a repository sync status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown repository sync status: {0}")]
pub struct ParseRepositorySyncStatusError(pub String);
