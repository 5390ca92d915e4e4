//! Repository port for mirror task persistence and the priority claim.

use crate::mirror_task::domain::{
    MirrorId, MirrorTask, MirrorTaskDetails, MirrorTaskDomainError, MirrorTaskId,
    MirrorTaskStatus, PageRequest, RepositorySyncStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for mirror task repository operations.
pub type MirrorTaskRepositoryResult<T> = Result<T, MirrorTaskRepositoryError>;

/// Mirror task persistence contract.
///
/// Implementations must make [`claim_highest_priority`] exclusive: two
/// concurrent callers never receive the same task.
///
/// [`claim_highest_priority`]: MirrorTaskRepository::claim_highest_priority
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorTaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::DuplicateTask`] when the task ID
    /// already exists.
    async fn create(&self, task: &MirrorTask) -> MirrorTaskRepositoryResult<()>;

    /// Persists every mutable field of an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::NotFound`] when the task does not
    /// exist.
    async fn update(&self, task: &MirrorTask) -> MirrorTaskRepositoryResult<()>;

    /// Persists `task` only while the stored status still equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::StatusConflict`] when another
    /// writer changed the status first, or
    /// [`MirrorTaskRepositoryError::NotFound`] when the row is gone.
    async fn update_guarded(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
    ) -> MirrorTaskRepositoryResult<()>;

    /// Returns the most recently created task of a mirror.
    async fn find_by_mirror_id(
        &self,
        mirror_id: MirrorId,
    ) -> MirrorTaskRepositoryResult<Option<MirrorTask>>;

    /// Returns a task with its mirror and repository projections.
    async fn find_by_id(
        &self,
        id: MirrorTaskId,
    ) -> MirrorTaskRepositoryResult<Option<MirrorTaskDetails>>;

    /// Lists tasks whose status is in `statuses`, highest priority first and
    /// newest first within a priority.
    async fn list_by_status_with_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        page: PageRequest,
    ) -> MirrorTaskRepositoryResult<Vec<MirrorTaskDetails>>;

    /// Atomically claims the best eligible task and fires `continue` on it.
    ///
    /// An empty `statuses` slice means `Queued` only. Eligible rows are
    /// ordered by priority, then by most recent update. The owning mirror's
    /// `current_task_id` is pointed at the claimed task in the same unit of
    /// work.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::NoEligibleTask`] when nothing can
    /// be claimed, or [`MirrorTaskRepositoryError::Transition`] when the
    /// selected row cannot fire `continue`. Nothing is mutated in either case.
    async fn claim_highest_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        claimed_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<MirrorTask>;

    /// Points the owning mirror's `current_task_id` at `task`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::MirrorNotFound`] when the mirror
    /// row does not exist.
    async fn set_mirror_current_task_id(&self, task: &MirrorTask)
    -> MirrorTaskRepositoryResult<()>;

    /// Hard-deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::NotFound`] when the task does not
    /// exist.
    async fn delete(&self, id: MirrorTaskId) -> MirrorTaskRepositoryResult<()>;

    /// Cancels every task of the new task's mirror, stores the new task and
    /// points the mirror at it, all in one unit of work.
    async fn cancel_other_tasks_and_create(
        &self,
        task: &MirrorTask,
        canceled_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<MirrorTask>;

    /// Moves every task in `from` to `to` without consulting the state
    /// machine and returns how many rows changed.
    async fn reset_running_tasks(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
        reset_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<u64>;

    /// Persists `task` and the owning repository's sync status together,
    /// provided the stored status still equals `expected`.
    ///
    /// `expected` is the status the caller loaded before firing its event, so
    /// a concurrent transition or cancellation is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::NotFound`] when the task does not
    /// exist, or [`MirrorTaskRepositoryError::StatusConflict`] when the stored
    /// status differs from `expected`. Neither row is written in that case. A
    /// missing mirror or repository row is not an error.
    async fn update_status_and_repo_sync_status(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
        sync_status: RepositorySyncStatus,
    ) -> MirrorTaskRepositoryResult<()>;
}

/// Statuses a claim selects from; an empty request means `Queued` only.
pub(crate) fn claimable_statuses(statuses: &[MirrorTaskStatus]) -> Vec<MirrorTaskStatus> {
    if statuses.is_empty() {
        vec![MirrorTaskStatus::Queued]
    } else {
        statuses.to_vec()
    }
}

/// Errors returned by mirror task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum MirrorTaskRepositoryError {
    /// The task was not found.
    #[error("mirror task not found: {0}")]
    NotFound(MirrorTaskId),

    /// The mirror row was not found.
    #[error("mirror not found: {0}")]
    MirrorNotFound(MirrorId),

    /// No task in the requested statuses can be claimed.
    #[error("queue empty: no eligible mirror task")]
    NoEligibleTask,

    /// A task with the same identifier already exists.
    #[error("duplicate mirror task identifier: {0}")]
    DuplicateTask(MirrorTaskId),

    /// The stored status changed since the caller loaded the task.
    #[error("mirror task {task_id}: expected status '{expected}', found '{actual}'")]
    StatusConflict {
        /// Task whose update was rejected.
        task_id: MirrorTaskId,
        /// Status the caller required to find.
        expected: MirrorTaskStatus,
        /// Status currently stored.
        actual: MirrorTaskStatus,
    },

    /// The claimed row could not be advanced.
    #[error(transparent)]
    Transition(#[from] MirrorTaskDomainError),

    /// Persistence-layer failure.
    #[error("persistence error during {operation}: {source}")]
    Persistence {
        /// Repository operation that failed.
        operation: &'static str,
        /// Task involved, when known.
        task_id: Option<MirrorTaskId>,
        /// Underlying failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl MirrorTaskRepositoryError {
    /// Wraps a persistence error raised by `operation`.
    pub fn persistence(
        operation: &'static str,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            operation,
            task_id: None,
            source: Arc::new(err),
        }
    }

    /// Wraps a persistence error raised by `operation` on `task_id`.
    pub fn persistence_for(
        operation: &'static str,
        task_id: MirrorTaskId,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            operation,
            task_id: Some(task_id),
            source: Arc::new(err),
        }
    }

    /// Returns `true` for the empty-queue outcome of a claim.
    #[must_use]
    pub const fn is_no_eligible_task(&self) -> bool {
        matches!(self, Self::NoEligibleTask)
    }
}
