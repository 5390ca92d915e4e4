//! Mirror task aggregate root.

use super::{
    MirrorId, MirrorPriority, MirrorTaskDomainError, MirrorTaskEvent, MirrorTaskId,
    MirrorTaskStatus,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Parameters for a new sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMirrorTask {
    mirror_id: MirrorId,
    priority: MirrorPriority,
    payload: Option<String>,
    retry_count: u32,
}

impl NewMirrorTask {
    /// Creates parameters for a task on `mirror_id`.
    #[must_use]
    pub const fn new(mirror_id: MirrorId, priority: MirrorPriority) -> Self {
        Self {
            mirror_id,
            priority,
            payload: None,
            retry_count: 0,
        }
    }

    /// Attaches the caller-owned payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Carries a retry count over from a previous attempt.
    #[must_use]
    pub const fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Worker-reported sync details that do not change the task status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    progress: Option<i32>,
    before_last_commit_id: Option<String>,
    after_last_commit_id: Option<String>,
    error_message: Option<String>,
}

impl SyncReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the progress value.
    #[must_use]
    pub const fn with_progress(mut self, progress: i32) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets the commit the mirror pointed at before the sync.
    #[must_use]
    pub fn with_before_last_commit_id(mut self, commit_id: impl Into<String>) -> Self {
        self.before_last_commit_id = Some(commit_id.into());
        self
    }

    /// Sets the commit the mirror points at after the sync.
    #[must_use]
    pub fn with_after_last_commit_id(mut self, commit_id: impl Into<String>) -> Self {
        self.after_last_commit_id = Some(commit_id.into());
        self
    }

    /// Sets the failure description.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// One discrete sync attempt for a mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTask {
    id: MirrorTaskId,
    mirror_id: MirrorId,
    status: MirrorTaskStatus,
    priority: MirrorPriority,
    retry_count: u32,
    error_message: Option<String>,
    payload: Option<String>,
    before_last_commit_id: Option<String>,
    after_last_commit_id: Option<String>,
    progress: i32,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMirrorTaskData {
    /// Persisted task identifier.
    pub id: MirrorTaskId,
    /// Owning mirror.
    pub mirror_id: MirrorId,
    /// Persisted status.
    pub status: MirrorTaskStatus,
    /// Persisted priority.
    pub priority: MirrorPriority,
    /// Persisted retry count.
    pub retry_count: u32,
    /// Persisted failure description.
    pub error_message: Option<String>,
    /// Persisted caller payload.
    pub payload: Option<String>,
    /// Persisted pre-sync commit watermark.
    pub before_last_commit_id: Option<String>,
    /// Persisted post-sync commit watermark.
    pub after_last_commit_id: Option<String>,
    /// Persisted progress.
    pub progress: i32,
    /// Persisted start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted finish timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl MirrorTask {
    /// Creates a queued task.
    #[must_use]
    pub fn queued(request: NewMirrorTask, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: MirrorTaskId::new(),
            mirror_id: request.mirror_id,
            status: MirrorTaskStatus::Queued,
            priority: request.priority,
            retry_count: request.retry_count,
            error_message: None,
            payload: request.payload,
            before_last_commit_id: None,
            after_last_commit_id: None,
            progress: 0,
            started_at: None,
            finished_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMirrorTaskData) -> Self {
        Self {
            id: data.id,
            mirror_id: data.mirror_id,
            status: data.status,
            priority: data.priority,
            retry_count: data.retry_count,
            error_message: data.error_message,
            payload: data.payload,
            before_last_commit_id: data.before_last_commit_id,
            after_last_commit_id: data.after_last_commit_id,
            progress: data.progress,
            started_at: data.started_at,
            finished_at: data.finished_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> MirrorTaskId {
        self.id
    }

    /// Returns the owning mirror.
    #[must_use]
    pub const fn mirror_id(&self) -> MirrorId {
        self.mirror_id
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> MirrorTaskStatus {
        self.status
    }

    /// Returns the dispatch priority.
    #[must_use]
    pub const fn priority(&self) -> MirrorPriority {
        self.priority
    }

    /// Returns the number of failed attempts recorded so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the last failure description.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the caller-owned payload.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Returns the commit watermark recorded before the sync.
    #[must_use]
    pub fn before_last_commit_id(&self) -> Option<&str> {
        self.before_last_commit_id.as_deref()
    }

    /// Returns the commit watermark recorded after the sync.
    #[must_use]
    pub fn after_last_commit_id(&self) -> Option<&str> {
        self.after_last_commit_id.as_deref()
    }

    /// Returns the worker-reported progress.
    #[must_use]
    pub const fn progress(&self) -> i32 {
        self.progress
    }

    /// Returns when a worker first claimed the task.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the task reached a terminal status.
    #[must_use]
    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Fires `event` and applies the resulting status.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskDomainError::InvalidTransition`] when the event is
    /// not defined for the current status. The task is left unchanged.
    pub fn apply(
        &mut self,
        event: MirrorTaskEvent,
        clock: &impl Clock,
    ) -> Result<MirrorTaskStatus, MirrorTaskDomainError> {
        self.apply_at(event, clock.utc())
    }

    /// Fires `event` using an explicit timestamp.
    ///
    /// Adapters use this inside claim transactions where the timestamp was
    /// taken before the connection was acquired.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskDomainError::InvalidTransition`] when the event is
    /// not defined for the current status. The task is left unchanged.
    pub fn apply_at(
        &mut self,
        event: MirrorTaskEvent,
        at: DateTime<Utc>,
    ) -> Result<MirrorTaskStatus, MirrorTaskDomainError> {
        let next =
            self.status
                .fire(event)
                .map_err(|rejected| MirrorTaskDomainError::InvalidTransition {
                    task_id: self.id,
                    from: rejected.from,
                    event: rejected.event,
                })?;
        self.enter(next, at);
        Ok(next)
    }

    /// Records worker-reported details without touching the status.
    ///
    /// Fields absent from the report keep their current values.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskDomainError::InvalidProgress`] for negative
    /// progress. The task is left unchanged.
    pub fn record_report(
        &mut self,
        report: SyncReport,
        clock: &impl Clock,
    ) -> Result<(), MirrorTaskDomainError> {
        if let Some(progress) = report.progress {
            if progress < 0 {
                return Err(MirrorTaskDomainError::InvalidProgress(progress));
            }
            self.progress = progress;
        }
        if report.before_last_commit_id.is_some() {
            self.before_last_commit_id = report.before_last_commit_id;
        }
        if report.after_last_commit_id.is_some() {
            self.after_last_commit_id = report.after_last_commit_id;
        }
        if report.error_message.is_some() {
            self.error_message = report.error_message;
        }
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Counts one more failed attempt.
    pub const fn increment_retry_count(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
    }

    /// Forces a status without consulting the state machine.
    ///
    /// Only the administrative bulk operations (cancel-and-replace and
    /// running-task resets) may bypass the transition table.
    pub(crate) fn override_status(&mut self, status: MirrorTaskStatus, at: DateTime<Utc>) {
        self.enter(status, at);
    }

    fn enter(&mut self, status: MirrorTaskStatus, at: DateTime<Utc>) {
        self.status = status;
        if status.is_in_flight() && self.started_at.is_none() {
            self.started_at = Some(at);
        }
        if status.is_terminal() {
            self.finished_at = Some(at);
        }
        self.updated_at = at;
    }
}
