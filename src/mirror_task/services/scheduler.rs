//! Scheduler service consumed by orchestrators and sync workers.

use crate::config::SchedulerConfig;
use crate::mirror_task::{
    domain::{
        MirrorId, MirrorPriority, MirrorTask, MirrorTaskDetails, MirrorTaskDomainError,
        MirrorTaskEvent, MirrorTaskId, MirrorTaskStatus, NewMirrorTask, PageRequest,
        RepositorySyncStatus, SyncReport,
    },
    ports::{MirrorTaskRepository, MirrorTaskRepositoryError},
    services::cancellation::{CancellationWatch, spawn_cancellation_watch},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Request payload for scheduling a sync of one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueMirrorTaskRequest {
    mirror_id: MirrorId,
    priority: MirrorPriority,
    payload: Option<String>,
}

impl EnqueueMirrorTaskRequest {
    /// Creates a request for `mirror_id` at `priority`.
    #[must_use]
    pub const fn new(mirror_id: MirrorId, priority: MirrorPriority) -> Self {
        Self {
            mirror_id,
            priority,
            payload: None,
        }
    }

    /// Attaches an opaque caller payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    fn into_new_task(self) -> NewMirrorTask {
        let request = NewMirrorTask::new(self.mirror_id, self.priority);
        match self.payload {
            Some(payload) => request.with_payload(payload),
            None => request,
        }
    }
}

/// How many failed attempts a task may accumulate before it goes fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retry_count: u32,
}

impl RetryPolicy {
    /// Creates a policy tolerating `max_retry_count` failures.
    #[must_use]
    pub const fn new(max_retry_count: u32) -> Self {
        Self { max_retry_count }
    }

    /// Returns the number of tolerated failures.
    #[must_use]
    pub const fn max_retry_count(self) -> u32 {
        self.max_retry_count
    }

    /// Returns `true` once `retry_count` exceeds the tolerated failures.
    #[must_use]
    pub const fn is_exhausted(self, retry_count: u32) -> bool {
        retry_count > self.max_retry_count
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Service-level errors for mirror task scheduling.
#[derive(Debug, Error)]
pub enum MirrorSchedulerError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] MirrorTaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] MirrorTaskRepositoryError),
    /// The task was canceled and accepts no further reports.
    #[error("mirror task {0} is no longer active")]
    TaskInactive(MirrorTaskId),
    /// Only failed tasks can be requeued.
    #[error("mirror task {task_id} cannot be requeued from status '{status}'")]
    NotRetryable {
        /// Task the requeue was requested for.
        task_id: MirrorTaskId,
        /// Its current status.
        status: MirrorTaskStatus,
    },
}

impl MirrorSchedulerError {
    /// Returns `true` when a claim found nothing to do.
    #[must_use]
    pub const fn is_queue_empty(&self) -> bool {
        matches!(
            self,
            Self::Repository(MirrorTaskRepositoryError::NoEligibleTask)
        )
    }

    const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Repository(MirrorTaskRepositoryError::Persistence { .. })
        )
    }
}

/// Result type for scheduler operations.
pub type MirrorSchedulerResult<T> = Result<T, MirrorSchedulerError>;

/// Mirror task scheduling service.
#[derive(Clone)]
pub struct MirrorTaskScheduler<R, C>
where
    R: MirrorTaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    retry_policy: RetryPolicy,
    idle_poll_interval: Duration,
    cancellation_poll_interval: Duration,
}

impl<R, C> MirrorTaskScheduler<R, C>
where
    R: MirrorTaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler with default polling intervals and retry policy.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self::from_config(repository, clock, &SchedulerConfig::default())
    }

    /// Creates a scheduler using the intervals and retry limit in `config`.
    #[must_use]
    pub const fn from_config(repository: Arc<R>, clock: Arc<C>, config: &SchedulerConfig) -> Self {
        Self {
            repository,
            clock,
            retry_policy: RetryPolicy::new(config.max_retry_count),
            idle_poll_interval: config.idle_poll_interval,
            cancellation_poll_interval: config.cancellation_poll_interval,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replaces the sleep used by [`Self::wait_for_task`] on an empty queue.
    #[must_use]
    pub const fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    /// Replaces the polling interval of cancellation watches.
    #[must_use]
    pub const fn with_cancellation_poll_interval(mut self, interval: Duration) -> Self {
        self.cancellation_poll_interval = interval;
        self
    }

    /// Returns the active retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Creates and stores a queued task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the store rejects the
    /// task.
    #[instrument(skip(self, request), fields(mirror_id = %request.mirror_id, priority = %request.priority))]
    pub async fn enqueue(&self, request: EnqueueMirrorTaskRequest) -> MirrorSchedulerResult<MirrorTask> {
        let task = MirrorTask::queued(request.into_new_task(), &*self.clock);
        self.repository.create(&task).await?;
        info!(task_id = %task.id(), "mirror task queued");
        Ok(task)
    }

    /// Cancels every outstanding task of the mirror and queues a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the replacement
    /// transaction fails. Nothing is changed in that case.
    #[instrument(skip(self, request), fields(mirror_id = %request.mirror_id, priority = %request.priority))]
    pub async fn enqueue_replacing(
        &self,
        request: EnqueueMirrorTaskRequest,
    ) -> MirrorSchedulerResult<MirrorTask> {
        let task = MirrorTask::queued(request.into_new_task(), &*self.clock);
        let created = self
            .repository
            .cancel_other_tasks_and_create(&task, self.clock.utc())
            .await?;
        info!(task_id = %created.id(), "mirror task queued, earlier tasks canceled");
        Ok(created)
    }

    /// Claims the best eligible task, already advanced by `continue`.
    ///
    /// An empty `statuses` slice claims from `Queued`.
    ///
    /// # Errors
    ///
    /// Returns a [`MirrorSchedulerError`] for which
    /// [`MirrorSchedulerError::is_queue_empty`] holds when nothing is
    /// eligible, or the wrapped invalid transition when the selected row
    /// cannot be advanced.
    #[instrument(skip(self))]
    pub async fn claim_next(
        &self,
        statuses: &[MirrorTaskStatus],
    ) -> MirrorSchedulerResult<MirrorTask> {
        match self
            .repository
            .claim_highest_priority(statuses, self.clock.utc())
            .await
        {
            Ok(task) => {
                info!(
                    task_id = %task.id(),
                    mirror_id = %task.mirror_id(),
                    status = %task.status(),
                    "mirror task claimed"
                );
                Ok(task)
            }
            Err(MirrorTaskRepositoryError::NoEligibleTask) => {
                debug!("no eligible mirror task");
                Err(MirrorTaskRepositoryError::NoEligibleTask.into())
            }
            Err(MirrorTaskRepositoryError::Transition(err)) => {
                error!(error = %err, "claimed mirror task could not be advanced");
                Err(MirrorSchedulerError::Domain(err))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Claims a task, sleeping between attempts while the queue is empty.
    ///
    /// Persistence failures are logged and retried after the same sleep.
    /// Returns `Ok(None)` once `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns any claim error other than an empty queue or a persistence
    /// failure.
    pub async fn wait_for_task(
        &self,
        statuses: &[MirrorTaskStatus],
        shutdown: &CancellationToken,
    ) -> MirrorSchedulerResult<Option<MirrorTask>> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }
            match self.claim_next(statuses).await {
                Ok(task) => return Ok(Some(task)),
                Err(err) if err.is_queue_empty() => {}
                Err(err) if err.is_transient() => {
                    warn!(error = %err, "mirror task claim failed, retrying");
                }
                Err(err) => return Err(err),
            }
            tokio::select! {
                () = shutdown.cancelled() => return Ok(None),
                () = tokio::time::sleep(self.idle_poll_interval) => {}
            }
        }
    }

    /// Records worker-reported details without changing the status.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::TaskInactive`] for a canceled task,
    /// [`MirrorSchedulerError::Domain`] for negative progress, or a
    /// repository error when the status changed concurrently.
    #[instrument(skip(self, report))]
    pub async fn record_progress(
        &self,
        task_id: MirrorTaskId,
        report: SyncReport,
    ) -> MirrorSchedulerResult<MirrorTask> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        if expected == MirrorTaskStatus::Canceled {
            return Err(MirrorSchedulerError::TaskInactive(task_id));
        }
        task.record_report(report, &*self.clock)?;
        self.repository.update_guarded(&task, expected).await?;
        debug!(progress = task.progress(), "mirror task progress recorded");
        Ok(task)
    }

    /// Fires `event`, records `report` and mirrors the resulting status onto
    /// the owning repository's sync status.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Domain`] when the event is not allowed
    /// from the current status (the stored task is unchanged), or
    /// [`MirrorTaskRepositoryError::StatusConflict`] when another writer
    /// changed the status after it was loaded.
    #[instrument(skip(self, report))]
    pub async fn apply_event(
        &self,
        task_id: MirrorTaskId,
        event: MirrorTaskEvent,
        report: SyncReport,
    ) -> MirrorSchedulerResult<MirrorTask> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        task.record_report(report, &*self.clock)?;
        self.fire(&mut task, event)?;
        self.persist_with_repo_status(&task, expected).await?;
        info!(status = %task.status(), "mirror task advanced");
        Ok(task)
    }

    /// Records a failed attempt and applies the retry policy.
    ///
    /// The task moves to its failed status and its retry count grows by one;
    /// once the count exceeds the policy limit it moves on to fatal.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Domain`] when the task is not running,
    /// or [`MirrorTaskRepositoryError::StatusConflict`] when another writer
    /// changed the status after it was loaded.
    #[instrument(skip(self, error_message))]
    pub async fn record_failure(
        &self,
        task_id: MirrorTaskId,
        error_message: impl Into<String> + Send,
    ) -> MirrorSchedulerResult<MirrorTask> {
        let mut task = self.load(task_id).await?;
        let expected = task.status();
        task.record_report(
            SyncReport::new().with_error_message(error_message),
            &*self.clock,
        )?;
        self.fire(&mut task, MirrorTaskEvent::Fail)?;
        task.increment_retry_count();
        if self.retry_policy.is_exhausted(task.retry_count()) {
            self.fire(&mut task, MirrorTaskEvent::Fatal)?;
            warn!(
                retry_count = task.retry_count(),
                "mirror task exhausted its retries"
            );
        }
        self.persist_with_repo_status(&task, expected).await?;
        info!(
            status = %task.status(),
            retry_count = task.retry_count(),
            "mirror task failure recorded"
        );
        Ok(task)
    }

    /// Replaces a failed task with a fresh queued attempt for the same
    /// mirror, carrying over priority, payload and retry count.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::NotRetryable`] unless the task is in a
    /// non-fatal failed status.
    #[instrument(skip(self))]
    pub async fn requeue(&self, task_id: MirrorTaskId) -> MirrorSchedulerResult<MirrorTask> {
        let failed = self.load(task_id).await?;
        if !matches!(
            failed.status(),
            MirrorTaskStatus::RepoSyncFailed | MirrorTaskStatus::LfsSyncFailed
        ) {
            return Err(MirrorSchedulerError::NotRetryable {
                task_id,
                status: failed.status(),
            });
        }

        let mut request = NewMirrorTask::new(failed.mirror_id(), failed.priority())
            .with_retry_count(failed.retry_count());
        if let Some(payload) = failed.payload() {
            request = request.with_payload(payload);
        }
        let retry = MirrorTask::queued(request, &*self.clock);
        let created = self
            .repository
            .cancel_other_tasks_and_create(&retry, self.clock.utc())
            .await?;
        info!(new_task_id = %created.id(), "mirror task requeued");
        Ok(created)
    }

    /// Returns a task with its mirror and repository projections.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the lookup fails.
    pub async fn find(&self, task_id: MirrorTaskId) -> MirrorSchedulerResult<Option<MirrorTaskDetails>> {
        Ok(self.repository.find_by_id(task_id).await?)
    }

    /// Returns the most recently created task of a mirror.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the lookup fails.
    pub async fn find_latest_for_mirror(
        &self,
        mirror_id: MirrorId,
    ) -> MirrorSchedulerResult<Option<MirrorTask>> {
        Ok(self.repository.find_by_mirror_id(mirror_id).await?)
    }

    /// Lists tasks in `statuses` for dashboards.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the query fails.
    pub async fn list(
        &self,
        statuses: &[MirrorTaskStatus],
        page: PageRequest,
    ) -> MirrorSchedulerResult<Vec<MirrorTaskDetails>> {
        Ok(self
            .repository
            .list_by_status_with_priority(statuses, page)
            .await?)
    }

    /// Hard-deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the task does not
    /// exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, task_id: MirrorTaskId) -> MirrorSchedulerResult<()> {
        self.repository.delete(task_id).await?;
        info!("mirror task deleted");
        Ok(())
    }

    /// Points the owning mirror at `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the task or its
    /// mirror does not exist.
    #[instrument(skip(self))]
    pub async fn point_mirror_at(&self, task_id: MirrorTaskId) -> MirrorSchedulerResult<()> {
        let task = self.load(task_id).await?;
        self.repository.set_mirror_current_task_id(&task).await?;
        Ok(())
    }

    /// Moves every task in `from` to `to`, typically after a worker crash.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the update fails.
    #[instrument(skip(self))]
    pub async fn reset_running(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
    ) -> MirrorSchedulerResult<u64> {
        let changed = self
            .repository
            .reset_running_tasks(from, to, self.clock.utc())
            .await?;
        if changed > 0 {
            warn!(changed, "mirror tasks reset");
        }
        Ok(changed)
    }

    /// Returns `true` while the task exists and is not canceled.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorSchedulerError::Repository`] when the lookup fails.
    pub async fn is_active(&self, task_id: MirrorTaskId) -> MirrorSchedulerResult<bool> {
        let details = self.repository.find_by_id(task_id).await?;
        Ok(details.is_some_and(|found| found.task.status() != MirrorTaskStatus::Canceled))
    }

    async fn load(&self, task_id: MirrorTaskId) -> MirrorSchedulerResult<MirrorTask> {
        self.repository
            .find_by_id(task_id)
            .await?
            .map(|details| details.task)
            .ok_or(MirrorSchedulerError::Repository(
                MirrorTaskRepositoryError::NotFound(task_id),
            ))
    }

    fn fire(&self, task: &mut MirrorTask, event: MirrorTaskEvent) -> MirrorSchedulerResult<()> {
        task.apply(event, &*self.clock).map_err(|err| {
            error!(error = %err, "rejected mirror task transition");
            MirrorSchedulerError::from(err)
        })?;
        Ok(())
    }

    async fn persist_with_repo_status(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
    ) -> MirrorSchedulerResult<()> {
        self.repository
            .update_status_and_repo_sync_status(
                task,
                expected,
                RepositorySyncStatus::from(task.status()),
            )
            .await?;
        Ok(())
    }
}

impl<R, C> MirrorTaskScheduler<R, C>
where
    R: MirrorTaskRepository + 'static,
    C: Clock + Send + Sync,
{
    /// Starts a cancellation watch for a claimed task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn watch_cancellation(&self, task_id: MirrorTaskId) -> CancellationWatch {
        spawn_cancellation_watch(
            Arc::clone(&self.repository),
            task_id,
            self.cancellation_poll_interval,
        )
    }
}
