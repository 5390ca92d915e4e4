//! In-memory repository for scheduler tests and embedded deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::mirror_task::{
    domain::{
        MirrorId, MirrorSummary, MirrorTask, MirrorTaskDetails, MirrorTaskEvent, MirrorTaskId,
        MirrorTaskStatus, PageRequest, RepositoryId, RepositorySummary, RepositorySyncStatus,
    },
    ports::{
        MirrorTaskRepository, MirrorTaskRepositoryError, MirrorTaskRepositoryResult,
        repository::claimable_statuses,
    },
};

/// Thread-safe in-memory mirror task repository.
///
/// Every mutating operation runs under a single write lock, so a claim is
/// exclusive without row-level locking.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMirrorTaskRepository {
    state: Arc<RwLock<InMemoryMirrorState>>,
}

#[derive(Debug, Default)]
struct InMemoryMirrorState {
    tasks: HashMap<MirrorTaskId, MirrorTask>,
    mirrors: HashMap<MirrorId, MirrorSummary>,
    repositories: HashMap<RepositoryId, RepositorySummary>,
}

impl InMemoryMirrorState {
    fn details(&self, task: &MirrorTask) -> MirrorTaskDetails {
        let mirror = self.mirrors.get(&task.mirror_id()).cloned();
        let repository = mirror
            .as_ref()
            .and_then(|summary| self.repositories.get(&summary.repository_id))
            .cloned();
        MirrorTaskDetails {
            task: task.clone(),
            mirror,
            repository,
        }
    }

    fn point_mirror_at(&mut self, task: &MirrorTask) {
        if let Some(mirror) = self.mirrors.get_mut(&task.mirror_id()) {
            mirror.current_task_id = Some(task.id());
        }
    }
}

fn poisoned<T>(operation: &'static str) -> impl FnOnce(PoisonError<T>) -> MirrorTaskRepositoryError {
    move |err| {
        MirrorTaskRepositoryError::persistence(operation, std::io::Error::other(err.to_string()))
    }
}

impl InMemoryMirrorTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a mirror projection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] when the state lock
    /// is poisoned.
    pub fn register_mirror(&self, mirror: MirrorSummary) -> MirrorTaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned("register_mirror"))?;
        state.mirrors.insert(mirror.id, mirror);
        Ok(())
    }

    /// Adds or replaces a repository projection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] when the state lock
    /// is poisoned.
    pub fn register_repository(
        &self,
        repository: RepositorySummary,
    ) -> MirrorTaskRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(poisoned("register_repository"))?;
        state.repositories.insert(repository.id, repository);
        Ok(())
    }

    /// Returns the current mirror projection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] when the state lock
    /// is poisoned.
    pub fn mirror(&self, id: MirrorId) -> MirrorTaskRepositoryResult<Option<MirrorSummary>> {
        let state = self.state.read().map_err(poisoned("mirror"))?;
        Ok(state.mirrors.get(&id).cloned())
    }

    /// Returns the current repository projection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] when the state lock
    /// is poisoned.
    pub fn repository(
        &self,
        id: RepositoryId,
    ) -> MirrorTaskRepositoryResult<Option<RepositorySummary>> {
        let state = self.state.read().map_err(poisoned("repository"))?;
        Ok(state.repositories.get(&id).cloned())
    }
}

#[async_trait]
impl MirrorTaskRepository for InMemoryMirrorTaskRepository {
    async fn create(&self, task: &MirrorTask) -> MirrorTaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned("create"))?;
        if state.tasks.contains_key(&task.id()) {
            return Err(MirrorTaskRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &MirrorTask) -> MirrorTaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned("update"))?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(MirrorTaskRepositoryError::NotFound(task.id()))?;
        *stored = task.clone();
        Ok(())
    }

    async fn update_guarded(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
    ) -> MirrorTaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned("update_guarded"))?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(MirrorTaskRepositoryError::NotFound(task.id()))?;
        if stored.status() != expected {
            return Err(MirrorTaskRepositoryError::StatusConflict {
                task_id: task.id(),
                expected,
                actual: stored.status(),
            });
        }
        *stored = task.clone();
        Ok(())
    }

    async fn find_by_mirror_id(
        &self,
        mirror_id: MirrorId,
    ) -> MirrorTaskRepositoryResult<Option<MirrorTask>> {
        let state = self.state.read().map_err(poisoned("find_by_mirror_id"))?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.mirror_id() == mirror_id)
            .max_by_key(|task| task.created_at())
            .cloned())
    }

    async fn find_by_id(
        &self,
        id: MirrorTaskId,
    ) -> MirrorTaskRepositoryResult<Option<MirrorTaskDetails>> {
        let state = self.state.read().map_err(poisoned("find_by_id"))?;
        Ok(state.tasks.get(&id).map(|task| state.details(task)))
    }

    async fn list_by_status_with_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        page: PageRequest,
    ) -> MirrorTaskRepositoryResult<Vec<MirrorTaskDetails>> {
        let state = self
            .state
            .read()
            .map_err(poisoned("list_by_status_with_priority"))?;
        let mut matching: Vec<&MirrorTask> = state
            .tasks
            .values()
            .filter(|task| statuses.contains(&task.status()))
            .collect();
        matching.sort_by_key(|task| (Reverse(task.priority()), Reverse(task.created_at())));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let per = usize::try_from(page.per()).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(per)
            .map(|task| state.details(task))
            .collect())
    }

    async fn claim_highest_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        claimed_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<MirrorTask> {
        let eligible = claimable_statuses(statuses);
        let mut state = self
            .state
            .write()
            .map_err(poisoned("claim_highest_priority"))?;

        let mut claimed = state
            .tasks
            .values()
            .filter(|task| eligible.contains(&task.status()))
            .max_by_key(|task| (task.priority(), task.updated_at()))
            .cloned()
            .ok_or(MirrorTaskRepositoryError::NoEligibleTask)?;

        claimed.apply_at(MirrorTaskEvent::Continue, claimed_at)?;
        state.point_mirror_at(&claimed);
        state.tasks.insert(claimed.id(), claimed.clone());
        Ok(claimed)
    }

    async fn set_mirror_current_task_id(
        &self,
        task: &MirrorTask,
    ) -> MirrorTaskRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(poisoned("set_mirror_current_task_id"))?;
        let mirror = state
            .mirrors
            .get_mut(&task.mirror_id())
            .ok_or(MirrorTaskRepositoryError::MirrorNotFound(task.mirror_id()))?;
        mirror.current_task_id = Some(task.id());
        Ok(())
    }

    async fn delete(&self, id: MirrorTaskId) -> MirrorTaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned("delete"))?;
        state
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(MirrorTaskRepositoryError::NotFound(id))
    }

    async fn cancel_other_tasks_and_create(
        &self,
        task: &MirrorTask,
        canceled_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<MirrorTask> {
        let mut state = self
            .state
            .write()
            .map_err(poisoned("cancel_other_tasks_and_create"))?;
        if state.tasks.contains_key(&task.id()) {
            return Err(MirrorTaskRepositoryError::DuplicateTask(task.id()));
        }

        state
            .tasks
            .values_mut()
            .filter(|existing| {
                existing.mirror_id() == task.mirror_id()
                    && existing.status() != MirrorTaskStatus::Canceled
            })
            .for_each(|existing| existing.override_status(MirrorTaskStatus::Canceled, canceled_at));

        state.tasks.insert(task.id(), task.clone());
        state.point_mirror_at(task);
        Ok(task.clone())
    }

    async fn reset_running_tasks(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
        reset_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<u64> {
        let mut state = self.state.write().map_err(poisoned("reset_running_tasks"))?;
        let mut changed = 0_u64;
        for task in state.tasks.values_mut().filter(|task| task.status() == from) {
            task.override_status(to, reset_at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn update_status_and_repo_sync_status(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
        sync_status: RepositorySyncStatus,
    ) -> MirrorTaskRepositoryResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(poisoned("update_status_and_repo_sync_status"))?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(MirrorTaskRepositoryError::NotFound(task.id()))?;
        if stored.status() != expected {
            return Err(MirrorTaskRepositoryError::StatusConflict {
                task_id: task.id(),
                expected,
                actual: stored.status(),
            });
        }
        *stored = task.clone();

        let repository_id = state
            .mirrors
            .get(&task.mirror_id())
            .map(|mirror| mirror.repository_id);
        if let Some(repository) =
            repository_id.and_then(|id| state.repositories.get_mut(&id))
        {
            repository.sync_status = sync_status;
        }
        Ok(())
    }
}
