//! Read projections of the platform's mirror and repository records.

use super::{MirrorId, MirrorTask, MirrorTaskId, RepositoryId, RepositorySyncStatus};
use serde::{Deserialize, Serialize};

/// The slice of a mirror record the scheduler reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSummary {
    /// Mirror identifier.
    pub id: MirrorId,
    /// Hosted repository receiving the mirrored content.
    pub repository_id: RepositoryId,
    /// Upstream clone URL.
    pub source_url: String,
    /// Path of the hosted repository.
    pub local_repo_path: String,
    /// Task most recently claimed or created for this mirror.
    pub current_task_id: Option<MirrorTaskId>,
}

impl MirrorSummary {
    /// Creates a mirror projection with no current task.
    #[must_use]
    pub fn new(
        id: MirrorId,
        repository_id: RepositoryId,
        source_url: impl Into<String>,
        local_repo_path: impl Into<String>,
    ) -> Self {
        Self {
            id,
            repository_id,
            source_url: source_url.into(),
            local_repo_path: local_repo_path.into(),
            current_task_id: None,
        }
    }
}

/// The slice of a hosted repository record shown next to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    /// Repository identifier.
    pub id: RepositoryId,
    /// `namespace/name` path.
    pub path: String,
    /// Sync status shown on the repository page.
    pub sync_status: RepositorySyncStatus,
}

impl RepositorySummary {
    /// Creates a repository projection in the pending state.
    #[must_use]
    pub fn new(id: RepositoryId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            sync_status: RepositorySyncStatus::Pending,
        }
    }
}

/// A task with its owning mirror and repository eagerly loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTaskDetails {
    /// The task itself.
    pub task: MirrorTask,
    /// Owning mirror, if the row still exists.
    pub mirror: Option<MirrorSummary>,
    /// Repository of the owning mirror, if it still exists.
    pub repository: Option<RepositorySummary>,
}
