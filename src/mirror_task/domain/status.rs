//! Task status and the repository sync status derived from it.

use super::{ParseMirrorTaskStatusError, ParseRepositorySyncStatusError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a mirror task.
///
/// The storage strings predate this crate and are shared with the platform's
/// existing `mirror_tasks` rows, which is why `RepoSyncStart` is stored as
/// `running` and the LFS states use bare names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MirrorTaskStatus {
    /// Waiting to be claimed for repository sync.
    #[serde(rename = "queued")]
    Queued,
    /// A worker owns the repository sync step.
    #[serde(rename = "running")]
    RepoSyncStart,
    /// Repository sync failed; may be retried.
    #[serde(rename = "repo_failed")]
    RepoSyncFailed,
    /// Repository sync failed permanently.
    #[serde(rename = "repo_fatal")]
    RepoSyncFatal,
    /// Repository content is synced; waiting to be claimed for LFS sync.
    #[serde(rename = "repo_synced")]
    RepoSyncFinished,
    /// A worker owns the LFS sync step.
    #[serde(rename = "lfs_start")]
    LfsSyncStart,
    /// LFS sync failed; may be retried.
    #[serde(rename = "failed")]
    LfsSyncFailed,
    /// LFS sync failed permanently.
    #[serde(rename = "fatal")]
    LfsSyncFatal,
    /// Both sync steps completed.
    #[serde(rename = "finished")]
    LfsSyncFinished,
    /// Superseded or withdrawn.
    #[serde(rename = "cancelled")]
    Canceled,
}

impl MirrorTaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 10] = [
        Self::Queued,
        Self::RepoSyncStart,
        Self::RepoSyncFailed,
        Self::RepoSyncFatal,
        Self::RepoSyncFinished,
        Self::LfsSyncStart,
        Self::LfsSyncFailed,
        Self::LfsSyncFatal,
        Self::LfsSyncFinished,
        Self::Canceled,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::RepoSyncStart => "running",
            Self::RepoSyncFailed => "repo_failed",
            Self::RepoSyncFatal => "repo_fatal",
            Self::RepoSyncFinished => "repo_synced",
            Self::LfsSyncStart => "lfs_start",
            Self::LfsSyncFailed => "failed",
            Self::LfsSyncFatal => "fatal",
            Self::LfsSyncFinished => "finished",
            Self::Canceled => "cancelled",
        }
    }

    /// Returns `true` when no further sync work can happen for the task.
    ///
    /// Failed states are not terminal: an orchestrator either retries them
    /// or pushes them to the matching fatal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::RepoSyncFatal | Self::LfsSyncFatal | Self::LfsSyncFinished | Self::Canceled
        )
    }

    /// Returns `true` when a worker currently owns a sync step.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::RepoSyncStart | Self::LfsSyncStart)
    }
}

impl fmt::Display for MirrorTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MirrorTaskStatus {
    type Error = ParseMirrorTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseMirrorTaskStatusError(value.to_owned()))
    }
}

/// Sync status shown on the hosted repository while it is being mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositorySyncStatus {
    /// No sync has started.
    Pending,
    /// A sync step is running or queued behind a finished step.
    #[serde(rename = "inprogress")]
    InProgress,
    /// The last sync attempt failed.
    Failed,
    /// Repository and LFS content are in sync.
    Completed,
    /// The sync was withdrawn.
    Canceled,
}

impl RepositorySyncStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inprogress",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RepositorySyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RepositorySyncStatus {
    type Error = ParseRepositorySyncStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "inprogress" => Ok(Self::InProgress),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(ParseRepositorySyncStatusError(value.to_owned())),
        }
    }
}

impl From<MirrorTaskStatus> for RepositorySyncStatus {
    fn from(status: MirrorTaskStatus) -> Self {
        match status {
            MirrorTaskStatus::Queued => Self::Pending,
            MirrorTaskStatus::RepoSyncStart
            | MirrorTaskStatus::RepoSyncFinished
            | MirrorTaskStatus::LfsSyncStart => Self::InProgress,
            MirrorTaskStatus::RepoSyncFailed
            | MirrorTaskStatus::RepoSyncFatal
            | MirrorTaskStatus::LfsSyncFailed
            | MirrorTaskStatus::LfsSyncFatal => Self::Failed,
            MirrorTaskStatus::LfsSyncFinished => Self::Completed,
            MirrorTaskStatus::Canceled => Self::Canceled,
        }
    }
}
