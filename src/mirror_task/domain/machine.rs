//! Transition table for the mirror task state machine.
//!
//! The machine is a pure lookup: [`MirrorTaskStatus::fire`] returns the
//! destination status or an [`IllegalTransition`] and never mutates anything.
//! Callers apply the returned status to the task explicitly.

use super::{MirrorTaskStatus, ParseMirrorTaskEventError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Event fired against a task's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorTaskEvent {
    /// Move from a waiting status into the next sync step.
    Continue,
    /// The running sync step completed.
    Success,
    /// The running sync step failed.
    Fail,
    /// A failed step will not be retried.
    Fatal,
    /// The task is withdrawn.
    Cancel,
}

impl MirrorTaskEvent {
    /// Every event.
    pub const ALL: [Self; 5] = [
        Self::Continue,
        Self::Success,
        Self::Fail,
        Self::Fatal,
        Self::Cancel,
    ];

    /// Returns the event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Fatal => "fatal",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for MirrorTaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MirrorTaskEvent {
    type Error = ParseMirrorTaskEventError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == normalized)
            .ok_or_else(|| ParseMirrorTaskEventError(value.to_owned()))
    }
}

/// An event that is not defined for the status it was fired against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event '{event}' is not allowed from status '{from}'")]
pub struct IllegalTransition {
    /// Status the event was fired against.
    pub from: MirrorTaskStatus,
    /// Rejected event.
    pub event: MirrorTaskEvent,
}

use MirrorTaskEvent as E;
use MirrorTaskStatus as S;

const TRANSITIONS: &[(MirrorTaskStatus, MirrorTaskEvent, MirrorTaskStatus)] = &[
    (S::Queued, E::Continue, S::RepoSyncStart),
    (S::RepoSyncFinished, E::Continue, S::LfsSyncStart),
    (S::RepoSyncStart, E::Success, S::RepoSyncFinished),
    (S::LfsSyncStart, E::Success, S::LfsSyncFinished),
    (S::RepoSyncStart, E::Fail, S::RepoSyncFailed),
    (S::LfsSyncStart, E::Fail, S::LfsSyncFailed),
    (S::RepoSyncFailed, E::Fatal, S::RepoSyncFatal),
    (S::LfsSyncFailed, E::Fatal, S::LfsSyncFatal),
    (S::Queued, E::Cancel, S::Canceled),
    (S::RepoSyncStart, E::Cancel, S::Canceled),
    (S::RepoSyncFailed, E::Cancel, S::Canceled),
    (S::RepoSyncFinished, E::Cancel, S::Canceled),
    (S::RepoSyncFatal, E::Cancel, S::Canceled),
    (S::LfsSyncStart, E::Cancel, S::Canceled),
    (S::LfsSyncFailed, E::Cancel, S::Canceled),
    (S::LfsSyncFinished, E::Cancel, S::Canceled),
    (S::LfsSyncFatal, E::Cancel, S::Canceled),
];

impl MirrorTaskStatus {
    /// Returns the status reached by firing `event` from `self`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] when the table has no edge for the
    /// `(status, event)` pair.
    pub fn fire(self, event: MirrorTaskEvent) -> Result<Self, IllegalTransition> {
        TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == self && *on == event)
            .map(|(_, _, to)| *to)
            .ok_or(IllegalTransition { from: self, event })
    }

    /// Returns `true` when `event` is defined for `self`.
    #[must_use]
    pub fn can_fire(self, event: MirrorTaskEvent) -> bool {
        self.fire(event).is_ok()
    }

    /// Events that are defined for `self`, in table order.
    #[must_use]
    pub fn allowed_events(self) -> Vec<MirrorTaskEvent> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == self)
            .map(|(_, event, _)| *event)
            .collect()
    }
}
