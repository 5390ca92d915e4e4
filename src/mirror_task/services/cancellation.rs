//! Cooperative cancellation for in-flight sync workers.
//!
//! A worker that has claimed a task keeps a [`CancellationWatch`] alive for
//! the duration of the sync. The watch re-reads the task row on a fixed
//! interval and trips its token once the row is canceled or deleted; the
//! worker selects on [`CancellationWatch::cancelled`] and abandons its work.

use crate::mirror_task::{
    domain::{MirrorTaskId, MirrorTaskStatus},
    ports::MirrorTaskRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running cancellation poller.
///
/// Dropping the watch stops polling.
#[derive(Debug)]
pub struct CancellationWatch {
    task_id: MirrorTaskId,
    token: CancellationToken,
    poller: JoinHandle<()>,
}

impl CancellationWatch {
    /// Returns the watched task.
    #[must_use]
    pub const fn task_id(&self) -> MirrorTaskId {
        self.task_id
    }

    /// Returns a clone of the token tripped on cancellation.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns `true` once the task has been canceled or removed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the task has been canceled or removed.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl Drop for CancellationWatch {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

/// Spawns a poller that trips a token when `task_id` is canceled or deleted.
///
/// Lookup failures are logged and retried on the next tick. Must be called
/// from within a Tokio runtime.
pub fn spawn_cancellation_watch<R>(
    repository: Arc<R>,
    task_id: MirrorTaskId,
    poll_interval: Duration,
) -> CancellationWatch
where
    R: MirrorTaskRepository + 'static,
{
    let token = CancellationToken::new();
    let tripped = token.clone();
    let poller = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = tripped.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match repository.find_by_id(task_id).await {
                Ok(Some(details)) if details.task.status() != MirrorTaskStatus::Canceled => {}
                Ok(Some(_)) => {
                    info!(%task_id, "mirror task canceled, signalling worker");
                    tripped.cancel();
                    break;
                }
                Ok(None) => {
                    warn!(%task_id, "mirror task disappeared, signalling worker");
                    tripped.cancel();
                    break;
                }
                Err(err) => {
                    warn!(%task_id, error = %err, "cancellation probe failed");
                }
            }
        }
    });

    CancellationWatch {
        task_id,
        token,
        poller,
    }
}
