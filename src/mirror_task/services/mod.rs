//! Application services for mirror task scheduling.

mod cancellation;
mod scheduler;

pub use cancellation::{CancellationWatch, spawn_cancellation_watch};
pub use scheduler::{
    EnqueueMirrorTaskRequest, MirrorSchedulerError, MirrorSchedulerResult, MirrorTaskScheduler,
    RetryPolicy,
};
