//! Domain model for mirror sync tasks.
//!
//! The domain owns the task aggregate and its state machine. Persistence and
//! locking concerns stay outside the domain boundary.

mod error;
mod ids;
mod machine;
mod mirror;
mod page;
mod priority;
mod status;
mod task;

pub use error::{
    MirrorTaskDomainError, ParseMirrorPriorityError, ParseMirrorTaskEventError,
    ParseMirrorTaskStatusError, ParseRepositorySyncStatusError,
};
pub use ids::{MirrorId, MirrorTaskId, RepositoryId};
pub use machine::{IllegalTransition, MirrorTaskEvent};
pub use mirror::{MirrorSummary, MirrorTaskDetails, RepositorySummary};
pub use page::PageRequest;
pub use priority::MirrorPriority;
pub use status::{MirrorTaskStatus, RepositorySyncStatus};
pub use task::{MirrorTask, NewMirrorTask, PersistedMirrorTaskData, SyncReport};
