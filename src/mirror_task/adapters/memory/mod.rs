//! In-memory adapters for mirror task scheduling.

mod task;

pub use task::InMemoryMirrorTaskRepository;
