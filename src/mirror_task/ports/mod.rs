//! Port contracts for mirror task scheduling.
//!
//! Ports define infrastructure-agnostic interfaces used by scheduler services.

pub mod repository;

pub use repository::{MirrorTaskRepository, MirrorTaskRepositoryError, MirrorTaskRepositoryResult};

#[cfg(test)]
pub use repository::MockMirrorTaskRepository;
