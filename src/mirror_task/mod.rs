//! Mirror replication task scheduling.
//!
//! A mirror is re-synced through discrete attempts (tasks). Each task walks a
//! strict state machine from `Queued` through repository sync and LFS sync to
//! a terminal status. Any number of workers claim tasks concurrently; the
//! claim selects, locks and advances exactly one task per call and points the
//! owning mirror at it. The module follows hexagonal architecture:
//!
//! - Domain types and the transition table in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
