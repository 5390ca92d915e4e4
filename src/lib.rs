//! Mirror tasks: replication task scheduling for hosted repository mirrors.
//!
//! This crate turns mirror definitions into discrete, resumable sync attempts
//! and hands them to concurrent workers through a race-free claiming
//! protocol, enforcing a strict lifecycle state machine on every attempt.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//!
//! # Modules
//!
//! - [`mirror_task`]: Task lifecycle, priority claim and scheduler service
//! - [`config`]: Environment-driven configuration
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod mirror_task;
pub mod telemetry;
