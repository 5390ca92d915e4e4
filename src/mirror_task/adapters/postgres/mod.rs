//! `PostgreSQL` adapters for mirror task persistence.

mod models;
mod repository;
mod schema;

pub use repository::{MirrorTaskPgPool, PostgresMirrorTaskRepository};
