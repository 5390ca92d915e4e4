//! Diesel row models for mirror task persistence.

use super::schema::{mirror_tasks, mirrors, repositories};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for mirror task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = mirror_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MirrorTaskRow {
    pub id: uuid::Uuid,
    pub mirror_id: i64,
    pub status: String,
    pub priority: i32,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub payload: Option<String>,
    pub before_last_commit_id: Option<String>,
    pub after_last_commit_id: Option<String>,
    pub progress: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for mirror task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mirror_tasks)]
pub struct NewMirrorTaskRow {
    pub id: uuid::Uuid,
    pub mirror_id: i64,
    pub status: String,
    pub priority: i32,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub payload: Option<String>,
    pub before_last_commit_id: Option<String>,
    pub after_last_commit_id: Option<String>,
    pub progress: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset written by full and guarded updates.
///
/// `None` optionals are written as `NULL` so the row mirrors the aggregate.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = mirror_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct MirrorTaskChangeset {
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub payload: Option<String>,
    pub before_last_commit_id: Option<String>,
    pub after_last_commit_id: Option<String>,
    pub progress: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Row model for mirror projections.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = mirrors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MirrorRow {
    pub id: i64,
    pub repository_id: i64,
    pub source_url: String,
    pub local_repo_path: String,
    pub current_task_id: Option<uuid::Uuid>,
}

/// Row model for repository projections.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = repositories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RepositoryRow {
    pub id: i64,
    pub path: String,
    pub sync_status: String,
}
