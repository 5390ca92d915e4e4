//! `PostgreSQL` repository implementation for mirror task storage.

use super::{
    models::{
        MirrorRow, MirrorTaskChangeset, MirrorTaskRow, NewMirrorTaskRow, RepositoryRow,
    },
    schema::{mirror_tasks, mirrors, repositories},
};
use crate::config::SchedulerConfig;
use crate::mirror_task::{
    domain::{
        MirrorId, MirrorPriority, MirrorSummary, MirrorTask, MirrorTaskDetails, MirrorTaskEvent,
        MirrorTaskId, MirrorTaskStatus, PageRequest, PersistedMirrorTaskData, RepositoryId,
        RepositorySummary, RepositorySyncStatus,
    },
    ports::{
        MirrorTaskRepository, MirrorTaskRepositoryError, MirrorTaskRepositoryResult,
        repository::claimable_statuses,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by mirror task adapters.
pub type MirrorTaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed mirror task repository.
///
/// Claims use `SELECT ... FOR UPDATE SKIP LOCKED`, so concurrent workers
/// never block on a row another worker is advancing.
#[derive(Debug, Clone)]
pub struct PostgresMirrorTaskRepository {
    pool: MirrorTaskPgPool,
}

impl From<DieselError> for MirrorTaskRepositoryError {
    fn from(err: DieselError) -> Self {
        Self::persistence("transaction", err)
    }
}

type DetailsRow = (MirrorTaskRow, Option<MirrorRow>, Option<RepositoryRow>);

impl PostgresMirrorTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: MirrorTaskPgPool) -> Self {
        Self { pool }
    }

    /// Builds a connection pool from `config` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] when no database URL
    /// is configured or the pool cannot be built.
    pub fn connect(config: &SchedulerConfig) -> MirrorTaskRepositoryResult<Self> {
        let url = config
            .require_database_url()
            .map_err(|err| MirrorTaskRepositoryError::persistence("connect", err))?;
        let manager = ConnectionManager::<PgConnection>::new(url);
        let pool = Pool::builder()
            .max_size(config.db_max_connections)
            .connection_timeout(config.db_connection_timeout)
            .build(manager)
            .map_err(|err| MirrorTaskRepositoryError::persistence("connect", err))?;
        Ok(Self::new(pool))
    }

    /// Inserts or replaces a mirror projection row.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] on database failure.
    pub async fn register_mirror(&self, mirror: &MirrorSummary) -> MirrorTaskRepositoryResult<()> {
        let row = MirrorRow {
            id: mirror.id.value(),
            repository_id: mirror.repository_id.value(),
            source_url: mirror.source_url.clone(),
            local_repo_path: mirror.local_repo_path.clone(),
            current_task_id: mirror.current_task_id.map(MirrorTaskId::into_inner),
        };
        self.run_blocking("register_mirror", move |connection| {
            diesel::insert_into(mirrors::table)
                .values(&row)
                .on_conflict(mirrors::id)
                .do_update()
                .set(&row)
                .execute(connection)
                .map_err(|err| MirrorTaskRepositoryError::persistence("register_mirror", err))?;
            Ok(())
        })
        .await
    }

    /// Inserts or replaces a repository projection row.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] on database failure.
    pub async fn register_repository(
        &self,
        repository: &RepositorySummary,
    ) -> MirrorTaskRepositoryResult<()> {
        let row = RepositoryRow {
            id: repository.id.value(),
            path: repository.path.clone(),
            sync_status: repository.sync_status.as_str().to_owned(),
        };
        self.run_blocking("register_repository", move |connection| {
            diesel::insert_into(repositories::table)
                .values(&row)
                .on_conflict(repositories::id)
                .do_update()
                .set(&row)
                .execute(connection)
                .map_err(|err| {
                    MirrorTaskRepositoryError::persistence("register_repository", err)
                })?;
            Ok(())
        })
        .await
    }

    /// Returns the current mirror projection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] on database failure.
    pub async fn mirror(&self, id: MirrorId) -> MirrorTaskRepositoryResult<Option<MirrorSummary>> {
        self.run_blocking("mirror", move |connection| {
            let row = mirrors::table
                .filter(mirrors::id.eq(id.value()))
                .select(MirrorRow::as_select())
                .first::<MirrorRow>(connection)
                .optional()
                .map_err(|err| MirrorTaskRepositoryError::persistence("mirror", err))?;
            Ok(row.map(row_to_mirror))
        })
        .await
    }

    /// Returns the current repository projection.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskRepositoryError::Persistence`] on database failure.
    pub async fn repository(
        &self,
        id: RepositoryId,
    ) -> MirrorTaskRepositoryResult<Option<RepositorySummary>> {
        self.run_blocking("repository", move |connection| {
            let row = repositories::table
                .filter(repositories::id.eq(id.value()))
                .select(RepositoryRow::as_select())
                .first::<RepositoryRow>(connection)
                .optional()
                .map_err(|err| MirrorTaskRepositoryError::persistence("repository", err))?;
            row.map(row_to_repository).transpose()
        })
        .await
    }

    async fn run_blocking<F, T>(
        &self,
        operation: &'static str,
        f: F,
    ) -> MirrorTaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> MirrorTaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(|err| MirrorTaskRepositoryError::persistence(operation, err))?;
            f(&mut connection)
        })
        .await
        .map_err(|err| MirrorTaskRepositoryError::persistence(operation, err))?
    }
}

#[async_trait]
impl MirrorTaskRepository for PostgresMirrorTaskRepository {
    async fn create(&self, task: &MirrorTask) -> MirrorTaskRepositoryResult<()> {
        let task_id = task.id();
        let new_row = to_new_row(task)?;

        self.run_blocking("create", move |connection| {
            insert_task(connection, &new_row, task_id)
        })
        .await
    }

    async fn update(&self, task: &MirrorTask) -> MirrorTaskRepositoryResult<()> {
        let task_id = task.id();
        let changeset = to_changeset(task)?;

        self.run_blocking("update", move |connection| {
            let updated_count =
                diesel::update(mirror_tasks::table.filter(mirror_tasks::id.eq(task_id.into_inner())))
                    .set(&changeset)
                    .execute(connection)
                    .map_err(|err| {
                        MirrorTaskRepositoryError::persistence_for("update", task_id, err)
                    })?;
            if updated_count == 0 {
                return Err(MirrorTaskRepositoryError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn update_guarded(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
    ) -> MirrorTaskRepositoryResult<()> {
        let task_id = task.id();
        let changeset = to_changeset(task)?;

        self.run_blocking("update_guarded", move |connection| {
            connection.transaction::<_, MirrorTaskRepositoryError, _>(|tx| {
                let updated_count = diesel::update(
                    mirror_tasks::table
                        .filter(mirror_tasks::id.eq(task_id.into_inner()))
                        .filter(mirror_tasks::status.eq(expected.as_str())),
                )
                .set(&changeset)
                .execute(tx)
                .map_err(|err| {
                    MirrorTaskRepositoryError::persistence_for("update_guarded", task_id, err)
                })?;
                if updated_count > 0 {
                    return Ok(());
                }

                let actual = mirror_tasks::table
                    .filter(mirror_tasks::id.eq(task_id.into_inner()))
                    .select(mirror_tasks::status)
                    .first::<String>(tx)
                    .optional()
                    .map_err(|err| {
                        MirrorTaskRepositoryError::persistence_for("update_guarded", task_id, err)
                    })?
                    .ok_or(MirrorTaskRepositoryError::NotFound(task_id))?;
                Err(MirrorTaskRepositoryError::StatusConflict {
                    task_id,
                    expected,
                    actual: parse_status(&actual)?,
                })
            })
        })
        .await
    }

    async fn find_by_mirror_id(
        &self,
        mirror_id: MirrorId,
    ) -> MirrorTaskRepositoryResult<Option<MirrorTask>> {
        self.run_blocking("find_by_mirror_id", move |connection| {
            let row = mirror_tasks::table
                .filter(mirror_tasks::mirror_id.eq(mirror_id.value()))
                .order(mirror_tasks::created_at.desc())
                .select(MirrorTaskRow::as_select())
                .first::<MirrorTaskRow>(connection)
                .optional()
                .map_err(|err| MirrorTaskRepositoryError::persistence("find_by_mirror_id", err))?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_by_id(
        &self,
        id: MirrorTaskId,
    ) -> MirrorTaskRepositoryResult<Option<MirrorTaskDetails>> {
        self.run_blocking("find_by_id", move |connection| {
            let row = mirror_tasks::table
                .left_join(mirrors::table.on(mirrors::id.eq(mirror_tasks::mirror_id)))
                .left_join(repositories::table.on(repositories::id.eq(mirrors::repository_id)))
                .filter(mirror_tasks::id.eq(id.into_inner()))
                .select((
                    MirrorTaskRow::as_select(),
                    Option::<MirrorRow>::as_select(),
                    Option::<RepositoryRow>::as_select(),
                ))
                .first::<DetailsRow>(connection)
                .optional()
                .map_err(|err| MirrorTaskRepositoryError::persistence_for("find_by_id", id, err))?;
            row.map(row_to_details).transpose()
        })
        .await
    }

    async fn list_by_status_with_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        page: PageRequest,
    ) -> MirrorTaskRepositoryResult<Vec<MirrorTaskDetails>> {
        let status_values = status_strings(statuses);
        let limit = i64::from(page.per());
        let offset = i64::try_from(page.offset()).map_err(|err| {
            MirrorTaskRepositoryError::persistence("list_by_status_with_priority", err)
        })?;

        self.run_blocking("list_by_status_with_priority", move |connection| {
            let rows = mirror_tasks::table
                .left_join(mirrors::table.on(mirrors::id.eq(mirror_tasks::mirror_id)))
                .left_join(repositories::table.on(repositories::id.eq(mirrors::repository_id)))
                .filter(mirror_tasks::status.eq_any(&status_values))
                .order((mirror_tasks::priority.desc(), mirror_tasks::created_at.desc()))
                .limit(limit)
                .offset(offset)
                .select((
                    MirrorTaskRow::as_select(),
                    Option::<MirrorRow>::as_select(),
                    Option::<RepositoryRow>::as_select(),
                ))
                .load::<DetailsRow>(connection)
                .map_err(|err| {
                    MirrorTaskRepositoryError::persistence("list_by_status_with_priority", err)
                })?;
            rows.into_iter().map(row_to_details).collect()
        })
        .await
    }

    async fn claim_highest_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        claimed_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<MirrorTask> {
        let eligible = status_strings(&claimable_statuses(statuses));

        self.run_blocking("claim_highest_priority", move |connection| {
            connection.transaction::<_, MirrorTaskRepositoryError, _>(|tx| {
                let row = mirror_tasks::table
                    .filter(mirror_tasks::status.eq_any(&eligible))
                    .order((mirror_tasks::priority.desc(), mirror_tasks::updated_at.desc()))
                    .limit(1)
                    .select(MirrorTaskRow::as_select())
                    .for_update()
                    .skip_locked()
                    .get_result::<MirrorTaskRow>(tx)
                    .optional()
                    .map_err(|err| {
                        MirrorTaskRepositoryError::persistence("claim_highest_priority", err)
                    })?
                    .ok_or(MirrorTaskRepositoryError::NoEligibleTask)?;

                let mut claimed = row_to_task(row)?;
                claimed.apply_at(MirrorTaskEvent::Continue, claimed_at)?;

                let changeset = to_changeset(&claimed)?;
                diesel::update(mirror_tasks::table.filter(mirror_tasks::id.eq(claimed.id().into_inner())))
                    .set(&changeset)
                    .execute(tx)
                    .map_err(|err| {
                        MirrorTaskRepositoryError::persistence_for(
                            "claim_highest_priority",
                            claimed.id(),
                            err,
                        )
                    })?;
                point_mirror_at(tx, &claimed)?;
                Ok(claimed)
            })
        })
        .await
    }

    async fn set_mirror_current_task_id(
        &self,
        task: &MirrorTask,
    ) -> MirrorTaskRepositoryResult<()> {
        let pointed = task.clone();
        self.run_blocking("set_mirror_current_task_id", move |connection| {
            let updated_count = point_mirror_at(connection, &pointed)?;
            if updated_count == 0 {
                return Err(MirrorTaskRepositoryError::MirrorNotFound(pointed.mirror_id()));
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: MirrorTaskId) -> MirrorTaskRepositoryResult<()> {
        self.run_blocking("delete", move |connection| {
            let deleted_count =
                diesel::delete(mirror_tasks::table.filter(mirror_tasks::id.eq(id.into_inner())))
                    .execute(connection)
                    .map_err(|err| MirrorTaskRepositoryError::persistence_for("delete", id, err))?;
            if deleted_count == 0 {
                return Err(MirrorTaskRepositoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn cancel_other_tasks_and_create(
        &self,
        task: &MirrorTask,
        canceled_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<MirrorTask> {
        let created = task.clone();
        let new_row = to_new_row(task)?;

        self.run_blocking("cancel_other_tasks_and_create", move |connection| {
            connection.transaction::<_, MirrorTaskRepositoryError, _>(|tx| {
                diesel::update(
                    mirror_tasks::table
                        .filter(mirror_tasks::mirror_id.eq(created.mirror_id().value()))
                        .filter(mirror_tasks::status.ne(MirrorTaskStatus::Canceled.as_str())),
                )
                .set((
                    mirror_tasks::status.eq(MirrorTaskStatus::Canceled.as_str()),
                    mirror_tasks::finished_at.eq(Some(canceled_at)),
                    mirror_tasks::updated_at.eq(canceled_at),
                ))
                .execute(tx)
                .map_err(|err| {
                    MirrorTaskRepositoryError::persistence("cancel_other_tasks_and_create", err)
                })?;

                insert_task(tx, &new_row, created.id())?;
                point_mirror_at(tx, &created)?;
                Ok(created)
            })
        })
        .await
    }

    async fn reset_running_tasks(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
        reset_at: DateTime<Utc>,
    ) -> MirrorTaskRepositoryResult<u64> {
        const OPERATION: &str = "reset_running_tasks";

        self.run_blocking(OPERATION, move |connection| {
            connection.transaction::<_, MirrorTaskRepositoryError, _>(|tx| {
                let failed =
                    |err: DieselError| MirrorTaskRepositoryError::persistence(OPERATION, err);
                let reset_ids = mirror_tasks::table
                    .filter(mirror_tasks::status.eq(from.as_str()))
                    .select(mirror_tasks::id)
                    .for_update()
                    .load::<uuid::Uuid>(tx)
                    .map_err(failed)?;
                if reset_ids.is_empty() {
                    return Ok(0);
                }
                let reset_rows = || {
                    mirror_tasks::table.filter(mirror_tasks::id.eq_any(reset_ids.iter().copied()))
                };

                diesel::update(reset_rows())
                    .set((
                        mirror_tasks::status.eq(to.as_str()),
                        mirror_tasks::updated_at.eq(reset_at),
                    ))
                    .execute(tx)
                    .map_err(failed)?;
                if to.is_in_flight() {
                    diesel::update(reset_rows().filter(mirror_tasks::started_at.is_null()))
                        .set(mirror_tasks::started_at.eq(Some(reset_at)))
                        .execute(tx)
                        .map_err(failed)?;
                }
                if to.is_terminal() {
                    diesel::update(reset_rows())
                        .set(mirror_tasks::finished_at.eq(Some(reset_at)))
                        .execute(tx)
                        .map_err(failed)?;
                }
                u64::try_from(reset_ids.len())
                    .map_err(|err| MirrorTaskRepositoryError::persistence(OPERATION, err))
            })
        })
        .await
    }

    async fn update_status_and_repo_sync_status(
        &self,
        task: &MirrorTask,
        expected: MirrorTaskStatus,
        sync_status: RepositorySyncStatus,
    ) -> MirrorTaskRepositoryResult<()> {
        const OPERATION: &str = "update_status_and_repo_sync_status";
        let task_id = task.id();
        let mirror_id = task.mirror_id();
        let changeset = to_changeset(task)?;

        self.run_blocking(OPERATION, move |connection| {
            connection.transaction::<_, MirrorTaskRepositoryError, _>(|tx| {
                let failed = move |err: DieselError| {
                    MirrorTaskRepositoryError::persistence_for(OPERATION, task_id, err)
                };
                let updated_count = diesel::update(
                    mirror_tasks::table
                        .filter(mirror_tasks::id.eq(task_id.into_inner()))
                        .filter(mirror_tasks::status.eq(expected.as_str())),
                )
                .set(&changeset)
                .execute(tx)
                .map_err(failed)?;
                if updated_count == 0 {
                    let stored = mirror_tasks::table
                        .filter(mirror_tasks::id.eq(task_id.into_inner()))
                        .select(mirror_tasks::status)
                        .first::<String>(tx)
                        .optional()
                        .map_err(failed)?
                        .ok_or(MirrorTaskRepositoryError::NotFound(task_id))?;
                    return Err(MirrorTaskRepositoryError::StatusConflict {
                        task_id,
                        expected,
                        actual: parse_status(&stored)?,
                    });
                }

                let repository_id = mirrors::table
                    .filter(mirrors::id.eq(mirror_id.value()))
                    .select(mirrors::repository_id)
                    .first::<i64>(tx)
                    .optional()
                    .map_err(failed)?;
                if let Some(linked_repository) = repository_id {
                    diesel::update(
                        repositories::table.filter(repositories::id.eq(linked_repository)),
                    )
                    .set(repositories::sync_status.eq(sync_status.as_str()))
                    .execute(tx)
                    .map_err(failed)?;
                }
                Ok(())
            })
        })
        .await
    }
}

fn insert_task(
    connection: &mut PgConnection,
    new_row: &NewMirrorTaskRow,
    task_id: MirrorTaskId,
) -> MirrorTaskRepositoryResult<()> {
    diesel::insert_into(mirror_tasks::table)
        .values(new_row)
        .execute(connection)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                MirrorTaskRepositoryError::DuplicateTask(task_id)
            }
            _ => MirrorTaskRepositoryError::persistence_for("insert", task_id, err),
        })?;
    Ok(())
}

fn point_mirror_at(
    connection: &mut PgConnection,
    task: &MirrorTask,
) -> MirrorTaskRepositoryResult<usize> {
    diesel::update(mirrors::table.filter(mirrors::id.eq(task.mirror_id().value())))
        .set(mirrors::current_task_id.eq(Some(task.id().into_inner())))
        .execute(connection)
        .map_err(|err| {
            MirrorTaskRepositoryError::persistence_for("set_mirror_current_task_id", task.id(), err)
        })
}

fn status_strings(statuses: &[MirrorTaskStatus]) -> Vec<String> {
    statuses
        .iter()
        .map(|status| status.as_str().to_owned())
        .collect()
}

fn parse_status(value: &str) -> MirrorTaskRepositoryResult<MirrorTaskStatus> {
    MirrorTaskStatus::try_from(value)
        .map_err(|err| MirrorTaskRepositoryError::persistence("decode", err))
}

fn to_new_row(task: &MirrorTask) -> MirrorTaskRepositoryResult<NewMirrorTaskRow> {
    let retry_count = i32::try_from(task.retry_count())
        .map_err(|err| MirrorTaskRepositoryError::persistence_for("encode", task.id(), err))?;

    Ok(NewMirrorTaskRow {
        id: task.id().into_inner(),
        mirror_id: task.mirror_id().value(),
        status: task.status().as_str().to_owned(),
        priority: task.priority().value(),
        retry_count,
        error_message: task.error_message().map(str::to_owned),
        payload: task.payload().map(str::to_owned),
        before_last_commit_id: task.before_last_commit_id().map(str::to_owned),
        after_last_commit_id: task.after_last_commit_id().map(str::to_owned),
        progress: task.progress(),
        started_at: task.started_at(),
        finished_at: task.finished_at(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn to_changeset(task: &MirrorTask) -> MirrorTaskRepositoryResult<MirrorTaskChangeset> {
    let retry_count = i32::try_from(task.retry_count())
        .map_err(|err| MirrorTaskRepositoryError::persistence_for("encode", task.id(), err))?;

    Ok(MirrorTaskChangeset {
        status: task.status().as_str().to_owned(),
        retry_count,
        error_message: task.error_message().map(str::to_owned),
        payload: task.payload().map(str::to_owned),
        before_last_commit_id: task.before_last_commit_id().map(str::to_owned),
        after_last_commit_id: task.after_last_commit_id().map(str::to_owned),
        progress: task.progress(),
        started_at: task.started_at(),
        finished_at: task.finished_at(),
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: MirrorTaskRow) -> MirrorTaskRepositoryResult<MirrorTask> {
    let MirrorTaskRow {
        id,
        mirror_id,
        status: persisted_status,
        priority: persisted_priority,
        retry_count: persisted_retry_count,
        error_message,
        payload,
        before_last_commit_id,
        after_last_commit_id,
        progress,
        started_at,
        finished_at,
        created_at,
        updated_at,
    } = row;

    let task_id = MirrorTaskId::from_uuid(id);
    let decode = |err: &dyn std::fmt::Display| {
        MirrorTaskRepositoryError::persistence_for(
            "decode",
            task_id,
            std::io::Error::other(err.to_string()),
        )
    };
    let status = MirrorTaskStatus::try_from(persisted_status.as_str()).map_err(|err| decode(&err))?;
    let priority = MirrorPriority::try_from(persisted_priority).map_err(|err| decode(&err))?;
    let retry_count = u32::try_from(persisted_retry_count).map_err(|err| decode(&err))?;

    Ok(MirrorTask::from_persisted(PersistedMirrorTaskData {
        id: task_id,
        mirror_id: MirrorId::new(mirror_id),
        status,
        priority,
        retry_count,
        error_message,
        payload,
        before_last_commit_id,
        after_last_commit_id,
        progress,
        started_at,
        finished_at,
        created_at,
        updated_at,
    }))
}

fn row_to_mirror(row: MirrorRow) -> MirrorSummary {
    MirrorSummary {
        id: MirrorId::new(row.id),
        repository_id: RepositoryId::new(row.repository_id),
        source_url: row.source_url,
        local_repo_path: row.local_repo_path,
        current_task_id: row.current_task_id.map(MirrorTaskId::from_uuid),
    }
}

fn row_to_repository(row: RepositoryRow) -> MirrorTaskRepositoryResult<RepositorySummary> {
    let sync_status = RepositorySyncStatus::try_from(row.sync_status.as_str())
        .map_err(|err| MirrorTaskRepositoryError::persistence("decode", err))?;
    Ok(RepositorySummary {
        id: RepositoryId::new(row.id),
        path: row.path,
        sync_status,
    })
}

fn row_to_details(row: DetailsRow) -> MirrorTaskRepositoryResult<MirrorTaskDetails> {
    let (task_row, mirror_row, repository_row) = row;
    Ok(MirrorTaskDetails {
        task: row_to_task(task_row)?,
        mirror: mirror_row.map(row_to_mirror),
        repository: repository_row.map(row_to_repository).transpose()?,
    })
}
