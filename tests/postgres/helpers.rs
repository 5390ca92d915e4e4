//! Shared test helpers for `PostgreSQL` integration tests.

use super::cluster::{TemporaryDatabase, ensure_template};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mirror_tasks::mirror_task::{
    adapters::postgres::{MirrorTaskPgPool, PostgresMirrorTaskRepository},
    domain::{MirrorId, MirrorSummary, RepositoryId, RepositorySummary},
    services::MirrorTaskScheduler,
};
use mockable::DefaultClock;
use pg_embedded_setup_unpriv::TestCluster;
use pg_embedded_setup_unpriv::test_support::shared_test_cluster;
use rstest::fixture;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Number of mirrors seeded into every prepared database.
pub const MIRROR_COUNT: i64 = 3;

/// Scheduler type used across the `PostgreSQL` suites.
pub type PgScheduler = MirrorTaskScheduler<PostgresMirrorTaskRepository, DefaultClock>;

/// Returns the repository id paired with `mirror_id` by [`prepared_repo`].
#[must_use]
pub const fn repository_for(mirror_id: MirrorId) -> RepositoryId {
    RepositoryId::new(mirror_id.value() + 100)
}

/// Creates a multi-threaded runtime so spawned workers claim in parallel.
fn test_runtime() -> eyre::Result<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?)
}

async fn seed_mirrors(repo: &PostgresMirrorTaskRepository) -> eyre::Result<()> {
    for raw in 1..=MIRROR_COUNT {
        let mirror_id = MirrorId::new(raw);
        let repository_id = repository_for(mirror_id);
        repo.register_repository(&RepositorySummary::new(
            repository_id,
            format!("group/project-{raw}"),
        ))
        .await?;
        repo.register_mirror(&MirrorSummary::new(
            mirror_id,
            repository_id,
            format!("https://upstream.example/project-{raw}.git"),
            format!("/var/mirrors/project-{raw}.git"),
        ))
        .await?;
    }
    Ok(())
}

/// Prepared repository context for tests that need database access.
///
/// Fields drop in declaration order, so the pool is closed before the
/// temporary database is dropped.
pub struct PreparedRepo {
    /// Scheduler sharing `repo`.
    pub scheduler: PgScheduler,
    /// Repository over a private database.
    pub repo: Arc<PostgresMirrorTaskRepository>,
    runtime: Runtime,
    /// Temporary database cloned from the migrated template.
    pub temp_db: TemporaryDatabase,
}

impl PreparedRepo {
    /// Builds another scheduler over the same database, as a second worker
    /// process would.
    #[must_use]
    pub fn worker(&self) -> PgScheduler {
        MirrorTaskScheduler::new(Arc::clone(&self.repo), Arc::new(DefaultClock))
    }

    /// Drives `future` to completion on the context's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Creates a migrated, seeded database on the shared embedded cluster.
///
/// # Errors
///
/// Returns an error if template creation, database setup or seeding fails.
#[fixture]
pub fn prepared_repo(shared_test_cluster: &'static TestCluster) -> eyre::Result<PreparedRepo> {
    ensure_template(shared_test_cluster)?;
    let temp_db = TemporaryDatabase::from_template(shared_test_cluster)?;

    let manager = ConnectionManager::<PgConnection>::new(temp_db.url());
    let pool: MirrorTaskPgPool = Pool::builder().max_size(8).build(manager)?;
    let repo = Arc::new(PostgresMirrorTaskRepository::new(pool));

    let runtime = test_runtime()?;
    runtime.block_on(seed_mirrors(&repo))?;

    let scheduler = MirrorTaskScheduler::new(Arc::clone(&repo), Arc::new(DefaultClock));
    Ok(PreparedRepo {
        scheduler,
        repo,
        runtime,
        temp_db,
    })
}
