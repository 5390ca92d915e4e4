//! Embedded `PostgreSQL` cluster helpers: the migrated template and the
//! per-test databases cloned from it.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::TestCluster;
use uuid::Uuid;

/// SQL creating the repository and mirror projections.
pub const CREATE_PROJECTIONS_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_mirror_projection_tables/up.sql");

/// SQL rolling back the projection migration.
pub const ROLLBACK_PROJECTIONS_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_mirror_projection_tables/down.sql");

/// SQL creating the task table and the mirror pointer column.
pub const CREATE_MIRROR_TASKS_SQL: &str =
    include_str!("../../migrations/2026-10-01-000001_create_mirror_tasks/up.sql");

/// Template database name for pre-migrated schema.
pub const TEMPLATE_DB: &str = "mirror_tasks_test_template";

/// Shared embedded cluster handle.
pub type PostgresCluster = &'static TestCluster;

/// Ensures the template database exists with every migration applied.
///
/// # Errors
///
/// Returns an error if the template cannot be created or migrated.
pub fn ensure_template(cluster: PostgresCluster) -> eyre::Result<()> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut conn = PgConnection::establish(&url).map_err(|err| eyre::eyre!("{err}"))?;
            conn.batch_execute(CREATE_PROJECTIONS_SQL)
                .map_err(|err| eyre::eyre!("{err}"))?;
            conn.batch_execute(CREATE_MIRROR_TASKS_SQL)
                .map_err(|err| eyre::eyre!("{err}"))?;
            Ok(())
        })
        .map_err(|err| eyre::eyre!("template setup failed: {err}"))
}

/// Database cloned from [`TEMPLATE_DB`] and dropped with the handle.
pub struct TemporaryDatabase {
    cluster: PostgresCluster,
    name: String,
    url: String,
}

impl TemporaryDatabase {
    /// Clones the template into a uniquely named database.
    ///
    /// # Errors
    ///
    /// Returns an error if the clone fails.
    pub fn from_template(cluster: PostgresCluster) -> eyre::Result<Self> {
        let name = format!("mirror_test_{}", Uuid::new_v4().simple());
        cluster
            .create_database_from_template(name.as_str(), TEMPLATE_DB)
            .map_err(|err| eyre::eyre!("failed to create {name}: {err}"))?;
        let url = cluster.connection().database_url(&name);
        Ok(Self { cluster, name, url })
    }

    /// Connection URL of the database.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens a direct connection, bypassing the repository pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn connect(&self) -> eyre::Result<PgConnection> {
        Ok(PgConnection::establish(&self.url)?)
    }
}

impl Drop for TemporaryDatabase {
    #[expect(
        clippy::print_stderr,
        reason = "a leaked test database is reported without failing the test"
    )]
    fn drop(&mut self) {
        if let Err(err) = self.cluster.drop_database(self.name.as_str()) {
            eprintln!("warning: failed to drop test database {}: {err}", self.name);
        }
    }
}
