/// Embedded schema migrations
///
/// SQL files live in the workspace `migrations/` directory and are compiled
/// into the binary, so the API and worker can migrate on startup without
/// shipping the files.

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    postgres::PgPool,
    Postgres,
};
use tracing::{info, warn};

pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: usize,
    pub known: usize,
    pub latest_version: Option<i64>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.applied >= self.known
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    info!(known = MIGRATOR.iter().count(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let known = MIGRATOR.iter().count();

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(MigrationStatus {
            applied: 0,
            known,
            latest_version: None,
        });
    }

    let (applied, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus {
        applied: applied.max(0) as usize,
        known,
        latest_version,
    })
}

/// Creates the database named in `url` if it is missing
pub async fn ensure_database_exists(url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(url).await?;
    }
    Ok(())
}
