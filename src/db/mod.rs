mod listing;
mod migrations;
mod models;
mod queries;

pub use listing::*;
pub use models::*;
pub use queries::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file and run pending migrations.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened, a migration fails or the write
    /// lock cannot be taken.
    pub async fn new(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Crawls and analysis write concurrently
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open crawl database {}", path.display()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.check_write_lock().await.with_context(|| {
            format!("Crawl database {} is read-only; set DATABASE_PATH", path.display())
        })?;

        Ok(db)
    }

    /// Take and release the write lock once.
    async fn check_write_lock(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        sqlx::query("ROLLBACK").execute(&mut *conn).await?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
