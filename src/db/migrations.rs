use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM _schema_version")
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating series, episodes and comments");

    // Ids are the platform's own identifiers, never generated locally.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS series (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            thumbnail_url TEXT NOT NULL,
            owner TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create series table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS episodes (
            id INTEGER PRIMARY KEY,
            series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            thumbnail TEXT,
            owner TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create episodes table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_episodes_series ON episodes(series_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            episode_id INTEGER NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
            series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            is_best INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            user_name TEXT NOT NULL,
            user_thumbnail_url TEXT,
            user_uid INTEGER NOT NULL,
            emoticon TEXT,
            ai_category TEXT,
            ai_emotion_score INTEGER,
            ai_reason TEXT,
            is_spam INTEGER,
            is_ai_processed INTEGER NOT NULL DEFAULT 0,
            ai_processed_at TEXT,
            crawled_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create comments table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_episode ON comments(episode_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_series ON comments(series_id)")
        .execute(pool)
        .await?;

    // Unprocessed lookups filter on these two flags
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_comments_ai_pending ON comments(episode_id, is_ai_processed)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v2: adding analysis result tables");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS comment_analysis_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            comment_id INTEGER NOT NULL UNIQUE REFERENCES comments(id) ON DELETE CASCADE,
            episode_id INTEGER NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            score INTEGER NOT NULL,
            reason TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create comment_analysis_results table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_episode ON comment_analysis_results(episode_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS comment_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            episode_id INTEGER NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
            source_comments TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create comment_summaries table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_episode ON comment_summaries(episode_id)")
        .execute(pool)
        .await?;

    Ok(())
}
