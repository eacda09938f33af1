use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;
use std::collections::HashSet;

use super::listing::{ListPage, ListQuery};
use super::models::{
    Comment, CommentAnalysis, CommentsSummary, EmotionUpdate, Episode, NewComment, NewEpisode,
    NewSeries, Series, SummarySource,
};

/// Upper bound on bound parameters per `IN (...)` lookup.
const ID_LOOKUP_CHUNK: usize = 500;

// ========== Shared Helpers ==========

/// Fetch one page of `table`, optionally restricted to `parent_column = parent_id`.
///
/// Without `include_count`, one extra row is fetched to decide `has_next`.
async fn fetch_page<T>(
    pool: &SqlitePool,
    table: &str,
    parent: Option<(&str, i64)>,
    query: &ListQuery,
    default_order: &str,
) -> Result<ListPage<T>>
where
    T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
{
    let filter = parent
        .map(|(column, _)| format!("WHERE {column} = ?"))
        .unwrap_or_default();

    let sql = format!(
        "SELECT * FROM {table} {filter} ORDER BY {} LIMIT ? OFFSET ?",
        query.order_by(default_order)
    );
    let mut select = sqlx::query_as::<_, T>(&sql);
    if let Some((_, parent_id)) = parent {
        select = select.bind(parent_id);
    }
    let mut items = select
        .bind(i64::from(query.page_size) + 1)
        .bind(query.offset())
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {table}"))?;

    let has_next = items.len() > query.page_size as usize;
    items.truncate(query.page_size as usize);

    let count = if query.include_count {
        let sql = format!("SELECT COUNT(*) FROM {table} {filter}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some((_, parent_id)) = parent {
            count_query = count_query.bind(parent_id);
        }
        Some(
            count_query
                .fetch_one(pool)
                .await
                .with_context(|| format!("Failed to count {table}"))?,
        )
    } else {
        None
    };

    Ok(ListPage {
        items,
        has_next,
        count,
    })
}

/// Return the subset of `ids` already present in `table`.
async fn existing_ids(pool: &SqlitePool, table: &str, ids: &[i64]) -> Result<HashSet<i64>> {
    let mut found = HashSet::new();

    for chunk in ids.chunks(ID_LOOKUP_CHUNK) {
        let placeholders = std::iter::repeat_n("?", chunk.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT id FROM {table} WHERE id IN ({placeholders})");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for &id in chunk {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to look up existing {table} ids"))?;
        found.extend(rows);
    }

    Ok(found)
}

// ========== Series ==========

/// Get a series by id.
pub async fn get_series(pool: &SqlitePool, id: i64) -> Result<Option<Series>> {
    sqlx::query_as("SELECT * FROM series WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch series")
}

/// Insert a series unless one with the same id exists.
///
/// Returns `true` when a row was inserted.
pub async fn insert_series_if_absent(pool: &SqlitePool, series: &NewSeries) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO series (id, title, thumbnail_url, owner)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        ",
    )
    .bind(series.id)
    .bind(&series.title)
    .bind(&series.thumbnail_url)
    .bind(&series.owner)
    .execute(pool)
    .await
    .context("Failed to insert series")?;

    Ok(result.rows_affected() == 1)
}

/// List series.
pub async fn list_series(pool: &SqlitePool, query: &ListQuery) -> Result<ListPage<Series>> {
    fetch_page(pool, "series", None, query, "created_at DESC, id DESC").await
}

// ========== Episodes ==========

/// Get an episode by id.
pub async fn get_episode(pool: &SqlitePool, id: i64) -> Result<Option<Episode>> {
    sqlx::query_as("SELECT * FROM episodes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch episode")
}

/// Count persisted episodes of a series.
pub async fn count_episodes_by_series(pool: &SqlitePool, series_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM episodes WHERE series_id = ?")
        .bind(series_id)
        .fetch_one(pool)
        .await
        .context("Failed to count episodes")
}

/// Return which of `ids` are already stored as episodes.
pub async fn existing_episode_ids(pool: &SqlitePool, ids: &[i64]) -> Result<HashSet<i64>> {
    existing_ids(pool, "episodes", ids).await
}

/// Insert episodes in a single transaction, ignoring ids that already exist.
///
/// Returns the number of rows actually inserted.
pub async fn insert_episodes(pool: &SqlitePool, episodes: &[NewEpisode]) -> Result<u64> {
    if episodes.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut inserted = 0;

    for episode in episodes {
        let result = sqlx::query(
            r"
            INSERT INTO episodes (id, series_id, name, category, subcategory, thumbnail, owner)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(episode.id)
        .bind(episode.series_id)
        .bind(&episode.name)
        .bind(&episode.category)
        .bind(&episode.subcategory)
        .bind(&episode.thumbnail)
        .bind(&episode.owner)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert episode {}", episode.id))?;
        inserted += result.rows_affected();
    }

    tx.commit().await.context("Failed to commit episodes")?;
    Ok(inserted)
}

/// List episodes of a series.
pub async fn list_episodes_by_series(
    pool: &SqlitePool,
    series_id: i64,
    query: &ListQuery,
) -> Result<ListPage<Episode>> {
    fetch_page(pool, "episodes", Some(("series_id", series_id)), query, "id ASC").await
}

// ========== Comments ==========

/// Count persisted comments of an episode.
pub async fn count_comments_by_episode(pool: &SqlitePool, episode_id: i64) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE episode_id = ?")
        .bind(episode_id)
        .fetch_one(pool)
        .await
        .context("Failed to count comments")
}

/// Return which of `ids` are already stored as comments.
pub async fn existing_comment_ids(pool: &SqlitePool, ids: &[i64]) -> Result<HashSet<i64>> {
    existing_ids(pool, "comments", ids).await
}

/// Insert comments in a single transaction, ignoring ids that already exist.
///
/// Returns the number of rows actually inserted.
pub async fn insert_comments(pool: &SqlitePool, comments: &[NewComment]) -> Result<u64> {
    if comments.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut inserted = 0;

    for comment in comments {
        let emoticon = comment.emoticon.as_ref().map(ToString::to_string);
        let result = sqlx::query(
            r"
            INSERT INTO comments (
                id, episode_id, series_id, content, created_at, is_best, like_count,
                user_name, user_thumbnail_url, user_uid, emoticon
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(comment.id)
        .bind(comment.episode_id)
        .bind(comment.series_id)
        .bind(&comment.content)
        .bind(&comment.created_at)
        .bind(comment.is_best)
        .bind(comment.like_count)
        .bind(&comment.user_name)
        .bind(&comment.user_thumbnail_url)
        .bind(comment.user_uid)
        .bind(emoticon)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert comment {}", comment.id))?;
        inserted += result.rows_affected();
    }

    tx.commit().await.context("Failed to commit comments")?;
    Ok(inserted)
}

/// List comments of an episode.
pub async fn list_comments_by_episode(
    pool: &SqlitePool,
    episode_id: i64,
    query: &ListQuery,
) -> Result<ListPage<Comment>> {
    fetch_page(
        pool,
        "comments",
        Some(("episode_id", episode_id)),
        query,
        "created_at DESC, id DESC",
    )
    .await
}

/// Comments of an episode that have not been through emotion analysis and
/// have no spam verdict yet.
pub async fn get_unprocessed_comments(pool: &SqlitePool, episode_id: i64) -> Result<Vec<Comment>> {
    sqlx::query_as(
        r"
        SELECT * FROM comments
        WHERE episode_id = ? AND is_ai_processed = 0 AND is_spam IS NULL
        ORDER BY id ASC
        ",
    )
    .bind(episode_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch unprocessed comments")
}

/// Apply emotion results to an episode's comments and record one analysis row
/// per comment, all in one transaction.
///
/// Updates naming comments outside the episode are skipped. Returns the ids
/// that were updated.
pub async fn apply_emotion_results(
    pool: &SqlitePool,
    episode_id: i64,
    updates: &[EmotionUpdate],
) -> Result<Vec<i64>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut applied = Vec::with_capacity(updates.len());

    for update in updates {
        let result = sqlx::query(
            r"
            UPDATE comments
            SET ai_emotion_score = ?,
                ai_reason = ?,
                is_spam = ?,
                is_ai_processed = 1,
                ai_processed_at = datetime('now')
            WHERE id = ? AND episode_id = ?
            ",
        )
        .bind(update.score)
        .bind(&update.reason)
        .bind(update.is_spam)
        .bind(update.comment_id)
        .bind(episode_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update comment {}", update.comment_id))?;

        if result.rows_affected() == 0 {
            continue;
        }

        sqlx::query(
            r"
            INSERT INTO comment_analysis_results (comment_id, episode_id, content, score, reason)
            SELECT id, episode_id, content, ?, ? FROM comments WHERE id = ?
            ON CONFLICT(comment_id) DO UPDATE SET
                score = excluded.score,
                reason = excluded.reason,
                created_at = datetime('now')
            ",
        )
        .bind(update.score)
        .bind(&update.reason)
        .bind(update.comment_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to record analysis for comment {}", update.comment_id))?;

        applied.push(update.comment_id);
    }

    tx.commit().await.context("Failed to commit emotion results")?;
    Ok(applied)
}

/// An episode's comments, newest first, as summary input.
pub async fn get_summary_sources(pool: &SqlitePool, episode_id: i64) -> Result<Vec<SummarySource>> {
    sqlx::query_as(
        r"
        SELECT id, content, is_best FROM comments
        WHERE episode_id = ?
        ORDER BY created_at DESC, id DESC
        ",
    )
    .bind(episode_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch summary sources")
}

// ========== Analysis Results ==========

/// Emotion analysis results of an episode.
pub async fn list_analysis_results(
    pool: &SqlitePool,
    episode_id: i64,
) -> Result<Vec<CommentAnalysis>> {
    sqlx::query_as(
        "SELECT * FROM comment_analysis_results WHERE episode_id = ? ORDER BY comment_id ASC",
    )
    .bind(episode_id)
    .fetch_all(pool)
    .await
    .context("Failed to list analysis results")
}

/// Delete the analysis result of one comment. Returns `false` if none existed.
pub async fn delete_analysis_result(pool: &SqlitePool, comment_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comment_analysis_results WHERE comment_id = ?")
        .bind(comment_id)
        .execute(pool)
        .await
        .context("Failed to delete analysis result")?;

    Ok(result.rows_affected() > 0)
}

// ========== Summaries ==========

/// Store a summary and return it.
pub async fn insert_summary(
    pool: &SqlitePool,
    episode_id: i64,
    source_comments: &str,
    summary: &str,
) -> Result<CommentsSummary> {
    sqlx::query_as(
        r"
        INSERT INTO comment_summaries (episode_id, source_comments, summary)
        VALUES (?, ?, ?)
        RETURNING *
        ",
    )
    .bind(episode_id)
    .bind(source_comments)
    .bind(summary)
    .fetch_one(pool)
    .await
    .context("Failed to insert summary")
}

/// Summaries of an episode, newest first.
pub async fn list_summaries(pool: &SqlitePool, episode_id: i64) -> Result<Vec<CommentsSummary>> {
    sqlx::query_as(
        "SELECT * FROM comment_summaries WHERE episode_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(episode_id)
    .fetch_all(pool)
    .await
    .context("Failed to list summaries")
}

/// Delete every summary of an episode. Returns the number removed.
pub async fn delete_summaries(pool: &SqlitePool, episode_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM comment_summaries WHERE episode_id = ?")
        .bind(episode_id)
        .execute(pool)
        .await
        .context("Failed to delete summaries")?;

    Ok(result.rows_affected())
}
