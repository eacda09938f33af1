//! Crawl orchestration: parent lookup, gated collection, reconciliation and
//! bulk insertion.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::collector::{Collected, PaginatedCollector};
use super::reconciler::{reconcile, should_skip, RejectedRecord};
use super::schema::{record_id, CommentSchema, EpisodeSchema};
use super::CrawlError;
use crate::db::{self, Database, NewSeries, Series};
use crate::remote::{CommentSource, EpisodeSource, GraphQlClient};

/// Outcome of one crawl request.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    /// Collection size reported by the remote.
    pub remote_total: u64,
    /// The local store already held at least `remote_total` rows.
    pub skipped: bool,
    /// Rows written; lower than `created.len()` only when a concurrent crawl
    /// stored the same ids first.
    pub inserted: u64,
    pub created: Vec<Value>,
    pub rejected: Vec<RejectedRecord>,
}

impl CrawlReport {
    fn skipped(remote_total: u64) -> Self {
        Self {
            remote_total,
            skipped: true,
            inserted: 0,
            created: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

/// Result of [`create_series`].
#[derive(Debug, Clone, Serialize)]
pub struct SeriesCreation {
    pub series: Series,
    /// `false` when the id was already registered.
    pub created: bool,
}

/// Register a series, or return the stored one if the id is taken.
///
/// # Errors
///
/// Returns [`CrawlError::Storage`] on database failure.
pub async fn create_series(db: &Database, new: &NewSeries) -> Result<SeriesCreation, CrawlError> {
    let created = db::insert_series_if_absent(db.pool(), new).await?;
    let series = db::get_series(db.pool(), new.id)
        .await?
        .ok_or(CrawlError::NotFound {
            entity: "series",
            id: new.id,
        })?;

    if created {
        info!(series_id = series.id, title = %series.title, "Series registered");
    } else {
        debug!(series_id = series.id, "Series already registered");
    }

    Ok(SeriesCreation { series, created })
}

/// Crawl every episode of a stored series and persist the new ones.
///
/// # Errors
///
/// [`CrawlError::NotFound`] when the series is not stored locally,
/// [`CrawlError::SeriesNotFound`] when the platform does not know it, and
/// upstream or storage failures.
pub async fn crawl_episodes(
    db: &Database,
    client: &GraphQlClient,
    collector: &PaginatedCollector,
    series_id: i64,
) -> Result<CrawlReport, CrawlError> {
    let series = db::get_series(db.pool(), series_id)
        .await?
        .ok_or(CrawlError::NotFound {
            entity: "series",
            id: series_id,
        })?;

    let local = local_count(db::count_episodes_by_series(db.pool(), series_id).await?);
    let source = EpisodeSource::new(client.clone(), series_id);

    let collection = match collector
        .collect_gated(&source, |total| should_skip(total, local))
        .await?
    {
        Collected::Skipped { total_count } => {
            info!(series_id, total_count, local, "Episodes up to date, crawl skipped");
            return Ok(CrawlReport::skipped(total_count));
        }
        Collected::Complete(collection) => collection,
    };

    let ids: Vec<i64> = collection.items.iter().filter_map(record_id).collect();
    let existing = db::existing_episode_ids(db.pool(), &ids).await?;
    let schema = EpisodeSchema::new(series_id, series.owner, existing);
    let reconciliation = reconcile(collection.items, &schema)?;

    let inserted = db::insert_episodes(db.pool(), &reconciliation.accepted).await?;

    info!(
        series_id,
        remote_total = collection.total_count,
        pages = collection.pages_fetched,
        accepted = reconciliation.accepted.len(),
        rejected = reconciliation.rejected.len(),
        inserted,
        "Episode crawl complete"
    );

    Ok(CrawlReport {
        remote_total: collection.total_count,
        skipped: false,
        inserted,
        created: reconciliation.view(),
        rejected: reconciliation.rejected,
    })
}

/// Crawl every comment of a stored episode and persist the new ones.
///
/// # Errors
///
/// [`CrawlError::NotFound`] when the episode is not stored locally,
/// [`CrawlError::EmptyCollection`] when the platform reports no comments,
/// and upstream or storage failures.
pub async fn crawl_comments(
    db: &Database,
    client: &GraphQlClient,
    collector: &PaginatedCollector,
    episode_id: i64,
) -> Result<CrawlReport, CrawlError> {
    let episode = db::get_episode(db.pool(), episode_id)
        .await?
        .ok_or(CrawlError::NotFound {
            entity: "episode",
            id: episode_id,
        })?;

    let local = local_count(db::count_comments_by_episode(db.pool(), episode_id).await?);
    let source = CommentSource::new(client.clone(), episode.series_id, episode_id);

    let collection = match collector
        .collect_gated(&source, |total| should_skip(total, local))
        .await?
    {
        Collected::Skipped { total_count } => {
            info!(episode_id, total_count, local, "Comments up to date, crawl skipped");
            return Ok(CrawlReport::skipped(total_count));
        }
        Collected::Complete(collection) => collection,
    };

    let ids: Vec<i64> = collection.items.iter().filter_map(record_id).collect();
    let existing = db::existing_comment_ids(db.pool(), &ids).await?;
    let schema = CommentSchema::new(episode_id, episode.series_id, existing);
    let reconciliation = reconcile(collection.items, &schema)?;

    let inserted = db::insert_comments(db.pool(), &reconciliation.accepted).await?;

    info!(
        episode_id,
        remote_total = collection.total_count,
        pages = collection.pages_fetched,
        accepted = reconciliation.accepted.len(),
        rejected = reconciliation.rejected.len(),
        inserted,
        "Comment crawl complete"
    );

    Ok(CrawlReport {
        remote_total: collection.total_count,
        skipped: false,
        inserted,
        created: reconciliation.view(),
        rejected: reconciliation.rejected,
    })
}

fn local_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
