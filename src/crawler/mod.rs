//! Crawling core: page-by-page collection of remote collections and
//! reconciliation of the collected records against what is already stored.

pub mod collector;
pub mod reconciler;
pub mod schema;
mod service;

pub use collector::{
    Collected, Collection, Continuation, Cursor, Page, PageRequest, PageSource, PaginatedCollector,
};
pub use reconciler::{reconcile, should_skip, FieldError, Reconciliation, RejectedRecord};
pub use schema::{CommentSchema, EpisodeSchema, RecordSchema, SchemaError};
pub use service::{crawl_comments, crawl_episodes, create_series, CrawlReport, SeriesCreation};

use thiserror::Error;

/// Failures that abort a whole crawl.
///
/// Per-record validation problems are not errors; they end up in
/// [`Reconciliation::rejected`].
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The remote reported zero items where at least one is required.
    #[error("remote source has no {0}")]
    EmptyCollection(&'static str),
    /// The remote platform does not know the requested series.
    #[error("series {0} does not exist on the remote platform")]
    SeriesNotFound(i64),
    /// Transport or payload failure talking to the remote source.
    #[error("upstream fetch failed: {0}")]
    Upstream(String),
    /// The local parent entity of the crawl does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl CrawlError {
    pub(crate) fn upstream(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Upstream(format!("{context}: {err}"))
    }
}
