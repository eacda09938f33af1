//! Walks a paginated remote source until the collection is complete.
//!
//! Two continuation styles are supported:
//!
//! * [`Continuation::AfterLastItem`]: the next request continues after the
//!   identifier of the last item received (comment lists).
//! * [`Continuation::Offset`]: the next request advances an offset cursor by
//!   one page (episode lists). The remote `has_next_page` flag decides.
//!
//! In both styles the total count reported on the first page caps the number
//! of requests at `ceil(total / page_size)`, so a remote whose end flag never
//! flips still terminates.

use std::num::NonZeroU32;

use async_trait::async_trait;
use tracing::debug;

use super::CrawlError;

/// How a source derives the request for the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    AfterLastItem,
    Offset,
}

/// Position handed to the source for a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// First page, no continuation state yet.
    Start,
    /// Continue after the item with this identifier.
    AfterItem(i64),
    /// Continue at this logical offset.
    Offset(u64),
}

impl Cursor {
    fn advance(self, page_size: u64) -> Self {
        match self {
            Self::Start => Self::Offset(page_size),
            Self::Offset(offset) => Self::Offset(offset + page_size),
            Self::AfterItem(_) => self,
        }
    }
}

/// One request made by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub index: u32,
    pub cursor: Cursor,
}

/// One page returned by a source.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total size of the collection. Only read from the first page.
    pub total_count: u64,
    /// The remote says there is nothing after this page.
    pub end_reached: bool,
}

/// A remote collection that can be fetched one page at a time.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// What the collection holds, for error messages ("comments").
    fn noun(&self) -> &'static str;

    fn continuation(&self) -> Continuation;

    /// Identifier used as the after-last-item cursor.
    fn item_key(&self, item: &Self::Item) -> Option<i64>;

    /// Fetch a single page.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote call fails; the collector does not retry.
    async fn fetch_page(&self, request: PageRequest) -> Result<Page<Self::Item>, CrawlError>;
}

/// Everything collected by a completed sweep.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub pages_fetched: u32,
}

/// Outcome of a gated sweep.
#[derive(Debug, Clone)]
pub enum Collected<T> {
    Complete(Collection<T>),
    /// The gate declined the sweep after reading the first page's total.
    Skipped { total_count: u64 },
}

/// Drives a [`PageSource`] to completion.
#[derive(Debug, Clone, Copy)]
pub struct PaginatedCollector {
    page_size: NonZeroU32,
}

impl PaginatedCollector {
    #[must_use]
    pub const fn new(page_size: NonZeroU32) -> Self {
        Self { page_size }
    }

    /// Number of pages needed for `total_count` items.
    #[must_use]
    pub fn page_budget(&self, total_count: u64) -> u64 {
        total_count.div_ceil(u64::from(self.page_size.get()))
    }

    /// Fetch every page of `source` and return the items in source order.
    ///
    /// # Errors
    ///
    /// Propagates the first fetch error unchanged. An after-last-item source
    /// whose first page is empty fails with [`CrawlError::EmptyCollection`].
    pub async fn collect_all<S: PageSource>(
        &self,
        source: &S,
    ) -> Result<Collection<S::Item>, CrawlError> {
        match self.collect_gated(source, |_| false).await? {
            Collected::Complete(collection) => Ok(collection),
            Collected::Skipped { total_count } => Ok(Collection {
                items: Vec::new(),
                total_count,
                pages_fetched: 1,
            }),
        }
    }

    /// Like [`collect_all`](Self::collect_all), but asks `skip` with the total
    /// count from the first page whether the rest of the sweep is needed.
    ///
    /// # Errors
    ///
    /// Same as [`collect_all`](Self::collect_all).
    pub async fn collect_gated<S, F>(
        &self,
        source: &S,
        skip: F,
    ) -> Result<Collected<S::Item>, CrawlError>
    where
        S: PageSource,
        F: FnOnce(u64) -> bool + Send,
    {
        let continuation = source.continuation();
        let page_size = u64::from(self.page_size.get());

        let mut page = source
            .fetch_page(PageRequest {
                index: 0,
                cursor: Cursor::Start,
            })
            .await?;

        let total_count = page.total_count;
        let budget = self.page_budget(total_count);

        if page.items.is_empty() && continuation == Continuation::AfterLastItem {
            return Err(CrawlError::EmptyCollection(source.noun()));
        }
        if skip(total_count) {
            debug!(total_count, noun = source.noun(), "Sweep skipped after first page");
            return Ok(Collected::Skipped { total_count });
        }

        let mut cursor = Cursor::Start;
        let mut index: u32 = 0;
        let mut items = Vec::new();

        loop {
            index += 1;

            cursor = match continuation {
                Continuation::Offset => cursor.advance(page_size),
                Continuation::AfterLastItem => {
                    let Some(last) = page.items.last() else {
                        debug!(page = index, "Empty page, no cursor to continue from");
                        break;
                    };
                    let key = source.item_key(last).ok_or_else(|| {
                        CrawlError::Upstream(format!(
                            "{} item on page {index} has no identifier",
                            source.noun()
                        ))
                    })?;
                    Cursor::AfterItem(key)
                }
            };

            let received = page.items.len();
            items.extend(page.items);
            debug!(
                page = index,
                budget,
                received,
                collected = items.len(),
                noun = source.noun(),
                "Fetched page"
            );

            if page.end_reached || u64::from(index) >= budget {
                break;
            }

            page = source.fetch_page(PageRequest { index, cursor }).await?;
        }

        Ok(Collected::Complete(Collection {
            items,
            total_count,
            pages_fetched: index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted source: hands out pre-built pages and records every request.
    struct ScriptedSource {
        continuation: Continuation,
        pages: Mutex<VecDeque<Result<Page<i64>, CrawlError>>>,
        requests: Mutex<Vec<PageRequest>>,
        repeat_forever: Option<Page<i64>>,
    }

    impl ScriptedSource {
        fn new(continuation: Continuation, pages: Vec<Page<i64>>) -> Self {
            Self {
                continuation,
                pages: Mutex::new(pages.into_iter().map(Ok).collect()),
                requests: Mutex::new(Vec::new()),
                repeat_forever: None,
            }
        }

        fn endless(continuation: Continuation, page: Page<i64>) -> Self {
            Self {
                repeat_forever: Some(page),
                ..Self::new(continuation, Vec::new())
            }
        }

        fn failing(continuation: Continuation, first: Page<i64>) -> Self {
            let source = Self::new(continuation, vec![first]);
            source
                .pages
                .lock()
                .unwrap()
                .push_back(Err(CrawlError::Upstream("connection reset".to_string())));
            source
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Item = i64;

        fn noun(&self) -> &'static str {
            "comments"
        }

        fn continuation(&self) -> Continuation {
            self.continuation
        }

        fn item_key(&self, item: &i64) -> Option<i64> {
            Some(*item)
        }

        async fn fetch_page(&self, request: PageRequest) -> Result<Page<i64>, CrawlError> {
            self.requests.lock().unwrap().push(request);
            if let Some(page) = &self.repeat_forever {
                return Ok(page.clone());
            }
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request {request:?}"))
        }
    }

    fn page(range: std::ops::Range<i64>, total_count: u64, end_reached: bool) -> Page<i64> {
        Page {
            items: range.collect(),
            total_count,
            end_reached,
        }
    }

    fn collector(page_size: u32) -> PaginatedCollector {
        PaginatedCollector::new(NonZeroU32::new(page_size).unwrap())
    }

    #[test]
    fn test_page_budget() {
        let c = collector(25);
        assert_eq!(c.page_budget(0), 0);
        assert_eq!(c.page_budget(1), 1);
        assert_eq!(c.page_budget(25), 1);
        assert_eq!(c.page_budget(26), 2);
        assert_eq!(c.page_budget(47), 2);
        assert_eq!(c.page_budget(50), 2);
        assert_eq!(c.page_budget(51), 3);
    }

    #[tokio::test]
    async fn test_two_pages_after_last_item() {
        let source = ScriptedSource::new(
            Continuation::AfterLastItem,
            vec![page(1..26, 47, false), page(26..48, 47, true)],
        );

        let collection = collector(25).collect_all(&source).await.unwrap();

        assert_eq!(collection.items.len(), 47);
        assert_eq!(collection.items, (1..48).collect::<Vec<_>>());
        assert_eq!(collection.pages_fetched, 2);
        assert_eq!(
            source.requests(),
            vec![
                PageRequest {
                    index: 0,
                    cursor: Cursor::Start
                },
                PageRequest {
                    index: 1,
                    cursor: Cursor::AfterItem(25)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_first_page_is_an_error_for_after_last_item() {
        let source = ScriptedSource::new(Continuation::AfterLastItem, vec![page(0..0, 0, true)]);

        let err = collector(25).collect_all(&source).await.unwrap_err();

        assert!(matches!(err, CrawlError::EmptyCollection("comments")));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_total_offset_source_returns_empty() {
        let source = ScriptedSource::new(Continuation::Offset, vec![page(0..0, 0, false)]);

        let collection = collector(25).collect_all(&source).await.unwrap();

        assert!(collection.items.is_empty());
        assert_eq!(collection.total_count, 0);
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_offset_cursor_advances_by_page_size() {
        let source = ScriptedSource::new(
            Continuation::Offset,
            vec![
                page(0..10, 25, false),
                page(10..20, 25, false),
                page(20..25, 25, true),
            ],
        );

        let collection = collector(10).collect_all(&source).await.unwrap();

        assert_eq!(collection.items.len(), 25);
        let cursors: Vec<Cursor> = source.requests().iter().map(|r| r.cursor).collect();
        assert_eq!(
            cursors,
            vec![Cursor::Start, Cursor::Offset(10), Cursor::Offset(20)]
        );
    }

    #[tokio::test]
    async fn test_endless_has_next_stops_at_budget() {
        // Remote keeps claiming there is another page.
        let source = ScriptedSource::endless(Continuation::Offset, page(0..25, 60, false));

        let collection = collector(25).collect_all(&source).await.unwrap();

        assert_eq!(source.requests().len(), 3);
        assert_eq!(collection.pages_fetched, 3);
        assert_eq!(collection.items.len(), 75);
    }

    #[tokio::test]
    async fn test_fetch_count_never_exceeds_budget() {
        for total in [1_u64, 7, 24, 25, 26, 99, 100, 101] {
            for page_size in [1_u32, 3, 25, 50] {
                let source = ScriptedSource::endless(Continuation::Offset, page(0..1, total, false));
                let c = collector(page_size);

                c.collect_all(&source).await.unwrap();

                let fetched = source.requests().len() as u64;
                assert_eq!(fetched, c.page_budget(total), "total={total} size={page_size}");
            }
        }
    }

    #[tokio::test]
    async fn test_end_flag_wins_before_budget() {
        let source = ScriptedSource::new(
            Continuation::AfterLastItem,
            vec![page(1..26, 100, false), page(26..30, 100, true)],
        );

        let collection = collector(25).collect_all(&source).await.unwrap();

        assert_eq!(collection.pages_fetched, 2);
        assert_eq!(collection.items.len(), 29);
    }

    #[tokio::test]
    async fn test_empty_later_page_ends_sweep() {
        let source = ScriptedSource::new(
            Continuation::AfterLastItem,
            vec![page(1..26, 60, false), page(0..0, 60, false)],
        );

        let collection = collector(25).collect_all(&source).await.unwrap();

        assert_eq!(collection.items.len(), 25);
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let source = ScriptedSource::failing(Continuation::AfterLastItem, page(1..26, 60, false));

        let err = collector(25).collect_all(&source).await.unwrap_err();

        assert!(matches!(err, CrawlError::Upstream(ref msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_gate_skips_after_first_page() {
        let source = ScriptedSource::new(
            Continuation::AfterLastItem,
            vec![page(1..26, 47, false), page(26..48, 47, true)],
        );

        let outcome = collector(25)
            .collect_gated(&source, |total| total <= 47)
            .await
            .unwrap();

        assert!(matches!(outcome, Collected::Skipped { total_count: 47 }));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_gate_sees_first_page_total() {
        let source = ScriptedSource::new(Continuation::Offset, vec![page(0..5, 5, true)]);
        let mut seen = None;

        let outcome = collector(25)
            .collect_gated(&source, |total| {
                seen = Some(total);
                false
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(5));
        assert!(matches!(outcome, Collected::Complete(ref c) if c.items.len() == 5));
    }
}
