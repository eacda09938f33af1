use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::client::GraphQlClient;
use super::queries::COMMENT_QUERY;
use crate::crawler::schema::record_id;
use crate::crawler::{Continuation, CrawlError, Cursor, Page, PageRequest, PageSource};

/// Comment list of one episode, continued after the last comment uid.
#[derive(Debug, Clone)]
pub struct CommentSource {
    client: GraphQlClient,
    series_id: i64,
    episode_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentListData {
    comment_list: Option<CommentListPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentListPayload {
    #[serde(default)]
    is_end: bool,
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    comment_list: Option<Vec<Value>>,
}

impl CommentSource {
    #[must_use]
    pub const fn new(client: GraphQlClient, series_id: i64, episode_id: i64) -> Self {
        Self {
            client,
            series_id,
            episode_id,
        }
    }
}

#[async_trait]
impl PageSource for CommentSource {
    type Item = Value;

    fn noun(&self) -> &'static str {
        "comments"
    }

    fn continuation(&self) -> Continuation {
        Continuation::AfterLastItem
    }

    fn item_key(&self, item: &Value) -> Option<i64> {
        record_id(item)
    }

    async fn fetch_page(&self, request: PageRequest) -> Result<Page<Value>, CrawlError> {
        let last_comment_uid = match request.cursor {
            Cursor::AfterItem(uid) => Some(uid),
            Cursor::Start | Cursor::Offset(_) => None,
        };

        let data: CommentListData = self
            .client
            .execute(
                "commentList",
                COMMENT_QUERY,
                json!({
                    "commentListInput": {
                        "page": request.index,
                        "seriesId": self.series_id,
                        "productId": self.episode_id,
                        "lastCommentUid": last_comment_uid,
                    }
                }),
            )
            .await?;

        let payload = data
            .comment_list
            .ok_or(CrawlError::EmptyCollection("comments"))?;

        Ok(Page {
            items: payload
                .comment_list
                .unwrap_or_default()
                .iter()
                .map(comment_record)
                .collect(),
            total_count: payload.total_count,
            end_reached: payload.is_end,
        })
    }
}

/// Rename a remote comment item to the local record shape.
///
/// Values are copied as-is; type checking happens during reconciliation.
fn comment_record(item: &Value) -> Value {
    const FIELDS: &[(&str, &str)] = &[
        ("commentUid", "id"),
        ("comment", "content"),
        ("createDt", "created_at"),
        ("isBest", "is_best"),
        ("likeCount", "like_count"),
        ("userName", "user_name"),
        ("userThumbnailUrl", "user_thumbnail_url"),
        ("userUid", "user_uid"),
        ("emoticon", "emoticon"),
    ];

    let record: Map<String, Value> = FIELDS
        .iter()
        .map(|(remote, local)| {
            (
                (*local).to_string(),
                item.get(*remote).cloned().unwrap_or(Value::Null),
            )
        })
        .collect();
    Value::Object(record)
}
