use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Columns of `series` that list endpoints may select or sort by.
pub const SERIES_COLUMNS: &[&str] = &["id", "title", "thumbnail_url", "owner", "created_at"];

/// Columns of `episodes` that list endpoints may select or sort by.
pub const EPISODE_COLUMNS: &[&str] = &[
    "id",
    "series_id",
    "name",
    "category",
    "subcategory",
    "thumbnail",
    "owner",
    "created_at",
];

/// Columns of `comments` that list endpoints may select or sort by.
pub const COMMENT_COLUMNS: &[&str] = &[
    "id",
    "episode_id",
    "series_id",
    "content",
    "created_at",
    "is_best",
    "like_count",
    "user_name",
    "user_thumbnail_url",
    "user_uid",
    "emoticon",
    "ai_category",
    "ai_emotion_score",
    "ai_reason",
    "is_spam",
    "is_ai_processed",
    "ai_processed_at",
    "crawled_at",
];

/// A comic series. The id is the platform's own series id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub thumbnail_url: String,
    pub owner: String,
    pub created_at: String,
}

/// Data for registering a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSeries {
    pub id: i64,
    pub title: String,
    pub thumbnail_url: String,
    pub owner: String,
}

/// One episode of a series, as crawled.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Episode {
    pub id: i64,
    pub series_id: i64,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub thumbnail: Option<String>,
    pub owner: String,
    pub created_at: String,
}

/// Validated episode ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEpisode {
    pub id: i64,
    pub series_id: i64,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub thumbnail: Option<String>,
    pub owner: String,
}

/// A reader comment on an episode.
///
/// The author fields describe a platform user, not a local account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub episode_id: i64,
    pub series_id: i64,
    pub content: String,
    pub created_at: String,
    pub is_best: bool,
    pub like_count: i64,
    pub user_name: String,
    pub user_thumbnail_url: Option<String>,
    pub user_uid: i64,
    #[serde(serialize_with = "serialize_json_text")]
    pub emoticon: Option<String>,
    pub ai_category: Option<String>,
    pub ai_emotion_score: Option<i64>,
    pub ai_reason: Option<String>,
    pub is_spam: Option<bool>,
    pub is_ai_processed: bool,
    pub ai_processed_at: Option<String>,
    pub crawled_at: String,
}

/// Validated comment ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub id: i64,
    pub episode_id: i64,
    pub series_id: i64,
    pub content: String,
    pub created_at: String,
    pub is_best: bool,
    pub like_count: i64,
    pub user_name: String,
    pub user_thumbnail_url: Option<String>,
    pub user_uid: i64,
    pub emoticon: Option<Value>,
}

/// Sentiment result for a single comment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentAnalysis {
    pub id: i64,
    pub comment_id: i64,
    pub episode_id: i64,
    pub content: String,
    pub score: i64,
    pub reason: String,
    pub created_at: String,
}

/// Sentiment to apply to one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionUpdate {
    pub comment_id: i64,
    pub score: i64,
    pub reason: String,
    pub is_spam: Option<bool>,
}

/// A comment excerpt fed into a summary.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SummarySource {
    pub id: i64,
    pub content: String,
    pub is_best: bool,
}

/// Summary of a batch of an episode's comments.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentsSummary {
    pub id: i64,
    pub episode_id: i64,
    #[serde(serialize_with = "serialize_json_text")]
    pub source_comments: Option<String>,
    pub summary: String,
    pub created_at: String,
}

/// Emit a column holding JSON text as structured JSON.
fn serialize_json_text<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match value.as_deref().map(serde_json::from_str::<Value>) {
        Some(Ok(json)) => json.serialize(serializer),
        Some(Err(_)) => value.serialize(serializer),
        None => serializer.serialize_none(),
    }
}
