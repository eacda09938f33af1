//! Validation rules for crawled episode and comment records.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::reconciler::FieldError;
use crate::db::{NewComment, NewEpisode};

/// Offset applied to remote timestamps that carry no zone (KST).
const PLATFORM_UTC_OFFSET_SECS: i32 = 9 * 3600;

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A schema that cannot validate anything because it was built wrongly.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{schema} schema needs a positive {field}, got {value}")]
    InvalidParent {
        schema: &'static str,
        field: &'static str,
        value: i64,
    },
    #[error("{schema} schema needs a non-empty owner")]
    MissingOwner { schema: &'static str },
}

/// Target entity of a reconciliation pass.
pub trait RecordSchema {
    type Entity: Serialize;

    /// Name used in rejection messages ("comment").
    fn entity_name(&self) -> &'static str;

    /// Ids already persisted for this entity.
    fn existing_ids(&self) -> &HashSet<i64>;

    /// Verify the schema itself is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema was constructed with invalid context.
    fn check(&self) -> Result<(), SchemaError>;

    /// Validate one record's fields (uniqueness is handled by the reconciler).
    ///
    /// # Errors
    ///
    /// Returns every failed field rule.
    fn validate(&self, record: &Value) -> Result<Self::Entity, Vec<FieldError>>;
}

/// The record's `id`, when it is a positive integer.
#[must_use]
pub fn record_id(record: &Value) -> Option<i64> {
    record.get("id").and_then(Value::as_i64).filter(|id| *id > 0)
}

/// Episodes crawled for one series.
#[derive(Debug, Clone)]
pub struct EpisodeSchema {
    series_id: i64,
    owner: String,
    existing: HashSet<i64>,
}

impl EpisodeSchema {
    #[must_use]
    pub fn new(series_id: i64, owner: impl Into<String>, existing: HashSet<i64>) -> Self {
        Self {
            series_id,
            owner: owner.into(),
            existing,
        }
    }
}

impl RecordSchema for EpisodeSchema {
    type Entity = NewEpisode;

    fn entity_name(&self) -> &'static str {
        "episode"
    }

    fn existing_ids(&self) -> &HashSet<i64> {
        &self.existing
    }

    fn check(&self) -> Result<(), SchemaError> {
        if self.series_id <= 0 {
            return Err(SchemaError::InvalidParent {
                schema: "episode",
                field: "series_id",
                value: self.series_id,
            });
        }
        if self.owner.trim().is_empty() {
            return Err(SchemaError::MissingOwner { schema: "episode" });
        }
        Ok(())
    }

    fn validate(&self, record: &Value) -> Result<NewEpisode, Vec<FieldError>> {
        let mut fields = FieldReader::new(record)?;
        let episode = NewEpisode {
            id: fields.id(),
            series_id: self.series_id,
            name: fields.non_empty_string("name"),
            category: fields.non_empty_string("category"),
            subcategory: fields.non_empty_string("subcategory"),
            thumbnail: fields.optional_string("thumbnail"),
            owner: self.owner.clone(),
        };
        fields.finish(episode)
    }
}

/// Comments crawled for one episode.
#[derive(Debug, Clone)]
pub struct CommentSchema {
    episode_id: i64,
    series_id: i64,
    existing: HashSet<i64>,
}

impl CommentSchema {
    #[must_use]
    pub fn new(episode_id: i64, series_id: i64, existing: HashSet<i64>) -> Self {
        Self {
            episode_id,
            series_id,
            existing,
        }
    }
}

impl RecordSchema for CommentSchema {
    type Entity = NewComment;

    fn entity_name(&self) -> &'static str {
        "comment"
    }

    fn existing_ids(&self) -> &HashSet<i64> {
        &self.existing
    }

    fn check(&self) -> Result<(), SchemaError> {
        for (field, value) in [("episode_id", self.episode_id), ("series_id", self.series_id)] {
            if value <= 0 {
                return Err(SchemaError::InvalidParent {
                    schema: "comment",
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    fn validate(&self, record: &Value) -> Result<NewComment, Vec<FieldError>> {
        let mut fields = FieldReader::new(record)?;
        let comment = NewComment {
            id: fields.id(),
            episode_id: self.episode_id,
            series_id: self.series_id,
            content: fields.string("content"),
            created_at: fields.timestamp("created_at"),
            is_best: fields.boolean("is_best"),
            like_count: fields.count_or_zero("like_count"),
            user_name: fields.string("user_name"),
            user_thumbnail_url: fields.optional_string("user_thumbnail_url"),
            user_uid: fields.integer("user_uid"),
            emoticon: fields.optional_object("emoticon"),
        };
        fields.finish(comment)
    }
}

/// Reads typed fields off a JSON object, collecting every failure.
struct FieldReader<'a> {
    record: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(record: &'a Value) -> Result<Self, Vec<FieldError>> {
        record.as_object().map_or_else(
            || Err(vec![FieldError::new("record", "must be a JSON object")]),
            |record| {
                Ok(Self {
                    record,
                    errors: Vec::new(),
                })
            },
        )
    }

    fn present(&mut self, field: &str) -> Option<&'a Value> {
        let record = self.record;
        match record.get(field) {
            Some(Value::Null) | None => {
                self.errors.push(FieldError::new(field, "this field is required"));
                None
            }
            Some(value) => Some(value),
        }
    }

    fn id(&mut self) -> i64 {
        match self.present("id").map(Value::as_i64) {
            Some(Some(id)) if id > 0 => id,
            Some(_) => {
                self.errors
                    .push(FieldError::new("id", "must be a positive integer"));
                0
            }
            None => 0,
        }
    }

    fn string(&mut self, field: &str) -> String {
        match self.present(field) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.errors.push(FieldError::new(field, "must be a string"));
                String::new()
            }
            None => String::new(),
        }
    }

    fn non_empty_string(&mut self, field: &str) -> String {
        let value = self.string(field);
        if value.trim().is_empty() && !self.errors.iter().any(|e| e.field == field) {
            self.errors.push(FieldError::new(field, "must not be blank"));
        }
        value
    }

    fn optional_string(&mut self, field: &str) -> Option<String> {
        let record = self.record;
        match record.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.errors.push(FieldError::new(field, "must be a string"));
                None
            }
        }
    }

    fn boolean(&mut self, field: &str) -> bool {
        match self.present(field) {
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.errors.push(FieldError::new(field, "must be a boolean"));
                false
            }
            None => false,
        }
    }

    fn integer(&mut self, field: &str) -> i64 {
        match self.present(field).map(Value::as_i64) {
            Some(Some(n)) => n,
            Some(None) => {
                self.errors.push(FieldError::new(field, "must be an integer"));
                0
            }
            None => 0,
        }
    }

    fn count_or_zero(&mut self, field: &str) -> i64 {
        let record = self.record;
        match record.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => match value.as_i64() {
                Some(n) if n >= 0 => n,
                _ => {
                    self.errors
                        .push(FieldError::new(field, "must be a non-negative integer"));
                    0
                }
            },
        }
    }

    fn optional_object(&mut self, field: &str) -> Option<Value> {
        let record = self.record;
        match record.get(field) {
            None | Some(Value::Null) => None,
            Some(value @ Value::Object(_)) => Some(value.clone()),
            Some(_) => {
                self.errors.push(FieldError::new(field, "must be an object"));
                None
            }
        }
    }

    fn timestamp(&mut self, field: &str) -> String {
        let raw = self.string(field);
        if raw.is_empty() {
            if !self.errors.iter().any(|e| e.field == field) {
                self.errors.push(FieldError::new(field, "must not be blank"));
            }
            return raw;
        }
        parse_timestamp(&raw).map_or_else(
            || {
                self.errors
                    .push(FieldError::new(field, format!("unrecognized timestamp '{raw}'")));
                String::new()
            },
            |ts| ts.to_rfc3339(),
        )
    }

    fn finish<E>(self, entity: E) -> Result<E, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(entity)
        } else {
            Err(self.errors)
        }
    }
}

/// Parse an RFC 3339 timestamp, or a zone-less one in platform local time.
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    let offset = FixedOffset::east_opt(PLATFORM_UTC_OFFSET_SECS)?;
    NAIVE_TIMESTAMP_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .and_then(|naive| naive.and_local_timezone(offset).single())
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn episode_record() -> Value {
        json!({
            "id": 5001,
            "name": "Episode 1",
            "category": "webtoon",
            "subcategory": "fantasy",
            "thumbnail": "https://img.example.com/1.jpg",
        })
    }

    #[test]
    fn test_episode_valid() {
        let schema = EpisodeSchema::new(77, "alice", HashSet::new());

        let episode = schema.validate(&episode_record()).unwrap();

        assert_eq!(episode.id, 5001);
        assert_eq!(episode.series_id, 77);
        assert_eq!(episode.owner, "alice");
        assert_eq!(episode.thumbnail.as_deref(), Some("https://img.example.com/1.jpg"));
    }

    #[test]
    fn test_episode_collects_every_failure() {
        let schema = EpisodeSchema::new(77, "alice", HashSet::new());
        let record = json!({"id": "5001", "name": "", "category": null, "subcategory": 3});

        let errors = schema.validate(&record).unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["id", "name", "category", "subcategory"]);
    }

    #[test]
    fn test_non_object_record() {
        let schema = EpisodeSchema::new(77, "alice", HashSet::new());
        let errors = schema.validate(&json!([1, 2])).unwrap_err();
        assert_eq!(errors[0].field, "record");
    }

    #[test]
    fn test_episode_schema_requires_owner() {
        let schema = EpisodeSchema::new(77, "  ", HashSet::new());
        assert!(matches!(schema.check(), Err(SchemaError::MissingOwner { .. })));
    }

    #[test]
    fn test_comment_like_count_defaults_to_zero() {
        let schema = CommentSchema::new(1, 2, HashSet::new());
        let record = json!({
            "id": 9,
            "content": "nice",
            "created_at": "2024-12-10T13:08:11Z",
            "is_best": true,
            "user_name": "reader",
            "user_uid": 4,
        });

        let comment = schema.validate(&record).unwrap();

        assert_eq!(comment.like_count, 0);
        assert!(comment.is_best);
        assert_eq!(comment.emoticon, None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let naive = parse_timestamp("2024-12-10 22:08:11").unwrap();
        assert_eq!(naive.to_rfc3339(), "2024-12-10T22:08:11+09:00");

        let zoned = parse_timestamp("2024-12-10T13:08:11+00:00").unwrap();
        assert_eq!(zoned, naive);

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let schema = CommentSchema::new(1, 2, HashSet::new());
        let record = json!({
            "id": 9,
            "content": "nice",
            "created_at": "last tuesday",
            "is_best": false,
            "user_name": "reader",
            "user_uid": 4,
        });

        let errors = schema.validate(&record).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "created_at");
    }
}
