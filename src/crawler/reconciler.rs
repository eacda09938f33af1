//! Splits freshly crawled records into insertable entities and rejections.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use super::schema::{record_id, RecordSchema, SchemaError};

/// Whether a crawl can be skipped because the local store already holds at
/// least as many rows as the remote reports.
///
/// This compares counts only; a remote that removed and re-added items can
/// match the local count while holding different identifiers.
#[must_use]
pub fn should_skip(remote_total: u64, local_count: u64) -> bool {
    local_count >= remote_total
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A candidate that did not pass validation, with its original payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub id: Option<i64>,
    pub payload: Value,
    pub errors: Vec<FieldError>,
}

/// Result of [`reconcile`]. Both lists keep input order.
#[derive(Debug, Clone)]
pub struct Reconciliation<E> {
    pub accepted: Vec<E>,
    pub rejected: Vec<RejectedRecord>,
}

impl<E: Serialize> Reconciliation<E> {
    /// Serialized view of the accepted entities, as returned to API clients.
    #[must_use]
    pub fn view(&self) -> Vec<Value> {
        self.accepted
            .iter()
            .filter_map(|entity| serde_json::to_value(entity).ok())
            .collect()
    }
}

/// Validate every record against `schema`.
///
/// A record is accepted only if every field rule passes and its id is neither
/// already persisted nor taken by an earlier accepted record in the same batch.
///
/// # Errors
///
/// Only a malformed schema is an error; bad records become rejections.
pub fn reconcile<S: RecordSchema>(
    records: Vec<Value>,
    schema: &S,
) -> Result<Reconciliation<S::Entity>, SchemaError> {
    schema.check()?;

    let mut accepted = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    let mut seen = HashSet::with_capacity(records.len());

    for record in records {
        let id = record_id(&record);
        let mut errors = Vec::new();

        if let Some(id) = id {
            if schema.existing_ids().contains(&id) {
                errors.push(FieldError::new(
                    "id",
                    format!("{} with id {id} already exists", schema.entity_name()),
                ));
            }
        }

        match schema.validate(&record) {
            Ok(entity) if errors.is_empty() => match id {
                // Only accepted records claim their id
                Some(id) if !seen.insert(id) => rejected.push(RejectedRecord {
                    id: Some(id),
                    payload: record,
                    errors: vec![FieldError::new(
                        "id",
                        format!("id {id} appears more than once in this batch"),
                    )],
                }),
                _ => accepted.push(entity),
            },
            Ok(_) => rejected.push(RejectedRecord {
                id,
                payload: record,
                errors,
            }),
            Err(mut field_errors) => {
                errors.append(&mut field_errors);
                rejected.push(RejectedRecord {
                    id,
                    payload: record,
                    errors,
                });
            }
        }
    }

    Ok(Reconciliation { accepted, rejected })
}
