//! Page, projection and ordering options for list queries.
//!
//! Field and ordering names are checked against a fixed per-table allow-list
//! before they reach SQL, so only known column names are ever interpolated.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListQueryError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unknown ordering field '{0}'")]
    UnknownOrdering(String),
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

/// Validated list options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    /// Run a `COUNT(*)` alongside the page.
    pub include_count: bool,
    /// Columns to keep in each result; `None` keeps all.
    pub fields: Option<Vec<&'static str>>,
    pub ordering: Vec<SortKey>,
}

impl ListQuery {
    /// A first page with default ordering and every field.
    #[must_use]
    pub fn first_page(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            include_count: false,
            fields: None,
            ordering: Vec::new(),
        }
    }

    /// Build from raw comma-separated `fields` and `ordering` parameters.
    ///
    /// Ordering entries may be prefixed with `-` for descending order.
    ///
    /// # Errors
    ///
    /// Returns an error for any name not present in `columns`.
    pub fn parse(
        columns: &'static [&'static str],
        page: u32,
        page_size: u32,
        include_count: bool,
        fields: Option<&str>,
        ordering: Option<&str>,
    ) -> Result<Self, ListQueryError> {
        let fields = fields
            .map(|raw| {
                split_names(raw)
                    .map(|name| {
                        lookup(columns, name)
                            .ok_or_else(|| ListQueryError::UnknownField(name.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .filter(|fields| !fields.is_empty());

        let ordering = ordering
            .map(|raw| {
                split_names(raw)
                    .map(|term| {
                        let (name, descending) = term
                            .strip_prefix('-')
                            .map_or((term, false), |name| (name, true));
                        lookup(columns, name)
                            .map(|column| SortKey { column, descending })
                            .ok_or_else(|| ListQueryError::UnknownOrdering(name.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            page: page.max(1),
            page_size: page_size.max(1),
            include_count,
            fields,
            ordering,
        })
    }

    /// `ORDER BY` clause body; `default` is used when no ordering was given.
    #[must_use]
    pub fn order_by(&self, default: &str) -> String {
        if self.ordering.is_empty() {
            return default.to_string();
        }
        self.ordering
            .iter()
            .map(|key| {
                if key.descending {
                    format!("{} DESC", key.column)
                } else {
                    format!("{} ASC", key.column)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// Serialize `row` keeping only the selected fields.
    #[must_use]
    pub fn project<T: Serialize>(&self, row: &T) -> Value {
        let value = serde_json::to_value(row).unwrap_or(Value::Null);
        match (&self.fields, value) {
            (Some(fields), Value::Object(mut object)) => {
                let projected: Map<String, Value> = fields
                    .iter()
                    .filter_map(|field| object.remove(*field).map(|v| ((*field).to_string(), v)))
                    .collect();
                Value::Object(projected)
            }
            (_, value) => value,
        }
    }
}

/// One page of rows.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub has_next: bool,
    /// Total row count, only when requested.
    pub count: Option<i64>,
}

fn split_names(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|name| !name.is_empty())
}

fn lookup(columns: &'static [&'static str], name: &str) -> Option<&'static str> {
    columns.iter().copied().find(|column| *column == name)
}
