//! Query parameters and response envelope for list endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MAX_PAGE_SIZE;
use crate::db::{ListPage, ListQuery, ListQueryError};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    #[serde(default)]
    pub include_count: bool,
    pub fields: Option<String>,
    pub ordering: Option<String>,
}

impl ListParams {
    /// Validate against a table's column allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown field or ordering names.
    pub fn to_query(
        &self,
        columns: &'static [&'static str],
        default_page_size: u32,
    ) -> Result<ListQuery, ListQueryError> {
        ListQuery::parse(
            columns,
            self.page.unwrap_or(1),
            self.page_size
                .unwrap_or(default_page_size)
                .min(MAX_PAGE_SIZE),
            self.include_count,
            self.fields.as_deref(),
            self.ordering.as_deref(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Value>,
}

impl PageResponse {
    /// Project each row and attach relative links to neighbouring pages.
    pub fn build<T: Serialize>(path: &str, query: &ListQuery, page: ListPage<T>) -> Self {
        let results = page.items.iter().map(|row| query.project(row)).collect();
        let next = page
            .has_next
            .then(|| page_link(path, query, query.page.saturating_add(1)));
        let previous = (query.page > 1).then(|| page_link(path, query, query.page - 1));

        Self {
            count: page.count,
            next,
            previous,
            results,
        }
    }
}

fn page_link(path: &str, query: &ListQuery, page: u32) -> String {
    let mut link = format!("{path}?page={page}&page_size={}", query.page_size);

    if query.include_count {
        link.push_str("&include_count=true");
    }
    if let Some(fields) = &query.fields {
        link.push_str("&fields=");
        link.push_str(&urlencoding::encode(&fields.join(",")));
    }
    if !query.ordering.is_empty() {
        let ordering = query
            .ordering
            .iter()
            .map(|key| {
                if key.descending {
                    format!("-{}", key.column)
                } else {
                    key.column.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        link.push_str("&ordering=");
        link.push_str(&urlencoding::encode(&ordering));
    }

    link
}
