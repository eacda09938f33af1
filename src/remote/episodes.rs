use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::client::GraphQlClient;
use super::queries::EPISODE_QUERY;
use crate::crawler::schema::record_id;
use crate::crawler::{Continuation, CrawlError, Cursor, Page, PageRequest, PageSource};

/// Episode list of one series, walked with an offset cursor in ascending order.
#[derive(Debug, Clone)]
pub struct EpisodeSource {
    client: GraphQlClient,
    series_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductListData {
    content_home_product_list: Option<ProductList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductList {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    page_info: PageInfo,
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct Edge {
    #[serde(default)]
    node: Value,
}

impl EpisodeSource {
    #[must_use]
    pub const fn new(client: GraphQlClient, series_id: i64) -> Self {
        Self { client, series_id }
    }
}

#[async_trait]
impl PageSource for EpisodeSource {
    type Item = Value;

    fn noun(&self) -> &'static str {
        "episodes"
    }

    fn continuation(&self) -> Continuation {
        Continuation::Offset
    }

    fn item_key(&self, item: &Value) -> Option<i64> {
        record_id(item)
    }

    async fn fetch_page(&self, request: PageRequest) -> Result<Page<Value>, CrawlError> {
        let after = match request.cursor {
            Cursor::Start => "0".to_string(),
            Cursor::Offset(offset) => offset.to_string(),
            Cursor::AfterItem(id) => id.to_string(),
        };

        let data: ProductListData = self
            .client
            .execute(
                "contentHomeProductList",
                EPISODE_QUERY,
                json!({
                    "seriesId": self.series_id,
                    "after": after,
                    "sortType": "asc",
                }),
            )
            .await?;

        let list = data
            .content_home_product_list
            .ok_or(CrawlError::SeriesNotFound(self.series_id))?;

        Ok(Page {
            items: list.edges.iter().map(|edge| episode_record(&edge.node)).collect(),
            total_count: list.total_count,
            end_reached: !list.page_info.has_next_page,
        })
    }
}

/// Flatten a product list node into the local episode record shape.
///
/// The id comes from `single.productId`, falling back to the event metadata
/// id, which the platform sends as a string.
fn episode_record(node: &Value) -> Value {
    let meta = &node["eventLog"]["eventMeta"];
    let single = &node["single"];

    let id = single
        .get("productId")
        .filter(|v| !v.is_null())
        .cloned()
        .or_else(|| match meta.get("id") {
            Some(Value::String(s)) => s.parse::<i64>().ok().map(Value::from),
            Some(other) => Some(other.clone()),
            None => None,
        })
        .unwrap_or(Value::Null);

    let name = match meta.get("name") {
        Some(Value::String(s)) if !s.is_empty() => Value::from(s.as_str()),
        _ => single.get("title").cloned().unwrap_or(Value::Null),
    };

    json!({
        "id": id,
        "name": name,
        "category": meta.get("category").cloned().unwrap_or(Value::Null),
        "subcategory": meta.get("subcategory").cloned().unwrap_or(Value::Null),
        "thumbnail": node.get("thumbnail").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_record_prefers_product_id() {
        let node = json!({
            "thumbnail": "https://img/1.png",
            "single": {"productId": 5001, "title": "Episode 1"},
            "eventLog": {"eventMeta": {
                "id": "9999",
                "name": "Ep. 1",
                "category": "webtoon",
                "subcategory": "fantasy"
            }}
        });

        let record = episode_record(&node);

        assert_eq!(record["id"], 5001);
        assert_eq!(record["name"], "Ep. 1");
        assert_eq!(record["category"], "webtoon");
        assert_eq!(record["thumbnail"], "https://img/1.png");
    }

    #[test]
    fn test_episode_record_falls_back_to_event_meta() {
        let node = json!({
            "single": {"title": "Episode 2"},
            "eventLog": {"eventMeta": {"id": "5002", "name": "", "category": "c"}}
        });

        let record = episode_record(&node);

        assert_eq!(record["id"], 5002);
        assert_eq!(record["name"], "Episode 2");
        assert_eq!(record["subcategory"], Value::Null);
        assert_eq!(record["thumbnail"], Value::Null);
    }
}
