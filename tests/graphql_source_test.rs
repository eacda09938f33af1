//! Integration tests for the GraphQL page sources against a mock endpoint.

use std::num::NonZeroU32;
use std::time::Duration;

use comment_crawler::crawler::{
    Collected, CrawlError, Cursor, PageRequest, PageSource, PaginatedCollector,
};
use comment_crawler::remote::{CommentSource, EpisodeSource, GraphQlClient};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GraphQlClient {
    GraphQlClient::new(
        &format!("{}/graphql", server.uri()),
        "https://page.example.com/",
        Duration::from_secs(5),
    )
    .expect("Failed to build client")
}

fn collector() -> PaginatedCollector {
    PaginatedCollector::new(NonZeroU32::new(25).unwrap())
}

fn remote_comments(ids: std::ops::RangeInclusive<i64>) -> Vec<Value> {
    ids.map(|id| {
        json!({
            "commentUid": id,
            "comment": format!("comment {id}"),
            "createDt": "2024-12-10 22:08:11",
            "isBest": false,
            "likeCount": 1,
            "userName": "reader",
            "userThumbnailUrl": null,
            "userUid": 9,
            "emoticon": null,
        })
    })
    .collect()
}

fn comment_page(total: u64, is_end: bool, items: Vec<Value>) -> Value {
    json!({
        "data": {
            "commentList": {
                "isEnd": is_end,
                "totalCount": total,
                "commentList": items,
            }
        }
    })
}

#[tokio::test]
async fn test_comment_source_walks_after_last_uid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": {"commentListInput": {"page": 0, "lastCommentUid": null}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(
            47,
            false,
            remote_comments(1..=25),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({
            "variables": {"commentListInput": {"page": 1, "lastCommentUid": 25}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(
            47,
            false,
            remote_comments(26..=47),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let source = CommentSource::new(client(&server), 1, 10);
    let collection = collector().collect_all(&source).await.unwrap();

    assert_eq!(collection.items.len(), 47);
    assert_eq!(collection.pages_fetched, 2);
    assert_eq!(collection.items[0]["id"], 1);
    assert_eq!(collection.items[46]["content"], "comment 47");
}

#[tokio::test]
async fn test_comment_source_sends_browser_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("referer", "https://page.example.com/"))
        .and(body_partial_json(json!({
            "operationName": "commentList",
            "variables": {"commentListInput": {"seriesId": 1, "productId": 10}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(
            2,
            true,
            remote_comments(1..=2),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let source = CommentSource::new(client(&server), 1, 10);
    let collection = collector().collect_all(&source).await.unwrap();

    assert_eq!(collection.items.len(), 2);
}

#[tokio::test]
async fn test_comment_source_without_comments() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(0, true, vec![])))
        .mount(&server)
        .await;

    let source = CommentSource::new(client(&server), 1, 10);
    let err = collector().collect_all(&source).await.unwrap_err();

    assert!(matches!(err, CrawlError::EmptyCollection("comments")));
}

#[tokio::test]
async fn test_missing_comment_list_is_empty_collection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"commentList": null}})))
        .mount(&server)
        .await;

    let source = CommentSource::new(client(&server), 1, 10);
    let err = source
        .fetch_page(PageRequest {
            index: 0,
            cursor: Cursor::Start,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::EmptyCollection(_)));
}

#[tokio::test]
async fn test_graphql_errors_are_upstream_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "rate limited"}]
        })))
        .mount(&server)
        .await;

    let source = CommentSource::new(client(&server), 1, 10);
    let err = collector().collect_all(&source).await.unwrap_err();

    match err {
        CrawlError::Upstream(message) => assert!(message.contains("rate limited")),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status_is_upstream_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = EpisodeSource::new(client(&server), 1);
    let err = collector().collect_all(&source).await.unwrap_err();

    assert!(matches!(err, CrawlError::Upstream(_)));
}

fn episode_edge(id: i64) -> Value {
    json!({
        "cursor": id.to_string(),
        "node": {
            "thumbnail": format!("https://img.example.com/{id}.png"),
            "single": {"productId": id, "title": format!("Episode {id}")},
            "eventLog": {"eventMeta": {
                "id": id.to_string(),
                "name": format!("Ep. {id}"),
                "category": "webtoon",
                "subcategory": "fantasy"
            }}
        }
    })
}

fn episode_page(total: u64, has_next: bool, ids: std::ops::RangeInclusive<i64>) -> Value {
    json!({
        "data": {
            "contentHomeProductList": {
                "totalCount": total,
                "pageInfo": {"hasNextPage": has_next, "endCursor": null},
                "edges": ids.map(episode_edge).collect::<Vec<_>>(),
            }
        }
    })
}

#[tokio::test]
async fn test_episode_source_advances_offset_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"variables": {"after": "0", "sortType": "asc"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(episode_page(30, true, 1..=25)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"variables": {"after": "25"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(episode_page(30, false, 26..=30)))
        .expect(1)
        .mount(&server)
        .await;

    let source = EpisodeSource::new(client(&server), 77);
    let collection = collector().collect_all(&source).await.unwrap();

    assert_eq!(collection.items.len(), 30);
    assert_eq!(collection.items[29]["id"], 30);
    assert_eq!(collection.items[0]["name"], "Ep. 1");
    assert_eq!(collection.items[0]["subcategory"], "fantasy");
}

#[tokio::test]
async fn test_episode_source_stops_at_budget_despite_has_next() {
    let server = MockServer::start().await;

    // Always claims another page exists
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(episode_page(20, true, 1..=20)))
        .expect(1)
        .mount(&server)
        .await;

    let source = EpisodeSource::new(client(&server), 77);
    let collection = collector().collect_all(&source).await.unwrap();

    assert_eq!(collection.pages_fetched, 1);
    assert_eq!(collection.items.len(), 20);
}

#[tokio::test]
async fn test_episode_source_zero_total() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"contentHomeProductList": {
                "totalCount": 0,
                "pageInfo": {"hasNextPage": false},
                "edges": []
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = EpisodeSource::new(client(&server), 77);
    let collection = collector().collect_all(&source).await.unwrap();

    assert!(collection.items.is_empty());
    assert_eq!(collection.total_count, 0);
}

#[tokio::test]
async fn test_unknown_series_on_remote() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"contentHomeProductList": null}})),
        )
        .mount(&server)
        .await;

    let source = EpisodeSource::new(client(&server), 404_404);
    let err = collector().collect_all(&source).await.unwrap_err();

    assert!(matches!(err, CrawlError::SeriesNotFound(404_404)));
}

#[tokio::test]
async fn test_gate_skips_remaining_pages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(episode_page(60, true, 1..=25)))
        .expect(1)
        .mount(&server)
        .await;

    let source = EpisodeSource::new(client(&server), 77);
    let outcome = collector()
        .collect_gated(&source, |total| total <= 60)
        .await
        .unwrap();

    assert!(matches!(outcome, Collected::Skipped { total_count: 60 }));
}
