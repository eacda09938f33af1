//! Integration tests for the inference server client.

use std::time::Duration;

use comment_crawler::llm::{CommentAnalyzer, InferenceClient, LlmError, SourceComment};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> InferenceClient {
    // Trailing slash must not produce a double slash in request paths
    InferenceClient::new(&format!("{}/", server.uri()), Duration::from_secs(5))
        .expect("Failed to build client")
}

fn comments() -> Vec<SourceComment> {
    vec![
        SourceComment {
            id: 1,
            content: "loved it".to_string(),
        },
        SourceComment {
            id: 2,
            content: "buy cheap coins".to_string(),
        },
    ]
}

#[tokio::test]
async fn test_score_emotions_sends_batch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emotion"))
        .and(body_json(json!({
            "comments": [
                {"id": 1, "content": "loved it"},
                {"id": 2, "content": "buy cheap coins"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inference": [
                {"id": 1, "score": 5, "reason": "enthusiastic"},
                {"id": 2, "score": 3, "reason": "advertising", "is_spam": true}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let scores = client(&server).score_emotions(&comments()).await.unwrap();

    assert_eq!(scores.len(), 2);
    assert_eq!(scores[0].score, 5);
    assert_eq!(scores[0].is_spam, None);
    assert_eq!(scores[1].is_spam, Some(true));
}

#[tokio::test]
async fn test_summarize_returns_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/summary"))
        .and(body_json(json!({"content": "a b"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"inference": "readers liked it"})),
        )
        .mount(&server)
        .await;

    let summary = client(&server).summarize("a b").await.unwrap();

    assert_eq!(summary, "readers liked it");
}

async fn summarize_with_status(status: u16) -> LlmError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summary"))
        .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
        .mount(&server)
        .await;

    client(&server).summarize("text").await.unwrap_err()
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    assert!(matches!(summarize_with_status(400).await, LlmError::BadRequest(d) if d == "nope"));
    assert!(matches!(summarize_with_status(404).await, LlmError::NotFound(_)));
    assert!(matches!(summarize_with_status(500).await, LlmError::Server(500)));
    assert!(matches!(summarize_with_status(503).await, LlmError::Server(503)));
    assert!(matches!(
        summarize_with_status(202).await,
        LlmError::UnexpectedStatus(202)
    ));
    assert!(matches!(
        summarize_with_status(429).await,
        LlmError::UnexpectedStatus(429)
    ));
}

#[tokio::test]
async fn test_missing_inference_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "x"})))
        .mount(&server)
        .await;

    let err = client(&server).summarize("text").await.unwrap_err();

    assert!(matches!(err, LlmError::EmptyInference));
}

#[tokio::test]
async fn test_unparseable_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server).score_emotions(&comments()).await.unwrap_err();

    assert!(matches!(err, LlmError::Parse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = InferenceClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

    let err = client.summarize("text").await.unwrap_err();

    assert!(matches!(err, LlmError::Network(_)));
}
