//! Tests for the Workers AI enricher against a mock HTTP server.

use gist_task_tracker::config::EnrichmentConfig;
use gist_task_tracker::enrichment::{Enricher, WorkersAiEnricher, build_prompt};
use gist_task_tracker::remote::MemoryDocument;
use gist_task_tracker::store::TaskStore;
use gist_task_tracker::types::{NewTask, TaskStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESPONSES_PATH: &str = "/accounts/acct-1/ai/v1/responses";

fn enricher_for(server: &MockServer, timeout_secs: u64) -> WorkersAiEnricher {
    let config = EnrichmentConfig {
        account_id: Some("acct-1".to_string()),
        auth_token: Some("cf-token".to_string()),
        model: "@cf/test/model".to_string(),
        api_url: server.uri(),
        timeout_secs,
        ..EnrichmentConfig::default()
    };
    WorkersAiEnricher::from_config(&config)
        .expect("enricher should build")
        .expect("enrichment should be active")
}

fn answer_body(text: &str) -> serde_json::Value {
    json!({
        "id": "resp_1",
        "output": [
            { "type": "reasoning", "content": [{ "type": "reasoning_text", "text": "..." }] },
            { "type": "message", "content": [{ "type": "output_text", "text": text }] }
        ]
    })
}

#[tokio::test]
async fn enrich_sends_model_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESPONSES_PATH))
        .and(header("authorization", "Bearer cf-token"))
        .and(body_json(json!({
            "model": "@cf/test/model",
            "input": build_prompt("Fix the bike"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body("Pump the tyres")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = enricher_for(&server, 5).enrich("Fix the bike").await;

    assert_eq!(answer.as_deref(), Some("Pump the tyres"));
}

#[tokio::test]
async fn enrich_returns_none_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESPONSES_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    assert_eq!(enricher_for(&server, 5).enrich("Fix the bike").await, None);
}

#[tokio::test]
async fn enrich_returns_none_on_unexpected_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESPONSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{ "content": [{ "text": "only reasoning" }] }]
        })))
        .mount(&server)
        .await;

    assert_eq!(enricher_for(&server, 5).enrich("Fix the bike").await, None);
}

#[tokio::test]
async fn enrich_returns_none_on_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESPONSES_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(answer_body("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    assert_eq!(enricher_for(&server, 1).enrich("Fix the bike").await, None);
}

#[tokio::test]
async fn store_keeps_plain_name_when_backend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESPONSES_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let doc = Arc::new(MemoryDocument::empty());
    let store = TaskStore::new(doc.clone(), Arc::new(enricher_for(&server, 5)));

    let task = store
        .create(NewTask::new("Write report", TaskStatus::Todo))
        .await
        .expect("create should succeed without enrichment");

    assert_eq!(task.name, "Write report");
    let persisted: serde_json::Value = serde_json::from_str(&doc.content()).unwrap();
    assert_eq!(
        persisted,
        json!([{"id": 1, "name": "Write report", "status": "todo"}])
    );
}

#[tokio::test]
async fn store_appends_backend_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESPONSES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_body("Start with an outline")))
        .expect(1)
        .mount(&server)
        .await;
    let doc = Arc::new(MemoryDocument::empty());
    let store = TaskStore::new(doc.clone(), Arc::new(enricher_for(&server, 5)));

    let task = store
        .create(NewTask::new("Write report", TaskStatus::Todo))
        .await
        .unwrap();

    assert_eq!(task.name, "Write report AI solution: Start with an outline");
}
