//! Integration tests for a full processing run against a mocked Miniflux API.
//!
//! Each test starts its own wiremock server, so the HTTP adapter, matcher and
//! processor are exercised together exactly as the binary wires them.

use miniflux_rules::{Config, Matcher, MinifluxClient, ProcessError, Processor};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RULES: &str = r##"
miniflux_url = "http://placeholder.invalid"

[[rules]]
name = "Sponsored"
title = "(?i)sponsored"
action = "read"

[[rules]]
name = "Promo spam"
feed = "^Tech News$"
author = "^Bob$"
content = "#promo"
action = "remove"
"##;

fn entry_json(id: i64, title: &str, author: &str, content: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": author,
        "content": content,
        "status": "unread",
        "published_at": "2024-01-01T10:00:00+01:00",
        "feed": {"id": 1, "title": "Tech News"}
    })
}

/// `count` entries; every tenth one is sponsored, every 25th is Bob's promo.
fn entries(count: i64) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            if id % 10 == 0 {
                entry_json(id, "Sponsored: gadgets", "Alice", "Buy now")
            } else if id % 25 == 0 {
                entry_json(id, "Weekly deals", "Bob", "Use #promo today")
            } else {
                entry_json(id, &format!("Post {id}"), "Alice", "Normal content")
            }
        })
        .collect()
}

async fn mount_pages(server: &MockServer, status: Option<&str>, all: &[Value]) {
    for (page, chunk) in all.chunks(100).enumerate() {
        let offset = (page * 100).to_string();
        let mut mock = Mock::given(method("GET"))
            .and(path("/v1/entries"))
            .and(query_param("offset", offset.as_str()));
        mock = match status {
            Some(status) => mock.and(query_param("status", status)),
            None => mock.and(query_param_is_missing("status")),
        };
        mock.respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "total": all.len(),
                "entries": chunk,
            })),
        )
        .expect(1)
        .mount(server)
        .await;
    }
}

fn processor(server: &MockServer, dry_run: bool) -> Processor<MinifluxClient> {
    let config = Config::parse(RULES).unwrap();
    let matcher = Arc::new(Matcher::new(&config.rules).unwrap());
    let client = MinifluxClient::new(&server.uri(), SecretString::from("token".to_string()))
        .unwrap()
        .retry_delay(Duration::ZERO);
    Processor::new(client, matcher, dry_run)
}

#[tokio::test]
async fn test_live_run_updates_matching_entries() {
    let server = MockServer::start().await;
    let all = entries(150);
    mount_pages(&server, Some("unread"), &all).await;

    // 15 sponsored (ids divisible by 10); ids 25, 75, 125 are promos
    Mock::given(method("PUT"))
        .and(path("/v1/entries"))
        .respond_with(ResponseTemplate::new(204))
        .expect(18)
        .mount(&server)
        .await;

    let stats = processor(&server, false).process().await.unwrap();

    assert_eq!(stats.total_entries, 150);
    assert_eq!(stats.matched_entries, 18);
    assert_eq!(stats.marked_read, 15);
    assert_eq!(stats.removed, 3);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_live_run_sends_removed_status_for_promo() {
    let server = MockServer::start().await;
    let all = vec![entry_json(25, "Weekly deals", "Bob", "Use #promo today")];
    mount_pages(&server, Some("unread"), &all).await;

    Mock::given(method("PUT"))
        .and(path("/v1/entries"))
        .and(body_json(json!({"entry_ids": [25], "status": "removed"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let stats = processor(&server, false).process().await.unwrap();
    assert_eq!(stats.removed, 1);
}

#[tokio::test]
async fn test_dry_run_fetches_all_statuses_and_never_updates() {
    let server = MockServer::start().await;
    let all = entries(150);
    mount_pages(&server, None, &all).await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let stats = processor(&server, true).process().await.unwrap();

    assert_eq!(stats.total_entries, 150);
    assert_eq!(stats.marked_read, 15);
    assert_eq!(stats.removed, 3);
}

#[tokio::test]
async fn test_failed_updates_are_counted() {
    let server = MockServer::start().await;
    let all = entries(30);
    mount_pages(&server, Some("unread"), &all).await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error_message": "bad request"})),
        )
        .mount(&server)
        .await;

    let stats = processor(&server, false).process().await.unwrap();

    // 10, 20, 30 are sponsored and 25 is a promo
    assert_eq!(stats.total_entries, 30);
    assert_eq!(stats.matched_entries, 4);
    assert_eq!(stats.errors, 4);
}

#[tokio::test]
async fn test_unreachable_page_aborts_run() {
    let server = MockServer::start().await;
    let all = entries(150);

    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 150,
            "entries": &all[..100],
        })))
        .mount(&server)
        .await;
    // Second page fails on every attempt, retries included
    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = processor(&server, false).process().await.unwrap_err();

    let ProcessError::Fetch { offset, stats, .. } = err;
    assert_eq!(offset, 100);
    assert_eq!(stats.total_entries, 100);
    assert_eq!(stats.marked_read, 10);
    assert_eq!(stats.removed, 2);
}
