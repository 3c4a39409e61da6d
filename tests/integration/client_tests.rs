//! Integration tests for the API client
//!
//! These tests use wiremock to stand in for the Moltbook API and check
//! auth, retry and pagination against real HTTP traffic.

use carcinologer::config::{ApiKey, Config};
use carcinologer::crawler::{ApiClient, Endpoint, FetchError, Paginator, Termination};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_secs = 5;
    config.fetch.page_size = 100;
    config.fetch.min_request_interval_ms = 0;
    config.fetch.max_attempts = 3;
    config.fetch.backoff_base_ms = 1;
    config.fetch.max_backoff_ms = 5;
    config
}

fn test_client(config: &Config) -> ApiClient {
    ApiClient::new(config, ApiKey::new("test-key")).expect("Failed to build client")
}

fn post(n: usize) -> Value {
    json!({
        "id": format!("p{}", n),
        "title": format!("Post {}", n),
        "author": {"id": format!("a{}", n % 7), "name": format!("agent{}", n % 7)},
        "submolt": {"name": "general"},
        "upvotes": n,
        "comment_count": 0
    })
}

/// Serves a newest-first feed of `total` posts, honoring `limit` and `before`
struct FeedResponder {
    total: usize,
}

impl Respond for FeedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut limit = 25;
        let mut before = self.total + 1;
        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "limit" => limit = value.parse().unwrap_or(limit),
                "before" => {
                    before = value
                        .trim_start_matches('p')
                        .parse()
                        .unwrap_or(before)
                }
                _ => {}
            }
        }

        let posts: Vec<Value> = (1..before).rev().take(limit).map(post).collect();
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "posts": posts}))
    }
}

#[tokio::test]
async fn test_feed_of_250_posts_takes_three_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(FeedResponder { total: 250 })
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let outcome = Paginator::new(client.pages(Endpoint::Feed), 100, |raw: &Value| {
        carcinologer::crawler::map_record(
            raw,
            carcinologer::model::ResourceKind::Posts,
            Default::default(),
        )
    })
    .collect_all()
    .await
    .expect("Pagination failed");

    assert_eq!(outcome.records.len(), 250);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.termination, Termination::ShortPage);
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn test_cursor_and_sort_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("sort", "new"))
        .and(query_param("limit", "100"))
        .and(query_param("before", "p151"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let page = client
        .fetch_page(&Endpoint::Feed, Some("p151"), 100)
        .await
        .expect("Request failed");
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/agents/leaderboard"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "leaderboard": [{"name": "crabby", "score": 10}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);
    assert!(client.is_authenticated());

    let page = client
        .fetch_page(&Endpoint::Leaderboard, None, 100)
        .await
        .expect("Request failed");
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_anonymous_client_sends_no_authorization() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/submolts"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/submolts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"submolts": [], "count": 0})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = ApiClient::new(&config, None).expect("Failed to build client");
    assert!(!client.is_authenticated());

    let page = client
        .fetch_page(&Endpoint::Submolts, None, 100)
        .await
        .expect("Request failed");
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/submolts"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/submolts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "submolts": [{"name": "general"}],
            "count": 1,
            "total_posts": 10,
            "total_comments": 20
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let stats = client.get_stats().await.expect("Stats request failed");
    assert_eq!(stats.total_submolts, 1);
    assert_eq!(stats.total_posts, 10);
    assert_eq!(stats.total_comments, 20);
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": [post(1)]})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let page = client
        .fetch_page(&Endpoint::Feed, None, 100)
        .await
        .expect("Request failed");
    assert_eq!(page.len(), 1);
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn test_retries_exhausted_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let err = client
        .fetch_page(&Endpoint::Feed, None, 100)
        .await
        .expect_err("Request should fail");
    match err {
        FetchError::Transient {
            status, attempts, ..
        } => {
            assert_eq!(status, Some(502));
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected Transient, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad sort"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let err = client
        .fetch_page(&Endpoint::Feed, None, 100)
        .await
        .expect_err("Request should fail");
    match err {
        FetchError::Request { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad sort");
        }
        other => panic!("Expected Request, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_feed_is_unauthenticated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = ApiClient::new(&config, None).expect("Failed to build client");

    let err = client
        .fetch_page(&Endpoint::Feed, None, 100)
        .await
        .expect_err("Request should fail");
    assert!(err.is_unauthenticated());
}

#[tokio::test]
async fn test_unauthorized_feed_degrades_pagination() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = ApiClient::new(&config, None).expect("Failed to build client");

    let outcome = Paginator::new(client.pages(Endpoint::Feed), 100, |raw: &Value| {
        carcinologer::crawler::map_record(
            raw,
            carcinologer::model::ResourceKind::Posts,
            Default::default(),
        )
    })
    .collect_all()
    .await
    .expect("401 should not be an error");

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.termination, Termination::Unauthenticated);
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let err = client
        .fetch_page(&Endpoint::Feed, None, 100)
        .await
        .expect_err("Request should fail");
    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn test_search_maps_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "lobster molting"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "p1", "type": "post", "title": "On molting", "similarity": 0.91},
                {"id": 42, "type": "comment", "content": "same", "post_id": "p1"},
                {"type": "post"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let client = test_client(&config);

    let results = client
        .search("lobster molting", 5)
        .await
        .expect("Search failed");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "p1");
    assert_eq!(results[0].similarity, Some(0.91));
    assert_eq!(results[1].id, "42");
    assert_eq!(results[1].post_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_base_url_with_path_prefix() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/submolts/general/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": [post(3)]})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}/api/v1/", mock_server.uri()));
    let client = test_client(&config);

    let page = client
        .fetch_page(&Endpoint::SubmoltFeed("general".to_string()), None, 100)
        .await
        .expect("Request failed");
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_requests_to_different_endpoints_share_spacing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": [post(1)]})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/agents/leaderboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"leaderboard": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri());
    config.fetch.min_request_interval_ms = 80;
    let client = test_client(&config);

    client
        .fetch_page(&Endpoint::Feed, None, 100)
        .await
        .expect("Feed request failed");
    let first_done = Instant::now();

    client
        .fetch_page(&Endpoint::Leaderboard, None, 100)
        .await
        .expect("Leaderboard request failed");

    // The interval runs from the end of the first request, recorded just before
    // fetch_page returned
    assert!(first_done.elapsed() >= Duration::from_millis(75));
    assert_eq!(client.request_count(), 2);
}

