//! Integration tests for a full harvest
//!
//! These tests use wiremock to stand in for the Moltbook API and run the
//! harvester end-to-end into a temporary data directory.

use carcinologer::config::{ApiKey, Config};
use carcinologer::crawler::{ApiClient, CancelToken, HarvestReport, Harvester};
use carcinologer::model::ResourceKind;
use carcinologer::state::ResourceStatus;
use carcinologer::storage::{open_store, Cell, DatasetStore};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.timeout_secs = 5;
    config.fetch.page_size = 100;
    config.fetch.min_request_interval_ms = 0;
    config.fetch.max_attempts = 2;
    config.fetch.backoff_base_ms = 1;
    config.fetch.max_backoff_ms = 5;
    config.output.data_dir = dir.join("data");
    config.output.summary_path = dir.join("data").join("summary.md");
    config
}

async fn run_harvest(config: Config, include_comments: bool, cancel: CancelToken) -> HarvestReport {
    let client = ApiClient::new(&config, ApiKey::new("test-key")).expect("Failed to build client");
    Harvester::new(config, "test-hash".to_string(), client, cancel)
        .run(include_comments)
        .await
}

fn post(id: &str, title: &str, submolt: &str, comments: i64) -> Value {
    json!({
        "id": id,
        "title": title,
        "author": {"id": "a1", "name": "crabby"},
        "submolt": {"name": submolt},
        "upvotes": 3,
        "downvotes": 1,
        "comment_count": comments
    })
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a small but complete platform: two communities, a leaderboard,
/// a main feed, two community feeds and comments on one post
async fn mount_platform(server: &MockServer, feed: Vec<Value>) {
    mount_json(
        server,
        "/submolts",
        json!({
            "success": true,
            "submolts": [
                {"name": "general", "display_name": "General", "subscriber_count": 12},
                {"name": "shells", "display_name": "Shells", "subscriber_count": 4}
            ],
            "count": 2,
            "total_posts": 40,
            "total_comments": 90
        }),
    )
    .await;

    mount_json(
        server,
        "/agents/leaderboard",
        json!({
            "leaderboard": [
                {"name": "crabby", "score": 50},
                {"name": "lobstah", "score": 20, "rank": 7}
            ]
        }),
    )
    .await;

    mount_json(server, "/posts", json!({"posts": feed})).await;

    mount_json(
        server,
        "/submolts/general/feed",
        json!({"posts": [post("p1", "First", "general", 2), post("g9", "Only here", "general", 0)]}),
    )
    .await;

    mount_json(
        server,
        "/submolts/shells/feed",
        json!({"posts": [post("s1", "Shell talk", "shells", 0)]}),
    )
    .await;

    mount_json(
        server,
        "/posts/p1/comments",
        json!({
            "comments": [
                {"id": "c1", "content": "nice", "author": {"name": "lobstah"}},
                {"id": "c2", "content": "agreed", "parent_id": "c1", "post_id": "p1"}
            ]
        }),
    )
    .await;
}

fn text<'a>(row: &'a [Cell], columns: &[String], column: &str) -> Option<&'a str> {
    let index = columns.iter().position(|c| c == column)?;
    row[index].as_text()
}

#[tokio::test]
async fn test_full_harvest_writes_every_dataset() {
    let mock_server = MockServer::start().await;
    mount_platform(
        &mock_server,
        vec![post("p1", "First", "general", 2), post("p2", "Second", "shells", 0)],
    )
    .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    let report = run_harvest(config.clone(), true, CancelToken::new()).await;

    assert!(report.is_complete(), "report: {:?}", report);
    assert!(report.authenticated);
    assert!(!report.cancelled);

    let stats = report.stats.expect("Stats should be present");
    assert_eq!(stats.total_submolts, 2);
    assert_eq!(stats.total_posts, 40);

    let expected = [
        (ResourceKind::Communities, 2),
        (ResourceKind::Leaderboard, 2),
        (ResourceKind::Posts, 2),
        (ResourceKind::SubmoltPosts, 3),
        (ResourceKind::Comments, 2),
    ];
    for (kind, records) in expected {
        let resource = report.resource(kind).expect("Missing resource report");
        assert_eq!(resource.status, ResourceStatus::Complete { records }, "{}", kind);
        let persisted = resource.persisted.as_ref().expect("Resource not persisted");
        assert_eq!(persisted.total, records);
    }

    let store = open_store(&config.output.data_dir);
    for kind in ResourceKind::ALL {
        assert!(store.path_for(kind).exists(), "{} file missing", kind);
    }

    let summary = std::fs::read_to_string(&config.output.summary_path)
        .expect("Summary should be written");
    assert!(summary.starts_with("# Carcinologer Harvest Summary"));
    assert!(summary.contains("test-hash"));
    assert!(!summary.contains("test-key"));
}

#[tokio::test]
async fn test_community_posts_carry_their_source() {
    let mock_server = MockServer::start().await;
    mount_platform(&mock_server, vec![post("p1", "First", "general", 2)]).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    run_harvest(config.clone(), false, CancelToken::new()).await;

    let store = open_store(&config.output.data_dir);
    let dataset = store
        .load(ResourceKind::SubmoltPosts)
        .expect("Failed to load")
        .expect("Dataset missing");
    assert_eq!(dataset.len(), 3);

    let columns = dataset.columns().to_vec();
    let shell = dataset.find("id", "s1").expect("s1 missing");
    assert_eq!(text(shell, &columns, "source_submolt"), Some("shells"));
    let general = dataset.find("id", "g9").expect("g9 missing");
    assert_eq!(text(general, &columns, "source_submolt"), Some("general"));

    let feed = store
        .load(ResourceKind::Posts)
        .expect("Failed to load")
        .expect("Dataset missing");
    assert_eq!(feed.column_index("source_submolt"), None);
}

#[tokio::test]
async fn test_leaderboard_ranks_follow_position() {
    let mock_server = MockServer::start().await;
    mount_platform(&mock_server, vec![]).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    run_harvest(config.clone(), false, CancelToken::new()).await;

    let store = open_store(&config.output.data_dir);
    let dataset = store
        .load(ResourceKind::Leaderboard)
        .expect("Failed to load")
        .expect("Dataset missing");
    let rank = dataset.column_index("rank").expect("rank column");

    let crabby = dataset.find("name", "crabby").expect("crabby missing");
    assert_eq!(crabby[rank], Cell::Integer(1));
    let lobstah = dataset.find("name", "lobstah").expect("lobstah missing");
    assert_eq!(lobstah[rank], Cell::Integer(7));
}

#[tokio::test]
async fn test_second_run_merges_posts() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let first = MockServer::start().await;
    mount_platform(
        &first,
        vec![post("p1", "First", "general", 2), post("p2", "Second", "shells", 0)],
    )
    .await;
    let config = create_test_config(&first.uri(), dir.path());
    run_harvest(config, false, CancelToken::new()).await;

    let second = MockServer::start().await;
    mount_platform(
        &second,
        vec![post("p3", "Third", "general", 0), post("p2", "Second, edited", "shells", 0)],
    )
    .await;
    let config = create_test_config(&second.uri(), dir.path());
    let report = run_harvest(config.clone(), false, CancelToken::new()).await;

    let persisted = report
        .resource(ResourceKind::Posts)
        .and_then(|r| r.persisted.as_ref())
        .expect("Posts not persisted");
    assert_eq!(persisted.incoming, 2);
    assert_eq!(persisted.total, 3);

    let store = open_store(&config.output.data_dir);
    let dataset = store
        .load(ResourceKind::Posts)
        .expect("Failed to load")
        .expect("Dataset missing");
    let columns = dataset.columns().to_vec();
    assert_eq!(dataset.len(), 3);
    let edited = dataset.find("id", "p2").expect("p2 missing");
    assert_eq!(text(edited, &columns, "title"), Some("Second, edited"));
    assert!(dataset.find("id", "p1").is_some());
}

#[tokio::test]
async fn test_rejected_key_degrades_feeds_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/submolts/general/feed"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/submolts/shells/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_platform(&mock_server, vec![]).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    let report = run_harvest(config.clone(), false, CancelToken::new()).await;

    assert!(!report.is_complete());
    assert_eq!(
        report.resource(ResourceKind::Communities).map(|r| &r.status),
        Some(&ResourceStatus::Complete { records: 2 })
    );
    assert_eq!(
        report.resource(ResourceKind::Leaderboard).map(|r| &r.status),
        Some(&ResourceStatus::Complete { records: 2 })
    );

    let posts = report.resource(ResourceKind::Posts).expect("Missing posts");
    assert!(matches!(posts.status, ResourceStatus::Degraded { records: 0, .. }));
    assert!(posts.persisted.is_none());

    let feeds = report
        .resource(ResourceKind::SubmoltPosts)
        .expect("Missing submolt posts");
    assert!(matches!(feeds.status, ResourceStatus::Degraded { records: 0, .. }));
    assert_eq!(feeds.pages, 1);

    assert_eq!(
        report.resource(ResourceKind::Comments).map(|r| &r.status),
        Some(&ResourceStatus::Skipped)
    );

    let store = open_store(&config.output.data_dir);
    assert!(store.path_for(ResourceKind::Communities).exists());
    assert!(!store.path_for(ResourceKind::Posts).exists());
}

#[tokio::test]
async fn test_private_community_does_not_stop_other_feeds() {
    let mock_server = MockServer::start().await;

    mount_json(
        &mock_server,
        "/submolts",
        json!({"submolts": [{"name": "private"}, {"name": "public"}], "count": 2}),
    )
    .await;
    mount_json(&mock_server, "/agents/leaderboard", json!({"leaderboard": []})).await;
    mount_json(&mock_server, "/posts", json!({"posts": []})).await;

    Mock::given(method("GET"))
        .and(path("/submolts/private/feed"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/submolts/public/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [post("pub1", "Open to all", "public", 0)]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    let report = run_harvest(config.clone(), false, CancelToken::new()).await;

    let feeds = report
        .resource(ResourceKind::SubmoltPosts)
        .expect("Missing submolt posts");
    match &feeds.status {
        ResourceStatus::Degraded { records, reason } => {
            assert_eq!(*records, 1);
            assert!(reason.contains("1 of 2 communities require authentication"));
        }
        other => panic!("Expected Degraded, got {:?}", other),
    }
    assert_eq!(feeds.persisted.as_ref().map(|p| p.total), Some(1));

    let store = open_store(&config.output.data_dir);
    let dataset = store
        .load(ResourceKind::SubmoltPosts)
        .expect("Failed to load")
        .expect("Dataset missing");
    let columns = dataset.columns().to_vec();
    let public = dataset.find("id", "pub1").expect("pub1 missing");
    assert_eq!(text(public, &columns, "source_submolt"), Some("public"));
}

#[tokio::test]
async fn test_failed_communities_skip_community_feeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/submolts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    mount_json(&mock_server, "/agents/leaderboard", json!({"leaderboard": []})).await;
    mount_json(&mock_server, "/posts", json!({"posts": [post("p1", "First", "general", 0)]})).await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    let report = run_harvest(config.clone(), false, CancelToken::new()).await;

    assert!(report.stats.is_none());

    let communities = report
        .resource(ResourceKind::Communities)
        .expect("Missing communities");
    assert!(communities.status.is_error());
    assert!(communities.persisted.is_none());

    let feeds = report
        .resource(ResourceKind::SubmoltPosts)
        .expect("Missing submolt posts");
    assert!(feeds.status.is_error());
    assert_eq!(feeds.pages, 0);

    assert_eq!(
        report.resource(ResourceKind::Posts).map(|r| &r.status),
        Some(&ResourceStatus::Complete { records: 1 })
    );

    let store = open_store(&config.output.data_dir);
    assert!(!store.path_for(ResourceKind::Communities).exists());
    assert!(store.path_for(ResourceKind::Posts).exists());
}

#[tokio::test]
async fn test_failed_replace_keeps_previous_snapshot() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let first = MockServer::start().await;
    mount_platform(&first, vec![]).await;
    let config = create_test_config(&first.uri(), dir.path());
    run_harvest(config, false, CancelToken::new()).await;

    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/agents/leaderboard"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&second)
        .await;
    mount_platform(&second, vec![]).await;
    let config = create_test_config(&second.uri(), dir.path());
    let report = run_harvest(config.clone(), false, CancelToken::new()).await;

    assert!(report
        .resource(ResourceKind::Leaderboard)
        .map_or(false, |r| r.status.is_error()));

    let store = open_store(&config.output.data_dir);
    let dataset = store
        .load(ResourceKind::Leaderboard)
        .expect("Failed to load")
        .expect("Previous leaderboard should survive");
    assert_eq!(dataset.len(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&mock_server.uri(), dir.path());
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = run_harvest(config.clone(), true, cancel).await;

    assert!(report.cancelled);
    assert_eq!(report.requests, 0);
    for resource in &report.resources {
        assert_eq!(resource.status, ResourceStatus::Cancelled { records: 0 });
        assert!(resource.persisted.is_none());
    }

    let store = open_store(&config.output.data_dir);
    for kind in ResourceKind::ALL {
        assert!(!store.path_for(kind).exists());
    }
    assert!(config.output.summary_path.exists());
}
