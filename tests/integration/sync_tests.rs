//! Integration tests for the syncer
//!
//! These tests use wiremock to serve explorer pages and run the full
//! walker -> workers -> aggregator pipeline against a SQLite database.

use ord_syncer::config::{Config, OutputConfig, SourceConfig, SyncerConfig, UserAgentConfig};
use ord_syncer::storage::{CheckpointStore, SqliteStorage};
use ord_syncer::{sync_once, Content, UNSTABLE_NUMBER};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "last_inscription_id";

/// Creates a test configuration pointing at the mock explorer
fn create_test_config(base_url: &str, db_path: &Path, start: i64) -> Config {
    Config {
        syncer: SyncerConfig {
            concurrency: 3,
            inscription_id_start: start,
            poll_interval: 60,
            checkpoint_key: KEY.to_string(),
        },
        source: SourceConfig {
            base_url: base_url.to_string(),
            request_timeout: 5,
            connect_timeout: 2,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestSyncer".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
    }
}

fn listing_page(uids: &[&str], next: Option<&str>) -> String {
    let links: String = uids
        .iter()
        .map(|uid| format!(r#"<a href="/inscription/{}"><iframe></iframe></a>"#, uid))
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="next" href="{}">next</a>"#, href))
        .unwrap_or_default();
    format!(
        r#"<html><body><h1>Inscriptions</h1><div class="thumbnails">{}</div>{}</body></html>"#,
        links, next
    )
}

fn detail_page(uid: &str, heading: &str, content_type: &str, length: usize) -> String {
    format!(
        r#"<html><body><h1>{}</h1><dl>
        <dt>id</dt><dd class="monospace">{}</dd>
        <dt>address</dt><dd class="monospace"><a href="/address/bc1qowner">bc1qowner</a></dd>
        <dt>output value</dt><dd>10000</dd>
        <dt>content length</dt><dd>{} bytes</dd>
        <dt>content type</dt><dd>{}</dd>
        <dt>timestamp</dt><dd><time>2023-05-28 03:28:17 UTC</time></dd>
        <dt>genesis height</dt><dd><a href="/block/791234">791234</a></dd>
        </dl></body></html>"#,
        heading, uid, length, content_type
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_inscription(server: &MockServer, uid: &str, number: i64, content_type: &str, body: &str) {
    let heading = if number == UNSTABLE_NUMBER {
        "Inscription (unstable)".to_string()
    } else {
        format!("Inscription {}", number)
    };
    mount_page(
        server,
        &format!("/inscription/{}", uid),
        detail_page(uid, &heading, content_type, body.len()),
    )
    .await;
    mount_page(server, &format!("/content/{}", uid), body.to_string()).await;
}

/// Two listing pages: 12..10 with a cursed entry, and 15..13 with an
/// unstable entry on top
async fn mount_explorer(server: &MockServer) {
    mount_page(
        server,
        "/inscriptions/10",
        listing_page(&["c12i0", "cursedi0", "b11i0", "a10i0"], Some("/inscriptions/13")),
    )
    .await;
    mount_page(
        server,
        "/inscriptions/13",
        listing_page(&["pendingi0", "f15i0", "e14i0", "d13i0"], None),
    )
    .await;

    mount_inscription(server, "a10i0", 10, "text/plain;charset=utf-8", "alice.sats").await;
    mount_inscription(
        server,
        "b11i0",
        11,
        "application/json",
        r#"{"p":"sns","op":"reg","name":"Bob.Sats"}"#,
    )
    .await;
    mount_inscription(server, "c12i0", 12, "image/png", "not really a png").await;
    mount_inscription(server, "d13i0", 13, "text/plain;charset=utf-8", "hello world").await;
    mount_inscription(server, "e14i0", 14, "text/plain;charset=utf-8", "alice.sats").await;
    mount_inscription(server, "f15i0", 15, "text/plain;charset=utf-8", "carol.btc").await;
    mount_inscription(server, "cursedi0", -9, "text/plain;charset=utf-8", "eve.sats").await;
    mount_inscription(server, "pendingi0", UNSTABLE_NUMBER, "text/plain;charset=utf-8", "dave.sats").await;
}

#[tokio::test]
async fn test_full_sync_commits_in_order() {
    let server = MockServer::start().await;
    mount_explorer(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sync.db");
    let config = create_test_config(&server.uri(), &db_path, 10);

    let summary = sync_once(&config, CancellationToken::new())
        .await
        .expect("sync failed");

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.refs, 8);
    assert_eq!(summary.committed, 6);
    assert_eq!(summary.checkpoint, Some(15));

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage.inscription_numbers().unwrap(),
        vec![10, 11, 12, 13, 14, 15]
    );
    assert_eq!(storage.get(KEY).unwrap(), Some(15));

    let alice = storage.get_inscription(10).unwrap().unwrap();
    assert_eq!(
        alice.content,
        Some(Content::PlainName {
            name: "alice.sats".to_string()
        })
    );
    assert_eq!(alice.address.as_deref(), Some("bc1qowner"));
    assert_eq!(alice.timestamp, Some(1_685_244_497));

    let bob = storage.get_inscription(11).unwrap().unwrap();
    assert_eq!(bob.content.unwrap().name(), "bob.sats");
    assert_eq!(bob.content_parser.as_deref(), Some("sns"));

    assert_eq!(storage.get_inscription(12).unwrap().unwrap().content, None);
    assert_eq!(storage.get_inscription(13).unwrap().unwrap().content, None);

    // First registration owns the name
    let domain = storage.get_domain("alice.sats").unwrap().unwrap();
    assert_eq!(domain.inscription_number, 10);
    assert_eq!(storage.count_domains().unwrap(), 3);
}

#[tokio::test]
async fn test_second_sync_resumes_from_checkpoint() {
    let server = MockServer::start().await;
    mount_explorer(&server).await;
    mount_page(&server, "/inscriptions/15", listing_page(&["f15i0", "e14i0"], None)).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sync.db");
    let config = create_test_config(&server.uri(), &db_path, 10);

    sync_once(&config, CancellationToken::new()).await.unwrap();
    let second = sync_once(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(second.pages, 1);
    assert_eq!(second.committed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.checkpoint, Some(15));

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_inscriptions().unwrap(), 6);
}

#[tokio::test]
async fn test_failed_content_fetch_stops_at_last_good_commit() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/inscriptions/0",
        listing_page(&["c2i0", "b1i0", "a0i0"], Some("/inscriptions/3")),
    )
    .await;
    mount_inscription(&server, "a0i0", 0, "text/plain;charset=utf-8", "zero.sats").await;
    mount_inscription(&server, "c2i0", 2, "text/plain;charset=utf-8", "two.sats").await;
    mount_page(
        &server,
        "/inscription/b1i0",
        detail_page("b1i0", "Inscription 1", "text/plain;charset=utf-8", 8),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/content/b1i0"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sync.db");
    let config = create_test_config(&server.uri(), &db_path, 0);

    let err = sync_once(&config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_transport());

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.inscription_numbers().unwrap(), vec![0]);
    assert_eq!(storage.get(KEY).unwrap(), Some(0));
}

#[tokio::test]
async fn test_base_url_path_prefix() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/ord/inscriptions/0",
        listing_page(&["a0i0"], None),
    )
    .await;
    mount_page(
        &server,
        "/ord/inscription/a0i0",
        detail_page("a0i0", "Inscription 0", "text/plain;charset=utf-8", 9),
    )
    .await;
    mount_page(&server, "/ord/content/a0i0", "zero.sats".to_string()).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sync.db");
    let config = create_test_config(&format!("{}/ord/", server.uri()), &db_path, 0);

    let summary = sync_once(&config, CancellationToken::new()).await.unwrap();
    assert_eq!(summary.committed, 1);
}

#[tokio::test]
async fn test_cancelled_sync_commits_nothing() {
    let server = MockServer::start().await;
    mount_page(&server, "/inscriptions/0", listing_page(&["a0i0"], None)).await;
    Mock::given(method("GET"))
        .and(path("/inscription/a0i0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page(
                    "a0i0",
                    "Inscription 0",
                    "text/plain;charset=utf-8",
                    9,
                ))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sync.db");
    let config = create_test_config(&server.uri(), &db_path, 0);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = sync_once(&config, cancel).await.unwrap_err();

    assert!(matches!(err, ord_syncer::SyncError::Shutdown));
    assert!(started.elapsed() < std::time::Duration::from_secs(2));

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_inscriptions().unwrap(), 0);
    assert_eq!(storage.get(KEY).unwrap(), None);
}
