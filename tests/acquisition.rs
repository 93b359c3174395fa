//! End-to-end acquisition runs against a mock Douyin API
//!
//! These tests drive the real HTTP client, signer, paginator, store and download
//! pipeline; only the platform is simulated (wiremock).

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{
    POST_PATH, PROFILE_PATH, SEC_UID, UID, assert_no_partial_files, dir_entries, douyin_config,
    drain_events, media_body, mount_douyin_user, mount_media, requests_to,
};
use social_dl::paginator::StopReason;
use social_dl::types::ItemStatus;
use social_dl::{Acquisition, Event};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn limit_of_five_over_ten_posts_processes_exactly_five() {
    let server = MockServer::start().await;
    mount_douyin_user(&server, 10, "Night Owl").await;
    let dir = TempDir::new().unwrap();
    let mut config = douyin_config(&server.uri(), &dir);
    config.listing.max_counts = 5;

    let acquisition = Acquisition::new(config).await.unwrap();
    let summary = acquisition.run().await.unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.stop_reason, Some(StopReason::LimitReached));

    let post_dir = dir.path().join("Download").join("douyin").join("post");
    assert_eq!(dir_entries(&post_dir), vec!["Night Owl".to_string()]);
    let user_dir = post_dir.join("Night Owl");
    for id in 1..=5 {
        let written = std::fs::read(user_dir.join(format!("{id}.mp4"))).unwrap();
        assert_eq!(written, media_body(id));
    }
    assert!(!user_dir.join("6.mp4").exists());
    assert_no_partial_files(&post_dir);

    let db = acquisition.database();
    assert_eq!(db.count_users().await.unwrap(), 1);
    assert_eq!(
        db.count_items(UID, Some(ItemStatus::Complete)).await.unwrap(),
        5
    );
    assert_eq!(requests_to(&server, "/media/").await, 5);
}

#[tokio::test]
async fn requests_are_signed_and_carry_credentials() {
    let server = MockServer::start().await;
    mount_douyin_user(&server, 2, "Night Owl").await;
    let dir = TempDir::new().unwrap();

    let acquisition = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    acquisition.run().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let listing = requests
        .iter()
        .find(|r| r.url.path() == POST_PATH)
        .expect("listing was requested");
    let params: Vec<(String, String)> = listing.url.query_pairs().into_owned().collect();
    assert!(params.contains(&("sec_user_id".to_string(), SEC_UID.to_string())));
    assert!(params.iter().any(|(k, v)| k == "X-Bogus" && v.len() == 28));
    assert_eq!(
        listing.headers.get("cookie").unwrap().to_str().unwrap(),
        "sessionid=test-session"
    );
    assert!(listing.headers.get("user-agent").is_some());
}

#[tokio::test]
async fn second_run_downloads_nothing() {
    let server = MockServer::start().await;
    mount_douyin_user(&server, 7, "Night Owl").await;
    let dir = TempDir::new().unwrap();

    let first = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    let summary = first.run().await.unwrap();
    assert_eq!(summary.succeeded, 7);
    drop(first);

    let second = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    let summary = second.run().await.unwrap();

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.skipped, 7);
    assert_eq!(summary.stop_reason, Some(StopReason::Exhausted));
    assert_eq!(requests_to(&server, "/media/").await, 7);
    assert_eq!(second.database().count_items(UID, None).await.unwrap(), 7);
}

#[tokio::test]
async fn rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POST_PATH))
        .and(query_param("max_cursor", "0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_douyin_user(&server, 3, "Night Owl").await;
    let dir = TempDir::new().unwrap();

    let acquisition = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    let summary = acquisition.run().await.unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(acquisition.fetch_stats().retries, 1);
    assert_eq!(requests_to(&server, POST_PATH).await, 2);
}

#[tokio::test]
async fn missing_media_fails_only_that_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/2.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_douyin_user(&server, 3, "Night Owl").await;
    let dir = TempDir::new().unwrap();

    let acquisition = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    let summary = acquisition.run().await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].item_id, "2");
    assert_eq!(summary.failures[0].code, "client_error");

    let record = acquisition
        .database()
        .get_item(UID, "2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ItemStatus::Failed);
}

#[tokio::test]
async fn renamed_user_folder_follows_new_nickname() {
    let dir = TempDir::new().unwrap();

    let server = MockServer::start().await;
    mount_douyin_user(&server, 2, "Night Owl").await;
    let first = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    first.run().await.unwrap();
    drop(first);

    // Same user, new display name, one more post
    let renamed = MockServer::start().await;
    mount_douyin_user(&renamed, 3, "Early Bird").await;
    let second = Acquisition::new(douyin_config(&renamed.uri(), &dir))
        .await
        .unwrap();
    let mut events = second.subscribe();
    let summary = second.run().await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);

    let post_dir = dir.path().join("Download").join("douyin").join("post");
    assert_eq!(dir_entries(&post_dir), vec!["Early Bird".to_string()]);
    assert_eq!(
        dir_entries(&post_dir.join("Early Bird")),
        vec!["1.mp4", "2.mp4", "3.mp4"]
    );
    assert!(
        drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, Event::FolderRenamed { uid, .. } if uid == UID))
    );
}

#[tokio::test]
async fn unknown_user_reports_failed_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_media(&server).await;
    let dir = TempDir::new().unwrap();

    let acquisition = Acquisition::new(douyin_config(&server.uri(), &dir))
        .await
        .unwrap();
    let summary = acquisition.run().await.unwrap();

    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.page_failures, 1);
    assert_eq!(summary.stop_reason, Some(StopReason::PageFailed));
}

#[tokio::test]
async fn invalid_proxy_is_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let mut config = douyin_config("http://127.0.0.1:9", &dir);
    config.network.proxies = Some(social_dl::config::ProxyConfig {
        http: "socks5://127.0.0.1:1080".to_string(),
        https: "http://127.0.0.1:1080".to_string(),
    });

    let err = Acquisition::new(config).await.err().unwrap();

    assert!(matches!(
        err,
        social_dl::Error::Config { key: Some(ref key), .. } if key == "proxies.http"
    ));
}
