//! Static server and preflight tests
//!
//! These run without a browser: they serve the quiz fixture from this
//! directory and request it over loopback HTTP.

use std::path::PathBuf;
use std::time::Duration;

use quizcheck_e2e::server::probe_target;
use quizcheck_e2e::{E2eError, StaticServer};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[tokio::test]
async fn serves_fixture_and_passes_preflight() {
    let server = StaticServer::start(&fixtures_dir(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let url = format!("{}/personality-test.html", server.base_url());

    probe_target(&url, Duration::from_secs(5)).await.unwrap();

    let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
    assert!(body.contains("question-container"));
    assert!(body.contains("next-button"));

    server.stop().await;
}

#[tokio::test]
async fn preflight_rejects_missing_page() {
    let server = StaticServer::start(&fixtures_dir(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let url = format!("{}/does-not-exist.html", server.base_url());

    let err = probe_target(&url, Duration::from_millis(300)).await.unwrap_err();
    assert!(matches!(err, E2eError::TargetUnreachable { .. }));

    server.stop().await;
}

#[tokio::test]
async fn stopped_server_stops_answering() {
    let server = StaticServer::start(&fixtures_dir(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let url = format!("{}/personality-test.html", server.base_url());
    server.stop().await;

    let err = probe_target(&url, Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, E2eError::TargetUnreachable { .. }));
}
