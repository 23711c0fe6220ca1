mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use wordroots::frequency::{FrequencyError, FrequencyTable};

const LISTING: &str = "the 600000\nvision 300\nenvision 90\nvisionary 10\n";

async fn listing_host() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = Router::new().route(
        "/en_50k.txt",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { LISTING }
        }),
    );
    let base = common::serve(app).await;
    (format!("{base}/en_50k.txt"), hits)
}

#[tokio::test]
async fn missing_listing_is_downloaded_and_kept() {
    let (url, hits) = listing_host().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("frequencies.txt");
    let client = reqwest::Client::new();

    let table = FrequencyTable::load_or_install(&path, "en", &client, &url)
        .await
        .unwrap();
    assert_eq!(table.len("en"), 4);
    assert!(table.estimate("vision", "en").is_some_and(|zipf| zipf >= 2.5));
    assert!(table.estimate("envision", "en").is_some());
    assert!(path.is_file());
    assert!(!path.with_extension("part").exists());

    let again = FrequencyTable::load_or_install(&path, "en", &client, "http://127.0.0.1:9/gone")
        .await
        .unwrap();
    assert_eq!(again.estimate("vision", "en"), table.estimate("vision", "en"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_download_installs_nothing() {
    let app = Router::new().route("/en_50k.txt", get(|| async { StatusCode::NOT_FOUND }));
    let base = common::serve(app).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frequencies.txt");

    let err = FrequencyTable::load_or_install(
        &path,
        "en",
        &reqwest::Client::new(),
        &format!("{base}/en_50k.txt"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FrequencyError::Download { .. }));
    assert!(!path.exists());
}
