#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]
//! End-to-end: HTTP origin → loader / prefetcher → filesystem store

use std::sync::{Arc, Mutex};
use std::time::Duration;

use folio_core::{
    BlobStore, Error, FsBackend, HttpFetcher, LoadOrigin, PageKey, PageLoader, PrefetchOptions,
    Prefetcher,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn scan(page: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat_n((page % 251) as u8, 32));
    bytes
}

async fn serve_scans() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/scan/\d+\.jpg$"))
        .respond_with(|request: &Request| {
            let page: usize = request
                .url
                .path()
                .trim_start_matches("/scan/")
                .trim_end_matches(".jpg")
                .parse()
                .unwrap();
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(scan(page))
        })
        .mount(&server)
        .await;
    server
}

fn fs_store(temp: &TempDir, quota: Option<u64>) -> Arc<BlobStore> {
    let backend = FsBackend::open(temp.path(), "digitalBookDB", "pages")
        .unwrap()
        .with_quota(quota);
    Arc::new(BlobStore::new(backend))
}

fn fast() -> PrefetchOptions {
    PrefetchOptions {
        pause: Duration::ZERO,
        ..PrefetchOptions::default()
    }
}

#[tokio::test]
async fn first_page_round_trips_through_disk() {
    let server = serve_scans().await;
    let temp = TempDir::new().unwrap();
    let store = fs_store(&temp, None);
    let source = Arc::new(HttpFetcher::new(&server.uri()).unwrap());
    let loader = PageLoader::new(Arc::clone(&store), source, 241);

    let page = loader.load_page(0).await.unwrap().unwrap();
    assert_eq!(page.origin, LoadOrigin::Network);
    assert_eq!(page.blob.bytes(), scan(1).as_slice());

    let raw = std::fs::read_to_string(temp.path().join("digitalBookDB/pages/page_1.json")).unwrap();
    let entry: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(entry["key"], "page_1");

    // A fresh store over the same directory serves it without the network
    let reopened = fs_store(&temp, None);
    let offline = PageLoader::new(
        reopened,
        Arc::new(HttpFetcher::new("http://127.0.0.1:9").unwrap()),
        241,
    );
    let cached = offline.load_page(0).await.unwrap().unwrap();
    assert_eq!(cached.origin, LoadOrigin::Cache);
    assert_eq!(cached.blob, page.blob);
}

#[tokio::test]
async fn full_prefetch_of_reference_document() {
    let server = serve_scans().await;
    let temp = TempDir::new().unwrap();
    let store = fs_store(&temp, None);
    let source = Arc::new(HttpFetcher::new(&server.uri()).unwrap());
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);

    let report = Prefetcher::new(Arc::clone(&store), source, 241)
        .with_options(fast())
        .with_progress(move |done, total| sink.lock().unwrap().push((done, total)))
        .run()
        .await;

    assert_eq!(report.batches, 81);
    assert_eq!(report.stored, 241);
    assert_eq!(progress.lock().unwrap().last(), Some(&(241, 241)));
    assert_eq!(store.list_keys().await.unwrap().len(), 241);
    assert_eq!(server.received_requests().await.unwrap().len(), 241);
}

#[tokio::test]
async fn prefetch_under_quota_keeps_most_recent_write() {
    let server = serve_scans().await;
    let temp = TempDir::new().unwrap();

    // Measure one stored entry, then allow roughly four of them
    let probe = fs_store(&temp, None);
    let loader = PageLoader::new(
        Arc::clone(&probe),
        Arc::new(HttpFetcher::new(&server.uri()).unwrap()),
        10,
    );
    loader.load_page(0).await.unwrap();
    let entry_size = std::fs::metadata(temp.path().join("digitalBookDB/pages/page_1.json"))
        .unwrap()
        .len();
    probe.clear().await.unwrap();

    let store = fs_store(&temp, Some(entry_size * 4 + entry_size / 2));
    let report = Prefetcher::new(
        Arc::clone(&store),
        Arc::new(HttpFetcher::new(&server.uri()).unwrap()),
        10,
    )
    .with_options(fast())
    .run()
    .await;

    // Every page was fetched; quota pressure evicted older entries instead of failing
    assert_eq!(report.gap, 10);
    assert_eq!(report.stored + report.failed, 10);
    assert!(report.stored >= 8, "unexpected failures: {report:?}");

    let keys = store.list_keys().await.unwrap();
    assert!(keys.len() <= 4);
    assert!(keys.contains(&PageKey::from_index(9)));
}

#[tokio::test]
async fn origin_errors_surface_as_page_load_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/scan/7.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let loader = PageLoader::new(
        fs_store(&temp, None),
        Arc::new(HttpFetcher::new(&server.uri()).unwrap()),
        241,
    );

    let err = loader.load_page(6).await.unwrap_err();
    assert_eq!(err.category(), "page_load");
    assert!(!err.is_recoverable());
    match err {
        Error::PageLoad { index, source } => {
            assert_eq!(index, 6);
            assert!(matches!(*source, Error::Network(_)));
        },
        other => panic!("unexpected error {other:?}"),
    }
}
