//! End-to-end transfer tests against a local mock server
//!
//! Covers planning, parallel and single-stream downloads, retries, fatal
//! failures and cleanup, disk preflight, progress reporting and
//! authentication.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parafetch::app::preflight::available_space;
use parafetch::app::{ClientConfig, ProgressSink, TransferRequest, TransferStatus};

use common::{
    engine_with, payload, requested_range, test_config, test_engine, CollectingSink,
    FailingRangeResponder, FlakyResponder, RangeResponder, StallingResponder,
    TruncateOnceResponder,
};

const SIZE: usize = 64 * 1024;
const CHUNK: u64 = 8 * 1024;

async fn mount_head(server: &MockServer, route: &str, len: usize, ranges: bool) {
    let mut template = ResponseTemplate::new(200).insert_header("Content-Length", len.to_string());
    if ranges {
        template = template.insert_header("Accept-Ranges", "bytes");
    }
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn request_for(server: &MockServer, route: &str, dir: &TempDir) -> TransferRequest {
    TransferRequest::new(format!("{}{}", server.uri(), route), dir.path())
        .with_max_workers(4)
        .with_min_chunk_size(CHUNK)
}

async fn range_requests(server: &MockServer) -> Vec<(u64, u64)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .filter_map(requested_range)
        .collect()
}

fn dir_entries(dir: &TempDir) -> Vec<String> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_parallel_download_reassembles_file() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(RangeResponder::new(body.clone()))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/model.bin", &temp_dir), None)
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert!(!outcome.skipped);
    let dest = temp_dir.path().join("model.bin");
    assert_eq!(outcome.path.as_deref(), Some(dest.as_path()));
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);

    // 64 KiB over 4 workers with an 8 KiB floor gives four 16 KiB chunks
    let mut ranges = range_requests(&server).await;
    ranges.sort();
    assert_eq!(
        ranges,
        vec![(0, 16383), (16384, 32767), (32768, 49151), (49152, 65535)]
    );

    // Chunk workspace and staging file are gone
    assert_eq!(dir_entries(&temp_dir), vec!["model.bin".to_string()]);
    assert_eq!(outcome.progress.status, TransferStatus::Completed);
    assert_eq!(outcome.progress.downloaded, SIZE as u64);
}

#[tokio::test]
async fn test_rejected_head_falls_back_to_ranged_get() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    Mock::given(method("HEAD"))
        .and(path("/asset"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/asset"))
        .respond_with(RangeResponder::new(body.clone()))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(
            request_for(&server, "/asset", &temp_dir).with_filename("asset.bin"),
            None,
        )
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    let dest = temp_dir.path().join("asset.bin");
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
    assert_eq!(range_requests(&server).await.len(), 4);
}

#[tokio::test]
async fn test_server_without_ranges_uses_single_stream() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    mount_head(&server, "/plain.dat", SIZE, false).await;
    Mock::given(method("GET"))
        .and(path("/plain.dat"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/plain.dat", &temp_dir), None)
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("plain.dat")).await.unwrap(),
        body
    );
    assert!(range_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_small_file_is_not_split() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(4096);

    mount_head(&server, "/small.txt", body.len(), true).await;
    Mock::given(method("GET"))
        .and(path("/small.txt"))
        .respond_with(RangeResponder::new(body.clone()))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/small.txt", &temp_dir), None)
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert!(range_requests(&server).await.is_empty());
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("small.txt")).await.unwrap(),
        body
    );
}

#[tokio::test]
async fn test_existing_file_is_skipped_without_requests() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let dest = temp_dir.path().join("model.bin");
    tokio::fs::write(&dest, b"already here").await.unwrap();

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/model.bin", &temp_dir), None)
        .await;

    assert!(outcome.success);
    assert!(outcome.skipped);
    assert_eq!(outcome.path.as_deref(), Some(dest.as_path()));
    assert_eq!(outcome.progress.percentage, 100);
    assert_eq!(outcome.progress.total_size, 12);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"already here");
}

#[tokio::test]
async fn test_overwrite_replaces_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);
    let dest = temp_dir.path().join("model.bin");
    tokio::fs::write(&dest, b"stale").await.unwrap();

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(RangeResponder::new(body.clone()))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(
            request_for(&server, "/model.bin", &temp_dir).with_overwrite(true),
            None,
        )
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert!(!outcome.skipped);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
}

#[tokio::test]
async fn test_permanent_chunk_failure_leaves_nothing_behind() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(FailingRangeResponder::new(
            RangeResponder::new(payload(SIZE)),
            32768,
            404,
        ))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/model.bin", &temp_dir), None)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind.as_deref(), Some("transfer"));
    assert!(outcome.path.is_none());
    assert_eq!(outcome.progress.status, TransferStatus::Error);
    assert!(outcome.progress.error_message.is_some());

    // A 404 is not retried
    let failing = range_requests(&server)
        .await
        .into_iter()
        .filter(|(start, _)| *start == 32768)
        .count();
    assert_eq!(failing, 1);

    assert!(dir_entries(&temp_dir).is_empty(), "{:?}", dir_entries(&temp_dir));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(FlakyResponder::new(RangeResponder::new(body.clone()), 2))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/model.bin", &temp_dir), None)
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("model.bin")).await.unwrap(),
        body
    );
    assert_eq!(range_requests(&server).await.len(), 6);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_head(&server, "/model.bin", SIZE, false).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/model.bin", &temp_dir), None)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind.as_deref(), Some("transfer"));

    // One attempt plus three retries
    let gets = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 4);
    assert!(dir_entries(&temp_dir).is_empty());
}

#[tokio::test]
async fn test_size_change_during_transfer_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(RangeResponder::new(payload(SIZE)).with_reported_total(SIZE as u64 + 100))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(request_for(&server, "/model.bin", &temp_dir), None)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind.as_deref(), Some("transfer"));
    // Never retried: at most one request per chunk
    assert!(range_requests(&server).await.len() <= 4);
    assert!(!temp_dir.path().join("model.bin").exists());
}

#[tokio::test]
async fn test_progress_is_monotonic_and_finishes_at_100() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(RangeResponder::new(payload(SIZE)))
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let outcome = test_engine()
        .transfer(
            request_for(&server, "/model.bin", &temp_dir),
            Some(sink.clone() as Arc<dyn ProgressSink>),
        )
        .await;
    assert!(outcome.success, "transfer failed: {}", outcome.message);

    let snapshots = sink.snapshots();
    assert!(!snapshots.is_empty());
    for pair in snapshots.windows(2) {
        assert!(pair[1].percentage >= pair[0].percentage);
        assert!(pair[1].downloaded >= pair[0].downloaded);
    }

    let last = snapshots.last().unwrap();
    assert_eq!(last.status, TransferStatus::Completed);
    assert_eq!(last.percentage, 100);
    assert_eq!(last.downloaded, SIZE as u64);
    assert_eq!(last.total_size, SIZE as u64);
}

#[tokio::test]
async fn test_spawned_transfer_publishes_progress() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(RangeResponder::new(payload(SIZE)))
        .mount(&server)
        .await;

    let handle = test_engine().spawn(request_for(&server, "/model.bin", &temp_dir), None);
    let mut updates = handle.subscribe();

    let outcome = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("transfer timed out");
    assert!(outcome.success, "transfer failed: {}", outcome.message);

    let latest = updates.borrow_and_update().clone();
    assert_eq!(latest.status, TransferStatus::Completed);
    assert_eq!(latest.percentage, 100);
}

#[tokio::test]
async fn test_bearer_token_is_sent_on_every_request() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    Mock::given(method("HEAD"))
        .and(path("/private.bin"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Length", SIZE.to_string())
                .insert_header("Accept-Ranges", "bytes"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private.bin"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(RangeResponder::new(body.clone()))
        .mount(&server)
        .await;

    let outcome = test_engine()
        .transfer(
            request_for(&server, "/private.bin", &temp_dir).with_token("secret-token"),
            None,
        )
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("private.bin")).await.unwrap(),
        body
    );
    assert_eq!(range_requests(&server).await.len(), 4);
}

#[tokio::test]
async fn test_plan_reports_chunks() {
    let server = MockServer::start().await;
    mount_head(&server, "/model.bin", SIZE, true).await;

    let engine = test_engine();
    let url = url::Url::parse(&format!("{}/model.bin", server.uri())).unwrap();
    let limits = parafetch::app::PlanLimits {
        max_workers: 16,
        min_chunk_size: CHUNK,
    };
    let plan = engine.planner().plan(&url, None, limits).await;

    assert!(plan.is_parallel());
    assert_eq!(plan.total_size, SIZE as u64);
    assert_eq!(plan.ranges.len(), 8);
    assert_eq!(plan.ranges.last().unwrap().end, SIZE as u64 - 1);
}

#[tokio::test]
async fn test_insufficient_space_fails_before_any_download() {
    let temp_dir = TempDir::new().unwrap();
    if let Err(e) = available_space(temp_dir.path()) {
        eprintln!("free space not measurable here, skipping: {e}");
        return;
    }
    let server = MockServer::start().await;

    mount_head(&server, "/huge.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .respond_with(RangeResponder::new(payload(SIZE)))
        .expect(0)
        .mount(&server)
        .await;

    // A margin this large makes any volume too small
    let engine = engine_with(test_config().with_disk_margin_percent(u64::MAX / 1000));
    let dest_dir = temp_dir.path().join("nested");
    let request = TransferRequest::new(format!("{}/huge.bin", server.uri()), &dest_dir)
        .with_max_workers(4)
        .with_min_chunk_size(CHUNK);

    let outcome = engine.transfer(request, None).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind.as_deref(), Some("preflight"));
    assert!(outcome.message.contains("Insufficient disk space"), "{}", outcome.message);
    assert_eq!(outcome.progress.status, TransferStatus::Error);
    assert!(!dest_dir.exists());
}

#[tokio::test]
async fn test_read_timeout_is_retried() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    mount_head(&server, "/slow.bin", SIZE, false).await;
    Mock::given(method("GET"))
        .and(path("/slow.bin"))
        .respond_with(StallingResponder::new(
            RangeResponder::new(body.clone()),
            1,
            Duration::from_secs(3),
        ))
        .mount(&server)
        .await;

    let client = ClientConfig::default().with_read_timeout(Duration::from_millis(200));
    let engine = engine_with(test_config().with_client(client));

    let outcome = engine
        .transfer(request_for(&server, "/slow.bin", &temp_dir), None)
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("slow.bin")).await.unwrap(),
        body
    );
    let gets = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 2);
}

#[tokio::test]
async fn test_bare_head_streams_unknown_size() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    Mock::given(method("HEAD"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    // Preflight would reject any known size under this margin
    let engine = engine_with(test_config().with_disk_margin_percent(u64::MAX / 1000));
    let sink = Arc::new(CollectingSink::default());
    let outcome = engine
        .transfer(
            request_for(&server, "/stream", &temp_dir).with_filename("stream.bin"),
            Some(sink.clone() as Arc<dyn ProgressSink>),
        )
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert!(range_requests(&server).await.is_empty());
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("stream.bin")).await.unwrap(),
        body
    );
    assert_eq!(outcome.progress.status, TransferStatus::Completed);
    assert_eq!(outcome.progress.percentage, 100);
    assert_eq!(outcome.progress.total_size, SIZE as u64);

    // Percentage stays 0 until completion when the total is unknown
    let snapshots = sink.snapshots();
    assert!(snapshots
        .iter()
        .filter(|s| s.status == TransferStatus::Downloading)
        .all(|s| s.percentage == 0));
    assert_eq!(dir_entries(&temp_dir), vec!["stream.bin".to_string()]);
}

#[tokio::test]
async fn test_truncated_chunk_is_retried() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let body = payload(SIZE);

    mount_head(&server, "/model.bin", SIZE, true).await;
    Mock::given(method("GET"))
        .and(path("/model.bin"))
        .respond_with(TruncateOnceResponder::new(RangeResponder::new(body.clone())))
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let outcome = test_engine()
        .transfer(
            request_for(&server, "/model.bin", &temp_dir),
            Some(sink.clone() as Arc<dyn ProgressSink>),
        )
        .await;

    assert!(outcome.success, "transfer failed: {}", outcome.message);
    assert_eq!(
        tokio::fs::read(temp_dir.path().join("model.bin")).await.unwrap(),
        body
    );
    assert_eq!(range_requests(&server).await.len(), 5);
    // The retried half chunk is not counted twice
    assert_eq!(outcome.progress.downloaded, SIZE as u64);
    assert!(sink.snapshots().iter().all(|s| s.downloaded <= SIZE as u64));
}
