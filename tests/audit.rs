//! Audit logger behaviour: delivery, backpressure and body recording.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use http_body_util::BodyExt;
use portico::audit::{self, AuditEntry, AuditLogger};
use portico::config::model::LoggingConfig;
use portico::error::AuditError;

fn logging(dir: &tempfile::TempDir, max_writers: usize, queue_capacity: usize) -> LoggingConfig {
    LoggingConfig {
        file: Some(dir.path().join("logs").join("audit.log")),
        max_writers,
        queue_capacity,
        max_body_capture: 8,
    }
}

fn entry(i: usize) -> AuditEntry {
    let mut entry = AuditEntry::new("GET", &format!("/orders/{i}"));
    entry.service = "orders".into();
    entry.request_id = Some(format!("req-{i}"));
    entry.response_status = 200;
    entry
}

fn parse(log: &str) -> Vec<AuditEntry> {
    log.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn disabled_logger_is_a_no_op() {
    let logger = AuditLogger::start(&LoggingConfig::default()).unwrap();
    assert!(!logger.is_enabled());
    assert!(!logger.submit(entry(1)));
    logger.flush().await;
    assert!(matches!(logger.read_all().await, Err(AuditError::Unavailable)));
    assert_eq!(logger.stats().written, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_accepted_entry_is_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(&logging(&dir, 4, 1024)).unwrap();

    let mut tasks = Vec::new();
    for t in 0..8 {
        let logger = logger.clone();
        tasks.push(tokio::spawn(async move {
            (0..100)
                .filter(|i| logger.submit(entry(t * 100 + i)))
                .count()
        }));
    }
    let mut accepted = 0;
    for task in tasks {
        accepted += task.await.unwrap();
    }

    logger.flush().await;
    let entries = parse(&logger.read_all().await.unwrap());
    assert_eq!(entries.len(), accepted);

    let ids: HashSet<_> = entries.iter().filter_map(|e| e.request_id.clone()).collect();
    assert_eq!(ids.len(), accepted);

    let stats = logger.stats();
    assert_eq!(stats.written as usize, accepted);
    assert_eq!((stats.written + stats.dropped) as usize, 800);
}

#[tokio::test]
async fn submit_never_blocks_when_saturated() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(&logging(&dir, 1, 1)).unwrap();

    let started = Instant::now();
    let accepted = (0..2_000).filter(|i| logger.submit(entry(*i))).count();
    assert!(started.elapsed() < Duration::from_secs(1));

    let stats = logger.stats();
    assert_eq!(stats.dropped as usize, 2_000 - accepted);
    assert!(stats.dropped > 0);

    logger.flush().await;
    assert_eq!(parse(&logger.read_all().await.unwrap()).len(), accepted);
}

#[tokio::test]
async fn appends_to_an_existing_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = logging(&dir, 2, 16);

    let first = AuditLogger::start(&config).unwrap();
    assert!(first.submit(entry(1)));
    first.flush().await;

    let second = AuditLogger::start(&config).unwrap();
    assert!(second.submit(entry(2)));
    second.flush().await;

    let entries = parse(&second.read_all().await.unwrap());
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn recorded_body_streams_through_and_is_truncated_in_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(&logging(&dir, 2, 16)).unwrap();

    let response = Response::builder()
        .status(StatusCode::CREATED)
        .header("x-upstream", "a")
        .body(Body::from("hello, audited world"))
        .unwrap();
    let recorded = audit::record(response, entry(1), &logger);

    let body = recorded.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello, audited world");

    logger.flush().await;
    let entries = parse(&logger.read_all().await.unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].response_status, 201);
    assert_eq!(entries[0].response_body, "hello, a");
    assert!(entries[0].truncated);
    assert_eq!(entries[0].response_headers["x-upstream"], vec!["a"]);
}

#[tokio::test]
async fn dropped_body_still_submits_once() {
    let dir = tempfile::tempdir().unwrap();
    let logger = AuditLogger::start(&logging(&dir, 2, 16)).unwrap();

    let response = Response::new(Body::from("never read"));
    drop(audit::record(response, entry(1), &logger));

    logger.flush().await;
    let entries = parse(&logger.read_all().await.unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].response_body, "");
}

#[tokio::test]
async fn record_is_a_passthrough_when_disabled() {
    let logger = AuditLogger::disabled();
    let response = Response::new(Body::from("plain"));
    let body = audit::record(response, entry(1), &logger)
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes();
    assert_eq!(&body[..], b"plain");
}
