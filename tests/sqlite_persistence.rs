use review_ingest::app::IngestUseCase;
use review_ingest::config::{Config, ConnectionDescriptor};
use review_ingest::domain::{CanonicalRecord, PipelineState, Stage};
use review_ingest::infra::SqliteConnector;
use review_ingest::pipeline::ingestion::{RawRow, RawValue, TabularBuffer};
use review_ingest::pipeline::storage::{BatchPersister, TargetKind, TargetSchema};
use rusqlite::Connection;
use tempfile::TempDir;

fn descriptor(dir: &TempDir) -> ConnectionDescriptor {
    ConnectionDescriptor {
        path: dir.path().join("reviews.db"),
        ..Default::default()
    }
}

fn record(title: &str, review: &str) -> CanonicalRecord {
    CanonicalRecord {
        title: title.to_string(),
        review_text: review.to_string(),
        ..Default::default()
    }
}

fn titles(dir: &TempDir) -> Vec<String> {
    let conn = Connection::open(dir.path().join("reviews.db")).unwrap();
    let mut stmt = conn.prepare("SELECT title FROM reviews ORDER BY id").unwrap();
    let titles = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    titles
}

#[test]
fn constraint_violation_is_isolated_to_its_row() {
    let dir = TempDir::new().unwrap();
    let connector = SqliteConnector::new(descriptor(&dir));
    let schema = TargetSchema::reviews();
    let batch = vec![
        record("Cafe", "nice"),
        record("Deli", "ok"),
        record("", "nameless"),
        record("Bistro", "fine"),
    ];

    let outcome = BatchPersister::new(&connector, &schema).persist(&batch);
    assert_eq!(outcome.rows_written, 3);
    assert_eq!(outcome.rows_failed, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].row_index, Some(2));
    assert_eq!(outcome.state, PipelineState::Reported);

    assert_eq!(titles(&dir), vec!["Cafe", "Deli", "Bistro"]);
}

#[test]
fn unreachable_store_fails_every_row() {
    let dir = TempDir::new().unwrap();
    let connector = SqliteConnector::new(ConnectionDescriptor {
        path: dir.path().join("missing").join("reviews.db"),
        create_if_missing: false,
        ..Default::default()
    });
    let schema = TargetSchema::reviews();

    let outcome = BatchPersister::new(&connector, &schema).persist(&[record("Cafe", "nice"), record("Deli", "ok")]);
    assert_eq!(outcome.rows_failed, outcome.rows_total);
    assert_eq!(outcome.rows_written, 0);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.retryable);
    assert_eq!(outcome.failed_stage(), Some(Stage::Persist));
    assert!(!dir.path().join("missing").exists());
}

#[test]
fn same_upload_is_written_once() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database = descriptor(&dir);
    let use_case = IngestUseCase::from_config(&config).unwrap();
    let buffer = TabularBuffer::from_rows(vec![RawRow::new().with("Title", RawValue::Text("Cafe".into()))]);

    assert!(use_case.handle("a.csv", &buffer).is_success());
    let again = use_case.handle("a.csv", &buffer);
    assert!(again.is_success());
    assert_eq!(again.body["outcome"]["duplicate"], true);
    assert!(use_case.handle("b.csv", &buffer).is_success());

    assert_eq!(titles(&dir), vec!["Cafe", "Cafe"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_use_separate_sessions() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database = descriptor(&dir);
    SqliteConnector::new(config.database.clone())
        .init_schema(&TargetSchema::reviews())
        .unwrap();

    let mut handles = Vec::new();
    for batch in 0..4 {
        let config = config.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let rows = (0..25)
                .map(|i| RawRow::new().with("Title", RawValue::Text(format!("b{}-r{}", batch, i))))
                .collect();
            let use_case = IngestUseCase::from_config(&config).unwrap();
            use_case.handle(&format!("batch-{}.csv", batch), &TabularBuffer::from_rows(rows))
        }));
    }
    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.is_success(), "{}", response.body);
    }

    assert_eq!(titles(&dir).len(), 100);
}

#[test]
fn same_upload_reaches_each_target_table() {
    let dir = TempDir::new().unwrap();
    let buffer = TabularBuffer::from_rows(vec![RawRow::new()
        .with("Title", RawValue::Text("Cafe".into()))
        .with("Review", RawValue::Text("great".into()))]);

    let mut full = Config::default();
    full.database = descriptor(&dir);
    let first = IngestUseCase::from_config(&full).unwrap().handle("a.csv", &buffer);
    assert!(first.is_success(), "{}", first.body);

    let mut reduced = full.clone();
    reduced.pipeline.target = TargetKind::ReviewsReduced;
    reduced.pipeline.table = Some("restaurant_reviews".into());
    let second = IngestUseCase::from_config(&reduced).unwrap().handle("a.csv", &buffer);
    assert!(second.is_success(), "{}", second.body);
    assert_eq!(second.body["outcome"]["duplicate"], false);
    assert_eq!(second.body["outcome"]["rows_written"], 1);

    let conn = Connection::open(dir.path().join("reviews.db")).unwrap();
    let reduced_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM restaurant_reviews", [], |r| r.get(0))
        .unwrap();
    assert_eq!(reduced_rows, 1);
    assert_eq!(titles(&dir), vec!["Cafe"]);
}

#[test]
fn switching_target_over_an_existing_table_is_not_retryable() {
    let dir = TempDir::new().unwrap();
    let buffer = TabularBuffer::from_rows(vec![RawRow::new().with("Title", RawValue::Text("Cafe".into()))]);

    let mut full = Config::default();
    full.database = descriptor(&dir);
    assert!(IngestUseCase::from_config(&full).unwrap().handle("a.csv", &buffer).is_success());

    let mut reduced = full.clone();
    reduced.pipeline.target = TargetKind::ReviewsReduced;
    let response = IngestUseCase::from_config(&reduced).unwrap().handle("b.csv", &buffer);

    assert_eq!(response.status_code, 500);
    assert_eq!(response.body["outcome"]["retryable"], false);
    let message = response.body["message"].as_str().unwrap();
    assert!(message.contains("at stage persist"), "{}", message);
    assert!(message.contains("restaurant_name"), "{}", message);
}
