mod support;

use mergeflow::dialect::Dialect;
use mergeflow::insert::InsertOptions;
use mergeflow::session::memory::{MemoryEngine, RecordedKind};
use mergeflow::session::{SessionProvider, SharedSession};
use mergeflow::{LoadError, Loader};

use support::{init_test_tracing, orders_dataset, orders_introspector, orders_table};

fn insert_options(chunk_size: usize) -> InsertOptions {
    let mut options = InsertOptions::default();
    options.load.chunk_size = chunk_size;
    options
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_writes_each_partition_through_its_own_session() {
    init_test_tracing();

    let engine = MemoryEngine::new(Dialect::Postgres);
    let mut loader = Loader::new(engine.clone(), orders_introspector());
    loader.load_dataset(orders_dataset(12));

    let report = loader
        .insert(&orders_table(), &insert_options(5))
        .await
        .unwrap();

    assert_eq!(report.partitions, 3);
    assert_eq!(report.rows_written, 12);

    let sql_log = engine.sql_log().await;
    assert_eq!(sql_log.len(), 3);
    for sql in &sql_log {
        assert_eq!(sql, "INSERT INTO orders (id, status) VALUES ($1, $2)");
    }

    // Each partition session commits its own work.
    assert_eq!(engine.commit_count().await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_refresh_truncates_and_commits_before_any_partition() {
    init_test_tracing();

    let engine = MemoryEngine::new(Dialect::Postgres);
    let mut loader = Loader::new(engine.clone(), orders_introspector());
    loader.load_dataset(orders_dataset(12));

    let mut options = insert_options(5);
    options.full_refresh = true;
    loader.insert(&orders_table(), &options).await.unwrap();

    let statements = engine.statements().await;
    assert_eq!(statements[0].sql, "DELETE FROM orders");
    assert_eq!(statements[1].kind, RecordedKind::Commit);

    // No partition insert may precede the committed truncation.
    let first_insert = statements
        .iter()
        .position(|entry| matches!(entry.kind, RecordedKind::ExecuteMany { .. }))
        .unwrap();
    assert!(first_insert >= 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn partition_failure_is_aggregated_and_siblings_survive() {
    init_test_tracing();

    let engine = MemoryEngine::new(Dialect::Postgres);
    engine.fail_on_rows(2).await;

    let mut loader = Loader::new(engine.clone(), orders_introspector());
    loader.load_dataset(orders_dataset(12));

    let error = loader
        .insert(&orders_table(), &insert_options(5))
        .await
        .unwrap_err();

    match error {
        LoadError::PartitionFailures { total, failures } => {
            assert_eq!(total, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 2);
            assert_eq!(failures[0].rows, 2);
        }
        other => panic!("expected partition failures, got {other}"),
    }

    // The two full partitions were still written.
    assert_eq!(engine.sql_log().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_session_insert_leaves_commit_to_the_owner() {
    init_test_tracing();

    let engine = MemoryEngine::new(Dialect::Postgres);
    let mut loader = Loader::new(engine.clone(), orders_introspector());
    loader.load_dataset(orders_dataset(4));

    let shared = SharedSession::new(engine.acquire().await.unwrap());
    let report = loader
        .insert_with_session(&shared, &orders_table(), &insert_options(2))
        .await
        .unwrap();

    assert_eq!(report.partitions, 2);
    assert_eq!(engine.commit_count().await, 0);

    shared.commit().await.unwrap();
    assert_eq!(engine.commit_count().await, 1);
}

#[tokio::test]
async fn insert_without_a_dataset_is_invalid() {
    init_test_tracing();

    let engine = MemoryEngine::new(Dialect::Postgres);
    let loader = Loader::new(engine, orders_introspector());

    let error = loader
        .insert(&orders_table(), &InsertOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error, LoadError::InvalidArgument(_)));
}
