use hubsync::error::ErrorKind;
use hubsync::failpoints::{MERGE_AFTER_DOWNLOAD_FP, PUBLISH_BEFORE_UPLOAD_FP};
use hubsync::flows::{rebuild_dataset, sync_dataset};
use hubsync::publisher::SnapshotDeletion;
use hubsync::repository::memory::MemoryRepository;
use hubsync::snapshot::encode_parquet;
use hubsync::table::Table;
use hubsync::test_utils::failpoints::CustomFailScenario;
use hubsync::test_utils::observation::{observation, put_observation};
use hubsync_config::shared::{DatasetConfig, RebuildConfig, SyncConfig};
use hubsync_telemetry::tracing::init_test_tracing;
use serde_json::Value;

fn dataset() -> DatasetConfig {
    DatasetConfig::new("org/observations")
}

fn creating() -> SyncConfig {
    SyncConfig {
        create_if_missing: true,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn sync_fails_when_push_fails() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(PUBLISH_BEFORE_UPLOAD_FP, "return")]);
    let repository = MemoryRepository::new("org/observations");
    put_observation(&repository, &observation("h1", "orca")).await;
    let commits = repository.commits().await.len();

    let err = sync_dataset(&repository, &dataset(), &creating())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteError);
    assert_eq!(repository.commits().await.len(), commits);
}

#[tokio::test]
async fn rebuild_push_failure_leaves_snapshot_deleted() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(PUBLISH_BEFORE_UPLOAD_FP, "return(conflict)")]);
    let repository = MemoryRepository::new("org/observations");
    let mut table = Table::empty("train");
    if let Value::Object(row) = observation("h1", "orca") {
        table.append_row(row);
    }
    repository
        .put_file(dataset().snapshot_path, encode_parquet(&table).unwrap())
        .await;
    put_observation(&repository, &observation("h1", "orca")).await;

    let err = rebuild_dataset(
        &repository,
        &dataset(),
        &SyncConfig::default(),
        &RebuildConfig::default(),
        false,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CommitConflict);
    assert!(repository.file(&dataset().snapshot_path).await.is_none());
}

#[tokio::test]
async fn merge_failure_aborts_before_publishing() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(MERGE_AFTER_DOWNLOAD_FP, "1*off->return(io)")]);
    let repository = MemoryRepository::new("org/observations");
    put_observation(&repository, &observation("h1", "orca")).await;
    put_observation(&repository, &observation("h2", "humpback")).await;

    let err = sync_dataset(&repository, &dataset(), &creating())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IoError);
    assert!(repository.file(&dataset().snapshot_path).await.is_none());
}

#[tokio::test]
async fn dry_run_never_reaches_the_publisher() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(PUBLISH_BEFORE_UPLOAD_FP, "panic")]);
    let repository = MemoryRepository::new("org/observations");
    put_observation(&repository, &observation("h1", "orca")).await;

    let report = rebuild_dataset(
        &repository,
        &dataset(),
        &SyncConfig::default(),
        &RebuildConfig::default(),
        true,
    )
    .await
    .unwrap();

    assert_eq!(report.deletion, SnapshotDeletion::Skipped);
    assert_eq!(report.table.len(), 1);
}
