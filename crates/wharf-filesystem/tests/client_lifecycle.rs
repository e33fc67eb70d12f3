//! End-to-end lifecycle tests for the filesystem destination client.
//!
//! # Invariants Tested
//!
//! 1. **Initialization**: table directories and sentinel markers exist
//!    afterwards and a current schema document is stored, idempotently
//! 2. **Truncation is prefix-exact**: objects of truncated tables vanish,
//!    neighboring tables survive, and table directories remain
//! 3. **Forced refresh**: truncation acts on fresh listings even when a
//!    cached listing is stale
//! 4. **Delete fallback**: backends without single-object delete truncate
//!    via remove plus a post-check, and silent removes fail loudly
//! 5. **Staging scope**: the dataset root is restored on every exit path,
//!    including error returns and panics

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use wharf_core::{Error, MemoryBackend, StorageBackend};
use wharf_filesystem::schema::{LOADS_TABLE, STATE_TABLE, VERSION_TABLE};
use wharf_filesystem::{
    ColumnSchema, DataType, FilesystemClient, FilesystemConfig, JobState, LoadRecord,
    PipelineStateDoc, Schema, TableSchema,
};
use wharf_test_utils::{NoDeleteFile, RecordingBackend, SilentRemove, StorageOp};

// ============================================================================
// Helpers
// ============================================================================

fn test_schema() -> Schema {
    Schema::new("s")
        .expect("valid schema name")
        .with_table(
            TableSchema::new("events")
                .expect("valid table name")
                .with_column(ColumnSchema::new("id", DataType::Bigint).not_null()),
        )
        .with_table(
            TableSchema::new("pages")
                .expect("valid table name")
                .with_column(ColumnSchema::new("url", DataType::Text)),
        )
}

fn test_client(backend: Arc<dyn StorageBackend>) -> FilesystemClient {
    let config = FilesystemConfig::new("memory://bucket", "ds");
    FilesystemClient::new(backend, config, test_schema()).expect("valid client")
}

fn staging_test_client(backend: Arc<dyn StorageBackend>) -> FilesystemClient {
    let config = FilesystemConfig::new("memory://bucket", "ds").staging();
    FilesystemClient::new(backend, config, test_schema()).expect("valid client")
}

fn truncate_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Creates a local job file the upload path can read.
fn job_file(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"{\"id\": 1}\n").expect("write job file");
    path
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn initialize_creates_directories_sentinels_and_schema() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());

    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    assert!(backend.is_dir("ds/events").await.expect("is_dir"));
    assert!(backend.is_dir("ds/pages").await.expect("is_dir"));
    for internal in ["_wharf_loads", "_wharf_schema_versions", "_wharf_pipeline_state"] {
        assert!(
            backend
                .exists(&format!("ds/{internal}/init"))
                .await
                .expect("exists"),
            "sentinel missing for {internal}"
        );
    }

    let stored = client
        .get_stored_schema()
        .await
        .expect("read schema")
        .expect("schema stored");
    assert_eq!(stored.schema_name, "s");
    assert_eq!(
        stored.version_hash,
        client.schema().version_hash().expect("hashable")
    );
    assert!(client.is_storage_initialized().await.expect("query"));
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());

    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("first initialize");
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("second initialize");

    assert!(backend.exists("ds/_wharf_loads/init").await.expect("exists"));
}

#[tokio::test]
async fn initialize_subset_creates_only_named_tables() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());

    let only = vec!["events".to_string()];
    client
        .initialize_storage(Some(&only), &BTreeSet::new())
        .await
        .expect("initialize");

    assert!(backend.is_dir("ds/events").await.expect("is_dir"));
    assert!(!backend.is_dir("ds/pages").await.expect("is_dir"));

    // The schema store is skipped because the versions directory was not
    // part of the subset, so reads report not-initialized.
    let err = client.get_stored_schema().await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized { .. }));
}

// ============================================================================
// Truncation
// ============================================================================

#[tokio::test]
async fn truncation_removes_only_prefixed_objects() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    backend.write_text("ds/events/l0.f1.0.jsonl", "{}").await.expect("seed");
    backend.write_text("ds/events/l0.f2.0.jsonl", "{}").await.expect("seed");
    backend.write_text("ds/pages/l0.f3.0.jsonl", "{}").await.expect("seed");

    client
        .initialize_storage(None, &truncate_set(&["events"]))
        .await
        .expect("initialize with truncate");

    assert!(!backend.exists("ds/events/l0.f1.0.jsonl").await.expect("exists"));
    assert!(!backend.exists("ds/events/l0.f2.0.jsonl").await.expect("exists"));
    assert!(backend.exists("ds/pages/l0.f3.0.jsonl").await.expect("exists"));

    // Truncation empties the directory without removing it.
    assert!(backend.is_dir("ds/events").await.expect("is_dir"));

    // A fresh current schema entry exists after the pass.
    assert!(client
        .get_stored_schema()
        .await
        .expect("read schema")
        .is_some());
}

#[tokio::test]
async fn truncation_tolerates_missing_directory() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());

    // Initialize only the internal tables so the dataset exists but the
    // events directory does not.
    let internal: Vec<String> = vec![
        LOADS_TABLE.to_string(),
        VERSION_TABLE.to_string(),
        STATE_TABLE.to_string(),
    ];
    client
        .initialize_storage(Some(&internal), &BTreeSet::new())
        .await
        .expect("initialize");

    client
        .initialize_storage(Some(&internal), &truncate_set(&["events"]))
        .await
        .expect("truncating a never-populated table is not an error");
}

#[tokio::test]
async fn truncation_bypasses_stale_listings() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    backend.write_text("ds/events/l0.f1.0.jsonl", "{}").await.expect("seed");

    // Prime the listing cache, then add an object behind its back.
    let primed = backend.list("ds/events", false).await.expect("list");
    assert!(primed.contains(&"ds/events/l0.f1.0.jsonl".to_string()));
    backend.write_text("ds/events/l0.f2.0.jsonl", "{}").await.expect("seed");
    let stale = backend.list("ds/events", false).await.expect("list");
    assert!(
        !stale.contains(&"ds/events/l0.f2.0.jsonl".to_string()),
        "cached listing must not see the new object"
    );

    client
        .initialize_storage(None, &truncate_set(&["events"]))
        .await
        .expect("initialize with truncate");

    assert!(!backend.exists("ds/events/l0.f1.0.jsonl").await.expect("exists"));
    assert!(
        !backend.exists("ds/events/l0.f2.0.jsonl").await.expect("exists"),
        "forced refresh must surface objects missing from the cache"
    );
}

#[tokio::test]
async fn truncation_preserves_the_init_sentinel() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    let state = PipelineStateDoc::new("pipe", 1, json!({"cursor": 1})).expect("state doc");
    client.store_state(&state).await.expect("store state");
    assert!(backend
        .exists("ds/_wharf_pipeline_state/pipe__current.jsonl")
        .await
        .expect("exists"));

    client
        .initialize_storage(None, &truncate_set(&[STATE_TABLE]))
        .await
        .expect("initialize with truncate");

    assert!(
        !backend
            .exists("ds/_wharf_pipeline_state/pipe__current.jsonl")
            .await
            .expect("exists"),
        "state documents are table data and must be truncated"
    );
    assert!(
        backend
            .exists("ds/_wharf_pipeline_state/init")
            .await
            .expect("exists"),
        "the sentinel marks initialization, not data"
    );
    let absent = client
        .get_stored_state("pipe")
        .await
        .expect("directory still initialized");
    assert!(absent.is_none());
}

#[tokio::test]
async fn truncation_descends_into_layout_subdirectories() {
    let backend = Arc::new(MemoryBackend::new());
    let config = FilesystemConfig::new("memory://bucket", "ds")
        .with_layout("{table_name}/{load_id}/{file_id}.{ext}");
    let client =
        FilesystemClient::new(backend.clone(), config, test_schema()).expect("valid client");
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    backend.write_text("ds/events/l0/f1.jsonl", "{}").await.expect("seed");
    backend.write_text("ds/events/l1/f2.jsonl", "{}").await.expect("seed");
    backend.write_text("ds/pages/l0/f3.jsonl", "{}").await.expect("seed");

    client
        .initialize_storage(None, &truncate_set(&["events"]))
        .await
        .expect("initialize with truncate");

    assert!(!backend.exists("ds/events/l0/f1.jsonl").await.expect("exists"));
    assert!(!backend.exists("ds/events/l1/f2.jsonl").await.expect("exists"));
    assert!(backend.exists("ds/pages/l0/f3.jsonl").await.expect("exists"));
}

#[tokio::test]
async fn truncation_falls_back_to_remove_without_delete_capability() {
    let backend = Arc::new(NoDeleteFile::new(RecordingBackend::new()));
    let client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    backend
        .inner()
        .write_text("ds/events/l0.f1.0.jsonl", "{}")
        .await
        .expect("seed");
    backend.inner().clear_operations();

    client
        .initialize_storage(None, &truncate_set(&["events"]))
        .await
        .expect("initialize with truncate");

    assert!(
        !backend
            .inner()
            .exists("ds/events/l0.f1.0.jsonl")
            .await
            .expect("exists"),
        "object must be gone despite the missing delete capability"
    );

    // The fallback is a non-recursive remove followed by an existence
    // re-check on the same path.
    let ops = backend.inner().operations();
    let removed = ops.iter().position(|op| {
        matches!(op, StorageOp::Remove { path, recursive: false } if path == "ds/events/l0.f1.0.jsonl")
    });
    let rechecked = ops.iter().position(|op| {
        matches!(op, StorageOp::Exists { path } if path == "ds/events/l0.f1.0.jsonl")
    });
    let removed = removed.expect("fallback remove recorded");
    let rechecked = rechecked.expect("existence re-check recorded");
    assert!(rechecked > removed, "re-check must follow the remove");
}

#[tokio::test]
async fn silent_remove_escalates_to_delete_incomplete() {
    let backend = Arc::new(SilentRemove::new(MemoryBackend::new()));
    backend.inner().make_dirs("ds/events").await.expect("mkdir");
    backend
        .inner()
        .write_text("ds/events/l0.f1.0.jsonl", "{}")
        .await
        .expect("seed");

    let client = test_client(backend.clone());
    let err = client
        .initialize_storage(None, &truncate_set(&["events"]))
        .await
        .unwrap_err();

    match err {
        Error::DeleteIncomplete { path } => assert_eq!(path, "ds/events/l0.f1.0.jsonl"),
        other => panic!("expected DeleteIncomplete, got {other:?}"),
    }
}

// ============================================================================
// Load jobs
// ============================================================================

#[tokio::test]
async fn upload_renders_layout_path_and_remote_url() {
    let backend = Arc::new(MemoryBackend::new());
    let config = FilesystemConfig::new("memory://bucket", "ds")
        .with_layout("{schema_name}/{table_name}/{load_id}.{file_id}.{ext}");
    let client =
        FilesystemClient::new(backend.clone(), config, test_schema()).expect("valid client");
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    let dir = tempfile::tempdir().expect("tempdir");
    let file = job_file(&dir, "events.f1.0.jsonl");

    let job = client
        .start_file_load("events", &file, "1700000000.101")
        .await
        .expect("upload");

    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.job_id(), "events.f1.0.jsonl");
    assert_eq!(
        job.remote_path(),
        Some("memory://bucket/ds/s/events/1700000000.101.f1.jsonl")
    );
    assert!(backend
        .exists("ds/s/events/1700000000.101.f1.jsonl")
        .await
        .expect("exists"));
}

#[tokio::test]
async fn state_table_files_are_absorbed_without_upload() {
    let backend = Arc::new(RecordingBackend::new());
    let client = test_client(backend.clone());

    let dir = tempfile::tempdir().expect("tempdir");
    let file = job_file(&dir, "_wharf_pipeline_state.f1.0.jsonl");

    let job = client
        .start_file_load(STATE_TABLE, &file, "1700000000.101")
        .await
        .expect("no-op job");

    assert_eq!(job.state(), JobState::Completed);
    assert!(job.remote_path().is_none());
    assert!(job.followup_jobs().is_empty());
    assert!(
        !backend
            .operations()
            .iter()
            .any(|op| matches!(op, StorageOp::PutFile { .. })),
        "state files must not be uploaded"
    );
}

#[tokio::test]
async fn staging_destination_also_absorbs_state_files() {
    let backend = Arc::new(RecordingBackend::new());
    let client = staging_test_client(backend.clone());

    let dir = tempfile::tempdir().expect("tempdir");
    let file = job_file(&dir, "_wharf_pipeline_state.f1.0.jsonl");

    let job = client
        .start_file_load(STATE_TABLE, &file, "l1")
        .await
        .expect("no-op job");

    assert_eq!(job.state(), JobState::Completed);
    assert!(job.remote_path().is_none());
    assert!(
        job.followup_jobs().is_empty(),
        "an absorbed file has no staged object to reference"
    );
    assert!(
        !backend
            .operations()
            .iter()
            .any(|op| matches!(op, StorageOp::PutFile { .. })),
        "state files must not be uploaded even by a staging destination"
    );
}

#[tokio::test]
async fn internal_table_uploads_bypass_the_layout() {
    let backend = Arc::new(MemoryBackend::new());
    let config = FilesystemConfig::new("memory://bucket", "ds")
        .with_layout("{schema_name}/{table_name}/{load_id}.{file_id}.{ext}");
    let client =
        FilesystemClient::new(backend.clone(), config, test_schema()).expect("valid client");
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    let dir = tempfile::tempdir().expect("tempdir");
    let file = job_file(&dir, "_wharf_loads.f9.0.jsonl");

    let job = client
        .start_file_load(LOADS_TABLE, &file, "l1")
        .await
        .expect("upload");

    assert_eq!(
        job.remote_path(),
        Some("memory://bucket/ds/_wharf_loads/l1.f9.jsonl")
    );
    assert!(backend
        .exists("ds/_wharf_loads/l1.f9.jsonl")
        .await
        .expect("exists"));
    assert!(
        !backend.is_dir("ds/s/_wharf_loads").await.expect("is_dir"),
        "internal tables live on plain table-name directories"
    );
}

#[tokio::test]
async fn followup_reference_jobs_only_for_staging_destinations() {
    let dir = tempfile::tempdir().expect("tempdir");

    let plain = test_client(Arc::new(MemoryBackend::new()));
    plain
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");
    let job = plain
        .start_file_load("events", &job_file(&dir, "events.f1.0.jsonl"), "l1")
        .await
        .expect("upload");
    assert!(job.followup_jobs().is_empty());

    let staging = staging_test_client(Arc::new(MemoryBackend::new()));
    staging
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");
    let job = staging
        .start_file_load("events", &job_file(&dir, "events.f2.0.jsonl"), "l1")
        .await
        .expect("upload");

    let followups = job.followup_jobs();
    assert_eq!(followups.len(), 1);
    assert_eq!(followups[0].file_name(), "events.f2.0.jsonl");
    assert_eq!(
        followups[0].remote_path(),
        "memory://bucket/ds/events/l1.f2.jsonl"
    );
    assert_eq!(followups[0].state(), JobState::Running);
}

#[tokio::test]
async fn mismatched_table_name_is_rejected() {
    let client = test_client(Arc::new(MemoryBackend::new()));
    let dir = tempfile::tempdir().expect("tempdir");
    let file = job_file(&dir, "events.f1.0.jsonl");

    let err = client
        .start_file_load("pages", &file, "l1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn restore_reports_completed_without_storage_access() {
    let client = test_client(Arc::new(MemoryBackend::new()));

    let job = client
        .restore_file_load(Path::new("events.f1.2.jsonl"))
        .expect("restore");
    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.file_name().retry_count, 2);
    assert!(job.remote_path().is_none());
    assert!(job.followup_jobs().is_empty());

    assert!(client.restore_file_load(Path::new("not-a-job-file")).is_err());
}

// ============================================================================
// Load completion
// ============================================================================

#[tokio::test]
async fn complete_load_appends_record_and_stores_state() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    let state =
        PipelineStateDoc::new("pipe", 3, json!({"cursor": 42})).expect("state doc");
    client
        .complete_load("1700000000.101", &state)
        .await
        .expect("complete load");

    let body = backend
        .read_text("ds/_wharf_loads/s.1700000000.101.jsonl")
        .await
        .expect("load record exists");
    let record: LoadRecord = serde_json::from_str(&body).expect("parse record");
    assert_eq!(record.load_id, "1700000000.101");
    assert_eq!(record.schema_name, "s");
    assert_eq!(record.status, 0);
    assert_eq!(
        record.schema_version_hash,
        client.schema().version_hash().expect("hashable")
    );

    let stored = client
        .get_stored_state("pipe")
        .await
        .expect("read state")
        .expect("state stored");
    assert_eq!(stored, state);
}

#[tokio::test]
async fn complete_load_before_initialization_writes_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());

    let state = PipelineStateDoc::new("pipe", 1, json!({"cursor": 1})).expect("state doc");
    client
        .complete_load("l1", &state)
        .await
        .expect("skipped writes are not errors");

    assert!(!backend.exists("ds/_wharf_loads/s.l1.jsonl").await.expect("exists"));
    assert!(!backend.is_dir("ds").await.expect("is_dir"));
}

// ============================================================================
// Staging dataset scope
// ============================================================================

#[tokio::test]
async fn staging_scope_writes_to_parallel_dataset() {
    let backend = Arc::new(MemoryBackend::new());
    let mut client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");

    {
        let scope = client.with_staging_dataset();
        assert_eq!(scope.dataset_path(), "ds_staging");
        scope
            .initialize_storage(None, &BTreeSet::new())
            .await
            .expect("initialize staging");
    }

    assert_eq!(client.dataset_path(), "ds");
    assert!(backend.is_dir("ds_staging/events").await.expect("is_dir"));
    assert!(backend
        .exists("ds_staging/_wharf_loads/init")
        .await
        .expect("exists"));
}

#[tokio::test]
async fn staging_scope_restores_dataset_after_error() {
    let backend = Arc::new(MemoryBackend::new());
    let mut client = test_client(backend.clone());

    let result = async {
        let scope = client.with_staging_dataset();
        // The staging dataset was never initialized, so this errors and
        // propagates out of the scope.
        scope.get_stored_schema().await?;
        Ok::<(), Error>(())
    }
    .await;

    assert!(matches!(result, Err(Error::NotInitialized { .. })));
    assert_eq!(client.dataset_path(), "ds");
}

#[test]
fn staging_scope_restores_dataset_after_panic() {
    let mut client = test_client(Arc::new(MemoryBackend::new()));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _scope = client.with_staging_dataset();
        panic!("scope interrupted");
    }));

    assert!(result.is_err());
    assert_eq!(client.dataset_path(), "ds");
}

// ============================================================================
// Drop
// ============================================================================

#[tokio::test]
async fn drop_storage_removes_dataset_root() {
    let backend = Arc::new(MemoryBackend::new());
    let client = test_client(backend.clone());
    client
        .initialize_storage(None, &BTreeSet::new())
        .await
        .expect("initialize");
    assert!(client.is_storage_initialized().await.expect("query"));

    client.drop_storage().await.expect("drop");

    assert!(!client.is_storage_initialized().await.expect("query"));
    assert!(!backend.exists("ds/_wharf_loads/init").await.expect("exists"));

    // Dropping an absent dataset is a no-op.
    client.drop_storage().await.expect("second drop");
}
