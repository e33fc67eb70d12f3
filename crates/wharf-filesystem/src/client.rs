//! Filesystem destination client.
//!
//! [`FilesystemClient`] owns one dataset root on a storage backend and
//! exposes the surface an external orchestrator drives: storage
//! initialization with per-table truncation, synchronous load jobs,
//! followup reference jobs, load-completion bookkeeping, and the versioned
//! schema and state catalog.
//!
//! The client performs no internal parallelism and never retries. It is a
//! passive object: the orchestrator may dispatch several load jobs
//! concurrently, and those never collide because every rendered destination
//! path carries a unique file id. Catalog writes and truncation, however,
//! assume a single active loader process per dataset.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wharf_core::{DatasetName, Error, Result, StorageBackend};

use crate::catalog::{CURRENT_KEY, VersionedCatalog};
use crate::config::FilesystemConfig;
use crate::jobs::{LoadJob, ParsedJobFileName};
use crate::layout::Layout;
use crate::schema::{
    LOADS_TABLE, STATE_TABLE, Schema, StoredSchemaInfo, VERSION_TABLE, is_internal_table,
};
use crate::state::PipelineStateDoc;

/// Marker object created in internal table directories at initialization.
const INIT_SENTINEL: &str = "init";

/// Suffix appended to the dataset name inside a staging scope.
const STAGING_SUFFIX: &str = "_staging";

/// One append-only row recording a completed load batch.
///
/// Written at `{loads_table}/{schema_name}.{load_id}.jsonl` by
/// [`FilesystemClient::complete_load`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRecord {
    /// Load batch id assigned by the orchestrator.
    pub load_id: String,
    /// Schema the batch was loaded under.
    pub schema_name: String,
    /// Always zero: the batch reached the destination.
    pub status: u32,
    /// Completion timestamp.
    pub inserted_at: DateTime<Utc>,
    /// Hash of the schema document active at completion.
    pub schema_version_hash: String,
}

/// Destination client owning one dataset root on a storage backend.
///
/// Construction validates the layout template and normalizes the dataset
/// name; both are fatal configuration errors when invalid. The client holds
/// the backend handle for its whole lifetime and owns the dataset root path
/// exclusively while alive.
pub struct FilesystemClient {
    storage: Arc<dyn StorageBackend>,
    config: FilesystemConfig,
    schema: Schema,
    layout: Layout,
    dataset: DatasetName,
}

impl FilesystemClient {
    /// Creates a client for one dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] if the configured layout template
    /// is invalid, or [`Error::InvalidInput`] if the dataset name is empty.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        config: FilesystemConfig,
        schema: Schema,
    ) -> Result<Self> {
        let layout = Layout::parse(&config.layout)?;
        let dataset = DatasetName::new(&config.dataset_name)?;
        Ok(Self {
            storage,
            config,
            schema,
            layout,
            dataset,
        })
    }

    /// Returns the active dataset root key.
    ///
    /// Inside a staging scope this is the staging dataset.
    #[must_use]
    pub fn dataset_path(&self) -> &str {
        self.dataset.as_str()
    }

    /// Returns the schema this client loads for.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the destination configuration.
    #[must_use]
    pub fn config(&self) -> &FilesystemConfig {
        &self.config
    }

    /// Returns the protocol-qualified URL for an object key.
    #[must_use]
    pub fn make_remote_url(&self, key: &str) -> String {
        format!(
            "{}://{}",
            self.config.protocol(),
            join_key(self.config.bucket_path(), key)
        )
    }

    /// Returns `true` once the dataset root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    pub async fn is_storage_initialized(&self) -> Result<bool> {
        self.storage.is_dir(self.dataset.as_str()).await
    }

    /// Deletes the dataset root and everything under it.
    ///
    /// A dataset that was never initialized is left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the recursive remove fails.
    pub async fn drop_storage(&self) -> Result<()> {
        if self.is_storage_initialized().await? {
            tracing::info!(dataset = %self.dataset, "dropping dataset");
            self.storage.remove(self.dataset.as_str(), true).await?;
        }
        Ok(())
    }

    /// Prepares the dataset for a load batch.
    ///
    /// Creates the directory of every named table (all schema tables when
    /// `only_tables` is `None`), seeds a sentinel marker in internal table
    /// directories, deletes the existing objects of every table in
    /// `truncate_tables`, and finally stores the current schema document —
    /// unconditionally, whether or not anything was truncated.
    ///
    /// Truncation never removes a table directory, only its contents, and a
    /// directory that does not exist yet simply has nothing to truncate.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend operation fails or an object survives
    /// deletion ([`Error::DeleteIncomplete`]).
    pub async fn initialize_storage(
        &self,
        only_tables: Option<&[String]>,
        truncate_tables: &BTreeSet<String>,
    ) -> Result<()> {
        let table_names: Vec<String> = match only_tables {
            Some(names) => names.to_vec(),
            None => self.schema.table_names(),
        };

        tracing::info!(
            dataset = %self.dataset,
            tables = table_names.len(),
            truncate = truncate_tables.len(),
            "initializing storage"
        );

        for table_name in &table_names {
            let dir = self.table_dir(table_name);
            self.storage.make_dirs(&dir).await?;
            if is_internal_table(table_name) {
                self.storage.touch(&join_key(&dir, INIT_SENTINEL)).await?;
            }
        }

        if !truncate_tables.is_empty() && self.is_storage_initialized().await? {
            self.truncate_table_objects(truncate_tables).await?;
        }

        self.store_current_schema().await
    }

    /// Deletes every object whose path starts with a truncated table's
    /// prefix.
    ///
    /// Directories are descended into, never deleted, so the table directory
    /// and any layout subdirectories survive truncation. The initialization
    /// sentinel also survives: it marks the directory as set up, not data.
    async fn truncate_table_objects(&self, truncate_tables: &BTreeSet<String>) -> Result<()> {
        // Several tables can share one directory under flat layouts, so
        // prefixes and directories are collected separately and every listed
        // item is checked against all prefixes.
        let mut prefixes: BTreeMap<String, String> = BTreeMap::new();
        let mut pending: Vec<String> = Vec::new();
        for table_name in truncate_tables {
            let prefix = join_key(self.dataset.as_str(), &self.table_prefix_rel(table_name));
            prefixes.insert(prefix, table_name.clone());
            let dir = self.table_dir(table_name);
            if !pending.contains(&dir) {
                pending.push(dir);
            }
        }

        let mut deleted: BTreeMap<String, u64> = BTreeMap::new();
        while let Some(dir) = pending.pop() {
            // The listing must bypass any cache: a stale listing would miss
            // objects to delete or resurrect already-deleted ones.
            let items = match self.storage.list(&dir, true).await {
                Ok(items) => items,
                Err(err) if err.is_not_found() => {
                    tracing::info!(dir = %dir, "nothing to truncate, directory does not exist");
                    continue;
                }
                Err(err) => return Err(err),
            };

            for item in items {
                let matched = prefixes.iter().find_map(|(prefix, table)| {
                    item.starts_with(prefix.as_str()).then_some(table.as_str())
                });
                let Some(table) = matched else { continue };
                if item.rsplit('/').next() == Some(INIT_SENTINEL) {
                    continue;
                }
                if self.storage.is_dir(&item).await? {
                    pending.push(item);
                    continue;
                }
                let table = table.to_string();
                self.delete_object(&item).await?;
                *deleted.entry(table).or_default() += 1;
            }
        }

        for (table, count) in &deleted {
            tracing::info!(table = %table, objects = count, "truncated table objects");
            crate::metrics::record_truncation(table, *count);
        }
        Ok(())
    }

    /// Deletes one object, preferring the single-object delete primitive.
    ///
    /// Backends without that capability are driven through the generic
    /// remove followed by an existence re-check: bulk-delete fallbacks can
    /// silently skip objects, and an object that survives its delete must
    /// fail loudly instead of leaving a half-truncated table behind.
    async fn delete_object(&self, path: &str) -> Result<()> {
        if self.storage.supports_delete_file() {
            self.storage.delete_file(path).await
        } else {
            crate::metrics::record_fallback_delete();
            self.storage.remove(path, false).await?;
            if self.storage.exists(path).await? {
                return Err(Error::DeleteIncomplete {
                    path: path.to_string(),
                });
            }
            Ok(())
        }
    }

    /// Uploads one data file and returns its terminal job.
    ///
    /// The upload is synchronous: on return the job is already completed
    /// and the object exists at its rendered destination path. Files for
    /// the internal state table are always absorbed without an upload:
    /// the state snapshot reaches storage through
    /// [`FilesystemClient::complete_load`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed job file name or a
    /// table mismatch; upload failures propagate untouched for the
    /// orchestrator's retry policy.
    pub async fn start_file_load(
        &self,
        table_name: &str,
        file_path: &Path,
        load_id: &str,
    ) -> Result<LoadJob> {
        let file_name = job_file_name(file_path)?;
        let parsed = ParsedJobFileName::parse(file_name)?;
        if parsed.table_name != table_name {
            return Err(Error::InvalidInput(format!(
                "job file {file_name:?} belongs to table {:?}, not {table_name:?}",
                parsed.table_name
            )));
        }

        if table_name == STATE_TABLE {
            tracing::debug!(file = %file_name, "state table file absorbed without upload");
            return Ok(LoadJob::no_op(parsed));
        }

        let rel_path = if is_internal_table(table_name) {
            // Internal tables bypass the layout but keep the same file
            // shape, preserving the prefix invariant truncation relies on.
            format!("{table_name}/{load_id}.{}.{}", parsed.file_id, parsed.ext)
        } else {
            self.layout.render(
                &self.schema.name,
                &parsed.table_name,
                load_id,
                &parsed.file_id,
                &parsed.ext,
            )
        };
        let dest = join_key(self.dataset.as_str(), &rel_path);

        let start = Instant::now();
        self.storage.put_file(file_path, &dest).await?;
        let duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            dataset = %self.dataset,
            table = %table_name,
            load_id = %load_id,
            path = %dest,
            duration_secs,
            "uploaded data file"
        );
        crate::metrics::record_file_uploaded(table_name, duration_secs);

        let remote_path = self.make_remote_url(&dest);
        Ok(LoadJob::uploaded(parsed, remote_path, self.config.as_staging))
    }

    /// Rehydrates a job for a file uploaded by a prior process run.
    ///
    /// The returned job always reports completed: the upload either
    /// finished before the restart, or the orchestrator re-dispatches the
    /// file as a fresh load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed job file name.
    pub fn restore_file_load(&self, file_path: &Path) -> Result<LoadJob> {
        let parsed = ParsedJobFileName::parse(job_file_name(file_path)?)?;
        Ok(LoadJob::restored(parsed))
    }

    /// Completes a load batch: stores the pipeline-state snapshot and
    /// appends the load record.
    ///
    /// # Errors
    ///
    /// Returns an error if the state or record cannot be serialized or
    /// written.
    pub async fn complete_load(&self, load_id: &str, state: &PipelineStateDoc) -> Result<()> {
        self.store_state(state).await?;

        let record = LoadRecord {
            load_id: load_id.to_string(),
            schema_name: self.schema.name.clone(),
            status: 0,
            inserted_at: Utc::now(),
            schema_version_hash: self.schema.version_hash()?,
        };
        let path = join_key(
            &self.table_dir(LOADS_TABLE),
            &format!("{}.{load_id}.jsonl", self.schema.name),
        );
        self.write_json_guarded(&path, &record).await?;

        tracing::info!(dataset = %self.dataset, load_id = %load_id, "completed load");
        crate::metrics::record_load_completed(&self.schema.name);
        Ok(())
    }

    /// Writes the current schema document to the version catalog, once
    /// under its content hash and once under `current`.
    ///
    /// Idempotent for an unchanged schema; safe to call on every
    /// initialization pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be serialized or written.
    pub async fn store_current_schema(&self) -> Result<()> {
        let info = StoredSchemaInfo::for_schema(&self.schema)?;
        self.catalog(VERSION_TABLE)
            .store(&self.schema.name, &info.version_hash, &info)
            .await?;
        crate::metrics::record_catalog_write("schema");
        tracing::debug!(
            schema = %self.schema.name,
            version_hash = %info.version_hash,
            "stored current schema"
        );
        Ok(())
    }

    /// Returns the most recently stored schema document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the schema-versions directory
    /// was never created.
    pub async fn get_stored_schema(&self) -> Result<Option<StoredSchemaInfo>> {
        self.get_stored_schema_by_hash(CURRENT_KEY).await
    }

    /// Returns the schema document stored under a version hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the schema-versions directory
    /// was never created. An unknown hash is `Ok(None)`, not an error.
    pub async fn get_stored_schema_by_hash(
        &self,
        version_hash: &str,
    ) -> Result<Option<StoredSchemaInfo>> {
        self.catalog(VERSION_TABLE)
            .get(&self.schema.name, version_hash)
            .await
    }

    /// Writes a pipeline-state document to the state catalog, once under
    /// the content hash of its body and once under `current`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub async fn store_state(&self, state: &PipelineStateDoc) -> Result<()> {
        self.catalog(STATE_TABLE)
            .store(&state.pipeline_name, &state.version_hash, state)
            .await?;
        crate::metrics::record_catalog_write("state");
        tracing::debug!(
            pipeline = %state.pipeline_name,
            version_hash = %state.version_hash,
            "stored pipeline state"
        );
        Ok(())
    }

    /// Returns the most recently stored state for a pipeline, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the state directory was never
    /// created.
    pub async fn get_stored_state(&self, pipeline_name: &str) -> Result<Option<PipelineStateDoc>> {
        self.catalog(STATE_TABLE).get(pipeline_name, CURRENT_KEY).await
    }

    /// Redirects all operations to the parallel staging dataset for the
    /// lifetime of the returned scope.
    ///
    /// The staging name is the dataset name with a fixed suffix, folded
    /// through the usual identifier normalization. The original root is
    /// restored when the scope drops, no matter how the scope is exited.
    /// Scopes nest through deref, each appending another suffix; the borrow
    /// chain drops them in reverse order, so every scope restores exactly
    /// the root it replaced.
    pub fn with_staging_dataset(&mut self) -> StagingScope<'_> {
        let staging = self.dataset.with_suffix(STAGING_SUFFIX);
        tracing::debug!(dataset = %self.dataset, staging = %staging, "entering staging dataset scope");
        let saved = mem::replace(&mut self.dataset, staging);
        StagingScope {
            client: self,
            saved: Some(saved),
        }
    }

    fn catalog(&self, table_name: &str) -> VersionedCatalog<'_> {
        VersionedCatalog::new(self.storage.as_ref(), self.table_dir(table_name))
    }

    /// Prefix shared by every object of `table_name`, relative to the
    /// dataset root.
    fn table_prefix_rel(&self, table_name: &str) -> String {
        if is_internal_table(table_name) {
            format!("{table_name}/")
        } else {
            self.layout.table_prefix(&self.schema.name, table_name)
        }
    }

    /// Directory holding `table_name`'s objects, as an absolute key.
    fn table_dir(&self, table_name: &str) -> String {
        let rel = if is_internal_table(table_name) {
            table_name.to_string()
        } else {
            self.layout.table_dir(&self.schema.name, table_name)
        };
        join_key(self.dataset.as_str(), &rel)
    }

    /// Writes a JSON document, skipping silently when the parent directory
    /// was never created.
    async fn write_json_guarded<T: Serialize>(&self, path: &str, document: &T) -> Result<()> {
        let dir = path.rsplit_once('/').map_or("", |(dir, _)| dir);
        if !self.storage.is_dir(dir).await? {
            tracing::warn!(dir = %dir, path = %path, "directory missing, skipping write");
            return Ok(());
        }
        self.storage
            .write_text(path, &serde_json::to_string(document)?)
            .await
    }
}

/// Scope guard redirecting a client to its staging dataset.
///
/// Returned by [`FilesystemClient::with_staging_dataset`]. Dereferences to
/// the client, so the scope is used exactly like the client itself.
pub struct StagingScope<'a> {
    client: &'a mut FilesystemClient,
    saved: Option<DatasetName>,
}

impl Drop for StagingScope<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            tracing::debug!(dataset = %saved, "restoring dataset after staging scope");
            self.client.dataset = saved;
        }
    }
}

impl Deref for StagingScope<'_> {
    type Target = FilesystemClient;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}

impl DerefMut for StagingScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
    }
}

/// Joins two key fragments with a single separator; either side may be
/// empty.
fn join_key(base: &str, rel: &str) -> String {
    match (base.is_empty(), rel.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => rel.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

/// Extracts the UTF-8 file name of a job file path.
fn job_file_name(file_path: &Path) -> Result<&str> {
    file_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "job file path has no UTF-8 file name: {}",
                file_path.display()
            ))
        })
}
