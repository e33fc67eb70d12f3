//! Dual-write versioned catalog for schema and state documents.
//!
//! Every stored document is written twice: once under a key derived from
//! its content hash and once under the mutable sentinel key `current`.
//! Point-in-time reads go through the hash key; "newest" reads go through
//! `current`. There is no compare-and-swap on `current` — whoever wrote it
//! last wins, and racing writers from independent processes can overwrite
//! each other's pointer while both hash-keyed copies stay retrievable.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use wharf_core::{Error, Result, StorageBackend};

/// Sentinel key resolving to the most recently written document.
pub(crate) const CURRENT_KEY: &str = "current";

/// Strips every character that is not a word character, making a content
/// hash (typically base64) safe to embed in an object path.
pub(crate) fn sanitize_version_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// One catalog table directory holding versioned documents.
///
/// Entries live at `{dir}/{name}__{sanitized_key}.jsonl`, where `name` is
/// the document's logical owner (schema name or pipeline name).
pub(crate) struct VersionedCatalog<'a> {
    storage: &'a dyn StorageBackend,
    dir: String,
}

impl<'a> VersionedCatalog<'a> {
    pub(crate) fn new(storage: &'a dyn StorageBackend, dir: String) -> Self {
        Self { storage, dir }
    }

    fn entry_path(&self, name: &str, key: &str) -> String {
        format!("{}/{}__{}.jsonl", self.dir, name, sanitize_version_key(key))
    }

    /// Writes a document under its hash key and under `current`.
    ///
    /// Writing the same document twice is idempotent: both copies end up
    /// byte-identical. If the table directory was never created the write
    /// is skipped, matching the "initialize first" contract without making
    /// unsolicited directories.
    pub(crate) async fn store<T: Serialize>(
        &self,
        name: &str,
        version_hash: &str,
        document: &T,
    ) -> Result<()> {
        let body = serde_json::to_string(document)?;
        self.write_entry(&self.entry_path(name, version_hash), &body)
            .await?;
        self.write_entry(&self.entry_path(name, CURRENT_KEY), &body)
            .await
    }

    async fn write_entry(&self, path: &str, body: &str) -> Result<()> {
        if !self.storage.is_dir(&self.dir).await? {
            warn!(dir = %self.dir, path = %path, "catalog directory missing, skipping write");
            return Ok(());
        }
        debug!(path = %path, "writing catalog entry");
        self.storage.write_text(path, body).await
    }

    /// Reads the document stored under `key`, or under `current` for the
    /// newest one.
    ///
    /// Returns `Ok(None)` when no entry with this key exists yet. A missing
    /// table *directory* is reported as [`Error::NotInitialized`] instead,
    /// distinguishing "catalog not set up" from "no such version".
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<T>> {
        if !self.storage.is_dir(&self.dir).await? {
            return Err(Error::NotInitialized {
                dir: self.dir.clone(),
            });
        }
        let path = self.entry_path(name, key);
        if !self.storage.exists(&path).await? {
            return Ok(None);
        }
        let body = self.storage.read_text(&path).await?;
        Ok(Some(serde_json::from_str(&body)?))
    }
}
