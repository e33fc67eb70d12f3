//! Storage backend abstraction for dataset destinations (object store, local).
//!
//! This module defines the filesystem-style contract the destination client
//! drives. The contract is deliberately small and mirrors what real object
//! stores can promise:
//!
//! - Directory listings may be served from a cache; callers that need fresh
//!   results must pass `refresh = true`.
//! - Single-object delete is a *capability*, probed via
//!   [`StorageBackend::supports_delete_file`] rather than discovered through
//!   errors. Backends without it are driven through [`StorageBackend::remove`]
//!   plus an explicit existence re-check by the caller.
//! - Directories may be explicit (created via `make_dirs`) or implicit
//!   (prefixes of stored object keys), matching object-store emulation of
//!   directory trees.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Storage backend trait for dataset destinations.
///
/// All paths are `/`-separated keys relative to the backend root. Keys never
/// start or end with `/`; the empty string denotes the root.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Returns `true` if an object or directory exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Returns `true` if `path` is a directory (explicit or implied by
    /// deeper object keys).
    async fn is_dir(&self, path: &str) -> Result<bool>;

    /// Lists the immediate children of `dir` as full keys, sorted.
    ///
    /// With `refresh = false` the backend may serve a cached listing; with
    /// `refresh = true` it must bypass and repopulate any cache. Callers that
    /// act on the listing (truncation) must force a refresh.
    ///
    /// Returns `Error::NotFound` if `dir` does not exist.
    async fn list(&self, dir: &str, refresh: bool) -> Result<Vec<String>>;

    /// Creates `path` and any missing ancestors as directories (idempotent).
    async fn make_dirs(&self, path: &str) -> Result<()>;

    /// Uploads one local file to `remote`, creating missing parent
    /// directories on backends that have real directories.
    async fn put_file(&self, local: &Path, remote: &str) -> Result<()>;

    /// Writes `content` as a UTF-8 object at `path`, replacing any
    /// existing object.
    async fn write_text(&self, path: &str, content: &str) -> Result<()>;

    /// Reads the object at `path` as UTF-8 text.
    ///
    /// Returns `Error::NotFound` if the object does not exist.
    async fn read_text(&self, path: &str) -> Result<String>;

    /// Returns `true` if the backend implements [`StorageBackend::delete_file`].
    ///
    /// Callers must probe this instead of treating delete errors as a
    /// missing capability.
    fn supports_delete_file(&self) -> bool;

    /// Deletes a single object, erroring if it does not exist.
    ///
    /// Only meaningful when [`StorageBackend::supports_delete_file`] returns
    /// `true`; other backends return a storage error unconditionally.
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Removes an object, or a directory tree when `recursive` is set.
    ///
    /// Bulk-delete implementations of this primitive may silently skip
    /// objects on some backends, so callers that depend on the removal must
    /// re-check existence afterwards.
    async fn remove(&self, path: &str, recursive: bool) -> Result<()>;

    /// Creates a zero-byte marker object at `path`.
    async fn touch(&self, path: &str) -> Result<()>;
}

/// Validates a storage key for use against a backend rooted at a real
/// filesystem path.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for absolute paths, backslashes, `..`
/// segments, and control characters.
pub fn validate_key(path: &str) -> Result<()> {
    if path.starts_with('/') {
        return Err(Error::InvalidInput(format!(
            "absolute paths not allowed: {path}"
        )));
    }

    if path.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "backslashes not allowed in paths: {path}"
        )));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(Error::InvalidInput(format!(
            "path traversal not allowed: {path}"
        )));
    }

    if path.contains('\n') || path.contains('\r') || path.contains('\0') {
        return Err(Error::InvalidInput(format!(
            "control characters not allowed in paths: {path}"
        )));
    }

    Ok(())
}

/// Strips any trailing separators; the empty string denotes the root.
fn norm(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
///
/// Listings are cached per directory and only repopulated by `refresh = true`
/// (or by the first listing of a directory). Writes and deletes do *not*
/// invalidate the cache, which models the stale-listing behavior of real
/// object stores and makes forced-refresh code paths testable.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, Bytes>,
    dirs: BTreeSet<String>,
    listings: HashMap<String, Vec<String>>,
}

impl MemoryState {
    fn is_dir(&self, path: &str) -> bool {
        let p = norm(path);
        if p.is_empty() {
            return true;
        }
        if self.dirs.contains(p) {
            return true;
        }
        let prefix = format!("{p}/");
        self.objects.keys().any(|k| k.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }

    fn children(&self, dir: &str) -> Vec<String> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        let mut children = BTreeSet::new();
        for key in self.objects.keys().chain(self.dirs.iter()) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.split_once('/') {
                // Immediate child (object or explicit directory).
                None => children.insert(key.clone()),
                // Deeper key implies an intermediate child directory.
                Some((first, _)) => children.insert(format!("{prefix}{first}")),
            };
        }
        children.into_iter().collect()
    }
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn exists(&self, path: &str) -> Result<bool> {
        let state = self.read_state()?;
        let p = norm(path);
        Ok(state.objects.contains_key(p) || state.is_dir(p))
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.read_state()?.is_dir(path))
    }

    async fn list(&self, dir: &str, refresh: bool) -> Result<Vec<String>> {
        let p = norm(dir).to_string();
        let mut state = self.write_state()?;

        if !refresh {
            if let Some(cached) = state.listings.get(&p) {
                return Ok(cached.clone());
            }
        }

        if !state.is_dir(&p) {
            return Err(Error::NotFound(format!("directory not found: {p}")));
        }

        let entries = state.children(&p);
        state.listings.insert(p, entries.clone());
        Ok(entries)
    }

    async fn make_dirs(&self, path: &str) -> Result<()> {
        let mut state = self.write_state()?;
        let mut cur = norm(path);
        while !cur.is_empty() {
            state.dirs.insert(cur.to_string());
            match cur.rsplit_once('/') {
                Some((parent, _)) => cur = parent,
                None => break,
            }
        }
        Ok(())
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<()> {
        let data = tokio::fs::read(local).await.map_err(|e| {
            Error::storage_with_source(format!("failed to read local file {}", local.display()), e)
        })?;
        self.write_state()?
            .objects
            .insert(norm(remote).to_string(), Bytes::from(data));
        Ok(())
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        self.write_state()?
            .objects
            .insert(norm(path).to_string(), Bytes::from(content.to_string()));
        Ok(())
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let state = self.read_state()?;
        let p = norm(path);
        let data = state
            .objects
            .get(p)
            .ok_or_else(|| Error::NotFound(format!("object not found: {p}")))?;
        String::from_utf8(data.to_vec())
            .map_err(|_| Error::storage(format!("object is not valid UTF-8: {p}")))
    }

    fn supports_delete_file(&self) -> bool {
        true
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let mut state = self.write_state()?;
        let p = norm(path);
        if state.objects.remove(p).is_some() {
            return Ok(());
        }
        if state.is_dir(p) {
            return Err(Error::storage(format!(
                "cannot delete directory as file: {p}"
            )));
        }
        Err(Error::NotFound(format!("object not found: {p}")))
    }

    async fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        let mut state = self.write_state()?;
        let p = norm(path).to_string();

        if recursive {
            if state.objects.remove(&p).is_none() && !state.is_dir(&p) {
                return Err(Error::NotFound(format!("path not found: {p}")));
            }
            let prefix = format!("{p}/");
            state
                .objects
                .retain(|k, _| k != &p && !k.starts_with(&prefix));
            state.dirs.retain(|d| d != &p && !d.starts_with(&prefix));
            state
                .listings
                .retain(|d, _| d != &p && !d.starts_with(&prefix));
            return Ok(());
        }

        if state.objects.remove(&p).is_some() {
            return Ok(());
        }
        if state.is_dir(&p) {
            return Err(Error::storage(format!(
                "cannot remove directory without recursive: {p}"
            )));
        }
        Err(Error::NotFound(format!("path not found: {p}")))
    }

    async fn touch(&self, path: &str) -> Result<()> {
        self.write_state()?
            .objects
            .insert(norm(path).to_string(), Bytes::new());
        Ok(())
    }
}
