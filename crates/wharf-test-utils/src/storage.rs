//! Test storage implementations with operation recording.
//!
//! Provides an in-memory backend that records all operations for test
//! assertions, plus wrappers that strip or corrupt the delete capability to
//! exercise the truncation fallback chain.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wharf_core::error::{Error, Result};
use wharf_core::storage::{MemoryBackend, StorageBackend};

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone)]
pub enum StorageOp {
    /// Existence check.
    Exists {
        /// Path that was checked.
        path: String,
    },
    /// Directory check.
    IsDir {
        /// Path that was checked.
        path: String,
    },
    /// Directory listing.
    List {
        /// Directory that was listed.
        dir: String,
        /// Whether the listing bypassed the cache.
        refresh: bool,
    },
    /// Directory creation.
    MakeDirs {
        /// Path that was created.
        path: String,
    },
    /// File upload.
    PutFile {
        /// Local source path.
        local: String,
        /// Remote destination key.
        remote: String,
    },
    /// Text write.
    WriteText {
        /// Path that was written.
        path: String,
    },
    /// Text read.
    ReadText {
        /// Path that was read.
        path: String,
    },
    /// Single-object delete.
    DeleteFile {
        /// Path that was deleted.
        path: String,
    },
    /// Generic remove.
    Remove {
        /// Path that was removed.
        path: String,
        /// Whether the removal was recursive.
        recursive: bool,
    },
    /// Marker-object creation.
    Touch {
        /// Path that was touched.
        path: String,
    },
}

/// In-memory storage backend with operation recording.
///
/// Records all operations for later assertion in tests and can inject
/// failures for paths matching a prefix.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_prefixes: Arc<Mutex<Vec<String>>>,
}

impl RecordingBackend {
    /// Creates a new empty recording backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock poisoned").clone()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock poisoned").clear();
    }

    /// Injects a failure for the given path prefix.
    pub fn inject_failure(&self, prefix: impl Into<String>) {
        self.fail_prefixes.lock().expect("lock poisoned").push(prefix.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_prefixes.lock().expect("lock poisoned").clear();
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock poisoned").push(op);
    }

    fn check_failure(&self, path: &str) -> Result<()> {
        let prefixes = self.fail_prefixes.lock().expect("lock poisoned");
        if prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Err(Error::Internal {
                message: format!("injected failure for path: {path}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RecordingBackend {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.check_failure(path)?;
        self.record(StorageOp::Exists {
            path: path.to_string(),
        });
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        self.check_failure(path)?;
        self.record(StorageOp::IsDir {
            path: path.to_string(),
        });
        self.inner.is_dir(path).await
    }

    async fn list(&self, dir: &str, refresh: bool) -> Result<Vec<String>> {
        self.check_failure(dir)?;
        self.record(StorageOp::List {
            dir: dir.to_string(),
            refresh,
        });
        self.inner.list(dir, refresh).await
    }

    async fn make_dirs(&self, path: &str) -> Result<()> {
        self.check_failure(path)?;
        self.record(StorageOp::MakeDirs {
            path: path.to_string(),
        });
        self.inner.make_dirs(path).await
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<()> {
        self.check_failure(remote)?;
        self.record(StorageOp::PutFile {
            local: local.display().to_string(),
            remote: remote.to_string(),
        });
        self.inner.put_file(local, remote).await
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        self.check_failure(path)?;
        self.record(StorageOp::WriteText {
            path: path.to_string(),
        });
        self.inner.write_text(path, content).await
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        self.check_failure(path)?;
        self.record(StorageOp::ReadText {
            path: path.to_string(),
        });
        self.inner.read_text(path).await
    }

    fn supports_delete_file(&self) -> bool {
        self.inner.supports_delete_file()
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.check_failure(path)?;
        self.record(StorageOp::DeleteFile {
            path: path.to_string(),
        });
        self.inner.delete_file(path).await
    }

    async fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        self.check_failure(path)?;
        self.record(StorageOp::Remove {
            path: path.to_string(),
            recursive,
        });
        self.inner.remove(path, recursive).await
    }

    async fn touch(&self, path: &str) -> Result<()> {
        self.check_failure(path)?;
        self.record(StorageOp::Touch {
            path: path.to_string(),
        });
        self.inner.touch(path).await
    }
}

/// Wrapper that removes the single-object delete capability.
///
/// `supports_delete_file` reports `false` and `delete_file` errors, so
/// callers must take the `remove` + existence re-check path.
#[derive(Debug)]
pub struct NoDeleteFile<B> {
    inner: B,
}

impl<B> NoDeleteFile<B> {
    /// Wraps a backend, hiding its delete capability.
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for NoDeleteFile<B> {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        self.inner.is_dir(path).await
    }

    async fn list(&self, dir: &str, refresh: bool) -> Result<Vec<String>> {
        self.inner.list(dir, refresh).await
    }

    async fn make_dirs(&self, path: &str) -> Result<()> {
        self.inner.make_dirs(path).await
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<()> {
        self.inner.put_file(local, remote).await
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        self.inner.write_text(path, content).await
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        self.inner.read_text(path).await
    }

    fn supports_delete_file(&self) -> bool {
        false
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        Err(Error::storage(format!(
            "delete_file not supported by this backend: {path}"
        )))
    }

    async fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        self.inner.remove(path, recursive).await
    }

    async fn touch(&self, path: &str) -> Result<()> {
        self.inner.touch(path).await
    }
}

/// Wrapper whose `remove` silently does nothing.
///
/// Models bulk-delete fallbacks that skip objects without raising; used to
/// verify that callers re-check existence and fail loudly.
#[derive(Debug)]
pub struct SilentRemove<B> {
    inner: B,
}

impl<B> SilentRemove<B> {
    /// Wraps a backend with a no-op `remove` and no delete capability.
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for SilentRemove<B> {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        self.inner.is_dir(path).await
    }

    async fn list(&self, dir: &str, refresh: bool) -> Result<Vec<String>> {
        self.inner.list(dir, refresh).await
    }

    async fn make_dirs(&self, path: &str) -> Result<()> {
        self.inner.make_dirs(path).await
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<()> {
        self.inner.put_file(local, remote).await
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        self.inner.write_text(path, content).await
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        self.inner.read_text(path).await
    }

    fn supports_delete_file(&self) -> bool {
        false
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        Err(Error::storage(format!(
            "delete_file not supported by this backend: {path}"
        )))
    }

    async fn remove(&self, _path: &str, _recursive: bool) -> Result<()> {
        // Swallows the removal, like a bulk delete that skipped the object.
        Ok(())
    }

    async fn touch(&self, path: &str) -> Result<()> {
        self.inner.touch(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_backend_records_operations() {
        let storage = RecordingBackend::new();

        storage.write_text("ds/t/a.jsonl", "a").await.expect("write");
        let _ = storage.read_text("ds/t/a.jsonl").await;
        let _ = storage.list("ds/t", true).await;

        let ops = storage.operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], StorageOp::WriteText { .. }));
        assert!(matches!(ops[1], StorageOp::ReadText { .. }));
        assert!(matches!(ops[2], StorageOp::List { refresh: true, .. }));
    }

    #[tokio::test]
    async fn recording_backend_failure_injection() {
        let storage = RecordingBackend::new();
        storage.inject_failure("fail/");

        let result = storage.read_text("fail/test.txt").await;
        assert!(result.is_err());

        storage.write_text("ok/test.txt", "data").await.expect("write");
        let result = storage.read_text("ok/test.txt").await;
        assert!(result.is_ok());

        storage.clear_failures();
        storage.write_text("fail/test.txt", "data").await.expect("write");
    }

    #[tokio::test]
    async fn no_delete_file_strips_the_capability() {
        let storage = NoDeleteFile::new(MemoryBackend::new());
        storage.write_text("ds/a", "x").await.expect("write");

        assert!(!storage.supports_delete_file());
        assert!(storage.delete_file("ds/a").await.is_err());

        // The generic remove still works.
        storage.remove("ds/a", false).await.expect("remove");
        assert!(!storage.exists("ds/a").await.expect("exists"));
    }

    #[tokio::test]
    async fn silent_remove_leaves_objects_behind() {
        let storage = SilentRemove::new(MemoryBackend::new());
        storage.write_text("ds/a", "x").await.expect("write");

        storage.remove("ds/a", false).await.expect("remove");
        assert!(storage.exists("ds/a").await.expect("exists"), "remove must silently no-op");
    }
}
