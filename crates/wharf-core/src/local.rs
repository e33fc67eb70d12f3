//! Local filesystem backend rooted at a directory.
//!
//! Used for `file://` destinations and as a durable stand-in during
//! development. Listings on a local filesystem are always fresh, so the
//! `refresh` flag is accepted and ignored.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::{StorageBackend, validate_key};

/// Storage backend over a local directory tree via `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Creates a backend rooted at `root`. The root is not created eagerly;
    /// `make_dirs("")` creates it.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a key to an absolute path under the root.
    fn full(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        if key.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(key))
        }
    }

    /// Creates the parent directory of `path` so writes into layout-deep
    /// locations succeed the way they do on object stores.
    async fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage_with_source(
                    format!("failed to create parent of {}", path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

fn map_io(op: &str, path: &Path, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::NotFound(format!("{op}: {}", path.display()))
    } else {
        Error::storage_with_source(format!("{op} failed: {}", path.display()), e)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.full(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| map_io("exists", &full, e))
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        let full = self.full(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io("is_dir", &full, e)),
        }
    }

    async fn list(&self, dir: &str, _refresh: bool) -> Result<Vec<String>> {
        let full = self.full(dir)?;
        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| map_io("list", &full, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| map_io("list", &full, e))?
        {
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| {
                Error::storage(format!("non-UTF-8 file name under {}", full.display()))
            })?;
            if dir.is_empty() {
                entries.push(name.to_string());
            } else {
                entries.push(format!("{dir}/{name}"));
            }
        }
        entries.sort();
        Ok(entries)
    }

    async fn make_dirs(&self, path: &str) -> Result<()> {
        let full = self.full(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| map_io("make_dirs", &full, e))
    }

    async fn put_file(&self, local: &Path, remote: &str) -> Result<()> {
        let full = self.full(remote)?;
        self.ensure_parent(&full).await?;
        tokio::fs::copy(local, &full).await.map_err(|e| {
            Error::storage_with_source(
                format!("failed to copy {} to {}", local.display(), full.display()),
                e,
            )
        })?;
        Ok(())
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<()> {
        let full = self.full(path)?;
        self.ensure_parent(&full).await?;
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| map_io("write_text", &full, e))
    }

    async fn read_text(&self, path: &str) -> Result<String> {
        let full = self.full(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| map_io("read_text", &full, e))
    }

    fn supports_delete_file(&self) -> bool {
        true
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let full = self.full(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| map_io("delete_file", &full, e))
    }

    async fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        let full = self.full(path)?;
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| map_io("remove", &full, e))?;

        if meta.is_dir() {
            if !recursive {
                return Err(Error::storage(format!(
                    "cannot remove directory without recursive: {}",
                    full.display()
                )));
            }
            tokio::fs::remove_dir_all(&full)
                .await
                .map_err(|e| map_io("remove", &full, e))
        } else {
            tokio::fs::remove_file(&full)
                .await
                .map_err(|e| map_io("remove", &full, e))
        }
    }

    async fn touch(&self, path: &str) -> Result<()> {
        let full = self.full(path)?;
        self.ensure_parent(&full).await?;
        tokio::fs::write(&full, b"")
            .await
            .map_err(|e| map_io("touch", &full, e))
    }
}
