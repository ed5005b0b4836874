//! Read-only storage backend.
//!
//! Wraps another backend and refuses every mutation with
//! [`ReadOnly`](crate::error::ErrorKind::ReadOnly) before anything reaches
//! the disk. Reads pass straight through.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};
use crate::{BackendHandle, StorageBackend, backend::FileInfoStream};

/// Read-only storage backend.
#[derive(Clone)]
pub struct ReadOnlyBackend {
    inner: BackendHandle,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }

    fn refuse(path: &Path, op: &'static str) -> Result<()> {
        tracing::debug!(path = %path.display(), op, "Refusing mutation in read-only mode");
        exn::bail!(ErrorKind::ReadOnly(path.to_path_buf()))
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, skip: &'a [PathBuf]) -> FileInfoStream<'a> {
        self.inner.list_stream(skip)
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        self.inner.list_dir(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, _data: &[u8]) -> Result<()> {
        Self::refuse(path, "write")
    }

    async fn write_new(&self, path: &Path, _data: &[u8]) -> Result<()> {
        Self::refuse(path, "write_new")
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        Self::refuse(path, "create_dir")
    }

    async fn rename(&self, from: &Path, _to: &Path) -> Result<()> {
        Self::refuse(from, "rename")
    }
}
