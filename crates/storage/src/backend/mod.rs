//! Storage backend trait and implementations.
//!
//! The library pipeline never touches `std::fs` directly: scanning, reading
//! the output state, writing sidecars and moving videos all go through a
//! [`StorageBackend`] rooted at the library directory. Dry-runs and the
//! read-only cache gate wrap the real backend in a [`ReadOnlyBackend`].

mod local;
mod ro;

pub use self::local::LocalBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface over the library root.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use avmc_storage::{backend::StorageBackend, error::{ErrorKind, Result}};
///
/// async fn write_nfo_once(backend: &dyn StorageBackend, xml: &[u8]) -> Result<bool> {
///     match backend.write_new(Path::new("out/ABC-123/ABC-123.nfo"), xml).await {
///         Ok(()) => Ok(true),
///         Err(err) if matches!(&*err, ErrorKind::AlreadyExists(_)) => Ok(false),
///         Err(err) => Err(err),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// Stream metadata for every regular file below the root.
    ///
    /// Directories whose relative path equals one of `skip` are not
    /// descended into. Symlinks are never followed and never reported.
    /// Order is unspecified; callers sort.
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use std::path::PathBuf;
    /// # use avmc_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let skip = [PathBuf::from("out"), PathBuf::from("cache")];
    /// let mut stream = backend.list_stream(&skip);
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, skip: &'a [PathBuf]) -> FileInfoStream<'a>;

    /// Names of the direct children of a directory.
    ///
    /// A directory that doesn't exist lists as empty rather than erroring.
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Atomically create or replace a file.
    ///
    /// The data lands in a temporary sibling first and is renamed into
    /// place, so readers never observe a partial file. Parent directories
    /// are created as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Atomically create a file that must not already exist.
    ///
    /// - an existing regular file fails with
    ///   [`AlreadyExists`](crate::error::ErrorKind::AlreadyExists), which
    ///   callers may treat as "already satisfied"
    /// - anything else at the path fails with
    ///   [`PathTypeConflict`](crate::error::ErrorKind::PathTypeConflict)
    async fn write_new(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Ensure a directory exists, creating parents as needed.
    ///
    /// Fails with [`PathTypeConflict`](crate::error::ErrorKind::PathTypeConflict)
    /// when a non-directory occupies the path.
    async fn create_dir(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Never falls back to copy+delete: a move between filesystems fails
    /// with [`CrossDevice`](crate::error::ErrorKind::CrossDevice).
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}
