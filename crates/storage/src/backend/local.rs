//! Local filesystem storage backend.
//!
//! This module provides a storage backend implementation for the local filesystem.
//! Files are stored in a configured directory and accessed using standard filesystem
//! operations via `tokio::fs` for async I/O. Atomic writes go through
//! [`tempfile`] on a blocking thread.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::models::{EntryKind, FileInfo};
use crate::{StorageBackend, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::Metadata;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory. Constructing a
/// backend never touches the disk beyond checking the root, so a dry-run
/// leaves the library exactly as it found it.
///
/// # Examples
///
/// ```no_run
/// use avmc_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("library", "/srv/videos")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for the library
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPath`](ErrorKind::InvalidPath) if the path is not
    /// absolute, or if it exists but isn't a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for a relative storage path.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to a relative storage path.
    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        validate_path(relative)
    }

    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    fn map_rename_error(e: io::Error, from: &Path, to: &Path) -> ErrorKind {
        match e.kind() {
            io::ErrorKind::CrossesDevices => ErrorKind::CrossDevice {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            },
            io::ErrorKind::NotFound => ErrorKind::NotFound(from.to_path_buf()),
            _ => Self::map_io_error(e, to),
        }
    }

    /// `lstat` the path; `None` when nothing is there.
    async fn entry_kind(abs_path: &Path) -> io::Result<Option<EntryKind>> {
        match fs::symlink_metadata(abs_path).await {
            Ok(meta) => Ok(Some(meta.file_type().into())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write through a temporary sibling and rename into place. With
    /// `clobber` unset the final rename refuses to replace anything.
    fn atomic_write(abs_path: &Path, rel_path: &Path, data: &[u8], clobber: bool) -> std::result::Result<(), ErrorKind> {
        let parent = abs_path.parent().ok_or_else(|| ErrorKind::InvalidPath(rel_path.to_path_buf()))?;
        std::fs::create_dir_all(parent).map_err(ErrorKind::Io)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".avmc-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(ErrorKind::Io)?;
        tmp.write_all(data).map_err(ErrorKind::Io)?;
        tmp.as_file().sync_all().map_err(ErrorKind::Io)?;
        let persisted = match clobber {
            true => tmp.persist(abs_path).map(drop),
            false => tmp.persist_noclobber(abs_path).map(drop),
        };
        persisted.map_err(|e| Self::map_io_error(e.error, rel_path))
    }

    async fn write_blocking(&self, path: &Path, data: &[u8], clobber: bool) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        let rel_path = path.to_path_buf();
        let data = data.to_vec();
        let task = tokio::task::spawn_blocking(move || Self::atomic_write(&abs_path, &rel_path, &data, clobber));
        match task.await {
            Ok(result) => Ok(result?),
            Err(join) => exn::bail!(ErrorKind::BackendError(format!("write task for {} failed: {join}", path.display()))),
        }
    }

    /// Keeps the stream loop below free of error plumbing: it can't `?`, so
    /// everything fallible for a single entry happens here.
    async fn process_entry(&self, entry: DirEntry, skip: &[PathBuf]) -> Result<WalkEntry> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = self.relative_path(&path)?;
        if file_type.is_dir() {
            if skip.iter().any(|excluded| excluded == &relative) {
                tracing::debug!(path = %relative.display(), "Skipping excluded directory");
                return Ok(WalkEntry::Skip);
            }
            return Ok(WalkEntry::Descend(path));
        }
        if file_type.is_file() {
            let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)?));
        }
        // Symlinks and special files are never followed or reported.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, skip: &'a [PathBuf]) -> FileInfoStream<'a> {
        let mut stack = vec![self.root.clone()];
        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A subdirectory removed mid-walk is not an error; a
                    // missing root is.
                    Err(err) if err.kind() == io::ErrorKind::NotFound && current != self.root => continue 'dirs,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'dirs; },
                    };
                    match self.process_entry(entry, skip).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let abs_path = self.absolute_path(path)?;
        let mut entries = match fs::read_dir(&abs_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(Self::map_io_error(err, path)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, path))? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.write_blocking(path, data, true).await
    }

    async fn write_new(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        match Self::entry_kind(&abs_path).await.map_err(|e| Self::map_io_error(e, path))? {
            None => {},
            Some(EntryKind::File) => exn::bail!(ErrorKind::AlreadyExists(path.to_path_buf())),
            Some(found) => exn::bail!(ErrorKind::PathTypeConflict {
                path: path.to_path_buf(),
                expected: EntryKind::File,
                found,
            }),
        }
        self.write_blocking(path, data, false).await
    }

    async fn create_dir(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        // Follows symlinks: a link to a directory is a usable directory.
        match fs::metadata(&abs_path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(meta) => exn::bail!(ErrorKind::PathTypeConflict {
                path: path.to_path_buf(),
                expected: EntryKind::Directory,
                found: meta.file_type().into(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(fs::create_dir_all(&abs_path).await.map_err(ErrorKind::Io)?)
            },
            Err(e) => Err(Self::map_io_error(e, path).into()),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        match Self::entry_kind(&to_path).await.map_err(|e| Self::map_io_error(e, to))? {
            None => {},
            Some(EntryKind::File) => exn::bail!(ErrorKind::AlreadyExists(to.to_path_buf())),
            Some(found) => exn::bail!(ErrorKind::PathTypeConflict {
                path: to.to_path_buf(),
                expected: EntryKind::File,
                found,
            }),
        }
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        Ok(fs::rename(&from_path, &to_path).await.map_err(|e| Self::map_rename_error(e, from, to))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("library", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    async fn list(backend: &LocalBackend, skip: &[PathBuf]) -> Result<Vec<FileInfo>> {
        use futures::TryStreamExt;
        backend.list_stream(skip).try_collect().await
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("library", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("library", "relative/path").is_err());
        assert!(LocalBackend::new("library", "./relative").is_err());
    }

    #[test]
    fn test_new_does_not_create_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("not-yet");
        LocalBackend::new("library", &root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_relative_path() {
        let (temp_dir, backend) = backend();
        let abs = temp_dir.path().join("inbox/ABC-123.mp4");
        assert_eq!(backend.relative_path(&abs).unwrap(), Path::new("inbox/ABC-123.mp4"));
        assert!(backend.relative_path("/other/file.mp4").is_err());
    }

    #[tokio::test]
    async fn test_write_replaces_and_creates_directories() {
        let (_temp_dir, backend) = backend();
        let path = Path::new("cache/report.json");
        backend.write(path, b"{}").await.unwrap();
        backend.write(path, b"{\"a\":1}").await.unwrap();
        assert_eq!(backend.read(path).await.unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_write_new_refuses_existing_file() {
        let (_temp_dir, backend) = backend();
        let path = Path::new("out/ABC-123/ABC-123.nfo");
        backend.write_new(path, b"first").await.unwrap();
        let err = backend.write_new(path, b"second").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        assert_eq!(backend.read(path).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_write_new_conflicts_with_directory() {
        let (temp_dir, backend) = backend();
        std::fs::create_dir_all(temp_dir.path().join("out/ABC-123/fanart.jpg")).unwrap();
        let err = backend.write_new(Path::new("out/ABC-123/fanart.jpg"), b"jpeg").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temporary_files() {
        let (_temp_dir, backend) = backend();
        backend.write_new(Path::new("out/ABC-123/poster.jpg"), b"jpeg").await.unwrap();
        backend.write(Path::new("out/ABC-123/ABC-123.nfo"), b"xml").await.unwrap();
        let names = backend.list_dir(Path::new("out/ABC-123")).await.unwrap();
        assert_eq!(names, vec!["ABC-123.nfo", "poster.jpg"]);
    }

    #[tokio::test]
    async fn test_create_dir() {
        let (temp_dir, backend) = backend();
        backend.create_dir(Path::new("out/ABC-123")).await.unwrap();
        backend.create_dir(Path::new("out/ABC-123")).await.unwrap();
        assert!(temp_dir.path().join("out/ABC-123").is_dir());

        backend.write(Path::new("out/DEF-456"), b"not a dir").await.unwrap();
        let err = backend.create_dir(Path::new("out/DEF-456")).await.unwrap_err();
        assert!(matches!(
            &*err,
            ErrorKind::PathTypeConflict { expected: EntryKind::Directory, found: EntryKind::File, .. }
        ));
    }

    #[tokio::test]
    async fn test_rename() {
        let (temp_dir, backend) = backend();
        backend.write(Path::new("ABC-123.mp4"), b"video").await.unwrap();
        backend.rename(Path::new("ABC-123.mp4"), Path::new("out/ABC-123/ABC-123.mp4")).await.unwrap();
        assert!(!temp_dir.path().join("ABC-123.mp4").exists());
        assert_eq!(backend.read(Path::new("out/ABC-123/ABC-123.mp4")).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_rename_never_clobbers() {
        let (temp_dir, backend) = backend();
        backend.write(Path::new("a.mp4"), b"a").await.unwrap();
        backend.write(Path::new("b.mp4"), b"b").await.unwrap();
        let err = backend.rename(Path::new("a.mp4"), Path::new("b.mp4")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));

        std::fs::create_dir(temp_dir.path().join("c.mp4")).unwrap();
        let err = backend.rename(Path::new("a.mp4"), Path::new("c.mp4")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(backend.read(Path::new("a.mp4")).await.unwrap(), b"a");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_exdev_maps_to_cross_device() {
        // EXDEV
        let err = io::Error::from_raw_os_error(18);
        let kind = LocalBackend::map_rename_error(err, Path::new("a.mp4"), Path::new("out/A/a.mp4"));
        assert!(matches!(kind, ErrorKind::CrossDevice { .. }));
    }

    #[tokio::test]
    async fn test_list_skips_excluded_directories() {
        let (_temp_dir, backend) = backend();
        backend.write(Path::new("ABC-123.mp4"), b"x").await.unwrap();
        backend.write(Path::new("inbox/DEF-456.mkv"), b"x").await.unwrap();
        backend.write(Path::new("out/GHI-789/GHI-789.mp4"), b"x").await.unwrap();
        backend.write(Path::new("cache/providers/javbus/GHI-789.html"), b"x").await.unwrap();
        let skip = [PathBuf::from("out"), PathBuf::from("cache")];
        let mut paths: Vec<_> = list(&backend, &skip).await.unwrap().into_iter().map(|f| f.path).collect();
        paths.sort();
        assert_eq!(paths, vec![PathBuf::from("ABC-123.mp4"), PathBuf::from("inbox/DEF-456.mkv")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_ignores_symlinks() {
        let (temp_dir, backend) = backend();
        backend.write(Path::new("real.mp4"), b"x").await.unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("real.mp4"), temp_dir.path().join("link.mp4")).unwrap();
        let files = list(&backend, &[]).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("real.mp4"));
    }

    #[tokio::test]
    async fn test_list_missing_root_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("library", temp_dir.path().join("gone")).unwrap();
        let err = list(&backend, &[]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_dir_missing_is_empty() {
        let (_temp_dir, backend) = backend();
        assert!(backend.list_dir(Path::new("out/ABC-123")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_size() {
        let (_temp_dir, backend) = backend();
        backend.write(Path::new("ABC-123.mp4"), b"Hello, world!").await.unwrap();
        let files = list(&backend, &[]).await.unwrap();
        assert_eq!(files[0].path, PathBuf::from("ABC-123.mp4"));
        assert_eq!(files[0].size, 13);
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_temp_dir, backend) = backend();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
        assert!(backend.write_new(Path::new("out/../../x"), b"data").await.is_err());
        assert!(backend.rename(Path::new("a"), Path::new("../../b")).await.is_err());
    }
}
