//! Video discovery.
//!
//! Walks the library root through the storage backend (stat only, contents
//! are never read) and keeps the regular files that look like videos. The
//! pipeline's own directories, `out/` and `cache/`, are never descended into,
//! and neither are the configured exclusions.

use crate::error::{ErrorKind, Result};
use avmc_storage::{BackendHandle, FileInfo, validate_path};
use exn::{OptionExt, ResultExt};
use futures::TryStreamExt;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::instrument;

pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".avi"];
pub const OUTPUT_DIR: &str = "out";
pub const CACHE_DIR: &str = "cache";

/// One video found below the library root. Immutable once scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub absolute: PathBuf,
    /// Relative to the library root
    pub relative: PathBuf,
    /// File name, extension included, case preserved
    pub name: String,
    /// File name without its extension
    pub stem: String,
    /// Lowercased, with the leading dot
    pub extension: String,
    /// Name of the containing directory; the root's own name for files
    /// directly below the root
    pub parent: String,
    pub size: u64,
    pub modified: OffsetDateTime,
}
impl ScannedFile {
    /// Order by relative path as a string, so `a b/x.mp4` comes before
    /// `a/x.mp4` (space sorts before `/`).
    pub(crate) fn cmp_path(&self, other: &Self) -> Ordering {
        self.relative.to_string_lossy().cmp(&other.relative.to_string_lossy())
    }

    fn new(root: &Path, info: FileInfo) -> Result<Self> {
        let extension = info.extension();
        let name = info
            .path
            .file_name()
            .ok_or_raise(|| ErrorKind::FileName(info.path.clone()))?
            .to_string_lossy()
            .into_owned();
        let stem = info
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let parent = info
            .path
            .parent()
            .and_then(Path::file_name)
            .or_else(|| root.file_name())
            .map(|parent| parent.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            absolute: root.join(&info.path),
            relative: info.path,
            name,
            stem,
            extension,
            parent,
            size: info.size,
            modified: info.modified,
        })
    }
}

/// Find every video below `root`, sorted by relative path.
///
/// `exclude` entries may be relative to the root or absolute; absolute paths
/// outside of the root can't contain anything we'd find and are ignored.
/// Any error during the walk fails the whole scan.
#[instrument(skip(backend, exclude), fields(root = %root.display()))]
pub async fn scan(backend: &BackendHandle, root: &Path, exclude: &[PathBuf]) -> Result<Vec<ScannedFile>> {
    let skip = skip_list(root, exclude);
    let mut stream = backend.list_stream(&skip);
    let mut files = Vec::new();
    while let Some(info) = stream.try_next().await.or_raise(|| ErrorKind::Scan)? {
        if !VIDEO_EXTENSIONS.contains(&info.extension().as_str()) {
            continue;
        }
        files.push(ScannedFile::new(root, info)?);
    }
    files.sort_by(ScannedFile::cmp_path);
    tracing::debug!(files = files.len(), "Scan complete");
    Ok(files)
}

fn skip_list(root: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let mut skip = vec![PathBuf::from(OUTPUT_DIR), PathBuf::from(CACHE_DIR)];
    for dir in exclude {
        let relative = match dir.is_absolute() {
            true => match dir.strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => {
                    tracing::debug!(dir = %dir.display(), "Exclusion outside of the library root; ignoring");
                    continue;
                },
            },
            false => dir.as_path(),
        };
        match validate_path(relative) {
            Ok(relative) if !skip.contains(&relative) => skip.push(relative),
            Ok(_) => {},
            Err(_) => tracing::debug!(dir = %dir.display(), "Exclusion is not a directory below the root; ignoring"),
        }
    }
    skip
}
