//! Path validation.
//!
//! Every path handed to a backend is relative to the library root. Scanned
//! videos, `out/<CODE>/` sidecars and the provider cache all live under that
//! root, so anything that normalizes to outside of it is rejected.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalizes a root-relative path, rejecting anything that would leave the
/// library root.
///
/// > **Note:** Null bytes are rejected explicitly; they survive
/// >           `Path::components()` on Unix but truncate in syscalls.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use avmc_storage::validate_path;
/// assert!(validate_path("out/ABC-123/ABC-123.nfo").is_ok());
/// assert!(validate_path("inbox/../out/ABC-123").is_ok());
/// assert!(validate_path("../elsewhere/movie.mp4").is_err());
/// assert!(validate_path("out/../../movie.mp4").is_err());
/// assert_eq!(
///     validate_path("./inbox//sub/./ABC-123.mp4").unwrap(),
///     Path::new("inbox/sub/ABC-123.mp4")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(original.to_path_buf()));
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) if s.as_encoded_bytes().contains(&0) => return Err(invalid()),
            Component::Normal(s) => components.push(s),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => return Err(invalid()),
            Component::ParentDir => {
                components.pop().ok_or_else(invalid)?;
            },
        }
    }
    if components.is_empty() {
        return Err(invalid());
    }
    Ok(components.into_iter().collect())
}
