//! What already exists in a code's output directory.

use crate::error::{ErrorKind, Result};
use crate::scan::OUTPUT_DIR;
use avmc_extract::Code;
use avmc_render::{FANART_FILE, NFO_EXTENSION, POSTER_FILE};
use avmc_storage::BackendHandle;
use exn::ResultExt;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::instrument;

/// Snapshot of `out/<CODE>/`, taken once per code per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputState {
    /// Relative to the library root
    pub dir: PathBuf,
    pub has_nfo: bool,
    pub has_poster: bool,
    pub has_fanart: bool,
    /// Every entry name in the directory, whatever its type
    pub existing: BTreeSet<String>,
}

pub fn output_dir(code: &Code) -> PathBuf {
    PathBuf::from(OUTPUT_DIR).join(code.as_str())
}

pub fn nfo_name(code: &Code) -> String {
    format!("{}.{NFO_EXTENSION}", code.as_str())
}

/// Read `out/<CODE>/` without recursing. A directory that doesn't exist yet
/// is an empty state, not an error.
#[instrument(skip(backend), fields(code = %code))]
pub async fn read_output_state(backend: &BackendHandle, code: &Code) -> Result<OutputState> {
    let dir = output_dir(code);
    let existing: BTreeSet<String> = backend
        .list_dir(&dir)
        .await
        .or_raise(|| ErrorKind::OutputState(dir.clone()))?
        .into_iter()
        .collect();
    Ok(OutputState {
        has_nfo: existing.contains(&nfo_name(code)),
        has_poster: existing.contains(POSTER_FILE),
        has_fanart: existing.contains(FANART_FILE),
        existing,
        dir,
    })
}
