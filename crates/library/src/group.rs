//! Grouping scanned files into work units by code.

use crate::scan::ScannedFile;
use avmc_extract::{Code, Unidentified, identify};
use std::collections::BTreeMap;

/// Every file that shares one code. `files` index into the scanned
/// collection, ordered by relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub code: Code,
    pub files: Vec<usize>,
}

/// A file that couldn't be given exactly one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmatched {
    pub file: usize,
    pub reason: Unidentified,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Grouped {
    /// Sorted by code
    pub units: Vec<WorkUnit>,
    /// In scan order
    pub unmatched: Vec<Unmatched>,
}

/// Identify every file and merge them by code. The result doesn't depend on
/// the order of `files`, only on their relative paths.
pub fn group(files: &[ScannedFile]) -> Grouped {
    let mut units: BTreeMap<Code, Vec<usize>> = BTreeMap::new();
    let mut unmatched = Vec::new();
    for (index, file) in files.iter().enumerate() {
        match identify(&file.stem, &file.parent) {
            Ok(code) => units.entry(code).or_default().push(index),
            Err(reason) => {
                tracing::debug!(path = %file.relative.display(), reason = reason.kind(), "Unmatched file");
                unmatched.push(Unmatched { file: index, reason });
            },
        }
    }
    let units = units
        .into_iter()
        .map(|(code, mut indices)| {
            indices.sort_by(|a, b| files[*a].cmp_path(&files[*b]));
            WorkUnit { code, files: indices }
        })
        .collect();
    Grouped { units, unmatched }
}
