//! Execution planning: which sidecars are missing and where each video goes.

use crate::error::{ErrorKind, Result};
use crate::group::WorkUnit;
use crate::output::OutputState;
use crate::scan::ScannedFile;
use avmc_extract::Code;
use exn::OptionExt;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Derived from an [`OutputState`]; the poster is always cut from the fanart,
/// so it never needs a scrape of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactNeed {
    pub scrape: bool,
    pub nfo: bool,
    pub poster: bool,
    pub fanart: bool,
}
impl ArtifactNeed {
    pub fn from_state(state: &OutputState) -> Self {
        let nfo = !state.has_nfo;
        let fanart = !state.has_fanart;
        Self {
            scrape: nfo || fanart,
            nfo,
            poster: !state.has_poster,
            fanart,
        }
    }

    pub fn any_sidecar(&self) -> bool {
        self.nfo || self.poster || self.fanart
    }
}

/// Both paths are relative to the library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOrder {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub code: Code,
    pub provider: String,
    /// In work unit order
    pub moves: Vec<MoveOrder>,
    pub need: ArtifactNeed,
}

/// Combine a work unit with the state of its output directory.
///
/// Each video keeps its file name unless that name is already taken in the
/// output directory (or by an earlier video of the same unit), in which case
/// the first free `name__N.ext` with `N >= 2` is used.
pub fn plan(unit: &WorkUnit, files: &[ScannedFile], state: &OutputState, provider: &str) -> Result<ExecutionPlan> {
    let mut taken: BTreeSet<String> = state.existing.clone();
    let mut moves = Vec::with_capacity(unit.files.len());
    for &index in &unit.files {
        let file = files.get(index).ok_or_raise(|| ErrorKind::FileIndex {
            index,
            len: files.len(),
        })?;
        let name = free_name(&file.name, &taken);
        moves.push(MoveOrder {
            source: file.relative.clone(),
            destination: state.dir.join(&name),
        });
        taken.insert(name);
    }
    Ok(ExecutionPlan {
        code: unit.code.clone(),
        provider: provider.to_string(),
        moves,
        need: ArtifactNeed::from_state(state),
    })
}

fn free_name(name: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let extension = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    (2..)
        .map(|n| format!("{stem}__{n}{extension}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::tests::scanned;
    use rstest::rstest;

    fn unit(files: Vec<usize>) -> WorkUnit {
        WorkUnit {
            code: Code::parse("ABC-123").unwrap(),
            files,
        }
    }

    fn state(existing: &[&str]) -> OutputState {
        OutputState {
            dir: PathBuf::from("out/ABC-123"),
            has_nfo: existing.contains(&"ABC-123.nfo"),
            has_poster: existing.contains(&"poster.jpg"),
            has_fanart: existing.contains(&"fanart.jpg"),
            existing: existing.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn destinations(plan: &ExecutionPlan) -> Vec<String> {
        plan.moves.iter().map(|m| m.destination.to_string_lossy().into_owned()).collect()
    }

    #[rstest]
    #[case(&[], ArtifactNeed { scrape: true, nfo: true, poster: true, fanart: true })]
    #[case(&["ABC-123.nfo", "poster.jpg", "fanart.jpg"], ArtifactNeed::default())]
    #[case(&["ABC-123.nfo", "fanart.jpg"], ArtifactNeed { poster: true, ..ArtifactNeed::default() })]
    #[case(&["ABC-123.nfo", "poster.jpg"], ArtifactNeed { scrape: true, fanart: true, ..ArtifactNeed::default() })]
    #[case(&["poster.jpg", "fanart.jpg"], ArtifactNeed { scrape: true, nfo: true, ..ArtifactNeed::default() })]
    fn test_need(#[case] existing: &[&str], #[case] expected: ArtifactNeed) {
        let need = ArtifactNeed::from_state(&state(existing));
        assert_eq!(need, expected);
        assert_eq!(need.scrape, need.nfo || need.fanart);
    }

    #[test]
    fn test_conflict_free_names() {
        let files = vec![scanned("inbox/A.mp4")];
        let plan = plan(&unit(vec![0]), &files, &state(&["A.mp4", "A__2.mp4"]), "javbus").unwrap();
        assert_eq!(destinations(&plan), vec!["out/ABC-123/A__3.mp4"]);
        assert_eq!(plan.moves[0].source, PathBuf::from("inbox/A.mp4"));
        assert_eq!(plan.provider, "javbus");
    }

    #[test]
    fn test_names_allocated_within_plan() {
        let files = vec![scanned("a/ABC-123.mp4"), scanned("b/ABC-123.mp4"), scanned("c/ABC-123.MP4"), scanned("d/ABC-123.mkv")];
        let plan = plan(&unit(vec![0, 1, 2, 3]), &files, &state(&["ABC-123.mkv"]), "javdb").unwrap();
        assert_eq!(
            destinations(&plan),
            vec![
                "out/ABC-123/ABC-123.mp4",
                "out/ABC-123/ABC-123__2.mp4",
                "out/ABC-123/ABC-123.MP4",
                "out/ABC-123/ABC-123__2.mkv",
            ]
        );
    }

    #[test]
    fn test_out_of_range_index() {
        let files = vec![scanned("ABC-123.mp4")];
        let err = plan(&unit(vec![0, 5]), &files, &state(&[]), "javbus").unwrap_err();
        assert_eq!(*err, ErrorKind::FileIndex { index: 5, len: 1 });
    }
}
