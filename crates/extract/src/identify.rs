//! Identifier extraction from file and directory names.

use std::collections::BTreeSet;

use derive_more::Display;
use tracing::instrument;

use crate::consts::CANDIDATE_REGEX;
use crate::models::Code;

/// Why a file couldn't be given a single code.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum Unidentified {
    #[display("no code found in file name or parent directory")]
    NoMatch,
    /// Every distinct code seen, sorted ascending.
    #[display("multiple codes found: {}", _0.iter().map(Code::as_str).collect::<Vec<_>>().join(", "))]
    Ambiguous(Vec<Code>),
}
impl Unidentified {
    /// Stable machine-readable name for the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::Ambiguous(_) => "ambiguous",
        }
    }

    pub fn candidates(&self) -> &[Code] {
        match self {
            Self::NoMatch => &[],
            Self::Ambiguous(candidates) => candidates,
        }
    }
}

/// Every code that appears in `s`, normalized to `UPPER-DIGITS`.
pub fn candidates(s: &str) -> impl Iterator<Item = Code> + '_ {
    CANDIDATE_REGEX
        .captures_iter(s.trim())
        .filter_map(|caps| Code::parse(format!("{}-{}", caps[1].to_uppercase(), &caps[2])).ok())
}

/// Derive the code for a video from its file stem and the name of the
/// directory that contains it.
///
/// Both names are searched. Finding the same code twice is fine; finding two
/// different codes (even one in each name) is ambiguous.
///
/// ```
/// use avmc_extract::{identify, Unidentified};
/// assert_eq!(identify("abc_123 [1080p]", "downloads").unwrap().as_str(), "ABC-123");
/// assert_eq!(identify("video", "ABC-123").unwrap().as_str(), "ABC-123");
/// assert_eq!(identify("holiday", "downloads"), Err(Unidentified::NoMatch));
/// ```
#[instrument(level = "trace")]
pub fn identify(stem: &str, parent: &str) -> Result<Code, Unidentified> {
    let found: BTreeSet<Code> = candidates(stem).chain(candidates(parent)).collect();
    let mut found = found.into_iter();
    match (found.next(), found.len()) {
        (None, _) => Err(Unidentified::NoMatch),
        (Some(code), 0) => Ok(code),
        (Some(first), _) => Err(Unidentified::Ambiguous(std::iter::once(first).chain(found).collect())),
    }
}
