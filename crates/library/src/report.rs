//! The run report: one [`ItemResult`] per code (or per unmatched file), plus
//! a summary that is always recomputed from the items.

use avmc_provider::Attempt;
use derive_more::Display;
use serde::{Serialize, Serializer};
use std::path::Path;
use time::{OffsetDateTime, UtcOffset};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[display("processed")]
    Processed,
    #[display("skipped")]
    Skipped,
    #[display("failed")]
    Failed,
    #[display("unmatched")]
    Unmatched,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    #[display("planned")]
    Planned,
    #[display("moved")]
    Moved,
    #[display("rolled_back")]
    RolledBack,
    #[display("failed")]
    Failed,
}

/// Stable machine-readable failure classes, as reported in `error_code`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[display("unmatched_code")]
    UnmatchedCode,
    #[display("fetch_failed")]
    FetchFailed,
    #[display("parse_failed")]
    ParseFailed,
    #[display("target_conflict")]
    TargetConflict,
    #[display("io_failed")]
    IoFailed,
    #[display("move_failed")]
    MoveFailed,
    #[display("config_not_found")]
    ConfigNotFound,
    #[display("config_invalid")]
    ConfigInvalid,
    #[display("config_missing_path")]
    ConfigMissingPath,
}
impl From<&avmc_config::error::ErrorKind> for ErrorCode {
    fn from(kind: &avmc_config::error::ErrorKind) -> Self {
        use avmc_config::error::ErrorKind;
        match kind {
            ErrorKind::NotFound(_) => Self::ConfigNotFound,
            ErrorKind::Invalid { .. } => Self::ConfigInvalid,
            ErrorKind::MissingPath(_) => Self::ConfigMissingPath,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub src: String,
    pub dst: String,
    pub status: FileStatus,
}

/// One provider tried during a scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub stage: String,
    pub error: String,
}
impl From<&Attempt> for AttemptRecord {
    fn from(attempt: &Attempt) -> Self {
        Self {
            provider: attempt.provider.clone(),
            stage: attempt.stage.to_string(),
            error: attempt.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub code: String,
    pub provider_requested: String,
    pub provider_used: String,
    pub website: String,
    pub status: Status,
    #[serde(serialize_with = "code_or_empty")]
    pub error_code: Option<ErrorCode>,
    pub error_msg: String,
    pub candidates: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
    pub files: Vec<FileResult>,
}
impl ItemResult {
    pub fn new(code: impl Into<String>, provider_requested: impl Into<String>, status: Status) -> Self {
        Self {
            code: code.into(),
            provider_requested: provider_requested.into(),
            provider_used: String::new(),
            website: String::new(),
            status,
            error_code: None,
            error_msg: String::new(),
            candidates: Vec::new(),
            attempts: Vec::new(),
            files: Vec::new(),
        }
    }

    /// A run-level failure standing in for the items that never got made.
    pub fn synthetic(code: ErrorCode, message: impl Into<String>) -> Self {
        let mut item = Self::new("", "", Status::Failed);
        item.error_code = Some(code);
        item.error_msg = message.into();
        item
    }

    pub fn fail(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.status = Status::Failed;
        self.error_code = Some(code);
        self.error_msg = message.into();
    }

    /// Files still [`Planned`](FileStatus::Planned) will never move.
    pub fn fail_files(&mut self) {
        for file in &mut self.files {
            if file.status == FileStatus::Planned {
                file.status = FileStatus::Failed;
            }
        }
    }

    pub(crate) fn set_file_status(&mut self, index: usize, status: FileStatus) {
        if let Some(file) = self.files.get_mut(index) {
            file.status = status;
        }
    }
}

fn code_or_empty<S: Serializer>(code: &Option<ErrorCode>, serializer: S) -> Result<S::Ok, S::Error> {
    match code {
        Some(code) => code.serialize(serializer),
        None => serializer.serialize_str(""),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unmatched: usize,
}
impl Summary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.unmatched > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub path: String,
    pub dry_run: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub summary: Summary,
    pub items: Vec<ItemResult>,
}
impl RunReport {
    pub fn new(path: &Path, dry_run: bool, started_at: OffsetDateTime) -> Self {
        Self {
            path: path.display().to_string(),
            dry_run,
            started_at,
            finished_at: started_at,
            summary: Summary::default(),
            items: Vec::new(),
        }
    }

    /// A report for a run that couldn't get as far as producing items.
    pub fn failed(path: &Path, dry_run: bool, code: ErrorCode, message: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut report = Self::new(path, dry_run, now);
        report.items.push(ItemResult::synthetic(code, message));
        report.finalize();
        report
    }

    /// Normalize times to UTC, sort items by code (empty codes last, ties
    /// keep their order) and recount the summary. Idempotent.
    pub fn finalize(&mut self) {
        self.started_at = self.started_at.to_offset(UtcOffset::UTC);
        self.finished_at = self.finished_at.to_offset(UtcOffset::UTC);
        self.items
            .sort_by(|a, b| (a.code.is_empty(), a.code.as_str()).cmp(&(b.code.is_empty(), b.code.as_str())));
        self.summary = self.items.iter().fold(Summary::default(), |mut summary, item| {
            match item.status {
                Status::Processed => summary.processed += 1,
                Status::Skipped => summary.skipped += 1,
                Status::Failed => summary.failed += 1,
                Status::Unmatched => summary.unmatched += 1,
            }
            summary
        });
    }
}
