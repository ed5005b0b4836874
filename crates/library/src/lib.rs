//! The organize pipeline: scan a library root, group video files by code,
//! plan what each code still needs, then scrape, render, download and move.
//!
//! [`run()`] drives a whole run as a stream of [`RunEvent`]s and always ends
//! with a [`RunReport`]; [`execute()`] is the same without the progress.

pub mod error;
pub mod execute;
pub mod group;
pub mod output;
pub mod plan;
pub mod report;
pub mod run;
pub mod scan;
pub mod scrape;
#[cfg(test)]
mod testing;

pub use crate::execute::{Context, execute_plan};
pub use crate::report::{ErrorCode, FileResult, FileStatus, ItemResult, RunReport, Status, Summary};
pub use crate::run::{RunEvent, execute, run};
