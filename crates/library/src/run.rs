use crate::error::ErrorKind;
use crate::execute::{Context, execute_plan};
use crate::group::{Unmatched, WorkUnit, group};
use crate::output::read_output_state;
use crate::plan::{ArtifactNeed, ExecutionPlan, plan};
use crate::report::{ErrorCode, FileResult, FileStatus, ItemResult, RunReport, Status};
use crate::scan::{ScannedFile, scan};
use async_stream::stream;
use avmc_config::{Config, MAX_CONCURRENCY};
use avmc_extract::{Code, Unidentified};
use avmc_provider::Registry;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Progress events emitted by [`run`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Scanned`](Self::Scanned), [`Grouped`](Self::Grouped) and
///    [`Planned`](Self::Planned), once each, in that order.
/// 3. [`ItemDone`](Self::ItemDone), once per plan.
/// 4. [`Complete`](Self::Complete), exactly once, last.
///
/// A run-level failure (unusable root, HTTP client, scan) skips straight from
/// [`Started`](Self::Started) to [`Complete`](Self::Complete) with a single
/// synthetic item in the report.
#[derive(Debug)]
pub enum RunEvent {
    Started {
        root: PathBuf,
        provider: String,
        apply: bool,
        concurrency: usize,
    },
    Scanned {
        files: usize,
        unmatched: usize,
        elapsed: Duration,
    },
    Grouped {
        codes: usize,
        elapsed: Duration,
    },
    Planned {
        items: usize,
        need_scrape: usize,
        need_nfo: usize,
        need_fanart: usize,
        need_poster: usize,
        moves: usize,
        elapsed: Duration,
    },
    ItemDone {
        done: usize,
        total: usize,
        result: Box<ItemResult>,
        elapsed: Duration,
    },
    Complete(Box<RunReport>),
}

/// Streams [`RunEvent`]s for one run over `config.root`.
///
/// Plans execute concurrently, at most `config.concurrency` (clamped to
/// `1..=MAX_CONCURRENCY`) at a time; more are promoted as in-flight plans
/// complete. Once `cancel` fires no further plan starts, and each plan that
/// never started is reported as failed.
///
/// The stream itself never fails: every failure ends up in the report.
pub fn run(config: &Config, registry: Registry, cancel: CancellationToken) -> impl Stream<Item = RunEvent> + '_ {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let concurrency = config.concurrency.clamp(1, MAX_CONCURRENCY);
        let mut report = RunReport::new(&config.root, !config.apply, OffsetDateTime::now_utc());
        yield RunEvent::Started {
            root: config.root.clone(),
            provider: config.provider.clone(),
            apply: config.apply,
            concurrency,
        };

        let ctx = match Context::new(config, registry, cancel) {
            Ok(ctx) => ctx,
            Err(err) => {
                let code = match &*err {
                    ErrorKind::Client(_) => ErrorCode::ConfigInvalid,
                    _ => ErrorCode::IoFailed,
                };
                report.items.push(ItemResult::synthetic(code, (*err).to_string()));
                yield RunEvent::Complete(Box::new(complete(report)));
                return;
            },
        };

        let phase = Instant::now();
        let files = match scan(ctx.backend(), &config.root, &config.exclude_dirs).await {
            Ok(files) => files,
            Err(err) => {
                tracing::error!(error = %*err, "Scan failed");
                report.items.push(ItemResult::synthetic(ErrorCode::IoFailed, format!("{}: {}", *err, config.root.display())));
                yield RunEvent::Complete(Box::new(complete(report)));
                return;
            },
        };
        let scan_elapsed = phase.elapsed();

        let phase = Instant::now();
        let grouped = group(&files);
        yield RunEvent::Scanned {
            files: files.len(),
            unmatched: grouped.unmatched.len(),
            elapsed: scan_elapsed,
        };
        yield RunEvent::Grouped {
            codes: grouped.units.len(),
            elapsed: phase.elapsed(),
        };
        report
            .items
            .extend(grouped.unmatched.iter().filter_map(|u| unmatched_item(&files, u)));

        let phase = Instant::now();
        let mut plans = VecDeque::with_capacity(grouped.units.len());
        for unit in &grouped.units {
            let planned = match read_output_state(ctx.backend(), &unit.code).await {
                Ok(state) => plan(unit, &files, &state, &config.provider),
                Err(err) => Err(err),
            };
            match planned {
                Ok(plan) => plans.push_back(plan),
                Err(err) => {
                    tracing::warn!(code = %unit.code, error = %*err, "Planning failed");
                    report.items.push(failed_plan_item(unit, &files, &config.provider, (*err).to_string()));
                },
            }
        }
        let need = |f: fn(&ArtifactNeed) -> bool| plans.iter().filter(|p| f(&p.need)).count();
        yield RunEvent::Planned {
            items: plans.len(),
            need_scrape: need(|n| n.scrape),
            need_nfo: need(|n| n.nfo),
            need_fanart: need(|n| n.fanart),
            need_poster: need(|n| n.poster),
            moves: plans.iter().map(|p| p.moves.len()).sum(),
            elapsed: phase.elapsed(),
        };

        let total = plans.len();
        let mut done = 0;
        let mut processing = FuturesUnordered::new();
        while !ctx.is_cancelled()
            && processing.len() < concurrency
            && let Some(plan) = plans.pop_front()
        {
            processing.push(timed(&ctx, plan));
        }
        while let Some((item, elapsed)) = processing.next().await {
            done += 1;
            report.items.push(item.clone());
            yield RunEvent::ItemDone {
                done,
                total,
                result: Box::new(item),
                elapsed,
            };
            // Pop-n-push, FIFO. Nothing new starts once cancelled.
            if !ctx.is_cancelled()
                && let Some(plan) = plans.pop_front()
            {
                processing.push(timed(&ctx, plan));
            }
        }
        for plan in plans.drain(..) {
            done += 1;
            let item = cancelled_item(&plan);
            report.items.push(item.clone());
            yield RunEvent::ItemDone {
                done,
                total,
                result: Box::new(item),
                elapsed: Duration::ZERO,
            };
        }

        yield RunEvent::Complete(Box::new(complete(report)));
    })
}

/// Drain [`run`] and return its report.
pub async fn execute(config: &Config, registry: Registry, cancel: CancellationToken) -> RunReport {
    let mut events = std::pin::pin!(run(config, registry, cancel));
    let mut report = None;
    while let Some(event) = events.next().await {
        if let RunEvent::Complete(complete) = event {
            report = Some(*complete);
        }
    }
    report.unwrap_or_else(|| {
        RunReport::failed(&config.root, !config.apply, ErrorCode::IoFailed, "run ended without a report")
    })
}

async fn timed(ctx: &Context, plan: ExecutionPlan) -> (ItemResult, Duration) {
    let start = Instant::now();
    let item = execute_plan(ctx, &plan).await;
    (item, start.elapsed())
}

fn complete(mut report: RunReport) -> RunReport {
    report.finished_at = OffsetDateTime::now_utc();
    report.finalize();
    report
}

/// Unmatched files never reach a provider, so no provider is recorded.
fn unmatched_item(files: &[ScannedFile], unmatched: &Unmatched) -> Option<ItemResult> {
    let file = files.get(unmatched.file)?;
    let mut item = ItemResult::new("", "", Status::Unmatched);
    item.error_code = Some(ErrorCode::UnmatchedCode);
    item.error_msg = match &unmatched.reason {
        Unidentified::NoMatch => {
            "no code found in the file name or its parent directory; include a fragment like CAWD-895".to_string()
        },
        Unidentified::Ambiguous(candidates) => format!(
            "more than one code found ({}); rename the file or its directory so that only one remains",
            candidates.iter().map(Code::as_str).collect::<Vec<_>>().join(", ")
        ),
    };
    item.candidates = unmatched.reason.candidates().iter().map(Code::to_string).collect();
    item.files = vec![FileResult {
        src: file.relative.display().to_string(),
        dst: String::new(),
        status: FileStatus::Failed,
    }];
    Some(item)
}

fn failed_plan_item(unit: &WorkUnit, files: &[ScannedFile], provider: &str, message: String) -> ItemResult {
    let mut item = ItemResult::new(unit.code.as_str(), provider, Status::Failed);
    item.fail(ErrorCode::IoFailed, message);
    item.files = unit
        .files
        .iter()
        .filter_map(|index| files.get(*index))
        .map(|file| FileResult {
            src: file.relative.display().to_string(),
            dst: String::new(),
            status: FileStatus::Failed,
        })
        .collect();
    item
}

fn cancelled_item(plan: &ExecutionPlan) -> ItemResult {
    let mut item = ItemResult::new(plan.code.as_str(), &plan.provider, Status::Failed);
    item.fail(ErrorCode::IoFailed, "cancelled before start");
    item.files = plan
        .moves
        .iter()
        .map(|order| FileResult {
            src: order.source.display().to_string(),
            dst: order.destination.display().to_string(),
            status: FileStatus::Failed,
        })
        .collect();
    item
}
