mod cli;
mod logging;

use crate::cli::{Cli, Command, RunArgs};
use avmc_config::Config;
use avmc_library::{ErrorCode, RunEvent, RunReport, Status};
use avmc_storage::StorageBackend;
use avmc_storage::backend::LocalBackend;
use clap::Parser;
use futures::StreamExt;
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

const REPORT_FILE: &str = "cache/report.json";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();
    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> ExitCode {
    let dry_run = !args.apply.unwrap_or(false);
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            tracing::error!(error = %err, "Cannot read the working directory");
            let report = RunReport::failed(Path::new("."), dry_run, ErrorCode::ConfigInvalid, err.to_string());
            return finish(&report);
        },
    };
    let config = match avmc_config::load(&cwd, &args.overrides()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %*err, "Configuration rejected");
            let path = args.path.clone().unwrap_or(cwd);
            let report = RunReport::failed(&path, dry_run, ErrorCode::from(&*err), (*err).to_string());
            return finish(&report);
        },
    };
    let registry = match avmc_provider::builtin(&config.javdb_base_url) {
        Ok(registry) => registry,
        Err(err) => {
            let report = RunReport::failed(&config.root, !config.apply, ErrorCode::ConfigInvalid, (*err).to_string());
            return finish(&report);
        },
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let mut report = None;
    let mut events = std::pin::pin!(avmc_library::run(&config, registry, cancel));
    while let Some(event) = events.next().await {
        match event {
            RunEvent::Complete(complete) => report = Some(*complete),
            event => log_event(&event),
        }
    }
    let report = report.unwrap_or_else(|| {
        RunReport::failed(&config.root, !config.apply, ErrorCode::IoFailed, "run ended without a report")
    });

    if config.apply {
        match save_report(&config, &report).await {
            Ok(()) => tracing::info!(path = %config.root.join(REPORT_FILE).display(), "Report saved"),
            Err(message) => {
                tracing::error!(path = REPORT_FILE, error = %message, "Failed to write the run report");
                finish(&report);
                return ExitCode::FAILURE;
            },
        }
    }
    finish(&report)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupted: finishing in-flight items, starting no new ones");
        cancel.cancel();
    }
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::Started {
            root,
            provider,
            apply,
            concurrency,
        } => tracing::info!(root = %root.display(), provider = %provider, apply, concurrency, "Run started"),
        RunEvent::Scanned {
            files,
            unmatched,
            elapsed,
        } => tracing::info!(files, unmatched, elapsed = ?elapsed, "Scanned library"),
        RunEvent::Grouped { codes, elapsed } => tracing::info!(codes, elapsed = ?elapsed, "Grouped files by code"),
        RunEvent::Planned {
            items,
            need_scrape,
            need_nfo,
            need_fanart,
            need_poster,
            moves,
            elapsed,
        } => tracing::info!(
            items,
            need_scrape,
            need_nfo,
            need_fanart,
            need_poster,
            moves,
            elapsed = ?elapsed,
            "Planned"
        ),
        RunEvent::ItemDone {
            done,
            total,
            result,
            elapsed,
        } => match result.status {
            Status::Failed => tracing::warn!(
                done,
                total,
                code = %result.code,
                error_code = %result.error_code.map(|c| c.to_string()).unwrap_or_default(),
                error = %result.error_msg,
                "Item failed"
            ),
            status => tracing::info!(
                done,
                total,
                code = %result.code,
                status = %status,
                provider = %result.provider_used,
                elapsed = ?elapsed,
                "Item done"
            ),
        },
        RunEvent::Complete(_) => {},
    }
}

async fn save_report(config: &Config, report: &RunReport) -> Result<(), String> {
    let json = serde_json::to_vec_pretty(report).map_err(|err| err.to_string())?;
    let backend = LocalBackend::new("library", &config.root).map_err(|err| (*err).to_string())?;
    backend
        .write(Path::new(REPORT_FILE), &json)
        .await
        .map_err(|err| (*err).to_string())
}

/// Print the report (JSON for pipes, a summary for terminals) and pick the exit code.
fn finish(report: &RunReport) -> ExitCode {
    let s = &report.summary;
    tracing::info!(
        processed = s.processed,
        skipped = s.skipped,
        failed = s.failed,
        unmatched = s.unmatched,
        "Run complete"
    );
    if std::io::stdout().is_terminal() {
        println!(
            "{} {}: processed={} skipped={} failed={} unmatched={}",
            if report.dry_run { "dry-run" } else { "applied" },
            report.path,
            s.processed,
            s.skipped,
            s.failed,
            s.unmatched,
        );
        for item in report
            .items
            .iter()
            .filter(|i| matches!(i.status, Status::Failed | Status::Unmatched))
        {
            let code = if item.code.is_empty() { "-" } else { item.code.as_str() };
            let error_code = item.error_code.map(|c| c.to_string()).unwrap_or_default();
            eprintln!("{code}\t{error_code}\t{}", item.error_msg);
        }
    } else {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize the run report");
                return ExitCode::FAILURE;
            },
        }
    }
    match report.summary.has_failures() {
        true => ExitCode::FAILURE,
        false => ExitCode::SUCCESS,
    }
}
