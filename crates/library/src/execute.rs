//! Executing one [`ExecutionPlan`].
//!
//! The order is fixed: scrape, output directory, NFO, fanart, poster, and
//! only then the moves. Anything that fails before the moves leaves every
//! video where it was. A move that fails undoes the moves before it, newest
//! first. Dry-runs stop after the scrape.

use crate::error::{ErrorKind, Result};
use crate::output::{nfo_name, output_dir};
use crate::plan::ExecutionPlan;
use crate::report::{AttemptRecord, ErrorCode, FileResult, FileStatus, ItemResult, Status};
use crate::scrape::scrape;
use avmc_cache::ProviderCache;
use avmc_config::Config;
use avmc_extract::Metadata;
use avmc_provider::download::download;
use avmc_provider::{HttpClient, Registry, Stage, humanize};
use avmc_render::{FANART_FILE, NfoRenderer, POSTER_FILE, poster_from_fanart};
use avmc_storage::BackendHandle;
use avmc_storage::backend::{LocalBackend, ReadOnlyBackend};
use avmc_storage::error::ErrorKind as StorageErrorKind;
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Everything a worker needs, shared by every plan of a run.
pub struct Context {
    pub(crate) backend: BackendHandle,
    pub(crate) cache: ProviderCache,
    pub(crate) registry: Registry,
    pub(crate) meta: HttpClient,
    /// Only apply runs download images.
    pub(crate) image: Option<HttpClient>,
    pub(crate) nfo: NfoRenderer,
    pub(crate) cancel: CancellationToken,
    pub(crate) apply: bool,
}
impl Context {
    /// Dry-runs get a read-only view of the library and a read-only cache.
    pub fn new(config: &Config, registry: Registry, cancel: CancellationToken) -> Result<Self> {
        let local: BackendHandle = Arc::new(
            LocalBackend::new("library", &config.root).or_raise(|| ErrorKind::Root(config.root.clone()))?,
        );
        let backend = match config.apply {
            true => local.clone(),
            false => Arc::new(ReadOnlyBackend::new(local.clone())) as BackendHandle,
        };
        let meta = client(HttpClient::meta(config.proxy.as_ref()))?;
        let image = match config.apply {
            true => Some(client(HttpClient::image(config.proxy.as_ref(), config.image_proxy))?),
            false => None,
        };
        Ok(Self {
            backend,
            cache: ProviderCache::new(local, !config.apply),
            registry,
            meta,
            image,
            nfo: NfoRenderer::new().or_raise(|| ErrorKind::Nfo)?,
            cancel,
            apply: config.apply,
        })
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn client(built: avmc_provider::error::Result<HttpClient>) -> Result<HttpClient> {
    built.or_else(|err| {
        let reason = (*err).to_string();
        Err(err).or_raise(|| ErrorKind::Client(reason))
    })
}

/// Why a plan stopped, as it will read in the report.
struct Failed {
    code: ErrorCode,
    message: String,
}
impl Failed {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn storage(err: &StorageErrorKind, what: &str) -> Self {
        match err.is_conflict() {
            true => Self::new(ErrorCode::TargetConflict, err.to_string()),
            false => Self::new(ErrorCode::IoFailed, format!("failed to {what}: {err}")),
        }
    }
}

/// Run one plan to completion. Never errors: the outcome, good or bad, is
/// the returned item.
#[instrument(skip_all, fields(code = %plan.code))]
pub async fn execute_plan(ctx: &Context, plan: &ExecutionPlan) -> ItemResult {
    let mut item = ItemResult::new(plan.code.as_str(), &plan.provider, Status::Processed);
    item.files = plan
        .moves
        .iter()
        .map(|order| FileResult {
            src: order.source.display().to_string(),
            dst: order.destination.display().to_string(),
            status: FileStatus::Planned,
        })
        .collect();

    if !plan.need.any_sidecar() && plan.moves.is_empty() {
        item.status = Status::Skipped;
        return item;
    }
    if let Err(Failed { code, message }) = run_plan(ctx, plan, &mut item).await {
        tracing::debug!(error_code = %code, error = %message, "Item failed");
        item.fail(code, message);
        if ctx.apply {
            item.fail_files();
        }
    }
    item
}

async fn run_plan(ctx: &Context, plan: &ExecutionPlan, item: &mut ItemResult) -> std::result::Result<(), Failed> {
    let metadata = match plan.need.scrape {
        true => Some(scrape_into(ctx, plan, item).await?),
        false => None,
    };
    if !ctx.apply {
        return Ok(());
    }

    let dir = output_dir(&plan.code);
    ctx.backend
        .create_dir(&dir)
        .await
        .map_err(|err| Failed::storage(&err, "create the output directory"))?;

    if plan.need.nfo
        && let Some(meta) = &metadata
    {
        let xml = ctx
            .nfo
            .render(meta)
            .map_err(|err| Failed::new(ErrorCode::IoFailed, format!("failed to render the NFO: {}", *err)))?;
        write_sidecar(ctx, &dir.join(nfo_name(&plan.code)), &xml).await?;
    }

    let mut fanart = None;
    if plan.need.fanart
        && let Some(meta) = &metadata
    {
        let bytes = download_fanart(ctx, meta, &item.provider_used).await?;
        write_sidecar(ctx, &dir.join(FANART_FILE), &bytes).await?;
        fanart = Some(bytes);
    }

    if plan.need.poster {
        let source = match fanart {
            Some(bytes) => bytes,
            None => ctx.backend.read(&dir.join(FANART_FILE)).await.map_err(|err| {
                Failed::new(ErrorCode::IoFailed, format!("failed to read {FANART_FILE} for the poster: {}", *err))
            })?,
        };
        let poster = tokio::task::spawn_blocking(move || poster_from_fanart(&source))
            .await
            .map_err(|err| Failed::new(ErrorCode::IoFailed, format!("poster task failed: {err}")))?
            .map_err(|err| Failed::new(ErrorCode::IoFailed, format!("failed to make the poster: {}", *err)))?;
        write_sidecar(ctx, &dir.join(POSTER_FILE), &poster).await?;
    }

    move_files(ctx, plan, item).await
}

async fn scrape_into(ctx: &Context, plan: &ExecutionPlan, item: &mut ItemResult) -> std::result::Result<Metadata, Failed> {
    match scrape(&ctx.cache, &ctx.registry, &plan.provider, &plan.code, &ctx.meta, &ctx.cancel).await {
        Ok(scrape) => {
            item.provider_used = scrape.provider;
            item.website = scrape.metadata.website.clone();
            item.attempts = scrape.attempts.iter().map(AttemptRecord::from).collect();
            Ok(scrape.metadata)
        },
        Err(exhausted) => {
            item.attempts = exhausted.attempts.iter().map(AttemptRecord::from).collect();
            let code = match exhausted.last.stage {
                Stage::Parse => ErrorCode::ParseFailed,
                Stage::Fetch | Stage::Ok => ErrorCode::FetchFailed,
            };
            Err(Failed::new(code, humanize(&exhausted.last)))
        },
    }
}

async fn download_fanart(ctx: &Context, meta: &Metadata, provider: &str) -> std::result::Result<Vec<u8>, Failed> {
    let url = meta.fanart_url.trim();
    if url.is_empty() {
        return Err(Failed::new(
            ErrorCode::ParseFailed,
            format!("{provider} gave no fanart URL, so {FANART_FILE} can't be downloaded"),
        ));
    }
    let Some(http) = &ctx.image else {
        return Err(Failed::new(ErrorCode::IoFailed, "image downloads are disabled for this run"));
    };
    download(http, url, &meta.website, &ctx.cancel)
        .await
        .map_err(|err| Failed::new(ErrorCode::FetchFailed, format!("failed to download the fanart: {}", *err)))
}

/// No-clobber atomic write. An existing regular file already satisfies it.
async fn write_sidecar(ctx: &Context, path: &Path, data: &[u8]) -> std::result::Result<(), Failed> {
    match ctx.backend.write_new(path, data).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), bytes = data.len(), "Sidecar written");
            Ok(())
        },
        Err(err) if matches!(&*err, StorageErrorKind::AlreadyExists(_)) => {
            tracing::debug!(path = %path.display(), "Sidecar already exists");
            Ok(())
        },
        Err(err) => Err(Failed::storage(&err, &format!("write {}", path.display()))),
    }
}

async fn move_files(ctx: &Context, plan: &ExecutionPlan, item: &mut ItemResult) -> std::result::Result<(), Failed> {
    let mut applied: Vec<usize> = Vec::with_capacity(plan.moves.len());
    for (index, order) in plan.moves.iter().enumerate() {
        if let Err(err) = ctx.backend.rename(&order.source, &order.destination).await {
            item.set_file_status(index, FileStatus::Failed);
            // Undo log, newest first.
            for undo in applied.into_iter().rev() {
                let order = &plan.moves[undo];
                let status = match ctx.backend.rename(&order.destination, &order.source).await {
                    Ok(()) => FileStatus::RolledBack,
                    Err(err) => {
                        tracing::warn!(path = %order.destination.display(), error = %*err, "Rollback failed");
                        FileStatus::Failed
                    },
                };
                item.set_file_status(undo, status);
            }
            return Err(Failed::new(ErrorCode::MoveFailed, (*err).to_string()));
        }
        tracing::debug!(from = %order.source.display(), to = %order.destination.display(), "Moved");
        item.set_file_status(index, FileStatus::Moved);
        applied.push(index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::read_output_state;
    use crate::group::group;
    use crate::plan::plan;
    use crate::scan::scan;
    use crate::testing::{Fake, config, fanart_png, library, registry};
    use avmc_provider::error::ErrorKind as ProviderErrorKind;
    use avmc_provider::testing::{TestServer, response};
    use std::fs;

    /// Scan, group and plan the library the way a run would; one unit only.
    async fn plan_only(ctx: &Context, root: &Path) -> ExecutionPlan {
        let files = scan(ctx.backend(), root, &[]).await.unwrap();
        let grouped = group(&files);
        assert_eq!(grouped.units.len(), 1);
        let unit = &grouped.units[0];
        let state = read_output_state(ctx.backend(), &unit.code).await.unwrap();
        plan(unit, &files, &state, "javbus").unwrap()
    }

    fn context(root: &Path, apply: bool, fakes: Vec<Fake>) -> Context {
        Context::new(&config(root, apply), registry(fakes), CancellationToken::new()).unwrap()
    }

    fn statuses(item: &ItemResult) -> Vec<FileStatus> {
        item.files.iter().map(|f| f.status).collect()
    }

    #[tokio::test]
    async fn test_apply_everything() {
        let server = TestServer::start(|_| response(200, &[("content-type", "image/png")], &fanart_png(40, 30))).await;
        let (dir, _) = library(&["inbox/ABC-123.mp4"]);
        let javbus = Fake::ok("javbus", "https://www.javbus.com/ABC-123", &server.url("/fanart.png"));
        let ctx = context(dir.path(), true, vec![javbus]);
        let plan = plan_only(&ctx, dir.path()).await;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Processed, "{}", item.error_msg);
        assert_eq!(item.provider_used, "javbus");
        assert_eq!(item.website, "https://www.javbus.com/ABC-123");
        assert_eq!(statuses(&item), vec![FileStatus::Moved]);
        assert_eq!(item.files[0].dst, "out/ABC-123/ABC-123.mp4");

        let out = dir.path().join("out/ABC-123");
        let nfo = fs::read_to_string(out.join("ABC-123.nfo")).unwrap();
        assert!(nfo.contains("<title>ABC-123 Title ABC-123</title>"));
        assert!(out.join("fanart.jpg").is_file());
        let poster = image::load_from_memory(&fs::read(out.join("poster.jpg")).unwrap()).unwrap();
        assert_eq!((poster.width(), poster.height()), (20, 30));
        assert!(out.join("ABC-123.mp4").is_file());
        assert!(!dir.path().join("inbox/ABC-123.mp4").exists());
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let (dir, _) = library(&["ABC-123.mp4"]);
        let javbus = Fake::ok("javbus", "https://www.javbus.com/ABC-123", "https://img.test/fanart.jpg");
        let ctx = context(dir.path(), false, vec![javbus]);
        let plan = plan_only(&ctx, dir.path()).await;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Processed);
        assert_eq!(item.provider_used, "javbus");
        assert_eq!(statuses(&item), vec![FileStatus::Planned]);
        assert!(!dir.path().join("out").exists());
        assert!(!dir.path().join("cache").exists());
        assert!(dir.path().join("ABC-123.mp4").is_file());
    }

    #[tokio::test]
    async fn test_scrape_failure_moves_nothing() {
        let (dir, _) = library(&["ABC-123.mp4"]);
        let ctx = context(dir.path(), true, vec![
            Fake::failing("javbus", ProviderErrorKind::HttpStatus {
                url: "https://www.javbus.com/ABC-123".to_string(),
                status: 404,
                location: None,
            }),
            Fake::failing("javdb", ProviderErrorKind::Timeout),
        ]);
        let plan = plan_only(&ctx, dir.path()).await;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Failed);
        assert_eq!(item.error_code, Some(ErrorCode::FetchFailed));
        assert!(item.error_msg.starts_with("javdb timed out"), "{}", item.error_msg);
        assert_eq!(item.attempts.len(), 2);
        assert_eq!(statuses(&item), vec![FileStatus::Failed]);
        assert!(!dir.path().join("out").exists());
        assert!(dir.path().join("ABC-123.mp4").is_file());
    }

    #[tokio::test]
    async fn test_missing_fanart_url() {
        let (dir, _) = library(&["ABC-123.mp4"]);
        let ctx = context(dir.path(), true, vec![Fake::ok("javbus", "https://www.javbus.com/ABC-123", "")]);
        let plan = plan_only(&ctx, dir.path()).await;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.error_code, Some(ErrorCode::ParseFailed));
        // The NFO comes first and stays.
        assert!(dir.path().join("out/ABC-123/ABC-123.nfo").is_file());
        assert!(dir.path().join("ABC-123.mp4").is_file());
    }

    #[tokio::test]
    async fn test_fanart_download_failure() {
        let server = TestServer::start(|_| response(403, &[], b"hotlinking")).await;
        let (dir, _) = library(&["ABC-123.mp4"]);
        let ctx = context(dir.path(), true, vec![Fake::ok("javbus", "https://www.javbus.com/ABC-123", &server.url("/f.jpg"))]);
        let plan = plan_only(&ctx, dir.path()).await;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.error_code, Some(ErrorCode::FetchFailed));
        assert!(item.error_msg.contains("fanart"));
        assert_eq!(statuses(&item), vec![FileStatus::Failed]);
    }

    #[tokio::test]
    async fn test_poster_from_existing_fanart() {
        let (dir, _) = library(&["ABC-123.mp4"]);
        let out = dir.path().join("out/ABC-123");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("ABC-123.nfo"), b"<movie/>").unwrap();
        fs::write(out.join("fanart.jpg"), fanart_png(64, 10)).unwrap();
        // No scrape is needed, so no provider is registered at all.
        let ctx = context(dir.path(), true, vec![]);
        let plan = plan_only(&ctx, dir.path()).await;
        assert!(!plan.need.scrape);

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Processed, "{}", item.error_msg);
        assert!(item.attempts.is_empty());
        let poster = image::load_from_memory(&fs::read(out.join("poster.jpg")).unwrap()).unwrap();
        assert_eq!((poster.width(), poster.height()), (32, 10));
        assert_eq!(fs::read(out.join("ABC-123.nfo")).unwrap(), b"<movie/>");
    }

    #[tokio::test]
    async fn test_output_directory_conflict() {
        let (dir, _) = library(&["ABC-123.mp4"]);
        let ctx = context(dir.path(), true, vec![Fake::ok("javbus", "https://www.javbus.com/ABC-123", "")]);
        let plan = plan_only(&ctx, dir.path()).await;
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/ABC-123"), b"in the way").unwrap();

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.error_code, Some(ErrorCode::TargetConflict));
        assert_eq!(statuses(&item), vec![FileStatus::Failed]);
    }

    #[tokio::test]
    async fn test_sidecar_conflict() {
        let (dir, _) = library(&["ABC-123.mp4"]);
        fs::create_dir_all(dir.path().join("out/ABC-123/ABC-123.nfo")).unwrap();
        fs::write(dir.path().join("out/ABC-123/fanart.jpg"), fanart_png(4, 4)).unwrap();
        let ctx = context(dir.path(), true, vec![Fake::ok("javbus", "https://www.javbus.com/ABC-123", "")]);
        let mut plan = plan_only(&ctx, dir.path()).await;
        // The listing can't tell a directory from a file; force the write.
        plan.need.nfo = true;
        plan.need.scrape = true;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.error_code, Some(ErrorCode::TargetConflict));
        assert!(dir.path().join("ABC-123.mp4").is_file());
    }

    #[tokio::test]
    async fn test_move_failure_rolls_back() {
        let (dir, _) = library(&["a/ABC-123.mp4", "b/ABC-123 cd2.mp4"]);
        let out = dir.path().join("out/ABC-123");
        fs::create_dir_all(&out).unwrap();
        for name in ["ABC-123.nfo", "poster.jpg", "fanart.jpg"] {
            fs::write(out.join(name), b"x").unwrap();
        }
        let ctx = context(dir.path(), true, vec![]);
        let plan = plan_only(&ctx, dir.path()).await;
        assert_eq!(plan.moves.len(), 2);
        // Something appears at the second destination after planning.
        fs::create_dir_all(dir.path().join(&plan.moves[1].destination)).unwrap();

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Failed);
        assert_eq!(item.error_code, Some(ErrorCode::MoveFailed));
        assert_eq!(statuses(&item), vec![FileStatus::RolledBack, FileStatus::Failed]);
        assert!(dir.path().join("a/ABC-123.mp4").is_file());
        assert!(dir.path().join("b/ABC-123 cd2.mp4").is_file());
        assert!(!out.join("ABC-123.mp4").exists());
    }

    #[tokio::test]
    async fn test_only_moves_needed() {
        let (dir, _) = library(&["ABC-123.mkv"]);
        let out = dir.path().join("out/ABC-123");
        fs::create_dir_all(&out).unwrap();
        for name in ["ABC-123.nfo", "poster.jpg", "fanart.jpg", "ABC-123.mkv"] {
            fs::write(out.join(name), b"x").unwrap();
        }
        let ctx = context(dir.path(), true, vec![]);
        let plan = plan_only(&ctx, dir.path()).await;

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Processed);
        assert_eq!(item.files[0].dst, "out/ABC-123/ABC-123__2.mkv");
        assert_eq!(fs::read(out.join("ABC-123.mkv")).unwrap(), b"x");
        assert_eq!(fs::read(out.join("ABC-123__2.mkv")).unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_nothing_to_do_is_skipped() {
        let (dir, _) = library(&[]);
        fs::create_dir_all(dir.path().join("out/ABC-123")).unwrap();
        for name in ["ABC-123.nfo", "poster.jpg", "fanart.jpg"] {
            fs::write(dir.path().join("out/ABC-123").join(name), b"x").unwrap();
        }
        let ctx = context(dir.path(), true, vec![]);
        let code = avmc_extract::Code::parse("ABC-123").unwrap();
        let state = read_output_state(ctx.backend(), &code).await.unwrap();
        let unit = crate::group::WorkUnit { code, files: vec![] };
        let plan = plan(&unit, &[], &state, "javbus").unwrap();

        let item = execute_plan(&ctx, &plan).await;
        assert_eq!(item.status, Status::Skipped);
    }
}
