//! Fixtures shared by the pipeline tests.

use async_trait::async_trait;
use avmc_config::Config;
use avmc_extract::{Code, Metadata};
use avmc_provider::error::{ErrorKind as ProviderErrorKind, Result as ProviderResult};
use avmc_provider::{Fetched, HttpClient, Provider, Registry};
use avmc_storage::BackendHandle;
use avmc_storage::backend::LocalBackend;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Outcome {
    Page { page_url: String, fanart_url: String },
    FetchError(ProviderErrorKind),
    Unparsable,
}

/// A provider that answers without any network, counting its fetches and
/// the most fetches it ever had in flight at once.
#[derive(Clone)]
pub(crate) struct Fake {
    name: &'static str,
    outcome: Outcome,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}
impl Fake {
    fn new(name: &'static str, outcome: Outcome) -> Self {
        Self {
            name,
            outcome,
            delay: Duration::ZERO,
            calls: Arc::default(),
            in_flight: Arc::default(),
            peak: Arc::default(),
        }
    }

    /// Every fetch takes at least `delay`.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Parses to a title of `Title <CODE>` with the given fanart.
    pub(crate) fn ok(name: &'static str, page_url: &str, fanart_url: &str) -> Self {
        Self::new(name, Outcome::Page {
            page_url: page_url.to_string(),
            fanart_url: fanart_url.to_string(),
        })
    }

    pub(crate) fn failing(name: &'static str, kind: ProviderErrorKind) -> Self {
        Self::new(name, Outcome::FetchError(kind))
    }

    pub(crate) fn unparsable(name: &'static str) -> Self {
        Self::new(name, Outcome::Unparsable)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for Fake {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, code: &Code, _: &HttpClient, _: &CancellationToken) -> ProviderResult<Fetched> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Page { page_url, .. } => Ok(Fetched {
                document: format!("<html><h3>{code}</h3></html>").into_bytes(),
                page_url: page_url.clone(),
            }),
            Outcome::FetchError(kind) => Err(kind.clone().into()),
            Outcome::Unparsable => Ok(Fetched {
                document: b"<html></html>".to_vec(),
                page_url: format!("https://{}.test/{code}", self.name),
            }),
        }
    }

    fn parse(&self, code: &Code, _: &[u8], _: &str) -> ProviderResult<Metadata> {
        let Outcome::Page { fanart_url, .. } = &self.outcome else {
            exn::bail!(ProviderErrorKind::Parse(avmc_extract::error::ErrorKind::MissingField("title")));
        };
        let mut meta = Metadata::new(code.clone());
        meta.title = format!("Title {code}");
        meta.actors = vec!["Actor".to_string()];
        meta.fanart_url = fanart_url.clone();
        meta.cover_url = fanart_url.clone();
        Ok(meta)
    }
}

pub(crate) fn registry(fakes: Vec<Fake>) -> Registry {
    let mut registry = Registry::default();
    for fake in fakes {
        registry.register(fake).unwrap();
    }
    registry
}

/// A library root holding the given (relative) files, each containing `video`.
pub(crate) fn library(files: &[&str]) -> (tempfile::TempDir, BackendHandle) {
    let temp_dir = tempfile::tempdir().unwrap();
    for file in files {
        let path = temp_dir.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"video").unwrap();
    }
    let backend: BackendHandle = Arc::new(LocalBackend::new("library", temp_dir.path()).unwrap());
    (temp_dir, backend)
}

pub(crate) fn config(root: &Path, apply: bool) -> Config {
    Config {
        root: root.to_path_buf(),
        config_file: root.join("avmc.json"),
        provider: "javbus".to_string(),
        apply,
        concurrency: 2,
        proxy: None,
        image_proxy: false,
        exclude_dirs: Vec::<PathBuf>::new(),
        javdb_base_url: "https://javdb.com".to_string(),
    }
}

pub(crate) fn fanart_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([10, 20, 200]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
