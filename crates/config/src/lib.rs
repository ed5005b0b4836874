//! Configuration discovery, merging and validation.
//!
//! The effective configuration is assembled from three layers, highest
//! priority first:
//! 1. command-line [`Overrides`] (library path, provider, apply)
//! 2. the library's `avmc.json`, with `AVMC_`-prefixed environment variables
//!    layered over it (nested keys split on `__`, e.g. `AVMC_PROXY__URL`)
//! 3. built-in defaults
//!
//! When a path is given on the command line, `<path>/avmc.json` is optional.
//! Without one, `./avmc.json` must exist and must name the library `path`.

pub mod error;

use std::path::{Component, Path, PathBuf};

use exn::OptionExt;
use figment::Figment;
use figment::providers::{Env, Format, Json};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::error::{ErrorKind, Result};

pub const CONFIG_FILE: &str = "avmc.json";
pub const ENV_PREFIX: &str = "AVMC_";
pub const DEFAULT_PROVIDER: &str = "javbus";
pub const PROVIDERS: &[&str] = &["javbus", "javdb"];
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 32;
pub const DEFAULT_JAVDB_BASE_URL: &str = "https://javdb.com";

/// Values given on the command line. `None` means "not given", which is
/// distinct from e.g. an explicit `--apply=false`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub path: Option<PathBuf>,
    pub provider: Option<String>,
    pub apply: Option<bool>,
}

/// The effective, validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Absolute library root
    pub root: PathBuf,
    /// Where the config file was (or would have been) read from
    pub config_file: PathBuf,
    pub provider: String,
    pub apply: bool,
    /// Worker count, always within `1..=MAX_CONCURRENCY`
    pub concurrency: usize,
    pub proxy: Option<Url>,
    /// Route image downloads through [`proxy`](Self::proxy) as well
    pub image_proxy: bool,
    /// Directories to leave alone while scanning, relative to the root or
    /// absolute
    pub exclude_dirs: Vec<PathBuf>,
    /// Without a trailing slash
    pub javdb_base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    path: Option<String>,
    provider: Option<String>,
    apply: Option<bool>,
    concurrency: Option<i64>,
    proxy: Option<ProxyConfig>,
    image_proxy: bool,
    exclude_dirs: Vec<String>,
    javdb_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProxyConfig {
    url: Option<String>,
}

/// Load the effective configuration, resolving relative paths against `cwd`.
#[instrument(skip(overrides))]
pub fn load(cwd: &Path, overrides: &Overrides) -> Result<Config> {
    let cli_path = overrides.path.as_deref().filter(|p| !p.as_os_str().is_empty());
    let (root, config_file, file) = match cli_path {
        Some(path) => {
            let root = absolute_from(cwd, path);
            let config_file = root.join(CONFIG_FILE);
            let file = read_file(&config_file)?;
            (root, config_file, file)
        },
        None => {
            let config_file = absolute_from(cwd, Path::new(CONFIG_FILE));
            if !config_file.exists() {
                exn::bail!(ErrorKind::NotFound(config_file));
            }
            let file = read_file(&config_file)?;
            let root = file
                .path
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| absolute_from(cwd, Path::new(p)))
                .ok_or_raise(|| ErrorKind::MissingPath(config_file.clone()))?;
            (root, config_file, file)
        },
    };
    let config = merge(root, config_file, overrides, file)?;
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        if !path.is_file() {
            exn::bail!(ErrorKind::invalid(path, "not a regular file"));
        }
        figment = figment.merge(Json::file_exact(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract::<FileConfig>()
        .map_err(|e| ErrorKind::invalid(path, e.to_string()).into())
}

fn merge(root: PathBuf, config_file: PathBuf, overrides: &Overrides, file: FileConfig) -> Result<Config> {
    let invalid = |reason: String| exn::Exn::from(ErrorKind::invalid(&config_file, reason));

    let provider = overrides
        .provider
        .clone()
        .or_else(|| file.provider.filter(|p| !p.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    if !PROVIDERS.contains(&provider.as_str()) {
        return Err(invalid(format!("provider must be one of {}, got {provider:?}", PROVIDERS.join(", "))));
    }

    let apply = overrides.apply.or(file.apply).unwrap_or(false);

    let concurrency = match file.concurrency {
        None | Some(0) => DEFAULT_CONCURRENCY,
        Some(n) => n.clamp(1, MAX_CONCURRENCY as i64) as usize,
    };

    let proxy = match file.proxy.and_then(|p| p.url).as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(Url::parse(raw).map_err(|e| invalid(format!("proxy.url {raw:?}: {e}")))?),
    };
    if file.image_proxy && proxy.is_none() {
        return Err(invalid("image_proxy is enabled but proxy.url is empty".to_string()));
    }

    let javdb_base_url = match file.javdb_base_url.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_JAVDB_BASE_URL.to_string(),
        Some(raw) => {
            let url = Url::parse(raw).map_err(|e| invalid(format!("javdb_base_url {raw:?}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
                return Err(invalid(format!("javdb_base_url must be an http(s) URL with a host, got {raw:?}")));
            }
            raw.trim_end_matches('/').to_string()
        },
    };

    let exclude_dirs = file
        .exclude_dirs
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .collect();

    Ok(Config {
        root,
        config_file,
        provider,
        apply,
        concurrency,
        proxy,
        image_proxy: file.image_proxy,
        exclude_dirs,
        javdb_base_url,
    })
}

/// Join `path` onto `base` unless it is already absolute, then resolve `.`
/// and `..` lexically.
fn absolute_from(base: &Path, path: &Path) -> PathBuf {
    let joined = match path.is_absolute() {
        true => path.to_path_buf(),
        false => base.join(path),
    };
    let mut clean = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                clean.pop();
            },
            other => clean.push(other),
        }
    }
    clean
}
